//! The shared output device.
//!
//! One [`AudioContext`] exists per engine and is handed around as
//! `Rc<AudioContext>`. The backend is built lazily on first use from an
//! injected factory. If that fails the context stays silent for good: every
//! later call is a cheap no-op, never an error.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;

use super::command::AudioCommand;
use super::voice::{Voice, VoiceId};
use super::AudioError;

/// A device that can play scheduled voices.
pub trait OutputBackend {
    fn sample_rate(&self) -> u32;

    /// Seconds of audio rendered so far.
    fn current_time(&self) -> f64;

    fn send(&mut self, cmd: AudioCommand) -> Result<(), AudioError>;

    /// Ids of voices that stopped sounding since the last call.
    fn take_ended(&mut self) -> Vec<VoiceId>;

    fn suspend(&mut self) -> Result<(), AudioError>;

    fn resume(&mut self) -> Result<(), AudioError>;

    /// Release the device. Must tolerate being called more than once.
    fn close(&mut self);
}

pub type BackendFactory = Box<dyn FnOnce() -> Result<Box<dyn OutputBackend>, AudioError>>;

enum DeviceState {
    Pending(BackendFactory),
    Ready(Box<dyn OutputBackend>),
    Unavailable,
    Closed,
}

impl fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceState::Pending(_) => "Pending",
            DeviceState::Ready(_) => "Ready",
            DeviceState::Unavailable => "Unavailable",
            DeviceState::Closed => "Closed",
        })
    }
}

#[derive(Debug)]
pub struct AudioContext {
    state: RefCell<DeviceState>,
    start_suspended: bool,
    suspended: Cell<bool>,
    next_id: Cell<u64>,
    active: RefCell<BTreeSet<VoiceId>>,
}

impl AudioContext {
    /// Context whose backend is built by `factory` on first use.
    pub fn new(factory: BackendFactory) -> Self {
        Self::with_state(DeviceState::Pending(factory), false)
    }

    /// Like [`new`](Self::new), but the device starts paused until the first
    /// [`resume`](Self::resume).
    pub fn new_suspended(factory: BackendFactory) -> Self {
        Self::with_state(DeviceState::Pending(factory), true)
    }

    /// Context around an already-open backend.
    pub fn with_backend(backend: Box<dyn OutputBackend>) -> Self {
        Self::with_state(DeviceState::Ready(backend), false)
    }

    /// A context that never produces sound.
    pub fn silent() -> Self {
        Self::with_state(DeviceState::Unavailable, false)
    }

    fn with_state(state: DeviceState, start_suspended: bool) -> Self {
        Self {
            state: RefCell::new(state),
            start_suspended,
            suspended: Cell::new(false),
            next_id: Cell::new(1),
            active: RefCell::new(BTreeSet::new()),
        }
    }

    /// Build the backend if it has not been built yet. Returns whether a
    /// device is ready.
    fn ensure_device(&self) -> bool {
        let mut state = self.state.borrow_mut();
        if matches!(*state, DeviceState::Pending(_)) {
            let DeviceState::Pending(factory) = std::mem::replace(&mut *state, DeviceState::Unavailable)
            else {
                return false;
            };
            match factory() {
                Ok(mut backend) => {
                    log::info!("audio device ready at {} Hz", backend.sample_rate());
                    if self.start_suspended {
                        match backend.suspend() {
                            Ok(()) => self.suspended.set(true),
                            Err(e) => log::warn!("could not start suspended: {e}"),
                        }
                    }
                    *state = DeviceState::Ready(backend);
                }
                Err(e) => {
                    log::warn!("audio output unavailable, continuing silently: {e}");
                }
            }
        }
        matches!(*state, DeviceState::Ready(_))
    }

    fn with_backend_mut<T>(&self, f: impl FnOnce(&mut dyn OutputBackend) -> T) -> Option<T> {
        if !self.ensure_device() {
            return None;
        }
        match &mut *self.state.borrow_mut() {
            DeviceState::Ready(backend) => Some(f(backend.as_mut())),
            _ => None,
        }
    }

    fn with_backend_ref<T>(&self, f: impl FnOnce(&dyn OutputBackend) -> T) -> Option<T> {
        if !self.ensure_device() {
            return None;
        }
        match &*self.state.borrow() {
            DeviceState::Ready(backend) => Some(f(backend.as_ref())),
            _ => None,
        }
    }

    /// Whether a device is (or can be) opened. Opens it if needed.
    pub fn is_available(&self) -> bool {
        self.ensure_device()
    }

    pub fn is_suspended(&self) -> bool {
        self.ensure_device();
        self.suspended.get()
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.borrow(), DeviceState::Closed)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.with_backend_ref(|b| b.sample_rate())
    }

    /// Device clock in seconds; 0 when no device is open.
    pub fn current_time(&self) -> f64 {
        self.with_backend_ref(|b| b.current_time()).unwrap_or(0.0)
    }

    /// Unpause the device. Called on user gestures such as pressing play.
    pub fn resume(&self) -> bool {
        if !self.suspended.get() {
            return self.ensure_device();
        }
        match self.with_backend_mut(|b| b.resume()) {
            Some(Ok(())) => {
                self.suspended.set(false);
                log::debug!("audio device resumed");
                true
            }
            Some(Err(e)) => {
                log::warn!("failed to resume audio device: {e}");
                false
            }
            None => false,
        }
    }

    pub fn suspend(&self) {
        if self.suspended.get() {
            return;
        }
        match self.with_backend_mut(|b| b.suspend()) {
            Some(Ok(())) => self.suspended.set(true),
            Some(Err(e)) => log::warn!("failed to suspend audio device: {e}"),
            None => {}
        }
    }

    /// Schedule a voice. Returns `None` when the device is unavailable,
    /// suspended, or its command queue is full.
    pub fn start_voice(&self, voice: Voice) -> Option<VoiceId> {
        if !self.ensure_device() {
            return None;
        }
        if self.suspended.get() {
            log::debug!("device suspended, voice dropped");
            return None;
        }
        let id = VoiceId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        match self.with_backend_mut(|b| b.send(AudioCommand::StartVoice(id, Box::new(voice))))? {
            Ok(()) => {
                self.active.borrow_mut().insert(id);
                Some(id)
            }
            Err(e) => {
                log::warn!("voice not scheduled: {e}");
                None
            }
        }
    }

    /// Disconnect one voice. It leaves the active set before this returns.
    pub fn stop_voice(&self, id: VoiceId) {
        if !self.active.borrow_mut().remove(&id) {
            return;
        }
        if let Some(Err(e)) = self.with_backend_mut(|b| b.send(AudioCommand::StopVoice(id))) {
            log::warn!("failed to stop {id}: {e}");
        }
    }

    /// Disconnect every voice.
    pub fn stop_all(&self) {
        self.active.borrow_mut().clear();
        if let Some(Err(e)) = self.with_backend_mut(|b| b.send(AudioCommand::StopAll)) {
            log::warn!("failed to stop voices: {e}");
        }
    }

    pub fn set_volume(&self, volume: f32) {
        if let Some(Err(e)) = self.with_backend_mut(|b| b.send(AudioCommand::SetVolume(volume))) {
            log::warn!("failed to set volume: {e}");
        }
    }

    /// Collect voices that ended on their own and drop them from the active set.
    pub fn poll_ended(&self) -> Vec<VoiceId> {
        let ended = self.with_backend_mut(|b| b.take_ended()).unwrap_or_default();
        let mut active = self.active.borrow_mut();
        for id in &ended {
            active.remove(id);
        }
        ended
    }

    pub fn is_active(&self, id: VoiceId) -> bool {
        self.active.borrow().contains(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.borrow().len()
    }

    /// Stop everything and release the device. Safe to call repeatedly.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), DeviceState::Closed);
        self.active.borrow_mut().clear();
        if let DeviceState::Ready(mut backend) = previous {
            let _ = backend.send(AudioCommand::StopAll);
            backend.close();
            log::info!("audio device closed");
        }
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}
