//! Offline output device: a manually clocked backend with no audio hardware.
//!
//! Commands apply synchronously and time only moves when [`OfflineDevice::advance`]
//! is called, so live-voice behavior can be checked frame by frame. Clones
//! share the same device, which lets a caller keep a handle after giving one
//! to an [`AudioContext`](super::AudioContext).

use std::cell::RefCell;
use std::rc::Rc;

use super::command::AudioCommand;
use super::context::{BackendFactory, OutputBackend};
use super::mixer::VoiceMixer;
use super::voice::VoiceId;
use super::AudioError;

struct OfflineState {
    mixer: VoiceMixer,
    suspended: bool,
    closed: bool,
}

#[derive(Clone)]
pub struct OfflineDevice {
    inner: Rc<RefCell<OfflineState>>,
}

impl OfflineDevice {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            inner: Rc::new(RefCell::new(OfflineState {
                mixer: VoiceMixer::new(sample_rate, channels),
                suspended: false,
                closed: false,
            })),
        }
    }

    /// A factory handing out this device, for [`AudioContext::new`](super::AudioContext::new).
    pub fn into_factory(self) -> BackendFactory {
        Box::new(move || -> Result<Box<dyn OutputBackend>, AudioError> { Ok(Box::new(self)) })
    }

    /// Render `frames` frames and return them interleaved.
    ///
    /// A suspended or closed device renders nothing and its clock stays put.
    pub fn advance(&self, frames: usize) -> Vec<f32> {
        let mut state = self.inner.borrow_mut();
        if state.suspended || state.closed {
            return Vec::new();
        }
        let channels = state.mixer.channels() as usize;
        let mut out = vec![0.0; frames * channels];
        state.mixer.render(&mut out);
        out
    }

    /// Render whole seconds of audio.
    pub fn advance_seconds(&self, seconds: f64) -> Vec<f32> {
        let frames = (seconds.max(0.0) * self.sample_rate() as f64).round() as usize;
        self.advance(frames)
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.borrow().mixer.sample_rate()
    }

    pub fn current_time(&self) -> f64 {
        self.inner.borrow().mixer.current_time()
    }

    pub fn active_voices(&self) -> usize {
        self.inner.borrow().mixer.active_voices()
    }

    pub fn volume(&self) -> f32 {
        self.inner.borrow().mixer.volume()
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.borrow().suspended
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }
}

impl OutputBackend for OfflineDevice {
    fn sample_rate(&self) -> u32 {
        OfflineDevice::sample_rate(self)
    }

    fn current_time(&self) -> f64 {
        OfflineDevice::current_time(self)
    }

    fn send(&mut self, cmd: AudioCommand) -> Result<(), AudioError> {
        let mut state = self.inner.borrow_mut();
        if state.closed {
            return Err(AudioError::Closed);
        }
        state.mixer.apply(cmd);
        Ok(())
    }

    fn take_ended(&mut self) -> Vec<VoiceId> {
        self.inner.borrow_mut().mixer.drain_ended().collect()
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.inner.borrow_mut().suspended = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.inner.borrow_mut().suspended = false;
        Ok(())
    }

    fn close(&mut self) {
        self.inner.borrow_mut().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::Voice;
    use crate::instrument::Waveform;

    #[test]
    fn advance_moves_clock() {
        let device = OfflineDevice::new(100, 2);
        let out = device.advance(50);
        assert_eq!(out.len(), 100);
        assert!((device.current_time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn suspended_device_is_frozen() {
        let mut device = OfflineDevice::new(100, 2);
        device.suspend().unwrap();
        assert!(device.advance(50).is_empty());
        assert_eq!(device.current_time(), 0.0);
        device.resume().unwrap();
        assert_eq!(device.advance(50).len(), 100);
    }

    #[test]
    fn closed_device_rejects_commands() {
        let mut device = OfflineDevice::new(100, 1);
        device.close();
        device.close();
        assert!(matches!(
            device.send(AudioCommand::StopAll),
            Err(AudioError::Closed)
        ));
    }

    #[test]
    fn clones_share_state() {
        let device = OfflineDevice::new(100, 1);
        let mut handle = device.clone();
        handle
            .send(AudioCommand::StartVoice(
                VoiceId(1),
                Box::new(Voice::tone(Waveform::Sine, 5.0, 0.0, 0.1)),
            ))
            .unwrap();
        assert_eq!(device.active_voices(), 1);
        device.advance_seconds(0.2);
        assert_eq!(handle.take_ended(), vec![VoiceId(1)]);
    }
}
