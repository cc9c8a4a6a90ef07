//! Playback controller: plays a rendered buffer on the shared device with
//! an ADSR gain envelope, and tracks its position.

use std::rc::Rc;

use crate::audio::{AudioContext, Voice, VoiceId};
use crate::instrument::{Envelope, GainAutomation};
use crate::render::AudioBuffer;

/// The one buffer voice currently sounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSession {
    pub voice: VoiceId,
    /// Device time at which the voice started.
    pub started_at: f64,
    /// Buffer position (seconds) the voice started from.
    pub offset: f64,
    /// Full buffer duration in seconds.
    pub duration: f64,
}

impl PlaybackSession {
    /// Buffer position at device time `now`.
    pub fn position_at(&self, now: f64) -> f64 {
        (self.offset + (now - self.started_at)).clamp(0.0, self.duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    /// Seconds into the buffer.
    pub current_time: f64,
    pub duration: f64,
}

struct Loaded {
    buffer: AudioBuffer,
    envelope: Envelope,
}

/// Transport for one rendered take: play, pause, seek and stop on a shared context.
pub struct PlaybackController {
    context: Rc<AudioContext>,
    loaded: Option<Loaded>,
    session: Option<PlaybackSession>,
    /// Position while not playing.
    position: f64,
    volume: f32,
    muted: bool,
}

impl PlaybackController {
    pub fn new(context: Rc<AudioContext>) -> Self {
        Self {
            context,
            loaded: None,
            session: None,
            position: 0.0,
            volume: 1.0,
            muted: false,
        }
    }

    /// Play `buffer` from the start, replacing whatever was playing.
    ///
    /// Counts as a user gesture: a suspended device is resumed first.
    pub fn play(&mut self, buffer: AudioBuffer, envelope: Envelope) -> Option<VoiceId> {
        self.stop();
        self.loaded = Some(Loaded {
            buffer,
            envelope: envelope.sanitized(),
        });
        self.position = 0.0;
        self.context.resume();
        self.apply_volume();
        self.start_at(0.0)
    }

    /// Resume the loaded buffer from the current position.
    pub fn resume(&mut self) -> Option<VoiceId> {
        if self.session.is_some() {
            return self.session.map(|s| s.voice);
        }
        let duration = self.duration();
        let from = if self.position >= duration { 0.0 } else { self.position };
        self.context.resume();
        self.start_at(from)
    }

    fn start_at(&mut self, offset: f64) -> Option<VoiceId> {
        let loaded = self.loaded.as_ref()?;
        let duration = loaded.buffer.duration();
        let now = self.context.current_time();

        let voice = Voice::buffer(
            loaded.buffer.shared_samples(),
            loaded.buffer.sample_rate(),
            offset,
            now,
        );
        let mut gain = GainAutomation::new();
        let release_from = (voice.stop - loaded.envelope.release).max(now);
        loaded.envelope.schedule(&mut gain, now, 1.0, release_from);

        let id = self.context.start_voice(voice.with_gain(gain))?;
        log::debug!("playback started at {offset:.2}s of {duration:.2}s");
        self.session = Some(PlaybackSession {
            voice: id,
            started_at: now,
            offset: offset.clamp(0.0, duration),
            duration,
        });
        Some(id)
    }

    /// Stop playback and rewind. The voice is disconnected before this returns.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            self.context.stop_voice(session.voice);
            log::debug!("playback stopped");
        }
        self.position = 0.0;
    }

    /// Move to `seconds` into the buffer; restarts the voice when playing.
    pub fn seek(&mut self, seconds: f64) {
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, self.duration())
        } else {
            0.0
        };
        match self.session.take() {
            Some(session) => {
                self.context.stop_voice(session.voice);
                self.position = target;
                self.start_at(target);
            }
            None => self.position = target,
        }
    }

    /// Poll the device. Detects the end of playback and returns the status.
    pub fn tick(&mut self) -> PlaybackStatus {
        self.context.poll_ended();
        if let Some(session) = self.session {
            let now = self.context.current_time();
            let ended = !self.context.is_active(session.voice)
                || now - session.started_at >= session.duration - session.offset;
            if ended {
                self.context.stop_voice(session.voice);
                self.session = None;
                self.position = session.duration;
                log::debug!("playback finished");
            }
        }
        self.status()
    }

    pub fn status(&self) -> PlaybackStatus {
        let current_time = match &self.session {
            Some(s) => s.position_at(self.context.current_time()),
            None => self.position,
        };
        PlaybackStatus {
            is_playing: self.session.is_some(),
            current_time,
            duration: self.duration(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn buffer(&self) -> Option<&AudioBuffer> {
        self.loaded.as_ref().map(|l| &l.buffer)
    }

    pub fn duration(&self) -> f64 {
        self.loaded.as_ref().map_or(0.0, |l| l.buffer.duration())
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.apply_volume();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn apply_volume(&self) {
        let effective = if self.muted { 0.0 } else { self.volume };
        self.context.set_volume(effective);
    }
}
