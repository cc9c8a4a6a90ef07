//! Voice mixer: sums scheduled voices into interleaved output frames.
//!
//! Shared by the cpal callback and the offline device, so both backends
//! produce identical audio for identical command streams.

use super::command::AudioCommand;
use super::voice::{VoiceId, VoiceState};

/// Hard ceiling applied after master volume.
pub const LIMITER_CEILING: f32 = 0.95;

/// Room reserved up front so scheduling rarely allocates on the audio thread.
const VOICE_CAPACITY: usize = 256;

pub struct VoiceMixer {
    sample_rate: u32,
    channels: u16,
    frames: u64,
    volume: f32,
    voices: Vec<VoiceState>,
    ended: Vec<VoiceId>,
}

impl VoiceMixer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            frames: 0,
            volume: 1.0,
            voices: Vec::with_capacity(VOICE_CAPACITY),
            ended: Vec::with_capacity(VOICE_CAPACITY),
        }
    }

    pub fn apply(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::StartVoice(id, voice) => {
                self.voices.push(VoiceState::new(id, voice));
            }
            AudioCommand::StopVoice(id) => {
                let before = self.voices.len();
                self.voices.retain(|v| v.id != id);
                if self.voices.len() != before {
                    self.ended.push(id);
                }
            }
            AudioCommand::StopAll => {
                self.ended.extend(self.voices.drain(..).map(|v| v.id));
            }
            AudioCommand::SetVolume(v) => {
                self.volume = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
            }
        }
    }

    /// Fill `output` (interleaved, `channels` samples per frame) and advance the clock.
    ///
    /// Voices whose stop time has passed are removed and reported through
    /// [`drain_ended`](Self::drain_ended).
    pub fn render(&mut self, output: &mut [f32]) {
        let channels = self.channels as usize;
        let sr = self.sample_rate as f64;

        for frame in output.chunks_mut(channels) {
            let t = self.frames as f64 / sr;
            let mut left = 0.0;
            let mut right = 0.0;
            for voice in &mut self.voices {
                let s = voice.next_sample(t, sr);
                let (l, r) = voice.pan();
                left += s * l;
                right += s * r;
            }

            let volume = self.volume as f64;
            let left = limit((left * volume) as f32);
            let right = limit((right * volume) as f32);
            match frame {
                [mono] => *mono = limit((left + right) * std::f32::consts::FRAC_1_SQRT_2),
                [l, r, rest @ ..] => {
                    *l = left;
                    *r = right;
                    rest.fill(0.0);
                }
                [] => {}
            }
            self.frames += 1;
        }

        let now = self.current_time();
        let ended = &mut self.ended;
        self.voices.retain(|v| {
            if v.is_finished(now) {
                ended.push(v.id);
                false
            } else {
                true
            }
        });
    }

    /// Ids of voices removed since the last drain.
    pub fn drain_ended(&mut self) -> std::vec::Drain<'_, VoiceId> {
        self.ended.drain(..)
    }

    /// Ended ids not yet handed off, oldest first.
    pub fn pending_ended(&self) -> &[VoiceId] {
        &self.ended
    }

    /// Forget the oldest `count` ended ids once they have been delivered.
    pub fn acknowledge_ended(&mut self, count: usize) {
        let count = count.min(self.ended.len());
        self.ended.drain(..count);
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Device clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }
}

#[inline]
fn limit(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-LIMITER_CEILING, LIMITER_CEILING)
    } else {
        0.0
    }
}
