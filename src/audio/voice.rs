//! Voices: one scheduled sound source with its gain automation and pan.
//!
//! A [`Voice`] is a plain description built on the engine thread and moved to
//! the audio thread inside an [`AudioCommand`](super::AudioCommand). All
//! times are absolute device-clock seconds.

use std::f64::consts::FRAC_PI_4;
use std::fmt;
use std::sync::Arc;

use crate::instrument::oscillator::{advance_phase, below_nyquist, oscillator};
use crate::instrument::{GainAutomation, Waveform};

/// Identifier handed out by the audio context. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(pub u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// One sine-shaped (or waveform-shaped) component of a tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub frequency: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone)]
pub enum VoiceSource {
    /// Additive tone: every partial uses the same waveform.
    Tone {
        waveform: Waveform,
        partials: Vec<Partial>,
    },
    /// Rendered buffer played from `offset` seconds in.
    Buffer {
        samples: Arc<[f32]>,
        sample_rate: u32,
        offset: f64,
    },
}

#[derive(Debug, Clone)]
pub struct Voice {
    pub source: VoiceSource,
    pub gain: GainAutomation,
    /// Stereo position, -1 (left) to 1 (right).
    pub pan: f64,
    pub start: f64,
    pub stop: f64,
}

impl Voice {
    /// Single-partial tone sounding from `start` to `stop` at unity gain.
    pub fn tone(waveform: Waveform, frequency: f64, start: f64, stop: f64) -> Self {
        Self::partials(
            waveform,
            vec![Partial {
                frequency,
                amplitude: 1.0,
            }],
            start,
            stop,
        )
    }

    pub fn partials(waveform: Waveform, partials: Vec<Partial>, start: f64, stop: f64) -> Self {
        Self {
            source: VoiceSource::Tone { waveform, partials },
            gain: GainAutomation::constant(1.0, start),
            pan: 0.0,
            start,
            stop: stop.max(start),
        }
    }

    /// Buffer playback from `offset` seconds; stops when the buffer runs out.
    pub fn buffer(samples: Arc<[f32]>, sample_rate: u32, offset: f64, start: f64) -> Self {
        let total = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };
        let offset = offset.clamp(0.0, total);
        Self {
            source: VoiceSource::Buffer {
                samples,
                sample_rate,
                offset,
            },
            gain: GainAutomation::constant(1.0, start),
            pan: 0.0,
            start,
            stop: start + (total - offset),
        }
    }

    pub fn with_gain(mut self, gain: GainAutomation) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_pan(mut self, pan: f64) -> Self {
        self.pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
        self
    }

    pub fn with_stop(mut self, stop: f64) -> Self {
        self.stop = stop.max(self.start);
        self
    }

    /// Seconds between start and stop.
    pub fn length(&self) -> f64 {
        self.stop - self.start
    }
}

/// Equal-power gains `(left, right)` for `pan` in [-1, 1].
pub fn pan_gains(pan: f64) -> (f64, f64) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// A voice on the audio thread, with its running oscillator phases.
#[derive(Debug)]
pub(crate) struct VoiceState {
    pub(crate) id: VoiceId,
    voice: Box<Voice>,
    phases: Vec<f64>,
    left: f64,
    right: f64,
}

impl VoiceState {
    pub(crate) fn new(id: VoiceId, voice: Box<Voice>) -> Self {
        let phases = match &voice.source {
            VoiceSource::Tone { partials, .. } => vec![0.0; partials.len()],
            VoiceSource::Buffer { .. } => Vec::new(),
        };
        let (left, right) = pan_gains(voice.pan);
        Self {
            id,
            voice,
            phases,
            left,
            right,
        }
    }

    pub(crate) fn is_finished(&self, t: f64) -> bool {
        t >= self.voice.stop
    }

    /// Next mono sample at device time `t`, before panning.
    pub(crate) fn next_sample(&mut self, t: f64, sample_rate: f64) -> f64 {
        if t < self.voice.start || t >= self.voice.stop {
            return 0.0;
        }
        let raw = match &self.voice.source {
            VoiceSource::Tone { waveform, partials } => {
                let mut sum = 0.0;
                for (p, phase) in partials.iter().zip(self.phases.iter_mut()) {
                    if below_nyquist(p.frequency, sample_rate) {
                        sum += oscillator(*waveform, *phase) * p.amplitude;
                        *phase = advance_phase(*phase, p.frequency, sample_rate);
                    }
                }
                sum
            }
            VoiceSource::Buffer {
                samples,
                sample_rate: buffer_rate,
                offset,
            } => {
                let pos = (t - self.voice.start + offset) * *buffer_rate as f64;
                interpolate(samples, pos)
            }
        };
        let s = raw * self.voice.gain.value_at(t);
        if s.is_finite() {
            s
        } else {
            0.0
        }
    }

    pub(crate) fn pan(&self) -> (f64, f64) {
        (self.left, self.right)
    }
}

/// Linear interpolation at a fractional sample position. Out of range is silence.
fn interpolate(samples: &[f32], pos: f64) -> f64 {
    if pos < 0.0 {
        return 0.0;
    }
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    match (samples.get(idx), samples.get(idx + 1)) {
        (Some(&a), Some(&b)) => a as f64 + (b as f64 - a as f64) * frac,
        (Some(&a), None) => a as f64,
        _ => 0.0,
    }
}
