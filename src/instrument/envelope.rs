//! ADSR envelopes and gain automation.
//!
//! An [`Envelope`] can be evaluated in closed form ([`Envelope::gain_at`]) or
//! scheduled onto a [`GainAutomation`] timeline expressed in absolute device
//! time ([`Envelope::schedule`]). Live oscillators and buffer playback both use
//! the scheduled form, so they share one set of semantics.

use serde::{Deserialize, Serialize};

/// Smallest target for exponential ramps. Ramping towards zero is undefined.
pub const GAIN_FLOOR: f64 = 0.0001;

/// Attack-Decay-Sustain-Release envelope.
///
/// All time values are in seconds. Sustain is a fraction of peak (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Envelope {
    pub const fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }

    /// Copy with every time ≥ 0 and sustain inside [0, 1].
    ///
    /// Negative or non-finite values become 0.
    pub fn sanitized(&self) -> Self {
        let non_negative = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self {
            attack: non_negative(self.attack),
            decay: non_negative(self.decay),
            sustain: non_negative(self.sustain).min(1.0),
            release: non_negative(self.release),
        }
    }

    /// Apply a user override on top of this envelope.
    pub fn with_override(&self, user: &EnvelopeOverride) -> Self {
        Self {
            attack: self.attack,
            decay: user.decay.unwrap_or(self.decay),
            sustain: user.sustain.unwrap_or(self.sustain),
            release: user.release.unwrap_or(self.release),
        }
        .sanitized()
    }

    /// Gain at time `t` (seconds from note start) for a note held until `hold`.
    ///
    /// - During `[0, attack)`: linear ramp from 0 to `peak`.
    /// - During `[attack, attack+decay)`: linear ramp from `peak` to sustain.
    /// - During `[attack+decay, hold)`: sustain level.
    /// - During `[hold, hold+release)`: linear ramp from sustain to 0.
    /// - After `hold+release`: 0.
    pub fn gain_at(&self, t: f64, hold: f64, peak: f64) -> f64 {
        let env = self.sanitized();
        let peak = peak.max(0.0);
        let sustain = peak * env.sustain;
        let hold = hold.max(env.attack + env.decay);

        if t < 0.0 {
            0.0
        } else if t < env.attack {
            peak * t / env.attack
        } else if t < env.attack + env.decay {
            let decay_t = (t - env.attack) / env.decay;
            peak - decay_t * (peak - sustain)
        } else if t < hold {
            sustain
        } else if t < hold + env.release {
            let release_t = (t - hold) / env.release;
            sustain * (1.0 - release_t)
        } else {
            0.0
        }
    }

    /// Length of attack + decay + release, i.e. a note with no sustain hold.
    pub fn span(&self) -> f64 {
        let env = self.sanitized();
        env.attack + env.decay + env.release
    }

    /// Schedule this envelope onto `gain`, starting at absolute time `start`.
    ///
    /// The note is held at the sustain level until `hold_until` (never before
    /// the decay completes), then released towards [`GAIN_FLOOR`]. Returns the
    /// absolute time at which the release finishes and gain returns to zero.
    pub fn schedule(&self, gain: &mut GainAutomation, start: f64, peak: f64, hold_until: f64) -> f64 {
        let env = self.sanitized();
        let peak = if peak.is_finite() { peak.max(0.0) } else { 0.0 };

        let attack_end = start + env.attack;
        let decay_end = attack_end + env.decay;
        let hold = hold_until.max(decay_end);
        let release_end = hold + env.release;
        let sustain_level = (peak * env.sustain).max(GAIN_FLOOR);

        gain.set_value_at(0.0, start);
        gain.linear_ramp_to(peak, attack_end);
        gain.exponential_ramp_to(sustain_level, decay_end);
        gain.set_value_at(sustain_level, hold);
        gain.exponential_ramp_to(GAIN_FLOOR, release_end);
        gain.set_value_at(0.0, release_end);

        release_end
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(0.01, 0.1, 0.7, 0.3)
    }
}

/// User-supplied ADSR values that take precedence over instrument defaults.
///
/// Attack is always taken from the instrument (or the brush, for live strokes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeOverride {
    #[serde(default)]
    pub decay: Option<f64>,
    #[serde(default)]
    pub sustain: Option<f64>,
    #[serde(default)]
    pub release: Option<f64>,
}

impl EnvelopeOverride {
    /// Drop values that would break the envelope invariants.
    pub fn sanitized(&self) -> Self {
        let time = |v: Option<f64>| v.filter(|v| v.is_finite() && *v >= 0.0);
        Self {
            decay: time(self.decay),
            sustain: self
                .sustain
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(0.0, 1.0)),
            release: time(self.release),
        }
    }
}

/// How a gain value is reached at an event's time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    /// Jump to the value at the event time.
    Set,
    /// Linear interpolation from the previous event.
    Linear,
    /// Exponential interpolation from the previous event.
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainEvent {
    pub time: f64,
    pub value: f64,
    pub ramp: Ramp,
}

/// A gain timeline in absolute seconds, evaluated sample by sample on the
/// audio thread.
///
/// Before the first event the gain is 0; after the last event it holds the
/// last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainAutomation {
    events: Vec<GainEvent>,
}

impl GainAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flat gain starting at `start`.
    pub fn constant(value: f64, start: f64) -> Self {
        let mut gain = Self::new();
        gain.set_value_at(value, start);
        gain
    }

    pub fn set_value_at(&mut self, value: f64, time: f64) {
        self.push(time, value, Ramp::Set);
    }

    pub fn linear_ramp_to(&mut self, value: f64, time: f64) {
        self.push(time, value, Ramp::Linear);
    }

    /// Exponential ramp; the target is floored at [`GAIN_FLOOR`].
    pub fn exponential_ramp_to(&mut self, value: f64, time: f64) {
        self.push(time, value.max(GAIN_FLOOR), Ramp::Exponential);
    }

    pub fn events(&self) -> &[GainEvent] {
        &self.events
    }

    /// Time of the last scheduled event.
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(|e| e.time)
    }

    /// Gain at absolute time `t`. Never negative.
    pub fn value_at(&self, t: f64) -> f64 {
        let mut prev: Option<&GainEvent> = None;
        for ev in &self.events {
            if ev.time <= t {
                prev = Some(ev);
                continue;
            }
            let Some(p) = prev else { return 0.0 };
            let frac = (t - p.time) / (ev.time - p.time);
            let value = match ev.ramp {
                Ramp::Set => p.value,
                Ramp::Linear => p.value + (ev.value - p.value) * frac,
                Ramp::Exponential => {
                    let v0 = p.value.max(GAIN_FLOOR);
                    let v1 = ev.value.max(GAIN_FLOOR);
                    v0 * (v1 / v0).powf(frac)
                }
            };
            return value.max(0.0);
        }
        prev.map_or(0.0, |p| p.value.max(0.0))
    }

    fn push(&mut self, time: f64, value: f64, ramp: Ramp) {
        if !time.is_finite() {
            return;
        }
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        let at = self.events.partition_point(|e| e.time <= time);
        self.events.insert(at, GainEvent { time, value, ramp });
    }
}
