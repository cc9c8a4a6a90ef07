//! Real-time tone trigger: one short tone per accepted stroke point.
//!
//! Stroke points arrive far faster than tones are useful, so a
//! [`RateLimiter`] drops everything closer than 50 ms to the last accepted
//! point. Every other failure mode (muted, zero volume, no device, suspended
//! device) is a silent no-op.

pub mod throttle;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioContext, Partial, Voice, VoiceId};
use crate::color::{clamp_audible, map_color, ColorSample};
use crate::config::EngineSettings;
use crate::instrument::{BrushKind, Envelope, GainAutomation, InstrumentProfile};
use crate::mode::SonificationMode;

pub use throttle::{Clock, ManualClock, RateLimiter, SystemClock, DEFAULT_INTERVAL};

/// Base pitch for vertical position in timeline mode (bottom edge).
pub const TIMELINE_BASE_HZ: f64 = 220.0;
/// Octaves spanned from the bottom edge to the top edge in timeline mode.
pub const TIMELINE_OCTAVES: f64 = 3.0;
/// Peak gain of a stroke tone before brush and color scaling.
const STROKE_PEAK: f64 = 0.3;

/// One sampled point of a brush stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePointEvent {
    pub x: f64,
    pub y: f64,
    #[serde(with = "color_hex")]
    pub color: ColorSample,
    #[serde(default)]
    pub brush: BrushKind,
    pub timestamp_ms: u64,
}

/// Drawing-surface dimensions in the same units as stroke coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// `v / extent` clamped to [0, 1]; 0.5 for a degenerate extent.
    fn fraction(v: f64, extent: f64) -> f64 {
        if extent > 0.0 && v.is_finite() {
            (v / extent).clamp(0.0, 1.0)
        } else {
            0.5
        }
    }
}

/// Turns rate-limited stroke points into short tones on the audio context.
pub struct ToneTrigger<C: Clock = SystemClock> {
    context: Rc<AudioContext>,
    limiter: RateLimiter<C>,
}

impl ToneTrigger<SystemClock> {
    pub fn new(context: Rc<AudioContext>) -> Self {
        Self::with_clock(context, SystemClock::new())
    }
}

impl<C: Clock> ToneTrigger<C> {
    pub fn with_clock(context: Rc<AudioContext>, clock: C) -> Self {
        Self {
            context,
            limiter: RateLimiter::with_default_interval(clock),
        }
    }

    /// Turn a stroke point into a tone, if it passes the rate limit.
    pub fn handle(
        &mut self,
        event: &StrokePointEvent,
        canvas: CanvasSize,
        settings: &EngineSettings,
    ) -> Option<VoiceId> {
        if settings.effective_volume() <= 0.0 {
            log::debug!("stroke ignored: muted");
            return None;
        }
        if !self.context.is_available() || self.context.is_suspended() {
            log::debug!("stroke ignored: no running output device");
            return None;
        }
        self.context.poll_ended();
        if !self.limiter.try_acquire() {
            log::debug!("stroke at {}ms dropped by rate limit", event.timestamp_ms);
            return None;
        }

        let start = self.context.current_time();
        let voice = stroke_voice(event, canvas, settings, start);
        self.context.start_voice(voice)
    }

    pub fn limiter(&self) -> &RateLimiter<C> {
        &self.limiter
    }
}

/// Pitch of a stroke point under the current settings.
pub fn stroke_frequency(event: &StrokePointEvent, canvas: CanvasSize, settings: &EngineSettings) -> f64 {
    match settings.mode {
        SonificationMode::Timeline => {
            let rise = 1.0 - CanvasSize::fraction(event.y, canvas.height);
            clamp_audible(TIMELINE_BASE_HZ * 2f64.powf(TIMELINE_OCTAVES * rise))
        }
        _ => map_color(&event.color, settings.instrument.profile()).frequency,
    }
}

/// The envelope a stroke tone plays with: brush attack, instrument decay and
/// release (user values win), no sustain hold.
pub fn stroke_envelope(brush: BrushKind, settings: &EngineSettings) -> Envelope {
    let base = settings
        .instrument
        .profile()
        .envelope
        .with_override(&settings.envelope);
    Envelope {
        attack: brush.modifier().attack,
        ..base
    }
    .sanitized()
}

/// Build the voice for an accepted stroke point starting at device time `start`.
pub fn stroke_voice(
    event: &StrokePointEvent,
    canvas: CanvasSize,
    settings: &EngineSettings,
    start: f64,
) -> Voice {
    let profile = settings.instrument.profile();
    let modifier = event.brush.modifier();
    let frequency = stroke_frequency(event, canvas, settings);
    let loudness = map_color(&event.color, profile).amplitude;
    let peak = (STROKE_PEAK * loudness * modifier.brightness).clamp(0.0, 1.0);

    let envelope = stroke_envelope(event.brush, settings);
    let mut gain = GainAutomation::new();
    let end = envelope.schedule(&mut gain, start, peak, start + envelope.attack + envelope.decay);

    let pan = match settings.mode {
        SonificationMode::Timeline => CanvasSize::fraction(event.x, canvas.width) * 2.0 - 1.0,
        _ => 0.0,
    };

    Voice::partials(profile.waveform, stroke_partials(profile, frequency, modifier.harmonic), start, end)
        .with_gain(gain)
        .with_pan(pan)
}

/// The instrument's harmonic stack on `frequency`, overtones scaled by
/// `harmonic`, normalized to unit total amplitude.
fn stroke_partials(profile: &InstrumentProfile, frequency: f64, harmonic: f64) -> Vec<Partial> {
    let weights: Vec<f64> = profile
        .harmonics
        .iter()
        .enumerate()
        .map(|(i, h)| if i == 0 { h.amplitude } else { h.amplitude * harmonic })
        .collect();
    let total: f64 = weights.iter().sum::<f64>().max(f64::EPSILON);
    profile
        .harmonics
        .iter()
        .zip(weights)
        .map(|(h, w)| Partial {
            frequency: frequency * h.ratio,
            amplitude: w / total,
        })
        .collect()
}

/// `#rrggbb` (or `#rrggbbaa`) strings for stroke colors in serialized events.
mod color_hex {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::color::ColorSample;

    pub fn serialize<S: Serializer>(c: &ColorSample, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("#{:02x}{:02x}{:02x}{:02x}", c.r, c.g, c.b, c.a))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ColorSample, D::Error> {
        let s = String::deserialize(d)?;
        parse(&s).ok_or_else(|| de::Error::custom(format!("invalid color '{s}'")))
    }

    pub fn parse(s: &str) -> Option<ColorSample> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(ColorSample::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(ColorSample::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

pub use color_hex::parse as parse_hex_color;
