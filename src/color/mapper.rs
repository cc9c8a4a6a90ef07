//! Color → frequency mapping strategies.
//!
//! Every function here is pure: the same color and range always produce the
//! same tone. Frequencies are clamped to [`MIN_FREQUENCY`, `MAX_FREQUENCY`]
//! regardless of strategy.

use serde::{Deserialize, Serialize};

use super::notes::{nearest_index, Note, C1_INDEX, NOTE_TABLE};
use super::ColorSample;
use crate::instrument::{FrequencyRange, InstrumentProfile};

/// Outer safety bounds for any mapped frequency, in Hz.
pub const MIN_FREQUENCY: f64 = 20.0;
pub const MAX_FREQUENCY: f64 = 5000.0;

/// How a color becomes a pitch (and sometimes a loudness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    BrightnessToPitch,
    HueToPitch,
    SaturationToPitch,
    RgbToFrequency,
    BrightnessToLoudness,
}

/// Result of mapping one color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapping {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Relative amplitude in [0, 1].
    pub amplitude: f64,
}

/// Map a color with the profile's own strategy and range.
pub fn map_color(color: &ColorSample, profile: &InstrumentProfile) -> ToneMapping {
    map_color_in_range(
        color,
        profile.fundamental_range,
        profile.mapping,
        profile.quantize,
    )
}

/// Frequency only, using the profile's strategy.
pub fn frequency(color: &ColorSample, profile: &InstrumentProfile) -> f64 {
    map_color(color, profile).frequency
}

/// Map a color into an explicit Hz range.
///
/// `quantize` only affects [`MappingStrategy::BrightnessToPitch`]; hue mapping
/// always lands on a table note. An inverted range is read with its ends swapped.
pub fn map_color_in_range(
    color: &ColorSample,
    range: FrequencyRange,
    strategy: MappingStrategy,
    quantize: bool,
) -> ToneMapping {
    let range = range.ordered();
    let (frequency, amplitude) = match strategy {
        MappingStrategy::BrightnessToPitch => {
            let f = brightness_to_frequency(color.luma_unit(), range);
            let f = if quantize {
                quantize_to_nearest_note(f)
            } else {
                f
            };
            (f, 1.0)
        }
        MappingStrategy::HueToPitch => (hue_to_pitch(color, range), 1.0),
        MappingStrategy::SaturationToPitch => (range.clamp(saturation_tier(color)), 1.0),
        MappingStrategy::RgbToFrequency => {
            let r = color.r as f64 / 255.0 * 1000.0;
            let g = color.g as f64 / 255.0 * 2000.0;
            let b = color.b as f64 / 255.0 * 4000.0;
            (range.clamp((r + g + b) / 3.0), 1.0)
        }
        MappingStrategy::BrightnessToLoudness => {
            let luma = color.luma_unit();
            let drift = (luma - 0.5) * 0.1 * range.span();
            (range.clamp(range.midpoint() + drift), 0.2 + 0.8 * luma)
        }
    };

    ToneMapping {
        frequency: clamp_audible(frequency),
        amplitude,
    }
}

/// Linear brightness → pitch across `range`, for a luma already in [0, 1].
///
/// The offline renderer works on averaged (fractional) luma, so it maps
/// through here instead of building a [`ColorSample`].
pub fn brightness_to_frequency(luma_unit: f64, range: FrequencyRange) -> f64 {
    clamp_audible(range.lerp(luma_unit))
}

/// Clamp to the outer [20, 5000] Hz bound. Non-finite input maps to the floor.
pub fn clamp_audible(freq: f64) -> f64 {
    if freq.is_finite() {
        freq.clamp(MIN_FREQUENCY, MAX_FREQUENCY)
    } else {
        MIN_FREQUENCY
    }
}

/// The table note closest to `freq` by absolute Hz distance.
pub fn nearest_note(freq: f64) -> Note {
    let idx = nearest_index(freq, 0..=NOTE_TABLE.len() - 1);
    Note {
        index: idx,
        name: NOTE_TABLE[idx].0,
        frequency: NOTE_TABLE[idx].1,
    }
}

/// Snap `freq` to the nearest 88-key note.
///
/// Distance is measured in Hz, not cents, so notes in higher octaves win
/// more often than they would on a log scale.
pub fn quantize_to_nearest_note(freq: f64) -> f64 {
    nearest_note(freq).frequency
}

/// Snap `freq` to the nearest note lying inside `range`.
///
/// Falls back to the whole table when the range contains no note.
pub fn quantize_in_range(freq: f64, range: FrequencyRange) -> f64 {
    let first = NOTE_TABLE.iter().position(|&(_, f)| f >= range.min);
    let last = NOTE_TABLE.iter().rposition(|&(_, f)| f <= range.max);
    match (first, last) {
        (Some(lo), Some(hi)) if lo <= hi => NOTE_TABLE[nearest_index(freq, lo..=hi)].1,
        _ => quantize_to_nearest_note(freq),
    }
}

/// Hue picks one of 12 chromatic steps; the octave grows with hue too.
fn hue_to_pitch(color: &ColorSample, range: FrequencyRange) -> f64 {
    let (hue, _, _) = color.to_hsl();
    let step = ((hue / 360.0 * 12.0).floor() as usize).min(11);
    let octave = ((hue / 360.0 * 7.0).floor() as usize + 1).min(7);
    let mut idx = C1_INDEX + 12 * (octave - 1) + step;

    while NOTE_TABLE[idx].1 < range.min && idx + 12 < NOTE_TABLE.len() {
        idx += 12;
    }
    while NOTE_TABLE[idx].1 > range.max && idx >= 12 {
        idx -= 12;
    }

    let f = NOTE_TABLE[idx].1;
    if range.contains(f) {
        f
    } else {
        quantize_in_range(f, range)
    }
}

/// Saturation buckets into five fixed tiers.
fn saturation_tier(color: &ColorSample) -> f64 {
    let (_, saturation, _) = color.to_hsl();
    match saturation * 100.0 {
        s if s < 20.0 => 60.0,
        s if s < 40.0 => 200.0,
        s if s < 60.0 => 800.0,
        s if s < 80.0 => 1200.0,
        _ => 2000.0,
    }
}
