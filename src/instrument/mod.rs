//! Instruments: the static timbre catalog, envelopes, oscillators and brushes.
//!
//! Every profile is plain static data. Lookups never fail: unknown names
//! resolve to the piano profile.

pub mod brush;
pub mod envelope;
pub mod oscillator;

pub use brush::{BrushKind, BrushModifier};
pub use envelope::{Envelope, EnvelopeOverride, GainAutomation, GAIN_FLOOR};
pub use oscillator::Waveform;

use serde::{Deserialize, Serialize};

use crate::color::MappingStrategy;

/// Inclusive frequency bounds in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyRange {
    pub min: f64,
    pub max: f64,
}

impl FrequencyRange {
    /// The ends may come in either order; every method reads them sorted.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Same range with `min <= max`. A NaN end collapses onto the other one.
    pub fn ordered(&self) -> Self {
        Self {
            min: self.min.min(self.max),
            max: self.max.max(self.min),
        }
    }

    pub fn span(&self) -> f64 {
        let r = self.ordered();
        r.max - r.min
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// Linear interpolation, `t` in [0, 1].
    pub fn lerp(&self, t: f64) -> f64 {
        let r = self.ordered();
        r.min + t.clamp(0.0, 1.0) * r.span()
    }

    /// Never panics, even on a malformed range.
    pub fn clamp(&self, freq: f64) -> f64 {
        let r = self.ordered();
        freq.max(r.min).min(r.max)
    }

    pub fn contains(&self, freq: f64) -> bool {
        let r = self.ordered();
        (r.min..=r.max).contains(&freq)
    }
}

/// One partial of a harmonic stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    /// Multiple of the fundamental.
    pub ratio: f64,
    /// Amplitude relative to the fundamental.
    pub amplitude: f64,
}

const fn h(ratio: f64, amplitude: f64) -> Harmonic {
    Harmonic { ratio, amplitude }
}

/// Catalog identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum InstrumentId {
    #[default]
    Piano,
    Guitar,
    Violin,
    Trumpet,
    Drums,
    Synth,
    Sine,
    Triangle,
    Sawtooth,
    Square,
    Bell,
    Strings,
}

impl InstrumentId {
    pub const ALL: [InstrumentId; 12] = [
        InstrumentId::Piano,
        InstrumentId::Guitar,
        InstrumentId::Violin,
        InstrumentId::Trumpet,
        InstrumentId::Drums,
        InstrumentId::Synth,
        InstrumentId::Sine,
        InstrumentId::Triangle,
        InstrumentId::Sawtooth,
        InstrumentId::Square,
        InstrumentId::Bell,
        InstrumentId::Strings,
    ];

    /// Resolve an instrument by name. Unknown names resolve to piano.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "saw" => InstrumentId::Sawtooth,
            "tri" => InstrumentId::Triangle,
            "drum" => InstrumentId::Drums,
            "string" => InstrumentId::Strings,
            other => Self::ALL
                .into_iter()
                .find(|id| id.name() == other)
                .unwrap_or_default(),
        }
    }

    pub fn name(self) -> &'static str {
        self.profile().name
    }

    pub fn profile(self) -> &'static InstrumentProfile {
        profile(self)
    }
}

impl From<String> for InstrumentId {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl std::fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A static timbre description.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentProfile {
    pub id: InstrumentId,
    pub name: &'static str,
    pub waveform: Waveform,
    pub fundamental_range: FrequencyRange,
    /// Partials, fundamental first.
    pub harmonics: &'static [Harmonic],
    pub envelope: Envelope,
    pub mapping: MappingStrategy,
    /// Snap brightness-mapped pitches to the note table.
    pub quantize: bool,
}

static PROFILES: [InstrumentProfile; 12] = [
    InstrumentProfile {
        id: InstrumentId::Piano,
        name: "piano",
        waveform: Waveform::Sine,
        fundamental_range: FrequencyRange::new(27.5, 4186.01),
        harmonics: &[h(1.0, 1.0), h(2.0, 0.5), h(3.0, 0.25), h(4.0, 0.125)],
        envelope: Envelope::new(0.01, 0.3, 0.4, 0.8),
        mapping: MappingStrategy::BrightnessToPitch,
        quantize: true,
    },
    InstrumentProfile {
        id: InstrumentId::Guitar,
        name: "guitar",
        waveform: Waveform::Triangle,
        fundamental_range: FrequencyRange::new(82.41, 1318.51),
        harmonics: &[h(1.0, 1.0), h(2.0, 0.6), h(3.0, 0.3), h(4.0, 0.15)],
        envelope: Envelope::new(0.005, 0.2, 0.3, 0.5),
        mapping: MappingStrategy::BrightnessToPitch,
        quantize: true,
    },
    InstrumentProfile {
        id: InstrumentId::Violin,
        name: "violin",
        waveform: Waveform::Sawtooth,
        fundamental_range: FrequencyRange::new(196.0, 3520.0),
        harmonics: &[
            h(1.0, 1.0),
            h(2.0, 0.7),
            h(3.0, 0.5),
            h(4.0, 0.3),
            h(5.0, 0.2),
        ],
        envelope: Envelope::new(0.1, 0.1, 0.8, 0.3),
        mapping: MappingStrategy::HueToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Trumpet,
        name: "trumpet",
        waveform: Waveform::Square,
        fundamental_range: FrequencyRange::new(164.81, 1046.5),
        harmonics: &[h(1.0, 1.0), h(2.0, 0.8), h(3.0, 0.6), h(4.0, 0.4)],
        envelope: Envelope::new(0.05, 0.1, 0.7, 0.2),
        mapping: MappingStrategy::RgbToFrequency,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Drums,
        name: "drums",
        waveform: Waveform::Sine,
        fundamental_range: FrequencyRange::new(40.0, 400.0),
        harmonics: &[h(1.0, 1.0), h(1.5, 0.5), h(2.3, 0.3)],
        envelope: Envelope::new(0.001, 0.15, 0.0, 0.1),
        mapping: MappingStrategy::SaturationToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Synth,
        name: "synth",
        waveform: Waveform::Sawtooth,
        fundamental_range: FrequencyRange::new(55.0, 1760.0),
        harmonics: &[h(1.0, 1.0), h(2.0, 0.5), h(3.0, 0.33)],
        envelope: Envelope::new(0.02, 0.2, 0.6, 0.3),
        mapping: MappingStrategy::BrightnessToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Sine,
        name: "sine",
        waveform: Waveform::Sine,
        fundamental_range: FrequencyRange::new(110.0, 1760.0),
        harmonics: &[h(1.0, 1.0)],
        envelope: Envelope::new(0.02, 0.1, 0.8, 0.3),
        mapping: MappingStrategy::BrightnessToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Triangle,
        name: "triangle",
        waveform: Waveform::Triangle,
        fundamental_range: FrequencyRange::new(110.0, 1760.0),
        harmonics: &[h(1.0, 1.0), h(3.0, 0.11), h(5.0, 0.04)],
        envelope: Envelope::new(0.02, 0.1, 0.8, 0.3),
        mapping: MappingStrategy::BrightnessToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Sawtooth,
        name: "sawtooth",
        waveform: Waveform::Sawtooth,
        fundamental_range: FrequencyRange::new(110.0, 1760.0),
        harmonics: &[h(1.0, 1.0), h(2.0, 0.5), h(3.0, 0.33), h(4.0, 0.25)],
        envelope: Envelope::new(0.02, 0.1, 0.8, 0.3),
        mapping: MappingStrategy::BrightnessToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Square,
        name: "square",
        waveform: Waveform::Square,
        fundamental_range: FrequencyRange::new(110.0, 1760.0),
        harmonics: &[h(1.0, 1.0), h(3.0, 0.33), h(5.0, 0.2)],
        envelope: Envelope::new(0.02, 0.1, 0.8, 0.3),
        mapping: MappingStrategy::BrightnessToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Bell,
        name: "bell",
        waveform: Waveform::Sine,
        fundamental_range: FrequencyRange::new(261.63, 4186.01),
        harmonics: &[h(1.0, 1.0), h(2.76, 0.5), h(5.4, 0.25), h(8.93, 0.125)],
        envelope: Envelope::new(0.001, 0.8, 0.1, 1.5),
        mapping: MappingStrategy::HueToPitch,
        quantize: false,
    },
    InstrumentProfile {
        id: InstrumentId::Strings,
        name: "strings",
        waveform: Waveform::Sawtooth,
        fundamental_range: FrequencyRange::new(65.41, 2093.0),
        harmonics: &[h(1.0, 1.0), h(2.0, 0.5), h(3.0, 0.33), h(4.0, 0.25)],
        envelope: Envelope::new(0.3, 0.2, 0.8, 0.6),
        mapping: MappingStrategy::BrightnessToLoudness,
        quantize: false,
    },
];

/// Look up a catalog entry.
pub fn profile(id: InstrumentId) -> &'static InstrumentProfile {
    // PROFILES is laid out in the same order as the enum.
    &PROFILES[id as usize]
}

/// Resolve a profile by name, falling back to piano.
pub fn profile_by_name(name: &str) -> &'static InstrumentProfile {
    profile(InstrumentId::from_name(name))
}

/// Envelope for playing back a rendered buffer: the instrument's defaults
/// with the user's decay, sustain and release layered on top.
pub fn playback_envelope(id: InstrumentId, user: &EnvelopeOverride) -> Envelope {
    profile(id).envelope.with_override(&user.sanitized())
}
