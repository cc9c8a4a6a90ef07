//! Sonification modes: select both the live pitch formula and the offline
//! render algorithm.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SonificationMode {
    #[default]
    Simple,
    Timeline,
    ColorField,
    Harmonic,
}

impl SonificationMode {
    pub const ALL: [SonificationMode; 4] = [
        SonificationMode::Simple,
        SonificationMode::Timeline,
        SonificationMode::ColorField,
        SonificationMode::Harmonic,
    ];

    /// Resolve a mode by name. Unknown names fall back to `Simple`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            SonificationMode::Simple => "simple",
            SonificationMode::Timeline => "timeline",
            SonificationMode::ColorField => "colorfield",
            SonificationMode::Harmonic => "harmonic",
        }
    }

    /// Allowed offline render durations in seconds.
    pub fn duration_range(self) -> RangeInclusive<f64> {
        match self {
            SonificationMode::Simple => 30.0..=120.0,
            SonificationMode::Timeline => 60.0..=300.0,
            SonificationMode::ColorField => 120.0..=480.0,
            SonificationMode::Harmonic => 90.0..=360.0,
        }
    }

    /// Clamp a requested duration into this mode's allowed range.
    pub fn clamp_duration(self, seconds: f64) -> f64 {
        let range = self.duration_range();
        if seconds.is_finite() {
            seconds.clamp(*range.start(), *range.end())
        } else {
            *range.start()
        }
    }
}

impl From<String> for SonificationMode {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl std::fmt::Display for SonificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for mode in SonificationMode::ALL {
            assert_eq!(SonificationMode::from_name(mode.name()), mode);
        }
        assert_eq!(SonificationMode::from_name("color-field"), SonificationMode::ColorField);
        assert_eq!(SonificationMode::from_name("nope"), SonificationMode::Simple);
    }

    #[test]
    fn duration_ranges() {
        assert_eq!(SonificationMode::Simple.duration_range(), 30.0..=120.0);
        assert_eq!(SonificationMode::Timeline.duration_range(), 60.0..=300.0);
        assert_eq!(SonificationMode::ColorField.duration_range(), 120.0..=480.0);
        assert_eq!(SonificationMode::Harmonic.duration_range(), 90.0..=360.0);
    }

    #[test]
    fn clamp_duration_bounds() {
        assert_eq!(SonificationMode::Simple.clamp_duration(10.0), 30.0);
        assert_eq!(SonificationMode::Simple.clamp_duration(500.0), 120.0);
        assert_eq!(SonificationMode::Harmonic.clamp_duration(100.0), 100.0);
        assert_eq!(SonificationMode::Timeline.clamp_duration(f64::NAN), 60.0);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let yaml = serde_yaml::to_string(&SonificationMode::ColorField).unwrap();
        assert_eq!(yaml.trim(), "colorfield");
        let mode: SonificationMode = serde_yaml::from_str("harmonic").unwrap();
        assert_eq!(mode, SonificationMode::Harmonic);
    }
}
