//! Engine settings: instrument, mode, volume and envelope choices loaded from
//! ~/.synesthetica/settings.yaml.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::instrument::{EnvelopeOverride, InstrumentId};
use crate::mode::SonificationMode;

/// Lowest and highest accepted output sample rates.
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Target offline render duration per mode, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeDurations {
    pub simple: f64,
    pub timeline: f64,
    pub colorfield: f64,
    pub harmonic: f64,
}

impl ModeDurations {
    /// The configured duration for `mode`, clamped to its allowed range.
    pub fn for_mode(&self, mode: SonificationMode) -> f64 {
        let raw = match mode {
            SonificationMode::Simple => self.simple,
            SonificationMode::Timeline => self.timeline,
            SonificationMode::ColorField => self.colorfield,
            SonificationMode::Harmonic => self.harmonic,
        };
        mode.clamp_duration(raw)
    }

    pub fn set(&mut self, mode: SonificationMode, seconds: f64) {
        let seconds = mode.clamp_duration(seconds);
        match mode {
            SonificationMode::Simple => self.simple = seconds,
            SonificationMode::Timeline => self.timeline = seconds,
            SonificationMode::ColorField => self.colorfield = seconds,
            SonificationMode::Harmonic => self.harmonic = seconds,
        }
    }
}

impl Default for ModeDurations {
    fn default() -> Self {
        Self {
            simple: 60.0,
            timeline: 120.0,
            colorfield: 240.0,
            harmonic: 180.0,
        }
    }
}

/// Everything the settings toolbar hands to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub instrument: InstrumentId,
    pub mode: SonificationMode,
    /// Master volume in [0, 1].
    pub master_volume: f32,
    pub muted: bool,
    /// User ADSR values layered over instrument defaults.
    pub envelope: EnvelopeOverride,
    pub durations: ModeDurations,
    pub sample_rate: u32,
    /// Start the output device paused until the first play gesture.
    pub start_suspended: bool,
}

impl EngineSettings {
    /// Copy with every value forced into its valid range.
    pub fn validated(&self) -> Self {
        let mut durations = self.durations;
        for mode in SonificationMode::ALL {
            durations.set(mode, durations.for_mode(mode));
        }
        Self {
            instrument: self.instrument,
            mode: self.mode,
            master_volume: sanitize_volume(self.master_volume),
            muted: self.muted,
            envelope: self.envelope.sanitized(),
            durations,
            sample_rate: self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE),
            start_suspended: self.start_suspended,
        }
    }

    /// Gain actually applied to output: 0 when muted.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            sanitize_volume(self.master_volume)
        }
    }

    /// Render duration for the current mode.
    pub fn duration(&self) -> f64 {
        self.durations.for_mode(self.mode)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            instrument: InstrumentId::Piano,
            mode: SonificationMode::Simple,
            master_volume: 0.8,
            muted: false,
            envelope: EnvelopeOverride::default(),
            durations: ModeDurations::default(),
            sample_rate: 44_100,
            start_suspended: false,
        }
    }
}

/// Default path for the settings file.
pub fn default_settings_path() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".synesthetica");
    path.push("settings.yaml");
    path
}

/// Clamp a gain into [0, 1]; anything non-finite mutes.
pub(crate) fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Load settings from a YAML file. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<EngineSettings, ConfigError> {
    if !path.exists() {
        log::debug!("no settings at {}, using defaults", path.display());
        return Ok(EngineSettings::default());
    }
    let content = std::fs::read_to_string(path)?;
    let settings: EngineSettings = serde_yaml::from_str(&content)?;
    Ok(settings.validated())
}

/// Save settings to a YAML file, creating parent directories as needed.
pub fn save_settings(path: &Path, settings: &EngineSettings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let settings = EngineSettings::default();
        assert_eq!(settings, settings.validated());
        assert_eq!(settings.duration(), 60.0);
    }

    #[test]
    fn validated_clamps_everything() {
        let settings = EngineSettings {
            master_volume: 3.0,
            sample_rate: 10,
            durations: ModeDurations {
                simple: 1.0,
                timeline: 1000.0,
                colorfield: 200.0,
                harmonic: -5.0,
            },
            ..EngineSettings::default()
        }
        .validated();
        assert_eq!(settings.master_volume, 1.0);
        assert_eq!(settings.sample_rate, MIN_SAMPLE_RATE);
        assert_eq!(settings.durations.simple, 30.0);
        assert_eq!(settings.durations.timeline, 300.0);
        assert_eq!(settings.durations.colorfield, 200.0);
        assert_eq!(settings.durations.harmonic, 90.0);
    }

    #[test]
    fn non_finite_volume_mutes() {
        for volume in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let settings = EngineSettings {
                master_volume: volume,
                ..EngineSettings::default()
            };
            assert_eq!(settings.validated().master_volume, 0.0, "{volume}");
            assert_eq!(settings.effective_volume(), 0.0, "{volume}");
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "master_volume: .nan\n").unwrap();
        assert_eq!(load_settings(&path).unwrap().master_volume, 0.0);
    }

    #[test]
    fn muted_means_silent() {
        let settings = EngineSettings {
            muted: true,
            ..EngineSettings::default()
        };
        assert_eq!(settings.effective_volume(), 0.0);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "instrument: violin\nmode: timeline\nenvelope:\n  release: 1.5\n";
        let settings: EngineSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.instrument, InstrumentId::Violin);
        assert_eq!(settings.mode, SonificationMode::Timeline);
        assert_eq!(settings.envelope.release, Some(1.5));
        assert_eq!(settings.envelope.decay, None);
        assert_eq!(settings.sample_rate, 44_100);
    }

    #[test]
    fn unknown_names_fall_back() {
        let yaml = "instrument: didgeridoo\nmode: spiral\n";
        let settings: EngineSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.instrument, InstrumentId::Piano);
        assert_eq!(settings.mode, SonificationMode::Simple);
    }

    #[test]
    fn load_nonexistent_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("missing.yaml")).unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut settings = EngineSettings {
            instrument: InstrumentId::Bell,
            mode: SonificationMode::Harmonic,
            master_volume: 0.5,
            ..EngineSettings::default()
        };
        settings.durations.set(SonificationMode::Harmonic, 120.0);

        save_settings(file.path(), &settings).unwrap();
        let loaded = load_settings(file.path()).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.duration(), 120.0);
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");
        save_settings(&path, &EngineSettings::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "master_volume: [not, a, number]").unwrap();
        assert!(matches!(load_settings(file.path()), Err(ConfigError::Yaml(_))));
    }
}
