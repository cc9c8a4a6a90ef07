//! Brush-kind modifiers applied to live stroke tones.

use serde::{Deserialize, Serialize};

/// The ten drawing brushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BrushKind {
    #[default]
    Round,
    Square,
    Sawtooth,
    Spray,
    Calligraphy,
    Marker,
    Pencil,
    Watercolor,
    Charcoal,
    Glow,
}

/// How a brush colors the tone it triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushModifier {
    /// Scales the weight of every overtone above the fundamental.
    pub harmonic: f64,
    /// Scales the peak gain.
    pub brightness: f64,
    /// Attack time in seconds; replaces the instrument's attack.
    pub attack: f64,
}

impl BrushKind {
    pub const ALL: [BrushKind; 10] = [
        BrushKind::Round,
        BrushKind::Square,
        BrushKind::Sawtooth,
        BrushKind::Spray,
        BrushKind::Calligraphy,
        BrushKind::Marker,
        BrushKind::Pencil,
        BrushKind::Watercolor,
        BrushKind::Charcoal,
        BrushKind::Glow,
    ];

    /// Resolve a brush by name. Unknown names fall back to [`BrushKind::Round`].
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|b| b.name() == name)
            .unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            BrushKind::Round => "round",
            BrushKind::Square => "square",
            BrushKind::Sawtooth => "sawtooth",
            BrushKind::Spray => "spray",
            BrushKind::Calligraphy => "calligraphy",
            BrushKind::Marker => "marker",
            BrushKind::Pencil => "pencil",
            BrushKind::Watercolor => "watercolor",
            BrushKind::Charcoal => "charcoal",
            BrushKind::Glow => "glow",
        }
    }

    pub fn modifier(self) -> BrushModifier {
        let (harmonic, brightness, attack) = match self {
            BrushKind::Round => (1.0, 1.0, 0.1),
            BrushKind::Square => (1.5, 1.2, 0.05),
            BrushKind::Sawtooth => (1.8, 1.4, 0.03),
            BrushKind::Spray => (1.2, 0.8, 0.2),
            BrushKind::Calligraphy => (1.3, 1.1, 0.08),
            BrushKind::Marker => (1.1, 1.0, 0.06),
            BrushKind::Pencil => (1.4, 1.3, 0.02),
            BrushKind::Watercolor => (0.8, 0.7, 0.25),
            BrushKind::Charcoal => (0.9, 0.9, 0.12),
            BrushKind::Glow => (0.6, 1.2, 0.15),
        };
        BrushModifier {
            harmonic,
            brightness,
            attack,
        }
    }
}

impl From<String> for BrushKind {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}
