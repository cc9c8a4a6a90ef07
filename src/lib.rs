//! Synesthetica: turns colors into sound.
//!
//! Stroke points become short live tones, snapshots of a drawing surface are
//! rendered offline into mono buffers (and WAV files), and uploaded images
//! can be sonified live on the same output device.

pub mod audio;
pub mod color;
pub mod config;
pub mod engine;
pub mod image_sonifier;
pub mod instrument;
pub mod mode;
pub mod playback;
pub mod render;
pub mod trigger;

pub use engine::{PixelSource, SonificationEngine, WavDownload};

use env_logger::{Builder, Env};

/// Install the `env_logger` backend. `RUST_LOG` overrides the `info` default.
///
/// Safe to call more than once; later calls do nothing.
pub fn init_logging() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init();
}
