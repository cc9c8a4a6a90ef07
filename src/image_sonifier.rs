//! Image sonifier: plays an uploaded image live, straight on the shared
//! device, without going through the offline renderer.

use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::audio::{AudioContext, Partial, Voice, VoiceId};
use crate::color::{map_color, ColorSample, PixelBuffer};
use crate::config::EngineSettings;
use crate::instrument::{Envelope, GainAutomation, InstrumentId, InstrumentProfile};
use crate::mode::SonificationMode;

/// Uploaded images are scaled down to at most this many pixels wide.
pub const MAX_WIDTH: u32 = 128;
/// Default color-field grid is `DEFAULT_GRID × DEFAULT_GRID`.
pub const DEFAULT_GRID: u32 = 4;
/// Chord intervals played on each quadrant in harmonic mode.
pub const CHORD_RATIOS: [f64; 4] = [1.0, 1.25, 1.5, 2.0];
/// Delay between successive quadrant chords.
pub const CHORD_STAGGER: f64 = 0.1;
/// Pitch lift per color-field row.
pub const ROW_PITCH_STEP: f64 = 1.02;

const SIMPLE_SECONDS: f64 = 3.0;
const COLUMN_SECONDS: f64 = 0.15;
const FIELD_SECONDS: f64 = 4.0;
const CHORD_SECONDS: f64 = 3.0;
/// Summed peak gain shared by all voices of one play.
const TOTAL_PEAK: f64 = 0.6;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("image has no pixels")]
    Empty,
}

/// Decode an encoded image at full resolution.
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer, ImageLoadError> {
    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    let pixels = PixelBuffer::from_rgba_image(decoded);
    if pixels.is_empty() {
        return Err(ImageLoadError::Empty);
    }
    Ok(pixels)
}

pub fn read_image(path: &Path) -> Result<PixelBuffer, ImageLoadError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Plays a loaded image live as a set of scheduled voices, one plan per mode.
pub struct ImageSonifier {
    context: Rc<AudioContext>,
    pixels: Option<PixelBuffer>,
    voices: Vec<VoiceId>,
    grid: u32,
}

impl ImageSonifier {
    pub fn new(context: Rc<AudioContext>) -> Self {
        Self {
            context,
            pixels: None,
            voices: Vec::new(),
            grid: DEFAULT_GRID,
        }
    }

    /// Decode an encoded image (PNG, JPEG, GIF, BMP) and keep a downsampled copy.
    pub fn load(&mut self, bytes: &[u8]) -> Result<&PixelBuffer, ImageLoadError> {
        let pixels = decode_image(bytes)?;
        self.set_pixels(pixels)
    }

    pub fn open(&mut self, path: &Path) -> Result<&PixelBuffer, ImageLoadError> {
        let pixels = read_image(path)?;
        self.set_pixels(pixels)
    }

    /// Use an existing pixel buffer, downsampled like a decoded upload.
    pub fn from_pixels(&mut self, pixels: PixelBuffer) -> Result<&PixelBuffer, ImageLoadError> {
        self.set_pixels(pixels)
    }

    fn set_pixels(&mut self, pixels: PixelBuffer) -> Result<&PixelBuffer, ImageLoadError> {
        if pixels.is_empty() {
            return Err(ImageLoadError::Empty);
        }
        self.stop();
        let pixels = pixels.downsample(MAX_WIDTH);
        log::info!("image loaded: {}x{}", pixels.width(), pixels.height());
        Ok(self.pixels.insert(pixels))
    }

    pub fn pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }

    /// Color-field grid size (cells per side).
    pub fn set_grid(&mut self, grid: u32) {
        self.grid = grid.max(1);
    }

    /// Start playing the loaded image. Returns how many voices were scheduled.
    pub fn play(
        &mut self,
        mode: SonificationMode,
        instrument: InstrumentId,
        settings: &EngineSettings,
    ) -> usize {
        self.stop();
        let Some(pixels) = &self.pixels else {
            log::warn!("no image loaded");
            return 0;
        };
        if settings.effective_volume() <= 0.0 {
            log::debug!("image play ignored: muted");
            return 0;
        }
        self.context.resume();

        let start = self.context.current_time();
        let plan = voice_plan(pixels, mode, instrument, settings, self.grid, start);
        let planned = plan.len();
        self.voices = plan
            .into_iter()
            .filter_map(|voice| self.context.start_voice(voice))
            .collect();
        log::info!(
            "image sonifier: {} of {} voices scheduled ({mode}, {instrument})",
            self.voices.len(),
            planned
        );
        self.voices.len()
    }

    /// Disconnect every voice this sonifier started.
    pub fn stop(&mut self) {
        for id in self.voices.drain(..) {
            self.context.stop_voice(id);
        }
    }

    /// Forget voices that finished on their own. Returns whether any remain.
    pub fn poll(&mut self) -> bool {
        self.context.poll_ended();
        let context = &self.context;
        self.voices.retain(|&id| context.is_active(id));
        self.is_playing()
    }

    pub fn is_playing(&self) -> bool {
        !self.voices.is_empty()
    }
}

/// The voices one play of `pixels` schedules, starting at device time `start`.
pub fn voice_plan(
    pixels: &PixelBuffer,
    mode: SonificationMode,
    instrument: InstrumentId,
    settings: &EngineSettings,
    grid: u32,
    start: f64,
) -> Vec<Voice> {
    let profile = instrument.profile();
    let envelope = profile.envelope.with_override(&settings.envelope);
    let plan = Planner {
        profile,
        envelope,
        start,
    };
    match mode {
        SonificationMode::Simple => plan.simple(pixels),
        SonificationMode::Timeline => plan.timeline(pixels),
        SonificationMode::ColorField => plan.color_field(pixels, grid.max(1)),
        SonificationMode::Harmonic => plan.harmonic(pixels),
    }
}

struct Planner {
    profile: &'static InstrumentProfile,
    envelope: Envelope,
    start: f64,
}

impl Planner {
    fn note(&self, partials: Vec<Partial>, at: f64, length: f64, peak: f64, pan: f64) -> Voice {
        let mut gain = GainAutomation::new();
        let end = self.envelope.schedule(&mut gain, at, peak, at + length);
        Voice::partials(self.profile.waveform, partials, at, end)
            .with_gain(gain)
            .with_pan(pan)
    }

    fn tone(&self, color: &ColorSample, pitch_scale: f64) -> (Vec<Partial>, f64) {
        let mapping = map_color(color, self.profile);
        let partials = vec![Partial {
            frequency: mapping.frequency * pitch_scale,
            amplitude: 1.0,
        }];
        (partials, mapping.amplitude)
    }

    fn simple(&self, pixels: &PixelBuffer) -> Vec<Voice> {
        let Some(color) = pixels.mean_color() else {
            return Vec::new();
        };
        let (partials, amp) = self.tone(&color, 1.0);
        vec![self.note(partials, self.start, SIMPLE_SECONDS, TOTAL_PEAK * amp, 0.0)]
    }

    fn timeline(&self, pixels: &PixelBuffer) -> Vec<Voice> {
        let width = pixels.width();
        let overlap = (self.envelope.span() / COLUMN_SECONDS).ceil().max(1.0);
        let peak = TOTAL_PEAK / overlap;
        (0..width)
            .filter_map(|col| {
                let color = pixels.average_color(col, 0, col + 1, pixels.height())?;
                let (partials, amp) = self.tone(&color, 1.0);
                let at = self.start + col as f64 * COLUMN_SECONDS;
                Some(self.note(partials, at, COLUMN_SECONDS, peak * amp, spread(col, width)))
            })
            .collect()
    }

    fn color_field(&self, pixels: &PixelBuffer, grid: u32) -> Vec<Voice> {
        let cols = grid.min(pixels.width()).max(1);
        let rows = grid.min(pixels.height()).max(1);
        let peak = TOTAL_PEAK / (cols * rows) as f64;
        let mut voices = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            let (y0, y1) = bounds(row, rows, pixels.height());
            for col in 0..cols {
                let (x0, x1) = bounds(col, cols, pixels.width());
                let Some(color) = pixels.average_color(x0, y0, x1, y1) else {
                    continue;
                };
                let (partials, amp) = self.tone(&color, ROW_PITCH_STEP.powi(row as i32));
                voices.push(self.note(partials, self.start, FIELD_SECONDS, peak * amp, spread(col, cols)));
            }
        }
        voices
    }

    fn harmonic(&self, pixels: &PixelBuffer) -> Vec<Voice> {
        let (w, h) = (pixels.width(), pixels.height());
        let (mx, my) = (w.div_ceil(2), h.div_ceil(2));
        let quadrants = [
            (0, 0, mx, my, -0.5),
            (mx, 0, w, my, 0.5),
            (0, my, mx, h, -0.5),
            (mx, my, w, h, 0.5),
        ];
        let peak = TOTAL_PEAK / quadrants.len() as f64;
        quadrants
            .iter()
            .enumerate()
            .filter_map(|(i, &(x0, y0, x1, y1, pan))| {
                let color = pixels.average_color(x0, y0, x1, y1)?;
                let mapping = map_color(&color, self.profile);
                let partials = CHORD_RATIOS
                    .iter()
                    .map(|r| Partial {
                        frequency: mapping.frequency * r,
                        amplitude: 1.0 / CHORD_RATIOS.len() as f64,
                    })
                    .collect();
                let at = self.start + i as f64 * CHORD_STAGGER;
                Some(self.note(partials, at, CHORD_SECONDS, peak * mapping.amplitude, pan))
            })
            .collect()
    }
}

/// Pan for item `i` of `n`, spread evenly from -1 to 1.
fn spread(i: u32, n: u32) -> f64 {
    if n <= 1 {
        0.0
    } else {
        i as f64 / (n - 1) as f64 * 2.0 - 1.0
    }
}

/// Pixel range `[start, end)` of cell `i` when `extent` is cut into `n` cells.
fn bounds(i: u32, n: u32, extent: u32) -> (u32, u32) {
    let start = (i as u64 * extent as u64 / n as u64) as u32;
    let end = ((i as u64 + 1) * extent as u64 / n as u64) as u32;
    (start, end.max(start + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{OfflineDevice, VoiceSource};
    use assert_approx_eq::assert_approx_eq;
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let colors: Vec<ColorSample> = (0..height)
            .flat_map(|_| {
                (0..width).map(move |x| {
                    let v = (x * 255 / width.max(1)) as u8;
                    ColorSample::rgb(v, v, v)
                })
            })
            .collect();
        PixelBuffer::from_colors(width, height, &colors).unwrap()
    }

    fn first_freq(voice: &Voice) -> f64 {
        match &voice.source {
            VoiceSource::Tone { partials, .. } => partials[0].frequency,
            VoiceSource::Buffer { .. } => panic!("expected a tone"),
        }
    }

    fn setup() -> (OfflineDevice, ImageSonifier) {
        let device = OfflineDevice::new(1000, 2);
        let ctx = Rc::new(AudioContext::with_backend(Box::new(device.clone())));
        (device, ImageSonifier::new(ctx))
    }

    fn plan(pixels: &PixelBuffer, mode: SonificationMode) -> Vec<Voice> {
        voice_plan(pixels, mode, InstrumentId::Sine, &EngineSettings::default(), DEFAULT_GRID, 0.0)
    }

    #[test]
    fn simple_is_one_tone() {
        let voices = plan(&gradient(8, 8), SonificationMode::Simple);
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].pan, 0.0);
    }

    #[test]
    fn timeline_walks_columns_left_to_right() {
        let voices = plan(&gradient(8, 2), SonificationMode::Timeline);
        assert_eq!(voices.len(), 8);
        assert!(voices.windows(2).all(|w| w[0].start < w[1].start));
        assert!(voices.windows(2).all(|w| first_freq(&w[0]) < first_freq(&w[1])));
        assert_approx_eq!(voices[0].pan, -1.0);
        assert_approx_eq!(voices[7].pan, 1.0);
    }

    #[test]
    fn timeline_skips_transparent_columns() {
        let colors = [
            ColorSample::WHITE,
            ColorSample::rgba(0, 0, 0, 0),
            ColorSample::BLACK,
        ];
        let pixels = PixelBuffer::from_colors(3, 1, &colors).unwrap();
        assert_eq!(plan(&pixels, SonificationMode::Timeline).len(), 2);
    }

    #[test]
    fn color_field_grid_rises_per_row() {
        let pixels = PixelBuffer::filled(8, 8, ColorSample::rgb(100, 100, 100));
        let voices = plan(&pixels, SonificationMode::ColorField);
        assert_eq!(voices.len(), 16);
        let row0 = first_freq(&voices[0]);
        let row1 = first_freq(&voices[4]);
        assert_approx_eq!(row1 / row0, 1.02);
        assert_approx_eq!(voices[0].pan, -1.0);
        assert_approx_eq!(voices[3].pan, 1.0);
    }

    #[test]
    fn small_images_shrink_the_grid() {
        let pixels = PixelBuffer::filled(2, 1, ColorSample::WHITE);
        assert_eq!(plan(&pixels, SonificationMode::ColorField).len(), 2);
    }

    #[test]
    fn harmonic_plays_staggered_quadrant_chords() {
        let voices = plan(&gradient(8, 8), SonificationMode::Harmonic);
        assert_eq!(voices.len(), 4);
        for (i, v) in voices.iter().enumerate() {
            assert_approx_eq!(v.start, i as f64 * CHORD_STAGGER);
            let VoiceSource::Tone { partials, .. } = &v.source else {
                panic!("expected a tone");
            };
            let base = partials[0].frequency;
            let ratios: Vec<f64> = partials.iter().map(|p| p.frequency / base).collect();
            for (got, want) in ratios.iter().zip(CHORD_RATIOS) {
                assert_approx_eq!(*got, want);
            }
        }
    }

    #[test]
    fn load_downsamples_wide_images() {
        let img = image::RgbaImage::from_pixel(256, 64, image::Rgba([10, 200, 30, 255]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();

        let (_device, mut sonifier) = setup();
        let pixels = sonifier.load(bytes.get_ref()).unwrap();
        assert_eq!(pixels.width(), MAX_WIDTH);
        assert_eq!(pixels.height(), 32);
    }

    #[test]
    fn load_rejects_garbage() {
        let (_device, mut sonifier) = setup();
        assert!(matches!(
            sonifier.load(b"definitely not an image"),
            Err(ImageLoadError::Decode(_))
        ));
    }

    #[test]
    fn empty_buffer_rejected() {
        let (_device, mut sonifier) = setup();
        let empty = PixelBuffer::new(0, 0, Vec::new()).unwrap();
        assert!(matches!(sonifier.from_pixels(empty), Err(ImageLoadError::Empty)));
    }

    #[test]
    fn play_then_stop_tears_everything_down() {
        let (device, mut sonifier) = setup();
        sonifier.from_pixels(gradient(16, 16)).unwrap();
        let started = sonifier.play(
            SonificationMode::ColorField,
            InstrumentId::Bell,
            &EngineSettings::default(),
        );
        assert_eq!(started, 16);
        assert_eq!(device.active_voices(), 16);
        sonifier.stop();
        assert!(!sonifier.is_playing());
        assert_eq!(device.active_voices(), 0);
    }

    #[test]
    fn replay_replaces_previous_voices() {
        let (device, mut sonifier) = setup();
        sonifier.from_pixels(gradient(4, 4)).unwrap();
        let settings = EngineSettings::default();
        sonifier.play(SonificationMode::Harmonic, InstrumentId::Piano, &settings);
        sonifier.play(SonificationMode::Simple, InstrumentId::Piano, &settings);
        assert_eq!(device.active_voices(), 1);
    }

    #[test]
    fn poll_prunes_finished_voices() {
        let (device, mut sonifier) = setup();
        sonifier.from_pixels(gradient(4, 4)).unwrap();
        sonifier.play(SonificationMode::Simple, InstrumentId::Sine, &EngineSettings::default());
        assert!(sonifier.poll());
        device.advance_seconds(10.0);
        assert!(!sonifier.poll());
    }

    #[test]
    fn muted_or_unloaded_plays_nothing() {
        let (_device, mut sonifier) = setup();
        let settings = EngineSettings::default();
        assert_eq!(sonifier.play(SonificationMode::Simple, InstrumentId::Piano, &settings), 0);

        sonifier.from_pixels(gradient(4, 4)).unwrap();
        let muted = EngineSettings {
            muted: true,
            ..settings
        };
        assert_eq!(sonifier.play(SonificationMode::Simple, InstrumentId::Piano, &muted), 0);
    }
}
