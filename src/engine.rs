//! Engine facade: the one object a drawing front end talks to.
//!
//! Owns the shared output device and wires stroke events, snapshot renders,
//! buffer playback and image sonification to it under one set of settings.

use std::path::Path;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::audio::{AudioContext, BackendFactory, CpalBackend, VoiceId};
use crate::color::PixelBuffer;
use crate::config::{sanitize_volume, EngineSettings};
use crate::image_sonifier::{ImageLoadError, ImageSonifier};
use crate::instrument::{playback_envelope, EnvelopeOverride, InstrumentId};
use crate::mode::SonificationMode;
use crate::playback::{PlaybackController, PlaybackStatus};
use crate::render::wav::{download_file_name, encode_buffer};
use crate::render::{render, AudioBuffer, RenderError};
use crate::trigger::{CanvasSize, Clock, StrokePointEvent, SystemClock, ToneTrigger};

/// Anything that can hand over a read-only RGBA snapshot of its surface.
pub trait PixelSource {
    /// `None` when there is nothing to snapshot yet.
    fn pixel_snapshot(&self) -> Option<PixelBuffer>;
}

impl PixelSource for PixelBuffer {
    fn pixel_snapshot(&self) -> Option<PixelBuffer> {
        Some(self.clone())
    }
}

/// A rendered take ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

struct Take {
    buffer: AudioBuffer,
    mode: SonificationMode,
    instrument: InstrumentId,
}

pub struct SonificationEngine<C: Clock = SystemClock> {
    context: Rc<AudioContext>,
    settings: EngineSettings,
    canvas: CanvasSize,
    trigger: ToneTrigger<C>,
    playback: PlaybackController,
    sonifier: ImageSonifier,
    last_take: Option<Take>,
    volume_pending: bool,
}

impl SonificationEngine<SystemClock> {
    /// Engine on the default output device, opened on first use.
    pub fn with_default_device(settings: EngineSettings) -> Self {
        Self::new(settings, CpalBackend::factory())
    }

    pub fn new(settings: EngineSettings, factory: BackendFactory) -> Self {
        let context = if settings.start_suspended {
            AudioContext::new_suspended(factory)
        } else {
            AudioContext::new(factory)
        };
        Self::with_clock(Rc::new(context), settings, SystemClock::new())
    }
}

impl<C: Clock> SonificationEngine<C> {
    pub fn with_clock(context: Rc<AudioContext>, settings: EngineSettings, clock: C) -> Self {
        Self {
            trigger: ToneTrigger::with_clock(Rc::clone(&context), clock),
            playback: PlaybackController::new(Rc::clone(&context)),
            sonifier: ImageSonifier::new(Rc::clone(&context)),
            context,
            settings: settings.validated(),
            canvas: CanvasSize::new(1.0, 1.0),
            last_take: None,
            volume_pending: true,
        }
    }

    pub fn context(&self) -> &Rc<AudioContext> {
        &self.context
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // --- Settings ---

    /// Replace every setting at once; values are validated first.
    pub fn set_settings(&mut self, settings: EngineSettings) {
        self.settings = settings.validated();
        self.volume_pending = true;
        self.flush_volume();
    }

    /// Instrument for the next stroke or render.
    pub fn set_instrument(&mut self, instrument: InstrumentId) {
        self.settings.instrument = instrument;
    }

    /// Sonification mode for the next stroke or render.
    pub fn set_mode(&mut self, mode: SonificationMode) {
        self.settings.mode = mode;
    }

    /// Set the render duration for `mode`, clamped to its allowed range.
    pub fn set_duration(&mut self, mode: SonificationMode, seconds: f64) {
        self.settings.durations.set(mode, seconds);
    }

    /// User ADSR values, sanitized.
    pub fn set_envelope(&mut self, envelope: EnvelopeOverride) {
        self.settings.envelope = envelope.sanitized();
    }

    /// Master volume in [0, 1]. Non-finite input mutes.
    pub fn set_volume(&mut self, volume: f32) {
        self.settings.master_volume = sanitize_volume(volume);
        self.volume_pending = true;
        self.flush_volume();
    }

    /// Mute without losing the volume setting.
    pub fn set_muted(&mut self, muted: bool) {
        self.settings.muted = muted;
        self.volume_pending = true;
        self.flush_volume();
    }

    /// Canvas size used to place stroke points.
    pub fn set_canvas(&mut self, canvas: CanvasSize) {
        self.canvas = canvas;
    }

    fn flush_volume(&mut self) {
        if !self.volume_pending {
            return;
        }
        self.playback.set_volume(self.settings.master_volume);
        self.playback.set_muted(self.settings.muted);
        self.volume_pending = false;
    }

    // --- Live strokes ---

    pub fn on_stroke_point(&mut self, event: &StrokePointEvent) -> Option<VoiceId> {
        if self.settings.effective_volume() > 0.0 {
            self.flush_volume();
        }
        self.trigger.handle(event, self.canvas, &self.settings)
    }

    // --- Snapshot render and playback ---

    /// Render the source's current pixels with the active settings.
    pub fn render_snapshot(&mut self, source: &dyn PixelSource) -> Option<&AudioBuffer> {
        let Some(pixels) = source.pixel_snapshot() else {
            log::warn!("nothing to render: no pixel snapshot");
            return None;
        };
        let (mode, instrument) = (self.settings.mode, self.settings.instrument);
        match render(
            &pixels,
            instrument,
            mode,
            self.settings.duration(),
            self.settings.sample_rate,
        ) {
            Ok(buffer) => {
                let take = self.last_take.insert(Take {
                    buffer,
                    mode,
                    instrument,
                });
                Some(&take.buffer)
            }
            Err(RenderError::NoPixelData) => {
                log::warn!("nothing to render: snapshot is empty");
                None
            }
            Err(e) => {
                log::warn!("render failed: {e}");
                None
            }
        }
    }

    /// Render a snapshot and play it from the start.
    pub fn play(&mut self, source: &dyn PixelSource) -> Option<VoiceId> {
        self.render_snapshot(source)?;
        self.play_last()
    }

    /// Play the most recent render again.
    pub fn play_last(&mut self) -> Option<VoiceId> {
        let take = self.last_take.as_ref()?;
        let envelope = playback_envelope(take.instrument, &self.settings.envelope);
        let buffer = take.buffer.clone();
        self.sonifier.stop();
        self.flush_volume();
        self.playback.play(buffer, envelope)
    }

    pub fn seek(&mut self, seconds: f64) {
        self.playback.seek(seconds);
    }

    /// Stop buffer playback and any image sonification.
    pub fn stop(&mut self) {
        self.playback.stop();
        self.sonifier.stop();
    }

    /// Poll the device; call regularly from the UI loop.
    pub fn tick(&mut self) -> PlaybackStatus {
        self.sonifier.poll();
        self.playback.tick()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.playback.status()
    }

    pub fn last_render(&self) -> Option<&AudioBuffer> {
        self.last_take.as_ref().map(|t| &t.buffer)
    }

    /// The last render as a named WAV file.
    pub fn download(&self) -> Option<WavDownload> {
        let take = self.last_take.as_ref()?;
        let unix_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let bytes = match encode_buffer(&take.buffer) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("WAV encode failed: {e}");
                return None;
            }
        };
        Some(WavDownload {
            file_name: download_file_name(take.mode, take.instrument, unix_millis),
            bytes,
        })
    }

    // --- Image sonifier ---

    pub fn load_image(&mut self, bytes: &[u8]) -> Result<(), ImageLoadError> {
        self.sonifier.load(bytes).map(|_| ())
    }

    pub fn open_image(&mut self, path: &Path) -> Result<(), ImageLoadError> {
        self.sonifier.open(path).map(|_| ())
    }

    /// Sonify the loaded image live with the active mode and instrument.
    pub fn play_image(&mut self) -> usize {
        self.playback.stop();
        self.flush_volume();
        self.sonifier
            .play(self.settings.mode, self.settings.instrument, &self.settings)
    }

    pub fn stop_image(&mut self) {
        self.sonifier.stop();
    }

    pub fn image_sonifier(&mut self) -> &mut ImageSonifier {
        &mut self.sonifier
    }

    /// Stop everything and release the device.
    pub fn close(&mut self) {
        self.stop();
        self.context.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::OfflineDevice;
    use crate::color::ColorSample;
    use crate::instrument::BrushKind;
    use crate::render::wav::decode;
    use crate::trigger::ManualClock;

    struct BlankSurface;

    impl PixelSource for BlankSurface {
        fn pixel_snapshot(&self) -> Option<PixelBuffer> {
            None
        }
    }

    fn settings() -> EngineSettings {
        let mut s = EngineSettings {
            sample_rate: 8000,
            ..EngineSettings::default()
        };
        s.durations.set(SonificationMode::Simple, 30.0);
        s
    }

    fn setup() -> (OfflineDevice, ManualClock, SonificationEngine<ManualClock>) {
        let device = OfflineDevice::new(1000, 2);
        let clock = ManualClock::new();
        let ctx = Rc::new(AudioContext::new(device.clone().into_factory()));
        let engine = SonificationEngine::with_clock(ctx, settings(), clock.clone());
        (device, clock, engine)
    }

    fn canvas() -> PixelBuffer {
        PixelBuffer::filled(16, 16, ColorSample::rgb(200, 80, 40))
    }

    fn stroke(ms: u64) -> StrokePointEvent {
        StrokePointEvent {
            x: 10.0,
            y: 10.0,
            color: ColorSample::rgb(255, 0, 0),
            brush: BrushKind::Round,
            timestamp_ms: ms,
        }
    }

    #[test]
    fn play_renders_and_starts_playback() {
        let (device, _clock, mut engine) = setup();
        assert!(engine.play(&canvas()).is_some());
        assert_eq!(device.active_voices(), 1);
        let status = engine.status();
        assert!(status.is_playing);
        assert!((status.duration - 30.0).abs() < 1e-9);
        assert!((device.volume() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn empty_snapshots_are_ignored() {
        let (device, _clock, mut engine) = setup();
        assert!(engine.play(&BlankSurface).is_none());
        let empty = PixelBuffer::new(0, 0, Vec::new()).unwrap();
        assert!(engine.play(&empty).is_none());
        assert!(engine.download().is_none());
        assert_eq!(device.active_voices(), 0);
    }

    #[test]
    fn download_names_and_encodes_last_render() {
        let (_device, _clock, mut engine) = setup();
        engine.set_instrument(InstrumentId::Violin);
        engine.set_mode(SonificationMode::Timeline);
        engine.set_duration(SonificationMode::Timeline, 60.0);
        engine.render_snapshot(&canvas()).unwrap();

        let download = engine.download().unwrap();
        assert!(download.file_name.starts_with("synesthetica-timeline-violin-"));
        assert!(download.file_name.ends_with(".wav"));
        let decoded = decode(&download.bytes).unwrap();
        assert_eq!(decoded.len(), 60 * 8000);
    }

    #[test]
    fn strokes_are_throttled() {
        let (device, clock, mut engine) = setup();
        engine.set_canvas(CanvasSize::new(100.0, 100.0));
        let mut played = 0;
        for ms in [0, 10, 40, 60, 110] {
            clock.set_millis(ms);
            if engine.on_stroke_point(&stroke(ms)).is_some() {
                played += 1;
            }
        }
        assert_eq!(played, 3);
        assert_eq!(device.active_voices(), 3);
    }

    #[test]
    fn muted_engine_ignores_strokes() {
        let (device, _clock, mut engine) = setup();
        engine.set_muted(true);
        assert!(engine.on_stroke_point(&stroke(0)).is_none());
        assert_eq!(device.volume(), 0.0);
        assert_eq!(device.active_voices(), 0);
    }

    #[test]
    fn volume_changes_reach_device() {
        let (device, _clock, mut engine) = setup();
        engine.set_volume(0.3);
        assert!((device.volume() - 0.3).abs() < 1e-6);
        engine.set_volume(f32::NAN);
        assert_eq!(engine.settings().master_volume, 0.0);
    }

    #[test]
    fn stop_silences_everything() {
        let (device, _clock, mut engine) = setup();
        engine.play(&canvas()).unwrap();
        engine.stop();
        assert_eq!(device.active_voices(), 0);
        assert!(!engine.tick().is_playing);
    }

    #[test]
    fn image_and_buffer_playback_exclude_each_other() {
        let (device, _clock, mut engine) = setup();
        engine.image_sonifier().from_pixels(canvas()).unwrap();
        engine.play(&canvas()).unwrap();
        assert_eq!(engine.play_image(), 1);
        assert!(!engine.status().is_playing);
        assert_eq!(device.active_voices(), 1);

        engine.play_last().unwrap();
        assert!(!engine.image_sonifier().is_playing());
        assert_eq!(device.active_voices(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let (device, _clock, mut engine) = setup();
        engine.play(&canvas()).unwrap();
        engine.close();
        engine.close();
        assert!(device.is_closed());
        assert!(engine.play(&canvas()).is_none());
    }

    #[test]
    fn suspended_start_waits_for_play() {
        let device = OfflineDevice::new(1000, 2);
        let settings = EngineSettings {
            start_suspended: true,
            ..settings()
        };
        let mut engine = SonificationEngine::new(settings, device.clone().into_factory());
        assert!(engine.on_stroke_point(&stroke(0)).is_none());
        assert!(device.is_suspended());
        assert!(engine.play(&canvas()).is_some());
        assert!(!device.is_suspended());
    }
}
