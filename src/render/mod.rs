//! Offline renderer: turns a full pixel snapshot into a finite mono buffer.
//!
//! Rendering is a pure function of its arguments: the same pixels, instrument,
//! mode, duration and sample rate always produce bit-identical samples. All
//! oscillator phases are accumulated in `f64` one sample at a time, so pitch
//! changes between slots are click-free and the result never depends on
//! wall-clock state.

pub mod aggregate;
pub mod wav;

use std::f64::consts::PI;
use std::sync::Arc;

use thiserror::Error;

use crate::color::{brightness_to_frequency, clamp_audible, quantize_in_range, PixelBuffer};
use crate::instrument::oscillator::{advance_phase, below_nyquist, oscillator};
use crate::instrument::{profile, InstrumentId, InstrumentProfile, Waveform};
use crate::mode::SonificationMode;

use aggregate::SlotWalker;

/// Output scale for the pure-tone modes (simple, timeline).
const TONE_HEADROOM: f64 = 0.3;
/// Output scale for the layered modes (colorfield, harmonic).
const LAYERED_HEADROOM: f64 = 0.25;
/// Octaves spanned by vertical position in timeline mode.
const TIMELINE_OCTAVES: f64 = 3.0;
/// Hz added at the right edge in colorfield mode.
const COLORFIELD_SPREAD_HZ: f64 = 300.0;
/// Longest take: 480 s of colorfield at 192 kHz.
pub const MAX_SAMPLES: usize = 480 * 192_000;

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    /// The snapshot has no pixels; there is nothing to sonify.
    #[error("pixel snapshot is empty")]
    NoPixelData,
    #[error("render duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f64),
    #[error("sample rate must be non-zero")]
    InvalidSampleRate,
}

/// A rendered mono buffer. Samples lie in [-1, 1] and never change once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap finished samples. They are frozen from here on.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Read-only view of the samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Shared handle to the samples, for handing to the audio thread.
    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sample count.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Number of samples a render of `duration` seconds produces.
pub fn sample_count(duration: f64, sample_rate: u32) -> usize {
    (sample_rate as f64 * duration).round() as usize
}

/// Render `pixels` with the given instrument and mode.
pub fn render(
    pixels: &PixelBuffer,
    instrument: InstrumentId,
    mode: SonificationMode,
    duration: f64,
    sample_rate: u32,
) -> Result<AudioBuffer, RenderError> {
    if pixels.is_empty() {
        return Err(RenderError::NoPixelData);
    }
    if sample_rate == 0 {
        return Err(RenderError::InvalidSampleRate);
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(RenderError::InvalidDuration(duration));
    }
    if sample_rate as f64 * duration > MAX_SAMPLES as f64 {
        return Err(RenderError::InvalidDuration(duration));
    }
    let n = sample_count(duration, sample_rate);
    if n == 0 {
        return Err(RenderError::InvalidDuration(duration));
    }

    let profile = profile(instrument);
    let ctx = RenderContext {
        pixels,
        profile,
        sample_rate: sample_rate as f64,
        n,
    };
    let samples = match mode {
        SonificationMode::Simple => render_simple(&ctx),
        SonificationMode::Timeline => render_timeline(&ctx),
        SonificationMode::ColorField => render_colorfield(&ctx),
        SonificationMode::Harmonic => render_harmonic(&ctx),
    };

    log::info!(
        "rendered {} samples ({:.1}s) in {} mode with {}",
        samples.len(),
        duration,
        mode,
        instrument
    );
    Ok(AudioBuffer::new(samples, sample_rate))
}

struct RenderContext<'a> {
    pixels: &'a PixelBuffer,
    profile: &'static InstrumentProfile,
    sample_rate: f64,
    n: usize,
}

impl RenderContext<'_> {
    fn walker(&self) -> SlotWalker<'_> {
        SlotWalker::new(self.pixels, self.n)
    }

    fn base_frequency(&self, luma_unit: f64) -> f64 {
        brightness_to_frequency(luma_unit, self.profile.fundamental_range)
    }

    /// `sin(π·i/N)`: rises once and falls once across the whole buffer.
    fn arch(&self, i: usize) -> f64 {
        (PI * i as f64 / self.n as f64).sin()
    }
}

fn render_simple(ctx: &RenderContext) -> Vec<f32> {
    let mut walker = ctx.walker();
    let mut phase = 0.0;
    let mut out = Vec::with_capacity(ctx.n);

    for i in 0..ctx.n {
        let slot = walker.slot(i);
        let freq = ctx.base_frequency(slot.luma_unit());
        let amp = if slot.opaque { 1.0 } else { 0.0 };
        let s = oscillator(Waveform::Sine, phase) * ctx.arch(i) * amp * TONE_HEADROOM;
        out.push(s as f32);
        phase = advance_phase(phase, freq, ctx.sample_rate);
    }
    out
}

fn render_timeline(ctx: &RenderContext) -> Vec<f32> {
    let mut walker = ctx.walker();
    let height = ctx.pixels.height() as f64;
    let mut phase = 0.0;
    let mut out = Vec::with_capacity(ctx.n);

    for i in 0..ctx.n {
        let slot = walker.slot(i);
        let lift = 2f64.powf(TIMELINE_OCTAVES * (1.0 - slot.mean_y / height));
        let freq = clamp_audible(ctx.base_frequency(slot.luma_unit()) * lift);
        let amp = if slot.opaque { slot.luma_unit() } else { 0.0 };
        let s = oscillator(Waveform::Sine, phase) * amp * TONE_HEADROOM;
        out.push(s as f32);
        phase = advance_phase(phase, freq, ctx.sample_rate);
    }
    out
}

fn render_colorfield(ctx: &RenderContext) -> Vec<f32> {
    let mut walker = ctx.walker();
    let width = ctx.pixels.width() as f64;
    let mut phase = 0.0;
    let mut out = Vec::with_capacity(ctx.n);

    for i in 0..ctx.n {
        let slot = walker.slot(i);
        let offset = slot.mean_x / width * COLORFIELD_SPREAD_HZ;
        let freq = clamp_audible(ctx.base_frequency(slot.luma_unit()) + offset);
        let amp = if slot.opaque {
            0.6 * (1.0 + 0.3 * slot.luma_unit())
        } else {
            0.0
        };
        let s = oscillator(Waveform::Sine, phase) * amp * LAYERED_HEADROOM;
        out.push(s as f32);
        phase = advance_phase(phase, freq, ctx.sample_rate);
    }
    out
}

fn render_harmonic(ctx: &RenderContext) -> Vec<f32> {
    let mut walker = ctx.walker();
    let range = ctx.profile.fundamental_range;
    let harmonics = ctx.profile.harmonics;
    let norm: f64 = harmonics.iter().map(|h| h.amplitude).sum::<f64>().max(f64::EPSILON);
    let mut phases = vec![0.0; harmonics.len()];
    let mut out = Vec::with_capacity(ctx.n);

    for i in 0..ctx.n {
        let slot = walker.slot(i);
        let fundamental = quantize_in_range(ctx.base_frequency(slot.luma_unit()), range);

        let mut sum = 0.0;
        for (h, phase) in harmonics.iter().zip(phases.iter_mut()) {
            let freq = fundamental * h.ratio;
            if below_nyquist(freq, ctx.sample_rate) {
                sum += oscillator(Waveform::Sine, *phase) * h.amplitude;
                *phase = advance_phase(*phase, freq, ctx.sample_rate);
            }
        }

        let amp = if slot.opaque { 1.0 } else { 0.0 };
        let envelope = ctx.arch(i) * 0.6 + 0.4;
        let s = sum / norm * envelope * amp * LAYERED_HEADROOM;
        out.push(s as f32);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorSample;
    use assert_approx_eq::assert_approx_eq;

    fn black_white() -> PixelBuffer {
        PixelBuffer::from_colors(2, 1, &[ColorSample::BLACK, ColorSample::WHITE]).unwrap()
    }

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let colors: Vec<ColorSample> = (0..width * height)
            .map(|i| {
                let v = (i * 255 / (width * height)) as u8;
                ColorSample::rgb(v, v / 2, 255 - v)
            })
            .collect();
        PixelBuffer::from_colors(width, height, &colors).unwrap()
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    #[test]
    fn empty_snapshot_is_no_pixel_data() {
        let empty = PixelBuffer::new(0, 0, vec![]).unwrap();
        let err = render(&empty, InstrumentId::Piano, SonificationMode::Simple, 1.0, 44100);
        assert_eq!(err, Err(RenderError::NoPixelData));
    }

    #[test]
    fn invalid_arguments_rejected() {
        let buf = black_white();
        assert_eq!(
            render(&buf, InstrumentId::Piano, SonificationMode::Simple, 0.0, 44100),
            Err(RenderError::InvalidDuration(0.0))
        );
        assert_eq!(
            render(&buf, InstrumentId::Piano, SonificationMode::Simple, 1.0, 0),
            Err(RenderError::InvalidSampleRate)
        );
        assert!(matches!(
            render(&buf, InstrumentId::Piano, SonificationMode::Simple, f64::NAN, 44100),
            Err(RenderError::InvalidDuration(_))
        ));
    }

    #[test]
    fn huge_duration_is_rejected_before_allocating() {
        let white = PixelBuffer::filled(2, 2, ColorSample::WHITE);
        assert_eq!(
            render(&white, InstrumentId::Piano, SonificationMode::Simple, 1e30, 44100),
            Err(RenderError::InvalidDuration(1e30))
        );
        let just_over = (MAX_SAMPLES as f64 + 1.0) / 192_000.0;
        assert_eq!(
            render(&white, InstrumentId::Piano, SonificationMode::Simple, just_over, 192_000),
            Err(RenderError::InvalidDuration(just_over))
        );
    }

    #[test]
    fn simple_black_white_scenario() {
        let out = render(&black_white(), InstrumentId::Piano, SonificationMode::Simple, 1.0, 44100).unwrap();
        assert_eq!(out.len(), 44100);
        assert_approx_eq!(out.duration(), 1.0);

        let (first, second) = out.samples().split_at(22050);
        // 0.5 s at 27.5 Hz ≈ 27.5 cycles ≈ 55 crossings.
        let low = zero_crossings(first);
        assert!((45..=65).contains(&low), "low half crossings: {low}");
        // 0.5 s at 4186 Hz ≈ 4186 crossings.
        let high = zero_crossings(second);
        assert!((4000..=4400).contains(&high), "high half crossings: {high}");
    }

    #[test]
    fn simple_envelope_is_one_arch() {
        let buf = PixelBuffer::filled(4, 4, ColorSample::rgb(128, 128, 128));
        let out = render(&buf, InstrumentId::Sine, SonificationMode::Simple, 1.0, 8000).unwrap();
        let s = out.samples();
        let peak = |range: std::ops::Range<usize>| {
            s[range].iter().fold(0.0f32, |m, v| m.max(v.abs()))
        };
        let edge = peak(0..200);
        let middle = peak(3900..4100);
        assert!(middle > 0.25, "middle peak {middle}");
        assert!(edge < middle / 4.0, "edge {edge} vs middle {middle}");
    }

    #[test]
    fn transparent_buffer_renders_silence() {
        let buf = PixelBuffer::filled(3, 3, ColorSample::rgba(200, 10, 10, 0));
        for mode in SonificationMode::ALL {
            let out = render(&buf, InstrumentId::Piano, mode, 0.5, 8000).unwrap();
            assert!(out.samples().iter().all(|&s| s == 0.0), "{mode:?}");
        }
    }

    #[test]
    fn every_mode_is_deterministic() {
        let buf = gradient(16, 8);
        for mode in SonificationMode::ALL {
            for id in [InstrumentId::Piano, InstrumentId::Bell, InstrumentId::Strings] {
                let a = render(&buf, id, mode, 0.5, 22050).unwrap();
                let b = render(&buf, id, mode, 0.5, 22050).unwrap();
                let bits_a: Vec<u32> = a.samples().iter().map(|s| s.to_bits()).collect();
                let bits_b: Vec<u32> = b.samples().iter().map(|s| s.to_bits()).collect();
                assert_eq!(bits_a, bits_b, "{mode:?}/{id:?}");
            }
        }
    }

    #[test]
    fn output_stays_within_headroom() {
        let buf = PixelBuffer::filled(8, 8, ColorSample::WHITE);
        for mode in SonificationMode::ALL {
            let out = render(&buf, InstrumentId::Synth, mode, 0.25, 22050).unwrap();
            let max = out.samples().iter().fold(0.0f32, |m, v| m.max(v.abs()));
            assert!(max <= 0.3 + 1e-6, "{mode:?} peak {max}");
            assert!(max > 0.0, "{mode:?} silent");
        }
    }

    #[test]
    fn timeline_top_is_higher_than_bottom() {
        // Same gray on both rows; only vertical position differs.
        let gray = ColorSample::rgb(100, 100, 100);
        let buf = PixelBuffer::filled(1, 2, gray);
        let out = render(&buf, InstrumentId::Sine, SonificationMode::Timeline, 1.0, 44100).unwrap();
        let (top, bottom) = out.samples().split_at(22050);
        assert!(zero_crossings(top) > zero_crossings(bottom) * 3 / 2);
    }

    #[test]
    fn timeline_amplitude_follows_brightness() {
        let dim = PixelBuffer::filled(2, 2, ColorSample::rgb(40, 40, 40));
        let bright = PixelBuffer::filled(2, 2, ColorSample::rgb(220, 220, 220));
        let peak = |b: &PixelBuffer| {
            render(b, InstrumentId::Sine, SonificationMode::Timeline, 0.2, 8000)
                .unwrap()
                .samples()
                .iter()
                .fold(0.0f32, |m, v| m.max(v.abs()))
        };
        assert!(peak(&bright) > peak(&dim) * 3.0);
    }

    #[test]
    fn colorfield_right_edge_is_higher() {
        let buf = PixelBuffer::filled(2, 1, ColorSample::BLACK);
        let out = render(&buf, InstrumentId::Sine, SonificationMode::ColorField, 1.0, 44100).unwrap();
        let (left, right) = out.samples().split_at(22050);
        // 110 Hz on the left, 110 + 150 Hz on the right.
        assert!(zero_crossings(right) > zero_crossings(left) * 2);
    }

    #[test]
    fn lengths_match_duration_exactly() {
        let buf = gradient(4, 4);
        for duration in [1.0, 10.0, 60.0, 300.0] {
            let out = render(&buf, InstrumentId::Piano, SonificationMode::Simple, duration, 8000).unwrap();
            assert_eq!(out.len(), sample_count(duration, 8000));
            assert_eq!(out.len(), (8000.0 * duration) as usize);
        }
        let odd = render(&buf, InstrumentId::Piano, SonificationMode::Harmonic, 0.33333, 44100).unwrap();
        assert_eq!(odd.len(), (44100.0f64 * 0.33333).round() as usize);
    }
}
