//! Oscillator primitives: waveform generation and phase accumulation.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Available waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

/// Generate a single sample for the given waveform at the specified phase.
///
/// `phase` is in the range [0.0, 1.0), representing one full cycle.
/// Returns a value in [-1.0, 1.0].
pub fn oscillator(waveform: Waveform, phase: f64) -> f64 {
    match waveform {
        Waveform::Sine => (phase * 2.0 * PI).sin(),
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Triangle => {
            if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            }
        }
    }
}

/// Advance a normalized phase by one sample at `freq`, wrapping into [0, 1).
#[inline]
pub fn advance_phase(phase: f64, freq: f64, sample_rate: f64) -> f64 {
    (phase + freq / sample_rate).fract()
}

/// Whether a partial at `freq` can be represented without aliasing.
#[inline]
pub fn below_nyquist(freq: f64, sample_rate: f64) -> bool {
    freq > 0.0 && freq < sample_rate / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_at_zero() {
        let v = oscillator(Waveform::Sine, 0.0);
        assert!(v.abs() < 1e-10);
    }

    #[test]
    fn sine_at_quarter() {
        let v = oscillator(Waveform::Sine, 0.25);
        assert!((v - 1.0).abs() < 1e-10);
    }

    #[test]
    fn sawtooth_endpoints() {
        assert!((oscillator(Waveform::Sawtooth, 0.0) + 1.0).abs() < 1e-10);
        assert!(oscillator(Waveform::Sawtooth, 0.5).abs() < 1e-10);
    }

    #[test]
    fn square_halves() {
        assert!((oscillator(Waveform::Square, 0.25) - 1.0).abs() < 1e-10);
        assert!((oscillator(Waveform::Square, 0.75) + 1.0).abs() < 1e-10);
    }

    #[test]
    fn triangle_shape() {
        assert!(oscillator(Waveform::Triangle, 0.0).abs() < 1e-10);
        assert!((oscillator(Waveform::Triangle, 0.25) - 1.0).abs() < 1e-10);
        assert!(oscillator(Waveform::Triangle, 0.5).abs() < 1e-10);
        assert!((oscillator(Waveform::Triangle, 0.75) + 1.0).abs() < 1e-10);
    }

    #[test]
    fn all_waveforms_bounded() {
        for wf in [
            Waveform::Sine,
            Waveform::Sawtooth,
            Waveform::Square,
            Waveform::Triangle,
        ] {
            for i in 0..1000 {
                let phase = i as f64 / 1000.0;
                let v = oscillator(wf, phase);
                assert!(
                    (-1.0..=1.0).contains(&v),
                    "{wf:?} at phase {phase}: {v} out of bounds"
                );
            }
        }
    }

    #[test]
    fn phase_wraps() {
        let mut phase = 0.0;
        for _ in 0..1000 {
            phase = advance_phase(phase, 440.0, 44100.0);
            assert!((0.0..1.0).contains(&phase));
        }
        // 1000 samples at 440 Hz = 9.977 cycles.
        assert!((phase - (1000.0 * 440.0 / 44100.0f64).fract()).abs() < 1e-9);
    }

    #[test]
    fn nyquist_guard() {
        assert!(below_nyquist(1000.0, 44100.0));
        assert!(!below_nyquist(22050.0, 44100.0));
        assert!(!below_nyquist(0.0, 44100.0));
    }
}
