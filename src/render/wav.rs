//! WAV container: 16-bit mono PCM encode, decode, and export naming.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use thiserror::Error;

use super::AudioBuffer;
use crate::instrument::InstrumentId;
use crate::mode::SonificationMode;

/// Full-scale value for 16-bit PCM.
const PCM_SCALE: f32 = 32767.0;
const HEADER_LEN: usize = 44;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("WAV I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported WAV format: {0}")]
    UnsupportedFormat(String),
}

/// Encode mono samples as a 16-bit PCM WAV file.
///
/// The header is exactly 44 bytes. Samples outside [-1, 1] are clamped.
pub fn encode(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(HEADER_LEN + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Encode a rendered buffer.
pub fn encode_buffer(buffer: &AudioBuffer) -> Result<Vec<u8>, WavError> {
    encode(buffer.samples(), buffer.sample_rate())
}

fn to_pcm16(sample: f32) -> i16 {
    let s = if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    (s * PCM_SCALE).round() as i16
}

/// Decode WAV bytes into a mono buffer. Multi-channel input is averaged.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, WavError> {
    read_wav(Cursor::new(bytes))
}

pub fn read_wav<R: Read + Seek>(reader: R) -> Result<AudioBuffer, WavError> {
    let wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();
    let channels = spec.channels.max(1) as usize;

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int if spec.bits_per_sample == 16 => wav
            .into_samples::<i16>()
            .map(|s| s.map(|v| (v as f32 / PCM_SCALE).max(-1.0)))
            .collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            return Err(WavError::UnsupportedFormat(format!(
                "{}-bit integer PCM",
                spec.bits_per_sample
            )))
        }
        hound::SampleFormat::Float => wav.into_samples::<f32>().collect::<Result<_, _>>()?,
    };

    let mono = if channels == 1 {
        raw
    } else {
        raw.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer::new(mono, spec.sample_rate))
}

/// Write a rendered buffer to `path` as WAV.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), WavError> {
    std::fs::write(path, encode_buffer(buffer)?)?;
    log::info!(
        "wrote {} ({:.1}s, {} Hz)",
        path.display(),
        buffer.duration(),
        buffer.sample_rate()
    );
    Ok(())
}

/// `synesthetica-<mode>-<instrument>-<unixMillis>.wav`
pub fn download_file_name(
    mode: SonificationMode,
    instrument: InstrumentId,
    unix_millis: u128,
) -> String {
    format!(
        "synesthetica-{}-{}-{}.wav",
        mode.name(),
        instrument.name(),
        unix_millis
    )
}
