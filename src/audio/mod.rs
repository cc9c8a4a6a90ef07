//! Audio output: voice scheduling on a shared device.
//!
//! The engine thread builds [`Voice`]s and hands them to the [`AudioContext`],
//! which forwards [`AudioCommand`]s to its backend. The cpal backend owns an
//! output stream and talks to its audio thread only through lock-free ring
//! buffers: commands go in, ended voice ids come out, and the device clock is
//! published as an atomic frame count.

pub mod callback;
pub mod command;
pub mod context;
pub mod mixer;
pub mod offline;
pub mod voice;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapRb,
};
use thiserror::Error;

pub use command::AudioCommand;
pub use context::{AudioContext, BackendFactory, OutputBackend};
pub use mixer::VoiceMixer;
pub use offline::OfflineDevice;
pub use voice::{pan_gains, Partial, Voice, VoiceId, VoiceSource};

use callback::AudioCallback;

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 1024;

/// Output device errors. Any of these leaves the engine silent, never broken.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,
    #[error("device config error: {0}")]
    DeviceConfig(String),
    #[error("stream build error: {0}")]
    StreamBuild(String),
    #[error("stream play error: {0}")]
    StreamPlay(String),
    /// The audio thread is not draining commands fast enough.
    #[error("audio command ring buffer is full")]
    BufferFull,
    #[error("audio device is closed")]
    Closed,
}

/// Backend on the default cpal output device.
pub struct CpalBackend {
    stream: cpal::Stream,
    producer: ringbuf::HeapProd<AudioCommand>,
    ended: ringbuf::HeapCons<VoiceId>,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
    closed: bool,
}

impl CpalBackend {
    /// Open the default output device at its default configuration.
    pub fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        Self::build_with_device(&device, sample_rate, channels)
    }

    /// Factory for [`AudioContext::new`]; the device opens on first use.
    pub fn factory() -> BackendFactory {
        Box::new(|| -> Result<Box<dyn OutputBackend>, AudioError> { Ok(Box::new(Self::open()?)) })
    }

    fn build_with_device(
        device: &cpal::Device,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        let (producer, commands) = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY).split();
        let (ended_prod, ended) = HeapRb::<VoiceId>::new(RING_BUFFER_CAPACITY).split();
        let clock = Arc::new(AtomicU64::new(0));

        let mut audio_callback =
            AudioCallback::new(commands, ended_prod, Arc::clone(&clock), channels, sample_rate);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            log::error!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        log::info!("audio stream started: {sample_rate} Hz, {channels} ch");

        Ok(Self {
            stream,
            producer,
            ended,
            clock,
            sample_rate,
            channels,
            closed: false,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl OutputBackend for CpalBackend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn send(&mut self, cmd: AudioCommand) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        self.producer
            .try_push(cmd)
            .map_err(|_| AudioError::BufferFull)
    }

    fn take_ended(&mut self) -> Vec<VoiceId> {
        self.ended.pop_iter().collect()
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.pause() {
            log::debug!("pause on close failed: {e}");
        }
    }
}
