//! Audio callback: runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, mixes the scheduled voices, publishes
//! the device clock, and reports voices that ended.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};

use super::command::AudioCommand;
use super::mixer::VoiceMixer;
use super::voice::VoiceId;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    commands: HeapCons<AudioCommand>,
    ended: HeapProd<VoiceId>,
    mixer: VoiceMixer,
    clock: Arc<AtomicU64>,
}

impl AudioCallback {
    pub fn new(
        commands: HeapCons<AudioCommand>,
        ended: HeapProd<VoiceId>,
        clock: Arc<AtomicU64>,
        channels: u16,
        sample_rate: u32,
    ) -> Self {
        Self {
            commands,
            ended,
            mixer: VoiceMixer::new(sample_rate, channels),
            clock,
        }
    }

    /// Called by cpal for each output block.
    pub fn process(&mut self, output: &mut [f32]) {
        // Pending commands always land before the block is rendered.
        while let Some(cmd) = self.commands.try_pop() {
            self.mixer.apply(cmd);
        }

        self.mixer.render(output);
        self.clock.store(self.mixer.frames(), Ordering::Release);

        // Ids that do not fit stay in the mixer for the next block.
        let sent = self.ended.push_slice(self.mixer.pending_ended());
        self.mixer.acknowledge_ended(sent);
    }

    pub fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.mixer.channels()
    }
}
