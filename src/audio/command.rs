//! Commands sent from the engine thread to the audio thread via ring buffer.

use super::voice::{Voice, VoiceId};

#[derive(Debug)]
pub enum AudioCommand {
    /// Schedule a voice. It sounds between its own start and stop times.
    StartVoice(VoiceId, Box<Voice>),

    /// Disconnect a voice immediately, wherever it is in its envelope.
    StopVoice(VoiceId),

    /// Disconnect every voice.
    StopAll,

    /// Set master volume (0.0 to 1.0).
    SetVolume(f32),
}
