use thiserror::Error;

/// Failures when starting a voice. Everything else the synthesizer does is
/// infallible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    #[error("synthesizer is not initialized")]
    NotInitialized,
    #[error("audio output is suspended")]
    Suspended,
    #[error("voice limit reached: {requested} oscillators requested, {available} available")]
    VoiceLimit { requested: usize, available: usize },
    #[error("MIDI note {0} is out of range")]
    InvalidNote(u8),
    #[error("note config has no notes")]
    EmptyChord,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),
}
