use thiserror::Error;

/// Errors surfaced by the voice-session lifecycle.
///
/// Every variant is also reflected in `SessionState::error` as a human-readable string so
/// the shell can show it in place of the listening/speaking indicator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("failed to connect to voice agent: {0}")]
    VendorConnect(String),

    #[error("voice session error: {0}")]
    VendorSession(String),

    #[error("no active voice session")]
    NoActiveSession,

    #[error("transcript not ready after {attempts} attempts")]
    TranscriptNotReady { attempts: u32 },
}
