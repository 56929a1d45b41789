use async_trait::async_trait;
use bgvoice_core::transcript::ChatHistoryRow;
use bgvoice_core::types::ConversationId;
use bgvoice_providers::parse::ConversationSnapshot;

use crate::controller::VendorCallbacks;

/// How the vendor SDK is asked to open a session.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionConfig {
    ApiKey { api_key: String, agent_id: String },
    ConversationToken { token: String },
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionConfig::ApiKey { agent_id, .. } => f
                .debug_struct("ApiKey")
                .field("api_key", &"[REDACTED]")
                .field("agent_id", agent_id)
                .finish(),
            SessionConfig::ConversationToken { .. } => f
                .debug_struct("ConversationToken")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// The conversational-voice SDK. It owns audio and signaling; we only see callbacks.
///
/// Implementations report lifecycle changes through `VendorCallbacks`, possibly from inside
/// `start_session` / `end_session` themselves.
#[async_trait]
pub trait VoiceVendor: Send + Sync {
    async fn start_session(
        &self,
        config: SessionConfig,
        callbacks: VendorCallbacks,
    ) -> anyhow::Result<()>;
    async fn end_session(&self) -> anyhow::Result<()>;
    async fn set_mic_muted(&self, muted: bool) -> anyhow::Result<()>;
}

/// Platform microphone permission prompt.
#[async_trait]
pub trait MicrophonePermission: Send + Sync {
    async fn request(&self) -> bool;
}

/// For platforms where the SDK prompts for the microphone itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl MicrophonePermission for AlwaysGranted {
    async fn request(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait ConversationTokenSource: Send + Sync {
    async fn conversation_token(&self, agent_id: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> anyhow::Result<ConversationSnapshot>;
}

#[async_trait]
pub trait ChatHistorySink: Send + Sync {
    async fn save(&self, user_id: &str, rows: &[ChatHistoryRow]) -> anyhow::Result<()>;
}

/// Receives raw vendor messages (`on_message`). Must be fast; it runs on the callback path.
pub trait MessageObserver: Send + Sync {
    fn on_message(&self, payload: &serde_json::Value);
}
