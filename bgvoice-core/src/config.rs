use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_TRANSCRIPT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_TRANSCRIPT_DELAY_MS: u64 = 3_000;

/// How a voice session authenticates with the vendor.
///
/// Desktop hands the SDK an API key + agent id directly; mobile first exchanges the key
/// for a short-lived conversation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    #[default]
    ApiKey,
    ConversationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptPolling {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for TranscriptPolling {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TRANSCRIPT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_TRANSCRIPT_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub agent_id: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    // Base of the webhook that stores chat history (`{base}/chat-history/{user_id}`).
    #[serde(default)]
    pub chat_history_base_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub auth_flow: AuthFlow,

    #[serde(default)]
    pub transcript: TranscriptPolling,

    #[serde(default)]
    pub event_stream_enabled: bool,

    // Secrets are stored outside this struct at rest.
    #[serde(default)]
    pub api_key_present: bool,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            api_base_url: default_api_base_url(),
            chat_history_base_url: None,
            user_id: None,
            auth_flow: AuthFlow::default(),
            transcript: TranscriptPolling::default(),
            event_stream_enabled: false,
            api_key_present: false,
        }
    }
}
