use anyhow::{Context, anyhow};
use bgvoice_core::types::TranscriptEntry;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

pub fn parse_conversation_token(body: &[u8]) -> anyhow::Result<String> {
    let resp: TokenResponse = serde_json::from_slice(body).context("decode token JSON")?;
    resp.token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow!("no conversation token received from ElevenLabs"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStatus {
    Initiated,
    InProgress,
    Processing,
    Done,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationSnapshot {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub status: ConversationStatus,
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
}

impl ConversationSnapshot {
    /// Finalized with at least one turn.
    pub fn is_ready(&self) -> bool {
        self.status == ConversationStatus::Done && !self.transcript.is_empty()
    }
}

pub fn parse_conversation(body: &[u8]) -> anyhow::Result<ConversationSnapshot> {
    serde_json::from_slice(body).context("decode conversation JSON")
}
