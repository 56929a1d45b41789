use anyhow::Context;
use bgvoice_core::types::ConversationId;
use bgvoice_engine::traits::{ConversationTokenSource, TranscriptSource};
use bgvoice_providers::convai::{
    ConvaiConfig, build_conversation_request, build_conversation_token_request,
};
use bgvoice_providers::parse::{ConversationSnapshot, parse_conversation, parse_conversation_token};
use bgvoice_providers::runtime;

/// ElevenLabs Conversational AI REST client: conversation tokens and transcripts.
#[derive(Debug, Clone)]
pub struct ElevenLabsConvai {
    cfg: ConvaiConfig,
}

impl ElevenLabsConvai {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            cfg: ConvaiConfig {
                base_url: base_url.into(),
                api_key: api_key.into(),
            },
        }
    }

    pub fn config(&self) -> &ConvaiConfig {
        &self.cfg
    }
}

#[async_trait::async_trait]
impl ConversationTokenSource for ElevenLabsConvai {
    async fn conversation_token(&self, agent_id: &str) -> anyhow::Result<String> {
        let req = build_conversation_token_request(&self.cfg, agent_id)?;
        let resp = runtime::execute(&req)
            .await?
            .ensure_success("conversation token")?;
        parse_conversation_token(&resp.body).context("decode conversation token")
    }
}

#[async_trait::async_trait]
impl TranscriptSource for ElevenLabsConvai {
    async fn fetch_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> anyhow::Result<ConversationSnapshot> {
        let req = build_conversation_request(&self.cfg, conversation_id.as_str())?;
        let resp = runtime::execute(&req)
            .await?
            .ensure_success("fetch conversation")?;
        parse_conversation(&resp.body).context("decode conversation")
    }
}
