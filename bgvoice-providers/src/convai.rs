use anyhow::{Context, anyhow};
use url::Url;

use crate::request::HttpRequest;

/// Connection settings for the ElevenLabs Conversational AI REST endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct ConvaiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for ConvaiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvaiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ConvaiConfig {
    pub fn production(api_key: impl Into<String>) -> Self {
        Self {
            base_url: bgvoice_core::config::DEFAULT_API_BASE_URL.into(),
            api_key: api_key.into(),
        }
    }
}

fn endpoint(base: &str, path: &str) -> anyhow::Result<Url> {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}")).with_context(|| format!("invalid base url: {base}"))
}

fn push_segment(url: &mut Url, segment: &str) -> anyhow::Result<()> {
    if url.cannot_be_a_base() {
        return Err(anyhow!("url cannot take path segments: {url}"));
    }
    url.path_segments_mut()
        .map_err(|_| anyhow!("url cannot take path segments"))?
        .push(segment);
    Ok(())
}

/// `GET /v1/convai/conversation/token?agent_id=...`: exchanges the API key for a
/// short-lived conversation token.
pub fn build_conversation_token_request(
    cfg: &ConvaiConfig,
    agent_id: &str,
) -> anyhow::Result<HttpRequest> {
    let mut url = endpoint(&cfg.base_url, "/v1/convai/conversation/token")?;
    url.query_pairs_mut().append_pair("agent_id", agent_id);

    Ok(HttpRequest::get(url.as_str()).with_header("xi-api-key", cfg.api_key.clone()))
}

/// `GET /v1/convai/conversations/{id}`: conversation details including the transcript.
pub fn build_conversation_request(
    cfg: &ConvaiConfig,
    conversation_id: &str,
) -> anyhow::Result<HttpRequest> {
    let mut url = endpoint(&cfg.base_url, "/v1/convai/conversations")?;
    push_segment(&mut url, conversation_id)?;

    Ok(HttpRequest::get(url.as_str()).with_header("xi-api-key", cfg.api_key.clone()))
}

/// WebSocket URL of the per-conversation event stream.
pub fn build_events_ws_url(cfg: &ConvaiConfig, conversation_id: &str) -> anyhow::Result<Url> {
    let mut url = endpoint(&cfg.base_url, "/v1/convai/conversation")?;
    push_segment(&mut url, conversation_id)?;
    push_segment(&mut url, "events")?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(anyhow!("unsupported scheme for event stream: {other}")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot switch {url} to {scheme}"))?;
    Ok(url)
}
