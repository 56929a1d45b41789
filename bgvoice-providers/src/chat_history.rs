use anyhow::{Context, anyhow};
use bgvoice_core::transcript::ChatHistoryRow;
use serde_json::json;
use url::Url;

use crate::request::HttpRequest;

/// `POST {base}/chat-history/{user_id}` with `{"messages": [...]}`.
pub fn build_save_chat_history_request(
    base_url: &str,
    user_id: &str,
    rows: &[ChatHistoryRow],
) -> anyhow::Result<HttpRequest> {
    if user_id.trim().is_empty() {
        return Err(anyhow!("missing user id for chat history"));
    }

    let mut url = Url::parse(&format!("{}/chat-history", base_url.trim_end_matches('/')))
        .with_context(|| format!("invalid chat history url: {base_url}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("url cannot take path segments: {base_url}"))?
        .push(user_id);

    let payload = json!({ "messages": rows });
    Ok(HttpRequest::post_json(url.as_str(), payload.to_string()))
}
