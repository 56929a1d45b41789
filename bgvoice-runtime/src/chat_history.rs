use bgvoice_core::transcript::ChatHistoryRow;
use bgvoice_engine::traits::ChatHistorySink;
use bgvoice_providers::chat_history::build_save_chat_history_request;
use bgvoice_providers::runtime;

/// Posts transcript rows to the chat-history webhook.
#[derive(Debug, Clone)]
pub struct HttpChatHistory {
    base_url: String,
}

impl HttpChatHistory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl ChatHistorySink for HttpChatHistory {
    async fn save(&self, user_id: &str, rows: &[ChatHistoryRow]) -> anyhow::Result<()> {
        let req = build_save_chat_history_request(&self.base_url, user_id, rows)?;
        runtime::execute(&req)
            .await?
            .ensure_success("save chat history")?;
        log::info!("saved {} chat history rows for user {user_id}", rows.len());
        Ok(())
    }
}
