use std::sync::Arc;

use anyhow::anyhow;
use bgvoice_core::config::AppConfig;
use bgvoice_core::error::VoiceError;
use bgvoice_core::transcript::to_chat_history;
use bgvoice_core::types::{ConversationId, TranscriptEntry};
use bgvoice_engine::traits::ChatHistorySink;
use bgvoice_engine::transcript_fetch::{FetchError, RetryPolicy, TranscriptFetcher};
use bgvoice_runtime::chat_history::HttpChatHistory;
use bgvoice_runtime::convai::ElevenLabsConvai;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Result of copying one conversation's transcript into chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Saved { rows: usize },
    /// The transcript was final but every utterance was blank.
    NothingToSave,
    NotReady {
        attempts: u32,
        last_error: Option<String>,
    },
    Cancelled,
}

impl SyncOutcome {
    pub fn error(&self) -> Option<VoiceError> {
        match self {
            SyncOutcome::NotReady { attempts, .. } => Some(VoiceError::TranscriptNotReady {
                attempts: *attempts,
            }),
            _ => None,
        }
    }
}

/// Where finished transcripts get persisted.
#[derive(Clone)]
pub struct ChatHistoryTarget {
    pub sink: Arc<dyn ChatHistorySink>,
    pub user_id: String,
}

/// Fetches a finished transcript and persists it as chat-history rows.
#[derive(Clone)]
pub struct TranscriptSync {
    fetcher: TranscriptFetcher,
    target: Option<ChatHistoryTarget>,
}

impl TranscriptSync {
    pub fn new(fetcher: TranscriptFetcher, target: Option<ChatHistoryTarget>) -> Self {
        Self { fetcher, target }
    }

    /// Polls `convai` with the configured retry policy and saves to the configured
    /// chat-history webhook, if any.
    pub fn with_convai(cfg: &AppConfig, convai: ElevenLabsConvai) -> Self {
        let fetcher = TranscriptFetcher::new(Arc::new(convai), RetryPolicy::from(cfg.transcript));
        Self::new(fetcher, chat_history_target(cfg))
    }

    pub fn fetcher(&self) -> &TranscriptFetcher {
        &self.fetcher
    }

    pub async fn fetch(
        &self,
        conversation_id: &ConversationId,
        cancel: &CancellationToken,
    ) -> Result<Vec<TranscriptEntry>, FetchError> {
        self.fetcher.fetch(conversation_id, cancel).await
    }

    /// Runs the bounded-retry fetch, maps entries for `chat_id`, and saves them.
    ///
    /// Retry exhaustion and cancellation are outcomes, not errors; a failed save is an error.
    pub async fn sync(
        &self,
        conversation_id: &ConversationId,
        chat_id: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<SyncOutcome> {
        let Some(target) = self.target.as_ref() else {
            return Err(anyhow!(
                "chat history is not configured (set chat_history_base_url and user_id)"
            ));
        };
        if chat_id.trim().is_empty() {
            return Err(anyhow!("missing chat id"));
        }

        let entries = match self.fetcher.fetch(conversation_id, cancel).await {
            Ok(entries) => entries,
            Err(FetchError::NotReady {
                attempts,
                last_error,
            }) => {
                log::warn!(
                    "transcript for {conversation_id} not saved: not ready after {attempts} attempts"
                );
                return Ok(SyncOutcome::NotReady {
                    attempts,
                    last_error,
                });
            }
            Err(FetchError::Cancelled) => {
                log::info!("transcript sync for {conversation_id} cancelled");
                return Ok(SyncOutcome::Cancelled);
            }
        };

        let rows = to_chat_history(&entries, chat_id, Utc::now());
        if rows.is_empty() {
            return Ok(SyncOutcome::NothingToSave);
        }

        target.sink.save(&target.user_id, &rows).await?;
        Ok(SyncOutcome::Saved { rows: rows.len() })
    }
}

fn chat_history_target(cfg: &AppConfig) -> Option<ChatHistoryTarget> {
    let base = cfg
        .chat_history_base_url
        .as_deref()
        .filter(|s| !s.trim().is_empty())?;
    let user_id = cfg.user_id.as_deref().filter(|s| !s.trim().is_empty())?;

    Some(ChatHistoryTarget {
        sink: Arc::new(HttpChatHistory::new(base)),
        user_id: user_id.to_string(),
    })
}
