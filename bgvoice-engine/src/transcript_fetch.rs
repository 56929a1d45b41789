use std::sync::Arc;
use std::time::Duration;

use bgvoice_core::config::TranscriptPolling;
use bgvoice_core::transcript::filter_blank_entries;
use bgvoice_core::types::{ConversationId, TranscriptEntry};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::traits::TranscriptSource;

/// Fixed-count, fixed-delay polling. No backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        TranscriptPolling::default().into()
    }
}

impl From<TranscriptPolling> for RetryPolicy {
    fn from(p: TranscriptPolling) -> Self {
        Self {
            max_attempts: p.max_attempts.max(1),
            delay: Duration::from_millis(p.delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transcript not ready after {attempts} attempts")]
    NotReady {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("transcript fetch cancelled")]
    Cancelled,
}

/// Retrieves a finalized conversation transcript, tolerating that transcription lags the
/// end of the call.
#[derive(Clone)]
pub struct TranscriptFetcher {
    source: Arc<dyn TranscriptSource>,
    policy: RetryPolicy,
}

impl TranscriptFetcher {
    pub fn new(source: Arc<dyn TranscriptSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Polls until the conversation is `done` with a non-empty transcript.
    ///
    /// Returns the non-blank entries. Requests are separated by the policy delay; there is
    /// no delay after the final attempt.
    pub async fn fetch(
        &self,
        conversation_id: &ConversationId,
        cancel: &CancellationToken,
    ) -> Result<Vec<TranscriptEntry>, FetchError> {
        let max = self.policy.max_attempts.max(1);
        let mut last_error: Option<String> = None;

        for attempt in 1..=max {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            match self.source.fetch_conversation(conversation_id).await {
                Ok(snapshot) if snapshot.is_ready() => {
                    let entries = filter_blank_entries(snapshot.transcript);
                    log::info!(
                        "transcript ready for {conversation_id}: {} entries after {attempt} attempt(s)",
                        entries.len()
                    );
                    return Ok(entries);
                }
                Ok(snapshot) => {
                    log::info!(
                        "transcript still processing ({:?}), attempt {attempt}/{max}",
                        snapshot.status
                    );
                    last_error = None;
                }
                Err(e) => {
                    log::warn!("transcript fetch attempt {attempt}/{max} failed: {e:#}");
                    last_error = Some(format!("{e:#}"));
                }
            }

            if attempt < max {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(self.policy.delay) => {}
                }
            }
        }

        log::warn!("transcript for {conversation_id} not ready after {max} attempts");
        Err(FetchError::NotReady {
            attempts: max,
            last_error,
        })
    }
}
