use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Role, TranscriptEntry};

/// Drops entries whose message is empty or whitespace-only. Order is preserved.
pub fn filter_blank_entries(entries: Vec<TranscriptEntry>) -> Vec<TranscriptEntry> {
    entries.into_iter().filter(|e| !e.is_blank()).collect()
}

/// One row of the chat-history persistence payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryRow {
    pub text: String,
    pub sender: Role,
    pub chat_id: String,
    pub sent_date: String,
}

/// Maps a finished voice transcript into chat-history rows for `chat_id`.
///
/// All rows share `sent_at`; blank utterances are skipped.
pub fn to_chat_history(
    entries: &[TranscriptEntry],
    chat_id: &str,
    sent_at: DateTime<Utc>,
) -> Vec<ChatHistoryRow> {
    let sent_date = sent_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    entries
        .iter()
        .filter(|e| !e.is_blank())
        .map(|e| ChatHistoryRow {
            text: e.message.trim().to_string(),
            sender: e.role,
            chat_id: chat_id.to_string(),
            sent_date: sent_date.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filters_blank_messages() {
        let out = filter_blank_entries(vec![
            TranscriptEntry::new(Role::User, "hi", 0.0),
            TranscriptEntry::new(Role::Assistant, "", 1.0),
            TranscriptEntry::new(Role::Assistant, "   ", 2.0),
            TranscriptEntry::new(Role::Assistant, "hello", 3.0),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].message, "hi");
        assert_eq!(out[1].message, "hello");
    }

    #[test]
    fn maps_roles_to_senders_with_iso_date() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let rows = to_chat_history(
            &[
                TranscriptEntry::new(Role::User, " hi ", 0.0),
                TranscriptEntry::new(Role::Assistant, "\n", 0.5),
                TranscriptEntry::new(Role::Assistant, "How can I help?", 1.2),
            ],
            "chat-42",
            at,
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "hi");
        assert_eq!(rows[0].sender, Role::User);
        assert_eq!(rows[1].sender, Role::Assistant);
        assert_eq!(rows[1].chat_id, "chat-42");
        assert_eq!(rows[1].sent_date, "2025-03-01T12:30:00.000Z");
    }

    #[test]
    fn row_serializes_with_camel_case_keys() {
        let row = ChatHistoryRow {
            text: "hi".into(),
            sender: Role::User,
            chat_id: "c".into(),
            sent_date: "2025-03-01T12:30:00.000Z".into(),
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"chatId\":\"c\""));
        assert!(json.contains("\"sentDate\""));
        assert!(json.contains("\"sender\":\"user\""));
    }
}
