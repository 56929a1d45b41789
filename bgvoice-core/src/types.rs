use serde::{Deserialize, Deserializer, Serialize};

/// Opaque conversation identifier issued by the vendor once a session connects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    // The transcript endpoint reports the agent side as "agent"; older payloads say "assistant".
    #[serde(alias = "agent")]
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    // Tool-call turns come back with `"message": null`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
    #[serde(default)]
    pub time_in_call_secs: f64,
}

fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

impl TranscriptEntry {
    pub fn new(role: Role, message: impl Into<String>, time_in_call_secs: f64) -> Self {
        Self {
            role,
            message: message.into(),
            time_in_call_secs,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl SessionStatus {
    /// A vendor session is open (or being opened).
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Connected)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Error => "error",
        }
    }
}

/// What the agent is doing while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Listening,
    Speaking,
    Thinking,
    #[default]
    Idle,
}

/// Why the last session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    None,
    User,
    Vendor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_accepts_agent_alias() {
        let r: Role = serde_json::from_str("\"agent\"").unwrap();
        assert_eq!(r, Role::Assistant);
        let r: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(r, Role::User);
    }

    #[test]
    fn null_message_decodes_as_blank() {
        let e: TranscriptEntry =
            serde_json::from_str(r#"{"role":"agent","message":null,"time_in_call_secs":4}"#)
                .unwrap();
        assert!(e.is_blank());
        assert_eq!(e.time_in_call_secs, 4.0);
    }

    #[test]
    fn only_connecting_and_connected_are_active() {
        assert!(SessionStatus::Connecting.is_active());
        assert!(SessionStatus::Connected.is_active());
        assert!(!SessionStatus::Idle.is_active());
        assert!(!SessionStatus::Disconnected.is_active());
        assert!(!SessionStatus::Error.is_active());
    }

    #[test]
    fn entry_blankness_ignores_whitespace() {
        assert!(TranscriptEntry::new(Role::User, " \n\t", 0.0).is_blank());
        assert!(!TranscriptEntry::new(Role::User, " hi ", 0.0).is_blank());
    }
}
