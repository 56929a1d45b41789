use serde::{Deserialize, Serialize};

use crate::types::{ConversationId, SessionMode, SessionStatus, StopReason};

pub const DROPPED_SESSION_MESSAGE: &str = "voice session ended unexpectedly";

/// Snapshot of one controller's voice session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub status: SessionStatus,
    pub mode: SessionMode,
    pub conversation_id: Option<ConversationId>,
    pub error: Option<String>,
    pub muted: bool,
    pub stop_reason: StopReason,

    // Bumped on every start; callbacks tagged with an older epoch are stale.
    pub epoch: u64,
}

impl SessionState {
    pub fn is_speaking(&self) -> bool {
        self.status == SessionStatus::Connected && self.mode == SessionMode::Speaking
    }

    pub fn is_listening(&self) -> bool {
        self.status == SessionStatus::Connected && self.mode == SessionMode::Listening
    }

    /// Short line for the indicator area. Errors replace the normal mode label.
    pub fn status_line(&self) -> String {
        if let Some(err) = self.error.as_ref() {
            return err.clone();
        }

        match self.status {
            SessionStatus::Connected => match self.mode {
                SessionMode::Listening => "listening".into(),
                SessionMode::Speaking => "speaking".into(),
                SessionMode::Thinking => "thinking".into(),
                SessionMode::Idle if self.muted => "paused".into(),
                SessionMode::Idle => "connected".into(),
            },
            other => other.label().into(),
        }
    }
}

/// Inputs to the session state machine: explicit lifecycle calls plus vendor callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StartRequested,
    /// `start` refused before any session opened. Always surfaced, even after a user stop.
    StartRejected(String),
    StopRequested,
    /// Back to idle after a stop on a session that was already closed.
    Reset,
    MuteChanged(bool),

    Connected(ConversationId),
    Disconnected,
    Error(String),
    ModeChanged(SessionMode),
}

/// Applies one event to a state snapshot.
///
/// An observed error is terminal for the session: only `StartRequested`, `Reset` or a
/// user stop move away from it.
pub fn reduce(state: &SessionState, event: &SessionEvent) -> SessionState {
    let mut next = state.clone();

    match event {
        SessionEvent::StartRequested => {
            next = SessionState {
                status: SessionStatus::Connecting,
                epoch: state.epoch.wrapping_add(1),
                ..SessionState::default()
            };
        }

        SessionEvent::StartRejected(message) => {
            next.status = SessionStatus::Error;
            next.mode = SessionMode::Idle;
            next.muted = false;
            next.stop_reason = StopReason::None;
            next.error = Some(message.clone());
        }

        SessionEvent::StopRequested => {
            next.stop_reason = StopReason::User;
        }

        SessionEvent::Reset => {
            next.status = SessionStatus::Idle;
            next.mode = SessionMode::Idle;
            next.error = None;
            next.muted = false;
        }

        SessionEvent::MuteChanged(muted) => {
            next.muted = *muted;
        }

        SessionEvent::Connected(id) => {
            if state.status.is_active() {
                next.status = SessionStatus::Connected;
                next.conversation_id = Some(id.clone());
                next.error = None;
            }
        }

        SessionEvent::Disconnected => match state.status {
            SessionStatus::Error => {
                next.mode = SessionMode::Idle;
            }
            _ if state.stop_reason == StopReason::User => {
                next.status = SessionStatus::Idle;
                next.mode = SessionMode::Idle;
                next.muted = false;
            }
            s if s.is_active() => {
                next.status = SessionStatus::Disconnected;
                next.mode = SessionMode::Idle;
                next.muted = false;
                next.stop_reason = StopReason::Vendor;
                next.error = Some(DROPPED_SESSION_MESSAGE.into());
            }
            _ => {}
        },

        SessionEvent::Error(message) => {
            let stopped_by_user =
                state.status == SessionStatus::Idle && state.stop_reason == StopReason::User;
            if !stopped_by_user {
                next.status = SessionStatus::Error;
                next.mode = SessionMode::Idle;
                next.error = Some(message.clone());
            }
        }

        SessionEvent::ModeChanged(mode) => {
            if state.status == SessionStatus::Connected {
                next.mode = *mode;
            }
        }
    }

    next
}
