use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bgvoice_core::error::VoiceError;
use bgvoice_core::session::{SessionEvent, SessionState, reduce};
use bgvoice_core::types::{ConversationId, SessionMode, SessionStatus, StopReason};
use tokio::sync::watch;

use crate::traits::{
    ConversationTokenSource, MessageObserver, MicrophonePermission, SessionConfig, VoiceVendor,
};

const NO_AGENT_ID: &str = "No agent ID provided";
const MIC_DENIED: &str = "Microphone permission denied";

/// Which session-initiation flow `start` uses.
#[derive(Clone)]
pub enum SessionAuth {
    /// Hand the API key and agent id to the SDK directly.
    ApiKey(String),
    /// Exchange the API key for a short-lived conversation token first.
    ConversationToken(Arc<dyn ConversationTokenSource>),
}

impl std::fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionAuth::ApiKey(_) => f.write_str("ApiKey([REDACTED])"),
            SessionAuth::ConversationToken(_) => f.write_str("ConversationToken"),
        }
    }
}

impl SessionAuth {
    async fn resolve(&self, agent_id: &str) -> anyhow::Result<SessionConfig> {
        match self {
            SessionAuth::ApiKey(api_key) => Ok(SessionConfig::ApiKey {
                api_key: api_key.clone(),
                agent_id: agent_id.to_string(),
            }),
            SessionAuth::ConversationToken(source) => {
                let token = source.conversation_token(agent_id).await?;
                Ok(SessionConfig::ConversationToken { token })
            }
        }
    }
}

struct Shared {
    state: Mutex<SessionState>,
    status_tx: watch::Sender<SessionState>,
    observer: Mutex<Option<Arc<dyn MessageObserver>>>,
}

impl Shared {
    fn new() -> Self {
        let (status_tx, _) = watch::channel(SessionState::default());
        Self {
            state: Mutex::new(SessionState::default()),
            status_tx,
            observer: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    // Never hold the state lock across an await: vendors call back re-entrantly.
    fn commit(&self, guard: &mut MutexGuard<'_, SessionState>, event: &SessionEvent) -> SessionState {
        let prev = guard.status;
        let next = reduce(&**guard, event);
        **guard = next.clone();

        if prev != next.status {
            log::info!("voice session: {:?} -> {:?}", prev, next.status);
        }
        self.status_tx.send_replace(next.clone());
        next
    }

    fn apply(&self, event: SessionEvent) -> SessionState {
        let mut guard = self.lock();
        self.commit(&mut guard, &event)
    }

    /// Applies `event` only if it belongs to the session started at `epoch`.
    fn apply_if_current(&self, epoch: u64, event: SessionEvent) -> Option<SessionState> {
        let mut guard = self.lock();
        if guard.epoch != epoch {
            log::debug!("dropping stale session event {event:?} (epoch {epoch} != {})", guard.epoch);
            return None;
        }
        Some(self.commit(&mut guard, &event))
    }

    /// Atomically moves an inactive session to `connecting`. Returns the new epoch.
    fn begin_start(&self) -> Option<u64> {
        let mut guard = self.lock();
        if guard.status.is_active() {
            return None;
        }
        Some(self.commit(&mut guard, &SessionEvent::StartRequested).epoch)
    }

    /// Marks an active session as user-stopped. `false` if a stop is already underway.
    fn request_stop(&self, epoch: u64) -> bool {
        let mut guard = self.lock();
        if guard.epoch != epoch || guard.stop_reason == StopReason::User {
            return false;
        }
        self.commit(&mut guard, &SessionEvent::StopRequested);
        true
    }

    fn observer(&self) -> Option<Arc<dyn MessageObserver>> {
        self.observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Callback surface handed to the vendor for one session.
///
/// Callbacks from a session that has since been replaced by a newer `start` are ignored.
#[derive(Clone)]
pub struct VendorCallbacks {
    shared: Arc<Shared>,
    epoch: u64,
}

impl VendorCallbacks {
    pub fn on_connect(&self, conversation_id: impl Into<String>) {
        let id = ConversationId::new(conversation_id);
        log::info!("voice session connected: conversation_id={id}");
        self.shared
            .apply_if_current(self.epoch, SessionEvent::Connected(id));
    }

    pub fn on_disconnect(&self) {
        log::info!("voice session disconnected");
        self.shared
            .apply_if_current(self.epoch, SessionEvent::Disconnected);
    }

    pub fn on_error(&self, message: impl Into<String>) {
        let message = message.into();
        log::error!("voice session error: {message}");
        self.shared
            .apply_if_current(self.epoch, SessionEvent::Error(message));
    }

    pub fn on_mode_change(&self, mode: SessionMode) {
        log::debug!("voice mode: {mode:?}");
        self.shared
            .apply_if_current(self.epoch, SessionEvent::ModeChanged(mode));
    }

    pub fn on_message(&self, payload: serde_json::Value) {
        if self.shared.snapshot().epoch != self.epoch {
            return;
        }
        if let Some(observer) = self.shared.observer() {
            observer.on_message(&payload);
        }
    }
}

/// Owns at most one vendor voice session and exposes a simplified status surface.
#[derive(Clone)]
pub struct VoiceSessionController {
    vendor: Arc<dyn VoiceVendor>,
    permission: Arc<dyn MicrophonePermission>,
    auth: SessionAuth,
    shared: Arc<Shared>,
}

impl VoiceSessionController {
    pub fn new(
        vendor: Arc<dyn VoiceVendor>,
        permission: Arc<dyn MicrophonePermission>,
        auth: SessionAuth,
    ) -> Self {
        Self {
            vendor,
            permission,
            auth,
            shared: Arc::new(Shared::new()),
        }
    }

    pub fn set_message_observer(&self, observer: Arc<dyn MessageObserver>) {
        *self
            .shared
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    pub fn state(&self) -> SessionState {
        self.shared.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.status_tx.subscribe()
    }

    /// Opens a vendor session for `agent_id`.
    ///
    /// A call while a session is already connecting or connected is a no-op.
    pub async fn start(&self, agent_id: &str) -> Result<(), VoiceError> {
        let current = self.shared.snapshot();
        if current.status.is_active() {
            log::info!("start ignored: session already {}", current.status.label());
            return Ok(());
        }

        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            log::error!("cannot start session: no agent id");
            self.shared
                .apply(SessionEvent::StartRejected(NO_AGENT_ID.into()));
            return Err(VoiceError::InvalidConfig(NO_AGENT_ID.into()));
        }

        let Some(epoch) = self.shared.begin_start() else {
            log::info!("start ignored: session started concurrently");
            return Ok(());
        };
        log::info!("starting voice session with agent {agent_id}");

        if !self.permission.request().await {
            self.shared
                .apply_if_current(epoch, SessionEvent::Error(MIC_DENIED.into()));
            return Err(VoiceError::PermissionDenied);
        }

        let config = match self.auth.resolve(agent_id).await {
            Ok(c) => c,
            Err(e) => {
                let msg = format!("{e:#}");
                self.shared
                    .apply_if_current(epoch, SessionEvent::Error(msg.clone()));
                return Err(VoiceError::VendorConnect(msg));
            }
        };

        // A stop (or newer start) may have landed while we were waiting.
        let current = self.shared.snapshot();
        if current.epoch != epoch || current.status != SessionStatus::Connecting {
            log::info!("start abandoned: session changed while connecting");
            return Ok(());
        }

        let callbacks = VendorCallbacks {
            shared: self.shared.clone(),
            epoch,
        };
        if let Err(e) = self.vendor.start_session(config, callbacks).await {
            let msg = format!("{e:#}");
            log::error!("vendor start_session failed: {msg}");
            self.shared
                .apply_if_current(epoch, SessionEvent::Error(msg.clone()));
            return Err(VoiceError::VendorConnect(msg));
        }

        Ok(())
    }

    /// Ends the current session and returns its conversation id, if one was assigned.
    ///
    /// A no-op returning `None` while idle; the last conversation id stays readable through
    /// [`Self::state`].
    pub async fn stop(&self) -> Result<Option<ConversationId>, VoiceError> {
        let current = self.shared.snapshot();
        match current.status {
            SessionStatus::Idle => {
                log::debug!("stop ignored: no session");
                Ok(None)
            }
            SessionStatus::Disconnected | SessionStatus::Error => {
                Ok(self.shared.apply(SessionEvent::Reset).conversation_id)
            }
            SessionStatus::Connecting | SessionStatus::Connected => {
                let epoch = current.epoch;
                if !self.shared.request_stop(epoch) {
                    log::info!("stop ignored: already stopping");
                    return Ok(self.shared.snapshot().conversation_id);
                }

                log::info!("ending voice session");
                if let Err(e) = self.vendor.end_session().await {
                    log::warn!("vendor end_session failed: {e:#}");
                }

                // Normally the vendor already reported the disconnect; settle if it did not.
                let settled = self
                    .shared
                    .apply_if_current(epoch, SessionEvent::Disconnected)
                    .unwrap_or_else(|| self.shared.snapshot());
                Ok(settled.conversation_id)
            }
        }
    }

    /// Mutes the microphone without tearing down the session.
    pub async fn pause(&self) -> Result<(), VoiceError> {
        self.set_muted(true).await
    }

    pub async fn resume(&self) -> Result<(), VoiceError> {
        self.set_muted(false).await
    }

    async fn set_muted(&self, muted: bool) -> Result<(), VoiceError> {
        let current = self.shared.snapshot();
        if current.status != SessionStatus::Connected {
            return Err(VoiceError::NoActiveSession);
        }

        self.vendor
            .set_mic_muted(muted)
            .await
            .map_err(|e| VoiceError::VendorSession(format!("{e:#}")))?;

        self.shared
            .apply_if_current(current.epoch, SessionEvent::MuteChanged(muted));
        Ok(())
    }
}
