use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use bgvoice_core::config::{AppConfig, AuthFlow};
use bgvoice_core::error::VoiceError;
use bgvoice_core::session::SessionState;
use bgvoice_core::types::ConversationId;
use bgvoice_engine::controller::{SessionAuth, VoiceSessionController};
use bgvoice_engine::traits::{MessageObserver, MicrophonePermission, VoiceVendor};
use bgvoice_providers::events::{
    ConvaiEvent, EventStreamConfig, EventStreamHandle, spawn_event_stream,
};
use bgvoice_runtime::config_store::ConfigStore;
use bgvoice_runtime::convai::ElevenLabsConvai;
use bgvoice_runtime::secrets::resolve_api_key;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::sync::{SyncOutcome, TranscriptSync};

/// Short, actionable text for the indicator area; details are in the logs.
pub fn user_facing_error(e: &VoiceError) -> String {
    match e {
        VoiceError::InvalidConfig(msg) => msg.clone(),
        VoiceError::PermissionDenied => {
            "Microphone access is blocked. Allow microphone access and try again.".into()
        }
        VoiceError::VendorConnect(_) => "Failed to start voice agent".into(),
        VoiceError::VendorSession(_) => "Failed to update the microphone".into(),
        VoiceError::NoActiveSession => "No active conversation".into(),
        VoiceError::TranscriptNotReady { .. } => {
            "The conversation transcript is not available yet.".into()
        }
    }
}

/// Wires a voice session to the configured vendor endpoints and, once it ends, copies its
/// transcript into chat history.
#[derive(Clone)]
pub struct VoiceAgentService {
    cfg: AppConfig,
    convai: ElevenLabsConvai,
    controller: VoiceSessionController,
    transcripts: TranscriptSync,

    // Cancels the in-flight transcript sync when a new session starts or on shutdown.
    fetch_cancel: Arc<Mutex<CancellationToken>>,
    events: Arc<Mutex<Option<EventStreamHandle>>>,
}

impl VoiceAgentService {
    pub fn new(
        cfg: AppConfig,
        api_key: impl Into<String>,
        vendor: Arc<dyn VoiceVendor>,
        permission: Arc<dyn MicrophonePermission>,
    ) -> anyhow::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!("missing ElevenLabs API key"));
        }

        let convai = ElevenLabsConvai::new(cfg.api_base_url.clone(), api_key.clone());

        let auth = match cfg.auth_flow {
            AuthFlow::ApiKey => SessionAuth::ApiKey(api_key),
            AuthFlow::ConversationToken => SessionAuth::ConversationToken(Arc::new(convai.clone())),
        };
        let controller = VoiceSessionController::new(vendor, permission, auth);

        let transcripts = TranscriptSync::with_convai(&cfg, convai.clone());

        Ok(Self {
            cfg,
            convai,
            controller,
            transcripts,
            fetch_cancel: Arc::new(Mutex::new(CancellationToken::new())),
            events: Arc::new(Mutex::new(None)),
        })
    }

    /// Loads config from `config_path` and the API key from the environment or keyring.
    pub fn open(
        config_path: PathBuf,
        vendor: Arc<dyn VoiceVendor>,
        permission: Arc<dyn MicrophonePermission>,
    ) -> anyhow::Result<Self> {
        let cfg = ConfigStore::at_path(config_path).load()?;
        let api_key = resolve_api_key()?
            .ok_or_else(|| anyhow!("no ElevenLabs API key; run `bgvoice set-key` first"))?;
        Self::new(cfg, api_key, vendor, permission)
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.controller.subscribe()
    }

    pub fn set_message_observer(&self, observer: Arc<dyn MessageObserver>) {
        self.controller.set_message_observer(observer);
    }

    /// Starts a session with the configured agent. Once a new session actually begins, any
    /// transcript sync still polling for the previous one is abandoned; a rejected or
    /// duplicate start leaves it running.
    pub async fn start(&self) -> Result<(), VoiceError> {
        let before = self.controller.state().epoch;
        let result = self.controller.start(&self.cfg.agent_id).await;
        if self.controller.state().epoch != before {
            self.cancel_pending_fetch();
        }
        result
    }

    pub async fn stop(&self) -> Result<Option<ConversationId>, VoiceError> {
        self.close_event_stream().await;
        self.controller.stop().await
    }

    pub async fn pause(&self) -> Result<(), VoiceError> {
        self.controller.pause().await
    }

    pub async fn resume(&self) -> Result<(), VoiceError> {
        self.controller.resume().await
    }

    pub async fn sync_transcript(
        &self,
        conversation_id: &ConversationId,
        chat_id: &str,
    ) -> anyhow::Result<SyncOutcome> {
        let cancel = self.current_fetch_token();
        self.transcripts.sync(conversation_id, chat_id, &cancel).await
    }

    /// Ends the session and syncs its transcript. `None` if no conversation was assigned.
    pub async fn stop_and_sync(&self, chat_id: &str) -> anyhow::Result<Option<SyncOutcome>> {
        let Some(conversation_id) = self.stop().await? else {
            log::info!("session ended without a conversation id; nothing to sync");
            return Ok(None);
        };
        let outcome = self.sync_transcript(&conversation_id, chat_id).await?;
        Ok(Some(outcome))
    }

    /// Opens the conversation event stream if enabled in config. Replaces any open stream.
    pub async fn watch_events(
        &self,
        conversation_id: &ConversationId,
    ) -> anyhow::Result<Option<mpsc::Receiver<ConvaiEvent>>> {
        if !self.cfg.event_stream_enabled {
            return Ok(None);
        }

        self.close_event_stream().await;
        let stream_cfg =
            EventStreamConfig::for_conversation(self.convai.config(), conversation_id.as_str())?;
        let (handle, rx) = spawn_event_stream(stream_cfg)?;
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(Some(rx))
    }

    /// Stops the session and cancels background work. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.cancel_pending_fetch();
        if let Err(e) = self.stop().await {
            log::warn!("stop during shutdown failed: {e}");
        }
    }

    fn current_fetch_token(&self) -> CancellationToken {
        self.fetch_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cancel_pending_fetch(&self) {
        let mut guard = self.fetch_cancel.lock().unwrap_or_else(PoisonError::into_inner);
        guard.cancel();
        *guard = CancellationToken::new();
    }

    async fn close_event_stream(&self) {
        let handle = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
