use std::path::PathBuf;

use anyhow::{Context, anyhow};
use bgvoice_appcore::sync::{SyncOutcome, TranscriptSync};
use bgvoice_core::config::AppConfig;
use bgvoice_core::types::ConversationId;
use bgvoice_engine::traits::ConversationTokenSource;
use bgvoice_engine::transcript_fetch::FetchError;
use bgvoice_providers::events::{ConvaiEvent, EventStreamConfig, spawn_event_stream};
use bgvoice_runtime::config_store::ConfigStore;
use bgvoice_runtime::convai::ElevenLabsConvai;
use bgvoice_runtime::secrets::{SecretKey, delete_secret, resolve_api_key, set_secret};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// Voice-agent plumbing: conversation tokens, transcripts, chat-history sync and the
/// conversation event stream.
#[derive(Debug, Parser)]
#[command(name = "bgvoice", version)]
struct Cli {
    /// Path of the JSON config file.
    #[arg(long, global = true, env = "BGVOICE_CONFIG", default_value = "bgvoice.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Store the ElevenLabs API key in the OS keyring.
    SetKey { key: String },

    /// Remove the stored ElevenLabs API key.
    ClearKey,

    /// Exchange the API key for a short-lived conversation token.
    Token {
        #[arg(long)]
        agent_id: Option<String>,
    },

    /// Poll until the conversation transcript is final and print it as JSON.
    Transcript { conversation_id: String },

    /// Fetch a finished transcript and save it to chat history.
    Sync {
        conversation_id: String,
        #[arg(long)]
        chat_id: String,
    },

    /// Print conversation events until Ctrl-C.
    Events { conversation_id: String },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Write a config file with defaults.
    Init {
        #[arg(long)]
        agent_id: Option<String>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the current config.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = ConfigStore::at_path(&cli.config);

    match cli.command {
        Command::Config(ConfigCommand::Init { agent_id, force }) => {
            if store.exists() && !force {
                return Err(anyhow!(
                    "{} already exists (use --force to overwrite)",
                    store.path().display()
                ));
            }
            let cfg = AppConfig {
                agent_id: agent_id.unwrap_or_default(),
                api_key_present: api_key_present(),
                ..AppConfig::default()
            };
            store.save(&cfg)?;
            println!("wrote {}", store.path().display());
        }

        Command::Config(ConfigCommand::Show) => {
            let mut cfg = store.load_or_default()?;
            cfg.api_key_present = api_key_present();
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }

        Command::SetKey { key } => {
            let key = key.trim();
            if key.is_empty() {
                return Err(anyhow!("refusing to store an empty API key"));
            }
            set_secret(SecretKey::ElevenLabsApiKey, key)?;
            mark_key_present(&store, true)?;
            println!("stored ElevenLabs API key");
        }

        Command::ClearKey => {
            delete_secret(SecretKey::ElevenLabsApiKey)?;
            mark_key_present(&store, false)?;
            println!("removed ElevenLabs API key");
        }

        Command::Token { agent_id } => {
            let cfg = store.load()?;
            let agent_id = agent_id.unwrap_or_else(|| cfg.agent_id.clone());
            if agent_id.trim().is_empty() {
                return Err(anyhow!("No agent ID provided"));
            }
            let token = convai(&cfg)?.conversation_token(&agent_id).await?;
            println!("{token}");
        }

        Command::Transcript { conversation_id } => {
            let cfg = store.load()?;
            let sync = TranscriptSync::with_convai(&cfg, convai(&cfg)?);
            let cancel = cancel_on_ctrl_c();

            match sync.fetch(&ConversationId::new(conversation_id), &cancel).await {
                Ok(entries) => println!("{}", serde_json::to_string_pretty(&entries)?),
                Err(FetchError::NotReady {
                    attempts,
                    last_error,
                }) => {
                    return Err(anyhow!(
                        "transcript not ready after {attempts} attempts{}",
                        last_error.map(|e| format!(" (last error: {e})")).unwrap_or_default()
                    ));
                }
                Err(FetchError::Cancelled) => log::info!("cancelled"),
            }
        }

        Command::Sync {
            conversation_id,
            chat_id,
        } => {
            let cfg = store.load()?;
            let sync = TranscriptSync::with_convai(&cfg, convai(&cfg)?);
            let cancel = cancel_on_ctrl_c();

            let outcome = sync
                .sync(&ConversationId::new(conversation_id), &chat_id, &cancel)
                .await?;
            match outcome {
                SyncOutcome::Saved { rows } => println!("saved {rows} messages"),
                SyncOutcome::NothingToSave => println!("transcript had no messages"),
                SyncOutcome::Cancelled => log::info!("cancelled"),
                SyncOutcome::NotReady { .. } => {
                    let err = outcome
                        .error()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "transcript not ready".into());
                    return Err(anyhow!(err));
                }
            }
        }

        Command::Events { conversation_id } => {
            let cfg = store.load()?;
            let client = convai(&cfg)?;
            let stream_cfg = EventStreamConfig::for_conversation(client.config(), &conversation_id)?;
            let (handle, mut rx) = spawn_event_stream(stream_cfg)?;

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        handle.shutdown().await;
                        break;
                    }
                    evt = rx.recv() => match evt {
                        Some(evt) => println!("{}", describe(&evt)),
                        None => break,
                    },
                }
            }
        }
    }

    Ok(())
}

fn convai(cfg: &AppConfig) -> anyhow::Result<ElevenLabsConvai> {
    let api_key = resolve_api_key()?
        .ok_or_else(|| anyhow!("no ElevenLabs API key; run `bgvoice set-key` first"))?;
    Ok(ElevenLabsConvai::new(cfg.api_base_url.clone(), api_key))
}

fn api_key_present() -> bool {
    match resolve_api_key() {
        Ok(key) => key.is_some(),
        Err(e) => {
            log::warn!("cannot read keyring: {e:#}");
            false
        }
    }
}

fn mark_key_present(store: &ConfigStore, present: bool) -> anyhow::Result<()> {
    if !store.exists() {
        return Ok(());
    }
    let mut cfg = store.load()?;
    cfg.api_key_present = present;
    store.save(&cfg).context("update config")
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

fn describe(evt: &ConvaiEvent) -> String {
    match evt {
        ConvaiEvent::Connected => "[connected]".into(),
        ConvaiEvent::UserTranscript { text } => format!("user: {text}"),
        ConvaiEvent::AgentResponse { text } => format!("agent: {text}"),
        ConvaiEvent::ToolCall {
            tool_name,
            parameters,
            ..
        } => format!("[tool] {tool_name} {parameters}"),
        ConvaiEvent::Interruption => "[interrupted]".into(),
        ConvaiEvent::Ping { .. } => "[ping]".into(),
        ConvaiEvent::Error { code, message } => format!("[error {code}] {message}"),
        ConvaiEvent::Other { kind, .. } => format!("[{kind}]"),
    }
}
