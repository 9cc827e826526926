//! ragchat - Terminal Client for the Document Chat Service
//!
//! Reads questions from stdin and prints streamed answers to stdout. Logs go
//! to stderr so stdout stays clean for piping.
//!
//! # Usage
//!
//! ```bash
//! # Ask against the configured server
//! ragchat
//!
//! # Authenticated, scoped to two documents
//! ragchat --token "$TOKEN" --document d1 --document d2
//!
//! # Continue a stored conversation
//! ragchat --conversation 6f1c...
//!
//! # Verbose logging
//! RUST_LOG=ragchat_core=debug ragchat
//! ```
//!
//! # Commands
//!
//! - `/new`: start a new conversation
//! - `/load <id>`: replace the conversation with a stored one
//! - `/quit`: exit
//!
//! # Signals
//!
//! - Ctrl+C while an answer streams: stop it and keep the partial answer
//! - Ctrl+C at the prompt: exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ragchat_core::{
    default_config_path, load_config_from_path, ChatError, ConfigOverrides,
    ConversationOrchestrator, ConversationUpdate, CredentialManager, HttpCredentialRenewer,
    HttpTransport, MemoryCredentialStore, SearchStatus, SourceRef, StreamPhase, SystemClock,
};

/// ragchat - ask questions about your documents from the terminal
#[derive(Parser, Debug)]
#[command(name = "ragchat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "RAGCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Answer service base URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// LLM provider
    #[arg(long)]
    provider: Option<String>,

    /// Model name
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Answer without document retrieval
    #[arg(long)]
    no_rag: bool,

    /// Restrict retrieval to a document (repeatable)
    #[arg(short = 'd', long = "document", value_name = "ID")]
    documents: Vec<String>,

    /// Access token
    #[arg(long, env = "RAGCHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Remaining lifetime of --token in seconds
    #[arg(long, default_value_t = 3600, value_name = "SECS")]
    token_ttl: u64,

    /// Refresh token used to renew the access token
    #[arg(long, env = "RAGCHAT_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Load a stored conversation before the first prompt
    #[arg(long, value_name = "ID")]
    conversation: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "RAGCHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.base_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(ref provider) = self.provider {
            overrides = overrides.with_provider(provider.clone());
        }
        if let Some(ref model) = self.model {
            overrides = overrides.with_model(model.clone());
        }
        overrides.disable_rag = self.no_rag;
        overrides.document_ids.clone_from(&self.documents);
        overrides
    }
}

/// Prints conversation updates as they arrive
#[derive(Default)]
struct Renderer {
    sources: Vec<SourceRef>,
}

impl Renderer {
    /// Render one update; returns `true` once the answer has finished
    async fn render<W>(&mut self, out: &mut W, update: ConversationUpdate) -> std::io::Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        let mut finished = false;
        match update {
            ConversationUpdate::ContentDelta { delta, .. } => {
                out.write_all(delta.as_bytes()).await?;
            }
            ConversationUpdate::ContentReplaced { content, .. } => {
                out.write_all(format!("\r\n{content}").as_bytes()).await?;
            }
            ConversationUpdate::Search(SearchStatus::Searching { query }) => {
                out.write_all(format!("[searching: {query}]\n").as_bytes())
                    .await?;
            }
            ConversationUpdate::Search(SearchStatus::Found { count, .. }) => {
                out.write_all(format!("[{count} passages found]\n").as_bytes())
                    .await?;
            }
            ConversationUpdate::Sources { sources, .. } => {
                self.sources = sources;
            }
            ConversationUpdate::IdAssigned { id, elapsed_ms, .. } => {
                debug!(message_id = %id.0, ?elapsed_ms, "Answer stored");
            }
            ConversationUpdate::Finished { phase, .. } => {
                out.write_all(b"\n").await?;
                if phase == StreamPhase::Cancelled {
                    out.write_all(b"[stopped]\n").await?;
                }
                for source in self.sources.drain(..) {
                    let page = source
                        .page_number
                        .map(|p| format!(", p. {p}"))
                        .unwrap_or_default();
                    out.write_all(
                        format!("  [{}] {}{page}\n", source.index, source.document_name)
                            .as_bytes(),
                    )
                    .await?;
                }
                finished = true;
            }
            ConversationUpdate::MessageAdded(_)
            | ConversationUpdate::SessionStarted { .. }
            | ConversationUpdate::Search(SearchStatus::Idle)
            | ConversationUpdate::Structured { .. }
            | ConversationUpdate::Reset { .. } => {}
        }
        out.flush().await?;
        Ok(finished)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("ragchat={}", args.log_level).parse()?)
                .add_directive(format!("ragchat_core={}", args.log_level).parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))
        .context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command-line override")?;
    info!(
        source = %config.source(),
        base_url = %config.server.base_url,
        provider = %config.chat.provider,
        "Configuration loaded"
    );

    let transport = Arc::new(
        HttpTransport::new(config.server.connect_timeout)
            .context("Failed to create HTTP client")?,
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orchestrator = ConversationOrchestrator::new(transport, &config, tx);

    if args.token.is_some() || args.refresh_token.is_some() {
        let mut renewer =
            HttpCredentialRenewer::new(config.server.refresh_url(), config.server.connect_timeout)
                .context("Failed to create renewal client")?;
        if let Some(ref refresh_token) = args.refresh_token {
            renewer = renewer.with_refresh_token(refresh_token.clone());
        }
        let credentials = CredentialManager::with_clock(
            Arc::new(renewer),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(SystemClock),
            config.renewal_buffer,
        );
        if let Some(ref token) = args.token {
            credentials.save(token.clone(), args.token_ttl);
        }
        orchestrator = orchestrator.with_credentials(credentials);
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut renderer = Renderer::default();

    if let Some(ref id) = args.conversation {
        load_conversation(&orchestrator, &mut stdout, id).await?;
    }

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                orchestrator.new_conversation();
                stdout.write_all(b"[new conversation]\n").await?;
                continue;
            }
            _ => {}
        }
        if let Some(id) = line.strip_prefix("/load ") {
            load_conversation(&orchestrator, &mut stdout, id.trim()).await?;
            continue;
        }

        match orchestrator.send_message(line).await {
            Ok(()) => {}
            Err(ChatError::StreamInProgress) => {
                warn!("An answer is still streaming");
                continue;
            }
            Err(e) => {
                stdout.write_all(format!("[{e}]\n").as_bytes()).await?;
                continue;
            }
        }

        loop {
            tokio::select! {
                update = rx.recv() => {
                    let Some(update) = update else {
                        return Ok(());
                    };
                    if renderer.render(&mut stdout, update).await? {
                        break;
                    }
                }
                _ = signal::ctrl_c() => {
                    orchestrator.stop_streaming();
                }
            }
        }

        if let Some(ms) = orchestrator.messages().last().and_then(|m| m.elapsed_ms) {
            info!(elapsed_ms = ms, "Answer complete");
        }
    }

    orchestrator.stop_streaming();
    info!("Goodbye");
    Ok(())
}

async fn load_conversation<T, W>(
    orchestrator: &ConversationOrchestrator<T>,
    out: &mut W,
    id: &str,
) -> Result<()>
where
    T: ragchat_core::Transport,
    W: AsyncWrite + Unpin,
{
    match orchestrator.load_history(id).await {
        Ok(count) => {
            for message in orchestrator.messages() {
                out.write_all(format!("{:?}: {}\n", message.role, message.content).as_bytes())
                    .await?;
            }
            info!(conversation_id = id, messages = count, "Conversation loaded");
        }
        Err(e) => {
            out.write_all(format!("[could not load {id}: {e}]\n").as_bytes())
                .await?;
        }
    }
    out.flush().await?;
    Ok(())
}
