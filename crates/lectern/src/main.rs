//! Lectern — document-aware chat gateway.
//!
//! Wires the configuration, LLM client, RAG backends, agent, and server
//! together. A configuration problem at startup exits non-zero; a clean
//! shutdown exits zero.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lectern_agent::{Agent, ToolRegistry};
use lectern_config::{Settings, VectorStoreKind};
use lectern_llm::{OllamaClient, SharedLlm};
use lectern_rag::{RagBackend, RagConfig, VectorStoreMode};
use lectern_server::{AppState, Server};

/// Document-aware chat gateway for a locally hosted LLM runtime.
#[derive(Parser)]
#[command(name = "lectern", version, about)]
struct Cli {
    /// Path to the YAML config file (default: config/lectern.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overriding config and environment
    #[arg(long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "lectern=debug,lectern_server=debug,lectern_rag=debug,lectern_llm=debug,lectern_agent=debug,info"
    } else {
        "lectern=info,lectern_server=info,lectern_rag=info,lectern_llm=info,lectern_agent=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        settings.server.bind_address = bind;
    }
    settings.validate()?;

    let llm: SharedLlm = Arc::new(OllamaClient::new(
        settings.llm.base_url.clone(),
        settings.llm.timeout_seconds,
    )?);

    let rag_config = RagConfig {
        embed_model: settings.llm.embedding_model.clone(),
        chunk_size: settings.rag.chunk_size,
        chunk_overlap: settings.rag.chunk_overlap,
        top_k: settings.rag.top_k,
        max_context_chars: settings.rag.max_context_chars,
    };

    let manual = RagBackend::manual(
        rag_config.clone(),
        llm.clone(),
        Some(settings.manual_store_path()),
    )?;

    let store_mode = match settings.rag.vectorstore {
        VectorStoreKind::Flat => VectorStoreMode::Flat,
        VectorStoreKind::Persistent => {
            VectorStoreMode::Persistent(settings.rag.vectorstore_path.clone())
        }
    };
    let framework = RagBackend::framework(rag_config, llm.clone(), store_mode)?;

    let agent = Agent::new(
        llm.clone(),
        settings.llm.generation_model.clone(),
        ToolRegistry::with_defaults(),
        settings.agent.max_steps,
    );

    tracing::info!(
        bind = %settings.server.bind_address,
        llm = %settings.llm.base_url,
        generation_model = %settings.llm.generation_model,
        embedding_model = %settings.llm.embedding_model,
        backend_default = %settings.rag.backend_default,
        "Lectern starting"
    );

    let state = AppState::new(llm, manual, framework, agent, settings);
    Server::new(state).run().await?;

    Ok(())
}
