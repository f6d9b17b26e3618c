//! pyrunner binary
//!
//! Line-oriented front end for the flow coordinator: edit a document, then
//! annotate it, generate tests, chat about it or ask for a continuation
//! while earlier requests are still in flight.
//!
//! ## Usage
//!
//! ```bash
//! pyrunner --file script.py
//! pyrunner --provider ollama --model qwen2.5-coder
//! PYRUNNER_LOG_DIR=/var/log pyrunner --discard-stale
//! ```

mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pyrunner_kernel::{
    Coordinator, CredentialStore, FlowInvoker, LlmProvider, PyrunnerConfig, StalePolicy,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Orchestrate code annotation, test generation, chat and suggestions.
#[derive(Parser, Debug)]
#[command(name = "pyrunner")]
#[command(about = "Concurrent generative flows over one code buffer")]
struct Args {
    /// Backend provider (anthropic or ollama)
    #[arg(long)]
    provider: Option<String>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Config file (default: $CONFIG_DIR/pyrunner/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load the document from this file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Drop results of superseded requests instead of applying them
    #[arg(long)]
    discard_stale: bool,
}

impl Args {
    fn apply_to(&self, config: &mut PyrunnerConfig) {
        if let Some(provider) = &self.provider {
            config.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(url) = &self.base_url {
            config.base_url = Some(url.clone());
        }
        if self.discard_stale {
            config.stale_results = StalePolicy::DiscardSuperseded;
        }
    }
}

fn load_config(args: &Args) -> Result<PyrunnerConfig> {
    let mut config = match &args.config {
        Some(path) => PyrunnerConfig::load_from(path)?,
        None => match PyrunnerConfig::default_path() {
            Some(path) => PyrunnerConfig::load_from(&path)?,
            None => PyrunnerConfig::default(),
        },
    };
    args.apply_to(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // File logging alongside stderr
    let log_dir = std::env::var("PYRUNNER_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir());
    let file_appender = tracing_appender::rolling::never(&log_dir, "pyrunner.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "pyrunner_cli=info,pyrunner_kernel=info,warn".into()
        }))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let provider: Arc<dyn LlmProvider> = config
        .provider_config()
        .build()
        .with_context(|| format!("cannot start provider {}", config.provider))?;
    tracing::info!(
        provider = provider.name(),
        model = provider.default_model(),
        stale = ?config.stale_results,
        "starting pyrunner"
    );

    let invoker = FlowInvoker::new(provider, config.invoker_settings());
    let mut coordinator = Coordinator::new(invoker, config.stale_results);
    if let Some(path) = &args.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        coordinator = coordinator.with_document(text);
    }

    let store = CredentialStore::default_path().map(CredentialStore::new);
    let credential = match &store {
        Some(store) => store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable credential store");
            None
        }),
        None => None,
    };

    repl::Repl::new(coordinator, credential, store).run().await
}
