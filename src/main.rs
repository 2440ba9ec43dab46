//! urlstate playground
//!
//! Runs one synchronization instance against an in-memory browser history and
//! lets you mutate state, navigate back and forward, and watch the URL.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use urlstate::cli::{self, Playground};
use urlstate::config::SyncConfig;
use urlstate::location::{HistoryMode, Host, MemoryHistory};
use urlstate::sync::UrlStateSync;

const DEFAULT_URL: &str = "https://app.local/";

/// urlstate - keep application state in the URL query string
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "URLSTATE_CONFIG")]
    config: Option<PathBuf>,

    /// Initial URL (overrides the configuration)
    #[arg(short, long)]
    url: Option<String>,

    /// Namespace for query keys (overrides the configuration)
    #[arg(short, long)]
    namespace: Option<String>,

    /// Debounce window in milliseconds, 0 to write synchronously
    #[arg(long)]
    debounce_ms: Option<i64>,

    /// History mode: replace or push
    #[arg(long)]
    history: Option<HistoryMode>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Also write daily-rotated logs to this directory
    #[arg(long, env = "URLSTATE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if args.print_schema {
        println!("{}", SyncConfig::schema()?);
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_logging(&args.log_level, args.log_dir.as_deref())?;

    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path.display());
            SyncConfig::load(path).await?
        }
        None => SyncConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let url = config.url.clone().unwrap_or_else(|| DEFAULT_URL.to_string());
    let history = Arc::new(MemoryHistory::new(url));
    let (defaults, options) = config.into_parts();
    let sync = UrlStateSync::initialize(Host::from(history.clone()), defaults, options);

    cli::run_repl(Playground::new(history, sync)).await?;

    info!("Playground closed");
    Ok(())
}

fn apply_overrides(config: &mut SyncConfig, args: &Args) {
    if let Some(url) = &args.url {
        config.url = Some(url.clone());
    }
    if let Some(namespace) = &args.namespace {
        config.namespace = Some(namespace.clone());
    }
    if let Some(ms) = args.debounce_ms {
        config.debounce_ms = Some(ms);
    }
    if let Some(history) = args.history {
        config.history = Some(history);
    }
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "urlstate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();

    Ok(guard)
}
