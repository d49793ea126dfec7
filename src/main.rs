use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use autonomy::config::AppConfig;

mod cli;

#[derive(Parser)]
#[command(name = "autonomy", version)]
#[command(about = "A conversational assistant that scaffolds web projects and edits them with a local model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Show planned changes without writing files or running tools")]
    dry_run: bool,

    #[arg(long, global = true, help = "Path to a YAML config file (default: ./autonomy.yml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Inference endpoint base URL")]
    endpoint: Option<String>,

    #[arg(long = "model", global = true, help = "Preferred model; repeat to give several in order")]
    models: Vec<String>,

    #[arg(long, global = true, help = "Model request timeout in seconds")]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new project, then enter the command loop (default)")]
    New,

    #[command(about = "Re-open the last project and enter the command loop")]
    Resume,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let app = load_config(&cli)?;
    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };
    let resources = Arc::new(cli::ResourceManager::new(app.shutdown_grace()));

    let session = async {
        match cli.command.unwrap_or(Commands::New) {
            Commands::New => cli::run_new(&app, config, Arc::clone(&resources)).await,
            Commands::Resume => cli::run_resume(&app, config, Arc::clone(&resources)).await,
        }
    };

    let result = tokio::select! {
        result = session => Some(result),
        _ = shutdown_signal() => None,
    };

    resources.shutdown().await;

    match result {
        Some(result) => result,
        None => {
            println!("\nInterrupted, background processes stopped.");
            // Blocking stdin reads cannot be cancelled; exit without waiting on them.
            std::process::exit(130);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut app = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    app.apply_env(|key| std::env::var(key).ok())
        .context("Invalid environment configuration")?;

    if let Some(endpoint) = &cli.endpoint {
        app.endpoint = endpoint.clone();
    }
    if !cli.models.is_empty() {
        app.models = cli.models.clone();
    }
    if let Some(secs) = cli.timeout {
        if secs == 0 {
            bail!("--timeout must be at least 1 second");
        }
        app.request_timeout_secs = secs;
    }
    Ok(app)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
