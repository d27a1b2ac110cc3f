//! Subforge - proxy subscription converter.
//!
//! `subforge serve` runs the HTTP API; `subforge convert` converts local
//! subscription files and prints the configuration.

mod convert;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subforge_server::{FetchConfig, Server, ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use subforge_storage::Database;

/// Subforge - proxy subscription converter
#[derive(Parser, Debug)]
#[command(name = "subforge", version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Port to bind
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Database file (default: platform data directory)
        #[arg(long)]
        db: Option<PathBuf>,

        /// User agent sent to subscription providers
        #[arg(long)]
        user_agent: Option<String>,

        /// Per-source fetch timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Convert local subscription files and print the configuration
    Convert {
        /// Template file (default: the bundled template)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Give every source its own region and selection groups
        #[arg(long)]
        split: bool,

        /// Subscription files, one source each
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "subforge", "subforge").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging. Console output goes to stderr so `convert` can print
/// the configuration on stdout.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("subforge={},warn", log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("subforge")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::debug!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

async fn serve(
    host: String,
    port: u16,
    db: Option<PathBuf>,
    user_agent: Option<String>,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let mut fetch = FetchConfig::default();
    if let Some(user_agent) = user_agent {
        fetch.user_agent = user_agent;
    }
    if let Some(secs) = timeout {
        fetch.timeout = Duration::from_secs(secs);
    }

    let mut config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_fetch(fetch);
    match db {
        Some(path) => config = config.with_db_path(path),
        None => tracing::info!("Database at {:?}", Database::default_db_path()?),
    }

    let server = Server::new(config).await?;
    server.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    match args.command {
        Command::Serve {
            host,
            port,
            db,
            user_agent,
            timeout,
        } => serve(host, port, db, user_agent, timeout).await,
        Command::Convert {
            template,
            split,
            sources,
        } => {
            let template = convert::load_template(template.as_deref())?;
            let config = convert::convert_files(template, &sources, split);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
