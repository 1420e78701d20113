mod archive_commands;
mod config_commands;
mod db_commands;

use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    observer_config::ObserverConfig,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "observer", about = "Observer: chat message archiver", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to ./observer.toml, then ~/.config/observer/).
    #[arg(long, global = true, env = "OBSERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive JSON-lines events from stdin or a file (default).
    Run {
        /// Read events from this file instead of stdin.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Create the database schema and exit.
    InitDb,
    /// Validate the configuration and test both backends.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print one archived message with its components and files.
    Show { message_id: String },
    /// Delete one archived message together with its components and files.
    Delete { message_id: String },
    /// Write a documented config file.
    InitConfig {
        #[arg(long, default_value = "observer.toml")]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load the explicit config file, or discover one, then apply env overrides.
fn load_settings(path: Option<&Path>) -> anyhow::Result<ObserverConfig> {
    let config = match path {
        Some(path) => observer_config::load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => observer_config::discover_and_load()?,
    };
    Ok(observer_config::apply_env_overrides(config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "observer starting");

    let command = cli.command.unwrap_or(Commands::Run { input: None });
    if let Commands::InitConfig { path, force } = &command {
        return config_commands::init_config(path, *force);
    }

    let config = load_settings(cli.config.as_deref())?;
    info!(backend = %config.database.backend, bucket = %config.blob.bucket, "config loaded");

    match command {
        Commands::Run { input } => archive_commands::run(&config, input.as_deref()).await,
        Commands::InitDb => db_commands::init_db(&config).await,
        Commands::Check { verbose } => {
            config_commands::check(&config, cli.config.as_deref(), verbose).await
        },
        Commands::Show { message_id } => db_commands::show(&config, &message_id).await,
        Commands::Delete { message_id } => db_commands::delete(&config, &message_id).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}
