//! Pet boarding reservations: CLI server
//!
//! Runs the reservation and basket expiry workers against the configured
//! database until SIGTERM / SIGINT.
//!
//! ```sh
//! # Run with default config (~/.config/pet-boarding/config.toml)
//! boarding-service
//!
//! # Custom config path
//! boarding-service --config /etc/pet-boarding/config.toml
//!
//! # Validate config without starting
//! boarding-service --check
//!
//! # One expiry pass, e.g. from cron
//! boarding-service --once
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use pet_boarding::config::AppConfig;
use pet_boarding::server::{init_tracing, run_expiry_once, ServerHandle, ServerOptions};

/// Pet boarding reservation service.
#[derive(Parser, Debug)]
#[command(
    name = "boarding-service",
    version,
    about = "Reservation core for pet boarding",
    long_about = "Pet boarding reservation service: keeps slot capacity consistent \
                  and expires unpaid reservations and baskets.\n\n\
                  Default config: ~/.config/pet-boarding/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "BOARDING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Run a single expiry pass, print the result as JSON and exit.
    #[arg(long)]
    once: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.clone().or_else(AppConfig::default_path);

    let mut config = match AppConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No config directory found, using defaults"),
    }

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(ref url) = cli.database_url {
        info!("CLI override: database.url = {}", url);
        config.database.url = url.clone();
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        if let Err(e) = config.validate() {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
        println!("✅ Configuration is valid");
        if let Some(path) = &config_path {
            println!("   Config file : {}", path.display());
        }
        println!("   Database    : {}", config.database.url);
        println!("   Log level   : {}", config.logging.level);
        println!(
            "   Expiry      : every {}s, basket TTL {} min{}",
            config.expiry.check_interval_secs,
            config.expiry.basket_ttl_minutes,
            if config.expiry.enabled { "" } else { " (disabled)" }
        );
        println!();
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    // ── Single pass mode ───────────────────────────────────────
    if cli.once {
        let summary = run_expiry_once(&config, !cli.no_migrate).await?;
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("🐾 Press Ctrl+C to shutdown gracefully.");

    handle.wait_for_shutdown_signal().await;
    handle.shutdown().await;

    Ok(())
}
