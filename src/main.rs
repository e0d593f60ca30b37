//! Fleet booking server
//!
//! ```sh
//! # Run with default config (~/.config/fleet-booking/config.toml)
//! fleet-booking
//!
//! # Custom config path and port
//! fleet-booking --config /etc/fleet-booking/config.toml --port 8080
//!
//! # Validate config without starting
//! fleet-booking --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use fleet_booking::config::{default_config_path, AppConfig, ConfigError};
use fleet_booking::server::{init_tracing, ServerHandle, ServerOptions};

#[derive(Parser, Debug)]
#[command(
    name = "fleet-booking",
    version,
    about = "Reservation engine for rentable fleet assets",
    long_about = "REST API server that books time windows on fleet assets, prices them \
                  and tracks each booking through its lifecycle.\n\n\
                  Default config: ~/.config/fleet-booking/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "FLEET_BOOKING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            (AppConfig::default(), None)
        }
        Err(e) => {
            if cli.check {
                eprintln!("Configuration is invalid: {}", e);
                std::process::exit(1);
            }
            (AppConfig::default(), Some(e))
        }
    };

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if cli.check {
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.host, config.server.port);
        println!("   Database    : {}", config.database.url);
        println!("   Log level   : {}", config.logging.level);
        println!("   Default rate: {}", config.booking.default_rate_per_day);
        return Ok(());
    }

    init_tracing(&config);
    match load_error {
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
        None => info!("Configuration: {}", config_path.display()),
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
