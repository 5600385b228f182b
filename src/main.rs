use std::io;

use shared_calendar::storage::config::Config;

mod cli;
use cli::{parse_cli_command, run, USAGE};

#[tokio::main]
async fn main() -> Result<(), io::Error> {
    setup_logging();

    let command = match parse_cli_command(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("{USAGE}");
            return Ok(());
        }
    };

    let config = match Config::load_or_create() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            tracing::error!("Failed to load configuration: {}", e);
            return Ok(());
        }
    };

    if let Err(e) = run(command, &config).await {
        eprintln!("Error: {:#}", e);
        tracing::error!("Command failed: {:#}", e);
    }

    Ok(())
}

fn setup_logging() {
    let log_dir = Config::config_dir();

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "shared-calendar.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("shared-calendar started");
}
