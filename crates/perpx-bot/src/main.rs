//! Perpetual swap trading assistant - Entry Point
//!
//! Runs one order or query command against the paper exchange and prints
//! the result as JSON on stdout.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use perpx_bot::{AppConfig, Application, Cli};
use perpx_telemetry::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine config path: CLI arg > PERPX_CONFIG env var > default
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("PERPX_CONFIG").ok())
        .unwrap_or_else(|| perpx_bot::config::DEFAULT_CONFIG_PATH.to_string());

    let mut config = AppConfig::load(&config_path)?;
    apply_overrides(&mut config, &cli);

    perpx_telemetry::init_logging(config.telemetry.log_level.as_deref())?;
    info!(
        config_path = %config_path,
        instrument_id = %config.exchange.instrument_id,
        backtest = config.trading.backtest,
        "Starting perpx v{}",
        env!("CARGO_PKG_VERSION")
    );

    let app = Application::new(config).await?;

    let shutdown = app.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping");
            shutdown.cancel();
        }
    });

    let result = app.run(cli.command).await;

    if app.config().telemetry.print_metrics {
        eprint!("{}", Metrics::render()?);
    }

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if cli.backtest {
        config.trading.backtest = true;
    }
    if let Some(price) = cli.price {
        config.paper.initial_price = price;
    }
    if cli.print_metrics {
        config.telemetry.print_metrics = true;
    }
}
