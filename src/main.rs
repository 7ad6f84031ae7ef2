use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

/// Realtime arcade server.
#[derive(Debug, Parser)]
#[command(name = "arcade", version, about)]
struct Args {
    /// JSON config file, merged over the defaults.
    #[arg(short, long, env = "ARCADE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config.
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overrides the config. `0` picks a free port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = arcade_server::load_config(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(host) = args.host {
        config.socket.host = host;
    }
    if let Some(port) = args.port {
        config.socket.port = port;
    }
    if args.log_json {
        config.log.json = true;
    }

    arcade_telemetry::init_logging(&config.log).context("failed to initialise logging")?;

    let config = Arc::new(config);
    let pipeline = arcade_server::build_pipeline(Arc::clone(&config))
        .context("failed to build handler table")?;
    let handle = arcade_server::start(Arc::new(pipeline))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.socket.host, config.socket.port
            )
        })?;

    tracing::info!(port = handle.port, name = %config.name, "ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
