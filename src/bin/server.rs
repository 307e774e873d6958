// src/bin/server.rs

use anyhow::Context;
use clap::Parser;
use docflow::config::server::Args;
use docflow::config::load_app_config;
use docflow::server::{build_app_state, run_server};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber. The returned guard flushes the file sink on drop.
fn init_tracing(args: &Args) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")); // Default to info if RUST_LOG is not set

    let stdout_layer = if args.log_json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "docflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(&args);

    info!("Loading configuration from: {}", args.config.display());
    let mut config = load_app_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.apply_env_overrides();
    if let Some(bind) = &args.bind {
        config.server.bind_addr = bind.clone();
    }
    config.validate().context("invalid configuration")?;

    if args.validate_config {
        info!("Configuration is valid.");
        return Ok(());
    }

    let state = build_app_state(&config).context("building application state")?;
    let bind_addr = config.server.bind_addr.clone();
    run_server(state, &bind_addr).await?;
    Ok(())
}
