//! Image streaming server

use std::net::SocketAddr;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::WrapErr as _;
use teller::TellerConfig;
use tracing_subscriber::EnvFilter;

/// Stream disk images from pluggable storage backends.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "TELLER_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TellerConfig::from_file(path)
            .await
            .wrap_err_with(|| format!("loading configuration from {path}"))?,
        None => TellerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let addr = config.bind;
    let app = config
        .builder()
        .await
        .wrap_err("configuring image service")?
        .build();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding {addr}"))?;
    tracing::info!("Teller listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown())
        .await
        .wrap_err("serving")?;

    Ok(())
}

async fn shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("waiting for ctrl-c: {error}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
