use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tessella::{Config, TessellaError};
use tessella_server::{AppState, load_config, run_server};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML (or .json) configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = 3001)]
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Public base URI of the fragments, overriding `api.host`
    #[arg(long)]
    target: Option<String>,

    /// Base URI of the NGSI-LD broker, overriding `ngsi.host`
    #[arg(long)]
    source: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessella_server=info,tessella=info,info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            load_config(path)?
        }
        None => {
            warn!("No configuration file given, using defaults");
            Config::default()
        }
    };
    if let Some(target) = args.target {
        config = config.with_target(target);
    }
    if let Some(source) = args.source {
        config = config.with_source(source);
    }
    config.validate().map_err(TessellaError::InvalidConfig)?;

    info!(
        "Serving fragments as {} from {}",
        config.api.host, config.ngsi.host
    );
    let state = Arc::new(AppState::new(config)?);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl_c signal: {}", e);
            futures::future::pending::<()>().await;
        }
    };

    run_server(listener, state, shutdown).await?;

    Ok(())
}
