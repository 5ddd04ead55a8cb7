use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth::owner::Broker;
use hearth_core::sense::SyntheticSensor;
use hearth_core::HearthConfig;

#[derive(Parser)]
#[command(
    name = "hearth-broker",
    about = "Owner process: exclusive sensor bus access, state derivation, snapshot publishing"
)]
struct Cli {
    /// Directory for identity, history, genesis, and the snapshot file
    #[arg(long, default_value = "./hearth-data")]
    data_dir: PathBuf,

    /// Config file path (defaults to <data-dir>/hearth.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent name used when minting a fresh identity
    #[arg(long, default_value = "ember")]
    name: String,

    /// Override the governance decision endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Print the default config as TOML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", HearthConfig::default().to_toml());
        return Ok(());
    }

    let config_path = cli
        .config
        .unwrap_or_else(|| cli.data_dir.join("hearth.toml"));
    let mut cfg = HearthConfig::load(&config_path);
    if let Some(endpoint) = cli.endpoint {
        cfg.governance.endpoint = endpoint;
    }

    let sensor = Arc::new(SyntheticSensor::new());
    let mut broker = Broker::new(&cli.data_dir, cfg, sensor, &cli.name).await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    broker.run(cancel).await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
