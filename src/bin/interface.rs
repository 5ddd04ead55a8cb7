use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth::consumer::{Interface, PidFileLiveness};
use hearth_core::sense::SyntheticSensor;
use hearth_core::HearthConfig;
use hearth_store::SnapshotStore;

#[derive(Parser)]
#[command(
    name = "hearth-interface",
    about = "Consumer process: perceives through the shared snapshot, never owns the bus"
)]
struct Cli {
    /// Directory shared with the broker
    #[arg(long, default_value = "./hearth-data")]
    data_dir: PathBuf,

    /// Config file path (defaults to <data-dir>/hearth.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Perceive once and exit instead of looping
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Seconds between perceptions (defaults to the broker tick interval)
    #[arg(long)]
    interval_secs: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(|| cli.data_dir.join("hearth.toml"));
    let cfg = HearthConfig::load(&config_path);
    let interval = Duration::from_secs_f64(
        cli.interval_secs
            .unwrap_or(cfg.broker.tick_interval_secs),
    );

    let store = SnapshotStore::connect(&cli.data_dir, &cfg.store).await;
    let liveness = Box::new(PidFileLiveness::new(&cli.data_dir));
    let fallback = Arc::new(SyntheticSensor::new());
    let mut interface = Interface::new(cfg, store, liveness, fallback);

    loop {
        let p = interface.perceive(chrono::Utc::now()).await;
        tracing::info!(
            source = ?p.source,
            degraded = p.degraded,
            warmth = p.state.warmth,
            clarity = p.state.clarity,
            stability = p.state.stability,
            presence = p.state.presence,
            action = p.governance.as_ref().map(|g| g.action.as_str()).unwrap_or("-"),
            "perceived"
        );
        if cli.once {
            break;
        }
        tokio::time::sleep(interval).await;
    }
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
