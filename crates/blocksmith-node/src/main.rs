mod api;
mod constants;

use anyhow::Context;
use blocksmith_core::{Decimal, Ledger, LedgerConfig};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blocksmith-node", about = "HTTP front end for a single BlockSmith ledger")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = constants::DEFAULT_LISTEN)]
    listen: String,

    /// JSON file with a ledger configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leading zero hex digits required of every block hash
    #[arg(long)]
    difficulty: Option<usize>,

    /// Amount minted to the miner of each block
    #[arg(long)]
    reward: Option<Decimal>,

    /// Refuse unsigned transactions at local admission
    #[arg(long)]
    require_signatures: bool,

    /// Search nonces on all cores
    #[arg(long)]
    parallel_mining: bool,
}

async fn load_config(args: &Args) -> anyhow::Result<LedgerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => LedgerConfig::default(),
    };
    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(reward) = args.reward {
        config.mining_reward = reward;
    }
    config.require_signatures |= args.require_signatures;
    config.parallel_mining |= args.parallel_mining;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args).await?;
    info!(
        difficulty = config.difficulty,
        reward = %config.mining_reward,
        require_signatures = config.require_signatures,
        "starting ledger"
    );

    // Genesis is mined at startup.
    let ledger = tokio::task::spawn_blocking(move || Ledger::new(config)).await??;
    let state = api::AppState::new(Arc::new(ledger));
    let app = api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse()?;
    info!("blocksmith-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
