//! ROHO (RH) Dynamic Rewards Inspector
//!
//! Opens (or rebuilds) a node's reward database and reports the stored
//! epoch rewards and the block value at selected heights.

use clap::Parser;
use rh_rewards::consensus::ChainParams;
use rh_rewards::format_money;
use rh_rewards::node::{RewardEngine, StaticSporks};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rh-rewards", about = "Inspect the RH dynamic rewards database")]
struct Args {
    /// Node data directory (the database lives in <datadir>/chainstate/rewards.db)
    #[arg(long)]
    datadir: PathBuf,

    /// JSON chain parameters; mainnet defaults when omitted
    #[arg(long)]
    params: Option<PathBuf>,

    /// Delete and recreate the reward database
    #[arg(long)]
    reindex: bool,

    /// Treat the node as fully synced when answering block values
    #[arg(long)]
    synced: bool,

    /// Heights to report the block value for
    #[arg(long = "height")]
    heights: Vec<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let params = match &args.params {
        Some(path) => ChainParams::from_json_file(path)?,
        None => ChainParams::default(),
    };

    let engine = RewardEngine::init(
        params,
        &args.datadir,
        args.reindex,
        Arc::new(StaticSporks::new()),
        Arc::new(AtomicBool::new(args.synced)),
    )?;

    let records = engine.records();
    info!(
        count = records.len(),
        interval = engine.params().reward_adjustment_interval,
        "Dynamic reward records"
    );
    for (epoch_height, amount) in &records {
        println!("epoch {:>10}  {} RH", epoch_height, format_money(*amount));
    }

    for height in &args.heights {
        println!(
            "height {:>10} => {} RH",
            height,
            format_money(engine.get_block_value(*height))
        );
    }

    engine.shutdown()?;
    Ok(())
}
