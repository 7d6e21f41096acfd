use std::{path::PathBuf, sync::Arc};

use clap::Parser;

use rollbot_core::{config::Config, domain::NetworkSelection, ports::ItemSource};
use rollbot_rollbar::RollbarClient;

/// Watches Rollbar for new items and posts them to Telegram.
#[derive(Parser, Debug)]
#[command(name = "rollbot", version, about)]
struct Cli {
    /// Networks to watch: mainnet, testnet or both (overrides NETWORK).
    network: Option<NetworkSelection>,

    /// Directory holding the reported-id, exclusion and status files.
    #[arg(long = "data-dir", env = "ROLLBOT_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), rollbot_core::Error> {
    let cli = Cli::parse();
    rollbot_core::logging::init("rollbot")?;

    let mut cfg = Config::load()?;
    if let Some(network) = cli.network {
        cfg.network = network;
    }
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }
    let cfg = Arc::new(cfg);

    let source: Arc<dyn ItemSource> = Arc::new(RollbarClient::new(&cfg)?);

    rollbot_telegram::router::run_polling(cfg, source)
        .await
        .map_err(|e| rollbot_core::Error::Messaging(format!("telegram bot failed: {e}")))?;

    tracing::info!("rollbot stopped");
    Ok(())
}
