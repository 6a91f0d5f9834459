//! WearLink bridge over RFCOMM.
//!
//! Streams simulated wearable sensor readings to a paired peer until Ctrl+C.

use anyhow::Result;
use wearlink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use wearlink_bridge_rfcomm::config::RfcommBridgeConfig;
use wearlink_bridge_rfcomm::{build_host, build_manager};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse_with_default("rfcomm.json5");

    // Load configuration using the framework's BridgeConfig trait
    let config = RfcommBridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    // Create the bridge runner (initializes logging)
    let runner = BridgeRunner::new_with_args("rfcomm", config, Some(&args))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(
        config = %args.config.display(),
        transport = runner.config().transport.as_str(),
        peers = runner.config().peers.len(),
        "RFCOMM bridge configured"
    );

    let manager = build_manager(runner.config(), runner.status_sink());
    let host = build_host(runner.config());

    let stats = runner
        .run(manager, host)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(
        written = stats.written,
        dropped = stats.dropped,
        failed = stats.failed,
        "RFCOMM bridge stopped"
    );

    Ok(())
}
