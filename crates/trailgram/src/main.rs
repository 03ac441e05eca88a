//! Trailgram relay binary.

use anyhow::Context;
use trailgram_telemetry::{LogConfig, setup_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = LogConfig::from_env().context("invalid logging configuration")?;
    setup_logging(&log_config).context("failed to set up logging")?;

    let config = trailgram::Config::from_env()?;
    trailgram::run(config).await?;
    Ok(())
}
