use anyhow::{Context, Result};
use sync_core::config::load_config;
use sync_core::job::SyncJob;
use sync_core::telemetry::init_tracing;
use tracing::{error, info};

/// Entry point for one run-to-completion sync, meant to be invoked by an
/// external scheduler (cron or similar; no scheduling loop lives here).
///
/// Configuration comes from the first CLI argument (a YAML file path) or,
/// when absent, inline YAML in `SALES_SYNC_CONFIG`. Exits 0 on success and
/// non-zero on any failure, with the failing stage in the log output.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = load_config(config_path.as_deref()).context("failed to load configuration")?;

    let mut job = SyncJob::new(&config)
        .await
        .context("failed to initialize sync job")?;

    match job.run().await {
        Ok(report) => {
            info!("sales sync finished: {} rows written", report.rows_written);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}
