use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_core=info,runner_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncMetrics {
    pub sources_read: usize,
    pub rows_extracted: usize,
    pub rows_consolidated: usize,
    pub rows_written: u64,
}
