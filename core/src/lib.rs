pub mod config;
pub mod errors;
pub mod job;
pub mod model;
pub mod sink;
pub mod source;
pub mod telemetry;

pub use config::SyncConfig;
pub use errors::{StageError, SyncError};
pub use job::{SyncJob, SyncReport};
pub use model::{ConsolidatedTable, SalesAggregate};
