use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("destination error: {0}")]
    Destination(#[from] DestinationError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("failed to load configuration from {path}: {error}")]
    LoadFailed {
        path: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source {name} unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("query against source {name} failed: {reason}")]
    Query { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("destination unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("destination write failed: {reason}")]
    Write { reason: String },
}

/// Pipeline stage names, used to report where a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Consolidating,
    Loading,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extracting => write!(f, "extracting"),
            Stage::Consolidating => write!(f, "consolidating"),
            Stage::Loading => write!(f, "loading"),
        }
    }
}

/// A sync failure with the stage it surfaced in attached.
///
/// The job never recovers locally; re-running the whole job is the only
/// recovery path, and the keyed load makes that safe.
#[derive(Error, Debug)]
#[error("sync failed while {stage}: {cause}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub cause: SyncError,
}

pub type Result<T> = std::result::Result<T, SyncError>;
