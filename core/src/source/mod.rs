pub mod mysql;
pub mod postgres;

use async_trait::async_trait;

use crate::config::{SourceConfig, SourceKind};
use crate::errors::SourceError;
use crate::model::SalesAggregate;

/// A configured read of one upstream sales database.
///
/// Implementations scope the connection to a single `fetch` call and release
/// it on every exit path, so a failed source never leaks a connection into
/// the rest of the run.
#[async_trait]
pub trait SalesSource: Send + Sync {
    fn name(&self) -> &str;

    /// Executes the configured query and returns the rows normalized to the
    /// canonical `(company, seller_name, total_sales)` shape.
    ///
    /// Fails with [`SourceError::Unavailable`] when the connection cannot be
    /// established and [`SourceError::Query`] when the query fails or a row
    /// does not satisfy the row invariants.
    async fn fetch(&self) -> Result<Vec<SalesAggregate>, SourceError>;
}

pub fn build_sources(configs: &[SourceConfig]) -> Vec<Box<dyn SalesSource>> {
    configs
        .iter()
        .map(|config| match config.kind {
            SourceKind::MySql => {
                Box::new(mysql::MySqlSource::new(config.clone())) as Box<dyn SalesSource>
            }
            SourceKind::Postgres => Box::new(postgres::PostgresSource::new(config.clone())),
        })
        .collect()
}

/// Row invariants are enforced at the source boundary; bad rows never reach
/// the consolidator.
pub(crate) fn validate_row(source: &str, row: &SalesAggregate) -> Result<(), SourceError> {
    if row.company.is_empty() {
        return Err(SourceError::Query {
            name: source.to_string(),
            reason: "row has an empty company".to_string(),
        });
    }
    if row.seller_name.is_empty() {
        return Err(SourceError::Query {
            name: source.to_string(),
            reason: "row has an empty seller_name".to_string(),
        });
    }
    if row.total_sales.is_sign_negative() {
        return Err(SourceError::Query {
            name: source.to_string(),
            reason: format!(
                "row for seller {} has a negative total_sales: {}",
                row.seller_name, row.total_sales
            ),
        });
    }
    Ok(())
}

pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
