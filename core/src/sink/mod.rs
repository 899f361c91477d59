pub mod postgres;

use async_trait::async_trait;

use crate::errors::DestinationError;
use crate::model::ConsolidatedTable;

/// Contract for the keyed store that owns the consolidated sales table.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Creates the destination table if absent. Idempotent; never drops or
    /// alters an existing table.
    async fn ensure_schema(&self) -> Result<(), DestinationError>;

    /// Writes every row, overwriting `total_sales` and `updated_at` when the
    /// `(company, seller_name)` key already exists.
    ///
    /// The whole batch applies as one transaction: the store reflects either
    /// the pre-call state or the fully-applied post-call state, never a
    /// partial mix. Empty input is a no-op that opens no transaction.
    /// Returns the number of rows written.
    async fn upsert_many(&self, table: &ConsolidatedTable) -> Result<u64, DestinationError>;
}
