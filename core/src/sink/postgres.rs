use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::DestinationConfig;
use crate::errors::DestinationError;
use crate::model::{ConsolidatedTable, SalesAggregate};
use crate::sink::Destination;

const DEFAULT_MAX_CONNECTIONS: u32 = 2;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 10_000;

/// The PostgreSQL store that owns the consolidated table's schema and
/// lifecycle. Rows are only ever created or overwritten here, never deleted.
pub struct PostgresDestination {
    pool: PgPool,
    table: String,
}

impl PostgresDestination {
    pub async fn connect(config: &DestinationConfig) -> Result<Self, DestinationError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .acquire_timeout(Duration::from_millis(
                config
                    .acquire_timeout_ms
                    .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_MS),
            ))
            .connect(&config.url)
            .await
            .map_err(|e| DestinationError::Unavailable {
                reason: e.to_string(),
            })?;

        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }
}

#[async_trait]
impl Destination for PostgresDestination {
    async fn ensure_schema(&self) -> Result<(), DestinationError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                company VARCHAR(100) NOT NULL,
                seller_name VARCHAR(150) NOT NULL,
                total_sales NUMERIC(15, 2) NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                PRIMARY KEY (company, seller_name)
            )",
            self.table
        );

        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("ensured destination table {}", self.table);
        Ok(())
    }

    async fn upsert_many(&self, table: &ConsolidatedTable) -> Result<u64, DestinationError> {
        if table.is_empty() {
            debug!("consolidated table is empty, skipping load");
            return Ok(0);
        }

        let rows = collapse_by_key(table.rows());

        let mut companies = Vec::with_capacity(rows.len());
        let mut sellers = Vec::with_capacity(rows.len());
        let mut totals: Vec<Decimal> = Vec::with_capacity(rows.len());
        for row in &rows {
            companies.push(row.company.clone());
            sellers.push(row.seller_name.clone());
            totals.push(row.total_sales);
        }

        let statement = upsert_statement(&self.table);

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        // an early return drops the transaction, which rolls it back
        let written = sqlx::query(&statement)
            .bind(&companies)
            .bind(&sellers)
            .bind(&totals)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        tx.commit().await.map_err(map_sqlx_error)?;

        info!("upserted {} rows into {}", written, self.table);
        Ok(written)
    }
}

/// One batched round trip regardless of row count. `updated_at` is the
/// commit-time clock of the store, never a source value.
fn upsert_statement(table: &str) -> String {
    format!(
        "INSERT INTO {table} (company, seller_name, total_sales, updated_at)
         SELECT company, seller_name, total_sales, NOW()
         FROM UNNEST($1::varchar[], $2::varchar[], $3::numeric[])
              AS batch(company, seller_name, total_sales)
         ON CONFLICT (company, seller_name) DO UPDATE
         SET total_sales = EXCLUDED.total_sales,
             updated_at = EXCLUDED.updated_at"
    )
}

/// PostgreSQL rejects a second `ON CONFLICT` hit on the same key within one
/// statement, so duplicate keys collapse before the write, last occurrence
/// wins, first-seen order is kept.
fn collapse_by_key(rows: &[SalesAggregate]) -> Vec<SalesAggregate> {
    let mut index: HashMap<(String, String), usize> = HashMap::with_capacity(rows.len());
    let mut collapsed: Vec<SalesAggregate> = Vec::with_capacity(rows.len());
    for row in rows {
        let key = (row.company.clone(), row.seller_name.clone());
        match index.get(&key) {
            Some(&at) => collapsed[at] = row.clone(),
            None => {
                index.insert(key, collapsed.len());
                collapsed.push(row.clone());
            }
        }
    }
    collapsed
}

fn map_sqlx_error(e: sqlx::Error) -> DestinationError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => DestinationError::Unavailable {
            reason: e.to_string(),
        },
        other => DestinationError::Write {
            reason: other.to_string(),
        },
    }
}
