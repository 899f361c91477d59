use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Connection, Row};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::errors::SourceError;
use crate::model::SalesAggregate;
use crate::source::{validate_row, SalesSource, DEFAULT_CONNECT_TIMEOUT_MS};

/// Reads one PostgreSQL sales database with the query fixed by configuration.
pub struct PostgresSource {
    config: SourceConfig,
}

impl PostgresSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self) -> PgConnectOptions {
        let options = &self.config.options;
        let mut connect = PgConnectOptions::new()
            .host(&options.host)
            .database(&options.database)
            .username(&options.user);
        if let Some(port) = options.port {
            connect = connect.port(port);
        }
        if let Some(password) = &options.password {
            connect = connect.password(password);
        }
        connect
    }

    async fn read_rows(&self, conn: &mut PgConnection) -> Result<Vec<SalesAggregate>, SourceError> {
        let rows = sqlx::query(&self.config.query)
            .fetch_all(conn)
            .await
            .map_err(|e| SourceError::Query {
                name: self.config.name.clone(),
                reason: e.to_string(),
            })?;

        rows.iter().map(|row| self.normalize(row)).collect()
    }

    fn normalize(&self, row: &PgRow) -> Result<SalesAggregate, SourceError> {
        let field = |e: sqlx::Error| SourceError::Query {
            name: self.config.name.clone(),
            reason: format!("row is missing a required field: {e}"),
        };

        let aggregate = SalesAggregate {
            company: row.try_get::<String, _>("company").map_err(field)?,
            seller_name: row.try_get::<String, _>("seller_name").map_err(field)?,
            total_sales: row.try_get::<Decimal, _>("total_sales").map_err(field)?,
        };
        validate_row(&self.config.name, &aggregate)?;
        Ok(aggregate)
    }
}

#[async_trait]
impl SalesSource for PostgresSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(&self) -> Result<Vec<SalesAggregate>, SourceError> {
        let connect_timeout = Duration::from_millis(
            self.config
                .options
                .connect_timeout_ms
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        );

        info!("connecting to PostgreSQL source {}", self.config.name);
        let mut conn = timeout(connect_timeout, PgConnection::connect_with(&self.connect_options()))
            .await
            .map_err(|_| SourceError::Unavailable {
                name: self.config.name.clone(),
                reason: format!("connect timed out after {connect_timeout:?}"),
            })?
            .map_err(|e| SourceError::Unavailable {
                name: self.config.name.clone(),
                reason: e.to_string(),
            })?;

        // the connection is scoped to this fetch and released whether the
        // read succeeded or not
        let result = self.read_rows(&mut conn).await;
        if let Err(e) = conn.close().await {
            warn!("failed to close PostgreSQL connection cleanly: {}", e);
        }

        if let Ok(rows) = &result {
            info!("source {} returned {} rows", self.config.name, rows.len());
        }
        result
    }
}
