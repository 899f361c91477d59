use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::SyncConfig;
use crate::errors::{Stage, StageError, SyncError};
use crate::model::{ConsolidatedTable, SalesAggregate};
use crate::sink::postgres::PostgresDestination;
use crate::sink::Destination;
use crate::source::{build_sources, SalesSource};
use crate::telemetry::SyncMetrics;

/// The sync job orchestrates one extract -> consolidate -> load pass.
///
/// Sources are read strictly sequentially in configuration order; the first
/// failure at any stage aborts the run with the failing stage attached. There
/// are no internal retries: re-running the whole job is the recovery path,
/// and the keyed load makes re-runs safe (rows are overwritten, never
/// duplicated).
pub struct SyncJob {
    sources: Vec<Box<dyn SalesSource>>,
    destination: Box<dyn Destination>,
    metrics: SyncMetrics,
}

/// What a completed run hands to downstream consumers (report renderers,
/// mailers): the consolidated table and the written row count.
#[derive(Debug)]
pub struct SyncReport {
    pub rows_written: u64,
    pub table: ConsolidatedTable,
    pub completed_at: DateTime<Utc>,
}

impl SyncJob {
    pub async fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let sources = build_sources(&config.sources);
        let destination = PostgresDestination::connect(&config.destination).await?;
        Ok(Self::with_parts(sources, Box::new(destination)))
    }

    /// Wires a job from already-built parts. Lets callers (and tests) swap
    /// the destination behind the trait.
    pub fn with_parts(
        sources: Vec<Box<dyn SalesSource>>,
        destination: Box<dyn Destination>,
    ) -> Self {
        Self {
            sources,
            destination,
            metrics: SyncMetrics::default(),
        }
    }

    pub async fn run(&mut self) -> Result<SyncReport, StageError> {
        info!("starting sales sync across {} sources", self.sources.len());

        let fragments = self.extract().await.map_err(|cause| StageError {
            stage: Stage::Extracting,
            cause,
        })?;

        info!("consolidating {} source fragments", fragments.len());
        let table = ConsolidatedTable::consolidate(fragments);
        self.metrics.rows_consolidated = table.len();
        info!("consolidated {} rows", table.len());

        let rows_written = self.load(&table).await.map_err(|cause| StageError {
            stage: Stage::Loading,
            cause,
        })?;

        info!("sync completed, {} rows written", rows_written);
        Ok(SyncReport {
            rows_written,
            table,
            completed_at: Utc::now(),
        })
    }

    async fn extract(&mut self) -> Result<Vec<Vec<SalesAggregate>>, SyncError> {
        let mut fragments = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            info!("extracting from source {}", source.name());
            let rows = source.fetch().await?;
            self.metrics.sources_read += 1;
            self.metrics.rows_extracted += rows.len();
            fragments.push(rows);
        }
        Ok(fragments)
    }

    async fn load(&mut self, table: &ConsolidatedTable) -> Result<u64, SyncError> {
        info!("loading consolidated table into the destination");
        self.destination.ensure_schema().await?;
        let written = self.destination.upsert_many(table).await?;
        self.metrics.rows_written = written;
        Ok(written)
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::*;
    use crate::errors::{DestinationError, SourceError};

    struct ScriptedSource {
        name: String,
        result: Result<Vec<SalesAggregate>, SourceError>,
    }

    impl ScriptedSource {
        fn ok(name: &str, rows: Vec<SalesAggregate>) -> Box<dyn SalesSource> {
            Box::new(Self {
                name: name.to_string(),
                result: Ok(rows),
            })
        }

        fn unavailable(name: &str) -> Box<dyn SalesSource> {
            Box::new(Self {
                name: name.to_string(),
                result: Err(SourceError::Unavailable {
                    name: name.to_string(),
                    reason: "connection refused".to_string(),
                }),
            })
        }
    }

    #[async_trait]
    impl SalesSource for ScriptedSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self) -> Result<Vec<SalesAggregate>, SourceError> {
            match &self.result {
                Ok(rows) => Ok(rows.clone()),
                Err(SourceError::Unavailable { name, reason }) => Err(SourceError::Unavailable {
                    name: name.clone(),
                    reason: reason.clone(),
                }),
                Err(SourceError::Query { name, reason }) => Err(SourceError::Query {
                    name: name.clone(),
                    reason: reason.clone(),
                }),
            }
        }
    }

    #[derive(Clone, Default)]
    struct MemoryDestination {
        rows: Arc<Mutex<BTreeMap<(String, String), Decimal>>>,
        upsert_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Destination for MemoryDestination {
        async fn ensure_schema(&self) -> Result<(), DestinationError> {
            Ok(())
        }

        async fn upsert_many(&self, table: &ConsolidatedTable) -> Result<u64, DestinationError> {
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.lock().unwrap();
            for row in table.rows() {
                rows.insert(
                    (row.company.clone(), row.seller_name.clone()),
                    row.total_sales,
                );
            }
            Ok(table.len() as u64)
        }
    }

    fn aggregate(company: &str, seller: &str, total: i64) -> SalesAggregate {
        SalesAggregate {
            company: company.to_string(),
            seller_name: seller.to_string(),
            total_sales: Decimal::new(total, 2),
        }
    }

    #[tokio::test]
    async fn run_extracts_consolidates_and_loads_in_order() {
        let destination = MemoryDestination::default();
        let mut job = SyncJob::with_parts(
            vec![
                ScriptedSource::ok("empresa-01", vec![aggregate("Empresa 01", "Ana", 1000)]),
                ScriptedSource::ok("empresa-02", vec![aggregate("Empresa 02", "Bruno", 2000)]),
            ],
            Box::new(destination.clone()),
        );

        let report = job.run().await.unwrap();

        assert_eq!(report.rows_written, 2);
        assert_eq!(report.table.len(), 2);
        assert_eq!(report.table.rows()[0].company, "Empresa 01");
        assert_eq!(report.table.rows()[1].company, "Empresa 02");
        assert_eq!(destination.upsert_calls.load(Ordering::SeqCst), 1);
        assert_eq!(destination.rows.lock().unwrap().len(), 2);

        let metrics = job.metrics();
        assert_eq!(metrics.sources_read, 2);
        assert_eq!(metrics.rows_extracted, 2);
        assert_eq!(metrics.rows_consolidated, 2);
        assert_eq!(metrics.rows_written, 2);
    }

    #[tokio::test]
    async fn second_source_failure_aborts_before_any_load() {
        let destination = MemoryDestination::default();
        let mut job = SyncJob::with_parts(
            vec![
                ScriptedSource::ok("empresa-01", vec![aggregate("Empresa 01", "Ana", 1000)]),
                ScriptedSource::unavailable("empresa-02"),
            ],
            Box::new(destination.clone()),
        );

        let err = job.run().await.unwrap_err();

        assert_eq!(err.stage, Stage::Extracting);
        assert!(matches!(
            err.cause,
            SyncError::Source(SourceError::Unavailable { .. })
        ));
        assert_eq!(destination.upsert_calls.load(Ordering::SeqCst), 0);
        assert!(destination.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_failure_reports_loading_stage() {
        struct FailingDestination;

        #[async_trait]
        impl Destination for FailingDestination {
            async fn ensure_schema(&self) -> Result<(), DestinationError> {
                Ok(())
            }

            async fn upsert_many(
                &self,
                _table: &ConsolidatedTable,
            ) -> Result<u64, DestinationError> {
                Err(DestinationError::Write {
                    reason: "transaction aborted".to_string(),
                })
            }
        }

        let mut job = SyncJob::with_parts(
            vec![ScriptedSource::ok(
                "empresa-01",
                vec![aggregate("Empresa 01", "Ana", 1000)],
            )],
            Box::new(FailingDestination),
        );

        let err = job.run().await.unwrap_err();
        assert_eq!(err.stage, Stage::Loading);
        assert!(matches!(
            err.cause,
            SyncError::Destination(DestinationError::Write { .. })
        ));
    }

    #[tokio::test]
    async fn empty_sources_produce_an_empty_report() {
        let destination = MemoryDestination::default();
        let mut job = SyncJob::with_parts(
            vec![ScriptedSource::ok("empresa-01", vec![])],
            Box::new(destination.clone()),
        );

        let report = job.run().await.unwrap();
        assert_eq!(report.rows_written, 0);
        assert!(report.table.is_empty());
    }
}
