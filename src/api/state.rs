use std::sync::Arc;
use std::time::Instant;

use crate::database_ops::db::Db;
use crate::database_ops::models::Provider;
use crate::database_ops::{
    AnalyticsReporter, BulkResolutionJob, MappingStore, PgMappingStore, PgRecordSource, PgRunLog,
    RecordSource, ReviewWorkflow, RunLog,
};
use crate::util::config::MapperConfig;

/// Shared handles every request builds its component from.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MappingStore>,
    pub run_log: Arc<dyn RunLog>,
    pub stats: Arc<dyn RecordSource>,
    pub draft: Arc<dyn RecordSource>,
    pub config: MapperConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn from_db(db: Db, config: MapperConfig) -> Self {
        Self {
            store: Arc::new(PgMappingStore::new(db.clone())),
            run_log: Arc::new(PgRunLog::new(db.clone())),
            stats: Arc::new(PgRecordSource::new(db.clone(), Provider::Stats)),
            draft: Arc::new(PgRecordSource::new(db, Provider::Draft)),
            config,
            started_at: Instant::now(),
        }
    }

    pub fn bulk_job(&self) -> BulkResolutionJob {
        BulkResolutionJob::new(
            self.stats.clone(),
            self.draft.clone(),
            self.store.clone(),
            self.run_log.clone(),
            self.config.clone(),
        )
    }

    pub fn review(&self) -> ReviewWorkflow {
        ReviewWorkflow::new(self.store.clone(), self.draft.clone(), self.config.clone())
    }

    pub fn analytics(&self) -> AnalyticsReporter {
        AnalyticsReporter::new(self.store.clone(), self.run_log.clone(), self.config.clone())
    }
}
