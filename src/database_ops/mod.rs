pub mod analytics;
pub mod bulk_mapping;
pub mod db;
pub mod memory;
pub mod models;
pub mod review;
pub mod run_log;
pub mod sources;
pub mod store;

pub use analytics::{AnalyticsReporter, Report, ReportKind};
pub use bulk_mapping::{BulkMappingSummary, BulkResolutionJob};
pub use review::{AcceptRequest, RejectRequest, ReviewItem, ReviewWorkflow};
pub use run_log::{PgRunLog, RunLog};
pub use sources::{PgRecordSource, RecordSource};
pub use store::{MappingStore, PgMappingStore};
