use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::database_ops::memory::MemoryStore;
use crate::database_ops::models::Provider;
use crate::database_ops::{
    BulkMappingSummary, BulkResolutionJob, MappingStore, PgMappingStore, PgRecordSource, PgRunLog,
};
use crate::util::config::MapperConfig;

#[derive(Debug, Clone, Default)]
pub struct BulkMapConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Resolve and report without writing mappings or a run-log row.
    pub dry_run: bool,
}

pub async fn run(cfg: BulkMapConfig) -> Result<BulkMappingSummary> {
    let db = super::connect(cfg.database_url.clone(), 5).await?;
    let config = MapperConfig::from_env();
    let stats = Arc::new(PgRecordSource::new(db.clone(), Provider::Stats));
    let draft = Arc::new(PgRecordSource::new(db.clone(), Provider::Draft));
    let pg_store = PgMappingStore::new(db.clone());

    let job = if cfg.dry_run {
        // Writes land in memory; only the live mapped-id set is read.
        let preview = Arc::new(MemoryStore::with_mapped_ids(
            pg_store.mapped_source_ids().await?,
        ));
        BulkResolutionJob::new(stats, draft, preview.clone(), preview, config)
    } else {
        BulkResolutionJob::new(
            stats,
            draft,
            Arc::new(pg_store),
            Arc::new(PgRunLog::new(db)),
            config,
        )
    };

    let summary = job.run().await?;
    info!(dry_run = cfg.dry_run, "bulk-map finished");
    print!("{}", render_summary(&summary, cfg.dry_run));
    Ok(summary)
}

pub fn render_summary(summary: &BulkMappingSummary, dry_run: bool) -> String {
    let mut out = String::new();
    if dry_run {
        let _ = writeln!(out, "(dry run: nothing was written)");
    }
    let rows = [
        ("exact_matches", summary.exact_matches),
        ("fuzzy_matches", summary.fuzzy_matches),
        ("manual_review_needed", summary.manual_review_needed),
        ("unmapped", summary.unmapped),
        ("total_processed", summary.total_processed),
        ("skipped_already_mapped", summary.skipped_already_mapped),
    ];
    for (label, n) in rows {
        let _ = writeln!(out, "{label:<24} {n:>8}");
    }
    out
}
