use std::sync::Arc;

use anyhow::Result;

use crate::database_ops::{AnalyticsReporter, PgMappingStore, PgRunLog, ReportKind};
use crate::util::config::MapperConfig;

#[derive(Debug, Clone, Default)]
pub struct ReportConfig {
    pub database_url: Option<String>,
    /// `summary`, `unmapped` or `low-confidence`; anything else means summary.
    pub report: Option<String>,
    pub limit: Option<i64>,
}

/// Print the requested report as pretty JSON.
pub async fn run(cfg: ReportConfig) -> Result<()> {
    let db = super::connect(cfg.database_url.clone(), 3).await?;
    let reporter = AnalyticsReporter::new(
        Arc::new(PgMappingStore::new(db.clone())),
        Arc::new(PgRunLog::new(db)),
        MapperConfig::from_env(),
    );
    let (kind, warning) = ReportKind::parse_lenient(cfg.report.as_deref());
    if let Some(w) = warning {
        eprintln!("warning: {w}");
    }
    let report = reporter.report(kind, cfg.limit).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
