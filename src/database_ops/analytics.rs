use std::sync::Arc;

use chrono::{Duration, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use super::bulk_mapping::JOB_NAME;
use super::models::{MappingRecord, MatchMethod, Provider, UnmappedEntry};
use super::run_log::{JobRun, RunLog};
use super::store::MappingStore;
use crate::error::{MapperError, MapperResult};
use crate::util::config::MapperConfig;

/// Unverified mappings below this score are listed as low confidence.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    Unmapped,
    LowConfidence,
}

impl ReportKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "summary" => Some(Self::Summary),
            "unmapped" => Some(Self::Unmapped),
            "low-confidence" | "low_confidence" => Some(Self::LowConfidence),
            _ => None,
        }
    }

    /// Missing names mean the summary. Unknown names also fall back to the
    /// summary and return a warning for the caller to surface.
    pub fn parse_lenient(raw: Option<&str>) -> (Self, Option<String>) {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return (Self::Summary, None);
        };
        match Self::parse(raw) {
            Some(kind) => (kind, None),
            None => {
                warn!(report = raw, "unknown report type; using summary");
                (
                    Self::Summary,
                    Some(format!("unknown report '{raw}'; showing summary")),
                )
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Unmapped => "unmapped",
            Self::LowConfidence => "low-confidence",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecentCounts {
    pub last_7_days: i64,
    pub last_30_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub total_mappings: u64,
    pub by_method: IndexMap<String, u64>,
    pub by_confidence: TierCounts,
    pub verified: u64,
    pub unverified: u64,
    pub unmapped_by_source: IndexMap<String, u64>,
    pub recent: RecentCounts,
    /// Rows left out of the counts because a column held an unknown value.
    pub skipped_invalid: u64,
    pub latest_run: Option<JobRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "report", rename_all = "kebab-case")]
pub enum Report {
    Summary(SummaryReport),
    Unmapped { entries: Vec<UnmappedEntry> },
    LowConfidence { mappings: Vec<MappingRecord> },
}

/// Read-only rollups over the mapping tables.
pub struct AnalyticsReporter {
    store: Arc<dyn MappingStore>,
    run_log: Arc<dyn RunLog>,
    config: MapperConfig,
}

impl AnalyticsReporter {
    pub fn new(store: Arc<dyn MappingStore>, run_log: Arc<dyn RunLog>, config: MapperConfig) -> Self {
        Self {
            store,
            run_log,
            config,
        }
    }

    pub async fn report(&self, kind: ReportKind, limit: Option<i64>) -> MapperResult<Report> {
        Ok(match kind {
            ReportKind::Summary => Report::Summary(self.summary().await?),
            ReportKind::Unmapped => Report::Unmapped {
                entries: self.top_unmapped(limit).await?,
            },
            ReportKind::LowConfidence => Report::LowConfidence {
                mappings: self.low_confidence(limit).await?,
            },
        })
    }

    pub async fn summary(&self) -> MapperResult<SummaryReport> {
        let now = Utc::now();
        let (facets, sources, last_7_days, last_30_days) = tokio::try_join!(
            self.store.mapping_facets(),
            self.store.unmapped_sources(),
            self.store.count_mappings_since(now - Duration::days(7)),
            self.store.count_mappings_since(now - Duration::days(30)),
        )
        .map_err(MapperError::persistence)?;

        let mut by_method: IndexMap<String, u64> = MatchMethod::ALL
            .iter()
            .map(|m| (m.as_str().to_string(), 0))
            .collect();
        let mut by_confidence = TierCounts::default();
        let (mut verified, mut unverified, mut skipped_invalid) = (0u64, 0u64, 0u64);

        for facet in &facets {
            let method = match facet.match_method.parse::<MatchMethod>() {
                Ok(m) => m,
                Err(_) => {
                    warn!(match_method = %facet.match_method, "skipping mapping with unknown method");
                    skipped_invalid += 1;
                    continue;
                }
            };
            *by_method.entry(method.as_str().to_string()).or_default() += 1;

            let s = facet.confidence_score;
            if s > 0.9 {
                by_confidence.high += 1;
            } else if s >= 0.8 {
                by_confidence.medium += 1;
            } else {
                by_confidence.low += 1;
            }

            if facet.verified {
                verified += 1;
            } else {
                unverified += 1;
            }
        }

        let mut unmapped_by_source: IndexMap<String, u64> = [Provider::Stats, Provider::Draft]
            .iter()
            .map(|p| (p.as_str().to_string(), 0))
            .collect();
        for raw in &sources {
            match raw.parse::<Provider>() {
                Ok(p) => *unmapped_by_source.entry(p.as_str().to_string()).or_default() += 1,
                Err(_) => {
                    warn!(source = %raw, "skipping unmapped entry with unknown source");
                    skipped_invalid += 1;
                }
            }
        }

        let latest_run = match self.run_log.latest(JOB_NAME).await {
            Ok(run) => run,
            Err(e) => {
                warn!(error = %e, "run log unavailable; summary omits latest run");
                None
            }
        };

        Ok(SummaryReport {
            total_mappings: verified + unverified,
            by_method,
            by_confidence,
            verified,
            unverified,
            unmapped_by_source,
            recent: RecentCounts {
                last_7_days,
                last_30_days,
            },
            skipped_invalid,
            latest_run,
        })
    }

    pub async fn top_unmapped(&self, limit: Option<i64>) -> MapperResult<Vec<UnmappedEntry>> {
        self.store
            .top_unmapped(self.config.limit(limit))
            .await
            .map_err(MapperError::persistence)
    }

    pub async fn low_confidence(&self, limit: Option<i64>) -> MapperResult<Vec<MappingRecord>> {
        self.store
            .low_confidence(LOW_CONFIDENCE_THRESHOLD, self.config.limit(limit))
            .await
            .map_err(MapperError::persistence)
    }
}
