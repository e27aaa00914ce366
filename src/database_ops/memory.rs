//! In-process implementations of the store traits.
//!
//! Used by dry runs (nothing reaches Postgres) and by unit tests. Writes are
//! applied to a copy of the state and swapped in whole, so a failed batch
//! leaves nothing behind, mirroring the Postgres transaction.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use super::models::{
    MappingFacet, MappingRecord, NewMapping, NewUnmapped, Provider, ReviewStatus, SourceRecord,
    UnmappedEntry,
};
use super::run_log::{JobRun, RunLog, RunOutcome};
use super::sources::RecordSource;
use super::store::{MappingStore, ResolutionBatch};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    mappings: Vec<MappingRecord>,
    unmapped: Vec<UnmappedEntry>,
    runs: Vec<JobRun>,
    /// Ids reported as mapped without a backing row (dry-run seeding).
    premapped: HashSet<String>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn upsert_mapping(&mut self, m: &NewMapping, keep_verified: bool) {
        let now = Utc::now();
        if let Some(row) = self
            .mappings
            .iter_mut()
            .find(|r| r.source_a_id == m.source_a_id)
        {
            if keep_verified && row.verified {
                return;
            }
            row.source_b_id = m.source_b_id.clone();
            row.canonical_name = m.canonical_name.clone();
            row.confidence_score = m.confidence_score;
            row.match_method = m.match_method.as_str().to_string();
            row.verified = m.verified;
            row.position = m.position.clone();
            row.team = m.team.clone();
            row.notes = m.notes.clone();
            row.updated_at = now;
            return;
        }
        let id = self.next_id();
        self.mappings.push(MappingRecord {
            id,
            source_a_id: m.source_a_id.clone(),
            source_b_id: m.source_b_id.clone(),
            canonical_name: m.canonical_name.clone(),
            confidence_score: m.confidence_score,
            match_method: m.match_method.as_str().to_string(),
            verified: m.verified,
            position: m.position.clone(),
            team: m.team.clone(),
            notes: m.notes.clone(),
            created_at: now,
            updated_at: now,
        });
    }

    fn upsert_unmapped(&mut self, u: &NewUnmapped) {
        let now = Utc::now();
        let source = u.source.as_str();
        if let Some(row) = self
            .unmapped
            .iter_mut()
            .find(|r| r.source == source && r.player_id == u.player_id)
        {
            row.attempts_count += 1;
            row.display_name = u.display_name.clone();
            row.position = u.position.clone();
            row.team = u.team.clone();
            if row.review_status != ReviewStatus::Rejected.as_str() {
                row.notes = u.notes.clone();
            }
            row.updated_at = now;
            return;
        }
        let id = self.next_id();
        self.unmapped.push(UnmappedEntry {
            id,
            source: source.to_string(),
            player_id: u.player_id.clone(),
            display_name: u.display_name.clone(),
            position: u.position.clone(),
            team: u.team.clone(),
            attempts_count: 1,
            notes: u.notes.clone(),
            review_status: ReviewStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        });
    }
}

/// [`MappingStore`] and [`RunLog`] held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `ids` as already mapped, e.g. the live mapping table's keys
    /// when previewing a run.
    pub fn with_mapped_ids(ids: HashSet<String>) -> Self {
        let store = Self::default();
        store.lock().premapped = ids;
        store
    }

    /// Make every subsequent write fail before touching state.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn mappings(&self) -> Vec<MappingRecord> {
        self.lock().mappings.clone()
    }

    pub fn unmapped(&self) -> Vec<UnmappedEntry> {
        self.lock().unmapped.clone()
    }

    pub fn runs(&self) -> Vec<JobRun> {
        self.lock().runs.clone()
    }

    /// Insert a mapping row verbatim, bypassing enum validation. Lets callers
    /// model historical rows with arbitrary `match_method` text.
    pub fn insert_raw_mapping(
        &self,
        source_a_id: &str,
        match_method: &str,
        confidence_score: f64,
        verified: bool,
        created_at: DateTime<Utc>,
    ) {
        let mut state = self.lock();
        let id = state.next_id();
        state.mappings.push(MappingRecord {
            id,
            source_a_id: source_a_id.to_string(),
            source_b_id: format!("b-{source_a_id}"),
            canonical_name: source_a_id.to_string(),
            confidence_score,
            match_method: match_method.to_string(),
            verified,
            position: None,
            team: None,
            notes: None,
            created_at,
            updated_at: created_at,
        });
    }

    /// Insert an unmapped row verbatim with the given raw `source` text.
    pub fn insert_raw_unmapped(&self, source: &str, player_id: &str, display_name: &str, attempts: i32) {
        let mut state = self.lock();
        let id = state.next_id();
        let now = Utc::now();
        state.unmapped.push(UnmappedEntry {
            id,
            source: source.to_string(),
            player_id: player_id.to_string(),
            display_name: display_name.to_string(),
            position: None,
            team: None,
            attempts_count: attempts,
            notes: None,
            review_status: ReviewStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        });
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store: writes disabled"));
        }
        Ok(())
    }
}

fn review_order(a: &UnmappedEntry, b: &UnmappedEntry) -> std::cmp::Ordering {
    let rejected = |e: &UnmappedEntry| e.review_status == ReviewStatus::Rejected.as_str();
    rejected(a)
        .cmp(&rejected(b))
        .then_with(|| b.attempts_count.cmp(&a.attempts_count))
        .then_with(|| a.id.cmp(&b.id))
}

fn take_limit<T>(rows: Vec<T>, limit: i64) -> Vec<T> {
    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    rows.into_iter().take(limit).collect()
}

#[async_trait::async_trait]
impl MappingStore for MemoryStore {
    async fn mapped_source_ids(&self) -> Result<HashSet<String>> {
        let state = self.lock();
        let mut ids = state.premapped.clone();
        ids.extend(state.mappings.iter().map(|m| m.source_a_id.clone()));
        Ok(ids)
    }

    async fn persist_batch(&self, batch: &ResolutionBatch) -> Result<()> {
        self.check_writable()?;
        let mut guard = self.lock();
        let mut next = guard.clone();

        for m in &batch.mappings {
            next.upsert_mapping(m, true);
        }
        let mapped: HashSet<&str> = batch
            .mappings
            .iter()
            .map(|m| m.source_a_id.as_str())
            .collect();
        next.unmapped.retain(|u| {
            !(u.source == Provider::Stats.as_str() && mapped.contains(u.player_id.as_str()))
        });
        for u in &batch.unmapped {
            next.upsert_unmapped(u);
        }

        *guard = next;
        Ok(())
    }

    async fn accept_mapping(&self, source: Provider, mapping: &NewMapping) -> Result<()> {
        self.check_writable()?;
        let mut state = self.lock();
        state.upsert_mapping(mapping, false);
        state
            .unmapped
            .retain(|u| !(u.source == source.as_str() && u.player_id == mapping.source_a_id));
        Ok(())
    }

    async fn reject_unmapped(
        &self,
        source: Provider,
        player_id: &str,
        reason: &str,
    ) -> Result<bool> {
        self.check_writable()?;
        let mut state = self.lock();
        let Some(row) = state
            .unmapped
            .iter_mut()
            .find(|u| u.source == source.as_str() && u.player_id == player_id)
        else {
            return Ok(false);
        };
        row.notes = Some(reason.to_string());
        row.review_status = ReviewStatus::Rejected.as_str().to_string();
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn review_queue(&self, limit: i64) -> Result<Vec<UnmappedEntry>> {
        let mut rows = self.unmapped();
        rows.sort_by(review_order);
        Ok(take_limit(rows, limit))
    }

    async fn top_unmapped(&self, limit: i64) -> Result<Vec<UnmappedEntry>> {
        let mut rows = self.unmapped();
        rows.sort_by(|a, b| {
            b.attempts_count
                .cmp(&a.attempts_count)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(take_limit(rows, limit))
    }

    async fn low_confidence(&self, threshold: f64, limit: i64) -> Result<Vec<MappingRecord>> {
        let mut rows: Vec<MappingRecord> = self
            .mappings()
            .into_iter()
            .filter(|m| m.confidence_score < threshold && !m.verified)
            .collect();
        rows.sort_by(|a, b| {
            a.confidence_score
                .total_cmp(&b.confidence_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(take_limit(rows, limit))
    }

    async fn mapping_facets(&self) -> Result<Vec<MappingFacet>> {
        Ok(self
            .lock()
            .mappings
            .iter()
            .map(|m| MappingFacet {
                match_method: m.match_method.clone(),
                confidence_score: m.confidence_score,
                verified: m.verified,
            })
            .collect())
    }

    async fn unmapped_sources(&self) -> Result<Vec<String>> {
        Ok(self.lock().unmapped.iter().map(|u| u.source.clone()).collect())
    }

    async fn count_mappings_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let n = self
            .lock()
            .mappings
            .iter()
            .filter(|m| m.created_at >= since)
            .count();
        Ok(i64::try_from(n)?)
    }
}

#[async_trait::async_trait]
impl RunLog for MemoryStore {
    async fn start(&self, job_name: &str) -> Result<i64> {
        let mut state = self.lock();
        let id = state.next_id();
        state.runs.push(JobRun {
            id,
            job_name: job_name.to_string(),
            status: "running".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            summary: None,
            error: None,
        });
        Ok(id)
    }

    async fn finish(&self, run_id: i64, outcome: RunOutcome) -> Result<()> {
        let mut state = self.lock();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| anyhow!("unknown run {run_id}"))?;
        run.status = outcome.status().to_string();
        run.finished_at = Some(Utc::now());
        match outcome {
            RunOutcome::Succeeded(summary) => run.summary = Some(summary),
            RunOutcome::Failed(error) => run.error = Some(error),
        }
        Ok(())
    }

    async fn latest(&self, job_name: &str) -> Result<Option<JobRun>> {
        Ok(self
            .lock()
            .runs
            .iter()
            .filter(|r| r.job_name == job_name)
            .max_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)))
            .cloned())
    }
}

/// Fixed record set, or a fetch that always fails.
#[derive(Debug, Clone)]
pub struct StaticRecordSource {
    provider: Provider,
    records: std::result::Result<Vec<SourceRecord>, String>,
}

impl StaticRecordSource {
    pub fn new(provider: Provider, records: Vec<SourceRecord>) -> Self {
        Self {
            provider,
            records: Ok(records),
        }
    }

    pub fn failing(provider: Provider, message: impl Into<String>) -> Self {
        Self {
            provider,
            records: Err(message.into()),
        }
    }
}

#[async_trait::async_trait]
impl RecordSource for StaticRecordSource {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_records(&self) -> Result<Vec<SourceRecord>> {
        self.records.clone().map_err(|e| anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::models::MatchMethod;

    fn fuzzy(a: &str, b: &str, score: f64) -> NewMapping {
        NewMapping {
            source_a_id: a.into(),
            source_b_id: b.into(),
            canonical_name: a.into(),
            confidence_score: score,
            match_method: MatchMethod::Fuzzy,
            verified: false,
            position: None,
            team: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn batch_never_overwrites_verified_rows() {
        let store = MemoryStore::new();
        let mut manual = fuzzy("a1", "b1", 1.0);
        manual.match_method = MatchMethod::Manual;
        manual.verified = true;
        store.accept_mapping(Provider::Stats, &manual).await.unwrap();

        let batch = ResolutionBatch {
            mappings: vec![fuzzy("a1", "b9", 0.95)],
            unmapped: Vec::new(),
        };
        store.persist_batch(&batch).await.unwrap();

        let rows = store.mappings();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_b_id, "b1");
        assert_eq!(rows[0].match_method, "manual");
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let batch = ResolutionBatch {
            mappings: vec![fuzzy("a1", "b1", 0.95)],
            unmapped: vec![NewUnmapped::from_record(
                &SourceRecord::new(Provider::Stats, "a2", "Nobody"),
                "no match",
            )],
        };
        assert!(store.persist_batch(&batch).await.is_err());
        assert!(store.mappings().is_empty());
        assert!(store.unmapped().is_empty());
    }

    #[tokio::test]
    async fn repeated_unmapped_bumps_attempts_and_keeps_rejection_notes() {
        let store = MemoryStore::new();
        let rec = SourceRecord::new(Provider::Stats, "a1", "Nobody");
        let batch = ResolutionBatch {
            mappings: Vec::new(),
            unmapped: vec![NewUnmapped::from_record(&rec, "no match")],
        };
        store.persist_batch(&batch).await.unwrap();
        assert!(store
            .reject_unmapped(Provider::Stats, "a1", "retired")
            .await
            .unwrap());
        store.persist_batch(&batch).await.unwrap();

        let rows = store.unmapped();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempts_count, 2);
        assert_eq!(rows[0].notes.as_deref(), Some("retired"));
        assert_eq!(rows[0].review_status, "rejected");
    }

    #[tokio::test]
    async fn run_log_tracks_latest_run() {
        let store = MemoryStore::new();
        assert!(store.latest("bulk_mapping").await.unwrap().is_none());
        let first = store.start("bulk_mapping").await.unwrap();
        store
            .finish(first, RunOutcome::Failed("boom".into()))
            .await
            .unwrap();
        let second = store.start("bulk_mapping").await.unwrap();
        let latest = store.latest("bulk_mapping").await.unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.status, "running");
        assert!(store.finish(999, RunOutcome::Failed("x".into())).await.is_err());
    }
}
