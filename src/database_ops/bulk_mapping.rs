use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::models::{MatchMethod, NewMapping, NewUnmapped, SourceRecord};
use super::run_log::{RunLog, RunOutcome};
use super::sources::RecordSource;
use super::store::{MappingStore, ResolutionBatch};
use crate::error::{MapperError, MapperResult};
use crate::matching::{Candidate, CandidateIndex, MatchEngine, MatchOutcome};
use crate::normalization::ConfidenceTier;
use crate::util::config::MapperConfig;

pub const JOB_NAME: &str = "bulk_mapping";

/// Counters returned by one bulk pass.
///
/// `total_processed` is the sum of the four outcome counters; targets that
/// already had a mapping are only counted in `skipped_already_mapped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkMappingSummary {
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub manual_review_needed: usize,
    pub unmapped: usize,
    pub total_processed: usize,
    pub skipped_already_mapped: usize,
}

/// Per-target classification before anything is written.
#[derive(Debug, Clone, PartialEq)]
enum Resolution {
    Exact(NewMapping),
    Fuzzy(NewMapping),
    /// Medium/low confidence: parked for a human with the best guess in notes.
    Review(NewUnmapped),
    Unmapped(NewUnmapped),
}

/// Resolves every provider A record against provider B and persists the result.
pub struct BulkResolutionJob {
    targets: Arc<dyn RecordSource>,
    candidates: Arc<dyn RecordSource>,
    store: Arc<dyn MappingStore>,
    run_log: Arc<dyn RunLog>,
    config: MapperConfig,
}

impl BulkResolutionJob {
    pub fn new(
        targets: Arc<dyn RecordSource>,
        candidates: Arc<dyn RecordSource>,
        store: Arc<dyn MappingStore>,
        run_log: Arc<dyn RunLog>,
        config: MapperConfig,
    ) -> Self {
        Self {
            targets,
            candidates,
            store,
            run_log,
            config,
        }
    }

    /// Run once, recording the attempt in the run log. A run-log failure is
    /// logged and never fails the job itself.
    #[instrument(skip(self), name = "bulk_mapping")]
    pub async fn run(&self) -> MapperResult<BulkMappingSummary> {
        let run_id = match self.run_log.start(JOB_NAME).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "could not record run start");
                None
            }
        };

        let result = self.execute().await;

        if let Some(id) = run_id {
            let outcome = match &result {
                Ok(summary) => RunOutcome::Succeeded(
                    serde_json::to_value(summary).unwrap_or(serde_json::Value::Null),
                ),
                Err(e) => RunOutcome::Failed(e.to_string()),
            };
            if let Err(e) = self.run_log.finish(id, outcome).await {
                warn!(run_id = id, error = %e, "could not record run outcome");
            }
        }
        result
    }

    async fn execute(&self) -> MapperResult<BulkMappingSummary> {
        let (targets, candidates) =
            tokio::try_join!(fetch(&*self.targets), fetch(&*self.candidates))?;
        info!(
            targets = targets.len(),
            candidates = candidates.len(),
            "loaded provider records"
        );

        let already_mapped = self
            .store
            .mapped_source_ids()
            .await
            .map_err(MapperError::persistence)?;

        let mut unique: IndexMap<String, SourceRecord> = IndexMap::with_capacity(targets.len());
        for record in targets {
            unique.entry(record.id.clone()).or_insert(record);
        }
        let before = unique.len();
        let pending: Vec<SourceRecord> = unique
            .into_values()
            .filter(|r| !already_mapped.contains(&r.id))
            .collect();
        let skipped = before - pending.len();

        let engine = MatchEngine::new(self.config.fallback_scan_limit);
        let position_filter = self.config.position_filter;
        let (batch, mut summary) = tokio::task::spawn_blocking(move || {
            let index = CandidateIndex::build(candidates);
            classify_all(&engine, &index, &pending, position_filter)
        })
        .await
        .map_err(MapperError::internal)?;
        summary.skipped_already_mapped = skipped;

        self.store
            .persist_batch(&batch)
            .await
            .map_err(MapperError::persistence)?;

        info!(
            exact = summary.exact_matches,
            fuzzy = summary.fuzzy_matches,
            review = summary.manual_review_needed,
            unmapped = summary.unmapped,
            skipped = summary.skipped_already_mapped,
            "bulk mapping complete"
        );
        Ok(summary)
    }
}

async fn fetch(source: &dyn RecordSource) -> MapperResult<Vec<SourceRecord>> {
    source
        .fetch_records()
        .await
        .map_err(|e| MapperError::upstream(source.provider(), e))
}

/// Resolve every target on the rayon pool and fold the outcomes into one
/// write batch. Output order follows `targets`.
pub(crate) fn classify_all(
    engine: &MatchEngine,
    index: &CandidateIndex,
    targets: &[SourceRecord],
    position_filter: bool,
) -> (ResolutionBatch, BulkMappingSummary) {
    let resolutions: Vec<Resolution> = targets
        .par_iter()
        .map(|t| classify(engine, index, t, position_filter))
        .collect();

    let mut batch = ResolutionBatch::default();
    let mut summary = BulkMappingSummary {
        total_processed: resolutions.len(),
        ..Default::default()
    };
    for resolution in resolutions {
        match resolution {
            Resolution::Exact(m) => {
                summary.exact_matches += 1;
                batch.mappings.push(m);
            }
            Resolution::Fuzzy(m) => {
                summary.fuzzy_matches += 1;
                batch.mappings.push(m);
            }
            Resolution::Review(u) => {
                summary.manual_review_needed += 1;
                batch.unmapped.push(u);
            }
            Resolution::Unmapped(u) => {
                summary.unmapped += 1;
                batch.unmapped.push(u);
            }
        }
    }
    (batch, summary)
}

fn classify(
    engine: &MatchEngine,
    index: &CandidateIndex,
    target: &SourceRecord,
    position_filter: bool,
) -> Resolution {
    let position = if position_filter {
        target.position.as_deref()
    } else {
        None
    };

    match engine.resolve(target, index, position) {
        MatchOutcome::Exact { candidate } => {
            Resolution::Exact(mapping(target, candidate, 1.0, MatchMethod::Exact, None))
        }
        MatchOutcome::Fuzzy(s) if s.confidence == ConfidenceTier::High => {
            let note = format!("fuzzy match on '{}'", s.candidate.record.display_name);
            Resolution::Fuzzy(mapping(
                target,
                s.candidate,
                s.score,
                MatchMethod::Fuzzy,
                Some(note),
            ))
        }
        MatchOutcome::Fuzzy(s) => Resolution::Review(NewUnmapped::from_record(
            target,
            format!(
                "possible match: {} ({}) score {:.3} [{}]",
                s.candidate.record.display_name, s.candidate.record.id, s.score, s.confidence
            ),
        )),
        MatchOutcome::None => Resolution::Unmapped(NewUnmapped::from_record(
            target,
            "no candidate above threshold",
        )),
    }
}

fn mapping(
    target: &SourceRecord,
    candidate: &Candidate,
    score: f64,
    method: MatchMethod,
    notes: Option<String>,
) -> NewMapping {
    NewMapping {
        source_a_id: target.id.clone(),
        source_b_id: candidate.record.id.clone(),
        canonical_name: target.display_name.clone(),
        confidence_score: score,
        match_method: method,
        verified: method.is_verified(),
        position: target
            .position
            .clone()
            .or_else(|| candidate.record.position.clone()),
        team: target.team.clone().or_else(|| candidate.record.team.clone()),
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::memory::{MemoryStore, StaticRecordSource};
    use crate::database_ops::models::Provider;

    fn stats(id: &str, name: &str) -> SourceRecord {
        SourceRecord::new(Provider::Stats, id, name)
    }

    fn draft(id: &str, name: &str) -> SourceRecord {
        SourceRecord::new(Provider::Draft, id, name)
    }

    fn job(
        targets: Vec<SourceRecord>,
        candidates: Vec<SourceRecord>,
        store: &Arc<MemoryStore>,
    ) -> BulkResolutionJob {
        BulkResolutionJob::new(
            Arc::new(StaticRecordSource::new(Provider::Stats, targets)),
            Arc::new(StaticRecordSource::new(Provider::Draft, candidates)),
            store.clone(),
            store.clone(),
            MapperConfig::default(),
        )
    }

    fn roster() -> (Vec<SourceRecord>, Vec<SourceRecord>) {
        let targets = vec![
            stats("a1", "Patrick Mahomes"),
            stats("a2", "Tua Tagovailoa"),
            stats("a3", "Jon Smith"),
            stats("a4", "Brock Purdy"),
        ];
        let candidates = vec![
            draft("b1", "Pat Mahomes"),
            draft("b2", "John Smith"),
            draft("b3", "Tua Tagovailoaa"),
        ];
        (targets, candidates)
    }

    #[tokio::test]
    async fn classifies_every_target_once() {
        let store = Arc::new(MemoryStore::new());
        let (targets, candidates) = roster();
        let summary = job(targets, candidates, &store).run().await.unwrap();

        assert_eq!(
            summary,
            BulkMappingSummary {
                exact_matches: 1,
                fuzzy_matches: 1,
                manual_review_needed: 1,
                unmapped: 1,
                total_processed: 4,
                skipped_already_mapped: 0,
            }
        );

        let mappings = store.mappings();
        let exact = mappings.iter().find(|m| m.source_a_id == "a1").unwrap();
        assert_eq!(exact.source_b_id, "b1");
        assert_eq!(exact.match_method, "exact");
        assert_eq!(exact.confidence_score, 1.0);
        assert!(exact.verified);
        assert_eq!(exact.canonical_name, "Patrick Mahomes");

        let fuzzy = mappings.iter().find(|m| m.source_a_id == "a2").unwrap();
        assert_eq!(fuzzy.source_b_id, "b3");
        assert!(!fuzzy.verified);
        assert!(fuzzy.confidence_score >= 0.92);

        let unmapped = store.unmapped();
        assert_eq!(unmapped.len(), 2);
        let review = unmapped.iter().find(|u| u.player_id == "a3").unwrap();
        assert!(review.notes.as_deref().unwrap().contains("(b2)"));
        assert!(unmapped.iter().any(|u| u.player_id == "a4"));

        let run = store.latest(JOB_NAME).await.unwrap().unwrap();
        assert_eq!(run.status, "succeeded");
        assert_eq!(run.summary.unwrap()["total_processed"], 4);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let (targets, candidates) = roster();
        job(targets.clone(), candidates.clone(), &store)
            .run()
            .await
            .unwrap();
        let second = job(targets, candidates, &store).run().await.unwrap();

        assert_eq!(second.skipped_already_mapped, 2);
        assert_eq!(second.total_processed, 2);
        assert_eq!(store.mappings().len(), 2);
        let unmapped = store.unmapped();
        assert_eq!(unmapped.len(), 2);
        assert!(unmapped.iter().all(|u| u.attempts_count == 2));
    }

    #[tokio::test]
    async fn empty_candidate_set_leaves_everything_unmapped() {
        let store = Arc::new(MemoryStore::new());
        let (targets, _) = roster();
        let summary = job(targets, Vec::new(), &store).run().await.unwrap();
        assert_eq!(summary.total_processed, 4);
        assert_eq!(summary.unmapped, 4);
        assert_eq!(summary.exact_matches + summary.fuzzy_matches, 0);
        assert!(store.mappings().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (targets, _) = roster();
        let job = BulkResolutionJob::new(
            Arc::new(StaticRecordSource::new(Provider::Stats, targets)),
            Arc::new(StaticRecordSource::failing(Provider::Draft, "timeout")),
            store.clone(),
            store.clone(),
            MapperConfig::default(),
        );
        let err = job.run().await.unwrap_err();
        assert!(matches!(
            err,
            MapperError::Upstream {
                provider: Provider::Draft,
                ..
            }
        ));
        assert!(store.mappings().is_empty());
        assert!(store.unmapped().is_empty());
        assert_eq!(store.latest(JOB_NAME).await.unwrap().unwrap().status, "failed");
    }

    #[tokio::test]
    async fn persistence_failure_commits_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_writes(true);
        let (targets, candidates) = roster();
        let err = job(targets, candidates, &store).run().await.unwrap_err();
        assert_eq!(err.code(), "persistence");
        assert!(store.mappings().is_empty());
        assert!(store.unmapped().is_empty());
        let run = store.latest(JOB_NAME).await.unwrap().unwrap();
        assert_eq!(run.status, "failed");
        assert!(run.error.unwrap().contains("writes disabled"));
    }

    #[tokio::test]
    async fn duplicate_target_ids_are_processed_once() {
        let store = Arc::new(MemoryStore::new());
        let targets = vec![stats("a1", "Brock Purdy"), stats("a1", "Brock Purdy")];
        let summary = job(targets, Vec::new(), &store).run().await.unwrap();
        assert_eq!(summary.total_processed, 1);
        assert_eq!(store.unmapped()[0].attempts_count, 1);
    }

    #[tokio::test]
    async fn verified_mapping_survives_a_later_fuzzy_hit() {
        let store = Arc::new(MemoryStore::new());
        // Seeded mapping for a2 means the job skips it entirely.
        store
            .accept_mapping(
                Provider::Stats,
                &NewMapping {
                    source_a_id: "a2".into(),
                    source_b_id: "b-manual".into(),
                    canonical_name: "Tua Tagovailoa".into(),
                    confidence_score: 1.0,
                    match_method: MatchMethod::Manual,
                    verified: true,
                    position: None,
                    team: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        let (targets, candidates) = roster();
        let summary = job(targets, candidates, &store).run().await.unwrap();
        assert_eq!(summary.skipped_already_mapped, 1);
        let a2 = store
            .mappings()
            .into_iter()
            .find(|m| m.source_a_id == "a2")
            .unwrap();
        assert_eq!(a2.source_b_id, "b-manual");
    }

    #[test]
    fn position_filter_can_be_disabled() {
        let index = CandidateIndex::build(vec![draft("b1", "John Smith").with_position("QB")]);
        let targets = vec![stats("a1", "John Smith").with_position("RB")];
        let engine = MatchEngine::default();

        let (_, filtered) = classify_all(&engine, &index, &targets, true);
        assert_eq!(filtered.unmapped, 1);

        let (batch, unfiltered) = classify_all(&engine, &index, &targets, false);
        assert_eq!(unfiltered.exact_matches, 1);
        assert_eq!(batch.mappings[0].position.as_deref(), Some("RB"));
    }
}
