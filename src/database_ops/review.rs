use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::models::{MatchMethod, NewMapping, Provider, UnmappedEntry};
use super::sources::RecordSource;
use super::store::MappingStore;
use crate::auth::Principal;
use crate::error::{MapperError, MapperResult};
use crate::matching::{Candidate, MatchEngine, Suggestion};
use crate::util::config::MapperConfig;

/// One unmapped entry plus live suggestions from provider B.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    #[serde(flatten)]
    pub entry: UnmappedEntry,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AcceptRequest {
    pub source_a_id: String,
    pub source_b_id: String,
    pub canonical_name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RejectRequest {
    pub source_a_id: String,
    pub reason: String,
}

/// Human adjudication of unresolved provider A records.
pub struct ReviewWorkflow {
    store: Arc<dyn MappingStore>,
    candidates: Arc<dyn RecordSource>,
    config: MapperConfig,
}

impl ReviewWorkflow {
    pub fn new(
        store: Arc<dyn MappingStore>,
        candidates: Arc<dyn RecordSource>,
        config: MapperConfig,
    ) -> Self {
        Self {
            store,
            candidates,
            config,
        }
    }

    /// Pending entries first, then by attempts. Each carries up to
    /// `suggestion_limit` candidates scored against the current provider B set.
    #[instrument(skip(self))]
    pub async fn list(&self, limit: Option<i64>) -> MapperResult<Vec<ReviewItem>> {
        let limit = self.config.limit(limit);
        let entries = self
            .store
            .review_queue(limit)
            .await
            .map_err(MapperError::persistence)?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let records = self
            .candidates
            .fetch_records()
            .await
            .map_err(|e| MapperError::upstream(self.candidates.provider(), e))?;
        let pool: Vec<Candidate> = records.into_iter().map(Candidate::new).collect();
        let engine = MatchEngine::new(self.config.fallback_scan_limit);
        let max = self.config.suggestion_limit;

        let items = entries
            .into_par_iter()
            .map(|entry| {
                let suggestions = engine
                    .find_multiple_matches(&entry.as_source_record(), &pool, max)
                    .iter()
                    .map(Suggestion::from)
                    .collect();
                ReviewItem { entry, suggestions }
            })
            .collect();
        Ok(items)
    }

    /// Record a human-confirmed mapping and clear the unmapped entry.
    /// Repeating the same call leaves the same single mapping behind.
    #[instrument(skip(self, req), fields(subject = %principal.subject, source_a_id = %req.source_a_id))]
    pub async fn accept(&self, principal: &Principal, req: AcceptRequest) -> MapperResult<NewMapping> {
        let source_a_id = required("source_a_id", &req.source_a_id)?;
        let source_b_id = required("source_b_id", &req.source_b_id)?;
        let canonical_name = required("canonical_name", &req.canonical_name)?;

        let mapping = NewMapping {
            source_a_id,
            source_b_id,
            canonical_name,
            confidence_score: 1.0,
            match_method: MatchMethod::Manual,
            verified: MatchMethod::Manual.is_verified(),
            position: None,
            team: None,
            notes: req
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        };
        self.store
            .accept_mapping(Provider::Stats, &mapping)
            .await
            .map_err(MapperError::persistence)?;
        info!(source_b_id = %mapping.source_b_id, "mapping accepted");
        Ok(mapping)
    }

    /// Keep the entry but mark it rejected so it sorts behind pending work.
    #[instrument(skip(self, req), fields(subject = %principal.subject, source_a_id = %req.source_a_id))]
    pub async fn reject(&self, principal: &Principal, req: RejectRequest) -> MapperResult<()> {
        let source_a_id = required("source_a_id", &req.source_a_id)?;
        let reason = required("reason", &req.reason)?;
        let found = self
            .store
            .reject_unmapped(Provider::Stats, &source_a_id, &reason)
            .await
            .map_err(MapperError::persistence)?;
        if !found {
            return Err(MapperError::NotFound(format!(
                "unmapped entry '{source_a_id}'"
            )));
        }
        info!("entry rejected");
        Ok(())
    }
}

fn required(field: &str, value: &str) -> MapperResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(MapperError::Validation(format!("{field} must not be empty")));
    }
    Ok(v.to_string())
}
