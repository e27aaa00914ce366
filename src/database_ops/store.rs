use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, instrument};

use super::db::Db;
use super::models::{
    MappingFacet, MappingRecord, NewMapping, NewUnmapped, Provider, ReviewStatus, UnmappedEntry,
};

/// Rows per multi-VALUES statement; keeps well under the 65535 bind limit.
const WRITE_CHUNK: usize = 1000;

/// Everything one bulk pass wants written, applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionBatch {
    pub mappings: Vec<NewMapping>,
    pub unmapped: Vec<NewUnmapped>,
}

impl ResolutionBatch {
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty() && self.unmapped.is_empty()
    }
}

/// Durable mapping and unmapped tables.
///
/// All mutation is upsert-by-key or delete-by-key.
#[async_trait::async_trait]
pub trait MappingStore: Send + Sync {
    /// `source_a_id`s that already have a mapping.
    async fn mapped_source_ids(&self) -> Result<HashSet<String>>;

    /// Upsert mappings (never overwriting a verified one), drop the unmapped
    /// rows they resolve, then upsert unmapped rows bumping `attempts_count`.
    /// Either everything is written or nothing is.
    async fn persist_batch(&self, batch: &ResolutionBatch) -> Result<()>;

    /// Upsert a human-confirmed mapping and delete the matching unmapped row in
    /// one transaction. Idempotent.
    async fn accept_mapping(&self, source: Provider, mapping: &NewMapping) -> Result<()>;

    /// Mark an unmapped row rejected with `reason` as its notes. Returns
    /// `false` when no such row exists.
    async fn reject_unmapped(&self, source: Provider, player_id: &str, reason: &str)
        -> Result<bool>;

    /// Review queue order: pending before rejected, then most attempts first.
    async fn review_queue(&self, limit: i64) -> Result<Vec<UnmappedEntry>>;

    /// Unmapped rows by `attempts_count` descending.
    async fn top_unmapped(&self, limit: i64) -> Result<Vec<UnmappedEntry>>;

    /// Unverified mappings scoring below `threshold`, worst first.
    async fn low_confidence(&self, threshold: f64, limit: i64) -> Result<Vec<MappingRecord>>;

    async fn mapping_facets(&self) -> Result<Vec<MappingFacet>>;

    /// Raw `source` column of every unmapped row.
    async fn unmapped_sources(&self) -> Result<Vec<String>>;

    async fn count_mappings_since(&self, since: DateTime<Utc>) -> Result<i64>;

    async fn ping(&self) -> bool {
        true
    }
}

/// [`MappingStore`] over the `player_id_mappings` / `unmapped_players` tables.
#[derive(Clone)]
pub struct PgMappingStore {
    db: Db,
}

impl PgMappingStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

const UNMAPPED_COLUMNS: &str = "id, source, player_id, display_name, position, team, \
     attempts_count, notes, review_status, created_at, updated_at";

const MAPPING_COLUMNS: &str = "id, source_a_id, source_b_id, canonical_name, confidence_score, \
     match_method, verified, position, team, notes, created_at, updated_at";

fn push_mapping_values<'a>(qb: &mut QueryBuilder<'a, Postgres>, rows: &'a [NewMapping]) {
    qb.push_values(rows, |mut b, m| {
        b.push_bind(&m.source_a_id)
            .push_bind(&m.source_b_id)
            .push_bind(&m.canonical_name)
            .push_bind(m.confidence_score)
            .push_bind(m.match_method.as_str())
            .push_bind(m.verified)
            .push_bind(&m.position)
            .push_bind(&m.team)
            .push_bind(&m.notes);
    });
}

const MAPPING_INSERT: &str = "INSERT INTO player_id_mappings (source_a_id, source_b_id, \
     canonical_name, confidence_score, match_method, verified, position, team, notes) ";

const MAPPING_UPSERT_SET: &str = " ON CONFLICT (source_a_id) DO UPDATE SET
        source_b_id = EXCLUDED.source_b_id,
        canonical_name = EXCLUDED.canonical_name,
        confidence_score = EXCLUDED.confidence_score,
        match_method = EXCLUDED.match_method,
        verified = EXCLUDED.verified,
        position = EXCLUDED.position,
        team = EXCLUDED.team,
        notes = EXCLUDED.notes,
        updated_at = now()";

#[async_trait::async_trait]
impl MappingStore for PgMappingStore {
    #[instrument(skip(self))]
    async fn mapped_source_ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT source_a_id FROM player_id_mappings")
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await
            .context("loading mapped source ids")?;
        Ok(ids.into_iter().collect())
    }

    #[instrument(skip(self, batch), fields(mappings = batch.mappings.len(), unmapped = batch.unmapped.len()))]
    async fn persist_batch(&self, batch: &ResolutionBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.db.pool.begin().await?;

        for chunk in batch.mappings.chunks(WRITE_CHUNK) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(MAPPING_INSERT);
            push_mapping_values(&mut qb, chunk);
            qb.push(MAPPING_UPSERT_SET);
            // Automatic passes never replace a verified (exact or human) mapping.
            qb.push(" WHERE player_id_mappings.verified = false");
            qb.build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("upserting mappings")?;
        }

        let mapped: Vec<&str> = batch
            .mappings
            .iter()
            .map(|m| m.source_a_id.as_str())
            .collect();
        if !mapped.is_empty() {
            sqlx::query("DELETE FROM unmapped_players WHERE source = $1 AND player_id = ANY($2)")
                .persistent(false)
                .bind(Provider::Stats.as_str())
                .bind(&mapped)
                .execute(&mut *tx)
                .await
                .context("clearing resolved unmapped rows")?;
        }

        for chunk in batch.unmapped.chunks(WRITE_CHUNK) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO unmapped_players (source, player_id, display_name, position, team, notes) ",
            );
            qb.push_values(chunk, |mut b, u| {
                b.push_bind(u.source.as_str())
                    .push_bind(&u.player_id)
                    .push_bind(&u.display_name)
                    .push_bind(&u.position)
                    .push_bind(&u.team)
                    .push_bind(&u.notes);
            });
            // Rejected rows keep the reviewer's notes.
            qb.push(
                " ON CONFLICT (source, player_id) DO UPDATE SET
                    attempts_count = unmapped_players.attempts_count + 1,
                    display_name = EXCLUDED.display_name,
                    position = EXCLUDED.position,
                    team = EXCLUDED.team,
                    notes = CASE WHEN unmapped_players.review_status = 'rejected'
                                 THEN unmapped_players.notes ELSE EXCLUDED.notes END,
                    updated_at = now()",
            );
            qb.build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("upserting unmapped rows")?;
        }

        tx.commit().await.context("committing resolution batch")?;
        info!("resolution batch committed");
        Ok(())
    }

    #[instrument(skip(self, mapping), fields(source_a_id = %mapping.source_a_id))]
    async fn accept_mapping(&self, source: Provider, mapping: &NewMapping) -> Result<()> {
        let mut tx = self.db.pool.begin().await?;

        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(MAPPING_INSERT);
        push_mapping_values(&mut qb, std::slice::from_ref(mapping));
        qb.push(MAPPING_UPSERT_SET);
        qb.build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("upserting manual mapping")?;

        sqlx::query("DELETE FROM unmapped_players WHERE source = $1 AND player_id = $2")
            .persistent(false)
            .bind(source.as_str())
            .bind(&mapping.source_a_id)
            .execute(&mut *tx)
            .await
            .context("deleting accepted unmapped row")?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, reason))]
    async fn reject_unmapped(
        &self,
        source: Provider,
        player_id: &str,
        reason: &str,
    ) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE unmapped_players
                SET notes = $3, review_status = $4, updated_at = now()
              WHERE source = $1 AND player_id = $2",
        )
        .persistent(false)
        .bind(source.as_str())
        .bind(player_id)
        .bind(reason)
        .bind(ReviewStatus::Rejected.as_str())
        .execute(&self.db.pool)
        .await
        .context("rejecting unmapped row")?;
        Ok(res.rows_affected() > 0)
    }

    async fn review_queue(&self, limit: i64) -> Result<Vec<UnmappedEntry>> {
        let sql = format!(
            "SELECT {UNMAPPED_COLUMNS} FROM unmapped_players
              ORDER BY (review_status = 'rejected'), attempts_count DESC, id
              LIMIT $1"
        );
        let rows = sqlx::query_as::<_, UnmappedEntry>(&sql)
            .persistent(false)
            .bind(limit)
            .fetch_all(&self.db.pool)
            .await
            .context("loading review queue")?;
        Ok(rows)
    }

    async fn top_unmapped(&self, limit: i64) -> Result<Vec<UnmappedEntry>> {
        let sql = format!(
            "SELECT {UNMAPPED_COLUMNS} FROM unmapped_players
              ORDER BY attempts_count DESC, id
              LIMIT $1"
        );
        let rows = sqlx::query_as::<_, UnmappedEntry>(&sql)
            .persistent(false)
            .bind(limit)
            .fetch_all(&self.db.pool)
            .await
            .context("loading top unmapped")?;
        Ok(rows)
    }

    async fn low_confidence(&self, threshold: f64, limit: i64) -> Result<Vec<MappingRecord>> {
        let sql = format!(
            "SELECT {MAPPING_COLUMNS} FROM player_id_mappings
              WHERE confidence_score < $1 AND verified = false
              ORDER BY confidence_score ASC, id
              LIMIT $2"
        );
        let rows = sqlx::query_as::<_, MappingRecord>(&sql)
            .persistent(false)
            .bind(threshold)
            .bind(limit)
            .fetch_all(&self.db.pool)
            .await
            .context("loading low-confidence mappings")?;
        Ok(rows)
    }

    async fn mapping_facets(&self) -> Result<Vec<MappingFacet>> {
        let rows = sqlx::query_as::<_, MappingFacet>(
            "SELECT match_method, confidence_score, verified FROM player_id_mappings",
        )
        .persistent(false)
        .fetch_all(&self.db.pool)
        .await
        .context("loading mapping facets")?;
        Ok(rows)
    }

    async fn unmapped_sources(&self) -> Result<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT source FROM unmapped_players")
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await
            .context("loading unmapped sources")?;
        Ok(rows)
    }

    async fn count_mappings_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM player_id_mappings WHERE created_at >= $1")
                .persistent(false)
                .bind(since)
                .fetch_one(&self.db.pool)
                .await
                .context("counting recent mappings")?;
        Ok(n)
    }

    async fn ping(&self) -> bool {
        self.db.ping().await
    }
}
