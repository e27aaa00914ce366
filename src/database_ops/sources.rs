use anyhow::{Context, Result};
use tracing::{debug, instrument};

use super::db::Db;
use super::models::{Provider, SourceRecord};

/// Read-only access to one provider's current player snapshot.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    fn provider(&self) -> Provider;
    async fn fetch_records(&self) -> Result<Vec<SourceRecord>>;
}

/// Provider snapshot stored in a local Postgres table.
#[derive(Clone)]
pub struct PgRecordSource {
    db: Db,
    provider: Provider,
}

impl PgRecordSource {
    pub fn new(db: Db, provider: Provider) -> Self {
        Self { db, provider }
    }

    fn select_sql(&self) -> &'static str {
        match self.provider {
            Provider::Stats => {
                "SELECT player_id, display_name, position, team
                   FROM stats_players ORDER BY player_id"
            }
            Provider::Draft => {
                "SELECT player_id, full_name AS display_name, position, team
                   FROM draft_players ORDER BY player_id"
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct PlayerRow {
    player_id: String,
    display_name: Option<String>,
    position: Option<String>,
    team: Option<String>,
}

#[async_trait::async_trait]
impl RecordSource for PgRecordSource {
    fn provider(&self) -> Provider {
        self.provider
    }

    #[instrument(skip(self), fields(provider = %self.provider))]
    async fn fetch_records(&self) -> Result<Vec<SourceRecord>> {
        let rows = sqlx::query_as::<_, PlayerRow>(self.select_sql())
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await
            .with_context(|| format!("selecting {} players", self.provider))?;
        debug!(count = rows.len(), "fetched provider records");
        Ok(rows
            .into_iter()
            .map(|r| SourceRecord {
                provider: self.provider,
                id: r.player_id,
                display_name: r.display_name.unwrap_or_default(),
                position: r.position.filter(|p| !p.trim().is_empty()),
                team: r.team.filter(|t| !t.trim().is_empty()),
            })
            .collect())
    }
}
