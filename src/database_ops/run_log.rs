use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use super::db::Db;

/// Terminal state recorded for a job run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded(Value),
    Failed(String),
}

impl RunOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// One row of `mapping_job_runs`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct JobRun {
    pub id: i64,
    pub job_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<Value>,
    pub error: Option<String>,
}

/// Append-only history of bulk runs.
#[async_trait::async_trait]
pub trait RunLog: Send + Sync {
    /// Record a `running` row and return its id.
    async fn start(&self, job_name: &str) -> Result<i64>;
    async fn finish(&self, run_id: i64, outcome: RunOutcome) -> Result<()>;
    /// Most recently started run of `job_name`, if any.
    async fn latest(&self, job_name: &str) -> Result<Option<JobRun>>;
}

#[derive(Clone)]
pub struct PgRunLog {
    db: Db,
}

impl PgRunLog {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl RunLog for PgRunLog {
    #[instrument(skip(self))]
    async fn start(&self, job_name: &str) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO mapping_job_runs (job_name, status) VALUES ($1, 'running') RETURNING id",
        )
        .persistent(false)
        .bind(job_name)
        .fetch_one(&self.db.pool)
        .await
        .context("recording job start")?;
        Ok(id)
    }

    #[instrument(skip(self, outcome), fields(status = outcome.status()))]
    async fn finish(&self, run_id: i64, outcome: RunOutcome) -> Result<()> {
        let (summary, error) = match &outcome {
            RunOutcome::Succeeded(v) => (Some(v.clone()), None),
            RunOutcome::Failed(e) => (None, Some(e.clone())),
        };
        sqlx::query(
            "UPDATE mapping_job_runs
                SET status = $2, finished_at = now(), summary = $3, error = $4
              WHERE id = $1",
        )
        .persistent(false)
        .bind(run_id)
        .bind(outcome.status())
        .bind(summary)
        .bind(error)
        .execute(&self.db.pool)
        .await
        .context("recording job finish")?;
        Ok(())
    }

    async fn latest(&self, job_name: &str) -> Result<Option<JobRun>> {
        let row = sqlx::query_as::<_, JobRun>(
            "SELECT id, job_name, status, started_at, finished_at, summary, error
               FROM mapping_job_runs
              WHERE job_name = $1
              ORDER BY started_at DESC, id DESC
              LIMIT 1",
        )
        .persistent(false)
        .bind(job_name)
        .fetch_optional(&self.db.pool)
        .await
        .context("loading latest job run")?;
        Ok(row)
    }
}
