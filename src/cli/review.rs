use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;

use crate::database_ops::models::Provider;
use crate::database_ops::{PgMappingStore, PgRecordSource, ReviewItem, ReviewWorkflow};
use crate::util::config::MapperConfig;

#[derive(Debug, Clone, Default)]
pub struct ReviewListConfig {
    pub database_url: Option<String>,
    pub limit: Option<i64>,
}

pub async fn run(cfg: ReviewListConfig) -> Result<()> {
    let db = super::connect(cfg.database_url.clone(), 3).await?;
    let workflow = ReviewWorkflow::new(
        Arc::new(PgMappingStore::new(db.clone())),
        Arc::new(PgRecordSource::new(db, Provider::Draft)),
        MapperConfig::from_env(),
    );
    let items = workflow.list(cfg.limit).await?;
    print!("{}", render_review(&items));
    Ok(())
}

/// One line per entry, suggestions indented beneath it.
pub fn render_review(items: &[ReviewItem]) -> String {
    let mut out = String::new();
    if items.is_empty() {
        let _ = writeln!(out, "review queue is empty");
        return out;
    }
    for item in items {
        let e = &item.entry;
        let _ = writeln!(
            out,
            "{:<12} {:<28} {:<4} attempts={:<3} [{}]",
            e.player_id,
            e.display_name,
            e.position.as_deref().unwrap_or("-"),
            e.attempts_count,
            e.review_status
        );
        for s in &item.suggestions {
            let _ = writeln!(
                out,
                "    -> {:<12} {:<28} {:.3} {}",
                s.candidate_id, s.candidate_name, s.score, s.confidence
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::models::UnmappedEntry;
    use crate::matching::Suggestion;
    use crate::normalization::ConfidenceTier;
    use chrono::Utc;

    #[test]
    fn renders_entries_with_suggestions() {
        let now = Utc::now();
        let item = ReviewItem {
            entry: UnmappedEntry {
                id: 1,
                source: "stats".into(),
                player_id: "a1".into(),
                display_name: "Jon Smith".into(),
                position: Some("WR".into()),
                team: None,
                attempts_count: 3,
                notes: None,
                review_status: "pending".into(),
                created_at: now,
                updated_at: now,
            },
            suggestions: vec![Suggestion {
                candidate_id: "b2".into(),
                candidate_name: "John Smith".into(),
                score: 0.8236,
                confidence: ConfidenceTier::Medium,
            }],
        };
        let text = render_review(&[item]);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("a1 "));
        assert!(lines[0].contains("attempts=3"));
        assert!(lines[1].contains("b2"));
        assert!(lines[1].ends_with("0.824 medium"));
        assert_eq!(render_review(&[]), "review queue is empty\n");
    }
}
