// Domain rows shared by the matcher, the store and the HTTP layer

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the two identifier spaces being linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Weekly statistics provider; owns `source_a_id`.
    Stats,
    /// Draft / mock-draft provider; owns `source_b_id`.
    Draft,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Draft => "draft",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stats" => Ok(Self::Stats),
            "draft" => Ok(Self::Draft),
            other => Err(anyhow::anyhow!("unknown provider '{other}'")),
        }
    }
}

/// How a mapping was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Fuzzy,
    Manual,
    Community,
}

impl MatchMethod {
    pub const ALL: [MatchMethod; 4] = [Self::Exact, Self::Fuzzy, Self::Manual, Self::Community];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Manual => "manual",
            Self::Community => "community",
        }
    }

    /// Exact and manual mappings are trusted without further review.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Exact | Self::Manual)
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "manual" => Ok(Self::Manual),
            "community" => Ok(Self::Community),
            other => Err(anyhow::anyhow!("unknown match method '{other}'")),
        }
    }
}

/// Review state of an unmapped entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rejected => "rejected",
        }
    }
}

/// Immutable provider snapshot of one athlete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub provider: Provider,
    pub id: String,
    pub display_name: String,
    pub position: Option<String>,
    pub team: Option<String>,
}

impl SourceRecord {
    pub fn new(provider: Provider, id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
            display_name: display_name.into(),
            position: None,
            team: None,
        }
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }
}

/// Mapping row to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMapping {
    pub source_a_id: String,
    pub source_b_id: String,
    pub canonical_name: String,
    pub confidence_score: f64,
    pub match_method: MatchMethod,
    pub verified: bool,
    pub position: Option<String>,
    pub team: Option<String>,
    pub notes: Option<String>,
}

/// Persisted mapping as read back for reports.
///
/// `match_method` stays textual: historical rows may hold values outside
/// [`MatchMethod`] and readers must tolerate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MappingRecord {
    pub id: i64,
    pub source_a_id: String,
    pub source_b_id: String,
    pub canonical_name: String,
    pub confidence_score: f64,
    pub match_method: String,
    pub verified: bool,
    pub position: Option<String>,
    pub team: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The three mapping columns the summary report aggregates over.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MappingFacet {
    pub match_method: String,
    pub confidence_score: f64,
    pub verified: bool,
}

/// Unmapped row to be inserted or bumped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUnmapped {
    pub source: Provider,
    pub player_id: String,
    pub display_name: String,
    pub position: Option<String>,
    pub team: Option<String>,
    pub notes: Option<String>,
}

impl NewUnmapped {
    pub fn from_record(record: &SourceRecord, notes: impl Into<String>) -> Self {
        Self {
            source: record.provider,
            player_id: record.id.clone(),
            display_name: record.display_name.clone(),
            position: record.position.clone(),
            team: record.team.clone(),
            notes: Some(notes.into()),
        }
    }
}

/// Persisted unresolved entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UnmappedEntry {
    pub id: i64,
    pub source: String,
    pub player_id: String,
    pub display_name: String,
    pub position: Option<String>,
    pub team: Option<String>,
    pub attempts_count: i32,
    pub notes: Option<String>,
    pub review_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnmappedEntry {
    /// Rebuild the provider snapshot used to compute live suggestions.
    pub fn as_source_record(&self) -> SourceRecord {
        SourceRecord {
            provider: self.source.parse().unwrap_or(Provider::Stats),
            id: self.player_id.clone(),
            display_name: self.display_name.clone(),
            position: self.position.clone(),
            team: self.team.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_text() {
        for m in MatchMethod::ALL {
            assert_eq!(m.as_str().parse::<MatchMethod>().unwrap(), m);
        }
        assert_eq!(" Draft ".parse::<Provider>().unwrap(), Provider::Draft);
        assert!("espn".parse::<Provider>().is_err());
        assert!("guess".parse::<MatchMethod>().is_err());
    }

    #[test]
    fn only_exact_and_manual_are_verified() {
        assert!(MatchMethod::Exact.is_verified());
        assert!(MatchMethod::Manual.is_verified());
        assert!(!MatchMethod::Fuzzy.is_verified());
        assert!(!MatchMethod::Community.is_verified());
    }
}
