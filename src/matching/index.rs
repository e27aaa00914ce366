use std::collections::HashMap;

use crate::database_ops::models::SourceRecord;
use crate::normalization::NameVariations;

/// A provider record together with its precomputed name variations.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub record: SourceRecord,
    pub variations: NameVariations,
}

impl Candidate {
    pub fn new(record: SourceRecord) -> Self {
        let variations = NameVariations::new(&record.display_name);
        Self { record, variations }
    }
}

/// Lookup structures over one provider's full record set.
///
/// Built once per bulk run and owned by the caller. Buckets hold positions into
/// `candidates`, so every record is stored once.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    candidates: Vec<Candidate>,
    exact: HashMap<String, usize>,
    by_last_name: HashMap<String, Vec<usize>>,
    by_initial_last: HashMap<String, Vec<usize>>,
}

impl CandidateIndex {
    pub fn build(records: Vec<SourceRecord>) -> Self {
        let mut index = Self {
            candidates: Vec::with_capacity(records.len()),
            exact: HashMap::with_capacity(records.len()),
            by_last_name: HashMap::new(),
            by_initial_last: HashMap::new(),
        };

        for record in records {
            let candidate = Candidate::new(record);
            let pos = index.candidates.len();
            let v = &candidate.variations;
            if !v.is_empty() {
                // Last write wins on a full-name collision; the shadowed record is
                // still reachable through its buckets.
                index.exact.insert(v.normalized.clone(), pos);
                index
                    .by_last_name
                    .entry(v.last_name().to_string())
                    .or_default()
                    .push(pos);
                if let Some(key) = v.initial_last_key() {
                    index
                        .by_initial_last
                        .entry(key.to_string())
                        .or_default()
                        .push(pos);
                }
            }
            index.candidates.push(candidate);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// All candidates in load order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn exact(&self, normalized: &str) -> Option<&Candidate> {
        self.exact.get(normalized).map(|&pos| &self.candidates[pos])
    }

    pub fn last_name_bucket(&self, last_name: &str) -> Vec<&Candidate> {
        self.bucket(&self.by_last_name, last_name)
    }

    pub fn initial_last_bucket(&self, key: &str) -> Vec<&Candidate> {
        self.bucket(&self.by_initial_last, key)
    }

    fn bucket<'a>(&'a self, map: &HashMap<String, Vec<usize>>, key: &str) -> Vec<&'a Candidate> {
        map.get(key)
            .map(|positions| positions.iter().map(|&p| &self.candidates[p]).collect())
            .unwrap_or_default()
    }
}
