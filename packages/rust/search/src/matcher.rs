//! Canonical keys to verified catalog records.

use std::collections::{BTreeSet, HashSet};

use collections_shared::{Environment, RecordId};
use tracing::{debug, instrument, warn};

use crate::{RecordSearch, SearchHit, SearchQuery};

/// A verified match: the key, the record, and the funding identifier that contained the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMatch {
    pub query: String,
    pub record_id: RecordId,
    pub funding_identifier: String,
}

/// What happened to one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// At least one hit carried an identifier containing the key.
    /// `records` counts distinct record ids.
    Matched { key: String, records: usize },
    /// Lookups answered, but no identifier contained the key.
    NoVerifiedHits { key: String, hits: usize },
    /// Every lookup for the key failed.
    LookupFailed { key: String, error: String },
}

impl KeyOutcome {
    pub fn key(&self) -> &str {
        match self {
            Self::Matched { key, .. }
            | Self::NoVerifiedHits { key, .. }
            | Self::LookupFailed { key, .. } => key,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Result of matching a set of keys in one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// One entry per key, in key order.
    pub outcomes: Vec<KeyOutcome>,
    /// Verified matches, one per record id, first-seen pairing kept.
    pub matches: Vec<RecordMatch>,
}

impl MatchReport {
    pub fn record_ids(&self) -> BTreeSet<RecordId> {
        self.matches.iter().map(|m| m.record_id.clone()).collect()
    }

    pub fn unmatched_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_matched())
            .map(KeyOutcome::key)
            .collect()
    }
}

/// Looks up canonical keys and keeps only hits whose funding identifiers contain the key.
pub struct RecordMatcher<'a> {
    search: &'a dyn RecordSearch,
}

impl<'a> RecordMatcher<'a> {
    pub fn new(search: &'a dyn RecordSearch) -> Self {
        Self { search }
    }

    /// Match every key. Keys are visited in sorted order so the first-seen
    /// pairing for a record is deterministic. Lookup failures never abort.
    #[instrument(skip_all, fields(environment = %env, keys = keys.len()))]
    pub async fn match_keys(&self, keys: &BTreeSet<String>, env: Environment) -> MatchReport {
        let mut report = MatchReport::default();
        let mut seen: HashSet<RecordId> = HashSet::new();

        for key in keys {
            let wildcard = SearchQuery::Wildcard(key.clone());
            let exact = SearchQuery::Exact(key.clone());

            let (wildcard_result, exact_result) = tokio::join!(
                self.search.search(env, &wildcard),
                self.search.search(env, &exact),
            );

            let mut hits: Vec<SearchHit> = Vec::new();
            let mut last_error = None;
            let mut answered = 0;
            for (query, result) in [(&wildcard, wildcard_result), (&exact, exact_result)] {
                match result {
                    Ok(found) => {
                        answered += 1;
                        hits.extend(found);
                    }
                    Err(e) => {
                        warn!(%key, %query, error = %e, "lookup failed");
                        last_error = Some(e.to_string());
                    }
                }
            }

            let verified = verify_hits(key, &hits);
            let distinct = verified
                .iter()
                .map(|m| m.record_id.as_str())
                .collect::<HashSet<_>>()
                .len();
            debug!(%key, hits = hits.len(), records = distinct, "key searched");

            let outcome = if distinct > 0 {
                KeyOutcome::Matched {
                    key: key.clone(),
                    records: distinct,
                }
            } else if answered == 0 {
                KeyOutcome::LookupFailed {
                    key: key.clone(),
                    error: last_error.unwrap_or_default(),
                }
            } else {
                KeyOutcome::NoVerifiedHits {
                    key: key.clone(),
                    hits: hits.len(),
                }
            };
            report.outcomes.push(outcome);

            for m in verified {
                if seen.insert(m.record_id.clone()) {
                    report.matches.push(m);
                }
            }
        }

        let unmatched = report.unmatched_keys();
        if !unmatched.is_empty() {
            warn!(keys = ?unmatched, "no records found for keys");
        }

        report
    }
}

/// Every (hit, identifier) pair where the identifier contains `key`, in hit order.
fn verify_hits(key: &str, hits: &[SearchHit]) -> Vec<RecordMatch> {
    hits.iter()
        .flat_map(|hit| {
            hit.funding_identifiers
                .iter()
                .filter(|identifier| identifier.contains(key))
                .map(|identifier| RecordMatch {
                    query: key.to_string(),
                    record_id: hit.record_id.clone(),
                    funding_identifier: identifier.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use collections_shared::{CollectionsError, Result};
    use std::collections::HashMap;

    /// Canned hits keyed by query string; queries listed in `failing` error out.
    #[derive(Default)]
    struct FakeSearch {
        hits: HashMap<String, Vec<SearchHit>>,
        failing: HashSet<String>,
    }

    impl FakeSearch {
        fn with(mut self, query: SearchQuery, hits: Vec<SearchHit>) -> Self {
            self.hits.insert(query.to_query_string(), hits);
            self
        }

        fn failing(mut self, query: SearchQuery) -> Self {
            self.failing.insert(query.to_query_string());
            self
        }
    }

    #[async_trait]
    impl RecordSearch for FakeSearch {
        async fn search(&self, _env: Environment, query: &SearchQuery) -> Result<Vec<SearchHit>> {
            let q = query.to_query_string();
            if self.failing.contains(&q) {
                return Err(CollectionsError::Network(format!("{q}: HTTP 502")));
            }
            Ok(self.hits.get(&q).cloned().unwrap_or_default())
        }
    }

    fn hit(id: &str, identifiers: &[&str]) -> SearchHit {
        SearchHit {
            record_id: id.into(),
            funding_identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn keeps_only_verified_hits() {
        let search = FakeSearch::default().with(
            SearchQuery::Wildcard("AI073685".into()),
            vec![
                hit("immport_SDY1", &["1-R01-AI073685-01"]),
                hit("zenodo_9", &["AI0736"]),
            ],
        );

        let report = RecordMatcher::new(&search)
            .match_keys(&keys(&["AI073685"]), Environment::Staging)
            .await;

        assert_eq!(report.record_ids(), keys(&["immport_SDY1"]));
        assert_eq!(
            report.outcomes,
            vec![KeyOutcome::Matched {
                key: "AI073685".into(),
                records: 1
            }]
        );
    }

    #[tokio::test]
    async fn first_seen_pairing_wins_across_queries_and_keys() {
        let search = FakeSearch::default()
            .with(
                SearchQuery::Wildcard("AI057229".into()),
                vec![hit("rec_1", &["U19AI057229"])],
            )
            .with(
                SearchQuery::Exact("AI057229".into()),
                vec![hit("rec_1", &["AI057229"])],
            )
            .with(
                SearchQuery::Wildcard("AI073685".into()),
                vec![hit("rec_1", &["AI073685", "AI057229"]), hit("rec_2", &["AI073685"])],
            );

        let report = RecordMatcher::new(&search)
            .match_keys(&keys(&["AI073685", "AI057229"]), Environment::Production)
            .await;

        assert_eq!(report.matches.len(), 2);
        assert_eq!(report.matches[0].record_id, "rec_1");
        assert_eq!(report.matches[0].query, "AI057229");
        assert_eq!(report.matches[0].funding_identifier, "U19AI057229");
        assert_eq!(report.matches[1].record_id, "rec_2");
    }

    #[tokio::test]
    async fn record_found_by_both_queries_counts_once() {
        let search = FakeSearch::default()
            .with(
                SearchQuery::Wildcard("AI073685".into()),
                vec![hit("zenodo_1", &["R01AI073685", "1-R01-AI073685-01"])],
            )
            .with(
                SearchQuery::Exact("AI073685".into()),
                vec![hit("zenodo_1", &["AI073685"])],
            );

        let report = RecordMatcher::new(&search)
            .match_keys(&keys(&["AI073685"]), Environment::Staging)
            .await;

        assert_eq!(
            report.outcomes,
            vec![KeyOutcome::Matched {
                key: "AI073685".into(),
                records: 1
            }]
        );
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].funding_identifier, "R01AI073685");
    }

    #[tokio::test]
    async fn failed_lookup_is_isolated() {
        let search = FakeSearch::default()
            .failing(SearchQuery::Wildcard("AI1".into()))
            .failing(SearchQuery::Exact("AI1".into()))
            .failing(SearchQuery::Wildcard("AI2".into()))
            .with(SearchQuery::Exact("AI2".into()), vec![hit("rec_2", &["AI2"])])
            .with(SearchQuery::Wildcard("AI3".into()), vec![hit("rec_3", &["other"])]);

        let report = RecordMatcher::new(&search)
            .match_keys(&keys(&["AI1", "AI2", "AI3"]), Environment::Staging)
            .await;

        assert!(matches!(report.outcomes[0], KeyOutcome::LookupFailed { .. }));
        assert!(report.outcomes[1].is_matched());
        assert_eq!(
            report.outcomes[2],
            KeyOutcome::NoVerifiedHits {
                key: "AI3".into(),
                hits: 1
            }
        );
        assert_eq!(report.unmatched_keys(), vec!["AI1", "AI3"]);
        assert_eq!(report.record_ids(), keys(&["rec_2"]));
    }

    #[tokio::test]
    async fn no_keys_no_lookups() {
        let search = FakeSearch::default();
        let report = RecordMatcher::new(&search)
            .match_keys(&BTreeSet::new(), Environment::Staging)
            .await;
        assert_eq!(report, MatchReport::default());
    }
}
