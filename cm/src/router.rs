//! Keyword router
//!
//! Maps a free-text query to the collaborators a handler should consult.
//! Two matching strategies exist and are kept separate: token-set matching
//! looks up each whitespace-split token, substring matching tests whether a
//! trigger occurs anywhere in the query. They are not equivalent: token
//! matching misses `resumes` for the trigger `resume`, substring matching
//! fires `cv` inside `cvs` or `cvent`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{CollaboratorId, CollaboratorRegistry};

/// How triggers are matched against the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// Exact match of whitespace-split lowercase tokens
    TokenSet,
    /// Trigger occurs anywhere in the lowercase query
    Substring,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStrategy::TokenSet => write!(f, "token-set"),
            MatchStrategy::Substring => write!(f, "substring"),
        }
    }
}

/// Static mapping from lowercase trigger to collaborator display name
#[derive(Debug, Clone)]
pub struct KeywordTable {
    strategy: MatchStrategy,
    entries: Vec<(String, String)>,
}

impl KeywordTable {
    /// Build a table from `(trigger, display name)` pairs
    ///
    /// Triggers are lower-cased; several triggers may name the same collaborator.
    pub fn new<T, N>(strategy: MatchStrategy, pairs: impl IntoIterator<Item = (T, N)>) -> Self
    where
        T: Into<String>,
        N: Into<String>,
    {
        let entries: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(trigger, name)| (trigger.into().to_lowercase(), name.into()))
            .collect();
        debug!(%strategy, entry_count = entries.len(), "KeywordTable::new: called");
        Self { strategy, entries }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, n)| (t.as_str(), n.as_str()))
    }

    /// Display names whose triggers match the query
    pub fn matched_names(&self, query: &str) -> BTreeSet<&str> {
        let lowered = query.to_lowercase();
        let mut names = BTreeSet::new();

        match self.strategy {
            MatchStrategy::TokenSet => {
                for token in lowered.split_whitespace() {
                    for (trigger, name) in &self.entries {
                        if trigger == token {
                            names.insert(name.as_str());
                        }
                    }
                }
            }
            MatchStrategy::Substring => {
                for (trigger, name) in &self.entries {
                    if lowered.contains(trigger.as_str()) {
                        names.insert(name.as_str());
                    }
                }
            }
        }

        debug!(strategy = %self.strategy, ?names, "KeywordTable::matched_names: done");
        names
    }
}

/// Select the collaborators to consult for a query
///
/// Pure function of its inputs; an empty set means no consultation is needed.
pub fn route(query: &str, table: &KeywordTable, registry: &CollaboratorRegistry) -> BTreeSet<CollaboratorId> {
    debug!(%query, "route: called");
    let targets: BTreeSet<CollaboratorId> = table
        .matched_names(query)
        .into_iter()
        .flat_map(|name| registry.ids_named(name).cloned().collect::<Vec<_>>())
        .collect();
    debug!(target_count = targets.len(), "route: done");
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use proptest::prelude::*;

    fn registry() -> CollaboratorRegistry {
        CollaboratorRegistry::from_pairs([
            ("agent1resume", "Resume Expert"),
            ("agent1demand", "Demand Analysis"),
            ("agent1training", "Training Resource"),
        ])
    }

    fn token_table() -> KeywordTable {
        KeywordTable::new(
            MatchStrategy::TokenSet,
            [
                ("resume", "Resume Expert"),
                ("cv", "Resume Expert"),
                ("market", "Demand Analysis"),
                ("course", "Training Resource"),
                ("job", "Job Matching"),
            ],
        )
    }

    fn substring_table() -> KeywordTable {
        KeywordTable::new(
            MatchStrategy::Substring,
            [
                ("resume", "Resume Expert"),
                ("cv", "Resume Expert"),
                ("market", "Demand Analysis"),
            ],
        )
    }

    #[test]
    fn test_token_match() {
        let targets = route("Please review my CV and the job market", &token_table(), &registry());
        assert_eq!(
            targets,
            BTreeSet::from([Address::new("agent1resume"), Address::new("agent1demand")])
        );
    }

    #[test]
    fn test_token_match_misses_compound_words() {
        let targets = route("resumes for marketing", &token_table(), &registry());
        assert!(targets.is_empty());
    }

    #[test]
    fn test_substring_match_hits_fragments() {
        let targets = route("resumes for marketing", &substring_table(), &registry());
        assert_eq!(
            targets,
            BTreeSet::from([Address::new("agent1resume"), Address::new("agent1demand")])
        );
    }

    #[test]
    fn test_substring_false_positive() {
        // "cv" inside "cvent" still triggers the resume collaborator
        let targets = route("working at cvent", &substring_table(), &registry());
        assert_eq!(targets, BTreeSet::from([Address::new("agent1resume")]));
    }

    #[test]
    fn test_unregistered_name_is_ignored() {
        // "job" maps to Job Matching, which this registry does not know
        let targets = route("job", &token_table(), &registry());
        assert!(targets.is_empty());
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(route("hello world", &token_table(), &registry()).is_empty());
        assert!(route("hello world", &substring_table(), &registry()).is_empty());
        assert!(route("", &token_table(), &registry()).is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let targets = route("RESUME", &token_table(), &registry());
        assert_eq!(targets, BTreeSet::from([Address::new("agent1resume")]));
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let targets = route("resume cv resume", &token_table(), &registry());
        assert_eq!(targets.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_route_is_pure(query in "[a-zA-Z ]{0,64}") {
            let table = token_table();
            let reg = registry();
            prop_assert_eq!(route(&query, &table, &reg), route(&query, &table, &reg));

            let sub = substring_table();
            prop_assert_eq!(route(&query, &sub, &reg), route(&query, &sub, &reg));
        }

        #[test]
        fn prop_token_targets_subset_of_substring(query in "(resume|cv|market|course|hello|world| )*") {
            // Every token hit is also a substring hit for the same triggers
            let token = KeywordTable::new(MatchStrategy::TokenSet, [("resume", "Resume Expert"), ("market", "Demand Analysis")]);
            let sub = KeywordTable::new(MatchStrategy::Substring, [("resume", "Resume Expert"), ("market", "Demand Analysis")]);
            let reg = registry();
            let token_hits = route(&query, &token, &reg);
            let sub_hits = route(&query, &sub, &reg);
            prop_assert!(token_hits.is_subset(&sub_hits));
        }
    }
}
