//! Canonical variable naming and cross-paper merging.
//!
//! Extraction yields near-duplicate names ("CRP", "C-reactive protein",
//! "c-reactive protein levels"). Candidate names are matched against the
//! recognized entity vocabulary in precedence order: exact case-insensitive
//! equality, then token overlap, then long-substring containment. Ties break
//! on highest overlap ratio, then shortest entity. A name with no vocabulary
//! match is its own canonical form; such names deduplicate literally (exact
//! case-insensitive) and never become fuzzy-match targets themselves.

use std::collections::{BTreeMap, HashSet};

use crate::models::Variable;

const MIN_CANDIDATE_LEN: usize = 3;
const MIN_VOCAB_MATCH_LEN: usize = 3;
const TOKEN_OVERLAP_THRESHOLD: f64 = 0.5;
const MIN_SUBSTRING_LEN: usize = 5;
const ENTITY_IN_NAME_SCORE: f64 = 0.8;
const NAME_IN_ENTITY_SCORE: f64 = 0.7;

/// Canonical-name resolver over the recognized entity vocabulary.
///
/// Only seeded vocabulary terms are fuzzy-match candidates. Variable names
/// that resolve to no entity are registered for literal deduplication only,
/// keyed lowercased with the first-seen casing preserved.
#[derive(Debug, Default)]
pub struct CanonicalNameIndex {
    vocabulary: Vec<String>,
    literal: BTreeMap<String, String>,
}

impl CanonicalNameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recognized entity term as a match candidate.
    pub fn seed(&mut self, term: impl Into<String>) {
        self.vocabulary.push(term.into());
    }

    /// Resolve `candidate` to its canonical name: the best vocabulary match
    /// when one exists, otherwise the first-seen casing of the literal name.
    pub fn resolve(&mut self, candidate: &str) -> String {
        if let Some(canonical) = self.find_canonical(candidate) {
            return canonical;
        }
        self.literal
            .entry(candidate.to_lowercase())
            .or_insert_with(|| candidate.to_string())
            .clone()
    }

    /// Find the best vocabulary match for `candidate`, or `None`.
    pub fn find_canonical(&self, candidate: &str) -> Option<String> {
        if candidate.chars().count() < MIN_CANDIDATE_LEN {
            return None;
        }
        let lower = candidate.to_lowercase();

        for term in &self.vocabulary {
            if term.to_lowercase() == lower {
                return Some(term.clone());
            }
        }

        let candidate_tokens: HashSet<&str> = lower.split_whitespace().collect();
        let mut best: Option<(f64, &String)> = None;

        for term in &self.vocabulary {
            let score = match_score(&lower, &candidate_tokens, term);
            if score <= 0.0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_term)) => {
                    score > best_score || (score == best_score && term.len() < best_term.len())
                }
            };
            if better {
                best = Some((score, term));
            }
        }

        best.map(|(_, term)| term.clone())
    }
}

fn match_score(candidate: &str, candidate_tokens: &HashSet<&str>, entity: &str) -> f64 {
    // Very short entities would substring-match everywhere.
    if entity.chars().count() < MIN_VOCAB_MATCH_LEN {
        return 0.0;
    }
    let entity_lower = entity.to_lowercase();

    let entity_tokens: HashSet<&str> = entity_lower.split_whitespace().collect();
    let shared = candidate_tokens.intersection(&entity_tokens).count();
    let larger = candidate_tokens.len().max(entity_tokens.len());
    if shared > 0 && larger > 0 {
        let ratio = shared as f64 / larger as f64;
        if ratio > TOKEN_OVERLAP_THRESHOLD {
            return ratio;
        }
        return 0.0;
    }

    if entity.chars().count() >= MIN_SUBSTRING_LEN && candidate.chars().count() >= MIN_SUBSTRING_LEN
    {
        if candidate.contains(&entity_lower) {
            return ENTITY_IN_NAME_SCORE;
        }
        if entity_lower.contains(candidate) {
            return NAME_IN_ENTITY_SCORE;
        }
    }

    0.0
}

/// Merge newly extracted variables into the canonical pool.
///
/// Variables resolving to the same canonical name are merged: citation sets
/// union, and missing range/distribution/units fill from later duplicates
/// without ever overwriting populated fields. Idempotent over repeated input.
pub fn standardize_variables(
    index: &mut CanonicalNameIndex,
    pool: &mut BTreeMap<String, Variable>,
    extracted: Vec<Variable>,
) {
    for mut variable in extracted {
        let canonical = index.resolve(&variable.name);
        match pool.get_mut(&canonical) {
            Some(existing) => {
                existing.absorb(&variable);
                tracing::debug!(name = %variable.name, canonical = %canonical, "merged duplicate variable");
            }
            None => {
                variable.name = canonical.clone();
                pool.insert(canonical, variable);
            }
        }
    }
}
