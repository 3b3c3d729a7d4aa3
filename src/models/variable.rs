//! Variable model: the structured candidates extracted from papers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Statistical type of a discovered variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Continuous,
    Categorical,
    Binary,
    Ordinal,
}

impl VariableType {
    /// Parse a model-proposed type, falling back to `Continuous` on anything
    /// outside the enumerated set.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "categorical" => VariableType::Categorical,
            "binary" => VariableType::Binary,
            "ordinal" => VariableType::Ordinal,
            _ => VariableType::Continuous,
        }
    }
}

/// Role a variable plays relative to the hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableRole {
    Predictor,
    Outcome,
    Confounder,
}

impl VariableRole {
    /// Parse a model-proposed role, falling back to `Predictor`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "outcome" => VariableRole::Outcome,
            "confounder" => VariableRole::Confounder,
            _ => VariableRole::Predictor,
        }
    }
}

/// Reported direction of association with the hypothesis outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Positive,
    Negative,
    Null,
    Unknown,
}

impl Relationship {
    /// Parse a model-proposed direction, falling back to `Unknown`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "positive" => Relationship::Positive,
            "negative" => Relationship::Negative,
            "null" => Relationship::Null,
            _ => Relationship::Unknown,
        }
    }
}

/// Typical value range reported or estimated for a variable
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
}

impl ValueRange {
    /// Whether any statistic is populated
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.mean.is_none() && self.sd.is_none()
    }

    pub fn has_mean(&self) -> bool {
        self.mean.is_some()
    }
}

/// Parse a numeric field from model output, treating "unknown"/"n/a"-style
/// placeholders and anything non-numeric as absent rather than an error.
pub fn parse_stat(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match value.to_lowercase().as_str() {
        "unknown" | "n/a" | "na" | "none" => None,
        _ => value.parse::<f64>().ok(),
    }
}

/// A variable candidate discovered in the literature
///
/// Accumulated append-only during paper analysis, then merged in place during
/// standardization. Every variable carries at least one citation back to the
/// paper that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name (canonical after standardization)
    pub name: String,

    /// Statistical type
    pub var_type: VariableType,

    /// Free-form distribution family (normal, lognormal, unknown, ...)
    pub distribution: String,

    /// Role relative to the hypothesis
    pub role: VariableRole,

    /// Reported direction of association
    pub relationship: Relationship,

    /// Measurement units, if reported
    pub units: Option<String>,

    /// Typical range, if reported or estimated
    pub range: Option<ValueRange>,

    /// Model reasoning for extracting this variable
    pub reasoning: String,

    /// Paper identifiers supporting this variable (e.g. "PMID:12345")
    pub citations: BTreeSet<String>,
}

impl Variable {
    /// Create a variable cited by a single paper.
    pub fn cited_by(name: impl Into<String>, citation: impl Into<String>) -> Self {
        let mut citations = BTreeSet::new();
        citations.insert(citation.into());
        Self {
            name: name.into(),
            var_type: VariableType::Continuous,
            distribution: "unknown".to_string(),
            role: VariableRole::Predictor,
            relationship: Relationship::Unknown,
            units: None,
            range: None,
            reasoning: String::new(),
            citations,
        }
    }

    /// Whether the distribution field carries real information
    pub fn has_known_distribution(&self) -> bool {
        !self.distribution.is_empty() && self.distribution != "unknown"
    }

    /// Merge another copy of the same concept into this one: union the
    /// citation sets and fill missing range/distribution/units from the other
    /// copy. Populated fields are never overwritten by blanks.
    pub fn absorb(&mut self, other: &Variable) {
        self.citations.extend(other.citations.iter().cloned());

        let self_has_range = self.range.map(|r| r.has_mean()).unwrap_or(false);
        let other_has_range = other.range.map(|r| r.has_mean()).unwrap_or(false);
        if !self_has_range && other_has_range {
            self.range = other.range;
        }

        if !self.has_known_distribution() && other.has_known_distribution() {
            self.distribution = other.distribution.clone();
        }

        if self.units.is_none() {
            self.units = other.units.clone();
        }
    }
}
