//! Search strategy and synthesis models produced by the reasoning adapter.

use serde::{Deserialize, Serialize};

/// The query and supporting metadata used to retrieve papers for one iteration
///
/// Produced fresh at the start of a run and replaced (not mutated) whenever
/// the search is expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStrategy {
    /// PubMed query with AND/OR operators
    pub query: String,

    /// Key medical concepts driving the query
    pub key_concepts: Vec<String>,

    /// Variable types the strategy expects to surface
    pub expected_variable_types: Vec<String>,

    /// Free-text justification for the query terms chosen
    pub reasoning: String,
}

/// Overall confidence of the final synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Parse a model-proposed confidence, falling back to `Medium`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "low" => Confidence::Low,
            _ => Confidence::Medium,
        }
    }
}

/// Final narrative synthesis across all analyzed papers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synthesis {
    /// Step-by-step synthesis of findings across papers
    pub reasoning_chain: String,

    /// Key relationships discovered
    pub key_relationships: Vec<String>,

    /// Novel insights that emerged across papers
    pub novel_insights: Vec<String>,

    /// Overall confidence
    pub confidence: Confidence,
}

/// A correlation pair known between two discovered variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub var1: String,
    pub var2: String,
    pub correlation: f64,
}
