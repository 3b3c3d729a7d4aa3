//! Core data structures for the discovery pipeline.

mod paper;
mod strategy;
mod variable;

pub use paper::{Paper, PaperAnalysis, PaperBuilder, Relevance};
pub use strategy::{Confidence, CorrelationPair, SearchStrategy, Synthesis};
pub use variable::{
    parse_stat, Relationship, ValueRange, Variable, VariableRole, VariableType,
};
