//! # Literature Discovery
//!
//! An iterative pipeline that mines PubMed for the variables needed to test
//! a medical hypothesis: an LLM turns the hypothesis into a search strategy,
//! papers are retrieved and analyzed, entity recognition and name
//! standardization collapse duplicates, and study statistics are filtered
//! out before the surviving variables are emitted for dataset generation.
//!
//! ## Architecture
//!
//! - [`models`]: Core data structures (Paper, Variable, SearchStrategy, etc.)
//! - [`client`]: Rate-limited NCBI E-utilities client with retry/backoff
//! - [`ner`]: Lexicon-backed chemical/disease entity recognition
//! - [`llm`]: Completion client and the reasoning adapter's four operations
//! - [`engine`]: The discovery loop and its dual output builder
//! - [`config`]: Configuration management

pub mod client;
pub mod config;
pub mod engine;
pub mod llm;
pub mod models;
pub mod ner;

// Re-export commonly used types
pub use engine::{DiscoveryEngine, DiscoveryOutcome, DiscoveryParams};
pub use models::{Paper, Variable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
