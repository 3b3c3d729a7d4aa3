//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reasoning model settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// NCBI E-utilities settings
    #[serde(default)]
    pub ncbi: NcbiConfig,

    /// Discovery loop settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            ncbi: NcbiConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Reasoning model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key for the Anthropic Messages API
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model id used for every reasoning operation
    #[serde(default = "default_model")]
    pub model: String,

    /// Paper text slice length for analysis prompts, in characters
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            model: default_model(),
            context_budget: default_context_budget(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_context_budget() -> usize {
    crate::llm::DEFAULT_CONTEXT_BUDGET
}

/// NCBI E-utilities configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NcbiConfig {
    /// API key raising the rate ceiling to 10 requests per second
    #[serde(default)]
    pub api_key: Option<String>,

    /// Minimum spacing between requests, in milliseconds
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Retry attempts for retriable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponential backoff base, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for NcbiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("NCBI_API_KEY").ok(),
            min_interval_ms: default_min_interval_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl NcbiConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

fn default_min_interval_ms() -> u64 {
    crate::client::DEFAULT_MIN_INTERVAL.as_millis() as u64
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

/// Discovery loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Stop once this many variables survive filtering
    #[serde(default = "default_min_variables")]
    pub min_variables: usize,

    /// Total paper budget across all iterations
    #[serde(default = "default_max_papers")]
    pub max_papers: usize,

    /// Iteration budget
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Minimum similarity for a lexicon entity match
    #[serde(default = "default_ner_confidence")]
    pub ner_confidence: f64,

    /// Override for the built-in chemical lexicon
    #[serde(default)]
    pub chemical_lexicon: Option<PathBuf>,

    /// Override for the built-in disease lexicon
    #[serde(default)]
    pub disease_lexicon: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_variables: default_min_variables(),
            max_papers: default_max_papers(),
            max_iterations: default_max_iterations(),
            ner_confidence: default_ner_confidence(),
            chemical_lexicon: None,
            disease_lexicon: None,
        }
    }
}

fn default_min_variables() -> usize {
    10
}

fn default_max_papers() -> usize {
    50
}

fn default_max_iterations() -> usize {
    3
}

fn default_ner_confidence() -> f64 {
    crate::ner::DEFAULT_CONFIDENCE
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &PathBuf) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .add_source(config::Environment::with_prefix("LIT_DISCOVERY").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Get the default configuration (from env vars or defaults)
pub fn get_config() -> Config {
    Config::default()
}
