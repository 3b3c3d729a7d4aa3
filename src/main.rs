use anyhow::{Context, Result};
use clap::Parser;
use lit_discovery::client::{EutilsClient, EutilsConfig, PubMedSource, RateLimiter};
use lit_discovery::config::{get_config, load_config, Config};
use lit_discovery::engine::{DiscoveryEngine, DiscoveryParams};
use lit_discovery::llm::{AnthropicClient, ReasoningAdapter};
use lit_discovery::ner::LexiconRecognizer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Literature Discovery - mine PubMed for the variables needed to test a hypothesis
#[derive(Parser, Debug)]
#[command(name = "lit-discovery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discover dataset variables from published literature", long_about = None)]
struct Cli {
    /// The medical hypothesis to discover variables for
    #[arg(long)]
    hypothesis: String,

    /// Stop once this many variables survive filtering
    #[arg(long)]
    min_variables: Option<usize>,

    /// Total paper budget across all iterations
    #[arg(long)]
    max_papers: Option<usize>,

    /// Iteration budget
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (can be used multiple times: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lit_discovery={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => get_config(),
    };

    let engine = build_engine(&cli, &config)?;
    let outcome = engine.run(&cli.hypothesis).await?;

    tracing::info!(
        termination = ?outcome.termination,
        variables = outcome.display.variables_found,
        confounders = outcome.display.confounders_found,
        papers = outcome.display.total_papers_analyzed,
        "discovery complete"
    );

    println!("{}", serde_json::to_string_pretty(&outcome.generator)?);
    println!("{}", serde_json::to_string_pretty(&outcome.display)?);

    Ok(())
}

fn build_engine(cli: &Cli, config: &Config) -> Result<DiscoveryEngine> {
    let api_key = config
        .llm
        .api_key
        .clone()
        .context("no Anthropic API key configured (set ANTHROPIC_API_KEY)")?;

    let llm = Arc::new(AnthropicClient::new(api_key));
    let adapter = ReasoningAdapter::new(llm, config.llm.model.clone())
        .with_context_budget(config.llm.context_budget);

    let eutils = EutilsClient::with_limiter(
        EutilsConfig {
            api_key: config.ncbi.api_key.clone(),
            min_interval: config.ncbi.min_interval(),
            max_retries: config.ncbi.max_retries,
            backoff_base: config.ncbi.backoff_base(),
            ..EutilsConfig::default()
        },
        RateLimiter::new(config.ncbi.min_interval()),
    );
    let source = Arc::new(PubMedSource::new(eutils));

    let recognizer = match (&config.discovery.chemical_lexicon, &config.discovery.disease_lexicon) {
        (None, None) => LexiconRecognizer::new(config.discovery.ner_confidence),
        (chemicals, diseases) => LexiconRecognizer::with_lexicon_files(
            chemicals.clone(),
            diseases.clone(),
            config.discovery.ner_confidence,
        ),
    };

    let params = DiscoveryParams {
        min_variables: cli
            .min_variables
            .unwrap_or(config.discovery.min_variables),
        max_papers: cli.max_papers.unwrap_or(config.discovery.max_papers),
        max_iterations: cli
            .max_iterations
            .unwrap_or(config.discovery.max_iterations),
    };

    Ok(DiscoveryEngine::new(
        source,
        adapter,
        Arc::new(recognizer),
        params,
    ))
}
