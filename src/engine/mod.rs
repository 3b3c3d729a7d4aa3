//! Iterative variable discovery engine.
//!
//! Drives the loop: construct a search strategy, retrieve and analyze
//! papers, recognize entities, standardize and filter the variable pool,
//! then either terminate or expand the search. Every phase takes the
//! current [`DiscoveryState`] and returns the next one; nothing accumulates
//! outside the state.

mod filter;
mod output;
mod standardize;

pub use filter::{filter_statistics, is_study_statistic};
pub use output::{GeneratorPayload, GeneratorVariable, LiteratureDisplay, PaperSummary};
pub use standardize::{standardize_variables, CanonicalNameIndex};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::client::{ApiError, PaperSource};
use crate::llm::{LlmError, ReasoningAdapter};
use crate::models::{Paper, SearchStrategy, Variable, VariableRole};
use crate::ner::{EntityRecognizer, RecognizedEntities};

/// Errors that abort a discovery run.
///
/// Per-paper analysis failures are contained inside the run and never
/// surface here; strategy construction, expansion, search, and synthesis
/// failures do.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("reasoning failed: {0}")]
    Reasoning(#[from] LlmError),

    #[error("paper retrieval failed: {0}")]
    Retrieval(#[from] ApiError),
}

/// Tunable limits for one run.
#[derive(Debug, Clone)]
pub struct DiscoveryParams {
    /// Stop once this many variables survive filtering.
    pub min_variables: usize,
    /// Total paper budget across all iterations.
    pub max_papers: usize,
    /// Iteration budget; exhaustion is success with partial results.
    pub max_iterations: usize,
}

impl Default for DiscoveryParams {
    fn default() -> Self {
        Self {
            min_variables: 10,
            max_papers: 50,
            max_iterations: 3,
        }
    }
}

impl DiscoveryParams {
    /// Paper ids requested per search, dividing the budget evenly across
    /// iterations.
    pub fn batch_size(&self) -> usize {
        (self.max_papers / self.max_iterations.max(1)).max(1)
    }
}

/// Pipeline phase, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Strategizing,
    Searching,
    Analyzing,
    ExtractingEntities,
    Standardizing,
    Filtering,
    Expanding,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Strategizing => "strategizing",
            Phase::Searching => "searching",
            Phase::Analyzing => "analyzing",
            Phase::ExtractingEntities => "extracting_entities",
            Phase::Standardizing => "standardizing",
            Phase::Filtering => "filtering",
            Phase::Expanding => "expanding",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The variable target was met.
    SufficientVariables,
    /// The iteration budget ran out; partial results are still returned.
    IterationBudget,
}

/// Full state of a run, threaded through the phases.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryState {
    pub hypothesis: String,
    pub iteration: usize,
    pub strategy: Option<SearchStrategy>,
    /// Papers successfully analyzed, cumulative across iterations.
    pub papers: Vec<Paper>,
    /// Every pmid an analysis was attempted for, successful or not.
    pub attempted_pmids: BTreeSet<String>,
    /// Ids of papers retrieved but not yet analyzed.
    pub pending_pmids: Vec<String>,
    /// Raw extracted variables, cumulative, pre-standardization.
    pub extracted: Vec<Variable>,
    /// Entities recognized over the cumulative paper set.
    pub entities: RecognizedEntities,
    /// Canonical predictor/outcome pool after standardization and filtering.
    pub variables: BTreeMap<String, Variable>,
    /// Canonical confounder pool, kept disjoint from `variables`.
    pub confounders: BTreeMap<String, Variable>,
    /// Names removed as study statistics, most recent pass.
    pub filtered: Vec<String>,
}

impl DiscoveryState {
    fn new(hypothesis: &str) -> Self {
        Self {
            hypothesis: hypothesis.to_string(),
            ..Self::default()
        }
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct DiscoveryOutcome {
    pub generator: GeneratorPayload,
    pub display: LiteratureDisplay,
    /// Canonical predictor/outcome pool with full provenance.
    pub variables: BTreeMap<String, Variable>,
    /// Canonical confounder pool with full provenance.
    pub confounders: BTreeMap<String, Variable>,
    pub termination: TerminationReason,
}

/// The discovery pipeline, generic over its three external seams.
#[derive(Debug)]
pub struct DiscoveryEngine {
    source: Arc<dyn PaperSource>,
    adapter: ReasoningAdapter,
    recognizer: Arc<dyn EntityRecognizer>,
    params: DiscoveryParams,
}

impl DiscoveryEngine {
    pub fn new(
        source: Arc<dyn PaperSource>,
        adapter: ReasoningAdapter,
        recognizer: Arc<dyn EntityRecognizer>,
        params: DiscoveryParams,
    ) -> Self {
        Self {
            source,
            adapter,
            recognizer,
            params,
        }
    }

    /// Run the full discovery loop for a hypothesis.
    pub async fn run(&self, hypothesis: &str) -> Result<DiscoveryOutcome, DiscoveryError> {
        let mut state = DiscoveryState::new(hypothesis);
        state = self.strategize(state).await?;

        let termination = loop {
            state.iteration += 1;
            tracing::info!(iteration = state.iteration, "starting discovery iteration");

            state = self.search(state).await?;
            state = self.analyze(state).await;
            state = self.extract_entities(state);
            state = self.standardize(state);
            state = self.filter(state);

            tracing::info!(
                iteration = state.iteration,
                papers = state.papers.len(),
                variables = state.variables.len(),
                confounders = state.confounders.len(),
                filtered = state.filtered.len(),
                "iteration complete"
            );

            // Confounders do not count toward the target.
            if state.variables.len() >= self.params.min_variables {
                break TerminationReason::SufficientVariables;
            }
            if state.iteration >= self.params.max_iterations {
                break TerminationReason::IterationBudget;
            }
            state = self.expand(state).await?;
        };

        tracing::info!(
            phase = %Phase::Terminated,
            reason = ?termination,
            variables = state.variables.len(),
            "discovery loop finished"
        );

        let synthesis = self
            .adapter
            .synthesize(
                hypothesis,
                state.papers.len(),
                state.variables.len(),
                state.confounders.len(),
            )
            .await?;

        let generator =
            GeneratorPayload::build(hypothesis, &state.variables, &state.confounders, Vec::new());
        let display = LiteratureDisplay::build(
            hypothesis,
            &state.papers,
            &state.variables,
            &state.confounders,
            state.iteration,
            &synthesis,
        );

        Ok(DiscoveryOutcome {
            generator,
            display,
            variables: state.variables,
            confounders: state.confounders,
            termination,
        })
    }

    async fn strategize(&self, mut state: DiscoveryState) -> Result<DiscoveryState, DiscoveryError> {
        tracing::debug!(phase = %Phase::Strategizing, hypothesis = %state.hypothesis, "constructing strategy");
        let strategy = self.adapter.construct_strategy(&state.hypothesis).await?;
        state.strategy = Some(strategy);
        Ok(state)
    }

    async fn search(&self, mut state: DiscoveryState) -> Result<DiscoveryState, DiscoveryError> {
        let query = state
            .strategy
            .as_ref()
            .map(|s| s.query.clone())
            .unwrap_or_default();
        tracing::debug!(phase = %Phase::Searching, query = %query, "searching for papers");

        let pmids = self.source.search(&query, self.params.batch_size()).await?;
        state.pending_pmids = pmids
            .into_iter()
            .filter(|pmid| !state.attempted_pmids.contains(pmid))
            .collect();
        tracing::debug!(fresh = state.pending_pmids.len(), "search returned fresh ids");
        Ok(state)
    }

    /// Analyze pending papers. A failed analysis is logged and skipped; the
    /// run continues with whatever the other papers yield.
    async fn analyze(&self, mut state: DiscoveryState) -> DiscoveryState {
        let pending = std::mem::take(&mut state.pending_pmids);
        if pending.is_empty() {
            return state;
        }

        let papers = match self.source.hydrate(&pending).await {
            Ok(papers) => papers,
            Err(err) => {
                tracing::warn!(phase = %Phase::Analyzing, error = %err, "paper hydration failed, skipping batch");
                state.attempted_pmids.extend(pending);
                return state;
            }
        };

        for mut paper in papers {
            state.attempted_pmids.insert(paper.pmid.clone());
            match self.adapter.analyze_paper(&state.hypothesis, &paper).await {
                Ok(analysis) => {
                    tracing::debug!(
                        phase = %Phase::Analyzing,
                        pmid = %paper.pmid,
                        variables = analysis.variables.len(),
                        "paper analyzed"
                    );
                    state.extracted.extend(analysis.variables.iter().cloned());
                    paper.analysis = Some(analysis);
                    state.papers.push(paper);
                }
                Err(err) => {
                    tracing::warn!(
                        phase = %Phase::Analyzing,
                        pmid = %paper.pmid,
                        error = %err,
                        "paper analysis failed, skipping"
                    );
                }
            }
        }
        state
    }

    fn extract_entities(&self, mut state: DiscoveryState) -> DiscoveryState {
        state.entities = self.recognizer.recognize(&state.papers);
        tracing::debug!(
            phase = %Phase::ExtractingEntities,
            chemicals = state.entities.chemicals.len(),
            diseases = state.entities.diseases.len(),
            "recognized entities"
        );
        state
    }

    /// Rebuild both canonical pools from scratch over the cumulative raw
    /// extraction, seeding the name index with the recognized vocabulary,
    /// then splitting confounders out by role.
    fn standardize(&self, mut state: DiscoveryState) -> DiscoveryState {
        let mut index = CanonicalNameIndex::new();
        for term in state.entities.vocabulary() {
            index.seed(term);
        }

        let mut pool = BTreeMap::new();
        standardize_variables(&mut index, &mut pool, state.extracted.clone());
        tracing::debug!(
            phase = %Phase::Standardizing,
            raw = state.extracted.len(),
            canonical = pool.len(),
            "standardized variables"
        );

        let (confounders, variables) = pool
            .into_iter()
            .partition(|(_, v)| v.role == VariableRole::Confounder);
        state.confounders = confounders;
        state.variables = variables;
        state
    }

    fn filter(&self, mut state: DiscoveryState) -> DiscoveryState {
        state.filtered = filter_statistics(&mut state.variables);
        state
            .filtered
            .extend(filter_statistics(&mut state.confounders));
        if !state.filtered.is_empty() {
            tracing::debug!(
                phase = %Phase::Filtering,
                removed = ?state.filtered,
                "dropped study statistics"
            );
        }
        state
    }

    async fn expand(&self, mut state: DiscoveryState) -> Result<DiscoveryState, DiscoveryError> {
        let current = match state.strategy.as_ref() {
            Some(strategy) => strategy,
            None => return Ok(state),
        };
        tracing::debug!(
            phase = %Phase::Expanding,
            variables = state.variables.len(),
            target = self.params.min_variables,
            "expanding search"
        );
        let expanded = self
            .adapter
            .expand_strategy(&state.hypothesis, current, &state.variable_names())
            .await?;
        state.strategy = Some(expanded);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_divides_budget() {
        let params = DiscoveryParams {
            min_variables: 5,
            max_papers: 20,
            max_iterations: 3,
        };
        assert_eq!(params.batch_size(), 6);

        let tiny = DiscoveryParams {
            min_variables: 1,
            max_papers: 2,
            max_iterations: 5,
        };
        assert_eq!(tiny.batch_size(), 1);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::ExtractingEntities.to_string(), "extracting_entities");
        assert_eq!(Phase::Terminated.to_string(), "terminated");
    }
}
