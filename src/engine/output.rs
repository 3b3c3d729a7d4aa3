//! Final outputs of a discovery run.
//!
//! Two consumers, two shapes: a machine payload sized for a downstream
//! synthetic-data generator, and a display document for human review with
//! citations resolved to clickable links.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    Confidence, CorrelationPair, Paper, Relevance, Synthesis, ValueRange, Variable, VariableType,
};

/// One variable projected to the statistical shape a downstream generator
/// needs. Deliberately excludes role, relationship, reasoning, and citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub distribution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<ValueRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl From<&Variable> for GeneratorVariable {
    fn from(variable: &Variable) -> Self {
        Self {
            name: variable.name.clone(),
            var_type: variable.var_type,
            distribution: variable.distribution.clone(),
            range: variable.range,
            units: variable.units.clone(),
        }
    }
}

/// Machine-readable payload for downstream dataset generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorPayload {
    pub hypothesis: String,
    pub variables: Vec<GeneratorVariable>,
    pub correlations: Vec<CorrelationPair>,
    pub source: String,
}

impl GeneratorPayload {
    pub fn build(
        hypothesis: &str,
        variables: &BTreeMap<String, Variable>,
        confounders: &BTreeMap<String, Variable>,
        correlations: Vec<CorrelationPair>,
    ) -> Self {
        Self {
            hypothesis: hypothesis.to_string(),
            variables: variables
                .values()
                .chain(confounders.values())
                .map(GeneratorVariable::from)
                .collect(),
            correlations,
            source: "literature_discovery".to_string(),
        }
    }
}

/// One paper row in the display document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSummary {
    pub pmid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub journal: String,
    pub year: String,
    pub keywords: Vec<String>,
    pub publication_types: Vec<String>,
    pub abstract_sections: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text_sections: Option<BTreeMap<String, String>>,
    pub pubmed_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmc_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi_link: Option<String>,
    pub variables_extracted: Vec<String>,
    pub relevance: Relevance,
    pub key_findings: String,
}

impl PaperSummary {
    fn from_paper(paper: &Paper) -> Self {
        let full_text_sections = if paper.full_text_sections.is_empty() {
            None
        } else {
            Some(
                paper
                    .full_text_sections
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        };

        Self {
            pmid: paper.pmid.clone(),
            doi: paper.doi.clone(),
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            journal: paper.journal.clone(),
            year: paper.year.clone(),
            keywords: paper.keywords.iter().cloned().collect(),
            publication_types: paper.publication_types.iter().cloned().collect(),
            abstract_sections: paper
                .abstract_sections
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            full_text_sections,
            pubmed_link: paper.pubmed_link(),
            pmc_link: paper.pmc_link(),
            doi_link: paper.doi_link(),
            variables_extracted: paper.extracted_variable_names(),
            relevance: paper
                .analysis
                .as_ref()
                .map(|a| a.relevance)
                .unwrap_or(Relevance::Medium),
            key_findings: paper
                .analysis
                .as_ref()
                .map(|a| a.key_findings.clone())
                .unwrap_or_default(),
        }
    }
}

/// Human-readable summary of an entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureDisplay {
    pub hypothesis: String,
    pub total_papers_analyzed: usize,
    pub variables_found: usize,
    pub confounders_found: usize,
    pub search_iterations: usize,
    pub papers: Vec<PaperSummary>,
    pub reasoning_chain: String,
    pub key_relationships: Vec<String>,
    pub novel_insights: Vec<String>,
    pub confidence: Confidence,
}

impl LiteratureDisplay {
    pub fn build(
        hypothesis: &str,
        papers: &[Paper],
        variables: &BTreeMap<String, Variable>,
        confounders: &BTreeMap<String, Variable>,
        search_iterations: usize,
        synthesis: &Synthesis,
    ) -> Self {
        Self {
            hypothesis: hypothesis.to_string(),
            total_papers_analyzed: papers.len(),
            variables_found: variables.len(),
            confounders_found: confounders.len(),
            search_iterations,
            papers: papers.iter().map(PaperSummary::from_paper).collect(),
            reasoning_chain: synthesis.reasoning_chain.clone(),
            key_relationships: synthesis.key_relationships.clone(),
            novel_insights: synthesis.novel_insights.clone(),
            confidence: synthesis.confidence,
        }
    }
}
