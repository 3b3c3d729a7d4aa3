//! Paper model representing a PubMed record retrieved for one discovery run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::models::variable::Variable;

/// How relevant a paper is to the hypothesis, as judged during analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    /// Parse a model-proposed relevance, falling back to `Medium`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" => Relevance::High,
            "low" => Relevance::Low,
            _ => Relevance::Medium,
        }
    }
}

/// Result of analyzing one paper against the hypothesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperAnalysis {
    /// Variables extracted from the paper, citations already attached
    pub variables: Vec<Variable>,

    /// Summary of the paper's main results
    pub key_findings: String,

    /// Relevance to the hypothesis
    pub relevance: Relevance,
}

/// A PubMed record with everything the engine needs for one run
///
/// Created once per retrieved paper, mutated once when analysis completes,
/// immutable afterward. Owned exclusively by the engine for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// PubMed identifier, unique per run
    pub pmid: String,

    /// Digital Object Identifier, if present
    pub doi: Option<String>,

    /// Paper title
    pub title: String,

    /// Author names
    pub authors: Vec<String>,

    /// Journal name
    pub journal: String,

    /// Publication year
    pub year: String,

    /// Abstract text keyed by section label
    /// (background/methods/results/conclusions, or "full" when unstructured)
    pub abstract_sections: HashMap<String, String>,

    /// Author keywords
    pub keywords: BTreeSet<String>,

    /// Publication types (e.g. "Journal Article", "Meta-Analysis")
    pub publication_types: BTreeSet<String>,

    /// PMC identifier when the full text is available
    pub pmc_id: Option<String>,

    /// Full text keyed by section
    /// (introduction/methods/results/discussion/conclusions)
    pub full_text_sections: HashMap<String, String>,

    /// Analysis result, set once analysis completes
    pub analysis: Option<PaperAnalysis>,
}

impl Paper {
    pub fn new(pmid: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            doi: None,
            title: String::new(),
            authors: Vec::new(),
            journal: String::new(),
            year: String::new(),
            abstract_sections: HashMap::new(),
            keywords: BTreeSet::new(),
            publication_types: BTreeSet::new(),
            pmc_id: None,
            full_text_sections: HashMap::new(),
            analysis: None,
        }
    }

    /// Flatten the abstract for prompting: the unstructured text when present,
    /// otherwise labelled sections joined in one string.
    pub fn abstract_text(&self) -> String {
        if let Some(full) = self.abstract_sections.get("full") {
            return full.clone();
        }
        let mut parts: Vec<String> = Vec::new();
        for label in ["background", "methods", "results", "conclusions"] {
            if let Some(text) = self.abstract_sections.get(label) {
                let mut heading = label.to_string();
                if let Some(first) = heading.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                parts.push(format!("{}: {}", heading, text));
            }
        }
        parts.join(" ")
    }

    /// Names of the variables extracted from this paper, empty before analysis
    pub fn extracted_variable_names(&self) -> Vec<String> {
        self.analysis
            .as_ref()
            .map(|a| a.variables.iter().map(|v| v.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Link to the PubMed record
    pub fn pubmed_link(&self) -> String {
        format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid)
    }

    /// Link to the PMC full-text article, when available
    pub fn pmc_link(&self) -> Option<String> {
        self.pmc_id
            .as_ref()
            .map(|id| format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{}/", id))
    }

    /// Link to the DOI resolver, when a DOI is present
    pub fn doi_link(&self) -> Option<String> {
        self.doi
            .as_ref()
            .filter(|d| !d.is_empty())
            .map(|d| format!("https://doi.org/{}", d))
    }
}

/// Builder for constructing Paper records during hydration
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    pub fn new(pmid: impl Into<String>) -> Self {
        Self {
            paper: Paper::new(pmid),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.paper.title = title.into();
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        if !doi.is_empty() {
            self.paper.doi = Some(doi);
        }
        self
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.paper.authors = authors;
        self
    }

    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.paper.journal = journal.into();
        self
    }

    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.paper.year = year.into();
        self
    }

    pub fn abstract_section(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.paper
            .abstract_sections
            .insert(label.into(), text.into());
        self
    }

    pub fn abstract_sections(mut self, sections: HashMap<String, String>) -> Self {
        self.paper.abstract_sections = sections;
        self
    }

    pub fn keywords(mut self, keywords: impl IntoIterator<Item = String>) -> Self {
        self.paper.keywords = keywords.into_iter().collect();
        self
    }

    pub fn publication_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.paper.publication_types = types.into_iter().collect();
        self
    }

    pub fn pmc_id(mut self, pmc_id: impl Into<String>) -> Self {
        self.paper.pmc_id = Some(pmc_id.into());
        self
    }

    pub fn full_text_sections(mut self, sections: HashMap<String, String>) -> Self {
        self.paper.full_text_sections = sections;
        self
    }

    pub fn build(self) -> Paper {
        self.paper
    }
}
