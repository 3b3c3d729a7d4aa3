//! Chain-of-thought reasoning operations over the completion client.
//!
//! Four operations share one contract shape: build a task-specific prompt,
//! run one completion, locate the expected XML payload, decode it into a
//! typed model. Enum-like fields proposed by the model are normalized to the
//! supported sets rather than rejected.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::llm::payload::parse_payload;
use crate::llm::{CompletionClient, CompletionRequest, LlmError};
use crate::models::{
    parse_stat, Confidence, Paper, PaperAnalysis, Relationship, Relevance, SearchStrategy,
    Synthesis, ValueRange, Variable, VariableRole, VariableType,
};

/// Default length of the paper text slice included in analysis prompts.
/// Reasonable values are roughly 2000 to 8000 characters; larger slices give
/// the model more signal at a higher token cost.
pub const DEFAULT_CONTEXT_BUDGET: usize = 4000;

/// LLM reasoning adapter driving strategy construction, per-paper variable
/// extraction, search expansion, and final synthesis.
#[derive(Debug, Clone)]
pub struct ReasoningAdapter {
    client: Arc<dyn CompletionClient>,
    model: String,
    context_budget: usize,
}

impl ReasoningAdapter {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            context_budget: DEFAULT_CONTEXT_BUDGET,
        }
    }

    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String, LlmError> {
        self.client
            .complete(CompletionRequest {
                model: self.model.clone(),
                max_tokens,
                prompt,
            })
            .await
    }

    /// Analyze the hypothesis and construct the initial search strategy.
    pub async fn construct_strategy(&self, hypothesis: &str) -> Result<SearchStrategy, LlmError> {
        let prompt = format!(
            r#"You are a medical research expert. Analyze this hypothesis and create a PubMed search strategy.

<hypothesis>{hypothesis}</hypothesis>

Think step-by-step:
1. What are the key medical concepts?
2. What variables might we need to measure?
3. What search terms would find relevant papers?

Return ONLY this XML structure (no other text):
<strategy>
  <query>optimal PubMed search query with AND/OR operators</query>
  <key_concepts>
    <concept>concept1</concept>
    <concept>concept2</concept>
  </key_concepts>
  <expected_variable_types>
    <type>biomarker</type>
    <type>demographic</type>
    <type>outcome</type>
  </expected_variable_types>
  <reasoning>why this search strategy will work</reasoning>
</strategy>"#
        );

        let response = self.complete(prompt, 1000).await?;
        let xml: StrategyXml = parse_payload(&response, "strategy")?;

        let strategy = SearchStrategy {
            query: xml.query,
            key_concepts: xml.key_concepts.concepts,
            expected_variable_types: xml.expected_variable_types.types,
            reasoning: xml.reasoning,
        };
        tracing::info!(query = %strategy.query, reasoning = %strategy.reasoning, "constructed search strategy");
        Ok(strategy)
    }

    /// Extract variable candidates from one paper.
    ///
    /// The paper text is truncated to the context budget before prompting.
    /// Each extracted variable carries a single citation to this paper.
    pub async fn analyze_paper(
        &self,
        hypothesis: &str,
        paper: &Paper,
    ) -> Result<PaperAnalysis, LlmError> {
        let abstract_text: String = paper
            .abstract_text()
            .chars()
            .take(self.context_budget)
            .collect();

        let prompt = format!(
            r#"You are analyzing a research paper for this hypothesis:
<hypothesis>{hypothesis}</hypothesis>

<paper>
  <pmid>{pmid}</pmid>
  <title>{title}</title>
  <abstract>{abstract_text}</abstract>
</paper>

Think step-by-step:
1. What variables are measured in this study?
2. What is the relationship to our hypothesis?
3. Are these predictors, outcomes, or confounders?
4. What correlations/distributions are reported?

For EACH variable, extract:
- name (use standard medical terminology, preferably abbreviations when common)
- type (continuous, categorical, binary, ordinal)
- distribution (normal, lognormal, binomial, etc. - ESTIMATE if not explicitly stated)
- role (predictor, outcome, confounder)
- relationship direction (positive, negative, null, unknown)
- units if mentioned
- typical range (min, max, mean, sd) - PRIORITIZE mean/SD, then min/max

IMPORTANT:
- Extract actual measured VARIABLES only (biomarkers, demographics, clinical measures)
- DO NOT extract study statistics (hazard ratios, odds ratios, p-values, etc.)
- Focus on data that would be useful for synthetic dataset generation

Return ONLY this XML structure:
<analysis>
  <variables>
    <variable>
      <name>Biomarker_X</name>
      <type>continuous</type>
      <distribution>lognormal</distribution>
      <role>predictor</role>
      <relationship>positive</relationship>
      <units>mg/L</units>
      <range min="0.5" max="15.0" mean="3.2" sd="2.1"/>
      <reasoning>why this variable matters</reasoning>
    </variable>
  </variables>
  <key_findings>summary of paper's main results</key_findings>
  <relevance>high</relevance>
</analysis>"#,
            pmid = paper.pmid,
            title = paper.title,
        );

        let response = self.complete(prompt, 2000).await?;
        let xml: AnalysisXml = parse_payload(&response, "analysis")?;

        let citation = format!("PMID:{}", paper.pmid);
        let variables = xml
            .variables
            .variables
            .into_iter()
            .filter_map(|v| v.into_variable(&citation))
            .collect();

        Ok(PaperAnalysis {
            variables,
            key_findings: xml.key_findings,
            relevance: Relevance::parse_lossy(&xml.relevance),
        })
    }

    /// Expand the search when the variable target has not been met and
    /// iterations remain.
    pub async fn expand_strategy(
        &self,
        hypothesis: &str,
        current: &SearchStrategy,
        variable_names: &[String],
    ) -> Result<SearchStrategy, LlmError> {
        let prompt = format!(
            r#"We're searching for variables related to this hypothesis:
<hypothesis>{hypothesis}</hypothesis>

<current_search>
  <query>{query}</query>
  <variables_found>{count}</variables_found>
  <variable_list>{names}</variable_list>
</current_search>

We need more variables. Think step-by-step:
1. What variable types are we missing?
2. Should we broaden or narrow the search?
3. What related terms should we add?

Return ONLY this XML structure:
<expanded_strategy>
  <query>updated PubMed search query with different terms</query>
  <reasoning>why this will find different/more relevant papers</reasoning>
  <expected_additions>
    <addition>new variable type 1</addition>
    <addition>new variable type 2</addition>
  </expected_additions>
</expanded_strategy>"#,
            query = current.query,
            count = variable_names.len(),
            names = variable_names.join(", "),
        );

        let response = self.complete(prompt, 800).await?;
        let xml: ExpandedStrategyXml = parse_payload(&response, "expanded_strategy")?;

        let query = if xml.query.is_empty() {
            current.query.clone()
        } else {
            xml.query
        };
        let strategy = SearchStrategy {
            query,
            key_concepts: current.key_concepts.clone(),
            expected_variable_types: xml.expected_additions.additions,
            reasoning: xml.reasoning,
        };
        tracing::info!(query = %strategy.query, reasoning = %strategy.reasoning, "expanded search strategy");
        Ok(strategy)
    }

    /// Synthesize all findings; run exactly once per successful run.
    pub async fn synthesize(
        &self,
        hypothesis: &str,
        papers_analyzed: usize,
        variables_discovered: usize,
        confounders_identified: usize,
    ) -> Result<Synthesis, LlmError> {
        let prompt = format!(
            r#"You analyzed {papers_analyzed} papers for this hypothesis:
<hypothesis>{hypothesis}</hypothesis>

<findings>
  <papers_analyzed>{papers_analyzed}</papers_analyzed>
  <variables_discovered>{variables_discovered}</variables_discovered>
  <confounders_identified>{confounders_identified}</confounders_identified>
</findings>

Create a synthesis:
1. What are the key relationships discovered?
2. Which variables are most important?
3. Are there contradictions across papers?
4. What novel insights emerge?

Return ONLY this XML structure:
<synthesis>
  <reasoning_chain>step-by-step synthesis of all findings across papers</reasoning_chain>
  <key_relationships>
    <relationship>relationship 1</relationship>
    <relationship>relationship 2</relationship>
  </key_relationships>
  <novel_insights>
    <insight>insight 1</insight>
    <insight>insight 2</insight>
  </novel_insights>
  <confidence>high</confidence>
</synthesis>"#
        );

        let response = self.complete(prompt, 2000).await?;
        let xml: SynthesisXml = parse_payload(&response, "synthesis")?;

        Ok(Synthesis {
            reasoning_chain: xml.reasoning_chain,
            key_relationships: xml.key_relationships.relationships,
            novel_insights: xml.novel_insights.insights,
            confidence: Confidence::parse_lossy(&xml.confidence),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StrategyXml {
    #[serde(default)]
    query: String,
    #[serde(default)]
    key_concepts: ConceptsXml,
    #[serde(default)]
    expected_variable_types: TypesXml,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Default, Deserialize)]
struct ConceptsXml {
    #[serde(rename = "concept", default)]
    concepts: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TypesXml {
    #[serde(rename = "type", default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExpandedStrategyXml {
    #[serde(default)]
    query: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    expected_additions: AdditionsXml,
}

#[derive(Debug, Default, Deserialize)]
struct AdditionsXml {
    #[serde(rename = "addition", default)]
    additions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SynthesisXml {
    #[serde(default)]
    reasoning_chain: String,
    #[serde(default)]
    key_relationships: RelationshipsXml,
    #[serde(default)]
    novel_insights: InsightsXml,
    #[serde(default)]
    confidence: String,
}

#[derive(Debug, Default, Deserialize)]
struct RelationshipsXml {
    #[serde(rename = "relationship", default)]
    relationships: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InsightsXml {
    #[serde(rename = "insight", default)]
    insights: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisXml {
    #[serde(default)]
    variables: VariablesXml,
    #[serde(default)]
    key_findings: String,
    #[serde(default)]
    relevance: String,
}

#[derive(Debug, Default, Deserialize)]
struct VariablesXml {
    #[serde(rename = "variable", default)]
    variables: Vec<VariableXml>,
}

#[derive(Debug, Deserialize)]
struct VariableXml {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    var_type: String,
    #[serde(default)]
    distribution: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    relationship: String,
    units: Option<String>,
    range: Option<RangeXml>,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RangeXml {
    #[serde(rename = "@min")]
    min: Option<String>,
    #[serde(rename = "@max")]
    max: Option<String>,
    #[serde(rename = "@mean")]
    mean: Option<String>,
    #[serde(rename = "@sd")]
    sd: Option<String>,
}

impl VariableXml {
    fn into_variable(self, citation: &str) -> Option<Variable> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return None;
        }

        let range = self.range.map(|r| ValueRange {
            min: parse_stat(r.min.as_deref()),
            max: parse_stat(r.max.as_deref()),
            mean: parse_stat(r.mean.as_deref()),
            sd: parse_stat(r.sd.as_deref()),
        });

        let distribution = if self.distribution.trim().is_empty() {
            "unknown".to_string()
        } else {
            self.distribution.trim().to_string()
        };

        let mut citations = BTreeSet::new();
        citations.insert(citation.to_string());

        Some(Variable {
            name,
            var_type: VariableType::parse_lossy(&self.var_type),
            distribution,
            role: VariableRole::parse_lossy(&self.role),
            relationship: Relationship::parse_lossy(&self.relationship),
            units: self.units.filter(|u| !u.trim().is_empty()),
            range,
            reasoning: self.reasoning,
            citations,
        })
    }
}
