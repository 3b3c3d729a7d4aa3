//! End-to-end discovery runs over scripted seams: a canned paper source, a
//! completion client that routes on prompt markers, and a fixed recognizer.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lit_discovery::client::ApiError;
use lit_discovery::engine::{DiscoveryEngine, DiscoveryParams, TerminationReason};
use lit_discovery::llm::{CompletionClient, CompletionRequest, LlmError, ReasoningAdapter};
use lit_discovery::models::{Paper, PaperBuilder};
use lit_discovery::ner::{EntityRecognizer, RecognizedEntities};

#[derive(Debug)]
struct MockPaperSource {
    papers: Vec<Paper>,
    searches: AtomicUsize,
}

impl MockPaperSource {
    fn new(papers: Vec<Paper>) -> Self {
        Self {
            papers,
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl lit_discovery::client::PaperSource for MockPaperSource {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<String>, ApiError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .papers
            .iter()
            .take(max_results)
            .map(|p| p.pmid.clone())
            .collect())
    }

    async fn hydrate(&self, pmids: &[String]) -> Result<Vec<Paper>, ApiError> {
        Ok(self
            .papers
            .iter()
            .filter(|p| pmids.contains(&p.pmid))
            .cloned()
            .collect())
    }
}

/// Routes each prompt to a canned response by the XML template it asks for.
#[derive(Debug)]
struct ScriptedLlm {
    strategy: String,
    analysis_for: Vec<(String, String)>,
    expanded: String,
    synthesis: String,
}

impl ScriptedLlm {
    fn with_defaults() -> Self {
        Self {
            strategy: STRATEGY_RESPONSE.to_string(),
            analysis_for: Vec::new(),
            expanded: EXPANDED_RESPONSE.to_string(),
            synthesis: SYNTHESIS_RESPONSE.to_string(),
        }
    }

    fn analysis(mut self, pmid: &str, response: &str) -> Self {
        self.analysis_for.push((pmid.to_string(), response.to_string()));
        self
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let prompt = &request.prompt;
        if prompt.contains("<strategy>") {
            return Ok(self.strategy.clone());
        }
        if prompt.contains("<analysis>") {
            for (pmid, response) in &self.analysis_for {
                if prompt.contains(&format!("<pmid>{}</pmid>", pmid)) {
                    return Ok(response.clone());
                }
            }
            return Err(LlmError::Api("no scripted analysis for prompt".to_string()));
        }
        if prompt.contains("<expanded_strategy>") {
            return Ok(self.expanded.clone());
        }
        if prompt.contains("<synthesis>") {
            return Ok(self.synthesis.clone());
        }
        Err(LlmError::Api("unrecognized prompt".to_string()))
    }
}

#[derive(Debug)]
struct StaticRecognizer {
    entities: RecognizedEntities,
}

impl StaticRecognizer {
    fn with_chemicals(terms: &[&str]) -> Self {
        let mut entities = RecognizedEntities::default();
        entities.chemicals = terms.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>();
        Self { entities }
    }
}

impl EntityRecognizer for StaticRecognizer {
    fn recognize(&self, _papers: &[Paper]) -> RecognizedEntities {
        self.entities.clone()
    }
}

const STRATEGY_RESPONSE: &str = r#"<strategy>
  <query>CRP AND "cardiovascular events" AND "type 2 diabetes"</query>
  <key_concepts><concept>CRP</concept><concept>cardiovascular events</concept></key_concepts>
  <expected_variable_types><type>biomarker</type><type>outcome</type></expected_variable_types>
  <reasoning>targets inflammation and outcomes directly</reasoning>
</strategy>"#;

const EXPANDED_RESPONSE: &str = r#"<expanded_strategy>
  <query>inflammation AND "major adverse cardiac events" AND diabetes</query>
  <reasoning>broaden past the CRP-specific terms</reasoning>
  <expected_additions><addition>lipid markers</addition></expected_additions>
</expanded_strategy>"#;

const SYNTHESIS_RESPONSE: &str = r#"<synthesis>
  <reasoning_chain>CRP consistently tracked cardiovascular events across cohorts</reasoning_chain>
  <key_relationships><relationship>CRP positively predicts events</relationship></key_relationships>
  <novel_insights><insight>association strongest under poor glycemic control</insight></novel_insights>
  <confidence>high</confidence>
</synthesis>"#;

fn paper(pmid: &str, title: &str) -> Paper {
    PaperBuilder::new(pmid)
        .title(title)
        .journal("Circulation")
        .year("2022")
        .abstract_section("full", "CRP was measured at baseline and events recorded.")
        .build()
}

fn analysis_response(variables: &[(&str, &str)]) -> String {
    let with_roles: Vec<(&str, &str, &str)> = variables
        .iter()
        .map(|(name, extra)| (*name, "predictor", *extra))
        .collect();
    analysis_response_with_roles(&with_roles)
}

fn analysis_response_with_roles(variables: &[(&str, &str, &str)]) -> String {
    let vars: String = variables
        .iter()
        .map(|(name, role, extra)| {
            format!(
                "<variable><name>{}</name><type>continuous</type><distribution>normal</distribution><role>{}</role><relationship>positive</relationship>{}<reasoning>measured</reasoning></variable>",
                name, role, extra
            )
        })
        .collect();
    format!(
        "<analysis><variables>{}</variables><key_findings>variables measured</key_findings><relevance>high</relevance></analysis>",
        vars
    )
}

fn engine(
    source: MockPaperSource,
    llm: ScriptedLlm,
    recognizer: StaticRecognizer,
    params: DiscoveryParams,
) -> DiscoveryEngine {
    let adapter = ReasoningAdapter::new(Arc::new(llm), "scripted");
    DiscoveryEngine::new(Arc::new(source), adapter, Arc::new(recognizer), params)
}

#[tokio::test]
async fn test_single_iteration_discovers_cited_variables() {
    let papers = vec![
        paper("100", "CRP and events"),
        paper("101", "Glucose control"),
        paper("102", "Blood pressure cohort"),
    ];
    let llm = ScriptedLlm::with_defaults()
        .analysis("100", &analysis_response(&[("CRP", ""), ("Age", "")]))
        .analysis("101", &analysis_response(&[("HbA1c", ""), ("Fasting glucose", "")]))
        .analysis("102", &analysis_response(&[("Systolic blood pressure", "")]));

    let params = DiscoveryParams {
        min_variables: 5,
        max_papers: 3,
        max_iterations: 1,
    };
    let outcome = engine(
        MockPaperSource::new(papers),
        llm,
        StaticRecognizer::with_chemicals(&["CRP"]),
        params,
    )
    .run("CRP predicts cardiovascular events in type 2 diabetes")
    .await
    .unwrap();

    assert_eq!(outcome.termination, TerminationReason::SufficientVariables);
    assert_eq!(outcome.generator.variables.len(), 5);
    assert_eq!(
        outcome.generator.hypothesis,
        "CRP predicts cardiovascular events in type 2 diabetes"
    );
    assert_eq!(outcome.generator.source, "literature_discovery");
    for variable in outcome.variables.values() {
        assert!(!variable.citations.is_empty());
    }
    assert_eq!(outcome.display.total_papers_analyzed, 3);
    assert_eq!(outcome.display.search_iterations, 1);
}

#[tokio::test]
async fn test_study_statistics_are_filtered_out() {
    let papers = vec![paper("200", "Hazard model study")];
    let llm = ScriptedLlm::with_defaults().analysis(
        "200",
        &analysis_response(&[
            ("CRP", r#"<range min="0.5" max="15.0" mean="3.2" sd="2.1"/>"#),
            ("Hazard Ratio", r#"<range min="0.8" max="1.9" mean="1.2"/>"#),
        ]),
    );

    let params = DiscoveryParams {
        min_variables: 1,
        max_papers: 1,
        max_iterations: 1,
    };
    let outcome = engine(
        MockPaperSource::new(papers),
        llm,
        StaticRecognizer::with_chemicals(&[]),
        params,
    )
    .run("h")
    .await
    .unwrap();

    let names: Vec<&str> = outcome
        .generator
        .variables
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert!(names.contains(&"CRP"));
    assert!(!names.iter().any(|n| n.contains("Hazard")));
}

#[tokio::test]
async fn test_duplicate_names_collapse_with_union_citations() {
    let papers = vec![
        paper("300", "CRP short form"),
        paper("301", "CRP long form"),
    ];
    let llm = ScriptedLlm::with_defaults()
        .analysis("300", &analysis_response(&[("C-reactive protein", "")]))
        .analysis("301", &analysis_response(&[("C-reactive protein levels", "")]));

    let params = DiscoveryParams {
        min_variables: 1,
        max_papers: 2,
        max_iterations: 1,
    };
    let outcome = engine(
        MockPaperSource::new(papers),
        llm,
        StaticRecognizer::with_chemicals(&["C-reactive protein"]),
        params,
    )
    .run("h")
    .await
    .unwrap();

    assert_eq!(outcome.generator.variables.len(), 1);
    let merged = outcome.variables.values().next().unwrap();
    assert!(merged.citations.contains("PMID:300"));
    assert!(merged.citations.contains("PMID:301"));
}

#[tokio::test]
async fn test_iteration_budget_is_success_with_partial_results() {
    // One paper yielding one variable; target of 10 can never be met
    let papers = vec![paper("400", "Lone paper")];
    let llm = ScriptedLlm::with_defaults().analysis("400", &analysis_response(&[("CRP", "")]));

    let source = MockPaperSource::new(papers);
    let params = DiscoveryParams {
        min_variables: 10,
        max_papers: 6,
        max_iterations: 3,
    };
    let eng = engine(source, llm, StaticRecognizer::with_chemicals(&[]), params);
    let outcome = eng.run("h").await.unwrap();

    assert_eq!(outcome.termination, TerminationReason::IterationBudget);
    assert_eq!(outcome.display.search_iterations, 3);
    assert_eq!(outcome.generator.variables.len(), 1);
}

#[tokio::test]
async fn test_confounders_do_not_count_toward_the_target() {
    // One predictor plus one confounder; a target of 2 predictors is never met
    let papers = vec![paper("600", "Adjusted cohort")];
    let llm = ScriptedLlm::with_defaults().analysis(
        "600",
        &analysis_response_with_roles(&[("CRP", "predictor", ""), ("Age", "confounder", "")]),
    );

    let params = DiscoveryParams {
        min_variables: 2,
        max_papers: 4,
        max_iterations: 2,
    };
    let outcome = engine(
        MockPaperSource::new(papers),
        llm,
        StaticRecognizer::with_chemicals(&[]),
        params,
    )
    .run("h")
    .await
    .unwrap();

    assert_eq!(outcome.termination, TerminationReason::IterationBudget);
    assert_eq!(outcome.display.variables_found, 1);
    assert_eq!(outcome.display.confounders_found, 1);
    assert!(outcome.variables.contains_key("CRP"));
    assert!(outcome.confounders.contains_key("Age"));
    // Both pools still feed the generator payload.
    assert_eq!(outcome.generator.variables.len(), 2);
}

#[tokio::test]
async fn test_failed_paper_analysis_is_skipped_not_fatal() {
    let papers = vec![paper("500", "Analyzable"), paper("501", "Unanalyzable")];
    // No scripted analysis for 501, so its analysis call errors
    let llm = ScriptedLlm::with_defaults().analysis("500", &analysis_response(&[("CRP", "")]));

    let params = DiscoveryParams {
        min_variables: 1,
        max_papers: 2,
        max_iterations: 1,
    };
    let outcome = engine(
        MockPaperSource::new(papers),
        llm,
        StaticRecognizer::with_chemicals(&[]),
        params,
    )
    .run("h")
    .await
    .unwrap();

    assert_eq!(outcome.display.total_papers_analyzed, 1);
    assert_eq!(outcome.generator.variables.len(), 1);
}

#[tokio::test]
async fn test_strategy_failure_aborts_the_run() {
    #[derive(Debug)]
    struct FailingLlm;

    #[async_trait]
    impl CompletionClient for FailingLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Err(LlmError::Api("upstream unavailable".to_string()))
        }
    }

    let adapter = ReasoningAdapter::new(Arc::new(FailingLlm), "scripted");
    let eng = DiscoveryEngine::new(
        Arc::new(MockPaperSource::new(Vec::new())),
        adapter,
        Arc::new(StaticRecognizer::with_chemicals(&[])),
        DiscoveryParams::default(),
    );

    assert!(eng.run("h").await.is_err());
}
