//! Named-entity recognition over paper text.
//!
//! The recognizer builds the vocabulary used for variable-name
//! standardization; it plays no part in search. Recognition is best-effort:
//! if the lexicon cannot be loaded the recognizer degrades to an empty
//! vocabulary for the rest of the run and the engine falls back to
//! literal-name deduplication.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use strsim::jaro_winkler;

use crate::models::Paper;

/// Default confidence threshold for accepting a fuzzy lexicon match
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Longest candidate span, in word tokens
const MAX_SPAN_TOKENS: usize = 4;

/// Per-paper text budget handed to recognition, in characters
const PAPER_TEXT_BUDGET: usize = 5000;

/// Per-section budget for full-text slices
const SECTION_TEXT_BUDGET: usize = 1500;

/// Biomedical terms recognized across the accumulated paper set
#[derive(Debug, Clone, Default)]
pub struct RecognizedEntities {
    /// Chemical / biomarker-like terms
    pub chemicals: BTreeSet<String>,
    /// Disease-like terms
    pub diseases: BTreeSet<String>,
}

impl RecognizedEntities {
    pub fn is_empty(&self) -> bool {
        self.chemicals.is_empty() && self.diseases.is_empty()
    }

    /// Both categories merged into the standardization vocabulary
    pub fn vocabulary(&self) -> Vec<String> {
        self.chemicals
            .iter()
            .chain(self.diseases.iter())
            .cloned()
            .collect()
    }
}

/// Entity extraction seam; injected into the engine at construction time.
pub trait EntityRecognizer: Send + Sync + std::fmt::Debug {
    /// Recognize entities over the full accumulated paper set.
    fn recognize(&self, papers: &[Paper]) -> RecognizedEntities;
}

#[derive(Debug)]
enum LoadState {
    Unloaded,
    Loaded(Lexicon),
    Failed,
}

#[derive(Debug)]
struct Lexicon {
    chemicals: Vec<String>,
    diseases: Vec<String>,
}

/// Lexicon-backed recognizer with lazy loading.
///
/// Terms come from the built-in seed lexicons unless file paths are
/// configured. Candidate spans are word n-grams scored against the lexicon
/// by exact match or Jaro-Winkler similarity; hits below the confidence
/// threshold are discarded.
#[derive(Debug)]
pub struct LexiconRecognizer {
    chemical_path: Option<PathBuf>,
    disease_path: Option<PathBuf>,
    confidence: f64,
    state: Mutex<LoadState>,
}

impl LexiconRecognizer {
    pub fn new(confidence: f64) -> Self {
        Self {
            chemical_path: None,
            disease_path: None,
            confidence,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Use lexicon files instead of the built-in seeds.
    pub fn with_lexicon_files(
        chemical_path: Option<PathBuf>,
        disease_path: Option<PathBuf>,
        confidence: f64,
    ) -> Self {
        Self {
            chemical_path,
            disease_path,
            confidence,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    fn load_terms(path: &Option<PathBuf>, embedded: &str) -> std::io::Result<Vec<String>> {
        let raw = match path {
            Some(path) => std::fs::read_to_string(path)?,
            None => embedded.to_string(),
        };
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    fn load(&self) -> Result<Lexicon, std::io::Error> {
        let chemicals =
            Self::load_terms(&self.chemical_path, include_str!("../../lexicon/chemicals.txt"))?;
        let diseases =
            Self::load_terms(&self.disease_path, include_str!("../../lexicon/diseases.txt"))?;
        tracing::info!(
            chemicals = chemicals.len(),
            diseases = diseases.len(),
            "loaded entity lexicons"
        );
        Ok(Lexicon {
            chemicals,
            diseases,
        })
    }

    fn match_spans(&self, text: &str, terms: &[String], out: &mut BTreeSet<String>) {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();

        for width in 1..=MAX_SPAN_TOKENS {
            if tokens.len() < width {
                break;
            }
            for window in tokens.windows(width) {
                let span = window.join(" ");
                if !is_valid_entity(&span) {
                    continue;
                }
                let span_lower = span.to_lowercase();
                for term in terms {
                    let term_lower = term.to_lowercase();
                    let score = if span_lower == term_lower {
                        1.0
                    } else {
                        jaro_winkler(&span_lower, &term_lower)
                    };
                    if score >= self.confidence {
                        out.insert(span.clone());
                        break;
                    }
                }
            }
        }
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn recognize(&self, papers: &[Paper]) -> RecognizedEntities {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if matches!(*state, LoadState::Unloaded) {
            *state = match self.load() {
                Ok(lexicon) => LoadState::Loaded(lexicon),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to load entity lexicons, continuing without NER");
                    LoadState::Failed
                }
            };
        }

        let lexicon = match &*state {
            LoadState::Loaded(lexicon) => lexicon,
            _ => return RecognizedEntities::default(),
        };

        let mut entities = RecognizedEntities::default();
        for paper in papers {
            let text = recognition_text(paper);
            if text.trim().is_empty() {
                continue;
            }
            self.match_spans(&text, &lexicon.chemicals, &mut entities.chemicals);
            self.match_spans(&text, &lexicon.diseases, &mut entities.diseases);
        }

        tracing::info!(
            chemicals = entities.chemicals.len(),
            diseases = entities.diseases.len(),
            papers = papers.len(),
            "entity recognition complete"
        );
        entities
    }
}

/// Assemble the text slice of one paper handed to recognition: abstract
/// sections plus capped methods/results full-text slices, bounded overall.
fn recognition_text(paper: &Paper) -> String {
    let mut parts: Vec<String> = Vec::new();

    for text in paper.abstract_sections.values() {
        if text.len() > 20 {
            parts.push(text.clone());
        }
    }
    for section in ["methods", "results"] {
        if let Some(text) = paper.full_text_sections.get(section) {
            parts.push(truncate_chars(text, SECTION_TEXT_BUDGET));
        }
    }

    truncate_chars(&parts.join(" "), PAPER_TEXT_BUDGET)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Validate that a span is a clean term rather than a sentence fragment or a
/// study-statistics artifact.
pub fn is_valid_entity(text: &str) -> bool {
    static NUMBER_PAIR: OnceLock<Regex> = OnceLock::new();

    let len = text.chars().count();
    if !(3..=50).contains(&len) {
        return false;
    }

    let punctuation = text
        .chars()
        .filter(|c| ".,:;!?()[]{}#%".contains(*c))
        .count();
    if punctuation > 2 {
        return false;
    }

    // Sub-word-merge artifacts and sentence-boundary markers.
    if [". ", "##", "( ", " )", ": ", "; "]
        .iter()
        .any(|marker| text.contains(marker))
    {
        return false;
    }

    if text.matches(' ').count() > 3 {
        return false;
    }

    // "2, 335" style statistics fragments.
    let number_pair = NUMBER_PAIR.get_or_init(|| {
        Regex::new(r"\d+[,\s]+\d+").expect("valid number-pair pattern")
    });
    if number_pair.is_match(text) {
        return false;
    }

    true
}
