//! Paper retrieval over the NCBI E-utilities API.
//!
//! Four request shapes: ESearch (id search with date floor), ESummary (batch
//! metadata), EFetch (abstract sections, keywords, publication types; PMC
//! full text), and ELink (PubMed to PMC full-text lookup).

use async_trait::async_trait;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::HashMap;

use crate::client::{ApiError, EutilsClient};
use crate::models::{Paper, PaperBuilder};

const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Papers published before this date are excluded from searches.
const MIN_PUB_DATE: &str = "2015/01/01";

/// Source of paper records for the discovery engine.
///
/// The engine depends on this trait so tests can substitute a scripted
/// source for the live API.
#[async_trait]
pub trait PaperSource: Send + Sync + std::fmt::Debug {
    /// Search for paper identifiers, most relevant first per the upstream
    /// ranking. The returned order is preserved downstream.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, ApiError>;

    /// Fetch full records for the given identifiers, in the same order.
    /// Best-effort per paper: a failure to obtain the abstract or full text
    /// for one paper degrades that paper, it never aborts the batch.
    async fn hydrate(&self, pmids: &[String]) -> Result<Vec<Paper>, ApiError>;
}

/// PubMed paper source backed by the rate-limited E-utilities client
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: EutilsClient,
    base_url: String,
}

impl PubMedSource {
    pub fn new(client: EutilsClient) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the endpoint base (for tests against a local server)
    pub fn with_base_url(client: EutilsClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}.fcgi", self.base_url, name)
    }

    async fn esearch(&self, query: &str, max_results: usize) -> Result<Vec<String>, ApiError> {
        let params = [
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", max_results.to_string()),
            ("retmode", "xml".to_string()),
            ("mindate", MIN_PUB_DATE.to_string()),
            ("datetype", "pdat".to_string()),
        ];
        let xml = self.client.get(&self.endpoint("esearch"), &params).await?;
        let ids = parse_esearch_response(&xml)?;
        tracing::info!(count = ids.len(), query, "ESearch returned PMIDs");
        Ok(ids)
    }

    async fn esummary(&self, pmids: &[String]) -> Result<HashMap<String, DocSummary>, ApiError> {
        let params = [
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("version", "2.0".to_string()),
            ("retmode", "xml".to_string()),
        ];
        let xml = self.client.get(&self.endpoint("esummary"), &params).await?;
        parse_esummary_response(&xml)
    }

    async fn efetch_abstract(&self, pmid: &str) -> Result<AbstractData, ApiError> {
        let params = [
            ("db", "pubmed".to_string()),
            ("id", pmid.to_string()),
            ("retmode", "xml".to_string()),
        ];
        let xml = self.client.get(&self.endpoint("efetch"), &params).await?;
        parse_abstract_response(&xml)
    }

    async fn elink_pmc(&self, pmid: &str) -> Result<Option<String>, ApiError> {
        let params = [
            ("dbfrom", "pubmed".to_string()),
            ("db", "pmc".to_string()),
            ("id", pmid.to_string()),
            ("retmode", "xml".to_string()),
        ];
        let xml = self.client.get(&self.endpoint("elink"), &params).await?;
        parse_elink_response(&xml)
    }

    async fn efetch_pmc(&self, pmc_id: &str) -> Result<HashMap<String, String>, ApiError> {
        let params = [
            ("db", "pmc".to_string()),
            ("id", pmc_id.to_string()),
            ("retmode", "xml".to_string()),
        ];
        let xml = self.client.get(&self.endpoint("efetch"), &params).await?;
        Ok(parse_pmc_sections(&xml))
    }
}

#[async_trait]
impl PaperSource for PubMedSource {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, ApiError> {
        self.esearch(query, max_results).await
    }

    async fn hydrate(&self, pmids: &[String]) -> Result<Vec<Paper>, ApiError> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }

        let summaries = self.esummary(pmids).await?;
        let mut papers = Vec::with_capacity(pmids.len());

        for pmid in pmids {
            let summary = summaries.get(pmid).cloned().unwrap_or_default();
            let mut builder = PaperBuilder::new(pmid.clone())
                .title(summary.title)
                .doi(summary.doi)
                .authors(summary.authors)
                .journal(summary.journal)
                .year(summary.year);

            match self.efetch_abstract(pmid).await {
                Ok(data) => {
                    builder = builder
                        .abstract_sections(data.sections)
                        .keywords(data.keywords)
                        .publication_types(data.publication_types);
                }
                Err(err) => {
                    tracing::warn!(pmid, error = %err, "abstract fetch failed, degrading to metadata only");
                }
            }

            // Full text is strictly optional per paper.
            let pmc_id = match self.elink_pmc(pmid).await {
                Ok(id) => id,
                Err(err) => {
                    tracing::debug!(pmid, error = %err, "PMC link lookup failed");
                    None
                }
            };
            if let Some(pmc_id) = pmc_id {
                match self.efetch_pmc(&pmc_id).await {
                    Ok(sections) if !sections.is_empty() => {
                        tracing::info!(pmid, pmc_id, sections = sections.len(), "retrieved PMC full text");
                        builder = builder.pmc_id(pmc_id).full_text_sections(sections);
                    }
                    Ok(_) => {
                        builder = builder.pmc_id(pmc_id);
                    }
                    Err(err) => {
                        tracing::warn!(pmid, pmc_id, error = %err, "full-text fetch failed, degrading to abstract only");
                        builder = builder.pmc_id(pmc_id);
                    }
                }
            }

            papers.push(builder.build());
        }

        Ok(papers)
    }
}

/// Parsed ESummary fields for one record
#[derive(Debug, Clone, Default)]
struct DocSummary {
    title: String,
    authors: Vec<String>,
    journal: String,
    year: String,
    doi: String,
}

/// Parsed EFetch abstract data for one record
#[derive(Debug, Clone, Default)]
struct AbstractData {
    sections: HashMap<String, String>,
    keywords: Vec<String>,
    publication_types: Vec<String>,
}

fn parse_esearch_response(xml: &str) -> Result<Vec<String>, ApiError> {
    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct ESearchResult {
        IdList: Option<IdList>,
    }

    #[derive(Debug, Deserialize)]
    struct IdList {
        #[serde(rename = "Id", default)]
        ids: Vec<String>,
    }

    let result: ESearchResult = from_str(xml)
        .map_err(|e| ApiError::Parse(format!("Failed to parse ESearch XML: {}", e)))?;

    Ok(result.IdList.map(|l| l.ids).unwrap_or_default())
}

fn parse_esummary_response(xml: &str) -> Result<HashMap<String, DocSummary>, ApiError> {
    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct ESummaryResult {
        DocumentSummarySet: Option<DocumentSummarySet>,
    }

    #[derive(Debug, Deserialize)]
    struct DocumentSummarySet {
        #[serde(rename = "DocumentSummary", default)]
        summaries: Vec<DocumentSummary>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct DocumentSummary {
        #[serde(rename = "@uid")]
        uid: String,
        Title: Option<String>,
        Source: Option<String>,
        PubDate: Option<String>,
        Authors: Option<Authors>,
        ArticleIds: Option<ArticleIds>,
    }

    #[derive(Debug, Deserialize)]
    struct Authors {
        #[serde(rename = "Author", default)]
        authors: Vec<Author>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct Author {
        Name: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct ArticleIds {
        #[serde(rename = "ArticleId", default)]
        ids: Vec<ArticleId>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct ArticleId {
        IdType: Option<String>,
        Value: Option<String>,
    }

    let result: ESummaryResult = from_str(xml)
        .map_err(|e| ApiError::Parse(format!("Failed to parse ESummary XML: {}", e)))?;

    let mut summaries = HashMap::new();
    for doc in result
        .DocumentSummarySet
        .map(|s| s.summaries)
        .unwrap_or_default()
    {
        let doi = doc
            .ArticleIds
            .as_ref()
            .and_then(|ids| {
                ids.ids
                    .iter()
                    .find(|id| id.IdType.as_deref() == Some("doi"))
            })
            .and_then(|id| id.Value.clone())
            .unwrap_or_default();

        let year = doc
            .PubDate
            .as_deref()
            .and_then(|d| d.split_whitespace().next())
            .unwrap_or_default()
            .to_string();

        let authors = doc
            .Authors
            .map(|a| a.authors.into_iter().filter_map(|a| a.Name).collect())
            .unwrap_or_default();

        summaries.insert(
            doc.uid.clone(),
            DocSummary {
                title: doc.Title.unwrap_or_default(),
                authors,
                journal: doc.Source.unwrap_or_default(),
                year,
                doi,
            },
        );
    }

    Ok(summaries)
}

fn parse_abstract_response(xml: &str) -> Result<AbstractData, ApiError> {
    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct PubmedArticleSet {
        #[serde(rename = "PubmedArticle", default)]
        articles: Vec<PubmedArticle>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct PubmedArticle {
        MedlineCitation: Option<MedlineCitation>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct MedlineCitation {
        Article: Option<Article>,
        #[serde(rename = "KeywordList", default)]
        keyword_lists: Vec<KeywordList>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct Article {
        Abstract: Option<Abstract>,
        PublicationTypeList: Option<PublicationTypeList>,
    }

    #[derive(Debug, Deserialize)]
    struct Abstract {
        #[serde(rename = "AbstractText", default)]
        texts: Vec<AbstractText>,
    }

    #[derive(Debug, Deserialize)]
    struct AbstractText {
        #[serde(rename = "@Label")]
        label: Option<String>,
        #[serde(rename = "$text")]
        text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct KeywordList {
        #[serde(rename = "Keyword", default)]
        keywords: Vec<Keyword>,
    }

    #[derive(Debug, Deserialize)]
    struct Keyword {
        #[serde(rename = "$text")]
        text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct PublicationTypeList {
        #[serde(rename = "PublicationType", default)]
        types: Vec<PublicationType>,
    }

    #[derive(Debug, Deserialize)]
    struct PublicationType {
        #[serde(rename = "$text")]
        text: Option<String>,
    }

    let result: PubmedArticleSet = from_str(xml)
        .map_err(|e| ApiError::Parse(format!("Failed to parse EFetch XML: {}", e)))?;

    let mut data = AbstractData::default();
    let Some(citation) = result
        .articles
        .into_iter()
        .next()
        .and_then(|a| a.MedlineCitation)
    else {
        return Ok(data);
    };

    if let Some(article) = &citation.Article {
        if let Some(abstract_elem) = &article.Abstract {
            for at in &abstract_elem.texts {
                let Some(text) = at.text.clone() else { continue };
                let label = at.label.as_deref().unwrap_or("").to_lowercase();
                let section = match label.as_str() {
                    "background" | "objective" | "introduction" => Some("background"),
                    "methods" | "materials and methods" => Some("methods"),
                    "results" | "findings" => Some("results"),
                    "conclusion" | "conclusions" => Some("conclusions"),
                    "" => Some("full"),
                    _ => None,
                };
                if let Some(section) = section {
                    data.sections.insert(section.to_string(), text);
                }
            }
        }

        if let Some(pt_list) = &article.PublicationTypeList {
            data.publication_types = pt_list
                .types
                .iter()
                .filter_map(|t| t.text.clone())
                .collect();
        }
    }

    data.keywords = citation
        .keyword_lists
        .into_iter()
        .flat_map(|l| l.keywords)
        .filter_map(|k| k.text)
        .collect();

    Ok(data)
}

fn parse_elink_response(xml: &str) -> Result<Option<String>, ApiError> {
    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct ELinkResult {
        #[serde(rename = "LinkSet", default)]
        link_sets: Vec<LinkSet>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct LinkSet {
        #[serde(rename = "LinkSetDb", default)]
        dbs: Vec<LinkSetDb>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct LinkSetDb {
        #[serde(rename = "Link", default)]
        links: Vec<Link>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(non_snake_case)]
    struct Link {
        Id: Option<String>,
    }

    let result: ELinkResult = from_str(xml)
        .map_err(|e| ApiError::Parse(format!("Failed to parse ELink XML: {}", e)))?;

    Ok(result
        .link_sets
        .into_iter()
        .flat_map(|ls| ls.dbs)
        .flat_map(|db| db.links)
        .find_map(|l| l.Id))
}

/// Extract and classify full-text sections from a PMC article body.
///
/// PMC body XML is mixed content, so this walks the event stream instead of
/// deserializing: top-level `<sec>` titles decide the bucket, all nested text
/// is accumulated under it.
fn parse_pmc_sections(xml: &str) -> HashMap<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut sections: HashMap<String, String> = HashMap::new();

    let mut in_body = false;
    let mut sec_depth: u32 = 0;
    let mut in_top_title = false;
    let mut awaiting_title = false;
    let mut current_title = String::new();
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"body" => in_body = true,
                b"sec" if in_body => {
                    sec_depth += 1;
                    if sec_depth == 1 {
                        current_title.clear();
                        current_text.clear();
                        awaiting_title = true;
                    }
                }
                b"title" if in_body && sec_depth == 1 && awaiting_title => {
                    in_top_title = true;
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"body" => in_body = false,
                b"sec" if in_body && sec_depth > 0 => {
                    if sec_depth == 1 {
                        if let Some(bucket) = classify_section(&current_title) {
                            let text = current_text.split_whitespace().collect::<Vec<_>>().join(" ");
                            if !text.is_empty() {
                                sections.entry(bucket.to_string()).or_insert(text);
                            }
                        }
                    }
                    sec_depth -= 1;
                }
                b"title" if in_top_title => {
                    in_top_title = false;
                    awaiting_title = false;
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    if in_top_title {
                        current_title.push_str(&text);
                    } else if in_body && sec_depth >= 1 {
                        current_text.push_str(&text);
                        current_text.push(' ');
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    sections
}

fn classify_section(title: &str) -> Option<&'static str> {
    let title = title.to_lowercase();
    if title.contains("introduction") || title.contains("background") {
        Some("introduction")
    } else if title.contains("method") || title.contains("material") {
        Some("methods")
    } else if title.contains("result") || title.contains("finding") {
        Some("results")
    } else if title.contains("discussion") {
        Some("discussion")
    } else if title.contains("conclusion") {
        Some("conclusions")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_esearch_response() {
        let xml = r#"<eSearchResult><Count>3</Count><IdList>
            <Id>38123456</Id><Id>38234567</Id><Id>38345678</Id>
        </IdList></eSearchResult>"#;
        let ids = parse_esearch_response(xml).unwrap();
        assert_eq!(ids, vec!["38123456", "38234567", "38345678"]);
    }

    #[test]
    fn test_parse_esearch_empty() {
        let xml = r#"<eSearchResult><Count>0</Count><IdList></IdList></eSearchResult>"#;
        assert!(parse_esearch_response(xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_esummary_response() {
        let xml = r#"<eSummaryResult><DocumentSummarySet status="OK">
          <DocumentSummary uid="38123456">
            <PubDate>2024 Jan 15</PubDate>
            <Source>JAMA</Source>
            <Authors><Author><Name>Smith J</Name></Author><Author><Name>Doe A</Name></Author></Authors>
            <Title>CRP and cardiovascular risk</Title>
            <ArticleIds>
              <ArticleId><IdType>pubmed</IdType><Value>38123456</Value></ArticleId>
              <ArticleId><IdType>doi</IdType><Value>10.1001/jama.2024.1</Value></ArticleId>
            </ArticleIds>
          </DocumentSummary>
        </DocumentSummarySet></eSummaryResult>"#;

        let summaries = parse_esummary_response(xml).unwrap();
        let doc = summaries.get("38123456").unwrap();
        assert_eq!(doc.title, "CRP and cardiovascular risk");
        assert_eq!(doc.journal, "JAMA");
        assert_eq!(doc.year, "2024");
        assert_eq!(doc.doi, "10.1001/jama.2024.1");
        assert_eq!(doc.authors, vec!["Smith J", "Doe A"]);
    }

    #[test]
    fn test_parse_abstract_sections_and_keywords() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
          <Article>
            <Abstract>
              <AbstractText Label="BACKGROUND">CRP is an inflammatory marker.</AbstractText>
              <AbstractText Label="METHODS">We studied 1000 adults.</AbstractText>
              <AbstractText Label="RESULTS">Elevated CRP predicted events.</AbstractText>
              <AbstractText Label="CONCLUSIONS">CRP predicts risk.</AbstractText>
            </Abstract>
            <PublicationTypeList>
              <PublicationType>Journal Article</PublicationType>
            </PublicationTypeList>
          </Article>
          <KeywordList><Keyword>C-reactive protein</Keyword><Keyword>diabetes</Keyword></KeywordList>
        </MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

        let data = parse_abstract_response(xml).unwrap();
        assert_eq!(
            data.sections.get("background").map(String::as_str),
            Some("CRP is an inflammatory marker.")
        );
        assert_eq!(
            data.sections.get("conclusions").map(String::as_str),
            Some("CRP predicts risk.")
        );
        assert_eq!(data.keywords.len(), 2);
        assert_eq!(data.publication_types, vec!["Journal Article"]);
    }

    #[test]
    fn test_parse_abstract_unstructured() {
        let xml = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
          <Article><Abstract>
            <AbstractText>One plain abstract paragraph.</AbstractText>
          </Abstract></Article>
        </MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

        let data = parse_abstract_response(xml).unwrap();
        assert_eq!(
            data.sections.get("full").map(String::as_str),
            Some("One plain abstract paragraph.")
        );
    }

    #[test]
    fn test_parse_elink_response() {
        let xml = r#"<eLinkResult><LinkSet>
          <LinkSetDb><DbTo>pmc</DbTo><Link><Id>9876543</Id></Link></LinkSetDb>
        </LinkSet></eLinkResult>"#;
        assert_eq!(parse_elink_response(xml).unwrap().as_deref(), Some("9876543"));

        let empty = r#"<eLinkResult><LinkSet></LinkSet></eLinkResult>"#;
        assert!(parse_elink_response(empty).unwrap().is_none());
    }

    #[test]
    fn test_parse_pmc_sections() {
        let xml = r#"<article><body>
          <sec><title>Introduction</title><p>CRP background text.</p></sec>
          <sec><title>Materials and Methods</title><p>Cohort of adults.</p>
            <sec><title>Assays</title><p>Nested assay details.</p></sec></sec>
          <sec><title>Results</title><p>CRP rose with events.</p></sec>
          <sec><title>Acknowledgements</title><p>Thanks.</p></sec>
        </body></article>"#;

        let sections = parse_pmc_sections(xml);
        assert_eq!(
            sections.get("introduction").map(String::as_str),
            Some("CRP background text.")
        );
        let methods = sections.get("methods").unwrap();
        assert!(methods.contains("Cohort of adults."));
        assert!(methods.contains("Nested assay details."));
        assert!(sections.contains_key("results"));
        assert!(!sections.contains_key("acknowledgements"));
    }
}
