//! Retry behavior and E-utilities parsing against a local mock server.

use std::time::{Duration, Instant};

use mockito::Matcher;

use lit_discovery::client::{
    ApiError, EutilsClient, EutilsConfig, PaperSource, PubMedSource, RateLimiter,
};

fn fast_client(api_key: Option<String>) -> EutilsClient {
    let interval = Duration::from_millis(1);
    EutilsClient::with_limiter(
        EutilsConfig {
            api_key,
            min_interval: interval,
            max_retries: 3,
            backoff_base: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
        },
        RateLimiter::new(interval),
    )
}

#[tokio::test]
async fn test_transient_failures_retry_until_success() {
    let mut server = mockito::Server::new_async().await;

    let rate_limited = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(429)
        .expect(2)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"<eSearchResult><IdList><Id>38000001</Id><Id>38000002</Id></IdList></eSearchResult>"#,
        )
        .expect(1)
        .create_async()
        .await;

    let source = PubMedSource::with_base_url(fast_client(None), server.url());
    let started = Instant::now();
    let pmids = source.search("CRP AND diabetes", 5).await.unwrap();

    assert_eq!(pmids, vec!["38000001", "38000002"]);
    // Two failed attempts back off 5ms then 10ms before the third succeeds.
    assert!(started.elapsed() >= Duration::from_millis(15));
    rate_limited.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_retries_exhausted_after_persistent_5xx() {
    let mut server = mockito::Server::new_async().await;

    let failing = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let source = PubMedSource::with_base_url(fast_client(None), server.url());
    let err = source.search("CRP", 5).await.unwrap_err();

    match err {
        ApiError::RetriesExhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                *source,
                ApiError::Status {
                    status: 503,
                    retriable: true
                }
            ));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    failing.assert_async().await;
}

#[tokio::test]
async fn test_permanent_4xx_is_not_retried() {
    let mut server = mockito::Server::new_async().await;

    let bad_request = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(400)
        .expect(1)
        .create_async()
        .await;

    let source = PubMedSource::with_base_url(fast_client(None), server.url());
    let err = source.search("malformed[[[", 5).await.unwrap_err();

    assert!(matches!(
        err,
        ApiError::Status {
            status: 400,
            retriable: false
        }
    ));
    bad_request.assert_async().await;
}

#[tokio::test]
async fn test_api_key_appended_to_every_request() {
    let mut server = mockito::Server::new_async().await;

    let keyed = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("api_key".into(), "secret".into()))
        .with_status(200)
        .with_body(r#"<eSearchResult><IdList></IdList></eSearchResult>"#)
        .expect(1)
        .create_async()
        .await;

    let source = PubMedSource::with_base_url(fast_client(Some("secret".to_string())), server.url());
    let pmids = source.search("CRP", 5).await.unwrap();

    assert!(pmids.is_empty());
    keyed.assert_async().await;
}

#[tokio::test]
async fn test_hydrate_degrades_when_abstract_and_fulltext_fail() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/esummary.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"<eSummaryResult><DocumentSummarySet status="OK">
<DocumentSummary uid="38000001">
  <Title>CRP and cardiovascular events</Title>
  <Source>Circulation</Source>
  <PubDate>2022 Mar 4</PubDate>
  <Authors><Author><Name>Smith J</Name></Author></Authors>
  <ArticleIds><ArticleId><IdType>doi</IdType><Value>10.1000/circ.1</Value></ArticleId></ArticleIds>
</DocumentSummary>
</DocumentSummarySet></eSummaryResult>"#,
        )
        .create_async()
        .await;

    // Abstract fetch and PMC link both fail permanently; the paper still
    // comes back with its ESummary metadata.
    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/elink.fcgi")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let source = PubMedSource::with_base_url(fast_client(None), server.url());
    let papers = source.hydrate(&["38000001".to_string()]).await.unwrap();

    assert_eq!(papers.len(), 1);
    let paper = &papers[0];
    assert_eq!(paper.pmid, "38000001");
    assert_eq!(paper.title, "CRP and cardiovascular events");
    assert_eq!(paper.journal, "Circulation");
    assert_eq!(paper.year, "2022");
    assert_eq!(paper.doi.as_deref(), Some("10.1000/circ.1"));
    assert!(paper.abstract_sections.is_empty());
    assert!(paper.pmc_id.is_none());
}

#[tokio::test]
async fn test_hydrate_attaches_full_text_when_linked() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/esummary.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"<eSummaryResult><DocumentSummarySet status="OK">
<DocumentSummary uid="38000002">
  <Title>Open access cohort</Title>
  <Source>BMJ</Source>
  <PubDate>2021</PubDate>
</DocumentSummary>
</DocumentSummarySet></eSummaryResult>"#,
        )
        .create_async()
        .await;

    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("db".into(), "pubmed".into()))
        .with_status(200)
        .with_body(
            r#"<PubmedArticleSet><PubmedArticle><MedlineCitation><Article>
<Abstract>
  <AbstractText Label="BACKGROUND">CRP rises with inflammation.</AbstractText>
  <AbstractText Label="RESULTS">Events doubled in the top tertile.</AbstractText>
</Abstract>
</Article></MedlineCitation></PubmedArticle></PubmedArticleSet>"#,
        )
        .create_async()
        .await;

    server
        .mock("GET", "/elink.fcgi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"<eLinkResult><LinkSet><LinkSetDb><DbTo>pmc</DbTo>
<Link><Id>9876543</Id></Link>
</LinkSetDb></LinkSet></eLinkResult>"#,
        )
        .create_async()
        .await;

    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("db".into(), "pmc".into()))
        .with_status(200)
        .with_body(
            r#"<pmc-articleset><article><body>
<sec><title>Methods</title><p>We enrolled 1200 adults.</p></sec>
<sec><title>Results</title><p>CRP predicted events.</p></sec>
</body></article></pmc-articleset>"#,
        )
        .create_async()
        .await;

    let source = PubMedSource::with_base_url(fast_client(None), server.url());
    let papers = source.hydrate(&["38000002".to_string()]).await.unwrap();

    assert_eq!(papers.len(), 1);
    let paper = &papers[0];
    assert_eq!(
        paper.abstract_sections.get("background").map(String::as_str),
        Some("CRP rises with inflammation.")
    );
    assert!(paper.pmc_id.is_some());
    assert!(paper
        .full_text_sections
        .get("methods")
        .is_some_and(|text| text.contains("1200 adults")));
}
