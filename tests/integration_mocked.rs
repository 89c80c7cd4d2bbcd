/// Integration tests with mocked gateway endpoints
/// Exercises the HTTP capability implementations without hitting real services
use rust_lead_research::config::{GatewayEndpoint, PipelineSettings};
use rust_lead_research::errors::AppError;
use rust_lead_research::fixtures::{FixtureMailRouteResolver, InMemoryLeadStore};
use rust_lead_research::gateway_client::{
    GatewayCompanyIntelProvider, GatewaySourceAdapter, GatewayVerificationProvider,
};
use rust_lead_research::models::{ResearchRequest, TargetingCriteria, VerificationStatus};
use rust_lead_research::pipeline::ResearchCoordinator;
use rust_lead_research::providers::{CompanyIntelProvider, SourceAdapter, VerificationProvider};
use rust_lead_research::rate_limiter::CallLimiter;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create an endpoint pointing at the mock server
fn endpoint(name: &str, server: &MockServer) -> GatewayEndpoint {
    GatewayEndpoint {
        name: name.to_string(),
        url: server.uri(),
    }
}

fn search_response() -> serde_json::Value {
    json!({
        "candidates": [
            {
                "source": "upstream-tag",
                "full_name": "Ada Lovelace",
                "email": "ada@analytical.io",
                "title": "CTO",
                "company_name": "Analytical Engines",
                "company_website": "https://analytical.io",
                "retrieved_at": "2026-04-01T10:00:00Z"
            },
            {
                "first_name": "Grace",
                "last_name": "Hopper",
                "company_name": "Compiler Works"
            }
        ]
    })
}

#[tokio::test]
async fn test_source_search_sends_criteria_and_tags_candidates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("Authorization", "Bearer test_token"))
        .and(body_partial_json(json!({
            "max_results": 10,
            "criteria": { "job_titles": ["CTO"] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_response()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter =
        GatewaySourceAdapter::new(&endpoint("apollo", &mock_server), Some("test_token".into()))
            .unwrap();
    let criteria = TargetingCriteria {
        job_titles: vec!["CTO".into()],
        ..TargetingCriteria::default()
    };

    let candidates = adapter.search(&criteria, 10).await.unwrap();

    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.source == "apollo"));
    assert_eq!(
        candidates[0].names(),
        (Some("Ada".to_string()), Some("Lovelace".to_string()))
    );
}

#[tokio::test]
async fn test_source_error_maps_to_source_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let adapter = GatewaySourceAdapter::new(&endpoint("apollo", &mock_server), None).unwrap();
    let result = adapter.search(&TargetingCriteria::default(), 5).await;

    match result {
        Err(AppError::SourceUnavailable(msg)) => {
            assert!(msg.contains("apollo"));
            assert!(msg.contains("500"));
        }
        other => panic!("expected SourceUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&mock_server)
        .await;

    let adapter = GatewaySourceAdapter::new(&endpoint("apollo", &mock_server), None).unwrap();
    for _ in 0..5 {
        assert!(adapter.search(&TargetingCriteria::default(), 5).await.is_err());
    }

    let rejected = adapter.search(&TargetingCriteria::default(), 5).await;
    match rejected {
        Err(AppError::SourceUnavailable(msg)) => assert!(msg.contains("circuit open")),
        other => panic!("expected rejected call, got {:?}", other),
    }
}

#[tokio::test]
async fn test_verification_provider_verdicts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(body_partial_json(json!({ "email": "ada@analytical.io" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "valid",
            "score": 96.0,
            "reason": "mailbox exists",
            "catch_all": true
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(body_partial_json(json!({ "email": "nobody@analytical.io" })))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let provider =
        GatewayVerificationProvider::new(&endpoint("neverbounce", &mock_server), None).unwrap();

    let known = provider.verify_email("ada@analytical.io").await.unwrap();
    assert_eq!(known.status, VerificationStatus::Valid);
    assert_eq!(known.score, 96.0);
    assert!(known.catch_all);

    let unknown = provider.verify_email("nobody@analytical.io").await.unwrap();
    assert_eq!(unknown.status, VerificationStatus::Unknown);
    assert!(!unknown.catch_all);
}

#[tokio::test]
async fn test_company_intel_partial_and_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/company"))
        .and(body_partial_json(json!({ "name": "Analytical Engines" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "industry": "Computing",
            "growth_signals": ["new office"]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/company"))
        .and(body_partial_json(json!({ "name": "Unknown Co" })))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let provider = GatewayCompanyIntelProvider::new(&mock_server.uri(), None).unwrap();

    let facts = provider
        .gather("Analytical Engines", Some("https://analytical.io"))
        .await
        .unwrap();
    assert_eq!(facts.industry.as_deref(), Some("Computing"));
    assert_eq!(facts.growth_signals, vec!["new office".to_string()]);
    assert!(facts.size.is_none());

    let missing = provider.gather("Unknown Co", None).await.unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
async fn test_research_run_over_gateways() {
    let sources = MockServer::start().await;
    let verifier = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_response()))
        .mount(&sources)
        .await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "valid",
            "score": 90.0
        })))
        .mount(&verifier)
        .await;

    let settings = PipelineSettings {
        min_dispatch_spacing_ms: 0,
        ..PipelineSettings::default()
    };
    let limiter = Arc::new(CallLimiter::from_settings(&settings));
    let store = Arc::new(InMemoryLeadStore::new());
    let coordinator = ResearchCoordinator::new(
        settings,
        limiter,
        store,
        Arc::new(FixtureMailRouteResolver::routable(["analytical.io"])),
    )
    .with_source(Arc::new(
        GatewaySourceAdapter::new(&endpoint("apollo", &sources), None).unwrap(),
    ))
    .with_verification_provider(Arc::new(
        GatewayVerificationProvider::new(&endpoint("neverbounce", &verifier), None).unwrap(),
    ));

    let request = ResearchRequest {
        campaign_id: None,
        criteria: TargetingCriteria::default(),
        target_count: 5,
        quality_threshold: 0.0,
        source_priorities: BTreeMap::new(),
    };
    let outcome = coordinator
        .run_research(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.summary.candidates_discovered, 2);
    assert_eq!(outcome.leads.len(), 2);
    let ada = outcome
        .leads
        .iter()
        .find(|l| l.email.as_deref() == Some("ada@analytical.io"))
        .unwrap();
    assert_eq!(ada.verification.status, VerificationStatus::Valid);
    assert_eq!(ada.verification.provider.as_deref(), Some("neverbounce"));
}
