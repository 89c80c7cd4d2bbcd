/// Deduplication and merge behavior across sources.
use chrono::{Duration, TimeZone, Utc};
use rust_lead_research::config::PipelineSettings;
use rust_lead_research::dedup::{similarity, DedupEngine};
use rust_lead_research::models::{CanonicalLead, RawLeadCandidate};
use std::collections::BTreeMap;

fn at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn person(source: &str, email: Option<&str>, phone: Option<&str>) -> RawLeadCandidate {
    let mut c = RawLeadCandidate::new(source, at());
    c.first_name = Some("Marie".into());
    c.last_name = Some("Curie".into());
    c.email = email.map(str::to_string);
    c.phone = phone.map(str::to_string);
    c.company_name = Some("Radium Labs".into());
    c
}

fn priorities(entries: &[(&str, u8)]) -> BTreeMap<String, u8> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
}

#[test]
fn test_shared_email_merges_and_unions_sources() {
    let engine = DedupEngine::new(
        &PipelineSettings::default(),
        &priorities(&[("apollo", 2), ("hunter", 1)]),
    );
    let candidates = vec![
        person("hunter", Some("x@y.com"), Some("555-0200")),
        person("apollo", Some("x@y.com"), Some("555-0100")),
    ];

    let report = engine.deduplicate(candidates);

    assert_eq!(report.leads.len(), 1);
    let lead = &report.leads[0];
    assert_eq!(lead.email.as_deref(), Some("x@y.com"));
    assert_eq!(
        lead.sources.iter().cloned().collect::<Vec<_>>(),
        vec!["apollo".to_string(), "hunter".to_string()]
    );
    // The higher-priority source arrives first and keeps its phone.
    assert_eq!(lead.phone.as_deref(), Some("555-0100"));
    assert_eq!(lead.merged_from.len(), 2);
    assert_eq!(report.clusters.len(), 1);
}

#[test]
fn test_different_people_stay_apart() {
    let engine = DedupEngine::new(&PipelineSettings::default(), &BTreeMap::new());
    let mut other = RawLeadCandidate::new("apollo", at());
    other.first_name = Some("Niels".into());
    other.last_name = Some("Bohr".into());
    other.email = Some("niels@copenhagen.dk".into());

    let report = engine.deduplicate(vec![person("apollo", Some("marie@radium.fr"), None), other]);

    assert_eq!(report.leads.len(), 2);
    assert!(report.clusters.is_empty());
    assert!(report.leads.iter().all(|l| l.sources.len() == 1));
}

#[test]
fn test_profile_url_and_name_merge_without_email() {
    let engine = DedupEngine::new(&PipelineSettings::default(), &BTreeMap::new());
    let mut a = person("linkedin", None, None);
    a.linkedin_url = Some("https://www.linkedin.com/in/marie-curie".into());
    a.title = Some("Head of Research".into());
    let mut b = person("crunchbase", None, None);
    b.linkedin_url = Some("https://www.linkedin.com/in/marie-curie/".into());
    b.title = Some("head of research".into());
    b.company_size = Some("51-200".into());

    let report = engine.deduplicate(vec![a, b]);

    assert_eq!(report.leads.len(), 1);
    let lead = &report.leads[0];
    assert_eq!(lead.sources.len(), 2);
    assert_eq!(lead.company.size.as_deref(), Some("51-200"));
    assert_eq!(report.similar_pairs.len(), 1);
    assert!(report.similar_pairs[0].merged);
}

#[test]
fn test_merge_keeps_latest_timestamp() {
    let engine = DedupEngine::new(&PipelineSettings::default(), &BTreeMap::new());
    let older = person("apollo", Some("x@y.com"), None);
    let mut newer = person("hunter", Some("x@y.com"), None);
    newer.retrieved_at = at() + Duration::days(3);

    let report = engine.deduplicate(vec![older, newer]);

    assert_eq!(report.leads[0].last_updated, at() + Duration::days(3));
}

#[test]
fn test_similarity_is_symmetric_and_bounded() {
    let mut a = person("apollo", Some("x@y.com"), Some("555-0100"));
    a.linkedin_url = Some("https://www.linkedin.com/in/marie-curie".into());
    a.title = Some("Head of Research".into());
    let b = a.clone();

    let (la, lb) = (
        CanonicalLead::from_candidate(&a),
        CanonicalLead::from_candidate(&b),
    );
    assert_eq!(similarity(&la, &lb), 100);
    assert_eq!(similarity(&la, &lb), similarity(&lb, &la));

    let empty = CanonicalLead::from_candidate(&RawLeadCandidate::new("manual", at()));
    assert_eq!(similarity(&la, &empty), 0);
}

fn profiled(source: &str, location: &str) -> RawLeadCandidate {
    let mut c = person(source, None, None);
    c.linkedin_url = Some("https://www.linkedin.com/in/marie-curie".into());
    c.location = Some(location.into());
    c
}

#[test]
fn test_same_source_repeats_merge_identically_in_any_order() {
    let engine = DedupEngine::new(&PipelineSettings::default(), &BTreeMap::new());
    let mut london = person("apollo", Some("x@y.com"), None);
    london.location = Some("London".into());
    london.tech_stack = vec!["Rust".into()];
    let mut paris = london.clone();
    paris.location = Some("Paris".into());
    paris.tech_stack = vec!["Go".into()];

    let forward = engine.deduplicate(vec![london.clone(), paris.clone()]);
    let backward = engine.deduplicate(vec![paris, london]);

    assert_eq!(forward.leads, backward.leads);
    assert_eq!(forward.leads.len(), 1);
    assert_eq!(forward.leads[0].merged_from.len(), 1);
}

#[test]
fn test_repeated_identity_below_merge_score_keeps_one_key() {
    // name (30) + profile url (40) + company (10) = 80, under the merge line
    let engine = DedupEngine::new(&PipelineSettings::default(), &BTreeMap::new());
    let candidates = vec![
        profiled("apollo", "London"),
        profiled("apollo", "Paris"),
        profiled("hunter", "Warsaw"),
    ];

    let report = engine.deduplicate(candidates);

    assert_eq!(report.leads.len(), 2);
    assert_ne!(report.leads[0].key, report.leads[1].key);
    assert!(report.leads.iter().all(|l| l.sources.len() == 1));
    assert_eq!(report.similar_pairs.len(), 1);
    assert_eq!(report.similar_pairs[0].score, 80);
    assert!(!report.similar_pairs[0].merged);
}
