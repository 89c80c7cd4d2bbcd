/// Scoring and prioritization over canonical leads.
use chrono::Utc;
use rust_lead_research::config::PipelineSettings;
use rust_lead_research::models::{
    CanonicalLead, LeadPriority, LeadTier, RawLeadCandidate, TargetingCriteria,
};
use rust_lead_research::scoring::{
    company_size_match, prioritize, role_match, seniority_match, ScoringEngine,
};

fn lead(key: &str) -> CanonicalLead {
    let mut lead = CanonicalLead::from_candidate(&RawLeadCandidate::new("manual", Utc::now()));
    lead.key = key.to_string();
    lead
}

fn scored(key: &str, composite: f64, social_activity: f64, completeness: f64) -> CanonicalLead {
    let mut l = lead(key);
    l.score.composite = composite;
    l.scoring.social_activity = social_activity;
    l.scoring.data_completeness = completeness;
    l
}

#[test]
fn test_tier_boundaries() {
    let engine = ScoringEngine::new(&PipelineSettings::default());
    assert_eq!(engine.tier(90.0), LeadTier::APlus);
    assert_eq!(engine.tier(89.9), LeadTier::A);
    assert_eq!(engine.tier(70.0), LeadTier::BPlus);
    assert_eq!(engine.tier(60.0), LeadTier::B);
    assert_eq!(engine.tier(40.0), LeadTier::C);
    assert_eq!(engine.tier(39.9), LeadTier::D);
}

#[test]
fn test_role_match_rewards_covered_titles() {
    let targets = vec!["VP Engineering".to_string()];
    assert_eq!(role_match(Some("vp engineering"), &targets), 100.0);
    assert_eq!(role_match(Some("VP of Engineering"), &targets), 100.0);
    assert_eq!(role_match(Some("Engineering Manager"), &targets), 60.0);
    assert_eq!(role_match(Some("Accountant"), &targets), 20.0);
    assert_eq!(role_match(None, &targets), 50.0);
    assert_eq!(role_match(Some("Accountant"), &[]), 50.0);
}

#[test]
fn test_size_and_seniority_distance() {
    let wanted = vec!["51-200".to_string()];
    assert_eq!(company_size_match(Some("120"), &wanted), 100.0);
    assert_eq!(company_size_match(Some("1001-5000"), &wanted), 40.0);
    assert_eq!(company_size_match(Some("unknown"), &wanted), 50.0);

    let mut director = lead("d");
    director.seniority = Some("director".into());
    assert_eq!(seniority_match(&director, &["vp".to_string()]), 75.0);
    assert_eq!(seniority_match(&director, &["Director".to_string()]), 100.0);
    assert_eq!(seniority_match(&director, &[]), 50.0);
}

#[test]
fn test_scores_stay_in_range_for_sparse_lead() {
    let engine = ScoringEngine::new(&PipelineSettings::default());
    let mut sparse = lead("sparse");
    let criteria = TargetingCriteria {
        job_titles: vec!["CTO".into()],
        industries: vec!["Fintech".into()],
        ..TargetingCriteria::default()
    };

    engine.score_lead(&mut sparse, &criteria);

    let s = &sparse.score;
    assert!((0.0..=100.0).contains(&s.composite));
    assert!((0.0..=100.0).contains(&s.confidence));
    assert_eq!(sparse.scoring.email_deliverability, 40.0);
    assert_eq!(s.priority, LeadPriority::Low);
    assert!(s
        .recommendations
        .contains(&"Verify email before outreach".to_string()));
    assert!(s.explanation.starts_with(&format!("Composite {:.1}", s.composite)));
}

#[test]
fn test_prioritize_breaks_close_composites_by_behavior() {
    let mut leads = vec![
        scored("a", 82.0, 20.0, 50.0),
        scored("b", 80.0, 90.0, 50.0),
        scored("c", 60.0, 90.0, 90.0),
        scored("d", 60.0, 90.0, 10.0),
    ];

    prioritize(&mut leads);

    let order: Vec<&str> = leads.iter().map(|l| l.key.as_str()).collect();
    assert_eq!(order, vec!["b", "a", "c", "d"]);
}

#[test]
fn test_prioritize_keeps_adjacent_leads_within_window() {
    let composites = [71.0, 92.5, 88.0, 90.1, 40.0, 86.2, 73.9, 91.0, 55.5, 70.2];
    let mut leads: Vec<CanonicalLead> = composites
        .iter()
        .enumerate()
        .map(|(i, c)| scored(&format!("k{}", i), *c, (i * 17 % 100) as f64, (i * 31 % 100) as f64))
        .collect();

    prioritize(&mut leads);

    for pair in leads.windows(2) {
        assert!(pair[0].score.composite + 5.0 >= pair[1].score.composite);
    }
    assert_eq!(leads.len(), composites.len());
}
