//! Multi-factor lead scoring and prioritization.
//!
//! Twenty-two factors in five categories, each a bounded mapping from the lead's evidence
//! to [0, 100]. Absent evidence maps to a neutral value between 40 and 70 so missing data
//! degrades a lead instead of disqualifying it.

use crate::config::{CategoryWeights, PipelineSettings, TierCutoffs};
use crate::models::{
    clamp_score, CanonicalLead, CategoryScores, LeadPriority, LeadScore, LeadTier,
    ScoringFactors, TargetingCriteria, VerificationStatus,
};
use crate::normalize::{non_empty, tokens};
use crate::quality::{is_valid_profile_url, SeniorityLevel};

/// Neutral score for a factor with no evidence on either side.
pub const NEUTRAL: f64 = 50.0;
/// Deliverability factor used when verification produced no verdict.
pub const UNKNOWN_DELIVERABILITY: f64 = 40.0;

/// Lower bounds of the employee-count buckets.
const SIZE_BUCKET_FLOORS: [u64; 7] = [1, 11, 51, 201, 501, 1001, 5001];

/// Adjacent leads closer than this on composite are ordered by behavioral signals.
const COMPOSITE_TIE_WINDOW: f64 = 5.0;
/// Adjacent leads closer than this on behavioral signals are ordered by data quality.
const BEHAVIORAL_TIE_WINDOW: f64 = 10.0;

pub struct ScoringEngine {
    weights: CategoryWeights,
    tiers: TierCutoffs,
}

impl ScoringEngine {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            weights: settings.category_weights,
            tiers: settings.tier_cutoffs.clone(),
        }
    }

    /// Compute every factor for `lead` against the targeting criteria.
    ///
    /// Data-quality factors mirror the lead's quality and verification records, so those
    /// stages must run first.
    pub fn factors(&self, lead: &CanonicalLead, criteria: &TargetingCriteria) -> ScoringFactors {
        let factors = ScoringFactors {
            role_match: role_match(lead.title.as_deref(), &criteria.job_titles),
            seniority_match: seniority_match(lead, &criteria.seniority_levels),
            company_size_match: company_size_match(
                lead.company.size.as_deref(),
                &criteria.company_sizes,
            ),
            location_match: tiered_text_match(lead.location.as_deref(), &criteria.locations, 60.0),
            industry_match: tiered_text_match(
                lead.company.industry.as_deref(),
                &criteria.industries,
                70.0,
            ),
            social_activity: social_activity(lead.fact_number("social_posts_per_month")),
            content_engagement: content_engagement(lead.fact_text("content_engagement").as_deref()),
            job_change_likelihood: job_change_likelihood(lead.fact_number("months_in_role")),
            buying_signal_strength: signal_count_score(lead.company.buying_signals.len(), 45.0),
            pain_point_alignment: overlap_score(&lead.company.pain_points, &criteria.pain_points),
            data_completeness: lead.quality.completeness,
            data_freshness: lead.quality.freshness,
            source_reliability: lead.quality.reliability,
            email_deliverability: email_deliverability(lead),
            growth_signals: signal_count_score(lead.company.growth_signals.len(), NEUTRAL),
            technology_fit: overlap_score(&lead.company.tech_stack, &criteria.technologies),
            funding_stage: funding_stage(lead.company.funding_stage.as_deref()),
            competitive_fit: competitive_fit(lead, &criteria.competitors),
            network_quality: network_quality(lead.fact_number("connections")),
            thought_leadership: thought_leadership(lead.fact_number("publications")),
            mutual_connections: mutual_connections(lead.fact_number("mutual_connections")),
            social_validation: social_validation(lead),
        };
        clamp_factors(factors)
    }

    /// Category means, composite, tier, priority and the rule-driven advice.
    pub fn score(&self, factors: &ScoringFactors) -> LeadScore {
        let categories = CategoryScores {
            demographic: mean(&factors.demographic()),
            behavioral: mean(&factors.behavioral()),
            data_quality: mean(&factors.data_quality()),
            company_intelligence: mean(&factors.company_intelligence()),
            social_proof: mean(&factors.social_proof()),
        };
        let w = &self.weights;
        let composite = round1(clamp_score(
            w.demographic * categories.demographic
                + w.behavioral * categories.behavioral
                + w.data_quality * categories.data_quality
                + w.company_intelligence * categories.company_intelligence
                + w.social_proof * categories.social_proof,
        ));
        let confidence = clamp_score(
            (((factors.data_completeness + factors.source_reliability) / 2.0) * 1.2).round(),
        );
        let tier = self.tier(composite);
        let priority = priority(composite, categories.behavioral);

        LeadScore {
            composite,
            confidence,
            tier,
            priority,
            recommendations: recommendations(factors),
            next_actions: next_actions(priority, tier, factors),
            explanation: explanation(composite, tier, factors),
            categories,
        }
    }

    /// Fill the lead's factors and score in place.
    pub fn score_lead(&self, lead: &mut CanonicalLead, criteria: &TargetingCriteria) {
        let factors = self.factors(lead, criteria);
        lead.score = self.score(&factors);
        lead.scoring = factors;
    }

    pub fn tier(&self, composite: f64) -> LeadTier {
        let t = &self.tiers;
        match composite {
            c if c >= t.a_plus => LeadTier::APlus,
            c if c >= t.a => LeadTier::A,
            c if c >= t.b_plus => LeadTier::BPlus,
            c if c >= t.b => LeadTier::B,
            c if c >= t.c_plus => LeadTier::CPlus,
            c if c >= t.c => LeadTier::C,
            _ => LeadTier::D,
        }
    }
}

pub fn priority(composite: f64, behavioral: f64) -> LeadPriority {
    if composite >= 75.0 && behavioral >= 70.0 {
        LeadPriority::High
    } else if composite >= 60.0 {
        LeadPriority::Medium
    } else {
        LeadPriority::Low
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn clamp_factors(mut f: ScoringFactors) -> ScoringFactors {
    for value in [
        &mut f.role_match,
        &mut f.seniority_match,
        &mut f.company_size_match,
        &mut f.location_match,
        &mut f.industry_match,
        &mut f.social_activity,
        &mut f.content_engagement,
        &mut f.job_change_likelihood,
        &mut f.buying_signal_strength,
        &mut f.pain_point_alignment,
        &mut f.data_completeness,
        &mut f.data_freshness,
        &mut f.source_reliability,
        &mut f.email_deliverability,
        &mut f.growth_signals,
        &mut f.technology_fit,
        &mut f.funding_stage,
        &mut f.competitive_fit,
        &mut f.network_quality,
        &mut f.thought_leadership,
        &mut f.mutual_connections,
        &mut f.social_validation,
    ] {
        *value = clamp_score(*value);
    }
    f
}

// ============ Demographic ============

/// 100 for an exact title, otherwise 20 + 80 × best token coverage of a target title.
pub fn role_match(title: Option<&str>, targets: &[String]) -> f64 {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return NEUTRAL;
    };
    if targets.is_empty() {
        return NEUTRAL;
    }
    let title_tokens = tokens(title);
    targets
        .iter()
        .map(|target| {
            if target.trim().eq_ignore_ascii_case(title) {
                return 100.0;
            }
            let wanted = tokens(target);
            if wanted.is_empty() {
                return 20.0;
            }
            let covered = wanted.intersection(&title_tokens).count() as f64 / wanted.len() as f64;
            (20.0 + 80.0 * covered).round()
        })
        .fold(0.0, f64::max)
}

/// 100 minus 25 per ordinal step from the closest wanted level.
pub fn seniority_match(lead: &CanonicalLead, wanted: &[String]) -> f64 {
    let level = non_empty(&lead.seniority)
        .and_then(SeniorityLevel::parse)
        .or_else(|| non_empty(&lead.title).and_then(SeniorityLevel::infer_from_title));
    let wanted: Vec<SeniorityLevel> = wanted
        .iter()
        .filter_map(|w| SeniorityLevel::parse(w))
        .collect();
    match level {
        Some(level) if !wanted.is_empty() => {
            let distance = wanted
                .iter()
                .map(|w| (w.rank() - level.rank()).abs())
                .min()
                .unwrap_or(0);
            clamp_score(100.0 - 25.0 * distance as f64)
        }
        _ => NEUTRAL,
    }
}

/// Bucket index of an employee count such as "120", "51-200", "5,000+".
pub fn size_bucket(raw: &str) -> Option<usize> {
    let cleaned = raw.replace(',', "");
    let count: u64 = cleaned
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())?
        .parse()
        .ok()?;
    Some(
        SIZE_BUCKET_FLOORS
            .iter()
            .rposition(|&floor| count >= floor)
            .unwrap_or(0),
    )
}

/// 100 minus 20 per bucket from the closest wanted size.
pub fn company_size_match(size: Option<&str>, wanted: &[String]) -> f64 {
    let wanted: Vec<usize> = wanted.iter().filter_map(|w| size_bucket(w)).collect();
    match size.and_then(size_bucket) {
        Some(bucket) if !wanted.is_empty() => {
            let distance = wanted.iter().map(|w| w.abs_diff(bucket)).min().unwrap_or(0);
            clamp_score(100.0 - 20.0 * distance as f64)
        }
        _ => NEUTRAL,
    }
}

/// 100 when one side contains the other, `partial` on a shared word, 20 otherwise.
pub fn tiered_text_match(value: Option<&str>, targets: &[String], partial: f64) -> f64 {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return NEUTRAL;
    };
    if targets.is_empty() {
        return NEUTRAL;
    }
    let lowered = value.to_lowercase();
    let value_tokens = tokens(value);
    targets
        .iter()
        .map(|target| {
            let t = target.trim().to_lowercase();
            if t.is_empty() {
                20.0
            } else if lowered.contains(&t) || t.contains(&lowered) {
                100.0
            } else if !tokens(&t).is_disjoint(&value_tokens) {
                partial
            } else {
                20.0
            }
        })
        .fold(0.0, f64::max)
}

// ============ Behavioral ============

pub fn social_activity(posts_per_month: Option<f64>) -> f64 {
    match posts_per_month {
        None => 45.0,
        Some(p) if p >= 8.0 => 90.0,
        Some(p) if p >= 4.0 => 75.0,
        Some(p) if p >= 1.0 => 55.0,
        Some(_) => 30.0,
    }
}

pub fn content_engagement(level: Option<&str>) -> f64 {
    match level {
        Some("high") => 90.0,
        Some("medium") => 65.0,
        Some("low") => 35.0,
        _ => 45.0,
    }
}

/// People settled in a role for years are likelier to move than recent joiners.
pub fn job_change_likelihood(months_in_role: Option<f64>) -> f64 {
    match months_in_role {
        None => NEUTRAL,
        Some(m) if m < 6.0 => 30.0,
        Some(m) if m <= 18.0 => 50.0,
        Some(m) if m <= 36.0 => 65.0,
        Some(_) => 80.0,
    }
}

/// 40 + 15 per signal, capped at 100; `empty` when there are none.
pub fn signal_count_score(count: usize, empty: f64) -> f64 {
    if count == 0 {
        empty
    } else {
        (40.0 + 15.0 * count as f64).min(100.0)
    }
}

/// 20 + 80 × share of wanted items found in `have`, neutral when either side is empty.
pub fn overlap_score(have: &[String], wanted: &[String]) -> f64 {
    let wanted: Vec<String> = wanted
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    let have: Vec<String> = have
        .iter()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect();
    if wanted.is_empty() || have.is_empty() {
        return NEUTRAL;
    }
    let found = wanted
        .iter()
        .filter(|w| {
            have.iter().any(|h| {
                h == *w || h.contains(w.as_str()) || w.contains(h.as_str())
            })
        })
        .count();
    (20.0 + 80.0 * found as f64 / wanted.len() as f64).round()
}

// ============ Data quality ============

pub fn email_deliverability(lead: &CanonicalLead) -> f64 {
    match lead.verification.status {
        VerificationStatus::Unknown => UNKNOWN_DELIVERABILITY,
        _ => lead.verification.deliverability,
    }
}

// ============ Company intelligence ============

pub fn funding_stage(stage: Option<&str>) -> f64 {
    let Some(stage) = stage.map(|s| s.trim().to_lowercase().replace(['-', '_'], " ")) else {
        return NEUTRAL;
    };
    match stage.as_str() {
        "pre seed" | "seed" => 55.0,
        "series a" => 65.0,
        "series b" => 75.0,
        "series c" | "series d" | "series e" | "late stage" => 85.0,
        "ipo" | "public" => 70.0,
        "bootstrapped" => 50.0,
        _ => NEUTRAL,
    }
}

/// 0 for a competitor, 80 for a company already using a competitor's product, 60 otherwise.
pub fn competitive_fit(lead: &CanonicalLead, competitors: &[String]) -> f64 {
    let competitors: Vec<String> = competitors
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if competitors.is_empty() {
        return 60.0;
    }
    if let Some(name) = non_empty(&lead.company.name) {
        if competitors.contains(&name.to_lowercase()) {
            return 0.0;
        }
    }
    let uses_competitor = lead
        .company
        .tech_stack
        .iter()
        .any(|t| competitors.contains(&t.trim().to_lowercase()));
    if uses_competitor {
        80.0
    } else {
        60.0
    }
}

// ============ Social proof ============

pub fn network_quality(connections: Option<f64>) -> f64 {
    match connections {
        None => 45.0,
        Some(c) if c >= 500.0 => 85.0,
        Some(c) if c >= 200.0 => 70.0,
        Some(c) if c >= 50.0 => 55.0,
        Some(_) => 35.0,
    }
}

pub fn thought_leadership(publications: Option<f64>) -> f64 {
    match publications {
        None => 40.0,
        Some(p) if p >= 3.0 => 85.0,
        Some(p) if p >= 1.0 => 60.0,
        Some(_) => 35.0,
    }
}

pub fn mutual_connections(count: Option<f64>) -> f64 {
    match count {
        None => 40.0,
        Some(c) if c >= 15.0 => 90.0,
        Some(c) if c >= 5.0 => 75.0,
        Some(c) if c >= 1.0 => 55.0,
        Some(_) => 30.0,
    }
}

/// Corroboration by independent sources, plus a bonus for a public profile.
pub fn social_validation(lead: &CanonicalLead) -> f64 {
    let base = match lead.sources.len() {
        0 | 1 => 45.0,
        2 => 65.0,
        _ => 85.0,
    };
    let profile_bonus = if non_empty(&lead.linkedin_url).is_some_and(is_valid_profile_url) {
        10.0
    } else {
        0.0
    };
    clamp_score(base + profile_bonus)
}

// ============ Advice ============

struct AdviceRule {
    applies: fn(&ScoringFactors) -> bool,
    advice: &'static str,
}

const ADVICE_RULES: [AdviceRule; 8] = [
    AdviceRule {
        applies: |f| f.email_deliverability < 70.0,
        advice: "Verify email before outreach",
    },
    AdviceRule {
        applies: |f| f.job_change_likelihood > 60.0,
        advice: "Time-sensitive: prioritize outreach now",
    },
    AdviceRule {
        applies: |f| f.buying_signal_strength >= 70.0,
        advice: "Lead with the business case, buying signals are active",
    },
    AdviceRule {
        applies: |f| f.pain_point_alignment >= 70.0,
        advice: "Reference the aligned pain points in messaging",
    },
    AdviceRule {
        applies: |f| f.data_completeness < 60.0,
        advice: "Enrich the profile before outreach",
    },
    AdviceRule {
        applies: |f| f.technology_fit >= 70.0,
        advice: "Highlight integration with the existing stack",
    },
    AdviceRule {
        applies: |f| f.mutual_connections >= 75.0,
        advice: "Request a warm introduction through mutual connections",
    },
    AdviceRule {
        applies: |f| f.role_match < 40.0,
        advice: "Confirm decision-making authority",
    },
];

pub fn recommendations(factors: &ScoringFactors) -> Vec<String> {
    ADVICE_RULES
        .iter()
        .filter(|rule| (rule.applies)(factors))
        .map(|rule| rule.advice.to_string())
        .collect()
}

pub fn next_actions(priority: LeadPriority, tier: LeadTier, factors: &ScoringFactors) -> Vec<String> {
    let mut actions = vec![match priority {
        LeadPriority::High => "Reach out within 24 hours",
        LeadPriority::Medium => "Add to nurture sequence",
        LeadPriority::Low => "Monitor for new signals",
    }
    .to_string()];
    if matches!(tier, LeadTier::APlus | LeadTier::A) {
        actions.push("Personalize outreach with company signals".to_string());
    }
    if factors.email_deliverability < 70.0 {
        actions.push("Find an alternative contact channel".to_string());
    }
    actions
}

/// "Composite 78.4 (B+). Strongest factors: ..." naming the three highest factors.
pub fn explanation(composite: f64, tier: LeadTier, factors: &ScoringFactors) -> String {
    let mut labelled = factors.labelled();
    labelled.sort_by(|a, b| b.1.total_cmp(&a.1));
    let top: Vec<String> = labelled
        .iter()
        .take(3)
        .map(|(label, value)| format!("{} ({:.0})", label, value))
        .collect();
    format!(
        "Composite {:.1} ({}). Strongest factors: {}.",
        composite,
        tier.as_str(),
        top.join(", ")
    )
}

// ============ Prioritization ============

fn behavioral_sum(lead: &CanonicalLead) -> f64 {
    lead.scoring.behavioral().iter().sum()
}

fn data_quality_sum(lead: &CanonicalLead) -> f64 {
    lead.scoring.data_quality().iter().sum()
}

/// Whether `a` belongs directly ahead of `b`.
///
/// Composite decides beyond the tie window, then behavioral signals beyond theirs,
/// then data quality.
pub fn ranks_before(a: &CanonicalLead, b: &CanonicalLead) -> bool {
    let gap = a.score.composite - b.score.composite;
    if gap.abs() > COMPOSITE_TIE_WINDOW {
        return gap > 0.0;
    }
    let behavioral = behavioral_sum(a) - behavioral_sum(b);
    if behavioral.abs() > BEHAVIORAL_TIE_WINDOW {
        return behavioral > 0.0;
    }
    data_quality_sum(a) > data_quality_sum(b)
}

/// Final ordering: composite descending with the tie-break cascade inside the window.
///
/// The windowed comparison is not transitive, so instead of `sort_by` this runs an
/// insertion pass over a composite-sorted list. Every adjacent pair ends up with the
/// later lead at most one tie window above the earlier one.
pub fn prioritize(leads: &mut [CanonicalLead]) {
    leads.sort_by(|a, b| {
        b.score
            .composite
            .total_cmp(&a.score.composite)
            .then_with(|| a.key.cmp(&b.key))
    });
    for i in 1..leads.len() {
        let mut j = i;
        while j > 0 && ranks_before(&leads[j], &leads[j - 1]) {
            leads.swap(j, j - 1);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawLeadCandidate;
    use chrono::Utc;
    use serde_json::json;

    fn bare_lead() -> CanonicalLead {
        CanonicalLead::from_candidate(&RawLeadCandidate::new("manual", Utc::now()))
    }

    #[test]
    fn evidence_free_factors_are_neutral() {
        let engine = ScoringEngine::new(&PipelineSettings::default());
        let f = engine.factors(&bare_lead(), &TargetingCriteria::default());
        let non_quality = [
            f.demographic().to_vec(),
            f.behavioral().to_vec(),
            f.company_intelligence().to_vec(),
            f.social_proof().to_vec(),
        ]
        .concat();
        assert!(non_quality.iter().all(|v| (40.0..=70.0).contains(v)), "{:?}", non_quality);
        assert_eq!(f.email_deliverability, UNKNOWN_DELIVERABILITY);
    }

    #[test]
    fn role_match_scales_with_token_coverage() {
        let targets = vec!["VP Engineering".to_string(), "CTO".to_string()];
        assert_eq!(role_match(Some("vp engineering"), &targets), 100.0);
        assert_eq!(role_match(Some("VP Sales"), &targets), 60.0);
        assert_eq!(role_match(Some("Accountant"), &targets), 20.0);
        assert_eq!(role_match(None, &targets), NEUTRAL);
        assert_eq!(role_match(Some("CTO"), &[]), NEUTRAL);
    }

    #[test]
    fn ordinal_scales() {
        let mut lead = bare_lead();
        lead.title = Some("Director of Sales".into());
        assert_eq!(seniority_match(&lead, &["vp".to_string()]), 75.0);
        lead.seniority = Some("c-level".into());
        assert_eq!(seniority_match(&lead, &["Senior".to_string()]), 0.0);

        assert_eq!(size_bucket("51-200"), Some(2));
        assert_eq!(size_bucket("5,000+"), Some(5));
        assert_eq!(size_bucket("12000"), Some(6));
        assert_eq!(company_size_match(Some("120"), &["201-500".into()]), 80.0);
        assert_eq!(company_size_match(Some("unknown"), &["201-500".into()]), NEUTRAL);
    }

    #[test]
    fn text_tiers() {
        let targets = vec!["San Francisco".to_string()];
        assert_eq!(tiered_text_match(Some("San Francisco, CA"), &targets, 60.0), 100.0);
        assert_eq!(tiered_text_match(Some("South San Jose"), &targets, 60.0), 60.0);
        assert_eq!(tiered_text_match(Some("Lisbon"), &targets, 60.0), 20.0);
    }

    #[test]
    fn facts_drive_behavioral_and_social_factors() {
        let mut lead = bare_lead();
        lead.facts.insert("social_posts_per_month".into(), json!(9));
        lead.facts.insert("months_in_role".into(), json!(40));
        lead.facts.insert("connections".into(), json!("650"));
        lead.facts.insert("mutual_connections".into(), json!(6));
        lead.facts.insert("content_engagement".into(), json!("Medium"));
        let f = ScoringEngine::new(&PipelineSettings::default())
            .factors(&lead, &TargetingCriteria::default());
        assert_eq!(f.social_activity, 90.0);
        assert_eq!(f.job_change_likelihood, 80.0);
        assert_eq!(f.network_quality, 85.0);
        assert_eq!(f.mutual_connections, 75.0);
        assert_eq!(f.content_engagement, 65.0);
    }

    #[test]
    fn company_factors() {
        let mut lead = bare_lead();
        lead.company.name = Some("Rival Inc".into());
        lead.company.tech_stack = vec!["Rust".into(), "Salesforce".into()];
        let competitors = vec!["Salesforce".to_string()];
        assert_eq!(competitive_fit(&lead, &competitors), 80.0);
        assert_eq!(competitive_fit(&lead, &["rival inc".to_string()]), 0.0);
        assert_eq!(competitive_fit(&lead, &[]), 60.0);
        assert_eq!(
            overlap_score(&lead.company.tech_stack, &["rust".into(), "go".into()]),
            60.0
        );
        assert_eq!(funding_stage(Some("Series-B")), 75.0);
        assert_eq!(signal_count_score(5, NEUTRAL), 100.0);
    }

    #[test]
    fn composite_tier_priority_and_confidence() {
        let engine = ScoringEngine::new(&PipelineSettings::default());
        let factors = ScoringFactors {
            role_match: 100.0,
            seniority_match: 100.0,
            company_size_match: 100.0,
            location_match: 100.0,
            industry_match: 100.0,
            social_activity: 90.0,
            content_engagement: 90.0,
            job_change_likelihood: 80.0,
            buying_signal_strength: 85.0,
            pain_point_alignment: 100.0,
            data_completeness: 100.0,
            data_freshness: 100.0,
            source_reliability: 95.0,
            email_deliverability: 93.0,
            growth_signals: 85.0,
            technology_fit: 100.0,
            funding_stage: 75.0,
            competitive_fit: 80.0,
            network_quality: 85.0,
            thought_leadership: 60.0,
            mutual_connections: 75.0,
            social_validation: 95.0,
        };
        let score = engine.score(&factors);
        // 25 + 0.30*89 + 0.15*97 + 0.20*85 + 0.10*78.75 = 91.125
        assert_eq!(score.composite, 91.1);
        assert_eq!(score.tier, LeadTier::APlus);
        assert_eq!(score.priority, LeadPriority::High);
        // (100 + 95) / 2 * 1.2 = 117 -> 100
        assert_eq!(score.confidence, 100.0);
        assert_eq!(score.next_actions[0], "Reach out within 24 hours");
        assert!(score
            .explanation
            .contains("Role match (100), Seniority match (100), Company size match (100)"));
        assert!(score
            .recommendations
            .contains(&"Time-sensitive: prioritize outreach now".to_string()));
        assert!(!score
            .recommendations
            .contains(&"Verify email before outreach".to_string()));
    }

    #[test]
    fn tiers_follow_cutoffs() {
        let engine = ScoringEngine::new(&PipelineSettings::default());
        let tiers: Vec<&str> = [95.0, 85.0, 75.0, 65.0, 55.0, 45.0, 10.0]
            .iter()
            .map(|c| engine.tier(*c).as_str())
            .collect();
        assert_eq!(tiers, vec!["A+", "A", "B+", "B", "C+", "C", "D"]);
        assert_eq!(priority(80.0, 60.0), LeadPriority::Medium);
        assert_eq!(priority(59.9, 90.0), LeadPriority::Low);
    }

    fn ranked(key: &str, composite: f64, behavioral: f64, data_quality: f64) -> CanonicalLead {
        let mut lead = bare_lead();
        lead.key = key.to_string();
        lead.score.composite = composite;
        lead.scoring.social_activity = behavioral;
        lead.scoring.data_completeness = data_quality;
        lead
    }

    #[test]
    fn prioritize_breaks_close_ties_on_behavior_then_quality() {
        let mut leads = vec![
            ranked("a", 80.0, 10.0, 0.0),
            ranked("b", 78.0, 40.0, 0.0),
            ranked("c", 60.0, 90.0, 0.0),
            ranked("d", 59.0, 85.0, 90.0),
        ];
        prioritize(&mut leads);
        let keys: Vec<&str> = leads.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "d", "c"]);
        for pair in leads.windows(2) {
            assert!(pair[0].score.composite + COMPOSITE_TIE_WINDOW >= pair[1].score.composite);
        }
    }
}
