use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::normalize::{non_empty, split_full_name};

/// Clamp a score into the closed range [0, 100].
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

// ============ Targeting ============

/// Ideal Customer Profile a research run is evaluated against.
///
/// Every list is optional. An empty list means "no preference", which makes the
/// matching factor fall back to its neutral value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingCriteria {
    pub job_titles: Vec<String>,
    /// Seniority levels such as "director" or "vp".
    pub seniority_levels: Vec<String>,
    /// Employee-count buckets such as "51-200".
    pub company_sizes: Vec<String>,
    pub locations: Vec<String>,
    pub industries: Vec<String>,
    pub technologies: Vec<String>,
    pub pain_points: Vec<String>,
    pub competitors: Vec<String>,
    /// Free keywords forwarded to source adapters.
    pub keywords: Vec<String>,
}

// ============ Discovery ============

/// One provider's view of a person/company pair.
///
/// Built once per provider response and never mutated; the merge stage consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLeadCandidate {
    /// Provenance tag naming the source that produced this record.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Used when the provider only supplies a single name string.
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub seniority: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_website: Option<String>,
    #[serde(default)]
    pub company_industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub company_revenue: Option<String>,
    #[serde(default)]
    pub company_funding_stage: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    /// Provider-specific facts (posting cadence, connection counts, ...).
    #[serde(default)]
    pub facts: BTreeMap<String, Value>,
    #[serde(default = "Utc::now")]
    pub retrieved_at: DateTime<Utc>,
}

impl RawLeadCandidate {
    /// Minimal candidate carrying only a source tag and a timestamp.
    pub fn new(source: impl Into<String>, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            first_name: None,
            last_name: None,
            full_name: None,
            email: None,
            phone: None,
            linkedin_url: None,
            location: None,
            title: None,
            seniority: None,
            department: None,
            company_name: None,
            company_website: None,
            company_industry: None,
            company_size: None,
            company_revenue: None,
            company_funding_stage: None,
            tech_stack: Vec::new(),
            facts: BTreeMap::new(),
            retrieved_at,
        }
    }

    /// Stable identifier derived from the candidate's identity fields.
    ///
    /// Two candidates with the same source and identity produce the same fingerprint,
    /// regardless of when they were fetched.
    pub fn fingerprint(&self) -> String {
        let (first, last) = self.names();
        let parts = [
            Some(self.source.as_str()),
            self.email.as_deref(),
            first.as_deref(),
            last.as_deref(),
            self.company_name.as_deref(),
            self.linkedin_url.as_deref(),
            self.phone.as_deref(),
            self.title.as_deref(),
        ];
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.unwrap_or("").trim().to_lowercase().as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(&hasher.finalize()[..8])
    }

    /// Digest over every field, retrieval time included.
    ///
    /// Orders candidates that share a fingerprint but differ elsewhere.
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.update(bytes),
            Err(_) => hasher.update(format!("{:?}", self).as_bytes()),
        }
        hex::encode(hasher.finalize())
    }

    /// First and last name, splitting `full_name` when the parts are missing.
    pub fn names(&self) -> (Option<String>, Option<String>) {
        let first = non_empty(&self.first_name).map(str::to_string);
        let last = non_empty(&self.last_name).map(str::to_string);
        if first.is_some() && last.is_some() {
            return (first, last);
        }
        let (split_first, split_last) = non_empty(&self.full_name)
            .map(split_full_name)
            .unwrap_or((None, None));
        (first.or(split_first), last.or(split_last))
    }
}

// ============ Company intelligence ============

/// Firmographic facts returned by a company intelligence provider. Partial results are normal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyFacts {
    pub website: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub revenue: Option<String>,
    pub funding_stage: Option<String>,
    pub tech_stack: Vec<String>,
    pub growth_signals: Vec<String>,
    pub buying_signals: Vec<String>,
    pub pain_points: Vec<String>,
}

impl CompanyFacts {
    pub fn is_empty(&self) -> bool {
        self == &CompanyFacts::default()
    }
}

/// Company side of a canonical lead.
///
/// Defaults: every scalar is `None` (unknown) and every list is empty (no evidence).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyProfile {
    pub name: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    /// Employee count or bucket as reported ("120", "51-200", "1000+").
    pub size: Option<String>,
    pub revenue: Option<String>,
    pub funding_stage: Option<String>,
    pub tech_stack: Vec<String>,
    pub growth_signals: Vec<String>,
    pub buying_signals: Vec<String>,
    pub pain_points: Vec<String>,
}

// ============ Verification ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Valid,
    Invalid,
    Risky,
    #[default]
    Unknown,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::Invalid => "invalid",
            VerificationStatus::Risky => "risky",
            VerificationStatus::Unknown => "unknown",
        }
    }
}

/// Combined reachability verdict for a lead's contact address.
///
/// Default: `Unknown` with a deliverability of 0 and every flag cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub deliverability: f64,
    pub is_disposable: bool,
    pub is_role_based: bool,
    pub is_free_provider: bool,
    pub is_catch_all: bool,
    /// Address the verdict applies to; set to the synthesized address when one was chosen.
    pub address: Option<String>,
    /// Name of the external provider that gave a definitive answer.
    pub provider: Option<String>,
    pub reason: Option<String>,
}

/// Answer of a single external verification provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderVerdict {
    pub status: VerificationStatus,
    pub score: f64,
    #[serde(default)]
    pub reason: Option<String>,
    /// The provider reports that the domain accepts any mailbox.
    #[serde(default)]
    pub catch_all: bool,
}

impl ProviderVerdict {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Unknown,
            score: 0.0,
            reason: Some(reason.into()),
            catch_all: false,
        }
    }
}

// ============ Quality ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub accuracy: f64,
    pub freshness: f64,
    pub consistency: f64,
    pub reliability: f64,
    pub overall_quality: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

// ============ Scoring ============

/// Factor sub-scores in [0, 100], grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringFactors {
    // demographic
    pub role_match: f64,
    pub seniority_match: f64,
    pub company_size_match: f64,
    pub location_match: f64,
    pub industry_match: f64,
    // behavioral
    pub social_activity: f64,
    pub content_engagement: f64,
    pub job_change_likelihood: f64,
    pub buying_signal_strength: f64,
    pub pain_point_alignment: f64,
    // data quality
    pub data_completeness: f64,
    pub data_freshness: f64,
    pub source_reliability: f64,
    pub email_deliverability: f64,
    // company intelligence
    pub growth_signals: f64,
    pub technology_fit: f64,
    pub funding_stage: f64,
    pub competitive_fit: f64,
    // social proof
    pub network_quality: f64,
    pub thought_leadership: f64,
    pub mutual_connections: f64,
    pub social_validation: f64,
}

impl ScoringFactors {
    pub fn demographic(&self) -> [f64; 5] {
        [
            self.role_match,
            self.seniority_match,
            self.company_size_match,
            self.location_match,
            self.industry_match,
        ]
    }

    pub fn behavioral(&self) -> [f64; 5] {
        [
            self.social_activity,
            self.content_engagement,
            self.job_change_likelihood,
            self.buying_signal_strength,
            self.pain_point_alignment,
        ]
    }

    pub fn data_quality(&self) -> [f64; 4] {
        [
            self.data_completeness,
            self.data_freshness,
            self.source_reliability,
            self.email_deliverability,
        ]
    }

    pub fn company_intelligence(&self) -> [f64; 4] {
        [
            self.growth_signals,
            self.technology_fit,
            self.funding_stage,
            self.competitive_fit,
        ]
    }

    pub fn social_proof(&self) -> [f64; 4] {
        [
            self.network_quality,
            self.thought_leadership,
            self.mutual_connections,
            self.social_validation,
        ]
    }

    /// Every factor with its human-readable label, in declaration order.
    pub fn labelled(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("Role match", self.role_match),
            ("Seniority match", self.seniority_match),
            ("Company size match", self.company_size_match),
            ("Location match", self.location_match),
            ("Industry match", self.industry_match),
            ("Social activity", self.social_activity),
            ("Content engagement", self.content_engagement),
            ("Job change likelihood", self.job_change_likelihood),
            ("Buying signals", self.buying_signal_strength),
            ("Pain point alignment", self.pain_point_alignment),
            ("Data completeness", self.data_completeness),
            ("Data freshness", self.data_freshness),
            ("Source reliability", self.source_reliability),
            ("Email deliverability", self.email_deliverability),
            ("Growth signals", self.growth_signals),
            ("Technology fit", self.technology_fit),
            ("Funding stage", self.funding_stage),
            ("Competitive fit", self.competitive_fit),
            ("Network quality", self.network_quality),
            ("Thought leadership", self.thought_leadership),
            ("Mutual connections", self.mutual_connections),
            ("Social validation", self.social_validation),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadTier {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[default]
    #[serde(rename = "D")]
    D,
}

impl LeadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadTier::APlus => "A+",
            LeadTier::A => "A",
            LeadTier::BPlus => "B+",
            LeadTier::B => "B",
            LeadTier::CPlus => "C+",
            LeadTier::C => "C",
            LeadTier::D => "D",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadPriority {
    High,
    Medium,
    #[default]
    Low,
}

impl LeadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadPriority::High => "high",
            LeadPriority::Medium => "medium",
            LeadPriority::Low => "low",
        }
    }
}

/// Arithmetic mean of each category's factors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryScores {
    pub demographic: f64,
    pub behavioral: f64,
    pub data_quality: f64,
    pub company_intelligence: f64,
    pub social_proof: f64,
}

/// Final relevance verdict for a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadScore {
    pub composite: f64,
    pub confidence: f64,
    pub tier: LeadTier,
    pub priority: LeadPriority,
    pub categories: CategoryScores,
    pub recommendations: Vec<String>,
    pub next_actions: Vec<String>,
    pub explanation: String,
}

// ============ Canonical lead ============

/// The merged, enriched record that flows through every stage after discovery.
///
/// Defaults for optional fields: identity and professional fields are `None`,
/// company lists are empty, the quality/verification/scoring records start at their
/// `Default` (all zero, status `unknown`, tier `D`) until their stage fills them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalLead {
    /// Fingerprint of the candidate that seeded this record.
    pub key: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub department: Option<String>,
    pub company: CompanyProfile,
    #[serde(default)]
    pub facts: BTreeMap<String, Value>,
    /// Provenance. Never empty, never shrinks.
    pub sources: BTreeSet<String>,
    /// Fingerprints of every candidate absorbed into this record, sorted.
    #[serde(default)]
    pub merged_from: Vec<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub quality: QualityMetrics,
    #[serde(default)]
    pub verification: VerificationResult,
    #[serde(default)]
    pub scoring: ScoringFactors,
    #[serde(default)]
    pub score: LeadScore,
    /// One entry per stage that fell back to defaults for this lead.
    #[serde(default)]
    pub enrichment_errors: Vec<String>,
}

impl CanonicalLead {
    /// Seed a canonical record from a single candidate.
    pub fn from_candidate(candidate: &RawLeadCandidate) -> Self {
        let key = candidate.fingerprint();
        let (first_name, last_name) = candidate.names();
        let owned = |v: &Option<String>| non_empty(v).map(str::to_string);

        Self {
            key: key.clone(),
            first_name,
            last_name,
            email: owned(&candidate.email).map(|e| e.to_lowercase()),
            phone: owned(&candidate.phone).map(|p| crate::normalize::normalize_phone(&p)),
            linkedin_url: owned(&candidate.linkedin_url),
            location: owned(&candidate.location),
            title: owned(&candidate.title),
            seniority: owned(&candidate.seniority).map(|s| s.to_lowercase()),
            department: owned(&candidate.department),
            company: CompanyProfile {
                name: owned(&candidate.company_name),
                website: owned(&candidate.company_website),
                industry: owned(&candidate.company_industry),
                size: owned(&candidate.company_size),
                revenue: owned(&candidate.company_revenue),
                funding_stage: owned(&candidate.company_funding_stage),
                tech_stack: candidate
                    .tech_stack
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
                ..CompanyProfile::default()
            },
            facts: candidate.facts.clone(),
            sources: BTreeSet::from([candidate.source.trim().to_lowercase()]),
            merged_from: vec![key],
            last_updated: candidate.retrieved_at,
            quality: QualityMetrics::default(),
            verification: VerificationResult::default(),
            scoring: ScoringFactors::default(),
            score: LeadScore::default(),
            enrichment_errors: Vec::new(),
        }
    }

    /// "First Last", or whichever part exists.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first_name, &self.last_name]
            .into_iter()
            .filter_map(non_empty)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Numeric fact lookup, accepting numbers or numeric strings.
    pub fn fact_number(&self, key: &str) -> Option<f64> {
        match self.facts.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Textual fact lookup, lowercased.
    pub fn fact_text(&self, key: &str) -> Option<String> {
        match self.facts.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_lowercase()),
            _ => None,
        }
    }
}

// ============ Dedup audit ============

/// Pair of records whose similarity crossed the audit threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPair {
    pub lead_key: String,
    pub candidate_key: String,
    pub score: u32,
    pub merged: bool,
}

/// Candidates merged into one canonical record during a dedup pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub canonical_key: String,
    pub members: Vec<String>,
}

// ============ API Request/Response Models ============

/// Request payload for a research run.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchRequest {
    /// Campaign the results are saved under. A new one is created when absent.
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
    #[serde(default)]
    pub criteria: TargetingCriteria,
    pub target_count: usize,
    #[serde(default)]
    pub quality_threshold: f64,
    /// Source name to priority (higher first). Priority 0 disables a source.
    #[serde(default)]
    pub source_priorities: BTreeMap<String, u8>,
}

/// Counters describing what happened during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub candidates_discovered: usize,
    pub unique_leads: usize,
    pub similar_pairs: usize,
    pub leads_returned: usize,
    pub sources_queried: Vec<String>,
    pub sources_failed: Vec<String>,
    pub degraded_items: usize,
}

/// Response payload for a research run.
#[derive(Debug, Serialize)]
pub struct ResearchResponse {
    pub success: bool,
    pub campaign_id: Uuid,
    pub summary: ResearchSummary,
    pub leads: Vec<CanonicalLead>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> RawLeadCandidate {
        let mut c = RawLeadCandidate::new("Apollo", Utc::now());
        c.full_name = Some("Ada Lovelace".into());
        c.email = Some("Ada@Analytical.io".into());
        c.company_name = Some("Analytical Engines".into());
        c
    }

    #[test]
    fn fingerprint_ignores_retrieval_time_and_case() {
        let a = candidate();
        let mut b = candidate();
        b.retrieved_at = a.retrieved_at - chrono::Duration::days(3);
        b.email = Some("ada@analytical.io".into());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn fingerprint_differs_by_source() {
        let a = candidate();
        let mut b = candidate();
        b.source = "linkedin".into();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn canonical_lead_from_candidate_splits_name_and_tags_source() {
        let lead = CanonicalLead::from_candidate(&candidate());
        assert_eq!(lead.first_name.as_deref(), Some("Ada"));
        assert_eq!(lead.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(lead.email.as_deref(), Some("ada@analytical.io"));
        assert!(lead.sources.contains("apollo"));
        assert_eq!(lead.merged_from, vec![lead.key.clone()]);
        assert_eq!(lead.verification.status, VerificationStatus::Unknown);
        assert_eq!(lead.score.tier, LeadTier::D);
    }

    #[test]
    fn facts_accept_numbers_and_numeric_strings() {
        let mut c = candidate();
        c.facts.insert("connections".into(), serde_json::json!(512));
        c.facts.insert("mutual_connections".into(), serde_json::json!("7"));
        c.facts.insert("content_engagement".into(), serde_json::json!("High"));
        let lead = CanonicalLead::from_candidate(&c);
        assert_eq!(lead.fact_number("connections"), Some(512.0));
        assert_eq!(lead.fact_number("mutual_connections"), Some(7.0));
        assert_eq!(lead.fact_text("content_engagement").as_deref(), Some("high"));
        assert_eq!(lead.fact_number("missing"), None);
    }

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn tier_serializes_as_letter_grade() {
        assert_eq!(serde_json::to_string(&LeadTier::APlus).unwrap(), "\"A+\"");
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Risky).unwrap(),
            "\"risky\""
        );
    }
}
