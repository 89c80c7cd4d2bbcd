//! Data quality assessment for canonical leads.
//!
//! Produces completeness, accuracy, freshness, consistency and reliability scores, the
//! weighted overall quality, and the issue/recommendation lists from a fixed rule table.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::config::PipelineSettings;
use crate::models::{clamp_score, CanonicalLead, QualityMetrics};
use crate::normalize::{
    digits_only, domains_correlate, email_domain, name_similarity, non_empty, profile_slug_name,
    tokens, website_host,
};
use crate::verification::is_valid_email_format;

/// Company-name tokens that mark synthetic or placeholder records.
const PLACEHOLDER_TOKENS: [&str; 7] = [
    "test",
    "example",
    "sample",
    "fake",
    "demo",
    "dummy",
    "placeholder",
];

static PROFILE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://([a-z]{2,3}\.)?(www\.)?linkedin\.com/(in|pub)/[a-z0-9\-_%.]+/?$")
        .expect("profile url pattern is valid")
});

static LOOSE_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9\s\-().]{7,20}$").expect("phone pattern is valid")
});

/// Ordinal seniority scale, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeniorityLevel {
    Entry,
    Senior,
    Manager,
    Director,
    Vp,
    CLevel,
}

impl SeniorityLevel {
    const ALL_DESCENDING: [SeniorityLevel; 6] = [
        SeniorityLevel::CLevel,
        SeniorityLevel::Vp,
        SeniorityLevel::Director,
        SeniorityLevel::Manager,
        SeniorityLevel::Senior,
        SeniorityLevel::Entry,
    ];

    /// Parse a stated level such as "C-Level", "vice president" or "Director".
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "c level" | "c suite" | "executive" | "cxo" | "owner" | "founder" => {
                Some(SeniorityLevel::CLevel)
            }
            "vp" | "vice president" | "svp" | "evp" => Some(SeniorityLevel::Vp),
            "director" | "head" => Some(SeniorityLevel::Director),
            "manager" | "management" => Some(SeniorityLevel::Manager),
            "senior" | "lead" | "principal" | "staff" => Some(SeniorityLevel::Senior),
            "entry" | "junior" | "associate" | "intern" | "individual contributor" => {
                Some(SeniorityLevel::Entry)
            }
            _ => None,
        }
    }

    /// Title keywords expected for this level.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            SeniorityLevel::CLevel => &[
                "chief", "ceo", "cto", "cfo", "coo", "cmo", "cio", "ciso", "founder",
                "cofounder", "president", "owner",
            ],
            SeniorityLevel::Vp => &["vp", "vice president", "svp", "evp"],
            SeniorityLevel::Director => &["director", "head"],
            SeniorityLevel::Manager => &["manager", "lead", "supervisor"],
            SeniorityLevel::Senior => &["senior", "sr", "principal", "staff", "lead"],
            SeniorityLevel::Entry => &["junior", "jr", "associate", "intern", "assistant", "analyst"],
        }
    }

    /// Whether `title` contains one of this level's keywords.
    pub fn matches_title(&self, title: &str) -> bool {
        let lowered = title.to_lowercase();
        let words = tokens(title);
        self.keywords().iter().any(|k| {
            if k.contains(' ') {
                lowered.contains(k)
            } else {
                words.contains(*k)
            }
        })
    }

    /// Highest level whose keywords appear in the title.
    pub fn infer_from_title(title: &str) -> Option<Self> {
        Self::ALL_DESCENDING
            .into_iter()
            .find(|level| level.matches_title(title))
    }

    pub fn rank(&self) -> i32 {
        *self as i32
    }
}

struct QualityRule {
    applies: fn(&QualityMetrics, &CanonicalLead) -> bool,
    issue: &'static str,
    recommendation: &'static str,
}

const QUALITY_RULES: [QualityRule; 8] = [
    QualityRule {
        applies: |m, _| m.completeness < 70.0,
        issue: "Incomplete profile",
        recommendation: "Enrich from additional sources",
    },
    QualityRule {
        applies: |m, _| m.accuracy < 70.0,
        issue: "Possible inaccurate contact data",
        recommendation: "Validate email, phone and URLs against a primary source",
    },
    QualityRule {
        applies: |m, _| m.freshness < 60.0,
        issue: "Stale record",
        recommendation: "Refresh the record from its source",
    },
    QualityRule {
        applies: |m, _| m.consistency < 80.0,
        issue: "Conflicting fields across sources",
        recommendation: "Review email domain, profile name and seniority for conflicts",
    },
    QualityRule {
        applies: |m, _| m.reliability < 60.0,
        issue: "Low-trust provenance",
        recommendation: "Corroborate with a higher-trust source",
    },
    QualityRule {
        applies: |_, lead| non_empty(&lead.email).is_none(),
        issue: "Missing email address",
        recommendation: "Synthesize and verify a likely address",
    },
    QualityRule {
        applies: |_, lead| lead.sources.len() < 2,
        issue: "Single-source record",
        recommendation: "Cross-check with a second provider",
    },
    QualityRule {
        applies: |m, _| m.overall_quality < 50.0,
        issue: "Low overall quality",
        recommendation: "Deprioritize until enriched",
    },
];

pub struct QualityAssessor {
    settings: PipelineSettings,
}

impl QualityAssessor {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Compute every quality metric for `lead` as of `now`.
    pub fn assess(&self, lead: &CanonicalLead, now: DateTime<Utc>) -> QualityMetrics {
        let mut metrics = QualityMetrics {
            completeness: completeness(lead),
            accuracy: accuracy(lead),
            freshness: freshness(lead.last_updated, now),
            consistency: consistency(lead),
            reliability: self.reliability(lead),
            ..QualityMetrics::default()
        };
        metrics.overall_quality = clamp_score(
            (0.30 * metrics.completeness
                + 0.25 * metrics.accuracy
                + 0.20 * metrics.freshness
                + 0.15 * metrics.consistency
                + 0.10 * metrics.reliability)
                .round(),
        );

        for rule in QUALITY_RULES.iter() {
            if (rule.applies)(&metrics, lead) {
                metrics.issues.push(rule.issue.to_string());
                metrics.recommendations.push(rule.recommendation.to_string());
            }
        }

        metrics
    }

    /// Average trust of the provenance set plus a corroboration bonus.
    pub fn reliability(&self, lead: &CanonicalLead) -> f64 {
        if lead.sources.is_empty() {
            return clamp_score(self.settings.default_source_trust);
        }
        let count = lead.sources.len() as f64;
        let average = lead
            .sources
            .iter()
            .map(|s| self.settings.trust_for(s))
            .sum::<f64>()
            / count;
        let bonus = (5.0 * count).min(15.0);
        clamp_score(average + bonus)
    }
}

/// 70% required fields, 30% optional fields.
pub fn completeness(lead: &CanonicalLead) -> f64 {
    let required = [
        &lead.first_name,
        &lead.last_name,
        &lead.email,
        &lead.title,
        &lead.company.name,
    ];
    let optional = [
        &lead.phone,
        &lead.linkedin_url,
        &lead.location,
        &lead.seniority,
        &lead.department,
        &lead.company.website,
        &lead.company.industry,
        &lead.company.size,
    ];
    let filled = |fields: &[&Option<String>]| {
        fields.iter().filter(|f| non_empty(f).is_some()).count() as f64 / fields.len() as f64
    };
    clamp_score((70.0 * filled(&required) + 30.0 * filled(&optional)).round())
}

pub fn is_placeholder_company(name: &str) -> bool {
    let words = tokens(name);
    PLACEHOLDER_TOKENS.iter().any(|t| words.contains(*t))
}

pub fn is_valid_profile_url(url: &str) -> bool {
    PROFILE_URL_RE.is_match(url.trim())
}

pub fn is_valid_website(website: &str) -> bool {
    let trimmed = website.trim();
    if trimmed.contains("://") && !(trimmed.starts_with("http://") || trimmed.starts_with("https://"))
    {
        return false;
    }
    matches!(website_host(trimmed), Some(host) if host.contains('.') && !host.ends_with('.'))
}

pub fn is_plausible_phone(phone: &str) -> bool {
    LOOSE_PHONE_RE.is_match(phone.trim()) && digits_only(phone).len() >= 7
}

/// 80 minus penalties for malformed or suspicious fields.
pub fn accuracy(lead: &CanonicalLead) -> f64 {
    let mut score = 80.0;

    if let Some(email) = non_empty(&lead.email) {
        if !is_valid_email_format(email) {
            score -= 20.0;
        }
    }
    if let Some(url) = non_empty(&lead.linkedin_url) {
        if !is_valid_profile_url(url) {
            score -= 10.0;
        }
    }
    if let Some(website) = non_empty(&lead.company.website) {
        if !is_valid_website(website) {
            score -= 10.0;
        }
    }
    for name in [&lead.first_name, &lead.last_name] {
        if non_empty(name).map_or(0, |n| n.chars().count()) < 2 {
            score -= 15.0;
        }
    }
    if let Some(company) = non_empty(&lead.company.name) {
        if is_placeholder_company(company) {
            score -= 30.0;
        }
    }
    if let Some(phone) = non_empty(&lead.phone) {
        if !is_plausible_phone(phone) {
            score -= 10.0;
        }
    }

    clamp_score(score)
}

/// Step function of the record's age.
pub fn freshness(last_updated: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - last_updated).num_seconds().max(0) as f64 / 86_400.0;
    match age_days {
        d if d <= 1.0 => 100.0,
        d if d <= 7.0 => 90.0,
        d if d <= 30.0 => 75.0,
        d if d <= 90.0 => 60.0,
        d if d <= 180.0 => 40.0,
        _ => 20.0,
    }
}

/// 100 minus penalties for fields that contradict each other.
pub fn consistency(lead: &CanonicalLead) -> f64 {
    let mut score = 100.0;

    if let (Some(email), Some(website)) = (non_empty(&lead.email), non_empty(&lead.company.website))
    {
        let comparable = email_domain(email).is_some() && website_host(website).is_some();
        if comparable && !domains_correlate(email, website) {
            score -= 15.0;
        }
    }

    if let (Some(url), Some(full_name)) = (non_empty(&lead.linkedin_url), lead.full_name()) {
        if let Some(slug_name) = profile_slug_name(url) {
            if name_similarity(&slug_name, &full_name) < 0.6 {
                score -= 20.0;
            }
        }
    }

    if let (Some(level), Some(title)) = (non_empty(&lead.seniority), non_empty(&lead.title)) {
        if let Some(level) = SeniorityLevel::parse(level) {
            if !level.matches_title(title) {
                score -= 10.0;
            }
        }
    }

    clamp_score(score)
}
