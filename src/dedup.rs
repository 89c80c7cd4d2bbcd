//! Greedy online clustering of raw candidates into canonical leads.
//!
//! Candidates are visited in arrival order. Each one is scored against every canonical
//! record accepted so far; it merges into the best match when that score is above the
//! merge threshold and becomes a new record otherwise. An exact email match is an
//! identity match and always merges, whatever the rest of the score.
//!
//! Arrival order is made deterministic before clustering: candidates are ordered by
//! source priority (highest first), then by fingerprint, then by a digest of their full
//! content. Concurrent discovery therefore cannot change which value wins a field, and any
//! permutation of the same candidate set yields the same canonical records.
//!
//! Candidates sharing a fingerprint (same source, same identity) are folded into one record
//! before clustering, so every canonical lead carries a distinct key.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::config::PipelineSettings;
use crate::models::{
    CanonicalLead, CompanyProfile, DuplicateCluster, RawLeadCandidate, SimilarPair,
    VerificationStatus,
};
use crate::normalize::{digits_only, name_similarity, non_empty, same_text};

/// Minimum digits for a phone number to take part in matching.
const MIN_PHONE_DIGITS: usize = 7;

/// Output of one dedup pass.
#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    pub leads: Vec<CanonicalLead>,
    /// Every pair that crossed the audit threshold, merged or not.
    pub similar_pairs: Vec<SimilarPair>,
    /// Canonical records built from more than one candidate.
    pub clusters: Vec<DuplicateCluster>,
}

pub struct DedupEngine {
    merge_threshold: u32,
    similar_threshold: u32,
    source_priorities: BTreeMap<String, u8>,
}

impl DedupEngine {
    pub fn new(settings: &PipelineSettings, source_priorities: &BTreeMap<String, u8>) -> Self {
        Self {
            merge_threshold: settings.merge_threshold,
            similar_threshold: settings.similar_threshold,
            source_priorities: source_priorities
                .iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect(),
        }
    }

    fn priority_of(&self, source: &str) -> u8 {
        self.source_priorities
            .get(&source.trim().to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Cluster and merge candidates into canonical leads.
    pub fn deduplicate(&self, candidates: Vec<RawLeadCandidate>) -> DedupReport {
        let total = candidates.len();
        let mut ordered: Vec<(Reverse<u8>, String, String, RawLeadCandidate)> = candidates
            .into_iter()
            .map(|c| {
                (
                    Reverse(self.priority_of(&c.source)),
                    c.fingerprint(),
                    c.content_digest(),
                    c,
                )
            })
            .collect();
        ordered.sort_by(|a, b| (&a.0, &a.1, &a.2).cmp(&(&b.0, &b.1, &b.2)));

        // The fingerprint covers the source, so equal fingerprints are adjacent.
        let mut arrivals: Vec<(String, CanonicalLead)> = Vec::with_capacity(ordered.len());
        for (_, fingerprint, _, candidate) in ordered {
            let incoming = CanonicalLead::from_candidate(&candidate);
            match arrivals.last_mut() {
                Some((last, lead)) if *last == fingerprint => {
                    tracing::debug!(
                        "Folding repeated candidate {} from {}",
                        fingerprint,
                        candidate.source
                    );
                    merge_into(lead, incoming);
                }
                _ => arrivals.push((fingerprint, incoming)),
            }
        }

        let mut report = DedupReport::default();

        for (fingerprint, incoming) in arrivals {
            let mut best: Option<(usize, bool, u32)> = None;
            for (idx, existing) in report.leads.iter().enumerate() {
                let score = similarity(existing, &incoming);
                let identity = is_identity_match(existing, &incoming);
                if score > self.similar_threshold {
                    report.similar_pairs.push(SimilarPair {
                        lead_key: existing.key.clone(),
                        candidate_key: fingerprint.clone(),
                        score,
                        merged: false,
                    });
                }
                // Strict comparison keeps the earliest record on ties.
                if best.map_or(true, |(_, i, s)| (identity, score) > (i, s)) {
                    best = Some((idx, identity, score));
                }
            }

            match best {
                Some((idx, identity, score)) if identity || score > self.merge_threshold => {
                    tracing::debug!(
                        "Merging candidate {} into {} (similarity {})",
                        fingerprint,
                        report.leads[idx].key,
                        score
                    );
                    let target_key = report.leads[idx].key.clone();
                    if let Some(pair) = report
                        .similar_pairs
                        .iter_mut()
                        .rev()
                        .find(|p| p.candidate_key == fingerprint && p.lead_key == target_key)
                    {
                        pair.merged = true;
                    }
                    merge_into(&mut report.leads[idx], incoming);
                }
                _ => report.leads.push(incoming),
            }
        }

        report.clusters = report
            .leads
            .iter()
            .filter(|lead| lead.merged_from.len() > 1)
            .map(|lead| DuplicateCluster {
                canonical_key: lead.key.clone(),
                members: lead.merged_from.clone(),
            })
            .collect();

        tracing::info!(
            "Dedup: {} candidates -> {} canonical leads ({} clusters, {} similar pairs)",
            total,
            report.leads.len(),
            report.clusters.len(),
            report.similar_pairs.len()
        );

        report
    }
}

/// Pairwise similarity in [0, 100]. Missing fields on either side add nothing.
pub fn similarity(a: &CanonicalLead, b: &CanonicalLead) -> u32 {
    let mut score = 0u32;

    if same_text(&a.email, &b.email) {
        score += 50;
    }

    if let (Some(name_a), Some(name_b)) = (a.full_name(), b.full_name()) {
        let ratio = name_similarity(&name_a, &name_b);
        if ratio > 0.8 {
            score += 30;
        } else if ratio > 0.6 {
            score += 15;
        }
    }

    if let (Some(url_a), Some(url_b)) = (non_empty(&a.linkedin_url), non_empty(&b.linkedin_url)) {
        if url_a.trim_end_matches('/') == url_b.trim_end_matches('/') {
            score += 40;
        }
    }

    if same_text(&a.company.name, &b.company.name) {
        score += 10;
        if same_text(&a.title, &b.title) {
            score += 15;
        }
    }

    if let (Some(phone_a), Some(phone_b)) = (non_empty(&a.phone), non_empty(&b.phone)) {
        let (digits_a, digits_b) = (digits_only(phone_a), digits_only(phone_b));
        if digits_a.len() >= MIN_PHONE_DIGITS && digits_a == digits_b {
            score += 25;
        }
    }

    score.min(100)
}

/// Same contact address on both sides.
pub fn is_identity_match(a: &CanonicalLead, b: &CanonicalLead) -> bool {
    same_text(&a.email, &b.email)
}

/// Keep `slot` unless it is empty and `incoming` has content.
fn fill(slot: &mut Option<String>, incoming: Option<String>) {
    if non_empty(slot).is_none() {
        if let Some(value) = incoming.filter(|v| !v.trim().is_empty()) {
            *slot = Some(value);
        }
    }
}

fn fill_list(slot: &mut Vec<String>, incoming: Vec<String>) {
    if slot.is_empty() {
        *slot = incoming;
    }
}

fn fill_company(existing: &mut CompanyProfile, incoming: CompanyProfile) {
    fill(&mut existing.name, incoming.name);
    fill(&mut existing.website, incoming.website);
    fill(&mut existing.industry, incoming.industry);
    fill(&mut existing.size, incoming.size);
    fill(&mut existing.revenue, incoming.revenue);
    fill(&mut existing.funding_stage, incoming.funding_stage);
    fill_list(&mut existing.tech_stack, incoming.tech_stack);
    fill_list(&mut existing.growth_signals, incoming.growth_signals);
    fill_list(&mut existing.buying_signals, incoming.buying_signals);
    fill_list(&mut existing.pain_points, incoming.pain_points);
}

/// Merge `incoming` into `existing` field by field.
///
/// Populated values are never overwritten, provenance is unioned, already-computed
/// quality and verification scores take the maximum, and the absorbed fingerprints
/// are appended to the lineage.
pub fn merge_into(existing: &mut CanonicalLead, incoming: CanonicalLead) {
    fill(&mut existing.first_name, incoming.first_name);
    fill(&mut existing.last_name, incoming.last_name);
    fill(&mut existing.email, incoming.email);
    fill(&mut existing.phone, incoming.phone);
    fill(&mut existing.linkedin_url, incoming.linkedin_url);
    fill(&mut existing.location, incoming.location);
    fill(&mut existing.title, incoming.title);
    fill(&mut existing.seniority, incoming.seniority);
    fill(&mut existing.department, incoming.department);
    fill_company(&mut existing.company, incoming.company);

    for (key, value) in incoming.facts {
        existing.facts.entry(key).or_insert(value);
    }

    existing.sources.extend(incoming.sources);

    existing.merged_from.extend(incoming.merged_from);
    existing.merged_from.sort();
    existing.merged_from.dedup();

    if incoming.last_updated > existing.last_updated {
        existing.last_updated = incoming.last_updated;
    }

    let q = &mut existing.quality;
    let iq = &incoming.quality;
    q.completeness = q.completeness.max(iq.completeness);
    q.accuracy = q.accuracy.max(iq.accuracy);
    q.freshness = q.freshness.max(iq.freshness);
    q.consistency = q.consistency.max(iq.consistency);
    q.reliability = q.reliability.max(iq.reliability);
    q.overall_quality = q.overall_quality.max(iq.overall_quality);

    let v = &mut existing.verification;
    v.deliverability = v.deliverability.max(incoming.verification.deliverability);
    if v.status == VerificationStatus::Unknown {
        v.status = incoming.verification.status;
    }

    for error in incoming.enrichment_errors {
        if !existing.enrichment_errors.contains(&error) {
            existing.enrichment_errors.push(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candidate(source: &str) -> RawLeadCandidate {
        RawLeadCandidate::new(source, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    fn lead(f: impl FnOnce(&mut RawLeadCandidate)) -> CanonicalLead {
        let mut c = candidate("apollo");
        f(&mut c);
        CanonicalLead::from_candidate(&c)
    }

    fn engine() -> DedupEngine {
        DedupEngine::new(&PipelineSettings::default(), &BTreeMap::new())
    }

    #[test]
    fn similarity_components() {
        let email = |c: &mut RawLeadCandidate| c.email = Some("Ada@Acme.com".into());
        assert_eq!(similarity(&lead(email), &lead(|c| c.email = Some("ada@acme.com".into()))), 50);

        let name = |c: &mut RawLeadCandidate| c.full_name = Some("Ada Lovelace".into());
        assert_eq!(similarity(&lead(name), &lead(name)), 30);

        let url = |c: &mut RawLeadCandidate| {
            c.linkedin_url = Some("https://linkedin.com/in/ada".into())
        };
        assert_eq!(similarity(&lead(url), &lead(url)), 40);

        let company = |c: &mut RawLeadCandidate| {
            c.company_name = Some("Acme".into());
            c.title = Some("CTO".into());
        };
        assert_eq!(similarity(&lead(company), &lead(company)), 25);

        let phone_a = |c: &mut RawLeadCandidate| c.phone = Some("(415) 555-0100".into());
        let phone_b = |c: &mut RawLeadCandidate| c.phone = Some("415.555.0100".into());
        assert_eq!(similarity(&lead(phone_a), &lead(phone_b)), 25);
    }

    #[test]
    fn similar_names_score_partially() {
        let a = lead(|c| c.full_name = Some("Jonathan Smith".into()));
        let b = lead(|c| c.full_name = Some("Jonathon Smyth".into()));
        let score = similarity(&a, &b);
        assert!(score == 15 || score == 30, "got {}", score);
    }

    #[test]
    fn similarity_caps_at_100() {
        let full = |c: &mut RawLeadCandidate| {
            c.email = Some("ada@acme.com".into());
            c.full_name = Some("Ada Lovelace".into());
            c.linkedin_url = Some("https://linkedin.com/in/ada".into());
            c.company_name = Some("Acme".into());
            c.title = Some("CTO".into());
            c.phone = Some("+1 415 555 0100".into());
        };
        assert_eq!(similarity(&lead(full), &lead(full)), 100);
    }

    #[test]
    fn missing_fields_never_penalize() {
        let a = lead(|c| c.email = Some("ada@acme.com".into()));
        let b = lead(|c| {
            c.email = Some("ada@acme.com".into());
            c.company_name = Some("Acme".into());
        });
        assert_eq!(similarity(&a, &b), 50);
    }

    #[test]
    fn similar_but_below_merge_threshold_is_only_flagged() {
        // name (30) + company and role (25) + phone (25) = 80
        let mut a = candidate("apollo");
        a.full_name = Some("Ada Lovelace".into());
        a.company_name = Some("Acme".into());
        a.title = Some("CTO".into());
        a.phone = Some("415 555 0100".into());
        let mut b = a.clone();
        b.source = "hunter".into();

        let report = engine().deduplicate(vec![a, b]);
        assert_eq!(report.leads.len(), 2);
        assert_eq!(report.similar_pairs.len(), 1);
        assert_eq!(report.similar_pairs[0].score, 80);
        assert!(!report.similar_pairs[0].merged);
    }

    #[test]
    fn shared_email_alone_is_an_identity_merge() {
        let mut a = candidate("apollo");
        a.email = Some("ada@acme.com".into());
        let mut b = candidate("hunter");
        b.email = Some("ADA@acme.com".into());
        b.company_name = Some("Acme".into());

        let report = engine().deduplicate(vec![a, b]);
        assert_eq!(report.leads.len(), 1);
        assert_eq!(report.leads[0].company.name.as_deref(), Some("Acme"));
        assert_eq!(report.leads[0].sources.len(), 2);
    }

    #[test]
    fn shared_email_and_name_merge_with_fill_if_missing() {
        let mut a = candidate("apollo");
        a.email = Some("x@y.com".into());
        a.full_name = Some("Grace Hopper".into());
        let mut b = candidate("linkedin");
        b.email = Some("X@Y.com".into());
        b.full_name = Some("Grace Hopper".into());
        b.phone = Some("+1 415 555 0100".into());

        let report = engine().deduplicate(vec![a, b]);
        assert_eq!(report.leads.len(), 1);
        let merged = &report.leads[0];
        assert_eq!(merged.phone.as_deref(), Some("+14155550100"));
        assert_eq!(
            merged.sources.iter().cloned().collect::<Vec<_>>(),
            vec!["apollo".to_string(), "linkedin".to_string()]
        );
        assert_eq!(merged.merged_from.len(), 2);
        assert_eq!(report.clusters.len(), 1);
        assert!(report.similar_pairs[0].merged);
    }

    #[test]
    fn higher_priority_source_wins_conflicts() {
        let mut low = candidate("hunter");
        low.email = Some("ada@acme.com".into());
        low.full_name = Some("Ada Lovelace".into());
        low.title = Some("Engineer".into());
        let mut high = low.clone();
        high.source = "linkedin".into();
        high.title = Some("Chief Engineer".into());

        let priorities = BTreeMap::from([("linkedin".to_string(), 9), ("hunter".to_string(), 1)]);
        let engine = DedupEngine::new(&PipelineSettings::default(), &priorities);
        let report = engine.deduplicate(vec![low, high]);
        assert_eq!(report.leads.len(), 1);
        assert_eq!(report.leads[0].title.as_deref(), Some("Chief Engineer"));
    }

    #[test]
    fn merge_keeps_max_scores_and_latest_timestamp() {
        let mut a = lead(|c| c.email = Some("a@b.com".into()));
        a.quality.accuracy = 60.0;
        a.verification.deliverability = 20.0;
        let mut b = lead(|c| {
            c.source = "linkedin".into();
            c.retrieved_at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        });
        b.quality.accuracy = 80.0;
        b.quality.completeness = 10.0;
        b.verification.deliverability = 90.0;
        b.verification.status = VerificationStatus::Valid;

        merge_into(&mut a, b.clone());
        assert_eq!(a.quality.accuracy, 80.0);
        assert_eq!(a.quality.completeness, 10.0);
        assert_eq!(a.verification.deliverability, 90.0);
        assert_eq!(a.verification.status, VerificationStatus::Valid);
        assert_eq!(a.last_updated, b.last_updated);
        assert_eq!(a.email.as_deref(), Some("a@b.com"));
    }
}
