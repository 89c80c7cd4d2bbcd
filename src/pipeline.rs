//! Research pipeline coordinator.
//!
//! Stages run strictly in order: discover, deduplicate, verify, enrich company, score,
//! prioritize, filter, save. Each stage is a barrier. Inside a stage every item runs
//! concurrently, and every external call goes through the shared [`CallLimiter`].
//!
//! Collaborator failures degrade the affected item and are recorded on it. A run only
//! fails when it is cancelled or when the final save fails.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use moka::future::Cache;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::dedup::{DedupEngine, DedupReport};
use crate::errors::AppError;
use crate::models::{
    CanonicalLead, CompanyFacts, CompanyProfile, DuplicateCluster, RawLeadCandidate,
    ResearchRequest, ResearchSummary, SimilarPair, TargetingCriteria, VerificationStatus,
};
use crate::normalize::non_empty;
use crate::providers::{
    CompanyIntelProvider, LeadStore, MailRouteResolver, SourceAdapter, VerificationProvider,
};
use crate::quality::QualityAssessor;
use crate::rate_limiter::CallLimiter;
use crate::scoring::{prioritize, ScoringEngine};
use crate::verification::VerificationAggregator;

const COMPANY_CACHE_CAPACITY: u64 = 10_000;
const COMPANY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Result of one research run.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub campaign_id: Uuid,
    /// Ranked, filtered and saved leads.
    pub leads: Vec<CanonicalLead>,
    pub summary: ResearchSummary,
    pub similar_pairs: Vec<SimilarPair>,
    pub clusters: Vec<DuplicateCluster>,
}

struct Discovery {
    candidates: Vec<RawLeadCandidate>,
    queried: Vec<String>,
    failed: Vec<String>,
}

/// Long-lived collaborators of the pipeline. Engines and caches are built per run.
pub struct ResearchCoordinator {
    sources: Vec<Arc<dyn SourceAdapter>>,
    verification_providers: Vec<Arc<dyn VerificationProvider>>,
    mail_routes: Arc<dyn MailRouteResolver>,
    company_intel: Option<Arc<dyn CompanyIntelProvider>>,
    store: Arc<dyn LeadStore>,
    limiter: Arc<CallLimiter>,
    settings: PipelineSettings,
    fixed_now: Option<DateTime<Utc>>,
}

impl ResearchCoordinator {
    pub fn new(
        settings: PipelineSettings,
        limiter: Arc<CallLimiter>,
        store: Arc<dyn LeadStore>,
        mail_routes: Arc<dyn MailRouteResolver>,
    ) -> Self {
        Self {
            sources: Vec::new(),
            verification_providers: Vec::new(),
            mail_routes,
            company_intel: None,
            store,
            limiter,
            settings,
            fixed_now: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SourceAdapter>) -> Self {
        self.sources.push(source);
        self
    }

    /// Providers are asked in the order they are added.
    pub fn with_verification_provider(mut self, provider: Arc<dyn VerificationProvider>) -> Self {
        self.verification_providers.push(provider);
        self
    }

    pub fn with_company_intel(mut self, provider: Arc<dyn CompanyIntelProvider>) -> Self {
        self.company_intel = Some(provider);
        self
    }

    /// Evaluate freshness against a fixed instant instead of the wall clock.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn store(&self) -> Arc<dyn LeadStore> {
        self.store.clone()
    }

    /// Run every stage for one request and hand the result to the lead store.
    pub async fn run_research(
        &self,
        request: &ResearchRequest,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome, AppError> {
        let campaign_id = request.campaign_id.unwrap_or_else(Uuid::new_v4);
        let now = self.fixed_now.unwrap_or_else(Utc::now);
        let criteria = &request.criteria;

        tracing::info!(
            "=== Research run {}: target {} leads, threshold {} ===",
            campaign_id,
            request.target_count,
            request.quality_threshold
        );

        // Stage 1: discovery
        let discovery = self
            .discover(criteria, request.target_count, &request.source_priorities, cancel)
            .await?;
        let candidates_discovered = discovery.candidates.len();

        // Stage 2: deduplication
        ensure_not_cancelled(cancel)?;
        let DedupReport {
            leads,
            similar_pairs,
            clusters,
        } = DedupEngine::new(&self.settings, &request.source_priorities)
            .deduplicate(discovery.candidates);
        let unique_leads = leads.len();

        // Stage 3: verification
        let leads = self.verify(leads, cancel).await?;

        // Stage 4: company enrichment
        let leads = self.enrich_companies(leads, cancel).await?;

        // Stage 5: quality and scoring
        ensure_not_cancelled(cancel)?;
        let assessor = QualityAssessor::new(&self.settings);
        let scorer = ScoringEngine::new(&self.settings);
        let mut leads: Vec<CanonicalLead> = leads
            .into_iter()
            .map(|mut lead| {
                lead.quality = assessor.assess(&lead, now);
                scorer.score_lead(&mut lead, criteria);
                lead
            })
            .collect();
        let degraded_items = leads
            .iter()
            .filter(|l| !l.enrichment_errors.is_empty())
            .count();

        // Stage 6: prioritize and filter
        prioritize(&mut leads);
        let before_filter = leads.len();
        leads.retain(|l| l.score.composite >= request.quality_threshold);
        leads.truncate(request.target_count);
        tracing::info!(
            "Filter: {} of {} leads at or above {} (target {})",
            leads.len(),
            before_filter,
            request.quality_threshold,
            request.target_count
        );

        // Stage 7: persistence
        ensure_not_cancelled(cancel)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::PipelineCancelled),
            saved = self.store.save_leads(campaign_id, &leads) => saved.map_err(|e| {
                tracing::error!("Failed to save {} leads for {}: {}", leads.len(), campaign_id, e);
                AppError::PersistenceFailure(e.to_string())
            })?,
        }

        let summary = ResearchSummary {
            candidates_discovered,
            unique_leads,
            similar_pairs: similar_pairs.len(),
            leads_returned: leads.len(),
            sources_queried: discovery.queried,
            sources_failed: discovery.failed,
            degraded_items,
        };
        tracing::info!(
            "✓ Research run {} complete: {} discovered, {} unique, {} returned, {} degraded",
            campaign_id,
            summary.candidates_discovered,
            summary.unique_leads,
            summary.leads_returned,
            summary.degraded_items
        );

        Ok(ResearchOutcome {
            campaign_id,
            leads,
            summary,
            similar_pairs,
            clusters,
        })
    }

    async fn discover(
        &self,
        criteria: &TargetingCriteria,
        target_count: usize,
        priorities: &BTreeMap<String, u8>,
        cancel: &CancellationToken,
    ) -> Result<Discovery, AppError> {
        let max_results = target_count.max(1) * self.settings.source_oversample.max(1);
        let priorities: BTreeMap<String, u8> = priorities
            .iter()
            .map(|(k, v)| (k.to_lowercase(), *v))
            .collect();

        let enabled: Vec<&Arc<dyn SourceAdapter>> = self
            .sources
            .iter()
            .filter(|s| {
                let switched_off = priorities.get(&s.name().to_lowercase()) == Some(&0);
                if switched_off || !s.is_enabled() {
                    tracing::debug!("Skipping disabled source {}", s.name());
                    false
                } else {
                    true
                }
            })
            .collect();

        tracing::info!(
            "Discovery: querying {} sources for up to {} candidates each",
            enabled.len(),
            max_results
        );

        let searches = enabled.iter().map(|source| async move {
            let outcome = self
                .limiter
                .run(cancel, source.search(criteria, max_results))
                .await;
            (source.name().to_string(), outcome)
        });
        let results = join_all(searches).await;

        let mut discovery = Discovery {
            candidates: Vec::new(),
            queried: Vec::new(),
            failed: Vec::new(),
        };
        for (name, outcome) in results {
            discovery.queried.push(name.clone());
            match outcome? {
                Ok(mut found) => {
                    found.truncate(max_results);
                    for candidate in found.iter_mut() {
                        if candidate.source.trim().is_empty() {
                            candidate.source = name.clone();
                        }
                    }
                    tracing::info!("Source {} returned {} candidates", name, found.len());
                    discovery.candidates.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Source {} contributed nothing: {}", name, e);
                    discovery.failed.push(name);
                }
            }
        }

        Ok(discovery)
    }

    async fn verify(
        &self,
        leads: Vec<CanonicalLead>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalLead>, AppError> {
        let aggregator = VerificationAggregator::new(
            self.verification_providers.clone(),
            self.mail_routes.clone(),
            self.settings.verification_weights,
            self.limiter.clone(),
        );

        let verified = join_all(leads.into_iter().map(|mut lead| {
            let aggregator = &aggregator;
            async move {
                let outcome = aggregator.verify_lead(&lead, cancel).await?;
                if outcome.synthesized && lead.email.is_none() {
                    lead.email = outcome.result.address.clone();
                }
                for error in outcome.errors {
                    lead.enrichment_errors.push(format!("verification: {}", error));
                }
                if outcome.result.status == VerificationStatus::Unknown {
                    tracing::debug!(
                        "Lead {} left unverified: {:?}",
                        lead.key,
                        outcome.result.reason
                    );
                }
                lead.verification = outcome.result;
                Ok::<_, AppError>(lead)
            }
        }))
        .await;

        let leads = verified.into_iter().collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            "Verification: {} valid of {} leads",
            leads
                .iter()
                .filter(|l| l.verification.status == VerificationStatus::Valid)
                .count(),
            leads.len()
        );
        Ok(leads)
    }

    async fn enrich_companies(
        &self,
        leads: Vec<CanonicalLead>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalLead>, AppError> {
        let Some(intel) = &self.company_intel else {
            tracing::debug!("No company intelligence provider, skipping enrichment");
            return Ok(leads);
        };

        let per_run: Cache<String, CompanyFacts> = Cache::builder()
            .max_capacity(COMPANY_CACHE_CAPACITY)
            .time_to_live(COMPANY_CACHE_TTL)
            .build();

        let enriched = join_all(leads.into_iter().map(|mut lead| {
            let per_run = &per_run;
            async move {
                let Some(name) = non_empty(&lead.company.name).map(str::to_string) else {
                    return Ok(lead);
                };
                let website = non_empty(&lead.company.website).map(str::to_string);
                let lookup = per_run
                    .try_get_with(name.to_lowercase(), async {
                        self.limiter
                            .run(cancel, intel.gather(&name, website.as_deref()))
                            .await
                            .and_then(|facts| facts)
                    })
                    .await;

                match lookup {
                    Ok(facts) => apply_company_facts(&mut lead.company, facts),
                    Err(e) if matches!(*e, AppError::PipelineCancelled) => {
                        return Err(AppError::PipelineCancelled)
                    }
                    Err(e) => {
                        tracing::warn!("Company enrichment failed for {}: {}", name, e);
                        lead.enrichment_errors
                            .push(format!("company_enrichment: {}", e));
                    }
                }
                Ok::<_, AppError>(lead)
            }
        }))
        .await;

        let leads = enriched.into_iter().collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            "Company enrichment: {} companies looked up for {} leads",
            per_run.entry_count(),
            leads.len()
        );
        Ok(leads)
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        Err(AppError::PipelineCancelled)
    } else {
        Ok(())
    }
}

/// Fill missing company scalars and add unseen list entries.
pub fn apply_company_facts(company: &mut CompanyProfile, facts: CompanyFacts) {
    let fill = |slot: &mut Option<String>, value: Option<String>| {
        if non_empty(slot).is_none() {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                *slot = Some(v);
            }
        }
    };
    fill(&mut company.website, facts.website);
    fill(&mut company.industry, facts.industry);
    fill(&mut company.size, facts.size);
    fill(&mut company.revenue, facts.revenue);
    fill(&mut company.funding_stage, facts.funding_stage);

    let union = |list: &mut Vec<String>, incoming: Vec<String>| {
        for item in incoming {
            let item = item.trim().to_string();
            if !item.is_empty() && !list.iter().any(|e| e.eq_ignore_ascii_case(&item)) {
                list.push(item);
            }
        }
    };
    union(&mut company.tech_stack, facts.tech_stack);
    union(&mut company.growth_signals, facts.growth_signals);
    union(&mut company.buying_signals, facts.buying_signals);
    union(&mut company.pain_points, facts.pain_points);
}
