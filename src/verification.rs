//! Email verification: local format, DNS mail-route and cross-reference layers combined with
//! external providers into one deliverability verdict.
//!
//! Layer scores are averaged with the configured weights over the layers that produced a
//! result. External providers are asked in priority order and the first definitive answer
//! wins. Leads without an address get candidates synthesized from name patterns.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use moka::future::Cache;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::VerificationWeights;
use crate::errors::AppError;
use crate::models::{clamp_score, CanonicalLead, VerificationResult, VerificationStatus};
use crate::normalize::{domains_correlate, email_domain, mailbox_part, non_empty, website_host};
use crate::providers::{MailRoute, MailRouteResolver, VerificationProvider};
use crate::quality::is_valid_profile_url;
use crate::rate_limiter::CallLimiter;

// RFC 5322 simplified: local@domain.tld
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

const DISPOSABLE_DOMAINS: [&str; 12] = [
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "yopmail.com",
    "trashmail.com",
    "throwawaymail.com",
    "getnada.com",
    "sharklasers.com",
    "dispostable.com",
    "maildrop.cc",
];

const ROLE_MAILBOXES: [&str; 18] = [
    "info", "admin", "support", "sales", "contact", "hello", "office", "team", "marketing",
    "billing", "help", "noreply", "no-reply", "careers", "jobs", "hr", "webmaster", "postmaster",
];

const FREE_PROVIDERS: [&str; 17] = [
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "mail.com",
    "zoho.com",
    "yandex.com",
    "uol.com.br",
    "bol.com.br",
];

/// Mailbox patterns tried, in order, when a lead has no address.
pub const ADDRESS_PATTERNS: [&str; 7] = [
    "first.last",
    "first",
    "f.last",
    "first.l",
    "firstlast",
    "last.first",
    "first_last",
];

const DNS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const DNS_CACHE_CAPACITY: u64 = 10_000;

pub fn is_valid_email_format(email: &str) -> bool {
    let email = email.trim();
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

/// Static classification of an address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressTraits {
    pub well_formed: bool,
    pub disposable: bool,
    pub role_based: bool,
    pub free_provider: bool,
}

pub fn classify_address(email: &str) -> AddressTraits {
    let email = email.trim().to_lowercase();
    let domain = email_domain(&email).unwrap_or_default();
    let local = email.split('@').next().unwrap_or_default();
    AddressTraits {
        well_formed: is_valid_email_format(&email),
        disposable: DISPOSABLE_DOMAINS.contains(&domain.as_str()),
        role_based: ROLE_MAILBOXES.contains(&local),
        free_provider: FREE_PROVIDERS.contains(&domain.as_str()),
    }
}

/// Format layer score: 0 for malformed, 10 for disposable, otherwise 90 minus class penalties.
pub fn format_score(traits: &AddressTraits) -> f64 {
    if !traits.well_formed {
        return 0.0;
    }
    if traits.disposable {
        return 10.0;
    }
    let mut score = 90.0;
    if traits.role_based {
        score -= 20.0;
    }
    if traits.free_provider {
        score -= 10.0;
    }
    score
}

/// Cross-reference layer score for `address` in the context of the lead's other fields.
pub fn cross_reference_score(lead: &CanonicalLead, address: &str) -> f64 {
    let mut score = 50.0;
    if non_empty(&lead.linkedin_url).is_some_and(is_valid_profile_url) {
        score += 25.0;
    }
    if non_empty(&lead.company.website).is_some_and(|site| domains_correlate(address, site)) {
        score += 20.0;
    }
    let identity_fields = [&lead.first_name, &lead.last_name, &lead.company.name];
    if identity_fields.iter().all(|f| non_empty(f).is_some()) {
        score += 5.0;
    }
    clamp_score(score)
}

/// Candidate addresses for a lead without one, in pattern order, deduplicated.
pub fn synthesize_addresses(lead: &CanonicalLead) -> Vec<String> {
    let Some(domain) = non_empty(&lead.company.website).and_then(website_host) else {
        return Vec::new();
    };
    let first = non_empty(&lead.first_name).map(mailbox_part).unwrap_or_default();
    let last = non_empty(&lead.last_name).map(mailbox_part).unwrap_or_default();
    if first.is_empty() {
        return Vec::new();
    }
    let f = &first[..first.chars().next().map_or(0, char::len_utf8)];
    let l = &last[..last.chars().next().map_or(0, char::len_utf8)];

    let mut addresses: Vec<String> = Vec::new();
    for pattern in ADDRESS_PATTERNS {
        let needs_last = pattern != "first";
        if needs_last && last.is_empty() {
            continue;
        }
        let mailbox = match pattern {
            "first.last" => format!("{}.{}", first, last),
            "first" => first.clone(),
            "f.last" => format!("{}.{}", f, last),
            "first.l" => format!("{}.{}", first, l),
            "firstlast" => format!("{}{}", first, last),
            "last.first" => format!("{}.{}", last, first),
            "first_last" => format!("{}_{}", first, last),
            _ => continue,
        };
        let address = format!("{}@{}", mailbox, domain);
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }
    addresses
}

/// Final status from the external verdict, hard local failures and the weighted score.
pub fn decide_status(
    external: Option<VerificationStatus>,
    hard_invalid: bool,
    score: Option<f64>,
) -> VerificationStatus {
    match external {
        Some(VerificationStatus::Valid) => return VerificationStatus::Valid,
        Some(VerificationStatus::Invalid) => return VerificationStatus::Invalid,
        _ => {}
    }
    if hard_invalid {
        return VerificationStatus::Invalid;
    }
    match score {
        None => VerificationStatus::Unknown,
        Some(s) if s > 70.0 => VerificationStatus::Valid,
        Some(s) if s < 30.0 => VerificationStatus::Invalid,
        Some(_) => VerificationStatus::Risky,
    }
}

/// Verification outcome for one lead, with the degradations met on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadVerification {
    pub result: VerificationResult,
    /// Set when the verified address was synthesized rather than supplied.
    pub synthesized: bool,
    pub errors: Vec<String>,
}

pub struct VerificationAggregator {
    providers: Vec<Arc<dyn VerificationProvider>>,
    resolver: Arc<dyn MailRouteResolver>,
    weights: VerificationWeights,
    limiter: Arc<CallLimiter>,
    route_cache: Cache<String, MailRoute>,
}

impl VerificationAggregator {
    /// `providers` are asked in the given order.
    pub fn new(
        providers: Vec<Arc<dyn VerificationProvider>>,
        resolver: Arc<dyn MailRouteResolver>,
        weights: VerificationWeights,
        limiter: Arc<CallLimiter>,
    ) -> Self {
        Self {
            providers,
            resolver,
            weights,
            limiter,
            route_cache: Cache::builder()
                .max_capacity(DNS_CACHE_CAPACITY)
                .time_to_live(DNS_CACHE_TTL)
                .build(),
        }
    }

    /// Verify the lead's address, or synthesize and verify candidates when it has none.
    ///
    /// Only cancellation is returned as an error; every collaborator failure degrades
    /// the verdict instead.
    pub async fn verify_lead(
        &self,
        lead: &CanonicalLead,
        cancel: &CancellationToken,
    ) -> Result<LeadVerification, AppError> {
        if let Some(address) = non_empty(&lead.email) {
            let mut errors = Vec::new();
            let result = self.verify_address(lead, address, cancel, &mut errors).await?;
            return Ok(LeadVerification {
                result,
                synthesized: false,
                errors,
            });
        }

        let candidates = synthesize_addresses(lead);
        if candidates.is_empty() {
            return Ok(LeadVerification {
                result: VerificationResult {
                    reason: Some("no address and no company domain to synthesize from".into()),
                    ..VerificationResult::default()
                },
                synthesized: false,
                errors: Vec::new(),
            });
        }

        tracing::debug!(
            "Synthesizing {} candidate addresses for lead {}",
            candidates.len(),
            lead.key
        );

        let mut errors = Vec::new();
        let mut best: Option<VerificationResult> = None;
        for candidate in &candidates {
            let result = self.verify_address(lead, candidate, cancel, &mut errors).await?;
            let better = result.status == VerificationStatus::Valid
                && best
                    .as_ref()
                    .map_or(true, |b| result.deliverability > b.deliverability);
            if better {
                best = Some(result);
            }
        }

        Ok(match best {
            Some(result) => LeadVerification {
                result,
                synthesized: true,
                errors,
            },
            None => LeadVerification {
                result: VerificationResult {
                    reason: Some(format!(
                        "none of {} synthesized addresses verified",
                        candidates.len()
                    )),
                    ..VerificationResult::default()
                },
                synthesized: false,
                errors,
            },
        })
    }

    /// Run every layer against one address.
    pub async fn verify_address(
        &self,
        lead: &CanonicalLead,
        address: &str,
        cancel: &CancellationToken,
        errors: &mut Vec<String>,
    ) -> Result<VerificationResult, AppError> {
        let address = address.trim().to_lowercase();
        let traits = classify_address(&address);
        let mut layers: Vec<(f64, f64)> = vec![(self.weights.format, format_score(&traits))];
        let mut hard_invalid = !traits.well_formed;
        let mut external_status = None;
        let mut provider = None;
        let mut reason = None;
        let mut catch_all = false;

        if traits.well_formed {
            if let Some(domain) = email_domain(&address) {
                match self.mail_route(&domain, cancel).await? {
                    Ok(MailRoute::Routable) => layers.push((self.weights.dns, 100.0)),
                    Ok(MailRoute::NoRoute) => {
                        layers.push((self.weights.dns, 0.0));
                        hard_invalid = true;
                        reason = Some(format!("no mail exchanger for {}", domain));
                    }
                    Err(e) => {
                        tracing::warn!("DNS layer skipped for {}: {}", domain, e);
                        errors.push(format!("dns_lookup: {}", e));
                    }
                }
            }
        }

        if !hard_invalid {
            for candidate in &self.providers {
                let verdict = self
                    .limiter
                    .run(cancel, candidate.verify_email(&address))
                    .await?;
                match verdict {
                    Ok(v) if v.status != VerificationStatus::Unknown => {
                        layers.push((self.weights.external, clamp_score(v.score)));
                        catch_all = v.catch_all;
                        external_status = Some(v.status);
                        provider = Some(candidate.name().to_string());
                        reason = v.reason;
                        break;
                    }
                    Ok(v) => {
                        tracing::debug!(
                            "Provider {} has no opinion on {}: {:?}",
                            candidate.name(),
                            address,
                            v.reason
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Provider {} failed for {}: {}", candidate.name(), address, e);
                        errors.push(
                            AppError::VerificationIndeterminate(format!(
                                "{}: {}",
                                candidate.name(),
                                e
                            ))
                            .to_string(),
                        );
                    }
                }
            }
        }

        layers.push((
            self.weights.cross_reference,
            cross_reference_score(lead, &address),
        ));

        let total_weight: f64 = layers.iter().map(|(w, _)| w).sum();
        let score = if total_weight > 0.0 {
            Some(clamp_score(
                layers.iter().map(|(w, s)| w * s).sum::<f64>() / total_weight,
            ))
        } else {
            None
        };
        let status = decide_status(external_status, hard_invalid, score);

        Ok(VerificationResult {
            status,
            deliverability: score.unwrap_or(0.0).round(),
            is_disposable: traits.disposable,
            is_role_based: traits.role_based,
            is_free_provider: traits.free_provider,
            is_catch_all: catch_all,
            address: Some(address),
            provider,
            reason,
        })
    }

    /// Cached MX lookup. The outer error is cancellation, the inner one a failed lookup.
    async fn mail_route(
        &self,
        domain: &str,
        cancel: &CancellationToken,
    ) -> Result<Result<MailRoute, AppError>, AppError> {
        if let Some(route) = self.route_cache.get(domain).await {
            return Ok(Ok(route));
        }
        let lookup = self
            .limiter
            .run(cancel, self.resolver.lookup(domain))
            .await?;
        if let Ok(route) = &lookup {
            self.route_cache.insert(domain.to_string(), *route).await;
        }
        Ok(lookup)
    }
}

/// MX lookups through the system-independent default resolver configuration.
pub struct DnsMailRouteResolver {
    resolver: TokioAsyncResolver,
}

impl DnsMailRouteResolver {
    pub fn new() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 2;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

impl Default for DnsMailRouteResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailRouteResolver for DnsMailRouteResolver {
    async fn lookup(&self, domain: &str) -> Result<MailRoute, AppError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(records) if records.iter().next().is_some() => Ok(MailRoute::Routable),
            Ok(_) => Ok(MailRoute::NoRoute),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(MailRoute::NoRoute),
                _ => Err(AppError::ExternalApiError(format!(
                    "MX lookup for {} failed: {}",
                    domain, e
                ))),
            },
        }
    }
}
