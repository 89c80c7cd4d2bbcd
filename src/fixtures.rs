//! Deterministic implementations of every capability, for tests and offline demo runs.
//!
//! Nothing in here is random: the same inputs always produce the same candidates and
//! verdicts, so pipeline behavior can be asserted exactly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    CanonicalLead, CompanyFacts, ProviderVerdict, RawLeadCandidate, TargetingCriteria,
    VerificationStatus,
};
use crate::providers::{
    CompanyIntelProvider, LeadStore, MailRoute, MailRouteResolver, SourceAdapter,
    VerificationProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Answer,
    Fail,
    Disabled,
}

/// Source adapter replaying a fixed candidate list.
pub struct FixtureSourceAdapter {
    name: String,
    candidates: Vec<RawLeadCandidate>,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixtureSourceAdapter {
    /// Every candidate is re-tagged with `name` as its source.
    pub fn new(name: impl Into<String>, candidates: Vec<RawLeadCandidate>) -> Self {
        let name = name.into();
        let candidates = candidates
            .into_iter()
            .map(|mut c| {
                c.source = name.clone();
                c
            })
            .collect();
        Self {
            name,
            candidates,
            behavior: Behavior::Answer,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// An adapter whose every search fails with `SourceUnavailable`.
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn disabled(mut self) -> Self {
        self.behavior = Behavior::Disabled;
        self
    }

    /// Sleep before answering, to exercise cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FixtureSourceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.behavior != Behavior::Disabled
    }

    async fn search(
        &self,
        _criteria: &TargetingCriteria,
        max_results: usize,
    ) -> Result<Vec<RawLeadCandidate>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            Behavior::Fail => Err(AppError::SourceUnavailable(format!(
                "{}: fixture outage",
                self.name
            ))),
            _ => Ok(self.candidates.iter().take(max_results).cloned().collect()),
        }
    }
}

/// Verification provider answering from a lookup table.
pub struct FixtureVerificationProvider {
    name: String,
    verdicts: HashMap<String, ProviderVerdict>,
    default: ProviderVerdict,
    fail: bool,
}

impl FixtureVerificationProvider {
    /// Answers "unknown" for every address until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdicts: HashMap::new(),
            default: ProviderVerdict::unknown("not in fixture table"),
            fail: false,
        }
    }

    pub fn with_verdict(mut self, address: &str, verdict: ProviderVerdict) -> Self {
        self.verdicts.insert(address.to_lowercase(), verdict);
        self
    }

    pub fn with_default(mut self, verdict: ProviderVerdict) -> Self {
        self.default = verdict;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Valid for addresses at `domains`, invalid otherwise.
    pub fn accepting_domains<'a>(
        name: impl Into<String>,
        domains: impl IntoIterator<Item = &'a str>,
    ) -> AcceptingDomains {
        AcceptingDomains {
            name: name.into(),
            domains: domains.into_iter().map(str::to_lowercase).collect(),
        }
    }
}

#[async_trait]
impl VerificationProvider for FixtureVerificationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify_email(&self, address: &str) -> Result<ProviderVerdict, AppError> {
        if self.fail {
            return Err(AppError::ExternalApiError(format!(
                "{}: fixture outage",
                self.name
            )));
        }
        Ok(self
            .verdicts
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Provider built by [`FixtureVerificationProvider::accepting_domains`].
pub struct AcceptingDomains {
    name: String,
    domains: BTreeSet<String>,
}

#[async_trait]
impl VerificationProvider for AcceptingDomains {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify_email(&self, address: &str) -> Result<ProviderVerdict, AppError> {
        let domain = crate::normalize::email_domain(address).unwrap_or_default();
        Ok(if self.domains.contains(&domain) {
            ProviderVerdict {
                status: VerificationStatus::Valid,
                score: 92.0,
                reason: Some("mailbox accepted".into()),
                catch_all: false,
            }
        } else {
            ProviderVerdict {
                status: VerificationStatus::Invalid,
                score: 5.0,
                reason: Some("mailbox rejected".into()),
                catch_all: false,
            }
        })
    }
}

/// Company intelligence keyed by lowercased company name.
#[derive(Default)]
pub struct FixtureCompanyIntelProvider {
    companies: HashMap<String, CompanyFacts>,
    failing: BTreeSet<String>,
    calls: AtomicUsize,
}

impl FixtureCompanyIntelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_company(mut self, name: &str, facts: CompanyFacts) -> Self {
        self.companies.insert(name.to_lowercase(), facts);
        self
    }

    /// Lookups for `name` fail with `EnrichmentFailure`.
    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(name.to_lowercase());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompanyIntelProvider for FixtureCompanyIntelProvider {
    async fn gather(
        &self,
        company_name: &str,
        _website: Option<&str>,
    ) -> Result<CompanyFacts, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = company_name.trim().to_lowercase();
        if self.failing.contains(&key) {
            return Err(AppError::EnrichmentFailure(format!(
                "no firmographics for {}",
                company_name
            )));
        }
        Ok(self.companies.get(&key).cloned().unwrap_or_default())
    }
}

/// MX resolver with a fixed set of routable domains; every other domain has no route.
pub struct FixtureMailRouteResolver {
    routable: BTreeSet<String>,
    fail: bool,
}

impl FixtureMailRouteResolver {
    pub fn routable<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            routable: domains
                .into_iter()
                .map(|d| d.as_ref().to_lowercase())
                .collect(),
            fail: false,
        }
    }

    /// Every lookup errors, as if the resolver were unreachable.
    pub fn failing() -> Self {
        Self {
            routable: BTreeSet::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl MailRouteResolver for FixtureMailRouteResolver {
    async fn lookup(&self, domain: &str) -> Result<MailRoute, AppError> {
        if self.fail {
            return Err(AppError::ExternalApiError("resolver unreachable".into()));
        }
        Ok(if self.routable.contains(&domain.to_lowercase()) {
            MailRoute::Routable
        } else {
            MailRoute::NoRoute
        })
    }
}

/// Process-local lead store.
#[derive(Default)]
pub struct InMemoryLeadStore {
    campaigns: RwLock<HashMap<Uuid, Vec<CanonicalLead>>>,
    fail: bool,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every save fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn save_leads(&self, campaign_id: Uuid, leads: &[CanonicalLead]) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        self.campaigns
            .write()
            .await
            .insert(campaign_id, leads.to_vec());
        Ok(())
    }

    async fn load_leads(&self, campaign_id: Uuid) -> Result<Vec<CanonicalLead>, AppError> {
        self.campaigns
            .read()
            .await
            .get(&campaign_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("campaign {}", campaign_id)))
    }
}

// ============ Demo catalog ============

struct Person {
    first: &'static str,
    last: &'static str,
    title: &'static str,
    seniority: &'static str,
    company: &'static str,
    domain: &'static str,
    location: &'static str,
}

const PEOPLE: [Person; 6] = [
    Person {
        first: "Ada",
        last: "Lovelace",
        title: "Chief Technology Officer",
        seniority: "c-level",
        company: "Analytical Engines",
        domain: "analytical.io",
        location: "London, UK",
    },
    Person {
        first: "Grace",
        last: "Hopper",
        title: "VP Engineering",
        seniority: "vp",
        company: "Compiler Works",
        domain: "compilerworks.com",
        location: "Arlington, VA",
    },
    Person {
        first: "Alan",
        last: "Turing",
        title: "Director of Research",
        seniority: "director",
        company: "Bletchley Labs",
        domain: "bletchley.co.uk",
        location: "Manchester, UK",
    },
    Person {
        first: "Katherine",
        last: "Johnson",
        title: "Engineering Manager",
        seniority: "manager",
        company: "Orbital Math",
        domain: "orbitalmath.com",
        location: "Hampton, VA",
    },
    Person {
        first: "Edsger",
        last: "Dijkstra",
        title: "Principal Engineer",
        seniority: "senior",
        company: "Shortest Path",
        domain: "shortestpath.nl",
        location: "Amsterdam, NL",
    },
    Person {
        first: "Barbara",
        last: "Liskov",
        title: "Head of Platform",
        seniority: "director",
        company: "Substitution Systems",
        domain: "substitution.io",
        location: "Boston, MA",
    },
];

fn demo_candidate(source: &str, index: usize, at: DateTime<Utc>) -> RawLeadCandidate {
    let p = &PEOPLE[index % PEOPLE.len()];
    let mut c = RawLeadCandidate::new(source, at);
    c.first_name = Some(p.first.into());
    c.last_name = Some(p.last.into());
    c.title = Some(p.title.into());
    c.seniority = Some(p.seniority.into());
    c.company_name = Some(p.company.into());
    c.company_website = Some(format!("https://{}", p.domain));
    c.location = Some(p.location.into());
    c.linkedin_url = Some(format!(
        "https://www.linkedin.com/in/{}-{}",
        p.first.to_lowercase(),
        p.last.to_lowercase()
    ));
    c
}

/// Three demo sources describing overlapping people, so merging has work to do.
///
/// Every candidate carries the person's profile URL. `linkedin` adds social facts,
/// `apollo` adds contact data, `crunchbase` adds firmographics.
pub fn demo_sources(at: DateTime<Utc>) -> Vec<FixtureSourceAdapter> {
    let linkedin = (0..PEOPLE.len())
        .map(|i| {
            let mut c = demo_candidate("linkedin", i, at);
            c.facts = BTreeMap::from([
                ("connections".to_string(), json!(150 + 90 * i)),
                ("social_posts_per_month".to_string(), json!((i * 3) % 10)),
                ("months_in_role".to_string(), json!(8 + 7 * i)),
                ("mutual_connections".to_string(), json!(i * 4)),
            ]);
            c
        })
        .collect();

    let apollo = (0..4)
        .map(|i| {
            let p = &PEOPLE[i];
            let mut c = demo_candidate("apollo", i, at);
            c.email = Some(format!(
                "{}.{}@{}",
                p.first.to_lowercase(),
                p.last.to_lowercase(),
                p.domain
            ));
            c.phone = Some(format!("+1 415 555 01{:02}", 10 + i));
            c.department = Some("Engineering".into());
            c
        })
        .collect();

    let crunchbase = (2..PEOPLE.len())
        .map(|i| {
            let mut c = demo_candidate("crunchbase", i, at);
            c.company_size = Some(["51-200", "201-500", "11-50", "1001-5000"][i - 2].into());
            c.company_industry = Some("Software".into());
            c.company_funding_stage = Some(["Series A", "Series B", "Seed", "Series C"][i - 2].into());
            c.tech_stack = vec!["Rust".into(), "PostgreSQL".into(), "Kubernetes".into()];
            c
        })
        .collect();

    vec![
        FixtureSourceAdapter::new("linkedin", linkedin),
        FixtureSourceAdapter::new("apollo", apollo),
        FixtureSourceAdapter::new("crunchbase", crunchbase),
    ]
}

/// Firmographics for every demo company.
pub fn demo_company_intel() -> FixtureCompanyIntelProvider {
    PEOPLE.iter().enumerate().fold(
        FixtureCompanyIntelProvider::new(),
        |intel, (i, p)| {
            intel.with_company(
                p.company,
                CompanyFacts {
                    website: Some(format!("https://{}", p.domain)),
                    industry: Some("Software".into()),
                    size: Some(["11-50", "51-200", "201-500"][i % 3].into()),
                    tech_stack: vec!["Rust".into(), "PostgreSQL".into()],
                    growth_signals: (0..i % 4).map(|n| format!("hiring wave {}", n + 1)).collect(),
                    buying_signals: (0..(i + 1) % 3)
                        .map(|n| format!("evaluating vendors {}", n + 1))
                        .collect(),
                    pain_points: vec!["data quality".into(), "manual prospecting".into()],
                    ..CompanyFacts::default()
                },
            )
        },
    )
}

/// Domains of the demo companies, all routable.
pub fn demo_mail_routes() -> FixtureMailRouteResolver {
    FixtureMailRouteResolver::routable(PEOPLE.iter().map(|p| p.domain))
}

/// A provider accepting every demo company domain.
pub fn demo_verification() -> AcceptingDomains {
    FixtureVerificationProvider::accepting_domains("fixture", PEOPLE.iter().map(|p| p.domain))
}
