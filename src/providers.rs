//! Capability interfaces for every external collaborator of the research pipeline.
//!
//! The pipeline only ever talks to these traits. Concrete implementations live in
//! `gateway_client` (HTTP), `db_storage` (Postgres) and `fixtures` (deterministic, for tests).

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CanonicalLead, CompanyFacts, ProviderVerdict, RawLeadCandidate, TargetingCriteria};

/// A data provider that returns raw candidates for targeting criteria.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provenance tag stamped on every candidate this adapter returns.
    fn name(&self) -> &str;

    /// Disabled adapters are skipped without being queried.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn search(
        &self,
        criteria: &TargetingCriteria,
        max_results: usize,
    ) -> Result<Vec<RawLeadCandidate>, AppError>;
}

/// An external email verification service.
///
/// Returning `unknown` means "no opinion, ask the next provider".
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn verify_email(&self, address: &str) -> Result<ProviderVerdict, AppError>;
}

/// A firmographics service. Partial or empty facts are acceptable answers.
#[async_trait]
pub trait CompanyIntelProvider: Send + Sync {
    async fn gather(
        &self,
        company_name: &str,
        website: Option<&str>,
    ) -> Result<CompanyFacts, AppError>;
}

/// Outcome of a mail-exchange lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailRoute {
    /// At least one MX record exists.
    Routable,
    /// The domain answered but has no mail exchanger, or does not exist.
    NoRoute,
}

/// DNS mail-exchange existence check.
#[async_trait]
pub trait MailRouteResolver: Send + Sync {
    /// `Err` means the lookup itself failed (timeout, resolver down) and says nothing
    /// about the domain.
    async fn lookup(&self, domain: &str) -> Result<MailRoute, AppError>;
}

/// Persistence collaborator receiving the final ranked list.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn save_leads(&self, campaign_id: Uuid, leads: &[CanonicalLead]) -> Result<(), AppError>;

    async fn load_leads(&self, campaign_id: Uuid) -> Result<Vec<CanonicalLead>, AppError>;
}
