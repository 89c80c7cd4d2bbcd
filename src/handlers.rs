use crate::config::Config;
use crate::errors::AppError;
use crate::models::{CanonicalLead, ResearchRequest, ResearchResponse};
use crate::pipeline::ResearchCoordinator;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Upper bound on `target_count` for a single run.
const MAX_TARGET_COUNT: usize = 1_000;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Research pipeline with its long-lived collaborators.
    pub coordinator: Arc<ResearchCoordinator>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and the configured sources.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-lead-research",
            "version": env!("CARGO_PKG_VERSION"),
            "sources": state.coordinator.source_names(),
        })),
    )
}

fn validate_request(request: &ResearchRequest) -> Result<(), AppError> {
    if request.target_count == 0 {
        return Err(AppError::BadRequest(
            "target_count must be at least 1".to_string(),
        ));
    }
    if request.target_count > MAX_TARGET_COUNT {
        return Err(AppError::BadRequest(format!(
            "target_count must not exceed {}",
            MAX_TARGET_COUNT
        )));
    }
    if !request.quality_threshold.is_finite()
        || !(0.0..=100.0).contains(&request.quality_threshold)
    {
        return Err(AppError::BadRequest(
            "quality_threshold must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/research
///
/// Runs the full research pipeline for the given criteria and returns the ranked leads.
/// Dropping the connection cancels the run.
pub async fn run_research(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>, AppError> {
    tracing::info!(
        "POST /research - target_count: {}, threshold: {}",
        request.target_count,
        request.quality_threshold
    );
    validate_request(&request)?;

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let outcome = state.coordinator.run_research(&request, &cancel).await;
    guard.disarm();
    let outcome = outcome?;

    tracing::info!(
        "Research {} finished: {} leads returned ({} discovered, {} unique)",
        outcome.campaign_id,
        outcome.summary.leads_returned,
        outcome.summary.candidates_discovered,
        outcome.summary.unique_leads
    );

    Ok(Json(ResearchResponse {
        success: true,
        campaign_id: outcome.campaign_id,
        summary: outcome.summary,
        leads: outcome.leads,
    }))
}

/// GET /api/v1/campaigns/:id/leads
///
/// Returns the leads saved by the last run of a campaign, in rank order.
pub async fn get_campaign_leads(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CanonicalLead>>, AppError> {
    tracing::info!("GET /campaigns/{}/leads", id);
    let leads = state.coordinator.store().load_leads(id).await?;
    Ok(Json(leads))
}
