//! Offline research run against the deterministic demo catalog.
//!
//! Usage: `research_demo [target_count] [quality_threshold]`. Prints the response JSON.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use rust_lead_research::config::PipelineSettings;
use rust_lead_research::fixtures::{
    demo_company_intel, demo_mail_routes, demo_sources, demo_verification, InMemoryLeadStore,
};
use rust_lead_research::models::{ResearchRequest, ResearchResponse, TargetingCriteria};
use rust_lead_research::obs;
use rust_lead_research::pipeline::ResearchCoordinator;
use rust_lead_research::rate_limiter::CallLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    let mut args = std::env::args().skip(1);
    let target_count = match args.next() {
        Some(raw) => raw.parse::<usize>()?,
        None => 5,
    };
    let quality_threshold = match args.next() {
        Some(raw) => raw.parse::<f64>()?,
        None => 0.0,
    };

    let settings = PipelineSettings::default().with_env_overrides()?;
    let limiter = Arc::new(CallLimiter::from_settings(&settings));
    let mut coordinator = ResearchCoordinator::new(
        settings,
        limiter,
        Arc::new(InMemoryLeadStore::new()),
        Arc::new(demo_mail_routes()),
    )
    .with_verification_provider(Arc::new(demo_verification()))
    .with_company_intel(Arc::new(demo_company_intel()));
    for source in demo_sources(Utc::now()) {
        coordinator = coordinator.with_source(Arc::new(source));
    }

    let request = ResearchRequest {
        campaign_id: None,
        criteria: TargetingCriteria {
            job_titles: vec!["CTO".into(), "VP Engineering".into(), "Director".into()],
            seniority_levels: vec!["c-level".into(), "vp".into(), "director".into()],
            company_sizes: vec!["51-200".into(), "201-500".into()],
            industries: vec!["Software".into()],
            technologies: vec!["Rust".into(), "PostgreSQL".into()],
            pain_points: vec!["data quality".into()],
            ..TargetingCriteria::default()
        },
        target_count,
        quality_threshold,
        source_priorities: BTreeMap::from([
            ("linkedin".to_string(), 3),
            ("apollo".to_string(), 2),
            ("crunchbase".to_string(), 1),
        ]),
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = coordinator.run_research(&request, &cancel).await?;
    let response = ResearchResponse {
        success: true,
        campaign_id: outcome.campaign_id,
        summary: outcome.summary,
        leads: outcome.leads,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
