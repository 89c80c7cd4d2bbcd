use std::env;
use uuid::Uuid;

use chrono::Utc;
use rust_lead_research::data::db_storage::PgLeadStorage;
use rust_lead_research::db::Database;
use rust_lead_research::models::{CanonicalLead, RawLeadCandidate};
use rust_lead_research::providers::LeadStore;

fn lead(first: &str, composite: f64) -> CanonicalLead {
    let mut candidate = RawLeadCandidate::new("manual", Utc::now());
    candidate.first_name = Some(first.to_string());
    candidate.last_name = Some("Storage".to_string());
    candidate.email = Some(format!("{}@storage.example", first.to_lowercase()));
    let mut lead = CanonicalLead::from_candidate(&candidate);
    lead.score.composite = composite;
    lead
}

/// Integration smoke test for the Postgres lead store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn save_and_reload_campaign_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    db.ensure_schema().await?;
    let storage = PgLeadStorage::new(db.pool.clone());

    let campaign_id = Uuid::new_v4();
    let first_run = vec![lead("Ada", 91.25), lead("Grace", 77.0), lead("Alan", 64.5)];
    storage
        .save_leads(campaign_id, &first_run)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let loaded = storage
        .load_leads(campaign_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(
        loaded.iter().map(|l| l.key.clone()).collect::<Vec<_>>(),
        first_run.iter().map(|l| l.key.clone()).collect::<Vec<_>>()
    );

    // A rerun replaces the previous ranking instead of appending to it.
    let second_run = vec![lead("Grace", 80.0)];
    storage
        .save_leads(campaign_id, &second_run)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let reloaded = storage
        .load_leads(campaign_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].key, second_run[0].key);

    Ok(())
}

#[tokio::test]
#[ignore]
async fn unknown_campaign_is_not_found() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    db.ensure_schema().await?;
    let storage = PgLeadStorage::new(db.pool.clone());

    let result = storage.load_leads(Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(rust_lead_research::errors::AppError::NotFound(_))
    ));
    Ok(())
}
