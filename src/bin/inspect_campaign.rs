//! Utility to print the ranking saved for a campaign.
//!
//! Usage: `inspect_campaign <campaign-uuid>`

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;
use uuid::Uuid;

use rust_lead_research::db_storage::PgLeadStorage;
use rust_lead_research::providers::LeadStore;

/// Main entry point for the campaign inspection utility.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let campaign_id: Uuid = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: inspect_campaign <campaign-uuid>"))?
        .parse()?;

    let pool = PgPoolOptions::new().connect(&database_url).await?;
    let leads = PgLeadStorage::new(pool).load_leads(campaign_id).await?;

    println!("Campaign {}: {} leads", campaign_id, leads.len());
    for (rank, lead) in leads.iter().enumerate() {
        println!(
            "{:>3}. {:<28} {:>5.1} {:<3} {:<7} {}",
            rank + 1,
            lead.full_name().unwrap_or_else(|| lead.key.clone()),
            lead.score.composite,
            lead.score.tier.as_str(),
            lead.verification.status.as_str(),
            lead.email.as_deref().unwrap_or("-")
        );
        println!(
            "     sources: {}",
            lead.sources.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        for error in &lead.enrichment_errors {
            println!("     degraded: {}", error);
        }
    }
    Ok(())
}
