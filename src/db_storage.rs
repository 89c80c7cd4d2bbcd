use crate::errors::AppError;
use crate::models::CanonicalLead;
use crate::providers::LeadStore;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

/// Postgres-backed store for the ranked output of research runs.
///
/// Each save replaces the campaign's previous results in a single transaction, so a
/// reader never sees a half-written ranking.
pub struct PgLeadStorage {
    pool: PgPool,
}

impl PgLeadStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_campaign(
        &self,
        campaign_id: Uuid,
        leads: &[CanonicalLead],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;

        sqlx::query("DELETE FROM campaign_leads WHERE campaign_id = $1")
            .bind(campaign_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::DatabaseError)?;

        for (rank, lead) in leads.iter().enumerate() {
            let composite = BigDecimal::from_str(&format!("{:.1}", lead.score.composite))
                .map_err(|e| AppError::InternalError(format!("Invalid composite score: {}", e)))?;
            let payload = serde_json::to_value(lead).map_err(|e| {
                AppError::InternalError(format!("Failed to serialize lead {}: {}", lead.key, e))
            })?;

            sqlx::query(
                r#"
                INSERT INTO campaign_leads (
                    campaign_id, lead_key, rank, composite_score, tier, priority,
                    email, verification_status, payload, saved_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                ON CONFLICT (campaign_id, lead_key) DO UPDATE SET
                    rank = EXCLUDED.rank,
                    composite_score = EXCLUDED.composite_score,
                    tier = EXCLUDED.tier,
                    priority = EXCLUDED.priority,
                    email = EXCLUDED.email,
                    verification_status = EXCLUDED.verification_status,
                    payload = EXCLUDED.payload,
                    saved_at = NOW()
                "#,
            )
            .bind(campaign_id)
            .bind(&lead.key)
            .bind(rank as i32)
            .bind(composite)
            .bind(lead.score.tier.as_str())
            .bind(lead.score.priority.as_str())
            .bind(lead.email.as_deref())
            .bind(lead.verification.status.as_str())
            .bind(payload)
            .execute(&mut *tx)
            .await
            .map_err(AppError::DatabaseError)?;
        }

        tx.commit().await.map_err(AppError::DatabaseError)?;
        Ok(())
    }
}

#[async_trait]
impl LeadStore for PgLeadStorage {
    async fn save_leads(&self, campaign_id: Uuid, leads: &[CanonicalLead]) -> Result<(), AppError> {
        self.write_campaign(campaign_id, leads).await?;
        tracing::info!(
            "✓ Stored {} leads for campaign {}",
            leads.len(),
            campaign_id
        );
        Ok(())
    }

    async fn load_leads(&self, campaign_id: Uuid) -> Result<Vec<CanonicalLead>, AppError> {
        let rows = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT payload FROM campaign_leads WHERE campaign_id = $1 ORDER BY rank ASC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        if rows.is_empty() {
            return Err(AppError::NotFound(format!(
                "No leads stored for campaign {}",
                campaign_id
            )));
        }

        rows.into_iter()
            .map(|(payload,)| {
                serde_json::from_value::<CanonicalLead>(payload).map_err(|e| {
                    AppError::InternalError(format!("Corrupt lead payload: {}", e))
                })
            })
            .collect()
    }
}
