//! PostgreSQL implementation of the persistence layer.
//!
//! Balance debits are gated by a conditional `UPDATE … WHERE balance >=
//! amount` inside a transaction, so the non-negative balance invariant
//! holds under concurrent requests without application-level locking.
//! Chain positions come from a single upsert-increment statement for the
//! same reason.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::render::{RenderSettings, RenderStatus};
use crate::domain::{ChainId, Render, RenderId};
use crate::error::GatewayError;
use crate::storage::StoredArtifact;

use super::models::{
    CreditAccount, CreditTransaction, GalleryItem, GrantKind, SubscriptionTier,
    TransactionReference, TransactionType,
};
use super::{Authenticator, CreditLedger, RenderStore, Subscriptions};

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
    default_free_credits: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    user_id: Uuid,
    balance: i64,
    total_earned: i64,
    total_spent: i64,
    monthly_earned: i64,
    monthly_spent: i64,
    cycle_started_at: DateTime<Utc>,
}

impl From<AccountRow> for CreditAccount {
    fn from(row: AccountRow) -> Self {
        Self {
            user_id: row.user_id,
            balance: row.balance,
            total_earned: row.total_earned,
            total_spent: row.total_spent,
            monthly_earned: row.monthly_earned,
            monthly_spent: row.monthly_spent,
            cycle_started_at: row.cycle_started_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    user_id: Uuid,
    amount: i64,
    tx_type: String,
    description: String,
    reference_id: Option<Uuid>,
    reference_type: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for CreditTransaction {
    type Error = GatewayError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let tx_type: TransactionType = row
            .tx_type
            .parse()
            .map_err(GatewayError::Persistence)?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            tx_type,
            description: row.description,
            reference_id: row.reference_id,
            reference_type: row.reference_type,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RenderRow {
    id: Uuid,
    project_id: Uuid,
    user_id: Uuid,
    prompt: String,
    settings: serde_json::Value,
    status: String,
    error: Option<String>,
    output_url: Option<String>,
    output_key: Option<String>,
    source_url: Option<String>,
    source_key: Option<String>,
    source_id: Option<Uuid>,
    chain_id: Option<Uuid>,
    chain_position: Option<i32>,
    reference_render_id: Option<Uuid>,
    processing_time_ms: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RenderRow> for Render {
    type Error = GatewayError;

    fn try_from(row: RenderRow) -> Result<Self, Self::Error> {
        let settings: RenderSettings = serde_json::from_value(row.settings)
            .map_err(|e| GatewayError::Persistence(format!("corrupt render settings: {e}")))?;
        let status: RenderStatus = row
            .status
            .parse()
            .map_err(GatewayError::Persistence)?;
        Ok(Self {
            id: RenderId::from_uuid(row.id),
            project_id: row.project_id,
            user_id: row.user_id,
            kind: settings.kind(),
            prompt: row.prompt,
            settings,
            status,
            error: row.error,
            output_url: row.output_url,
            output_key: row.output_key,
            source_url: row.source_url,
            source_key: row.source_key,
            source_id: row.source_id,
            chain_id: row.chain_id.map(ChainId::from_uuid),
            chain_position: row.chain_position,
            reference_render_id: row.reference_render_id.map(RenderId::from_uuid),
            processing_time_ms: row.processing_time_ms,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GalleryRow {
    id: Uuid,
    render_id: Uuid,
    user_id: Uuid,
    is_public: bool,
    likes: i64,
    views: i64,
    created_at: DateTime<Utc>,
}

impl From<GalleryRow> for GalleryItem {
    fn from(row: GalleryRow) -> Self {
        Self {
            id: row.id,
            render_id: RenderId::from_uuid(row.render_id),
            user_id: row.user_id,
            is_public: row.is_public,
            likes: row.likes,
            views: row.views,
            created_at: row.created_at,
        }
    }
}

const SELECT_RENDER: &str = "SELECT id, project_id, user_id, prompt, settings, status, error, \
     output_url, output_key, source_url, source_key, source_id, chain_id, chain_position, \
     reference_render_id, processing_time_ms, created_at, updated_at FROM renders";

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool, default_free_credits: i64) -> Self {
        Self {
            pool,
            default_free_credits,
        }
    }

    /// Provisions a credit account if the user has none, granting the
    /// configured welcome credits with a matching `bonus` log row.
    async fn ensure_account(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
    ) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "INSERT INTO user_credits (user_id, balance, total_earned, monthly_earned) \
             VALUES ($1, $2, $2, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(self.default_free_credits)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 1 && self.default_free_credits > 0 {
            sqlx::query(
                "INSERT INTO credit_transactions (user_id, amount, tx_type, description) \
                 VALUES ($1, $2, 'bonus', 'Welcome credits')",
            )
            .bind(user_id)
            .bind(self.default_free_credits)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CreditLedger for PostgresPersistence {
    async fn balance(&self, user_id: Uuid) -> Result<CreditAccount, GatewayError> {
        let mut tx = self.pool.begin().await?;
        self.ensure_account(&mut tx, user_id).await?;
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT user_id, balance, total_earned, total_spent, monthly_earned, \
             monthly_spent, cycle_started_at FROM user_credits WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
        reference: Option<TransactionReference>,
    ) -> Result<(), GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::InvalidRequest(
                "debit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        self.ensure_account(&mut tx, user_id).await?;

        let result = sqlx::query(
            "UPDATE user_credits SET balance = balance - $2, total_spent = total_spent + $2, \
             monthly_spent = monthly_spent + $2, updated_at = now() \
             WHERE user_id = $1 AND balance >= $2",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT balance FROM user_credits WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            // Dropping the transaction rolls back the provisioning, if any.
            return Err(GatewayError::InsufficientCredits {
                required: amount,
                available: available.unwrap_or(0),
            });
        }

        sqlx::query(
            "INSERT INTO credit_transactions \
             (user_id, amount, tx_type, description, reference_id, reference_type) \
             VALUES ($1, $2, 'spent', $3, $4, $5)",
        )
        .bind(user_id)
        .bind(-amount)
        .bind(description)
        .bind(reference.map(|r| r.reference_id))
        .bind(reference.map(|r| r.reference_type))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        kind: GrantKind,
        description: &str,
        reference: Option<TransactionReference>,
    ) -> Result<(), GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::InvalidRequest(
                "credit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        self.ensure_account(&mut tx, user_id).await?;

        let earned_bump = if kind.counts_as_earned() { amount } else { 0 };
        sqlx::query(
            "UPDATE user_credits SET balance = balance + $2, total_earned = total_earned + $3, \
             monthly_earned = monthly_earned + $3, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(amount)
        .bind(earned_bump)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO credit_transactions \
             (user_id, amount, tx_type, description, reference_id, reference_type) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(amount)
        .bind(TransactionType::from(kind).to_string())
        .bind(description)
        .bind(reference.map(|r| r.reference_id))
        .bind(reference.map(|r| r.reference_type))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, GatewayError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, amount, tx_type, description, reference_id, reference_type, \
             created_at FROM credit_transactions WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CreditTransaction::try_from).collect()
    }

    async fn reset_monthly_counters(&self, user_id: Uuid) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE user_credits SET monthly_earned = 0, monthly_spent = 0, \
             cycle_started_at = now(), updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RenderStore for PostgresPersistence {
    async fn create_render(&self, render: &Render) -> Result<(), GatewayError> {
        let settings = serde_json::to_value(&render.settings)
            .map_err(|e| GatewayError::Persistence(format!("unserializable settings: {e}")))?;
        sqlx::query(
            "INSERT INTO renders (id, project_id, user_id, kind, prompt, settings, status, \
             error, output_url, output_key, source_url, source_key, source_id, chain_id, \
             chain_position, reference_render_id, processing_time_ms, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19)",
        )
        .bind(render.id.as_uuid())
        .bind(render.project_id)
        .bind(render.user_id)
        .bind(render.kind.to_string())
        .bind(&render.prompt)
        .bind(settings)
        .bind(render.status.to_string())
        .bind(render.error.as_deref())
        .bind(render.output_url.as_deref())
        .bind(render.output_key.as_deref())
        .bind(render.source_url.as_deref())
        .bind(render.source_key.as_deref())
        .bind(render.source_id)
        .bind(render.chain_id.map(|c| *c.as_uuid()))
        .bind(render.chain_position)
        .bind(render.reference_render_id.map(|r| *r.as_uuid()))
        .bind(render.processing_time_ms)
        .bind(render.created_at)
        .bind(render.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: RenderId,
        status: RenderStatus,
        error: Option<&str>,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE renders SET status = $2, error = $3, updated_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(id.as_uuid())
        .bind(status.to_string())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_render(
        &self,
        id: RenderId,
        output: &StoredArtifact,
        processing_time_ms: i64,
    ) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "UPDATE renders SET status = 'completed', output_url = $2, output_key = $3, \
             processing_time_ms = $4, updated_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(id.as_uuid())
        .bind(&output.url)
        .bind(&output.key)
        .bind(processing_time_ms)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::Persistence(format!(
                "render {id} missing or already terminal"
            )));
        }
        Ok(())
    }

    async fn set_source_asset(
        &self,
        id: RenderId,
        asset: &StoredArtifact,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE renders SET source_url = $2, source_key = $3, source_id = $4, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&asset.url)
        .bind(&asset.key)
        .bind(asset.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn render(&self, id: RenderId) -> Result<Option<Render>, GatewayError> {
        let sql = format!("{SELECT_RENDER} WHERE id = $1");
        let row = sqlx::query_as::<_, RenderRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Render::try_from).transpose()
    }

    async fn renders_in_chain(&self, chain_id: ChainId) -> Result<Vec<Render>, GatewayError> {
        let sql = format!("{SELECT_RENDER} WHERE chain_id = $1 ORDER BY chain_position ASC");
        let rows = sqlx::query_as::<_, RenderRow>(&sql)
            .bind(chain_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Render::try_from).collect()
    }

    async fn next_chain_position(
        &self,
        chain_id: ChainId,
        project_id: Uuid,
    ) -> Result<i32, GatewayError> {
        // Upsert-increment: first use creates the chain at position 1,
        // later uses bump the counter. One statement, race-free.
        let position: i32 = sqlx::query_scalar(
            "INSERT INTO render_chains (id, project_id, next_position) VALUES ($1, $2, 1) \
             ON CONFLICT (id) DO UPDATE SET next_position = render_chains.next_position + 1 \
             RETURNING next_position",
        )
        .bind(chain_id.as_uuid())
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(position)
    }

    async fn add_gallery_item(
        &self,
        render_id: RenderId,
        user_id: Uuid,
        is_public: bool,
    ) -> Result<GalleryItem, GatewayError> {
        let row = sqlx::query_as::<_, GalleryRow>(
            "INSERT INTO gallery_items (id, render_id, user_id, is_public) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, render_id, user_id, is_public, likes, views, created_at",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(render_id.as_uuid())
        .bind(user_id)
        .bind(is_public)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn public_gallery(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GalleryItem>, GatewayError> {
        let rows = sqlx::query_as::<_, GalleryRow>(
            "SELECT id, render_id, user_id, is_public, likes, views, created_at \
             FROM gallery_items WHERE is_public ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(GalleryItem::from).collect())
    }

    async fn like_gallery_item(&self, id: Uuid) -> Result<GalleryItem, GatewayError> {
        let row = sqlx::query_as::<_, GalleryRow>(
            "UPDATE gallery_items SET likes = likes + 1 WHERE id = $1 \
             RETURNING id, render_id, user_id, is_public, likes, views, created_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(GalleryItem::from)
            .ok_or_else(|| GatewayError::NotFound(format!("gallery item {id}")))
    }
}

#[async_trait]
impl Subscriptions for PostgresPersistence {
    async fn tier(&self, user_id: Uuid) -> Result<SubscriptionTier, GatewayError> {
        let tier: Option<String> = sqlx::query_scalar(
            "SELECT tier FROM user_subscriptions WHERE user_id = $1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match tier.as_deref() {
            Some("pro") => SubscriptionTier::Pro,
            _ => SubscriptionTier::Free,
        })
    }
}

#[async_trait]
impl Authenticator for PostgresPersistence {
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, GatewayError> {
        let user_id: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM api_keys WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user_id)
    }
}
