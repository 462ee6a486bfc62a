//! Persistence layer: credit ledger, render store, subscriptions, and
//! API-key authentication.
//!
//! The traits here are the storage seams of the gateway. The production
//! implementation is [`postgres::PostgresPersistence`] over
//! `sqlx::PgPool`; [`memory::MemoryPersistence`] backs local development
//! and the test suite with the same semantics, including the atomic
//! balance and chain-position guarantees.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::render::RenderStatus;
use crate::domain::{ChainId, Render, RenderId};
use crate::error::GatewayError;
use crate::storage::StoredArtifact;

pub use memory::MemoryPersistence;
pub use models::{
    CreditAccount, CreditTransaction, GalleryItem, GrantKind, SubscriptionTier,
    TransactionReference, TransactionType,
};
pub use postgres::PostgresPersistence;

/// Credit accounting with an append-only transaction log.
///
/// The balance is the only shared resource requiring atomic
/// read-modify-write semantics: implementations must gate debits with a
/// conditional update (or equivalent serialization) so that two
/// concurrent debits against an insufficient balance can never both
/// succeed.
#[async_trait]
pub trait CreditLedger: Send + Sync + std::fmt::Debug {
    /// Returns the account snapshot, lazily provisioning a new account
    /// with the configured welcome credits.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn balance(&self, user_id: Uuid) -> Result<CreditAccount, GatewayError>;

    /// Atomically debits `amount` (> 0) and appends one `spent`
    /// transaction row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InsufficientCredits`] when the balance
    /// cannot cover the amount — in that case the balance and the log
    /// are unchanged. Returns [`GatewayError::InvalidRequest`] for
    /// non-positive amounts and [`GatewayError::Persistence`] on
    /// storage failure.
    async fn debit(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
        reference: Option<TransactionReference>,
    ) -> Result<(), GatewayError>;

    /// Credits `amount` (> 0) and appends one transaction row of the
    /// grant's kind. Refunds restore the balance without touching the
    /// earned counters.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for non-positive
    /// amounts and [`GatewayError::Persistence`] on storage failure.
    async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        kind: GrantKind,
        description: &str,
        reference: Option<TransactionReference>,
    ) -> Result<(), GatewayError>;

    /// Returns the newest transactions for a user, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, GatewayError>;

    /// Zeroes the monthly counters and stamps a new cycle start. Called
    /// by the external billing-cycle collaborator, never by the render
    /// pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn reset_monthly_counters(&self, user_id: Uuid) -> Result<(), GatewayError>;
}

/// Render, chain, and gallery storage.
#[async_trait]
pub trait RenderStore: Send + Sync + std::fmt::Debug {
    /// Inserts a new render row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn create_render(&self, render: &Render) -> Result<(), GatewayError>;

    /// Transitions a render's status. Terminal states are immutable:
    /// updating a `completed` or `failed` render is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn update_status(
        &self,
        id: RenderId,
        status: RenderStatus,
        error: Option<&str>,
    ) -> Result<(), GatewayError>;

    /// Marks a render completed with its output artifact and
    /// processing time.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn complete_render(
        &self,
        id: RenderId,
        output: &StoredArtifact,
        processing_time_ms: i64,
    ) -> Result<(), GatewayError>;

    /// Records the uploaded source asset of a render.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn set_source_asset(
        &self,
        id: RenderId,
        asset: &StoredArtifact,
    ) -> Result<(), GatewayError>;

    /// Fetches a render by id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn render(&self, id: RenderId) -> Result<Option<Render>, GatewayError>;

    /// Returns all renders of a chain ordered by chain position.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn renders_in_chain(&self, chain_id: ChainId) -> Result<Vec<Render>, GatewayError>;

    /// Atomically claims the next 1-based position in a chain,
    /// creating the chain row on first use. Safe against concurrent
    /// submissions to the same chain.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn next_chain_position(
        &self,
        chain_id: ChainId,
        project_id: Uuid,
    ) -> Result<i32, GatewayError>;

    /// Creates a gallery item wrapping a completed render.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn add_gallery_item(
        &self,
        render_id: RenderId,
        user_id: Uuid,
        is_public: bool,
    ) -> Result<GalleryItem, GatewayError>;

    /// Returns public gallery items, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn public_gallery(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GalleryItem>, GatewayError>;

    /// Atomically increments a gallery item's like counter.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for unknown items and
    /// [`GatewayError::Persistence`] on storage failure.
    async fn like_gallery_item(&self, id: Uuid) -> Result<GalleryItem, GatewayError>;
}

/// Billing/subscription lookup collaborator.
#[async_trait]
pub trait Subscriptions: Send + Sync + std::fmt::Debug {
    /// Returns the user's current tier. Users without a subscription
    /// row are on the free tier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn tier(&self, user_id: Uuid) -> Result<SubscriptionTier, GatewayError>;
}

/// Authenticated-user resolver collaborator.
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Resolves a bearer token to a user id, or `None` when the token
    /// is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on storage failure.
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, GatewayError>;
}
