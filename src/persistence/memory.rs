//! In-memory implementation of the persistence layer.
//!
//! Backs local development (no `DATABASE_URL`) and the test suite with
//! the same observable semantics as the PostgreSQL backend: debits are
//! serialized behind one lock so the non-negative balance invariant
//! holds under concurrent requests, chain positions are handed out by
//! an atomic counter, and terminal render states never transition.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::render::RenderStatus;
use crate::domain::{ChainId, Render, RenderId};
use crate::error::GatewayError;
use crate::storage::StoredArtifact;

use super::models::{
    CreditAccount, CreditTransaction, GalleryItem, GrantKind, SubscriptionTier,
    TransactionReference, TransactionType,
};
use super::{Authenticator, CreditLedger, RenderStore, Subscriptions};

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<Uuid, CreditAccount>,
    transactions: Vec<CreditTransaction>,
    next_tx_id: i64,
    renders: HashMap<RenderId, Render>,
    chains: HashMap<ChainId, (Uuid, i32)>,
    gallery: Vec<GalleryItem>,
    api_keys: HashMap<String, Uuid>,
    pro_users: HashSet<Uuid>,
}

/// In-memory persistence for development and tests.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    default_free_credits: i64,
    inner: Mutex<Inner>,
}

impl MemoryPersistence {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new(default_free_credits: i64) -> Self {
        Self {
            default_free_credits,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Registers an API token for a user.
    pub async fn insert_api_key(&self, token: impl Into<String>, user_id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.api_keys.insert(token.into(), user_id);
    }

    /// Puts a user on the given subscription tier.
    pub async fn set_tier(&self, user_id: Uuid, tier: SubscriptionTier) {
        let mut inner = self.inner.lock().await;
        if tier.is_pro() {
            inner.pro_users.insert(user_id);
        } else {
            inner.pro_users.remove(&user_id);
        }
    }

    fn ensure_account(&self, inner: &mut Inner, user_id: Uuid) {
        if inner.accounts.contains_key(&user_id) {
            return;
        }
        let now = Utc::now();
        inner.accounts.insert(
            user_id,
            CreditAccount {
                user_id,
                balance: self.default_free_credits,
                total_earned: self.default_free_credits,
                total_spent: 0,
                monthly_earned: self.default_free_credits,
                monthly_spent: 0,
                cycle_started_at: now,
            },
        );
        if self.default_free_credits > 0 {
            push_transaction(
                inner,
                user_id,
                self.default_free_credits,
                TransactionType::Bonus,
                "Welcome credits",
                None,
            );
        }
    }
}

fn push_transaction(
    inner: &mut Inner,
    user_id: Uuid,
    amount: i64,
    tx_type: TransactionType,
    description: &str,
    reference: Option<TransactionReference>,
) {
    inner.next_tx_id += 1;
    let id = inner.next_tx_id;
    inner.transactions.push(CreditTransaction {
        id,
        user_id,
        amount,
        tx_type,
        description: description.to_string(),
        reference_id: reference.map(|r| r.reference_id),
        reference_type: reference.map(|r| r.reference_type.to_string()),
        created_at: Utc::now(),
    });
}

#[async_trait]
impl CreditLedger for MemoryPersistence {
    async fn balance(&self, user_id: Uuid) -> Result<CreditAccount, GatewayError> {
        let mut inner = self.inner.lock().await;
        self.ensure_account(&mut inner, user_id);
        inner
            .accounts
            .get(&user_id)
            .cloned()
            .ok_or_else(|| GatewayError::Persistence("account vanished".to_string()))
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

        let mut inner = self.inner.lock().await;
        self.ensure_account(&mut inner, user_id);
        let Some(account) = inner.accounts.get_mut(&user_id) else {
            return Err(GatewayError::Persistence("account vanished".to_string()));
        };

        if account.balance < amount {
            return Err(GatewayError::InsufficientCredits {
                required: amount,
                available: account.balance,
            });
        }

        account.balance -= amount;
        account.total_spent += amount;
        account.monthly_spent += amount;
        push_transaction(
            &mut inner,
            user_id,
            -amount,
            TransactionType::Spent,
            description,
            reference,
        );
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

        let mut inner = self.inner.lock().await;
        self.ensure_account(&mut inner, user_id);
        let Some(account) = inner.accounts.get_mut(&user_id) else {
            return Err(GatewayError::Persistence("account vanished".to_string()));
        };

        account.balance += amount;
        if kind.counts_as_earned() {
            account.total_earned += amount;
            account.monthly_earned += amount;
        }
        push_transaction(
            &mut inner,
            user_id,
            amount,
            TransactionType::from(kind),
            description,
            reference,
        );
        Ok(())
    }

    async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditTransaction>, GatewayError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<CreditTransaction> = inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn reset_monthly_counters(&self, user_id: Uuid) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        if let Some(account) = inner.accounts.get_mut(&user_id) {
            account.monthly_earned = 0;
            account.monthly_spent = 0;
            account.cycle_started_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl RenderStore for MemoryPersistence {
    async fn create_render(&self, render: &Render) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        inner.renders.insert(render.id, render.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: RenderId,
        status: RenderStatus,
        error: Option<&str>,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        if let Some(render) = inner.renders.get_mut(&id)
            && !render.status.is_terminal()
        {
            render.status = status;
            render.error = error.map(str::to_string);
            render.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn complete_render(
        &self,
        id: RenderId,
        output: &StoredArtifact,
        processing_time_ms: i64,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        let Some(render) = inner.renders.get_mut(&id) else {
            return Err(GatewayError::Persistence(format!(
                "render {id} missing or already terminal"
            )));
        };
        if render.status.is_terminal() {
            return Err(GatewayError::Persistence(format!(
                "render {id} missing or already terminal"
            )));
        }
        render.status = RenderStatus::Completed;
        render.output_url = Some(output.url.clone());
        render.output_key = Some(output.key.clone());
        render.processing_time_ms = Some(processing_time_ms);
        render.updated_at = Utc::now();
        Ok(())
    }

    async fn set_source_asset(
        &self,
        id: RenderId,
        asset: &StoredArtifact,
    ) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().await;
        if let Some(render) = inner.renders.get_mut(&id) {
            render.source_url = Some(asset.url.clone());
            render.source_key = Some(asset.key.clone());
            render.source_id = Some(asset.id);
            render.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn render(&self, id: RenderId) -> Result<Option<Render>, GatewayError> {
        let inner = self.inner.lock().await;
        Ok(inner.renders.get(&id).cloned())
    }

    async fn renders_in_chain(&self, chain_id: ChainId) -> Result<Vec<Render>, GatewayError> {
        let inner = self.inner.lock().await;
        let mut renders: Vec<Render> = inner
            .renders
            .values()
            .filter(|r| r.chain_id == Some(chain_id))
            .cloned()
            .collect();
        renders.sort_by_key(|r| r.chain_position);
        Ok(renders)
    }

    async fn next_chain_position(
        &self,
        chain_id: ChainId,
        project_id: Uuid,
    ) -> Result<i32, GatewayError> {
        let mut inner = self.inner.lock().await;
        let entry = inner.chains.entry(chain_id).or_insert((project_id, 0));
        entry.1 += 1;
        Ok(entry.1)
    }

    async fn add_gallery_item(
        &self,
        render_id: RenderId,
        user_id: Uuid,
        is_public: bool,
    ) -> Result<GalleryItem, GatewayError> {
        let mut inner = self.inner.lock().await;
        let item = GalleryItem {
            id: Uuid::new_v4(),
            render_id,
            user_id,
            is_public,
            likes: 0,
            views: 0,
            created_at: Utc::now(),
        };
        inner.gallery.push(item.clone());
        Ok(item)
    }

    async fn public_gallery(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GalleryItem>, GatewayError> {
        let inner = self.inner.lock().await;
        let mut items: Vec<GalleryItem> = inner
            .gallery
            .iter()
            .filter(|g| g.is_public)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn like_gallery_item(&self, id: Uuid) -> Result<GalleryItem, GatewayError> {
        let mut inner = self.inner.lock().await;
        let item = inner
            .gallery
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("gallery item {id}")))?;
        item.likes += 1;
        Ok(item.clone())
    }
}

#[async_trait]
impl Subscriptions for MemoryPersistence {
    async fn tier(&self, user_id: Uuid) -> Result<SubscriptionTier, GatewayError> {
        let inner = self.inner.lock().await;
        Ok(if inner.pro_users.contains(&user_id) {
            SubscriptionTier::Pro
        } else {
            SubscriptionTier::Free
        })
    }
}

#[async_trait]
impl Authenticator for MemoryPersistence {
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, GatewayError> {
        let inner = self.inner.lock().await;
        Ok(inner.api_keys.get(token).copied())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::render::{
        GenerationType, RenderSettings, VideoAspectRatio, VideoDuration, VideoSettings,
    };

    fn video_settings() -> RenderSettings {
        RenderSettings::Video(VideoSettings {
            model: "veo-3.1-generate-preview".to_string(),
            duration: VideoDuration::Eight,
            aspect_ratio: VideoAspectRatio::Wide,
            generation_type: GenerationType::TextToVideo,
        })
    }

    fn artifact() -> StoredArtifact {
        StoredArtifact {
            url: "http://localhost:3000/files/renders/x/out.mp4".to_string(),
            key: "renders/x/out.mp4".to_string(),
            id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn new_accounts_receive_welcome_credits() {
        let store = MemoryPersistence::new(10);
        let user = Uuid::new_v4();

        let account = store.balance(user).await;
        let Ok(account) = account else {
            panic!("balance failed");
        };
        assert_eq!(account.balance, 10);
        assert_eq!(account.total_earned, 10);

        let txs = store.transactions(user, 10, 0).await.unwrap_or_default();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs.first().map(|t| t.tx_type), Some(TransactionType::Bonus));
    }

    #[tokio::test]
    async fn debit_over_balance_leaves_state_unchanged() {
        let store = MemoryPersistence::new(10);
        let user = Uuid::new_v4();

        let result = store.debit(user, 128, "Generated video", None).await;
        let Err(GatewayError::InsufficientCredits {
            required,
            available,
        }) = result
        else {
            panic!("expected InsufficientCredits");
        };
        assert_eq!(required, 128);
        assert_eq!(available, 10);

        let account = store.balance(user).await.ok();
        assert_eq!(account.map(|a| a.balance), Some(10));
        // Only the welcome bonus row exists.
        let txs = store.transactions(user, 10, 0).await.unwrap_or_default();
        assert_eq!(txs.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_debits_cannot_both_succeed() {
        let store = Arc::new(MemoryPersistence::new(100));
        let user = Uuid::new_v4();
        // Provision the account first so both debits race on the balance.
        let _ = store.balance(user).await;

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.debit(user, 60, "debit a", None).await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.debit(user, 60, "debit b", None).await })
        };

        let (ra, rb) = (a.await, b.await);
        let (Ok(ra), Ok(rb)) = (ra, rb) else {
            panic!("task join failed");
        };
        let successes = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one debit of 60 fits in 100");

        let account = store.balance(user).await.ok();
        assert_eq!(account.map(|a| a.balance), Some(40));
    }

    #[tokio::test]
    async fn refund_restores_balance_without_earned_bump() {
        let store = MemoryPersistence::new(200);
        let user = Uuid::new_v4();

        let debited = store.debit(user, 128, "Generated video", None).await;
        assert!(debited.is_ok());
        let refunded = store
            .credit(
                user,
                128,
                GrantKind::Refund,
                "Refund for failed video generation",
                None,
            )
            .await;
        assert!(refunded.is_ok());

        let account = store.balance(user).await.ok();
        let Some(account) = account else {
            panic!("balance failed");
        };
        assert_eq!(account.balance, 200);
        assert_eq!(account.total_earned, 200); // welcome grant only
        assert_eq!(account.total_spent, 128); // spend is not un-counted
    }

    #[tokio::test]
    async fn monthly_counters_reset_without_touching_balance() {
        let store = MemoryPersistence::new(50);
        let user = Uuid::new_v4();
        let _ = store.debit(user, 20, "Generated image", None).await;

        let _ = store.reset_monthly_counters(user).await;

        let account = store.balance(user).await.ok();
        let Some(account) = account else {
            panic!("balance failed");
        };
        assert_eq!(account.monthly_earned, 0);
        assert_eq!(account.monthly_spent, 0);
        assert_eq!(account.balance, 30);
        assert_eq!(account.total_spent, 20);
    }

    #[tokio::test]
    async fn chain_positions_increment_from_one() {
        let store = MemoryPersistence::new(0);
        let chain = ChainId::new();
        let project = Uuid::new_v4();

        for expected in 1..=3 {
            let position = store.next_chain_position(chain, project).await.ok();
            assert_eq!(position, Some(expected));
        }
    }

    #[tokio::test]
    async fn terminal_render_states_never_transition() {
        let store = MemoryPersistence::new(0);
        let render = Render::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "prompt".to_string(),
            video_settings(),
            None,
            None,
        );
        let id = render.id;
        let _ = store.create_render(&render).await;
        let _ = store
            .update_status(id, RenderStatus::Failed, Some("provider timeout"))
            .await;

        // A failed render cannot be completed or re-statused.
        let completed = store.complete_render(id, &artifact(), 1000).await;
        assert!(completed.is_err());
        let _ = store.update_status(id, RenderStatus::Processing, None).await;

        let stored = store.render(id).await.ok().flatten();
        let Some(stored) = stored else {
            panic!("render missing");
        };
        assert_eq!(stored.status, RenderStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("provider timeout"));
    }

    #[tokio::test]
    async fn gallery_filters_private_items() {
        let store = MemoryPersistence::new(0);
        let user = Uuid::new_v4();
        let public = store.add_gallery_item(RenderId::new(), user, true).await;
        let _private = store.add_gallery_item(RenderId::new(), user, false).await;
        let Ok(public) = public else {
            panic!("gallery insert failed");
        };

        let listed = store.public_gallery(10, 0).await.unwrap_or_default();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.first().map(|g| g.id), Some(public.id));

        let liked = store.like_gallery_item(public.id).await.ok();
        assert_eq!(liked.map(|g| g.likes), Some(1));
    }
}
