//! Persistent models for credit accounting, subscriptions, and the
//! public gallery.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::RenderId;

/// Credit balance snapshot for one user.
///
/// `balance` never goes below zero: the ledger enforces the invariant
/// with a conditional update at the storage layer. The `total_*`
/// counters are monotonically non-decreasing; the `monthly_*` counters
/// are reset by the external billing-cycle collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditAccount {
    /// Owning user.
    pub user_id: Uuid,
    /// Spendable credits (≥ 0).
    pub balance: i64,
    /// Lifetime credits granted (earned + bonus).
    pub total_earned: i64,
    /// Lifetime credits spent.
    pub total_spent: i64,
    /// Credits granted in the current billing cycle.
    pub monthly_earned: i64,
    /// Credits spent in the current billing cycle.
    pub monthly_spent: i64,
    /// Start of the current billing cycle.
    pub cycle_started_at: DateTime<Utc>,
}

/// Kind of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Subscription or promotional grant.
    Earned,
    /// Debit for a billed operation.
    Spent,
    /// Reversal of a debit after a failed operation.
    Refund,
    /// One-off grant (e.g. welcome credits).
    Bonus,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earned => write!(f, "earned"),
            Self::Spent => write!(f, "spent"),
            Self::Refund => write!(f, "refund"),
            Self::Bonus => write!(f, "bonus"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earned" => Ok(Self::Earned),
            "spent" => Ok(Self::Spent),
            "refund" => Ok(Self::Refund),
            "bonus" => Ok(Self::Bonus),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Kinds of grants accepted by the ledger's credit operation.
///
/// A `spent` row can only be produced by a debit, so grants get their
/// own enum instead of reusing [`TransactionType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    /// Subscription or promotional grant; bumps the earned counters.
    Earned,
    /// Debit reversal; restores the balance only.
    Refund,
    /// One-off grant; bumps the earned counters.
    Bonus,
}

impl From<GrantKind> for TransactionType {
    fn from(kind: GrantKind) -> Self {
        match kind {
            GrantKind::Earned => Self::Earned,
            GrantKind::Refund => Self::Refund,
            GrantKind::Bonus => Self::Bonus,
        }
    }
}

impl GrantKind {
    /// Whether this grant counts toward the earned counters.
    #[must_use]
    pub const fn counts_as_earned(&self) -> bool {
        matches!(self, Self::Earned | Self::Bonus)
    }
}

/// What a transaction refers back to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReference {
    /// Referenced entity id (e.g. a render).
    pub reference_id: Uuid,
    /// Referenced entity kind (e.g. `"render"`).
    pub reference_type: &'static str,
}

impl TransactionReference {
    /// Reference to a render.
    #[must_use]
    pub fn render(id: RenderId) -> Self {
        Self {
            reference_id: *id.as_uuid(),
            reference_type: "render",
        }
    }
}

/// An immutable ledger log row. Created once per balance mutation;
/// never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    /// Row id.
    pub id: i64,
    /// Owning user.
    pub user_id: Uuid,
    /// Signed amount: positive for grants, negative for debits.
    pub amount: i64,
    /// Transaction kind.
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Human-readable description.
    pub description: String,
    /// Referenced entity id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<Uuid>,
    /// Referenced entity kind, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Subscription tier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Free tier: completed renders are published to the public gallery.
    Free,
    /// Pro tier: renders stay private unless explicitly published.
    Pro,
}

impl SubscriptionTier {
    /// Returns `true` for the pro tier.
    #[must_use]
    pub const fn is_pro(&self) -> bool {
        matches!(self, Self::Pro)
    }
}

/// Public-visibility wrapper around a completed render.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    /// Row id.
    pub id: Uuid,
    /// The wrapped render.
    pub render_id: RenderId,
    /// Owning user.
    pub user_id: Uuid,
    /// Whether the item is publicly visible.
    pub is_public: bool,
    /// Like counter, independent of the render.
    pub likes: i64,
    /// View counter, independent of the render.
    pub views: i64,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn grant_kinds_map_to_transaction_types() {
        assert_eq!(
            TransactionType::from(GrantKind::Earned),
            TransactionType::Earned
        );
        assert_eq!(
            TransactionType::from(GrantKind::Refund),
            TransactionType::Refund
        );
        assert_eq!(
            TransactionType::from(GrantKind::Bonus),
            TransactionType::Bonus
        );
    }

    #[test]
    fn refunds_do_not_count_as_earned() {
        assert!(GrantKind::Earned.counts_as_earned());
        assert!(GrantKind::Bonus.counts_as_earned());
        assert!(!GrantKind::Refund.counts_as_earned());
    }

    #[test]
    fn transaction_type_round_trips_as_text() {
        for tx in [
            TransactionType::Earned,
            TransactionType::Spent,
            TransactionType::Refund,
            TransactionType::Bonus,
        ] {
            let Ok(parsed) = tx.to_string().parse::<TransactionType>() else {
                panic!("round trip failed for {tx}");
            };
            assert_eq!(parsed, tx);
        }
    }
}
