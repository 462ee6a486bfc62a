//! Credit endpoint DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::persistence::{CreditAccount, CreditTransaction};

use super::common_dto::PaginationMeta;

/// Response body for `GET /credits`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalanceResponse {
    /// Spendable credits.
    pub balance: i64,
    /// Lifetime credits granted.
    pub total_earned: i64,
    /// Lifetime credits spent.
    pub total_spent: i64,
    /// Credits granted this billing cycle.
    pub monthly_earned: i64,
    /// Credits spent this billing cycle.
    pub monthly_spent: i64,
}

impl From<CreditAccount> for CreditBalanceResponse {
    fn from(account: CreditAccount) -> Self {
        Self {
            balance: account.balance,
            total_earned: account.total_earned,
            total_spent: account.total_spent,
            monthly_earned: account.monthly_earned,
            monthly_spent: account.monthly_spent,
        }
    }
}

/// Response body for `GET /credits/transactions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Transactions, newest first.
    pub data: Vec<CreditTransaction>,
    /// Pagination echo.
    pub pagination: PaginationMeta,
}
