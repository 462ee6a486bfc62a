//! Credit balance and transaction log endpoints.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::auth::AuthenticatedUser;
use crate::api::dto::{
    CreditBalanceResponse, PaginationMeta, PaginationParams, TransactionListResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /credits` — Current balance snapshot.
///
/// # Errors
///
/// Returns [`GatewayError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/credits",
    tag = "Credits",
    summary = "Get credit balance",
    description = "Returns the caller's balance and lifetime/monthly counters. New accounts are provisioned with the configured welcome credits.",
    responses(
        (status = 200, description = "Balance snapshot", body = CreditBalanceResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, GatewayError> {
    let account = state.ledger.balance(user_id).await?;
    Ok(Json(CreditBalanceResponse::from(account)))
}

/// `GET /credits/transactions` — Transaction log, newest first.
///
/// # Errors
///
/// Returns [`GatewayError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/credits/transactions",
    tag = "Credits",
    summary = "List credit transactions",
    params(PaginationParams),
    responses(
        (status = 200, description = "Transaction log page", body = TransactionListResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let params = params.clamped();
    let data = state
        .ledger
        .transactions(user_id, params.limit(), params.offset())
        .await?;
    Ok(Json(TransactionListResponse {
        data,
        pagination: PaginationMeta {
            page: params.page,
            per_page: params.per_page,
        },
    }))
}

/// Credit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/credits", get(get_balance))
        .route("/credits/transactions", get(list_transactions))
}
