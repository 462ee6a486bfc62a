//! Public gallery endpoints.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::{PaginationMeta, PaginationParams};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::persistence::GalleryItem;

/// Response body for `GET /gallery`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GalleryListResponse {
    /// Public gallery items, newest first.
    pub data: Vec<GalleryItem>,
    /// Pagination echo.
    pub pagination: PaginationMeta,
}

/// `GET /gallery` — Public gallery, newest first.
///
/// # Errors
///
/// Returns [`GatewayError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/gallery",
    tag = "Gallery",
    summary = "List public gallery items",
    params(PaginationParams),
    responses(
        (status = 200, description = "Gallery page", body = GalleryListResponse),
    )
)]
pub async fn list_gallery(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let params = params.clamped();
    let data = state
        .store
        .public_gallery(params.limit(), params.offset())
        .await?;
    Ok(Json(GalleryListResponse {
        data,
        pagination: PaginationMeta {
            page: params.page,
            per_page: params.per_page,
        },
    }))
}

/// `POST /gallery/:id/like` — Atomically increment an item's likes.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] for unknown items.
#[utoipa::path(
    post,
    path = "/api/v1/gallery/{id}/like",
    tag = "Gallery",
    summary = "Like a gallery item",
    params(
        ("id" = uuid::Uuid, Path, description = "Gallery item UUID"),
    ),
    responses(
        (status = 200, description = "Updated item", body = GalleryItem),
        (status = 404, description = "Item not found", body = ErrorResponse),
    )
)]
pub async fn like_item(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let item = state.store.like_gallery_item(id).await?;
    Ok(Json(item))
}

/// Gallery routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/gallery", get(list_gallery))
        .route("/gallery/{id}/like", post(like_item))
}
