//! REST endpoint handlers organized by resource.

pub mod credits;
pub mod gallery;
pub mod render;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(render::routes())
        .merge(credits::routes())
        .merge(gallery::routes())
}
