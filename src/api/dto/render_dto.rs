//! Render endpoint DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::render::{RenderSettings, RenderStatus};
use crate::domain::{ChainId, Render, RenderId, RenderKind};
use crate::service::RenderReceipt;

/// Response body for `POST /video` and `POST /renders`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RenderResponse {
    /// Always `true`; failures use the error body instead.
    pub success: bool,
    /// The completed render.
    pub data: RenderReceiptDto,
}

/// The completed-render payload of [`RenderResponse`].
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderReceiptDto {
    /// Render id.
    pub id: RenderId,
    /// Durable output URL.
    pub output_url: String,
    /// Final status (`completed`).
    pub status: RenderStatus,
    /// Provider-reported generation time in milliseconds.
    pub processing_time: i64,
}

impl From<RenderReceipt> for RenderResponse {
    fn from(receipt: RenderReceipt) -> Self {
        Self {
            success: true,
            data: RenderReceiptDto {
                id: receipt.id,
                output_url: receipt.output_url,
                status: receipt.status,
                processing_time: receipt.processing_time_ms,
            },
        }
    }
}

/// Full render detail for the read endpoints.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderDto {
    /// Render id.
    pub id: RenderId,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Artifact kind.
    #[serde(rename = "type")]
    pub kind: RenderKind,
    /// Generation prompt.
    pub prompt: String,
    /// Typed settings union.
    pub settings: RenderSettings,
    /// Lifecycle state.
    pub status: RenderStatus,
    /// Failure detail for failed renders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Durable output URL, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Uploaded source asset URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_image_url: Option<String>,
    /// Chain membership, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,
    /// 1-based position within the chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_position: Option<i32>,
    /// Prior render this one builds on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_render_id: Option<RenderId>,
    /// Provider-reported generation time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<Render> for RenderDto {
    fn from(render: Render) -> Self {
        Self {
            id: render.id,
            project_id: render.project_id,
            kind: render.kind,
            prompt: render.prompt,
            settings: render.settings,
            status: render.status,
            error: render.error,
            output_url: render.output_url,
            uploaded_image_url: render.source_url,
            chain_id: render.chain_id,
            chain_position: render.chain_position,
            reference_render_id: render.reference_render_id,
            processing_time: render.processing_time_ms,
            created_at: render.created_at,
            updated_at: render.updated_at,
        }
    }
}

/// Response body for `GET /chains/{id}/renders`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChainRendersResponse {
    /// Renders ordered by chain position.
    pub data: Vec<RenderDto>,
}
