//! Generation endpoints: video, image, and render/chain reads.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::auth::AuthenticatedUser;
use crate::api::dto::{ChainRendersResponse, RenderDto, RenderResponse};
use crate::app_state::AppState;
use crate::domain::render::{GenerationType, Quality, VideoAspectRatio, VideoDuration};
use crate::domain::{ChainId, RenderId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{ImageJob, UploadedFile, VideoJob};

/// Text fields and file parts collected from a multipart body.
#[derive(Debug, Default)]
struct RenderForm {
    texts: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl RenderForm {
    /// Reads every multipart field into memory.
    async fn read(mut multipart: Multipart) -> Result<Self, GatewayError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            GatewayError::InvalidRequest(format!("invalid multipart body: {e}"))
        })? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let filename = field.file_name().map(str::to_string);
                let mime = field
                    .content_type()
                    .map_or_else(|| "application/octet-stream".to_string(), str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        GatewayError::InvalidRequest(format!("unreadable file field: {e}"))
                    })?
                    .to_vec();
                form.files.insert(
                    name,
                    UploadedFile {
                        data,
                        mime,
                        filename,
                    },
                );
            } else {
                let value = field.text().await.map_err(|e| {
                    GatewayError::InvalidRequest(format!("unreadable text field: {e}"))
                })?;
                form.texts.insert(name, value);
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str).filter(|s| !s.is_empty())
    }

    /// Parses an optional UUID field; malformed values are ignored,
    /// matching the permissive handling of the optional ids.
    fn uuid(&self, name: &str) -> Option<Uuid> {
        self.text(name).and_then(|s| Uuid::parse_str(s).ok())
    }

    fn file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// Collects `keyframe_0..keyframeCount` in order.
    fn keyframes(&mut self) -> Vec<UploadedFile> {
        let count: usize = self
            .text("keyframeCount")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        (0..count)
            .filter_map(|i| self.files.remove(&format!("keyframe_{i}")))
            .collect()
    }
}

/// `POST /video` — Generate a video clip.
///
/// # Errors
///
/// Returns [`GatewayError`] per the error taxonomy: 400 for invalid
/// input, 401 without a valid token, 402 on insufficient credits, and
/// 500 (with refunded credits) on generation or upload failure.
#[utoipa::path(
    post,
    path = "/api/v1/video",
    tag = "Renders",
    summary = "Generate a video",
    description = "Runs one credit-metered video generation. Multipart fields: prompt, model, duration (4|6|8), aspectRatio, generationType, projectId, chainId, referenceRenderId, isPublic, uploadedImage or keyframeCount + keyframe_N.",
    request_body(content = String, description = "Multipart form data", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Render completed", body = RenderResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 402, description = "Insufficient credits", body = ErrorResponse),
        (status = 500, description = "Generation failed, credits refunded", body = ErrorResponse),
    )
)]
pub async fn generate_video(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, GatewayError> {
    let mut form = RenderForm::read(multipart).await?;

    let (Some(prompt), Some(project_id)) = (form.text("prompt"), form.uuid("projectId")) else {
        return Err(GatewayError::InvalidRequest(
            "Missing required fields".to_string(),
        ));
    };
    let prompt = prompt.to_string();

    let duration_secs: u32 = form
        .text("duration")
        .and_then(|s| s.parse().ok())
        .unwrap_or(8);
    let duration = u8::try_from(duration_secs)
        .ok()
        .and_then(|d| VideoDuration::try_from(d).ok())
        .ok_or_else(|| GatewayError::InvalidRequest(VideoDuration::INVALID_MESSAGE.to_string()))?;

    let aspect_ratio = match form.text("aspectRatio") {
        Some(raw) => VideoAspectRatio::from_str(raw).map_err(GatewayError::InvalidRequest)?,
        None => VideoAspectRatio::default(),
    };
    let generation_type = match form.text("generationType") {
        Some(raw) => GenerationType::from_str(raw).map_err(GatewayError::InvalidRequest)?,
        None => GenerationType::default(),
    };

    let job = VideoJob {
        prompt,
        model: form.text("model").map(str::to_string),
        duration,
        aspect_ratio,
        generation_type,
        project_id,
        chain_id: form.uuid("chainId").map(ChainId::from_uuid),
        reference_render_id: form.uuid("referenceRenderId").map(RenderId::from_uuid),
        uploaded_image: form.file("uploadedImage"),
        keyframes: form.keyframes(),
        is_public: form.text("isPublic").map(|v| v == "true"),
    };

    let receipt = state.render_service.generate_video(user_id, job).await?;
    Ok(Json(RenderResponse::from(receipt)))
}

/// `POST /renders` — Generate an image.
///
/// # Errors
///
/// Returns [`GatewayError`] per the error taxonomy, mirroring the video
/// endpoint.
#[utoipa::path(
    post,
    path = "/api/v1/renders",
    tag = "Renders",
    summary = "Generate an image",
    description = "Runs one credit-metered image generation. Multipart fields: prompt, model, style, quality (standard|high|ultra), aspectRatio, negativePrompt, seed, projectId, chainId, referenceRenderId, isPublic, uploadedImage.",
    request_body(content = String, description = "Multipart form data", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Render completed", body = RenderResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 402, description = "Insufficient credits", body = ErrorResponse),
        (status = 500, description = "Generation failed, credits refunded", body = ErrorResponse),
    )
)]
pub async fn generate_image(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, GatewayError> {
    let mut form = RenderForm::read(multipart).await?;

    let (Some(prompt), Some(project_id)) = (form.text("prompt"), form.uuid("projectId")) else {
        return Err(GatewayError::InvalidRequest(
            "Missing required fields".to_string(),
        ));
    };
    let prompt = prompt.to_string();

    let quality = match form.text("quality") {
        Some(raw) => Quality::from_str(raw).map_err(GatewayError::InvalidRequest)?,
        None => Quality::default(),
    };
    let seed = match form.text("seed") {
        Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
            GatewayError::InvalidRequest("Invalid seed value".to_string())
        })?),
        None => None,
    };

    let job = ImageJob {
        prompt,
        model: form.text("model").map(str::to_string),
        quality,
        aspect_ratio: form
            .text("aspectRatio")
            .unwrap_or("1:1")
            .to_string(),
        style: form.text("style").map(str::to_string),
        negative_prompt: form.text("negativePrompt").map(str::to_string),
        seed,
        project_id,
        chain_id: form.uuid("chainId").map(ChainId::from_uuid),
        reference_render_id: form.uuid("referenceRenderId").map(RenderId::from_uuid),
        uploaded_image: form.file("uploadedImage"),
        is_public: form.text("isPublic").map(|v| v == "true"),
    };

    let receipt = state.render_service.generate_image(user_id, job).await?;
    Ok(Json(RenderResponse::from(receipt)))
}

/// `GET /renders/:id` — Render detail.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the render does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/renders/{id}",
    tag = "Renders",
    summary = "Get render details",
    params(
        ("id" = uuid::Uuid, Path, description = "Render UUID"),
    ),
    responses(
        (status = 200, description = "Render details", body = RenderDto),
        (status = 404, description = "Render not found", body = ErrorResponse),
    )
)]
pub async fn get_render(
    State(state): State<AppState>,
    AuthenticatedUser(_user_id): AuthenticatedUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let render = state
        .store
        .render(RenderId::from_uuid(id))
        .await?
        .ok_or_else(|| GatewayError::NotFound("Render".to_string()))?;
    Ok(Json(RenderDto::from(render)))
}

/// `GET /chains/:id/renders` — Ordered chain listing.
///
/// # Errors
///
/// Returns [`GatewayError`] on storage failures.
#[utoipa::path(
    get,
    path = "/api/v1/chains/{id}/renders",
    tag = "Renders",
    summary = "List renders in a chain",
    description = "Returns the chain's renders ordered by chain position.",
    params(
        ("id" = uuid::Uuid, Path, description = "Chain UUID"),
    ),
    responses(
        (status = 200, description = "Chain renders", body = ChainRendersResponse),
    )
)]
pub async fn chain_renders(
    State(state): State<AppState>,
    AuthenticatedUser(_user_id): AuthenticatedUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let renders = state
        .store
        .renders_in_chain(ChainId::from_uuid(id))
        .await?;
    Ok(Json(ChainRendersResponse {
        data: renders.into_iter().map(RenderDto::from).collect(),
    }))
}

/// Render routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/video", post(generate_video))
        .route("/renders", post(generate_image))
        .route("/renders/{id}", get(get_render))
        .route("/chains/{id}/renders", get(chain_renders))
}
