//! The render entity and its typed settings.
//!
//! A [`Render`] records one generation attempt: created in
//! [`RenderStatus::Pending`], moved to `Processing` as soon as the
//! pipeline starts, and finished in exactly one of the terminal states
//! `Completed` or `Failed`. Terminal states never transition again.
//!
//! Settings are a tagged union keyed by render kind: image and video
//! settings have disjoint fields and are validated at the API boundary
//! instead of being carried as an open-ended object.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::render_id::{ChainId, RenderId};

/// What kind of artifact a render produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    /// A single generated image.
    Image,
    /// A generated video clip.
    Video,
}

impl fmt::Display for RenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Lifecycle state of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    /// Row created, pipeline not yet started.
    Pending,
    /// Generation in flight.
    Processing,
    /// Output persisted; `output_url`/`output_key` are set.
    Completed,
    /// Pipeline failed; `error` holds the failure detail.
    Failed,
}

impl RenderStatus {
    /// Returns `true` for the terminal states `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RenderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown render status: {other}")),
        }
    }
}

/// Requested output quality tier. Maps onto model resolutions as
/// standard→1K, high→2K, ultra→4K.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// 1K output.
    Standard,
    /// 2K output.
    High,
    /// 4K output.
    Ultra,
}

impl Default for Quality {
    fn default() -> Self {
        Self::Standard
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            other => Err(format!("unknown quality: {other}")),
        }
    }
}

/// Video clip length in seconds. The provider supports exactly 4, 6, or
/// 8; anything else is rejected at the boundary before a remote call is
/// made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(into = "u8", try_from = "u8")]
pub enum VideoDuration {
    /// 4-second clip.
    Four,
    /// 6-second clip.
    Six,
    /// 8-second clip.
    Eight,
}

impl VideoDuration {
    /// Validation message returned for out-of-range durations.
    pub const INVALID_MESSAGE: &'static str = "Duration must be 4, 6, or 8 seconds";

    /// Returns the duration in whole seconds.
    #[must_use]
    pub const fn seconds(&self) -> u8 {
        match self {
            Self::Four => 4,
            Self::Six => 6,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u8> for VideoDuration {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Four),
            6 => Ok(Self::Six),
            8 => Ok(Self::Eight),
            _ => Err(Self::INVALID_MESSAGE.to_string()),
        }
    }
}

impl From<VideoDuration> for u8 {
    fn from(value: VideoDuration) -> Self {
        value.seconds()
    }
}

/// Frame aspect ratio for video generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum VideoAspectRatio {
    /// Landscape 16:9.
    #[serde(rename = "16:9")]
    Wide,
    /// Portrait 9:16.
    #[serde(rename = "9:16")]
    Tall,
    /// Square 1:1.
    #[serde(rename = "1:1")]
    Square,
}

impl Default for VideoAspectRatio {
    fn default() -> Self {
        Self::Wide
    }
}

impl fmt::Display for VideoAspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wide => write!(f, "16:9"),
            Self::Tall => write!(f, "9:16"),
            Self::Square => write!(f, "1:1"),
        }
    }
}

impl FromStr for VideoAspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(Self::Wide),
            "9:16" => Ok(Self::Tall),
            "1:1" => Ok(Self::Square),
            other => Err(format!("unsupported aspect ratio: {other}")),
        }
    }
}

/// How a video generation sources its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationType {
    /// Prompt only.
    TextToVideo,
    /// A single uploaded image drives the first frame.
    ImageToVideo,
    /// An ordered set of keyframes drives the clip.
    KeyframeSequence,
}

impl Default for GenerationType {
    fn default() -> Self {
        Self::TextToVideo
    }
}

impl FromStr for GenerationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-to-video" => Ok(Self::TextToVideo),
            "image-to-video" => Ok(Self::ImageToVideo),
            "keyframe-sequence" => Ok(Self::KeyframeSequence),
            other => Err(format!("unknown generation type: {other}")),
        }
    }
}

/// Settings for an image render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSettings {
    /// Concrete model id the request was priced and executed against.
    pub model: String,
    /// Optional visual style hint (e.g. `"realistic"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Output quality tier.
    pub quality: Quality,
    /// Free-form aspect ratio, validated against model capabilities
    /// when the model is known.
    pub aspect_ratio: String,
    /// Optional negative prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Optional deterministic seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
}

/// Settings for a video render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    /// Concrete model id the request was priced and executed against.
    pub model: String,
    /// Clip length.
    pub duration: VideoDuration,
    /// Frame aspect ratio.
    pub aspect_ratio: VideoAspectRatio,
    /// Frame sourcing mode.
    pub generation_type: GenerationType,
}

/// Per-render settings, keyed by render kind.
///
/// Image and video settings have disjoint fields; the tag makes the
/// stored JSON self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderSettings {
    /// Image generation settings.
    Image(ImageSettings),
    /// Video generation settings.
    Video(VideoSettings),
}

impl RenderSettings {
    /// Returns the render kind this settings payload belongs to.
    #[must_use]
    pub const fn kind(&self) -> RenderKind {
        match self {
            Self::Image(_) => RenderKind::Image,
            Self::Video(_) => RenderKind::Video,
        }
    }

    /// Returns the concrete model id recorded in the settings.
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::Image(s) => &s.model,
            Self::Video(s) => &s.model,
        }
    }
}

/// One generation attempt and its resulting artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Render {
    /// Unique render identifier (immutable after creation).
    pub id: RenderId,
    /// Project this render belongs to.
    pub project_id: uuid::Uuid,
    /// Owning user.
    pub user_id: uuid::Uuid,
    /// Artifact kind.
    pub kind: RenderKind,
    /// The generation prompt.
    pub prompt: String,
    /// Typed settings union.
    pub settings: RenderSettings,
    /// Lifecycle state.
    pub status: RenderStatus,
    /// Failure detail, set when `status` is `Failed`.
    pub error: Option<String>,
    /// Durable URL of the output artifact, set on completion.
    pub output_url: Option<String>,
    /// Storage key of the output artifact, set on completion.
    pub output_key: Option<String>,
    /// Durable URL of the uploaded source asset, if any.
    pub source_url: Option<String>,
    /// Storage key of the uploaded source asset, if any.
    pub source_key: Option<String>,
    /// Storage id of the uploaded source asset, if any.
    pub source_id: Option<uuid::Uuid>,
    /// Chain this render participates in, if any.
    pub chain_id: Option<ChainId>,
    /// 1-based position within the chain; set together with `chain_id`.
    pub chain_position: Option<i32>,
    /// Prior render this one builds on, if any.
    pub reference_render_id: Option<RenderId>,
    /// Wall-clock generation time reported by the provider.
    pub processing_time_ms: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Render {
    /// Creates a new pending render.
    #[must_use]
    pub fn new(
        project_id: uuid::Uuid,
        user_id: uuid::Uuid,
        prompt: String,
        settings: RenderSettings,
        chain: Option<(ChainId, i32)>,
        reference_render_id: Option<RenderId>,
    ) -> Self {
        let now = Utc::now();
        let (chain_id, chain_position) = match chain {
            Some((id, pos)) => (Some(id), Some(pos)),
            None => (None, None),
        };
        Self {
            id: RenderId::new(),
            project_id,
            user_id,
            kind: settings.kind(),
            prompt,
            settings,
            status: RenderStatus::Pending,
            error: None,
            output_url: None,
            output_key: None,
            source_url: None,
            source_key: None,
            source_id: None,
            chain_id,
            chain_position,
            reference_render_id,
            processing_time_ms: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn duration_accepts_only_provider_values() {
        assert_eq!(VideoDuration::try_from(4), Ok(VideoDuration::Four));
        assert_eq!(VideoDuration::try_from(6), Ok(VideoDuration::Six));
        assert_eq!(VideoDuration::try_from(8), Ok(VideoDuration::Eight));
        for bad in [0u8, 1, 5, 7, 9, 60] {
            let Err(msg) = VideoDuration::try_from(bad) else {
                panic!("duration {bad} should be rejected");
            };
            assert_eq!(msg, VideoDuration::INVALID_MESSAGE);
        }
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(RenderStatus::Completed.is_terminal());
        assert!(RenderStatus::Failed.is_terminal());
        assert!(!RenderStatus::Pending.is_terminal());
        assert!(!RenderStatus::Processing.is_terminal());
    }

    #[test]
    fn settings_tag_matches_kind() {
        let settings = RenderSettings::Video(VideoSettings {
            model: "veo-3.1-generate-preview".to_string(),
            duration: VideoDuration::Eight,
            aspect_ratio: VideoAspectRatio::Wide,
            generation_type: GenerationType::TextToVideo,
        });
        assert_eq!(settings.kind(), RenderKind::Video);

        let json = serde_json::to_value(&settings).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("kind"), Some(&serde_json::json!("video")));
        assert_eq!(json.get("duration"), Some(&serde_json::json!(8)));
        assert_eq!(json.get("aspectRatio"), Some(&serde_json::json!("16:9")));
    }

    #[test]
    fn aspect_ratio_parses_supported_values() {
        assert_eq!("16:9".parse(), Ok(VideoAspectRatio::Wide));
        assert_eq!("9:16".parse(), Ok(VideoAspectRatio::Tall));
        assert_eq!("1:1".parse(), Ok(VideoAspectRatio::Square));
        assert!("4:3".parse::<VideoAspectRatio>().is_err());
    }

    #[test]
    fn new_render_starts_pending_without_output() {
        let settings = RenderSettings::Image(ImageSettings {
            model: "gemini-2.5-flash-image".to_string(),
            style: Some("realistic".to_string()),
            quality: Quality::Standard,
            aspect_ratio: "1:1".to_string(),
            negative_prompt: None,
            seed: None,
        });
        let render = Render::new(
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            "a brutalist villa at dusk".to_string(),
            settings,
            Some((ChainId::new(), 1)),
            None,
        );
        assert_eq!(render.status, RenderStatus::Pending);
        assert_eq!(render.kind, RenderKind::Image);
        assert!(render.output_url.is_none());
        assert_eq!(render.chain_position, Some(1));
    }
}
