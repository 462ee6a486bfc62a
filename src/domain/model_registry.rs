//! Static catalog of supported generation models with pure credit
//! pricing.
//!
//! Credits are derived from the provider's USD cost through a fixed
//! markup/exchange formula and always rounded up so fractional costs are
//! never under-charged:
//!
//! ```text
//! credits = ceil(usd * MARKUP * USD_TO_INR / INR_PER_CREDIT)
//! ```
//!
//! The `"auto"` sentinel is resolved to a concrete default model id by
//! [`ModelRegistry::resolve`] *before* any pricing; the cost function
//! never sees it. Unknown model ids resolve to `None` and callers fall
//! back to the fixed fallback rates below.

use serde::Serialize;
use utoipa::ToSchema;

use super::render::{Quality, RenderKind};

/// Markup multiplier applied to the provider's USD cost.
pub const MARKUP: f64 = 2.0;
/// Exchange rate: 1 USD = 100 INR.
pub const USD_TO_INR: f64 = 100.0;
/// Credit price: 1 credit = 5 INR.
pub const INR_PER_CREDIT: f64 = 5.0;

/// Sentinel model id requesting automatic model selection.
pub const AUTO_MODEL_ID: &str = "auto";

/// Default model used when an image request carries no (or the auto)
/// model id.
pub const DEFAULT_IMAGE_MODEL_ID: &str = "gemini-3-pro-image-preview";
/// Default model used when a video request carries no (or the auto)
/// model id.
pub const DEFAULT_VIDEO_MODEL_ID: &str = "veo-3.1-generate-preview";

/// Fallback video rate when the requested model id is unknown.
pub const FALLBACK_VIDEO_CREDITS_PER_SECOND: i64 = 16;
/// Fallback image base cost when the requested model id is unknown;
/// multiplied by 1/2/3 for standard/high/ultra quality.
pub const FALLBACK_IMAGE_BASE_CREDITS: i64 = 5;

/// Converts a USD cost into whole credits, rounding up.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn usd_to_credits(usd: f64) -> i64 {
    ((usd * MARKUP * USD_TO_INR) / INR_PER_CREDIT).ceil() as i64
}

/// Output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum Resolution {
    /// 1024-class output.
    #[serde(rename = "1K")]
    R1k,
    /// 2048-class output.
    #[serde(rename = "2K")]
    R2k,
    /// 4096-class output.
    #[serde(rename = "4K")]
    R4k,
}

impl From<Quality> for Resolution {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Standard => Self::R1k,
            Quality::High => Self::R2k,
            Quality::Ultra => Self::R4k,
        }
    }
}

/// Relative generation speed of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    /// Optimized for latency.
    Fast,
    /// Quality-first.
    Standard,
}

/// USD pricing for one model. For image models `base_usd` is the cost
/// per image (at 1K/2K); for video models it is the cost per second.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct Pricing {
    /// Base cost in USD.
    pub base_usd: f64,
    /// 4K-tier cost per image, where supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub four_k_usd: Option<f64>,
}

/// Capability flags for one model.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct Capabilities {
    /// Resolutions the model can produce.
    #[schema(value_type = Vec<Resolution>)]
    pub resolutions: &'static [Resolution],
    /// Aspect ratios the model accepts.
    #[schema(value_type = Vec<String>)]
    pub aspect_ratios: &'static [&'static str],
    /// Whether generated video carries synchronized audio.
    pub audio: bool,
    /// Whether the model accepts an input image for editing/first-frame.
    pub image_input: bool,
    /// Relative speed.
    pub speed: Speed,
}

/// Pricing inputs for one generation request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostParams {
    /// Requested quality tier (image models).
    pub quality: Option<Quality>,
    /// Requested clip length in seconds (video models).
    pub duration_secs: Option<u8>,
}

impl CostParams {
    /// Pricing inputs for an image request.
    #[must_use]
    pub fn for_image(quality: Quality) -> Self {
        Self {
            quality: Some(quality),
            duration_secs: None,
        }
    }

    /// Pricing inputs for a video request.
    #[must_use]
    pub fn for_video(duration_secs: u8) -> Self {
        Self {
            quality: None,
            duration_secs: Some(duration_secs),
        }
    }
}

/// Static configuration for one generation model.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ModelConfig {
    /// Stable model identifier.
    pub id: &'static str,
    /// Human-readable model name.
    pub name: &'static str,
    /// Artifact kind the model produces.
    pub kind: RenderKind,
    /// Short description for the catalog endpoint.
    pub description: &'static str,
    /// USD pricing.
    pub pricing: Pricing,
    /// Capability flags.
    pub capabilities: Capabilities,
}

impl ModelConfig {
    /// Computes the credit cost of one generation with this model.
    ///
    /// Pure and deterministic: image cost depends only on the quality
    /// tier (4K models price the ultra tier from `four_k_usd`), video
    /// cost is per-second times the clip length. The result is always a
    /// non-negative integer, rounded up.
    #[must_use]
    pub fn credit_cost(&self, params: &CostParams) -> i64 {
        match self.kind {
            RenderKind::Image => {
                let quality = params.quality.unwrap_or_default();
                let usd = match (Resolution::from(quality), self.pricing.four_k_usd) {
                    (Resolution::R4k, Some(four_k)) => four_k,
                    _ => self.pricing.base_usd,
                };
                usd_to_credits(usd)
            }
            RenderKind::Video => {
                let duration = f64::from(params.duration_secs.unwrap_or(5));
                usd_to_credits(self.pricing.base_usd * duration)
            }
        }
    }

    /// Returns `true` if the model can produce the given quality tier.
    #[must_use]
    pub fn supports_quality(&self, quality: Quality) -> bool {
        self.capabilities
            .resolutions
            .contains(&Resolution::from(quality))
    }

    /// Returns `true` if the model accepts the given aspect ratio.
    #[must_use]
    pub fn supports_aspect_ratio(&self, ratio: &str) -> bool {
        self.capabilities.aspect_ratios.contains(&ratio)
    }
}

const IMAGE_ASPECT_RATIOS: &[&str] = &[
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];
const VIDEO_ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1"];

/// The supported model catalog. Defaults per kind come first.
const MODELS: &[ModelConfig] = &[
    ModelConfig {
        id: DEFAULT_IMAGE_MODEL_ID,
        name: "Gemini 3 Pro Image",
        kind: RenderKind::Image,
        description: "Highest-quality image model with 4K output and text rendering",
        pricing: Pricing {
            base_usd: 0.134,
            four_k_usd: Some(0.24),
        },
        capabilities: Capabilities {
            resolutions: &[Resolution::R1k, Resolution::R2k, Resolution::R4k],
            aspect_ratios: IMAGE_ASPECT_RATIOS,
            audio: false,
            image_input: true,
            speed: Speed::Standard,
        },
    },
    ModelConfig {
        id: "gemini-2.5-flash-image",
        name: "Gemini 2.5 Flash Image",
        kind: RenderKind::Image,
        description: "Fast, cost-effective image model limited to 1K output",
        pricing: Pricing {
            base_usd: 0.039,
            four_k_usd: None,
        },
        capabilities: Capabilities {
            resolutions: &[Resolution::R1k],
            aspect_ratios: IMAGE_ASPECT_RATIOS,
            audio: false,
            image_input: true,
            speed: Speed::Fast,
        },
    },
    ModelConfig {
        id: DEFAULT_VIDEO_MODEL_ID,
        name: "Veo 3.1 Standard",
        kind: RenderKind::Video,
        description: "Latest video model with synchronized audio",
        pricing: Pricing {
            base_usd: 0.40,
            four_k_usd: None,
        },
        capabilities: Capabilities {
            resolutions: &[Resolution::R1k],
            aspect_ratios: VIDEO_ASPECT_RATIOS,
            audio: true,
            image_input: true,
            speed: Speed::Standard,
        },
    },
    ModelConfig {
        id: "veo-3.1-fast-generate-preview",
        name: "Veo 3.1 Fast",
        kind: RenderKind::Video,
        description: "Fast Veo 3.1 variant with good quality",
        pricing: Pricing {
            base_usd: 0.15,
            four_k_usd: None,
        },
        capabilities: Capabilities {
            resolutions: &[Resolution::R1k],
            aspect_ratios: VIDEO_ASPECT_RATIOS,
            audio: true,
            image_input: true,
            speed: Speed::Fast,
        },
    },
    ModelConfig {
        id: "veo-3.0-generate-001",
        name: "Veo 3.0 Standard",
        kind: RenderKind::Video,
        description: "Stable video model without audio",
        pricing: Pricing {
            base_usd: 0.40,
            four_k_usd: None,
        },
        capabilities: Capabilities {
            resolutions: &[Resolution::R1k],
            aspect_ratios: VIDEO_ASPECT_RATIOS,
            audio: false,
            image_input: true,
            speed: Speed::Standard,
        },
    },
    ModelConfig {
        id: "veo-3.0-fast-generate-001",
        name: "Veo 3.0 Fast",
        kind: RenderKind::Video,
        description: "Fast Veo 3.0 variant",
        pricing: Pricing {
            base_usd: 0.15,
            four_k_usd: None,
        },
        capabilities: Capabilities {
            resolutions: &[Resolution::R1k],
            aspect_ratios: VIDEO_ASPECT_RATIOS,
            audio: false,
            image_input: true,
            speed: Speed::Fast,
        },
    },
];

/// The static model catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegistry;

impl ModelRegistry {
    /// Creates the registry.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Looks up a model by id. Unknown ids return `None`; callers must
    /// treat that as a fallback-pricing condition, not an error.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'static ModelConfig> {
        MODELS.iter().find(|m| m.id == id)
    }

    /// Returns all models of the given kind, defaults first.
    #[must_use]
    pub fn by_kind(&self, kind: RenderKind) -> Vec<&'static ModelConfig> {
        MODELS.iter().filter(|m| m.kind == kind).collect()
    }

    /// Returns the whole catalog.
    #[must_use]
    pub fn all(&self) -> &'static [ModelConfig] {
        MODELS
    }

    /// Resolves a requested model id to a concrete catalog entry.
    ///
    /// An absent id or the `"auto"` sentinel resolves to the default
    /// model for the kind, so pricing is always computed against a
    /// concrete model. An id of the wrong kind or one that is not in
    /// the catalog resolves to `None` (fallback pricing).
    #[must_use]
    pub fn resolve(
        &self,
        requested: Option<&str>,
        kind: RenderKind,
    ) -> Option<&'static ModelConfig> {
        let id = match requested {
            None | Some(AUTO_MODEL_ID) | Some("") => match kind {
                RenderKind::Image => DEFAULT_IMAGE_MODEL_ID,
                RenderKind::Video => DEFAULT_VIDEO_MODEL_ID,
            },
            Some(other) => other,
        };
        self.get(id).filter(|m| m.kind == kind)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn model(id: &str) -> &'static ModelConfig {
        let Some(model) = ModelRegistry::new().get(id) else {
            panic!("model {id} missing from catalog");
        };
        model
    }

    #[test]
    fn usd_conversion_rounds_up() {
        // 0.134 * 2 * 100 / 5 = 5.36 → 6
        assert_eq!(usd_to_credits(0.134), 6);
        // 0.039 * 40 = 1.56 → 2
        assert_eq!(usd_to_credits(0.039), 2);
        // exact integers stay exact
        assert_eq!(usd_to_credits(0.25), 10);
        assert_eq!(usd_to_credits(0.0), 0);
    }

    #[test]
    fn video_cost_is_per_second() {
        let veo = model(DEFAULT_VIDEO_MODEL_ID);
        // $0.40/s ⇒ 16 credits/s
        assert_eq!(veo.credit_cost(&CostParams::for_video(4)), 64);
        assert_eq!(veo.credit_cost(&CostParams::for_video(6)), 96);
        assert_eq!(veo.credit_cost(&CostParams::for_video(8)), 128);

        let fast = model("veo-3.1-fast-generate-preview");
        assert_eq!(fast.credit_cost(&CostParams::for_video(8)), 48);
    }

    #[test]
    fn image_cost_follows_quality_tier() {
        let pro = model(DEFAULT_IMAGE_MODEL_ID);
        assert_eq!(pro.credit_cost(&CostParams::for_image(Quality::Standard)), 6);
        assert_eq!(pro.credit_cost(&CostParams::for_image(Quality::High)), 6);
        // 4K tier: 0.24 * 40 = 9.6 → 10
        assert_eq!(pro.credit_cost(&CostParams::for_image(Quality::Ultra)), 10);

        let flash = model("gemini-2.5-flash-image");
        assert_eq!(
            flash.credit_cost(&CostParams::for_image(Quality::Standard)),
            2
        );
    }

    #[test]
    fn cost_is_monotonic_in_quality_and_duration() {
        for m in ModelRegistry::new().by_kind(RenderKind::Image) {
            let standard = m.credit_cost(&CostParams::for_image(Quality::Standard));
            let high = m.credit_cost(&CostParams::for_image(Quality::High));
            let ultra = m.credit_cost(&CostParams::for_image(Quality::Ultra));
            assert!(standard > 0);
            assert!(standard <= high && high <= ultra, "{} not monotonic", m.id);
        }
        for m in ModelRegistry::new().by_kind(RenderKind::Video) {
            let mut last = 0;
            for secs in [4u8, 6, 8] {
                let cost = m.credit_cost(&CostParams::for_video(secs));
                assert!(cost > last, "{} not monotonic at {secs}s", m.id);
                last = cost;
            }
        }
    }

    #[test]
    fn resolve_maps_auto_and_absent_to_defaults() {
        let registry = ModelRegistry::new();
        let Some(video) = registry.resolve(Some(AUTO_MODEL_ID), RenderKind::Video) else {
            panic!("auto must resolve");
        };
        assert_eq!(video.id, DEFAULT_VIDEO_MODEL_ID);

        let Some(image) = registry.resolve(None, RenderKind::Image) else {
            panic!("absent id must resolve");
        };
        assert_eq!(image.id, DEFAULT_IMAGE_MODEL_ID);
    }

    #[test]
    fn resolve_rejects_unknown_and_wrong_kind() {
        let registry = ModelRegistry::new();
        assert!(registry.resolve(Some("nonexistent"), RenderKind::Video).is_none());
        assert!(
            registry
                .resolve(Some(DEFAULT_IMAGE_MODEL_ID), RenderKind::Video)
                .is_none()
        );
    }

    #[test]
    fn flash_image_is_limited_to_1k() {
        let flash = model("gemini-2.5-flash-image");
        assert!(flash.supports_quality(Quality::Standard));
        assert!(!flash.supports_quality(Quality::High));
        assert!(!flash.supports_quality(Quality::Ultra));
        assert!(flash.supports_aspect_ratio("21:9"));
        assert!(!flash.supports_aspect_ratio("2:1"));
    }
}
