//! Service layer: the generation request orchestrator.
//!
//! [`RenderService`] coordinates pricing, credit reservation, provider
//! calls, artifact persistence, and render bookkeeping for each
//! request.

pub mod render_service;

pub use render_service::{ImageJob, RenderReceipt, RenderService, UploadedFile, VideoJob};
