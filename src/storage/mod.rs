//! Artifact store: durable object storage for inputs and outputs.
//!
//! Provider-hosted artifact URLs are ephemeral, so the orchestrator
//! never persists one as a permanent `output_url`: inline bytes are
//! uploaded directly and remote URLs are fetched and re-uploaded through
//! [`ArtifactStore::upload_from_url`].

pub mod local;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::GatewayError;

pub use local::LocalArtifactStore;

/// Which bucket an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactCategory {
    /// User-supplied source assets.
    Uploads,
    /// Generated render outputs.
    Renders,
}

impl ArtifactCategory {
    /// Key prefix for this category.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Uploads => "uploads",
            Self::Renders => "renders",
        }
    }
}

/// A durably stored artifact.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    /// Public URL the artifact is reachable at.
    pub url: String,
    /// Storage key (stable, category-prefixed).
    pub key: String,
    /// Storage row identifier.
    pub id: uuid::Uuid,
}

/// Durable object storage for render inputs and outputs.
#[async_trait]
pub trait ArtifactStore: Send + Sync + std::fmt::Debug {
    /// Stores raw bytes and returns the durable location.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UploadFailed`] when the storage write
    /// fails.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        category: ArtifactCategory,
        user_id: uuid::Uuid,
        filename: Option<&str>,
        project_id: Option<uuid::Uuid>,
    ) -> Result<StoredArtifact, GatewayError>;

    /// Fetches a remote URL and re-uploads the bytes into durable
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UploadFailed`] when the remote fetch
    /// returns a non-2xx status or the storage write fails.
    async fn upload_from_url(
        &self,
        url: &str,
        category: ArtifactCategory,
        user_id: uuid::Uuid,
        filename: Option<&str>,
        project_id: Option<uuid::Uuid>,
    ) -> Result<StoredArtifact, GatewayError>;

    /// Reads back a stored artifact by key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for unknown keys and
    /// [`GatewayError::Persistence`] on read failures.
    async fn download(&self, key: &str) -> Result<Vec<u8>, GatewayError>;
}
