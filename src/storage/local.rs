//! Filesystem implementation of the artifact store.
//!
//! Artifacts are written under a configurable root directory with keys
//! of the form `{category}/{user_id}/{artifact_id}_{filename}` and are
//! served read-only by the gateway at the configured public base URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::GatewayError;

use super::{ArtifactCategory, ArtifactStore, StoredArtifact};

/// Artifact store backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    public_base_url: String,
    http: reqwest::Client,
}

impl LocalArtifactStore {
    /// Creates a store rooted at `root`, serving URLs under
    /// `public_base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client for remote
    /// fetches cannot be constructed.
    pub fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))?;
        let public_base_url = public_base_url.into();
        Ok(Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Builds the storage key for a new artifact.
    fn make_key(
        category: ArtifactCategory,
        user_id: uuid::Uuid,
        id: uuid::Uuid,
        filename: Option<&str>,
    ) -> String {
        let name = filename.unwrap_or("artifact.bin").replace(['/', '\\'], "_");
        format!("{}/{user_id}/{id}_{name}", category.prefix())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }

    /// Root directory artifacts are written beneath.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        category: ArtifactCategory,
        user_id: uuid::Uuid,
        filename: Option<&str>,
        project_id: Option<uuid::Uuid>,
    ) -> Result<StoredArtifact, GatewayError> {
        let id = uuid::Uuid::new_v4();
        let key = Self::make_key(category, user_id, id, filename);
        let path = self.path_for(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GatewayError::UploadFailed(format!("storage write failed: {e}")))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| GatewayError::UploadFailed(format!("storage write failed: {e}")))?;

        tracing::debug!(%key, size = bytes.len(), project = ?project_id, "artifact stored");

        Ok(StoredArtifact {
            url: self.url_for(&key),
            key,
            id,
        })
    }

    async fn upload_from_url(
        &self,
        url: &str,
        category: ArtifactCategory,
        user_id: uuid::Uuid,
        filename: Option<&str>,
        project_id: Option<uuid::Uuid>,
    ) -> Result<StoredArtifact, GatewayError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::UploadFailed(format!("failed to fetch artifact: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UploadFailed(format!(
                "failed to fetch artifact: {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::UploadFailed(format!("failed to read artifact: {e}")))?;

        self.upload(bytes.to_vec(), category, user_id, filename, project_id)
            .await
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, GatewayError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GatewayError::NotFound(format!("artifact {key}")))
            }
            Err(e) => Err(GatewayError::Persistence(format!(
                "artifact read failed: {e}"
            ))),
        }
    }
}
