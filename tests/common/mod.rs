//! Shared test harness: the full router over in-memory persistence, a
//! canned generation client, and a temp-dir artifact store.
//!
//! Mirrors the router construction in `main.rs` so the scenario tests
//! exercise the same stack that production uses, minus the network.

use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tower_http::services::ServeDir;
use uuid::Uuid;

use renderiq_gateway::api;
use renderiq_gateway::app_state::AppState;
use renderiq_gateway::domain::ModelRegistry;
use renderiq_gateway::generation::{
    GeneratedPayload, GenerationClient, GenerationError, GenerationOutput, ImageRequest,
    VideoRequest,
};
use renderiq_gateway::persistence::{
    Authenticator, CreditLedger, MemoryPersistence, RenderStore, SubscriptionTier, Subscriptions,
};
use renderiq_gateway::service::RenderService;
use renderiq_gateway::storage::LocalArtifactStore;

/// What the canned generation client should do.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Return inline artifact bytes.
    Inline,
    /// Fail with the given provider message.
    Fail(String),
}

/// Generation client that replays a single configured outcome.
#[derive(Debug)]
pub struct FakeGeneration {
    outcome: FakeOutcome,
}

impl FakeGeneration {
    fn respond(&self) -> Result<GenerationOutput, GenerationError> {
        match &self.outcome {
            FakeOutcome::Inline => Ok(GenerationOutput {
                payload: GeneratedPayload::Inline {
                    data: b"generated-artifact".to_vec(),
                    mime: "video/mp4".to_string(),
                },
                processing_time_ms: 3100,
            }),
            FakeOutcome::Fail(message) => Err(GenerationError::new(message.clone())),
        }
    }
}

#[async_trait::async_trait]
impl GenerationClient for FakeGeneration {
    async fn generate_image(
        &self,
        _req: &ImageRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        self.respond()
    }

    async fn generate_video(
        &self,
        _req: &VideoRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        self.respond()
    }
}

/// A fully wired test application.
pub struct TestApp {
    /// The router under test.
    pub router: Router,
    /// Direct handle to the shared in-memory persistence.
    pub persistence: Arc<MemoryPersistence>,
    /// Keeps the artifact directory alive for the test's duration.
    pub _artifacts_dir: TempDir,
}

/// Builds the application with the given welcome-credit grant and
/// canned generation outcome.
///
/// # Panics
///
/// Panics if the temporary artifact directory cannot be created.
pub fn build_app(free_credits: i64, outcome: FakeOutcome) -> TestApp {
    let Ok(artifacts_dir) = tempfile::tempdir() else {
        unreachable!("tempdir creation failed");
    };
    let Ok(artifacts) = LocalArtifactStore::new(
        artifacts_dir.path(),
        "http://localhost:3000/files",
    ) else {
        unreachable!("artifact store construction failed");
    };

    let persistence = Arc::new(MemoryPersistence::new(free_credits));
    let registry = ModelRegistry::new();
    let render_service = Arc::new(RenderService::new(
        registry,
        Arc::clone(&persistence) as Arc<dyn CreditLedger>,
        Arc::clone(&persistence) as Arc<dyn RenderStore>,
        Arc::clone(&persistence) as Arc<dyn Subscriptions>,
        Arc::new(FakeGeneration { outcome }),
        Arc::new(artifacts),
    ));

    let state = AppState {
        render_service,
        ledger: Arc::clone(&persistence) as Arc<dyn CreditLedger>,
        store: Arc::clone(&persistence) as Arc<dyn RenderStore>,
        authenticator: Arc::clone(&persistence) as Arc<dyn Authenticator>,
        registry,
    };

    let router = Router::new()
        .merge(api::build_router())
        .nest_service("/files", ServeDir::new(artifacts_dir.path()))
        .with_state(state);

    TestApp {
        router,
        persistence,
        _artifacts_dir: artifacts_dir,
    }
}

impl TestApp {
    /// Registers an API token and returns the user it maps to.
    pub async fn seed_user(&self, token: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.persistence.insert_api_key(token, user_id).await;
        user_id
    }

    /// Puts a user on the pro tier.
    pub async fn make_pro(&self, user_id: Uuid) {
        self.persistence
            .set_tier(user_id, SubscriptionTier::Pro)
            .await;
    }
}

/// Boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "renderiq-test-boundary";

/// Builds a multipart/form-data body from text fields and file parts.
/// Returns the content-type header value and the body bytes.
pub fn multipart_body(
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (
        format!("multipart/form-data; boundary={BOUNDARY}"),
        body,
    )
}
