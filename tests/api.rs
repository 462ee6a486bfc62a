//! Router-level scenario tests for the render pipeline, credit
//! accounting, and gallery publication.

#![allow(clippy::panic)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use common::{FakeOutcome, TestApp, build_app, multipart_body};

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await;
    let Ok(response) = response else {
        panic!("request failed");
    };
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    let Ok(bytes) = bytes else {
        panic!("unreadable response body");
    };
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post_multipart(
    app: &TestApp,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> (StatusCode, Value) {
    let (content_type, body) = multipart_body(fields, files);
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let Ok(request) = builder.body(Body::from(body)) else {
        panic!("request construction failed");
    };
    send(app, request).await
}

async fn get_json(app: &TestApp, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let Ok(request) = builder.body(Body::empty()) else {
        panic!("request construction failed");
    };
    send(app, request).await
}

async fn balance_of(app: &TestApp, token: &str) -> i64 {
    let (status, json) = get_json(app, "/api/v1/credits", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    json.get("balance").and_then(Value::as_i64).unwrap_or(-1)
}

fn video_fields<'a>(project_id: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("prompt", "a slow pan across a courtyard at dusk"),
        ("duration", "8"),
        ("aspectRatio", "16:9"),
        ("generationType", "text-to-video"),
        ("projectId", project_id),
    ]
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = build_app(10, FakeOutcome::Inline);
    let (status, json) = get_json(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.get("status"), Some(&Value::from("healthy")));
}

#[tokio::test]
async fn model_catalog_lists_all_models() {
    let app = build_app(10, FakeOutcome::Inline);
    let (status, json) = get_json(&app, "/config/models", None).await;
    assert_eq!(status, StatusCode::OK);
    let Some(models) = json.as_array() else {
        panic!("catalog should be an array");
    };
    assert_eq!(models.len(), 6);
}

#[tokio::test]
async fn video_without_token_is_unauthorized() {
    let app = build_app(10, FakeOutcome::Inline);
    let project = uuid::Uuid::new_v4().to_string();
    let (status, json) =
        post_multipart(&app, "/api/v1/video", None, &video_fields(&project), &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json.get("error"), Some(&Value::from("Unauthorized")));
}

#[tokio::test]
async fn video_without_prompt_is_rejected_before_any_side_effect() {
    let app = build_app(10, FakeOutcome::Inline);
    let token = "tok-missing-prompt";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();

    let fields = [("duration", "8"), ("projectId", project.as_str())];
    let (status, json) =
        post_multipart(&app, "/api/v1/video", Some(token), &fields, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json.get("error"), Some(&Value::from("Missing required fields")));
    assert_eq!(balance_of(&app, token).await, 10);
}

#[tokio::test]
async fn invalid_duration_is_rejected_without_touching_credits() {
    let app = build_app(1000, FakeOutcome::Inline);
    let token = "tok-bad-duration";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();

    let mut fields = video_fields(&project);
    if let Some(slot) = fields.iter_mut().find(|(name, _)| *name == "duration") {
        slot.1 = "5";
    }
    let (status, json) =
        post_multipart(&app, "/api/v1/video", Some(token), &fields, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json.get("error"),
        Some(&Value::from("Duration must be 4, 6, or 8 seconds"))
    );
    assert_eq!(balance_of(&app, token).await, 1000);
}

#[tokio::test]
async fn insufficient_credits_returns_402_with_amounts() {
    let app = build_app(10, FakeOutcome::Inline);
    let token = "tok-poor";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();

    // 8 seconds at 16 credits/second against a balance of 10.
    let (status, json) =
        post_multipart(&app, "/api/v1/video", Some(token), &video_fields(&project), &[]).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json.get("error"), Some(&Value::from("Insufficient credits")));
    assert_eq!(json.get("required"), Some(&Value::from(128)));
    assert_eq!(json.get("available"), Some(&Value::from(10)));
    assert_eq!(balance_of(&app, token).await, 10);
}

#[tokio::test]
async fn provider_failure_refunds_and_returns_500() {
    let app = build_app(400, FakeOutcome::Fail("provider timeout".to_string()));
    let token = "tok-refund";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();

    let (status, json) =
        post_multipart(&app, "/api/v1/video", Some(token), &video_fields(&project), &[]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json.get("success"), Some(&Value::from(false)));
    assert_eq!(json.get("error"), Some(&Value::from("provider timeout")));

    // Debit and refund cancel out.
    assert_eq!(balance_of(&app, token).await, 400);

    let (status, json) = get_json(&app, "/api/v1/credits/transactions", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    let Some(rows) = json.get("data").and_then(Value::as_array) else {
        panic!("transaction list missing");
    };
    let types: Vec<&str> = rows
        .iter()
        .filter_map(|r| r.get("type").and_then(Value::as_str))
        .collect();
    // Newest first: refund, spent, then the welcome bonus.
    assert_eq!(types, vec!["refund", "spent", "bonus"]);
    let amounts: Vec<i64> = rows
        .iter()
        .filter_map(|r| r.get("amount").and_then(Value::as_i64))
        .collect();
    assert_eq!(amounts, vec![128, -128, 400]);
}

#[tokio::test]
async fn successful_video_completes_and_publishes_for_free_tier() {
    let app = build_app(200, FakeOutcome::Inline);
    let token = "tok-free";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();

    let (status, json) =
        post_multipart(&app, "/api/v1/video", Some(token), &video_fields(&project), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.get("success"), Some(&Value::from(true)));

    let Some(data) = json.get("data") else {
        panic!("response data missing");
    };
    assert_eq!(data.get("status"), Some(&Value::from("completed")));
    let output_url = data.get("outputUrl").and_then(Value::as_str).unwrap_or("");
    assert!(output_url.contains("/files/renders/"));
    assert!(data.get("processingTime").and_then(Value::as_i64).unwrap_or(0) > 0);

    assert_eq!(balance_of(&app, token).await, 200 - 128);

    // The completed render is readable and terminal.
    let id = data.get("id").and_then(Value::as_str).unwrap_or("");
    let (status, render) =
        get_json(&app, &format!("/api/v1/renders/{id}"), Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(render.get("status"), Some(&Value::from("completed")));
    assert_eq!(render.get("outputUrl"), Some(&Value::from(output_url)));

    // Free tier ⇒ public gallery item.
    let (status, gallery) = get_json(&app, "/api/v1/gallery", None).await;
    assert_eq!(status, StatusCode::OK);
    let Some(items) = gallery.get("data").and_then(Value::as_array) else {
        panic!("gallery list missing");
    };
    assert_eq!(items.len(), 1);
    assert_eq!(
        items.first().and_then(|i| i.get("isPublic")),
        Some(&Value::from(true))
    );
}

#[tokio::test]
async fn pro_tier_success_creates_no_gallery_item() {
    let app = build_app(200, FakeOutcome::Inline);
    let token = "tok-pro";
    let user = app.seed_user(token).await;
    app.make_pro(user).await;
    let project = uuid::Uuid::new_v4().to_string();

    let (status, _) =
        post_multipart(&app, "/api/v1/video", Some(token), &video_fields(&project), &[]).await;
    assert_eq!(status, StatusCode::OK);

    let (_, gallery) = get_json(&app, "/api/v1/gallery", None).await;
    let items = gallery
        .get("data")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    assert_eq!(items, 0);
}

#[tokio::test]
async fn chained_videos_are_listed_in_position_order() {
    let app = build_app(1000, FakeOutcome::Inline);
    let token = "tok-chain";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();
    let chain = uuid::Uuid::new_v4().to_string();

    for _ in 0..2 {
        let mut fields = video_fields(&project);
        fields.push(("chainId", chain.as_str()));
        if let Some(slot) = fields.iter_mut().find(|(name, _)| *name == "duration") {
            slot.1 = "4";
        }
        let (status, _) =
            post_multipart(&app, "/api/v1/video", Some(token), &fields, &[]).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) =
        get_json(&app, &format!("/api/v1/chains/{chain}/renders"), Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    let Some(renders) = json.get("data").and_then(Value::as_array) else {
        panic!("chain listing missing");
    };
    let positions: Vec<i64> = renders
        .iter()
        .filter_map(|r| r.get("chainPosition").and_then(Value::as_i64))
        .collect();
    assert_eq!(positions, vec![1, 2]);
}

#[tokio::test]
async fn image_to_video_accepts_an_uploaded_frame() {
    let app = build_app(200, FakeOutcome::Inline);
    let token = "tok-i2v";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();

    let mut fields = video_fields(&project);
    if let Some(slot) = fields.iter_mut().find(|(name, _)| *name == "generationType") {
        slot.1 = "image-to-video";
    }
    let files: [(&str, &str, &[u8]); 1] =
        [("uploadedImage", "frame.jpg", b"jpeg-bytes".as_slice())];
    let (status, json) =
        post_multipart(&app, "/api/v1/video", Some(token), &fields, &files).await;
    assert_eq!(status, StatusCode::OK);

    // The source asset was persisted alongside the output.
    let id = json
        .pointer("/data/id")
        .and_then(Value::as_str)
        .unwrap_or("");
    let (_, render) = get_json(&app, &format!("/api/v1/renders/{id}"), Some(token)).await;
    let uploaded = render
        .get("uploadedImageUrl")
        .and_then(Value::as_str)
        .unwrap_or("");
    assert!(uploaded.contains("/files/uploads/"));
}

#[tokio::test]
async fn image_generation_charges_model_pricing() {
    let app = build_app(100, FakeOutcome::Inline);
    let token = "tok-image";
    let _user = app.seed_user(token).await;
    let project = uuid::Uuid::new_v4().to_string();

    let fields = [
        ("prompt", "a timber-frame atrium, morning light"),
        ("quality", "standard"),
        ("aspectRatio", "16:9"),
        ("projectId", project.as_str()),
    ];
    let (status, json) =
        post_multipart(&app, "/api/v1/renders", Some(token), &fields, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json.pointer("/data/status"),
        Some(&Value::from("completed"))
    );

    // Default image model at standard quality: ceil(0.134 · 40) = 6.
    assert_eq!(balance_of(&app, token).await, 94);
}

#[tokio::test]
async fn unknown_render_returns_404() {
    let app = build_app(10, FakeOutcome::Inline);
    let token = "tok-404";
    let _user = app.seed_user(token).await;
    let (status, json) = get_json(
        &app,
        &format!("/api/v1/renders/{}", uuid::Uuid::new_v4()),
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json.get("error"), Some(&Value::from("Render not found")));
}
