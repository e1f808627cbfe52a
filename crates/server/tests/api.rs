//! Router-level tests driven through tower's oneshot

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use social_gateway::app::{AppState, build_router};
use social_gateway_adapters::{OAuthApp, PinterestAdapter, StubPlatform, tokens::InMemoryTokenStore};
use social_gateway_domain::{Platform, PlatformRegistry};

const API_TOKEN: &str = "test-token";

fn router(vendor_base: &str) -> Router {
    let tokens = Arc::new(InMemoryTokenStore::with_token("pin_board9", "pin-token"));
    let pinterest = PinterestAdapter::with_base_url(
        OAuthApp::new(
            "cid",
            SecretString::new("sec".into()),
            "https://app.example/cb",
        ),
        tokens,
        vendor_base.to_string(),
    );

    let mut registry = PlatformRegistry::new();
    registry.register(Arc::new(pinterest));
    registry.register(Arc::new(StubPlatform::new(Platform::Facebook)));

    build_router(AppState::new(registry, Some(API_TOKEN.to_string())))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {API_TOKEN}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn pinterest_page() -> Value {
    json!({
        "id": "pin_board9",
        "platform": "pinterest",
        "vendor_page_id": "board9",
        "name": "Recipes",
        "auth_token": "pin-token"
    })
}

fn facebook_page() -> Value {
    json!({
        "id": "fb_1",
        "platform": "facebook",
        "vendor_page_id": "1",
        "name": "Page",
        "auth_token": "fb-token"
    })
}

#[tokio::test]
async fn health_needs_no_auth() {
    let app = router("http://unused.invalid");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_bearer_token_is_rejected_before_the_handler() {
    let app = router("http://unused.invalid");

    let request = Request::builder()
        .method("POST")
        .uri("/api/social/publish")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "platform": "pinterest",
                "page": pinterest_page(),
                "content": {"text": "hello"}
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_bearer_token_is_rejected() {
    let app = router("http://unused.invalid");

    let request = Request::builder()
        .method("POST")
        .uri("/api/social/status")
        .header("content-type", "application/json")
        .header("authorization", "Bearer not-the-token")
        .body(Body::from(
            json!({"platform": "facebook", "page": facebook_page()}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_platform_is_a_400() {
    let app = router("http://unused.invalid");

    let response = app
        .oneshot(post_json(
            "/api/social/status",
            json!({"platform": "myspace", "page": facebook_page()}),
        ))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("myspace"));
}

#[tokio::test]
async fn empty_page_id_is_a_400() {
    let app = router("http://unused.invalid");

    let mut page = pinterest_page();
    page["id"] = json!("");

    let response = app
        .oneshot(post_json(
            "/api/social/publish",
            json!({"platform": "pinterest", "page": page, "content": {"text": "x"}}),
        ))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("page.id"));
}

#[tokio::test]
async fn pinterest_publish_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v5/pins"))
        .and(header("Authorization", "Bearer pin-token"))
        .and(body_json(json!({
            "board_id": "board9",
            "description": "hello pin"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "pin_123"})))
        .mount(&server)
        .await;

    let app = router(&server.uri());
    let response = app
        .oneshot(post_json(
            "/api/social/publish",
            json!({
                "platform": "pinterest",
                "page": pinterest_page(),
                "content": {"text": "hello pin"}
            }),
        ))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post_id"], "pin_123");
    assert_eq!(body["status"], "published");
}

#[tokio::test]
async fn vendor_403_passes_through_as_500_with_vendor_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v5/pins"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(r#"{"code":403,"message":"Not authorized to access board."}"#),
        )
        .mount(&server)
        .await;

    let app = router(&server.uri());
    let response = app
        .oneshot(post_json(
            "/api/social/publish",
            json!({
                "platform": "pinterest",
                "page": pinterest_page(),
                "content": {"text": "hello pin"}
            }),
        ))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("Not authorized to access board.")
    );
}

#[tokio::test]
async fn unsupported_capability_is_a_500_with_fixed_message() {
    let app = router("http://unused.invalid");

    let response = app
        .oneshot(post_json(
            "/api/social/stories",
            json!({"platform": "facebook", "page": facebook_page()}),
        ))
        .await
        .unwrap();

    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("is not supported by this platform")
    );
}

#[tokio::test]
async fn delete_post_reports_success() {
    let app = router("http://unused.invalid");

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/social/post")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {API_TOKEN}"))
        .body(Body::from(
            json!({
                "platform": "facebook",
                "page": facebook_page(),
                "post_id": "stub_post_1"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
}

#[tokio::test]
async fn oauth_redirect_packs_workspace_into_state() {
    let app = router("http://unused.invalid");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/social/oauth/facebook?workspaceId=ws42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(location, "https://stub.example/oauth?state=ws42");
}

#[tokio::test]
async fn oauth_redirect_packs_method_into_state() {
    let app = router("http://unused.invalid");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/social/oauth/facebook?workspaceId=ws42&method=direct")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(location.contains("state=ws42%7Cdirect") || location.contains("state=ws42|direct"));
}
