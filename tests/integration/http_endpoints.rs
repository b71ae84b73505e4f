//! Metadata endpoints and HTTP plumbing.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;

use crate::common::{body_json, TestApp};

#[tokio::test]
async fn test_health_reports_live_sessions() {
    let app = TestApp::new();

    let body = body_json(app.get("/health").await).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["transport"], "sse");
    assert_eq!(body["connected_clients"], 0);
    assert_eq!(body["server_info"]["name"], "facebook-scraper-unified-mcp-sse");
    assert_eq!(
        body["tools"],
        json!(["scrape_facebook_posts", "scrape_facebook_comments"])
    );

    let (first, _) = app.connect().await;
    let (_second, _) = app.connect().await;
    let body = body_json(app.get("/health").await).await;
    assert_eq!(body["connected_clients"], 2);

    drop(first);
    let body = body_json(app.get("/health").await).await;
    assert_eq!(body["connected_clients"], 1);
}

#[tokio::test]
async fn test_root_describes_server() {
    let app = TestApp::new();

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "Facebook Scraper Unified MCP Server");
    assert_eq!(body["protocol"], "MCP 2024-11-05");
    assert_eq!(body["endpoints"]["sse"], "/sse");
    assert_eq!(body["endpoints"]["messages"], "/messages");
    assert_eq!(body["endpoints"]["health"], "/health");
    assert_eq!(body["connected_clients"], 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = TestApp::new();
    let (_client, endpoint) = app.connect().await;

    let payload = "x".repeat(2 * 1024 * 1024);
    let request = Request::builder()
        .uri(endpoint)
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_messages_rejects_get() {
    let app = TestApp::new();

    let response = app.get("/messages?session_id=abc").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
