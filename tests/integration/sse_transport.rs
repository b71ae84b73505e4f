//! SSE session lifecycle tests: endpoint discovery, response correlation,
//! heartbeats and teardown.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use facebook_scraper_mcp::config::Config;
use serde_json::{json, Value};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tower::ServiceExt;

use crate::common::{body_json, rpc, sample_posts, FakeActor, Gate, RunBehavior, TestApp};

#[tokio::test]
async fn test_initialize_round_trip() {
    let app = TestApp::new();
    let (mut client, endpoint) = app.connect().await;

    assert!(endpoint.starts_with("/messages?session_id="));

    let response = app
        .post(
            &endpoint,
            rpc(
                json!(1),
                "initialize",
                json!({ "protocolVersion": "2024-11-05", "clientInfo": { "name": "n8n" } }),
            ),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "message_queued" }));

    let event = client.next_event().await;
    assert_eq!(event.event.as_deref(), Some("message"));

    let message = event.json();
    assert_eq!(message["jsonrpc"], "2.0");
    assert_eq!(message["id"], 1);
    assert_eq!(message["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(
        message["result"]["serverInfo"]["name"],
        "facebook-scraper-unified-mcp-sse"
    );
}

#[tokio::test]
async fn test_stream_headers() {
    let app = TestApp::new();
    let response = app.get("/sse").await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");
}

#[tokio::test]
async fn test_tool_call_result_is_delivered() {
    let app = TestApp::new();
    let (mut client, endpoint) = app.connect().await;

    app.post(
        &endpoint,
        rpc(
            json!("call-1"),
            "tools/call",
            json!({
                "name": "scrape_facebook_posts",
                "arguments": { "startUrls": ["https://www.facebook.com/nasa"], "resultsLimit": 2 }
            }),
        ),
    )
    .await;

    let message = client.next_event().await.json();
    assert_eq!(message["id"], "call-1");

    let text: Value =
        serde_json::from_str(message["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text["success"], true);
    assert_eq!(text["total"], 2);
    assert_eq!(text["posts"][0]["likesCount"], 1200);
    assert_eq!(text["posts"][1]["commentsCount"], 0);

    let calls = app.actor.calls.lock().unwrap();
    assert_eq!(calls[0].0, "apify/facebook-posts-scraper");
    assert_eq!(calls[0].1["resultsLimit"], 2);
}

#[tokio::test]
async fn test_unknown_tool_error_is_delivered() {
    let app = TestApp::new();
    let (mut client, endpoint) = app.connect().await;

    let response = app
        .post(
            &endpoint,
            rpc(json!(9), "tools/call", json!({ "name": "scrape_myspace" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let message = client.next_event().await.json();
    assert_eq!(message["id"], 9);
    assert_eq!(message["error"]["code"], -32601);
    assert!(message.get("result").is_none());
}

#[tokio::test]
async fn test_per_session_fifo() {
    let app = TestApp::new();
    let (mut client, endpoint) = app.connect().await;

    for id in 1..=5 {
        app.post(&endpoint, rpc(json!(id), "tools/list", json!({})))
            .await;
    }

    for id in 1..=5 {
        let message = client.next_event().await.json();
        assert_eq!(message["id"], id);
        assert_eq!(message["result"]["tools"].as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_concurrent_clients_are_isolated() {
    let app = TestApp::new();
    let (mut first, first_endpoint) = app.connect().await;
    let (mut second, second_endpoint) = app.connect().await;

    assert_ne!(first_endpoint, second_endpoint);

    app.post(
        &second_endpoint,
        rpc(json!("second"), "initialize", json!({})),
    )
    .await;
    app.post(&first_endpoint, rpc(json!("first"), "initialize", json!({})))
        .await;

    assert_eq!(first.next_event().await.json()["id"], "first");
    assert_eq!(second.next_event().await.json()["id"], "second");
}

#[tokio::test]
async fn test_session_ids_are_unique() {
    let app = TestApp::new();
    let mut clients = Vec::new();
    let mut endpoints = HashSet::new();

    for _ in 0..10 {
        let (client, endpoint) = app.connect().await;
        endpoints.insert(endpoint);
        clients.push(client);
    }

    assert_eq!(endpoints.len(), 10);
    assert_eq!(app.state.sessions.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_idle_stream_sends_heartbeat_before_next_message() {
    let app = TestApp::new();
    let (mut client, endpoint) = app.connect().await;

    let heartbeat = client.next_event().await;
    assert!(heartbeat.event.is_none());
    assert!(heartbeat
        .comment
        .as_deref()
        .unwrap()
        .starts_with("heartbeat "));

    app.post(&endpoint, rpc(json!(1), "initialize", json!({})))
        .await;

    let message = client.next_event().await;
    assert_eq!(message.event.as_deref(), Some("message"));
    assert_eq!(message.json()["id"], 1);
}

#[tokio::test]
async fn test_disconnect_makes_session_unreachable() {
    let app = TestApp::new();
    let (client, endpoint) = app.connect().await;
    assert_eq!(app.state.sessions.len(), 1);

    drop(client);
    assert!(app.state.sessions.is_empty());

    let response = app
        .post(&endpoint, rpc(json!(1), "initialize", json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Session not found");
}

#[tokio::test]
async fn test_disconnect_during_tool_call_answers_not_found() {
    let gate = Arc::new(Gate::default());
    let app = TestApp::with_actor(
        Config::default(),
        FakeActor::with_behavior(sample_posts(), RunBehavior::WaitFor(gate.clone())),
    );
    let (client, endpoint) = app.connect().await;

    let request = Request::builder()
        .uri(endpoint)
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(rpc(
            json!(1),
            "tools/call",
            json!({
                "name": "scrape_facebook_posts",
                "arguments": { "start_urls": "https://www.facebook.com/nasa" }
            }),
        )))
        .unwrap();
    let in_flight = tokio::spawn(app.app.clone().oneshot(request));

    gate.entered.notified().await;
    drop(client);
    assert!(app.state.sessions.is_empty());
    gate.release.notify_one();

    let response = tokio::time::timeout(Duration::from_secs(5), in_flight)
        .await
        .expect("POST left hanging after disconnect")
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Session not found");
}

#[tokio::test]
async fn test_panicking_dispatch_answers_internal_error() {
    let app = TestApp::with_actor(
        Config::default(),
        FakeActor::with_behavior(sample_posts(), RunBehavior::Panic),
    );
    let (_client, endpoint) = app.connect().await;

    let response = app
        .post(
            &endpoint,
            rpc(
                json!(1),
                "tools/call",
                json!({
                    "name": "scrape_facebook_posts",
                    "arguments": { "start_urls": "https://www.facebook.com/nasa" }
                }),
            ),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Internal server error");
    assert_eq!(app.state.sessions.len(), 1);
}

#[tokio::test]
async fn test_notification_is_accepted_without_response() {
    let app = TestApp::new();
    let (_client, endpoint) = app.connect().await;

    let response = app
        .post(
            &endpoint,
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "status": "notification_accepted" })
    );
}

#[tokio::test]
async fn test_missing_session_id_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .post("/messages", rpc(json!(1), "initialize", json!({})))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = TestApp::new();

    let response = app
        .post(
            "/messages?session_id=00000000-0000-4000-8000-000000000000",
            rpc(json!(1), "initialize", json!({})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_bodies_are_rejected() {
    let app = TestApp::new();
    let (_client, endpoint) = app.connect().await;

    let response = app.post(&endpoint, "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
    assert!(body["id"].is_null());

    let response = app.post(&endpoint, json!({ "id": 4 }).to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 4);
}

#[tokio::test]
async fn test_disallowed_origin_is_forbidden() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/sse")
        .method(Method::GET)
        .header(header::ORIGIN, "https://attacker.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.state.sessions.is_empty());
}

#[tokio::test]
async fn test_allowed_origin_opens_stream() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/sse")
        .method(Method::GET)
        .header(header::ORIGIN, "http://localhost:5678")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5678"
    );
}
