use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, time::Duration};
use tracing::{debug, info, trace, warn};

use crate::{
    error::{AppError, Result},
    mcp::{
        types::{JsonRpcRequest, INVALID_REQUEST, PARSE_ERROR},
        JsonRpcEnvelopes,
    },
    server::AppState,
    session::{Delivery, Session},
};

/// One unit of output on a session's event stream
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// URI the client must POST its messages to
    Endpoint(String),
    /// A queued JSON-RPC response
    Message(Value),
    /// Idle keep-alive carrying the local time
    Heartbeat(String),
}

impl SseFrame {
    pub fn into_event(self) -> Event {
        match self {
            SseFrame::Endpoint(uri) => Event::default().event("endpoint").data(uri),
            SseFrame::Message(message) => Event::default()
                .event("message")
                .data(message.to_string()),
            SseFrame::Heartbeat(timestamp) => {
                Event::default().comment(format!("heartbeat {}", timestamp))
            }
        }
    }
}

/// Lazy frame sequence for one session: the endpoint, then queued messages
/// interleaved with heartbeats whenever the queue stays idle for `heartbeat`.
///
/// The stream owns the session, so dropping the stream (client disconnect)
/// removes the session from the registry.
pub fn session_stream(mut session: Session, heartbeat: Duration) -> impl Stream<Item = SseFrame> {
    async_stream::stream! {
        yield SseFrame::Endpoint(session.endpoint_uri());

        loop {
            match session.next_delivery(heartbeat).await {
                Delivery::Message(message) => {
                    trace!("Delivering message to session {}", session.id());
                    yield SseFrame::Message(message);
                }
                Delivery::Idle => {
                    yield SseFrame::Heartbeat(
                        chrono::Local::now()
                            .format("%Y-%m-%dT%H:%M:%S%.6f")
                            .to_string(),
                    );
                }
                Delivery::Closed => {
                    debug!("Queue closed for session {}", session.id());
                    break;
                }
            }
        }
    }
}

/// `GET /sse`: open a session and stream its responses
pub async fn sse_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if let Some(origin) = headers.get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !state.config.origin_allowed(origin) {
            warn!("Rejected SSE connection from origin: {}", origin);
            return Err(AppError::Forbidden("Origin not allowed".to_string()));
        }
    }

    let session = state.sessions.create();
    info!("SSE client connected: {}", session.id());

    let stream = session_stream(session, state.config.heartbeat_interval())
        .map(|frame| Ok::<_, Infallible>(frame.into_event()));

    Ok((
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Sse::new(stream),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub session_id: Option<String>,
}

/// `POST /messages?session_id=<id>`: dispatch a JSON-RPC message and queue
/// its response onto the session's stream
pub async fn message_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Result<Response> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("session_id is required".to_string()))?;

    if !state.sessions.contains(&session_id) {
        debug!("Message for unknown session {}", session_id);
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            let envelope =
                JsonRpcEnvelopes::error_response(PARSE_ERROR, &format!("Parse error: {}", e), None);
            return Ok((StatusCode::BAD_REQUEST, Json(envelope)).into_response());
        }
    };

    let request: JsonRpcRequest = match serde_json::from_value(payload.clone()) {
        Ok(request) => request,
        Err(e) => {
            let envelope = JsonRpcEnvelopes::error_response(
                INVALID_REQUEST,
                &format!("Invalid request: {}", e),
                payload.get("id").cloned(),
            );
            return Ok((StatusCode::BAD_REQUEST, Json(envelope)).into_response());
        }
    };

    debug!("Session {} received {}", session_id, request.method);

    let Some(response) = state.mcp_server.handle_request(request).await else {
        return Ok(Json(json!({ "status": "notification_accepted" })).into_response());
    };

    state
        .sessions
        .enqueue(&session_id, serde_json::to_value(&response)?)?;

    Ok(Json(json!({ "status": "message_queued" })).into_response())
}
