//! WebSocket upgrade endpoints
//!
//! One generic handler serves every realtime feature. The feature decides
//! which topic a connection joins from the query string; the hub session
//! loop then owns the socket until it closes.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
    routing::get,
    Router,
};
use futures::{future, SinkExt, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use solveit_hub::relay::{CommentsFeed, MentorChatFeed, NotificationFeed, SignalingFeed};
use solveit_hub::{Feed, Frame, Relay, SubscribeQuery, Topic};

use crate::http::error::{AppError, AppResult};
use crate::http::AppState;

pub fn create_websocket_router() -> Router<AppState> {
    Router::new()
        .route("/ws/notifications", get(subscribe::<NotificationFeed>))
        .route("/ws/comments", get(subscribe::<CommentsFeed>))
        .route("/ws/chat", get(subscribe::<MentorChatFeed>))
        .route("/ws/signaling", get(subscribe::<SignalingFeed>))
}

/// Validate the request, then hand the upgraded socket to the feature's relay.
///
/// Origin and query parameters are checked before the upgrade headers so a
/// bad request is rejected with a JSON error rather than a failed handshake.
pub async fn subscribe<F: Feed>(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SubscribeQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    check_origin(&headers, &state.allowed_origins)?;
    let topic = F::subscription_topic(&query)?;
    let ws = upgrade.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;

    let relay = Arc::clone(F::select(&state.relays));
    let max_message_size = state.relays.hub.config().max_message_size;
    let shutdown = state.shutdown.clone();

    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| serve_socket(relay, topic, socket, shutdown)))
}

async fn serve_socket<F: Feed>(
    relay: Arc<Relay<F>>,
    topic: Topic,
    socket: WebSocket,
    shutdown: CancellationToken,
) {
    debug!(feature = F::NAME, topic = %topic, "WebSocket upgraded");

    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(frame_to_message(frame))));
    let stream = stream.map(|message| message.map(message_to_frame));

    let reason = relay.subscribe(topic.clone(), stream, sink, shutdown).await;
    info!(feature = F::NAME, topic = %topic, reason = %reason, "WebSocket session ended");
}

/// An empty allow-list accepts every origin. Otherwise the Origin header
/// must be present and listed.
pub fn check_origin(headers: &HeaderMap, allowed_origins: &[String]) -> AppResult<()> {
    if allowed_origins.is_empty() {
        return Ok(());
    }

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    match origin {
        Some(origin) if allowed_origins.iter().any(|allowed| allowed == origin) => Ok(()),
        _ => Err(AppError::forbidden("Origin not allowed")),
    }
}

#[must_use]
pub fn message_to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(_) => Frame::Close,
    }
}

#[must_use]
pub fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_message_conversion() {
        let frame = message_to_frame(Message::Text("{\"type\":\"PING\"}".into()));
        assert_eq!(frame, Frame::Text("{\"type\":\"PING\"}".to_string()));
        assert_eq!(message_to_frame(Message::Close(None)), Frame::Close);

        match frame_to_message(Frame::Text("hi".to_string())) {
            Message::Text(text) => assert_eq!(text.as_str(), "hi"),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(frame_to_message(Frame::Close), Message::Close(None)));
    }

    #[test]
    fn test_origin_allow_list() {
        let allowed = vec!["https://app.solveit.dev".to_string()];
        let mut headers = HeaderMap::new();

        assert!(check_origin(&headers, &[]).is_ok());
        assert!(check_origin(&headers, &allowed).is_err());

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://evil.test"));
        assert!(check_origin(&headers, &allowed).is_err());

        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.solveit.dev"));
        assert!(check_origin(&headers, &allowed).is_ok());
    }
}
