use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use futures::channel::mpsc::unbounded;
use futures::StreamExt;
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use solveit_api::{create_router, AppState};
use solveit_hub::{Frame, Relays, Topic, TopicHub};

fn state(allowed_origins: Vec<String>) -> AppState {
    AppState::new(
        Relays::new(TopicHub::default(), 8),
        allowed_origins,
        CancellationToken::new(),
    )
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check_is_ok() {
    let app = create_router(state(Vec::new()));
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upgrade_without_parameter_is_rejected() {
    let app = create_router(state(Vec::new()));

    let response = app
        .clone()
        .oneshot(Request::get("/ws/notifications").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing user_id");

    let response = app
        .oneshot(
            Request::get("/ws/chat?session_id=s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing user_id");
}

#[tokio::test]
async fn test_upgrade_from_unlisted_origin_is_forbidden() {
    let app = create_router(state(vec!["https://app.solveit.dev".to_string()]));
    let response = app
        .oneshot(
            Request::get("/ws/comments?task_id=t1")
                .header(header::ORIGIN, "https://evil.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_plain_request_with_parameters_fails_handshake() {
    let app = create_router(state(Vec::new()));
    let response = app
        .oneshot(
            Request::get("/ws/signaling?session_id=s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_send_notification_reaches_subscriber() {
    let state = state(Vec::new());
    let relay = state.relays.notifications.clone();
    let app = create_router(state.clone());

    let (_tx, inbound) = unbounded::<Result<Frame, Infallible>>();
    let (outbound, mut rx) = unbounded();
    let shutdown = state.shutdown.clone();
    let session = tokio::spawn({
        let relay = relay.clone();
        async move {
            relay
                .subscribe(Topic::notification("u1"), inbound, outbound, shutdown)
                .await
        }
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        while relay.hub().connection_count(&Topic::notification("u1")).await == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/api/v1/send-notification")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"content":"hello","receiverId":"u1","subject":"Hi"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Notification sent");

    match tokio::time::timeout(Duration::from_secs(1), rx.next()).await {
        Ok(Some(Frame::Text(text))) => {
            let pushed: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(pushed["content"], "hello");
            assert_eq!(pushed["receiverId"], "u1");
        }
        other => panic!("expected a notification frame, got {other:?}"),
    }

    state.shutdown.cancel();
    session.await.unwrap();
}

#[tokio::test]
async fn test_send_notification_rejects_invalid_body() {
    let app = create_router(state(Vec::new()));
    let response = app
        .oneshot(
            Request::post("/api/v1/send-notification")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid request");
}
