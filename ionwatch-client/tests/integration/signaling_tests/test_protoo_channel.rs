use std::time::Duration;

use ionwatch_client::{ChannelError, ProtooChannel, SignalingChannel, SignalingEvent, inbound_reply};
use ionwatch_core::Rejection;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::integration::init_tracing;
use crate::utils::{drain, next_json, send_text, spawn_ws_server};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

async fn next_event(events: &mut mpsc::Receiver<SignalingEvent>) -> SignalingEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("No signaling event in time")
        .expect("Signaling event stream ended")
}

#[tokio::test]
async fn test_request_resolves_with_response() {
    init_tracing();

    let (seen_tx, seen_rx) = oneshot::channel::<Value>();
    let url = spawn_ws_server(|mut ws| async move {
        let Some(request) = next_json(&mut ws).await else {
            return;
        };
        let id = request["id"].clone();
        let _ = seen_tx.send(request);
        send_text(
            &mut ws,
            &json!({ "response": true, "id": id, "ok": true, "data": { "joined": true } })
                .to_string(),
        )
        .await;
        drain(&mut ws).await;
    })
    .await;

    let (channel, _events) = ProtooChannel::connect(&url, REQUEST_TIMEOUT)
        .await
        .expect("Failed to connect");
    let reply = channel
        .request("join", json!({ "rid": "video-demo" }))
        .await
        .expect("Request failed");

    assert_eq!(reply, Ok(json!({ "joined": true })));

    let request = seen_rx.await.expect("Server saw no request");
    assert_eq!(request["request"], true);
    assert_eq!(request["method"], "join");
    assert_eq!(request["data"], json!({ "rid": "video-demo" }));
    assert!(request["id"].is_u64());
}

#[tokio::test]
async fn test_request_rejection_is_returned() {
    init_tracing();

    let url = spawn_ws_server(|mut ws| async move {
        let Some(request) = next_json(&mut ws).await else {
            return;
        };
        let frame = json!({
            "response": true,
            "id": request["id"],
            "ok": false,
            "errorCode": 403,
            "errorReason": "Forbidden"
        });
        send_text(&mut ws, &frame.to_string()).await;
        drain(&mut ws).await;
    })
    .await;

    let (channel, _events) = ProtooChannel::connect(&url, REQUEST_TIMEOUT)
        .await
        .expect("Failed to connect");
    let reply = channel.request("join", json!({})).await.expect("Request failed");

    assert_eq!(reply, Err(Rejection::new(403, "Forbidden")));
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    init_tracing();

    let url = spawn_ws_server(|mut ws| async move {
        drain(&mut ws).await;
    })
    .await;

    let (channel, _events) = ProtooChannel::connect(&url, Duration::from_millis(100))
        .await
        .expect("Failed to connect");
    let result = channel.request("publish", json!({})).await;

    assert_eq!(result, Err(ChannelError::Timeout("publish".to_owned())));
    assert!(!channel.is_closed());
}

#[tokio::test]
async fn test_socket_close_fails_pending_request() {
    init_tracing();

    let url = spawn_ws_server(|mut ws| async move {
        if next_json(&mut ws).await.is_some() {
            let _ = ws.close(None).await;
        }
        drain(&mut ws).await;
    })
    .await;

    let (channel, mut events) = ProtooChannel::connect(&url, REQUEST_TIMEOUT)
        .await
        .expect("Failed to connect");
    let result = channel.request("join", json!({})).await;

    assert_eq!(result, Err(ChannelError::Closed));
    assert!(matches!(
        next_event(&mut events).await,
        SignalingEvent::Closed { .. }
    ));
    assert!(channel.is_closed());

    // Nothing is sent once closed
    assert_eq!(
        channel.request("leave", json!({})).await,
        Err(ChannelError::Closed)
    );
}

#[tokio::test]
async fn test_undecodable_frames_are_dropped() {
    init_tracing();

    let url = spawn_ws_server(|mut ws| async move {
        send_text(&mut ws, "not json").await;
        send_text(&mut ws, r#"{"foo":1}"#).await;
        send_text(&mut ws, r#"{"request":true,"method":"kick"}"#).await;
        let chat = json!({
            "notification": true,
            "method": "broadcast",
            "data": { "info": { "msg": "@pause" } }
        });
        send_text(&mut ws, &chat.to_string()).await;
        drain(&mut ws).await;
    })
    .await;

    let (channel, mut events) = ProtooChannel::connect(&url, REQUEST_TIMEOUT)
        .await
        .expect("Failed to connect");

    assert_eq!(
        next_event(&mut events).await,
        SignalingEvent::Notification {
            method: "broadcast".to_owned(),
            data: json!({ "info": { "msg": "@pause" } }),
        }
    );
    assert!(!channel.is_closed());
}

#[tokio::test]
async fn test_inbound_request_is_answered() {
    init_tracing();

    let (reply_tx, reply_rx) = oneshot::channel::<Value>();
    let url = spawn_ws_server(|mut ws| async move {
        let kick = json!({ "request": true, "id": 5, "method": "kick", "data": {} });
        send_text(&mut ws, &kick.to_string()).await;
        if let Some(reply) = next_json(&mut ws).await {
            let _ = reply_tx.send(reply);
        }
        drain(&mut ws).await;
    })
    .await;

    let (channel, mut events) = ProtooChannel::connect(&url, REQUEST_TIMEOUT)
        .await
        .expect("Failed to connect");

    let SignalingEvent::Request { id, method, .. } = next_event(&mut events).await else {
        panic!("Expected an inbound request");
    };
    assert_eq!((id, method.as_str()), (5, "kick"));
    channel
        .respond(id, inbound_reply(&method))
        .await
        .expect("Failed to respond");

    let reply = tokio::time::timeout(Duration::from_secs(2), reply_rx)
        .await
        .expect("Server got no reply in time")
        .expect("Server dropped the reply");
    assert_eq!(
        reply,
        json!({
            "response": true,
            "id": 5,
            "ok": false,
            "errorCode": 486,
            "errorReason": "Busy Here"
        })
    );
}

#[tokio::test]
async fn test_close_stops_the_channel() {
    init_tracing();

    let url = spawn_ws_server(|mut ws| async move {
        drain(&mut ws).await;
    })
    .await;

    let (channel, _events) = ProtooChannel::connect(&url, REQUEST_TIMEOUT)
        .await
        .expect("Failed to connect");

    channel.close().await;
    channel.close().await;

    assert!(channel.is_closed());
    assert_eq!(
        channel.request("join", json!({})).await,
        Err(ChannelError::Closed)
    );
}

#[tokio::test]
async fn test_connect_to_missing_server_fails() {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Listener has no address");
    drop(listener);

    let result = ProtooChannel::connect(&format!("ws://{}", addr), REQUEST_TIMEOUT).await;

    assert!(matches!(result, Err(ChannelError::Connect(_))));
}
