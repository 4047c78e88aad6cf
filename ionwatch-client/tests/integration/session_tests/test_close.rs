use std::sync::Arc;

use ionwatch_client::{
    ChannelError, SessionError, SessionState, SessionStateMachine, SignalingChannel,
};
use serde_json::json;
use std::time::Duration;

use crate::integration::{
    create_published_session, create_test_session, init_tracing, test_config,
};
use crate::utils::{
    MediaCall, MockMediaSource, MockSignalingChannel, MockTransport, STATE_TIMEOUT_MS,
    Scripted, TransportCall, answer_payload, test_identity, test_profile, wait_for_state,
};

#[tokio::test]
async fn test_close_after_publish_leaves_room() {
    init_tracing();

    let test = create_published_session().await;
    test.session.close().await;

    assert_eq!(test.session.state(), SessionState::Closed);
    assert_eq!(
        test.channel.requests_for("leave").await,
        vec![json!({ "rid": "video-demo", "uid": "video-client-test" })]
    );
    assert!(test.channel.is_closed());
    assert_eq!(test.transport.calls().await.last(), Some(&TransportCall::Close));
    assert!(test.media.calls().await.contains(&MediaCall::Stop));
}

#[tokio::test]
async fn test_close_before_join_sends_no_leave() {
    init_tracing();

    let test = create_test_session().await;
    test.session.close().await;

    assert_eq!(test.session.state(), SessionState::Closed);
    assert!(test.channel.request_methods().await.is_empty());
    assert_eq!(test.transport.calls().await, vec![TransportCall::Close]);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    init_tracing();

    let test = create_published_session().await;

    tokio::join!(test.session.close(), test.session.close());
    test.session.close().await;

    assert_eq!(test.session.state(), SessionState::Closed);
    assert_eq!(test.channel.requests_for("leave").await.len(), 1);
    let closes = test
        .transport
        .calls()
        .await
        .into_iter()
        .filter(|call| *call == TransportCall::Close)
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_channel_drop_closes_session() {
    init_tracing();

    let test = create_published_session().await;

    test.channel.drop_connection().await;

    assert!(
        wait_for_state(&test.session, SessionState::Closed, STATE_TIMEOUT_MS).await,
        "Session should close when signaling drops"
    );
    assert!(test.channel.requests_for("leave").await.is_empty());
    assert!(test.transport.calls().await.contains(&TransportCall::Close));
}

#[tokio::test]
async fn test_connect_rejects_closed_channel() {
    init_tracing();

    let (channel, events) = MockSignalingChannel::new();
    channel.close().await;

    let transport = MockTransport::new();
    let session = SessionStateMachine::new(
        test_config(),
        Arc::new(transport.clone()),
        Arc::new(MockMediaSource::new()),
    );
    let result = session.connect(Arc::new(channel), events).await;

    assert!(matches!(
        result,
        Err(SessionError::Channel(ChannelError::Closed))
    ));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(transport.calls().await, vec![TransportCall::Close]);
}

#[tokio::test]
async fn test_join_without_channel_is_invalid() {
    init_tracing();

    let session = SessionStateMachine::new(
        test_config(),
        Arc::new(MockTransport::new()),
        Arc::new(MockMediaSource::new()),
    );

    let result = session.join(test_identity(), test_profile()).await;

    assert!(matches!(
        result,
        Err(SessionError::InvalidState {
            operation: "join",
            state: SessionState::Disconnected
        })
    ));
}

#[tokio::test]
async fn test_second_join_is_invalid() {
    init_tracing();

    let test = create_published_session().await;

    let result = test.session.join(test_identity(), test_profile()).await;

    assert!(matches!(
        result,
        Err(SessionError::InvalidState {
            state: SessionState::Published,
            ..
        })
    ));
    assert_eq!(test.session.state(), SessionState::Published);
    assert_eq!(test.channel.requests_for("join").await.len(), 1);
}

#[tokio::test]
async fn test_join_after_close_is_invalid() {
    init_tracing();

    let test = create_test_session().await;
    test.session.close().await;

    let result = test.session.join(test_identity(), test_profile()).await;

    assert!(result.is_err());
    assert_eq!(test.session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_dropped_close_still_finishes() {
    init_tracing();

    let test = create_published_session().await;
    test.channel.script("leave", Scripted::Hang).await;

    // Abandon the caller while the leave is outstanding
    let abandoned = tokio::time::timeout(Duration::from_millis(10), test.session.close()).await;
    assert!(abandoned.is_err());

    assert!(
        wait_for_state(&test.session, SessionState::Closed, STATE_TIMEOUT_MS).await,
        "Teardown should finish without its caller"
    );
    assert!(test.channel.is_closed());
    assert_eq!(test.transport.calls().await.last(), Some(&TransportCall::Close));

    // Later callers return once the session is closed
    tokio::time::timeout(Duration::from_millis(100), test.session.close())
        .await
        .expect("Close on a closed session should return");
}

#[tokio::test]
async fn test_concurrent_joins_send_one_request() {
    init_tracing();

    let test = create_test_session().await;
    test.channel.accept("publish", answer_payload()).await;

    let (first, second) = tokio::join!(
        test.session.join(test_identity(), test_profile()),
        test.session.join(test_identity(), test_profile()),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(SessionError::InvalidState { operation: "join", .. })))
            .count(),
        1
    );
    assert_eq!(test.channel.requests_for("join").await.len(), 1);
    assert_eq!(test.session.state(), SessionState::Published);
}
