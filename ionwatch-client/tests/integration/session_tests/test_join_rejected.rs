use ionwatch_client::{SessionError, SessionState};

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{answer_payload, test_identity, test_profile};

#[tokio::test]
async fn test_join_rejected_returns_to_disconnected() {
    init_tracing();

    let test = create_test_session().await;
    test.channel.reject("join", 403, "Forbidden").await;

    let result = test.session.join(test_identity(), test_profile()).await;

    match result {
        Err(SessionError::JoinRejected { code, reason }) => {
            assert_eq!(code, 403);
            assert_eq!(reason, "Forbidden");
        }
        other => panic!("Expected JoinRejected, got {:?}", other),
    }
    assert_eq!(test.session.state(), SessionState::Disconnected);

    // Nothing was negotiated
    assert!(test.channel.requests_for("publish").await.is_empty());
    assert!(test.transport.calls().await.is_empty());
}

#[tokio::test]
async fn test_join_can_be_retried_after_rejection() {
    init_tracing();

    let test = create_test_session().await;
    test.channel.reject("join", 403, "Forbidden").await;
    test.channel.accept("publish", answer_payload()).await;

    assert!(test.session.join(test_identity(), test_profile()).await.is_err());
    test.session
        .join(test_identity(), test_profile())
        .await
        .expect("Second join failed");

    assert_eq!(test.session.state(), SessionState::Published);
    assert_eq!(test.channel.requests_for("join").await.len(), 2);
}

#[tokio::test]
async fn test_join_rejection_is_not_fatal() {
    let err = SessionError::JoinRejected {
        code: 403,
        reason: "Forbidden".to_owned(),
    };
    assert!(!err.is_fatal());
}
