use ionwatch_client::{
    KICK_REJECTION_CODE, KICK_REJECTION_REASON, SessionState, inbound_reply,
};
use ionwatch_core::Rejection;
use serde_json::json;

use crate::integration::{create_published_session, create_test_session, init_tracing};

#[tokio::test]
async fn test_kick_is_refused() {
    init_tracing();

    let test = create_published_session().await;

    test.channel.request_inbound(7, "kick", json!({})).await;
    assert!(test.channel.wait_for_responses(1, 2000).await);

    assert_eq!(
        test.channel.responses().await,
        vec![(7, Err(Rejection::new(486, "Busy Here")))]
    );
    assert_eq!(test.session.state(), SessionState::Published);
}

#[tokio::test]
async fn test_unknown_requests_are_accepted() {
    init_tracing();

    let test = create_test_session().await;

    test.channel
        .request_inbound(1, "stream-add", json!({ "mid": "abc" }))
        .await;
    test.channel
        .request_inbound(2, "no-such-method", json!(null))
        .await;
    assert!(test.channel.wait_for_responses(2, 2000).await);

    assert_eq!(
        test.channel.responses().await,
        vec![(1, Ok(json!({}))), (2, Ok(json!({})))]
    );
    assert_eq!(test.session.state(), SessionState::Disconnected);
}

#[test]
fn test_inbound_reply_table() {
    let kick = inbound_reply("kick").expect_err("kick must be refused");
    assert_eq!(kick.code, KICK_REJECTION_CODE);
    assert_eq!(kick.reason, KICK_REJECTION_REASON);

    assert_eq!(inbound_reply("Kick"), Ok(json!({})));
    assert_eq!(inbound_reply("broadcast"), Ok(json!({})));
    assert_eq!(inbound_reply(""), Ok(json!({})));
}
