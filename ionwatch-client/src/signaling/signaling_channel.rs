use crate::error::ChannelError;
use async_trait::async_trait;
use ionwatch_core::Rejection;
use serde_json::Value;

/// Outcome of a request: the success payload or the peer's rejection.
pub type Reply = Result<Value, Rejection>;

/// Inbound traffic from the signaling service, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingEvent {
    Request {
        id: u64,
        method: String,
        data: Value,
    },
    Notification {
        method: String,
        data: Value,
    },
    Closed {
        code: u16,
        reason: String,
    },
}

/// Duplex request/notification transport to the signaling service.
///
/// Inbound events are delivered separately, as a stream handed out by the
/// implementation's constructor.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Sends a request and waits for its response.
    async fn request(&self, method: &str, data: Value) -> Result<Reply, ChannelError>;

    /// Answers the inbound request with the given id.
    async fn respond(&self, id: u64, reply: Reply) -> Result<(), ChannelError>;

    fn is_closed(&self) -> bool;

    async fn close(&self);
}
