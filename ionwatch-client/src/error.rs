use crate::session::SessionState;

/// Failures of the signaling transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("signaling channel is closed")]
    Closed,

    #[error("failed to connect to signaling service: {0}")]
    Connect(String),

    #[error("failed to send signaling message: {0}")]
    Send(String),

    #[error("malformed signaling payload: {0}")]
    Protocol(String),

    #[error("signaling request timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("join rejected: [{code}] {reason}")]
    JoinRejected { code: i32, reason: String },

    #[error("publish rejected: [{code}] {reason}")]
    PublishRejected { code: i32, reason: String },

    #[error("failed to attach track: {0}")]
    TrackAttach(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("media source error: {0}")]
    Media(String),

    #[error("media transport failed: {0}")]
    Transport(String),
}

impl SessionError {
    /// Whether this failure ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Channel(_)
                | SessionError::TrackAttach(_)
                | SessionError::Negotiation(_)
                | SessionError::PublishRejected { .. }
                | SessionError::Media(_)
                | SessionError::Transport(_)
        )
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
