/// Peer connection lifecycle changes reported to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Failed,
}
