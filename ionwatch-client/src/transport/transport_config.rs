use std::time::Duration;

/// Configuration for the WebRTC peer connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
    /// Upper bound on waiting for ICE gathering after the local description is set.
    pub gather_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_owned()],
            gather_timeout: Duration::from_secs(5),
        }
    }
}
