use crate::media::SampleSink;
use anyhow::Result;
use async_trait::async_trait;
use ionwatch_core::SessionDescription;
use std::sync::Arc;

/// The slice of a WebRTC peer connection the session drives.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, sink: Arc<dyn SampleSink>) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Local description after ICE gathering, when the engine has one.
    async fn local_description(&self) -> Option<SessionDescription> {
        None
    }

    async fn close(&self) -> Result<()>;
}
