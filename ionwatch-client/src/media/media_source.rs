use crate::media::sample_sink::SampleSink;
use async_trait::async_trait;
use std::sync::Arc;

/// Producer of the synchronized audio/video streams being published.
///
/// Control calls are valid at any time after construction; before the
/// tracks are bound to a peer connection they simply have no visible effect.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self);

    async fn set_paused(&self, paused: bool);

    async fn seek_to(&self, offset_millis: i64);

    fn audio_sink(&self) -> Arc<dyn SampleSink>;

    fn video_sink(&self) -> Arc<dyn SampleSink>;
}
