use async_trait::async_trait;
use ionwatch_client::{MediaSource, SampleSink, TrackKind, TrackSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use webrtc::media::Sample;
use webrtc::track::track_local::TrackLocal;

/// SampleSink that counts writes and forwards to a real, unbound track.
pub struct CountingSink {
    inner: TrackSink,
    kind: TrackKind,
    writes: AtomicUsize,
}

impl CountingSink {
    pub fn new(kind: TrackKind) -> Self {
        let inner = match kind {
            TrackKind::Audio => TrackSink::opus(),
            TrackKind::Video => TrackSink::video("video/VP8"),
        };
        Self {
            inner,
            kind,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SampleSink for CountingSink {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn write_sample(&self, sample: &Sample) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_sample(sample).await
    }

    fn local_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.inner.local_track()
    }
}

/// Calls recorded by MockMediaSource, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCall {
    Start,
    Stop,
    SetPaused(bool),
    SeekTo(i64),
}

/// Mock MediaSource with counting sinks.
#[derive(Clone)]
pub struct MockMediaSource {
    pub audio: Arc<CountingSink>,
    pub video: Arc<CountingSink>,
    calls: Arc<Mutex<Vec<MediaCall>>>,
}

impl MockMediaSource {
    pub fn new() -> Self {
        Self {
            audio: Arc::new(CountingSink::new(TrackKind::Audio)),
            video: Arc::new(CountingSink::new(TrackKind::Video)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().await.clone()
    }

    /// Wait until at least `count` calls have been recorded.
    pub async fn wait_for_calls(&self, count: usize, timeout_ms: u64) -> bool {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if self.calls.lock().await.len() >= count {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    async fn record(&self, call: MediaCall) {
        self.calls.lock().await.push(call);
    }
}

impl Default for MockMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for MockMediaSource {
    async fn start(&self) -> anyhow::Result<()> {
        self.record(MediaCall::Start).await;
        Ok(())
    }

    async fn stop(&self) {
        self.record(MediaCall::Stop).await;
    }

    async fn set_paused(&self, paused: bool) {
        self.record(MediaCall::SetPaused(paused)).await;
    }

    async fn seek_to(&self, offset_millis: i64) {
        self.record(MediaCall::SeekTo(offset_millis)).await;
    }

    fn audio_sink(&self) -> Arc<dyn SampleSink> {
        self.audio.clone()
    }

    fn video_sink(&self) -> Arc<dyn SampleSink> {
        self.video.clone()
    }
}
