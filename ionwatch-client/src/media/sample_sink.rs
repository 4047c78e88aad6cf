use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

pub const STREAM_ID: &str = "synced-video";
pub const AUDIO_TRACK_ID: &str = "synced-audio";
pub const VIDEO_TRACK_ID: &str = "synced-video";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// Outgoing media track that accepts encoded samples.
#[async_trait]
pub trait SampleSink: Send + Sync {
    fn kind(&self) -> TrackKind;

    fn id(&self) -> &str;

    async fn write_sample(&self, sample: &Sample) -> anyhow::Result<()>;

    /// The track handed to the peer connection.
    fn local_track(&self) -> Arc<dyn TrackLocal + Send + Sync>;
}

/// [`SampleSink`] backed by a static-sample WebRTC track.
pub struct TrackSink {
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
}

impl TrackSink {
    pub fn opus() -> Self {
        let codec = RTCRtpCodecCapability {
            mime_type: "audio/opus".to_owned(),
            clock_rate: 48000,
            channels: 2,
            sdp_fmtp_line: String::new(),
            rtcp_feedback: vec![],
        };
        Self::new(TrackKind::Audio, codec, AUDIO_TRACK_ID)
    }

    pub fn video(mime_type: &str) -> Self {
        let codec = RTCRtpCodecCapability {
            mime_type: mime_type.to_owned(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: String::new(),
            rtcp_feedback: vec![],
        };
        Self::new(TrackKind::Video, codec, VIDEO_TRACK_ID)
    }

    fn new(kind: TrackKind, codec: RTCRtpCodecCapability, id: &str) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            codec,
            id.to_owned(),
            STREAM_ID.to_owned(),
        ));
        Self { kind, track }
    }

    pub fn mime_type(&self) -> String {
        self.track.codec().mime_type
    }
}

#[async_trait]
impl SampleSink for TrackSink {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn id(&self) -> &str {
        self.track.id()
    }

    async fn write_sample(&self, sample: &Sample) -> anyhow::Result<()> {
        self.track.write_sample(sample).await?;
        Ok(())
    }

    fn local_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.track.clone()
    }
}
