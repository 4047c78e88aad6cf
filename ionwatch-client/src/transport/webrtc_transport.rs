use crate::media::SampleSink;
use crate::transport::peer_transport::PeerTransport;
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use ionwatch_core::{SdpType, SessionDescription};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const RTCP_BUFFER: usize = 1500;

/// [`PeerTransport`] over a webrtc-rs peer connection.
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    gather_timeout: Duration,
}

impl WebRtcTransport {
    /// Builds the peer connection. Lifecycle changes are pushed into `event_tx`.
    pub async fn new(config: TransportConfig, event_tx: mpsc::Sender<TransportEvent>) -> Result<Self> {
        // 1. Codecs: Opus plus VP8/VP9 for the published tracks
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        // 2. Interceptors (NACK, RTCP reports)
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        // 3. API object
        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        // 4. ICE servers; an empty list means host candidates only
        let ice_servers = if config.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: config.ice_servers,
                ..Default::default()
            }]
        };
        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        // 5. Peer connection
        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // --- Callbacks ---

        // A. ICE progress, logged only
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                info!("ICE connection state changed: {}", s);
                Box::pin(async {})
            },
        ));

        // B. Peer connection lifecycle, forwarded to the session
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = event_tx.clone();

                Box::pin(async move {
                    info!("Peer connection state changed: {}", s);
                    let event = match s {
                        RTCPeerConnectionState::Connected => TransportEvent::Connected,
                        RTCPeerConnectionState::Disconnected => TransportEvent::Disconnected,
                        RTCPeerConnectionState::Failed => TransportEvent::Failed,
                        // New/Connecting/Closed carry nothing the session acts on
                        _ => return,
                    };
                    let _ = tx.send(event).await;
                })
            },
        ));

        Ok(Self {
            peer_connection,
            gather_timeout: config.gather_timeout,
        })
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn add_track(&self, sink: Arc<dyn SampleSink>) -> Result<()> {
        let sender = self.peer_connection.add_track(sink.local_track()).await?;
        debug!("Added {} track '{}'", sink.kind(), sink.id());

        // RTCP has to be drained for the interceptors (NACK, reports) to run.
        tokio::spawn(async move {
            let mut buf = vec![0u8; RTCP_BUFFER];
            while sender.read(&mut buf).await.is_ok() {}
        });

        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        // The promise has to exist before gathering starts
        let mut gathered = self.peer_connection.gathering_complete_promise().await;
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await?;

        // Non-trickle: wait until all candidates are in the local description
        if tokio::time::timeout(self.gather_timeout, gathered.recv())
            .await
            .is_err()
        {
            warn!(
                "ICE gathering not complete after {:?}, continuing with partial candidates",
                self.gather_timeout
            );
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.peer_connection.local_description().await?;
        let sdp_type = match desc.sdp_type {
            RTCSdpType::Offer => SdpType::Offer,
            RTCSdpType::Answer => SdpType::Answer,
            _ => return None,
        };
        Some(SessionDescription {
            sdp_type,
            sdp: desc.sdp,
        })
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
