use crate::error::ChannelError;
use crate::signaling::protoo_message::ProtooMessage;
use crate::signaling::signaling_channel::{Reply, SignalingChannel, SignalingEvent};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingReply = oneshot::Sender<Result<Reply, ChannelError>>;

const EVENT_BUFFER: usize = 256;

struct ProtooInner {
    outbound: mpsc::UnboundedSender<Message>,
    pending: DashMap<u64, PendingReply>,
    next_id: AtomicU64,
    closed: AtomicBool,
    request_timeout: Duration,
}

impl ProtooInner {
    fn send(&self, msg: &ProtooMessage) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        let json = msg.to_json()?;
        self.outbound
            .send(Message::Text(json))
            .map_err(|_| ChannelError::Closed)
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);

        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(ChannelError::Closed));
            }
        }
    }
}

/// Protoo-over-WebSocket signaling channel.
#[derive(Clone)]
pub struct ProtooChannel {
    inner: Arc<ProtooInner>,
}

impl ProtooChannel {
    /// Opens the WebSocket and starts the reader and writer tasks.
    pub async fn connect(
        url: &str,
        request_timeout: Duration,
    ) -> Result<(Self, mpsc::Receiver<SignalingEvent>), ChannelError> {
        info!("Connecting to signaling service: {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        info!("Connected to signaling service");

        // Split the socket: the writer drains an outbound queue so senders
        // never await the socket, the reader owns all inbound traffic
        let (write, read) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let inner = Arc::new(ProtooInner {
            outbound: outbound_tx,
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            request_timeout,
        });

        // Writer loop (client -> server)
        tokio::spawn(writer_task(write, outbound_rx));
        // Reader loop (server -> client)
        tokio::spawn(reader_task(read, inner.clone(), event_tx));

        Ok((Self { inner }, event_rx))
    }
}

async fn writer_task(
    mut write: futures::stream::SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if let Err(e) = write.send(msg).await {
            error!("Failed to send WebSocket message: {}", e);
            break;
        }
        if is_close {
            break;
        }
    }

    debug!("Signaling writer finished");
}

async fn reader_task(
    mut read: futures::stream::SplitStream<WsStream>,
    inner: Arc<ProtooInner>,
    events: mpsc::Sender<SignalingEvent>,
) {
    let mut close_code = 1006;
    let mut close_reason = String::from("connection lost");

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let msg = match ProtooMessage::from_json(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Dropping undecodable signaling frame: {}", e);
                        continue;
                    }
                };

                let event = match msg {
                    // Responses complete a pending request and stop here
                    ProtooMessage::Response { id, reply } => {
                        match inner.pending.remove(&id) {
                            Some((_, tx)) => {
                                let _ = tx.send(Ok(reply));
                            }
                            None => warn!("Response for unknown request id {}", id),
                        }
                        continue;
                    }
                    // Requests and notifications go to the session dispatcher
                    ProtooMessage::Request { id, method, data } => {
                        SignalingEvent::Request { id, method, data }
                    }
                    ProtooMessage::Notification { method, data } => {
                        SignalingEvent::Notification { method, data }
                    }
                };

                if events.send(event).await.is_err() {
                    debug!("Signaling event receiver dropped");
                }
            }
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    close_code = frame.code.into();
                    close_reason = frame.reason.into_owned();
                } else {
                    close_code = 1000;
                    close_reason = String::new();
                }
                break;
            }
            // Binary, ping and pong frames are not part of protoo
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket error: {}", e);
                close_reason = e.to_string();
                break;
            }
        }
    }

    info!("Signaling channel closed [{}] {}", close_code, close_reason);
    // Fail whatever is still waiting for a response
    inner.mark_closed();

    let _ = events
        .send(SignalingEvent::Closed {
            code: close_code,
            reason: close_reason,
        })
        .await;
}

#[async_trait]
impl SignalingChannel for ProtooChannel {
    async fn request(&self, method: &str, data: Value) -> Result<Reply, ChannelError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        // Register the reply slot before the frame can be answered
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        let msg = ProtooMessage::Request {
            id,
            method: method.to_owned(),
            data,
        };
        if let Err(e) = self.inner.send(&msg) {
            self.inner.pending.remove(&id);
            return Err(e);
        }
        debug!("Sent request '{}' (id {})", method, id);

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            // Slot dropped by `mark_closed` racing the send
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => {
                self.inner.pending.remove(&id);
                Err(ChannelError::Timeout(method.to_owned()))
            }
        }
    }

    async fn respond(&self, id: u64, reply: Reply) -> Result<(), ChannelError> {
        self.inner.send(&ProtooMessage::Response { id, reply })
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.outbound.send(Message::Close(None));
        self.inner.mark_closed();
    }
}
