use crate::error::{ChannelError, SessionError, SessionResult};
use crate::media::MediaSource;
use crate::playback::CommandRouter;
use crate::session::session_config::SessionConfig;
use crate::session::session_state::SessionState;
use crate::signaling::{Reply, SignalingChannel, SignalingEvent};
use crate::transport::{PeerTransport, TransportEvent};
use ionwatch_core::{
    ChatNotification, JoinRequest, LeaveRequest, PlaybackCommand, PublishRequest,
    PublishResponse, Rejection, RoomIdentity, SdpType, UserProfile,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

pub const KICK_METHOD: &str = "kick";
pub const KICK_REJECTION_CODE: i32 = 486;
pub const KICK_REJECTION_REASON: &str = "Busy Here";
pub const BROADCAST_METHOD: &str = "broadcast";

/// Answer to an inbound request.
///
/// Default-allow: `kick` is always refused with `486 Busy Here`, every other
/// method is acknowledged with an empty payload, including methods this
/// client does not understand.
pub fn inbound_reply(method: &str) -> Reply {
    if method == KICK_METHOD {
        Err(Rejection::new(KICK_REJECTION_CODE, KICK_REJECTION_REASON))
    } else {
        Ok(json!({}))
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Value, ChannelError> {
    serde_json::to_value(payload).map_err(|e| ChannelError::Protocol(e.to_string()))
}

struct SessionInner {
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    transport: Arc<dyn PeerTransport>,
    media: Arc<dyn MediaSource>,
    router: CommandRouter,
    channel: OnceLock<Arc<dyn SignalingChannel>>,
    identity: Mutex<Option<RoomIdentity>>,
    join_lock: Mutex<()>,
    closing: AtomicBool,
    failure: Mutex<Option<SessionError>>,
}

/// Drives one publishing session: join, negotiate, publish, close.
///
/// Owns the transport and the media source. Inbound signaling events are
/// handled one at a time on a dispatcher task spawned by [`connect`].
///
/// [`connect`]: SessionStateMachine::connect
#[derive(Clone)]
pub struct SessionStateMachine {
    inner: Arc<SessionInner>,
}

impl SessionStateMachine {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn PeerTransport>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let router = CommandRouter::new(media.clone(), config.keep_alive_interval);

        Self {
            inner: Arc::new(SessionInner {
                config,
                state,
                transport,
                media,
                router,
                channel: OnceLock::new(),
                identity: Mutex::new(None),
                join_lock: Mutex::new(()),
                closing: AtomicBool::new(false),
                failure: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn router(&self) -> &CommandRouter {
        &self.inner.router
    }

    pub async fn identity(&self) -> Option<RoomIdentity> {
        self.inner.identity.lock().await.clone()
    }

    /// Binds an open signaling channel and starts dispatching its events.
    ///
    /// A channel that is already closed is a channel failure: the session
    /// closes and `ChannelError::Closed` is returned.
    pub async fn connect(
        &self,
        channel: Arc<dyn SignalingChannel>,
        events: mpsc::Receiver<SignalingEvent>,
    ) -> SessionResult<()> {
        let state = self.state();
        if state == SessionState::Closed {
            return Err(SessionError::InvalidState {
                operation: "connect",
                state,
            });
        }
        if channel.is_closed() {
            return Err(self.abort(ChannelError::Closed.into()).await);
        }
        if self.inner.channel.set(channel).is_err() {
            return Err(SessionError::InvalidState {
                operation: "connect",
                state,
            });
        }

        tokio::spawn(self.clone().dispatch(events));
        debug!("Signaling channel bound");
        Ok(())
    }

    /// Sends `join` and, once accepted, publishes.
    ///
    /// Concurrent calls are serialized; only the first one leaves
    /// `Disconnected`, the others fail with `InvalidState`.
    pub async fn join(&self, identity: RoomIdentity, profile: UserProfile) -> SessionResult<()> {
        let serialized = self.inner.join_lock.lock().await;
        let channel = self.channel("join")?;
        if channel.is_closed() {
            return Err(self.abort(ChannelError::Closed.into()).await);
        }

        self.expect_transition("join", SessionState::Disconnected, SessionState::Joining)?;
        *self.inner.identity.lock().await = Some(identity.clone());

        info!(
            "Joining room '{}' as '{}' ({})",
            identity.room_id, profile.display_name, identity.user_id
        );
        let request = JoinRequest::new(&identity, &profile);
        let reply = match encode(&request) {
            Ok(data) => channel.request("join", data).await,
            Err(e) => Err(e),
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return Err(self.abort(e.into()).await),
        };

        if let Err(rejection) = reply {
            warn!("Join rejected: {}", rejection);
            self.transition(SessionState::Disconnected);
            return Err(SessionError::JoinRejected {
                code: rejection.code,
                reason: rejection.reason,
            });
        }

        info!("Joined room '{}'", identity.room_id);
        if !self.transition(SessionState::Joined) {
            return Err(SessionError::InvalidState {
                operation: "join",
                state: self.state(),
            });
        }
        drop(serialized);

        self.start_publish().await
    }

    /// Attaches both tracks, runs the offer/answer exchange and reaches
    /// `Published`. Any failure closes the session.
    pub async fn start_publish(&self) -> SessionResult<()> {
        let channel = self.channel("publish")?;
        self.expect_transition("publish", SessionState::Joined, SessionState::Publishing)?;

        let Some(identity) = self.identity().await else {
            return Err(self
                .abort(SessionError::InvalidState {
                    operation: "publish",
                    state: self.state(),
                })
                .await);
        };

        if let Err(e) = self.negotiate(channel.as_ref(), identity).await {
            return Err(self.abort(e).await);
        }

        if !self.transition(SessionState::Published) {
            return Err(SessionError::InvalidState {
                operation: "publish",
                state: self.state(),
            });
        }
        info!("Stream published");
        Ok(())
    }

    async fn negotiate(
        &self,
        channel: &dyn SignalingChannel,
        identity: RoomIdentity,
    ) -> SessionResult<()> {
        let transport = &self.inner.transport;

        for sink in [self.inner.media.audio_sink(), self.inner.media.video_sink()] {
            let kind = sink.kind();
            transport
                .add_track(sink)
                .await
                .map_err(|e| SessionError::TrackAttach(format!("{kind} track: {e:#}")))?;
        }

        let offer = transport
            .create_offer()
            .await
            .map_err(|e| SessionError::Negotiation(format!("create offer: {e:#}")))?;
        transport
            .set_local_description(offer.clone())
            .await
            .map_err(|e| SessionError::Negotiation(format!("set local description: {e:#}")))?;
        let jsep = transport.local_description().await.unwrap_or(offer);
        debug!("Local offer:\n{}", jsep.sdp);

        let request = PublishRequest {
            room: identity,
            jsep,
            options: self.inner.config.publish_options.clone(),
        };
        let reply = channel.request("publish", encode(&request)?).await?;
        let data = reply.map_err(|rejection| {
            warn!("Publish rejected: {}", rejection);
            SessionError::PublishRejected {
                code: rejection.code,
                reason: rejection.reason,
            }
        })?;

        let response: PublishResponse = serde_json::from_value(data)
            .map_err(|e| SessionError::Negotiation(format!("malformed publish answer: {e}")))?;
        if response.jsep.sdp_type != SdpType::Answer {
            return Err(SessionError::Negotiation(format!(
                "expected an answer, got an {}",
                response.jsep.sdp_type
            )));
        }

        transport
            .set_remote_description(response.jsep)
            .await
            .map_err(|e| SessionError::Negotiation(format!("set remote description: {e:#}")))
    }

    pub async fn handle_inbound_request(&self, id: u64, method: &str) {
        let reply = inbound_reply(method);
        match &reply {
            Err(rejection) => info!("Rejecting inbound '{}': {}", method, rejection),
            Ok(_) => warn!("Accepting inbound request '{}'", method),
        }

        let Some(channel) = self.inner.channel.get() else {
            return;
        };
        if let Err(e) = channel.respond(id, reply).await {
            warn!("Failed to answer inbound '{}': {}", method, e);
        }
    }

    /// Routes `broadcast` chat to the command router; other notifications are
    /// ignored.
    pub async fn handle_notification(&self, method: &str, data: Value) -> Option<PlaybackCommand> {
        if method != BROADCAST_METHOD {
            debug!("Ignoring notification '{}'", method);
            return None;
        }

        match ChatNotification::from_payload(data) {
            Ok(chat) => self.inner.router.handle_chat(&chat).await,
            Err(e) => {
                warn!("Dropping malformed broadcast: {}", e);
                None
            }
        }
    }

    /// Tears the session down. Idempotent; every caller returns once the
    /// session is `Closed`.
    ///
    /// The teardown runs on its own task, so dropping a `close()` future
    /// (a cancelled `select!` arm, an interrupted caller) never leaves it
    /// half done.
    pub async fn close(&self) {
        if !self.inner.closing.swap(true, Ordering::AcqRel) {
            tokio::spawn(self.clone().teardown());
        }

        let mut state = self.subscribe();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    async fn teardown(self) {
        let prior = self.state();
        info!("Closing session (was {})", prior);

        self.inner.router.shutdown().await;
        self.inner.media.stop().await;

        if let Some(channel) = self.inner.channel.get() {
            if prior.has_joined() && !channel.is_closed() {
                self.send_leave(channel.as_ref()).await;
            }
            channel.close().await;
        }

        if let Err(e) = self.inner.transport.close().await {
            warn!("Failed to close media transport: {:#}", e);
        }

        self.transition(SessionState::Closed);
    }

    /// Runs a whole session until `shutdown` resolves or the session fails.
    ///
    /// Requires [`connect`](Self::connect) to have been called.
    pub async fn run<F>(
        &self,
        identity: RoomIdentity,
        profile: UserProfile,
        shutdown: F,
    ) -> SessionResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if let Err(e) = self.inner.media.start().await {
            return Err(self.abort(SessionError::Media(format!("{e:#}"))).await);
        }

        let joined = tokio::select! {
            res = self.join(identity, profile) => res,
            _ = &mut shutdown => {
                info!("Shutdown requested before the stream was published");
                self.close().await;
                return Ok(());
            }
        };
        if let Err(e) = joined {
            self.close().await;
            return Err(e);
        }

        let mut state = self.subscribe();
        let failed = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                false
            }
            _ = state.wait_for(|s| *s == SessionState::Closed) => true,
        };

        let outcome = if failed {
            Err(self.take_failure().await)
        } else {
            Ok(())
        };
        self.close().await;
        outcome
    }

    /// Closes the session when the peer connection fails.
    pub fn monitor_transport(&self, mut events: mpsc::Receiver<TransportEvent>) {
        let session = self.clone();

        tokio::spawn(async move {
            let mut state = session.subscribe();
            loop {
                let event = tokio::select! {
                    event = events.recv() => event,
                    _ = state.wait_for(|s| *s == SessionState::Closed) => break,
                };
                match event {
                    Some(TransportEvent::Connected) => info!("Media transport connected"),
                    Some(TransportEvent::Disconnected) => warn!("Media transport disconnected"),
                    Some(TransportEvent::Failed) => {
                        session
                            .fail(SessionError::Transport("peer connection failed".to_owned()))
                            .await;
                        session.close().await;
                        break;
                    }
                    None => break,
                }
            }
        });
    }

    async fn dispatch(self, mut events: mpsc::Receiver<SignalingEvent>) {
        let mut state = self.subscribe();

        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = state.wait_for(|s| *s == SessionState::Closed) => break,
            };

            match event {
                Some(SignalingEvent::Request { id, method, .. }) => {
                    debug!("Inbound request '{}' (id {})", method, id);
                    self.handle_inbound_request(id, &method).await;
                }
                Some(SignalingEvent::Notification { method, data }) => {
                    debug!("Inbound notification '{}'", method);
                    self.handle_notification(&method, data).await;
                }
                Some(SignalingEvent::Closed { code, reason }) => {
                    warn!("Signaling channel closed [{}] {}", code, reason);
                    self.fail(ChannelError::Closed.into()).await;
                    self.close().await;
                    break;
                }
                None => {
                    warn!("Signaling event stream ended");
                    self.fail(ChannelError::Closed.into()).await;
                    self.close().await;
                    break;
                }
            }
        }

        debug!("Signaling dispatcher finished");
    }

    async fn send_leave(&self, channel: &dyn SignalingChannel) {
        let Some(identity) = self.identity().await else {
            return;
        };
        let data = match encode(&LeaveRequest { room: identity }) {
            Ok(data) => data,
            Err(e) => {
                warn!("Cannot encode leave request: {}", e);
                return;
            }
        };

        let timeout = self.inner.config.leave_timeout;
        match tokio::time::timeout(timeout, channel.request("leave", data)).await {
            Ok(Ok(Ok(_))) => info!("Left room"),
            Ok(Ok(Err(rejection))) => warn!("Leave rejected: {}", rejection),
            Ok(Err(e)) => warn!("Leave failed: {}", e),
            Err(_) => warn!("Leave not answered within {:?}", timeout),
        }
    }

    fn channel(&self, operation: &'static str) -> SessionResult<Arc<dyn SignalingChannel>> {
        self.inner
            .channel
            .get()
            .cloned()
            .ok_or_else(|| SessionError::InvalidState {
                operation,
                state: self.state(),
            })
    }

    /// Applies `next` if it is legal from the current state.
    fn transition(&self, next: SessionState) -> bool {
        let mut from = None;
        self.inner.state.send_if_modified(|current| {
            if !current.can_transition_to(next) {
                return false;
            }
            from = Some(*current);
            *current = next;
            true
        });

        match from {
            Some(from) => {
                info!("Session {} -> {}", from, next);
                true
            }
            None => false,
        }
    }

    fn expect_transition(
        &self,
        operation: &'static str,
        expected: SessionState,
        next: SessionState,
    ) -> SessionResult<()> {
        let mut actual = expected;
        let moved = self.inner.state.send_if_modified(|current| {
            actual = *current;
            if *current != expected || !current.can_transition_to(next) {
                return false;
            }
            *current = next;
            true
        });

        if !moved {
            return Err(SessionError::InvalidState {
                operation,
                state: actual,
            });
        }
        info!("Session {} -> {}", expected, next);
        Ok(())
    }

    async fn fail(&self, err: SessionError) {
        if self.inner.closing.load(Ordering::Acquire) {
            return;
        }
        let mut failure = self.inner.failure.lock().await;
        if failure.is_none() {
            error!("Session failed: {}", err);
            *failure = Some(err);
        }
    }

    async fn take_failure(&self) -> SessionError {
        self.inner
            .failure
            .lock()
            .await
            .take()
            .unwrap_or(SessionError::Channel(ChannelError::Closed))
    }

    async fn abort(&self, err: SessionError) -> SessionError {
        error!("Session failed: {}", err);
        self.close().await;
        err
    }
}
