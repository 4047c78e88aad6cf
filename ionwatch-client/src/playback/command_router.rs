use crate::media::MediaSource;
use crate::playback::keep_alive::PauseKeepAlive;
use ionwatch_core::{ChatNotification, PlaybackCommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Turns chat lines into playback control.
pub struct CommandRouter {
    media: Arc<dyn MediaSource>,
    keep_alive: PauseKeepAlive,
}

impl CommandRouter {
    /// Keep-alive frames go to the media source's audio sink.
    pub fn new(media: Arc<dyn MediaSource>, keep_alive_interval: Duration) -> Self {
        let keep_alive = PauseKeepAlive::new(media.audio_sink(), keep_alive_interval);
        Self { media, keep_alive }
    }

    /// Parses and applies one chat line. Plain chat and malformed commands
    /// yield `None`.
    pub async fn handle_chat(&self, chat: &ChatNotification) -> Option<PlaybackCommand> {
        debug!("Chat from '{}': {}", chat.sender_name, chat.message);

        match PlaybackCommand::parse(&chat.message) {
            Ok(Some(command)) => {
                info!("Got command '{}' from '{}'", command, chat.sender_name);
                self.apply(command).await;
                Some(command)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Discarding command '{}': {}", chat.message.trim(), e);
                None
            }
        }
    }

    pub async fn apply(&self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Play => {
                self.media.set_paused(false).await;
                self.keep_alive.set_paused(false).await;
            }
            PlaybackCommand::Pause => {
                self.media.set_paused(true).await;
                self.keep_alive.set_paused(true).await;
            }
            PlaybackCommand::Seek(offset_millis) => {
                self.media.seek_to(offset_millis).await;
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.keep_alive.is_paused()
    }

    pub fn keep_alive(&self) -> &PauseKeepAlive {
        &self.keep_alive
    }

    /// Stops the keep-alive loop for good.
    pub async fn shutdown(&self) {
        self.keep_alive.shutdown().await;
    }
}
