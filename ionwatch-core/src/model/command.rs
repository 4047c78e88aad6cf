use std::fmt;

const PLAY_TOKENS: &[&str] = &["play", "start"];
const PAUSE_TOKENS: &[&str] = &["pause", "stop"];
const SEEK_TOKENS: &[&str] = &["seek"];

/// Playback control derived from a chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Seek(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("seek command without an offset")]
    MissingSeekOffset,

    #[error("seek offset '{0}' is not an integer")]
    InvalidSeekOffset(String),
}

impl PlaybackCommand {
    /// Parses a chat message.
    ///
    /// Only messages starting with `@` (after trimming) are candidates. The
    /// rules are substring matches checked top to bottom, so `@playseek 10`
    /// is a `Play`. `Ok(None)` means the message carries no command.
    pub fn parse(message: &str) -> Result<Option<Self>, CommandError> {
        let Some(command) = command_text(message) else {
            return Ok(None);
        };

        if contains_any(command, PLAY_TOKENS) {
            return Ok(Some(Self::Play));
        }
        if contains_any(command, PAUSE_TOKENS) {
            return Ok(Some(Self::Pause));
        }
        if contains_any(command, SEEK_TOKENS) {
            let offset = command
                .split_whitespace()
                .nth(1)
                .ok_or(CommandError::MissingSeekOffset)?;
            let millis = offset
                .parse::<i64>()
                .map_err(|_| CommandError::InvalidSeekOffset(offset.to_owned()))?;
            return Ok(Some(Self::Seek(millis)));
        }

        Ok(None)
    }
}

/// Strips the `@` marker, returning `None` for plain chat.
pub(crate) fn command_text(message: &str) -> Option<&str> {
    message.trim().strip_prefix('@').map(str::trim)
}

fn contains_any(command: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| command.contains(t))
}

impl fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackCommand::Play => f.write_str("play"),
            PlaybackCommand::Pause => f.write_str("pause"),
            PlaybackCommand::Seek(ms) => write!(f, "seek {ms}ms"),
        }
    }
}
