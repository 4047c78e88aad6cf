use crate::playback::DEFAULT_KEEP_ALIVE_INTERVAL;
use ionwatch_core::PublishOptions;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub publish_options: PublishOptions,
    /// Tick of the pause keep-alive loop.
    pub keep_alive_interval: Duration,
    /// How long `Close` waits for the `leave` request to be answered.
    pub leave_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            publish_options: PublishOptions::default(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            leave_timeout: Duration::from_secs(2),
        }
    }
}
