use crate::media::SampleSink;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use webrtc::media::Sample;

/// One Opus frame.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(20);

const PLACEHOLDER: [u8; 8] = [0; 8];

struct ActiveLoop {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct KeepAliveState {
    active: Option<ActiveLoop>,
    shut_down: bool,
}

/// Writes silent placeholder samples into a track while playback is paused.
///
/// Each loop owns its own run flag, so a loop that is being stopped can never
/// be revived by a later pause: at most one loop writes at any time.
pub struct PauseKeepAlive {
    sink: Arc<dyn SampleSink>,
    interval: Duration,
    paused: AtomicBool,
    loops_started: AtomicUsize,
    state: Mutex<KeepAliveState>,
}

impl PauseKeepAlive {
    pub fn new(sink: Arc<dyn SampleSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            paused: AtomicBool::new(false),
            loops_started: AtomicUsize::new(0),
            state: Mutex::new(KeepAliveState::default()),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Number of loops spawned so far.
    pub fn loops_started(&self) -> usize {
        self.loops_started.load(Ordering::Acquire)
    }

    /// Sets the pause flag, starting or stopping the loop on a change.
    ///
    /// Returns `false` when nothing changed. Stopping waits for the loop to
    /// exit, so no placeholder is written after this returns.
    pub async fn set_paused(&self, paused: bool) -> bool {
        let mut state = self.state.lock().await;
        if state.shut_down {
            return false;
        }
        if self.paused.swap(paused, Ordering::AcqRel) == paused {
            return false;
        }

        if paused {
            state.active = Some(self.spawn_loop());
        } else if let Some(active) = state.active.take() {
            self.stop_loop(active).await;
        }
        true
    }

    /// Stops any running loop and refuses to start new ones.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.shut_down = true;
        self.paused.store(false, Ordering::Release);

        if let Some(active) = state.active.take() {
            self.stop_loop(active).await;
        }
    }

    fn spawn_loop(&self) -> ActiveLoop {
        let running = Arc::new(AtomicBool::new(true));
        self.loops_started.fetch_add(1, Ordering::AcqRel);

        let task = tokio::spawn(keep_alive_loop(
            self.sink.clone(),
            self.interval,
            running.clone(),
        ));
        ActiveLoop { running, task }
    }

    async fn stop_loop(&self, active: ActiveLoop) {
        active.running.store(false, Ordering::Release);

        let mut task = active.task;
        if tokio::time::timeout(self.interval * 2, &mut task)
            .await
            .is_err()
        {
            warn!("Keep-alive loop did not stop within two ticks, aborting");
            task.abort();
        }
    }
}

async fn keep_alive_loop(sink: Arc<dyn SampleSink>, interval: Duration, running: Arc<AtomicBool>) {
    debug!("Sending pause frames on {} track", sink.kind());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !running.load(Ordering::Acquire) {
            break;
        }

        let sample = Sample {
            data: Bytes::from_static(&PLACEHOLDER),
            duration: interval,
            ..Default::default()
        };
        if let Err(e) = sink.write_sample(&sample).await {
            warn!("Failed to write pause frame: {}", e);
        }
    }

    debug!("Stopped pause frames on {} track", sink.kind());
}
