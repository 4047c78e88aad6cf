use crate::media::media_source::MediaSource;
use crate::media::sample_sink::{SampleSink, TrackSink};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::media::Sample;
use webrtc::media::io::ivf_reader::IVFReader;
use webrtc::media::io::ogg_reader::OggReader;

const OPUS_CLOCK_RATE: u64 = 48000;

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// VP8/VP9 frames in an IVF container.
    pub video_file: PathBuf,
    /// Opus pages in an Ogg container.
    pub audio_file: PathBuf,
    /// Restart from the beginning at end of file.
    pub loop_playback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlaybackControl {
    running: bool,
    paused: bool,
    seek_epoch: u64,
    seek_target: Duration,
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self {
            running: true,
            paused: false,
            seek_epoch: 0,
            seek_target: Duration::ZERO,
        }
    }
}

struct Frame {
    data: Bytes,
    timestamp: Duration,
    duration: Duration,
}

/// Sequential access to the encoded frames of one media file.
trait FrameReader: Sized + Send + 'static {
    fn open(path: &Path) -> Result<Self>;

    /// `None` at end of stream.
    fn next_frame(&mut self) -> Option<Frame>;
}

struct IvfFrames {
    reader: IVFReader<BufReader<File>>,
    frame_interval: Duration,
    timebase_numerator: u64,
    timebase_denominator: u64,
    last_timestamp: Option<Duration>,
}

impl FrameReader for IvfFrames {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let (reader, header) = IVFReader::new(BufReader::new(file))
            .with_context(|| format!("read IVF header of {}", path.display()))?;

        let numerator = u64::from(header.timebase_numerator);
        let denominator = u64::from(header.timebase_denominator);
        if numerator == 0 || denominator == 0 {
            bail!("{} has an invalid IVF timebase", path.display());
        }

        Ok(Self {
            reader,
            frame_interval: ticks_to_duration(1, numerator, denominator),
            timebase_numerator: numerator,
            timebase_denominator: denominator,
            last_timestamp: None,
        })
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.reader.parse_next_frame() {
            Ok((data, header)) => {
                let timestamp = ticks_to_duration(
                    header.timestamp,
                    self.timebase_numerator,
                    self.timebase_denominator,
                );
                // Paced by the gap to the previous frame; the nominal frame
                // interval covers the first frame and non-increasing stamps.
                let duration = self
                    .last_timestamp
                    .and_then(|last| timestamp.checked_sub(last))
                    .filter(|gap| !gap.is_zero())
                    .unwrap_or(self.frame_interval);
                self.last_timestamp = Some(timestamp);

                Some(Frame {
                    data: data.freeze(),
                    timestamp,
                    duration,
                })
            }
            Err(e) => {
                debug!("IVF stream ended: {}", e);
                None
            }
        }
    }
}

struct OggPages {
    reader: OggReader<BufReader<File>>,
    last_granule: u64,
}

impl FrameReader for OggPages {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let (reader, _) = OggReader::new(BufReader::new(file), true)
            .with_context(|| format!("read Ogg header of {}", path.display()))?;

        Ok(Self {
            reader,
            last_granule: 0,
        })
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.reader.parse_next_page() {
            Ok((data, header)) => {
                let start = self.last_granule;
                let samples = header.granule_position.saturating_sub(start);
                self.last_granule = self.last_granule.max(header.granule_position);

                Some(Frame {
                    data: data.freeze(),
                    timestamp: ticks_to_duration(start, 1, OPUS_CLOCK_RATE),
                    duration: ticks_to_duration(samples, 1, OPUS_CLOCK_RATE),
                })
            }
            Err(e) => {
                debug!("Ogg stream ended: {}", e);
                None
            }
        }
    }
}

/// `ticks * numerator / denominator` seconds, saturating instead of
/// overflowing on absurd container values.
fn ticks_to_duration(ticks: u64, numerator: u64, denominator: u64) -> Duration {
    if denominator == 0 {
        return Duration::ZERO;
    }
    let nanos = u128::from(ticks)
        .saturating_mul(u128::from(numerator))
        .saturating_mul(1_000_000_000)
        / u128::from(denominator);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Reads the first bytes of an IVF file to pick the video track codec.
fn detect_video_mime(path: &Path) -> Result<&'static str> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let (_, header) = IVFReader::new(BufReader::new(file))
        .with_context(|| format!("read IVF header of {}", path.display()))?;

    match &header.four_cc {
        b"VP80" => Ok("video/VP8"),
        b"VP90" => Ok("video/VP9"),
        other => bail!(
            "{} uses unsupported codec {}",
            path.display(),
            String::from_utf8_lossy(other)
        ),
    }
}

/// [`MediaSource`] that streams pre-encoded IVF video and Ogg/Opus audio.
pub struct FilePlaybackSource {
    config: PlaybackConfig,
    audio: Arc<TrackSink>,
    video: Arc<TrackSink>,
    control: watch::Sender<PlaybackControl>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FilePlaybackSource {
    /// Validates both files and creates the tracks; nothing is read until `start`.
    pub fn open(config: PlaybackConfig) -> Result<Self> {
        let mime = detect_video_mime(&config.video_file)?;
        OggPages::open(&config.audio_file)?;

        let (control, _) = watch::channel(PlaybackControl::default());

        info!(
            "Media source ready: video {} ({}), audio {}",
            config.video_file.display(),
            mime,
            config.audio_file.display()
        );

        Ok(Self {
            audio: Arc::new(TrackSink::opus()),
            video: Arc::new(TrackSink::video(mime)),
            config,
            control,
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn spawn_track<R: FrameReader>(&self, path: PathBuf, sink: Arc<TrackSink>) -> JoinHandle<()> {
        let control = self.control.subscribe();
        let loop_playback = self.config.loop_playback;
        tokio::spawn(play_track::<R>(path, sink, control, loop_playback))
    }
}

async fn play_track<R: FrameReader>(
    path: PathBuf,
    sink: Arc<TrackSink>,
    mut control: watch::Receiver<PlaybackControl>,
    loop_playback: bool,
) {
    let kind = sink.kind();
    let mut reader = match open_reader::<R>(path.clone()).await {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Cannot start {} playback: {:#}", kind, e);
            return;
        }
    };
    let mut seek_epoch = control.borrow().seek_epoch;
    let mut pending: Option<Frame> = None;
    let mut at_end = false;

    loop {
        let ctl = *control.borrow_and_update();
        if !ctl.running {
            break;
        }

        if ctl.seek_epoch != seek_epoch {
            seek_epoch = ctl.seek_epoch;
            match seek::<R>(path.clone(), ctl.seek_target).await {
                Ok((seeked, first)) => {
                    reader = seeked;
                    at_end = first.is_none();
                    pending = first;
                }
                Err(e) => warn!("Seek failed on {} track: {:#}", kind, e),
            }
            continue;
        }

        if ctl.paused || at_end {
            if control.changed().await.is_err() {
                break;
            }
            continue;
        }

        let frame = match pending.take() {
            Some(frame) => Some(frame),
            None => match read_frame(reader).await {
                Ok((returned, frame)) => {
                    reader = returned;
                    frame
                }
                Err(e) => {
                    warn!("Lost {} reader: {:#}", kind, e);
                    break;
                }
            },
        };

        let Some(frame) = frame else {
            if !loop_playback {
                info!("End of {} stream", kind);
                at_end = true;
                continue;
            }
            match open_reader::<R>(path.clone()).await {
                Ok(restarted) => reader = restarted,
                Err(e) => {
                    warn!("Cannot restart {} playback: {:#}", kind, e);
                    at_end = true;
                }
            }
            continue;
        };

        let sample = Sample {
            data: frame.data,
            duration: frame.duration,
            ..Default::default()
        };
        if let Err(e) = sink.write_sample(&sample).await {
            warn!("Failed to write {} sample: {}", kind, e);
        }

        tokio::select! {
            _ = tokio::time::sleep(frame.duration) => {}
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!("{} playback task finished", kind);
}

/// File reads run on the blocking pool, off the runtime workers.
async fn blocking<T, F>(read: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(read)
        .await
        .context("media reader task failed")?
}

async fn open_reader<R: FrameReader>(path: PathBuf) -> Result<R> {
    blocking(move || R::open(&path)).await
}

async fn read_frame<R: FrameReader>(mut reader: R) -> Result<(R, Option<Frame>)> {
    blocking(move || {
        let frame = reader.next_frame();
        Ok((reader, frame))
    })
    .await
}

/// Reopens the file and skips frames that start before `target`.
///
/// Returns the reader together with the first frame to play, `None` when
/// `target` lies past the end. The containers carry no index, so this is a
/// linear scan.
async fn seek<R: FrameReader>(path: PathBuf, target: Duration) -> Result<(R, Option<Frame>)> {
    blocking(move || {
        let mut reader = R::open(&path)?;
        while let Some(frame) = reader.next_frame() {
            if frame.timestamp >= target {
                return Ok((reader, Some(frame)));
            }
        }
        Ok((reader, None))
    })
    .await
}

#[async_trait]
impl MediaSource for FilePlaybackSource {
    async fn start(&self) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            return Ok(());
        }
        if !self.control.borrow().running {
            bail!("media source already stopped");
        }

        tasks.push(self.spawn_track::<IvfFrames>(
            self.config.video_file.clone(),
            self.video.clone(),
        ));
        tasks.push(self.spawn_track::<OggPages>(
            self.config.audio_file.clone(),
            self.audio.clone(),
        ));

        info!("Media playback started");
        Ok(())
    }

    async fn stop(&self) {
        self.control.send_modify(|c| c.running = false);

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        info!("Media playback stopped");
    }

    async fn set_paused(&self, paused: bool) {
        self.control.send_if_modified(|c| {
            let changed = c.paused != paused;
            c.paused = paused;
            changed
        });
    }

    async fn seek_to(&self, offset_millis: i64) {
        let target = Duration::from_millis(offset_millis.max(0) as u64);
        info!("Seeking media to {:?}", target);

        self.control.send_modify(|c| {
            c.seek_epoch += 1;
            c.seek_target = target;
        });
    }

    fn audio_sink(&self) -> Arc<dyn SampleSink> {
        self.audio.clone()
    }

    fn video_sink(&self) -> Arc<dyn SampleSink> {
        self.video.clone()
    }
}
