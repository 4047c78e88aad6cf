use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ionwatch_client::{
    FilePlaybackSource, PlaybackConfig, ProtooChannel, SessionConfig, SessionStateMachine,
    TransportConfig, WebRtcTransport,
};
use ionwatch_core::{RoomId, RoomIdentity, UserId, UserProfile};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Publish a local video and audio file into an ion room and follow
/// playback commands from the room chat.
#[derive(Parser)]
#[command(name = "ionwatch", version)]
struct Args {
    /// IVF file with VP8 or VP9 frames.
    #[arg(long)]
    video_file: PathBuf,

    /// Ogg file with Opus audio.
    #[arg(long)]
    audio_file: PathBuf,

    #[arg(long, default_value = "ws://localhost:8443/ws")]
    ion_url: String,

    #[arg(long, default_value = "video-demo")]
    room: String,

    /// Display name announced on join.
    #[arg(long, default_value = "Video User")]
    name: String,

    /// STUN/TURN server URLs. Defaults to a public STUN server.
    #[arg(long = "stun")]
    ice_servers: Vec<String>,

    /// Keep-alive tick while paused (ms).
    #[arg(long, default_value_t = 20)]
    keepalive_ms: u64,

    /// Restart the files when they end.
    #[arg(long = "loop")]
    loop_playback: bool,

    /// Used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if let Err(e) = run(args).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args) -> Result<()> {
    let identity = RoomIdentity::new(RoomId::new(&args.room), UserId::generate());
    let profile = UserProfile::new(&args.name);

    println!("{}", "Starting ionwatch...".green().bold());
    println!("   Room:  {}", identity.room_id);
    println!("   User:  {} ({})", profile.display_name, identity.user_id);
    println!("   Video: {}", args.video_file.display());
    println!("   Audio: {}", args.audio_file.display());

    let media = FilePlaybackSource::open(PlaybackConfig {
        video_file: args.video_file,
        audio_file: args.audio_file,
        loop_playback: args.loop_playback,
    })
    .context("Failed to open media files")?;

    let mut transport_config = TransportConfig::default();
    if !args.ice_servers.is_empty() {
        transport_config.ice_servers = args.ice_servers;
    }
    let (transport_tx, transport_rx) = mpsc::channel(16);
    let transport = WebRtcTransport::new(transport_config, transport_tx)
        .await
        .context("Failed to create peer connection")?;

    let session = SessionStateMachine::new(
        SessionConfig {
            keep_alive_interval: Duration::from_millis(args.keepalive_ms.max(1)),
            ..SessionConfig::default()
        },
        Arc::new(transport),
        Arc::new(media),
    );

    let url = format!("{}?peer={}", args.ion_url, identity.user_id);
    let (channel, events) = ProtooChannel::connect(&url, REQUEST_TIMEOUT)
        .await
        .context("Failed to reach the ion signaling service")?;
    session.connect(Arc::new(channel), events).await?;
    session.monitor_transport(transport_rx);

    println!("{}", "Connected, press Ctrl-C to stop".cyan());

    session
        .run(identity, profile, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Session finished");
    println!("{}", "Stopped.".green().bold());
    Ok(())
}
