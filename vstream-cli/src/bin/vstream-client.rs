//! Video Stream Client - receives a stream and drives quality feedback
//!
//! Buffers incoming datagrams as frame credits, simulates playback and asks
//! the server to change quality level based on buffer occupancy. Exits once
//! playback detects the end of the stream.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use vstream::protocol::PlaybackEvent;
use vstream::{ClientEvent, VideoStreamClient};
use vstream_cli::config::{ClientFileConfig, Config};
use vstream_cli::{display_client_stats, logging};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "vstream-client")]
#[command(about = "Adaptive-bitrate video stream client", long_about = None)]
struct Args {
    /// TOML configuration file with a [client] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    listen: SocketAddr,

    /// Frames per second
    #[arg(long, default_value = "25")]
    frame_rate: u32,

    /// Highest quality level
    #[arg(long, default_value = "3")]
    max_level: u16,

    /// Level assumed at start
    #[arg(long, default_value = "1")]
    initial_level: u16,

    /// Pre-roll before playback starts, in milliseconds
    #[arg(long, default_value = "3000")]
    initial_delay_ms: u64,

    /// Time between playback ticks, in milliseconds
    #[arg(long, default_value = "1000")]
    playback_interval_ms: u64,

    /// Statistics interval in seconds (0 disables)
    #[arg(long, default_value = "5")]
    stats: u64,

    /// Socket receive buffer size in bytes
    #[arg(long)]
    recv_buffer: Option<usize>,

    /// Write an example configuration file to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn file_config(&self) -> anyhow::Result<ClientFileConfig> {
        if let Some(path) = &self.config {
            return Ok(Config::from_file(path)?.require_client()?.clone());
        }

        Ok(ClientFileConfig {
            listen: self.listen,
            frame_rate: self.frame_rate,
            max_level: self.max_level,
            initial_level: self.initial_level,
            initial_buffer_delay_ms: self.initial_delay_ms,
            playback_interval_ms: self.playback_interval_ms,
            stats_interval_secs: self.stats,
            recv_buffer_size: self.recv_buffer,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Some(path) = &args.write_config {
        Config::example_client().to_file(path)?;
        tracing::info!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    let file_config = args.file_config()?;
    let mut client = VideoStreamClient::new(file_config.session_config())?;
    let events = client.events();
    client.start()?;

    let stats_interval = file_config.stats_interval();
    let start_time = Instant::now();
    let mut last_stats = start_time;

    loop {
        match events.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(ClientEvent::LevelRequested(change)) => {
                tracing::info!("Requested quality level {:?}", change);
            }
            Ok(ClientEvent::Playback(PlaybackEvent::Ended)) => {
                tracing::info!("Stream ended");
                break;
            }
            Ok(ClientEvent::Playback(event)) => {
                tracing::debug!("Playback: {:?}", event);
            }
            Err(_) if client.is_ended() => break,
            Err(_) => {}
        }

        if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
            display_client_stats(&client.stats(), start_time.elapsed());
            last_stats = Instant::now();
        }
    }

    client.stop()?;
    display_client_stats(&client.stats(), start_time.elapsed());
    Ok(())
}
