//! Video Stream Server - paces a frame catalog to one client
//!
//! Streams frame-sized datagrams at the configured frame rate and follows the
//! client's quality-level feedback until the catalog is exhausted.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vstream::{ServerEvent, VideoStreamServer};
use vstream_cli::config::{CatalogSource, Config, ServerFileConfig};
use vstream_cli::{display_server_stats, logging};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "vstream-server")]
#[command(about = "Adaptive-bitrate video stream server", long_about = None)]
struct Args {
    /// TOML configuration file with a [server] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Client address (host:port)
    #[arg(short, long)]
    peer: Option<SocketAddr>,

    /// Local bind address
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Frame size file, one per quality level, lowest first
    #[arg(short = 'f', long = "frame-file")]
    frame_files: Vec<PathBuf>,

    /// Fixed frame size in bytes (used when no frame file is given)
    #[arg(long, default_value = "4096")]
    frame_size: u32,

    /// Number of fixed-size frames
    #[arg(long, default_value = "1000")]
    frame_count: usize,

    /// Number of quality levels for fixed-size frames
    #[arg(long, default_value = "3")]
    max_level: u16,

    /// Frames per second
    #[arg(long, default_value = "25")]
    frame_rate: u32,

    /// Maximum datagram payload in bytes
    #[arg(long, default_value = "1400")]
    max_packet_size: usize,

    /// Level to start streaming at
    #[arg(long, default_value = "1")]
    default_level: u16,

    /// Statistics interval in seconds (0 disables)
    #[arg(long, default_value = "5")]
    stats: u64,

    /// Seconds to keep handling feedback after the last frame
    #[arg(long, default_value = "1")]
    linger: u64,

    /// Socket send buffer size in bytes
    #[arg(long)]
    send_buffer: Option<usize>,

    /// Write an example configuration file to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn file_config(&self) -> anyhow::Result<ServerFileConfig> {
        if let Some(path) = &self.config {
            return Ok(Config::from_file(path)?.require_server()?.clone());
        }

        let Some(peer) = self.peer else {
            anyhow::bail!("A peer address is required (--peer or --config)");
        };
        let catalog = if self.frame_files.is_empty() {
            CatalogSource::Uniform {
                frame_size: self.frame_size,
                frame_count: self.frame_count,
                max_level: self.max_level,
            }
        } else {
            CatalogSource::Files {
                files: self.frame_files.clone(),
            }
        };

        Ok(ServerFileConfig {
            peer,
            bind: self.bind,
            frame_rate: self.frame_rate,
            max_packet_size: self.max_packet_size,
            default_level: self.default_level,
            stats_interval_secs: self.stats,
            send_buffer_size: self.send_buffer,
            catalog,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Some(path) = &args.write_config {
        Config::example_server().to_file(path)?;
        tracing::info!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    let file_config = args.file_config()?;
    let catalog = Arc::new(file_config.catalog.load()?);
    tracing::info!(
        "Loaded catalog with {} quality levels",
        catalog.max_level()
    );

    let mut server = VideoStreamServer::new(file_config.session_config(), catalog)?;
    let events = server.events();
    server.start()?;

    let stats_interval = file_config.stats_interval();
    let start_time = Instant::now();
    let mut last_stats = start_time;
    let mut finished_at: Option<Instant> = None;

    loop {
        match events.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(ServerEvent::LevelSwitched { from, to }) => {
                tracing::info!("Client requested level {} (was {})", to, from);
            }
            Ok(ServerEvent::Finished { frames }) => {
                tracing::info!("All {} frames sent", frames);
                finished_at = Some(Instant::now());
            }
            Err(_) => {}
        }

        if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
            display_server_stats(&server.stats(), start_time.elapsed());
            last_stats = Instant::now();
        }

        if let Some(at) = finished_at {
            if at.elapsed() >= Duration::from_secs(args.linger) {
                break;
            }
        }
    }

    server.stop()?;
    display_server_stats(&server.stats(), start_time.elapsed());
    Ok(())
}
