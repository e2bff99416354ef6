//! Session configuration
//!
//! Plain configuration structs for the server and client sessions. Defaults
//! follow the reference deployment: 25 fps, 1400-byte datagrams, 3 seconds
//! of pre-roll and one playback tick per second.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use vstream_protocol::level::{LevelRange, MIN_LEVEL};
use vstream_protocol::pacer::DEFAULT_FRAME_RATE;
use vstream_protocol::packetizer::DEFAULT_MAX_PACKET_SIZE;
use vstream_protocol::playback::{DEFAULT_INITIAL_BUFFER_DELAY, DEFAULT_PLAYBACK_INTERVAL};

/// Default number of quality levels
pub const DEFAULT_MAX_LEVEL: u16 = 3;

/// Default UDP port
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Frame rate must be greater than zero")]
    ZeroFrameRate,

    #[error("Maximum packet size must be greater than zero")]
    ZeroPacketSize,

    #[error("Maximum quality level must be at least 1")]
    ZeroMaxLevel,

    #[error("Quality level {level} outside [1, {max}]")]
    LevelOutOfRange { level: u16, max: u16 },

    #[error("Playback interval must be greater than zero")]
    ZeroPlaybackInterval,

    #[error("Peer address {0} is unspecified")]
    UnspecifiedPeer(SocketAddr),
}

/// Server session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Local address to send from (and receive feedback on)
    pub bind: SocketAddr,
    /// Client address frames are sent to
    pub peer: SocketAddr,
    /// Frames per second
    pub frame_rate: u32,
    /// Maximum datagram payload (bytes)
    pub max_packet_size: usize,
    /// Quality level streaming starts at
    pub default_level: u16,
    /// Optional socket send buffer size
    pub send_buffer_size: Option<usize>,
}

impl ServerConfig {
    /// Defaults for sending to `peer` from an ephemeral port
    pub fn new(peer: SocketAddr) -> Self {
        let bind = if peer.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        ServerConfig {
            bind,
            peer,
            frame_rate: DEFAULT_FRAME_RATE,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            default_level: MIN_LEVEL,
            send_buffer_size: None,
        }
    }

    /// Check the configuration against the number of quality levels served
    pub fn validate(&self, max_level: u16) -> Result<(), ConfigError> {
        if self.frame_rate == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        if self.max_packet_size == 0 {
            return Err(ConfigError::ZeroPacketSize);
        }
        if self.peer.ip().is_unspecified() || self.peer.port() == 0 {
            return Err(ConfigError::UnspecifiedPeer(self.peer));
        }
        check_level(self.default_level, max_level)
    }

    /// Time between frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

/// Client session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Local address to receive frames on
    pub bind: SocketAddr,
    /// Frames per second (credits consumed per playback tick)
    pub frame_rate: u32,
    /// Highest quality level the client may request
    pub max_level: u16,
    /// Level the client assumes at session start
    pub initial_level: u16,
    /// Pre-roll before the first playback tick
    pub initial_buffer_delay: Duration,
    /// Time between playback ticks
    pub playback_interval: Duration,
    /// Optional socket receive buffer size
    pub recv_buffer_size: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            frame_rate: DEFAULT_FRAME_RATE,
            max_level: DEFAULT_MAX_LEVEL,
            initial_level: MIN_LEVEL,
            initial_buffer_delay: DEFAULT_INITIAL_BUFFER_DELAY,
            playback_interval: DEFAULT_PLAYBACK_INTERVAL,
            recv_buffer_size: None,
        }
    }
}

impl ClientConfig {
    /// Defaults, listening on `bind`
    pub fn new(bind: SocketAddr) -> Self {
        ClientConfig {
            bind,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        if self.playback_interval.is_zero() {
            return Err(ConfigError::ZeroPlaybackInterval);
        }
        check_level(self.initial_level, self.max_level)
    }
}

fn check_level(level: u16, max_level: u16) -> Result<(), ConfigError> {
    let range = LevelRange::new(max_level).map_err(|_| ConfigError::ZeroMaxLevel)?;
    if !range.contains(level) {
        return Err(ConfigError::LevelOutOfRange {
            level,
            max: max_level,
        });
    }
    Ok(())
}
