//! Configuration file support for the video stream CLI tools

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vstream::{ClientConfig, ServerConfig, DEFAULT_MAX_LEVEL, DEFAULT_PORT};
use vstream_protocol::{CatalogError, FrameCatalog, QualityCatalog};

/// Where the server's frame sizes come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogSource {
    /// One frame-size file per quality level, lowest level first
    Files { files: Vec<PathBuf> },
    /// Fixed-size frames, the same at every level
    Uniform {
        frame_size: u32,
        frame_count: usize,
        #[serde(default = "default_max_level")]
        max_level: u16,
    },
}

impl CatalogSource {
    /// Load the quality catalog this source describes
    pub fn load(&self) -> Result<QualityCatalog, CatalogError> {
        match self {
            CatalogSource::Files { files } => QualityCatalog::from_files(files),
            CatalogSource::Uniform {
                frame_size,
                frame_count,
                max_level,
            } => QualityCatalog::replicated(
                FrameCatalog::uniform(*frame_size, *frame_count)?,
                *max_level,
            ),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFileConfig {
    /// Client address to stream to
    pub peer: SocketAddr,
    /// Local bind address
    #[serde(default = "default_server_bind")]
    pub bind: SocketAddr,
    /// Frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Maximum datagram payload
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Level to start streaming at
    #[serde(default = "default_level")]
    pub default_level: u16,
    /// Statistics interval in seconds (0 disables)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    /// Socket send buffer size in bytes (system default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_buffer_size: Option<usize>,
    /// Frame sizes
    pub catalog: CatalogSource,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFileConfig {
    /// Address to receive the stream on
    #[serde(default = "default_client_listen")]
    pub listen: SocketAddr,
    /// Frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Highest level the client may request
    #[serde(default = "default_max_level")]
    pub max_level: u16,
    /// Level assumed at start
    #[serde(default = "default_level")]
    pub initial_level: u16,
    /// Pre-roll before playback starts, in milliseconds
    #[serde(default = "default_initial_buffer_delay")]
    pub initial_buffer_delay_ms: u64,
    /// Time between playback ticks, in milliseconds
    #[serde(default = "default_playback_interval")]
    pub playback_interval_ms: u64,
    /// Statistics interval in seconds (0 disables)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    /// Socket receive buffer size in bytes (system default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv_buffer_size: Option<usize>,
}

fn default_server_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

fn default_client_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

fn default_frame_rate() -> u32 {
    25
}

fn default_max_packet_size() -> usize {
    1400
}

fn default_level() -> u16 {
    1
}

fn default_max_level() -> u16 {
    DEFAULT_MAX_LEVEL
}

fn default_initial_buffer_delay() -> u64 {
    3000
}

fn default_playback_interval() -> u64 {
    1000
}

fn default_stats_interval() -> u64 {
    5
}

/// Combined configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: Option<ServerFileConfig>,
    /// Client configuration
    pub client: Option<ClientFileConfig>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Server section, or an error naming the missing table
    pub fn require_server(&self) -> Result<&ServerFileConfig, ConfigError> {
        self.server
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("missing [server] table".to_string()))
    }

    /// Client section, or an error naming the missing table
    pub fn require_client(&self) -> Result<&ClientFileConfig, ConfigError> {
        self.client
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("missing [client] table".to_string()))
    }

    /// Create example server configuration
    pub fn example_server() -> Self {
        Config {
            server: Some(ServerFileConfig {
                peer: SocketAddr::from(([10, 1, 1, 2], DEFAULT_PORT)),
                bind: default_server_bind(),
                frame_rate: 25,
                max_packet_size: 1400,
                default_level: 1,
                stats_interval_secs: 5,
                send_buffer_size: None,
                catalog: CatalogSource::Files {
                    files: vec![
                        PathBuf::from("frames/low.txt"),
                        PathBuf::from("frames/medium.txt"),
                        PathBuf::from("frames/high.txt"),
                    ],
                },
            }),
            client: None,
        }
    }

    /// Create example client configuration
    pub fn example_client() -> Self {
        Config {
            server: None,
            client: Some(ClientFileConfig {
                listen: default_client_listen(),
                frame_rate: 25,
                max_level: 3,
                initial_level: 1,
                initial_buffer_delay_ms: 3000,
                playback_interval_ms: 1000,
                stats_interval_secs: 5,
                recv_buffer_size: Some(1 << 20),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ServerFileConfig {
    /// Session configuration for the runtime
    pub fn session_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            peer: self.peer,
            frame_rate: self.frame_rate,
            max_packet_size: self.max_packet_size,
            default_level: self.default_level,
            send_buffer_size: self.send_buffer_size,
        }
    }

    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

impl ClientFileConfig {
    /// Session configuration for the runtime
    pub fn session_config(&self) -> ClientConfig {
        ClientConfig {
            bind: self.listen,
            frame_rate: self.frame_rate,
            max_level: self.max_level,
            initial_level: self.initial_level,
            initial_buffer_delay: Duration::from_millis(self.initial_buffer_delay_ms),
            playback_interval: Duration::from_millis(self.playback_interval_ms),
            recv_buffer_size: self.recv_buffer_size,
        }
    }

    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}
