//! Video Stream - adaptive-bitrate video delivery over UDP
//!
//! High-level server and client sessions built on the protocol core and the
//! I/O layer.

pub mod client;
pub mod config;
pub mod server;
mod session;

pub use vstream_io as io;
pub use vstream_protocol as protocol;

pub use client::{ClientEvent, ClientStats, VideoStreamClient};
pub use config::{ClientConfig, ConfigError, ServerConfig, DEFAULT_MAX_LEVEL, DEFAULT_PORT};
pub use server::{ServerEvent, ServerStats, VideoStreamServer};
pub use session::{SessionError, SessionState};

// Re-export commonly used types
pub use protocol::{FrameCatalog, QualityCatalog};
