//! Video Stream CLI Library
//!
//! Shared functionality for the video stream command-line tools.

pub mod config;
pub mod logging;
pub mod stats;

pub use config::{CatalogSource, ClientFileConfig, Config, ConfigError, ServerFileConfig};
pub use stats::{
    display_client_stats, display_server_stats, format_bandwidth, format_bytes, format_duration,
};
