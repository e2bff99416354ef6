//! Video Stream Protocol Core
//!
//! This crate implements the I/O-free core of the adaptive-bitrate video
//! stream protocol: frame catalogs, frame fragmentation, the server's frame
//! pacer and feedback handler, and the client's receive buffer, ABR
//! controller and playback simulator.

pub mod abr;
pub mod buffer;
pub mod catalog;
pub mod feedback;
pub mod level;
pub mod pacer;
pub mod packetizer;
pub mod playback;
pub mod receiver;

pub use abr::{AbrController, AbrDecision, LevelChange};
pub use buffer::BufferState;
pub use catalog::{CatalogError, Frame, FrameCatalog, QualityCatalog};
pub use feedback::{
    FeedbackError, FeedbackHandler, FeedbackMessage, FeedbackOutcome, FeedbackStats,
};
pub use level::{LevelError, LevelRange, MIN_LEVEL};
pub use pacer::{FrameBurst, Pacer, PacerConfig, PacerError, PacerState, PacerStats, Tick};
pub use packetizer::{FragmentPlan, Fragments, Packetizer, PacketizerError};
pub use playback::{PlaybackEvent, PlaybackSimulator};
pub use receiver::{ClientReceiver, ReceiverError, ReceiverStats};
