//! Server frame pacer
//!
//! The pacer owns the active quality level and the frame cursor. Each tick
//! takes the frame under the cursor from the active level's catalog, hands it
//! out as a burst of datagram payloads and advances the cursor. Once the
//! cursor runs past the end of the active catalog the pacer stops for good.
//!
//! The pacer does no I/O and keeps no clock; the runtime calls [`Pacer::tick`]
//! every [`Pacer::frame_interval`].

use crate::catalog::{Frame, QualityCatalog};
use crate::level::{LevelError, LevelRange};
use crate::packetizer::{Fragments, Packetizer, PacketizerError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default frame rate (frames per second)
pub const DEFAULT_FRAME_RATE: u32 = 25;

/// Pacer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacerError {
    #[error("Frame rate must be greater than zero")]
    ZeroFrameRate,

    #[error("Packetizer error: {0}")]
    Packetizer(#[from] PacketizerError),

    #[error("Invalid default level: {0}")]
    Level(#[from] LevelError),

    #[error("Pacer is not in the correct state")]
    InvalidState,
}

/// Pacer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    /// Created, not yet started
    Idle,
    /// Emitting one frame per tick
    Running,
    /// Catalog exhausted or stopped by the owner (terminal)
    Stopped,
}

/// Pacer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerConfig {
    /// Frames per second
    pub frame_rate: u32,
    /// Maximum datagram payload size (bytes)
    pub max_packet_size: usize,
    /// Quality level to start streaming at
    pub default_level: u16,
}

impl Default for PacerConfig {
    fn default() -> Self {
        PacerConfig {
            frame_rate: DEFAULT_FRAME_RATE,
            max_packet_size: crate::packetizer::DEFAULT_MAX_PACKET_SIZE,
            default_level: crate::level::MIN_LEVEL,
        }
    }
}

/// Pacer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacerStats {
    /// Frames handed out
    pub frames: u64,
    /// Datagram payloads handed out
    pub datagrams: u64,
    /// Payload bytes handed out
    pub bytes: u64,
    /// Accepted level changes
    pub level_switches: u64,
}

/// One frame's worth of datagrams
#[derive(Debug, Clone)]
pub struct FrameBurst {
    /// The frame being sent
    pub frame: Frame,
    /// Level the frame was taken from
    pub level: u16,
    /// Datagram payloads, in send order
    pub fragments: Fragments,
}

/// Result of one pacing tick
#[derive(Debug, Clone)]
pub struct Tick {
    /// Frame to send on this tick, if any
    pub burst: Option<FrameBurst>,
    /// Whether the next tick should be scheduled
    pub reschedule: bool,
}

/// Frame pacer state machine
#[derive(Debug)]
pub struct Pacer {
    catalog: Arc<QualityCatalog>,
    packetizer: Packetizer,
    levels: LevelRange,
    frame_rate: u32,
    default_level: u16,
    active_level: u16,
    cursor: usize,
    state: PacerState,
    stats: PacerStats,
}

impl Pacer {
    /// Create an idle pacer over a shared catalog
    pub fn new(catalog: Arc<QualityCatalog>, config: PacerConfig) -> Result<Self, PacerError> {
        if config.frame_rate == 0 {
            return Err(PacerError::ZeroFrameRate);
        }
        let packetizer = Packetizer::new(config.max_packet_size)?;
        let levels = LevelRange::new(catalog.max_level())?;
        levels.check(config.default_level)?;

        Ok(Pacer {
            catalog,
            packetizer,
            levels,
            frame_rate: config.frame_rate,
            default_level: config.default_level,
            active_level: config.default_level,
            cursor: 0,
            state: PacerState::Idle,
            stats: PacerStats::default(),
        })
    }

    /// Begin pacing from the first frame at the default level
    pub fn start(&mut self) -> Result<(), PacerError> {
        if self.state != PacerState::Idle {
            return Err(PacerError::InvalidState);
        }
        self.cursor = 0;
        self.active_level = self.default_level;
        self.state = PacerState::Running;
        tracing::debug!("Pacer started at level {}", self.active_level);
        Ok(())
    }

    /// Emit the frame under the cursor and advance
    ///
    /// Returns no burst when the pacer is not running or the cursor is
    /// already past the end of the active catalog.
    pub fn tick(&mut self) -> Tick {
        if self.state != PacerState::Running {
            return Tick {
                burst: None,
                reschedule: false,
            };
        }

        let frame = match self.catalog.frame(self.active_level, self.cursor) {
            Some(frame) => frame,
            None => {
                self.finish();
                return Tick {
                    burst: None,
                    reschedule: false,
                };
            }
        };

        let fragments = self.packetizer.fragment(frame);
        let plan = fragments.plan();
        self.stats.frames += 1;
        self.stats.datagrams += plan.datagram_count() as u64;
        self.stats.bytes += plan.total_bytes() as u64;

        self.cursor += 1;
        if self.cursor >= self.active_catalog_len() {
            self.finish();
        }

        Tick {
            burst: Some(FrameBurst {
                frame,
                level: self.active_level,
                fragments,
            }),
            reschedule: self.state == PacerState::Running,
        }
    }

    /// Switch to `level` starting with the next tick
    ///
    /// Returns the previous level on a change, `Ok(None)` if `level` is
    /// already active.
    pub fn set_level(&mut self, level: u16) -> Result<Option<u16>, LevelError> {
        self.levels.check(level)?;
        if level == self.active_level {
            return Ok(None);
        }

        let previous = self.active_level;
        self.active_level = level;
        self.stats.level_switches += 1;
        Ok(Some(previous))
    }

    /// Stop pacing; stopping twice is a no-op
    pub fn stop(&mut self) {
        self.state = PacerState::Stopped;
    }

    fn finish(&mut self) {
        tracing::debug!(
            "Pacer reached end of level {} catalog after {} frames",
            self.active_level,
            self.cursor
        );
        self.state = PacerState::Stopped;
    }

    fn active_catalog_len(&self) -> usize {
        self.catalog
            .level(self.active_level)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Time between ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate
    }

    /// Current state
    pub fn state(&self) -> PacerState {
        self.state
    }

    /// Level the next frame is taken from
    pub fn active_level(&self) -> u16 {
        self.active_level
    }

    /// Index of the next frame
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Valid quality levels
    pub fn levels(&self) -> LevelRange {
        self.levels
    }

    /// Counters
    pub fn stats(&self) -> PacerStats {
        self.stats
    }
}
