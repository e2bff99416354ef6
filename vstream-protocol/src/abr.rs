//! Adaptive bitrate controller
//!
//! Buffer-occupancy heuristic evaluated on every datagram arrival:
//!
//! - **Downgrade** when the playback simulator has rebuffered for
//!   [`REBUFFER_DOWNGRADE_TICKS`] consecutive ticks.
//! - **Upgrade** when more than [`UPGRADE_BUFFER_SECONDS`] seconds of frames
//!   are buffered.
//!
//! The two checks run in that order on the same arrival and may both fire.

use crate::buffer::BufferState;
use crate::feedback::FeedbackMessage;
use crate::level::{LevelError, LevelRange};

/// Consecutive rebuffering ticks that trigger a downgrade
pub const REBUFFER_DOWNGRADE_TICKS: u32 = 3;

/// Buffered seconds that must be exceeded before an upgrade
pub const UPGRADE_BUFFER_SECONDS: u32 = 5;

/// Direction of a level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    Down(u16),
    Up(u16),
}

impl LevelChange {
    /// The level requested by this change
    pub fn level(self) -> u16 {
        match self {
            LevelChange::Down(level) | LevelChange::Up(level) => level,
        }
    }

    /// Feedback message announcing this change
    pub fn feedback(self) -> FeedbackMessage {
        FeedbackMessage::new(self.level())
    }
}

/// Changes decided on one arrival
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbrDecision {
    pub downgrade: Option<u16>,
    pub upgrade: Option<u16>,
}

impl AbrDecision {
    /// True when no change was made
    pub fn is_empty(&self) -> bool {
        self.downgrade.is_none() && self.upgrade.is_none()
    }

    /// Changes in the order they were made
    pub fn changes(&self) -> impl Iterator<Item = LevelChange> {
        self.downgrade
            .map(LevelChange::Down)
            .into_iter()
            .chain(self.upgrade.map(LevelChange::Up))
    }
}

/// Client-side quality level controller
#[derive(Debug, Clone)]
pub struct AbrController {
    levels: LevelRange,
    level: u16,
    upgrade_threshold: u64,
}

impl AbrController {
    /// Create a controller starting at `initial_level`
    pub fn new(
        levels: LevelRange,
        initial_level: u16,
        frame_rate: u32,
    ) -> Result<Self, LevelError> {
        levels.check(initial_level)?;
        Ok(AbrController {
            levels,
            level: initial_level,
            upgrade_threshold: UPGRADE_BUFFER_SECONDS as u64 * frame_rate as u64,
        })
    }

    /// Run both checks against the current buffer state
    pub fn evaluate(&mut self, buffer: &BufferState) -> AbrDecision {
        let mut decision = AbrDecision::default();

        if buffer.rebuffer_counter >= REBUFFER_DOWNGRADE_TICKS {
            if let Some(lower) = self.levels.below(self.level) {
                tracing::info!(
                    "Rebuffered {} ticks, lowering quality level {} -> {}",
                    buffer.rebuffer_counter,
                    self.level,
                    lower
                );
                self.level = lower;
                decision.downgrade = Some(lower);
            }
        }

        if buffer.buffered_units as u64 > self.upgrade_threshold {
            if let Some(higher) = self.levels.above(self.level) {
                tracing::info!(
                    "{} frames buffered, raising quality level {} -> {}",
                    buffer.buffered_units,
                    self.level,
                    higher
                );
                self.level = higher;
                decision.upgrade = Some(higher);
            }
        }

        decision
    }

    /// Level the client believes is active
    pub fn level(&self) -> u16 {
        self.level
    }

    /// Valid quality levels
    pub fn levels(&self) -> LevelRange {
        self.levels
    }
}
