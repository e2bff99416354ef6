//! Playback simulator
//!
//! Once per playback interval the simulator tries to play one second of
//! video (`frame_rate` credits) out of the buffer:
//!
//! | Buffer                     | Effect                                   |
//! |----------------------------|------------------------------------------|
//! | empty                      | `stop_counter += 1`; ends the stream at 3 |
//! | `0 < units < frame_rate`   | `stop_counter = 0`, `rebuffer_counter += 1` |
//! | `units >= frame_rate`      | both counters reset, `units -= frame_rate` |
//!
//! There is no end-of-stream signal on the wire; three empty ticks in a row
//! are taken to mean the server has finished.

use crate::buffer::BufferState;
use std::time::Duration;

/// Consecutive empty ticks after which the stream is considered ended
pub const STOP_TICKS_TO_END: u32 = 3;

/// Default delay before the first playback tick
pub const DEFAULT_INITIAL_BUFFER_DELAY: Duration = Duration::from_secs(3);

/// Default time between playback ticks
pub const DEFAULT_PLAYBACK_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one playback tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Buffer was empty
    Starved { stop_counter: u32 },
    /// Buffer held less than one second of frames
    Rebuffering { rebuffer_counter: u32 },
    /// One second played
    Played { remaining: u32 },
    /// Stream considered over; no further ticks
    Ended,
}

impl PlaybackEvent {
    /// Whether another tick should be scheduled
    pub fn reschedule(&self) -> bool {
        !matches!(self, PlaybackEvent::Ended)
    }
}

/// Playback state machine over a [`BufferState`]
#[derive(Debug, Clone)]
pub struct PlaybackSimulator {
    frame_rate: u32,
    ended: bool,
    ticks: u64,
}

impl PlaybackSimulator {
    /// Create a simulator consuming `frame_rate` credits per tick
    pub fn new(frame_rate: u32) -> Self {
        PlaybackSimulator {
            frame_rate,
            ended: false,
            ticks: 0,
        }
    }

    /// Consume one second of playback from `buffer`
    ///
    /// After the stream has ended this leaves `buffer` untouched and keeps
    /// returning [`PlaybackEvent::Ended`].
    pub fn tick(&mut self, buffer: &mut BufferState) -> PlaybackEvent {
        if self.ended {
            return PlaybackEvent::Ended;
        }
        self.ticks += 1;

        if buffer.buffered_units == 0 {
            buffer.stop_counter += 1;
            if buffer.stop_counter >= STOP_TICKS_TO_END {
                tracing::info!(
                    "No frames for {} ticks, stream ended",
                    buffer.stop_counter
                );
                self.ended = true;
                return PlaybackEvent::Ended;
            }
            PlaybackEvent::Starved {
                stop_counter: buffer.stop_counter,
            }
        } else if buffer.buffered_units < self.frame_rate {
            buffer.stop_counter = 0;
            buffer.rebuffer_counter += 1;
            tracing::debug!(
                "Rebuffering: {} frames buffered ({} ticks)",
                buffer.buffered_units,
                buffer.rebuffer_counter
            );
            PlaybackEvent::Rebuffering {
                rebuffer_counter: buffer.rebuffer_counter,
            }
        } else {
            buffer.stop_counter = 0;
            buffer.rebuffer_counter = 0;
            buffer.buffered_units -= self.frame_rate;
            PlaybackEvent::Played {
                remaining: buffer.buffered_units,
            }
        }
    }

    /// Whether the stream has ended
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Ticks run, up to and including the one that ended the stream
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Credits consumed by each played tick
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }
}
