//! Quality feedback messages
//!
//! The client asks the server for a different quality level by sending a
//! feedback datagram. The payload is the requested level as a big-endian
//! `u16` and nothing else:
//!
//! ```text
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Requested level        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Feedback is fire-and-forget. A lost message is replaced by the next one
//! the client sends on a later buffer event.

use crate::level::LevelError;
use crate::pacer::Pacer;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Encoded size of a feedback message in bytes
pub const FEEDBACK_SIZE: usize = 2;

/// Feedback decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("Invalid feedback length: expected 2 bytes, got {0}")]
    InvalidLength(usize),
}

/// Client request for a quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackMessage {
    /// Requested quality level
    pub level: u16,
}

impl FeedbackMessage {
    /// Create a feedback message for `level`
    pub fn new(level: u16) -> Self {
        FeedbackMessage { level }
    }

    /// Serialize to wire format
    pub fn to_bytes(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FEEDBACK_SIZE);
        buf.put_u16(self.level);
        buf.freeze()
    }

    /// Parse from wire format
    pub fn from_bytes(mut data: &[u8]) -> Result<Self, FeedbackError> {
        if data.len() != FEEDBACK_SIZE {
            return Err(FeedbackError::InvalidLength(data.len()));
        }
        Ok(FeedbackMessage {
            level: data.get_u16(),
        })
    }
}

/// What the server did with an inbound feedback datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// Level switched; frames from the next tick use `to`
    Switched { from: u16, to: u16 },
    /// Requested level was already active
    Unchanged(u16),
    /// Requested level outside the catalog's range
    OutOfRange(LevelError),
    /// Payload was not a feedback message
    Malformed(FeedbackError),
}

/// Feedback handler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    /// Datagrams that switched the level
    pub switched: u64,
    /// Valid requests for the already active level
    pub unchanged: u64,
    /// Datagrams ignored as malformed or out of range
    pub ignored: u64,
}

/// Applies client feedback to the server's pacer
///
/// Invalid input is counted and ignored, never an error for the session.
#[derive(Debug, Default)]
pub struct FeedbackHandler {
    stats: FeedbackStats,
}

impl FeedbackHandler {
    /// Create a handler with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret `payload` as a feedback message and apply it to `pacer`
    pub fn on_datagram(&mut self, pacer: &mut Pacer, payload: &[u8]) -> FeedbackOutcome {
        let message = match FeedbackMessage::from_bytes(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Ignoring feedback datagram: {}", e);
                self.stats.ignored += 1;
                return FeedbackOutcome::Malformed(e);
            }
        };

        match pacer.set_level(message.level) {
            Ok(Some(from)) => {
                tracing::info!("Quality level switched {} -> {}", from, message.level);
                self.stats.switched += 1;
                FeedbackOutcome::Switched {
                    from,
                    to: message.level,
                }
            }
            Ok(None) => {
                self.stats.unchanged += 1;
                FeedbackOutcome::Unchanged(message.level)
            }
            Err(e) => {
                tracing::warn!("Ignoring feedback: {}", e);
                self.stats.ignored += 1;
                FeedbackOutcome::OutOfRange(e)
            }
        }
    }

    /// Counters
    pub fn stats(&self) -> FeedbackStats {
        self.stats
    }
}
