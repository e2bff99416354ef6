//! Client receiver
//!
//! Ties one client's buffer, ABR controller and playback simulator
//! together. Every arriving datagram is one frame credit, whatever its size
//! or content, and is followed immediately by an ABR evaluation.

use crate::abr::{AbrController, AbrDecision};
use crate::buffer::BufferState;
use crate::level::{LevelError, LevelRange};
use crate::playback::{PlaybackEvent, PlaybackSimulator};
use thiserror::Error;

/// Receiver errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiverError {
    #[error("Frame rate must be greater than zero")]
    ZeroFrameRate,

    #[error("Level error: {0}")]
    Level(#[from] LevelError),
}

/// Receiver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams received
    pub datagrams: u64,
    /// Payload bytes received
    pub bytes: u64,
    /// Level changes requested (each one is a feedback message)
    pub level_changes: u64,
    /// Playback ticks spent rebuffering
    pub rebuffer_ticks: u64,
    /// Playback ticks that found the buffer empty
    pub starved_ticks: u64,
    /// Seconds of video played
    pub played_seconds: u64,
}

/// Per-client receive and playback state
#[derive(Debug, Clone)]
pub struct ClientReceiver {
    buffer: BufferState,
    abr: AbrController,
    playback: PlaybackSimulator,
    stats: ReceiverStats,
}

impl ClientReceiver {
    /// Create receiver state for one client session
    pub fn new(
        frame_rate: u32,
        max_level: u16,
        initial_level: u16,
    ) -> Result<Self, ReceiverError> {
        if frame_rate == 0 {
            return Err(ReceiverError::ZeroFrameRate);
        }
        let levels = LevelRange::new(max_level)?;
        let abr = AbrController::new(levels, initial_level, frame_rate)?;

        Ok(ClientReceiver {
            buffer: BufferState::new(),
            abr,
            playback: PlaybackSimulator::new(frame_rate),
            stats: ReceiverStats::default(),
        })
    }

    /// Account one arriving datagram and run the ABR checks
    ///
    /// Each change in the returned decision must be sent to the server as a
    /// feedback message.
    pub fn on_datagram(&mut self, payload_len: usize) -> AbrDecision {
        self.buffer.credit();
        self.stats.datagrams += 1;
        self.stats.bytes += payload_len as u64;

        let decision = self.abr.evaluate(&self.buffer);
        self.stats.level_changes += decision.changes().count() as u64;
        decision
    }

    /// Run one playback tick
    pub fn on_playback_tick(&mut self) -> PlaybackEvent {
        let event = self.playback.tick(&mut self.buffer);
        match event {
            PlaybackEvent::Starved { .. } => self.stats.starved_ticks += 1,
            PlaybackEvent::Rebuffering { .. } => self.stats.rebuffer_ticks += 1,
            PlaybackEvent::Played { .. } => self.stats.played_seconds += 1,
            PlaybackEvent::Ended => {}
        }
        event
    }

    /// Current buffer state
    pub fn buffer(&self) -> BufferState {
        self.buffer
    }

    /// Seconds of playback currently buffered
    pub fn buffered_seconds(&self) -> f64 {
        self.buffer.buffered_seconds(self.playback.frame_rate())
    }

    /// Level the client believes is active
    pub fn video_level(&self) -> u16 {
        self.abr.level()
    }

    /// Whether playback has detected the end of the stream
    pub fn is_ended(&self) -> bool {
        self.playback.is_ended()
    }

    /// Counters
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abr::LevelChange;

    #[test]
    fn test_credit_per_datagram_not_per_byte() {
        let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
        rx.on_datagram(1400);
        rx.on_datagram(1);
        rx.on_datagram(0);
        assert_eq!(rx.buffer().buffered_units, 3);
        assert_eq!(rx.stats().bytes, 1401);
    }

    #[test]
    fn test_thirty_datagrams_then_tick() {
        let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
        for _ in 0..30 {
            assert!(rx.on_datagram(1400).is_empty());
        }
        assert_eq!(rx.on_playback_tick(), PlaybackEvent::Played { remaining: 5 });
        assert_eq!(
            rx.buffer(),
            BufferState {
                buffered_units: 5,
                stop_counter: 0,
                rebuffer_counter: 0,
            }
        );
    }

    #[test]
    fn test_downgrade_once_per_arrival() {
        let mut rx = ClientReceiver::new(25, 3, 3).unwrap();
        rx.on_datagram(100);
        for _ in 0..3 {
            rx.on_playback_tick();
        }
        assert_eq!(rx.buffer().rebuffer_counter, 3);

        let decision = rx.on_datagram(100);
        let changes: Vec<_> = decision.changes().collect();
        assert_eq!(changes, vec![LevelChange::Down(2)]);
        assert_eq!(rx.video_level(), 2);

        let decision = rx.on_datagram(100);
        assert_eq!(decision.downgrade, Some(1));
        assert!(rx.on_datagram(100).is_empty());
        assert_eq!(rx.stats().level_changes, 2);
    }

    #[test]
    fn test_upgrade_on_full_buffer() {
        let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
        let mut upgrades = Vec::new();
        for _ in 0..130 {
            if let Some(level) = rx.on_datagram(1400).upgrade {
                upgrades.push(level);
            }
        }
        assert_eq!(upgrades, vec![2, 3]);
        assert_eq!(rx.video_level(), 3);
    }

    #[test]
    fn test_buffered_seconds_tracks_frame_rate() {
        let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
        for _ in 0..50 {
            rx.on_datagram(1400);
        }
        assert_eq!(rx.buffered_seconds(), 2.0);

        rx.on_playback_tick();
        assert_eq!(rx.buffered_seconds(), 1.0);
    }

    #[test]
    fn test_end_detection() {
        let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
        assert!(rx.on_playback_tick().reschedule());
        assert!(rx.on_playback_tick().reschedule());
        assert!(!rx.on_playback_tick().reschedule());
        assert!(rx.is_ended());
        assert_eq!(rx.buffer().stop_counter, 3);
        assert_eq!(rx.stats().starved_ticks, 2);
    }

    #[test]
    fn test_invalid_config() {
        assert_eq!(
            ClientReceiver::new(0, 3, 1).unwrap_err(),
            ReceiverError::ZeroFrameRate
        );
        assert!(ClientReceiver::new(25, 0, 1).is_err());
        assert!(ClientReceiver::new(25, 3, 4).is_err());
    }
}
