//! Client playback buffer state

/// Playback buffer occupancy and stall history
///
/// Mutated by the receiver (credits) and the playback simulator (consumption
/// and counters) of one client; never shared between clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferState {
    /// Frame credits received but not yet played
    pub buffered_units: u32,
    /// Consecutive playback ticks that found the buffer empty
    pub stop_counter: u32,
    /// Consecutive playback ticks that found less than one second buffered
    pub rebuffer_counter: u32,
}

impl BufferState {
    /// Empty buffer with cleared counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one frame credit
    #[inline]
    pub fn credit(&mut self) {
        self.buffered_units = self.buffered_units.saturating_add(1);
    }

    /// Seconds of playback buffered at `frame_rate`
    pub fn buffered_seconds(&self, frame_rate: u32) -> f64 {
        if frame_rate == 0 {
            return 0.0;
        }
        self.buffered_units as f64 / frame_rate as f64
    }
}
