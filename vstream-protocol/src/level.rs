//! Quality level bounds
//!
//! Quality levels are numbered from 1 (lowest bitrate) up to a configured
//! maximum. Every level the server streams or the client requests must fall
//! inside `[1, max]`.

use thiserror::Error;

/// Lowest quality level
pub const MIN_LEVEL: u16 = 1;

/// Quality level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LevelError {
    #[error("Maximum quality level must be at least 1")]
    ZeroMax,

    #[error("Quality level {level} outside [1, {max}]")]
    OutOfRange { level: u16, max: u16 },
}

/// Inclusive range of valid quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    max: u16,
}

impl LevelRange {
    /// Create a range `[1, max]`
    pub fn new(max: u16) -> Result<Self, LevelError> {
        if max < MIN_LEVEL {
            return Err(LevelError::ZeroMax);
        }
        Ok(LevelRange { max })
    }

    /// Highest valid level
    #[inline]
    pub fn max(&self) -> u16 {
        self.max
    }

    /// Check whether `level` is valid
    #[inline]
    pub fn contains(&self, level: u16) -> bool {
        (MIN_LEVEL..=self.max).contains(&level)
    }

    /// Return `level` if valid, or the error describing why not
    pub fn check(&self, level: u16) -> Result<u16, LevelError> {
        if self.contains(level) {
            Ok(level)
        } else {
            Err(LevelError::OutOfRange {
                level,
                max: self.max,
            })
        }
    }

    /// Next level up, if there is one
    pub fn above(&self, level: u16) -> Option<u16> {
        level.checked_add(1).filter(|&l| self.contains(l))
    }

    /// Next level down, if there is one
    pub fn below(&self, level: u16) -> Option<u16> {
        level.checked_sub(1).filter(|&l| self.contains(l))
    }
}
