//! Frame fragmentation
//!
//! A frame of `size` bytes leaves the server as `size / max_packet_size`
//! full datagrams followed by one datagram carrying the remainder. A zero
//! remainder produces no trailing datagram.

use crate::catalog::Frame;
use bytes::Bytes;
use thiserror::Error;

/// Default maximum datagram payload (bytes)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1400;

/// Packetizer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketizerError {
    #[error("Maximum packet size must be greater than zero")]
    ZeroPacketSize,
}

/// How one frame splits into datagrams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentPlan {
    /// Number of datagrams of exactly `chunk_size` bytes
    pub full_chunks: usize,
    /// Size of the full datagrams
    pub chunk_size: usize,
    /// Size of the trailing datagram (0 means none is sent)
    pub remainder: usize,
}

impl FragmentPlan {
    /// Total datagrams for this frame
    pub fn datagram_count(&self) -> usize {
        self.full_chunks + usize::from(self.remainder > 0)
    }

    /// Total payload bytes for this frame
    pub fn total_bytes(&self) -> usize {
        self.full_chunks * self.chunk_size + self.remainder
    }
}

/// Splits frames into datagram payloads
///
/// Payloads carry no header and no meaningful content; only their count
/// and length matter to the receiver. All payloads are slices of one shared
/// zeroed buffer, so producing them does not allocate.
#[derive(Debug, Clone)]
pub struct Packetizer {
    max_packet_size: usize,
    filler: Bytes,
}

impl Packetizer {
    /// Create a packetizer for the given maximum datagram payload size
    pub fn new(max_packet_size: usize) -> Result<Self, PacketizerError> {
        if max_packet_size == 0 {
            return Err(PacketizerError::ZeroPacketSize);
        }
        Ok(Packetizer {
            max_packet_size,
            filler: Bytes::from(vec![0u8; max_packet_size]),
        })
    }

    /// Maximum datagram payload size
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Compute the fragmentation of a frame of `size_bytes`
    pub fn plan(&self, size_bytes: u32) -> FragmentPlan {
        let size = size_bytes as usize;
        FragmentPlan {
            full_chunks: size / self.max_packet_size,
            chunk_size: self.max_packet_size,
            remainder: size % self.max_packet_size,
        }
    }

    /// Produce the datagram payloads for a frame, in send order
    pub fn fragment(&self, frame: Frame) -> Fragments {
        Fragments {
            filler: self.filler.clone(),
            plan: self.plan(frame.size_bytes),
            emitted: 0,
        }
    }
}

/// Iterator over the datagram payloads of one frame
#[derive(Debug, Clone)]
pub struct Fragments {
    filler: Bytes,
    plan: FragmentPlan,
    emitted: usize,
}

impl Fragments {
    /// The fragmentation being produced
    pub fn plan(&self) -> FragmentPlan {
        self.plan
    }
}

impl Iterator for Fragments {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let len = if self.emitted < self.plan.full_chunks {
            self.plan.chunk_size
        } else if self.emitted == self.plan.full_chunks && self.plan.remainder > 0 {
            self.plan.remainder
        } else {
            return None;
        };

        self.emitted += 1;
        Some(self.filler.slice(..len))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.plan.datagram_count() - self.emitted;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Fragments {}
