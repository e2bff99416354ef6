//! Video Stream I/O and Platform Abstraction
//!
//! This crate provides the datagram socket wrapper and the timer scheduler
//! that the server and client event loops are built on.

pub mod socket;
pub mod time;

pub use socket::{DatagramSocket, SocketError};
pub use time::{next_periodic_deadline, Scheduler, TimerId, MAX_CATCH_UP_PERIODS};
