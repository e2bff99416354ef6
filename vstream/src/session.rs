//! Session plumbing shared by the server and client
//!
//! Each session runs on one dedicated thread that owns its socket, its
//! timers and its protocol state, so ticks and arrivals for one session
//! never run concurrently. The owner keeps a [`SessionHandle`] to stop and
//! join that thread.

use crate::config::ConfigError;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use vstream_io::SocketError;
use vstream_protocol::{PacerError, ReceiverError};

/// Longest a session loop blocks before re-checking its stop flag
pub(crate) const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Receive buffer size; larger than any datagram the protocol sends
pub(crate) const RECV_BUFFER_SIZE: usize = 65536;

/// Capacity of a session's event channel; events beyond it are dropped
pub(crate) const EVENT_CAPACITY: usize = 1024;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pacer error: {0}")]
    Pacer(#[from] PacerError),

    #[error("Receiver error: {0}")]
    Receiver(#[from] ReceiverError),

    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Failed to spawn session thread: {0}")]
    Spawn(io::Error),

    #[error("Session was already started or stopped")]
    AlreadyStarted,

    #[error("Session thread panicked")]
    Panicked,
}

/// Lifecycle of a session object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// Running session thread
pub(crate) struct SessionHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl SessionHandle {
    /// Spawn `body` on a named thread; `body` must return once the flag is set
    pub(crate) fn spawn<F>(
        name: String,
        local_addr: SocketAddr,
        body: F,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || body(thread_stop))
            .map_err(SessionError::Spawn)?;

        Ok(SessionHandle {
            stop,
            thread: Some(thread),
            local_addr,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the thread to stop and wait for it
    pub(crate) fn stop(&mut self) -> Result<(), SessionError> {
        self.stop.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| SessionError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Check a session's stop flag
#[inline]
pub(crate) fn stop_requested(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Acquire)
}

/// Bounded event channel whose sender never blocks
#[derive(Debug, Clone)]
pub(crate) struct EventSink<E> {
    tx: Sender<E>,
}

impl<E> EventSink<E> {
    pub(crate) fn new() -> (Self, Receiver<E>) {
        let (tx, rx) = channel::bounded(EVENT_CAPACITY);
        (EventSink { tx }, rx)
    }

    /// Publish `event`, dropping it if no one is keeping up
    pub(crate) fn publish(&self, event: E) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Event channel full, dropping event");
            }
        }
    }
}
