//! Video stream server
//!
//! Paces frames from a shared quality catalog to one client and applies the
//! client's quality feedback. The pacing timer, the sends and the feedback
//! reads all happen on the session's own thread.

use crate::config::ServerConfig;
use crate::session::{
    stop_requested, EventSink, SessionError, SessionHandle, SessionState, RECV_BUFFER_SIZE,
    STOP_POLL_INTERVAL,
};
use crossbeam::channel::Receiver;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use vstream_io::{next_periodic_deadline, DatagramSocket, Scheduler};
use vstream_protocol::{
    FeedbackHandler, FeedbackOutcome, FeedbackStats, FrameBurst, Pacer, PacerConfig, PacerStats,
    QualityCatalog,
};

/// Events published by a running server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Client feedback switched the streamed level
    LevelSwitched { from: u16, to: u16 },
    /// Every frame has been sent
    Finished { frames: u64 },
}

/// Server session statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Frames, datagrams and bytes handed to the socket
    pub pacer: PacerStats,
    /// Feedback datagrams handled
    pub feedback: FeedbackStats,
    /// Level frames are currently taken from
    pub active_level: u16,
    /// Datagrams the socket refused
    pub send_errors: u64,
    /// Failed socket reads
    pub receive_errors: u64,
    /// Whether the catalog has been fully sent
    pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerTimer {
    Pace,
}

/// Video stream server session
pub struct VideoStreamServer {
    config: ServerConfig,
    catalog: Arc<QualityCatalog>,
    stats: Arc<RwLock<ServerStats>>,
    events: EventSink<ServerEvent>,
    events_rx: Receiver<ServerEvent>,
    handle: Option<SessionHandle>,
    state: SessionState,
}

impl VideoStreamServer {
    /// Create a server; configuration errors are reported here, before any I/O
    pub fn new(config: ServerConfig, catalog: Arc<QualityCatalog>) -> Result<Self, SessionError> {
        config.validate(catalog.max_level())?;
        let (events, events_rx) = EventSink::new();

        Ok(VideoStreamServer {
            stats: Arc::new(RwLock::new(ServerStats {
                active_level: config.default_level,
                ..ServerStats::default()
            })),
            config,
            catalog,
            events,
            events_rx,
            handle: None,
            state: SessionState::Idle,
        })
    }

    /// Bind, connect to the peer and start pacing from the first frame
    ///
    /// Returns the local address frames are sent from.
    pub fn start(&mut self) -> Result<SocketAddr, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }

        let mut pacer = Pacer::new(
            self.catalog.clone(),
            PacerConfig {
                frame_rate: self.config.frame_rate,
                max_packet_size: self.config.max_packet_size,
                default_level: self.config.default_level,
            },
        )?;

        let mut socket = DatagramSocket::bind(self.config.bind)?;
        if let Some(size) = self.config.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }
        socket.connect(self.config.peer)?;
        let local_addr = socket.local_addr()?;

        pacer.start()?;
        tracing::info!(
            "Server {} streaming to {} at level {} ({} fps, {} byte packets)",
            local_addr,
            self.config.peer,
            pacer.active_level(),
            self.config.frame_rate,
            self.config.max_packet_size
        );

        let session = ServerLoop {
            socket,
            pacer,
            feedback: FeedbackHandler::new(),
            scheduler: Scheduler::new(),
            next_pace_at: Instant::now(),
            stats: self.stats.clone(),
            events: self.events.clone(),
        };
        let handle = SessionHandle::spawn(
            format!("vstream-server-{}", local_addr),
            local_addr,
            move |stop| session.run(&stop),
        )?;

        self.handle = Some(handle);
        self.state = SessionState::Running;
        Ok(local_addr)
    }

    /// Stop pacing and release the socket; stopping twice is a no-op
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Stopped;
        match self.handle.take() {
            Some(mut handle) => {
                let result = handle.stop();
                tracing::info!("Server {} stopped", handle.local_addr());
                result
            }
            None => Ok(()),
        }
    }

    /// Local address once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.as_ref().map(|h| h.local_addr())
    }

    /// Snapshot of the session statistics
    pub fn stats(&self) -> ServerStats {
        self.stats.read().clone()
    }

    /// Whether every frame has been sent
    pub fn is_finished(&self) -> bool {
        self.stats.read().finished
    }

    /// Event stream for this session
    pub fn events(&self) -> Receiver<ServerEvent> {
        self.events_rx.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Drop for VideoStreamServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// State owned by the server thread
struct ServerLoop {
    socket: DatagramSocket,
    pacer: Pacer,
    feedback: FeedbackHandler,
    scheduler: Scheduler<ServerTimer>,
    /// Deadline of the pending pace tick; later ticks are spaced from it
    next_pace_at: Instant,
    stats: Arc<RwLock<ServerStats>>,
    events: EventSink<ServerEvent>,
}

impl ServerLoop {
    fn run(mut self, stop: &AtomicBool) {
        self.next_pace_at = Instant::now();
        self.scheduler.schedule_at(self.next_pace_at, ServerTimer::Pace);
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        while !stop_requested(stop) {
            while let Some((_, timer)) = self.scheduler.pop_due(Instant::now()) {
                match timer {
                    ServerTimer::Pace => self.on_pace_tick(),
                }
            }

            let wait = self
                .scheduler
                .time_until_next(Instant::now())
                .map_or(STOP_POLL_INTERVAL, |d| d.min(STOP_POLL_INTERVAL));

            match self.socket.recv_timeout(&mut buf, wait) {
                Ok(Some((n, from))) => self.on_feedback(&buf[..n], from),
                Ok(None) => {}
                Err(e) => {
                    // ICMP errors from an absent client land here too
                    tracing::debug!("Server receive error: {}", e);
                    self.stats.write().receive_errors += 1;
                }
            }
        }

        self.scheduler.cancel_all();
        self.pacer.stop();
        tracing::debug!("Server loop exiting, releasing socket");
    }

    fn on_pace_tick(&mut self) {
        let tick = self.pacer.tick();

        let send_errors = match tick.burst {
            Some(burst) => self.send_burst(burst),
            None => 0,
        };

        if tick.reschedule {
            self.next_pace_at = next_periodic_deadline(
                self.next_pace_at,
                self.pacer.frame_interval(),
                Instant::now(),
            );
            self.scheduler
                .schedule_at(self.next_pace_at, ServerTimer::Pace);
        }

        let mut stats = self.stats.write();
        stats.pacer = self.pacer.stats();
        stats.send_errors += send_errors;
        if !tick.reschedule && !stats.finished {
            stats.finished = true;
            tracing::info!(
                "Stream finished: {} frames, {} datagrams sent",
                stats.pacer.frames,
                stats.pacer.datagrams
            );
            self.events.publish(ServerEvent::Finished {
                frames: stats.pacer.frames,
            });
        }
    }

    /// Send every fragment of a frame; failures are counted, not retried
    fn send_burst(&self, burst: FrameBurst) -> u64 {
        let mut errors = 0;
        tracing::trace!(
            "Frame {} (level {}, {} bytes) in {} datagrams",
            burst.frame.index,
            burst.level,
            burst.frame.size_bytes,
            burst.fragments.len()
        );

        for payload in burst.fragments {
            if let Err(e) = self.socket.send(&payload) {
                if errors == 0 {
                    tracing::warn!("Send failed for frame {}: {}", burst.frame.index, e);
                }
                errors += 1;
            }
        }
        errors
    }

    fn on_feedback(&mut self, payload: &[u8], from: SocketAddr) {
        let outcome = self.feedback.on_datagram(&mut self.pacer, payload);

        let mut stats = self.stats.write();
        stats.feedback = self.feedback.stats();
        stats.active_level = self.pacer.active_level();
        drop(stats);

        if let FeedbackOutcome::Switched { from: old, to } = outcome {
            tracing::debug!("Feedback from {} switched level {} -> {}", from, old, to);
            self.events.publish(ServerEvent::LevelSwitched { from: old, to });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use vstream_protocol::FrameCatalog;

    fn catalog() -> Arc<QualityCatalog> {
        Arc::new(QualityCatalog::replicated(FrameCatalog::uniform(3000, 5).unwrap(), 3).unwrap())
    }

    fn config() -> ServerConfig {
        let mut config = ServerConfig::new("127.0.0.1:9".parse().unwrap());
        config.bind = "127.0.0.1:0".parse().unwrap();
        config
    }

    #[test]
    fn test_rejects_level_outside_catalog() {
        let mut config = config();
        config.default_level = 4;
        assert!(matches!(
            VideoStreamServer::new(config, catalog()),
            Err(SessionError::Config(ConfigError::LevelOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_start_twice() {
        let mut server = VideoStreamServer::new(config(), catalog()).unwrap();
        assert_eq!(server.state(), SessionState::Idle);
        server.start().unwrap();
        assert!(server.local_addr().is_some());
        assert!(matches!(server.start(), Err(SessionError::AlreadyStarted)));
        server.stop().unwrap();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut server = VideoStreamServer::new(config(), catalog()).unwrap();
        server.stop().unwrap();
        server.stop().unwrap();
        assert_eq!(server.state(), SessionState::Stopped);
        assert!(matches!(server.start(), Err(SessionError::AlreadyStarted)));
    }
}
