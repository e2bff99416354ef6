//! Video stream client
//!
//! Receives frame datagrams, simulates playback out of the resulting buffer
//! and asks the server for a different quality level when the buffer says
//! so. Arrivals and playback ticks run on the session's own thread.

use crate::config::ClientConfig;
use crate::session::{
    stop_requested, EventSink, SessionError, SessionHandle, SessionState, RECV_BUFFER_SIZE,
    STOP_POLL_INTERVAL,
};
use crossbeam::channel::Receiver;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vstream_io::{next_periodic_deadline, DatagramSocket, Scheduler};
use vstream_protocol::{BufferState, ClientReceiver, LevelChange, PlaybackEvent, ReceiverStats};

/// Events published by a running client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A playback tick ran; [`PlaybackEvent::Ended`] is the last one
    Playback(PlaybackEvent),
    /// The ABR controller changed level and sent feedback
    LevelRequested(LevelChange),
}

/// Client session statistics
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Arrival and playback counters
    pub receiver: ReceiverStats,
    /// Buffer state after the latest arrival or tick
    pub buffer: BufferState,
    /// Seconds of playback in the buffer
    pub buffered_seconds: f64,
    /// Level the client believes is active
    pub video_level: u16,
    /// Feedback datagrams sent
    pub feedback_sent: u64,
    /// Feedback datagrams the socket refused
    pub feedback_errors: u64,
    /// Failed socket reads
    pub receive_errors: u64,
    /// Address the stream is coming from
    pub server: Option<SocketAddr>,
    /// Whether playback has detected the end of the stream
    pub ended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientTimer {
    Playback,
}

/// Video stream client session
pub struct VideoStreamClient {
    config: ClientConfig,
    stats: Arc<RwLock<ClientStats>>,
    events: EventSink<ClientEvent>,
    events_rx: Receiver<ClientEvent>,
    handle: Option<SessionHandle>,
    state: SessionState,
}

impl VideoStreamClient {
    /// Create a client; configuration errors are reported here, before any I/O
    pub fn new(config: ClientConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let (events, events_rx) = EventSink::new();

        Ok(VideoStreamClient {
            stats: Arc::new(RwLock::new(ClientStats {
                video_level: config.initial_level,
                ..ClientStats::default()
            })),
            config,
            events,
            events_rx,
            handle: None,
            state: SessionState::Idle,
        })
    }

    /// Bind the listening socket and schedule the first playback tick
    ///
    /// Returns the local address the server should send to.
    pub fn start(&mut self) -> Result<SocketAddr, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted);
        }

        let receiver = ClientReceiver::new(
            self.config.frame_rate,
            self.config.max_level,
            self.config.initial_level,
        )?;

        let socket = DatagramSocket::bind(self.config.bind)?;
        if let Some(size) = self.config.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        let local_addr = socket.local_addr()?;

        tracing::info!(
            "Client listening on {} (level {}, playback after {:?})",
            local_addr,
            receiver.video_level(),
            self.config.initial_buffer_delay
        );

        let session = ClientLoop {
            socket,
            receiver,
            scheduler: Scheduler::new(),
            next_playback_at: Instant::now(),
            initial_buffer_delay: self.config.initial_buffer_delay,
            playback_interval: self.config.playback_interval,
            stats: self.stats.clone(),
            events: self.events.clone(),
        };
        let handle = SessionHandle::spawn(
            format!("vstream-client-{}", local_addr),
            local_addr,
            move |stop| session.run(&stop),
        )?;

        self.handle = Some(handle);
        self.state = SessionState::Running;
        Ok(local_addr)
    }

    /// Cancel playback and release the socket; stopping twice is a no-op
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Stopped;
        match self.handle.take() {
            Some(mut handle) => {
                let result = handle.stop();
                tracing::info!("Client {} stopped", handle.local_addr());
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
    pub fn stats(&self) -> ClientStats {
        self.stats.read().clone()
    }

    /// Whether playback has detected the end of the stream
    pub fn is_ended(&self) -> bool {
        self.stats.read().ended
    }

    /// Event stream for this session
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.events_rx.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for VideoStreamClient {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// State owned by the client thread
struct ClientLoop {
    socket: DatagramSocket,
    receiver: ClientReceiver,
    scheduler: Scheduler<ClientTimer>,
    /// Deadline of the pending playback tick
    next_playback_at: Instant,
    initial_buffer_delay: Duration,
    playback_interval: Duration,
    stats: Arc<RwLock<ClientStats>>,
    events: EventSink<ClientEvent>,
}

impl ClientLoop {
    fn run(mut self, stop: &AtomicBool) {
        self.next_playback_at = Instant::now() + self.initial_buffer_delay;
        self.scheduler
            .schedule_at(self.next_playback_at, ClientTimer::Playback);
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        while !stop_requested(stop) {
            while let Some((_, timer)) = self.scheduler.pop_due(Instant::now()) {
                match timer {
                    ClientTimer::Playback => self.on_playback_tick(),
                }
            }

            let wait = self
                .scheduler
                .time_until_next(Instant::now())
                .map_or(STOP_POLL_INTERVAL, |d| d.min(STOP_POLL_INTERVAL));

            match self.socket.recv_timeout(&mut buf, wait) {
                Ok(Some((n, from))) => self.on_datagram(n, from),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("Client receive error: {}", e);
                    self.stats.write().receive_errors += 1;
                }
            }
        }

        self.scheduler.cancel_all();
        tracing::debug!("Client loop exiting, releasing socket");
    }

    fn on_playback_tick(&mut self) {
        let event = self.receiver.on_playback_tick();

        if event.reschedule() {
            self.next_playback_at = next_periodic_deadline(
                self.next_playback_at,
                self.playback_interval,
                Instant::now(),
            );
            self.scheduler
                .schedule_at(self.next_playback_at, ClientTimer::Playback);
        }

        let mut stats = self.stats.write();
        stats.receiver = self.receiver.stats();
        stats.buffer = self.receiver.buffer();
        stats.buffered_seconds = self.receiver.buffered_seconds();
        stats.ended = self.receiver.is_ended();
        drop(stats);

        self.events.publish(ClientEvent::Playback(event));
    }

    fn on_datagram(&mut self, len: usize, from: SocketAddr) {
        let decision = self.receiver.on_datagram(len);

        let mut sent = 0;
        let mut failed = 0;
        for change in decision.changes() {
            // Feedback goes back to whoever sent the datagram that triggered it
            match self.socket.send_to(&change.feedback().to_bytes(), from) {
                Ok(_) => sent += 1,
                Err(e) => {
                    tracing::warn!("Failed to send feedback to {}: {}", from, e);
                    failed += 1;
                }
            }
            self.events.publish(ClientEvent::LevelRequested(change));
        }

        let mut stats = self.stats.write();
        stats.receiver = self.receiver.stats();
        stats.buffer = self.receiver.buffer();
        stats.buffered_seconds = self.receiver.buffered_seconds();
        stats.video_level = self.receiver.video_level();
        stats.feedback_sent += sent;
        stats.feedback_errors += failed;
        stats.server = Some(from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    fn config() -> ClientConfig {
        ClientConfig::new("127.0.0.1:0".parse().unwrap())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.initial_level = 0;
        assert!(matches!(
            VideoStreamClient::new(config),
            Err(SessionError::Config(ConfigError::LevelOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_start_and_stop() {
        let mut client = VideoStreamClient::new(config()).unwrap();
        let addr = client.start().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(client.state(), SessionState::Running);
        assert_eq!(client.stats().video_level, 1);

        client.stop().unwrap();
        client.stop().unwrap();
        assert_eq!(client.state(), SessionState::Stopped);
    }

    #[test]
    fn test_ends_without_server() {
        let mut config = config();
        config.initial_buffer_delay = Duration::from_millis(10);
        config.playback_interval = Duration::from_millis(10);
        let mut client = VideoStreamClient::new(config).unwrap();
        client.start().unwrap();

        let events = client.events();
        let mut seen = Vec::new();
        while let Ok(ClientEvent::Playback(event)) = events.recv_timeout(Duration::from_secs(2)) {
            seen.push(event);
            if event == PlaybackEvent::Ended {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                PlaybackEvent::Starved { stop_counter: 1 },
                PlaybackEvent::Starved { stop_counter: 2 },
                PlaybackEvent::Ended,
            ]
        );
        assert!(client.is_ended());
        assert_eq!(client.stats().buffer.stop_counter, 3);
        client.stop().unwrap();
    }
}
