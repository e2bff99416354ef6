//! Client and server sessions talking over the loopback interface

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vstream::protocol::{FrameCatalog, LevelChange, PlaybackEvent};
use vstream::{
    ClientConfig, ClientEvent, QualityCatalog, ServerConfig, ServerEvent, SessionState,
    VideoStreamClient, VideoStreamServer,
};
use vstream_io::DatagramSocket;
use vstream_tests::{collect_until, tiered_catalog, wait_until};

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn start_client(config: ClientConfig) -> (VideoStreamClient, SocketAddr) {
    let mut client = VideoStreamClient::new(config).unwrap();
    let addr = client.start().unwrap();
    (client, addr)
}

fn start_server(
    peer: SocketAddr,
    frame_rate: u32,
    default_level: u16,
    catalog: Arc<QualityCatalog>,
) -> VideoStreamServer {
    let config = ServerConfig {
        bind: loopback(),
        frame_rate,
        default_level,
        ..ServerConfig::new(peer)
    };
    let mut server = VideoStreamServer::new(config, catalog).unwrap();
    server.start().unwrap();
    server
}

#[test]
fn test_full_stream_then_client_ends() {
    let (mut client, client_addr) = start_client(ClientConfig {
        frame_rate: 1,
        max_level: 1,
        initial_buffer_delay: Duration::from_millis(400),
        playback_interval: Duration::from_millis(10),
        ..ClientConfig::new(loopback())
    });
    let client_events = client.events();

    let catalog = Arc::new(
        QualityCatalog::new(vec![FrameCatalog::uniform(1400, 20).unwrap()]).unwrap(),
    );
    let mut server = start_server(client_addr, 100, 1, catalog);
    let server_events = server.events();

    let finished = collect_until(&server_events, Duration::from_secs(5), |e| {
        matches!(e, ServerEvent::Finished { .. })
    });
    assert_eq!(finished.last(), Some(&ServerEvent::Finished { frames: 20 }));
    assert!(server.is_finished());
    assert_eq!(server.stats().pacer.datagrams, 20);

    let playback = collect_until(&client_events, Duration::from_secs(5), |e| {
        *e == ClientEvent::Playback(PlaybackEvent::Ended)
    });
    assert_eq!(
        playback.last(),
        Some(&ClientEvent::Playback(PlaybackEvent::Ended))
    );

    let stats = client.stats();
    assert!(stats.ended);
    assert_eq!(stats.receiver.datagrams, 20);
    assert_eq!(stats.receiver.bytes, 20 * 1400);
    assert_eq!(stats.receiver.played_seconds, 20);
    assert_eq!(stats.buffer.stop_counter, 3);
    assert_eq!(stats.feedback_sent, 0);

    server.stop().unwrap();
    client.stop().unwrap();
}

#[test]
fn test_growing_buffer_upgrades_server() {
    let (mut client, client_addr) = start_client(ClientConfig {
        initial_buffer_delay: Duration::from_secs(30),
        ..ClientConfig::new(loopback())
    });
    let client_events = client.events();

    let mut server = start_server(client_addr, 200, 1, tiered_catalog(3, 300, 1400));
    let server_events = server.events();

    let switches = collect_until(&server_events, Duration::from_secs(10), |e| {
        *e == ServerEvent::LevelSwitched { from: 2, to: 3 }
    });
    assert!(switches.contains(&ServerEvent::LevelSwitched { from: 1, to: 2 }));
    assert!(switches.contains(&ServerEvent::LevelSwitched { from: 2, to: 3 }));

    let requested: Vec<_> = collect_until(&client_events, Duration::from_secs(2), |e| {
        *e == ClientEvent::LevelRequested(LevelChange::Up(3))
    })
    .into_iter()
    .filter_map(|e| match e {
            ClientEvent::LevelRequested(change) => Some(change),
            _ => None,
        })
        .collect();
    assert_eq!(requested, vec![LevelChange::Up(2), LevelChange::Up(3)]);
    let stats = client.stats();
    assert_eq!(stats.video_level, 3);
    // No playback has run yet: every datagram is still buffered
    assert_eq!(
        stats.buffered_seconds,
        stats.buffer.buffered_units as f64 / 25.0
    );
    assert!(stats.buffered_seconds > 5.0);
    assert!(wait_until(Duration::from_secs(2), || {
        server.stats().active_level == 3
    }));

    server.stop().unwrap();
    client.stop().unwrap();
}

#[test]
fn test_slow_stream_downgrades_server() {
    let (mut client, client_addr) = start_client(ClientConfig {
        frame_rate: 25,
        max_level: 3,
        initial_level: 3,
        initial_buffer_delay: Duration::from_millis(150),
        playback_interval: Duration::from_millis(50),
        ..ClientConfig::new(loopback())
    });

    // Ten single-datagram frames per second never fill a 25 frame second
    let catalog = Arc::new(
        QualityCatalog::replicated(FrameCatalog::uniform(1000, 200).unwrap(), 3).unwrap(),
    );
    let mut server = start_server(client_addr, 10, 3, catalog);
    let server_events = server.events();

    let switches = collect_until(&server_events, Duration::from_secs(10), |e| {
        *e == ServerEvent::LevelSwitched { from: 3, to: 2 }
    });
    assert_eq!(
        switches.last(),
        Some(&ServerEvent::LevelSwitched { from: 3, to: 2 })
    );
    assert!(client.stats().receiver.rebuffer_ticks >= 3);

    server.stop().unwrap();
    client.stop().unwrap();
}

#[test]
fn test_stop_halts_transmission() {
    let sink = DatagramSocket::bind(loopback()).unwrap();
    let sink_addr = sink.local_addr().unwrap();
    let mut buf = vec![0u8; 2048];

    let mut server = start_server(sink_addr, 100, 1, tiered_catalog(1, 1000, 1400));
    assert_eq!(server.state(), SessionState::Running);

    let mut received = 0;
    while received < 5 {
        if sink
            .recv_timeout(&mut buf, Duration::from_secs(2))
            .unwrap()
            .is_some()
        {
            received += 1;
        } else {
            panic!("server sent nothing");
        }
    }

    server.stop().unwrap();
    assert_eq!(server.state(), SessionState::Stopped);
    // Second stop is a no-op
    server.stop().unwrap();

    // Drain anything already in flight, then expect silence
    while sink
        .recv_timeout(&mut buf, Duration::from_millis(50))
        .unwrap()
        .is_some()
    {}
    assert!(sink
        .recv_timeout(&mut buf, Duration::from_millis(300))
        .unwrap()
        .is_none());
    assert!(!server.is_finished());
}

#[test]
fn test_start_twice_is_rejected() {
    let (mut client, _) = start_client(ClientConfig::new(loopback()));
    assert!(client.start().is_err());
    client.stop().unwrap();
    assert!(client.start().is_err());
}

fn time_to_finish(frames: usize, frame_rate: u32) -> Duration {
    let sink = DatagramSocket::bind(loopback()).unwrap();
    let catalog = Arc::new(
        QualityCatalog::new(vec![FrameCatalog::uniform(1000, frames).unwrap()]).unwrap(),
    );

    let started = Instant::now();
    let mut server = start_server(sink.local_addr().unwrap(), frame_rate, 1, catalog);
    let events = collect_until(&server.events(), Duration::from_secs(10), |e| {
        matches!(e, ServerEvent::Finished { .. })
    });
    let elapsed = started.elapsed();

    assert_eq!(
        events.last(),
        Some(&ServerEvent::Finished {
            frames: frames as u64
        })
    );
    server.stop().unwrap();
    elapsed
}

#[test]
fn test_pacing_holds_frame_rate() {
    // The last of N frames goes out (N - 1) / F seconds after the first
    let elapsed = time_to_finish(51, 25);
    assert!(
        elapsed >= Duration::from_millis(1900) && elapsed <= Duration::from_millis(2250),
        "51 frames at 25 fps took {:?}",
        elapsed
    );
}

#[test]
fn test_pacing_holds_high_frame_rate() {
    let elapsed = time_to_finish(251, 250);
    assert!(
        elapsed >= Duration::from_millis(950) && elapsed <= Duration::from_millis(1150),
        "251 frames at 250 fps took {:?}",
        elapsed
    );
}

#[test]
fn test_send_failures_do_not_stop_pacing() {
    // Bind and release a port so nothing is listening on it
    let closed = {
        let socket = DatagramSocket::bind(loopback()).unwrap();
        socket.local_addr().unwrap()
    };
    let catalog = Arc::new(
        QualityCatalog::new(vec![FrameCatalog::uniform(1400, 30).unwrap()]).unwrap(),
    );
    let mut server = start_server(closed, 100, 1, catalog);

    let events = collect_until(&server.events(), Duration::from_secs(5), |e| {
        matches!(e, ServerEvent::Finished { .. })
    });
    assert_eq!(events.last(), Some(&ServerEvent::Finished { frames: 30 }));

    let stats = server.stats();
    assert_eq!(stats.pacer.frames, 30);
    assert!(stats.send_errors > 0);
    assert!(stats.finished);
    assert_eq!(server.state(), SessionState::Running);

    server.stop().unwrap();
    assert_eq!(server.state(), SessionState::Stopped);
}
