//! Protocol scenarios driven without sockets
//!
//! Pacer output is fed straight into a client receiver, and the receiver's
//! feedback straight back into the server's feedback handler.

use vstream_protocol::{
    ClientReceiver, FeedbackHandler, FeedbackOutcome, LevelChange, Pacer, PacerConfig,
    PacerState, PlaybackEvent,
};
use vstream_tests::{catalog, tiered_catalog};

fn pacer(levels: &[&[u32]], default_level: u16) -> Pacer {
    Pacer::new(
        catalog(levels),
        PacerConfig {
            frame_rate: 25,
            max_packet_size: 1400,
            default_level,
        },
    )
    .unwrap()
}

#[test]
fn test_single_frame_exact_multiple() {
    let mut pacer = pacer(&[&[4200]], 1);
    pacer.start().unwrap();

    let tick = pacer.tick();
    let sizes: Vec<usize> = tick.burst.unwrap().fragments.map(|b| b.len()).collect();
    assert_eq!(sizes, vec![1400, 1400, 1400]);
    assert!(!tick.reschedule);
    assert_eq!(pacer.state(), PacerState::Stopped);

    // Nothing more once the catalog is exhausted
    assert!(pacer.tick().burst.is_none());
    assert_eq!(pacer.stats().datagrams, 3);
}

#[test]
fn test_thirty_arrivals_then_one_tick() {
    let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
    for _ in 0..30 {
        assert!(rx.on_datagram(1400).is_empty());
    }

    let event = rx.on_playback_tick();
    assert_eq!(event, PlaybackEvent::Played { remaining: 5 });

    let buffer = rx.buffer();
    assert_eq!(buffer.buffered_units, 5);
    assert_eq!(buffer.stop_counter, 0);
    assert_eq!(buffer.rebuffer_counter, 0);
}

#[test]
fn test_no_arrivals_ends_stream() {
    let mut rx = ClientReceiver::new(25, 3, 1).unwrap();

    assert_eq!(
        rx.on_playback_tick(),
        PlaybackEvent::Starved { stop_counter: 1 }
    );
    assert_eq!(
        rx.on_playback_tick(),
        PlaybackEvent::Starved { stop_counter: 2 }
    );
    let last = rx.on_playback_tick();
    assert_eq!(last, PlaybackEvent::Ended);
    assert!(!last.reschedule());
    assert_eq!(rx.buffer().stop_counter, 3);

    // Terminal: further ticks change nothing
    let before = rx.buffer();
    assert_eq!(rx.on_playback_tick(), PlaybackEvent::Ended);
    assert_eq!(rx.buffer(), before);
}

#[test]
fn test_rebuffering_downgrades_one_level_per_arrival() {
    let mut rx = ClientReceiver::new(25, 3, 3).unwrap();
    rx.on_datagram(1400);
    for expected in 1..=3 {
        assert_eq!(
            rx.on_playback_tick(),
            PlaybackEvent::Rebuffering {
                rebuffer_counter: expected
            }
        );
    }

    let decision = rx.on_datagram(1400);
    let changes: Vec<_> = decision.changes().collect();
    assert_eq!(changes, vec![LevelChange::Down(2)]);
    assert_eq!(changes[0].feedback().to_bytes().as_ref(), &[0, 2]);
    assert_eq!(rx.video_level(), 2);

    // The next qualifying arrival steps down once more, then the floor holds
    assert_eq!(rx.on_datagram(1400).downgrade, Some(1));
    assert!(rx.on_datagram(1400).is_empty());
    assert_eq!(rx.video_level(), 1);
}

#[test]
fn test_buffer_growth_walks_server_up_to_max_level() {
    let mut pacer = Pacer::new(tiered_catalog(3, 200, 1400), PacerConfig::default()).unwrap();
    let mut feedback = FeedbackHandler::new();
    let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
    let mut switches = Vec::new();

    pacer.start().unwrap();
    loop {
        let tick = pacer.tick();
        if let Some(burst) = tick.burst {
            for payload in burst.fragments {
                for change in rx.on_datagram(payload.len()).changes() {
                    let bytes = change.feedback().to_bytes();
                    if let FeedbackOutcome::Switched { from, to } =
                        feedback.on_datagram(&mut pacer, &bytes)
                    {
                        switches.push((from, to));
                    }
                }
            }
        }
        if !tick.reschedule {
            break;
        }
    }

    assert_eq!(switches, vec![(1, 2), (2, 3)]);
    assert_eq!(pacer.active_level(), 3);
    assert_eq!(rx.video_level(), 3);
    assert_eq!(feedback.stats().switched, 2);
    assert_eq!(pacer.stats().frames, 200);
}

#[test]
fn test_level_switch_keeps_shared_cursor() {
    let mut pacer = pacer(&[&[100, 100, 100], &[200, 200, 200]], 1);
    let mut feedback = FeedbackHandler::new();
    pacer.start().unwrap();

    let first = pacer.tick().burst.unwrap();
    assert_eq!((first.frame.index, first.level), (0, 1));

    assert_eq!(
        feedback.on_datagram(&mut pacer, &[0, 2]),
        FeedbackOutcome::Switched { from: 1, to: 2 }
    );

    let second = pacer.tick().burst.unwrap();
    assert_eq!(second.frame.index, 1);
    assert_eq!(second.frame.size_bytes, 200);
    assert_eq!(second.level, 2);
}

#[test]
fn test_invalid_feedback_leaves_pacer_untouched() {
    let mut pacer = pacer(&[&[100], &[200]], 1);
    let mut feedback = FeedbackHandler::new();
    pacer.start().unwrap();

    assert!(matches!(
        feedback.on_datagram(&mut pacer, &[0, 9]),
        FeedbackOutcome::OutOfRange(_)
    ));
    assert!(matches!(
        feedback.on_datagram(&mut pacer, &[0, 0]),
        FeedbackOutcome::OutOfRange(_)
    ));
    assert!(matches!(
        feedback.on_datagram(&mut pacer, b"2"),
        FeedbackOutcome::Malformed(_)
    ));
    assert_eq!(
        feedback.on_datagram(&mut pacer, &[0, 1]),
        FeedbackOutcome::Unchanged(1)
    );

    assert_eq!(pacer.active_level(), 1);
    assert_eq!(feedback.stats().ignored, 3);
    assert_eq!(feedback.stats().unchanged, 1);
}
