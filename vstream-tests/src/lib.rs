//! Shared helpers for the video stream integration tests

use crossbeam::channel::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vstream_protocol::{FrameCatalog, QualityCatalog};

/// Quality catalog with one list of frame sizes per level
pub fn catalog(levels: &[&[u32]]) -> Arc<QualityCatalog> {
    let levels = levels
        .iter()
        .map(|sizes| FrameCatalog::new(sizes.to_vec()).expect("non-empty level"))
        .collect();
    Arc::new(QualityCatalog::new(levels).expect("valid catalog"))
}

/// `max_level` levels of `count` frames; level `n` frames are `n * base` bytes
pub fn tiered_catalog(max_level: u16, count: usize, base: u32) -> Arc<QualityCatalog> {
    let levels = (1..=max_level as u32)
        .map(|level| FrameCatalog::uniform(level * base, count).expect("non-empty level"))
        .collect();
    Arc::new(QualityCatalog::new(levels).expect("valid catalog"))
}

/// Collect events until `done` returns true or `timeout` passes
pub fn collect_until<E, F>(events: &Receiver<E>, timeout: Duration, mut done: F) -> Vec<E>
where
    E: Clone,
    F: FnMut(&E) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();

    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(left) {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    seen
}

/// Poll `check` until it holds or `timeout` passes
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
