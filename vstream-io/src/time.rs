//! Timer scheduling for single-threaded event loops
//!
//! A [`Scheduler`] holds pending one-shot timers, each carrying an event
//! value. The owning loop asks how long it may block, then pops due events
//! and handles them in deadline order. Cancelled timers never fire.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

/// Whole periods a periodic timer may fall behind before it skips ahead
pub const MAX_CATCH_UP_PERIODS: u32 = 4;

/// Deadline of the next firing of a periodic timer
///
/// Deadlines advance from the previous deadline rather than from when the
/// timer actually ran, so wake-up latency does not accumulate. A loop more
/// than [`MAX_CATCH_UP_PERIODS`] behind restarts from `now` instead of
/// firing a long burst.
pub fn next_periodic_deadline(previous: Instant, period: Duration, now: Instant) -> Instant {
    let next = previous + period;
    if next + period * MAX_CATCH_UP_PERIODS <= now {
        now
    } else {
        next
    }
}

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<E> {
    deadline: Instant,
    id: TimerId,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    // Ties on deadline fire in scheduling order
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.id).cmp(&(other.deadline, other.id))
    }
}

/// One-shot timer queue
#[derive(Debug)]
pub struct Scheduler<E> {
    queue: BinaryHeap<Reverse<Entry<E>>>,
    pending: HashSet<TimerId>,
    next_id: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            pending: HashSet::new(),
            next_id: 0,
        }
    }
}

impl<E> Scheduler<E> {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `event` once `delay` has passed after `now`
    pub fn schedule_after(&mut self, now: Instant, delay: Duration, event: E) -> TimerId {
        self.schedule_at(now + delay, event)
    }

    /// Fire `event` at `deadline`
    pub fn schedule_at(&mut self, deadline: Instant, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id);
        self.queue.push(Reverse(Entry {
            deadline,
            id,
            event,
        }));
        id
    }

    /// Cancel a pending timer
    ///
    /// Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id)
    }

    /// Cancel every pending timer
    pub fn cancel_all(&mut self) {
        self.pending.clear();
        self.queue.clear();
    }

    /// Whether `id` is still waiting to fire
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains(&id)
    }

    /// Number of timers waiting to fire
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timer is waiting to fire
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline among pending timers
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_cancelled();
        self.queue.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// How long the loop may wait before the next timer is due
    ///
    /// `None` means no timer is pending.
    pub fn time_until_next(&mut self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Remove and return the earliest timer due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerId, E)> {
        self.discard_cancelled();
        match self.queue.peek() {
            Some(Reverse(entry)) if entry.deadline <= now => {}
            _ => return None,
        }

        let Reverse(entry) = self.queue.pop()?;
        self.pending.remove(&entry.id);
        Some((entry.id, entry.event))
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.queue.peek() {
            if self.pending.contains(&entry.id) {
                break;
            }
            self.queue.pop();
        }
    }
}
