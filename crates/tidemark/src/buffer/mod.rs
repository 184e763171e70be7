//! Bounded FIFO with dual watermarks.
//!
//! A [`WatermarkBuffer`] sits between exactly one producer thread and one
//! consumer thread. A single mutex guards both the queue and the `finished`
//! flag. Two condition variables keep the opposite-direction waiters apart:
//!
//! - `not_full`: the producer waits here while `len >= high`.
//! - `not_empty`: the consumer waits here while `len <= low`.
//!
//! Notifications are issued after the lock is released. A push that leaves
//! more than `low` items wakes the consumer; a pop that leaves fewer than
//! `high` items wakes the producer. Both fire on every qualifying operation,
//! so a crossing is never under-signalled.

mod watermark;


pub use watermark::*;

use crate::{
    error::Result,
    mutex::{self, Condvar, Mutex},
};
use std::collections::VecDeque;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of [`WatermarkBuffer::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The item was appended to the tail.
    Enqueued,
    /// The buffer was finished; the item was dropped and the producer should
    /// stop.
    Finished,
}

/// Counters describing a buffer's lifetime behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Items appended.
    pub pushed: u64,
    /// Items removed.
    pub popped: u64,
    /// Largest size observed right after a push.
    pub peak_len: usize,
    /// Smallest size left behind by a pop while the buffer was unfinished.
    pub trough_len: Option<usize>,
    /// Times the producer suspended on `not_full`.
    pub producer_waits: u64,
    /// Times the consumer suspended on `not_empty`.
    pub consumer_waits: u64,
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    finished: bool,
    stats: BufferStats,
}

/// A single-producer, single-consumer bounded queue throttled by
/// [`Watermarks`].
///
/// ## Blocking rules
/// - [`push`] suspends while `len >= high` and the buffer is not finished.
/// - [`pop`] suspends while `len <= low` and the buffer is not finished.
/// - [`mark_finished`] wakes every waiter on both conditions. After it,
///   `push` drops its item and `pop` drains what is left, then returns
///   `None`.
///
/// With a single producer the size never exceeds `high`, and a pop on an
/// unfinished buffer never leaves fewer than `low` items.
///
/// ## Example
/// ```
/// use tidemark::{PushOutcome, WatermarkBuffer, Watermarks};
///
/// let buffer = WatermarkBuffer::new(Watermarks::new(0, 4).unwrap());
/// assert_eq!(buffer.push("a").unwrap(), PushOutcome::Enqueued);
/// assert_eq!(buffer.pop().unwrap(), Some("a"));
///
/// buffer.mark_finished();
/// assert_eq!(buffer.push("b").unwrap(), PushOutcome::Finished);
/// assert_eq!(buffer.pop().unwrap(), None);
/// ```
///
/// [`push`]: Self::push
/// [`pop`]: Self::pop
/// [`mark_finished`]: Self::mark_finished
#[derive(Debug)]
pub struct WatermarkBuffer<T> {
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<State<T>>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    watermarks: Watermarks,
}

impl<T> WatermarkBuffer<T> {
    /// Creates an empty, unfinished buffer.
    ///
    /// Storage for `high + 1` items is reserved up front; the queue never
    /// grows past that with a single producer.
    pub fn new(watermarks: Watermarks) -> Self {
        let state = State {
            items: VecDeque::with_capacity(watermarks.high() + 1),
            finished: false,
            stats: BufferStats::default(),
        };
        Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(Mutex::new(state)),
            #[cfg(not(feature = "cache-padded"))]
            state: Mutex::new(state),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            watermarks,
        }
    }

    /// Appends `item`, waiting while the buffer is at or above its high
    /// watermark.
    ///
    /// Returns [`PushOutcome::Finished`] without enqueueing if the buffer was
    /// finished before or while waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a std lock was poisoned.
    ///
    /// [`Error::LockPoisoned`]: crate::Error
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn push(&self, item: T) -> Result<PushOutcome> {
        let should_signal = {
            let mut state = mutex::lock(&self.state)?;
            while state.items.len() >= self.watermarks.high() && !state.finished {
                state.stats.producer_waits += 1;
                #[cfg(feature = "tracing")]
                tracing::trace!(len = state.items.len(), "producer waiting on high watermark");
                state = mutex::wait(&self.not_full, state)?;
            }
            if state.finished {
                return Ok(PushOutcome::Finished);
            }

            state.items.push_back(item);
            let len = state.items.len();
            state.stats.pushed += 1;
            state.stats.peak_len = state.stats.peak_len.max(len);
            len > self.watermarks.low()
        };

        if should_signal {
            self.not_empty.notify_one();
        }
        Ok(PushOutcome::Enqueued)
    }

    /// Removes the head item, waiting while the buffer is at or below its low
    /// watermark.
    ///
    /// Returns `None` only once the buffer is finished and fully drained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a std lock was poisoned.
    ///
    /// [`Error::LockPoisoned`]: crate::Error
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn pop(&self) -> Result<Option<T>> {
        let (item, should_signal) = {
            let mut state = mutex::lock(&self.state)?;
            while state.items.len() <= self.watermarks.low() && !state.finished {
                state.stats.consumer_waits += 1;
                #[cfg(feature = "tracing")]
                tracing::trace!(len = state.items.len(), "consumer waiting on low watermark");
                state = mutex::wait(&self.not_empty, state)?;
            }

            let Some(item) = state.items.pop_front() else {
                return Ok(None);
            };
            let len = state.items.len();
            state.stats.popped += 1;
            if !state.finished {
                state.stats.trough_len = Some(state.stats.trough_len.map_or(len, |t| t.min(len)));
            }
            (item, len < self.watermarks.high())
        };

        if should_signal {
            self.not_full.notify_one();
        }
        Ok(Some(item))
    }

    /// Finishes the buffer and wakes every waiter on both conditions.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// transition. A poisoned std lock is recovered rather than reported.
    pub fn mark_finished(&self) -> bool {
        let transitioned = {
            let mut state = mutex::lock_unpoisoned(&self.state);
            !core::mem::replace(&mut state.finished, true)
        };
        self.not_full.notify_all();
        self.not_empty.notify_all();
        transitioned
    }

    /// Drops every queued item, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut state = mutex::lock_unpoisoned(&self.state);
        let discarded = state.items.len();
        state.items.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        mutex::lock_unpoisoned(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finished(&self) -> bool {
        mutex::lock_unpoisoned(&self.state).finished
    }

    pub const fn watermarks(&self) -> Watermarks {
        self.watermarks
    }

    /// Returns a snapshot of the buffer's counters.
    pub fn stats(&self) -> BufferStats {
        mutex::lock_unpoisoned(&self.state).stats
    }
}
