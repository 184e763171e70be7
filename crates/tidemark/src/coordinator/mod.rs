//! Lock-step fan-in over a set of producer lanes.
//!
//! A [`Coordinator`] owns one [`WatermarkBuffer`] and one [`ProducerTask`]
//! per registered generator. Its consumer loop runs on the caller's thread:
//! for every step it pops exactly one item from each lane in registration
//! order, checks each item's step tag, combines the slots into one record,
//! and hands the record to a sink.
//!
//! ## Lifecycle
//!
//! ```text
//! Configured --start()--> Running --run() ends / shutdown()--> Draining --> Terminated
//!     ^                                                                        |
//!     +------------------------------- reset() --------------------------------+
//! ```
//!
//! Leaving `Running` always goes through `Draining`: every buffer is finished,
//! every producer is joined, and queued items are released.
//!
//! [`WatermarkBuffer`]: crate::WatermarkBuffer

#[cfg(test)]
mod tests;

use crate::{
    buffer::{BufferStats, WatermarkBuffer, Watermarks},
    error::{BoxError, Error, Result},
    producer::{Generator, ProducerExit, ProducerTask, Stamped},
};
use core::fmt;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Lifecycle phase of a [`Coordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Producers may be registered; no threads exist.
    Configured,
    /// Producer threads are live and the consumer loop may run.
    Running,
    /// Buffers are finished and producers are being joined.
    Draining,
    /// All producers are joined and buffers released.
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Run configuration shared by every lane of a [`Coordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub watermarks: Watermarks,
    /// Last step executed; a run covers steps `0..=step_bound`.
    pub step_bound: u64,
}

impl CoordinatorConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidWatermarks`] unless `low < high`.
    pub fn new(low_watermark: usize, high_watermark: usize, step_bound: u64) -> Result<Self> {
        Ok(Self {
            watermarks: Watermarks::new(low_watermark, high_watermark)?,
            step_bound,
        })
    }
}

/// Cloneable handle that ends a run after the step in progress.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Outcome of a completed [`Coordinator::run`].
#[derive(Debug)]
pub struct RunSummary {
    /// Records delivered to the sink.
    pub steps: u64,
    /// `true` if a [`StopHandle`] ended the run before the step bound.
    pub stopped_early: bool,
    /// One report per producer, in registration order.
    pub producers: Vec<ProducerExit>,
}

/// Owns N producer lanes and drives them in lock-step.
///
/// ## Example
/// ```
/// use tidemark::{Coordinator, CoordinatorConfig, LabelEvery};
///
/// let mut coordinator = Coordinator::new(CoordinatorConfig::new(3, 10, 15).unwrap());
/// coordinator.add_producer(LabelEvery::new(3, "Fizz").unwrap()).unwrap();
/// coordinator.add_producer(LabelEvery::new(5, "Buzz").unwrap()).unwrap();
///
/// let mut lines = Vec::new();
/// coordinator
///     .run(
///         |step, slots: &[Option<String>]| {
///             let words: String = slots.iter().flatten().map(String::as_str).collect();
///             if words.is_empty() { step.to_string() } else { words }
///         },
///         |_, line| {
///             lines.push(line);
///             Ok::<_, std::convert::Infallible>(())
///         },
///     )
///     .unwrap();
///
/// assert_eq!(lines[3], "Fizz");
/// assert_eq!(lines[15], "FizzBuzz");
/// ```
pub struct Coordinator<T> {
    config: CoordinatorConfig,
    tasks: Vec<ProducerTask<T>>,
    phase: Phase,
    steps_completed: u64,
    stop: StopHandle,
}

impl<T> Coordinator<T> {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            phase: Phase::Configured,
            steps_completed: 0,
            stop: StopHandle::default(),
        }
    }

    /// Registers a generator on a fresh lane and returns its producer index.
    ///
    /// Lanes are combined in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the coordinator is
    /// [`Phase::Configured`].
    pub fn add_producer(&mut self, generator: impl Generator<T> + 'static) -> Result<usize> {
        self.expect_phase(Phase::Configured)?;
        let index = self.tasks.len();
        let buffer = Arc::new(WatermarkBuffer::new(self.config.watermarks));
        self.tasks.push(ProducerTask::new(
            index,
            buffer,
            Box::new(generator),
            self.config.step_bound,
        ));
        Ok(index)
    }

    /// Spawns every producer thread.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless [`Phase::Configured`].
    /// - [`Error::NoProducers`] if nothing was registered; no thread is
    ///   started.
    /// - [`Error::Spawn`] if a thread could not be created. Producers already
    ///   started are stopped and joined, and the coordinator terminates.
    pub fn start(&mut self) -> Result<()>
    where
        T: Send + 'static,
    {
        self.expect_phase(Phase::Configured)?;
        if self.tasks.is_empty() {
            return Err(Error::NoProducers);
        }

        for i in 0..self.tasks.len() {
            if let Err(e) = self.tasks[i].start() {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to start producer {i}: {e}");
                self.shutdown();
                return Err(e);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Started {} producers with watermarks {}",
            self.tasks.len(),
            self.config.watermarks
        );
        self.phase = Phase::Running;
        Ok(())
    }

    /// Runs the consumer loop for steps `0..=step_bound`, then tears down.
    ///
    /// For each step, pops one item from every lane in registration order.
    /// A lane whose producer has exited and drained yields `None` in its
    /// slot. The slots go to `combine(step, &slots)` and the result to
    /// `sink(step, record)`. No buffer lock is held while either runs.
    ///
    /// Starts the producers first if the coordinator is still
    /// [`Phase::Configured`]. Whatever ends the loop, the coordinator finishes
    /// every buffer, joins every producer and ends in [`Phase::Terminated`]
    /// before returning.
    ///
    /// # Errors
    ///
    /// - Any error from [`start`](Self::start).
    /// - [`Error::InvalidState`] if the coordinator already ran and was not
    ///   [`reset`](Self::reset).
    /// - [`Error::StepMismatch`] if a lane delivers an item for another step.
    /// - [`Error::Sink`] if the sink fails.
    /// - [`Error::LockPoisoned`] if a std lock was poisoned.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn run<R, E, C, S>(&mut self, mut combine: C, mut sink: S) -> Result<RunSummary>
    where
        T: Send + 'static,
        C: FnMut(u64, &[Option<T>]) -> R,
        S: FnMut(u64, R) -> Result<(), E>,
        E: Into<BoxError>,
    {
        match self.phase {
            Phase::Configured => self.start()?,
            Phase::Running => {}
            actual => {
                return Err(Error::InvalidState {
                    expected: Phase::Configured,
                    actual,
                });
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Running {} producers through step {}",
            self.tasks.len(),
            self.config.step_bound
        );

        let outcome = self.consume(&mut combine, &mut sink);
        let producers = self.shutdown();

        match outcome {
            Ok(stopped_early) => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    "Run finished after {} steps (stopped early: {stopped_early})",
                    self.steps_completed
                );
                Ok(RunSummary {
                    steps: self.steps_completed,
                    stopped_early,
                    producers,
                })
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Run aborted at step {}: {e}", self.steps_completed);
                Err(e)
            }
        }
    }

    fn consume<R, E, C, S>(&mut self, combine: &mut C, sink: &mut S) -> Result<bool>
    where
        C: FnMut(u64, &[Option<T>]) -> R,
        S: FnMut(u64, R) -> Result<(), E>,
        E: Into<BoxError>,
    {
        let mut slots = Vec::with_capacity(self.tasks.len());
        let mut exhausted = vec![false; self.tasks.len()];

        for step in self.steps_completed..=self.config.step_bound {
            if self.stop.is_stop_requested() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Stop requested before step {step}");
                return Ok(true);
            }

            slots.clear();
            for (task, exhausted) in self.tasks.iter().zip(exhausted.iter_mut()) {
                let slot = take_slot(task.index(), step, task.buffer().pop()?)?;
                if slot.is_none() && !*exhausted {
                    *exhausted = true;
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Producer {} exhausted at step {step}", task.index());
                }
                slots.push(slot);
            }

            let record = combine(step, &slots);
            sink(step, record).map_err(|e| Error::Sink {
                step,
                source: e.into(),
            })?;
            self.steps_completed += 1;
        }

        Ok(false)
    }

    /// Finishes every buffer, joins every producer and releases queued items.
    ///
    /// Safe to call in any phase; a terminated coordinator returns an empty
    /// list. Producers that were never started report nothing.
    pub fn shutdown(&mut self) -> Vec<ProducerExit> {
        if self.phase == Phase::Terminated {
            return Vec::new();
        }

        self.phase = Phase::Draining;
        #[cfg(feature = "tracing")]
        tracing::debug!("Draining {} producers", self.tasks.len());

        for task in &self.tasks {
            task.request_stop();
        }
        let exits = self
            .tasks
            .iter_mut()
            .filter_map(ProducerTask::join)
            .collect();

        for task in &self.tasks {
            #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
            let discarded = task.buffer().clear();
            #[cfg(feature = "tracing")]
            if discarded > 0 {
                tracing::debug!(
                    "Released {discarded} queued items from producer {}",
                    task.index()
                );
            }
        }

        self.phase = Phase::Terminated;
        exits
    }

    /// Returns a terminated coordinator to [`Phase::Configured`] with no
    /// lanes, ready for a new set of producers.
    ///
    /// A fresh [`StopHandle`] is issued; handles from the previous run no
    /// longer affect this coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] while producers are running.
    pub fn reset(&mut self) -> Result<()> {
        match self.phase {
            Phase::Configured | Phase::Terminated => {}
            actual => {
                return Err(Error::InvalidState {
                    expected: Phase::Terminated,
                    actual,
                });
            }
        }

        self.tasks.clear();
        self.steps_completed = 0;
        self.stop = StopHandle::default();
        self.phase = Phase::Configured;
        #[cfg(feature = "tracing")]
        tracing::debug!("Coordinator reset");
        Ok(())
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Records delivered to the sink in the current or last run.
    pub const fn steps_completed(&self) -> u64 {
        self.steps_completed
    }

    pub fn producer_count(&self) -> usize {
        self.tasks.len()
    }

    /// Buffer counters per lane, in registration order.
    pub fn lane_stats(&self) -> Vec<BufferStats> {
        self.tasks.iter().map(|task| task.buffer().stats()).collect()
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected,
                actual: self.phase,
            })
        }
    }
}

impl<T> Drop for Coordinator<T> {
    fn drop(&mut self) {
        if matches!(self.phase, Phase::Running | Phase::Draining) {
            self.shutdown();
        }
    }
}

/// Unwraps a popped item, verifying it belongs to `step`.
fn take_slot<T>(producer: usize, step: u64, popped: Option<Stamped<T>>) -> Result<Option<T>> {
    match popped {
        Some(Stamped { step: found, item }) if found == step => Ok(Some(item)),
        Some(Stamped { step: found, .. }) => Err(Error::StepMismatch {
            producer,
            expected: step,
            found,
        }),
        None => Ok(None),
    }
}
