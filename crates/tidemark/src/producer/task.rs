use crate::{
    buffer::{PushOutcome, WatermarkBuffer},
    error::{Error, GeneratorError, Result},
    producer::{Generator, Stamped},
};
use portable_atomic::{AtomicU64, Ordering};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

/// Buffer type shared between a producer task and the consumer.
pub type Lane<T> = WatermarkBuffer<Stamped<T>>;

/// Why a producer thread stopped.
#[derive(Debug)]
#[non_exhaustive]
pub enum ExitReason {
    /// Every step up to and including the bound was pushed.
    Completed,
    /// The buffer was finished while the producer was still pushing.
    Stopped,
    /// The generator failed at `step`; nothing was pushed for it.
    GeneratorFailed { step: u64, error: GeneratorError },
    /// The buffer reported an error. Only a poisoned std lock gets here;
    /// `parking-lot` locks never fail.
    Failed(Error),
    /// The producer thread panicked.
    Panicked,
}

/// Final report of a producer thread, returned by [`ProducerTask::join`].
#[derive(Debug)]
pub struct ProducerExit {
    pub producer: usize,
    pub steps_pushed: u64,
    pub reason: ExitReason,
}

impl ProducerExit {
    pub const fn is_completed(&self) -> bool {
        matches!(self.reason, ExitReason::Completed)
    }
}

/// A producer thread bound to one buffer and one generator.
///
/// The task's lifecycle is explicit and independent of construction and drop:
///
/// - [`start`] spawns the thread, which pushes one [`Stamped`] item per step
///   for steps `0..=step_bound`.
/// - [`request_stop`] finishes the buffer, releasing a blocked push.
/// - [`join`] waits for the thread and reports how it ended.
///
/// Whatever ends the loop (bound reached, stop observed, generator failure,
/// or a panic), the thread finishes its buffer as its final access, so the
/// consumer drains the remaining items and then receives `None` rather than
/// waiting forever.
///
/// [`start`]: Self::start
/// [`request_stop`]: Self::request_stop
/// [`join`]: Self::join
pub struct ProducerTask<T> {
    index: usize,
    buffer: Arc<Lane<T>>,
    generator: Option<Box<dyn Generator<T>>>,
    step_bound: u64,
    progress: Arc<AtomicU64>,
    handle: Option<JoinHandle<ProducerExit>>,
}

impl<T> ProducerTask<T> {
    pub fn new(
        index: usize,
        buffer: Arc<Lane<T>>,
        generator: Box<dyn Generator<T>>,
        step_bound: u64,
    ) -> Self {
        Self {
            index,
            buffer,
            generator: Some(generator),
            step_bound,
            progress: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// Spawns the producer thread.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if the task was already started.
    /// - [`Error::Spawn`] if the OS refuses to create the thread.
    pub fn start(&mut self) -> Result<()>
    where
        T: Send + 'static,
    {
        let Some(mut generator) = self.generator.take() else {
            return Err(Error::AlreadyStarted {
                producer: self.index,
            });
        };

        let index = self.index;
        let buffer = Arc::clone(&self.buffer);
        let progress = Arc::clone(&self.progress);
        let step_bound = self.step_bound;

        let handle = thread::Builder::new()
            .name(format!("tidemark-producer-{index}"))
            .spawn(move || run(index, &buffer, &mut *generator, step_bound, &progress))
            .map_err(|source| Error::Spawn {
                producer: index,
                source,
            })?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Producer {index} started");

        self.handle = Some(handle);
        Ok(())
    }

    /// Finishes the buffer so a blocked or future push returns immediately.
    pub fn request_stop(&self) {
        self.buffer.mark_finished();
    }

    /// Waits for the producer thread to exit.
    ///
    /// Returns `None` if the task was never started or was already joined.
    pub fn join(&mut self) -> Option<ProducerExit> {
        let handle = self.handle.take()?;
        let exit = handle.join().unwrap_or_else(|_| {
            #[cfg(feature = "tracing")]
            tracing::error!("Producer {} panicked", self.index);
            ProducerExit {
                producer: self.index,
                steps_pushed: self.steps_pushed(),
                reason: ExitReason::Panicked,
            }
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Producer {} joined after {} steps: {:?}",
            exit.producer,
            exit.steps_pushed,
            exit.reason
        );

        Some(exit)
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns `true` while the thread is spawned and not yet joined.
    pub const fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of items this producer has enqueued so far.
    pub fn steps_pushed(&self) -> u64 {
        self.progress.load(Ordering::Acquire)
    }

    pub fn buffer(&self) -> &Arc<Lane<T>> {
        &self.buffer
    }
}

/// Finishes the buffer when the producer loop exits, including by unwinding.
struct FinishOnExit<'a, T>(&'a Lane<T>);

impl<T> Drop for FinishOnExit<'_, T> {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

fn run<T>(
    index: usize,
    buffer: &Lane<T>,
    generator: &mut dyn Generator<T>,
    step_bound: u64,
    progress: &AtomicU64,
) -> ProducerExit {
    let _finish = FinishOnExit(buffer);
    let exit = |steps_pushed, reason| ProducerExit {
        producer: index,
        steps_pushed,
        reason,
    };

    for step in 0..=step_bound {
        let item = match generator.generate(index, step) {
            Ok(item) => item,
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Producer {index} generator failed at step {step}: {error}");
                return exit(step, ExitReason::GeneratorFailed { step, error });
            }
        };

        match buffer.push(Stamped { step, item }) {
            Ok(PushOutcome::Enqueued) => progress.store(step + 1, Ordering::Release),
            Ok(PushOutcome::Finished) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Producer {index} observed finished buffer at step {step}");
                return exit(step, ExitReason::Stopped);
            }
            Err(e) => return exit(step, ExitReason::Failed(e)),
        }
    }

    exit(step_bound.saturating_add(1), ExitReason::Completed)
}
