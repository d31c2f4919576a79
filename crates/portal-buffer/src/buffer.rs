use crate::error::{BufferError, Result};
use crate::sink::BatchSink;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Configures a [`FlushBuffer`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct BufferSettings {
    /// Maximum time items wait before a time-based flush.
    pub flush_interval: Duration,
    /// A batch is flushed as soon as it holds at least this many items.
    pub flush_threshold: usize,
    /// Capacity pre-allocated for each batch.
    #[builder(default = 0)]
    pub capacity_hint: usize,
    /// Slots in the handoff channel between producers and the run loop.
    #[builder(default = 1)]
    pub intake_capacity: usize,
}

/// Producer side of a [`FlushBuffer`].
#[derive(Debug)]
pub struct BufferHandle<T> {
    sender: mpsc::Sender<T>,
}

impl<T> Clone for BufferHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: Send + 'static> BufferHandle<T> {
    /// Hands one item to the run loop.
    ///
    /// Waits only for a free slot in the handoff channel, never for a flush to
    /// complete, although a run loop that is busy inside a slow sink leaves no
    /// slot free until it returns. Fails with [`BufferError::Closed`] once the
    /// run loop has begun shutting down.
    pub async fn push(&self, item: T) -> Result<()> {
        self.sender
            .send(item)
            .await
            .map_err(|_| BufferError::Closed)
    }

    /// Returns `true` once the run loop no longer accepts items.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Size,
    Interval,
    Shutdown,
}

impl Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushTrigger::Size => f.write_str("size"),
            FlushTrigger::Interval => f.write_str("interval"),
            FlushTrigger::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// The run loop side of a staging buffer.
///
/// The pending batch is owned by the run loop alone; the channel behind
/// [`BufferHandle`] is the only synchronization point with producers.
pub struct FlushBuffer<T, S> {
    settings: BufferSettings,
    receiver: mpsc::Receiver<T>,
    sink: S,
    items: Vec<T>,
}

impl<T, S> FlushBuffer<T, S>
where
    T: Send + 'static,
    S: BatchSink<T>,
{
    /// Creates a buffer and the handle producers push through.
    ///
    /// Nothing is flushed until [`FlushBuffer::run`] is driven.
    pub fn new(settings: BufferSettings, sink: S) -> (Self, BufferHandle<T>) {
        let (sender, receiver) = mpsc::channel(settings.intake_capacity.max(1));
        let items = Vec::with_capacity(settings.capacity_hint);

        let buffer = Self {
            settings,
            receiver,
            sink,
            items,
        };

        (buffer, BufferHandle { sender })
    }

    /// Spawns [`FlushBuffer::run`] on the current runtime.
    ///
    /// The returned handle completes after the final flush.
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown))
    }

    /// Drives the buffer until `shutdown` resolves or every handle is dropped.
    ///
    /// On the way out the intake is closed, items already accepted by the
    /// channel are drained, and whatever is pending is flushed once.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        // tokio intervals reject a zero period.
        let period = self.settings.flush_interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    debug!("flush buffer received shutdown signal");
                    break;
                }
                received = self.receiver.recv() => {
                    let Some(item) = received else {
                        debug!("all buffer handles dropped");
                        break;
                    };
                    self.items.push(item);
                    trace!(pending = self.items.len(), "buffered item");

                    if self.items.len() >= self.settings.flush_threshold {
                        self.flush(FlushTrigger::Size).await;
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {
                    if !self.items.is_empty() {
                        self.flush(FlushTrigger::Interval).await;
                    }
                }
            }
        }

        self.receiver.close();
        while let Ok(item) = self.receiver.try_recv() {
            self.items.push(item);
        }

        if !self.items.is_empty() {
            self.flush(FlushTrigger::Shutdown).await;
        }
        debug!("flush buffer stopped");
    }

    async fn flush(&mut self, trigger: FlushTrigger) {
        let batch = std::mem::replace(
            &mut self.items,
            Vec::with_capacity(self.settings.capacity_hint),
        );
        debug!(trigger = %trigger, count = batch.len(), "flushing buffered items");
        self.sink.flush(batch).await;
    }
}
