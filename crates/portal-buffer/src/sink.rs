use async_trait::async_trait;
use std::future::Future;

/// Downstream consumer of flushed batches.
///
/// The run loop awaits [`BatchSink::flush`] before it receives the next item,
/// so invocations from one buffer never overlap. A sink that wants to keep
/// buffering going during a slow write may spawn its own task and return;
/// overlapping batches are then its own responsibility.
///
/// There is no error channel. A sink that can fail must log or otherwise
/// handle the failure itself.
#[async_trait]
pub trait BatchSink<T: Send + 'static>: Send + Sync + 'static {
    async fn flush(&self, batch: Vec<T>);
}

#[async_trait]
impl<T, F, Fut> BatchSink<T> for F
where
    T: Send + 'static,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn flush(&self, batch: Vec<T>) {
        (self)(batch).await
    }
}
