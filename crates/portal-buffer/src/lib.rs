//! Time and size triggered staging buffer.
//!
//! A [`FlushBuffer`] accumulates items pushed through a [`BufferHandle`] and
//! hands them to a [`BatchSink`] when the batch reaches a size threshold,
//! when the flush interval elapses, or when the buffer shuts down.
//!
//! The buffer is not durable: items still held by the run loop when the
//! process dies are lost. Sink failures are the sink's concern; producers
//! only ever observe [`BufferError::Closed`].

pub mod buffer;
pub mod error;
pub mod sink;

pub use buffer::{BufferHandle, BufferSettings, FlushBuffer};
pub use error::{BufferError, Result};
pub use sink::BatchSink;
