//! URL shortener service implementation.
//!
//! [`ShortenerService`] validates URLs, draws codes from a
//! [`Generator`](portal_generator::Generator) and writes them through a
//! [`Repository`](portal_core::Repository). Deletions are not written
//! inline: they are pushed into a [`FlushBuffer`](portal_buffer::FlushBuffer)
//! whose [`DeleteSink`] applies them in batches.

pub mod delete;
pub mod service;
pub mod validate;

pub use delete::DeleteSink;
pub use portal_core::ShortenerError;
pub use service::{ShortenerService, ShortenerSettings};
