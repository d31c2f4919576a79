//! Redirector service library.
//!
//! [`RedirectorService`] resolves short codes to their original URLs with a
//! single read against a [`ReadRepository`](portal_core::ReadRepository).
//! Soft-deleted codes resolve to [`RedirectorError::Deleted`] so transports
//! can tell them apart from codes that never existed.

pub mod error;
pub mod redirector;
pub mod service;

pub use error::{RedirectorError, Result};
pub use redirector::Redirector;
pub use service::RedirectorService;
