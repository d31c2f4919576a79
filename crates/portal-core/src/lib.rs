//! Core types and traits for the Portal URL shortener.
//!
//! This crate provides the domain types, the storage contract and the
//! error taxonomy shared by the shortener, the redirector and the
//! storage backends.

pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;
pub mod user;

pub use error::{CoreError, ShortenerError, StorageError};
pub use repository::{DeleteRequest, ReadRepository, Repository, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{BatchItem, BatchResult, Shortener, UserUrl};
pub use user::{User, UserId};
