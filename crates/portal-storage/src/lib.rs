//! Storage backends for the Portal URL shortener.
//!
//! Every backend implements the [`Repository`] contract from `portal_core`:
//!
//! - [`InMemoryRepository`]: a locked map, lost on restart.
//! - [`FileRepository`]: the in-memory map plus periodic snapshots to a
//!   JSON-lines file.
//! - [`MySqlRepository`]: a transactional MySQL table.

pub mod error;
pub mod file;
pub mod memory;
pub mod mysql;

pub use error::{Result, StorageError};
pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use portal_core::{DeleteRequest, ReadRepository, Repository, UrlRecord};
