//! Tabula Transient Storage
//!
//! This crate provides the expiring key/value stores that back the record
//! cache: a process-local memory store and a SQLite store that can be shared
//! between the server and CLI invocations.

pub mod backend;
pub mod error;
pub mod memory;
pub mod sqlite;

pub use backend::TransientStore;
pub use error::StorageError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
