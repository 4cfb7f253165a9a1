//! Tabula Core Business Logic
//!
//! This crate provides the record-set data model, response sanitization and
//! the cache-aside `CachedFetcher` shared by every consumer.

pub mod cache;
pub mod error;
pub mod model;
pub mod sanitize;

pub use cache::{CachedFetcher, FetcherConfig, spawn_purge_task};
pub use error::CoreError;
pub use model::{CachedRecordSet, Column, Row, Rows};
pub use sanitize::sanitize_record_set;
