//! Tabula Remote Source
//!
//! This crate provides the client that fetches the raw record-set document
//! from the remote JSON endpoint.

pub mod error;
pub mod http;

pub use error::SourceError;
pub use http::{HttpSource, HttpSourceConfig, RecordSource};
