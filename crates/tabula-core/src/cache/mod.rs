//! Cache-aside fetching

mod fetcher;

pub use fetcher::{CachedFetcher, FetcherConfig, spawn_purge_task};
