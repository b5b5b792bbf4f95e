//! Core traits for the registry tooling
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`CacheStore`]: Keyed checkpoint storage for resumable runs
//! - [`UrlTester`]: A single HTTP(S) reachability test

pub mod cache_store;
pub mod url_tester;

pub use cache_store::{CacheStore, validate_cache_name};
pub use url_tester::{ProbeFailure, UrlTester};
