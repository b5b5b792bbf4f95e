// # cnames-core
//
// Core library for maintaining a community-edited CNAME registry file.
//
// ## Architecture Overview
//
// - **registry**: Entry/Registry data model, the defensive parser and
//   normalizer, and the canonical generator
// - **validate**: Diff validator comparing a file with its canonical form
// - **CacheStore**: Trait for the keyed checkpoint store used by long runs
// - **UrlTester**: Trait for a single HTTP(S) reachability test
// - **ProbeEngine**: Sequential, resumable probe run over a registry
// - **ci**: Structured annotations for CI environments
//
// ## Data Flow
//
// ```text
// file text ──parse──▶ Registry ──generate──▶ canonical text ──diff──▶ report
//                          │
//                          └──probe──▶ { failed, passed }
// ```
//
// Parsing and generation are pure and synchronous. Probing and cache I/O are
// async and owned by the engine.

pub mod cache;
pub mod ci;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use cache::{
    CacheKey, FileCacheStore, MemoryCacheStore, PROBE_RESULTS, REGISTRY_FILE, open_cache_store,
};
pub use ci::CiContext;
pub use config::{CacheConfig, ProbeConfig, RegistryConfig, RobotConfig};
pub use engine::{ProbeEngine, ProbeEvent, ProbeOutcome, probe_urls};
pub use error::{Error, Result};
pub use registry::{
    Entry, ParseWarning, ParsedRegistry, Registry, RegistryParser, generate, parse, regenerate,
};
pub use traits::{CacheStore, ProbeFailure, UrlTester};
pub use validate::{
    Diagnostic, ValidationReport, validate_content, validate_file, validate_file_with, validate_with,
};
