//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record how the engine
//! uses its collaborators without touching the network or the filesystem.

#![allow(dead_code)]

use cnames_core::error::Result;
use cnames_core::traits::{CacheStore, ProbeFailure, UrlTester};
use cnames_core::{Entry, Registry, RobotConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Canonical registry file used across contract tests
pub const CANONICAL_FILE: &str = "/**\n * Registry header\n */\n\nvar cnames_active = {\n  \"\": \"js-org.github.io\",\n  \"a.b\": \"baz.com\", // noCF\n  \"foo\": \"bar.github.io\",\n  \"site\": \"cname.vercel-dns.com\" // noCF\n  /*\n   * Registry footer\n   */\n}\n";

/// A mock UrlTester with scripted failures that tracks calls
pub struct MockUrlTester {
    /// Call counter for test()
    call_count: Arc<AtomicUsize>,
    /// URLs tested, in order
    tested: Arc<std::sync::Mutex<Vec<String>>>,
    /// Scripted failure per URL; anything else passes
    failures: Arc<HashMap<String, ProbeFailure>>,
}

impl MockUrlTester {
    /// A tester where every URL passes
    pub fn new() -> Self {
        Self::failing(Vec::<(String, ProbeFailure)>::new())
    }

    /// A tester that fails the given URLs with the given reasons
    pub fn failing<I, S>(failures: I) -> Self
    where
        I: IntoIterator<Item = (S, ProbeFailure)>,
        S: Into<String>,
    {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            tested: Arc::new(std::sync::Mutex::new(Vec::new())),
            failures: Arc::new(
                failures
                    .into_iter()
                    .map(|(url, failure)| (url.into(), failure))
                    .collect(),
            ),
        }
    }

    /// Get the number of times test() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the URLs that were tested
    pub fn tested(&self) -> Vec<String> {
        self.tested.lock().unwrap().clone()
    }

    /// Create a new MockUrlTester that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            call_count: Arc::clone(&other.call_count),
            tested: Arc::clone(&other.tested),
            failures: Arc::clone(&other.failures),
        }
    }
}

#[async_trait::async_trait]
impl UrlTester for MockUrlTester {
    async fn test(&self, url: &str) -> Option<ProbeFailure> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.tested.lock().unwrap().push(url.to_string());
        self.failures.get(url).cloned()
    }

    fn tester_name(&self) -> &'static str {
        "mock"
    }
}

/// A mock CacheStore that tracks calls
pub struct MockCacheStore {
    /// Call counter for get()
    get_call_count: Arc<AtomicUsize>,
    /// Call counter for put()
    put_call_count: Arc<AtomicUsize>,
    /// Stored blobs
    state: Arc<std::sync::Mutex<HashMap<String, serde_json::Value>>>,
    /// Reject every put()
    fail_writes: bool,
}

impl MockCacheStore {
    pub fn new() -> Self {
        Self {
            get_call_count: Arc::new(AtomicUsize::new(0)),
            put_call_count: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(std::sync::Mutex::new(HashMap::new())),
            fail_writes: false,
        }
    }

    /// A store whose writes always fail
    pub fn read_only() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    /// Get the number of times get() was called
    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times put() was called
    pub fn put_call_count(&self) -> usize {
        self.put_call_count.load(Ordering::SeqCst)
    }

    /// Raw blob currently stored under `name`
    pub fn blob(&self, name: &str) -> Option<serde_json::Value> {
        self.state.lock().unwrap().get(name).cloned()
    }

    /// Create a new MockCacheStore that shares counters and state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            get_call_count: Arc::clone(&other.get_call_count),
            put_call_count: Arc::clone(&other.put_call_count),
            state: Arc::clone(&other.state),
            fail_writes: other.fail_writes,
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for MockCacheStore {
    async fn get(&self, name: &str) -> Result<Option<serde_json::Value>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().get(name).cloned())
    }

    async fn put(&self, name: &str, value: serde_json::Value) -> Result<()> {
        self.put_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(cnames_core::Error::cache_store("disk full"));
        }
        self.state.lock().unwrap().insert(name.to_string(), value);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.state.lock().unwrap().remove(name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.state.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a minimal valid configuration for testing
pub fn minimal_config() -> RobotConfig {
    RobotConfig::new()
}

/// Registry with the given subdomains, each targeting `<sub>.github.io`
pub fn registry_of(subdomains: &[&str]) -> Registry {
    subdomains
        .iter()
        .map(|s| (s.to_string(), Entry::new(format!("{s}.github.io"))))
        .collect()
}

/// A 404 failure, as the HTTP tester would report it
pub fn not_found() -> ProbeFailure {
    ProbeFailure::Status {
        code: 404,
        reason: "Not Found".to_string(),
    }
}

/// A timeout failure after the default probe timeout
pub fn timed_out() -> ProbeFailure {
    ProbeFailure::Timeout {
        after: Duration::from_secs(5),
    }
}
