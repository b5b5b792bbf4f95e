//! Resumable probe engine
//!
//! The ProbeEngine is responsible for:
//! - Loading the checkpoint of an interrupted run
//! - Testing every remaining entry over HTTP and HTTPS via UrlTester
//! - Checkpointing the accumulated results after every entry
//! - Partitioning the results into failed and passed
//!
//! ## Architecture
//!
//! ```text
//!                            ┌──────────────┐
//!          Registry ────────▶│ ProbeEngine  │────────▶ { failed, passed }
//!                            └──────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │ CacheStore  │           │  UrlTester   │           │   Events    │
//! │ (resume)    │           │ (http/https) │           │  (notify)   │
//! └─────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! ## Entry Lifecycle
//!
//! `Unprobed → CacheHit | Probing → Resolved(passed | failed)`
//!
//! Entries are processed strictly one at a time, in key order. An entry is
//! failed only when both of its URLs fail. A single failing protocol is kept
//! on the passed entry for diagnostics.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, instrument, warn};

use crate::cache::CacheKey;
use crate::config::RobotConfig;
use crate::error::Result;
use crate::registry::{Entry, Registry};
use crate::traits::{CacheStore, UrlTester};

/// Events emitted by the ProbeEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    /// Probe run started
    Started {
        /// Entries that will be examined
        total: usize,
        /// Entries already resolved by a previous run
        cached: usize,
    },

    /// Entry resolved from the checkpoint without testing
    CacheHit {
        subdomain: String,
        failed: bool,
    },

    /// Entry is being tested
    Probing {
        subdomain: String,
        url: String,
        position: usize,
        total: usize,
    },

    /// Entry passed (at least one protocol served real content)
    Passed {
        subdomain: String,
        /// Failure reason of the protocol that did fail, if any
        partial: Option<String>,
    },

    /// Entry failed on both protocols
    Failed {
        subdomain: String,
        http: String,
        https: String,
    },

    /// Checkpoint write failed; the run continues
    CacheWriteFailed {
        subdomain: String,
        error: String,
    },

    /// Probe run finished
    Finished {
        failed: usize,
        passed: usize,
    },
}

/// Result of a probe run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Entries where both protocols failed
    pub failed: Registry,

    /// Everything else
    pub passed: Registry,
}

impl ProbeOutcome {
    /// Split resolved entries by their `failed` flag
    pub fn partition(results: Registry) -> Self {
        let mut outcome = Self::default();
        for (subdomain, entry) in results {
            if entry.is_failed() {
                outcome.failed.insert(subdomain, entry);
            } else {
                outcome.passed.insert(subdomain, entry);
            }
        }
        outcome
    }
}

/// The two candidate URLs for a registry key
///
/// The empty key is the apex record and uses the bare domain.
pub fn probe_urls(subdomain: &str, domain: &str) -> (String, String) {
    let host = if subdomain.is_empty() {
        domain.to_string()
    } else {
        format!("{subdomain}.{domain}")
    };
    (format!("http://{host}"), format!("https://{host}"))
}

/// Core probe engine
///
/// ## Lifecycle
///
/// 1. Create with [`ProbeEngine::new()`]
/// 2. Call [`ProbeEngine::probe()`] with the registry to test
/// 3. Once the outcome has been used, invalidate the checkpoint
///    (the engine never clears it itself)
///
/// ## Resumability
///
/// The checkpoint is rewritten after every entry, so a killed run loses at
/// most the entry that was in flight. Entries resolved by an earlier run but
/// outside this run's limit are carried over unchanged.
///
/// A cache hit keeps its probe fields but takes `target` and `noCF` from the
/// registry being probed.
pub struct ProbeEngine {
    /// URL tester for reachability checks
    tester: Box<dyn UrlTester>,

    /// Cache store for checkpoints
    cache: Box<dyn CacheStore>,

    /// Registry domain appended to each subdomain
    domain: String,

    /// Optional cap on entries examined
    limit: Option<usize>,

    /// Checkpoint slot for this run
    results_key: CacheKey<Registry>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ProbeEvent>,
}

impl ProbeEngine {
    /// Create a new probe engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields probe events
    pub fn new(
        tester: Box<dyn UrlTester>,
        cache: Box<dyn CacheStore>,
        config: &RobotConfig,
    ) -> Result<(Self, mpsc::Receiver<ProbeEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.probe.event_channel_capacity);

        let engine = Self {
            tester,
            cache,
            domain: config.registry.domain.clone(),
            limit: config.probe.limit,
            results_key: CacheKey::named(config.probe.cache_name.clone()),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The checkpoint slot this engine resumes from and writes to
    pub fn results_key(&self) -> &CacheKey<Registry> {
        &self.results_key
    }

    /// The store checkpoints are written to
    pub fn cache_store(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    /// Probe every entry of `registry` (up to the configured limit)
    #[instrument(skip_all, fields(entries = registry.len(), tester = self.tester.tester_name()))]
    pub async fn probe(&self, registry: &Registry) -> ProbeOutcome {
        let cache = self
            .results_key
            .load(self.cache.as_ref())
            .await
            .unwrap_or_default();

        let total = self.limit.map_or(registry.len(), |n| n.min(registry.len()));
        let cached = registry
            .subdomains()
            .take(total)
            .filter(|s| cache.contains(s))
            .count();

        info!("Starting probe run: {} entries ({} cached)", total, cached);
        self.emit_event(ProbeEvent::Started { total, cached });

        // Resolved entries beyond the limit stay in the checkpoint
        let mut checkpoint: Registry = cache
            .iter()
            .filter(|(subdomain, _)| registry.contains(subdomain))
            .map(|(subdomain, entry)| (subdomain.clone(), entry.clone()))
            .collect();
        let mut results = Registry::new();
        let mut failures = 0usize;

        for (idx, (subdomain, entry)) in registry.iter().take(total).enumerate() {
            let position = progress(idx + 1, total, failures);

            let resolved = match cache.get(subdomain) {
                Some(hit) => {
                    let (http, _) = probe_urls(subdomain, &self.domain);
                    debug!("[{}] {} in cache, skipping tests", position, http);
                    self.emit_event(ProbeEvent::CacheHit {
                        subdomain: subdomain.clone(),
                        failed: hit.is_failed(),
                    });
                    Entry {
                        target: entry.target.clone(),
                        no_cf: entry.no_cf.clone(),
                        ..hit.clone()
                    }
                }
                None => self.probe_entry(subdomain, entry, idx + 1, total, &position).await,
            };

            if resolved.is_failed() {
                failures += 1;
            }
            checkpoint.insert(subdomain.clone(), resolved.clone());
            results.insert(subdomain.clone(), resolved);

            if let Err(e) = self.results_key.save(self.cache.as_ref(), &checkpoint).await {
                warn!("Failed to checkpoint probe results after '{}': {}", subdomain, e);
                self.emit_event(ProbeEvent::CacheWriteFailed {
                    subdomain: subdomain.clone(),
                    error: e.to_string(),
                });
            }
        }

        let outcome = ProbeOutcome::partition(results);
        info!(
            "Probe run completed: {} failed, {} passed",
            outcome.failed.len(),
            outcome.passed.len()
        );
        self.emit_event(ProbeEvent::Finished {
            failed: outcome.failed.len(),
            passed: outcome.passed.len(),
        });
        outcome
    }

    /// Test one entry over both protocols
    #[instrument(skip(self, entry, total, position))]
    async fn probe_entry(
        &self,
        subdomain: &str,
        entry: &Entry,
        index: usize,
        total: usize,
        position: &str,
    ) -> Entry {
        let (http_url, https_url) = probe_urls(subdomain, &self.domain);

        info!("[{}] Testing {}...", position, http_url);
        self.emit_event(ProbeEvent::Probing {
            subdomain: subdomain.to_string(),
            url: http_url.clone(),
            position: index,
            total,
        });

        let http = self.tester.test(&http_url).await.map(|f| f.to_string());
        let https = self.tester.test(&https_url).await.map(|f| f.to_string());

        let mut resolved = entry.without_probe_results();
        match (http, https) {
            (Some(http), Some(https)) => {
                warn!("...failed: HTTP: `{}` HTTPS: `{}`", http, https);
                self.emit_event(ProbeEvent::Failed {
                    subdomain: subdomain.to_string(),
                    http: http.clone(),
                    https: https.clone(),
                });
                resolved.http = Some(http);
                resolved.https = Some(https);
                resolved.failed = Some(true);
            }
            (http, https) => {
                let partial = http.clone().or_else(|| https.clone());
                match &partial {
                    Some(reason) => info!("...succeeded on one protocol ({})", reason),
                    None => info!("...succeeded"),
                }
                self.emit_event(ProbeEvent::Passed {
                    subdomain: subdomain.to_string(),
                    partial,
                });
                resolved.http = http;
                resolved.https = https;
                resolved.failed = Some(false);
            }
        }
        resolved
    }

    /// Emit a probe event
    ///
    /// Never blocks. A full channel drops the event; a closed channel means
    /// nobody is listening.
    fn emit_event(&self, event: ProbeEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                debug!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
        }
    }
}

/// Progress prefix, e.g. `12/4,000 0% (Failures: 1 0%)`
fn progress(counter: usize, total: usize, failures: usize) -> String {
    format!(
        "{}/{} {}% (Failures: {} {}%)",
        group_thousands(counter),
        group_thousands(total),
        percent(counter, total),
        group_thousands(failures),
        percent(failures, total)
    )
}

fn percent(part: usize, total: usize) -> u64 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u64
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_urls() {
        assert_eq!(
            probe_urls("foo", "js.org"),
            ("http://foo.js.org".to_string(), "https://foo.js.org".to_string())
        );
        assert_eq!(
            probe_urls("", "js.org"),
            ("http://js.org".to_string(), "https://js.org".to_string())
        );
    }

    #[test]
    fn test_progress_format() {
        assert_eq!(progress(12, 4000, 1), "12/4,000 0% (Failures: 1 0%)");
        assert_eq!(progress(1, 2, 1), "1/2 50% (Failures: 1 50%)");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(999), "999");
    }

    #[test]
    fn test_partition() {
        let mut results = Registry::new();
        let mut bad = Entry::new("bad.github.io");
        bad.failed = Some(true);
        let mut good = Entry::new("good.github.io");
        good.failed = Some(false);
        results.insert("bad", bad);
        results.insert("good", good);
        results.insert("unknown", Entry::new("x.github.io"));

        let outcome = ProbeOutcome::partition(results);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.passed.len(), 2);
        assert!(outcome.failed.contains("bad"));
    }
}
