// # URL Tester Trait
//
// Defines the interface for a single reachability test of one URL.
//
// ## Purpose
//
// The probe engine asks a tester whether `http://<sub>.<domain>` and
// `https://<sub>.<domain>` serve real content. The tester owns the network
// client; the engine owns ordering, caching and the pass/fail policy.
//
// ## Implementations
//
// - `cnames-probe-http`: reqwest-based tester
// - Test doubles in `tests/common`

use async_trait::async_trait;
use std::time::Duration;

/// Why a single URL test failed
///
/// Failures are ordinary results of a probe, never errors: they are
/// recorded on the entry as their `Display` text and the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The request did not complete within the timeout
    Timeout {
        /// The timeout that expired
        after: Duration,
    },

    /// Transport-level failure (DNS, TLS, connection reset, ...)
    Request(String),

    /// Non-2xx response
    Status {
        /// Numeric status code
        code: u16,
        /// Canonical reason phrase, empty if unknown
        reason: String,
    },

    /// Redirects ended on an origin outside the registry's domain
    ExternalRedirect(String),

    /// The body was empty or whitespace only
    EmptyBody {
        /// Numeric status code
        code: u16,
        /// Canonical reason phrase, empty if unknown
        reason: String,
    },

    /// The response was not a web page
    ContentType(String),

    /// The body is the "this subdomain is not set up" placeholder page
    Placeholder,

    /// The page meta-refreshes to an origin outside the domain
    MetaRefresh(String),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { after } => write!(f, "Failed due to time out after {after:?}"),
            Self::Request(err) => write!(f, "Failed during request with error '{err}'"),
            Self::Status { code, reason } => {
                write!(f, "Failed with status code '{}'", status_text(*code, reason))
            }
            Self::ExternalRedirect(url) => {
                write!(f, "Failed due to automatic redirect to '{url}'")
            }
            Self::EmptyBody { code, reason } => write!(
                f,
                "Failed with empty return body (status '{}')",
                status_text(*code, reason)
            ),
            Self::ContentType(content_type) => {
                write!(f, "Failed due to unexpected content type '{content_type}'")
            }
            Self::Placeholder => write!(f, "Failed due to placeholder page content"),
            Self::MetaRefresh(url) => write!(f, "Failed due to meta refresh redirect to '{url}'"),
        }
    }
}

fn status_text(code: u16, reason: &str) -> String {
    if reason.is_empty() {
        code.to_string()
    } else {
        format!("{code} {reason}")
    }
}

/// Trait for URL tester implementations
///
/// # Contract
///
/// - Each call is bounded by the implementation's timeout; expiry yields
///   [`ProbeFailure::Timeout`], never a hang or a panic
/// - No retries; the engine decides what a failure means
/// - No shared state between calls beyond the connection pool
#[async_trait]
pub trait UrlTester: Send + Sync {
    /// Test one URL
    ///
    /// # Returns
    ///
    /// - `None`: The URL serves real content
    /// - `Some(ProbeFailure)`: Why it does not
    async fn test(&self, url: &str) -> Option<ProbeFailure>;

    /// Get the tester name (for logging)
    fn tester_name(&self) -> &'static str;
}
