// # HTTP URL Tester
//
// This crate provides the reqwest-backed implementations of the network
// boundaries of cnames-core.
//
// ## Purpose
//
// - `HttpUrlTester`: decides whether `http(s)://<sub>.<domain>` serves real
//   content, for the probe engine
// - `HttpRegistrySource`: fetches the raw registry file text
//
// ## Checks
//
// A URL passes only if every check passes, in this order:
//
// 1. The request completes within the timeout
// 2. The final status is 2xx
// 3. If redirected, the final origin is the domain or one of its subdomains
// 4. The content type is a web page (optional)
// 5. The body is not empty or whitespace only
// 6. The body is not a known placeholder page (optional)
// 7. The page does not meta-refresh off the domain (optional)

mod source;

pub use source::{DEFAULT_REGISTRY_URL, HttpRegistrySource};

use cnames_core::config::{ProbeConfig, RobotConfig};
use cnames_core::traits::{ProbeFailure, UrlTester};
use cnames_core::{Error, Result};

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Maximum number of redirects followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Content types that count as a web page
const PAGE_CONTENT_TYPES: &[&str] = &["text/html", "text/plain", "application/xhtml+xml"];

static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("meta tag pattern is valid"));

static HTTP_EQUIV_REFRESH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)http-equiv\s*=\s*["']?\s*refresh"#).expect("refresh pattern is valid")
});

static REFRESH_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)content\s*=\s*["']?\s*\d*\s*[;,]\s*url\s*=\s*['"]?([^'">\s]+)"#)
        .expect("refresh url pattern is valid")
});

/// User agent sent with every request
pub(crate) fn user_agent() -> String {
    format!("cnames-robot/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(user_agent())
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// reqwest-based URL tester
pub struct HttpUrlTester {
    /// HTTP client (timeout and redirect policy baked in)
    client: reqwest::Client,

    /// Per-request timeout, reported on expiry
    timeout: Duration,

    /// Registry domain; redirects must stay within it
    domain: String,

    /// Fail non-page content types
    check_content_type: bool,

    /// Fail off-domain meta refreshes
    check_meta_refresh: bool,

    /// Lowercased placeholder page markers
    placeholder_markers: Vec<String>,
}

impl HttpUrlTester {
    /// Create a tester for `domain` with the given probe settings
    pub fn new(domain: impl Into<String>, probe: &ProbeConfig) -> Result<Self> {
        let timeout = probe.timeout();
        Ok(Self {
            client: build_client(timeout)?,
            timeout,
            domain: domain.into().to_lowercase(),
            check_content_type: probe.check_content_type,
            check_meta_refresh: probe.check_meta_refresh,
            placeholder_markers: probe
                .placeholder_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        })
    }

    /// Create a tester from the full robot configuration
    pub fn from_config(config: &RobotConfig) -> Result<Self> {
        Self::new(config.registry.domain.clone(), &config.probe)
    }

    /// Replace the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    fn transport_failure(&self, err: &reqwest::Error) -> ProbeFailure {
        if err.is_timeout() {
            ProbeFailure::Timeout {
                after: self.timeout,
            }
        } else {
            ProbeFailure::Request(err.to_string())
        }
    }

    async fn check(&self, url: &str) -> std::result::Result<(), ProbeFailure> {
        let requested = Url::parse(url).map_err(|e| ProbeFailure::Request(e.to_string()))?;

        let response = self
            .client
            .get(requested.clone())
            .send()
            .await
            .map_err(|e| self.transport_failure(&e))?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        if !status.is_success() {
            return Err(ProbeFailure::Status {
                code: status.as_u16(),
                reason,
            });
        }

        let final_url = response.url().clone();
        if final_url != requested && !within_domain(&final_url, &self.domain) {
            return Err(ProbeFailure::ExternalRedirect(final_url.to_string()));
        }

        if self.check_content_type {
            if let Some(content_type) = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
            {
                if !is_page_content_type(content_type) {
                    return Err(ProbeFailure::ContentType(content_type.to_string()));
                }
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_failure(&e))?;

        if body.trim().is_empty() {
            return Err(ProbeFailure::EmptyBody {
                code: status.as_u16(),
                reason,
            });
        }

        if !self.placeholder_markers.is_empty() {
            let lowered = body.to_lowercase();
            if self.placeholder_markers.iter().any(|m| lowered.contains(m)) {
                return Err(ProbeFailure::Placeholder);
            }
        }

        if self.check_meta_refresh {
            if let Some(target) = meta_refresh_target(&body, &final_url) {
                if !within_domain(&target, &self.domain) {
                    return Err(ProbeFailure::MetaRefresh(target.to_string()));
                }
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl UrlTester for HttpUrlTester {
    async fn test(&self, url: &str) -> Option<ProbeFailure> {
        match self.check(url).await {
            Ok(()) => {
                trace!("{} passed", url);
                None
            }
            Err(failure) => {
                debug!("{} failed: {}", url, failure);
                Some(failure)
            }
        }
    }

    fn tester_name(&self) -> &'static str {
        "http"
    }
}

/// Whether `url`'s host is `domain` or one of its subdomains
pub fn within_domain(url: &Url, domain: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    let domain = domain.to_lowercase();
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Whether a `Content-Type` header value names a web page
pub fn is_page_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    PAGE_CONTENT_TYPES.contains(&essence.as_str())
}

/// Target of the first `<meta http-equiv="refresh">` tag, resolved against `base`
pub fn meta_refresh_target(body: &str, base: &Url) -> Option<Url> {
    META_TAG
        .find_iter(body)
        .map(|m| m.as_str())
        .filter(|tag| HTTP_EQUIV_REFRESH.is_match(tag))
        .find_map(|tag| REFRESH_URL.captures(tag))
        .and_then(|caps| base.join(&caps[1]).ok())
}
