//! Canonical registry file generation
//!
//! The output layout is a byte-exact contract with the hand-formatted file:
//!
//! ```text
//! <header comment>
//!
//! var cnames_active = {
//!   "a": "a.github.io",
//!   "b.c": "c.com" // noCF
//!   <footer comment>
//! }
//! ```
//!
//! Every entry line but the last carries a comma, and the marker follows the
//! comma after a single space.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use super::{DATA_BLOCK_OPEN, Registry, RegistryParser};
use crate::error::{Error, Result};

static COMMENT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\*[\S\s]+?\*/").expect("comment block pattern is valid"));

/// Render `registry` as canonical file text, reusing the header and footer
/// comment blocks of `original`
///
/// The registry is re-keyed with lowercase keys first, so callers may pass a
/// registry that never went through the parser. Probe results on entries are
/// not rendered.
///
/// # Returns
///
/// - `Ok(String)`: The canonical file text
/// - `Err(Error::Generation)`: `original` has fewer than two comment blocks
#[instrument(skip_all, fields(entries = registry.len()))]
pub fn generate(registry: &Registry, original: &str) -> Result<String> {
    let mut blocks = COMMENT_BLOCK.find_iter(original).map(|m| m.as_str());
    let (Some(header), Some(footer)) = (blocks.next(), blocks.next()) else {
        warn!("Could not locate top & bottom comment blocks in raw file");
        return Err(Error::generation(
            "could not locate the header and footer comment blocks",
        ));
    };

    let registry = registry.lowercased();
    let last = registry.len().saturating_sub(1);
    let lines: Vec<String> = registry
        .iter()
        .enumerate()
        .map(|(idx, (subdomain, entry))| {
            let comma = if idx == last { "" } else { "," };
            match &entry.no_cf {
                Some(marker) => format!("  \"{subdomain}\": \"{}\"{comma} {marker}", entry.target),
                None => format!("  \"{subdomain}\": \"{}\"{comma}", entry.target),
            }
        })
        .collect();

    debug!("Generated {} entry lines", lines.len());
    Ok(format!(
        "{header}\n\n{DATA_BLOCK_OPEN}\n{}\n  {footer}\n}}\n",
        lines.join("\n")
    ))
}

/// Parse `content` and render it back in canonical form
pub fn regenerate(parser: &RegistryParser, content: &str) -> Result<String> {
    let parsed = parser.parse(content)?;
    generate(&parsed.registry, content)
}
