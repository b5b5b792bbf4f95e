// # Registry Parser & Normalizer
//
// Turns the raw text of a community-edited registry file into a canonical
// [`Registry`].
//
// ## File Shape
//
// ```text
// /* header comment */
//
// var cnames_active = {
//   "foo": "foo.github.io",
//   "a.b": "baz.com" // noCF
//   /* footer comment */
// }
// ```
//
// ## Failure Modes
//
// - Missing opening line or closing comment + brace: the whole parse fails
//   with `Error::StructuralParse` and no registry is returned.
// - A data line that does not fit the grammar is skipped and reported as a
//   `ParseWarning`. The rest of the file still parses.
//
// ## Normalization
//
// Applied to every accepted line, in order:
// 1. Lowercase the key and strip a redundant `.<domain>` suffix
// 2. Strip trailing slashes and a leading `http://`, `https://` or `//`
// 3. Rewrite `github.com/<owner>/<repo>` to `<owner>.github.io/<repo>`
// 4. Drop the path unless the target is `<owner>.github.io/<repo>`
// 5. Rewrite wildcard-platform hosts to their fixed upstream
// 6. Lowercase the hostname, keeping path casing
// 7. Re-render the noCF marker; force it for dotted keys and wildcard upstreams

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use super::{Entry, Registry, render_no_cf};
use crate::error::{Error, Result};

/// Domain the registry serves subdomains of
pub const DEFAULT_DOMAIN: &str = "js.org";

/// Line that opens the data block
pub const DATA_BLOCK_OPEN: &str = "var cnames_active = {";

/// Hosting platforms whose apex always routes through a fixed upstream
const WILDCARD_TARGETS: &[(&str, &str)] = &[(".vercel.app", "cname.vercel-dns.com")];

static OPEN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^var cnames_active = \{[ \t]*$").expect("opening line pattern is valid")
});

static CLOSING_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*/\*[\S\s]+?\*/[ \t]*\n\};?[ \t]*(\n|$)")
        .expect("closing block pattern is valid")
});

static ENTRY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)^[ \t]*['"]([a-z0-9_.-]*)['"][ \t]*:[ \t]*['"]([^"]*)['"][ \t]*,?[ \t]*(// *nocf.*)?[ \t]*$"#,
    )
    .expect("entry line pattern is valid")
});

static PROTOCOL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:https?:)?//(.+)$").expect("protocol pattern is valid"));

static GITHUB_COM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^github\.com/([^/]+)/(.+)$").expect("github.com pattern is valid")
});

static GITHUB_IO_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[^.]+\.github\.io/[^/]+$").expect("github.io pattern is valid")
});

/// Why a data line produced a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseWarningKind {
    /// The line does not match the entry grammar and was skipped
    Unparseable,
    /// The line's key was already defined; this line replaced the earlier one
    DuplicateKey,
}

/// A recoverable problem with a single data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number in the parsed file
    pub line: usize,
    /// The raw line text
    pub content: String,
    /// What went wrong
    pub kind: ParseWarningKind,
}

impl ParseWarning {
    /// Human-readable description, without the line number
    pub fn message(&self) -> String {
        match self.kind {
            ParseWarningKind::Unparseable => {
                format!("Failed to parse `{}` as cnames_active entry", self.content)
            }
            ParseWarningKind::DuplicateKey => {
                format!("Duplicate entry `{}` overrides an earlier line", self.content)
            }
        }
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message())
    }
}

/// Result of a successful parse
#[derive(Debug, Clone, Default)]
pub struct ParsedRegistry {
    /// Canonical entries, keyed by normalized subdomain
    pub registry: Registry,
    /// Lines that were skipped or overrode earlier lines
    pub warnings: Vec<ParseWarning>,
}

/// Parser bound to the registry's own domain
#[derive(Debug, Clone)]
pub struct RegistryParser {
    key_suffix: String,
}

impl Default for RegistryParser {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}

impl RegistryParser {
    /// Create a parser for subdomains of `domain`
    pub fn new(domain: &str) -> Self {
        Self {
            key_suffix: format!(".{}", domain.to_lowercase()),
        }
    }

    /// Parse registry file text
    ///
    /// # Returns
    ///
    /// - `Ok(ParsedRegistry)`: Entries from every line that fits the grammar,
    ///   plus warnings for those that don't
    /// - `Err(Error::StructuralParse)`: The data block markers were not found
    #[instrument(skip_all, fields(bytes = content.len()))]
    pub fn parse(&self, content: &str) -> Result<ParsedRegistry> {
        let lines: Vec<&str> = content.split('\n').collect();

        let open = lines
            .iter()
            .position(|line| OPEN_LINE.is_match(line))
            .ok_or_else(|| {
                warn!("Could not locate the var declaration for cnames_active object");
                Error::structural("could not locate the `var cnames_active = {` line")
            })?;

        let close = find_closing_line(content, &lines, open).ok_or_else(|| {
            warn!("Could not locate the closing comment and curly bracket for cnames_active object");
            Error::structural("could not locate the closing comment block and `}`")
        })?;

        let mut parsed = ParsedRegistry::default();
        for (idx, line) in lines.iter().enumerate().take(close).skip(open + 1) {
            let Some(caps) = ENTRY_LINE.captures(line) else {
                let warning = ParseWarning {
                    line: idx + 1,
                    content: (*line).to_string(),
                    kind: ParseWarningKind::Unparseable,
                };
                warn!("{}", warning);
                parsed.warnings.push(warning);
                continue;
            };

            let marker = caps.get(3).map(|m| m.as_str());
            let (subdomain, entry) = self.normalize_entry(&caps[1], &caps[2], marker);

            if parsed.registry.insert(subdomain, entry).is_some() {
                let warning = ParseWarning {
                    line: idx + 1,
                    content: (*line).to_string(),
                    kind: ParseWarningKind::DuplicateKey,
                };
                warn!("{}", warning);
                parsed.warnings.push(warning);
            }
        }

        debug!(
            "Parsed {} entries ({} warnings)",
            parsed.registry.len(),
            parsed.warnings.len()
        );
        Ok(parsed)
    }

    /// Normalize one raw key/value pair into its canonical form
    ///
    /// `marker` is the raw trailing comment starting at `//`, if any.
    pub fn normalize_entry(&self, key: &str, value: &str, marker: Option<&str>) -> (String, Entry) {
        let subdomain = self.normalize_subdomain(key);
        let target = normalize_target(value);

        let mut no_cf = marker.map(canonical_no_cf);
        if no_cf.is_none() && (subdomain.contains('.') || is_wildcard_upstream(&target)) {
            no_cf = Some(render_no_cf(""));
        }

        let entry = Entry {
            target,
            no_cf,
            ..Entry::default()
        };
        (subdomain, entry)
    }

    /// Lowercase a key and strip a redundant domain suffix
    pub fn normalize_subdomain(&self, key: &str) -> String {
        let key = key.to_lowercase();
        match key.strip_suffix(&self.key_suffix) {
            Some(stripped) => stripped.to_string(),
            None => key,
        }
    }
}

/// Parse registry file text for the default domain
pub fn parse(content: &str) -> Result<ParsedRegistry> {
    RegistryParser::default().parse(content)
}

/// Normalize a raw target value
pub fn normalize_target(raw: &str) -> String {
    let mut target = raw.trim_end_matches('/').to_string();

    if let Some(caps) = PROTOCOL_PREFIX.captures(&target) {
        target = caps[1].to_string();
    }

    if let Some(caps) = GITHUB_COM.captures(&target) {
        target = format!("{}.github.io/{}", &caps[1], &caps[2]);
    }

    if !GITHUB_IO_PATH.is_match(&target) {
        if let Some((host, path)) = target.split_once('/') {
            if !host.is_empty() && !path.is_empty() {
                target = host.to_string();
            }
        }
    }

    let (host, rest) = match target.find('/') {
        Some(idx) => target.split_at(idx),
        None => (target.as_str(), ""),
    };
    let host = host.to_lowercase();

    if let Some(upstream) = wildcard_upstream(&host) {
        return upstream.to_string();
    }

    format!("{host}{rest}")
}

/// Fixed upstream for a host on a wildcard platform
fn wildcard_upstream(host: &str) -> Option<&'static str> {
    WILDCARD_TARGETS
        .iter()
        .find(|(suffix, _)| host.ends_with(suffix))
        .map(|(_, upstream)| *upstream)
}

fn is_wildcard_upstream(target: &str) -> bool {
    WILDCARD_TARGETS
        .iter()
        .any(|(_, upstream)| target == *upstream)
}

/// Re-render a raw `// nocf ...` comment canonically, keeping its free text
fn canonical_no_cf(raw: &str) -> String {
    let body = raw.trim_start_matches('/').trim();
    // The grammar guarantees the body starts with the 4-byte `nocf` token
    render_no_cf(body.get(4..).unwrap_or(""))
}

/// Index of the line that starts the closing comment block
///
/// The block must be followed by a line holding only `}` (or `};`).
fn find_closing_line(content: &str, lines: &[&str], open: usize) -> Option<usize> {
    let mut offset = 0;
    for (idx, line) in lines.iter().enumerate() {
        if idx > open
            && line.trim_start().starts_with("/*")
            && CLOSING_BLOCK.is_match(&content[offset..])
        {
            return Some(idx);
        }
        offset += line.len() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            "/**\n * Header\n */\n\nvar cnames_active = {{\n{body}\n  /*\n   * Footer\n   */\n}}\n"
        )
    }

    #[test]
    fn test_parse_strips_trailing_slash() {
        let parsed = parse(&wrap(r#"  "foo": "bar.github.io/","#)).unwrap();
        assert_eq!(parsed.registry.get("foo"), Some(&Entry::new("bar.github.io")));
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_parse_accepts_single_quotes_and_spacing() {
        let parsed = parse(&wrap("\t'foo' :  'foo.github.io' ,")).unwrap();
        assert_eq!(parsed.registry.get("foo").unwrap().target, "foo.github.io");
    }

    #[test]
    fn test_dotted_subdomain_forces_marker() {
        let parsed = parse(&wrap(r#""a.b": "baz.com""#)).unwrap();
        assert_eq!(
            parsed.registry.get("a.b").unwrap().no_cf.as_deref(),
            Some("// noCF")
        );
    }

    #[test]
    fn test_marker_is_rerendered_with_comment() {
        let parsed = parse(&wrap(r#"  "foo": "foo.com", //NOCF   legacy host  "#)).unwrap();
        assert_eq!(
            parsed.registry.get("foo").unwrap().no_cf.as_deref(),
            Some("// noCF   legacy host")
        );
    }

    #[test]
    fn test_key_is_lowercased_and_domain_suffix_stripped() {
        let parsed = parse(&wrap(r#"  "MyLib.js.org": "mylib.github.io","#)).unwrap();
        assert!(parsed.registry.contains("mylib"));
    }

    #[test]
    fn test_custom_domain_suffix() {
        let parser = RegistryParser::new("Example.DEV");
        assert_eq!(parser.normalize_subdomain("docs.example.dev"), "docs");
        assert_eq!(parser.normalize_subdomain("docs.js.org"), "docs.js.org");
    }

    #[test]
    fn test_target_normalization_rules() {
        assert_eq!(normalize_target("HTTPS://Foo.GitHub.io/"), "foo.github.io");
        assert_eq!(normalize_target("http://example.com/some/path"), "example.com");
        assert_eq!(normalize_target("//example.com"), "example.com");
        assert_eq!(normalize_target("github.com/Owner/Repo"), "owner.github.io/Repo");
        assert_eq!(normalize_target("owner.github.io/MyRepo///"), "owner.github.io/MyRepo");
        assert_eq!(normalize_target("owner.github.io/a/b"), "owner.github.io");
        assert_eq!(normalize_target("my-app.vercel.app"), "cname.vercel-dns.com");
        assert_eq!(normalize_target("My-App.Vercel.App"), "cname.vercel-dns.com");
        assert_eq!(normalize_target(""), "");
    }

    #[test]
    fn test_wildcard_target_forces_marker() {
        let parsed = parse(&wrap(r#"  "app": "https://app.vercel.app","#)).unwrap();
        let entry = parsed.registry.get("app").unwrap();
        assert_eq!(entry.target, "cname.vercel-dns.com");
        assert_eq!(entry.no_cf.as_deref(), Some("// noCF"));
    }

    #[test]
    fn test_malformed_line_is_skipped_with_warning() {
        let body = "  \"a\": \"a.github.io\",\n  this is garbage\n  \"b\": \"b.github.io\"";
        let parsed = parse(&wrap(body)).unwrap();
        assert_eq!(parsed.registry.len(), 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, ParseWarningKind::Unparseable);
        assert_eq!(parsed.warnings[0].line, 7);
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let body = "  \"a\": \"first.github.io\",\n  \"A\": \"second.github.io\"";
        let parsed = parse(&wrap(body)).unwrap();
        assert_eq!(parsed.registry.len(), 1);
        assert_eq!(parsed.registry.get("a").unwrap().target, "second.github.io");
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, ParseWarningKind::DuplicateKey);
    }

    #[test]
    fn test_empty_target_is_accepted() {
        let parsed = parse(&wrap(r#"  "empty": """#)).unwrap();
        assert_eq!(parsed.registry.get("empty").unwrap().target, "");
    }

    #[test]
    fn test_missing_opening_line_is_structural() {
        let content = "/* header */\n\nvar cnames = {\n  \"a\": \"a.com\"\n  /* footer */\n}\n";
        let err = parse(content).unwrap_err();
        assert!(matches!(err, Error::StructuralParse(_)));
    }

    #[test]
    fn test_missing_closing_block_is_structural() {
        let content = "/* header */\n\nvar cnames_active = {\n  \"a\": \"a.com\"\n}\n";
        let err = parse(content).unwrap_err();
        assert!(matches!(err, Error::StructuralParse(_)));
    }

    #[test]
    fn test_closing_brace_with_semicolon() {
        let content = "/* h */\n\nvar cnames_active = {\n  \"a\": \"a.com\"\n  /* f */\n};";
        let parsed = parse(content).unwrap();
        assert_eq!(parsed.registry.len(), 1);
    }
}
