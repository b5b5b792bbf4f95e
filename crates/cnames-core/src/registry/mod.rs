//! CNAME registry data model
//!
//! A [`Registry`] maps a lowercase subdomain to its [`Entry`]. It is built by
//! [`parse`], rendered back to canonical text by [`generate`], and annotated
//! with probe results by the [`crate::ProbeEngine`].
//!
//! Keys are held in a `BTreeMap`, so iteration is always in ascending
//! code-point order. That order is the canonical order of the file.

mod generate;
mod parse;

pub use generate::{generate, regenerate};
pub use parse::{
    DATA_BLOCK_OPEN, DEFAULT_DOMAIN, ParseWarning, ParseWarningKind, ParsedRegistry,
    RegistryParser, parse,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical bypass marker token, rendered at the end of an entry line
pub const NO_CF_MARKER: &str = "// noCF";

/// One subdomain → target record
///
/// `http`, `https` and `failed` are only set by a probe run. They never
/// appear in the generated file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Normalized target host, optionally followed by `/path`
    pub target: String,

    /// Canonically rendered bypass marker (`// noCF` plus any trailing comment)
    #[serde(rename = "noCF", default, skip_serializing_if = "Option::is_none")]
    pub no_cf: Option<String>,

    /// Failure reason of the most recent HTTP probe, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,

    /// Failure reason of the most recent HTTPS probe, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,

    /// Set by a probe run: true when the entry was judged unreachable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
}

impl Entry {
    /// Create an entry with no bypass marker and no probe results
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Attach a bypass marker, rendering it canonically
    pub fn with_no_cf(mut self, comment: &str) -> Self {
        self.no_cf = Some(render_no_cf(comment));
        self
    }

    /// True once a probe run judged this entry unreachable
    pub fn is_failed(&self) -> bool {
        self.failed.unwrap_or(false)
    }

    /// Copy of this entry with probe results removed
    pub fn without_probe_results(&self) -> Self {
        Self {
            target: self.target.clone(),
            no_cf: self.no_cf.clone(),
            ..Self::default()
        }
    }
}

/// Render the bypass marker from the free text that follows the `nocf` token
///
/// `render_no_cf("")` is `// noCF`; `render_no_cf(" legacy host")` is
/// `// noCF legacy host`.
pub fn render_no_cf(comment: &str) -> String {
    format!("{NO_CF_MARKER}{comment}")
}

/// Map of subdomain → entry for one registry file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the previous entry for the key if any
    pub fn insert(&mut self, subdomain: impl Into<String>, entry: Entry) -> Option<Entry> {
        self.entries.insert(subdomain.into(), entry)
    }

    /// Look up an entry by subdomain
    pub fn get(&self, subdomain: &str) -> Option<&Entry> {
        self.entries.get(subdomain)
    }

    /// Remove an entry by subdomain
    pub fn remove(&mut self, subdomain: &str) -> Option<Entry> {
        self.entries.remove(subdomain)
    }

    /// Whether the registry holds the subdomain
    pub fn contains(&self, subdomain: &str) -> bool {
        self.entries.contains_key(subdomain)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in canonical (ascending key) order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    /// Subdomain keys in canonical order
    pub fn subdomains(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Copy of the registry with every key lowercased
    ///
    /// Keys that collide after lowercasing keep the entry that sorts last
    /// under its original spelling.
    pub fn lowercased(&self) -> Self {
        self.entries
            .iter()
            .map(|(key, entry)| (key.to_lowercase(), entry.clone()))
            .collect()
    }
}

impl FromIterator<(String, Entry)> for Registry {
    fn from_iter<I: IntoIterator<Item = (String, Entry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Registry {
    type Item = (String, Entry);
    type IntoIter = std::collections::btree_map::IntoIter<String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = (&'a String, &'a Entry);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_without_absent_fields() {
        let entry = Entry::new("foo.github.io");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({ "target": "foo.github.io" }));

        let marked = Entry::new("cname.vercel-dns.com").with_no_cf("");
        let json = serde_json::to_value(&marked).unwrap();
        assert_eq!(json["noCF"], "// noCF");
    }

    #[test]
    fn registry_iterates_in_code_point_order() {
        let mut registry = Registry::new();
        registry.insert("b", Entry::new("b.example.com"));
        registry.insert("a-b", Entry::new("ab.example.com"));
        registry.insert("a", Entry::new("a.example.com"));
        registry.insert("", Entry::new("apex.example.com"));

        let keys: Vec<&str> = registry.subdomains().map(String::as_str).collect();
        assert_eq!(keys, vec!["", "a", "a-b", "b"]);
    }

    #[test]
    fn lowercased_rekeys_entries() {
        let mut registry = Registry::new();
        registry.insert("Foo", Entry::new("foo.github.io"));

        let lowered = registry.lowercased();
        assert!(lowered.contains("foo"));
        assert!(!lowered.contains("Foo"));
    }

    #[test]
    fn probe_results_are_stripped() {
        let entry = Entry {
            target: "foo.github.io".to_string(),
            no_cf: None,
            http: Some("Failed due to time out after 5s".to_string()),
            https: None,
            failed: Some(false),
        };
        assert_eq!(entry.without_probe_results(), Entry::new("foo.github.io"));
    }
}
