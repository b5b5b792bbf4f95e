// # Diff Validator
//
// Checks that a registry file is already in canonical form, and explains
// line by line where it is not.
//
// ## Flow
//
// 1. Parse the file and regenerate it against itself. A structural failure
//    in either step aborts with an error and no diff is attempted.
// 2. With `fix`, the canonical text is written back and no diff is taken.
// 3. Otherwise the original and canonical texts are diffed line by line.
//
// ## Line Numbers
//
// Every diagnostic is addressed to the file on disk: line numbers follow the
// original file, never the canonical one.

use similar::{Algorithm, DiffTag, capture_diff_slices};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::ci::CiContext;
use crate::error::{Error, Result};
use crate::registry::{ParseWarning, RegistryParser, generate};

/// One line-level difference between a file and its canonical form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A canonical line is absent from the file
    Missing {
        /// 1-based original line the expected line should follow (0 = top)
        after_line: usize,
        /// The canonical text
        expected: String,
    },

    /// A file line differs from the canonical line at the same position
    Mismatch {
        /// 1-based original line number
        line: usize,
        /// The canonical text
        expected: String,
        /// The text in the file
        found: String,
    },

    /// A file line has no counterpart in the canonical form
    Extra {
        /// 1-based original line number
        line: usize,
        /// The text in the file
        found: String,
    },
}

impl Diagnostic {
    /// The original line the diagnostic should be attached to
    pub fn line(&self) -> usize {
        match self {
            Diagnostic::Missing { after_line, .. } => *after_line,
            Diagnostic::Mismatch { line, .. } | Diagnostic::Extra { line, .. } => *line,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Missing {
                after_line,
                expected,
            } => write!(f, "Expected line after line {after_line}: `{expected}`"),
            Diagnostic::Mismatch {
                line,
                expected,
                found,
            } => write!(f, "Line {line}: expected `{expected}`, found `{found}`"),
            Diagnostic::Extra { line, found } => write!(f, "Line {line}: unexpected `{found}`"),
        }
    }
}

/// Outcome of validating one registry file
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// The canonical text of the file
    pub canonical: String,

    /// Line differences, in file order; empty when unchanged or fixed
    pub diagnostics: Vec<Diagnostic>,

    /// Lines the parser skipped or overrode
    pub warnings: Vec<ParseWarning>,

    /// Whether the file differs from its canonical form
    pub changed: bool,

    /// Whether the file was rewritten with the canonical text
    pub fixed: bool,
}

impl ValidationReport {
    /// True when the run should exit successfully
    pub fn passed(&self) -> bool {
        !self.changed || self.fixed
    }

    /// CI annotations for every diagnostic and warning, addressed to `file`
    pub fn annotations(&self, ci: &CiContext, file: &Path) -> Vec<String> {
        let warnings = self
            .warnings
            .iter()
            .filter_map(|w| ci.warning(file, w.line, &w.to_string()));
        let errors = self
            .diagnostics
            .iter()
            .filter_map(|d| ci.error(file, d.line(), &d.to_string()));
        warnings.chain(errors).collect()
    }
}

/// Validate registry file text for the default domain
pub fn validate_content(content: &str) -> Result<ValidationReport> {
    validate_with(&RegistryParser::default(), content)
}

/// Validate registry file text with a specific parser
#[instrument(skip_all, fields(bytes = content.len()))]
pub fn validate_with(parser: &RegistryParser, content: &str) -> Result<ValidationReport> {
    let parsed = parser.parse(content)?;
    let canonical = generate(&parsed.registry, content)?;

    let changed = canonical != content;
    let diagnostics = if changed {
        diff_lines(content, &canonical)
    } else {
        Vec::new()
    };

    debug!(
        "Validation found {} diagnostics ({} warnings)",
        diagnostics.len(),
        parsed.warnings.len()
    );

    Ok(ValidationReport {
        canonical,
        diagnostics,
        warnings: parsed.warnings,
        changed,
        fixed: false,
    })
}

/// Validate a registry file on disk for the default domain
pub async fn validate_file(path: impl AsRef<Path>, fix: bool) -> Result<ValidationReport> {
    validate_file_with(&RegistryParser::default(), path, fix).await
}

/// Validate a registry file on disk, optionally rewriting it in canonical form
#[instrument(skip(parser, path), fields(path = %path.as_ref().display()))]
pub async fn validate_file_with(
    parser: &RegistryParser,
    path: impl AsRef<Path>,
    fix: bool,
) -> Result<ValidationReport> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::invalid_input(format!("Failed to read {}: {}", path.display(), e))
    })?;

    if !fix {
        return validate_with(parser, &content);
    }

    let parsed = parser.parse(&content)?;
    let canonical = generate(&parsed.registry, &content)?;
    let changed = canonical != content;

    if changed {
        tokio::fs::write(path, &canonical).await?;
        info!("Rewrote {} in canonical form", path.display());
    }

    Ok(ValidationReport {
        canonical,
        diagnostics: Vec::new(),
        warnings: parsed.warnings,
        changed,
        fixed: changed,
    })
}

/// Classify the line differences between `original` and `canonical`
///
/// Adjacent deletions and insertions form one changed run. Within a run,
/// lines pair up as mismatches; leftover canonical lines are missing and
/// leftover original lines are extra.
pub fn diff_lines(original: &str, canonical: &str) -> Vec<Diagnostic> {
    let old: Vec<&str> = original.split('\n').collect();
    let new: Vec<&str> = canonical.split('\n').collect();

    let mut diagnostics = Vec::new();
    let mut run: Option<(Range<usize>, Range<usize>)> = None;

    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            if let Some((o, n)) = run.take() {
                classify_run(&old, &new, o, n, &mut diagnostics);
            }
            continue;
        }

        run = Some(match run {
            Some((o, n)) => (
                o.start.min(old_range.start)..o.end.max(old_range.end),
                n.start.min(new_range.start)..n.end.max(new_range.end),
            ),
            None => (old_range, new_range),
        });
    }

    if let Some((o, n)) = run {
        classify_run(&old, &new, o, n, &mut diagnostics);
    }

    diagnostics
}

fn classify_run(
    old: &[&str],
    new: &[&str],
    old_range: Range<usize>,
    new_range: Range<usize>,
    out: &mut Vec<Diagnostic>,
) {
    let paired = old_range.len().min(new_range.len());

    for i in 0..paired {
        out.push(Diagnostic::Mismatch {
            line: old_range.start + i + 1,
            expected: new[new_range.start + i].to_string(),
            found: old[old_range.start + i].to_string(),
        });
    }

    for &expected in &new[new_range.start + paired..new_range.end] {
        out.push(Diagnostic::Missing {
            after_line: old_range.start + paired,
            expected: expected.to_string(),
        });
    }

    for (i, &found) in old[old_range.start + paired..old_range.end].iter().enumerate() {
        out.push(Diagnostic::Extra {
            line: old_range.start + paired + i + 1,
            found: found.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "/**\n * Header\n */\n\nvar cnames_active = {\n  \"\": \"js-org.github.io\",\n  \"a.b\": \"baz.com\", // noCF\n  \"foo\": \"bar.github.io\"\n  /*\n   * Footer\n   */\n}\n";

    #[test]
    fn test_canonical_file_passes() {
        let report = validate_content(CANONICAL).unwrap();
        assert!(report.passed());
        assert!(!report.changed);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.canonical, CANONICAL);
    }

    #[test]
    fn test_swapped_lines_are_mismatches() {
        let content = CANONICAL.replace(
            "  \"a.b\": \"baz.com\", // noCF\n  \"foo\": \"bar.github.io\"\n",
            "  \"foo\": \"bar.github.io\",\n  \"a.b\": \"baz.com\" // noCF\n",
        );
        let report = validate_content(&content).unwrap();
        assert!(!report.passed());
        assert_eq!(
            report.diagnostics,
            vec![
                Diagnostic::Mismatch {
                    line: 7,
                    expected: "  \"a.b\": \"baz.com\", // noCF".to_string(),
                    found: "  \"foo\": \"bar.github.io\",".to_string(),
                },
                Diagnostic::Mismatch {
                    line: 8,
                    expected: "  \"foo\": \"bar.github.io\"".to_string(),
                    found: "  \"a.b\": \"baz.com\" // noCF".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_line_reports_preceding_line() {
        let content = CANONICAL.replace(" */\n\nvar", " */\nvar");
        let report = validate_content(&content).unwrap();
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::Missing {
                after_line: 3,
                expected: String::new(),
            }]
        );
    }

    #[test]
    fn test_extra_line_reports_its_own_line() {
        let content = CANONICAL.replace("{\n  \"\":", "{\n\n  \"\":");
        let report = validate_content(&content).unwrap();
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::Extra {
                line: 6,
                found: String::new(),
            }]
        );
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].line, 6);
    }

    #[test]
    fn test_structural_failure_is_an_error() {
        let err = validate_content("/* a */\n/* b */\n").unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_annotations_only_in_ci() {
        let content = CANONICAL.replace("{\n  \"\":", "{\n\n  \"\":");
        let report = validate_content(&content).unwrap();
        let file = Path::new("/ws/cnames_active.js");

        assert!(report.annotations(&CiContext::None, file).is_empty());

        let ci = CiContext::from_vars(Some("true"), Some("/ws"));
        let annotations = report.annotations(&ci, file);
        assert_eq!(annotations.len(), 2);
        assert!(annotations[0].starts_with("::warning file=cnames_active.js,line=6::"));
        assert_eq!(
            annotations[1],
            "::error file=cnames_active.js,line=6::Line 6: unexpected ``"
        );
    }

    #[tokio::test]
    async fn test_fix_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cnames_active.js");
        let messy = CANONICAL.replace("\"foo\": \"bar.github.io\"", "'FOO': 'https://bar.github.io/'");
        tokio::fs::write(&path, &messy).await.unwrap();

        let report = validate_file(&path, false).await.unwrap();
        assert!(!report.passed());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), messy);

        let report = validate_file(&path, true).await.unwrap();
        assert!(report.passed());
        assert!(report.fixed);
        assert!(report.diagnostics.is_empty());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), CANONICAL);

        let report = validate_file(&path, false).await.unwrap();
        assert!(report.passed());
        assert!(!report.changed);
    }
}
