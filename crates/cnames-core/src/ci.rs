//! CI environment detection and structured annotations
//!
//! Under GitHub Actions, diagnostics are additionally printed as workflow
//! commands so they show up inline on the pull request diff:
//!
//! ```text
//! ::error file=cnames_active.js,line=12::Line 12: expected ..., found ...
//! ::warning file=cnames_active.js,line=40::Line 40: Unparseable line ...
//! ```

use std::path::{Component, Path, PathBuf};

/// The CI environment the process is running under
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CiContext {
    /// GitHub Actions, with the checkout root
    GitHub {
        /// `GITHUB_WORKSPACE`
        workspace: PathBuf,
    },

    /// Not running under a recognized CI
    #[default]
    None,
}

impl CiContext {
    /// Detect the CI environment from the process environment
    pub fn detect() -> Self {
        Self::from_vars(
            std::env::var("GITHUB_ACTIONS").ok().as_deref(),
            std::env::var("GITHUB_WORKSPACE").ok().as_deref(),
        )
    }

    /// Detect the CI environment from explicit variable values
    pub fn from_vars(github_actions: Option<&str>, github_workspace: Option<&str>) -> Self {
        match (github_actions, github_workspace) {
            (Some("true"), Some(workspace)) if !workspace.is_empty() => CiContext::GitHub {
                workspace: PathBuf::from(workspace),
            },
            (Some("true"), _) => CiContext::GitHub {
                workspace: PathBuf::new(),
            },
            _ => CiContext::None,
        }
    }

    /// True when annotations should be emitted
    pub fn is_ci(&self) -> bool {
        !matches!(self, CiContext::None)
    }

    /// Path of `file` relative to the CI workspace root, with `/` separators
    pub fn relative_path(&self, file: &Path) -> String {
        let relative = match self {
            CiContext::GitHub { workspace } if !workspace.as_os_str().is_empty() => {
                let absolute = if file.is_absolute() {
                    file.to_path_buf()
                } else {
                    std::env::current_dir()
                        .map(|cwd| cwd.join(file))
                        .unwrap_or_else(|_| file.to_path_buf())
                };
                absolute
                    .strip_prefix(workspace)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| file.to_path_buf())
            }
            _ => file.to_path_buf(),
        };

        // RootDir renders as "/" on its own; add it back once
        let mut rooted = false;
        let mut prefixed = false;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::RootDir => rooted = true,
                Component::Prefix(_) => {
                    prefixed = true;
                    parts.push(component.as_os_str().to_string_lossy().into_owned());
                }
                other => parts.push(other.as_os_str().to_string_lossy().into_owned()),
            }
        }

        let joined = parts.join("/");
        if rooted && !prefixed {
            format!("/{joined}")
        } else {
            joined
        }
    }

    /// Render an error annotation, or `None` outside CI
    pub fn error(&self, file: &Path, line: usize, message: &str) -> Option<String> {
        self.annotation("error", file, line, message)
    }

    /// Render a warning annotation, or `None` outside CI
    pub fn warning(&self, file: &Path, line: usize, message: &str) -> Option<String> {
        self.annotation("warning", file, line, message)
    }

    fn annotation(&self, level: &str, file: &Path, line: usize, message: &str) -> Option<String> {
        match self {
            CiContext::GitHub { .. } => Some(format!(
                "::{level} file={},line={}::{}",
                escape_property(&self.relative_path(file)),
                line.max(1),
                escape_data(message)
            )),
            CiContext::None => None,
        }
    }
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}
