//! Warning accumulation for a single build.
//!
//! Recoverable problems (a dropped nav entry, malformed front-matter, a
//! broken link, a page that failed to render) never abort the build. They are
//! logged at WARN level and counted here, so the pipeline can report the total
//! at the end and strict mode can turn "warnings present" into a failure after
//! every page has been attempted.

use std::fmt;
use tracing::warn;

/// One recorded warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Source-relative path of the offending file, when there is one.
    pub path: Option<String>,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Warning sink threaded through every stage of a build.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning tied to a source-relative path.
    pub fn warn_at(&mut self, path: &str, message: impl fmt::Display) {
        let message = message.to_string();
        warn!(path = %path, "{message}");
        self.warnings.push(Warning {
            path: Some(path.to_string()),
            message,
        });
    }

    /// Record a warning that is not tied to a single file.
    pub fn warn(&mut self, message: impl fmt::Display) {
        let message = message.to_string();
        warn!("{message}");
        self.warnings.push(Warning {
            path: None,
            message,
        });
    }

    pub fn count(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_warning() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_empty());
        diag.warn_at("a.md", "broken link");
        diag.warn("stale files");
        assert_eq!(diag.count(), 2);
        assert_eq!(diag.warnings()[0].path.as_deref(), Some("a.md"));
        assert_eq!(diag.warnings()[1].path, None);
    }

    #[test]
    fn display_includes_path() {
        let w = Warning {
            path: Some("posts/a.md".into()),
            message: "oops".into(),
        };
        assert_eq!(w.to_string(), "posts/a.md: oops");
    }
}
