//! Site configuration module.
//!
//! Handles loading, merging, and validating `mkblog.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! `mkblog.toml` lives in the project root, next to the source directory:
//!
//! ```text
//! project/
//! ├── mkblog.toml        # Site config (optional)
//! ├── docs/              # source_dir
//! │   ├── index.md
//! │   └── _posts/
//! │       └── hello-world.md
//! └── site/              # output_dir (generated)
//! ```
//!
//! Relative `source_dir`, `output_dir` and `theme.custom_dir` values are
//! resolved against the directory that holds the config file.
//!
//! ## Configuration Options
//!
//! ```toml
//! site_name = "My Blog"
//! site_url = "https://example.com/"   # Used for absolute sitemap URLs
//! source_dir = "docs"
//! output_dir = "site"
//! use_directory_urls = true           # a/b.md → a/b/index.html
//! strict = false                      # Any warning fails the build
//! dev_addr = "127.0.0.1:8000"
//! plugins = []                        # Names of plugins to enable, in order
//! exclude = []                        # Extra glob patterns (leading / anchors to root)
//! extra_templates = []                # Source files rendered through the theme
//!
//! nav = [
//!     "index.md",
//!     { "About" = "about.md" },
//!     { "Posts" = ["_posts/hello-world.md"] },
//!     { "Source" = "https://github.com/example/blog" },
//! ]
//!
//! [theme]
//! static_templates = []               # Extra theme templates to render
//! custom_dir = "overrides"            # Extra theme assets on disk
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "mkblog.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Validated site settings.
///
/// The pipeline treats this as read-only once the `config` plugin hook has
/// run. Every field has a default, so an absent config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Site title shown in page headers.
    pub site_name: String,
    /// Public base URL; when set, the sitemap uses absolute URLs.
    pub site_url: Option<String>,
    /// Directory holding the source documents.
    pub source_dir: PathBuf,
    /// Directory the site is written to.
    pub output_dir: PathBuf,
    /// `a/b.md` → `a/b/index.html` when true, `a/b.html` when false.
    pub use_directory_urls: bool,
    /// Escalate any build warning into a failed build.
    pub strict: bool,
    /// Address for the development server (`host:port`).
    pub dev_addr: String,
    /// Explicit navigation. When absent, navigation mirrors the source tree.
    pub nav: Option<Vec<NavEntry>>,
    /// Plugins to enable, in dispatch order.
    pub plugins: Vec<String>,
    /// Extra exclusion globs on top of the built-in `.*` and `/templates`.
    pub exclude: Vec<String>,
    /// Source-relative files rendered through the theme instead of copied.
    pub extra_templates: Vec<String>,
    /// Theme settings.
    pub theme: ThemeConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_name: "My Blog".to_string(),
            site_url: None,
            source_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("site"),
            use_directory_urls: true,
            strict: false,
            dev_addr: "127.0.0.1:8000".to_string(),
            nav: None,
            plugins: Vec::new(),
            exclude: Vec::new(),
            extra_templates: Vec::new(),
            theme: ThemeConfig::default(),
        }
    }
}

/// Theme settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// Template names rendered once per build in addition to the theme's own.
    pub static_templates: Vec<String>,
    /// Directory of additional theme assets (non-`.html` files are copied).
    pub custom_dir: Option<PathBuf>,
}

/// One entry of an explicit navigation list.
///
/// ```toml
/// nav = [
///     "index.md",                          # page, title from the page
///     { "About" = "about.md" },            # page with a nav label
///     { "GitHub" = "https://github.com" }, # external link
///     { "Posts" = ["a.md", "b.md"] },      # section
/// ]
/// ```
///
/// A table entry should hold exactly one key; extra keys are processed in
/// key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavEntry {
    Path(String),
    Titled(BTreeMap<String, NavTarget>),
}

/// The value side of a titled navigation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavTarget {
    Path(String),
    Section(Vec<NavEntry>),
}

impl Settings {
    /// Validate settings before the build touches the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dev_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "dev_addr must be host:port, got '{}'",
                self.dev_addr
            )));
        }
        if self.source_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "source_dir must not be empty".into(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".into(),
            ));
        }
        let source = normalize(&self.source_dir);
        let output = normalize(&self.output_dir);
        if source == output {
            return Err(ConfigError::Validation(
                "output_dir must differ from source_dir".into(),
            ));
        }
        if output.starts_with(&source) {
            return Err(ConfigError::Validation(format!(
                "output_dir ({}) must not be inside source_dir ({})",
                self.output_dir.display(),
                self.source_dir.display()
            )));
        }
        if source.starts_with(&output) {
            return Err(ConfigError::Validation(format!(
                "source_dir ({}) must not be inside output_dir ({})",
                self.source_dir.display(),
                self.output_dir.display()
            )));
        }
        for pattern in &self.exclude {
            glob::Pattern::new(pattern.trim_start_matches('/')).map_err(|e| {
                ConfigError::Validation(format!("invalid exclude pattern '{pattern}': {e}"))
            })?;
        }
        for template in &self.extra_templates {
            let path = Path::new(template);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes || template.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "extra_templates entry '{template}' must be a relative path inside source_dir"
                )));
            }
        }
        Ok(())
    }

    /// Resolve relative directories against `base` (the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.source_dir.is_relative() {
            self.source_dir = base.join(&self.source_dir);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
        if let Some(dir) = self.theme.custom_dir.as_mut()
            && dir.is_relative()
        {
            *dir = base.join(&*dir);
        }
    }
}

/// Lexically normalize a path (drops `.` and folds `..`) without touching
/// the filesystem, so validation works before directories exist.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Settings::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults and deserialize.
///
/// Does not validate: callers apply CLI overrides first.
pub fn resolve_settings(overlay: Option<toml::Value>) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    Ok(merged.try_into()?)
}

/// Load settings from a config file path.
///
/// A missing file yields the stock defaults. Relative directories are
/// resolved against the file's parent directory. The result is not yet
/// validated.
pub fn load_settings(config_path: &Path) -> Result<Settings, ConfigError> {
    let overlay = load_raw_config(config_path)?;
    let mut settings = resolve_settings(overlay)?;
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    settings.resolve_paths(base);
    Ok(settings)
}

/// Returns a fully-commented stock `mkblog.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mkblog configuration
# ====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.

# Site title shown in page headers.
site_name = "My Blog"

# Public base URL. When set, sitemap.xml uses absolute URLs.
# site_url = "https://example.com/"

# Source documents and output directory, relative to this file.
source_dir = "docs"
output_dir = "site"

# true:  posts/hello.md -> posts/hello/index.html (URL posts/hello/)
# false: posts/hello.md -> posts/hello.html
use_directory_urls = true

# Fail the build if any warning was recorded.
strict = false

# Development server address for `mkblog watch`.
dev_addr = "127.0.0.1:8000"

# Plugins to enable, in dispatch order.
plugins = []

# Extra exclusion globs. `.*` and `/templates` are always excluded.
# A leading / anchors the pattern to the source root.
exclude = []

# Source files rendered through the theme instead of copied verbatim.
extra_templates = []

# Explicit navigation. Omit to mirror the source directory tree.
# nav = [
#     "index.md",
#     { "About" = "about.md" },
#     { "Posts" = ["_posts/hello-world.md"] },
#     { "Source" = "https://github.com/example/blog" },
# ]

# ---------------------------------------------------------------------------
# Theme
# ---------------------------------------------------------------------------
[theme]
# Template names rendered once per build, besides the theme's own
# (404.html, sitemap.xml).
static_templates = []

# Directory of extra theme assets (css, js, images). .html files are ignored.
# custom_dir = "overrides"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.source_dir, PathBuf::from("docs"));
        assert_eq!(settings.output_dir, PathBuf::from("site"));
        assert!(settings.use_directory_urls);
        assert!(!settings.strict);
        assert!(settings.nav.is_none());
        settings.validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let value: toml::Value = toml::from_str("strict = true\nsite_name = \"Notes\"").unwrap();
        let settings = resolve_settings(Some(value)).unwrap();
        assert!(settings.strict);
        assert_eq!(settings.site_name, "Notes");
        // Defaults preserved
        assert!(settings.use_directory_urls);
        assert_eq!(settings.dev_addr, "127.0.0.1:8000");
    }

    #[test]
    fn unknown_keys_rejected() {
        let value: toml::Value = toml::from_str("site_nmae = \"typo\"").unwrap();
        assert!(matches!(
            resolve_settings(Some(value)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn explicit_nav_entries_parse() {
        let value: toml::Value = toml::from_str(
            r#"
nav = [
    "index.md",
    { "About" = "about.md" },
    { "Posts" = ["_posts/a.md", { "B" = "_posts/b.md" }] },
]
"#,
        )
        .unwrap();
        let settings = resolve_settings(Some(value)).unwrap();
        let nav = settings.nav.unwrap();
        assert_eq!(nav.len(), 3);
        assert_eq!(nav[0], NavEntry::Path("index.md".into()));
        match &nav[1] {
            NavEntry::Titled(map) => {
                assert_eq!(map.get("About"), Some(&NavTarget::Path("about.md".into())));
            }
            other => panic!("expected titled entry, got {other:?}"),
        }
        match &nav[2] {
            NavEntry::Titled(map) => match map.get("Posts") {
                Some(NavTarget::Section(children)) => assert_eq!(children.len(), 2),
                other => panic!("expected section, got {other:?}"),
            },
            other => panic!("expected titled entry, got {other:?}"),
        }
    }

    #[test]
    fn merge_overrides_nested_tables() {
        let base: toml::Value = toml::from_str("[theme]\nstatic_templates = [\"a\"]").unwrap();
        let overlay: toml::Value =
            toml::from_str("[theme]\ncustom_dir = \"overrides\"").unwrap();
        let merged = merge_toml(base, overlay);
        let theme = merged.get("theme").unwrap();
        assert!(theme.get("static_templates").is_some());
        assert_eq!(
            theme.get("custom_dir").and_then(|v| v.as_str()),
            Some("overrides")
        );
    }

    #[test]
    fn bad_dev_addr_rejected() {
        let settings = Settings {
            dev_addr: "localhost".into(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn output_inside_source_rejected() {
        let settings = Settings {
            source_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("docs/./site"),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let same = Settings {
            source_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("./docs"),
            ..Settings::default()
        };
        assert!(same.validate().is_err());
    }

    #[test]
    fn source_inside_output_rejected() {
        let settings = Settings {
            source_dir: PathBuf::from("public/docs"),
            output_dir: PathBuf::from("public"),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("must not be inside output_dir"));

        let siblings = Settings {
            source_dir: PathBuf::from("public-docs"),
            output_dir: PathBuf::from("public"),
            ..Settings::default()
        };
        assert!(siblings.validate().is_ok());
    }

    #[test]
    fn sibling_output_accepted() {
        let settings = Settings {
            source_dir: PathBuf::from("docs"),
            output_dir: PathBuf::from("docs-site"),
            ..Settings::default()
        };
        settings.validate().unwrap();
    }

    #[test]
    fn invalid_exclude_pattern_rejected() {
        let settings = Settings {
            exclude: vec!["[".into()],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn escaping_extra_template_rejected() {
        let settings = Settings {
            extra_templates: vec!["../robots.txt".into()],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_settings_resolves_relative_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "source_dir = \"content\"\n").unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.source_dir, tmp.path().join("content"));
        assert_eq!(settings.output_dir, tmp.path().join("site"));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(settings.site_name, "My Blog");
        assert_eq!(settings.source_dir, tmp.path().join("docs"));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let settings = resolve_settings(Some(value)).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
