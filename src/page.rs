//! Pages and page population.
//!
//! A [`Page`] is created for every document when the navigation builder
//! places it, with only a filename-derived title. Population fills in the
//! rest: front-matter, the resolved title and the converted body with
//! rewritten links. Population of every page completes before any page is
//! rendered, because a rendered page shows its neighbours' titles and links.
//!
//! ## Front-matter
//!
//! An optional YAML mapping between `---` fences at the very top:
//!
//! ```markdown
//! ---
//! title: Hello, world
//! template: post.html
//! tags: [intro]
//! ---
//! # Heading
//! ```
//!
//! Malformed front-matter is a warning; the page then has no metadata.
//!
//! ## Title resolution
//!
//! First non-empty value wins:
//!
//! - `title` in front-matter
//! - first level-1 heading in the content
//! - filename, separators → spaces, title-cased (`index`/`readme` use the
//!   directory name, or "Home" at the root)

use crate::catalog::{Catalog, FileId, SourceFile};
use crate::diagnostics::Diagnostics;
use crate::links::{self, LinkResolution};
use crate::markdown;
use crate::nav::SectionId;
use crate::naming;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Front-matter key/value pairs.
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("malformed front-matter: {0}")]
    Parse(String),
    #[error("front-matter must be a mapping of keys to values")]
    NotAMapping,
}

/// Where a page is in its two-phase lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageState {
    /// Placed by the navigation builder; content not yet read.
    #[default]
    Placed,
    /// Content read and converted.
    Populated,
    /// Content could not be read; the page is skipped at render time.
    Failed,
}

/// The renderable unit for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub title: String,
    /// File contents including front-matter.
    pub raw_content: String,
    /// Markdown after front-matter removal.
    pub content: String,
    /// HTML produced by the markdown stage.
    pub rendered_body: String,
    pub metadata: Metadata,
    pub previous: Option<FileId>,
    pub next: Option<FileId>,
    pub parent: Option<SectionId>,
    pub in_nav: bool,
    pub state: PageState,
}

impl Page {
    /// A freshly placed page with its filename title.
    pub fn new(rel_path: &str) -> Self {
        Self {
            title: fallback_title(rel_path),
            ..Self::default()
        }
    }

    /// Template named in front-matter, or `main.html`.
    pub fn template(&self) -> &str {
        self.metadata
            .get("template")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("main.html")
    }
}

/// Filename-derived title for a source-relative document path.
pub fn fallback_title(rel_path: &str) -> String {
    let (dir, name) = rel_path.rsplit_once('/').unwrap_or(("", rel_path));
    if naming::is_directory_page_name(name) {
        return match dir.rsplit('/').next().filter(|d| !d.is_empty()) {
            Some(dir_name) => naming::display_title(dir_name),
            None => "Home".to_string(),
        };
    }
    naming::display_title(naming::split_extension(name).0)
}

/// Split `---` fenced front-matter from the document body.
///
/// Returns `(None, raw)` when the document does not open with a fence or the
/// fence is never closed.
pub fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let raw_no_bom = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(rest) = raw_no_bom
        .strip_prefix("---\n")
        .or_else(|| raw_no_bom.strip_prefix("---\r\n"))
    else {
        return (None, raw);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, raw)
}

/// Parse front-matter YAML into metadata.
pub fn parse_metadata(yaml: &str) -> Result<Metadata, MetadataError> {
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| MetadataError::Parse(e.to_string()))?;
    match value {
        serde_yaml::Value::Mapping(_) => {
            serde_yaml::from_value(value).map_err(|e| MetadataError::Parse(e.to_string()))
        }
        serde_yaml::Value::Null => Ok(Metadata::new()),
        _ => Err(MetadataError::NotAMapping),
    }
}

/// Resolve a page's title from its metadata, content and filename.
pub fn resolve_title(metadata: &Metadata, content: &str, rel_path: &str) -> String {
    metadata
        .get("title")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .or_else(|| markdown::first_heading(content))
        .unwrap_or_else(|| fallback_title(rel_path))
}

/// Populate one page: read, parse front-matter, resolve the title and
/// convert the body with catalog-aware link rewriting.
///
/// Recoverable problems are recorded in `diag`; the page is always returned.
pub fn populate(
    mut page: Page,
    file: &SourceFile,
    catalog: &Catalog,
    diag: &mut Diagnostics,
) -> Page {
    debug!(path = %file.rel_path, "reading page");
    let raw = match file.read_to_string() {
        Ok(raw) => raw,
        Err(e) => {
            diag.warn_at(&file.rel_path, format!("cannot read document: {e}"));
            page.state = PageState::Failed;
            return page;
        }
    };

    let (front_matter, body) = split_front_matter(&raw);
    let metadata = match front_matter.map(parse_metadata).transpose() {
        Ok(meta) => meta.unwrap_or_default(),
        Err(e) => {
            diag.warn_at(&file.rel_path, e);
            Metadata::new()
        }
    };

    let title = resolve_title(&metadata, body, &file.rel_path);
    let rendered_body = markdown::to_html(body, |dest| {
        match links::resolve_link(dest, file, catalog) {
            LinkResolution::External => None,
            LinkResolution::Rewritten(url) => Some(url),
            LinkResolution::Missing(target) => {
                diag.warn_at(
                    &file.rel_path,
                    format!("link '{dest}' points to '{target}', which is not in the source directory"),
                );
                None
            }
        }
    });

    page.content = body.to_string();
    page.raw_content = raw;
    page.metadata = metadata;
    page.title = title;
    page.rendered_body = rendered_body;
    page.state = PageState::Populated;
    page
}

/// Populate every document page in catalog order.
pub fn populate_all(catalog: &mut Catalog, diag: &mut Diagnostics) {
    let ids: Vec<FileId> = catalog.documents().map(|(id, _)| id).collect();
    for id in ids {
        let Some(page) = catalog.take_page(id) else {
            continue;
        };
        let populated = match catalog.get(id) {
            Some(file) => populate(page, file, catalog, diag),
            None => continue,
        };
        catalog.put_page(id, populated);
    }
}
