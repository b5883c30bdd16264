//! Source tree scanning and the file catalog.
//!
//! Stage 1 of the build. Walks the source directory, prunes excluded paths,
//! classifies every entry and computes where it lands in the output tree.
//! The resulting [`Catalog`] owns every [`SourceFile`] (and, once the
//! navigation builder has run, every [`Page`]) for one build.
//!
//! ## Directory Structure
//!
//! ```text
//! docs/                          # source_dir
//! ├── index.md                   # Home page      → index.html
//! ├── about.md                   # Document       → about/index.html
//! ├── _posts/
//! │   ├── README.md              # Suppressed: index.md exists here
//! │   ├── index.md               # Section page   → _posts/index.html
//! │   └── hello-world.md         # Document       → _posts/hello-world/index.html
//! ├── img/logo.png               # Static asset   → img/logo.png
//! ├── templates/                 # Reserved, never scanned
//! └── .drafts/                   # Hidden, never scanned
//! ```
//!
//! ## Walk Order
//!
//! Depth-first, following symlinks. Within a directory, files come before
//! subdirectories; files sort `index`/`readme` first, then case-insensitively,
//! then case-sensitively; subdirectories sort by name. The order is the
//! catalog order, and the inferred navigation mirrors it.
//!
//! ## Exclusions
//!
//! `.*` and `/templates` are always excluded; settings may add more globs.
//! Patterns with a leading `/` match the source-relative path only; other
//! patterns match either the bare name or the relative path. Excluded
//! directories are pruned, so nothing beneath them is ever visited.

use crate::diagnostics::Diagnostics;
use crate::naming;
use crate::page::Page;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Exclusions applied to every scan.
pub const DEFAULT_EXCLUDES: &[&str] = &[".*", "/templates"];

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Source directory not found: {0}")]
    NotFound(PathBuf),
    #[error("Source path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Source directory {path} is not readable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Index of a file within its [`Catalog`].
///
/// Pages and navigation refer to each other through these instead of
/// references, so neither owns the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

impl FileId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Renderable content (markdown).
    Document,
    /// Copied verbatim.
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Theme,
}

/// Where a file's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Disk(PathBuf),
    /// Compiled into the binary (default theme assets).
    Embedded(&'static [u8]),
}

/// A static file contributed by the theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeAsset {
    pub rel_path: String,
    pub source: FileSource,
}

/// One discovered file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// POSIX-style path relative to the source root (or theme root).
    pub rel_path: String,
    pub kind: FileKind,
    pub origin: Origin,
    pub source: FileSource,
    /// POSIX-style path relative to the output directory.
    pub dest_path: String,
    /// Site-relative URL (`""` is the site root).
    pub url: String,
    /// Present for documents once the navigation builder has placed them.
    pub page: Option<Page>,
}

impl SourceFile {
    pub fn new(
        rel_path: impl Into<String>,
        origin: Origin,
        source: FileSource,
        use_directory_urls: bool,
    ) -> Self {
        let rel_path = rel_path.into();
        let name = rel_path.rsplit('/').next().unwrap_or(&rel_path);
        let kind = if origin == Origin::User && naming::is_document_name(name) {
            FileKind::Document
        } else {
            FileKind::Static
        };
        let (dest_path, url) = destination_for(&rel_path, kind, use_directory_urls);
        Self {
            rel_path,
            kind,
            origin,
            source,
            dest_path,
            url,
            page: None,
        }
    }

    pub fn is_document(&self) -> bool {
        self.kind == FileKind::Document
    }

    /// Absolute path of the source, if the file lives on disk.
    pub fn abs_path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Disk(path) => Some(path),
            FileSource::Embedded(_) => None,
        }
    }

    /// File name component of the relative path.
    pub fn name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    /// Directory part of the relative path (`""` at the root).
    pub fn dir(&self) -> &str {
        self.rel_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    /// Read the full contents as text.
    pub fn read_to_string(&self) -> io::Result<String> {
        match &self.source {
            FileSource::Disk(path) => fs::read_to_string(path),
            FileSource::Embedded(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Compute `(dest_path, url)` for a source-relative path.
///
/// - Documents named `index`/`readme` map to their directory's `index.html`.
/// - With directory URLs, `a/b.md` maps to `a/b/index.html` at `a/b/`.
/// - Without, `a/b.md` maps to `a/b.html` at `a/b.html`.
/// - Static files keep their path.
pub fn destination_for(rel_path: &str, kind: FileKind, use_directory_urls: bool) -> (String, String) {
    if kind == FileKind::Static {
        return (rel_path.to_string(), rel_path.to_string());
    }
    let (dir, name) = rel_path.rsplit_once('/').unwrap_or(("", rel_path));
    let stem = naming::split_extension(name).0;
    let join = |parts: &[&str]| {
        parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    };

    if naming::is_directory_page_name(name) {
        let dest = join(&[dir, "index.html"]);
        let url = if use_directory_urls {
            if dir.is_empty() {
                String::new()
            } else {
                format!("{dir}/")
            }
        } else {
            dest.clone()
        };
        (dest, url)
    } else if use_directory_urls {
        (join(&[dir, stem, "index.html"]), format!("{}/", join(&[dir, stem])))
    } else {
        let file_name = format!("{stem}.html");
        let dest = join(&[dir, file_name.as_str()]);
        (dest.clone(), dest)
    }
}

/// The ordered, deduplicated set of files for one build.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    files: Vec<SourceFile>,
    by_path: HashMap<String, FileId>,
    by_dest: HashMap<String, FileId>,
    use_directory_urls: bool,
}

impl Catalog {
    pub fn new(use_directory_urls: bool) -> Self {
        Self {
            use_directory_urls,
            ..Self::default()
        }
    }

    pub fn use_directory_urls(&self) -> bool {
        self.use_directory_urls
    }

    /// Append a file. Rejects (and hands back) a file whose relative path is
    /// already taken, or whose destination is taken by a document or by a
    /// file that is not itself a document.
    ///
    /// A document claiming a static file's destination replaces that file.
    pub fn push(&mut self, file: SourceFile) -> Result<FileId, Box<SourceFile>> {
        if self.by_path.contains_key(&file.rel_path) {
            return Err(Box::new(file));
        }
        if let Some(held) = self.by_destination(&file.dest_path) {
            let held_is_document = self.get(held).is_some_and(SourceFile::is_document);
            if held_is_document || !file.is_document() {
                return Err(Box::new(file));
            }
            let shadowed = self.files.remove(held.0);
            debug!(
                page = %file.rel_path,
                shadowed = %shadowed.rel_path,
                "page replaces static file with the same destination"
            );
            self.reindex();
        }
        let id = FileId(self.files.len());
        self.by_path.insert(file.rel_path.clone(), id);
        self.by_dest.insert(file.dest_path.clone(), id);
        self.files.push(file);
        Ok(id)
    }

    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }

    pub fn get_mut(&mut self, id: FileId) -> Option<&mut SourceFile> {
        self.files.get_mut(id.0)
    }

    /// Look up by source-relative path.
    pub fn by_path(&self, rel_path: &str) -> Option<FileId> {
        self.by_path.get(rel_path).copied()
    }

    /// Look up by output-relative destination path.
    pub fn by_destination(&self, dest_path: &str) -> Option<FileId> {
        self.by_dest.get(dest_path).copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.files.iter().enumerate().map(|(i, f)| (FileId(i), f))
    }

    /// Documents, in catalog order.
    pub fn documents(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.iter().filter(|(_, f)| f.is_document())
    }

    /// User static assets, in catalog order.
    pub fn static_files(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.iter()
            .filter(|(_, f)| !f.is_document() && f.origin == Origin::User)
    }

    /// Theme-provided assets, in catalog order.
    pub fn theme_files(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.iter().filter(|(_, f)| f.origin == Origin::Theme)
    }

    pub fn page(&self, id: FileId) -> Option<&Page> {
        self.get(id).and_then(|f| f.page.as_ref())
    }

    pub fn page_mut(&mut self, id: FileId) -> Option<&mut Page> {
        self.get_mut(id).and_then(|f| f.page.as_mut())
    }

    /// Move a page out of the catalog, leaving the file in place.
    pub fn take_page(&mut self, id: FileId) -> Option<Page> {
        self.get_mut(id).and_then(|f| f.page.take())
    }

    /// Put a page (back) on a document.
    pub fn put_page(&mut self, id: FileId, page: Page) {
        if let Some(file) = self.get_mut(id)
            && file.is_document()
        {
            file.page = Some(page);
        }
    }

    /// Give every document without a page a freshly placed one.
    pub fn ensure_pages(&mut self) {
        for file in self.files.iter_mut().filter(|f| f.is_document()) {
            if file.page.is_none() {
                file.page = Some(Page::new(&file.rel_path));
            }
        }
    }

    /// Keep only the files matching `keep`. File ids are reassigned.
    pub fn retain(&mut self, mut keep: impl FnMut(&SourceFile) -> bool) {
        self.files.retain(|f| keep(f));
        self.reindex();
    }

    /// Recompute every destination for a different URL strategy.
    pub fn set_directory_urls(&mut self, use_directory_urls: bool) {
        self.use_directory_urls = use_directory_urls;
        for file in &mut self.files {
            let (dest, url) = destination_for(&file.rel_path, file.kind, use_directory_urls);
            file.dest_path = dest;
            file.url = url;
        }
        self.reindex();
    }

    /// Add theme assets whose path no user file already claims.
    pub fn add_theme_files(&mut self, assets: Vec<ThemeAsset>) {
        for asset in assets {
            let file = SourceFile::new(
                asset.rel_path,
                Origin::Theme,
                asset.source,
                self.use_directory_urls,
            );
            if let Err(skipped) = self.push(file) {
                debug!(path = %skipped.rel_path, "theme file shadowed by user file");
            }
        }
    }

    fn reindex(&mut self) {
        self.by_path.clear();
        self.by_dest.clear();
        for (i, file) in self.files.iter().enumerate() {
            self.by_path.insert(file.rel_path.clone(), FileId(i));
            self.by_dest.entry(file.dest_path.clone()).or_insert(FileId(i));
        }
    }
}

// ============================================================================
// Exclusions
// ============================================================================

struct ExcludePattern {
    pattern: glob::Pattern,
    anchored: bool,
}

struct Exclusions(Vec<ExcludePattern>);

impl Exclusions {
    fn new(extra: &[String]) -> Result<Self, CatalogError> {
        let raw = DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(extra.iter().cloned());
        let mut patterns = Vec::new();
        for pattern in raw {
            let anchored = pattern.starts_with('/');
            let compiled = glob::Pattern::new(pattern.trim_start_matches('/'))
                .map_err(|source| CatalogError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            patterns.push(ExcludePattern {
                pattern: compiled,
                anchored,
            });
        }
        Ok(Self(patterns))
    }

    fn is_excluded(&self, name: &str, rel_path: &str) -> bool {
        self.0.iter().any(|p| {
            p.pattern.matches(rel_path) || (!p.anchored && p.pattern.matches(name))
        })
    }
}

// ============================================================================
// Scanning
// ============================================================================

/// Walk `source_dir` and build the catalog.
///
/// Fails only if the root itself is missing or unreadable. Unreadable
/// subdirectories and collisions between two documents become warnings; a
/// page always takes its destination from a static file.
pub fn scan(
    source_dir: &Path,
    exclude: &[String],
    use_directory_urls: bool,
    diag: &mut Diagnostics,
) -> Result<Catalog, CatalogError> {
    check_root(source_dir)?;
    let exclusions = Exclusions::new(exclude)?;
    let mut catalog = Catalog::new(use_directory_urls);
    let mut index_dirs: HashMap<PathBuf, bool> = HashMap::new();

    let walker = WalkDir::new(source_dir)
        .follow_links(true)
        .sort_by(compare_entries)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || {
                let rel = relative_posix(e.path(), source_dir);
                !exclusions.is_excluded(&entry_name(e), &rel)
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| relative_posix(p, source_dir))
                    .unwrap_or_default();
                diag.warn_at(&path, format!("skipping unreadable entry: {err}"));
                continue;
            }
        };
        if entry.depth() == 0 || !entry.file_type().is_file() {
            continue;
        }

        let name = entry_name(&entry);
        let rel_path = relative_posix(entry.path(), source_dir);

        if naming::is_readme_name(&name)
            && let Some(parent) = entry.path().parent()
            && dir_has_index(parent, &mut index_dirs)
        {
            debug!(path = %rel_path, "readme suppressed by index in the same directory");
            continue;
        }

        let file = SourceFile::new(
            rel_path,
            Origin::User,
            FileSource::Disk(entry.path().to_path_buf()),
            use_directory_urls,
        );
        if let Err(rejected) = catalog.push(file) {
            if rejected.is_document() {
                diag.warn_at(
                    &rejected.rel_path,
                    format!(
                        "destination '{}' is already produced by another file; skipping",
                        rejected.dest_path
                    ),
                );
            } else {
                debug!(
                    path = %rejected.rel_path,
                    dest = %rejected.dest_path,
                    "static file shadowed by a page"
                );
            }
        }
    }

    debug!(files = catalog.len(), "scan complete");
    Ok(catalog)
}

/// Collect on-disk theme assets from a custom theme directory.
///
/// Hidden entries and `.html` templates are skipped; templates belong to
/// the render environment, not the output tree.
pub fn scan_theme_dir(dir: &Path, diag: &mut Diagnostics) -> Vec<ThemeAsset> {
    let mut assets = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by(compare_entries)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !entry_name(e).starts_with('.'));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                diag.warn(format!("skipping unreadable theme entry: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(&entry);
        if naming::split_extension(&name)
            .1
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
        {
            continue;
        }
        assets.push(ThemeAsset {
            rel_path: relative_posix(entry.path(), dir),
            source: FileSource::Disk(entry.path().to_path_buf()),
        });
    }
    assets
}

fn check_root(source_dir: &Path) -> Result<(), CatalogError> {
    let meta = match fs::metadata(source_dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CatalogError::NotFound(source_dir.to_path_buf()));
        }
        Err(source) => {
            return Err(CatalogError::Unreadable {
                path: source_dir.to_path_buf(),
                source,
            });
        }
    };
    if !meta.is_dir() {
        return Err(CatalogError::NotADirectory(source_dir.to_path_buf()));
    }
    fs::read_dir(source_dir).map_err(|source| CatalogError::Unreadable {
        path: source_dir.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Files before directories; files by the shared filename order,
/// directories by name.
fn compare_entries(a: &DirEntry, b: &DirEntry) -> std::cmp::Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    a_dir.cmp(&b_dir).then_with(|| {
        let (a_name, b_name) = (entry_name(a), entry_name(b));
        if a_dir {
            a_name.cmp(&b_name)
        } else {
            naming::compare_file_names(&a_name, &b_name)
        }
    })
}

fn entry_name(entry: &DirEntry) -> String {
    entry.file_name().to_string_lossy().into_owned()
}

/// Whether the directory's raw listing holds an `index` document.
fn dir_has_index(dir: &Path, cache: &mut HashMap<PathBuf, bool>) -> bool {
    *cache.entry(dir.to_path_buf()).or_insert_with(|| {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .any(|e| naming::is_index_name(&e.file_name().to_string_lossy()))
            })
            .unwrap_or(false)
    })
}

/// `path` relative to `root`, `/`-separated.
fn relative_posix(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
