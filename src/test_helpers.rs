//! Shared test utilities for the mkblog test suite.
//!
//! Provides temp-directory fixtures, catalog lookups and navigation tree
//! assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = write_tree(&[("index.md", "# Home"), ("_posts/hello.md", "# Hello")]);
//! let mut diag = Diagnostics::new();
//! let mut catalog = catalog::scan(tmp.path(), &[], true, &mut diag).unwrap();
//! let nav = nav::build(&mut catalog, None, &mut diag);
//!
//! assert_eq!(doc_paths(&catalog), vec!["index.md", "_posts/hello.md"]);
//! assert_nav_shape(&nav, &catalog, &[
//!     ("Home", &[]),
//!     ("Posts", &["Hello"]),
//! ]);
//! ```

use std::fs;
use tempfile::TempDir;

use crate::catalog::{Catalog, SourceFile};
use crate::config::Settings;
use crate::nav::{NavItem, Navigation};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(relative path, contents)` pairs into a fresh temp directory.
pub fn write_tree(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (path, contents) in files {
        let full = tmp.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, contents).unwrap();
    }
    tmp
}

/// A project directory with `files` under `docs/` and settings pointing at
/// `docs/` and `site/`.
pub fn project(files: &[(&str, &str)]) -> (TempDir, Settings) {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    for (path, contents) in files {
        let full = docs.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, contents).unwrap();
    }
    let settings = Settings {
        source_dir: docs,
        output_dir: tmp.path().join("site"),
        ..Settings::default()
    };
    (tmp, settings)
}

// =========================================================================
// Catalog lookups
// =========================================================================

/// Relative paths of every document, in catalog order.
pub fn doc_paths(catalog: &Catalog) -> Vec<&str> {
    catalog
        .documents()
        .map(|(_, f)| f.rel_path.as_str())
        .collect()
}

/// Find a file by relative path. Panics if not found.
pub fn find_file<'a>(catalog: &'a Catalog, rel_path: &str) -> &'a SourceFile {
    catalog
        .by_path(rel_path)
        .and_then(|id| catalog.get(id))
        .unwrap_or_else(|| {
            let paths: Vec<&str> = catalog.iter().map(|(_, f)| f.rel_path.as_str()).collect();
            panic!("file '{rel_path}' not found. Available: {paths:?}")
        })
}

// =========================================================================
// Navigation helpers
// =========================================================================

/// Top-level navigation titles in order.
pub fn nav_titles(nav: &Navigation, catalog: &Catalog) -> Vec<String> {
    nav.items()
        .iter()
        .map(|item| nav.item_title(item, catalog))
        .collect()
}

/// Child titles under a top-level nav item. Pages and links have none.
/// Panics if the parent is not found.
pub fn nav_children_titles(nav: &Navigation, catalog: &Catalog, parent_title: &str) -> Vec<String> {
    let item = nav
        .items()
        .iter()
        .find(|item| nav.item_title(item, catalog) == parent_title)
        .unwrap_or_else(|| {
            let titles = nav_titles(nav, catalog);
            panic!("nav item '{parent_title}' not found. Available: {titles:?}")
        });
    match item {
        NavItem::Section(id) => nav
            .section(*id)
            .map(|s| {
                s.children
                    .iter()
                    .map(|child| nav.item_title(child, catalog))
                    .collect()
            })
            .unwrap_or_default(),
        NavItem::Page { .. } | NavItem::Link { .. } => Vec::new(),
    }
}

/// Assert that the navigation tree matches an expected shape.
///
/// Each entry is `(title, children)`. Use `&[]` for pages and links.
///
/// ```rust
/// assert_nav_shape(&nav, &catalog, &[
///     ("Home", &[]),
///     ("Posts", &["Hello World", "Second Post"]),
/// ]);
/// ```
pub fn assert_nav_shape(nav: &Navigation, catalog: &Catalog, expected: &[(&str, &[&str])]) {
    let actual = nav_titles(nav, catalog);
    let expected_titles: Vec<&str> = expected.iter().map(|(t, _)| *t).collect();
    assert_eq!(actual, expected_titles, "nav top-level titles mismatch");

    for (title, children) in expected {
        let actual_children = nav_children_titles(nav, catalog, title);
        assert_eq!(
            actual_children,
            children.to_vec(),
            "nav children of '{title}' mismatch"
        );
    }
}
