//! Centralized filename conventions.
//!
//! Every stage agrees on what a document is, which documents stand for their
//! directory (`index`, `readme`), how siblings sort, and how a filename turns
//! into a human title. Keeping these rules here stops the catalog, the
//! navigation builder and page population from drifting apart.
//!
//! ## Display Titles
//!
//! Separators (`-`, `_`) become spaces and each word is capitalized:
//! - `hello-world.md` → "Hello World"
//! - `release_notes.md` → "Release Notes"
//! - `_posts/` → "Posts"

use std::cmp::Ordering;

/// Extensions that mark a file as a renderable document.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkdn", "mkd"];

/// Split `name` into `(stem, extension)` at the last dot.
///
/// Dotfiles without a further dot (`.gitignore`) have no extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(pos) => (&name[..pos], Some(&name[pos + 1..])),
    }
}

/// True if the filename carries a document extension (case-insensitive).
pub fn is_document_name(name: &str) -> bool {
    split_extension(name)
        .1
        .map(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|d| d.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// True for a document named `index` (any case).
pub fn is_index_name(name: &str) -> bool {
    is_document_name(name) && split_extension(name).0.eq_ignore_ascii_case("index")
}

/// True for a document named `readme` (any case).
pub fn is_readme_name(name: &str) -> bool {
    is_document_name(name) && split_extension(name).0.eq_ignore_ascii_case("readme")
}

/// True if the document stands for its directory (`index` or `readme`).
pub fn is_directory_page_name(name: &str) -> bool {
    is_index_name(name) || is_readme_name(name)
}

/// Sort order for filenames within one directory.
///
/// `index`/`readme` documents first, then case-insensitive name, then the
/// case-sensitive name as a tiebreaker so `A.md` and `a.md` sort adjacently
/// and deterministically.
pub fn compare_file_names(a: &str, b: &str) -> Ordering {
    let rank = |n: &str| if is_directory_page_name(n) { 0 } else { 1 };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

/// Turn a file or directory name into a display title.
///
/// Separators become spaces, runs of whitespace collapse, and each word gets
/// an uppercase first letter. The rest of each word is left alone so
/// acronyms survive (`api-FAQ` → "Api FAQ").
pub fn display_title(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
