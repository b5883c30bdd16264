//! Relative link resolution.
//!
//! Authors link documents by their source paths (`../about.md#team`). Those
//! links are rewritten to the destination URL of the target, relative to the
//! linking page, so they survive both URL strategies. Anything that is not a
//! relative path (absolute URLs, `mailto:`, site-absolute `/paths`, pure
//! fragments) passes through untouched.

use crate::catalog::{Catalog, SourceFile};
use percent_encoding::percent_decode_str;

/// Outcome of resolving one link destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkResolution {
    /// Not a relative path; left alone.
    External,
    /// Target found in the catalog; use this URL instead.
    Rewritten(String),
    /// Relative path with no catalog entry (normalized source-relative path).
    Missing(String),
}

/// Resolve `dest` as written in `from`.
pub fn resolve_link(dest: &str, from: &SourceFile, catalog: &Catalog) -> LinkResolution {
    if is_external(dest) {
        return LinkResolution::External;
    }

    let (path, suffix) = match dest.find(['#', '?']) {
        Some(pos) => dest.split_at(pos),
        None => (dest, ""),
    };
    if path.is_empty() {
        return LinkResolution::External;
    }

    let path = percent_decode_str(path).decode_utf8_lossy();
    let Some(target) = join_relative(from.dir(), &path) else {
        return LinkResolution::Missing(path.into_owned());
    };

    match catalog.by_path(&target).and_then(|id| catalog.get(id)) {
        Some(file) => {
            LinkResolution::Rewritten(format!("{}{suffix}", relative_url(&from.url, &file.url)))
        }
        None => LinkResolution::Missing(target),
    }
}

/// True for destinations that are not source-relative paths.
pub fn is_external(dest: &str) -> bool {
    if dest.is_empty() || dest.starts_with('#') || dest.starts_with('/') {
        return true;
    }
    // A scheme is letters/digits/+-. before the first ':' with no '/' ahead of it.
    match dest.find(':') {
        Some(pos) => {
            let scheme = &dest[..pos];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Join a relative link onto a source directory, folding `.` and `..`.
///
/// Returns `None` when the link climbs above the source root.
fn join_relative(dir: &str, link: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in link.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// URL of `to` relative to the page at `from` (both site-relative).
///
/// A URL ending in `/` (or empty, the site root) is a directory; otherwise
/// the page's directory is its parent.
///
/// ```text
/// relative_url("_posts/hello/", "")          → "../../"
/// relative_url("a/x.html", "b.html")         → "../b.html"
/// relative_url("a/", "a/")                   → "./"
/// ```
pub fn relative_url(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = {
        let mut segments: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
        if !from.is_empty() && !from.ends_with('/') {
            segments.pop();
        }
        segments
    };
    let to_segments: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let to_is_dir = to.is_empty() || to.ends_with('/');

    let common = from_dir
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend(&to_segments[common..]);
    let mut url = parts.join("/");
    if url.is_empty() {
        return "./".to_string();
    }
    if to_is_dir {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FileSource, Origin};
    use std::path::PathBuf;

    fn catalog(paths: &[&str], use_directory_urls: bool) -> Catalog {
        let mut catalog = Catalog::new(use_directory_urls);
        for path in paths {
            let file = SourceFile::new(
                *path,
                Origin::User,
                FileSource::Disk(PathBuf::from(path)),
                use_directory_urls,
            );
            catalog.push(file).unwrap();
        }
        catalog
    }

    fn file<'a>(catalog: &'a Catalog, path: &str) -> &'a SourceFile {
        catalog.get(catalog.by_path(path).unwrap()).unwrap()
    }

    #[test]
    fn external_links_pass_through() {
        let catalog = catalog(&["a.md"], true);
        let from = file(&catalog, "a.md");
        for dest in [
            "https://example.com",
            "mailto:me@example.com",
            "#section",
            "/absolute/path",
            "//cdn.example.com/x.js",
        ] {
            assert_eq!(resolve_link(dest, from, &catalog), LinkResolution::External, "{dest}");
        }
    }

    #[test]
    fn sibling_document_rewritten_with_directory_urls() {
        let catalog = catalog(&["posts/a.md", "posts/b.md"], true);
        let from = file(&catalog, "posts/a.md");
        assert_eq!(
            resolve_link("b.md", from, &catalog),
            LinkResolution::Rewritten("../b/".into())
        );
    }

    #[test]
    fn sibling_document_rewritten_with_flat_urls() {
        let catalog = catalog(&["posts/a.md", "posts/b.md"], false);
        let from = file(&catalog, "posts/a.md");
        assert_eq!(
            resolve_link("b.md", from, &catalog),
            LinkResolution::Rewritten("b.html".into())
        );
    }

    #[test]
    fn percent_encoded_path_matches_source_name() {
        let catalog = catalog(&["a.md", "my post.md"], false);
        let from = file(&catalog, "a.md");
        assert_eq!(
            resolve_link("my%20post.md#intro", from, &catalog),
            LinkResolution::Rewritten("my post.html#intro".into())
        );
        assert_eq!(
            resolve_link("no%20such.md", from, &catalog),
            LinkResolution::Missing("no such.md".into())
        );
    }

    #[test]
    fn fragment_and_query_preserved() {
        let catalog = catalog(&["index.md", "about.md"], true);
        let from = file(&catalog, "index.md");
        assert_eq!(
            resolve_link("about.md#team", from, &catalog),
            LinkResolution::Rewritten("about/#team".into())
        );
        assert_eq!(
            resolve_link("./about.md?x=1", from, &catalog),
            LinkResolution::Rewritten("about/?x=1".into())
        );
    }

    #[test]
    fn parent_relative_link_to_index() {
        let catalog = catalog(&["index.md", "_posts/hello-world.md"], true);
        let from = file(&catalog, "_posts/hello-world.md");
        assert_eq!(
            resolve_link("../index.md", from, &catalog),
            LinkResolution::Rewritten("../../".into())
        );
    }

    #[test]
    fn static_asset_link_rewritten() {
        let catalog = catalog(&["posts/a.md", "img/logo.png"], true);
        let from = file(&catalog, "posts/a.md");
        assert_eq!(
            resolve_link("../img/logo.png", from, &catalog),
            LinkResolution::Rewritten("../../img/logo.png".into())
        );
    }

    #[test]
    fn missing_target_reported() {
        let catalog = catalog(&["a.md"], true);
        let from = file(&catalog, "a.md");
        assert_eq!(
            resolve_link("nope.md", from, &catalog),
            LinkResolution::Missing("nope.md".into())
        );
        assert_eq!(
            resolve_link("../../escape.md", from, &catalog),
            LinkResolution::Missing("../../escape.md".into())
        );
    }

    #[test]
    fn relative_url_cases() {
        assert_eq!(relative_url("_posts/hello/", ""), "../../");
        assert_eq!(relative_url("a/x.html", "b.html"), "../b.html");
        assert_eq!(relative_url("a/", "a/"), "./");
        assert_eq!(relative_url("", "a/b/"), "a/b/");
        assert_eq!(relative_url("", ""), "./");
        assert_eq!(relative_url("index.html", "css/theme.css"), "css/theme.css");
        assert_eq!(relative_url("a/b/", "a/c/"), "../c/");
    }

    #[test]
    fn scheme_detection() {
        assert!(is_external("ftp://x"));
        assert!(!is_external("notes/a:b.md"));
        assert!(!is_external("a.md"));
    }
}
