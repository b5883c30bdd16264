//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output leads with what a reader of the site sees (page titles in
//! navigation order), with source paths shown as indented `Source:` context
//! lines so every entry can be traced back to a file.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Navigation
//! 001 Home → index.html
//!     Source: index.md
//! 002 Posts
//!     001 Hello World → _posts/hello-world/index.html
//!         Source: _posts/hello-world.md
//! 003 GitHub → https://github.com/example (link)
//!
//! Not in navigation
//!     Drafts → drafts/index.html
//!         Source: drafts.md
//!
//! Static files
//!     img/logo.png
//!     css/theme.css (theme)
//!
//! Warnings
//!     missing.md: nav entry 'missing.md' is not in the source directory; dropped
//! ```
//!
//! ## Build
//!
//! ```text
//! Built 2 pages, 3 static files → site
//! Wrote 5 files, 0 up to date
//! Finished in 0.04s
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::catalog::{Catalog, Origin};
use crate::diagnostics::Warning;
use crate::nav::{NavItem, Navigation};
use crate::pipeline::{BuildReport, SiteCheck};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `n noun` with a naive plural.
fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn warning_lines(warnings: &[Warning], lines: &mut Vec<String>) {
    if warnings.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push("Warnings".to_string());
    for warning in warnings {
        lines.push(format!("    {warning}"));
    }
}

// ============================================================================
// Tree walker
// ============================================================================

fn walk_nav(
    items: &[NavItem],
    depth: usize,
    nav: &Navigation,
    catalog: &Catalog,
    lines: &mut Vec<String>,
) {
    for (i, item) in items.iter().enumerate() {
        let base = indent(depth);
        let header = format!("{} {}", format_index(i + 1), nav.item_title(item, catalog));
        match item {
            NavItem::Page { file, .. } => match catalog.get(*file) {
                Some(f) => {
                    lines.push(format!("{base}{header} → {}", f.dest_path));
                    lines.push(format!("{base}    Source: {}", f.rel_path));
                }
                None => lines.push(format!("{base}{header}")),
            },
            NavItem::Link { url, .. } => lines.push(format!("{base}{header} → {url} (link)")),
            NavItem::Section(id) => {
                let Some(section) = nav.section(*id) else {
                    continue;
                };
                match section.index.and_then(|f| catalog.get(f)) {
                    Some(f) => {
                        lines.push(format!("{base}{header} → {}", f.dest_path));
                        lines.push(format!("{base}    Source: {}", f.rel_path));
                    }
                    None => lines.push(format!("{base}{header}")),
                }
                walk_nav(&section.children, depth + 1, nav, catalog, lines);
            }
        }
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format `check` output: navigation tree, pages outside it, static files
/// and warnings.
pub fn format_check_output(check: &SiteCheck) -> Vec<String> {
    let SiteCheck {
        catalog,
        nav,
        warnings,
    } = check;
    let mut lines = vec!["Navigation".to_string()];
    walk_nav(nav.items(), 0, nav, catalog, &mut lines);

    let hidden: Vec<_> = catalog
        .documents()
        .filter(|(_, f)| f.page.as_ref().is_some_and(|p| !p.in_nav))
        .collect();
    if !hidden.is_empty() {
        lines.push(String::new());
        lines.push("Not in navigation".to_string());
        for (_, file) in hidden {
            let title = file.page.as_ref().map(|p| p.title.as_str()).unwrap_or("");
            lines.push(format!("    {title} → {}", file.dest_path));
            lines.push(format!("        Source: {}", file.rel_path));
        }
    }

    let statics: Vec<_> = catalog.iter().filter(|(_, f)| !f.is_document()).collect();
    if !statics.is_empty() {
        lines.push(String::new());
        lines.push("Static files".to_string());
        for (_, file) in statics {
            let marker = if file.origin == Origin::Theme { " (theme)" } else { "" };
            lines.push(format!("    {}{marker}", file.dest_path));
        }
    }

    warning_lines(warnings, &mut lines);
    lines
}

/// Print check output to stdout.
pub fn print_check_output(check: &SiteCheck) {
    for line in format_check_output(check) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format the end-of-build summary.
pub fn format_build_summary(report: &BuildReport, output_dir: &Path) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Built {}, {} → {}",
            count(report.pages, "page"),
            count(report.static_files, "static file"),
            output_dir.display()
        ),
        format!(
            "Wrote {}, {} up to date",
            count(report.write.written, "file"),
            report.write.skipped
        ),
    ];
    if report.write.stale > 0 {
        lines.push(format!(
            "{} left from earlier builds",
            count(report.write.stale, "stale file")
        ));
    }
    warning_lines(&report.warnings, &mut lines);
    if !report.warnings.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Finished in {:.2}s with {}",
        report.elapsed.as_secs_f64(),
        count(report.warnings.len(), "warning")
    ));
    lines
}

/// Print the build summary to stdout.
pub fn print_build_summary(report: &BuildReport, output_dir: &Path) {
    for line in format_build_summary(report, output_dir) {
        println!("{}", line);
    }
}
