//! Navigation builder.
//!
//! Stage 2 of the build. Derives the site structure from the catalog, either
//! mirroring the source directories or following an explicit `nav` list from
//! the settings. The tree never owns pages: it holds [`FileId`]s into the
//! catalog, and sections refer to their parent by [`SectionId`].
//!
//! ## Inferred Navigation
//!
//! ```text
//! docs/                        Navigation
//! ├── index.md                 ├── Home              (page)
//! ├── about.md                 ├── About             (page)
//! └── _posts/                  └── Posts             (section, index: _posts/index.md)
//!     ├── index.md                 ├── Hello World   (page)
//!     ├── hello-world.md           └── Second Post   (page)
//!     └── second-post.md
//! ```
//!
//! Sections follow directories, pages follow catalog order. An
//! `index`/`readme` document inside a directory becomes the section's own
//! page instead of a child; the one at the root stays an ordinary page.
//!
//! ## Neighbour Links
//!
//! After the tree is built, one in-order walk (section index page first,
//! then children) assigns `previous`/`next`/`parent` and `in_nav` on every
//! page. Pages outside the tree keep `in_nav = false` and no neighbours.

use crate::catalog::{Catalog, FileId};
use crate::config::{NavEntry, NavTarget};
use crate::diagnostics::Diagnostics;
use crate::links;
use crate::naming;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NavigationError {
    #[error("nav entry '{0}' is not in the source directory; dropped")]
    MissingPage(String),
    #[error("nav entry '{0}' appears more than once; later entries dropped")]
    DuplicatePage(String),
    #[error("nav entry '{0}' is not a document; dropped")]
    NotADocument(String),
}

/// Index of a section within its [`Navigation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(usize);

impl SectionId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavItem {
    Section(SectionId),
    /// A page, with an optional label overriding the page title.
    Page { file: FileId, title: Option<String> },
    /// An external link.
    Link { title: String, url: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// Explicit label (explicit navigation only).
    pub title: Option<String>,
    /// Directory name (inferred navigation only).
    pub dir_name: Option<String>,
    /// Document representing the section itself.
    pub index: Option<FileId>,
    pub children: Vec<NavItem>,
    pub parent: Option<SectionId>,
}

/// The navigation tree. Sections live in an arena and are linked by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    items: Vec<NavItem>,
    sections: Vec<Section>,
}

impl Navigation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level items in order.
    pub fn items(&self) -> &[NavItem] {
        &self.items
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    pub fn sections(&self) -> impl Iterator<Item = (SectionId, &Section)> {
        self.sections.iter().enumerate().map(|(i, s)| (SectionId(i), s))
    }

    /// Append an item at the top level or under `parent`.
    pub fn push_item(&mut self, parent: Option<SectionId>, item: NavItem) {
        match parent.and_then(|id| self.sections.get_mut(id.0)) {
            Some(section) => section.children.push(item),
            None => self.items.push(item),
        }
    }

    /// Create an empty section and attach it under `parent`.
    pub fn add_section(
        &mut self,
        parent: Option<SectionId>,
        title: Option<String>,
        dir_name: Option<String>,
    ) -> SectionId {
        let id = SectionId(self.sections.len());
        self.sections.push(Section {
            title,
            dir_name,
            parent,
            ..Section::default()
        });
        self.push_item(parent, NavItem::Section(id));
        id
    }

    fn set_section_index(&mut self, id: SectionId, file: FileId) {
        if let Some(section) = self.sections.get_mut(id.0) {
            section.index = Some(file);
        }
    }

    /// Every page in the tree, in navigation order, with its enclosing
    /// section. A page listed twice is only reported the first time.
    pub fn pages_with_parents(&self) -> Vec<(FileId, Option<SectionId>)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.walk_items(&self.items, None, &mut out, &mut seen);
        out
    }

    /// Every page in the tree, in navigation order.
    pub fn pages_in_order(&self) -> Vec<FileId> {
        self.pages_with_parents()
            .into_iter()
            .map(|(file, _)| file)
            .collect()
    }

    fn walk_items(
        &self,
        items: &[NavItem],
        parent: Option<SectionId>,
        out: &mut Vec<(FileId, Option<SectionId>)>,
        seen: &mut HashSet<FileId>,
    ) {
        for item in items {
            match item {
                NavItem::Page { file, .. } => {
                    if seen.insert(*file) {
                        out.push((*file, parent));
                    }
                }
                NavItem::Section(id) => {
                    let Some(section) = self.section(*id) else {
                        continue;
                    };
                    if let Some(index) = section.index
                        && seen.insert(index)
                    {
                        out.push((index, Some(*id)));
                    }
                    self.walk_items(&section.children, Some(*id), out, seen);
                }
                NavItem::Link { .. } => {}
            }
        }
    }

    /// Display title of a section: explicit label, then its index page's
    /// title, then the title-cased directory name.
    pub fn section_title(&self, id: SectionId, catalog: &Catalog) -> String {
        let Some(section) = self.section(id) else {
            return String::new();
        };
        if let Some(title) = &section.title {
            return title.clone();
        }
        if let Some(page) = section.index.and_then(|file| catalog.page(file)) {
            return page.title.clone();
        }
        section
            .dir_name
            .as_deref()
            .map(naming::display_title)
            .unwrap_or_default()
    }

    /// Display title of any item.
    pub fn item_title(&self, item: &NavItem, catalog: &Catalog) -> String {
        match item {
            NavItem::Section(id) => self.section_title(*id, catalog),
            NavItem::Page { file, title } => title
                .clone()
                .or_else(|| catalog.page(*file).map(|p| p.title.clone()))
                .unwrap_or_default(),
            NavItem::Link { title, .. } => title.clone(),
        }
    }

    /// Set `in_nav`, `previous`, `next` and `parent` on every page from one
    /// in-order walk. Pages outside the tree are reset.
    pub fn assign_page_links(&self, catalog: &mut Catalog) {
        let ids: Vec<FileId> = catalog.documents().map(|(id, _)| id).collect();
        for id in ids {
            if let Some(page) = catalog.page_mut(id) {
                page.in_nav = false;
                page.previous = None;
                page.next = None;
                page.parent = None;
            }
        }

        let ordered = self.pages_with_parents();
        for (i, (file, parent)) in ordered.iter().enumerate() {
            let previous = i.checked_sub(1).map(|p| ordered[p].0);
            let next = ordered.get(i + 1).map(|(f, _)| *f);
            if let Some(page) = catalog.page_mut(*file) {
                page.in_nav = true;
                page.previous = previous;
                page.next = next;
                page.parent = *parent;
            }
        }
    }
}

/// Build the navigation for a catalog.
///
/// Places a [`Page`](crate::page::Page) on every document that lacks one,
/// builds the tree (explicit when `explicit` is given, inferred otherwise)
/// and runs the neighbour post-pass. Dropped explicit entries are warnings.
pub fn build(
    catalog: &mut Catalog,
    explicit: Option<&[NavEntry]>,
    diag: &mut Diagnostics,
) -> Navigation {
    catalog.ensure_pages();
    let nav = match explicit {
        Some(entries) => {
            let mut builder = ExplicitBuilder {
                catalog: &*catalog,
                nav: Navigation::new(),
                seen: HashSet::new(),
                diag,
            };
            builder.entries(entries, None);
            builder.nav
        }
        None => infer(catalog),
    };
    nav.assign_page_links(catalog);
    debug!(pages = nav.pages_in_order().len(), "navigation built");
    nav
}

// ============================================================================
// Inferred navigation
// ============================================================================

fn infer(catalog: &Catalog) -> Navigation {
    let mut nav = Navigation::new();
    let mut sections: HashMap<String, SectionId> = HashMap::new();

    for (id, file) in catalog.documents() {
        let dir = file.dir();
        let parent = section_for_dir(&mut nav, &mut sections, dir);
        match parent {
            Some(section) if naming::is_directory_page_name(file.name()) => {
                nav.set_section_index(section, id);
            }
            _ => nav.push_item(
                parent,
                NavItem::Page {
                    file: id,
                    title: None,
                },
            ),
        }
    }
    nav
}

/// Section for a source directory, creating it and its ancestors on first
/// use. The root directory has no section.
fn section_for_dir(
    nav: &mut Navigation,
    sections: &mut HashMap<String, SectionId>,
    dir: &str,
) -> Option<SectionId> {
    if dir.is_empty() {
        return None;
    }
    if let Some(id) = sections.get(dir) {
        return Some(*id);
    }
    let (parent_dir, name) = dir.rsplit_once('/').unwrap_or(("", dir));
    let parent = section_for_dir(nav, sections, parent_dir);
    let id = nav.add_section(parent, None, Some(name.to_string()));
    sections.insert(dir.to_string(), id);
    Some(id)
}

// ============================================================================
// Explicit navigation
// ============================================================================

struct ExplicitBuilder<'a> {
    catalog: &'a Catalog,
    nav: Navigation,
    seen: HashSet<FileId>,
    diag: &'a mut Diagnostics,
}

impl ExplicitBuilder<'_> {
    fn entries(&mut self, entries: &[NavEntry], parent: Option<SectionId>) {
        for entry in entries {
            match entry {
                NavEntry::Path(path) => self.target(None, path, parent),
                NavEntry::Titled(map) => {
                    for (title, target) in map {
                        match target {
                            NavTarget::Path(path) => self.target(Some(title.clone()), path, parent),
                            NavTarget::Section(children) => {
                                let id = self.nav.add_section(parent, Some(title.clone()), None);
                                self.entries(children, Some(id));
                            }
                        }
                    }
                }
            }
        }
    }

    fn target(&mut self, title: Option<String>, path: &str, parent: Option<SectionId>) {
        if is_link(path) {
            self.nav.push_item(
                parent,
                NavItem::Link {
                    title: title.unwrap_or_else(|| path.to_string()),
                    url: path.to_string(),
                },
            );
            return;
        }

        let rel = normalize_nav_path(path);
        let error = match self.catalog.by_path(&rel) {
            None => NavigationError::MissingPage(rel.clone()),
            Some(id) if !self.catalog.get(id).is_some_and(|f| f.is_document()) => {
                NavigationError::NotADocument(rel.clone())
            }
            Some(id) if !self.seen.insert(id) => NavigationError::DuplicatePage(rel.clone()),
            Some(id) => {
                self.nav.push_item(parent, NavItem::Page { file: id, title });
                return;
            }
        };
        self.diag.warn_at(&rel, error);
    }
}

fn is_link(path: &str) -> bool {
    !path.starts_with('/') && !path.starts_with('#') && links::is_external(path)
}

/// Source-relative form of a nav path (`./a.md` and `/a.md` mean `a.md`).
fn normalize_nav_path(path: &str) -> String {
    path.trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}
