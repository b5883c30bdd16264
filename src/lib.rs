//! # mkblog
//!
//! A static site generator for blogs and documentation. A directory of
//! markdown documents becomes a navigable website: directories become
//! sections, documents become pages, and everything else is copied as-is.
//!
//! # Architecture: One Pass, Five Stages
//!
//! Every build is a single sequential pass. Each stage takes ownership of the
//! previous stage's output and hands its own on; plugins may replace the value
//! at every boundary.
//!
//! ```text
//! 1. Catalog     docs/           →  Catalog      (files, kinds, destinations)
//! 2. Navigation  Catalog         →  Navigation   (sections, pages, prev/next)
//! 3. Populate    Catalog + Nav   →  Pages        (front-matter, titles, HTML bodies)
//! 4. Render      Pages + Nav     →  RenderedSite (bytes per output path)
//! 5. Write       RenderedSite    →  site/        (precedence-ordered, clean or dirty)
//! ```
//!
//! Population runs for every page before any page renders: a page shows its
//! neighbours' titles and links into other pages, and both are only settled
//! once every page has been read.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Stage 1: walks the source directory, classifies files, computes destinations |
//! | [`nav`] | Stage 2: inferred or explicit navigation tree and neighbour links |
//! | [`page`] | Stage 3: front-matter, title resolution, page population |
//! | [`links`] | Rewrites links between source documents to destination URLs |
//! | [`markdown`] | Markdown to HTML with a link-rewrite hook |
//! | [`render`] | Stage 4: the `RenderEnv` theme seam and the built-in Maud theme |
//! | [`writer`] | Stage 5: clean/dirty output, precedence order, output lock |
//! | [`plugins`] | Hook dispatch between stages (`config`, `pre_build`, `files`, `nav`, `env`, `post_build`) |
//! | [`pipeline`] | `Builder`: runs the stages in order, serializes builds, strict mode |
//! | [`watch`] | Rebuild on every source change |
//! | [`config`] | `mkblog.toml` loading, merging and validation |
//! | [`naming`] | Filename conventions: document extensions, index/readme, sort order |
//! | [`diagnostics`] | Warning collection for one build |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Indices, Not References
//!
//! Pages point at their neighbours and their section, and sections point at
//! their index page. All of those links are [`catalog::FileId`] and
//! [`nav::SectionId`] values rather than references, so the catalog and the
//! navigation tree can be built, replaced by plugins and cross-linked without
//! either owning the other.
//!
//! ## Warnings Never Stop a Build
//!
//! A dropped nav entry, malformed front-matter, a broken link or a page that
//! fails to render is a warning with the offending path. Strict mode turns
//! "any warning" into a failure, but only after every page has been
//! attempted, so one run shows every problem.
//!
//! ## Dirty Builds Are Best Effort
//!
//! A dirty build skips cleaning the output directory and leaves untouched
//! files whose content did not change. Pages whose neighbours changed are
//! re-rendered because the whole site is still rendered; pages whose source
//! was deleted are not removed. That is reported, not fixed.

pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod links;
pub mod markdown;
pub mod nav;
pub mod naming;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod plugins;
pub mod render;
pub mod watch;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;
