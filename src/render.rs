//! Render stage.
//!
//! Turns populated pages into output bytes through a [`RenderEnv`], the
//! theme's opaque renderer: given a template name and a [`RenderContext`] it
//! produces bytes. The pipeline never looks inside. [`DefaultTheme`] is the
//! built-in environment, written with [maud](https://maud.lambda.xyz/).
//!
//! Rendering only starts once every page is populated, because each page
//! shows the whole navigation tree and its neighbours' titles.
//!
//! ## Outputs
//!
//! | Kind             | Source                                   | Destination        |
//! |------------------|------------------------------------------|--------------------|
//! | Theme templates  | `static_templates()` + `theme.static_templates` | template name |
//! | Extra templates  | `extra_templates` files, via `render_source` | file's path    |
//! | Pages            | front-matter `template` (default `main.html`) | page destination |
//!
//! A failure on any single output is a warning naming that output; the rest
//! of the site still renders.

use crate::catalog::{Catalog, FileId, FileSource, SourceFile, ThemeAsset};
use crate::config::Settings;
use crate::diagnostics::Diagnostics;
use crate::links::relative_url;
use crate::nav::{NavItem, Navigation};
use crate::page::{Page, PageState};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use thiserror::Error;
use tracing::debug;

const THEME_CSS: &str = include_str!("../static/theme.css");

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error("cannot read template source: {0}")]
    Read(#[from] std::io::Error),
    #[error("page was never populated")]
    NotPopulated,
    #[error("render failed: {0}")]
    Failed(String),
}

/// Everything a template can see while rendering one output.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub settings: &'a Settings,
    pub catalog: &'a Catalog,
    pub nav: &'a Navigation,
    /// The page being rendered, if this output is a page.
    pub page: Option<FileId>,
    /// Site-relative URL of this output.
    pub url: &'a str,
}

impl<'a> RenderContext<'a> {
    /// Context for the site as a whole (no page, site root URL).
    pub fn new(settings: &'a Settings, catalog: &'a Catalog, nav: &'a Navigation) -> Self {
        Self {
            settings,
            catalog,
            nav,
            page: None,
            url: "",
        }
    }

    /// The same site context, positioned at one output.
    pub fn at<'b>(&self, page: Option<FileId>, url: &'b str) -> RenderContext<'b>
    where
        'a: 'b,
    {
        RenderContext {
            settings: self.settings,
            catalog: self.catalog,
            nav: self.nav,
            page,
            url,
        }
    }

    /// The file and page being rendered.
    pub fn page(&self) -> Option<(&'a SourceFile, &'a Page)> {
        let id = self.page?;
        let file = self.catalog.get(id)?;
        Some((file, file.page.as_ref()?))
    }

    /// Relative URL of the site root from this output.
    pub fn base_url(&self) -> String {
        relative_url(self.url, "")
    }

    /// Relative URL of a site-relative `target` from this output.
    pub fn url_to(&self, target: &str) -> String {
        relative_url(self.url, target)
    }
}

/// An opaque theme renderer.
///
/// Plugins can wrap or replace the environment in the `env` hook.
pub trait RenderEnv {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Render a named template.
    fn render_template(&self, name: &str, ctx: &RenderContext<'_>) -> Result<Vec<u8>, RenderError>;

    /// Render a user-supplied template source (`extra_templates`).
    fn render_source(&self, source: &str, ctx: &RenderContext<'_>) -> Result<Vec<u8>, RenderError>;

    /// Templates rendered once per build (e.g. `404.html`).
    fn static_templates(&self) -> Vec<String> {
        Vec::new()
    }

    /// Static files the theme contributes to the output tree.
    fn static_assets(&self) -> Vec<ThemeAsset> {
        Vec::new()
    }
}

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    /// Output-relative destination.
    pub dest_path: String,
    pub bytes: Vec<u8>,
}

/// All rendered outputs of a build, grouped by write precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedSite {
    pub theme_templates: Vec<RenderedOutput>,
    pub extra_templates: Vec<RenderedOutput>,
    pub pages: Vec<RenderedOutput>,
}

/// Render every theme template, extra template and page.
pub fn render_site(
    env: &dyn RenderEnv,
    catalog: &Catalog,
    nav: &Navigation,
    settings: &Settings,
    diag: &mut Diagnostics,
) -> RenderedSite {
    let ctx = RenderContext::new(settings, catalog, nav);
    let mut site = RenderedSite::default();

    let mut names = env.static_templates();
    for name in &settings.theme.static_templates {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    for name in names {
        let rendered = env.render_template(&name, &ctx.at(None, &name));
        match rendered {
            Ok(bytes) => site.theme_templates.push(RenderedOutput {
                dest_path: name,
                bytes,
            }),
            Err(e) => diag.warn_at(&name, e),
        }
    }

    for rel_path in &settings.extra_templates {
        let rel_path = rel_path.trim_start_matches("./");
        let Some(file) = catalog.by_path(rel_path).and_then(|id| catalog.get(id)) else {
            diag.warn_at(rel_path, "extra template not found in the source directory");
            continue;
        };
        let rendered = file
            .read_to_string()
            .map_err(RenderError::from)
            .and_then(|source| env.render_source(&source, &ctx.at(None, &file.rel_path)));
        match rendered {
            Ok(bytes) => site.extra_templates.push(RenderedOutput {
                dest_path: file.rel_path.clone(),
                bytes,
            }),
            Err(e) => diag.warn_at(rel_path, e),
        }
    }

    for (id, file) in catalog.documents() {
        let Some(page) = &file.page else {
            continue;
        };
        let rendered = match page.state {
            // Already reported during population.
            PageState::Failed => continue,
            PageState::Placed => Err(RenderError::NotPopulated),
            PageState::Populated => env.render_template(page.template(), &ctx.at(Some(id), &file.url)),
        };
        match rendered {
            Ok(bytes) => site.pages.push(RenderedOutput {
                dest_path: file.dest_path.clone(),
                bytes,
            }),
            Err(e) => diag.warn_at(&file.rel_path, e),
        }
    }

    debug!(
        env = env.name(),
        pages = site.pages.len(),
        templates = site.theme_templates.len() + site.extra_templates.len(),
        "render complete"
    );
    site
}

// ============================================================================
// Default theme
// ============================================================================

/// Built-in theme: a sidebar navigation layout with one stylesheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTheme;

impl RenderEnv for DefaultTheme {
    fn name(&self) -> &str {
        "default"
    }

    fn render_template(&self, name: &str, ctx: &RenderContext<'_>) -> Result<Vec<u8>, RenderError> {
        let markup = match name {
            "main.html" => {
                let (file, page) = ctx.page().ok_or(RenderError::NotPopulated)?;
                render_page(file, page, ctx)
            }
            "404.html" => render_not_found(ctx),
            "sitemap.xml" => render_sitemap(ctx),
            other => return Err(RenderError::UnknownTemplate(other.to_string())),
        };
        Ok(markup.into_string().into_bytes())
    }

    fn render_source(&self, source: &str, ctx: &RenderContext<'_>) -> Result<Vec<u8>, RenderError> {
        let site_url = ctx.settings.site_url.as_deref().unwrap_or("");
        let out = source
            .replace("{{ site_name }}", &ctx.settings.site_name)
            .replace("{{ site_url }}", site_url)
            .replace("{{ base_url }}", &ctx.base_url());
        Ok(out.into_bytes())
    }

    fn static_templates(&self) -> Vec<String> {
        vec!["404.html".to_string(), "sitemap.xml".to_string()]
    }

    fn static_assets(&self) -> Vec<ThemeAsset> {
        vec![ThemeAsset {
            rel_path: "css/theme.css".to_string(),
            source: FileSource::Embedded(THEME_CSS.as_bytes()),
        }]
    }
}

/// Renders the base HTML document structure
fn base_document(title: &str, ctx: &RenderContext<'_>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href=(ctx.url_to("css/theme.css"));
            }
            body {
                (render_nav(ctx))
                main {
                    (content)
                }
            }
        }
    }
}

/// Renders the sidebar navigation tree
pub fn render_nav(ctx: &RenderContext<'_>) -> Markup {
    html! {
        nav.site-nav {
            a.site-name href=(ctx.base_url()) { (ctx.settings.site_name) }
            ul {
                @for item in ctx.nav.items() {
                    (render_nav_item(item, ctx))
                }
            }
        }
    }
}

fn render_nav_item(item: &NavItem, ctx: &RenderContext<'_>) -> Markup {
    let title = ctx.nav.item_title(item, ctx.catalog);
    match item {
        NavItem::Page { file, .. } => {
            let is_current = ctx.page == Some(*file);
            let url = ctx.catalog.get(*file).map(|f| f.url.as_str()).unwrap_or("");
            html! {
                li class=[is_current.then_some("current")] {
                    a href=(ctx.url_to(url)) { (title) }
                }
            }
        }
        NavItem::Link { url, .. } => html! {
            li { a href=(url) { (title) } }
        },
        NavItem::Section(id) => {
            let Some(section) = ctx.nav.section(*id) else {
                return html! {};
            };
            let index_url = section
                .index
                .and_then(|f| ctx.catalog.get(f))
                .map(|f| ctx.url_to(&f.url));
            let is_current = section.index.is_some() && ctx.page == section.index;
            html! {
                li class=[is_current.then_some("current")] {
                    @if let Some(href) = index_url {
                        a.nav-section href=(href) { (title) }
                    } @else {
                        span.nav-section { (title) }
                    }
                    ul {
                        @for child in &section.children {
                            (render_nav_item(child, ctx))
                        }
                    }
                }
            }
        }
    }
}

fn render_page(file: &SourceFile, page: &Page, ctx: &RenderContext<'_>) -> Markup {
    let neighbour = |id: Option<FileId>| {
        let file = ctx.catalog.get(id?)?;
        let page = file.page.as_ref()?;
        Some((ctx.url_to(&file.url), page.title.clone()))
    };
    let previous = neighbour(page.previous);
    let next = neighbour(page.next);
    let title = if page.title == ctx.settings.site_name {
        page.title.clone()
    } else {
        format!("{} - {}", page.title, ctx.settings.site_name)
    };

    let content = html! {
        article data-source=(file.rel_path) {
            (PreEscaped(&page.rendered_body))
        }
        @if previous.is_some() || next.is_some() {
            footer.page-links {
                @if let Some((url, title)) = &previous {
                    a.previous href=(url) rel="prev" { "← " (title) }
                } @else {
                    span {}
                }
                @if let Some((url, title)) = &next {
                    a.next href=(url) rel="next" { (title) " →" }
                }
            }
        }
    };
    base_document(&title, ctx, content)
}

fn render_not_found(ctx: &RenderContext<'_>) -> Markup {
    let content = html! {
        h1 { "Page not found" }
        p { "The page you were looking for does not exist." }
    };
    base_document(&format!("404 - {}", ctx.settings.site_name), ctx, content)
}

fn render_sitemap(ctx: &RenderContext<'_>) -> Markup {
    let base = ctx
        .settings
        .site_url
        .as_deref()
        .map(|u| format!("{}/", u.trim_end_matches('/')));
    let urls: Vec<String> = ctx
        .catalog
        .documents()
        .filter(|(_, f)| f.page.as_ref().is_some_and(|p| p.state == PageState::Populated))
        .map(|(_, f)| match &base {
            Some(base) => format!("{base}{}", f.url),
            None => f.url.clone(),
        })
        .collect();
    html! {
        (PreEscaped(r#"<?xml version="1.0" encoding="UTF-8"?>"#))
        urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" {
            @for url in &urls {
                url { loc { (url) } }
            }
        }
    }
}
