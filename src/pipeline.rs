//! The build pipeline.
//!
//! One build runs every stage in a fixed order, with plugin hooks between
//! stages:
//!
//! ```text
//! config hook → validate → pre_build hook
//!   → scan source + theme files → files hook
//!   → navigation → nav hook → neighbour links
//!   → populate every page → env hook
//!   → render → write → post_build hook
//!   → strict check
//! ```
//!
//! Each stage takes the previous stage's value and hands the next one on;
//! hooks may replace any of them. Population finishes for every page before
//! any page renders.
//!
//! [`Builder`] serializes builds: a second call to [`Builder::build`] while
//! one is running waits for it, and the writer's directory lock extends the
//! same guarantee across processes.

use crate::catalog::{self, Catalog, CatalogError};
use crate::config::{ConfigError, Settings};
use crate::diagnostics::{Diagnostics, Warning};
use crate::nav::{self, Navigation};
use crate::page;
use crate::plugins::{HookContext, Plugin, PluginError, PluginRegistry};
use crate::render::{self, DefaultTheme, RenderEnv};
use crate::writer::{self, WriteError, WriteMode, WriteSummary};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("exited with {count} warning(s) in strict mode")]
    Strict { count: usize },
}

/// Per-invocation build options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub mode: WriteMode,
    /// Set when a watcher or server drives the build; skips the
    /// "building site to" notice.
    pub live_server: bool,
}

impl BuildOptions {
    pub fn dirty() -> Self {
        Self {
            mode: WriteMode::Dirty,
            ..Self::default()
        }
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Pages rendered.
    pub pages: usize,
    /// Static files (user and theme) in the catalog.
    pub static_files: usize,
    pub warnings: Vec<Warning>,
    pub write: WriteSummary,
    pub elapsed: Duration,
}

/// Result of [`Builder::check`].
#[derive(Debug, Clone)]
pub struct SiteCheck {
    pub catalog: Catalog,
    pub nav: Navigation,
    pub warnings: Vec<Warning>,
}

/// Produces a fresh render environment for each build.
pub type ThemeFactory = dyn Fn() -> Box<dyn RenderEnv> + Send + Sync;

/// Runs builds for one set of settings.
pub struct Builder {
    settings: Settings,
    plugins: Vec<Arc<dyn Plugin>>,
    theme: Box<ThemeFactory>,
    serial: Mutex<()>,
}

impl Builder {
    /// A builder with the default theme and no plugins available.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            plugins: Vec::new(),
            theme: Box::new(|| Box::new(DefaultTheme)),
            serial: Mutex::new(()),
        }
    }

    /// Plugins that `settings.plugins` may enable by name.
    pub fn with_plugins(mut self, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_theme(
        mut self,
        theme: impl Fn() -> Box<dyn RenderEnv> + Send + Sync + 'static,
    ) -> Self {
        self.theme = Box::new(theme);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Use new settings for subsequent builds.
    pub fn replace_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Run one full build.
    ///
    /// Fatal errors (configuration, unreadable source root, plugin failure,
    /// write failure) abort immediately and may leave partial output.
    /// Recoverable problems are collected in the report; in strict mode any
    /// of them fails the build once every stage has run.
    pub fn build(&self, options: BuildOptions) -> Result<BuildReport, BuildError> {
        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        let mut diag = Diagnostics::new();

        let registry = PluginRegistry::select(&self.plugins, &self.settings.plugins)?;
        if !registry.is_empty() {
            debug!(count = registry.len(), plugins = ?registry.names(), "plugins enabled");
        }
        let settings = registry.run_config(self.settings.clone())?;
        settings.validate()?;
        registry.run_pre_build(&HookContext {
            settings: &settings,
            catalog: None,
        })?;

        if options.mode == WriteMode::Dirty {
            info!(
                "dirty build: navigation and links on unchanged pages may be inaccurate; \
                 use a clean build before publishing"
            );
        }
        if !options.live_server {
            info!(path = %settings.output_dir.display(), "building site");
        }

        let Prepared {
            catalog,
            nav,
            env,
        } = self.prepare(&registry, &settings, &mut diag)?;

        let ctx = HookContext {
            settings: &settings,
            catalog: Some(&catalog),
        };
        let env = registry.run_env(env, &ctx)?;
        let rendered = render::render_site(env.as_ref(), &catalog, &nav, &settings, &mut diag);
        let write = writer::write(
            &catalog,
            &rendered,
            &settings.output_dir,
            options.mode,
            &mut diag,
        )?;
        registry.run_post_build(&ctx)?;

        let report = BuildReport {
            pages: rendered.pages.len(),
            static_files: catalog.iter().filter(|(_, f)| !f.is_document()).count(),
            warnings: diag.into_warnings(),
            write,
            elapsed: start.elapsed(),
        };

        if settings.strict && !report.warnings.is_empty() {
            return Err(BuildError::Strict {
                count: report.warnings.len(),
            });
        }
        info!(
            warnings = report.warnings.len(),
            "site built in {:.2} seconds",
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// Scan, build navigation and populate every page without writing
    /// anything. Runs the `config`, `files` and `nav` hooks.
    pub fn check(&self) -> Result<SiteCheck, BuildError> {
        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);
        let mut diag = Diagnostics::new();
        let registry = PluginRegistry::select(&self.plugins, &self.settings.plugins)?;
        let settings = registry.run_config(self.settings.clone())?;
        settings.validate()?;
        let Prepared { catalog, nav, .. } = self.prepare(&registry, &settings, &mut diag)?;
        Ok(SiteCheck {
            catalog,
            nav,
            warnings: diag.into_warnings(),
        })
    }

    /// Every stage up to and including population.
    fn prepare(
        &self,
        registry: &PluginRegistry,
        settings: &Settings,
        diag: &mut Diagnostics,
    ) -> Result<Prepared, BuildError> {
        let env = (self.theme)();
        let mut catalog = catalog::scan(
            &settings.source_dir,
            &settings.exclude,
            settings.use_directory_urls,
            diag,
        )?;
        if let Some(dir) = &settings.theme.custom_dir {
            catalog.add_theme_files(catalog::scan_theme_dir(dir, diag));
        }
        catalog.add_theme_files(env.static_assets());

        let mut catalog = registry.run_files(
            catalog,
            &HookContext {
                settings,
                catalog: None,
            },
        )?;

        let nav = nav::build(&mut catalog, settings.nav.as_deref(), diag);
        let nav = registry.run_nav(
            nav,
            &HookContext {
                settings,
                catalog: Some(&catalog),
            },
        )?;
        nav.assign_page_links(&mut catalog);

        page::populate_all(&mut catalog, diag);
        Ok(Prepared { catalog, nav, env })
    }
}

struct Prepared {
    catalog: Catalog,
    nav: Navigation,
    env: Box<dyn RenderEnv>,
}
