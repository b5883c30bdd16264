//! Plugin event bus.
//!
//! Plugins observe and transform pipeline state at six fixed points:
//!
//! ```text
//! config → pre_build → [scan] → files → [nav] → nav → [populate] → env → [render, write] → post_build
//! ```
//!
//! Each hook is a method on [`Plugin`] with a no-op default, so a plugin
//! implements only what it needs. For a given hook, plugins run in
//! registration order and each receives the value returned by the previous
//! one: a left fold. A plugin may hand the value back unchanged or return a
//! wholesale replacement (a new catalog, a wrapped render environment).
//!
//! A hook that returns an error aborts the build. Later plugins are not run
//! for that hook, and no later stage runs.

use crate::catalog::Catalog;
use crate::config::{ConfigError, Settings};
use crate::nav::Navigation;
use crate::render::RenderEnv;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Error type plugins return from hooks.
pub type HookResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// The pipeline points a plugin can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Config,
    PreBuild,
    Files,
    Nav,
    Env,
    PostBuild,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hook::Config => "config",
            Hook::PreBuild => "pre_build",
            Hook::Files => "files",
            Hook::Nav => "nav",
            Hook::Env => "env",
            Hook::PostBuild => "post_build",
        })
    }
}

#[derive(Error, Debug)]
#[error("plugin '{plugin}' failed in the '{hook}' hook: {source}")]
pub struct PluginError {
    pub plugin: String,
    pub hook: Hook,
    #[source]
    pub source: Box<dyn Error + Send + Sync>,
}

/// Read-only state handed to hooks alongside the value they transform.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub settings: &'a Settings,
    /// Present from the `nav` hook on.
    pub catalog: Option<&'a Catalog>,
}

/// A pipeline extension. Every hook defaults to passing its value through.
pub trait Plugin: Send + Sync {
    /// Name matched against the `plugins` setting.
    fn name(&self) -> &str;

    fn on_config(&self, settings: Settings) -> HookResult<Settings> {
        Ok(settings)
    }

    /// Observational; runs after validation, before any I/O.
    fn on_pre_build(&self, _ctx: &HookContext<'_>) -> HookResult<()> {
        Ok(())
    }

    fn on_files(&self, catalog: Catalog, _ctx: &HookContext<'_>) -> HookResult<Catalog> {
        Ok(catalog)
    }

    fn on_nav(&self, nav: Navigation, _ctx: &HookContext<'_>) -> HookResult<Navigation> {
        Ok(nav)
    }

    fn on_env(
        &self,
        env: Box<dyn RenderEnv>,
        _ctx: &HookContext<'_>,
    ) -> HookResult<Box<dyn RenderEnv>> {
        Ok(env)
    }

    /// Observational; runs after the output is written.
    fn on_post_build(&self, _ctx: &HookContext<'_>) -> HookResult<()> {
        Ok(())
    }
}

/// Enabled plugins, in dispatch order.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name()))
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; it runs after every plugin registered before it.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Enable the plugins named in `names`, in that order, from the ones the
    /// program makes `available`.
    pub fn select(available: &[Arc<dyn Plugin>], names: &[String]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ConfigError::Validation(format!(
                    "plugin '{name}' is listed more than once"
                )));
            }
            let plugin = available
                .iter()
                .find(|p| p.name() == name)
                .ok_or_else(|| {
                    let known: Vec<&str> = available.iter().map(|p| p.name()).collect();
                    ConfigError::Validation(format!(
                        "unknown plugin '{name}' (available: {known:?})"
                    ))
                })?;
            registry.register(Arc::clone(plugin));
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Thread `value` through every plugin's handler for `hook`.
    fn fold<T>(
        &self,
        hook: Hook,
        mut value: T,
        mut handler: impl FnMut(&dyn Plugin, T) -> HookResult<T>,
    ) -> Result<T, PluginError> {
        for plugin in &self.plugins {
            debug!(plugin = plugin.name(), %hook, "running hook");
            value = handler(plugin.as_ref(), value).map_err(|source| PluginError {
                plugin: plugin.name().to_string(),
                hook,
                source,
            })?;
        }
        Ok(value)
    }

    pub fn run_config(&self, settings: Settings) -> Result<Settings, PluginError> {
        self.fold(Hook::Config, settings, |p, s| p.on_config(s))
    }

    pub fn run_pre_build(&self, ctx: &HookContext<'_>) -> Result<(), PluginError> {
        self.fold(Hook::PreBuild, (), |p, ()| p.on_pre_build(ctx))
    }

    pub fn run_files(&self, catalog: Catalog, ctx: &HookContext<'_>) -> Result<Catalog, PluginError> {
        self.fold(Hook::Files, catalog, |p, c| p.on_files(c, ctx))
    }

    pub fn run_nav(&self, nav: Navigation, ctx: &HookContext<'_>) -> Result<Navigation, PluginError> {
        self.fold(Hook::Nav, nav, |p, n| p.on_nav(n, ctx))
    }

    pub fn run_env(
        &self,
        env: Box<dyn RenderEnv>,
        ctx: &HookContext<'_>,
    ) -> Result<Box<dyn RenderEnv>, PluginError> {
        self.fold(Hook::Env, env, |p, e| p.on_env(e, ctx))
    }

    pub fn run_post_build(&self, ctx: &HookContext<'_>) -> Result<(), PluginError> {
        self.fold(Hook::PostBuild, (), |p, ()| p.on_post_build(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DefaultTheme;
    use std::sync::Mutex;

    /// Appends its tag to `site_name` and logs every hook it sees.
    struct Tagger {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_on: Option<Hook>,
    }

    impl Tagger {
        fn new(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Plugin> {
            Arc::new(Self {
                tag,
                log: Arc::clone(log),
                fail_on: None,
            })
        }

        fn failing(tag: &'static str, log: &Arc<Mutex<Vec<String>>>, hook: Hook) -> Arc<dyn Plugin> {
            Arc::new(Self {
                tag,
                log: Arc::clone(log),
                fail_on: Some(hook),
            })
        }

        fn record(&self, hook: Hook) -> HookResult<()> {
            self.log.lock().unwrap().push(format!("{}:{hook}", self.tag));
            if self.fail_on == Some(hook) {
                return Err(format!("{} refused", self.tag).into());
            }
            Ok(())
        }
    }

    impl Plugin for Tagger {
        fn name(&self) -> &str {
            self.tag
        }

        fn on_config(&self, mut settings: Settings) -> HookResult<Settings> {
            self.record(Hook::Config)?;
            settings.site_name.push_str(self.tag);
            Ok(settings)
        }

        fn on_pre_build(&self, _ctx: &HookContext<'_>) -> HookResult<()> {
            self.record(Hook::PreBuild)
        }

        fn on_files(&self, _catalog: Catalog, _ctx: &HookContext<'_>) -> HookResult<Catalog> {
            self.record(Hook::Files)?;
            // Wholesale replacement.
            Ok(Catalog::new(false))
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn config_hook_is_a_left_fold() {
        let log = log();
        let mut registry = PluginRegistry::new();
        registry.register(Tagger::new("a", &log));
        registry.register(Tagger::new("b", &log));
        let settings = Settings {
            site_name: "x".into(),
            ..Settings::default()
        };
        let out = registry.run_config(settings).unwrap();
        assert_eq!(out.site_name, "xab");
        assert_eq!(*log.lock().unwrap(), vec!["a:config", "b:config"]);
    }

    #[test]
    fn files_hook_may_replace_value() {
        let log = log();
        let mut registry = PluginRegistry::new();
        registry.register(Tagger::new("a", &log));
        let settings = Settings::default();
        let ctx = HookContext {
            settings: &settings,
            catalog: None,
        };
        let out = registry.run_files(Catalog::new(true), &ctx).unwrap();
        assert!(!out.use_directory_urls());
    }

    #[test]
    fn failure_stops_the_fold() {
        let log = log();
        let mut registry = PluginRegistry::new();
        registry.register(Tagger::failing("a", &log, Hook::PreBuild));
        registry.register(Tagger::new("b", &log));
        let settings = Settings::default();
        let ctx = HookContext {
            settings: &settings,
            catalog: None,
        };
        let err = registry.run_pre_build(&ctx).unwrap_err();
        assert_eq!(err.plugin, "a");
        assert_eq!(err.hook, Hook::PreBuild);
        assert!(err.to_string().contains("a refused"));
        assert_eq!(*log.lock().unwrap(), vec!["a:pre_build"]);
    }

    #[test]
    fn default_hooks_pass_values_through() {
        struct Quiet;
        impl Plugin for Quiet {
            fn name(&self) -> &str {
                "quiet"
            }
        }
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Quiet));
        let settings = Settings::default();
        let ctx = HookContext {
            settings: &settings,
            catalog: None,
        };
        assert_eq!(registry.run_config(settings.clone()).unwrap(), settings);
        let nav = registry.run_nav(Navigation::new(), &ctx).unwrap();
        assert_eq!(nav, Navigation::new());
        let env = registry.run_env(Box::new(DefaultTheme), &ctx).unwrap();
        assert_eq!(env.name(), "default");
        registry.run_post_build(&ctx).unwrap();
    }

    #[test]
    fn select_follows_settings_order() {
        let log = log();
        let available = vec![Tagger::new("a", &log), Tagger::new("b", &log)];
        let registry = PluginRegistry::select(&available, &["b".into(), "a".into()]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["b", "a"]);

        let none = PluginRegistry::select(&available, &[]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn select_rejects_unknown_and_duplicate_names() {
        let log = log();
        let available = vec![Tagger::new("a", &log)];
        assert!(matches!(
            PluginRegistry::select(&available, &["nope".into()]),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            PluginRegistry::select(&available, &["a".into(), "a".into()]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn hook_names() {
        assert_eq!(Hook::PreBuild.to_string(), "pre_build");
        assert_eq!(Hook::PostBuild.to_string(), "post_build");
    }
}
