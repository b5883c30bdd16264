//! Watch mode.
//!
//! Builds once, then rebuilds the whole site whenever something under the
//! source directory, the theme's custom directory or the config file
//! changes. Events arriving within [`DEBOUNCE`] of each other form one
//! batch and trigger one rebuild. Hidden files (editor swap files, `.git`)
//! never trigger a rebuild.
//!
//! A failed rebuild is logged and the loop keeps going, so the last good
//! output stays in place until the source is fixed.

use crate::config;
use crate::pipeline::{BuildOptions, Builder};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Quiet period that closes a batch of change events.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Build, then rebuild on every change until the watcher shuts down.
///
/// When `config_path` is given, edits to it reload the settings before the
/// next rebuild.
pub fn watch(
    mut builder: Builder,
    config_path: Option<&Path>,
    options: BuildOptions,
) -> Result<(), WatchError> {
    let options = BuildOptions {
        live_server: true,
        ..options
    };
    rebuild(&builder, options);

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        // The loop below owns the receiver; nothing to do if it is gone.
        let _ = tx.send(res);
    })?;

    // Events carry canonical paths, so the roots must be canonical too.
    let mut roots = vec![canonical(&builder.settings().source_dir)];
    if let Some(dir) = builder.settings().theme.custom_dir.as_ref().filter(|d| d.is_dir()) {
        roots.push(canonical(dir));
    }
    for root in &roots {
        watcher.watch(root, RecursiveMode::Recursive)?;
    }
    let config_file = config_path.filter(|p| p.is_file()).map(canonical);
    if let Some(path) = &config_file {
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        roots.push(path.clone());
    }
    info!(source = %builder.settings().source_dir.display(), "watching for changes");

    while let Some(changed) = next_batch(&rx, DEBOUNCE, &roots) {
        if changed.is_empty() {
            continue;
        }
        if let Some(path) = &config_file
            && changed.contains(path)
        {
            match config::load_settings(path) {
                Ok(settings) => {
                    info!(path = %path.display(), "configuration reloaded");
                    builder.replace_settings(settings);
                }
                Err(e) => warn!("keeping previous configuration: {e}"),
            }
        }
        info!(changed = changed.len(), "source changed, rebuilding");
        rebuild(&builder, options);
    }
    Ok(())
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn rebuild(builder: &Builder, options: BuildOptions) {
    match builder.build(options) {
        Ok(report) if !report.warnings.is_empty() => {
            warn!(warnings = report.warnings.len(), "build finished with warnings");
        }
        Ok(_) => {}
        Err(e) => error!("build failed: {e}"),
    }
}

/// Wait for the next batch of events and return the relevant paths in it.
///
/// Returns `None` once the watcher has gone away.
fn next_batch(
    rx: &Receiver<notify::Result<Event>>,
    debounce: Duration,
    roots: &[PathBuf],
) -> Option<Vec<PathBuf>> {
    let mut changed = Vec::new();
    collect(rx.recv().ok()?, roots, &mut changed);
    loop {
        match rx.recv_timeout(debounce) {
            Ok(res) => collect(res, roots, &mut changed),
            Err(RecvTimeoutError::Timeout) => return Some(changed),
            Err(RecvTimeoutError::Disconnected) => return Some(changed),
        }
    }
}

fn collect(res: notify::Result<Event>, roots: &[PathBuf], changed: &mut Vec<PathBuf>) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            warn!("watch error: {e}");
            return;
        }
    };
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return;
    }
    for path in event.paths {
        if is_relevant_change(&path, roots) && !changed.contains(&path) {
            changed.push(path);
        }
    }
}

/// Whether a changed path lies under a watched root without passing through
/// a hidden entry.
pub fn is_relevant_change(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| {
        path.strip_prefix(root).is_ok_and(|rel| {
            !rel.components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn roots() -> Vec<PathBuf> {
        vec![PathBuf::from("/p/docs"), PathBuf::from("/p/mkblog.toml")]
    }

    fn event(kind: EventKind, path: &str) -> notify::Result<Event> {
        Ok(Event::new(kind).add_path(PathBuf::from(path)))
    }

    #[test]
    fn relevant_paths() {
        let roots = roots();
        assert!(is_relevant_change(Path::new("/p/docs/a.md"), &roots));
        assert!(is_relevant_change(Path::new("/p/docs/img/x.png"), &roots));
        assert!(is_relevant_change(Path::new("/p/mkblog.toml"), &roots));
        assert!(!is_relevant_change(Path::new("/p/docs/.a.md.swp"), &roots));
        assert!(!is_relevant_change(Path::new("/p/docs/.git/index"), &roots));
        assert!(!is_relevant_change(Path::new("/p/site/index.html"), &roots));
    }

    #[test]
    fn batch_collects_and_dedupes() {
        let (tx, rx) = mpsc::channel();
        tx.send(event(EventKind::Create(CreateKind::File), "/p/docs/a.md")).unwrap();
        tx.send(event(EventKind::Modify(ModifyKind::Any), "/p/docs/a.md")).unwrap();
        tx.send(event(EventKind::Modify(ModifyKind::Any), "/p/docs/.swp")).unwrap();
        tx.send(event(EventKind::Access(AccessKind::Any), "/p/docs/b.md")).unwrap();
        let batch = next_batch(&rx, Duration::from_millis(10), &roots()).unwrap();
        assert_eq!(batch, vec![PathBuf::from("/p/docs/a.md")]);
    }

    #[test]
    fn batch_ends_when_watcher_is_gone() {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        drop(tx);
        assert_eq!(next_batch(&rx, Duration::from_millis(10), &roots()), None);
    }
}
