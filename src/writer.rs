//! Output writer.
//!
//! Final stage of the build. Materializes the catalog's static files and the
//! rendered outputs into the output directory, lowest precedence first so
//! that later writes win on a path collision:
//!
//! ```text
//! 1. theme static assets        (css/theme.css, custom_dir files)
//! 2. user static assets         (copied, modification time preserved)
//! 3. theme templates            (404.html, sitemap.xml, ...)
//! 4. extra templates            (extra_templates, rendered)
//! 5. documentation pages
//! ```
//!
//! ## Modes
//!
//! - **Clean** empties the output directory first (hidden top-level entries
//!   such as `.git` survive) and writes everything.
//! - **Dirty** leaves existing output in place. Static files whose
//!   destination is at least as new as the source are skipped, and rendered
//!   outputs whose bytes are unchanged are not rewritten. Files no current
//!   source produces stay behind; one warning reports them.
//!
//! The whole write holds an exclusive advisory lock on `<output_dir>.lock`,
//! so two builds targeting the same directory never interleave.

use crate::catalog::{Catalog, FileSource, SourceFile};
use crate::diagnostics::Diagnostics;
use crate::render::{RenderedOutput, RenderedSite};
use filetime::FileTime;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("cannot lock output directory via {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> WriteError + '_ {
    move |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// How existing output is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Clean,
    Dirty,
}

/// What a write did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    /// Up-to-date outputs left untouched (dirty mode only).
    pub skipped: usize,
    /// Files in the output directory no current source produces.
    pub stale: usize,
}

// ============================================================================
// Output lock
// ============================================================================

/// Exclusive advisory lock on an output directory, released on drop.
#[derive(Debug)]
pub struct OutputLock {
    file: File,
    path: PathBuf,
}

impl OutputLock {
    /// Block until the lock for `output_dir` is held.
    pub fn acquire(output_dir: &Path) -> Result<Self, WriteError> {
        let path = lock_path(output_dir);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let lock_err = |source| WriteError::Lock {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;
        debug!(path = %path.display(), "output lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), "failed to release output lock: {e}");
        }
    }
}

/// `<output_dir>.lock`, beside the output directory.
pub fn lock_path(output_dir: &Path) -> PathBuf {
    let normalized: PathBuf = output_dir.components().collect();
    let mut name = normalized.into_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

// ============================================================================
// Writing
// ============================================================================

/// Write the site into `output_dir`.
pub fn write(
    catalog: &Catalog,
    rendered: &RenderedSite,
    output_dir: &Path,
    mode: WriteMode,
    diag: &mut Diagnostics,
) -> Result<WriteSummary, WriteError> {
    let _lock = OutputLock::acquire(output_dir)?;
    let mut summary = WriteSummary::default();

    match mode {
        WriteMode::Clean => {
            info!(path = %output_dir.display(), "cleaning site directory");
            clean_directory(output_dir)?;
        }
        WriteMode::Dirty => {
            summary.stale = report_stale_files(catalog, rendered, output_dir, diag);
        }
    }
    fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;

    debug!("copying static assets");
    let statics = catalog
        .theme_files()
        .chain(catalog.static_files())
        .map(|(_, f)| f);
    for file in statics {
        let written = copy_static(file, &output_dir.join(&file.dest_path), mode)?;
        summary.record(written);
    }

    let outputs = rendered
        .theme_templates
        .iter()
        .chain(&rendered.extra_templates)
        .chain(&rendered.pages);
    for output in outputs {
        let written = write_output(output, output_dir, mode)?;
        summary.record(written);
    }

    debug!(
        written = summary.written,
        skipped = summary.skipped,
        "output written"
    );
    Ok(summary)
}

impl WriteSummary {
    fn record(&mut self, written: bool) {
        if written {
            self.written += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Remove everything in `dir` except hidden entries. Missing `dir` is fine.
pub fn clean_directory(dir: &Path) -> Result<(), WriteError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(io_err(dir)(e)),
    };
    for entry in entries {
        let entry = entry.map_err(io_err(dir))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let result = if entry.file_type().map_err(io_err(&path))?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(io_err(&path))?;
    }
    Ok(())
}

/// Count files under `output_dir` that nothing in this build produces and
/// record a single warning if there are any.
fn report_stale_files(
    catalog: &Catalog,
    rendered: &RenderedSite,
    output_dir: &Path,
    diag: &mut Diagnostics,
) -> usize {
    let produced: HashSet<&str> = catalog
        .iter()
        .filter(|(_, f)| !f.is_document())
        .map(|(_, f)| f.dest_path.as_str())
        .chain(
            rendered
                .theme_templates
                .iter()
                .chain(&rendered.extra_templates)
                .chain(&rendered.pages)
                .map(|o| o.dest_path.as_str()),
        )
        .collect();

    let stale: Vec<String> = WalkDir::new(output_dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(output_dir).ok()?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            (!produced.contains(rel.as_str())).then_some(rel)
        })
        .collect();

    if !stale.is_empty() {
        for path in &stale {
            debug!(path = %path, "stale output file");
        }
        diag.warn(format!(
            "the site directory contains {} stale file(s) not produced by this build; run a clean build to remove them",
            stale.len()
        ));
    }
    stale.len()
}

/// Copy one static file. Returns false when skipped as up to date.
fn copy_static(file: &SourceFile, dest: &Path, mode: WriteMode) -> Result<bool, WriteError> {
    match &file.source {
        FileSource::Embedded(bytes) => write_bytes(dest, bytes, mode),
        FileSource::Disk(src) => {
            let src_meta = fs::metadata(src).map_err(io_err(src))?;
            let src_mtime = FileTime::from_last_modification_time(&src_meta);
            if mode == WriteMode::Dirty
                && let Ok(dest_meta) = fs::metadata(dest)
                && FileTime::from_last_modification_time(&dest_meta) >= src_mtime
            {
                debug!(path = %file.rel_path, "static file up to date");
                return Ok(false);
            }
            create_parent(dest)?;
            fs::copy(src, dest).map_err(io_err(dest))?;
            filetime::set_file_mtime(dest, src_mtime).map_err(io_err(dest))?;
            Ok(true)
        }
    }
}

fn write_output(output: &RenderedOutput, output_dir: &Path, mode: WriteMode) -> Result<bool, WriteError> {
    write_bytes(&output_dir.join(&output.dest_path), &output.bytes, mode)
}

/// Write bytes, skipping identical content in dirty mode.
fn write_bytes(dest: &Path, bytes: &[u8], mode: WriteMode) -> Result<bool, WriteError> {
    if mode == WriteMode::Dirty && fs::read(dest).is_ok_and(|existing| existing == bytes) {
        return Ok(false);
    }
    create_parent(dest)?;
    fs::write(dest, bytes).map_err(io_err(dest))?;
    Ok(true)
}

fn create_parent(dest: &Path) -> Result<(), WriteError> {
    match dest.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(io_err(parent)),
        None => Ok(()),
    }
}
