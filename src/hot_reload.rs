//! # Hot Reload Module
//!
//! Live reloading of the nested route table during development.
//!
//! [`watch_manifest`] watches a JSON manifest, an array of pattern strings such as
//! `["", "/blog", "/blog/:slug"]`, typically written by a client-side build. On every
//! change the manifest is re-read and the [`NestedRouter`] is rebuilt with
//! [`rebuild_preserving_handlers`](NestedRouter::rebuild_preserving_handlers): layers
//! with tasks stay as they are and the pattern-only layers are replaced.
//!
//! ## Error Handling
//!
//! A manifest that cannot be read or parsed, or that contains a malformed pattern, is
//! logged and ignored. The previous table keeps serving.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use brrtmux::hot_reload::watch_manifest;
//! use brrtmux::nested::NestedRouter;
//!
//! let nested = Arc::new(NestedRouter::default());
//! let _watcher = watch_manifest("routes.json", Arc::clone(&nested), |patterns| {
//!     println!("reloaded {} patterns", patterns.len());
//! })?;
//! # Ok::<(), notify::Error>(())
//! ```
//!
//! Keep the returned watcher alive for as long as reloads should happen.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, info, warn};

use crate::nested::NestedRouter;

/// Read a manifest: a JSON array of pattern strings
///
/// # Errors
///
/// Returns an error when the file cannot be read or is not a JSON array of strings.
pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Reload `path` into `nested`, returning the manifest patterns on success
pub(crate) fn reload(path: &Path, nested: &NestedRouter) -> Option<Vec<String>> {
    let patterns = match load_manifest(path) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "hot-reload: ignoring unreadable manifest");
            return None;
        }
    };
    if let Err(e) = nested.rebuild_preserving_handlers(&patterns) {
        warn!(path = %path.display(), error = %e, "hot-reload: ignoring manifest with invalid pattern");
        return None;
    }
    info!(
        path = %path.display(),
        patterns = patterns.len(),
        "hot-reload: nested routes rebuilt"
    );
    Some(patterns)
}

/// Watch a route manifest and rebuild `nested` whenever it changes
///
/// `on_reload` receives the manifest patterns after each successful rebuild.
///
/// # Errors
///
/// Returns the watcher error when the path cannot be watched.
pub fn watch_manifest<P, F>(
    manifest_path: P,
    nested: Arc<NestedRouter>,
    mut on_reload: F,
) -> notify::Result<RecommendedWatcher>
where
    P: AsRef<Path>,
    F: FnMut(&[String]) + Send + 'static,
{
    let path: PathBuf = manifest_path.as_ref().to_path_buf();
    let watch_path = path.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    if let Some(patterns) = reload(&watch_path, &nested) {
                        on_reload(&patterns);
                    }
                }
            }
            Err(e) => error!(error = %e, "hot-reload: watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
