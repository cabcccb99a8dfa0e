//! Filesystem watch for Phasor sources.
//!
//! The watcher observes a workspace root recursively and forwards changes to
//! files matching `**/*.phs` as protocol [`FileEvent`]s. It does not
//! interpret the changes; the server session passes them on to the server.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use lsp_types::{FileChangeType, FileEvent};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use phasor_config::SOURCE_GLOB;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::uri::file_uri;

/// Log target for watch operations.
const WATCH_TARGET: &str = "phasor_supervisor::watch";

/// Errors raised while setting up the source watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The source glob did not compile.
    #[error("invalid source pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// The watch root could not be resolved.
    #[error("cannot watch {}: {source}", path.display())]
    Root {
        /// The requested root.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The platform watcher failed.
    #[error("file watcher failed: {0}")]
    Notify(#[from] notify::Error),
}

/// Compiles the matcher for Phasor source files.
///
/// # Errors
///
/// Returns [`WatchError::Pattern`] if the glob is invalid.
pub fn source_matcher() -> Result<GlobMatcher, WatchError> {
    Ok(Glob::new(SOURCE_GLOB)?.compile_matcher())
}

/// Handle keeping the platform watcher alive; dropping it stops watching.
pub struct SourceWatcher {
    root: PathBuf,
    _inner: RecommendedWatcher,
}

impl fmt::Debug for SourceWatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SourceWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl SourceWatcher {
    /// Starts watching `root` and returns the stream of change batches.
    ///
    /// Each received batch holds the matching changes from one filesystem
    /// event.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the root cannot be resolved, the pattern
    /// is invalid, or the platform watcher cannot be registered.
    pub fn start(
        root: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Vec<FileEvent>>), WatchError> {
        let canonical_root = root.canonicalize().map_err(|source| WatchError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        let matcher = source_matcher()?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let callback_root = canonical_root.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    let changes = classify(&event, &callback_root, &matcher);
                    if !changes.is_empty() && sender.send(changes).is_err() {
                        debug!(target: WATCH_TARGET, "change receiver dropped");
                    }
                }
                Err(error) => warn!(target: WATCH_TARGET, error = %error, "file watch error"),
            }
        })?;
        watcher.watch(&canonical_root, RecursiveMode::Recursive)?;

        info!(
            target: WATCH_TARGET,
            root = %canonical_root.display(),
            pattern = SOURCE_GLOB,
            "source watcher started"
        );

        Ok((
            Self {
                root: canonical_root,
                _inner: watcher,
            },
            receiver,
        ))
    }

    /// The canonical root being watched.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }
}

/// Converts a filesystem event into protocol file events.
///
/// Only paths matching `matcher` relative to `root` are kept. Renames are
/// reported as a deletion of the old path and a creation of the new one.
/// Access events produce nothing.
#[must_use]
pub fn classify(event: &Event, root: &Path, matcher: &GlobMatcher) -> Vec<FileEvent> {
    let typed_paths: Vec<(&PathBuf, FileChangeType)> = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|path| (path, FileChangeType::CREATED))
            .collect(),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|path| (path, FileChangeType::DELETED))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .zip([FileChangeType::DELETED, FileChangeType::CREATED])
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|path| (path, FileChangeType::CHANGED))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    };

    typed_paths
        .into_iter()
        .filter(|(path, _)| is_source(path, root, matcher))
        .filter_map(|(path, typ)| file_uri(path).map(|uri| FileEvent { uri, typ }))
        .collect()
}

fn is_source(path: &Path, root: &Path, matcher: &GlobMatcher) -> bool {
    path.strip_prefix(root)
        .map_or_else(|_| matcher.is_match(path), |relative| matcher.is_match(relative))
}
