//! File-system capability.
//!
//! Agents read and write files through the client so they see (and
//! update) what the user sees. Reads prefer unsaved editor content held in
//! a [`BufferOverlay`]; writes land on disk and are then shown to the user.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::{AppError, Result};

/// Future returned by the file-system traits.
pub type FsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Host-provided file access.
pub trait FileSystemProvider: Send + Sync {
    /// Read `path`, optionally sliced to `limit` lines starting at 1-based
    /// `line`.
    fn read_text_file<'a>(
        &'a self,
        path: &'a Path,
        line: Option<u32>,
        limit: Option<u32>,
    ) -> FsFuture<'a, String>;

    /// Replace the content of `path`, creating parent directories.
    fn write_text_file<'a>(&'a self, path: &'a Path, content: &'a str) -> FsFuture<'a, ()>;
}

/// Something that can bring a file in front of the user.
pub trait DocumentViewer: Send + Sync {
    /// Show `path`. Failures are the viewer's to report.
    fn show(&self, path: &Path);
}

/// Unsaved buffer contents keyed by path. Cheap to clone; clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct BufferOverlay {
    buffers: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl BufferOverlay {
    /// Empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record unsaved content for `path`.
    pub fn set(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), content.into());
    }

    /// Forget unsaved content for `path`.
    pub fn clear(&self, path: &Path) {
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    /// Unsaved content for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<String> {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }
}

/// Return `limit` lines of `content` starting at 1-based `line`.
///
/// `line` of `None` or `0` starts at the top; `limit` of `None` reads to
/// the end. Lines are split on `\n` and rejoined with `\n`.
#[must_use]
pub fn slice_lines(content: &str, line: Option<u32>, limit: Option<u32>) -> String {
    if line.is_none() && limit.is_none() {
        return content.to_owned();
    }

    let start = line.map_or(0, |l| l.saturating_sub(1) as usize);
    let take = limit.map_or(usize::MAX, |l| l as usize);

    content
        .split('\n')
        .skip(start)
        .take(take)
        .collect::<Vec<_>>()
        .join("\n")
}

/// [`FileSystemProvider`] backed by the local disk.
#[derive(Clone, Default)]
pub struct LocalFileSystem {
    overlay: BufferOverlay,
    viewer: Option<Arc<dyn DocumentViewer>>,
}

impl std::fmt::Debug for LocalFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileSystem")
            .field("overlay", &self.overlay)
            .field("viewer", &self.viewer.is_some())
            .finish()
    }
}

impl LocalFileSystem {
    /// Provider with the given overlay and no viewer.
    #[must_use]
    pub fn new(overlay: BufferOverlay) -> Self {
        Self {
            overlay,
            viewer: None,
        }
    }

    /// Show written files in `viewer`.
    #[must_use]
    pub fn with_viewer(mut self, viewer: Arc<dyn DocumentViewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// The overlay consulted on reads.
    #[must_use]
    pub fn overlay(&self) -> &BufferOverlay {
        &self.overlay
    }

    async fn read(&self, path: &Path, line: Option<u32>, limit: Option<u32>) -> Result<String> {
        let content = if let Some(unsaved) = self.overlay.get(path) {
            debug!(path = %path.display(), "fs: serving unsaved buffer");
            unsaved
        } else {
            tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
                ErrorKind::NotFound => AppError::Io(format!("file not found: {}", path.display())),
                _ => AppError::Io(format!("failed to read {}: {e}", path.display())),
            })?
        };
        Ok(slice_lines(&content, line, limit))
    }

    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Io(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| AppError::Io(format!("failed to write {}: {e}", path.display())))?;

        self.overlay.clear(path);
        debug!(path = %path.display(), bytes = content.len(), "fs: file written");

        if let Some(viewer) = &self.viewer {
            viewer.show(path);
        }
        Ok(())
    }
}

impl FileSystemProvider for LocalFileSystem {
    fn read_text_file<'a>(
        &'a self,
        path: &'a Path,
        line: Option<u32>,
        limit: Option<u32>,
    ) -> FsFuture<'a, String> {
        Box::pin(self.read(path, line, limit))
    }

    fn write_text_file<'a>(&'a self, path: &'a Path, content: &'a str) -> FsFuture<'a, ()> {
        Box::pin(self.write(path, content))
    }
}
