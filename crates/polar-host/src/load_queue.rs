//! Policy files waiting to be loaded.

use crate::error::{PolarError, PolarResult};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use polar_host_types::ids::is_policy_extension;
use tracing::debug;

/// Ordered, duplicate-free set of policy files not yet handed to the engine.
///
/// Files are loaded in the order they were first enqueued. A file that was
/// loaded successfully is remembered and never queued again until `clear`.
#[derive(Clone, Debug, Default)]
pub struct LoadQueue {
    queued: IndexSet<Utf8PathBuf>,
    loaded: IndexSet<Utf8PathBuf>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `path` and queue it. Enqueuing a queued or loaded path is a no-op.
    pub fn enqueue(&mut self, path: impl Into<Utf8PathBuf>) -> PolarResult<()> {
        let path = path.into();
        // Extension first: a bad name is rejected without touching the disk.
        if !path.extension().is_some_and(is_policy_extension) {
            return Err(PolarError::InvalidExtension { path });
        }
        if !path.is_file() {
            return Err(PolarError::FileNotFound { path });
        }
        if self.loaded.contains(&path) {
            debug!(%path, "policy file already loaded");
            return Ok(());
        }
        debug!(%path, "queued policy file");
        self.queued.insert(path);
        Ok(())
    }

    /// Read and load every queued file, in order.
    ///
    /// A file leaves the queue only once `loader` accepts it. The first failure
    /// stops the flush; that file and all later ones stay queued.
    pub fn flush<F>(&mut self, mut loader: F) -> PolarResult<()>
    where
        F: FnMut(&str, &Utf8Path) -> PolarResult<()>,
    {
        let pending: Vec<Utf8PathBuf> = self.queued.iter().cloned().collect();
        for path in pending {
            let src = std::fs::read_to_string(&path).map_err(|source| PolarError::Io {
                path: path.clone(),
                source,
            })?;
            loader(&src, &path)?;
            self.queued.shift_remove(&path);
            debug!(%path, "loaded policy file");
            self.loaded.insert(path);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.queued.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utf8Path> {
        self.queued.iter().map(Utf8PathBuf::as_path)
    }

    pub fn is_loaded(&self, path: &Utf8Path) -> bool {
        self.loaded.contains(path)
    }

    /// Forget queued and loaded files alike (the engine handle was replaced).
    pub fn clear(&mut self) {
        self.queued.clear();
        self.loaded.clear();
    }
}
