//! Preview mode: reads real metadata but keeps GPS writes in memory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{MetadataReader, TagWriter};
use crate::state::data::ImageMetadata;
use crate::Result;

/// Wraps a reader; writes are recorded and overlaid on later reads so the
/// geotagger's confirmation re-read sees them.
pub struct DryRun<R> {
    inner: R,
    pending: RefCell<HashMap<PathBuf, (f64, f64)>>,
}

impl<R: MetadataReader> DryRun<R> {
    pub fn new(inner: R) -> Self {
        DryRun {
            inner,
            pending: RefCell::new(HashMap::new()),
        }
    }

    /// Writes that would have been made, sorted by path
    pub fn pending(&self) -> Vec<(PathBuf, (f64, f64))> {
        let mut writes: Vec<_> = self
            .pending
            .borrow()
            .iter()
            .map(|(p, c)| (p.clone(), *c))
            .collect();
        writes.sort_by(|a, b| a.0.cmp(&b.0));
        writes
    }
}

impl<R: MetadataReader> MetadataReader for DryRun<R> {
    fn read(&self, path: &Path) -> Result<ImageMetadata> {
        let mut meta = self.inner.read(path)?;
        if let Some(gps) = self.pending.borrow().get(path) {
            meta.gps = Some(*gps);
        }
        Ok(meta)
    }
}

impl<R: MetadataReader> TagWriter for DryRun<R> {
    fn write_gps(&self, path: &Path, latitude: f64, longitude: f64) -> Result<()> {
        info!(
            "(dry run) would tag {} with {:.6}, {:.6}",
            path.display(),
            latitude,
            longitude
        );
        self.pending
            .borrow_mut()
            .insert(path.to_path_buf(), (latitude, longitude));
        Ok(())
    }
}
