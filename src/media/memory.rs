//! An in-memory metadata store standing in for image files.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{MetadataReader, TagWriter};
use crate::state::data::ImageMetadata;
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: RefCell<HashMap<PathBuf, ImageMetadata>>,
    failing: RefCell<HashSet<PathBuf>>,
    writes: Cell<usize>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: PathBuf, meta: ImageMetadata) {
        self.entries.borrow_mut().insert(path, meta);
    }

    /// Make every GPS write to `path` fail
    pub fn fail_writes_for(&self, path: PathBuf) {
        self.failing.borrow_mut().insert(path);
    }

    /// Number of successful GPS writes
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn gps_of(&self, path: &Path) -> Option<(f64, f64)> {
        self.entries.borrow().get(path).and_then(|m| m.gps)
    }
}

impl MetadataReader for MemoryCatalog {
    fn read(&self, path: &Path) -> Result<ImageMetadata> {
        self.entries
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))
    }
}

impl TagWriter for MemoryCatalog {
    fn write_gps(&self, path: &Path, latitude: f64, longitude: f64) -> Result<()> {
        if self.failing.borrow().contains(path) {
            return Err(Error::ExifTool(format!("{}: write refused", path.display())));
        }
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .get_mut(path)
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        entry.gps = Some((latitude, longitude));
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}
