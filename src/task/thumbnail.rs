use std::path::PathBuf;
use tracing::{info, warn};

use super::{PhotoSource, Task, TaskState};
use crate::raw::thumbnail;
use crate::Result;

/// Renders a thumbnail for every ingested photograph. One bad file is
/// logged and counted, the rest still get thumbnails.
pub struct ThumbnailTask {
    state: TaskState,
    source: PhotoSource,
    /// Folder whose layout the thumbnail folder mirrors
    root: Option<PathBuf>,
    cache_dir: PathBuf,
    size: u32,
    paths: Vec<PathBuf>,
    generated: usize,
    failed: usize,
}

impl ThumbnailTask {
    pub fn new(source: PhotoSource, cache_dir: PathBuf, size: u32) -> Self {
        ThumbnailTask {
            state: TaskState::new("Render thumbnails", 1),
            source,
            root: None,
            cache_dir,
            size,
            paths: Vec::new(),
            generated: 0,
            failed: 0,
        }
    }

    /// Mirror the layout below `root`. A directory source is its own root.
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }

    pub fn generated(&self) -> usize {
        self.generated
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl Task for ThumbnailTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TaskState {
        &mut self.state
    }

    fn prepare(&mut self) {
        self.state.unblock();
        match self.source.list() {
            Ok(paths) => {
                self.state.set_total(paths.len());
                self.state.set_description(format!(
                    "{} thumbnails into {}",
                    paths.len(),
                    self.cache_dir.display()
                ));
                self.paths = paths;
            }
            Err(e) => self.state.block(format!("Cannot list photos: {}", e)),
        }
    }

    fn execute(&mut self, progress: &mut dyn FnMut(&TaskState)) -> Result<()> {
        let root = match (&self.root, &self.source) {
            (Some(root), _) => root.clone(),
            (None, PhotoSource::Directory { dir, .. }) => dir.clone(),
            // File names only
            (None, PhotoSource::Manifest(_)) => PathBuf::new(),
        };

        for path in &self.paths {
            let out = thumbnail::thumbnail_path(&self.cache_dir, &root, path);
            match thumbnail::generate_thumbnail(path, &out, self.size) {
                Ok(_) => self.generated += 1,
                Err(e) => {
                    warn!("⚠️  No thumbnail for {}: {}", path.display(), e);
                    self.failed += 1;
                }
            }
            self.state.advance(progress);
        }

        info!(
            "📸 {} thumbnails generated, {} failed",
            self.generated, self.failed
        );
        self.state.set_description(format!(
            "{} thumbnails, {} failed",
            self.generated, self.failed
        ));
        Ok(())
    }
}
