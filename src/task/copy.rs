use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Manifest, Task, TaskState};
use crate::media::scan;
use crate::Result;

/// One file to copy
#[derive(Debug, Clone, PartialEq)]
struct CopyItem {
    from: PathBuf,
    to: PathBuf,
}

/// Copies images off the card into the target folder, keeping the card's
/// folder layout, and archives track logs into `<target>/tracks`.
pub struct CopyTask {
    state: TaskState,
    source: PathBuf,
    target: PathBuf,
    track_dir: Option<PathBuf>,
    image_extensions: Vec<String>,
    track_extensions: Vec<String>,
    plan: Vec<CopyItem>,
    manifest: Manifest,
    copied: usize,
    skipped: usize,
}

impl CopyTask {
    /// `manifest` receives the planned destination of every image.
    pub fn new(
        source: PathBuf,
        target: PathBuf,
        image_extensions: Vec<String>,
        manifest: Manifest,
    ) -> Self {
        CopyTask {
            // Real total is known after prepare
            state: TaskState::new("Copy photos", 1),
            source,
            target,
            track_dir: None,
            image_extensions,
            track_extensions: vec!["gpx".to_string()],
            plan: Vec::new(),
            manifest,
            copied: 0,
            skipped: 0,
        }
    }

    /// Also archive the track logs found in `dir`
    pub fn with_tracks(mut self, dir: Option<PathBuf>, extensions: Vec<String>) -> Self {
        self.track_dir = dir;
        self.track_extensions = extensions;
        self
    }

    pub fn copied(&self) -> usize {
        self.copied
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn build_plan(&self) -> Result<(Vec<CopyItem>, usize)> {
        let mut plan = Vec::new();
        for from in scan::list_files(&self.source, &self.image_extensions)? {
            let relative = from.strip_prefix(&self.source).unwrap_or(&from);
            let to = self.target.join(relative);
            plan.push(CopyItem { from, to });
        }
        let images = plan.len();

        if let Some(dir) = self.track_dir.as_ref().filter(|d| d.is_dir()) {
            let archive = self.target.join("tracks");
            for from in scan::list_files(dir, &self.track_extensions)? {
                let to = archive.join(from.file_name().unwrap_or_default());
                plan.push(CopyItem { from, to });
            }
        }
        Ok((plan, images))
    }
}

/// Same size at the destination counts as already copied
fn already_copied(item: &CopyItem) -> bool {
    match (fs::metadata(&item.from), fs::metadata(&item.to)) {
        (Ok(from), Ok(to)) => to.is_file() && from.len() == to.len(),
        _ => false,
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

impl Task for CopyTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TaskState {
        &mut self.state
    }

    fn prepare(&mut self) {
        self.state.unblock();
        match self.build_plan() {
            Ok((plan, images)) => {
                let tracks = plan.len() - images;
                self.manifest.replace(plan[..images].iter().map(|i| i.to.clone()).collect());
                self.state.set_total(plan.len());
                self.state.set_description(format!(
                    "{} photos and {} track logs to {}",
                    images,
                    tracks,
                    self.target.display()
                ));
                self.plan = plan;
            }
            Err(e) => {
                self.manifest.borrow_mut().clear();
                self.state.block(format!("Cannot read {}: {}", self.source.display(), e));
            }
        }
    }

    fn execute(&mut self, progress: &mut dyn FnMut(&TaskState)) -> Result<()> {
        fs::create_dir_all(&self.target)?;

        for item in &self.plan {
            if already_copied(item) {
                debug!("Already copied: {}", item.to.display());
                self.skipped += 1;
            } else {
                copy_file(&item.from, &item.to)?;
                self.copied += 1;
            }
            self.state.advance(progress);
        }

        info!(
            "📥 Copied {} files, skipped {} already present",
            self.copied, self.skipped
        );
        self.state.set_description(format!(
            "Copied {}, skipped {} already present",
            self.copied, self.skipped
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{new_manifest, TaskStatus};

    fn exts() -> Vec<String> {
        vec!["jpg".to_string(), "nef".to_string()]
    }

    #[test]
    fn test_copies_and_publishes_manifest() {
        let card = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let tracks = tempfile::tempdir().unwrap();
        fs::create_dir(card.path().join("100NIKON")).unwrap();
        fs::write(card.path().join("100NIKON/DSC_0001.NEF"), b"raw data").unwrap();
        fs::write(card.path().join("100NIKON/DSC_0001.JPG"), b"jpeg data").unwrap();
        fs::write(card.path().join("index.dat"), b"camera db").unwrap();
        fs::write(tracks.path().join("ride.gpx"), b"<gpx/>").unwrap();

        let manifest = new_manifest();
        let mut task = CopyTask::new(
            card.path().to_path_buf(),
            target.path().to_path_buf(),
            exts(),
            manifest.clone(),
        )
        .with_tracks(Some(tracks.path().to_path_buf()), vec!["gpx".to_string()]);

        task.prepare();
        assert_eq!(task.state().total(), 3);
        assert_eq!(
            *manifest.borrow(),
            vec![
                target.path().join("100NIKON/DSC_0001.JPG"),
                target.path().join("100NIKON/DSC_0001.NEF"),
            ]
        );

        task.run(&mut |_| {});
        assert_eq!(task.state().status(), TaskStatus::Done);
        assert_eq!(task.copied(), 3);
        assert_eq!(
            fs::read(target.path().join("100NIKON/DSC_0001.NEF")).unwrap(),
            b"raw data"
        );
        assert!(target.path().join("tracks/ride.gpx").is_file());
        assert!(!target.path().join("index.dat").exists());
    }

    #[test]
    fn test_skips_files_already_present() {
        let card = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        fs::write(card.path().join("a.jpg"), b"same").unwrap();
        fs::write(card.path().join("b.jpg"), b"new").unwrap();
        fs::write(target.path().join("a.jpg"), b"same").unwrap();

        let mut task = CopyTask::new(
            card.path().to_path_buf(),
            target.path().to_path_buf(),
            exts(),
            new_manifest(),
        );
        task.prepare();
        task.run(&mut |_| {});

        assert_eq!(task.state().status(), TaskStatus::Done);
        assert_eq!((task.copied(), task.skipped()), (1, 1));
        assert_eq!(task.state().description(), "Copied 1, skipped 1 already present");
    }

    #[test]
    fn test_missing_source_blocks() {
        let target = tempfile::tempdir().unwrap();
        let mut task = CopyTask::new(
            target.path().join("DCIM"),
            target.path().to_path_buf(),
            exts(),
            new_manifest(),
        );
        task.prepare();
        assert!(task.state().blocked().is_some());

        task.run(&mut |_| {});
        assert_eq!(task.state().status(), TaskStatus::Error);
    }
}
