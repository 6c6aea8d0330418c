//! File enumeration for source images and track logs

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Supported RAW file extensions (common formats)
pub const RAW_EXTENSIONS: &[&str] = &[
    "nef", "dng", "cr2", "cr3", "arw", "raf", "orf", "rw2",
    "pef", "srw", "erf", "kdc", "dcr", "mos", "raw", "rwl",
];

/// Rendered formats accepted next to RAW files
pub const RENDERED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

/// Every image extension picked up by default
pub fn default_image_extensions() -> Vec<String> {
    RAW_EXTENSIONS
        .iter()
        .chain(RENDERED_EXTENSIONS)
        .map(|e| e.to_string())
        .collect()
}

/// Lower-cased extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    match extension_of(path) {
        Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

pub fn is_raw(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

/// Recursively list files under `dir` whose extension is in `extensions`,
/// sorted by path so every run sees the same order.
pub fn list_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("directory {}", dir.display())));
    }

    debug!("🔍 Scanning folder: {}", dir.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("⚠️  Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() && has_extension(path, extensions) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    debug!("Found {} matching files in {}", files.len(), dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lists_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("100NIKON")).unwrap();
        fs::write(dir.path().join("100NIKON/DSC_0002.NEF"), b"raw").unwrap();
        fs::write(dir.path().join("DSC_0001.JPG"), b"jpg").unwrap();
        fs::write(dir.path().join("notes.txt"), b"txt").unwrap();
        fs::write(dir.path().join("README"), b"no extension").unwrap();

        let files = list_files(dir.path(), &default_image_extensions()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![PathBuf::from("100NIKON/DSC_0002.NEF"), PathBuf::from("DSC_0001.JPG")]
        );
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("DCIM");
        assert!(matches!(
            list_files(&missing, &["jpg".to_string()]),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_raw_detection() {
        assert!(is_raw(Path::new("/card/DSC_0001.NEF")));
        assert!(!is_raw(Path::new("/card/DSC_0001.jpg")));
        assert!(!is_raw(Path::new("/card/DSC_0001")));
    }
}
