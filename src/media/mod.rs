/// Media file collaborators
///
/// This module handles everything that touches image files on disk:
/// - Discovering images and track logs (scan.rs)
/// - Reading and writing embedded metadata through exiftool (exiftool.rs)
/// - Non-writing stand-ins for previews and tests (dry_run.rs, memory.rs)

use std::path::Path;

use crate::state::data::ImageMetadata;
use crate::Result;

pub mod dry_run;
pub mod exiftool;
pub mod memory;
pub mod scan;

/// Reads capture time, dimensions and existing GPS tags from an image
pub trait MetadataReader {
    fn read(&self, path: &Path) -> Result<ImageMetadata>;
}

/// Overwrites an image's GPS tags in place. All-or-nothing: on error the
/// file is assumed unchanged.
pub trait TagWriter {
    fn write_gps(&self, path: &Path, latitude: f64, longitude: f64) -> Result<()>;
}
