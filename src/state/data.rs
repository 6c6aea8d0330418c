/// Shared data structures for an ingest run
///
/// These structs represent the data model that flows between
/// the location catalogue, the metadata collaborators and the stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A named, fixed place from the location catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Unique database ID
    pub id: i64,
    /// Display name (e.g., "Dunes north of the harbour")
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Free-form region/country text
    pub region: String,
    /// Default map zoom used when the location is shown on a map
    pub zoom: u8,
}

/// What the metadata reader knows about one image file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    /// Capture time, already converted to UTC
    pub captured: Option<DateTime<Utc>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Existing GPS tag as (latitude, longitude)
    pub gps: Option<(f64, f64)>,
}

/// A photograph taking part in one ingest run
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    /// Full path to the image file
    pub path: PathBuf,
    /// Capture timestamp from embedded metadata
    pub captured: Option<DateTime<Utc>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// GPS coordinates as (latitude, longitude), if tagged
    pub gps: Option<(f64, f64)>,
    /// Name of the closest catalogue location, filled in after tagging
    pub closest_location: Option<String>,
}

impl Photo {
    /// Build a descriptor from freshly read metadata
    pub fn from_metadata(path: PathBuf, meta: ImageMetadata) -> Self {
        Photo {
            path,
            captured: meta.captured,
            width: meta.width,
            height: meta.height,
            gps: meta.gps,
            closest_location: None,
        }
    }

    /// Replace the metadata-derived fields after a re-read
    pub fn refresh(&mut self, meta: ImageMetadata) {
        self.captured = meta.captured;
        self.width = meta.width;
        self.height = meta.height;
        self.gps = meta.gps;
    }

    pub fn is_tagged(&self) -> bool {
        self.gps.is_some()
    }

    /// Filename only (e.g., "DSC_0001.NEF")
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}
