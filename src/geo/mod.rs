/// Geotagging module
///
/// This module handles:
/// - Reading GPX track logs and time-window position queries (track.rs)
/// - The named-location index used for nearest-place lookups (location_cache.rs)
/// - Correlating photographs with tracks and writing GPS tags (tracker.rs)

pub mod location_cache;
pub mod track;
pub mod tracker;

pub use location_cache::{LocationCache, LocationSource};
pub use track::{GeoTrack, Position, TrackPoint};
pub use tracker::{GeoTracker, TagCounts, TagOutcome};
