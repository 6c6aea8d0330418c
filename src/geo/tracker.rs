//! Correlation engine: matches photographs to track positions by capture
//! time and writes the resulting GPS tags.

use std::fmt;
use tracing::{debug, info, warn};

use super::location_cache::LocationCache;
use super::track::{GeoTrack, Position};
use crate::media::{MetadataReader, TagWriter};
use crate::state::data::{Location, Photo};

/// What happened to one photograph. Exactly one per photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    /// Had GPS data before the run; left untouched
    AlreadyTagged,
    /// Tagged with a position from a track
    Updated,
    /// Tagged with the default location
    Defaulted,
    /// No position found, or the tag write failed
    Untracked,
}

/// Outcome counters for a batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagCounts {
    pub updated: usize,
    pub defaulted: usize,
    pub already_tagged: usize,
    pub untracked: usize,
}

impl TagCounts {
    pub fn record(&mut self, outcome: TagOutcome) {
        match outcome {
            TagOutcome::AlreadyTagged => self.already_tagged += 1,
            TagOutcome::Updated => self.updated += 1,
            TagOutcome::Defaulted => self.defaulted += 1,
            TagOutcome::Untracked => self.untracked += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.updated + self.defaulted + self.already_tagged + self.untracked
    }
}

impl fmt::Display for TagCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} defaulted, {} already tagged, {} untracked",
            self.updated, self.defaulted, self.already_tagged, self.untracked
        )
    }
}

/// Correlates photographs against an ordered set of tracks.
///
/// Tracks are consulted in the order given and the first one that yields a
/// position wins, even if a later track would also cover the photograph.
pub struct GeoTracker<'a> {
    tracks: Vec<GeoTrack>,
    default_location: Option<Location>,
    cache: &'a LocationCache,
    writer: &'a dyn TagWriter,
    reader: &'a dyn MetadataReader,
    counts: TagCounts,
    unattributed: usize,
}

impl<'a> GeoTracker<'a> {
    pub fn new(
        tracks: Vec<GeoTrack>,
        cache: &'a LocationCache,
        writer: &'a dyn TagWriter,
        reader: &'a dyn MetadataReader,
    ) -> Self {
        GeoTracker {
            tracks,
            default_location: None,
            cache,
            writer,
            reader,
            counts: TagCounts::default(),
            unattributed: 0,
        }
    }

    /// Fallback for photographs no track covers
    pub fn with_default_location(mut self, location: Option<Location>) -> Self {
        self.default_location = location;
        self
    }

    pub fn counts(&self) -> TagCounts {
        self.counts
    }

    pub fn tracks(&self) -> &[GeoTrack] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<GeoTrack> {
        self.tracks
    }

    /// Photographs no track strictly contains
    pub fn unattributed(&self) -> usize {
        self.unattributed
    }

    /// Human-readable outcome of everything tagged so far
    pub fn summary(&self) -> String {
        self.counts.to_string()
    }

    /// Tag every photograph in order, calling `progress` after each one.
    pub fn correlate(
        &mut self,
        photos: &mut [Photo],
        progress: &mut dyn FnMut(&Photo, TagOutcome),
    ) -> TagCounts {
        for photo in photos.iter_mut() {
            let outcome = self.tag_photo(photo);
            progress(photo, outcome);
        }
        self.counts
    }

    /// Decide and write the GPS tag for one photograph.
    pub fn tag_photo(&mut self, photo: &mut Photo) -> TagOutcome {
        self.attribute(photo);

        let outcome = if photo.is_tagged() {
            debug!("{} already has GPS data", photo.filename());
            TagOutcome::AlreadyTagged
        } else if let Some(position) = self.position_for(photo) {
            self.tag_from_track(photo, position)
        } else if let Some(location) = &self.default_location {
            self.tag_from_default(photo, location)
        } else {
            debug!("No track covers {}", photo.filename());
            TagOutcome::Untracked
        };

        self.counts.record(outcome);
        outcome
    }

    /// Count a photograph whose metadata could not be read at all
    pub fn record_unreadable(&mut self) -> TagOutcome {
        self.unattributed += 1;
        self.counts.record(TagOutcome::Untracked);
        TagOutcome::Untracked
    }

    /// Group the photograph under the first track whose span contains it.
    fn attribute(&mut self, photo: &Photo) {
        let track = photo
            .captured
            .and_then(|t| self.tracks.iter_mut().find(|track| track.contains(t)));
        match track {
            Some(track) => track.attribute(photo.path.clone()),
            None => self.unattributed += 1,
        }
    }

    fn position_for(&self, photo: &Photo) -> Option<Position> {
        let captured = photo.captured?;
        self.tracks
            .iter()
            .find_map(|track| track.location_at(captured))
    }

    fn tag_from_track(&self, photo: &mut Photo, position: Position) -> TagOutcome {
        if !self.write_and_confirm(photo, position.latitude, position.longitude) {
            return TagOutcome::Untracked;
        }

        match self.cache.get_closest(position.latitude, position.longitude) {
            Some(closest) => {
                info!(
                    "📍 {} -> {:.5}, {:.5} (near {})",
                    photo.filename(),
                    position.latitude,
                    position.longitude,
                    closest.name
                );
                photo.closest_location = Some(closest.name.clone());
            }
            None => info!(
                "📍 {} -> {:.5}, {:.5}",
                photo.filename(),
                position.latitude,
                position.longitude
            ),
        }
        TagOutcome::Updated
    }

    fn tag_from_default(&self, photo: &mut Photo, location: &Location) -> TagOutcome {
        if !self.write_and_confirm(photo, location.latitude, location.longitude) {
            return TagOutcome::Untracked;
        }
        info!("🏠 {} -> default location {}", photo.filename(), location.name);
        photo.closest_location = Some(location.name.clone());
        TagOutcome::Defaulted
    }

    /// Write the tag, then re-read the file so the descriptor reflects what
    /// is actually on disk. Any failure leaves the photograph untagged.
    fn write_and_confirm(&self, photo: &mut Photo, latitude: f64, longitude: f64) -> bool {
        if let Err(e) = self.writer.write_gps(&photo.path, latitude, longitude) {
            warn!("⚠️  Could not tag {}: {}", photo.filename(), e);
            return false;
        }

        match self.reader.read(&photo.path) {
            Ok(meta) => photo.refresh(meta),
            Err(e) => {
                warn!("⚠️  Could not re-read {}: {}", photo.filename(), e);
                return false;
            }
        }

        if photo.gps.is_none() {
            warn!("⚠️  GPS tag on {} did not stick", photo.filename());
            return false;
        }
        true
    }
}
