use std::path::PathBuf;
use std::rc::Rc;
use tracing::{info, warn};

use super::{PhotoSource, Task, TaskState};
use crate::geo::{GeoTrack, GeoTracker, LocationCache, LocationSource, TagCounts};
use crate::media::{scan, MetadataReader, TagWriter};
use crate::state::data::{Location, Photo};
use crate::Result;

/// Geotags photographs from GPX track logs, falling back to a default
/// named location.
pub struct GeoTrackerTask {
    state: TaskState,
    source: PhotoSource,
    track_dir: Option<PathBuf>,
    track_extensions: Vec<String>,
    default_location: Option<String>,
    cache: Rc<LocationCache>,
    locations: Rc<dyn LocationSource>,
    reader: Rc<dyn MetadataReader>,
    writer: Rc<dyn TagWriter>,
    paths: Vec<PathBuf>,
    tracks: Vec<GeoTrack>,
    fallback: Option<Location>,
    photos: Vec<Photo>,
    counts: Option<TagCounts>,
}

impl GeoTrackerTask {
    pub fn new(
        source: PhotoSource,
        cache: Rc<LocationCache>,
        locations: Rc<dyn LocationSource>,
        reader: Rc<dyn MetadataReader>,
        writer: Rc<dyn TagWriter>,
    ) -> Self {
        GeoTrackerTask {
            state: TaskState::new("Geotag photos", 1),
            source,
            track_dir: None,
            track_extensions: vec!["gpx".to_string()],
            default_location: None,
            cache,
            locations,
            reader,
            writer,
            paths: Vec::new(),
            tracks: Vec::new(),
            fallback: None,
            photos: Vec::new(),
            counts: None,
        }
    }

    pub fn with_tracks(mut self, dir: Option<PathBuf>, extensions: Vec<String>) -> Self {
        self.track_dir = dir;
        self.track_extensions = extensions;
        self
    }

    /// Name or ID of the catalogue location used when no track matches
    pub fn with_default_location(mut self, reference: Option<String>) -> Self {
        self.default_location = reference;
        self
    }

    /// Tracks with the photographs attributed to them (after running)
    pub fn tracks(&self) -> &[GeoTrack] {
        &self.tracks
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn counts(&self) -> Option<TagCounts> {
        self.counts
    }

    fn load_tracks(&self) -> std::result::Result<Vec<GeoTrack>, String> {
        let Some(dir) = &self.track_dir else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            return Err(format!("Track folder {} is missing", dir.display()));
        }

        let files = scan::list_files(dir, &self.track_extensions).map_err(|e| e.to_string())?;
        let mut tracks = Vec::new();
        for file in files {
            match GeoTrack::load(&file) {
                Ok(track) if track.is_empty() => {
                    warn!("⚠️  Ignoring track without timed samples: {}", file.display())
                }
                Ok(track) => tracks.push(track),
                Err(e) => warn!("⚠️  Ignoring unreadable track: {}", e),
            }
        }
        Ok(tracks)
    }

    fn resolve_fallback(&self) -> std::result::Result<Option<Location>, String> {
        match &self.default_location {
            None => Ok(None),
            Some(reference) => self
                .cache
                .resolve(reference)
                .cloned()
                .map(Some)
                .ok_or_else(|| format!("Default location '{}' is not in the catalogue", reference)),
        }
    }

    fn check_preconditions(&mut self) -> std::result::Result<(), String> {
        self.cache
            .ensure_loaded(self.locations.as_ref())
            .map_err(|e| format!("Location catalogue unavailable: {}", e))?;
        self.fallback = self.resolve_fallback()?;
        self.tracks = self.load_tracks()?;
        self.paths = self
            .source
            .list()
            .map_err(|e| format!("Cannot list photos: {}", e))?;
        Ok(())
    }

    fn report_tracks(&self) {
        for track in &self.tracks {
            let centroid = track
                .centroid()
                .map(|c| format!("{:.5}, {:.5}", c.latitude, c.longitude))
                .unwrap_or_else(|_| "-".to_string());
            info!(
                "🛰  {}: {} photos, {} .. {}, centred on {}",
                track.name(),
                track.photos().len(),
                track.start().map(|t| t.to_rfc3339()).unwrap_or_default(),
                track.end().map(|t| t.to_rfc3339()).unwrap_or_default(),
                centroid
            );
        }
    }
}

impl Task for GeoTrackerTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TaskState {
        &mut self.state
    }

    fn prepare(&mut self) {
        self.state.unblock();
        if let Err(reason) = self.check_preconditions() {
            self.state.block(reason);
            return;
        }

        self.state.set_total(self.paths.len());
        let fallback = match &self.fallback {
            Some(location) => format!(", default {}", location.name),
            None => String::new(),
        };
        self.state.set_description(format!(
            "{} photos, {} tracks{}",
            self.paths.len(),
            self.tracks.len(),
            fallback
        ));
    }

    fn execute(&mut self, progress: &mut dyn FnMut(&TaskState)) -> Result<()> {
        let mut tracker = GeoTracker::new(
            std::mem::take(&mut self.tracks),
            &self.cache,
            self.writer.as_ref(),
            self.reader.as_ref(),
        )
        .with_default_location(self.fallback.clone());

        let mut photos = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            match self.reader.read(path) {
                Ok(meta) => {
                    let mut photo = Photo::from_metadata(path.clone(), meta);
                    tracker.tag_photo(&mut photo);
                    photos.push(photo);
                }
                Err(e) => {
                    warn!("⚠️  Cannot read metadata of {}: {}", path.display(), e);
                    tracker.record_unreadable();
                }
            }
            self.state.set_description(tracker.summary());
            self.state.advance(progress);
        }

        let counts = tracker.counts();
        if tracker.unattributed() > 0 {
            info!("{} photos fall outside every track", tracker.unattributed());
        }
        self.tracks = tracker.into_tracks();
        self.photos = photos;
        self.counts = Some(counts);
        self.report_tracks();
        self.state.set_description(counts.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::memory::MemoryCatalog;
    use crate::state::data::ImageMetadata;
    use crate::task::{new_manifest, TaskStatus};
    use crate::Error;
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use std::fs;

    struct Catalogue(Vec<Location>);

    impl LocationSource for Catalogue {
        fn fetch_locations(&self) -> Result<Vec<Location>> {
            Ok(self.0.clone())
        }
    }

    struct Offline;

    impl LocationSource for Offline {
        fn fetch_locations(&self) -> Result<Vec<Location>> {
            Err(Error::NotFound("catalogue database".to_string()))
        }
    }

    fn home() -> Location {
        Location {
            id: 1,
            name: "Home".to_string(),
            latitude: 51.0,
            longitude: 3.0,
            region: "NL".to_string(),
            zoom: 12,
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    const RIDE: &str = r#"<gpx><trk><name>Ride</name><trkseg>
<trkpt lat="52.0" lon="4.0"><time>2023-05-01T08:00:00Z</time></trkpt>
<trkpt lat="53.0" lon="5.0"><time>2023-05-01T09:00:00Z</time></trkpt>
</trkseg></trk></gpx>"#;

    fn task_for(
        manifest_paths: &[PathBuf],
        catalog: &Rc<MemoryCatalog>,
        track_dir: Option<PathBuf>,
        locations: Rc<dyn LocationSource>,
    ) -> GeoTrackerTask {
        let manifest = new_manifest();
        manifest.replace(manifest_paths.to_vec());
        GeoTrackerTask::new(
            PhotoSource::Manifest(manifest),
            Rc::new(LocationCache::new()),
            locations,
            catalog.clone(),
            catalog.clone(),
        )
        .with_tracks(track_dir, vec!["gpx".to_string()])
    }

    #[test]
    fn test_tags_from_track_and_default() {
        let tracks = tempfile::tempdir().unwrap();
        fs::write(tracks.path().join("ride.gpx"), RIDE).unwrap();

        let catalog = Rc::new(MemoryCatalog::new());
        let on_ride = PathBuf::from("/target/ride.jpg");
        let at_home = PathBuf::from("/target/home.jpg");
        catalog.insert(on_ride.clone(), ImageMetadata {
            captured: Some(utc("2023-05-01 08:30:00")),
            ..Default::default()
        });
        catalog.insert(at_home.clone(), ImageMetadata {
            captured: Some(utc("2023-05-02 12:00:00")),
            ..Default::default()
        });

        let mut task = task_for(
            &[on_ride.clone(), at_home.clone(), PathBuf::from("/target/gone.jpg")],
            &catalog,
            Some(tracks.path().to_path_buf()),
            Rc::new(Catalogue(vec![home()])),
        )
        .with_default_location(Some("Home".to_string()));

        task.prepare();
        assert_eq!(task.state().total(), 3);
        assert_eq!(task.state().description(), "3 photos, 1 tracks, default Home");

        task.run(&mut |_| {});
        assert_eq!(task.state().status(), TaskStatus::Done);
        assert_eq!(
            task.counts(),
            Some(TagCounts { updated: 1, defaulted: 1, already_tagged: 0, untracked: 1 })
        );
        assert_eq!(task.state().description(), "1 updated, 1 defaulted, 0 already tagged, 1 untracked");

        let (lat, lon) = catalog.gps_of(&on_ride).unwrap();
        assert!((lat - 52.5).abs() < 1e-9 && (lon - 4.5).abs() < 1e-9);
        assert_eq!(catalog.gps_of(&at_home), Some((51.0, 3.0)));

        assert_eq!(task.tracks()[0].name(), "Ride");
        assert_eq!(task.tracks()[0].photos(), &[on_ride]);
        assert_eq!(task.photos().len(), 2);
    }

    #[test]
    fn test_missing_track_folder_blocks() {
        let tracks = tempfile::tempdir().unwrap();
        let catalog = Rc::new(MemoryCatalog::new());
        let mut task = task_for(
            &[PathBuf::from("/target/a.jpg")],
            &catalog,
            Some(tracks.path().join("gpx")),
            Rc::new(Catalogue(Vec::new())),
        );

        task.prepare();
        assert!(task.state().description().starts_with("Track folder"));
        task.run(&mut |_| {});
        assert_eq!(task.state().status(), TaskStatus::Error);
    }

    #[test]
    fn test_unknown_default_location_blocks() {
        let catalog = Rc::new(MemoryCatalog::new());
        let mut task = task_for(&[], &catalog, None, Rc::new(Catalogue(vec![home()])))
            .with_default_location(Some("Lighthouse".to_string()));

        task.prepare();
        assert_eq!(
            task.state().blocked(),
            Some("Default location 'Lighthouse' is not in the catalogue")
        );
        assert!(!task.is_over());
    }

    #[test]
    fn test_catalogue_failure_is_task_error() {
        let catalog = Rc::new(MemoryCatalog::new());
        let mut task = task_for(&[PathBuf::from("/target/a.jpg")], &catalog, None, Rc::new(Offline));

        task.prepare();
        task.run(&mut |_| {});
        assert_eq!(task.state().status(), TaskStatus::Error);
        assert!(task.state().description().starts_with("Location catalogue unavailable"));
    }

    #[test]
    fn test_works_on_paths_fixed_at_prepare() {
        let catalog = Rc::new(MemoryCatalog::new());
        let first = PathBuf::from("/target/a.jpg");
        catalog.insert(first.clone(), ImageMetadata {
            captured: Some(utc("2023-05-02 12:00:00")),
            ..Default::default()
        });

        let manifest = new_manifest();
        manifest.replace(vec![first]);
        let mut task = GeoTrackerTask::new(
            PhotoSource::Manifest(manifest.clone()),
            Rc::new(LocationCache::new()),
            Rc::new(Catalogue(vec![home()])),
            catalog.clone(),
            catalog.clone(),
        )
        .with_default_location(Some("1".to_string()));
        task.prepare();

        manifest.borrow_mut().push(PathBuf::from("/target/late.jpg"));
        task.run(&mut |_| {});

        assert_eq!(task.state().status(), TaskStatus::Done);
        assert_eq!(task.state().completed(), 1);
        assert_eq!(task.counts().map(|c| c.total()), Some(1));
        assert_eq!(catalog.write_count(), 1);
    }
}
