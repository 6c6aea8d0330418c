//! GPS track logs: GPX reading and "where was I at time T" queries.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::{Error, Result};

/// A photograph taken up to this long before the first sample still gets
/// the first sample's position (camera clock running slightly ahead).
pub const START_TOLERANCE_SECS: i64 = 120;

/// One recorded GPS sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

/// A geographic position, optionally with elevation in metres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

/// Axis-aligned box spanning every sample of a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

/// A parsed track log. Derived geometry is computed once when the track is
/// built and never changes; only the list of attributed photographs grows.
#[derive(Debug, Clone)]
pub struct GeoTrack {
    name: String,
    source: Option<PathBuf>,
    points: Vec<TrackPoint>,
    time_bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
    centroid: Option<Position>,
    bounding_box: Option<BoundingBox>,
    photos: Vec<PathBuf>,
}

impl GeoTrack {
    /// Build a track from samples in any order.
    pub fn from_points(name: impl Into<String>, mut points: Vec<TrackPoint>) -> Self {
        points.sort_by_key(|p| p.time);

        let time_bounds = match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        };

        GeoTrack {
            name: name.into(),
            source: None,
            centroid: centroid_of(&points),
            bounding_box: bounding_box_of(&points),
            time_bounds,
            points,
            photos: Vec::new(),
        }
    }

    /// Read a GPX file. The track is named after the file unless the log
    /// carries its own `<trk><name>`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let (embedded_name, points) = parse_gpx(&text).map_err(|message| Error::TrackParse {
            path: path.to_path_buf(),
            message,
        })?;

        let mut track = GeoTrack::from_points(embedded_name.unwrap_or(stem), points);
        track.source = Some(path.to_path_buf());

        match track.time_bounds {
            Some((start, end)) => debug!(
                "Loaded track '{}': {} samples from {} to {}",
                track.name,
                track.points.len(),
                start,
                end
            ),
            None => warn!("Track '{}' has no timed samples", track.name),
        }

        Ok(track)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.time_bounds.map(|(start, _)| start)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.time_bounds.map(|(_, end)| end)
    }

    /// Mean position over all samples
    pub fn centroid(&self) -> Result<Position> {
        self.centroid
            .ok_or_else(|| Error::EmptyTrack(self.name.clone()))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    /// True iff `t` lies within the recorded time span, ends included.
    /// Used for attribution; no start tolerance applies here.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        match self.time_bounds {
            Some((start, end)) => start <= t && t <= end,
            None => false,
        }
    }

    /// Position at time `t`, linearly interpolated between the bracketing
    /// samples. Times up to [`START_TOLERANCE_SECS`] before the first
    /// sample snap to it. `None` means the track does not cover `t`.
    pub fn location_at(&self, t: DateTime<Utc>) -> Option<Position> {
        let (start, end) = self.time_bounds?;

        if t < start {
            if start - t <= Duration::seconds(START_TOLERANCE_SECS) {
                return Some(self.points[0].position());
            }
            return None;
        }
        if t > end {
            return None;
        }

        // First sample strictly after t; points[0].time <= t so idx >= 1
        let idx = self.points.partition_point(|p| p.time <= t);
        if idx == self.points.len() {
            return self.points.last().map(TrackPoint::position);
        }

        let before = &self.points[idx - 1];
        let after = &self.points[idx];
        let span = (after.time - before.time).num_milliseconds() as f64;
        let fraction = (t - before.time).num_milliseconds() as f64 / span;

        Some(Position {
            latitude: lerp(before.latitude, after.latitude, fraction),
            longitude: lerp(before.longitude, after.longitude, fraction),
            elevation: match (before.elevation, after.elevation) {
                (Some(a), Some(b)) => Some(lerp(a, b, fraction)),
                _ => None,
            },
        })
    }

    /// Record that a photograph was taken during this track
    pub fn attribute(&mut self, photo: PathBuf) {
        self.photos.push(photo);
    }

    pub fn photos(&self) -> &[PathBuf] {
        &self.photos
    }
}

impl TrackPoint {
    pub fn position(&self) -> Position {
        Position {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation: self.elevation,
        }
    }
}

fn lerp(a: f64, b: f64, fraction: f64) -> f64 {
    a + (b - a) * fraction
}

fn centroid_of(points: &[TrackPoint]) -> Option<Position> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let latitude = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let longitude = points.iter().map(|p| p.longitude).sum::<f64>() / n;

    let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();
    let elevation = if elevations.is_empty() {
        None
    } else {
        Some(elevations.iter().sum::<f64>() / elevations.len() as f64)
    };

    Some(Position {
        latitude,
        longitude,
        elevation,
    })
}

fn bounding_box_of(points: &[TrackPoint]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut bbox = BoundingBox {
        min_latitude: first.latitude,
        max_latitude: first.latitude,
        min_longitude: first.longitude,
        max_longitude: first.longitude,
    };
    for p in &points[1..] {
        bbox.min_latitude = bbox.min_latitude.min(p.latitude);
        bbox.max_latitude = bbox.max_latitude.max(p.latitude);
        bbox.min_longitude = bbox.min_longitude.min(p.longitude);
        bbox.max_longitude = bbox.max_longitude.max(p.longitude);
    }
    Some(bbox)
}

fn trkpt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<trkpt\b([^>]*?)(?:/>|>(.*?)</trkpt>)").expect("valid trkpt regex")
    })
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\b(lat|lon)\s*=\s*["']([^"']*)["']"#).expect("valid attribute regex")
    })
}

fn child_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<(ele|time)>\s*([^<]*?)\s*</(?:ele|time)>").expect("valid child regex")
    })
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<name>\s*([^<]*?)\s*</name>").expect("valid name regex"))
}

/// Pull the track name and timed samples out of a GPX document.
/// Samples without a `<time>` cannot be correlated and are dropped.
fn parse_gpx(text: &str) -> std::result::Result<(Option<String>, Vec<TrackPoint>), String> {
    if !text.contains("<gpx") {
        return Err("not a GPX document".to_string());
    }

    // The track's own name sits between <trk> and its first segment
    let name = text.find("<trk>").or_else(|| text.find("<trk ")).and_then(|start| {
        let header = &text[start..];
        let header = match header.find("<trkseg") {
            Some(end) => &header[..end],
            None => header,
        };
        name_regex()
            .captures(header)
            .map(|c| c[1].to_string())
            .filter(|n| !n.is_empty())
    });

    let mut points = Vec::new();
    let mut untimed = 0usize;

    for cap in trkpt_regex().captures_iter(text) {
        let mut latitude = None;
        let mut longitude = None;
        for attr in attr_regex().captures_iter(&cap[1]) {
            let value: f64 = attr[2]
                .trim()
                .parse()
                .map_err(|_| format!("bad {} value '{}'", &attr[1], &attr[2]))?;
            match &attr[1] {
                "lat" => latitude = Some(value),
                _ => longitude = Some(value),
            }
        }
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            return Err("trkpt without lat/lon".to_string());
        };

        let mut time = None;
        let mut elevation = None;
        if let Some(body) = cap.get(2) {
            for child in child_regex().captures_iter(body.as_str()) {
                match &child[1] {
                    "ele" => elevation = child[2].parse::<f64>().ok(),
                    _ => {
                        time = Some(
                            DateTime::parse_from_rfc3339(&child[2])
                                .map_err(|e| format!("bad time '{}': {}", &child[2], e))?
                                .with_timezone(&Utc),
                        )
                    }
                }
            }
        }

        match time {
            Some(time) => points.push(TrackPoint {
                time,
                latitude,
                longitude,
                elevation,
            }),
            None => untimed += 1,
        }
    }

    if untimed > 0 {
        debug!("Skipped {} track points without a timestamp", untimed);
    }

    Ok((name, points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn two_point_track() -> GeoTrack {
        GeoTrack::from_points(
            "walk",
            vec![
                TrackPoint {
                    time: at(100),
                    latitude: 10.0,
                    longitude: 10.0,
                    elevation: Some(200.0),
                },
                TrackPoint {
                    time: at(0),
                    latitude: 0.0,
                    longitude: 0.0,
                    elevation: Some(100.0),
                },
            ],
        )
    }

    #[test]
    fn test_interpolates_between_samples() {
        let track = two_point_track();
        let p = track.location_at(at(50)).unwrap();
        assert!((p.latitude - 5.0).abs() < 1e-9);
        assert!((p.longitude - 5.0).abs() < 1e-9);
        assert!((p.elevation.unwrap() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_bounds_return_samples() {
        let track = two_point_track();
        assert_eq!(track.location_at(at(0)).unwrap().latitude, 0.0);
        assert_eq!(track.location_at(at(100)).unwrap().latitude, 10.0);
    }

    #[test]
    fn test_start_tolerance() {
        let track = two_point_track();
        let early = track.location_at(at(-60)).unwrap();
        assert_eq!((early.latitude, early.longitude), (0.0, 0.0));
        assert!(track.location_at(at(-120)).is_some());
        assert!(track.location_at(at(-200)).is_none());
        // No tolerance after the end
        assert!(track.location_at(at(101)).is_none());
    }

    #[test]
    fn test_contains_is_stricter_than_location_at() {
        let track = two_point_track();
        assert!(track.location_at(at(-60)).is_some());
        assert!(!track.contains(at(-60)));
        assert!(track.contains(at(0)));
        assert!(track.contains(at(100)));
        assert!(!track.contains(at(100) + Duration::milliseconds(1)));
    }

    #[test]
    fn test_derived_geometry() {
        let track = GeoTrack::from_points(
            "loop",
            vec![
                TrackPoint { time: at(0), latitude: 1.0, longitude: 5.0, elevation: None },
                TrackPoint { time: at(10), latitude: 3.0, longitude: 1.0, elevation: Some(10.0) },
                TrackPoint { time: at(20), latitude: 2.0, longitude: 3.0, elevation: Some(30.0) },
            ],
        );
        let c = track.centroid().unwrap();
        assert!((c.latitude - 2.0).abs() < 1e-9);
        assert!((c.longitude - 3.0).abs() < 1e-9);
        assert_eq!(c.elevation, Some(20.0));

        let bbox = track.bounding_box().unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                min_latitude: 1.0,
                max_latitude: 3.0,
                min_longitude: 1.0,
                max_longitude: 5.0,
            }
        );
        assert_eq!(track.start(), Some(at(0)));
        assert_eq!(track.end(), Some(at(20)));
    }

    #[test]
    fn test_empty_track() {
        let track = GeoTrack::from_points("empty", Vec::new());
        assert!(matches!(track.centroid(), Err(Error::EmptyTrack(_))));
        assert!(track.location_at(at(0)).is_none());
        assert!(!track.contains(at(0)));
        assert!(track.bounding_box().is_none());
    }

    #[test]
    fn test_parse_gpx() {
        let gpx = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test">
  <trk>
    <name>Morning ride</name>
    <trkseg>
      <trkpt lat="52.10" lon="4.27"><ele>3.5</ele><time>2023-05-01T08:00:00Z</time></trkpt>
      <trkpt lon='4.30' lat='52.12'>
        <time>2023-05-01T08:10:00Z</time>
      </trkpt>
      <trkpt lat="52.13" lon="4.31"/>
    </trkseg>
  </trk>
</gpx>"#;
        let (name, points) = parse_gpx(gpx).unwrap();
        assert_eq!(name.as_deref(), Some("Morning ride"));
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].elevation, Some(3.5));
        assert_eq!(points[1].latitude, 52.12);
        assert_eq!(points[1].longitude, 4.30);
        assert_eq!(points[1].elevation, None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_gpx("hello").is_err());
        assert!(parse_gpx(r#"<gpx><trk><trkseg><trkpt lat="x" lon="1"/></trkseg></trk></gpx>"#).is_err());
    }

    #[test]
    fn test_load_uses_file_stem_without_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2023-05-01.gpx");
        std::fs::write(
            &path,
            r#"<gpx><trk><trkseg>
<trkpt lat="1" lon="2"><time>2023-05-01T08:00:00Z</time></trkpt>
</trkseg></trk></gpx>"#,
        )
        .unwrap();

        let track = GeoTrack::load(&path).unwrap();
        assert_eq!(track.name(), "2023-05-01");
        assert_eq!(track.source(), Some(path.as_path()));
        assert_eq!(track.points().len(), 1);
    }
}
