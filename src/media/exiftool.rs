//! Metadata reading and GPS tag writing through the external `exiftool`
//! command.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

use super::{MetadataReader, TagWriter};
use crate::state::data::ImageMetadata;
use crate::{Error, Result};

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Runs exiftool as a child process for every read and write.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: String,
    /// Zone the camera clock was set to; EXIF times carry none
    camera_offset: FixedOffset,
}

/// The subset of `exiftool -json -n` output we care about
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExifRecord {
    date_time_original: Option<String>,
    create_date: Option<String>,
    image_width: Option<u32>,
    image_height: Option<u32>,
    #[serde(rename = "GPSLatitude")]
    gps_latitude: Option<f64>,
    #[serde(rename = "GPSLongitude")]
    gps_longitude: Option<f64>,
}

impl ExifTool {
    pub fn new(program: impl Into<String>, camera_offset: FixedOffset) -> Self {
        ExifTool {
            program: program.into(),
            camera_offset,
        }
    }

    /// True if the configured program can be started at all
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-ver")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(&self, args: &[String], path: &Path) -> Result<Output> {
        let output = Command::new(&self.program)
            .args(args)
            .arg(path)
            .output()
            .map_err(|e| Error::ExifTool(format!("cannot start {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExifTool(format!(
                "{}: {}",
                path.display(),
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl MetadataReader for ExifTool {
    fn read(&self, path: &Path) -> Result<ImageMetadata> {
        let args: Vec<String> = [
            "-json",
            "-n",
            "-DateTimeOriginal",
            "-CreateDate",
            "-ImageWidth",
            "-ImageHeight",
            "-GPSLatitude",
            "-GPSLongitude",
        ]
        .iter()
        .map(|a| a.to_string())
        .collect();

        let output = self.run(&args, path)?;
        parse_metadata(&output.stdout, self.camera_offset)
    }
}

impl TagWriter for ExifTool {
    fn write_gps(&self, path: &Path, latitude: f64, longitude: f64) -> Result<()> {
        let lat_ref = if latitude < 0.0 { "S" } else { "N" };
        let lon_ref = if longitude < 0.0 { "W" } else { "E" };
        let args = vec![
            "-overwrite_original".to_string(),
            "-q".to_string(),
            format!("-GPSLatitude={}", latitude.abs()),
            format!("-GPSLatitudeRef={}", lat_ref),
            format!("-GPSLongitude={}", longitude.abs()),
            format!("-GPSLongitudeRef={}", lon_ref),
        ];

        self.run(&args, path)?;
        debug!("Wrote GPS {:.6}, {:.6} to {}", latitude, longitude, path.display());
        Ok(())
    }
}

/// Decode exiftool's JSON array (one object per file) into metadata.
fn parse_metadata(json: &[u8], camera_offset: FixedOffset) -> Result<ImageMetadata> {
    let mut records: Vec<ExifRecord> = serde_json::from_slice(json)?;
    if records.is_empty() {
        return Err(Error::ExifTool("no metadata returned".to_string()));
    }
    let record = records.swap_remove(0);

    let captured = record
        .date_time_original
        .as_deref()
        .and_then(|s| parse_exif_time(s, camera_offset))
        .or_else(|| {
            record
                .create_date
                .as_deref()
                .and_then(|s| parse_exif_time(s, camera_offset))
        });

    let gps = match (record.gps_latitude, record.gps_longitude) {
        (Some(lat), Some(lon)) => Some((lat, lon)),
        _ => None,
    };

    Ok(ImageMetadata {
        captured,
        width: record.image_width,
        height: record.image_height,
        gps,
    })
}

/// "2023:05:01 08:00:00" in camera-local time to UTC. Sub-seconds and
/// trailing zone suffixes are ignored; all-zero dates yield `None`.
pub fn parse_exif_time(value: &str, camera_offset: FixedOffset) -> Option<DateTime<Utc>> {
    let head = value.get(..19)?;
    let naive = NaiveDateTime::parse_from_str(head, EXIF_DATE_FORMAT).ok()?;
    camera_offset
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.with_timezone(&Utc))
}
