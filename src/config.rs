//! Configuration loading and resolution
//!
//! The config file is found in this order:
//! 1. `--config` command-line argument (highest priority)
//! 2. `PHOTO_INGEST_CONFIG` environment variable
//! 3. `<config dir>/photo-ingest/config.toml`
//! 4. Built-in defaults (no file)

use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::media::scan;
use crate::raw::thumbnail;
use crate::state::library::LocationStore;
use crate::{Error, Result};

pub const CONFIG_ENV_VAR: &str = "PHOTO_INGEST_CONFIG";

/// Settings for an ingest run. Every field has a default so a partial
/// file (or none) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Card mount point or transfer folder
    pub source_dir: Option<PathBuf>,
    /// Where photographs are copied to
    pub target_dir: Option<PathBuf>,
    /// GPX track logs
    pub track_dir: Option<PathBuf>,
    /// Location catalogue database
    pub database: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub thumbnail_size: u32,
    pub skip_thumbnails: bool,
    /// exiftool executable
    pub exiftool: String,
    pub image_extensions: Vec<String>,
    pub track_extensions: Vec<String>,
    /// Zone the camera clock is set to, e.g. "+02:00"
    pub camera_utc_offset: String,
    /// Name or ID of the location used when no track matches
    pub default_location: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            source_dir: None,
            target_dir: None,
            track_dir: None,
            database: LocationStore::default_path(),
            thumbnail_dir: thumbnail::default_thumbnail_dir(),
            thumbnail_size: thumbnail::THUMBNAIL_SIZE,
            skip_thumbnails: false,
            exiftool: "exiftool".to_string(),
            image_extensions: scan::default_image_extensions(),
            track_extensions: vec!["gpx".to_string()],
            camera_utc_offset: "+00:00".to_string(),
            default_location: None,
        }
    }
}

impl IngestConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: IngestConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load using the resolution order in the module docs.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        match find_config_file(cli_path, std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from)) {
            Some(path) => Self::load(&path),
            None => {
                debug!("No config file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.camera_offset()?;
        if self.thumbnail_size == 0 {
            return Err(Error::Config("thumbnail_size must be positive".to_string()));
        }
        if self.image_extensions.is_empty() {
            return Err(Error::Config("image_extensions is empty".to_string()));
        }
        Ok(())
    }

    pub fn camera_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.camera_utc_offset)
    }

    /// Source folder, or a configuration error naming the missing setting
    pub fn require_source(&self) -> Result<&Path> {
        self.source_dir
            .as_deref()
            .ok_or_else(|| Error::Config("no source_dir configured (use --source)".to_string()))
    }

    pub fn require_target(&self) -> Result<&Path> {
        self.target_dir
            .as_deref()
            .ok_or_else(|| Error::Config("no target_dir configured (use --target)".to_string()))
    }
}

/// An explicit path must exist; the env var and the user config file are
/// used only if present.
fn find_config_file(cli_path: Option<&Path>, env_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path {
        return Some(path);
    }
    dirs::config_dir()
        .map(|d| d.join("photo-ingest").join("config.toml"))
        .filter(|p| p.exists())
}

/// "+02:00", "-05:30", "Z" or "UTC"
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    let invalid = || Error::Config(format!("invalid camera_utc_offset '{}'", value));

    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60) as i32).ok_or_else(invalid)
}
