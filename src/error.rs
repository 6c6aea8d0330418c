//! Error types for photo-ingest

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while ingesting photographs
#[derive(Error, Debug)]
pub enum Error {
    /// Location catalogue error (wraps rusqlite::Error)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error
    #[error("Directory scan error: {0}")]
    Walk(#[from] walkdir::Error),

    /// exiftool produced JSON we could not read
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML configuration file
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The external exiftool command failed or reported an error
    #[error("exiftool failed: {0}")]
    ExifTool(String),

    /// A GPS track log could not be parsed
    #[error("Cannot parse track {}: {message}", path.display())]
    TrackParse { path: PathBuf, message: String },

    /// A track without samples was asked for a position
    #[error("Track '{0}' has no samples")]
    EmptyTrack(String),

    /// A stage cannot run because its inputs are missing
    #[error("{0}")]
    Precondition(String),
}
