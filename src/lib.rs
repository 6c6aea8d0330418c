//! photo-ingest - card-to-catalogue photo ingest
//!
//! Copies photographs off a camera card, geotags them from GPX track logs
//! (or a fallback named location) and renders thumbnails, as a sequence of
//! progress-tracked stages.

pub mod config;
pub mod error;
pub mod geo;
pub mod media;
pub mod raw;
pub mod state;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
