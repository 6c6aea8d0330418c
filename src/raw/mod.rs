/// Image decoding module
///
/// This module handles:
/// - Extracting embedded JPEGs from RAW files
/// - Generating thumbnails
/// - Caching thumbnails to disk

pub mod thumbnail;
