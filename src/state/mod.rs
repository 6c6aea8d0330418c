/// State management module
///
/// This module handles the data that outlives a single stage:
/// - The named-location catalogue (library.rs)
/// - Shared data structures (data.rs)

pub mod data;
pub mod library;
