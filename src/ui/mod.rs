/// User-facing output
///
/// - Progress lines for the ingest stages (progress.rs)

pub mod progress;
