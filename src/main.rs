//! photo-ingest - copy, geotag and thumbnail photographs from a camera card
//!
//! Stages run in order and stop at the first failure:
//! card check -> copy -> geotag -> thumbnails

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use photo_ingest::config::IngestConfig;
use photo_ingest::geo::{LocationCache, LocationSource};
use photo_ingest::media::dry_run::DryRun;
use photo_ingest::media::exiftool::ExifTool;
use photo_ingest::media::{MetadataReader, TagWriter};
use photo_ingest::state::library::LocationStore;
use photo_ingest::task::copy::CopyTask;
use photo_ingest::task::geotag::GeoTrackerTask;
use photo_ingest::task::mount::MountCheckTask;
use photo_ingest::task::thumbnail::ThumbnailTask;
use photo_ingest::task::{new_manifest, Pipeline, PhotoSource};
use photo_ingest::ui::progress::TerminalProgress;

#[derive(Parser, Debug)]
#[command(name = "photo-ingest", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Plain progress output without colours
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    overrides: Overrides,
}

/// Command-line values that replace config file settings
#[derive(Args, Debug)]
struct Overrides {
    /// Card mount point or transfer folder
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Folder photographs are copied into
    #[arg(long, global = true)]
    target: Option<PathBuf>,

    /// Folder with GPX track logs
    #[arg(long, global = true)]
    tracks: Option<PathBuf>,

    /// Location name or ID used when no track matches
    #[arg(long, global = true)]
    default_location: Option<String>,

    /// Location catalogue database
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Camera clock zone, e.g. +02:00
    #[arg(long, global = true)]
    offset: Option<String>,

    /// Log GPS writes instead of modifying files
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check card, copy, geotag and render thumbnails (default)
    Ingest,
    /// Geotag the photographs already in a folder
    Geotag {
        /// Folder with photographs
        dir: PathBuf,
    },
    /// Manage the named-location catalogue
    Locations {
        #[command(subcommand)]
        command: LocationCommand,
    },
}

#[derive(Subcommand, Debug)]
enum LocationCommand {
    /// List known locations
    List {
        /// Only this region
        #[arg(long)]
        region: Option<String>,
    },
    /// Add a named location
    Add {
        name: String,
        #[arg(allow_hyphen_values = true)]
        latitude: f64,
        #[arg(allow_hyphen_values = true)]
        longitude: f64,
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value_t = 12)]
        zoom: u8,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_overrides(config: &mut IngestConfig, overrides: &Overrides) -> Result<()> {
    if let Some(source) = &overrides.source {
        config.source_dir = Some(source.clone());
    }
    if let Some(target) = &overrides.target {
        config.target_dir = Some(target.clone());
    }
    if let Some(tracks) = &overrides.tracks {
        config.track_dir = Some(tracks.clone());
    }
    if let Some(location) = &overrides.default_location {
        config.default_location = Some(location.clone());
    }
    if let Some(database) = &overrides.database {
        config.database = database.clone();
    }
    if let Some(offset) = &overrides.offset {
        config.camera_utc_offset = offset.clone();
    }
    config.validate()?;
    Ok(())
}

/// The metadata collaborators, real or dry-run
fn exif_collaborators(
    config: &IngestConfig,
    dry_run: bool,
) -> Result<(Rc<dyn MetadataReader>, Rc<dyn TagWriter>)> {
    let exiftool = ExifTool::new(config.exiftool.clone(), config.camera_offset()?);
    if !exiftool.is_available() {
        bail!("'{}' could not be started; is exiftool installed?", config.exiftool);
    }

    if dry_run {
        let dry = Rc::new(DryRun::new(exiftool));
        let reader: Rc<dyn MetadataReader> = dry.clone();
        let writer: Rc<dyn TagWriter> = dry;
        Ok((reader, writer))
    } else {
        let exiftool = Rc::new(exiftool);
        let reader: Rc<dyn MetadataReader> = exiftool.clone();
        let writer: Rc<dyn TagWriter> = exiftool;
        Ok((reader, writer))
    }
}

fn run_ingest(config: &IngestConfig, dry_run: bool, color: bool) -> Result<bool> {
    let source = config.require_source()?.to_path_buf();
    let target = config.require_target()?.to_path_buf();

    let store: Rc<dyn LocationSource> = Rc::new(LocationStore::open(&config.database)?);
    let cache = Rc::new(LocationCache::new());
    let (reader, writer) = exif_collaborators(config, dry_run)?;
    let manifest = new_manifest();

    let mut pipeline = Pipeline::new()
        .with(Box::new(MountCheckTask::new(source.clone())))
        .with(Box::new(
            CopyTask::new(source, target.clone(), config.image_extensions.clone(), manifest.clone())
                .with_tracks(config.track_dir.clone(), config.track_extensions.clone()),
        ))
        .with(Box::new(
            GeoTrackerTask::new(
                PhotoSource::Manifest(manifest.clone()),
                cache,
                store,
                reader,
                writer,
            )
            .with_tracks(config.track_dir.clone(), config.track_extensions.clone())
            .with_default_location(config.default_location.clone()),
        ));

    if !config.skip_thumbnails {
        pipeline.push(Box::new(
            ThumbnailTask::new(
                PhotoSource::Manifest(manifest),
                config.thumbnail_dir.clone(),
                config.thumbnail_size,
            )
            .with_root(target),
        ));
    }

    let mut display = TerminalProgress::new(color);
    let report = pipeline.run(&mut |state| display.update(state));
    Ok(report.succeeded())
}

fn run_geotag(config: &IngestConfig, dir: PathBuf, dry_run: bool, color: bool) -> Result<bool> {
    let store: Rc<dyn LocationSource> = Rc::new(LocationStore::open(&config.database)?);
    let (reader, writer) = exif_collaborators(config, dry_run)?;

    let source = PhotoSource::Directory {
        dir,
        extensions: config.image_extensions.clone(),
    };
    let task = GeoTrackerTask::new(source, Rc::new(LocationCache::new()), store, reader, writer)
        .with_tracks(config.track_dir.clone(), config.track_extensions.clone())
        .with_default_location(config.default_location.clone());

    let mut display = TerminalProgress::new(color);
    let report = Pipeline::new()
        .with(Box::new(task))
        .run(&mut |state| display.update(state));
    Ok(report.succeeded())
}

fn run_locations(config: &IngestConfig, command: LocationCommand) -> Result<()> {
    let store = LocationStore::open(&config.database)
        .with_context(|| format!("opening {}", config.database.display()))?;

    match command {
        LocationCommand::List { region } => {
            info!(
                "{} locations in {}",
                store.location_count()?,
                store.path().display()
            );
            for location in store.query_locations(region.as_deref())? {
                println!(
                    "{:>4}  {:<30} {:>10.5} {:>11.5}  {} (zoom {})",
                    location.id,
                    location.name,
                    location.latitude,
                    location.longitude,
                    location.region,
                    location.zoom
                );
            }
        }
        LocationCommand::Add {
            name,
            latitude,
            longitude,
            region,
            zoom,
        } => {
            // Default locations are looked up by name
            if let Some(existing) = store.find_by_name(&name)? {
                bail!("location '{}' already exists with ID {}", name, existing.id);
            }
            let id = store.add_location(&name, latitude, longitude, &region, zoom)?;
            info!("Added location {} '{}'", id, name);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("photo-ingest {}", env!("CARGO_PKG_VERSION"));

    let mut config = IngestConfig::resolve(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli.overrides)?;
    let color = !cli.no_color;
    let dry_run = cli.overrides.dry_run;

    let succeeded = match cli.command.unwrap_or(Command::Ingest) {
        Command::Ingest => run_ingest(&config, dry_run, color)?,
        Command::Geotag { dir } => run_geotag(&config, dir, dry_run, color)?,
        Command::Locations { command } => {
            run_locations(&config, command)?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
