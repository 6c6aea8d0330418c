use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::data::Location;
use crate::geo::location_cache::LocationSource;
use crate::{Error, Result};

/// The LocationStore manages the SQLite catalogue of named places.
/// The ingest core only reads from it; rows are added through the
/// `locations add` command.
pub struct LocationStore {
    conn: Connection,
    db_path: PathBuf,
}

impl LocationStore {
    /// Open (or create) the catalogue at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        info!("📁 Location catalogue at: {}", db_path.display());

        let store = LocationStore {
            conn,
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory catalogue (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let store = LocationStore {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the path where the catalogue is stored by default
    /// - Linux: ~/.local/share/photo-ingest/locations.db
    /// - macOS: ~/Library/Application Support/photo-ingest/locations.db
    /// - Windows: %APPDATA%\photo-ingest\locations.db
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        path.push("photo-ingest");
        path.push("locations.db");
        path
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS locations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                latitude        REAL NOT NULL,
                longitude       REAL NOT NULL,
                region          TEXT NOT NULL DEFAULT '',
                zoom            INTEGER NOT NULL DEFAULT 12
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_locations_region
             ON locations(region)",
            [],
        )?;

        debug!("Location schema initialized");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn location_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Add a named location. Returns the new location ID.
    pub fn add_location(
        &self,
        name: &str,
        latitude: f64,
        longitude: f64,
        region: &str,
        zoom: u8,
    ) -> Result<i64> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::Config(format!(
                "coordinates out of range: {}, {}",
                latitude, longitude
            )));
        }

        self.conn.execute(
            "INSERT INTO locations (name, latitude, longitude, region, zoom)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, latitude, longitude, region, zoom],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch locations, optionally restricted to one region.
    /// Rows come back ordered by ID so repeated loads are identical.
    pub fn query_locations(&self, region: Option<&str>) -> Result<Vec<Location>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, latitude, longitude, region, zoom
             FROM locations
             WHERE ?1 IS NULL OR region = ?1
             ORDER BY id",
        )?;

        let rows = stmt.query_map(params![region], |row| {
            Ok(Location {
                id: row.get(0)?,
                name: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
                region: row.get(4)?,
                zoom: row.get(5)?,
            })
        })?;

        let mut locations = Vec::new();
        for location in rows {
            locations.push(location?);
        }
        Ok(locations)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Location>> {
        let location = self
            .conn
            .query_row(
                "SELECT id, name, latitude, longitude, region, zoom
                 FROM locations WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Location {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        latitude: row.get(2)?,
                        longitude: row.get(3)?,
                        region: row.get(4)?,
                        zoom: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(location)
    }
}

impl LocationSource for LocationStore {
    fn fetch_locations(&self) -> Result<Vec<Location>> {
        self.query_locations(None)
    }
}

impl std::fmt::Debug for LocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}
