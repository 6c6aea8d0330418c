//! In-memory index of named locations with nearest-neighbour lookup.
//!
//! The cache is constructed empty, filled exactly once from a
//! [`LocationSource`] and read-only afterwards. Callers share it by
//! handle (`Rc<LocationCache>`); there is no global instance.

use std::cell::OnceCell;
use tracing::info;

use crate::state::data::Location;
use crate::Result;

/// Where the cache gets its rows from (the location catalogue in practice)
pub trait LocationSource {
    fn fetch_locations(&self) -> Result<Vec<Location>>;
}

#[derive(Debug, Default)]
pub struct LocationCache {
    locations: OnceCell<Vec<Location>>,
}

impl LocationCache {
    /// An unloaded cache
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that is already loaded with the given locations
    pub fn with_locations(locations: Vec<Location>) -> Self {
        let cache = Self::new();
        let _ = cache.locations.set(locations);
        cache
    }

    /// Load from the source unless already loaded. A failed load leaves the
    /// cache unloaded so a later run may try again.
    pub fn ensure_loaded(&self, source: &dyn LocationSource) -> Result<()> {
        if self.locations.get().is_some() {
            return Ok(());
        }
        let rows = source.fetch_locations()?;
        info!("📍 Loaded {} named locations", rows.len());
        let _ = self.locations.set(rows);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.locations.get().is_some()
    }

    fn all(&self) -> &[Location] {
        self.locations.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Location> {
        self.all().iter().find(|l| l.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Location> {
        self.all().iter().find(|l| l.name == name)
    }

    /// Resolve a user-supplied reference: a numeric ID or an exact name.
    pub fn resolve(&self, reference: &str) -> Option<&Location> {
        match reference.trim().parse::<i64>() {
            Ok(id) => self.get(id),
            Err(_) => self.find_by_name(reference.trim()),
        }
    }

    /// Closest location by squared distance in raw degree space.
    ///
    /// Only meaningful over a few hundred kilometres: no great-circle
    /// correction is applied. Ties keep the earliest loaded location.
    pub fn get_closest(&self, latitude: f64, longitude: f64) -> Option<&Location> {
        let mut best: Option<(&Location, f64)> = None;
        for location in self.all() {
            let d_lat = location.latitude - latitude;
            let d_lon = location.longitude - longitude;
            let distance = d_lat * d_lat + d_lon * d_lon;
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((location, distance)),
            }
        }
        best.map(|(location, _)| location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::Cell;

    fn location(id: i64, name: &str, latitude: f64, longitude: f64) -> Location {
        Location {
            id,
            name: name.to_string(),
            latitude,
            longitude,
            region: String::new(),
            zoom: 12,
        }
    }

    struct CountingSource {
        calls: Cell<usize>,
        fail: bool,
    }

    impl LocationSource for CountingSource {
        fn fetch_locations(&self) -> Result<Vec<Location>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(Error::NotFound("catalogue offline".to_string()));
            }
            Ok(vec![location(1, "Harbour", 52.1, 4.27)])
        }
    }

    #[test]
    fn test_closest_of_three() {
        let cache = LocationCache::with_locations(vec![
            location(1, "origin", 0.0, 0.0),
            location(2, "near", 1.0, 1.0),
            location(3, "far", 10.0, 10.0),
        ]);

        assert_eq!(cache.get_closest(0.4, 0.4).unwrap().name, "origin");
        assert_eq!(cache.get_closest(0.6, 0.6).unwrap().name, "near");
        assert_eq!(cache.get_closest(7.0, 6.0).unwrap().name, "far");
    }

    #[test]
    fn test_closest_on_empty_cache() {
        assert!(LocationCache::new().get_closest(1.0, 1.0).is_none());
        assert!(LocationCache::with_locations(Vec::new())
            .get_closest(1.0, 1.0)
            .is_none());
    }

    #[test]
    fn test_loads_once() {
        let source = CountingSource {
            calls: Cell::new(0),
            fail: false,
        };
        let cache = LocationCache::new();
        cache.ensure_loaded(&source).unwrap();
        cache.ensure_loaded(&source).unwrap();
        assert_eq!(source.calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_load_stays_unloaded() {
        let source = CountingSource {
            calls: Cell::new(0),
            fail: true,
        };
        let cache = LocationCache::new();
        assert!(cache.ensure_loaded(&source).is_err());
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_resolve_by_id_or_name() {
        let cache = LocationCache::with_locations(vec![
            location(7, "Harbour", 52.1, 4.27),
            location(9, "Dunes", 52.14, 4.3),
        ]);
        assert_eq!(cache.resolve("9").unwrap().name, "Dunes");
        assert_eq!(cache.resolve(" Harbour ").unwrap().id, 7);
        assert!(cache.resolve("Lighthouse").is_none());
    }
}
