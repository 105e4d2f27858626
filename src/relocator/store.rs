use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use relocator_geo::resolve::nearest;
use relocator_geo::{City, CityCollection, Coordinate, SearchWindow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use crate::relocator::db;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncOutcome {
    /// The stored cities already match the dataset.
    Fresh,

    /// The stored cities were replaced by the dataset.
    Repopulated { previous: u64, current: u64 },
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Fresh => write!(f, "up to date"),
            SyncOutcome::Repopulated { previous, current } => {
                write!(f, "repopulated, {} rows before, {} rows now", previous, current)
            }
        }
    }
}

/// Caches the cities dataset in a sqlite database.
#[derive(Clone)]
pub struct CityStore {
    db: SqlitePool,
}

impl CityStore {
    /// Opens the database at `url`, creating it and the cities table if needed.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("parse database url {:?}", url))?
            .create_if_missing(true);

        let db = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("open database {:?}", url))?;

        Self::new(db).await
    }

    pub async fn new(db: SqlitePool) -> Result<Self> {
        let mut conn = db.acquire().await?;
        db::create_schema(&mut conn).await?;
        Ok(Self { db })
    }

    pub async fn count(&self) -> Result<u64> {
        let mut tx = self.db.begin().await?;
        db::count_cities(&mut tx).await
    }

    /// Makes the stored cities match the given dataset.
    ///
    /// Only the number of rows is compared. If it differs, all stored cities
    /// are replaced within a single transaction.
    #[instrument(skip_all, fields(cities = cities.len()))]
    pub async fn sync(&self, cities: &CityCollection) -> Result<SyncOutcome> {
        let mut tx = self.db.begin().await?;

        let previous = db::count_cities(&mut tx).await?;
        let current = cities.len() as u64;

        if previous == current {
            debug!("City store is up to date with {} rows", current);
            return Ok(SyncOutcome::Fresh);
        }

        info!("City store has {} rows, expected {}. Repopulating", previous, current);

        db::clear_cities(&mut tx).await?;

        for city in cities.iter() {
            db::store_city(&mut tx, city).await?;
        }

        tx.commit().await?;

        Ok(SyncOutcome::Repopulated { previous, current })
    }

    /// Reads the candidate cities within `window` around `query`.
    pub async fn candidates(&self, query: Coordinate, window: SearchWindow) -> Result<Vec<City>> {
        let mut tx = self.db.begin().await?;
        db::read_cities_in_window(&mut tx, query, window).await
    }

    /// Finds the closest stored city within `window` around `query`.
    ///
    /// Fails with a [relocator_geo::NotFoundError] if no city is inside the window.
    #[instrument(skip(self))]
    pub async fn nearest(&self, query: Coordinate, window: SearchWindow) -> Result<City> {
        let candidates = self.candidates(query, window).await?;
        debug!("Ranking {} candidates", candidates.len());

        Ok(nearest(query, candidates)?.city)
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use relocator_geo::{load, LoadOptions, NotFoundError};

    use super::*;

    const CITIES: &str = "\
Springfield,Springfield,39.78,-89.65,United States,US,USA,Illinois,admin,114394,1840009517
Decatur,Decatur,39.8556,-88.9337,United States,US,USA,Illinois,,70522,1840007027
Jacksonville,Jacksonville,39.7292,-90.2317,United States,US,USA,Illinois,,,1840008440
";

    async fn memory_store() -> Result<CityStore> {
        // the in-memory database lives as long as its single connection
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        CityStore::new(db).await
    }

    fn dataset(input: &str) -> Result<CityCollection> {
        Ok(load::load_reader(input.as_bytes(), LoadOptions::default())?)
    }

    #[tokio::test]
    async fn sync_populates_empty_store() -> Result<()> {
        let store = memory_store().await?;
        assert_eq!(store.count().await?, 0);

        let outcome = store.sync(&dataset(CITIES)?).await?;
        assert_eq!(outcome, SyncOutcome::Repopulated { previous: 0, current: 3 });
        assert_eq!(store.count().await?, 3);

        Ok(())
    }

    #[test]
    fn sync_outcome_display() {
        assert_eq!(SyncOutcome::Fresh.to_string(), "up to date");

        let outcome = SyncOutcome::Repopulated { previous: 3, current: 42906 };
        assert_eq!(outcome.to_string(), "repopulated, 3 rows before, 42906 rows now");
    }

    #[tokio::test]
    async fn sync_same_count_does_not_duplicate() -> Result<()> {
        let store = memory_store().await?;
        let cities = dataset(CITIES)?;

        store.sync(&cities).await?;
        assert_eq!(store.sync(&cities).await?, SyncOutcome::Fresh);
        assert_eq!(store.count().await?, 3);

        Ok(())
    }

    #[tokio::test]
    async fn sync_mismatched_count_repopulates() -> Result<()> {
        let store = memory_store().await?;
        store.sync(&dataset(CITIES)?).await?;

        let fewer = dataset("Springfield,Springfield,39.78,-89.65,United States,US,USA,Illinois,admin,114394,1840009517\n")?;
        let outcome = store.sync(&fewer).await?;
        assert_eq!(outcome, SyncOutcome::Repopulated { previous: 3, current: 1 });
        assert_eq!(store.count().await?, 1);

        let everything = store.candidates(Coordinate::new(39.8, -89.6), SearchWindow::uniform(5.0)).await?;
        assert_eq!(everything.len(), 1);
        assert_eq!(everything[0].name, "Springfield");

        Ok(())
    }

    #[tokio::test]
    async fn stored_cities_round_trip() -> Result<()> {
        let store = memory_store().await?;
        let cities = dataset(CITIES)?;
        store.sync(&cities).await?;

        let stored = store.candidates(Coordinate::new(39.8, -89.6), SearchWindow::uniform(2.0)).await?;
        assert_eq!(stored.as_slice(), cities.as_slice());

        Ok(())
    }

    #[tokio::test]
    async fn nearest_from_store() -> Result<()> {
        let store = memory_store().await?;
        store.sync(&dataset(CITIES)?).await?;

        let springfield = store.nearest(Coordinate::new(39.8, -89.6), SearchWindow::default()).await?;
        assert_eq!(springfield.name, "Springfield");

        let decatur = store.nearest(Coordinate::new(39.84, -88.95), SearchWindow::default()).await?;
        assert_eq!(decatur.name, "Decatur");
        assert_eq!(decatur.population, 70522);

        Ok(())
    }

    #[tokio::test]
    async fn nearest_ties_keep_dataset_order() -> Result<()> {
        // mirrored on the equator, so both cities are equally far from the origin
        let first = "First,First,0.0,0.25,Nowhere,NW,NWH,,,,1\n";
        let second = "Second,Second,0.0,-0.25,Nowhere,NW,NWH,,,,2\n";
        let query = Coordinate::new(0.0, 0.0);

        let store = memory_store().await?;
        store.sync(&dataset(&format!("{}{}", first, second))?).await?;

        for _ in 0..5 {
            let city = store.nearest(query, SearchWindow::default()).await?;
            assert_eq!(city.name, "First");
        }

        let store = memory_store().await?;
        store.sync(&dataset(&format!("{}{}", second, first))?).await?;

        let city = store.nearest(query, SearchWindow::default()).await?;
        assert_eq!(city.name, "Second");

        Ok(())
    }

    #[tokio::test]
    async fn nearest_outside_window_is_not_found() -> Result<()> {
        let store = memory_store().await?;
        store.sync(&dataset(CITIES)?).await?;

        let err = store.nearest(Coordinate::new(0.0, 0.0), SearchWindow::default()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<NotFoundError>(),
            Some(&NotFoundError { latitude: 0.0, longitude: 0.0 })
        );

        Ok(())
    }

    #[tokio::test]
    async fn connect_creates_database_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cities.db");
        let url = format!("sqlite://{}", path.display());

        let store = CityStore::connect(&url).await?;
        store.sync(&dataset(CITIES)?).await?;
        assert!(path.exists());

        // a second connection sees the cached cities
        let reopened = CityStore::connect(&url).await?;
        assert_eq!(reopened.count().await?, 3);

        Ok(())
    }
}
