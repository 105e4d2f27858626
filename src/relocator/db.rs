use std::ops::DerefMut;

use anyhow::Result;
use arcstr::ArcStr;
use relocator_geo::{City, Coordinate, SearchWindow};
use sqlx::{Sqlite, SqliteConnection, Transaction};

const CREATE_CITIES: &str = "
    CREATE TABLE IF NOT EXISTS cities (
        city TEXT NOT NULL,
        city_ascii TEXT NOT NULL,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        country TEXT NOT NULL,
        iso2 TEXT NOT NULL,
        iso3 TEXT NOT NULL,
        admin_name TEXT NOT NULL,
        capital TEXT NOT NULL,
        population INTEGER NOT NULL,
        id INTEGER NOT NULL
    )";

const CREATE_CITIES_POSITION: &str = "CREATE INDEX IF NOT EXISTS cities_position ON cities (lat, lng)";

#[derive(sqlx::FromRow)]
struct CityRow {
    pub city: String,
    pub city_ascii: String,
    pub lat: f64,
    pub lng: f64,
    pub country: String,
    pub iso2: String,
    pub iso3: String,
    pub admin_name: String,
    pub capital: String,
    pub population: i64,
    pub id: i64,
}

impl From<CityRow> for City {
    fn from(row: CityRow) -> Self {
        Self {
            name: ArcStr::from(row.city),
            ascii_name: ArcStr::from(row.city_ascii),
            latitude: row.lat,
            longitude: row.lng,
            country: ArcStr::from(row.country),
            iso2: ArcStr::from(row.iso2),
            iso3: ArcStr::from(row.iso3),
            admin_name: ArcStr::from(row.admin_name),
            capital: ArcStr::from(row.capital),
            population: u64::try_from(row.population).unwrap_or_default(),
            id: row.id,
        }
    }
}

/// Creates the cities table if it does not exist yet.
pub async fn create_schema(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(CREATE_CITIES).execute(&mut *conn).await?;
    sqlx::query(CREATE_CITIES_POSITION).execute(&mut *conn).await?;
    Ok(())
}

pub async fn count_cities(tx: &mut Transaction<'_, Sqlite>) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cities")
        .fetch_one(tx.deref_mut())
        .await?;

    Ok(count as u64)
}

pub async fn clear_cities(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    sqlx::query("DELETE FROM cities")
        .execute(tx.deref_mut())
        .await?;

    Ok(())
}

/// Stores a single city of the dataset.
pub async fn store_city(tx: &mut Transaction<'_, Sqlite>, city: &City) -> Result<()> {
    sqlx::query("INSERT INTO cities (city, city_ascii, lat, lng, country, iso2, iso3, admin_name, capital, population, id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")
        .bind(city.name.as_str())
        .bind(city.ascii_name.as_str())
        .bind(city.latitude)
        .bind(city.longitude)
        .bind(city.country.as_str())
        .bind(city.iso2.as_str())
        .bind(city.iso3.as_str())
        .bind(city.admin_name.as_str())
        .bind(city.capital.as_str())
        .bind(i64::try_from(city.population).unwrap_or(i64::MAX))
        .bind(city.id)
        .execute(tx.deref_mut())
        .await?;

    Ok(())
}

/// Reads all cities inside the window around `center`, in insertion order.
pub async fn read_cities_in_window(
    tx: &mut Transaction<'_, Sqlite>,
    center: Coordinate,
    window: SearchWindow,
) -> Result<Vec<City>> {
    let ((lat_min, lat_max), (lon_min, lon_max)) = window.bounds(center);

    let rows: Vec<CityRow> = sqlx::query_as(
        "SELECT * FROM cities WHERE lat BETWEEN ? AND ? AND lng BETWEEN ? AND ? ORDER BY rowid",
    )
        .bind(lat_min)
        .bind(lat_max)
        .bind(lon_min)
        .bind(lon_max)
        .fetch_all(tx.deref_mut())
        .await?;

    Ok(rows.into_iter().map(City::from).collect())
}
