use std::sync::Arc;

use anyhow::Result;
use relocator_geo::{City, CityCollection, Coordinate, SearchWindow};

pub mod config;
mod db;
pub mod exif;
pub mod relocate;
pub mod scan;
pub mod store;

use crate::relocator::store::CityStore;

/// Looks up the closest city, either in memory or in the sqlite cache.
#[derive(Clone)]
pub enum CityResolver {
    Memory(Arc<CityCollection>),
    Store(CityStore),
}

impl CityResolver {
    /// Fails with a [relocator_geo::NotFoundError] if no city is inside the window.
    pub async fn nearest(&self, query: Coordinate, window: SearchWindow) -> Result<City> {
        match self {
            CityResolver::Memory(cities) => Ok(cities.nearest(query, window)?.clone()),
            CityResolver::Store(store) => store.nearest(query, window).await,
        }
    }
}
