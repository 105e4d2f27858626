//! Nearest city lookup over a world cities dataset.
//!
//! A dataset is parsed once into a [CityCollection]. Lookups pre-filter the
//! collection to a small [SearchWindow] around the query and rank the
//! remaining candidates by great-circle distance.

mod city;
mod distance;
mod error;
pub mod load;
pub mod resolve;

pub use city::{City, Coordinate};
pub use distance::{great_circle_km, EARTH_RADIUS_KM};
pub use error::{InvalidWindowError, LoadError, NotFoundError};
pub use load::{LoadOptions, ParseMode};
pub use resolve::{CityCollection, Ranked, SearchWindow};
