use std::fmt::{Display, Formatter};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// A single row of the cities dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct City {
    pub name: ArcStr,
    pub ascii_name: ArcStr,
    pub latitude: f64,
    pub longitude: f64,
    pub country: ArcStr,
    pub iso2: ArcStr,
    pub iso3: ArcStr,
    pub admin_name: ArcStr,
    pub capital: ArcStr,
    pub population: u64,
    pub id: i64,
}

impl City {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A position in decimal degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}
