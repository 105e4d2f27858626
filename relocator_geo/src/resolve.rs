use ordered_float::OrderedFloat;
use serde::Deserialize;

use crate::{great_circle_km, City, Coordinate, InvalidWindowError, NotFoundError};

/// Half-widths in degrees of the box used to pre-filter candidates.
///
/// This is a box in degrees, not a radius. A degree of longitude covers less
/// ground towards the poles, so high latitude callers may want a wider
/// longitude window.
///
/// Deserializing checks the half-widths like [SearchWindow::new] does. A missing
/// axis falls back to [SearchWindow::DEFAULT_DEGREES].
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "WindowDegrees")]
pub struct SearchWindow {
    pub latitude: f64,
    pub longitude: f64,
}

impl SearchWindow {
    pub const DEFAULT_DEGREES: f64 = 0.4;

    /// Fails if a half-width is negative, infinite or NaN. Such a window
    /// would never contain any city.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidWindowError> {
        let valid = |degrees: f64| degrees.is_finite() && degrees >= 0.0;

        if !valid(latitude) || !valid(longitude) {
            return Err(InvalidWindowError { latitude, longitude });
        }

        Ok(Self { latitude, longitude })
    }

    pub fn uniform(degrees: f64) -> Self {
        Self { latitude: degrees, longitude: degrees }
    }

    /// Returns the inclusive `(min, max)` latitude and longitude bounds around `center`.
    pub fn bounds(&self, center: Coordinate) -> ((f64, f64), (f64, f64)) {
        (
            (center.latitude - self.latitude, center.latitude + self.latitude),
            (center.longitude - self.longitude, center.longitude + self.longitude),
        )
    }

    pub fn contains(&self, center: Coordinate, point: Coordinate) -> bool {
        let ((lat_min, lat_max), (lon_min, lon_max)) = self.bounds(center);

        (lat_min..=lat_max).contains(&point.latitude)
            && (lon_min..=lon_max).contains(&point.longitude)
    }
}

impl Default for SearchWindow {
    fn default() -> Self {
        Self::uniform(Self::DEFAULT_DEGREES)
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct WindowDegrees {
    latitude: f64,
    longitude: f64,
}

impl Default for WindowDegrees {
    fn default() -> Self {
        Self {
            latitude: SearchWindow::DEFAULT_DEGREES,
            longitude: SearchWindow::DEFAULT_DEGREES,
        }
    }
}

impl TryFrom<WindowDegrees> for SearchWindow {
    type Error = InvalidWindowError;

    fn try_from(value: WindowDegrees) -> Result<Self, Self::Error> {
        SearchWindow::new(value.latitude, value.longitude)
    }
}

/// A candidate city with its distance to the query in kilometers.
#[derive(Clone, Debug)]
pub struct Ranked<C> {
    pub city: C,
    pub distance_km: f64,
}

/// Ranks the candidates by distance to `query`, closest first.
///
/// Cities at the same distance keep their relative input order.
pub fn rank<C, I>(query: Coordinate, candidates: I) -> Vec<Ranked<C>>
where
    C: std::borrow::Borrow<City>,
    I: IntoIterator<Item=C>,
{
    let mut ranked: Vec<_> = candidates.into_iter()
        .map(|city| {
            let distance_km = great_circle_km(city.borrow().coordinate(), query);
            Ranked { city, distance_km }
        })
        .collect();

    // sort_by_key is stable
    ranked.sort_by_key(|r| OrderedFloat(r.distance_km));
    ranked
}

/// Returns the candidate closest to `query`.
pub fn nearest<C, I>(query: Coordinate, candidates: I) -> Result<Ranked<C>, NotFoundError>
where
    C: std::borrow::Borrow<City>,
    I: IntoIterator<Item=C>,
{
    rank(query, candidates)
        .into_iter()
        .next()
        .ok_or(NotFoundError { latitude: query.latitude, longitude: query.longitude })
}

/// The parsed cities dataset. It is never modified after loading.
#[derive(Clone, Debug, Default)]
pub struct CityCollection {
    cities: Vec<City>,
}

impl CityCollection {
    pub fn new(cities: Vec<City>) -> Self {
        Self { cities }
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item=&City> + '_ {
        self.cities.iter()
    }

    pub fn as_slice(&self) -> &[City] {
        &self.cities
    }

    /// All cities inside `window` around `query`, in dataset order.
    pub fn candidates(&self, query: Coordinate, window: SearchWindow) -> impl Iterator<Item=&City> + '_ {
        self.cities
            .iter()
            .filter(move |city| window.contains(query, city.coordinate()))
    }

    /// Finds the closest city within the window around `query`.
    pub fn nearest(&self, query: Coordinate, window: SearchWindow) -> Result<&City, NotFoundError> {
        Ok(nearest(query, self.candidates(query, window))?.city)
    }

    /// Returns the name of the closest city within the default window.
    pub fn resolve(&self, query: Coordinate) -> Result<&str, NotFoundError> {
        let city = self.nearest(query, SearchWindow::default())?;
        Ok(city.name.as_str())
    }
}
