use thiserror::Error;

/// Reading or parsing the cities dataset failed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A row has fewer than the eleven expected fields.
    #[error("row {row}: expected 11 fields, found {found}")]
    ShortRow { row: u64, found: usize },

    /// A field is empty or could not be parsed. Only raised in strict mode.
    #[error("row {row}: invalid value {value:?} for field {field}")]
    InvalidField { row: u64, field: &'static str, value: String },
}

/// No city lies within the search window around the coordinate.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("no cities found near lat={latitude}, lon={longitude}")]
pub struct NotFoundError {
    pub latitude: f64,
    pub longitude: f64,
}

/// A search window with a negative or non-finite half-width.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid search window latitude={latitude}, longitude={longitude}: half-widths must be finite and not negative")]
pub struct InvalidWindowError {
    pub latitude: f64,
    pub longitude: f64,
}
