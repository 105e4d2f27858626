use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use arcstr::ArcStr;
use csv::StringRecord;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{City, CityCollection, LoadError};

/// Number of fields expected in every dataset row.
pub const FIELD_COUNT: usize = 11;

/// How malformed numeric fields are treated.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Empty or unparseable numbers become zero.
    #[default]
    Lenient,

    /// Unparseable numbers and empty coordinates fail the load.
    Strict,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct LoadOptions {
    pub mode: ParseMode,

    /// Skip the first row of the input.
    pub has_header: bool,
}

/// Loads a dataset from a csv file. Files ending in `.gz` are decompressed on the fly.
pub fn load_path(path: impl AsRef<Path>, options: LoadOptions) -> Result<CityCollection, LoadError> {
    let path = path.as_ref();
    info!("Parse city dataset {:?}", path);

    let fp = BufReader::new(File::open(path)?);

    let is_gzip = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let collection = if is_gzip {
        load_reader(flate2::read::GzDecoder::new(fp), options)?
    } else {
        load_reader(fp, options)?
    };

    info!("Parsed {} cities from {:?}", collection.len(), path);
    Ok(collection)
}

/// Loads a dataset from any reader, keeping the input order of the rows.
pub fn load_reader(r: impl Read, options: LoadOptions) -> Result<CityCollection, LoadError> {
    let mut r = csv::ReaderBuilder::new()
        .has_headers(options.has_header)
        .flexible(true)
        .from_reader(r);

    let mut cities = Vec::<City>::new();
    let mut record = StringRecord::new();

    while r.read_record(&mut record)? {
        let row = record.position().map(|pos| pos.line()).unwrap_or_default();
        cities.push(parse_record(&record, row, options.mode)?);
    }

    debug!("Read {} rows", cities.len());
    Ok(CityCollection::new(cities))
}

fn parse_record(record: &StringRecord, row: u64, mode: ParseMode) -> Result<City, LoadError> {
    if record.len() < FIELD_COUNT {
        return Err(LoadError::ShortRow { row, found: record.len() });
    }

    let text = |idx: usize| ArcStr::from(&record[idx]);

    let field = Field { record, row, mode };

    if mode == ParseMode::Strict && record[0].trim().is_empty() {
        return Err(field.invalid(0, "name"));
    }

    Ok(City {
        name: text(0),
        ascii_name: text(1),
        latitude: field.coordinate(2, "lat")?,
        longitude: field.coordinate(3, "lng")?,
        country: text(4),
        iso2: text(5),
        iso3: text(6),
        admin_name: text(7),
        capital: text(8),
        population: field.number(9, "population")?,
        id: field.number(10, "id")?,
    })
}

struct Field<'a> {
    record: &'a StringRecord,
    row: u64,
    mode: ParseMode,
}

impl Field<'_> {
    /// Parses a latitude or longitude. Strict mode does not accept empty values here.
    fn coordinate(&self, idx: usize, name: &'static str) -> Result<f64, LoadError> {
        if self.mode == ParseMode::Strict && self.record[idx].trim().is_empty() {
            return Err(self.invalid(idx, name));
        }

        self.number(idx, name)
    }

    /// Parses a numeric value. An empty value is zero in both modes.
    fn number<T: FromStr + Default>(&self, idx: usize, name: &'static str) -> Result<T, LoadError> {
        let value = self.record[idx].trim();
        if value.is_empty() {
            return Ok(T::default());
        }

        match (value.parse::<T>(), self.mode) {
            (Ok(parsed), _) => Ok(parsed),
            (Err(_), ParseMode::Lenient) => Ok(T::default()),
            (Err(_), ParseMode::Strict) => Err(self.invalid(idx, name)),
        }
    }

    fn invalid(&self, idx: usize, field: &'static str) -> LoadError {
        LoadError::InvalidField {
            row: self.row,
            field,
            value: self.record[idx].to_owned(),
        }
    }
}
