use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use exif::{Field, In, Tag, Value};
use relocator_geo::Coordinate;
use tracing::instrument;

/// Provides the location at which a media file was captured.
pub trait CoordinateSource: Send + Sync {
    /// Returns `None` if the file does not carry any location.
    fn coordinates(&self, path: &Path) -> Result<Option<Coordinate>>;
}

/// Reads GPS tags from the exif data of a file.
pub struct ExifCoordinates;

impl CoordinateSource for ExifCoordinates {
    #[instrument(skip_all, fields(? path))]
    fn coordinates(&self, path: &Path) -> Result<Option<Coordinate>> {
        let mut fp = BufReader::new(File::open(path)?);

        let parsed = match exif::Reader::new().read_from_container(&mut fp) {
            Ok(data) => data,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let latitude = parse_gps_coordinate_value(parsed.get_field(Tag::GPSLatitude, In::PRIMARY));
        let latitude_ref = parse_gps_coordinate_ref(parsed.get_field(Tag::GPSLatitudeRef, In::PRIMARY));
        let longitude = parse_gps_coordinate_value(parsed.get_field(Tag::GPSLongitude, In::PRIMARY));
        let longitude_ref = parse_gps_coordinate_ref(parsed.get_field(Tag::GPSLongitudeRef, In::PRIMARY));

        // multiply with east/west and north/south factor
        let latitude = latitude.and_then(|value| Some(value * latitude_ref?));
        let longitude = longitude.and_then(|value| Some(value * longitude_ref?));

        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Ok(Some(Coordinate::new(latitude, longitude))),
            _ => Ok(None),
        }
    }
}

fn parse_gps_coordinate_value(field: Option<&Field>) -> Option<f64> {
    let values = match &field?.value {
        Value::Rational(values) => values.get(..3)?,
        _ => return None,
    };

    Some(values[0].to_f64() + values[1].to_f64() / 60.0 + values[2].to_f64() / 3600.0)
}

fn parse_gps_coordinate_ref(field: Option<&Field>) -> Option<f64> {
    let value = match &field?.value {
        Value::Ascii(values) => values.first().and_then(|value| value.first()),
        _ => return None,
    };

    hemisphere_sign(*value?)
}

fn hemisphere_sign(letter: u8) -> Option<f64> {
    match letter {
        b'w' | b'W' | b's' | b'S' => Some(-1.0),
        b'e' | b'E' | b'n' | b'N' => Some(1.0),
        _ => None,
    }
}

/// Asks the `exiftool` binary for the gps position of a file.
pub struct ExiftoolCoordinates {
    program: String,
}

impl ExiftoolCoordinates {
    pub fn new() -> Self {
        Self { program: "exiftool".to_owned() }
    }
}

impl Default for ExiftoolCoordinates {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateSource for ExiftoolCoordinates {
    #[instrument(skip_all, fields(? path))]
    fn coordinates(&self, path: &Path) -> Result<Option<Coordinate>> {
        let output = Command::new(&self.program)
            .args(["-c", "%.6f", "-GPSPosition"])
            .arg(path)
            .output()
            .with_context(|| format!("run {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} failed with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim(),
            );
        }

        parse_exiftool_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses a line like `GPS Position : 40.446195 N, 79.948862 W`.
fn parse_exiftool_output(output: &str) -> Result<Option<Coordinate>> {
    let Some(line) = output.lines().find(|line| line.starts_with("GPS Position")) else {
        return Ok(None);
    };

    let (_, position) = line.split_once(':')
        .ok_or_else(|| anyhow!("no value in {:?}", line))?;

    let (latitude, longitude) = position.trim().split_once(',')
        .ok_or_else(|| anyhow!("expected latitude and longitude in {:?}", line))?;

    Ok(Some(Coordinate::new(parse_exiftool_value(latitude)?, parse_exiftool_value(longitude)?)))
}

fn parse_exiftool_value(text: &str) -> Result<f64> {
    let mut fields = text.split_whitespace();

    let value: f64 = fields.next()
        .ok_or_else(|| anyhow!("empty coordinate"))?
        .parse()
        .with_context(|| format!("parse coordinate {:?}", text))?;

    let sign = fields.next()
        .and_then(|hemisphere| hemisphere.bytes().next())
        .and_then(hemisphere_sign)
        .ok_or_else(|| anyhow!("no hemisphere in coordinate {:?}", text))?;

    Ok(value * sign)
}
