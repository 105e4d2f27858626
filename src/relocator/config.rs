use std::fs::File;
use std::num::NonZeroU8;
use std::path::Path;

use anyhow::{Context, Result};
use relocator_geo::{LoadOptions, ParseMode, SearchWindow};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelocatorConfig {
    // sqlite database url used to cache the cities dataset.
    // Without a database, the cities are kept in memory only.
    pub database: Option<String>,

    pub search_window: SearchWindow,

    pub parse_mode: ParseMode,

    // skip the first row of the cities dataset
    pub has_header: bool,

    /// Directory name for files without location or without a city nearby.
    pub default_bucket: String,

    pub coordinates: CoordinatesConfig,

    /// Number of files processed concurrently.
    pub workers: NonZeroU8,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinatesConfig {
    // read exif data in process
    #[default]
    Exif,

    // ask the exiftool binary
    Exiftool,
}

impl Default for RelocatorConfig {
    fn default() -> Self {
        Self {
            database: Some("sqlite://relocator.db".to_owned()),
            search_window: SearchWindow::default(),
            parse_mode: ParseMode::default(),
            has_header: false,
            default_bucket: "unknown".to_owned(),
            coordinates: CoordinatesConfig::default(),
            workers: NonZeroU8::new(4).unwrap_or(NonZeroU8::MIN),
        }
    }
}

impl RelocatorConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            mode: self.parse_mode,
            has_header: self.has_header,
        }
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<RelocatorConfig> {
    let path = path.as_ref();
    let fp = File::open(path).with_context(|| format!("open config {:?}", path))?;
    let config = serde_yaml::from_reader(fp).with_context(|| format!("parse config {:?}", path))?;
    Ok(config)
}
