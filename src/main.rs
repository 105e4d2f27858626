use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relocator_geo::{load, Coordinate, NotFoundError};
use tokio::task::spawn_blocking;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::relocator::config::{CoordinatesConfig, RelocatorConfig};
use crate::relocator::exif::{CoordinateSource, ExifCoordinates, ExiftoolCoordinates};
use crate::relocator::relocate::Relocator;
use crate::relocator::store::CityStore;
use crate::relocator::CityResolver;

pub mod relocator;

/// Move images according to their GPS location
#[derive(Parser)]
#[command(name = "image-relocator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to scan for images
    #[arg(short = 'd', long, required_unless_present = "lat")]
    image_dir: Option<PathBuf>,

    /// Cities dataset in csv format, optionally gzip compressed
    #[arg(short = 'g', long, env = "RELOCATOR_CSV_FILE")]
    csv_file: PathBuf,

    /// Configuration file in yaml format
    #[arg(short, long, env = "RELOCATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Move the images into city directories below this directory.
    /// Without a target, moves are only printed.
    #[arg(short, long)]
    target: Option<PathBuf>,

    /// Latitude of a single coordinate to resolve instead of scanning a directory
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude of the coordinate to resolve
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => relocator::config::load(path)?,
        None => RelocatorConfig::default(),
    };

    let cities = {
        let path = cli.csv_file.clone();
        let options = config.load_options();
        spawn_blocking(move || load::load_path(path, options)).await?
            .with_context(|| format!("load cities from {:?}", cli.csv_file))?
    };

    let resolver = match &config.database {
        Some(url) => {
            info!("Set up city store in {}", url);
            let store = CityStore::connect(url).await.context("initialize city store")?;
            let outcome = store.sync(&cities).await.context("sync city store")?;
            info!("City store {}, holds {} cities", outcome, store.count().await?);
            CityResolver::Store(store)
        }

        None => CityResolver::Memory(Arc::new(cities)),
    };

    if let (Some(latitude), Some(longitude)) = (cli.lat, cli.lon) {
        let query = Coordinate::new(latitude, longitude);

        return match resolver.nearest(query, config.search_window).await {
            Ok(city) => {
                println!("{}", city.name);
                Ok(())
            }

            Err(err) if err.is::<NotFoundError>() => {
                warn!("{}", err);
                println!("{}", config.default_bucket);
                Ok(())
            }

            Err(err) => Err(err),
        };
    }

    let Some(image_dir) = cli.image_dir else {
        anyhow::bail!("no image directory given");
    };

    info!("Scan {:?} for images", image_dir);
    let files = spawn_blocking(move || {
        relocator::scan::scan_iter(&image_dir)
            .filter_map(|res| match res {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!("Failed to scan file: {:?}", err);
                    None
                }
            })
            .collect::<Vec<_>>()
    }).await?;

    info!("Found {} images", files.len());

    let source: Arc<dyn CoordinateSource> = match config.coordinates {
        CoordinatesConfig::Exif => Arc::new(ExifCoordinates),
        CoordinatesConfig::Exiftool => Arc::new(ExiftoolCoordinates::new()),
    };

    let relocator = Relocator {
        resolver,
        source,
        window: config.search_window,
        default_bucket: config.default_bucket.clone(),
        target: cli.target,
        workers: usize::from(config.workers.get()),
    };

    relocator.run(files).await?;

    Ok(())
}
