use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures_util::{stream, StreamExt};
use relocator_geo::{Coordinate, NotFoundError, SearchWindow};
use tokio::fs;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::relocator::exif::CoordinateSource;
use crate::relocator::CityResolver;

/// Where a single file belongs.
#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    /// A city was found close to the coordinate of the file.
    City { coordinate: Coordinate, bucket: String },

    /// The file has a coordinate, but no city is close to it.
    NoCityNearby { coordinate: Coordinate },

    /// The file carries no location at all.
    NoLocation,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    pub moved: usize,
    pub planned: usize,
    pub default_bucket: usize,
    pub skipped: usize,
}

pub struct Relocator {
    pub resolver: CityResolver,
    pub source: Arc<dyn CoordinateSource>,
    pub window: SearchWindow,
    pub default_bucket: String,

    /// Files are moved below this directory. Without a target, moves are only printed.
    pub target: Option<PathBuf>,

    pub workers: usize,
}

impl Relocator {
    /// Places and moves all given files. Stops on the first store error.
    pub async fn run(&self, files: Vec<PathBuf>) -> Result<Summary> {
        let mut summary = Summary::default();

        let mut placements = stream::iter(files)
            .map(|path| async move {
                let placement = self.place(&path).await;
                (path, placement)
            })
            .buffered(self.workers.max(1));

        while let Some((path, placement)) = placements.next().await {
            let placement = match placement? {
                Some(placement) => placement,
                None => {
                    summary.skipped += 1;
                    continue;
                }
            };

            let bucket = match &placement {
                Placement::City { bucket, .. } => bucket.as_str(),
                _ => {
                    summary.default_bucket += 1;
                    self.default_bucket.as_str()
                }
            };

            let Some(target) = &self.target else {
                match &placement {
                    Placement::City { coordinate, .. } | Placement::NoCityNearby { coordinate } => {
                        println!("{} ({}) should go to the '{}' directory", path.display(), coordinate, bucket)
                    }

                    Placement::NoLocation => {
                        println!("{} (no location) should go to the '{}' directory", path.display(), bucket)
                    }
                }

                summary.planned += 1;
                continue;
            };

            match move_into(&path, &target.join(bucket)).await {
                Ok(Some(dest)) => {
                    debug!("Moved {:?} to {:?}", path, dest);
                    summary.moved += 1;
                }

                Ok(None) => {
                    warn!("Not moving {:?} into {:?}, file already exists", path, bucket);
                    summary.skipped += 1;
                }

                Err(err) => {
                    warn!("Failed to move {:?}: {:?}", path, err);
                    summary.skipped += 1;
                }
            }
        }

        info!(
            "Moved {}, planned {}, default bucket {}, skipped {}",
            summary.moved, summary.planned, summary.default_bucket, summary.skipped,
        );

        Ok(summary)
    }

    /// Finds the bucket of a single file.
    ///
    /// Returns `None` if the location of the file could not be read.
    /// Errors are reserved for failures of the city lookup itself.
    pub async fn place(&self, path: &Path) -> Result<Option<Placement>> {
        let source = self.source.clone();
        let owned = path.to_owned();

        let coordinate = match spawn_blocking(move || source.coordinates(&owned)).await? {
            Ok(Some(coordinate)) => coordinate,
            Ok(None) => return Ok(Some(Placement::NoLocation)),
            Err(err) => {
                warn!("Failed to read location of {:?}: {:?}", path, err);
                return Ok(None);
            }
        };

        match self.resolver.nearest(coordinate, self.window).await {
            Ok(city) => {
                let bucket = bucket_name(&city.name, &self.default_bucket);
                Ok(Some(Placement::City { coordinate, bucket }))
            }

            Err(err) if err.is::<NotFoundError>() => {
                debug!("No city near {} for {:?}", coordinate, path);
                Ok(Some(Placement::NoCityNearby { coordinate }))
            }

            Err(err) => Err(err.context(format!("resolve city for {:?}", path))),
        }
    }
}

/// Turns a city name into a name usable as a single directory.
pub fn bucket_name(city: &str, default_bucket: &str) -> String {
    let name: String = city
        .trim()
        .chars()
        .map(|ch| if ch == '/' || ch == '\\' || ch.is_control() { '_' } else { ch })
        .collect();

    if name.is_empty() || name.chars().all(|ch| ch == '.') {
        return default_bucket.to_owned();
    }

    name
}

/// Moves `path` into the directory `dir`.
///
/// Returns `None` without touching anything if the destination already exists.
async fn move_into(path: &Path, dir: &Path) -> Result<Option<PathBuf>> {
    let name = path.file_name().ok_or_else(|| anyhow!("no filename for {:?}", path))?;
    let dest = dir.join(name);

    if fs::try_exists(&dest).await? {
        return Ok(None);
    }

    fs::create_dir_all(dir).await
        .with_context(|| format!("create directory {:?}", dir))?;

    match fs::rename(path, &dest).await {
        Ok(()) => {}

        // rename does not work across file systems
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            copy_and_remove(path, &dest).await?;
        }

        Err(err) => {
            return Err(err).with_context(|| format!("rename {:?} to {:?}", path, dest));
        }
    }

    Ok(Some(dest))
}

/// Copies `path` to `dest`, then removes `path`.
///
/// On failure the file is left at `path` only, and nothing remains at `dest`.
async fn copy_and_remove(path: &Path, dest: &Path) -> Result<()> {
    if let Err(err) = fs::copy(path, dest).await {
        let _ = fs::remove_file(dest).await;
        return Err(err).with_context(|| format!("copy {:?} to {:?}", path, dest));
    }

    if let Err(err) = fs::remove_file(path).await {
        let _ = fs::remove_file(dest).await;
        return Err(err).with_context(|| format!("remove {:?} after copying", path));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use anyhow::bail;
    use relocator_geo::{load, LoadOptions};

    use super::*;

    const CITIES: &str = "\
Springfield,Springfield,39.78,-89.65,United States,US,USA,Illinois,admin,114394,1840009517
Frankfurt am Main/Höchst,Frankfurt am Main/Hochst,50.1,8.54,Germany,DE,DEU,Hesse,,,1
";

    /// Hands out fixed coordinates by file name.
    struct FixedCoordinates(HashMap<&'static str, Option<Coordinate>>);

    impl CoordinateSource for FixedCoordinates {
        fn coordinates(&self, path: &Path) -> Result<Option<Coordinate>> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            match self.0.get(name) {
                Some(coordinate) => Ok(*coordinate),
                None => bail!("unreadable metadata in {:?}", path),
            }
        }
    }

    fn relocator(target: Option<PathBuf>) -> Result<Relocator> {
        let cities = load::load_reader(CITIES.as_bytes(), LoadOptions::default())?;

        let source = FixedCoordinates(HashMap::from([
            ("springfield.jpg", Some(Coordinate::new(39.8, -89.6))),
            ("frankfurt.jpg", Some(Coordinate::new(50.11, 8.6))),
            ("ocean.jpg", Some(Coordinate::new(0.0, 0.0))),
            ("plain.jpg", None),
        ]));

        Ok(Relocator {
            resolver: CityResolver::Memory(Arc::new(cities)),
            source: Arc::new(source),
            window: SearchWindow::default(),
            default_bucket: "unknown".to_owned(),
            target,
            workers: 2,
        })
    }

    #[test]
    fn bucket_names() {
        assert_eq!(bucket_name("Springfield", "unknown"), "Springfield");
        assert_eq!(bucket_name("  São Paulo ", "unknown"), "São Paulo");
        assert_eq!(bucket_name("Frankfurt am Main/Höchst", "unknown"), "Frankfurt am Main_Höchst");
        assert_eq!(bucket_name("a\\b\tc", "unknown"), "a_b_c");
        assert_eq!(bucket_name("", "unknown"), "unknown");
        assert_eq!(bucket_name("..", "unknown"), "unknown");
    }

    #[tokio::test]
    async fn place_files() -> Result<()> {
        let relocator = relocator(None)?;

        let placement = relocator.place(Path::new("/photos/springfield.jpg")).await?;
        assert_eq!(placement, Some(Placement::City {
            coordinate: Coordinate::new(39.8, -89.6),
            bucket: "Springfield".to_owned(),
        }));

        let placement = relocator.place(Path::new("/photos/ocean.jpg")).await?;
        assert_eq!(placement, Some(Placement::NoCityNearby { coordinate: Coordinate::new(0.0, 0.0) }));

        let placement = relocator.place(Path::new("/photos/plain.jpg")).await?;
        assert_eq!(placement, Some(Placement::NoLocation));

        let placement = relocator.place(Path::new("/photos/broken.jpg")).await?;
        assert_eq!(placement, None);

        Ok(())
    }

    #[tokio::test]
    async fn run_moves_files_into_buckets() -> Result<()> {
        let photos = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;

        let names = ["springfield.jpg", "frankfurt.jpg", "ocean.jpg", "plain.jpg", "broken.jpg"];
        for name in names {
            std::fs::write(photos.path().join(name), name)?;
        }

        // a file of the same name already waits in the destination
        std::fs::create_dir_all(target.path().join("unknown"))?;
        std::fs::write(target.path().join("unknown/plain.jpg"), "older")?;

        let relocator = relocator(Some(target.path().to_owned()))?;
        let files = names.iter().map(|name| photos.path().join(name)).collect();
        let summary = relocator.run(files).await?;

        assert_eq!(summary, Summary { moved: 3, planned: 0, default_bucket: 2, skipped: 2 });

        assert!(target.path().join("Springfield/springfield.jpg").exists());
        assert!(target.path().join("Frankfurt am Main_Höchst/frankfurt.jpg").exists());
        assert!(target.path().join("unknown/ocean.jpg").exists());
        assert_eq!(std::fs::read_to_string(target.path().join("unknown/plain.jpg"))?, "older");

        // skipped files stay where they are
        assert!(photos.path().join("plain.jpg").exists());
        assert!(photos.path().join("broken.jpg").exists());
        assert!(!photos.path().join("springfield.jpg").exists());

        Ok(())
    }

    #[tokio::test]
    async fn move_into_missing_source_leaves_no_trace() -> Result<()> {
        let photos = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;
        let dir = target.path().join("Springfield");

        let err = move_into(&photos.path().join("gone.jpg"), &dir).await.unwrap_err();
        assert!(format!("{:#}", err).contains("rename"), "{:#}", err);
        assert!(!dir.join("gone.jpg").exists());

        Ok(())
    }

    #[tokio::test]
    async fn copy_and_remove_moves_the_file() -> Result<()> {
        let photos = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;

        let path = photos.path().join("springfield.jpg");
        let dest = target.path().join("springfield.jpg");
        std::fs::write(&path, "data")?;

        copy_and_remove(&path, &dest).await?;

        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(&dest)?, "data");

        Ok(())
    }

    #[tokio::test]
    async fn copy_and_remove_cleans_up_failed_copy() -> Result<()> {
        let photos = tempfile::tempdir()?;
        let target = tempfile::tempdir()?;

        // a directory can not be copied like a file
        let path = photos.path().join("album.jpg");
        std::fs::create_dir(&path)?;

        // left over from an interrupted copy
        let dest = target.path().join("album.jpg");
        std::fs::write(&dest, "trunc")?;

        let err = copy_and_remove(&path, &dest).await.unwrap_err();
        assert!(format!("{:#}", err).contains("copy"), "{:#}", err);

        assert!(path.exists());
        assert!(!dest.exists());

        Ok(())
    }

    #[tokio::test]
    async fn run_without_target_only_plans() -> Result<()> {
        let photos = tempfile::tempdir()?;
        let path = photos.path().join("springfield.jpg");
        std::fs::write(&path, "data")?;

        let summary = relocator(None)?.run(vec![path.clone()]).await?;

        assert_eq!(summary, Summary { moved: 0, planned: 1, default_bucket: 0, skipped: 0 });
        assert!(path.exists());

        Ok(())
    }
}
