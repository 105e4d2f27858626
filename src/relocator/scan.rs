use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use itertools::Itertools;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "heic", "heif", "webp"];

/// Returns an iterator over the image files below `root`.
pub fn scan_iter(root: &Path) -> impl Iterator<Item=Result<PathBuf>> {
    let files_iter = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    files_iter
        // filter out hidden files, but always accept the root itself
        .filter_entry(|entry| entry.depth() == 0 || !file_is_hidden(entry.file_name()))

        // convert any error to anyhow errors.
        .map(|res| res.map_err(anyhow::Error::from))

        // keep only image files
        .filter_ok(|entry| entry.file_type().is_file() && file_is_image(entry.file_name()))

        .map_ok(|entry| entry.into_path())
}

fn file_is_hidden(name: &OsStr) -> bool {
    name.to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn file_is_image(name: &OsStr) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}
