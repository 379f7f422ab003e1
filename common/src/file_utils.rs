//! File utility functions for listing and filtering files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Image file extensions understood by the slice codec.
pub const IMAGE_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg"];

/// Returns paths to all files in a directory matching the given extensions,
/// sorted lexicographically. Extensions are matched case-insensitively.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if extensions.contains(&ext.as_str()) {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths)
}

/// Returns paths to all image files in the given directory, sorted.
pub fn image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    files_with_extensions(dir, IMAGE_EXTENSIONS)
}

/// Name of the directory containing `path`, or an empty string at the filesystem root.
pub fn parent_dir_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
