//! Filesystem helpers used by the publishers

use crate::core::error::ReleaseError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn dir_exists(path: &Path) -> bool {
    path.is_dir()
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Copy the tree under `src` onto `dst`, creating directories as needed and
/// overwriting existing files
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), ReleaseError> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| ReleaseError::filesystem("create a directory", &target, e))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| ReleaseError::filesystem("copy a file", entry.path(), e))?;
        }
    }
    Ok(())
}

/// Copy the files directly under `src` whose extension is `extension`
///
/// Returns the copied file names, sorted.
pub fn copy_files_with_extension(
    src: &Path,
    dst: &Path,
    extension: &str,
) -> Result<Vec<String>, ReleaseError> {
    let mut copied = Vec::new();
    for entry in WalkDir::new(src).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let matches = entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some(extension);
        if !matches {
            continue;
        }

        let target = dst.join(entry.file_name());
        fs::copy(entry.path(), &target)
            .map_err(|e| ReleaseError::filesystem("copy a file", entry.path(), e))?;
        copied.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(copied)
}

/// Remove `path` recursively; a missing path is not an error
pub fn remove_tree(path: &Path) -> Result<(), ReleaseError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ReleaseError::filesystem("remove a directory", path, e)),
    }
}

/// Every file under `root`, as paths relative to `base`, sorted
pub fn list_files(root: &Path, base: &Path) -> Result<Vec<PathBuf>, ReleaseError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(base)
            .map_err(|_| {
                ReleaseError::filesystem(
                    "relativize a path",
                    entry.path(),
                    std::io::Error::other("path is outside the base directory"),
                )
            })?
            .to_path_buf();
        files.push(relative);
    }
    Ok(files)
}

fn walk_error(root: &Path, error: walkdir::Error) -> ReleaseError {
    let path = error.path().unwrap_or(root).to_path_buf();
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    ReleaseError::filesystem("walk a directory", path, source)
}
