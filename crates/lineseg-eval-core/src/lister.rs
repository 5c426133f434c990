//! Deterministic recursive file discovery.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{EvalError, Result};

/// Extensions accepted for prediction XML files.
pub const PREDICTION_EXTENSIONS: &[&str] = &[".xml"];

/// Extensions accepted for ground-truth XML files.
pub const GT_XML_EXTENSIONS: &[&str] = &[".xml", ".XML"];

/// Extensions accepted for ground-truth pixel masks.
pub const GT_PIXEL_EXTENSIONS: &[&str] = &[".png"];

/// Whether `file_name` ends with one of `extensions` (case-sensitive).
pub fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| file_name.ends_with(ext))
}

/// List every file under `root` whose name ends with one of `extensions`.
///
/// Directories are visited in file-name order and the result is sorted by the
/// full path as a byte string, so two runs over the same tree always agree.
/// A missing or unreadable root (or any entry below it) is an error.
pub fn list_files(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| EvalError::Discovery {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.depth() == 0 || entry.file_type().is_dir() {
            continue;
        }
        if has_extension(&entry.file_name().to_string_lossy(), extensions) {
            files.push(entry.into_path());
        }
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    debug!(root = %root.display(), count = files.len(), "listed files");
    Ok(files)
}

/// List files under each root in turn, concatenated in root order.
pub fn list_files_in<P: AsRef<Path>>(roots: &[P], extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut all = Vec::new();
    for root in roots {
        all.extend(list_files(root.as_ref(), extensions)?);
    }
    Ok(all)
}
