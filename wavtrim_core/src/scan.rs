use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::WavTrimError;

/// Collect every file below `root` whose name ends with `extension`.
///
/// The suffix match is exact and case-sensitive, so with `".wav"` a file named
/// `LOUD.WAV` is skipped. Symlinks to files are listed under their link
/// path; symlinked directories are not descended into. Paths are returned in byte-wise lexicographic order
/// so the resulting log is deterministic. Any error while walking the tree
/// aborts the scan; no partial list is returned.
pub fn scan_dir(root: &Path, extension: &str) -> Result<Vec<PathBuf>, WavTrimError> {
    let metadata = fs::metadata(root).map_err(|source| WavTrimError::DirectoryAccess {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(WavTrimError::DirectoryAccess {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| WavTrimError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        // names are matched as raw bytes so non UTF-8 file names are kept
        let matches = entry
            .file_name()
            .as_encoded_bytes()
            .ends_with(extension.as_bytes());
        if matches {
            files.push(entry.into_path());
        }
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    debug!("found {} '{extension}' file(s) under '{}'", files.len(), root.display());
    Ok(files)
}
