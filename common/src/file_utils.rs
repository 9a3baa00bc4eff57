//! File utility functions for listing and filtering files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns paths to all regular files under `dir`, recursively.
///
/// Each directory contributes its own files first, sorted by file name, and
/// then its subdirectories, also sorted by name. The resulting order does not
/// depend on the order the filesystem reports entries in.
///
/// Directories equal to `skip` (compared after canonicalization) are not
/// entered. Symlinked directories are not followed.
pub fn files_recursive_sorted(dir: &Path, skip: Option<&Path>) -> io::Result<Vec<PathBuf>> {
    let skip = skip.and_then(|p| fs::canonicalize(p).ok());
    let mut files = Vec::new();
    visit_dir(dir, skip.as_deref(), &mut files)?;
    Ok(files)
}

fn visit_dir(dir: &Path, skip: Option<&Path>, out: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    subdirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    out.extend(files);

    for subdir in subdirs {
        if let Some(skip) = skip {
            if fs::canonicalize(&subdir).is_ok_and(|c| c == skip) {
                continue;
            }
        }
        visit_dir(&subdir, skip, out)?;
    }

    Ok(())
}

/// File name of `path` as UTF-8, or `None` for non-UTF-8 names.
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|s| s.to_str())
}
