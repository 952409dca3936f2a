//! Resolve user inputs (files, directories, glob patterns) to source files

use std::io;
use std::path::{Path, PathBuf};

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Regular, non-hidden files directly inside `dir`, sorted by path
pub fn list_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Expand inputs into a list of source files.
///
/// - directory: its regular non-hidden files (not recursive), sorted
/// - glob pattern (`*`, `?`, `[`): matching files, sorted
/// - anything else: taken as a file path
///
/// Fails if an input cannot be listed or nothing is found overall.
pub fn resolve_sources(inputs: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for input in inputs {
        let as_str = input.to_string_lossy();
        if input.is_dir() {
            let found = list_dir(input)?;
            log::debug!("{}: {} files", input.display(), found.len());
            sources.extend(found);
        } else if is_glob(&as_str) {
            let paths = glob::glob(&as_str)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let mut found: Vec<PathBuf> = paths
                .filter_map(|p| match p {
                    Ok(p) => Some(p),
                    Err(e) => {
                        log::warn!("Skipping unreadable path: {e}");
                        None
                    }
                })
                .filter(|p| p.is_file())
                .collect();
            found.sort();
            log::debug!("{as_str}: {} matches", found.len());
            sources.extend(found);
        } else {
            sources.push(input.clone());
        }
    }

    if sources.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no input files found",
        ));
    }
    Ok(sources)
}
