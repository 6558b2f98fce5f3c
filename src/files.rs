//! Target discovery and mutant file layout

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{MutestingError, Result};

/// Expand files and directories into the Rust sources to mutate
///
/// Directories are searched recursively, skipping `target/` and hidden
/// directories. The result is sorted and free of duplicates.
pub fn discover(targets: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let default = [PathBuf::from(".")];
    let targets = if targets.is_empty() {
        &default[..]
    } else {
        targets
    };

    let mut files = Vec::new();
    for target in targets {
        if target.is_file() {
            files.push(target.clone());
            continue;
        }
        if !target.is_dir() {
            return Err(MutestingError::FileNotFound {
                file: target.clone(),
            });
        }
        let walker = WalkDir::new(target)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
        for entry in walker.filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && is_rust_source(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| name == "target" || name.starts_with('.'))
}

fn is_rust_source(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "rs")
}

/// Location of `file` mirrored below `root`, e.g. `<root>/src/lib.rs`
///
/// `..` and the filesystem root become components of their own, so
/// `../app/lib.rs`, `/app/lib.rs` and `app/lib.rs` stay apart.
pub fn mirror(root: &Path, file: &Path) -> PathBuf {
    let relative: PathBuf = file
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            Component::ParentDir => Some(OsStr::new("__parent")),
            Component::RootDir => Some(OsStr::new("__root")),
            Component::CurDir | Component::Prefix(_) => None,
        })
        .collect();
    root.join(relative)
}

/// `<base>.<suffix>`, keeping the full file name of `base`
pub fn with_suffix(base: &Path, suffix: impl std::fmt::Display) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{}", suffix));
    PathBuf::from(name)
}
