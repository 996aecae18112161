use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::io;
use std::path::{self, Component, Path, PathBuf};
use std::time::SystemTime;

/// A regular file found under a root, with the metadata it was listed with.
#[derive(Debug, Clone)]
pub struct ListedFile {
    pub path: PathBuf,
    pub len: u64,
    pub modified: SystemTime,
}

impl ListedFile {
    fn from_metadata(path: PathBuf, metadata: &Metadata) -> io::Result<Self> {
        Ok(Self {
            path,
            len: metadata.len(),
            modified: metadata.modified()?,
        })
    }
}

/// Recursively list regular files under `root` accepted by `keep`, newest
/// modification first. Symlinks are followed; each canonical file appears once.
///
/// A missing root yields an empty list, and entries that disappear while
/// listing are skipped.
pub fn files_newest_first<F>(root: &Path, keep: F) -> io::Result<Vec<ListedFile>>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    let mut visited_dirs = HashSet::new();
    let mut seen_files = HashSet::new();
    match walk(root, &keep, &mut visited_dirs, &mut seen_files, &mut files) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        other => other?,
    }
    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(files)
}

fn walk<F>(
    dir: &Path,
    keep: &F,
    visited_dirs: &mut HashSet<PathBuf>,
    seen_files: &mut HashSet<PathBuf>,
    files: &mut Vec<ListedFile>,
) -> io::Result<()>
where
    F: Fn(&Path) -> bool,
{
    let canonical_dir = fs::canonicalize(dir)?;
    if !visited_dirs.insert(canonical_dir.clone()) {
        return Ok(());
    }

    for entry in fs::read_dir(&canonical_dir)? {
        let path = entry?.path();
        let listed = fs::metadata(&path).and_then(|metadata| {
            let canonical = fs::canonicalize(&path)?;
            Ok((canonical, metadata))
        });
        let (canonical, metadata) = match listed {
            Ok(found) => found,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("'{}' vanished while listing", path.display());
                continue;
            }
            Err(err) => return Err(err),
        };

        if metadata.is_dir() {
            match walk(&canonical, keep, visited_dirs, seen_files, files) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                other => other?,
            }
        } else if metadata.is_file() && keep(&canonical) && seen_files.insert(canonical.clone()) {
            files.push(ListedFile::from_metadata(canonical, &metadata)?);
        }
    }
    Ok(())
}

/// Whether the file extension equals `extension` (without the dot).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

/// Absolute form of `path` with `.` and `..` folded away lexically. The
/// path does not need to exist.
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = path::absolute(path)?;
    let mut normal = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other.as_os_str()),
        }
    }
    Ok(normal)
}
