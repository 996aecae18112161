use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use victimplay_core::constants::SELFPLAY_RECORD_EXTENSION;
use victimplay_core::{GameSource, SourceBatch};

use crate::util::{files_newest_first, has_extension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: SystemTime,
}

/// Append-only transcript files under the self-play output directories.
pub struct FsGameSource {
    roots: Vec<PathBuf>,
    fingerprints: HashMap<PathBuf, Fingerprint>,
}

impl FsGameSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            fingerprints: HashMap::new(),
        }
    }
}

impl GameSource for FsGameSource {
    type Error = io::Error;

    fn scan(&mut self) -> io::Result<Vec<SourceBatch>> {
        let mut files = Vec::new();
        for root in &self.roots {
            files.extend(files_newest_first(root, |p| {
                has_extension(p, SELFPLAY_RECORD_EXTENSION)
            })?);
        }
        files.sort_by(|a, b| b.modified.cmp(&a.modified));

        let mut batches = Vec::new();
        for file in files {
            let fingerprint = Fingerprint {
                len: file.len,
                modified: file.modified,
            };
            if self.fingerprints.get(&file.path) == Some(&fingerprint) {
                continue;
            }
            log::debug!("Processing game record file '{}'", file.path.display());
            let transcripts = match read_complete_lines(&file.path) {
                Ok(lines) => lines,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    log::warn!("'{}' disappeared before it could be read", file.path.display());
                    continue;
                }
                Err(err) => return Err(err),
            };
            self.fingerprints.insert(file.path.clone(), fingerprint);
            batches.push(SourceBatch {
                source_id: file.path.to_string_lossy().into_owned(),
                transcripts,
            });
        }
        Ok(batches)
    }
}

/// Newline-terminated lines of a file, last line first. A trailing line
/// without a terminator is still being written and is left for a later scan.
pub fn read_complete_lines(path: &Path) -> io::Result<Vec<String>> {
    let bytes = fs::read(path)?;
    let complete = match bytes.iter().rposition(|b| *b == b'\n') {
        Some(end) => &bytes[..end],
        None => {
            if !bytes.is_empty() {
                log::debug!("Only a partial game in '{}' so far", path.display());
            }
            return Ok(Vec::new());
        }
    };
    Ok(complete
        .split(|b| *b == b'\n')
        .rev()
        .map(|line| String::from_utf8_lossy(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}
