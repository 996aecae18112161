use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use victimplay_core::constants::{
    IGNORED_ARTIFACT_EXTENSIONS, OVERRIDE_CONFIG_NAME, PUBLISH_MAX_ATTEMPTS,
    PUBLISH_RETRY_DELAY_SECS, STAGING_DIR_SUFFIX,
};
use victimplay_core::{OverrideConfig, VictimCriteria, VictimParams, VictimPublisher};

use crate::util::{files_newest_first, has_extension, normalize_path};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("problem copying victim '{victim}' after {attempts} attempts, curriculum stopped")]
    Exhausted {
        victim: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to inspect published victims in {}", dir.display())]
    Inspect {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Bounded retry for the whole publish sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: PUBLISH_MAX_ATTEMPTS,
            delay: Duration::from_secs(PUBLISH_RETRY_DELAY_SECS),
        }
    }
}

/// Write `contents` to a temp file in `staging_dir`, then rename it onto
/// `dest`. Readers of `dest` see either the old or the new file, never a mix.
/// `staging_dir` must be on the same filesystem as `dest`.
pub fn atomic_write(staging_dir: &Path, dest: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = staging_path(staging_dir, dest)?;
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, dest)
}

/// Copy `src` through `staging_dir` onto `dest` with the same guarantee as
/// [`atomic_write`]. The staged copy is checked byte-for-byte by digest.
pub fn atomic_copy(staging_dir: &Path, src: &Path, dest: &Path) -> io::Result<()> {
    let tmp = staging_path(staging_dir, dest)?;
    fs::copy(src, &tmp)?;
    let expected = file_digest(src)?;
    let staged = file_digest(&tmp)?;
    if expected != staged {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "staged copy of '{}' has digest {staged:x}, expected {expected:x}",
                src.display()
            ),
        ));
    }
    fs::rename(&tmp, dest)
}

fn staging_path(staging_dir: &Path, dest: &Path) -> io::Result<PathBuf> {
    let name = dest.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' has no file name", dest.display()),
        )
    })?;
    Ok(staging_dir.join(name))
}

fn file_digest(path: &Path) -> io::Result<sha2::digest::Output<Sha256>> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Publishes victims from `input_dir` into `output_dir` for the self-play
/// engine, staging every file in the sibling `<output_dir>_tmp` directory.
pub struct FsVictimPublisher<F = fn(Duration)> {
    input_dir: PathBuf,
    output_dir: PathBuf,
    staging_dir: PathBuf,
    retry: RetryPolicy,
    sleep: F,
}

impl FsVictimPublisher {
    /// The output directory is normalized first, so the staging directory is
    /// always its sibling and never nested inside it.
    pub fn new(input_dir: PathBuf, output_dir: &Path) -> io::Result<Self> {
        let output_dir = normalize_path(output_dir)?;
        let staging_dir = staging_dir_for(&output_dir)?;
        Ok(Self {
            input_dir,
            output_dir,
            staging_dir,
            retry: RetryPolicy::default(),
            sleep: thread::sleep,
        })
    }
}

impl<F> FsVictimPublisher<F>
where
    F: FnMut(Duration),
{
    #[cfg(test)]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the delay between attempts.
    #[cfg(test)]
    pub fn with_sleeper<G>(self, sleep: G) -> FsVictimPublisher<G>
    where
        G: FnMut(Duration),
    {
        FsVictimPublisher {
            input_dir: self.input_dir,
            output_dir: self.output_dir,
            staging_dir: self.staging_dir,
            retry: self.retry,
            sleep,
        }
    }

    pub fn override_path(&self) -> PathBuf {
        self.output_dir.join(OVERRIDE_CONFIG_NAME)
    }

    fn try_publish(&self, victim: &VictimCriteria, force: bool) -> io::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        fs::create_dir_all(&self.staging_dir)?;

        let overrides = OverrideConfig::for_victim(victim).render();
        atomic_write(&self.staging_dir, &self.override_path(), overrides.as_bytes())?;

        let dest = self.output_dir.join(&victim.name);
        if !force && dest.exists() {
            log::debug!("Victim '{}' already published, keeping it", victim.name);
            return Ok(());
        }
        atomic_copy(&self.staging_dir, &self.input_dir.join(&victim.name), &dest)
    }

    fn read_overrides(&self) -> OverrideConfig {
        let path = self.override_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    log::warn!("Cannot read '{}': {err}", path.display());
                }
                return OverrideConfig::default();
            }
        };
        OverrideConfig::parse(&text).unwrap_or_else(|err| {
            log::warn!("Ignoring malformed '{}': {err}", path.display());
            OverrideConfig::default()
        })
    }
}

impl<F> VictimPublisher for FsVictimPublisher<F>
where
    F: FnMut(Duration),
{
    type Error = PublishError;

    fn published_victim(&self) -> Result<Option<VictimParams>, PublishError> {
        let artifacts = files_newest_first(&self.output_dir, |path| {
            !IGNORED_ARTIFACT_EXTENSIONS
                .iter()
                .any(|ext| has_extension(path, ext))
        })
        .map_err(|source| PublishError::Inspect {
            dir: self.output_dir.clone(),
            source,
        })?;

        let Some(latest) = artifacts.first() else {
            return Ok(None);
        };
        let Some(name) = latest.path.file_name() else {
            return Ok(None);
        };
        let overrides = self.read_overrides();
        Ok(Some(VictimParams {
            name: name.to_string_lossy().into_owned(),
            max_visits_victim: overrides.max_visits_victim,
            max_visits_adv: overrides.max_visits_adv,
        }))
    }

    fn publish(&mut self, victim: &VictimCriteria, force: bool) -> Result<(), PublishError> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_publish(victim, force) {
                Ok(()) => {
                    log::info!("Published victim '{victim}'");
                    return Ok(());
                }
                Err(err) if attempt < attempts => {
                    log::warn!(
                        "Cannot copy victim '{}' (attempt {attempt}/{attempts}): {err}; \
                         maybe filesystem problem? Waiting {:?}...",
                        victim.name,
                        self.retry.delay
                    );
                    (self.sleep)(self.retry.delay);
                    attempt += 1;
                }
                Err(source) => {
                    return Err(PublishError::Exhausted {
                        victim: victim.name.clone(),
                        attempts,
                        source,
                    });
                }
            }
        }
    }
}

/// `<output_dir>_tmp`, next to the normalized output directory.
///
/// # Errors
///
/// Fails if the directory has no name of its own (the filesystem root).
pub fn staging_dir_for(output_dir: &Path) -> io::Result<PathBuf> {
    let output_dir = normalize_path(output_dir)?;
    let Some(name) = output_dir.file_name() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("output directory '{}' has no name", output_dir.display()),
        ));
    };
    let mut name = name.to_os_string();
    name.push(STAGING_DIR_SUFFIX);
    Ok(output_dir.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use victimplay_core::Threshold;

    fn victim(name: &str, visits: Option<u32>, adv: Option<u32>) -> VictimCriteria {
        VictimCriteria::new(name, Threshold::WinRate(0.5))
            .unwrap()
            .with_visits(visits, adv)
    }

    struct Dirs {
        _root: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    fn dirs() -> Dirs {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("victims");
        let output = root.path().join("models");
        fs::create_dir_all(&input).unwrap();
        Dirs {
            _root: root,
            input,
            output,
        }
    }

    #[test]
    fn staging_dir_is_a_sibling() {
        assert_eq!(
            staging_dir_for(Path::new("/data/victims")).unwrap(),
            PathBuf::from("/data/victims_tmp")
        );
        assert_eq!(
            staging_dir_for(Path::new("/data/victims/")).unwrap(),
            PathBuf::from("/data/victims_tmp")
        );
        assert_eq!(
            staging_dir_for(Path::new("/data/victims/models/..")).unwrap(),
            PathBuf::from("/data/victims_tmp")
        );
        let cwd = std::env::current_dir().unwrap();
        let staging = staging_dir_for(Path::new(".")).unwrap();
        assert_eq!(staging.parent(), cwd.parent());
        assert!(!staging.starts_with(&cwd));
        assert!(staging_dir_for(Path::new("/")).is_err());
    }

    #[test]
    fn recovery_ignores_staging_for_dotted_output_paths() {
        let d = dirs();
        fs::create_dir_all(&d.output).unwrap();
        fs::write(d.output.join("kata1"), b"a").unwrap();
        let dotted = d.output.join("sub").join("..");
        fs::create_dir_all(d.output.join("sub")).unwrap();

        let publisher = FsVictimPublisher::new(d.input.clone(), &dotted).unwrap();
        // a leftover staged file, newer than the published victim
        let staging = staging_dir_for(&dotted).unwrap();
        assert_eq!(staging, staging_dir_for(&d.output).unwrap());
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("half-copied"), b"partial").unwrap();

        let params = publisher.published_victim().unwrap().unwrap();
        assert_eq!(params.name, "kata1");
    }

    #[test]
    fn publishes_artifact_and_overrides() {
        let d = dirs();
        fs::write(d.input.join("kata1"), b"\x00\x01model").unwrap();
        let mut publisher = FsVictimPublisher::new(d.input.clone(), &d.output).unwrap();

        publisher.publish(&victim("kata1", Some(8), Some(600)), false).unwrap();

        assert_eq!(fs::read(d.output.join("kata1")).unwrap(), b"\x00\x01model");
        assert_eq!(
            fs::read_to_string(d.output.join("victim.cfg")).unwrap(),
            "maxVisits0=8\nmaxVisits1=600\n"
        );
        assert!(staging_dir_for(&d.output).unwrap().is_dir());
        assert_eq!(fs::read_dir(staging_dir_for(&d.output).unwrap()).unwrap().count(), 0);
    }

    #[test]
    fn existing_artifact_kept_unless_forced() {
        let d = dirs();
        fs::write(d.input.join("kata1"), b"fresh").unwrap();
        fs::create_dir_all(&d.output).unwrap();
        fs::write(d.output.join("kata1"), b"stale").unwrap();
        let mut publisher = FsVictimPublisher::new(d.input.clone(), &d.output).unwrap();

        publisher.publish(&victim("kata1", Some(1), None), false).unwrap();
        assert_eq!(fs::read(d.output.join("kata1")).unwrap(), b"stale");
        assert_eq!(
            fs::read_to_string(publisher.override_path()).unwrap(),
            "maxVisits0=1\n"
        );

        publisher.publish(&victim("kata1", Some(1), None), true).unwrap();
        assert_eq!(fs::read(d.output.join("kata1")).unwrap(), b"fresh");
    }

    #[test]
    fn default_retry_is_ten_attempts_ten_seconds_apart() {
        assert_eq!(
            RetryPolicy::default(),
            RetryPolicy {
                attempts: PUBLISH_MAX_ATTEMPTS,
                delay: Duration::from_secs(PUBLISH_RETRY_DELAY_SECS),
            }
        );
        assert_eq!(PUBLISH_MAX_ATTEMPTS, 10);
        assert_eq!(PUBLISH_RETRY_DELAY_SECS, 10);
    }

    #[test]
    fn retries_then_gives_up() {
        let d = dirs();
        let mut delays = Vec::new();
        let mut publisher = FsVictimPublisher::new(d.input.clone(), &d.output)
            .unwrap()
            .with_retry(RetryPolicy {
                attempts: 3,
                delay: Duration::from_secs(10),
            })
            .with_sleeper(|delay| delays.push(delay));

        let err = publisher.publish(&victim("missing", None, None), true).unwrap_err();
        assert!(matches!(
            err,
            PublishError::Exhausted { attempts: 3, ref victim, .. } if victim == "missing"
        ));
        drop(publisher);
        assert_eq!(delays, vec![Duration::from_secs(10); 2]);
    }

    #[test]
    fn recovers_from_a_transient_failure() {
        let d = dirs();
        let input = d.input.clone();
        let mut publisher = FsVictimPublisher::new(d.input.clone(), &d.output)
            .unwrap()
            .with_sleeper(move |_| fs::write(input.join("late"), b"arrived").unwrap());

        publisher.publish(&victim("late", None, None), true).unwrap();
        assert_eq!(fs::read(d.output.join("late")).unwrap(), b"arrived");
    }

    #[test]
    fn published_victim_reads_newest_artifact_and_overrides() {
        let d = dirs();
        let publisher = FsVictimPublisher::new(d.input.clone(), &d.output).unwrap();
        assert_eq!(publisher.published_victim().unwrap(), None);

        fs::create_dir_all(&d.output).unwrap();
        fs::write(d.output.join("old-victim"), b"a").unwrap();
        let past = std::time::SystemTime::now() - Duration::from_secs(600);
        fs::File::options()
            .write(true)
            .open(d.output.join("old-victim"))
            .unwrap()
            .set_modified(past)
            .unwrap();
        fs::write(d.output.join("new-victim"), b"b").unwrap();
        fs::write(d.output.join("victim.cfg"), "maxVisits0=8\n").unwrap();
        fs::write(d.output.join("engine.conf"), "x=1\n").unwrap();

        assert_eq!(
            publisher.published_victim().unwrap(),
            Some(VictimParams {
                name: "new-victim".to_string(),
                max_visits_victim: Some(8),
                max_visits_adv: None,
            })
        );
    }

    #[test]
    fn malformed_overrides_are_ignored_on_recovery() {
        let d = dirs();
        fs::create_dir_all(&d.output).unwrap();
        fs::write(d.output.join("kata1"), b"a").unwrap();
        fs::write(d.output.join("victim.cfg"), "garbage\n").unwrap();
        let publisher = FsVictimPublisher::new(d.input.clone(), &d.output).unwrap();
        let params = publisher.published_victim().unwrap().unwrap();
        assert_eq!(params.name, "kata1");
        assert_eq!(params.max_visits_victim, None);
    }

    #[test]
    fn concurrent_reader_never_sees_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        let dest = dir.path().join("victim.bin");

        let old = vec![b'a'; 256 * 1024];
        let new = vec![b'b'; 384 * 1024];
        fs::write(&dest, &old).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let done = Arc::clone(&done);
            let dest = dest.clone();
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                let mut reads = 0usize;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let seen = fs::read(&dest).unwrap();
                    assert!(seen == old || seen == new, "partial read of {} bytes", seen.len());
                    reads += 1;
                    if finished {
                        return reads;
                    }
                }
            })
        };

        for i in 0..200 {
            let contents = if i % 2 == 0 { &new } else { &old };
            atomic_write(&staging, &dest, contents).unwrap();
        }
        done.store(true, Ordering::Release);
        assert!(reader.join().unwrap() > 0);
    }
}
