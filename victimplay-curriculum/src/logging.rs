use anyhow::{Context, Result};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Install the process logger: `info` by default, `debug` when verbose,
/// with `RUST_LOG` taking precedence. With a log directory the stream is
/// also written to `curriculum-<UTC timestamp>.log` there.
///
/// Returns the log file path, if one was opened.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = Builder::new();
    builder.filter_level(level).parse_default_env();

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(chrono::Utc::now()));
            let file = File::create(&path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            builder.target(Target::Pipe(Box::new(Tee::new(file, io::stdout()))));
            Some(path)
        }
        None => {
            builder.target(Target::Stdout);
            None
        }
    };

    builder.try_init().context("installing logger")?;
    Ok(log_path)
}

fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("curriculum-{}.log", now.format("%Y%m%d-%H%M%S"))
}

/// Writes everything to both sinks.
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}
