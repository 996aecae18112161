mod config;
mod logging;
mod publish;
mod runner;
mod source;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::thread;

use config::RunnerConfig;
use publish::FsVictimPublisher;
use source::FsGameSource;
use victimplay_core::constants::{DEFAULT_CHECKING_PERIODICITY_SECS, DEFAULT_GAMES_FOR_COMPUTE};
use victimplay_core::{Controller, Curriculum};

#[derive(Debug, Parser)]
#[command(name = "victimplay-curriculum", version)]
#[command(
    about = "Victim curriculum for adversarial self-play - publishes progressively stronger victims as the adversary improves"
)]
struct Args {
    /// Directory the self-play engine writes game records to (repeatable)
    #[arg(long, required = true)]
    selfplay_dir: Vec<PathBuf>,

    /// Directory holding every victim model named by the curriculum
    #[arg(long)]
    input_models_dir: PathBuf,

    /// Directory the self-play engine loads the current victim from
    #[arg(long)]
    output_models_dir: PathBuf,

    /// Number of recent games the statistics are computed over
    #[arg(long, default_value_t = DEFAULT_GAMES_FOR_COMPUTE)]
    games_for_compute: usize,

    /// Seconds to wait between checks for new games
    #[arg(long, default_value_t = DEFAULT_CHECKING_PERIODICITY_SECS)]
    checking_periodicity: u64,

    /// Curriculum criteria as a JSON file (takes precedence over the string form)
    #[arg(long)]
    config_json_file: Option<PathBuf>,

    /// Curriculum criteria as a JSON string
    #[arg(long)]
    config_json_string: Option<String>,

    /// Also write the log to a timestamped file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'd', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = logging::init(args.verbose, args.log_dir.as_deref())? {
        log::info!("Writing log to {}", path.display());
    }

    announce_banner();

    if let Err(err) = run(&args) {
        log::error!("Curriculum error: {err:#}");
        return Err(err);
    }
    println!("{}", "✅ Curriculum finished!".bright_green().bold());
    Ok(())
}

fn announce_banner() {
    println!("{}", "🎯 Victimplay Curriculum".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn run(args: &Args) -> Result<()> {
    let config = RunnerConfig::from_args(args)?;
    log::debug!("{config:?}");

    let curriculum = Curriculum::new(config.criteria)?;
    let source = FsGameSource::new(config.selfplay_dirs);
    let publisher = FsVictimPublisher::new(config.input_models_dir, &config.output_models_dir)
        .with_context(|| {
            format!(
                "preparing output models directory {}",
                config.output_models_dir.display()
            )
        })?;
    let mut controller = Controller::new(curriculum, config.games_for_compute, source, publisher);

    runner::run_until_finished(&mut controller, config.checking_periodicity, thread::sleep)
}
