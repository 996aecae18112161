use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use victimplay_core::{RawVictimCriteria, VictimCriteria, load_criteria, parse_criteria_json};

use crate::Args;
use crate::publish::staging_dir_for;

/// Everything the curriculum loop needs, validated.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub selfplay_dirs: Vec<PathBuf>,
    pub input_models_dir: PathBuf,
    pub output_models_dir: PathBuf,
    pub games_for_compute: usize,
    pub checking_periodicity: Duration,
    pub criteria: Vec<VictimCriteria>,
}

impl RunnerConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.games_for_compute == 0 {
            bail!("--games-for-compute must be at least 1");
        }
        let criteria = resolve_criteria(
            args.config_json_file.as_deref(),
            args.config_json_string.as_deref(),
            None,
        )?;
        for victim in &criteria {
            ensure_plain_file_name(&victim.name)?;
        }
        staging_dir_for(&args.output_models_dir).with_context(|| {
            format!(
                "--output-models-dir {} cannot be published to",
                args.output_models_dir.display()
            )
        })?;
        Ok(Self {
            selfplay_dirs: args.selfplay_dir.clone(),
            input_models_dir: args.input_models_dir.clone(),
            output_models_dir: args.output_models_dir.clone(),
            games_for_compute: args.games_for_compute,
            checking_periodicity: Duration::from_secs(args.checking_periodicity),
            criteria,
        })
    }
}

/// Pick the criteria source: a JSON file, then a JSON string, then a list
/// supplied by the caller. The first one present wins.
pub fn resolve_criteria(
    file: Option<&Path>,
    json: Option<&str>,
    list: Option<Vec<RawVictimCriteria>>,
) -> Result<Vec<VictimCriteria>> {
    let raw = if let Some(path) = file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading criteria file {}", path.display()))?;
        parse_criteria_json(&text)
            .with_context(|| format!("parsing criteria file {}", path.display()))?
    } else if let Some(json) = json {
        parse_criteria_json(json).context("parsing --config-json-string")?
    } else if let Some(list) = list {
        list
    } else {
        bail!("no curriculum criteria given: pass --config-json-file or --config-json-string");
    };
    Ok(load_criteria(raw)?)
}

/// Victim names become file names under the models directories.
fn ensure_plain_file_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => bail!("victim name '{name}' is not a plain file name"),
    }
}
