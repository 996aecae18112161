//! One polling iteration of the curriculum, composed over the platform traits.

use anyhow::{Context, Result};

use crate::curriculum::{Curriculum, Transition};
use crate::parser::parse_game_record;
use crate::record::{GameRecord, PlayerStat};
use crate::stats::StatsWindow;
use crate::{GameSource, SourceBatch, VictimPublisher};

/// What a single [`Controller::step`] observed and did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The curriculum had already finished; nothing was scanned.
    Idle,
    /// No statistic yet: window not full or mixing stages.
    Waiting { new_records: usize },
    /// A statistic was compared against the active stage.
    Evaluated {
        stat: PlayerStat,
        transition: Transition,
    },
}

/// Owns the curriculum state, the statistics window and both platform seams.
pub struct Controller<S, P>
where
    S: GameSource,
    P: VictimPublisher,
{
    curriculum: Curriculum,
    window: StatsWindow,
    source: S,
    publisher: P,
}

impl<S, P> Controller<S, P>
where
    S: GameSource,
    P: VictimPublisher,
{
    pub fn new(curriculum: Curriculum, games_for_compute: usize, source: S, publisher: P) -> Self {
        Self {
            curriculum,
            window: StatsWindow::new(games_for_compute),
            source,
            publisher,
        }
    }

    #[must_use]
    pub const fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    #[must_use]
    pub const fn window(&self) -> &StatsWindow {
        &self.window
    }

    #[must_use]
    pub const fn publisher(&self) -> &P {
        &self.publisher
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.curriculum.is_finished()
    }

    /// Recover the stage from what is already published, then make sure the
    /// active victim is in place without overwriting an existing artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if inspection or the initial publish fails.
    pub fn start(&mut self) -> Result<()> {
        log::info!("Loaded curriculum with the following params:");
        for (index, criteria) in self.curriculum.criteria().iter().enumerate() {
            log::info!("  #{index}: {criteria}");
        }

        log::info!("Finding the latest victim...");
        let published = self
            .publisher
            .published_victim()
            .context("inspecting published victims")?;
        self.curriculum.resume(published.as_ref());

        let active = self
            .curriculum
            .active()
            .context("curriculum has no active victim")?
            .clone();
        log::info!("Copying the latest victim '{active}'...");
        self.publisher
            .publish(&active, false)
            .with_context(|| format!("publishing victim '{}'", active.name))?;
        log::info!("Curriculum initial setup is complete");
        Ok(())
    }

    /// Scan, aggregate, evaluate and publish on advancement. Never sleeps.
    ///
    /// # Errors
    ///
    /// Returns an error for scan or publish failures and for unimplemented
    /// thresholds; per-transcript problems are logged and skipped.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.curriculum.is_finished() {
            return Ok(StepOutcome::Idle);
        }

        let new_records = self.refresh()?;

        let Some(active) = self.curriculum.active() else {
            return Ok(StepOutcome::Idle);
        };
        let Some(stat) = self
            .window
            .current_stat(&active.name, active.max_visits_victim)
        else {
            return Ok(StepOutcome::Waiting { new_records });
        };

        let transition = self.curriculum.evaluate(&stat)?;
        match transition {
            Transition::Stay => {}
            Transition::Advanced { index } => {
                let victim = self.curriculum.criteria()[index].clone();
                log::info!("Moving to the next victim '{victim}'");
                self.publisher
                    .publish(&victim, true)
                    .with_context(|| format!("publishing victim '{}'", victim.name))?;
            }
            Transition::Finished => log::info!("Final victim beaten, curriculum finished"),
        }

        Ok(StepOutcome::Evaluated { stat, transition })
    }

    fn refresh(&mut self) -> Result<usize> {
        let batches = self.source.scan().context("scanning self-play sources")?;
        let summary = self.window.ingest_scan(batches.iter().map(|batch| {
            (
                batch.source_id.as_str(),
                batch.transcripts.iter().filter_map(move |line| parse_logged(batch, line)),
            )
        }));

        log::info!(
            "Got {} new games from {} files",
            summary.new_records,
            summary.useful_sources.len()
        );
        for source in &summary.useful_sources {
            log::info!("Useful game record file: '{source}'");
        }
        Ok(summary.new_records)
    }
}

fn parse_logged(batch: &SourceBatch, line: &str) -> Option<GameRecord> {
    match parse_game_record(line) {
        Ok(record) => Some(record),
        Err(reason) => {
            log::warn!("Skipping game in '{}': {reason}", batch.source_id);
            None
        }
    }
}
