//! Victimplay Curriculum Core
//!
//! Platform-agnostic logic for advancing adversarial self-play through an
//! ordered list of victim opponents. This crate parses self-play transcripts,
//! keeps the statistics window, and runs the advancement state machine; the
//! filesystem side lives behind [`GameSource`] and [`VictimPublisher`].

pub mod constants;
pub mod controller;
pub mod criteria;
pub mod curriculum;
pub mod override_config;
pub mod parser;
pub mod record;
pub mod sgf;
pub mod stats;

// Re-export commonly used types
pub use controller::{Controller, StepOutcome};
pub use criteria::{
    CriteriaError, RawVictimCriteria, Threshold, VictimCriteria, VictimParams, load_criteria,
    parse_criteria_json,
};
pub use curriculum::{Curriculum, CurriculumError, CurriculumState, Transition, advance};
pub use override_config::{OverrideConfig, OverrideConfigError};
pub use parser::{SkipReason, is_victim_name, parse_game_record};
pub use record::{Color, GameRecord, PlayerStat, Winner};
pub use sgf::{SgfError, SgfRoot};
pub use stats::{IngestSummary, StatsWindow};

/// Complete transcripts read from one append-only source since the last scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBatch {
    /// Stable identifier of the source (its canonical path).
    pub source_id: String,
    /// Newline-terminated lines, newest first.
    pub transcripts: Vec<String>,
}

/// Trait for discovering new self-play transcripts.
/// Platform-specific implementations should provide this
pub trait GameSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sources with new content, newest source first.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources cannot be listed or read.
    fn scan(&mut self) -> Result<Vec<SourceBatch>, Self::Error>;
}

/// Trait for exposing the active victim to the self-play engine.
/// Platform-specific implementations should provide this
pub trait VictimPublisher {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The victim the engine currently sees, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the published state cannot be inspected.
    fn published_victim(&self) -> Result<Option<VictimParams>, Self::Error>;

    /// Publish a victim's overrides and artifact.
    ///
    /// An existing artifact is kept unless `force` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if publication did not complete.
    fn publish(&mut self, victim: &VictimCriteria, force: bool) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Default)]
    struct ScriptedSource {
        scans: Vec<Vec<SourceBatch>>,
    }

    impl GameSource for ScriptedSource {
        type Error = Infallible;

        fn scan(&mut self) -> Result<Vec<SourceBatch>, Self::Error> {
            if self.scans.is_empty() {
                return Ok(Vec::new());
            }
            Ok(self.scans.remove(0))
        }
    }

    #[derive(Default)]
    struct MemoryPublisher {
        published: Option<VictimParams>,
        log: Vec<(String, bool)>,
    }

    impl VictimPublisher for MemoryPublisher {
        type Error = Infallible;

        fn published_victim(&self) -> Result<Option<VictimParams>, Self::Error> {
            Ok(self.published.clone())
        }

        fn publish(&mut self, victim: &VictimCriteria, force: bool) -> Result<(), Self::Error> {
            self.published = Some(victim.params());
            self.log.push((victim.name.clone(), force));
            Ok(())
        }
    }

    fn line(name: &str, visits: u32, hash: &str, adv_wins: bool) -> String {
        let result = if adv_wins { "W+2.5" } else { "B+2.5" };
        format!(
            "(;PB[victim-{name}]PW[adv-s1]BR[v{visits}]KM[7.5]RE[{result}]\
             C[startTurnIdx=0,initTurnNum=0,gameHash={hash}];B[pd])"
        )
    }

    fn two_stages() -> Curriculum {
        let criteria = vec![
            VictimCriteria::new("v1", Threshold::WinRate(0.5))
                .unwrap()
                .with_visits(Some(50), None),
            VictimCriteria::new("v2", Threshold::ScoreDiff(0.0)).unwrap(),
        ];
        Curriculum::new(criteria).unwrap()
    }

    #[test]
    fn controller_advances_and_republishes() {
        let scan = vec![SourceBatch {
            source_id: "/games/a.sgfs".to_string(),
            transcripts: vec![
                line("v1", 50, "h2", true),
                "not a transcript".to_string(),
                line("v1", 50, "h1", true),
            ],
        }];
        let source = ScriptedSource { scans: vec![scan] };
        let mut controller = Controller::new(two_stages(), 2, source, MemoryPublisher::default());

        controller.start().unwrap();
        assert_eq!(controller.publisher().log, vec![("v1".to_string(), false)]);

        let outcome = controller.step().unwrap();
        assert!(matches!(
            outcome,
            StepOutcome::Evaluated {
                transition: Transition::Advanced { index: 1 },
                ..
            }
        ));
        assert_eq!(controller.publisher().log.last(), Some(&("v2".to_string(), true)));

        // old-stage games must not count for the new stage
        assert_eq!(
            controller.step().unwrap(),
            StepOutcome::Waiting { new_records: 0 }
        );
        assert!(!controller.is_finished());
    }

    #[test]
    fn controller_resumes_from_published_victim() {
        let publisher = MemoryPublisher {
            published: Some(VictimParams {
                name: "v2".to_string(),
                max_visits_victim: None,
                max_visits_adv: None,
            }),
            log: Vec::new(),
        };
        let mut controller =
            Controller::new(two_stages(), 2, ScriptedSource::default(), publisher);
        controller.start().unwrap();
        assert_eq!(controller.curriculum().state().victim_index, 1);
        assert_eq!(controller.publisher().log, vec![("v2".to_string(), false)]);
    }
}
