//! Threshold-driven advancement through the ordered victim stages.

use serde::{Deserialize, Serialize};

use crate::criteria::{CriteriaError, VictimCriteria, VictimParams};
use crate::record::PlayerStat;

/// Fatal curriculum conditions.
#[derive(Debug, thiserror::Error)]
pub enum CurriculumError {
    #[error(transparent)]
    Criteria(#[from] CriteriaError),

    #[error("{0} check is not implemented")]
    NotImplemented(&'static str),
}

/// Position in the curriculum. `victim_index` only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumState {
    pub victim_index: usize,
    pub finished: bool,
}

/// Result of evaluating one statistic against the active stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Threshold not exceeded, or the curriculum is already over.
    Stay,
    /// Moved to the stage at `index`, which must now be published.
    Advanced { index: usize },
    /// The last stage was beaten.
    Finished,
}

/// Pure transition function: the next state and what the caller must do.
///
/// # Errors
///
/// Returns [`CurriculumError::NotImplemented`] when the active stage is judged
/// on policy loss.
pub fn advance(
    criteria: &[VictimCriteria],
    state: CurriculumState,
    stat: &PlayerStat,
) -> Result<(CurriculumState, Transition), CurriculumError> {
    if state.finished {
        return Ok((state, Transition::Stay));
    }
    let Some(active) = criteria.get(state.victim_index) else {
        return Ok((
            CurriculumState {
                finished: true,
                ..state
            },
            Transition::Stay,
        ));
    };

    log::info!("Checking whether we need to move to the next victim...");
    if !active.threshold.exceeded_by(stat)? {
        return Ok((state, Transition::Stay));
    }

    let victim_index = state.victim_index + 1;
    if victim_index >= criteria.len() {
        return Ok((
            CurriculumState {
                victim_index,
                finished: true,
            },
            Transition::Finished,
        ));
    }
    Ok((
        CurriculumState {
            victim_index,
            finished: false,
        },
        Transition::Advanced {
            index: victim_index,
        },
    ))
}

/// The immutable stage list together with the controller's position in it.
#[derive(Debug, Clone)]
pub struct Curriculum {
    criteria: Vec<VictimCriteria>,
    state: CurriculumState,
}

impl Curriculum {
    /// # Errors
    ///
    /// Returns an error if no stages are configured.
    pub fn new(criteria: Vec<VictimCriteria>) -> Result<Self, CurriculumError> {
        if criteria.is_empty() {
            return Err(CriteriaError::Empty.into());
        }
        Ok(Self {
            criteria,
            state: CurriculumState::default(),
        })
    }

    #[must_use]
    pub fn criteria(&self) -> &[VictimCriteria] {
        &self.criteria
    }

    #[must_use]
    pub const fn state(&self) -> CurriculumState {
        self.state
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.state.finished
    }

    /// The stage currently played against; `None` once finished.
    #[must_use]
    pub fn active(&self) -> Option<&VictimCriteria> {
        if self.state.finished {
            return None;
        }
        self.criteria.get(self.state.victim_index)
    }

    /// First stage matching an already published victim.
    #[must_use]
    pub fn position_of(&self, params: &VictimParams) -> Option<usize> {
        self.criteria.iter().position(|c| c.matches(params))
    }

    /// Startup recovery: continue from the published victim when it is a
    /// known stage, otherwise stay at the first stage.
    pub fn resume(&mut self, published: Option<&VictimParams>) -> usize {
        let Some(params) = published else {
            return self.state.victim_index;
        };
        match self.position_of(params) {
            Some(index) => {
                log::info!("Resuming curriculum at stage {index} ('{}')", params.name);
                self.state.victim_index = index;
            }
            None => log::warn!(
                "Victim {params:?} is not found in the curriculum, starting from scratch"
            ),
        }
        self.state.victim_index
    }

    /// Apply [`advance`] to the owned state.
    ///
    /// # Errors
    ///
    /// Propagates [`CurriculumError::NotImplemented`].
    pub fn evaluate(&mut self, stat: &PlayerStat) -> Result<Transition, CurriculumError> {
        let (state, transition) = advance(&self.criteria, self.state, stat)?;
        self.state = state;
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Threshold;

    fn stage(name: &str, threshold: Threshold) -> VictimCriteria {
        VictimCriteria::new(name, threshold).unwrap()
    }

    fn win_rate(value: f64) -> PlayerStat {
        PlayerStat {
            win_rate: value,
            mean_score_diff: 0.0,
            mean_score_diff_no_komi: 0.0,
            policy_loss: None,
        }
    }

    #[test]
    fn rejects_empty_curriculum() {
        assert!(matches!(
            Curriculum::new(Vec::new()),
            Err(CurriculumError::Criteria(CriteriaError::Empty))
        ));
    }

    #[test]
    fn advances_one_stage_at_a_time_then_finishes() {
        let mut curriculum = Curriculum::new(vec![
            stage("a", Threshold::WinRate(0.5)),
            stage("b", Threshold::WinRate(0.5)),
        ])
        .unwrap();

        assert_eq!(curriculum.evaluate(&win_rate(0.4)).unwrap(), Transition::Stay);
        assert_eq!(
            curriculum.evaluate(&win_rate(0.9)).unwrap(),
            Transition::Advanced { index: 1 }
        );
        assert_eq!(curriculum.active().unwrap().name, "b");
        assert_eq!(curriculum.evaluate(&win_rate(0.9)).unwrap(), Transition::Finished);
        assert!(curriculum.is_finished());
        assert!(curriculum.active().is_none());
        assert_eq!(curriculum.evaluate(&win_rate(1.0)).unwrap(), Transition::Stay);
        assert_eq!(curriculum.state().victim_index, 2);
    }

    #[test]
    fn policy_loss_stage_fails_loudly() {
        let mut curriculum = Curriculum::new(vec![stage("a", Threshold::PolicyLoss(0.1))]).unwrap();
        assert!(matches!(
            curriculum.evaluate(&win_rate(1.0)),
            Err(CurriculumError::NotImplemented(_))
        ));
        assert_eq!(curriculum.state(), CurriculumState::default());
    }

    #[test]
    fn resume_matches_name_and_visits() {
        let mut curriculum = Curriculum::new(vec![
            stage("a", Threshold::WinRate(0.5)).with_visits(Some(1), None),
            stage("a", Threshold::WinRate(0.5)).with_visits(Some(8), None),
        ])
        .unwrap();
        let published = VictimParams {
            name: "a".to_string(),
            max_visits_victim: Some(8),
            max_visits_adv: None,
        };
        assert_eq!(curriculum.resume(Some(&published)), 1);
    }

    #[test]
    fn resume_unknown_victim_starts_from_scratch() {
        let mut curriculum = Curriculum::new(vec![stage("a", Threshold::WinRate(0.5))]).unwrap();
        let published = VictimParams {
            name: "zzz".to_string(),
            max_visits_victim: None,
            max_visits_adv: None,
        };
        assert_eq!(curriculum.resume(Some(&published)), 0);
        assert_eq!(curriculum.resume(None), 0);
    }
}
