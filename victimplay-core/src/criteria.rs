//! Per-stage advancement criteria loaded once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::curriculum::CurriculumError;
use crate::record::PlayerStat;

/// Configuration errors; any of these stops the controller before it starts.
#[derive(Debug, thiserror::Error)]
pub enum CriteriaError {
    #[error("empty config for the curriculum play")]
    Empty,

    #[error("victim name is missing")]
    MissingName,

    #[error("need exactly 1 threshold enabled for victim '{name}', got {count}")]
    ThresholdCount { name: String, count: usize },

    #[error("invalid victim config at position {index}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: Box<CriteriaError>,
    },

    #[error("failed to parse curriculum JSON")]
    Json(#[from] serde_json::Error),
}

/// The single statistic a stage is judged on, with its threshold value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Threshold {
    WinRate(f64),
    ScoreDiff(f64),
    ScoreDiffNoKomi(f64),
    PolicyLoss(f64),
}

impl Threshold {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WinRate(_) => "win_rate",
            Self::ScoreDiff(_) => "score_diff",
            Self::ScoreDiffNoKomi(_) => "score_wo_komi_diff",
            Self::PolicyLoss(_) => "policy_loss",
        }
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        match self {
            Self::WinRate(v) | Self::ScoreDiff(v) | Self::ScoreDiffNoKomi(v) | Self::PolicyLoss(v) => {
                v
            }
        }
    }

    /// Whether the adversary statistic strictly exceeds this threshold.
    ///
    /// # Errors
    ///
    /// Returns [`CurriculumError::NotImplemented`] for policy-loss thresholds.
    pub fn exceeded_by(self, stat: &PlayerStat) -> Result<bool, CurriculumError> {
        let observed = match self {
            Self::WinRate(_) => stat.win_rate,
            Self::ScoreDiff(_) => stat.mean_score_diff,
            Self::ScoreDiffNoKomi(_) => stat.mean_score_diff_no_komi,
            Self::PolicyLoss(_) => return Err(CurriculumError::NotImplemented("policy loss")),
        };
        log::info!(
            "{}: {} (adv) <-> {} (threshold)",
            self.label(),
            observed,
            self.value()
        );
        Ok(observed > self.value())
    }
}

/// Victim identity as published to the self-play engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictimParams {
    pub name: String,
    pub max_visits_victim: Option<u32>,
    pub max_visits_adv: Option<u32>,
}

/// One validated curriculum stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VictimCriteria {
    pub name: String,
    pub max_visits_victim: Option<u32>,
    pub max_visits_adv: Option<u32>,
    pub threshold: Threshold,
}

impl VictimCriteria {
    /// # Errors
    ///
    /// Returns [`CriteriaError::MissingName`] for an empty name.
    pub fn new(name: impl Into<String>, threshold: Threshold) -> Result<Self, CriteriaError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CriteriaError::MissingName);
        }
        Ok(Self {
            name,
            max_visits_victim: None,
            max_visits_adv: None,
            threshold,
        })
    }

    #[must_use]
    pub fn with_visits(mut self, victim: Option<u32>, adv: Option<u32>) -> Self {
        self.max_visits_victim = victim;
        self.max_visits_adv = adv;
        self
    }

    #[must_use]
    pub fn params(&self) -> VictimParams {
        VictimParams {
            name: self.name.clone(),
            max_visits_victim: self.max_visits_victim,
            max_visits_adv: self.max_visits_adv,
        }
    }

    /// Compares name and both visit budgets with a published victim.
    #[must_use]
    pub fn matches(&self, params: &VictimParams) -> bool {
        self.name == params.name
            && self.max_visits_victim == params.max_visits_victim
            && self.max_visits_adv == params.max_visits_adv
    }
}

impl fmt::Display for VictimCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(visits) = self.max_visits_victim {
            write!(f, " @ v{visits}")?;
        }
        write!(f, " [{} > {}]", self.threshold.label(), self.threshold.value())
    }
}

/// A criteria record exactly as it appears in the curriculum JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawVictimCriteria {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "maxVisitsVictim")]
    pub max_visits_victim: Option<u32>,
    #[serde(default, alias = "maxVisitsAdv")]
    pub max_visits_adv: Option<u32>,
    #[serde(default, alias = "winRate")]
    pub win_rate: Option<f64>,
    #[serde(default, alias = "scoreDiff")]
    pub score_diff: Option<f64>,
    #[serde(default, alias = "scoreDiffNoKomi")]
    pub score_wo_komi_diff: Option<f64>,
    #[serde(default, alias = "policyLoss")]
    pub policy_loss: Option<f64>,
    #[serde(default, rename = "_comment", skip_serializing)]
    pub comment: Option<serde_json::Value>,
}

impl TryFrom<RawVictimCriteria> for VictimCriteria {
    type Error = CriteriaError;

    fn try_from(raw: RawVictimCriteria) -> Result<Self, Self::Error> {
        let name = raw.name.unwrap_or_default();
        let enabled: Vec<Threshold> = [
            raw.win_rate.map(Threshold::WinRate),
            raw.score_diff.map(Threshold::ScoreDiff),
            raw.score_wo_komi_diff.map(Threshold::ScoreDiffNoKomi),
            raw.policy_loss.map(Threshold::PolicyLoss),
        ]
        .into_iter()
        .flatten()
        .collect();

        let threshold = match enabled.as_slice() {
            [threshold] => *threshold,
            other => {
                if name.trim().is_empty() {
                    return Err(CriteriaError::MissingName);
                }
                return Err(CriteriaError::ThresholdCount {
                    name,
                    count: other.len(),
                });
            }
        };

        Ok(Self::new(name, threshold)?.with_visits(raw.max_visits_victim, raw.max_visits_adv))
    }
}

/// Parse the raw criteria list from its JSON form.
///
/// # Errors
///
/// Returns [`CriteriaError::Json`] if the text is not a list of criteria records.
pub fn parse_criteria_json(json: &str) -> Result<Vec<RawVictimCriteria>, CriteriaError> {
    Ok(serde_json::from_str(json)?)
}

/// Validate every record of a criteria list, keeping its order.
///
/// # Errors
///
/// Returns an error if the list is empty or any record is invalid.
pub fn load_criteria(raw: Vec<RawVictimCriteria>) -> Result<Vec<VictimCriteria>, CriteriaError> {
    if raw.is_empty() {
        return Err(CriteriaError::Empty);
    }
    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| {
            VictimCriteria::try_from(entry).map_err(|source| CriteriaError::InvalidEntry {
                index,
                source: Box::new(source),
            })
        })
        .collect()
}
