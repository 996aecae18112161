//! `key=value` override file the self-play engine reads for victim settings.

use crate::constants::{MAX_VISITS_ADV_KEY, MAX_VISITS_VICTIM_KEY};
use crate::criteria::VictimCriteria;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideConfigError {
    #[error("line {line}: expected key=value, got '{text}'")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: {key} has non-integer value '{value}'")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
}

/// Visit budgets carried by the override file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideConfig {
    pub max_visits_victim: Option<u32>,
    pub max_visits_adv: Option<u32>,
}

impl OverrideConfig {
    #[must_use]
    pub const fn for_victim(victim: &VictimCriteria) -> Self {
        Self {
            max_visits_victim: victim.max_visits_victim,
            max_visits_adv: victim.max_visits_adv,
        }
    }

    /// One line per configured budget; empty when the stage sets none.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = String::new();
        if let Some(visits) = self.max_visits_victim {
            text.push_str(&format!("{MAX_VISITS_VICTIM_KEY}={visits}\n"));
        }
        if let Some(visits) = self.max_visits_adv {
            text.push_str(&format!("{MAX_VISITS_ADV_KEY}={visits}\n"));
        }
        text
    }

    /// Parse an override file. Keys other than the two visit budgets are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-blank line without `=` or a non-integer budget.
    pub fn parse(text: &str) -> Result<Self, OverrideConfigError> {
        let mut config = Self::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| OverrideConfigError::MalformedLine {
                    line: index + 1,
                    text: line.to_string(),
                })?;
            let (key, value) = (key.trim(), value.trim());
            let slot = match key {
                MAX_VISITS_VICTIM_KEY => &mut config.max_visits_victim,
                MAX_VISITS_ADV_KEY => &mut config.max_visits_adv,
                _ => continue,
            };
            *slot = Some(value.parse().map_err(|_| OverrideConfigError::InvalidValue {
                line: index + 1,
                key: key.to_string(),
                value: value.to_string(),
            })?);
        }
        Ok(config)
    }
}
