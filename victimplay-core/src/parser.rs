//! Turns one self-play transcript into a [`GameRecord`].
//!
//! Malformed or unusable transcripts are never fatal: the caller receives a
//! [`SkipReason`] and moves on to the next line.

use crate::constants::{EVALUATOR_SEPARATOR, GAME_HASH_KEY, VICTIM_NAME_PREFIX};
use crate::record::{Color, GameRecord, Winner};
use crate::sgf::{SgfError, SgfRoot};

/// Why a transcript did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("malformed transcript: {0}")]
    Malformed(#[from] SgfError),

    #[error("no gameHash in comment field")]
    MissingHash,

    #[error("no result (RE) present")]
    MissingResult,

    #[error("no winner margin in result '{0}'")]
    NoMargin(String),

    #[error("game score is not numeric in result '{0}'")]
    NonNumericMargin(String),

    #[error("found {n} victims instead of exactly one: {0:?}", n = .0.len())]
    VictimCount(Vec<String>),

    #[error("victim name '{0}' does not start with 'victim-'")]
    AmbiguousVictim(String),

    #[error("no visit annotation {0} for the victim")]
    MissingVisits(String),

    #[error("visit annotation '{0}' is not a number")]
    BadVisits(String),

    #[error("komi '{0}' is not a number")]
    BadKomi(String),
}

/// Whether a participant name denotes a victim rather than a paired evaluator.
#[must_use]
pub fn is_victim_name(name: &str) -> bool {
    name.contains(VICTIM_NAME_PREFIX) && !name.contains(EVALUATOR_SEPARATOR)
}

/// Parse one transcript line.
///
/// # Errors
///
/// Returns the [`SkipReason`] describing why the transcript cannot be counted.
pub fn parse_game_record(raw: &str) -> Result<GameRecord, SkipReason> {
    let root = SgfRoot::parse(raw.trim())?;

    let game_hash = game_hash(&root).ok_or(SkipReason::MissingHash)?;
    let result = root.get("RE").ok_or(SkipReason::MissingResult)?;
    let margin = result_margin(result)?;

    let (victim_name, victim_color) = identify_victim(&root)?;
    let victim_visits = victim_visits(&root, victim_color)?;
    let adv_color = victim_color.flip();

    let komi = match root.get("KM") {
        Some(text) => parse_finite(text).ok_or_else(|| SkipReason::BadKomi(text.to_string()))?,
        None => 0.0,
    };
    let adv_komi = if adv_color == Color::White { komi } else { -komi };

    let winner_color = result.chars().next().and_then(Color::from_letter);
    let (winner, score_diff, score_diff_no_komi) = match winner_color {
        // ties keep an exact zero on both score channels
        None => (Winner::Tie, 0.0, 0.0),
        Some(color) => {
            let adv_won = color == adv_color;
            let diff = if adv_won { margin } else { -margin };
            let winner = if adv_won {
                Winner::Adversary
            } else {
                Winner::Victim
            };
            (winner, diff, diff - adv_komi)
        }
    };

    Ok(GameRecord {
        victim_name,
        victim_visits,
        game_hash,
        winner,
        score_diff,
        score_diff_no_komi,
    })
}

fn game_hash(root: &SgfRoot) -> Option<String> {
    root.get("C")?
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == GAME_HASH_KEY)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn result_margin(result: &str) -> Result<f64, SkipReason> {
    let (_, margin) = result
        .split_once('+')
        .ok_or_else(|| SkipReason::NoMargin(result.to_string()))?;
    parse_finite(margin).ok_or_else(|| SkipReason::NonNumericMargin(result.to_string()))
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn identify_victim(root: &SgfRoot) -> Result<(String, Color), SkipReason> {
    let mut victims: Vec<(&str, Color)> = Vec::new();
    for color in [Color::Black, Color::White] {
        let Some(name) = root.get(&format!("P{}", color.letter())) else {
            continue;
        };
        if !is_victim_name(name) {
            continue;
        }
        // one entry per distinct name; a name on both sides counts as White
        match victims.iter_mut().find(|(seen, _)| *seen == name) {
            Some(entry) => entry.1 = color,
            None => victims.push((name, color)),
        }
    }

    match victims.as_slice() {
        [(name, color)] => name
            .strip_prefix(VICTIM_NAME_PREFIX)
            .map(|stripped| (stripped.to_string(), *color))
            .ok_or_else(|| SkipReason::AmbiguousVictim((*name).to_string())),
        other => Err(SkipReason::VictimCount(
            other.iter().map(|(name, _)| (*name).to_string()).collect(),
        )),
    }
}

fn victim_visits(root: &SgfRoot, victim_color: Color) -> Result<u32, SkipReason> {
    let key = format!("{}R", victim_color.letter());
    let annotation = root
        .get(&key)
        .ok_or_else(|| SkipReason::MissingVisits(key.clone()))?;
    annotation
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse::<u32>()
        .map_err(|_| SkipReason::BadVisits(annotation.to_string()))
}
