//! Value types for game outcomes and aggregated statistics.
//!
//! Every value here is expressed from the adversary's perspective: positive
//! score differences mean the adversary finished ahead.

use serde::{Deserialize, Serialize};

/// Stone color of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Black,
    White,
}

impl Color {
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }

    /// SGF letter used in per-color property names (`PB`, `BR`, ...).
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Black => 'B',
            Self::White => 'W',
        }
    }

    #[must_use]
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'B' => Some(Self::Black),
            'W' => Some(Self::White),
            _ => None,
        }
    }
}

/// Outcome of a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    Adversary,
    Victim,
    Tie,
}

impl Winner {
    #[must_use]
    pub const fn is_adversary_win(self) -> bool {
        matches!(self, Self::Adversary)
    }
}

/// One parsed self-play transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub victim_name: String,
    pub victim_visits: u32,
    pub game_hash: String,
    pub winner: Winner,
    pub score_diff: f64,
    pub score_diff_no_komi: f64,
}

impl GameRecord {
    /// Whether this game was played against the given curriculum stage.
    ///
    /// A stage without a visit budget matches any visit count.
    #[must_use]
    pub fn played_against(&self, victim_name: &str, victim_visits: Option<u32>) -> bool {
        self.victim_name == victim_name
            && victim_visits.is_none_or(|visits| visits == self.victim_visits)
    }
}

/// Aggregated adversary statistics over a full window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerStat {
    pub win_rate: f64,
    pub mean_score_diff: f64,
    pub mean_score_diff_no_komi: f64,
    pub policy_loss: Option<f64>,
}
