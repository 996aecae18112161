//! Bounded, deduplicated window of recent games and the statistic over it.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::record::{GameRecord, PlayerStat, Winner};

/// What one scan contributed to the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub new_records: usize,
    pub useful_sources: Vec<String>,
}

/// Newest-first window of at most `capacity` records, plus the hashes each
/// source has already contributed.
#[derive(Debug, Clone)]
pub struct StatsWindow {
    capacity: usize,
    window: VecDeque<GameRecord>,
    seen_hashes: HashMap<String, HashSet<String>>,
}

impl StatsWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            window: VecDeque::new(),
            seen_hashes: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Records currently in the window, newest first.
    pub fn records(&self) -> impl Iterator<Item = &GameRecord> {
        self.window.iter()
    }

    /// Number of hashes already counted for a source.
    #[must_use]
    pub fn seen_count(&self, source_id: &str) -> usize {
        self.seen_hashes.get(source_id).map_or(0, HashSet::len)
    }

    /// Fold a single source's records (newest first) into the window.
    pub fn ingest<I>(&mut self, source_id: &str, records: I) -> usize
    where
        I: IntoIterator<Item = GameRecord>,
    {
        self.ingest_scan([(source_id, records)]).new_records
    }

    /// Fold one full scan into the window.
    ///
    /// Sources are append-only and read newest to oldest, so the first hash
    /// already seen for a source ends that source's contribution. Everything
    /// accepted in the scan is prepended as one block, preserving order.
    pub fn ingest_scan<'a, S, I>(&mut self, sources: S) -> IngestSummary
    where
        S: IntoIterator<Item = (&'a str, I)>,
        I: IntoIterator<Item = GameRecord>,
    {
        let mut block: Vec<GameRecord> = Vec::new();
        let mut useful_sources = Vec::new();

        for (source_id, records) in sources {
            let seen = self.seen_hashes.entry(source_id.to_string()).or_default();
            let before = block.len();
            for record in records {
                if !seen.insert(record.game_hash.clone()) {
                    break;
                }
                block.push(record);
            }
            if block.len() > before {
                useful_sources.push(source_id.to_string());
            }
        }

        let new_records = block.len();
        for record in block.into_iter().rev() {
            self.window.push_front(record);
        }
        self.window.truncate(self.capacity);

        IngestSummary {
            new_records,
            useful_sources,
        }
    }

    /// Statistic over a full window played entirely against the given stage.
    #[must_use]
    pub fn current_stat(&self, victim_name: &str, victim_visits: Option<u32>) -> Option<PlayerStat> {
        if self.capacity == 0 || self.window.len() < self.capacity {
            log::info!(
                "Incomplete statistics, got only {} of {} games",
                self.window.len(),
                self.capacity
            );
            return None;
        }

        let matching = self
            .window
            .iter()
            .filter(|game| game.played_against(victim_name, victim_visits))
            .count();
        if matching < self.window.len() {
            log::info!("Incomplete statistics for current victim, got only {matching} games");
            return None;
        }

        let wins = self
            .window
            .iter()
            .filter(|game| game.winner.is_adversary_win())
            .count();
        let ties = self
            .window
            .iter()
            .filter(|game| game.winner == Winner::Tie)
            .count();
        let score_sum: f64 = self.window.iter().map(|game| game.score_diff).sum();
        let score_no_komi_sum: f64 = self.window.iter().map(|game| game.score_diff_no_komi).sum();

        log::info!(
            "Got {wins} wins and {ties} ties from {} games",
            self.window.len()
        );

        #[allow(clippy::cast_precision_loss)]
        let total = self.window.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let win_rate = wins as f64 / total;

        Some(PlayerStat {
            win_rate,
            mean_score_diff: score_sum / total,
            mean_score_diff_no_komi: score_no_komi_sum / total,
            policy_loss: None,
        })
    }
}
