//! Lifetime statistics and the per-match kill ledger

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Cross-match counters for one participant.
/// Rates are derived on read and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifetimeStats {
    pub kills: u32,
    pub deaths: u32,
    pub wins: u32,
    pub losses: u32,
}

impl LifetimeStats {
    pub fn games_played(&self) -> u32 {
        self.wins + self.losses
    }

    /// Win rate in percent, 0 when no games were played
    pub fn win_rate(&self) -> f64 {
        match self.games_played() {
            0 => 0.0,
            games => f64::from(self.wins) / f64::from(games) * 100.0,
        }
    }

    pub fn average_kills(&self) -> f64 {
        match self.games_played() {
            0 => 0.0,
            games => f64::from(self.kills) / f64::from(games),
        }
    }

    pub fn average_deaths(&self) -> f64 {
        match self.games_played() {
            0 => 0.0,
            games => f64::from(self.deaths) / f64::from(games),
        }
    }

    /// Multi-line summary for a single participant
    pub fn summary(&self, name: &str) -> String {
        let mut out = format!("===== Stats: {} =====\n", name);
        out.push_str(&format!("Kills: {}\n", self.kills));
        out.push_str(&format!("Deaths: {}\n", self.deaths));
        out.push_str(&format!("Wins: {}\n", self.wins));
        out.push_str(&format!("Losses: {}\n", self.losses));
        out.push_str(&format!("Win rate: {:.1}%\n", self.win_rate()));
        if self.games_played() > 0 {
            out.push_str(&format!("Avg kills/game: {:.2}\n", self.average_kills()));
            out.push_str(&format!("Avg deaths/game: {:.2}\n", self.average_deaths()));
        }
        out
    }
}

/// Lifetime stats keyed by participant, created lazily, never deleted
#[derive(Debug, Default)]
pub struct StatsRegistry {
    records: HashMap<Uuid, LifetimeStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `id`, inserting a zeroed one on first access
    pub fn get_or_create(&mut self, id: Uuid) -> &mut LifetimeStats {
        self.records.entry(id).or_default()
    }

    pub fn record_kill(&mut self, id: Uuid) {
        self.get_or_create(id).kills += 1;
    }

    pub fn record_death(&mut self, id: Uuid) {
        self.get_or_create(id).deaths += 1;
    }

    pub fn record_win(&mut self, id: Uuid) {
        self.get_or_create(id).wins += 1;
    }

    pub fn record_loss(&mut self, id: Uuid) {
        self.get_or_create(id).losses += 1;
    }
}

/// One elimination in the current match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillEntry {
    pub victim: Uuid,
    pub killer: Option<Uuid>,
    pub at: DateTime<Utc>,
    /// Seconds between PVP start and the elimination (0 before PVP)
    pub survival_secs: u64,
}

/// Append-only elimination record for the current match, cleared at PVP entry
#[derive(Debug, Default)]
pub struct KillLedger {
    entries: Vec<KillEntry>,
}

impl KillLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: KillEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[KillEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kills credited to `id` in this match
    pub fn kills_by(&self, id: Uuid) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.killer == Some(id))
            .count() as u32
    }

    /// Latest entry naming `id` as victim
    pub fn entry_for(&self, id: Uuid) -> Option<&KillEntry> {
        self.entries.iter().rev().find(|e| e.victim == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut registry = StatsRegistry::new();
        let id = Uuid::new_v4();

        let first = *registry.get_or_create(id);
        assert_eq!(first, LifetimeStats::default());
        registry.get_or_create(id).kills += 1;
        assert_eq!(registry.get_or_create(id).kills, 1);
    }

    #[test]
    fn counters_accumulate() {
        let mut registry = StatsRegistry::new();
        let id = Uuid::new_v4();
        registry.record_kill(id);
        registry.record_kill(id);
        registry.record_win(id);
        registry.record_loss(id);
        registry.record_death(id);

        let stats = *registry.get_or_create(id);
        assert_eq!(stats.kills, 2);
        assert_eq!(stats.games_played(), 2);
        assert!((stats.win_rate() - 50.0).abs() < f64::EPSILON);
        assert!((stats.average_kills() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_games_reports_zero_percent() {
        let stats = LifetimeStats::default();
        assert_eq!(stats.win_rate(), 0.0);
        let text = stats.summary("newcomer");
        assert!(text.contains("Win rate: 0.0%"));
        assert!(!text.contains("Avg kills"));
    }

    #[test]
    fn ledger_counts_kills_per_killer() {
        let mut ledger = KillLedger::new();
        let killer = Uuid::new_v4();
        for _ in 0..2 {
            ledger.record(KillEntry {
                victim: Uuid::new_v4(),
                killer: Some(killer),
                at: Utc::now(),
                survival_secs: 10,
            });
        }
        let lone = Uuid::new_v4();
        ledger.record(KillEntry {
            victim: lone,
            killer: None,
            at: Utc::now(),
            survival_secs: 12,
        });

        assert_eq!(ledger.kills_by(killer), 2);
        assert_eq!(ledger.entry_for(lone).map(|e| e.survival_secs), Some(12));
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
