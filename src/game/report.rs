//! End-of-match results

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::util::time::format_survival;

use super::roster::Roster;
use super::stats::KillLedger;
use super::teams::{TeamColor, TeamRegistry};

/// Why the match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    LastStanding,
    TeamVictory,
    Draw,
    TimeLimit,
    ForcedStop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Winner {
    Participant { id: Uuid },
    Team { team: TeamColor, survivors: Vec<Uuid> },
}

/// One row of the results table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantResult {
    pub participant: Uuid,
    pub team: Option<TeamColor>,
    /// Kills in this match
    pub kills: u32,
    pub alive: bool,
    /// Seconds survived since PVP start
    pub survival_secs: u64,
    pub eliminated_by: Option<Uuid>,
    /// 1 = best
    pub placement: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub ended_at: DateTime<Utc>,
    pub reason: EndReason,
    pub winner: Option<Winner>,
    /// Seconds since PVP start, 0 when PVP never started
    pub pvp_duration_secs: u64,
    pub team_mode: bool,
    pub results: Vec<ParticipantResult>,
}

fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}

impl MatchReport {
    /// Build the report from the match state as it stands at the end.
    ///
    /// Rows cover everyone in the roster plus every victim in the ledger.
    /// Survivors rank first, then by survival time.
    pub fn build(
        roster: &Roster,
        teams: &TeamRegistry,
        ledger: &KillLedger,
        pvp_started_at: Option<DateTime<Utc>>,
        reason: EndReason,
        winner: Option<Winner>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut ids = roster.tracked();
        ids.extend(ledger.entries().iter().map(|e| e.victim));
        ids.sort();
        ids.dedup();

        let pvp_duration_secs = pvp_started_at.map(|s| secs_between(s, now)).unwrap_or(0);

        let mut results: Vec<ParticipantResult> = ids
            .into_iter()
            .map(|id| {
                let alive = roster.is_alive(id);
                let entry = if alive { None } else { ledger.entry_for(id) };
                ParticipantResult {
                    participant: id,
                    team: teams.team_of(id),
                    kills: ledger.kills_by(id),
                    alive,
                    survival_secs: if alive {
                        pvp_duration_secs
                    } else {
                        entry.map(|e| e.survival_secs).unwrap_or(0)
                    },
                    eliminated_by: entry.and_then(|e| e.killer),
                    placement: 0,
                }
            })
            .collect();

        results.sort_by_key(|r| (!r.alive, Reverse(r.survival_secs), r.participant));
        for (idx, row) in results.iter_mut().enumerate() {
            row.placement = idx as u32 + 1;
        }

        Self {
            ended_at: now,
            reason,
            winner,
            pvp_duration_secs,
            team_mode: teams.teams_enabled(),
            results,
        }
    }

    pub fn result_for(&self, id: Uuid) -> Option<&ParticipantResult> {
        self.results.iter().find(|r| r.participant == id)
    }

    /// Announcement lines; `name` resolves display names
    pub fn render(&self, name: impl Fn(Uuid) -> String) -> Vec<String> {
        let mut lines = vec!["========== Match results ==========".to_string()];

        lines.push(match &self.winner {
            Some(Winner::Participant { id }) => format!("Winner: {}", name(*id)),
            Some(Winner::Team { team, .. }) => format!("Winner: {} team", team),
            None => match self.reason {
                EndReason::TimeLimit => "No winner: time ran out".to_string(),
                EndReason::ForcedStop => "No winner: match stopped".to_string(),
                _ => "No winner: draw".to_string(),
            },
        });

        if self.team_mode {
            for team in TeamColor::ALL {
                let rows: Vec<&ParticipantResult> =
                    self.results.iter().filter(|r| r.team == Some(team)).collect();
                if rows.is_empty() {
                    continue;
                }
                lines.push(format!("--- {} team ---", team));
                for row in rows {
                    render_row(&mut lines, row, &name);
                }
            }
            let loners: Vec<&ParticipantResult> =
                self.results.iter().filter(|r| r.team.is_none()).collect();
            if !loners.is_empty() {
                lines.push("--- No team ---".to_string());
                for row in loners {
                    render_row(&mut lines, row, &name);
                }
            }
        } else {
            for row in &self.results {
                render_row(&mut lines, row, &name);
            }
        }

        lines.push("===================================".to_string());
        lines
    }
}

fn render_row(lines: &mut Vec<String>, row: &ParticipantResult, name: &impl Fn(Uuid) -> String) {
    lines.push(format!("#{} {}", row.placement, name(row.participant)));
    lines.push(format!("  Kills: {}", row.kills));
    lines.push(format!(
        "  Status: {}",
        if row.alive { "alive" } else { "eliminated" }
    ));
    lines.push(format!("  Survived: {}", format_survival(row.survival_secs)));
    if !row.alive {
        let by = row
            .eliminated_by
            .map(&name)
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!("  Eliminated by: {}", by));
    }
}
