//! Win/end evaluation after an elimination

use std::collections::HashSet;

use uuid::Uuid;

use super::teams::{TeamColor, TeamRegistry};

/// Outcome of a win check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Two or more participants or teams remain
    Continue,
    /// One participant left standing
    Solo(Uuid),
    /// One team left; `survivors` are its alive members
    Team { team: TeamColor, survivors: Vec<Uuid> },
    /// Nobody left
    Draw,
}

/// Evaluate the alive set.
///
/// Solo mode: at most one alive participant ends the match.
/// Team mode: only enabled teams with an alive member count. One left wins,
/// none left is a draw. Alive participants outside those teams do not keep
/// the match going.
pub fn evaluate(alive: &HashSet<Uuid>, teams: &TeamRegistry) -> Verdict {
    if !teams.teams_enabled() {
        let mut remaining = alive.iter();
        return match (remaining.next(), remaining.next()) {
            (None, _) => Verdict::Draw,
            (Some(id), None) => Verdict::Solo(*id),
            _ => Verdict::Continue,
        };
    }

    match teams.surviving_teams(alive).as_slice() {
        [] => Verdict::Draw,
        [team] => {
            let mut survivors: Vec<Uuid> = teams
                .members(*team)
                .iter()
                .filter(|id| alive.contains(id))
                .copied()
                .collect();
            survivors.sort();
            Verdict::Team {
                team: *team,
                survivors,
            }
        }
        _ => Verdict::Continue,
    }
}
