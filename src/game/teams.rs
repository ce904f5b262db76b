//! Team table and membership registry

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

/// Fixed set of team identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamColor {
    Red,
    Blue,
    Yellow,
    Black,
    White,
}

impl TeamColor {
    pub const ALL: [TeamColor; 5] = [
        TeamColor::Red,
        TeamColor::Blue,
        TeamColor::Yellow,
        TeamColor::Black,
        TeamColor::White,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TeamColor::Red => "Red",
            TeamColor::Blue => "Blue",
            TeamColor::Yellow => "Yellow",
            TeamColor::Black => "Black",
            TeamColor::White => "White",
        }
    }

    /// Environment key carrying the startup enabled flag, e.g. `SB_TEAM_RED_ENABLED`
    pub fn enabled_env_key(self) -> String {
        format!("SB_TEAM_{}_ENABLED", self.display_name().to_uppercase())
    }
}

impl std::fmt::Display for TeamColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Default, Clone)]
struct TeamSlot {
    members: HashSet<Uuid>,
    enabled: bool,
}

/// Result of a team join request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamJoinOutcome {
    Joined(TeamColor),
    TeamModeOff,
    TeamDisabled(TeamColor),
}

/// Team membership. A participant is in at most one team at a time.
#[derive(Debug, Clone)]
pub struct TeamRegistry {
    slots: [TeamSlot; 5],
    teams_enabled: bool,
}

impl TeamRegistry {
    pub fn new(teams_enabled: bool, disabled: &[TeamColor]) -> Self {
        let mut slots: [TeamSlot; 5] = Default::default();
        for team in TeamColor::ALL {
            slots[team.index()].enabled = !disabled.contains(&team);
        }
        Self {
            slots,
            teams_enabled,
        }
    }

    pub fn teams_enabled(&self) -> bool {
        self.teams_enabled
    }

    pub fn set_teams_enabled(&mut self, enabled: bool) {
        self.teams_enabled = enabled;
    }

    pub fn is_enabled(&self, team: TeamColor) -> bool {
        self.slots[team.index()].enabled
    }

    pub fn set_enabled(&mut self, team: TeamColor, enabled: bool) {
        self.slots[team.index()].enabled = enabled;
    }

    /// Join `team`, leaving every other team first.
    /// No-op when team mode is off or the team is disabled.
    pub fn join(&mut self, id: Uuid, team: TeamColor) -> TeamJoinOutcome {
        if !self.teams_enabled {
            return TeamJoinOutcome::TeamModeOff;
        }
        if !self.is_enabled(team) {
            return TeamJoinOutcome::TeamDisabled(team);
        }
        self.leave_all(id);
        self.slots[team.index()].members.insert(id);
        TeamJoinOutcome::Joined(team)
    }

    pub fn leave_all(&mut self, id: Uuid) {
        for slot in self.slots.iter_mut() {
            slot.members.remove(&id);
        }
    }

    pub fn team_of(&self, id: Uuid) -> Option<TeamColor> {
        TeamColor::ALL
            .into_iter()
            .find(|team| self.slots[team.index()].members.contains(&id))
    }

    pub fn members(&self, team: TeamColor) -> &HashSet<Uuid> {
        &self.slots[team.index()].members
    }

    /// Team the participant scores for: its team if that team is enabled
    pub fn scoring_team_of(&self, id: Uuid) -> Option<TeamColor> {
        self.team_of(id).filter(|team| self.is_enabled(*team))
    }

    /// Enabled teams with at least one member in `alive`
    pub fn surviving_teams(&self, alive: &HashSet<Uuid>) -> Vec<TeamColor> {
        TeamColor::ALL
            .into_iter()
            .filter(|team| self.is_enabled(*team))
            .filter(|team| self.members(*team).iter().any(|id| alive.contains(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_teams_leaves_previous() {
        let mut teams = TeamRegistry::new(true, &[]);
        let id = Uuid::new_v4();

        assert_eq!(teams.join(id, TeamColor::Red), TeamJoinOutcome::Joined(TeamColor::Red));
        assert_eq!(teams.join(id, TeamColor::Blue), TeamJoinOutcome::Joined(TeamColor::Blue));

        assert!(!teams.members(TeamColor::Red).contains(&id));
        assert!(teams.members(TeamColor::Blue).contains(&id));
        let holding: Vec<_> = TeamColor::ALL
            .into_iter()
            .filter(|t| teams.members(*t).contains(&id))
            .collect();
        assert_eq!(holding, vec![TeamColor::Blue]);
    }

    #[test]
    fn disabled_team_rejects_join_and_keeps_current() {
        let mut teams = TeamRegistry::new(true, &[TeamColor::Yellow]);
        let id = Uuid::new_v4();
        teams.join(id, TeamColor::Red);

        assert_eq!(
            teams.join(id, TeamColor::Yellow),
            TeamJoinOutcome::TeamDisabled(TeamColor::Yellow)
        );
        assert_eq!(teams.team_of(id), Some(TeamColor::Red));
    }

    #[test]
    fn team_mode_off_is_a_no_op() {
        let mut teams = TeamRegistry::new(false, &[]);
        let id = Uuid::new_v4();
        assert_eq!(teams.join(id, TeamColor::Red), TeamJoinOutcome::TeamModeOff);
        assert_eq!(teams.team_of(id), None);
    }

    #[test]
    fn surviving_teams_ignore_disabled_and_dead() {
        let mut teams = TeamRegistry::new(true, &[]);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        teams.join(a, TeamColor::Red);
        teams.join(b, TeamColor::Blue);
        teams.join(c, TeamColor::White);
        teams.set_enabled(TeamColor::White, false);

        let alive: HashSet<Uuid> = [a, c].into_iter().collect();
        assert_eq!(teams.surviving_teams(&alive), vec![TeamColor::Red]);
        assert_eq!(teams.scoring_team_of(c), None);
    }

    #[test]
    fn env_keys_are_upper_case() {
        assert_eq!(TeamColor::Black.enabled_env_key(), "SB_TEAM_BLACK_ENABLED");
    }
}
