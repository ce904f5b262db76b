//! Match phase and its legal transitions

use serde::Serialize;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// No match running, lobby open
    Idle,
    /// Countdown before the match starts
    Countdown,
    /// Gathering phase, combat disabled
    Collection,
    /// Combat phase with a shrinking boundary
    Pvp,
    /// Match over, returning to idle on the next tick
    Ended,
}

impl Phase {
    /// Whether `self -> next` is a legal edge.
    ///
    /// The lifecycle is `IDLE -> COUNTDOWN -> COLLECTION -> PVP -> ENDED -> IDLE`;
    /// any non-idle phase may additionally be forced straight to `ENDED`.
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Countdown)
                | (Phase::Countdown, Phase::Collection)
                | (Phase::Collection, Phase::Pvp)
                | (Phase::Countdown, Phase::Ended)
                | (Phase::Collection, Phase::Ended)
                | (Phase::Pvp, Phase::Ended)
                | (Phase::Ended, Phase::Idle)
        )
    }

    /// Collection or PVP, the phases where eliminations count
    pub fn is_in_play(self) -> bool {
        matches!(self, Phase::Collection | Phase::Pvp)
    }

    /// Any phase between start and return to idle
    pub fn is_running(self) -> bool {
        !matches!(self, Phase::Idle)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::Countdown => "COUNTDOWN",
            Phase::Collection => "COLLECTION",
            Phase::Pvp => "PVP",
            Phase::Ended => "ENDED",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 5] = [
        Phase::Idle,
        Phase::Countdown,
        Phase::Collection,
        Phase::Pvp,
        Phase::Ended,
    ];

    #[test]
    fn lifecycle_edges_are_legal() {
        assert!(Phase::Idle.can_transition_to(Phase::Countdown));
        assert!(Phase::Countdown.can_transition_to(Phase::Collection));
        assert!(Phase::Collection.can_transition_to(Phase::Pvp));
        assert!(Phase::Pvp.can_transition_to(Phase::Ended));
        assert!(Phase::Ended.can_transition_to(Phase::Idle));
    }

    #[test]
    fn every_running_phase_can_be_forced_to_ended() {
        for phase in [Phase::Countdown, Phase::Collection, Phase::Pvp] {
            assert!(phase.can_transition_to(Phase::Ended), "{phase}");
        }
        assert!(!Phase::Idle.can_transition_to(Phase::Ended));
    }

    #[test]
    fn skipping_and_reversing_is_illegal() {
        assert!(!Phase::Idle.can_transition_to(Phase::Pvp));
        assert!(!Phase::Pvp.can_transition_to(Phase::Collection));
        assert!(!Phase::Ended.can_transition_to(Phase::Countdown));
        for phase in ALL {
            assert!(!phase.can_transition_to(phase), "self edge on {phase}");
        }
    }
}
