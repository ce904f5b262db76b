//! Match lifecycle: phases, roster, teams, clock, scoring and the match actor

pub mod clock;
pub mod coordinator;
pub mod r#match;
pub mod phase;
pub mod report;
pub mod roster;
pub mod stats;
pub mod teams;
pub mod verdict;
pub mod vote;

pub use coordinator::{
    Collaborators, ConnectOutcome, DamageDecision, MatchCoordinator, MatchStatus, RosterChange,
    StartOutcome, StartRejection, StopOutcome,
};
pub use phase::Phase;
pub use r#match::{GameMatch, MatchEvent, MatchHandle};
pub use report::{EndReason, MatchReport, Winner};
pub use teams::TeamColor;

/// Coordinator faults. Caller-facing refusals are outcome values instead.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },

    #[error("match coordinator is not running")]
    MailboxClosed,
}
