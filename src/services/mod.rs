//! Collaborators the coordinator drives: arena, presentation and
//! per-participant environment setup

pub mod arena;
pub mod environment;
pub mod presentation;

#[cfg(test)]
pub mod testing;

use uuid::Uuid;

pub use arena::{ArenaError, ArenaHandle, ArenaService, ArenaStatus, HeadlessArena, Point};
pub use environment::{fallback_name, Environment, HeadlessEnvironment, Loadout, Location, Vitals};
pub use presentation::{BarColor, BroadcastPresentation, Notice, Presentation, Signal, StatusBar};

/// Best-effort collaborator failure, swallowed by the coordinator
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("participant {0} is not reachable")]
    Unreachable(Uuid),

    #[error("collaborator failure: {0}")]
    Failed(String),
}
