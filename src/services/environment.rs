//! Per-participant environment: positioning, loadouts and vitals

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{Point, ServiceError};

/// Where a participant is sent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    Lobby,
    /// Pre-match waiting area
    Waiting,
    Arena(Point),
}

/// Inventory / mode preset applied on a role change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Loadout {
    Lobby,
    Waiting,
    /// Active participant; `reset_equipment` empties whatever they carried
    Participant { reset_equipment: bool },
    /// Opted out before the match
    IdleSpectator,
    /// Eliminated or joined mid-match
    Spectator,
}

/// Health snapshot used for status tags
#[derive(Debug, Clone, PartialEq)]
pub struct Vitals {
    pub name: String,
    pub health: f64,
    pub max_health: f64,
}

pub trait Environment: Send {
    fn teleport(&mut self, participant: Uuid, location: Location);

    fn apply_loadout(&mut self, participant: Uuid, loadout: Loadout);

    fn vitals(&self, participant: Uuid) -> Result<Vitals, ServiceError>;
}

/// Default maximum health of a participant
pub const DEFAULT_MAX_HEALTH: f64 = 20.0;

#[derive(Debug, Clone)]
struct Presence {
    location: Location,
    loadout: Option<Loadout>,
}

/// Environment kept in memory when no world host is attached
#[derive(Debug, Default)]
pub struct HeadlessEnvironment {
    presences: HashMap<Uuid, Presence>,
}

impl HeadlessEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location_of(&self, participant: Uuid) -> Option<Location> {
        self.presences.get(&participant).map(|p| p.location)
    }

    pub fn loadout_of(&self, participant: Uuid) -> Option<Loadout> {
        self.presences.get(&participant).and_then(|p| p.loadout)
    }

    fn presence(&mut self, participant: Uuid) -> &mut Presence {
        self.presences.entry(participant).or_insert(Presence {
            location: Location::Lobby,
            loadout: None,
        })
    }
}

/// Short display name derived from the identifier
pub fn fallback_name(participant: Uuid) -> String {
    format!("Player_{}", &participant.to_string()[..8])
}

impl Environment for HeadlessEnvironment {
    fn teleport(&mut self, participant: Uuid, location: Location) {
        debug!(participant = %participant, ?location, "Teleport");
        self.presence(participant).location = location;
    }

    fn apply_loadout(&mut self, participant: Uuid, loadout: Loadout) {
        debug!(participant = %participant, ?loadout, "Loadout applied");
        self.presence(participant).loadout = Some(loadout);
    }

    fn vitals(&self, participant: Uuid) -> Result<Vitals, ServiceError> {
        if !self.presences.contains_key(&participant) {
            return Err(ServiceError::Unreachable(participant));
        }
        Ok(Vitals {
            name: fallback_name(participant),
            health: DEFAULT_MAX_HEALTH,
            max_health: DEFAULT_MAX_HEALTH,
        })
    }
}
