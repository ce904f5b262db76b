//! Recording collaborator doubles for coordinator tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::game::report::MatchReport;

use super::{
    fallback_name, ArenaError, ArenaHandle, ArenaService, ArenaStatus, Environment, Loadout,
    Location, Point, Presentation, ServiceError, Signal, StatusBar, Vitals,
};

/// Boundary requests seen by the arena double
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryCall {
    Set(f64),
    Shrink { target: f64, secs: u32 },
}

/// Everything the doubles observed, shared with the test body
#[derive(Debug, Default)]
pub struct Recorder {
    pub announcements: Vec<String>,
    pub told: Vec<(Uuid, String)>,
    pub bars: Vec<StatusBar>,
    pub tags: Vec<(Uuid, Option<String>)>,
    pub signals: Vec<Signal>,
    pub reports: Vec<MatchReport>,
    pub teleports: Vec<(Uuid, Location)>,
    pub loadouts: Vec<(Uuid, Loadout)>,
    pub boundary: Vec<BoundaryCall>,
    pub provisioned: Vec<ArenaHandle>,
    pub teardowns: Vec<ArenaHandle>,
    pub script: ArenaScript,
    /// Health reported by the environment double; unknown ids are unreachable
    pub health: HashMap<Uuid, f64>,
    /// Tag updates for these identifiers fail
    pub failing_tags: HashSet<Uuid>,
}

/// Behaviour knobs for [`ScriptedArena`], adjustable mid-test
#[derive(Debug)]
pub struct ArenaScript {
    pub fail_provision: bool,
    /// Pending polls before the arena reports ready
    pub ready_after: u32,
    /// When false every safe-location search is exhausted
    pub safe_terrain: bool,
    /// Report the arena lost on every poll
    pub lost: bool,
}

impl Default for ArenaScript {
    fn default() -> Self {
        Self {
            fail_provision: false,
            ready_after: 0,
            safe_terrain: true,
            lost: false,
        }
    }
}

impl Recorder {
    pub fn announced(&self, needle: &str) -> bool {
        self.announcements.iter().any(|a| a.contains(needle))
    }

    pub fn last_location(&self, id: Uuid) -> Option<Location> {
        self.teleports
            .iter()
            .rev()
            .find(|(who, _)| *who == id)
            .map(|(_, loc)| *loc)
    }

    pub fn last_loadout(&self, id: Uuid) -> Option<Loadout> {
        self.loadouts
            .iter()
            .rev()
            .find(|(who, _)| *who == id)
            .map(|(_, l)| *l)
    }

    pub fn last_tag(&self, id: Uuid) -> Option<Option<String>> {
        self.tags
            .iter()
            .rev()
            .find(|(who, _)| *who == id)
            .map(|(_, t)| t.clone())
    }
}

pub type SharedRecorder = Arc<Mutex<Recorder>>;

pub struct RecordingPresentation {
    pub log: SharedRecorder,
}

impl Presentation for RecordingPresentation {
    fn announce(&mut self, text: &str) {
        self.log.lock().announcements.push(text.to_string());
    }

    fn tell(&mut self, participant: Uuid, text: &str) {
        self.log.lock().told.push((participant, text.to_string()));
    }

    fn set_status_bar(&mut self, bar: &StatusBar) {
        self.log.lock().bars.push(bar.clone());
    }

    fn set_participant_tag(
        &mut self,
        participant: Uuid,
        tag: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut log = self.log.lock();
        if log.failing_tags.contains(&participant) {
            return Err(ServiceError::Failed("tag rejected".to_string()));
        }
        log.tags.push((participant, tag.map(str::to_string)));
        Ok(())
    }

    fn play_signal(&mut self, signal: Signal) {
        self.log.lock().signals.push(signal);
    }

    fn publish_report(&mut self, report: &MatchReport) {
        self.log.lock().reports.push(report.clone());
    }
}

pub struct RecordingEnvironment {
    pub log: SharedRecorder,
}

impl Environment for RecordingEnvironment {
    fn teleport(&mut self, participant: Uuid, location: Location) {
        self.log.lock().teleports.push((participant, location));
    }

    fn apply_loadout(&mut self, participant: Uuid, loadout: Loadout) {
        self.log.lock().loadouts.push((participant, loadout));
    }

    fn vitals(&self, participant: Uuid) -> Result<Vitals, ServiceError> {
        let health = self
            .log
            .lock()
            .health
            .get(&participant)
            .copied()
            .ok_or(ServiceError::Unreachable(participant))?;
        Ok(Vitals {
            name: fallback_name(participant),
            health,
            max_health: 20.0,
        })
    }
}

/// Arena double driven by the knobs in [`Recorder::script`]
pub struct ScriptedArena {
    pub log: SharedRecorder,
    polls: u32,
    next_id: u64,
}

impl ScriptedArena {
    pub fn new(log: SharedRecorder) -> Self {
        Self {
            log,
            polls: 0,
            next_id: 1,
        }
    }
}

pub const SCRIPTED_SAFE_SPOT: Point = Point {
    x: 10.5,
    y: 64.0,
    z: -3.5,
};

pub const SCRIPTED_SPAWN: Point = Point {
    x: 0.5,
    y: 65.0,
    z: 0.5,
};

impl ArenaService for ScriptedArena {
    fn provision(&mut self) -> Result<ArenaHandle, ArenaError> {
        if self.log.lock().script.fail_provision {
            return Err(ArenaError::Provisioning("generator offline".to_string()));
        }
        let handle = ArenaHandle(self.next_id);
        self.next_id += 1;
        self.polls = 0;
        self.log.lock().provisioned.push(handle);
        Ok(handle)
    }

    fn status(&mut self, _handle: ArenaHandle) -> ArenaStatus {
        let (lost, ready_after) = {
            let log = self.log.lock();
            (log.script.lost, log.script.ready_after)
        };
        if lost {
            return ArenaStatus::Lost;
        }
        if self.polls >= ready_after {
            ArenaStatus::Ready
        } else {
            self.polls += 1;
            ArenaStatus::Pending
        }
    }

    fn teardown(&mut self, handle: ArenaHandle) {
        self.log.lock().teardowns.push(handle);
    }

    fn set_boundary(&mut self, _handle: ArenaHandle, size: f64) {
        self.log.lock().boundary.push(BoundaryCall::Set(size));
    }

    fn shrink_boundary(&mut self, _handle: ArenaHandle, target_size: f64, duration_secs: u32) {
        self.log.lock().boundary.push(BoundaryCall::Shrink {
            target: target_size,
            secs: duration_secs,
        });
    }

    fn find_safe_location(&mut self, _handle: ArenaHandle, _near: Option<Point>) -> Option<Point> {
        self.log
            .lock()
            .script
            .safe_terrain
            .then_some(SCRIPTED_SAFE_SPOT)
    }

    fn spawn_point(&mut self, _handle: ArenaHandle) -> Point {
        SCRIPTED_SPAWN
    }
}
