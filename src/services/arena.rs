//! Arena provisioning and boundary control

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

/// Position inside an arena
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Opaque identifier of a provisioned arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaHandle(pub u64);

/// Result of a readiness poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaStatus {
    /// Still being generated
    Pending,
    Ready,
    /// Gone (failed late or destroyed externally)
    Lost,
}

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("arena provisioning failed: {0}")]
    Provisioning(String),
}

/// Disposable per-match environment.
///
/// `provision` only requests an arena; callers poll `status` until it
/// reports `Ready` before placing anyone inside.
pub trait ArenaService: Send {
    fn provision(&mut self) -> Result<ArenaHandle, ArenaError>;

    fn status(&mut self, handle: ArenaHandle) -> ArenaStatus;

    fn teardown(&mut self, handle: ArenaHandle);

    fn set_boundary(&mut self, handle: ArenaHandle, size: f64);

    fn shrink_boundary(&mut self, handle: ArenaHandle, target_size: f64, duration_secs: u32);

    /// Safe standing position, `None` once the search gives up
    fn find_safe_location(&mut self, handle: ArenaHandle, near: Option<Point>) -> Option<Point>;

    fn spawn_point(&mut self, handle: ArenaHandle) -> Point;
}

/// Attempts per safe-location search
const SAFE_SEARCH_ATTEMPTS: usize = 50;
/// Search radius around the requested centre
const SAFE_SEARCH_RADIUS: f64 = 50.0;
/// Ground level of the headless arena
const GROUND_LEVEL: f64 = 64.0;

#[derive(Debug, Clone)]
struct ArenaRecord {
    polls_until_ready: u32,
    border: f64,
}

/// In-process arena used when no world host is attached.
///
/// Generation takes `generation_polls` readiness polls to complete, which
/// keeps the coordinator honest about asynchronous provisioning.
pub struct HeadlessArena {
    rng: ChaCha8Rng,
    next_id: u64,
    generation_polls: u32,
    arenas: HashMap<ArenaHandle, ArenaRecord>,
    is_safe: Box<dyn Fn(Point) -> bool + Send>,
}

impl HeadlessArena {
    pub fn new(seed: u64, generation_polls: u32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 1,
            generation_polls,
            arenas: HashMap::new(),
            is_safe: Box::new(|_| true),
        }
    }

    /// Replace the terrain safety predicate
    pub fn with_safety(mut self, is_safe: impl Fn(Point) -> bool + Send + 'static) -> Self {
        self.is_safe = Box::new(is_safe);
        self
    }

    pub fn border(&self, handle: ArenaHandle) -> Option<f64> {
        self.arenas.get(&handle).map(|a| a.border)
    }
}

impl ArenaService for HeadlessArena {
    fn provision(&mut self) -> Result<ArenaHandle, ArenaError> {
        let handle = ArenaHandle(self.next_id);
        self.next_id += 1;
        self.arenas.insert(
            handle,
            ArenaRecord {
                polls_until_ready: self.generation_polls,
                border: f64::MAX,
            },
        );
        info!(arena = handle.0, "Arena generation requested");
        Ok(handle)
    }

    fn status(&mut self, handle: ArenaHandle) -> ArenaStatus {
        match self.arenas.get_mut(&handle) {
            Some(record) if record.polls_until_ready == 0 => ArenaStatus::Ready,
            Some(record) => {
                record.polls_until_ready -= 1;
                ArenaStatus::Pending
            }
            None => ArenaStatus::Lost,
        }
    }

    fn teardown(&mut self, handle: ArenaHandle) {
        if self.arenas.remove(&handle).is_some() {
            info!(arena = handle.0, "Arena removed");
        } else {
            warn!(arena = handle.0, "Teardown requested for unknown arena");
        }
    }

    fn set_boundary(&mut self, handle: ArenaHandle, size: f64) {
        if let Some(record) = self.arenas.get_mut(&handle) {
            record.border = size;
            info!(arena = handle.0, size, "Boundary set");
        }
    }

    fn shrink_boundary(&mut self, handle: ArenaHandle, target_size: f64, duration_secs: u32) {
        if let Some(record) = self.arenas.get_mut(&handle) {
            // The headless arena has no simulation; settle on the target immediately.
            record.border = target_size;
            info!(
                arena = handle.0,
                target_size, duration_secs, "Boundary shrinking"
            );
        }
    }

    fn find_safe_location(&mut self, handle: ArenaHandle, near: Option<Point>) -> Option<Point> {
        if !self.arenas.contains_key(&handle) {
            return None;
        }
        let center = near.unwrap_or(Point::new(0.5, GROUND_LEVEL, 0.5));

        for _ in 0..SAFE_SEARCH_ATTEMPTS {
            let angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
            let distance = self.rng.gen_range(0.0..SAFE_SEARCH_RADIUS);
            let candidate = Point::new(
                (center.x + angle.cos() * distance).floor() + 0.5,
                GROUND_LEVEL,
                (center.z + angle.sin() * distance).floor() + 0.5,
            );
            if (self.is_safe)(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn spawn_point(&mut self, _handle: ArenaHandle) -> Point {
        Point::new(0.5, GROUND_LEVEL + 1.0, 0.5)
    }
}
