//! Application state shared by the entry point

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::game::{Collaborators, GameMatch, MatchCoordinator, MatchHandle};
use crate::services::{BroadcastPresentation, HeadlessArena, HeadlessEnvironment, Notice};

/// Buffered notices per subscriber before it starts lagging
const NOTICE_CAPACITY: usize = 256;
/// Readiness polls the headless arena needs before it is usable
const ARENA_GENERATION_POLLS: u32 = 2;

/// Shared application state
pub struct AppState {
    pub config: Arc<Config>,
    pub matches: MatchHandle,
    presentation: BroadcastPresentation,
    actor: JoinHandle<()>,
}

impl AppState {
    /// Build the coordinator and spawn its actor. Requires a tokio runtime.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let seed = config.arena_seed.unwrap_or_else(rand::random);
        let presentation = BroadcastPresentation::new(NOTICE_CAPACITY);
        let coordinator = MatchCoordinator::new(
            config.match_settings.clone(),
            Collaborators {
                arena: Box::new(HeadlessArena::new(seed, ARENA_GENERATION_POLLS)),
                presentation: Box::new(presentation.clone()),
                environment: Box::new(HeadlessEnvironment::new()),
            },
        );

        let (game_match, matches) =
            GameMatch::new(coordinator, config.tick_interval, CancellationToken::new());
        let actor = tokio::spawn(game_match.run());
        info!(arena_seed = seed, "Match coordinator spawned");

        Self {
            config,
            matches,
            presentation,
            actor,
        }
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.presentation.subscribe()
    }

    /// Force-stop any running match, then stop the actor and its timer
    pub async fn shutdown(self) {
        match self.matches.stop_match().await {
            Ok(outcome) => info!(?outcome, "Match stopped for shutdown"),
            Err(err) => warn!(error = %err, "Stop request during shutdown failed"),
        }
        self.matches.shutdown();
        if let Err(err) = self.actor.await {
            warn!(error = %err, "Match actor ended abnormally");
        }
    }
}
