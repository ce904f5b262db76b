//! Match actor and its handle.
//!
//! One task owns the [`MatchCoordinator`] and applies [`MatchEvent`]s from a
//! single mailbox. The timer is a separate task that only posts
//! [`MatchEvent::Tick`], so ticks and external events never interleave.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::RemainingTime;

use super::coordinator::{
    ConnectOutcome, DamageDecision, MatchCoordinator, MatchStatus, RosterChange, StartOutcome,
    StopOutcome,
};
use super::phase::Phase;
use super::report::MatchReport;
use super::stats::LifetimeStats;
use super::teams::{TeamColor, TeamJoinOutcome};
use super::vote::VoteOutcome;
use super::MatchError;

/// Pending events per match before senders wait
const MAILBOX_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<T>;

/// Everything that can mutate or read the coordinator
#[derive(Debug)]
pub enum MatchEvent {
    /// Timer beat
    Tick,
    Start(Reply<StartOutcome>),
    Stop(Reply<StopOutcome>),
    Connect {
        participant: Uuid,
        reply: Reply<ConnectOutcome>,
    },
    Disconnect {
        participant: Uuid,
        reply: Reply<()>,
    },
    Eliminated {
        victim: Uuid,
        attacker: Option<Uuid>,
        reply: Reply<bool>,
    },
    DamageAttempt {
        attacker: Uuid,
        target: Uuid,
        reply: Reply<DamageDecision>,
    },
    VoteToggle {
        participant: Uuid,
        reply: Reply<VoteOutcome>,
    },
    JoinWaiting {
        participant: Uuid,
        reply: Reply<RosterChange>,
    },
    ReturnToLobby {
        participant: Uuid,
        reply: Reply<()>,
    },
    Spectate {
        participant: Uuid,
        reply: Reply<()>,
    },
    Unspectate {
        participant: Uuid,
        reply: Reply<RosterChange>,
    },
    JoinTeam {
        participant: Uuid,
        team: TeamColor,
        reply: Reply<TeamJoinOutcome>,
    },
    LeaveTeams {
        participant: Uuid,
        reply: Reply<()>,
    },
    SetTeamEnabled {
        team: TeamColor,
        enabled: bool,
        reply: Reply<()>,
    },
    ToggleTeam {
        team: TeamColor,
        reply: Reply<bool>,
    },
    SetTeamsEnabled {
        enabled: bool,
        reply: Reply<()>,
    },
    SetFakeParticipants {
        count: usize,
        reply: Reply<()>,
    },
    Query(MatchQuery),
}

/// Reads that need the coordinator itself rather than the status snapshot
#[derive(Debug)]
pub enum MatchQuery {
    IsAlive {
        participant: Uuid,
        reply: Reply<bool>,
    },
    LifetimeStats {
        participant: Uuid,
        reply: Reply<LifetimeStats>,
    },
    StatsSummary(Reply<String>),
    ParticipantSummary {
        participant: Uuid,
        reply: Reply<String>,
    },
    LastReport(Reply<Option<MatchReport>>),
}

/// Handle to the running match actor
#[derive(Clone)]
pub struct MatchHandle {
    tx: mpsc::Sender<MatchEvent>,
    status: Arc<RwLock<MatchStatus>>,
    cancel: CancellationToken,
}

impl MatchHandle {
    /// Latest published status, without entering the mailbox
    pub fn status(&self) -> MatchStatus {
        self.status.read().clone()
    }

    pub fn phase(&self) -> Phase {
        self.status.read().phase
    }

    pub fn remaining_time(&self) -> RemainingTime {
        self.status.read().remaining
    }

    /// Stop the actor and its timer
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> MatchEvent,
    ) -> Result<T, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| MatchError::MailboxClosed)?;
        rx.await.map_err(|_| MatchError::MailboxClosed)
    }

    /// Post a tick outside the timer (manual stepping)
    pub async fn tick(&self) -> Result<(), MatchError> {
        self.tx
            .send(MatchEvent::Tick)
            .await
            .map_err(|_| MatchError::MailboxClosed)
    }

    pub async fn start_match(&self) -> Result<StartOutcome, MatchError> {
        self.request(MatchEvent::Start).await
    }

    pub async fn stop_match(&self) -> Result<StopOutcome, MatchError> {
        self.request(MatchEvent::Stop).await
    }

    pub async fn on_connect(&self, participant: Uuid) -> Result<ConnectOutcome, MatchError> {
        self.request(|reply| MatchEvent::Connect { participant, reply })
            .await
    }

    pub async fn on_disconnect(&self, participant: Uuid) -> Result<(), MatchError> {
        self.request(|reply| MatchEvent::Disconnect { participant, reply })
            .await
    }

    pub async fn on_eliminated(
        &self,
        victim: Uuid,
        attacker: Option<Uuid>,
    ) -> Result<bool, MatchError> {
        self.request(|reply| MatchEvent::Eliminated {
            victim,
            attacker,
            reply,
        })
        .await
    }

    pub async fn on_damage_attempt(
        &self,
        attacker: Uuid,
        target: Uuid,
    ) -> Result<DamageDecision, MatchError> {
        self.request(|reply| MatchEvent::DamageAttempt {
            attacker,
            target,
            reply,
        })
        .await
    }

    pub async fn on_vote_toggle(&self, participant: Uuid) -> Result<VoteOutcome, MatchError> {
        self.request(|reply| MatchEvent::VoteToggle { participant, reply })
            .await
    }

    pub async fn join_waiting(&self, participant: Uuid) -> Result<RosterChange, MatchError> {
        self.request(|reply| MatchEvent::JoinWaiting { participant, reply })
            .await
    }

    pub async fn return_to_lobby(&self, participant: Uuid) -> Result<(), MatchError> {
        self.request(|reply| MatchEvent::ReturnToLobby { participant, reply })
            .await
    }

    pub async fn spectate(&self, participant: Uuid) -> Result<(), MatchError> {
        self.request(|reply| MatchEvent::Spectate { participant, reply })
            .await
    }

    pub async fn unspectate(&self, participant: Uuid) -> Result<RosterChange, MatchError> {
        self.request(|reply| MatchEvent::Unspectate { participant, reply })
            .await
    }

    pub async fn join_team(
        &self,
        participant: Uuid,
        team: TeamColor,
    ) -> Result<TeamJoinOutcome, MatchError> {
        self.request(|reply| MatchEvent::JoinTeam {
            participant,
            team,
            reply,
        })
        .await
    }

    pub async fn leave_teams(&self, participant: Uuid) -> Result<(), MatchError> {
        self.request(|reply| MatchEvent::LeaveTeams { participant, reply })
            .await
    }

    pub async fn set_team_enabled(&self, team: TeamColor, enabled: bool) -> Result<(), MatchError> {
        self.request(|reply| MatchEvent::SetTeamEnabled {
            team,
            enabled,
            reply,
        })
        .await
    }

    pub async fn toggle_team(&self, team: TeamColor) -> Result<bool, MatchError> {
        self.request(|reply| MatchEvent::ToggleTeam { team, reply })
            .await
    }

    pub async fn set_teams_enabled(&self, enabled: bool) -> Result<(), MatchError> {
        self.request(|reply| MatchEvent::SetTeamsEnabled { enabled, reply })
            .await
    }

    pub async fn set_fake_participants(&self, count: usize) -> Result<(), MatchError> {
        self.request(|reply| MatchEvent::SetFakeParticipants { count, reply })
            .await
    }

    pub async fn is_alive(&self, participant: Uuid) -> Result<bool, MatchError> {
        self.request(|reply| MatchEvent::Query(MatchQuery::IsAlive { participant, reply }))
            .await
    }

    pub async fn lifetime_stats(&self, participant: Uuid) -> Result<LifetimeStats, MatchError> {
        self.request(|reply| {
            MatchEvent::Query(MatchQuery::LifetimeStats { participant, reply })
        })
        .await
    }

    pub async fn stats_summary(&self) -> Result<String, MatchError> {
        self.request(|reply| MatchEvent::Query(MatchQuery::StatsSummary(reply)))
            .await
    }

    pub async fn participant_stats_summary(&self, participant: Uuid) -> Result<String, MatchError> {
        self.request(|reply| {
            MatchEvent::Query(MatchQuery::ParticipantSummary { participant, reply })
        })
        .await
    }

    pub async fn last_report(&self) -> Result<Option<MatchReport>, MatchError> {
        self.request(|reply| MatchEvent::Query(MatchQuery::LastReport(reply)))
            .await
    }
}

/// The match actor
pub struct GameMatch {
    coordinator: MatchCoordinator,
    mailbox: mpsc::Receiver<MatchEvent>,
    ticker_tx: mpsc::Sender<MatchEvent>,
    tick_interval: Duration,
    status: Arc<RwLock<MatchStatus>>,
    cancel: CancellationToken,
}

impl GameMatch {
    pub fn new(
        coordinator: MatchCoordinator,
        tick_interval: Duration,
        cancel: CancellationToken,
    ) -> (Self, MatchHandle) {
        let (tx, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let status = Arc::new(RwLock::new(coordinator.status()));

        let handle = MatchHandle {
            tx: tx.clone(),
            status: status.clone(),
            cancel: cancel.clone(),
        };

        let game_match = Self {
            coordinator,
            mailbox,
            ticker_tx: tx,
            tick_interval,
            status,
            cancel,
        };

        (game_match, handle)
    }

    /// Drain the mailbox until cancelled
    pub async fn run(mut self) {
        info!(tick_ms = self.tick_interval.as_millis() as u64, "Match coordinator started");

        let ticker = spawn_ticker(
            self.ticker_tx.clone(),
            self.tick_interval,
            self.cancel.child_token(),
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                event = self.mailbox.recv() => match event {
                    Some(event) => {
                        self.dispatch(event);
                        self.publish_status();
                    }
                    None => break,
                },
            }
        }

        let outcome = self.coordinator.shutdown();
        self.publish_status();
        self.cancel.cancel();
        if let Err(err) = ticker.await {
            warn!(error = %err, "Ticker task failed");
        }
        info!(?outcome, "Match coordinator stopped");
    }

    fn publish_status(&self) {
        *self.status.write() = self.coordinator.status();
    }

    fn dispatch(&mut self, event: MatchEvent) {
        let c = &mut self.coordinator;
        match event {
            MatchEvent::Tick => c.tick(),
            MatchEvent::Start(reply) => {
                let _ = reply.send(c.start_match());
            }
            MatchEvent::Stop(reply) => {
                let _ = reply.send(c.stop_match());
            }
            MatchEvent::Connect { participant, reply } => {
                let _ = reply.send(c.on_connect(participant));
            }
            MatchEvent::Disconnect { participant, reply } => {
                c.on_disconnect(participant);
                let _ = reply.send(());
            }
            MatchEvent::Eliminated {
                victim,
                attacker,
                reply,
            } => {
                let _ = reply.send(c.on_eliminated(victim, attacker));
            }
            MatchEvent::DamageAttempt {
                attacker,
                target,
                reply,
            } => {
                let _ = reply.send(c.on_damage_attempt(attacker, target));
            }
            MatchEvent::VoteToggle { participant, reply } => {
                let _ = reply.send(c.on_vote_toggle(participant));
            }
            MatchEvent::JoinWaiting { participant, reply } => {
                let _ = reply.send(c.join_waiting(participant));
            }
            MatchEvent::ReturnToLobby { participant, reply } => {
                c.return_to_lobby(participant);
                let _ = reply.send(());
            }
            MatchEvent::Spectate { participant, reply } => {
                c.spectate(participant);
                let _ = reply.send(());
            }
            MatchEvent::Unspectate { participant, reply } => {
                let _ = reply.send(c.unspectate(participant));
            }
            MatchEvent::JoinTeam {
                participant,
                team,
                reply,
            } => {
                let _ = reply.send(c.join_team(participant, team));
            }
            MatchEvent::LeaveTeams { participant, reply } => {
                c.leave_teams(participant);
                let _ = reply.send(());
            }
            MatchEvent::SetTeamEnabled {
                team,
                enabled,
                reply,
            } => {
                c.set_team_enabled(team, enabled);
                let _ = reply.send(());
            }
            MatchEvent::ToggleTeam { team, reply } => {
                let _ = reply.send(c.toggle_team(team));
            }
            MatchEvent::SetTeamsEnabled { enabled, reply } => {
                c.set_teams_enabled(enabled);
                let _ = reply.send(());
            }
            MatchEvent::SetFakeParticipants { count, reply } => {
                c.set_fake_participants(count);
                let _ = reply.send(());
            }
            MatchEvent::Query(query) => match query {
                MatchQuery::IsAlive { participant, reply } => {
                    let _ = reply.send(c.is_alive(participant));
                }
                MatchQuery::LifetimeStats { participant, reply } => {
                    let _ = reply.send(c.lifetime_stats(participant));
                }
                MatchQuery::StatsSummary(reply) => {
                    let _ = reply.send(c.stats_summary());
                }
                MatchQuery::ParticipantSummary { participant, reply } => {
                    let _ = reply.send(c.participant_stats_summary(participant));
                }
                MatchQuery::LastReport(reply) => {
                    let _ = reply.send(c.last_report().cloned());
                }
            },
        }
    }
}

/// Post a `Tick` every `period` until cancelled.
/// A full mailbox drops the tick rather than queueing a backlog.
pub fn spawn_ticker(
    tx: mpsc::Sender<MatchEvent>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticks.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => match tx.try_send(MatchEvent::Tick) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => warn!("Mailbox full, tick skipped"),
                    Err(TrySendError::Closed(_)) => break,
                },
            }
        }
        debug!("Ticker stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::config::MatchSettings;
    use crate::game::coordinator::Collaborators;
    use crate::services::testing::{
        RecordingEnvironment, RecordingPresentation, Recorder, ScriptedArena, SharedRecorder,
    };

    fn spawn_match(tick_interval: Duration) -> (MatchHandle, JoinHandle<()>, SharedRecorder) {
        let log: SharedRecorder = Arc::new(Mutex::new(Recorder::default()));
        let settings = MatchSettings {
            countdown_secs: 2,
            collection_secs: 2,
            pvp_secs: 2,
            border_shrink_secs: 1,
            teams_enabled: false,
            ..MatchSettings::default()
        };
        let coordinator = MatchCoordinator::new(
            settings,
            Collaborators {
                arena: Box::new(ScriptedArena::new(log.clone())),
                presentation: Box::new(RecordingPresentation { log: log.clone() }),
                environment: Box::new(RecordingEnvironment { log: log.clone() }),
            },
        );
        let (game_match, handle) =
            GameMatch::new(coordinator, tick_interval, CancellationToken::new());
        let task = tokio::spawn(game_match.run());
        (handle, task, log)
    }

    async fn enlist(handle: &MatchHandle, n: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for _ in 0..n {
            let id = Uuid::new_v4();
            assert_ok!(handle.on_connect(id).await);
            assert_ok!(handle.join_waiting(id).await);
            ids.push(id);
        }
        ids
    }

    const NEVER: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn status_snapshot_follows_events() {
        let (handle, task, _log) = spawn_match(NEVER);
        assert_eq!(handle.phase(), Phase::Idle);

        enlist(&handle, 2).await;
        assert_eq!(handle.status().alive, 2);

        let outcome = assert_ok!(handle.start_match().await);
        assert_eq!(outcome, StartOutcome::Accepted);
        assert_eq!(handle.phase(), Phase::Countdown);
        assert_eq!(handle.remaining_time(), RemainingTime::from_secs(2));

        handle.shutdown();
        assert_ok!(task.await);
    }

    #[tokio::test]
    async fn manual_ticks_drive_the_lifecycle() {
        let (handle, task, _log) = spawn_match(NEVER);
        let ids = enlist(&handle, 3).await;
        assert_ok!(handle.start_match().await);

        for _ in 0..2 {
            assert_ok!(handle.tick().await);
        }
        // Queries go through the same mailbox, so they observe every tick before them.
        assert!(assert_ok!(handle.is_alive(ids[0]).await));
        assert_eq!(handle.phase(), Phase::Collection);

        assert!(assert_ok!(handle.on_eliminated(ids[0], Some(ids[1])).await));
        assert!(assert_ok!(handle.on_eliminated(ids[2], Some(ids[1])).await));
        assert_eq!(handle.phase(), Phase::Ended);

        let stats = assert_ok!(handle.lifetime_stats(ids[1]).await);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.kills, 2);
        let report = assert_ok!(handle.last_report().await);
        assert_eq!(report.map(|r| r.results.len()), Some(3));

        handle.shutdown();
        assert_ok!(task.await);
    }

    #[tokio::test]
    async fn ticker_advances_phases_on_its_own() {
        let (handle, task, log) = spawn_match(Duration::from_millis(5));
        enlist(&handle, 2).await;
        assert_ok!(handle.start_match().await);

        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            while !log.lock().announced("PVP has begun") {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
        assert_ok!(reached);
        assert_ne!(handle.phase(), Phase::Countdown);

        handle.shutdown();
        assert_ok!(task.await);
    }

    #[tokio::test]
    async fn shutdown_force_stops_and_closes_mailbox() {
        let (handle, task, log) = spawn_match(NEVER);
        enlist(&handle, 2).await;
        assert_ok!(handle.start_match().await);

        handle.shutdown();
        assert_ok!(task.await);

        assert_eq!(handle.phase(), Phase::Idle);
        assert_eq!(log.lock().teardowns.len(), 1);
        assert_err!(handle.stats_summary().await);
    }

    #[tokio::test]
    async fn vote_and_team_requests_round_trip() {
        let (handle, task, _log) = spawn_match(NEVER);
        let ids = enlist(&handle, 1).await;

        let outcome = assert_ok!(handle.join_team(ids[0], TeamColor::Red).await);
        assert_eq!(outcome, TeamJoinOutcome::TeamModeOff);
        assert_ok!(handle.set_teams_enabled(true).await);
        let outcome = assert_ok!(handle.join_team(ids[0], TeamColor::Red).await);
        assert_eq!(outcome, TeamJoinOutcome::Joined(TeamColor::Red));

        assert_ok!(handle.set_fake_participants(1).await);
        let vote = assert_ok!(handle.on_vote_toggle(ids[0]).await);
        assert_eq!(vote, VoteOutcome::QuorumReached { required: 1 });
        assert_eq!(handle.phase(), Phase::Countdown);

        let summary = assert_ok!(handle.stats_summary().await);
        assert!(summary.contains("Phase: COUNTDOWN"));

        handle.shutdown();
        assert_ok!(task.await);
    }
}
