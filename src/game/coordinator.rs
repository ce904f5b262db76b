//! Match lifecycle coordinator.
//!
//! Owns every piece of match state: phase, roster, teams, statistics, kill
//! ledger, vote gate, clock and arena slot. It is not synchronized; the
//! match actor feeds it one event at a time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchSettings;
use crate::services::{
    fallback_name, ArenaHandle, ArenaService, ArenaStatus, BarColor, Environment, Loadout,
    Location, Point, Presentation, Signal, StatusBar, Vitals,
};
use crate::util::time::RemainingTime;

use super::clock::{ClockStep, MatchClock};
use super::phase::Phase;
use super::report::{EndReason, MatchReport, Winner};
use super::roster::{ReconnectIntent, Roster, RosterSlot};
use super::stats::{KillEntry, KillLedger, LifetimeStats, StatsRegistry};
use super::teams::{TeamColor, TeamJoinOutcome, TeamRegistry};
use super::verdict::{self, Verdict};
use super::vote::{VoteGate, VoteOutcome};
use super::MatchError;

/// Status tags longer than this are cut
const STATUS_TAG_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    Rejected(StartRejection),
}

/// Why a start request was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartRejection {
    #[error("a match is already running ({0})")]
    AlreadyRunning(Phase),

    #[error("not enough participants ({present}/{required})")]
    NotEnoughParticipants { required: usize, present: usize },

    #[error("arena unavailable: {0}")]
    ArenaUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageDecision {
    Allow,
    Deny,
}

/// What happened to a connecting participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Idle lobby arrival
    Lobby,
    /// Back into a running gathering phase
    Resumed,
    /// Sent to the lobby because of a pending reconnect flag
    ReturnedToLobby,
    /// Joined while a match runs
    Spectating,
}

/// Result of a roster request that is only valid in some phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterChange {
    Applied,
    PhaseLocked(Phase),
}

/// Cheap snapshot published after every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchStatus {
    pub phase: Phase,
    pub remaining: RemainingTime,
    pub alive: usize,
    pub votes: usize,
}

impl Default for MatchStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            remaining: RemainingTime::zero(),
            alive: 0,
            votes: 0,
        }
    }
}

/// Relocation into the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Individual safe spots for participants not yet inside, equipment reset
    Scatter,
    /// Everyone relocated; one shared spot per team in team mode
    Regroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArenaSlot {
    Absent,
    Provisioning(ArenaHandle),
    Ready(ArenaHandle),
}

/// External services the coordinator drives
pub struct Collaborators {
    pub arena: Box<dyn ArenaService>,
    pub presentation: Box<dyn Presentation>,
    pub environment: Box<dyn Environment>,
}

pub struct MatchCoordinator {
    settings: MatchSettings,
    phase: Phase,
    roster: Roster,
    teams: TeamRegistry,
    stats: StatsRegistry,
    ledger: KillLedger,
    votes: VoteGate,
    clock: MatchClock,
    arena: ArenaSlot,
    pending_placement: Option<Placement>,
    pvp_started_at: Option<DateTime<Utc>>,
    fake_participants: usize,
    last_report: Option<MatchReport>,

    arena_service: Box<dyn ArenaService>,
    presentation: Box<dyn Presentation>,
    environment: Box<dyn Environment>,
}

/// Render a status tag from `format`, substituting `{name}` and `{hp}`
pub fn render_status_tag(format: &str, vitals: &Vitals) -> String {
    let hp = vitals.health.clamp(0.0, vitals.max_health.max(0.0));
    let hp_text = if hp >= 10.0 {
        format!("{:.0}", hp)
    } else {
        format!("{:.1}", hp)
    };
    format
        .replace("{name}", &vitals.name)
        .replace("{hp}", &hp_text)
        .chars()
        .take(STATUS_TAG_MAX_CHARS)
        .collect()
}

impl MatchCoordinator {
    pub fn new(settings: MatchSettings, services: Collaborators) -> Self {
        let teams = TeamRegistry::new(settings.teams_enabled, &settings.disabled_teams);
        Self {
            settings,
            phase: Phase::Idle,
            roster: Roster::new(),
            teams,
            stats: StatsRegistry::new(),
            ledger: KillLedger::new(),
            votes: VoteGate::new(),
            clock: MatchClock::new(),
            arena: ArenaSlot::Absent,
            pending_placement: None,
            pvp_started_at: None,
            fake_participants: 0,
            last_report: None,
            arena_service: services.arena,
            presentation: services.presentation,
            environment: services.environment,
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_alive(&self, id: Uuid) -> bool {
        self.roster.is_alive(id)
    }

    /// Lifetime record, created on first reference
    pub fn lifetime_stats(&mut self, id: Uuid) -> LifetimeStats {
        *self.stats.get_or_create(id)
    }

    pub fn remaining_time(&self) -> RemainingTime {
        self.clock.remaining(self.phase)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn teams(&self) -> &TeamRegistry {
        &self.teams
    }

    pub fn ledger(&self) -> &KillLedger {
        &self.ledger
    }

    pub fn pvp_started_at(&self) -> Option<DateTime<Utc>> {
        self.pvp_started_at
    }

    pub fn vote_count(&self) -> usize {
        self.votes.count()
    }

    pub fn arena_ready(&self) -> bool {
        matches!(self.arena, ArenaSlot::Ready(_))
    }

    pub fn last_report(&self) -> Option<&MatchReport> {
        self.last_report.as_ref()
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus {
            phase: self.phase,
            remaining: self.remaining_time(),
            alive: self.roster.alive_count(),
            votes: self.votes.count(),
        }
    }

    /// Phase, roster counts, team table and remaining time
    pub fn stats_summary(&self) -> String {
        let mut out = String::from("=== Match status ===\n");
        out.push_str(&format!("Phase: {}\n", self.phase));
        out.push_str(&format!("Participants: {}\n", self.roster.alive_count()));
        out.push_str(&format!(
            "Waiting spectators: {}\n",
            self.roster.idle_spectators().len()
        ));
        out.push_str(&format!(
            "Match spectators: {}\n",
            self.roster.match_spectators().len()
        ));

        if self.teams.teams_enabled() {
            out.push_str("=== Teams ===\n");
            for team in TeamColor::ALL {
                out.push_str(&format!(
                    "{} team: {} ({})\n",
                    team,
                    self.teams.members(team).len(),
                    if self.teams.is_enabled(team) {
                        "enabled"
                    } else {
                        "disabled"
                    }
                ));
            }
        }

        if self.phase != Phase::Idle {
            out.push_str(&format!("Remaining: {}\n", self.remaining_time()));
        }
        out
    }

    pub fn participant_stats_summary(&mut self, id: Uuid) -> String {
        let name = self.name_of(id);
        self.stats.get_or_create(id).summary(&name)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn start_match(&mut self) -> StartOutcome {
        if self.phase != Phase::Idle {
            warn!(phase = %self.phase, "Start refused, match already running");
            return StartOutcome::Rejected(StartRejection::AlreadyRunning(self.phase));
        }

        let required = self.settings.min_participants;
        let present = self.roster.alive_count() + self.fake_participants;
        if present < required {
            warn!(present, required, "Start refused, not enough participants");
            return StartOutcome::Rejected(StartRejection::NotEnoughParticipants {
                required,
                present,
            });
        }

        let handle = match self.arena_service.provision() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "Start refused, arena provisioning failed");
                return StartOutcome::Rejected(StartRejection::ArenaUnavailable(err.to_string()));
            }
        };
        self.arena = ArenaSlot::Provisioning(handle);
        self.pvp_started_at = None;

        if let Err(err) = self.begin_countdown() {
            warn!(error = %err, "Countdown could not begin");
            self.release_arena();
            return StartOutcome::Rejected(StartRejection::AlreadyRunning(self.phase));
        }
        self.request_placement(Placement::Scatter);

        info!(
            participants = self.roster.alive_count(),
            fake = self.fake_participants,
            arena = handle.0,
            "Match started"
        );
        StartOutcome::Accepted
    }

    /// Force any running match straight to ENDED with no winner
    pub fn stop_match(&mut self) -> StopOutcome {
        if matches!(self.phase, Phase::Idle | Phase::Ended) {
            return StopOutcome::NotRunning;
        }
        info!(phase = %self.phase, "Match stopped by administrator");
        self.finish(EndReason::ForcedStop, None);
        self.presentation
            .announce("[Match] The match was stopped by an administrator.");
        StopOutcome::Stopped
    }

    /// Stop whatever runs and settle in IDLE with no arena held
    pub fn shutdown(&mut self) -> StopOutcome {
        let outcome = self.stop_match();
        if self.phase == Phase::Ended {
            if let Err(err) = self.transition(Phase::Idle) {
                warn!(error = %err, "Shutdown could not return to idle");
            }
        }
        self.release_arena();
        self.clock.disarm_all();
        outcome
    }

    /// One timer tick
    pub fn tick(&mut self) {
        match self.phase {
            Phase::Idle => return,
            Phase::Ended => {
                if let Err(err) = self.transition(Phase::Idle) {
                    warn!(error = %err, "Return to idle refused");
                }
                return;
            }
            _ => {}
        }

        self.poll_arena();
        self.forfeit_stranded();
        if self.phase == Phase::Ended {
            return;
        }

        let phase = self.phase;
        let step = self.clock.step(phase);
        self.present_clock_step(&step);
        if step.expired {
            self.on_phase_expired(phase);
        }

        if self.phase.is_running() && self.phase != Phase::Ended {
            self.refresh_status_tags();
        }
    }

    // ---------------------------------------------------------------------
    // Participant events
    // ---------------------------------------------------------------------

    pub fn on_connect(&mut self, id: Uuid) -> ConnectOutcome {
        self.roster.set_connected(id, true);

        match self.roster.take_reconnect_intent(id) {
            Some(ReconnectIntent::ReturnToLobby) => {
                self.roster.remove(id);
                self.send_to_lobby(id);
                self.presentation
                    .tell(id, "You left during PVP and were returned to the lobby.");
                info!(participant = %id, "Reconnected after forfeit, sent to lobby");
                ConnectOutcome::ReturnedToLobby
            }
            Some(ReconnectIntent::AwaitingResumption) => {
                let resumable = self.phase == Phase::Collection
                    && self.roster.is_alive(id)
                    && self.arena != ArenaSlot::Absent;
                if !resumable {
                    let forfeited = self.roster.is_alive(id) && self.phase.is_in_play();
                    if forfeited {
                        self.forfeit(id);
                        self.roster.take_reconnect_intent(id);
                    }
                    self.roster.remove(id);
                    self.send_to_lobby(id);
                    self.presentation.tell(
                        id,
                        "The gathering phase is over, you were returned to the lobby.",
                    );
                    info!(participant = %id, phase = %self.phase, "Resumption too late, sent to lobby");
                    // Removed first so the forfeit is not charged again as a spectator loss
                    if forfeited {
                        self.check_for_winner();
                    }
                    return ConnectOutcome::ReturnedToLobby;
                }

                // Still provisioning: the pending scatter will pick them up.
                if let ArenaSlot::Ready(handle) = self.arena {
                    let spot = self.safe_location(handle);
                    self.environment.teleport(id, Location::Arena(spot));
                    self.roster.set_in_arena(id, true);
                    self.environment.apply_loadout(
                        id,
                        Loadout::Participant {
                            reset_equipment: false,
                        },
                    );
                }
                self.presentation
                    .tell(id, "Welcome back! The gathering phase is still running.");
                info!(participant = %id, "Participant resumed gathering phase");
                ConnectOutcome::Resumed
            }
            None => match self.phase {
                Phase::Idle | Phase::Ended => {
                    self.send_to_lobby(id);
                    ConnectOutcome::Lobby
                }
                _ => {
                    self.roster.mark_match_spectator(id);
                    self.environment.apply_loadout(id, Loadout::Spectator);
                    if let ArenaSlot::Ready(handle) = self.arena {
                        let spawn = self.arena_service.spawn_point(handle);
                        self.environment.teleport(id, Location::Arena(spawn));
                    }
                    self.presentation
                        .tell(id, "A match is in progress, you are spectating.");
                    ConnectOutcome::Spectating
                }
            },
        }
    }

    pub fn on_disconnect(&mut self, id: Uuid) {
        self.roster.set_connected(id, false);
        self.votes.retract(id);

        let alive = self.roster.is_alive(id);
        match self.phase {
            Phase::Pvp if alive => {
                self.forfeit(id);
                self.check_for_winner();
            }
            Phase::Collection if alive => {
                if self.arena == ArenaSlot::Absent {
                    self.forfeit(id);
                    self.check_for_winner();
                } else {
                    self.roster
                        .flag_reconnect(id, ReconnectIntent::AwaitingResumption);
                    info!(participant = %id, "Participant left during gathering, awaiting resumption");
                }
            }
            _ => {
                if self.roster.remove(id) == Some(RosterSlot::Alive) {
                    self.clear_tag(id);
                }
                debug!(participant = %id, phase = %self.phase, "Participant removed on disconnect");
            }
        }
    }

    /// Returns whether the elimination was applied
    pub fn on_eliminated(&mut self, victim: Uuid, attacker: Option<Uuid>) -> bool {
        if !self.phase.is_in_play() || !self.roster.is_alive(victim) {
            debug!(participant = %victim, phase = %self.phase, "Elimination ignored");
            return false;
        }

        let killer = attacker.filter(|a| *a != victim);
        self.stats.record_death(victim);
        if let Some(killer) = killer {
            self.stats.record_kill(killer);
        }

        let now = Utc::now();
        let survival_secs = self
            .pvp_started_at
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.ledger.record(KillEntry {
            victim,
            killer,
            at: now,
            survival_secs,
        });

        self.roster.mark_match_spectator(victim);
        self.roster.set_in_arena(victim, false);
        self.clear_tag(victim);
        if self.roster.is_connected(victim) {
            self.environment.apply_loadout(victim, Loadout::Spectator);
        }

        let text = match killer {
            Some(killer) => format!(
                "[Match] {} was eliminated by {}",
                self.name_of(victim),
                self.name_of(killer)
            ),
            None => format!("[Match] {} was eliminated", self.name_of(victim)),
        };
        self.presentation.announce(&text);
        info!(
            participant = %victim,
            killer = ?killer,
            survival_secs,
            alive = self.roster.alive_count(),
            "Participant eliminated"
        );

        self.check_for_winner();
        true
    }

    /// Combat is allowed only between alive participants placed in a ready arena during PVP
    pub fn on_damage_attempt(&self, attacker: Uuid, target: Uuid) -> DamageDecision {
        let in_combat = |id: Uuid| self.roster.is_alive(id) && self.roster.is_in_arena(id);
        if self.phase == Phase::Pvp && self.arena_ready() && in_combat(attacker) && in_combat(target)
        {
            DamageDecision::Allow
        } else {
            DamageDecision::Deny
        }
    }

    pub fn on_vote_toggle(&mut self, id: Uuid) -> VoteOutcome {
        if self.phase != Phase::Idle {
            return VoteOutcome::Closed;
        }

        let alive = self.roster.alive_count();
        let required = VoteGate::quorum(alive);
        let counted = self.votes.toggle(id);
        let votes = self.votes.count();
        let name = self.name_of(id);

        if !counted {
            let text = format!("[Vote] {} withdrew their vote ({}/{})", name, votes, required);
            self.presentation.announce(&text);
            return VoteOutcome::Retracted { votes, required };
        }

        let text = format!("[Vote] {} voted to start ({}/{})", name, votes, required);
        self.presentation.announce(&text);
        if !self.votes.has_quorum(alive) {
            return VoteOutcome::Cast { votes, required };
        }

        self.presentation
            .announce("[Vote] Vote passed, starting the match.");
        if let StartOutcome::Rejected(reason) = self.start_match() {
            let text = format!("[Vote] The match could not start: {}", reason);
            self.presentation.announce(&text);
        }
        self.votes.clear();
        VoteOutcome::QuorumReached { required }
    }

    // ---------------------------------------------------------------------
    // Roster requests
    // ---------------------------------------------------------------------

    /// Enter the waiting area as a participant of the next match
    pub fn join_waiting(&mut self, id: Uuid) -> RosterChange {
        if self.phase != Phase::Idle {
            return RosterChange::PhaseLocked(self.phase);
        }
        self.roster.mark_alive(id);
        self.environment.teleport(id, Location::Waiting);
        self.environment.apply_loadout(id, Loadout::Waiting);
        self.presentation.tell(id, "You joined the waiting area.");
        RosterChange::Applied
    }

    pub fn return_to_lobby(&mut self, id: Uuid) {
        let slot = self.roster.remove(id);
        self.roster.set_in_arena(id, false);
        self.votes.retract(id);
        self.send_to_lobby(id);
        if slot == Some(RosterSlot::Alive) {
            self.clear_tag(id);
            self.check_for_winner();
        }
    }

    pub fn spectate(&mut self, id: Uuid) {
        let was_alive = self.roster.is_alive(id);
        if self.phase == Phase::Idle {
            self.roster.mark_idle_spectator(id);
            self.environment.apply_loadout(id, Loadout::IdleSpectator);
        } else {
            self.roster.mark_match_spectator(id);
            self.roster.set_in_arena(id, false);
            self.environment.apply_loadout(id, Loadout::Spectator);
        }
        if was_alive {
            self.clear_tag(id);
            self.check_for_winner();
        }
    }

    pub fn unspectate(&mut self, id: Uuid) -> RosterChange {
        if self.phase != Phase::Idle {
            return RosterChange::PhaseLocked(self.phase);
        }
        self.roster.mark_alive(id);
        self.environment.teleport(id, Location::Waiting);
        self.environment.apply_loadout(id, Loadout::Waiting);
        RosterChange::Applied
    }

    // ---------------------------------------------------------------------
    // Teams and admin knobs
    // ---------------------------------------------------------------------

    pub fn join_team(&mut self, id: Uuid, team: TeamColor) -> TeamJoinOutcome {
        let outcome = self.teams.join(id, team);
        let text = match outcome {
            TeamJoinOutcome::Joined(team) => format!("You joined the {} team.", team),
            TeamJoinOutcome::TeamModeOff => "Team mode is off.".to_string(),
            TeamJoinOutcome::TeamDisabled(team) => format!("The {} team is disabled.", team),
        };
        self.presentation.tell(id, &text);
        outcome
    }

    pub fn leave_teams(&mut self, id: Uuid) {
        self.teams.leave_all(id);
    }

    pub fn set_team_enabled(&mut self, team: TeamColor, enabled: bool) {
        self.teams.set_enabled(team, enabled);
        let text = format!(
            "[Teams] {} team {}",
            team,
            if enabled { "enabled" } else { "disabled" }
        );
        self.presentation.announce(&text);
        info!(team = %team, enabled, "Team toggled");
    }

    /// Flip a team's enabled flag and return the new value
    pub fn toggle_team(&mut self, team: TeamColor) -> bool {
        let enabled = !self.teams.is_enabled(team);
        self.set_team_enabled(team, enabled);
        enabled
    }

    pub fn set_teams_enabled(&mut self, enabled: bool) {
        self.teams.set_teams_enabled(enabled);
        let text = format!(
            "[Teams] Team mode {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.presentation.announce(&text);
        info!(enabled, "Team mode changed");
    }

    /// Phantom participants counted by the start check only
    pub fn set_fake_participants(&mut self, count: usize) {
        self.fake_participants = count;
        info!(count, "Fake participants set");
    }

    // ---------------------------------------------------------------------
    // Phase entry
    // ---------------------------------------------------------------------

    fn transition(&mut self, next: Phase) -> Result<(), MatchError> {
        let from = self.phase;
        if !from.can_transition_to(next) {
            return Err(MatchError::IllegalTransition { from, to: next });
        }
        self.phase = next;
        self.votes.clear();
        info!(from = %from, to = %next, "Phase transition");
        Ok(())
    }

    fn begin_countdown(&mut self) -> Result<(), MatchError> {
        self.transition(Phase::Countdown)?;
        let secs = self.settings.countdown_secs;
        self.clock.arm_countdown(secs);
        self.presentation.set_status_bar(&StatusBar {
            title: format!("Match starts in {}s", secs),
            color: BarColor::Yellow,
            progress: 1.0,
            visible: true,
        });
        self.presentation
            .announce(&format!("[Match] Starting in {} seconds", secs));
        Ok(())
    }

    fn begin_collection(&mut self) -> Result<(), MatchError> {
        self.transition(Phase::Collection)?;
        let secs = self.settings.collection_secs;
        self.clock.arm_phase(secs);
        if let ArenaSlot::Ready(handle) = self.arena {
            self.apply_phase_boundary(handle);
        }
        self.request_placement(Placement::Scatter);

        self.presentation.set_status_bar(&StatusBar {
            title: format!("Gathering - {}", RemainingTime::from_secs(secs)),
            color: BarColor::Green,
            progress: 1.0,
            visible: true,
        });
        self.presentation.play_signal(Signal::MatchStart);
        self.presentation
            .announce("[Match] The match has started! Gather what you can.");
        self.presentation.announce(&format!(
            "[Match] PVP begins in {}",
            RemainingTime::from_secs(secs)
        ));
        Ok(())
    }

    fn begin_pvp(&mut self) -> Result<(), MatchError> {
        self.transition(Phase::Pvp)?;
        let secs = self.settings.pvp_secs;
        self.clock.arm_phase(secs);
        self.clock.arm_shrink(self.settings.border_shrink_secs);
        self.ledger.clear();
        self.pvp_started_at = Some(Utc::now());
        if let ArenaSlot::Ready(handle) = self.arena {
            self.apply_phase_boundary(handle);
        }

        let forfeited = self.roster.awaiting_resumption();
        for id in &forfeited {
            self.forfeit(*id);
        }
        self.request_placement(Placement::Regroup);

        self.presentation.set_status_bar(&StatusBar {
            title: format!("PVP - {}", RemainingTime::from_secs(secs)),
            color: BarColor::Red,
            progress: 1.0,
            visible: true,
        });
        self.presentation.play_signal(Signal::PvpStart);
        self.presentation
            .announce("[Match] PVP has begun! The border is closing in.");

        if !forfeited.is_empty() {
            self.check_for_winner();
        }
        Ok(())
    }

    /// Enter ENDED: report, relocate everyone to the lobby, clear the roster, drop the arena
    fn finish(&mut self, reason: EndReason, winner: Option<Winner>) {
        if let Err(err) = self.transition(Phase::Ended) {
            warn!(error = %err, "Match end refused");
            return;
        }
        self.clock.disarm_all();
        self.pending_placement = None;

        let report = MatchReport::build(
            &self.roster,
            &self.teams,
            &self.ledger,
            self.pvp_started_at,
            reason,
            winner,
            Utc::now(),
        );
        let lines = report.render(|id| self.name_of(id));
        for line in &lines {
            self.presentation.announce(line);
        }
        self.presentation.publish_report(&report);

        for id in self.roster.tracked() {
            self.clear_tag(id);
            self.send_to_lobby(id);
        }
        self.roster.clear_sets();
        self.release_arena();
        self.presentation.set_status_bar(&StatusBar::hidden());

        info!(reason = ?reason, winner = ?report.winner, "Match ended");
        self.last_report = Some(report);
    }

    fn on_phase_expired(&mut self, phase: Phase) {
        let result = match phase {
            Phase::Countdown => self.begin_collection(),
            Phase::Collection => self.begin_pvp(),
            Phase::Pvp => {
                self.presentation
                    .announce("[Match] Time is up! Nobody wins this round.");
                self.finish(EndReason::TimeLimit, None);
                Ok(())
            }
            Phase::Idle | Phase::Ended => Ok(()),
        };
        if let Err(err) = result {
            warn!(error = %err, phase = %phase, "Phase expiry ignored");
        }
    }

    // ---------------------------------------------------------------------
    // Win evaluation
    // ---------------------------------------------------------------------

    fn check_for_winner(&mut self) {
        if !self.phase.is_in_play() {
            return;
        }

        match verdict::evaluate(self.roster.alive(), &self.teams) {
            Verdict::Continue => {}
            Verdict::Solo(id) => {
                self.stats.record_win(id);
                self.credit_spectator_losses();
                let text = format!("[Match] {} is the last one standing!", self.name_of(id));
                self.presentation.play_signal(Signal::Victory);
                self.presentation.announce(&text);
                self.finish(EndReason::LastStanding, Some(Winner::Participant { id }));
            }
            Verdict::Team { team, survivors } => {
                for id in &survivors {
                    self.stats.record_win(*id);
                }
                self.credit_spectator_losses();
                let names: Vec<String> = survivors.iter().map(|id| self.name_of(*id)).collect();
                let text = format!("[Match] {} team wins! ({})", team, names.join(", "));
                self.presentation.play_signal(Signal::Victory);
                self.presentation.announce(&text);
                self.finish(EndReason::TeamVictory, Some(Winner::Team { team, survivors }));
            }
            Verdict::Draw => {
                self.credit_spectator_losses();
                self.presentation
                    .announce("[Match] Nobody survived. The match is a draw.");
                self.finish(EndReason::Draw, None);
            }
        }
    }

    /// Spectators lose; forfeiters already paid at disconnect time
    fn credit_spectator_losses(&mut self) {
        let losers: Vec<Uuid> = self
            .roster
            .spectators()
            .filter(|id| self.roster.reconnect_intent(*id) != Some(ReconnectIntent::ReturnToLobby))
            .collect();
        for id in losers {
            self.stats.record_loss(id);
        }
    }

    /// Combat quit: spectator now, lobby on reconnect, loss recorded immediately
    fn forfeit(&mut self, id: Uuid) {
        self.roster.mark_match_spectator(id);
        self.roster.set_in_arena(id, false);
        self.roster.flag_reconnect(id, ReconnectIntent::ReturnToLobby);
        self.stats.record_loss(id);
        self.clear_tag(id);
        info!(participant = %id, phase = %self.phase, "Participant forfeited");
    }

    // ---------------------------------------------------------------------
    // Arena
    // ---------------------------------------------------------------------

    fn poll_arena(&mut self) {
        let handle = match self.arena {
            ArenaSlot::Absent => return,
            ArenaSlot::Provisioning(handle) | ArenaSlot::Ready(handle) => handle,
        };

        match (self.arena, self.arena_service.status(handle)) {
            (ArenaSlot::Provisioning(_), ArenaStatus::Ready) => {
                info!(arena = handle.0, "Arena ready");
                self.arena = ArenaSlot::Ready(handle);
                self.apply_phase_boundary(handle);
                if let Some(kind) = self.pending_placement.take() {
                    self.place(handle, kind);
                }
            }
            (_, ArenaStatus::Lost) => {
                warn!(arena = handle.0, phase = %self.phase, "Arena lost");
                self.arena = ArenaSlot::Absent;
                self.pending_placement = None;
                for id in self.roster.tracked() {
                    self.roster.set_in_arena(id, false);
                }
            }
            _ => {}
        }
    }

    /// Gathering quitters cannot resume once the arena is gone
    fn forfeit_stranded(&mut self) {
        if self.phase != Phase::Collection || self.arena != ArenaSlot::Absent {
            return;
        }
        let stranded = self.roster.awaiting_resumption();
        if stranded.is_empty() {
            return;
        }
        for id in &stranded {
            if self.roster.is_alive(*id) {
                self.forfeit(*id);
            }
        }
        self.check_for_winner();
    }

    fn release_arena(&mut self) {
        if let ArenaSlot::Provisioning(handle) | ArenaSlot::Ready(handle) = self.arena {
            self.arena_service.teardown(handle);
        }
        self.arena = ArenaSlot::Absent;
        self.pending_placement = None;
    }

    fn apply_phase_boundary(&mut self, handle: ArenaHandle) {
        match self.phase {
            Phase::Collection => {
                self.arena_service
                    .set_boundary(handle, self.settings.collection_border);
            }
            Phase::Pvp => {
                self.arena_service
                    .set_boundary(handle, self.settings.pvp_initial_border);
                self.arena_service.shrink_boundary(
                    handle,
                    self.settings.border_final_size,
                    self.settings.border_shrink_secs,
                );
            }
            _ => {}
        }
    }

    fn request_placement(&mut self, kind: Placement) {
        self.poll_arena();
        match self.arena {
            ArenaSlot::Ready(handle) => self.place(handle, kind),
            ArenaSlot::Provisioning(_) => {
                // A pending regroup covers a later scatter and vice versa.
                self.pending_placement = match (self.pending_placement, kind) {
                    (Some(Placement::Regroup), _) | (_, Placement::Regroup) => {
                        Some(Placement::Regroup)
                    }
                    _ => Some(Placement::Scatter),
                };
                debug!(placement = ?kind, "Arena not ready, placement deferred");
            }
            ArenaSlot::Absent => warn!(placement = ?kind, "No arena, placement skipped"),
        }
    }

    fn place(&mut self, handle: ArenaHandle, kind: Placement) {
        let participants = self.roster.connected_alive();
        let mut team_spots: HashMap<TeamColor, Point> = HashMap::new();

        for id in &participants {
            let id = *id;
            match kind {
                Placement::Scatter => {
                    if !self.roster.is_in_arena(id) {
                        let spot = self.safe_location(handle);
                        self.environment.teleport(id, Location::Arena(spot));
                        self.roster.set_in_arena(id, true);
                    }
                    self.environment.apply_loadout(
                        id,
                        Loadout::Participant {
                            reset_equipment: true,
                        },
                    );
                }
                Placement::Regroup => {
                    let team = if self.teams.teams_enabled() {
                        self.teams.scoring_team_of(id)
                    } else {
                        None
                    };
                    let spot = match team {
                        Some(team) => match team_spots.get(&team) {
                            Some(spot) => *spot,
                            None => {
                                let spot = self.safe_location(handle);
                                team_spots.insert(team, spot);
                                spot
                            }
                        },
                        None => self.safe_location(handle),
                    };
                    self.environment.teleport(id, Location::Arena(spot));
                    self.roster.set_in_arena(id, true);
                    self.environment.apply_loadout(
                        id,
                        Loadout::Participant {
                            reset_equipment: false,
                        },
                    );
                }
            }
        }
        info!(placement = ?kind, arena = handle.0, count = participants.len(), "Participants placed");
    }

    fn safe_location(&mut self, handle: ArenaHandle) -> Point {
        match self.arena_service.find_safe_location(handle, None) {
            Some(spot) => spot,
            None => {
                warn!(arena = handle.0, "Safe location search exhausted, using spawn point");
                self.arena_service.spawn_point(handle)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Presentation helpers
    // ---------------------------------------------------------------------

    fn present_clock_step(&mut self, step: &ClockStep) {
        if let Some(bar) = &step.status {
            self.presentation.set_status_bar(bar);
        }
        for line in &step.announcements {
            self.presentation.announce(line);
        }
        for signal in &step.signals {
            self.presentation.play_signal(*signal);
        }
    }

    fn refresh_status_tags(&mut self) {
        if !self.settings.status_tags_enabled {
            return;
        }
        for id in self.roster.connected_alive() {
            let vitals = match self.environment.vitals(id) {
                Ok(vitals) => vitals,
                Err(err) => {
                    debug!(participant = %id, error = %err, "Status tag skipped");
                    continue;
                }
            };
            let tag = render_status_tag(&self.settings.status_tag_format, &vitals);
            if let Err(err) = self.presentation.set_participant_tag(id, Some(&tag)) {
                debug!(participant = %id, error = %err, "Status tag update failed");
            }
        }
    }

    fn clear_tag(&mut self, id: Uuid) {
        if let Err(err) = self.presentation.set_participant_tag(id, None) {
            debug!(participant = %id, error = %err, "Status tag clear failed");
        }
    }

    fn send_to_lobby(&mut self, id: Uuid) {
        self.environment.teleport(id, Location::Lobby);
        self.environment.apply_loadout(id, Loadout::Lobby);
    }

    fn name_of(&self, id: Uuid) -> String {
        self.environment
            .vitals(id)
            .map(|v| v.name)
            .unwrap_or_else(|_| fallback_name(id))
    }
}
