//! Roster bookkeeping: alive / idle-spectator / match-spectator membership
//! plus the reconnection intents consulted on the next connect.

use std::collections::HashSet;
use uuid::Uuid;

/// Which of the three exclusive roster sets a participant is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterSlot {
    Alive,
    IdleSpectator,
    MatchSpectator,
}

/// Action recorded at disconnect time and consumed on the next connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectIntent {
    /// Left during combat: send back to the lobby, loss already recorded
    ReturnToLobby,
    /// Left during collection: may resume if collection is still running
    AwaitingResumption,
}

/// Roster state. Every mutation keeps the three sets mutually exclusive.
#[derive(Debug, Default)]
pub struct Roster {
    alive: HashSet<Uuid>,
    idle_spectators: HashSet<Uuid>,
    match_spectators: HashSet<Uuid>,

    return_to_lobby: HashSet<Uuid>,
    awaiting_resumption: HashSet<Uuid>,

    /// Currently connected identifiers
    connected: HashSet<Uuid>,
    /// Participants placed inside the arena this match
    in_arena: HashSet<Uuid>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_alive(&mut self, id: Uuid) {
        self.idle_spectators.remove(&id);
        self.match_spectators.remove(&id);
        self.alive.insert(id);
    }

    pub fn mark_idle_spectator(&mut self, id: Uuid) {
        self.alive.remove(&id);
        self.match_spectators.remove(&id);
        self.idle_spectators.insert(id);
    }

    pub fn mark_match_spectator(&mut self, id: Uuid) {
        self.alive.remove(&id);
        self.idle_spectators.remove(&id);
        self.match_spectators.insert(id);
    }

    /// Remove from all three sets, returning the slot it was in
    pub fn remove(&mut self, id: Uuid) -> Option<RosterSlot> {
        let slot = self.slot_of(id);
        self.alive.remove(&id);
        self.idle_spectators.remove(&id);
        self.match_spectators.remove(&id);
        slot
    }

    pub fn slot_of(&self, id: Uuid) -> Option<RosterSlot> {
        if self.alive.contains(&id) {
            Some(RosterSlot::Alive)
        } else if self.idle_spectators.contains(&id) {
            Some(RosterSlot::IdleSpectator)
        } else if self.match_spectators.contains(&id) {
            Some(RosterSlot::MatchSpectator)
        } else {
            None
        }
    }

    pub fn is_alive(&self, id: Uuid) -> bool {
        self.alive.contains(&id)
    }

    pub fn alive(&self) -> &HashSet<Uuid> {
        &self.alive
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    pub fn idle_spectators(&self) -> &HashSet<Uuid> {
        &self.idle_spectators
    }

    pub fn match_spectators(&self) -> &HashSet<Uuid> {
        &self.match_spectators
    }

    /// Both spectator sets, in no particular order
    pub fn spectators(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.idle_spectators
            .iter()
            .chain(self.match_spectators.iter())
            .copied()
    }

    /// Every identifier in any of the three sets
    pub fn tracked(&self) -> Vec<Uuid> {
        self.alive.iter().copied().chain(self.spectators()).collect()
    }

    /// Empty all three sets and the arena presence set.
    /// Reconnect intents survive: they are consumed on the next connect.
    pub fn clear_sets(&mut self) {
        self.alive.clear();
        self.idle_spectators.clear();
        self.match_spectators.clear();
        self.in_arena.clear();
    }

    // --- reconnection intents ---

    /// Record an intent, replacing any other intent for the identifier
    pub fn flag_reconnect(&mut self, id: Uuid, intent: ReconnectIntent) {
        match intent {
            ReconnectIntent::ReturnToLobby => {
                self.awaiting_resumption.remove(&id);
                self.return_to_lobby.insert(id);
            }
            ReconnectIntent::AwaitingResumption => {
                self.return_to_lobby.remove(&id);
                self.awaiting_resumption.insert(id);
            }
        }
    }

    /// Consume the intent for `id`, if any. Each flag is cleared exactly once.
    pub fn take_reconnect_intent(&mut self, id: Uuid) -> Option<ReconnectIntent> {
        if self.return_to_lobby.remove(&id) {
            Some(ReconnectIntent::ReturnToLobby)
        } else if self.awaiting_resumption.remove(&id) {
            Some(ReconnectIntent::AwaitingResumption)
        } else {
            None
        }
    }

    pub fn reconnect_intent(&self, id: Uuid) -> Option<ReconnectIntent> {
        if self.return_to_lobby.contains(&id) {
            Some(ReconnectIntent::ReturnToLobby)
        } else if self.awaiting_resumption.contains(&id) {
            Some(ReconnectIntent::AwaitingResumption)
        } else {
            None
        }
    }

    /// Identifiers still waiting to resume collection
    pub fn awaiting_resumption(&self) -> Vec<Uuid> {
        self.awaiting_resumption.iter().copied().collect()
    }

    // --- connection and arena presence ---

    pub fn set_connected(&mut self, id: Uuid, connected: bool) {
        if connected {
            self.connected.insert(id);
        } else {
            self.connected.remove(&id);
            self.in_arena.remove(&id);
        }
    }

    pub fn is_connected(&self, id: Uuid) -> bool {
        self.connected.contains(&id)
    }

    pub fn set_in_arena(&mut self, id: Uuid, in_arena: bool) {
        if in_arena {
            self.in_arena.insert(id);
        } else {
            self.in_arena.remove(&id);
        }
    }

    pub fn is_in_arena(&self, id: Uuid) -> bool {
        self.in_arena.contains(&id)
    }

    /// Connected alive participants, sorted for deterministic iteration
    pub fn connected_alive(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .alive
            .iter()
            .filter(|id| self.connected.contains(id))
            .copied()
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership_count(roster: &Roster, id: Uuid) -> usize {
        [
            roster.alive().contains(&id),
            roster.idle_spectators().contains(&id),
            roster.match_spectators().contains(&id),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    #[test]
    fn sets_stay_mutually_exclusive() {
        let mut roster = Roster::new();
        let id = Uuid::new_v4();

        roster.mark_alive(id);
        assert_eq!(membership_count(&roster, id), 1);
        roster.mark_idle_spectator(id);
        assert_eq!(membership_count(&roster, id), 1);
        assert_eq!(roster.slot_of(id), Some(RosterSlot::IdleSpectator));
        roster.mark_match_spectator(id);
        assert_eq!(membership_count(&roster, id), 1);
        roster.mark_alive(id);
        assert_eq!(roster.slot_of(id), Some(RosterSlot::Alive));
        assert_eq!(membership_count(&roster, id), 1);

        assert_eq!(roster.remove(id), Some(RosterSlot::Alive));
        assert_eq!(membership_count(&roster, id), 0);
        assert_eq!(roster.remove(id), None);
    }

    #[test]
    fn reconnect_intent_is_consumed_once() {
        let mut roster = Roster::new();
        let id = Uuid::new_v4();

        roster.flag_reconnect(id, ReconnectIntent::ReturnToLobby);
        assert_eq!(
            roster.take_reconnect_intent(id),
            Some(ReconnectIntent::ReturnToLobby)
        );
        assert_eq!(roster.take_reconnect_intent(id), None);
    }

    #[test]
    fn intents_are_disjoint() {
        let mut roster = Roster::new();
        let id = Uuid::new_v4();

        roster.flag_reconnect(id, ReconnectIntent::AwaitingResumption);
        roster.flag_reconnect(id, ReconnectIntent::ReturnToLobby);
        assert_eq!(roster.reconnect_intent(id), Some(ReconnectIntent::ReturnToLobby));
        assert!(roster.awaiting_resumption().is_empty());
    }

    #[test]
    fn clearing_sets_keeps_intents() {
        let mut roster = Roster::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        roster.mark_alive(a);
        roster.mark_match_spectator(b);
        roster.flag_reconnect(b, ReconnectIntent::ReturnToLobby);

        roster.clear_sets();
        assert!(roster.tracked().is_empty());
        assert_eq!(roster.reconnect_intent(b), Some(ReconnectIntent::ReturnToLobby));
    }

    #[test]
    fn disconnect_leaves_arena() {
        let mut roster = Roster::new();
        let id = Uuid::new_v4();
        roster.set_connected(id, true);
        roster.set_in_arena(id, true);
        roster.set_connected(id, false);
        assert!(!roster.is_in_arena(id));
    }
}
