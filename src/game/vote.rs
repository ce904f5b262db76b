//! Quorum vote to force an early start

use std::collections::HashSet;
use uuid::Uuid;

/// Result of toggling a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote recorded, quorum not reached yet
    Cast { votes: usize, required: usize },
    /// Earlier vote withdrawn
    Retracted { votes: usize, required: usize },
    /// Quorum reached, the start path ran and the gate was cleared
    QuorumReached { required: usize },
    /// Voting only happens while idle
    Closed,
}

/// Set of identifiers that opted to force-start
#[derive(Debug, Default)]
pub struct VoteGate {
    votes: HashSet<Uuid>,
}

impl VoteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `floor(eligible / 2) + 1` with at least one eligible voter
    pub fn quorum(alive_count: usize) -> usize {
        alive_count.max(1) / 2 + 1
    }

    /// Toggle `id`'s vote, returning whether it is now counted
    pub fn toggle(&mut self, id: Uuid) -> bool {
        if self.votes.remove(&id) {
            false
        } else {
            self.votes.insert(id);
            true
        }
    }

    pub fn retract(&mut self, id: Uuid) -> bool {
        self.votes.remove(&id)
    }

    pub fn count(&self) -> usize {
        self.votes.len()
    }

    pub fn has_quorum(&self, alive_count: usize) -> bool {
        self.votes.len() >= Self::quorum(alive_count)
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}
