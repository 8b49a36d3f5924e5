//! In-memory history backend — a sharded map of per-user ring buffers.

use std::collections::VecDeque;

use chatrelay_core::channel::UserId;
use chatrelay_core::history::HistoryStore;
use chatrelay_core::message::Turn;
use dashmap::DashMap;
use tracing::trace;

/// Per-user conversation history held in a [`DashMap`].
///
/// Appends for one user lock only that user's shard, so unrelated users
/// never wait on each other. Each history is capped at `capacity` turns.
pub struct InMemoryHistory {
    histories: DashMap<UserId, VecDeque<Turn>>,
    capacity: usize,
}

impl InMemoryHistory {
    /// Create a store keeping at most `capacity` turns per user.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: DashMap::new(),
            capacity: capacity.max(1),
        }
    }
}

impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(&self, user: UserId, turn: Turn) {
        let mut history = self.histories.entry(user).or_default();
        history.push_back(turn);
        let overflow = history.len().saturating_sub(self.capacity);
        if overflow > 0 {
            history.drain(..overflow);
            trace!(user_id = user, dropped = overflow, "History truncated");
        }
    }

    fn get(&self, user: UserId) -> Vec<Turn> {
        self.histories
            .get(&user)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn reset(&self, user: UserId) {
        self.histories.remove(&user);
    }

    fn user_count(&self) -> usize {
        self.histories.len()
    }
}
