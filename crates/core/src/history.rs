//! History store trait — bounded per-user conversation memory.
//!
//! Each user owns an ordered list of turns capped at a configured length.
//! Appending past the cap drops the oldest turns first.

use crate::channel::UserId;
use crate::message::{Role, Turn};

/// Concurrent per-user history storage.
///
/// All methods take `&self`: implementations are shared across dispatch
/// tasks and must serialize overlapping mutations on the same user.
pub trait HistoryStore: Send + Sync {
    /// Backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Maximum number of turns retained per user.
    fn capacity(&self) -> usize;

    /// Append a turn, creating the user's history if absent, then truncate
    /// to [`capacity`](Self::capacity) from the front.
    fn push(&self, user: UserId, turn: Turn);

    /// Owned snapshot of the user's history, oldest first. Empty if unknown.
    fn get(&self, user: UserId) -> Vec<Turn>;

    /// Drop the user's history. No-op for unknown users.
    fn reset(&self, user: UserId);

    /// Number of users with a stored history.
    fn user_count(&self) -> usize;

    /// Convenience wrapper over [`push`](Self::push).
    fn append(&self, user: UserId, role: Role, content: &str) {
        self.push(user, Turn::new(role, content));
    }
}
