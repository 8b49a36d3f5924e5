//! Which chats have conversational mode switched on.

use chatrelay_core::channel::ChatId;
use dashmap::DashSet;

/// Set of active chat IDs. Membership is the only state.
#[derive(Debug, Default)]
pub struct ActivationRegistry {
    chats: DashSet<ChatId>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a chat active. Returns `false` if it already was.
    pub fn activate(&self, chat: ChatId) -> bool {
        self.chats.insert(chat)
    }

    /// Mark a chat inactive. Returns `false` if it was not active.
    pub fn deactivate(&self, chat: ChatId) -> bool {
        self.chats.remove(&chat).is_some()
    }

    pub fn is_active(&self, chat: ChatId) -> bool {
        self.chats.contains(&chat)
    }

    /// Number of active chats.
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chats_start_inactive() {
        let registry = ActivationRegistry::new();
        assert!(!registry.is_active(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn activate_and_deactivate() {
        let registry = ActivationRegistry::new();
        assert!(registry.activate(-100));
        assert!(registry.is_active(-100));
        assert_eq!(registry.len(), 1);

        assert!(registry.deactivate(-100));
        assert!(!registry.is_active(-100));
        assert!(registry.is_empty());
    }

    #[test]
    fn repeated_transitions_report_no_change() {
        let registry = ActivationRegistry::new();
        assert!(registry.activate(7));
        assert!(!registry.activate(7));
        assert_eq!(registry.len(), 1);

        assert!(registry.deactivate(7));
        assert!(!registry.deactivate(7));
    }
}
