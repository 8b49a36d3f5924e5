//! Access and activation gate.
//!
//! A pure decision over one inbound message: run a command, accept the text
//! for conversation, or reject it (with or without a notice). No state is read
//! here; the router resolves admin and activation flags beforehand.

use crate::replies;

/// Commands the bot responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Parse a lower-cased command name as delivered by the channel.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Why a message was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Private chat with a non-admin sender.
    AccessDenied,
    /// Private admin chat that has not been activated.
    NotActivated,
    /// Group chat that has not been activated.
    GroupInactive,
    /// Group message that does not address the bot.
    NotMentioned,
    /// Nothing left after trimming and removing the mention.
    EmptyText,
    /// A command other than `/start` or `/stop`.
    UnknownCommand,
}

impl Rejection {
    /// Notice sent back to the chat, if any. Group rejections are silent.
    pub fn notice(self) -> Option<&'static str> {
        match self {
            Self::AccessDenied => Some(replies::ACCESS_DENIED),
            Self::NotActivated => Some(replies::SEND_START),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Command(Command),
    /// Cleaned text to forward to the model.
    Accept(String),
    Reject(Rejection),
}

/// Everything the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub chat_is_private: bool,
    pub sender_is_admin: bool,
    pub chat_is_active: bool,
    pub text: &'a str,
    pub command: Option<&'a str>,
    /// The bot's `@handle`.
    pub mention: &'a str,
}

pub fn evaluate(input: &GateInput<'_>) -> GateDecision {
    if let Some(name) = input.command {
        return match Command::parse(name) {
            Some(command) => GateDecision::Command(command),
            None => GateDecision::Reject(Rejection::UnknownCommand),
        };
    }

    let text = if input.chat_is_private {
        if !input.sender_is_admin {
            return GateDecision::Reject(Rejection::AccessDenied);
        }
        if !input.chat_is_active {
            return GateDecision::Reject(Rejection::NotActivated);
        }
        input.text.trim().to_string()
    } else {
        if !input.chat_is_active {
            return GateDecision::Reject(Rejection::GroupInactive);
        }
        match strip_mention(input.text, input.mention) {
            Some(stripped) => stripped.trim().to_string(),
            None => return GateDecision::Reject(Rejection::NotMentioned),
        }
    };

    if text.is_empty() {
        GateDecision::Reject(Rejection::EmptyText)
    } else {
        GateDecision::Accept(text)
    }
}

/// Remove the first ASCII-case-insensitive occurrence of `mention`.
/// `None` when the text does not contain it.
pub fn strip_mention(text: &str, mention: &str) -> Option<String> {
    let start = find_ignore_ascii_case(text, mention)?;
    let end = start + mention.len();
    Some(format!("{}{}", &text[..start], &text[end..]))
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let bytes = haystack.as_bytes();
    let needle = needle.as_bytes();
    // Non-ASCII bytes must match exactly, so a hit starting on a char
    // boundary also ends on one.
    haystack
        .char_indices()
        .map(|(index, _)| index)
        .take_while(|index| index + needle.len() <= bytes.len())
        .find(|&index| bytes[index..index + needle.len()].eq_ignore_ascii_case(needle))
}
