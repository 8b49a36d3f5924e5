//! Fixed texts the bot sends back to chats.

pub const ADMIN_ONLY_START: &str = "❌ Only an administrator can activate the bot";
pub const ADMIN_ONLY_STOP: &str = "❌ Only an administrator can deactivate the bot";
pub const DEACTIVATED: &str = "✅ Bot deactivated by administrator";
pub const ACCESS_DENIED: &str = "❌ You do not have access to this bot";
pub const SEND_START: &str = "ℹ️ Send /start to begin";
pub const FAILURE: &str = "⚠️ Something went wrong. Please try again later.";

const ACTIVATED: &str = "✅ Bot activated by administrator";

/// Activation confirmation. Group chats are also told how to address the bot.
pub fn activated(group_mention: Option<&str>) -> String {
    match group_mention {
        Some(mention) => format!("{ACTIVATED}\nI only respond to messages that mention {mention}"),
        None => ACTIVATED.to_string(),
    }
}
