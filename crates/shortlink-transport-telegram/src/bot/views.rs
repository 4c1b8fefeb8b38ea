//! View layer: HTML texts sent back to the user.

use crate::bot::handlers::Command;
use shortlink_core::router::{Reply, TokenState};
use teloxide::utils::command::BotCommands;

/// Hint sent for stickers, photos and other non-text messages.
pub const NON_TEXT_HINT: &str =
    "I only understand text. Send your API token or a link starting with http:// or https://.";

/// Reply to a slash command the bot does not know.
#[must_use]
pub fn unknown_command() -> String {
    format!(
        "🤔 Unknown command.\n\n{}",
        html_escape::encode_text(&Command::descriptions().to_string())
    )
}

/// Render a router reply as Telegram HTML.
#[must_use]
pub fn render(reply: &Reply) -> String {
    match reply {
        Reply::Welcome(TokenState::NoToken) => {
            "👋 <b>Welcome!</b>\n\nPlease send your API token to get started.".to_string()
        }
        Reply::Welcome(TokenState::HasToken) => {
            "👋 You're all set! Send a link to shorten.".to_string()
        }
        Reply::Help(state) => help_text(*state),
        Reply::TokenSaved => "✅ API token saved! Now send me a link to shorten.".to_string(),
        Reply::TokenRejected => {
            "That doesn't look like a valid API token. Try again.".to_string()
        }
        Reply::SetTokenUsage => "Usage: <code>/setapi &lt;token&gt;</code>".to_string(),
        Reply::TokenRequired => {
            "Please send your API token first, then send the link again.".to_string()
        }
        Reply::TokenRemoved => {
            "🗑 Your API token has been removed. Send a new one anytime.".to_string()
        }
        Reply::NothingToRemove => "No API token was set for you yet.".to_string(),
        Reply::NotAUrl => {
            "❌ Please send a valid URL (starting with http or https).".to_string()
        }
        Reply::Shortened(short_url) => format!(
            "🔗 <b>Shortened Link:</b>\n<code>{}</code>",
            html_escape::encode_text(short_url)
        ),
        Reply::ShortenFailed => {
            "❌ Error shortening the link. Please check your API token or link.".to_string()
        }
        Reply::ServiceUnavailable => "🚨 An error occurred. Try again later.".to_string(),
        Reply::StorageUnavailable => {
            "🚨 Could not access your settings right now. Try again later.".to_string()
        }
    }
}

fn help_text(state: TokenState) -> String {
    let status = match state {
        TokenState::NoToken => "No API token is set. Send your token to get started.",
        TokenState::HasToken => "Your API token is set. Send any link to shorten it.",
    };
    format!(
        "{status}\n\n{}",
        html_escape::encode_text(&Command::descriptions().to_string())
    )
}
