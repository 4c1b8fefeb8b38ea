use crate::bot::views;
use anyhow::Result;
use shortlink_core::router::{Inbound, MessageRouter, Reply, RouterCommand};
use std::sync::Arc;
use teloxide::{prelude::*, types::ParseMode, utils::command::BotCommands};
use tracing::{debug, info};

/// Safe extraction of user ID from a message.
/// Returns `None` for messages without a sender (e.g. channel posts).
#[must_use]
pub fn get_user_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|u| u.id.0.cast_signed())
}

/// Supported commands for the bot.
///
/// Registered names are lowercase; incoming names are matched
/// case-insensitively, so `/removeApi` and `/REMOVEAPI` both work.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show this help.")]
    Help,
    /// Set or replace the API token
    #[command(description = "Set or replace your API token: /setapi <token>")]
    SetApi(String),
    /// Remove the API token
    #[command(description = "Remove your API token.")]
    RemoveApi,
}

impl Command {
    /// Command name safe for logging. Never includes arguments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::SetApi(_) => "setapi",
            Self::RemoveApi => "removeapi",
        }
    }

    /// Parse a command, ignoring the case of the command name and bot mention.
    /// Arguments keep their case.
    #[must_use]
    pub fn parse_any_case(text: &str, bot_name: &str) -> Option<Self> {
        let text = text.trim_start();
        let (head, args) = text
            .find(char::is_whitespace)
            .map_or((text, ""), |pos| text.split_at(pos));
        let normalized = format!("{}{args}", head.to_lowercase());
        Self::parse(&normalized, &bot_name.to_lowercase()).ok()
    }
}

/// Returns true for text shaped like a slash command (`/name`).
#[must_use]
pub fn looks_like_command(text: &str) -> bool {
    text.trim_start()
        .strip_prefix('/')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl From<Command> for Inbound {
    fn from(cmd: Command) -> Self {
        Self::Command(match cmd {
            Command::Start => RouterCommand::Start,
            Command::Help => RouterCommand::Help,
            Command::SetApi(token) => RouterCommand::SetToken(token),
            Command::RemoveApi => RouterCommand::RemoveToken,
        })
    }
}

/// Route a command through the message router and answer it.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    router: Arc<MessageRouter>,
) -> Result<()> {
    let Some(user_id) = get_user_id(&msg) else {
        debug!("Ignoring /{} without a sender.", cmd.name());
        return Ok(());
    };

    info!("User {user_id} sent /{}.", cmd.name());
    let reply = router.handle(user_id, cmd.into()).await;
    send_reply(&bot, msg.chat.id, &reply).await
}

/// Route a plain text message (token or link) and answer it.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_text(bot: Bot, msg: Message, router: Arc<MessageRouter>) -> Result<()> {
    let (Some(user_id), Some(text)) = (get_user_id(&msg), msg.text()) else {
        return Ok(());
    };

    debug!("Text message from user {user_id}.");
    let reply = router.handle(user_id, Inbound::Text(text.to_string())).await;
    send_reply(&bot, msg.chat.id, &reply).await
}

/// Answer a slash command the bot does not know with the command list.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_unknown_command(bot: Bot, msg: Message) -> Result<()> {
    let Some(user_id) = get_user_id(&msg) else {
        return Ok(());
    };
    debug!("User {user_id} sent an unknown command.");
    bot.send_message(msg.chat.id, views::unknown_command())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Answer messages the bot cannot process.
///
/// # Errors
///
/// Returns an error if the hint cannot be sent.
pub async fn handle_non_text(bot: Bot, msg: Message) -> Result<()> {
    if get_user_id(&msg).is_none() {
        return Ok(());
    }
    bot.send_message(msg.chat.id, views::NON_TEXT_HINT).await?;
    Ok(())
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> Result<()> {
    bot.send_message(chat_id, views::render(reply))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
