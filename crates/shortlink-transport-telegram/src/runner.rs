use crate::bot;
use crate::bot::handlers::{looks_like_command, Command};
use crate::config::{BotSettings, TelegramSettings};
use shortlink_core::router::MessageRouter;
use shortlink_core::shortener::HttpShortener;
use shortlink_core::storage::{JsonFileTokenStore, TokenStore};
use shortlink_core::validation::validator_from_settings;
use std::sync::Arc;
use teloxide::dispatching::{DefaultKey, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Me;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

type BotDispatcher = Dispatcher<Bot, teloxide::RequestError, DefaultKey>;

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let Some(token) = settings.telegram.token() else {
        error!("TELEGRAM_TOKEN is not set.");
        std::process::exit(1);
    };

    let router = init_router(&settings).await;
    let bot = Bot::new(token);
    register_commands(&bot).await;

    let handler = setup_handler();
    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build();

    match settings.telegram.webhook_url() {
        Some(url) => dispatch_webhook(bot, &mut dispatcher, &settings.telegram, url).await,
        None => {
            info!("Bot is running (long polling)...");
            dispatcher.dispatch().await;
        }
    }
}

async fn init_store(settings: &BotSettings) -> Arc<JsonFileTokenStore> {
    match JsonFileTokenStore::open(&settings.core.token_store_path).await {
        Ok(store) => {
            if store.check_connection().await.is_err() {
                // Details already logged in check_connection
                error!("Token store connection check returned error.");
            }
            match store.user_count().await {
                Ok(users) => info!("Token store initialized ({users} users)."),
                Err(e) => warn!("Could not count stored tokens: {e}"),
            }
            Arc::new(store)
        }
        Err(e) => {
            error!(
                "Failed to open token store {}: {}",
                settings.core.token_store_path.display(),
                e
            );
            std::process::exit(1);
        }
    }
}

async fn init_router(settings: &BotSettings) -> Arc<MessageRouter> {
    let store = init_store(settings).await;

    let shortener = Arc::new(HttpShortener::from_settings(&settings.core));
    info!(
        "Shortener client initialized ({}, timeout {}s).",
        settings.core.shortener_base_url, settings.core.shortener_timeout_secs
    );

    let validator = validator_from_settings(&settings.core);
    if let Some(prefix) = settings.core.token_prefix() {
        info!("Tokens must start with {prefix:?}.");
    }

    Arc::new(MessageRouter::new(store, shortener, validator))
}

async fn register_commands(bot: &Bot) {
    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => info!("Bot commands registered."),
        Err(e) => warn!("Failed to register bot commands: {}", e),
    }
}

async fn dispatch_webhook(
    bot: Bot,
    dispatcher: &mut BotDispatcher,
    telegram: &TelegramSettings,
    url: &str,
) {
    let url = match reqwest::Url::parse(url) {
        Ok(url) => url,
        Err(e) => {
            error!("WEBHOOK_URL is not a valid URL: {}", e);
            std::process::exit(1);
        }
    };

    let addr = telegram.listen_addr();
    let listener = match webhooks::axum(bot, webhooks::Options::new(addr, url)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to set up webhook: {}", e);
            std::process::exit(1);
        }
    };

    info!("Bot is running (webhook on {addr})...");
    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::filter_map(|msg: Message, me: Me| {
                msg.text()
                    .and_then(|text| Command::parse_any_case(text, me.username()))
            })
            .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(looks_like_command))
                .endpoint(handle_unknown_command),
        )
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text))
        .branch(dptree::endpoint(handle_non_text))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    router: Arc<MessageRouter>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_command(bot, msg, cmd, router).await {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    router: Arc<MessageRouter>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_text(bot, msg, router).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_unknown_command(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_unknown_command(bot, msg).await {
        error!("Unknown command handler error: {}", e);
    }
    respond(())
}

async fn handle_non_text(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_non_text(bot, msg).await {
        error!("Non-text handler error: {}", e);
    }
    respond(())
}
