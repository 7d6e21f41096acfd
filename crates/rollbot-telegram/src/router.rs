use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use rollbot_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use rollbot_core::{
    config::Config, messaging::port::MessagingPort, ports::ItemSource,
    scheduler::BacklogScheduler,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub source: Arc<dyn ItemSource>,
    pub scheduler: BacklogScheduler,
}

/// Start the scan loops for the configured networks and serve commands until
/// the process is stopped.
///
/// Failing to open a network's persisted state is fatal.
pub async fn run_polling(cfg: Arc<Config>, source: Arc<dyn ItemSource>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "rollbot started"),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }
    tracing::info!(
        network = ?cfg.network,
        data_dir = %cfg.data_dir.display(),
        command_chats = cfg.command_chats.len(),
        "configuration loaded"
    );

    // Throttle in front of Telegram so a notification backlog drains without 429s.
    // The adapter still retries once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let scheduler = BacklogScheduler::new(cfg.clone(), source.clone(), messenger.clone());
    let started = scheduler.start(&cfg.network.networks()).await?;
    tracing::info!(started, "scan loops running");

    let state = Arc::new(AppState {
        cfg,
        messenger,
        source,
        scheduler: scheduler.clone(),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    scheduler.stop().await;
    Ok(())
}
