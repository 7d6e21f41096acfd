use std::sync::Arc;

use teloxide::prelude::*;

use rollbot_core::{
    commands::{
        listing_caption, parse_rollbar_args, render_item_listing, render_status_html,
        LISTING_FILE_NAME, NOT_ALLOWED_REPLY, ROLLBAR_FAILED_REPLY,
    },
    domain::ChatId,
    messaging::types::Document,
    Result,
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

const HELP: &str = "<b>Rollbar watch</b>\n\n\
/rollbar [page] [testnet] - List the items on a Rollbar page\n\
/status - Show the scan loops\n\
/restart - Restart the scan loops";

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    execute(&state, ChatId(msg.chat.id.0), text).await;
    Ok(())
}

/// Run one command and send its reply. Reply failures are logged only.
async fn execute(state: &AppState, chat_id: ChatId, text: &str) {
    let (cmd, arg) = parse_command(text);
    let restricted = matches!(cmd.as_str(), "rollbar" | "status" | "restart");
    if restricted && !state.cfg.is_command_chat(chat_id) {
        tracing::info!(chat_id = chat_id.0, command = %cmd, "command from non-designated chat");
        reply(state, chat_id, NOT_ALLOWED_REPLY).await;
        return;
    }

    match cmd.as_str() {
        "start" | "help" => reply(state, chat_id, HELP).await,

        "rollbar" => {
            if let Err(e) = rollbar_listing(state, chat_id, &arg).await {
                tracing::warn!(chat_id = chat_id.0, error = %e, "rollbar command failed");
                reply(state, chat_id, ROLLBAR_FAILED_REPLY).await;
            }
        }

        "status" => {
            let statuses = state.scheduler.status().await;
            reply(state, chat_id, &render_status_html(&statuses)).await;
        }

        "restart" => match state.scheduler.restart().await {
            Ok(n) => reply(state, chat_id, &format!("Restarted {n} scan loop(s).")).await,
            Err(e) => {
                tracing::error!(error = %e, "restart failed");
                reply(state, chat_id, "Restart failed, see logs.").await;
            }
        },

        _ => {}
    }
}

async fn rollbar_listing(state: &AppState, chat_id: ChatId, arg: &str) -> Result<()> {
    let (page, network) = parse_rollbar_args(arg)?;
    let items = state.source.fetch_page(network, page).await?;
    let listing = render_item_listing(&items);
    state
        .messenger
        .send_document(
            chat_id,
            Some(&listing_caption(page)),
            Document::text(LISTING_FILE_NAME, &listing),
        )
        .await?;
    Ok(())
}

async fn reply(state: &AppState, chat_id: ChatId, html: &str) {
    if let Err(e) = state.messenger.send_html(chat_id, html).await {
        tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send reply");
    }
}
