//! Formatting utilities (item notifications, relative times, Telegram HTML escaping).

use chrono::{DateTime, Utc};

use crate::domain::Item;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escape `text`, cutting it (with a trailing `...`) so the result is at most
/// `max_len` bytes. Never splits a character or an entity.
pub fn escape_html_truncated(text: &str, max_len: usize) -> String {
    let escaped = escape_html(text);
    if escaped.len() <= max_len {
        return escaped;
    }

    let budget = max_len.saturating_sub(3);
    let mut out = String::new();
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        let piece = match ch {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            _ => ch.encode_utf8(&mut buf),
        };
        if out.len() + piece.len() > budget {
            break;
        }
        out.push_str(piece);
    }
    out.push_str("...");
    out
}

/// Link to the item's page in the backend UI.
pub fn item_link(web_base: &str, uuid: &str) -> String {
    format!("{web_base}/item/uuid/?uuid={uuid}")
}

/// Human-relative rendering of a unix timestamp ("5 minutes ago", "in 2 hours").
pub fn format_relative(timestamp: i64, now: DateTime<Utc>) -> String {
    let diff = now.timestamp() - timestamp;
    let future = diff < 0;
    let secs = diff.unsigned_abs();

    if secs < 10 {
        return "just now".to_string();
    }

    let (value, unit) = match secs {
        s if s < 60 => (s, "second"),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let plural = if value == 1 { "" } else { "s" };

    if future {
        format!("in {value} {unit}{plural}")
    } else {
        format!("{value} {unit}{plural} ago")
    }
}

/// Render the notification posted for a newly seen item.
///
/// Title links to the item; level, environment and relative time sit on one
/// line; the message body follows as preformatted text, cut to fit `max_len`.
pub fn render_item_notification(
    item: &Item,
    web_base: &str,
    now: DateTime<Utc>,
    max_len: usize,
) -> String {
    const OPEN: &str = "<pre>";
    const CLOSE: &str = "</pre>";
    // Room kept for at least a "..." body.
    let frame = OPEN.len() + CLOSE.len() + 3;

    let when = format_relative(item.timestamp, now);
    let mut header = format!(
        "<b><a href=\"{}\">{}</a></b>\n<b>Level:</b> {} | <b>Environment:</b> {} | <b>Timestamp:</b> {}\n",
        escape_html(&item_link(web_base, &item.uuid)),
        escape_html(&item.uuid),
        escape_html(item.severity.as_str()),
        escape_html(&item.environment),
        escape_html(&when),
    );
    if header.len() + frame > max_len {
        // Oversized metadata: drop the markup and cut the fields as one line.
        let plain = format!(
            "{} | Level: {} | Environment: {} | Timestamp: {}",
            item.uuid,
            item.severity.as_str(),
            item.environment,
            when
        );
        header = escape_html_truncated(&plain, max_len.saturating_sub(frame + 1));
        header.push('\n');
    }

    let budget = max_len.saturating_sub(header.len() + OPEN.len() + CLOSE.len());
    let content = escape_html_truncated(&item.message, budget);

    format!("{header}{OPEN}{content}{CLOSE}")
}
