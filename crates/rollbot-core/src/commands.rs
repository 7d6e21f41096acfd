//! Transport-independent parts of the chat commands: argument parsing and
//! reply rendering.

use crate::{
    domain::{Item, Network},
    errors::Error,
    formatting::escape_html,
    scheduler::{CyclePhase, NetworkStatus},
    Result,
};

pub const NOT_ALLOWED_REPLY: &str = "This command can only be used in the designated channels.";
pub const ROLLBAR_FAILED_REPLY: &str = "Failed to rollbar";
pub const LISTING_FILE_NAME: &str = "rollbar_items.txt";

/// Parse `/rollbar [page] [testnet]`.
///
/// Page defaults to 1; the network is testnet only when the second token is
/// literally `testnet`.
pub fn parse_rollbar_args(args: &str) -> Result<(u32, Network)> {
    let mut tokens = args.split_whitespace();

    let page = match tokens.next() {
        None => 1,
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "page must be a positive integer, got {raw:?}"
                )))
            }
        },
    };

    let network = match tokens.next() {
        Some(t) if t.eq_ignore_ascii_case("testnet") => Network::Testnet,
        _ => Network::Mainnet,
    };

    Ok((page, network))
}

pub fn listing_caption(page: u32) -> String {
    format!("Here are the Rollbar items on page {page}:")
}

/// One line per item: `level - environment - message`, columns padded.
pub fn render_item_listing(items: &[Item]) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str(&format!(
            "{:<8} - {:<12} - {}\n",
            item.severity.as_str(),
            item.environment,
            item.message
        ));
    }
    out
}

fn phase_label(phase: CyclePhase) -> &'static str {
    match phase {
        CyclePhase::Idle => "idle",
        CyclePhase::Scanning => "scanning",
        CyclePhase::Dispatching => "dispatching",
    }
}

pub fn render_status_html(statuses: &[NetworkStatus]) -> String {
    if statuses.is_empty() {
        return "No networks are being watched.".to_string();
    }

    let mut out = String::from("<b>Rollbar watch</b>\n");
    for s in statuses {
        let checked = s
            .last_checked
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        out.push_str(&format!(
            "\n<b>{}</b>: {} | cycles: {} | last check: {} | reported last cycle: {} | known ids: {}",
            s.network.title(),
            phase_label(s.phase),
            s.cycles,
            checked,
            s.last_reported,
            s.ledger_size,
        ));
        if let Some(err) = &s.last_error {
            out.push_str(&format!("\n  last error: <code>{}</code>", escape_html(err)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::item;

    #[test]
    fn rollbar_args_defaults() {
        assert_eq!(parse_rollbar_args("").unwrap(), (1, Network::Mainnet));
        assert_eq!(parse_rollbar_args("3").unwrap(), (3, Network::Mainnet));
        assert_eq!(parse_rollbar_args("2 testnet").unwrap(), (2, Network::Testnet));
        assert_eq!(parse_rollbar_args("2 mainnet").unwrap(), (2, Network::Mainnet));
    }

    #[test]
    fn rollbar_args_reject_bad_pages() {
        assert!(matches!(parse_rollbar_args("0"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_rollbar_args("-1"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_rollbar_args("abc"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn listing_pads_columns() {
        let mut it = item(1, "error", "Timeout on rpc");
        it.environment = "prod".to_string();
        let text = render_item_listing(&[it, item(2, "info", "hello")]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "error    - prod         - Timeout on rpc");
        assert_eq!(lines[1], "info     - checkpoint_bot - hello");
    }

    #[test]
    fn status_lists_every_network_and_escapes_errors() {
        let statuses = vec![
            NetworkStatus {
                network: Network::Mainnet,
                phase: CyclePhase::Idle,
                cycles: 4,
                last_checked: None,
                last_reported: 2,
                last_error: None,
                ledger_size: 10,
            },
            NetworkStatus {
                network: Network::Testnet,
                phase: CyclePhase::Scanning,
                cycles: 1,
                last_checked: None,
                last_reported: 0,
                last_error: Some("transport error: <502>".to_string()),
                ledger_size: 0,
            },
        ];

        let html = render_status_html(&statuses);
        assert!(html.contains("<b>Mainnet</b>: idle | cycles: 4"));
        assert!(html.contains("<b>Testnet</b>: scanning"));
        assert!(html.contains("&lt;502&gt;"));
        assert!(html.contains("last check: never"));
    }

    #[test]
    fn status_without_networks() {
        assert_eq!(render_status_html(&[]), "No networks are being watched.");
    }
}
