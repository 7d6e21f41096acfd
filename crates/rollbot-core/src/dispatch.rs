//! Per-item delivery: route by severity, notify, then record as reported.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::Config,
    domain::{Item, MessageRef, Network},
    formatting::render_item_notification,
    ledger::Ledger,
    messaging::port::MessagingPort,
    routing::Routing,
    Result,
};

/// What happened to a single item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent(MessageRef),
    /// No destination for this severity; recorded without a notification.
    Unroutable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub unroutable: usize,
}

pub struct Dispatcher {
    routing: Routing,
    messenger: Arc<dyn MessagingPort>,
    web_base: String,
    max_len: usize,
}

impl Dispatcher {
    pub fn new(cfg: &Config, messenger: Arc<dyn MessagingPort>) -> Self {
        let max_len = cfg
            .telegram_safe_limit
            .min(messenger.capabilities().max_message_len);
        Self {
            routing: cfg.routing,
            messenger,
            web_base: cfg.rollbar_web_base.clone(),
            max_len,
        }
    }

    /// Route, send and record one item.
    ///
    /// The id is appended to the ledger after the send, including when the
    /// severity is unroutable. A failed send leaves the ledger untouched so the
    /// item comes back on the next cycle.
    pub async fn report(
        &self,
        item: &Item,
        network: Network,
        ledger: &mut dyn Ledger,
    ) -> Result<Delivery> {
        let delivery = match self.routing.resolve(network, &item.severity) {
            Some(chat_id) => {
                let html =
                    render_item_notification(item, &self.web_base, Utc::now(), self.max_len);
                let msg = self.messenger.send_html(chat_id, &html).await?;
                tracing::info!(%network, item_id = item.id, chat_id = chat_id.0, "reported item");
                Delivery::Sent(msg)
            }
            None => {
                tracing::info!(
                    %network,
                    item_id = item.id,
                    severity = %item.severity,
                    "no route for severity, marking reported without notification"
                );
                Delivery::Unroutable
            }
        };

        ledger.append(item.id).await?;
        Ok(delivery)
    }

    /// Report `items` in order, stopping at the first failure.
    ///
    /// Items handled before the failure stay recorded.
    pub async fn report_all(
        &self,
        items: &[Item],
        network: Network,
        ledger: &mut dyn Ledger,
    ) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();
        for item in items {
            match self.report(item, network, ledger).await? {
                Delivery::Sent(_) => summary.sent += 1,
                Delivery::Unroutable => summary.unroutable += 1,
            }
        }
        Ok(summary)
    }
}
