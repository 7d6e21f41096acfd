//! Heartbeat message: one message per network, edited after every cycle.

use std::{io::ErrorKind, path::PathBuf, time::Duration};

use chrono::{DateTime, Local};
use tokio::fs;

use crate::{
    config::Config,
    domain::{ChatId, MessageId, MessageRef, Network},
    errors::Error,
    messaging::port::MessagingPort,
    Result,
};

pub fn heartbeat_text(network: Network, checked_at: DateTime<Local>, interval: Duration) -> String {
    format!(
        "{} rollbar checked at {}, next check in {} seconds",
        network.title(),
        checked_at.format("%Y-%m-%d %H:%M:%S"),
        interval.as_secs()
    )
}

#[derive(Debug)]
pub struct StatusBoard {
    network: Network,
    chat_id: ChatId,
    path: PathBuf,
    message: Option<MessageRef>,
}

impl StatusBoard {
    /// Load the persisted message id, if any. A missing or unreadable id just
    /// means a fresh message is sent on the first publish.
    pub async fn open(cfg: &Config, network: Network) -> Self {
        let path = cfg.status_message_path(network);
        let chat_id = cfg.routing.status_chat(network);

        let message = match fs::read_to_string(&path).await {
            Ok(s) => match s.trim().parse::<i32>() {
                Ok(id) => Some(MessageRef {
                    chat_id,
                    message_id: MessageId(id),
                }),
                Err(_) => {
                    tracing::warn!(%network, path = %path.display(), "ignoring unreadable status message id");
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(%network, path = %path.display(), error = %e, "failed to read status message id");
                None
            }
        };

        Self {
            network,
            chat_id,
            path,
            message,
        }
    }

    pub fn message(&self) -> Option<MessageRef> {
        self.message
    }

    /// Edit the heartbeat message, or send (and persist) a new one when there
    /// is none or it can no longer be edited.
    pub async fn publish(&mut self, messenger: &dyn MessagingPort, text: &str) -> Result<MessageRef> {
        if let Some(msg) = self.message {
            match messenger.edit_html(msg, text).await {
                Ok(()) => return Ok(msg),
                Err(e) => {
                    tracing::warn!(network = %self.network, error = %e, "status message not editable, sending a new one");
                }
            }
        }

        let msg = messenger.send_html(self.chat_id, text).await?;
        self.message = Some(msg);
        fs::write(&self.path, msg.message_id.0.to_string())
            .await
            .map_err(|e| Error::persistence(&self.path, e))?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::testing::{temp_dir, FakeMessenger};
    use chrono::TimeZone;

    #[test]
    fn heartbeat_wording() {
        let at = Local.with_ymd_and_hms(2026, 10, 19, 8, 30, 5).unwrap();
        assert_eq!(
            heartbeat_text(Network::Testnet, at, Duration::from_secs(10)),
            "Testnet rollbar checked at 2026-10-19 08:30:05, next check in 10 seconds"
        );
    }

    #[tokio::test]
    async fn first_publish_sends_and_persists_then_edits() {
        let dir = temp_dir("status-board");
        std::fs::create_dir_all(&dir).unwrap();
        let cfg = test_config(&dir);
        let messenger = FakeMessenger::default();

        let mut board = StatusBoard::open(&cfg, Network::Mainnet).await;
        assert!(board.message().is_none());

        let first = board.publish(&messenger, "one").await.unwrap();
        assert_eq!(first.chat_id, cfg.routing.info);
        let stored = std::fs::read_to_string(cfg.status_message_path(Network::Mainnet)).unwrap();
        assert_eq!(stored, first.message_id.0.to_string());

        let mut reopened = StatusBoard::open(&cfg, Network::Mainnet).await;
        assert_eq!(reopened.message(), Some(first));
        reopened.publish(&messenger, "two").await.unwrap();

        assert_eq!(messenger.sent().len(), 1);
        assert_eq!(messenger.edits(), vec![(first, "two".to_string())]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn lost_message_is_replaced() {
        let dir = temp_dir("status-board-lost");
        std::fs::create_dir_all(&dir).unwrap();
        let cfg = test_config(&dir);
        std::fs::write(cfg.status_message_path(Network::Testnet), "77").unwrap();
        let messenger = FakeMessenger::default();
        messenger.fail_edits(true);

        let mut board = StatusBoard::open(&cfg, Network::Testnet).await;
        let msg = board.publish(&messenger, "hb").await.unwrap();

        assert_ne!(msg.message_id, MessageId(77));
        assert_eq!(msg.chat_id, cfg.routing.testnet);
        assert_eq!(messenger.sent().len(), 1);
        let stored = std::fs::read_to_string(cfg.status_message_path(Network::Testnet)).unwrap();
        assert_eq!(stored, msg.message_id.0.to_string());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
