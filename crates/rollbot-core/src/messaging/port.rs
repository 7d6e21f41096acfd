use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{Document, MessagingCapabilities},
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the only implementation; notifications, the heartbeat message and
/// command replies all go through this interface.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    /// Send a file with an optional HTML caption.
    async fn send_document(
        &self,
        chat_id: ChatId,
        caption: Option<&str>,
        document: Document,
    ) -> Result<MessageRef>;
}
