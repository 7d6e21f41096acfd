//! In-memory fakes for the ports, shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Item, ItemId, MessageId, MessageRef, Network, Severity},
    errors::Error,
    ledger::Ledger,
    messaging::{
        port::MessagingPort,
        types::{Document, MessagingCapabilities},
    },
    ports::ItemSource,
    Result,
};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("rollbot-{prefix}-{}-{nanos}", std::process::id()))
}

pub fn item(id: ItemId, level: &str, message: &str) -> Item {
    Item {
        id,
        uuid: format!("uuid-{id}"),
        severity: Severity::parse(level),
        environment: "checkpoint_bot".to_string(),
        timestamp: 1_719_596_094,
        message: message.to_string(),
    }
}

#[derive(Default)]
pub struct FakeSource {
    pages: Mutex<HashMap<(Network, u32), Vec<Item>>>,
    fetches: Mutex<Vec<(Network, u32)>>,
    failing: Mutex<HashSet<(Network, u32)>>,
}

impl FakeSource {
    pub fn set_page(&self, network: Network, page: u32, items: Vec<Item>) {
        self.pages.lock().unwrap().insert((network, page), items);
    }

    pub fn fail_page(&self, network: Network, page: u32) {
        self.failing.lock().unwrap().insert((network, page));
    }

    pub fn fetches(&self) -> Vec<(Network, u32)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    async fn fetch_page(&self, network: Network, page: u32) -> Result<Vec<Item>> {
        self.fetches.lock().unwrap().push((network, page));
        if self.failing.lock().unwrap().contains(&(network, page)) {
            return Err(Error::Transport(format!("page {page} unavailable")));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&(network, page))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    ids: HashSet<ItemId>,
    pub order: Vec<ItemId>,
}

impl MemoryLedger {
    pub fn with_ids(ids: impl IntoIterator<Item = ItemId>) -> Self {
        let ids: Vec<ItemId> = ids.into_iter().collect();
        Self {
            ids: ids.iter().copied().collect(),
            order: ids,
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    async fn append(&mut self, id: ItemId) -> Result<()> {
        self.ids.insert(id);
        self.order.push(id);
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sends: Mutex<Vec<(ChatId, String)>>,
    edits: Mutex<Vec<(MessageRef, String)>>,
    documents: Mutex<Vec<(ChatId, Option<String>, Document)>>,
    /// Every `send_html` fails once this many have succeeded.
    fail_send_at: Mutex<Option<usize>>,
    fail_edits: Mutex<bool>,
}

impl FakeMessenger {
    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(MessageRef, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn documents(&self) -> Vec<(ChatId, Option<String>, Document)> {
        self.documents.lock().unwrap().clone()
    }

    pub fn fail_sends_after(&self, succeeded: usize) {
        *self.fail_send_at.lock().unwrap() = Some(succeeded);
    }

    pub fn fail_edits(&self, fail: bool) {
        *self.fail_edits.lock().unwrap() = fail;
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let attempt = {
            let mut sends = self.sends.lock().unwrap();
            let idx = sends.len();
            if *self.fail_send_at.lock().unwrap() == Some(idx) {
                None
            } else {
                sends.push((chat_id, html.to_string()));
                Some(idx)
            }
        };
        match attempt {
            Some(_) => Ok(self.alloc(chat_id)),
            None => Err(Error::Messaging("send rejected".to_string())),
        }
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        if *self.fail_edits.lock().unwrap() {
            return Err(Error::Messaging("message to edit not found".to_string()));
        }
        self.edits.lock().unwrap().push((msg, html.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        caption: Option<&str>,
        document: Document,
    ) -> Result<MessageRef> {
        self.documents
            .lock()
            .unwrap()
            .push((chat_id, caption.map(|c| c.to_string()), document));
        Ok(self.alloc(chat_id))
    }
}
