use async_trait::async_trait;

use crate::{
    domain::{Item, Network},
    Result,
};

/// Hexagonal port for the error-tracking backend.
///
/// Implementations return one page of recent items, newest first, and map any
/// network or HTTP failure to [`crate::Error::Transport`]. No retries: the next
/// scheduled cycle is the retry.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_page(&self, network: Network, page: u32) -> Result<Vec<Item>>;
}
