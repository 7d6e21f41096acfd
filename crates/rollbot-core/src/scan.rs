//! Backlog scan: walk the newest-first feed until a page yields nothing new.

use std::collections::HashSet;

use crate::{
    domain::{Item, ItemId, Network},
    exclusion::ExclusionFilter,
    ledger::Ledger,
    ports::ItemSource,
    Result,
};

/// Items to report for one cycle, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub items: Vec<Item>,
    pub pages_fetched: u32,
    /// Unreported items dropped by the exclusion filter.
    pub excluded: usize,
}

/// Walk pages `1..=page_limit` and collect unreported, non-excluded items.
///
/// Paging stops at the first page contributing nothing new. Pages are newest
/// first and the ledger only grows, so everything deeper is assumed reported.
/// A page made entirely of excluded items therefore also ends the walk.
///
/// Any fetch error aborts the scan; nothing is partially returned.
pub async fn collect_new_items(
    source: &dyn ItemSource,
    network: Network,
    ledger: &dyn Ledger,
    filter: &ExclusionFilter,
    page_limit: u32,
) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();
    let mut collected: HashSet<ItemId> = HashSet::new();

    for page in 1..=page_limit {
        let items = source.fetch_page(network, page).await?;
        outcome.pages_fetched = page;

        let mut new_on_page = Vec::new();
        for item in items {
            if ledger.contains(item.id) || collected.contains(&item.id) {
                continue;
            }
            if filter.is_excluded(&item.message) {
                tracing::debug!(%network, item_id = item.id, "item excluded by filter");
                outcome.excluded += 1;
                continue;
            }
            collected.insert(item.id);
            new_on_page.push(item);
        }

        tracing::debug!(%network, page, new = new_on_page.len(), "scanned page");
        if new_on_page.is_empty() {
            break;
        }
        outcome.items.extend(new_on_page);
    }

    outcome.items.reverse();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::testing::{item, FakeSource, MemoryLedger};

    fn ids(items: &[Item]) -> Vec<ItemId> {
        items.iter().map(|i| i.id).collect()
    }

    #[tokio::test]
    async fn returns_items_oldest_first() {
        let source = FakeSource::default();
        source.set_page(
            Network::Mainnet,
            1,
            vec![item(3, "error", "c"), item(2, "error", "b"), item(1, "error", "a")],
        );
        let ledger = MemoryLedger::default();

        let out = collect_new_items(
            &source,
            Network::Mainnet,
            &ledger,
            &ExclusionFilter::default(),
            5,
        )
        .await
        .unwrap();

        assert_eq!(ids(&out.items), vec![1, 2, 3]);
        // Page 2 is empty, which ends the walk.
        assert_eq!(out.pages_fetched, 2);
    }

    #[tokio::test]
    async fn stops_after_first_page_without_new_items() {
        let source = FakeSource::default();
        source.set_page(Network::Mainnet, 1, vec![item(12, "info", "x"), item(11, "info", "y")]);
        source.set_page(Network::Mainnet, 2, vec![item(10, "info", "x"), item(9, "info", "y")]);
        source.set_page(Network::Mainnet, 3, vec![item(8, "info", "never")]);
        let ledger = MemoryLedger::with_ids([10, 9]);

        let out = collect_new_items(
            &source,
            Network::Mainnet,
            &ledger,
            &ExclusionFilter::default(),
            5,
        )
        .await
        .unwrap();

        assert_eq!(ids(&out.items), vec![11, 12]);
        assert_eq!(
            source.fetches(),
            vec![(Network::Mainnet, 1), (Network::Mainnet, 2)]
        );
    }

    #[tokio::test]
    async fn page_limit_bounds_the_walk() {
        let source = FakeSource::default();
        for page in 1..=4u32 {
            let id = 100 - page as u64;
            source.set_page(Network::Testnet, page, vec![item(id, "info", "m")]);
        }
        let ledger = MemoryLedger::default();

        let out = collect_new_items(
            &source,
            Network::Testnet,
            &ledger,
            &ExclusionFilter::default(),
            2,
        )
        .await
        .unwrap();

        assert_eq!(ids(&out.items), vec![98, 99]);
        assert_eq!(source.fetches().len(), 2);
    }

    #[tokio::test]
    async fn second_scan_after_recording_is_empty() {
        let source = FakeSource::default();
        source.set_page(Network::Mainnet, 1, vec![item(2, "error", "b"), item(1, "error", "a")]);
        let mut ledger = MemoryLedger::default();
        let filter = ExclusionFilter::default();

        let first = collect_new_items(&source, Network::Mainnet, &ledger, &filter, 5)
            .await
            .unwrap();
        for it in &first.items {
            ledger.append(it.id).await.unwrap();
        }
        let second = collect_new_items(&source, Network::Mainnet, &ledger, &filter, 5)
            .await
            .unwrap();

        assert_eq!(first.items.len(), 2);
        assert!(second.items.is_empty());
    }

    #[tokio::test]
    async fn excluded_items_are_skipped_but_not_recorded() {
        let source = FakeSource::default();
        source.set_page(
            Network::Mainnet,
            1,
            vec![
                item(3, "error", "timeout on node-7"),
                item(2, "error", "real failure"),
            ],
        );
        let ledger = MemoryLedger::default();
        let filter = ExclusionFilter::from_patterns(["timeout on *"]);

        let out = collect_new_items(&source, Network::Mainnet, &ledger, &filter, 5)
            .await
            .unwrap();

        assert_eq!(ids(&out.items), vec![2]);
        assert_eq!(out.excluded, 1);
        assert!(!ledger.contains(3));
    }

    #[tokio::test]
    async fn all_excluded_page_ends_the_walk() {
        let source = FakeSource::default();
        source.set_page(Network::Mainnet, 1, vec![item(5, "error", "Timeout on a")]);
        source.set_page(Network::Mainnet, 2, vec![item(4, "error", "hidden but new")]);
        let ledger = MemoryLedger::default();
        let filter = ExclusionFilter::from_patterns(["timeout on *"]);

        let out = collect_new_items(&source, Network::Mainnet, &ledger, &filter, 5)
            .await
            .unwrap();

        assert!(out.items.is_empty());
        assert_eq!(source.fetches(), vec![(Network::Mainnet, 1)]);
    }

    #[tokio::test]
    async fn items_shifted_across_pages_are_collected_once() {
        let source = FakeSource::default();
        source.set_page(Network::Mainnet, 1, vec![item(7, "error", "a"), item(6, "error", "b")]);
        // A new item arrived between fetches and pushed 6 onto page 2.
        source.set_page(Network::Mainnet, 2, vec![item(6, "error", "b"), item(5, "error", "c")]);
        let ledger = MemoryLedger::default();

        let out = collect_new_items(
            &source,
            Network::Mainnet,
            &ledger,
            &ExclusionFilter::default(),
            2,
        )
        .await
        .unwrap();

        assert_eq!(ids(&out.items), vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_the_scan() {
        let source = FakeSource::default();
        source.set_page(Network::Mainnet, 1, vec![item(2, "error", "b")]);
        source.fail_page(Network::Mainnet, 2);
        let ledger = MemoryLedger::default();

        let err = collect_new_items(
            &source,
            Network::Mainnet,
            &ledger,
            &ExclusionFilter::default(),
            5,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }
}
