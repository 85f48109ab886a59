use std::fmt;
use std::time::Duration;

use tracing::{info, warn};

use crate::hh::{SearchClient, SearchTransport};
use crate::models::VacancyRecord;
use crate::normalize::normalize_items;

pub const PER_PAGE: u32 = 50;
pub const MAX_PAGES: u32 = 20;
pub const PAGE_PAUSE: Duration = Duration::from_millis(500);

/// Why the paging loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FetchFailed,
    NoMoreItems,
    EnoughCollected,
    PageCeiling,
    LastPage,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::FetchFailed => "repeated fetch errors",
            StopReason::NoMoreItems => "no more items",
            StopReason::EnoughCollected => "collected enough candidates",
            StopReason::PageCeiling => "page ceiling reached",
            StopReason::LastPage => "last page reached",
        };
        f.write_str(text)
    }
}

#[derive(Debug)]
pub struct Collection {
    pub records: Vec<VacancyRecord>,
    pub total_found: u64,
    pub pages_fetched: u32,
    pub items_skipped: usize,
    pub stop_reason: StopReason,
}

/// Pages through search results until one of the stop conditions holds.
///
/// Records are kept in arrival order and not deduplicated. A page that cannot
/// be fetched ends the loop; whatever was gathered before it is returned.
pub async fn collect<T: SearchTransport>(client: &SearchClient<T>, limit: usize) -> Collection {
    let target = limit.saturating_mul(3);
    let mut records: Vec<VacancyRecord> = Vec::new();
    let mut total_found = 0;
    let mut items_skipped = 0;
    let mut page: u32 = 0;

    let stop_reason = loop {
        let raw = match client.fetch_page(page, PER_PAGE).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(page, error = %e, "Stopping collection due to repeated errors");
                break StopReason::FetchFailed;
            }
        };

        if page == 0 {
            total_found = raw.found;
            info!(total_found, "Total IT vacancies found");
        }

        if raw.items.is_empty() {
            info!(page, "No more items, stopping");
            break StopReason::NoMoreItems;
        }

        let pages_total = raw.pages;
        let (normalized, skipped) = normalize_items(raw.items);
        records.extend(normalized);
        items_skipped += skipped;
        page += 1;

        if records.len() >= target {
            break StopReason::EnoughCollected;
        }
        if page >= MAX_PAGES {
            break StopReason::PageCeiling;
        }
        if page >= pages_total {
            info!(page, pages_total, "Reached last page");
            break StopReason::LastPage;
        }

        tokio::time::sleep(PAGE_PAUSE).await;
    };

    info!(
        collected = records.len(),
        pages = page,
        reason = %stop_reason,
        "Collected vacancies before filtering"
    );

    Collection {
        records,
        total_found,
        pages_fetched: page,
        items_skipped,
        stop_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hh::TransportError;
    use crate::hh::testing::*;
    use tokio::time::Instant;

    fn ids(collection: &Collection) -> Vec<String> {
        collection
            .records
            .iter()
            .map(|r| r.display_id().to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_last_page_with_pacing() {
        let transport = ScriptedTransport::new(vec![
            reply(200, &page_body(&["1", "2"], 4, 2)),
            reply(200, &page_body(&["3", "4"], 4, 2)),
        ]);
        let client = SearchClient::new(transport);
        let started = Instant::now();
        let collection = collect(&client, 15).await;
        assert_eq!(collection.stop_reason, StopReason::LastPage);
        assert_eq!(ids(&collection), vec!["1", "2", "3", "4"]);
        assert_eq!(collection.total_found, 4);
        assert_eq!(collection.pages_fetched, 2);
        // One pause between the two pages, none after the last.
        assert_eq!(started.elapsed(), PAGE_PAUSE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_empty_page() {
        let transport = ScriptedTransport::new(vec![
            reply(200, &page_body(&["1"], 10, 5)),
            reply(200, &page_body(&[], 10, 5)),
        ]);
        let collection = collect(&SearchClient::new(transport), 15).await;
        assert_eq!(collection.stop_reason, StopReason::NoMoreItems);
        assert_eq!(ids(&collection), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_three_times_limit_collected() {
        let transport = ScriptedTransport::new(vec![
            reply(200, &page_body(&["1", "2"], 100, 50)),
            reply(200, &page_body(&["3", "4"], 100, 50)),
            reply(200, &page_body(&["5", "6"], 100, 50)),
        ]);
        let client = SearchClient::new(transport);
        let collection = collect(&client, 1).await;
        assert_eq!(collection.stop_reason, StopReason::EnoughCollected);
        assert_eq!(ids(&collection), vec!["1", "2", "3", "4"]);
        assert_eq!(client_calls(&client), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_page_ceiling() {
        let replies = (0..25)
            .map(|i| reply(200, &page_body(&[i.to_string().as_str()], 1000, 100)))
            .collect();
        let client = SearchClient::new(ScriptedTransport::new(replies));
        let collection = collect(&client, 1000).await;
        assert_eq!(collection.stop_reason, StopReason::PageCeiling);
        assert_eq!(collection.pages_fetched, MAX_PAGES);
        assert_eq!(collection.records.len(), MAX_PAGES as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_partial_results() {
        let mut replies = vec![reply(200, &page_body(&["1", "2"], 100, 10))];
        replies.extend((0..6).map(|_| Err(TransportError::Timeout)));
        let client = SearchClient::new(ScriptedTransport::new(replies));
        let collection = collect(&client, 15).await;
        assert_eq!(collection.stop_reason, StopReason::FetchFailed);
        assert_eq!(ids(&collection), vec!["1", "2"]);
        assert_eq!(collection.total_found, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_requested_in_order_without_dedup() {
        let transport = ScriptedTransport::new(vec![
            reply(200, &page_body(&["1", "2"], 4, 3)),
            reply(200, &page_body(&["2", "3"], 4, 3)),
            reply(200, &page_body(&["4"], 4, 3)),
        ]);
        let client = SearchClient::new(transport);
        let collection = collect(&client, 15).await;
        assert_eq!(ids(&collection), vec!["1", "2", "2", "3", "4"]);
        let pages: Vec<_> = (0..3)
            .map(|i| value(&client_query(&client, i), "page").unwrap())
            .collect();
        assert_eq!(pages, vec!["0", "1", "2"]);
    }

    fn client_calls(client: &SearchClient<ScriptedTransport>) -> usize {
        client.transport().calls()
    }

    fn client_query(client: &SearchClient<ScriptedTransport>, index: usize) -> crate::hh::Query {
        client.transport().query(index)
    }
}
