//! Cursor-driven pagination over a parent's remote items.

use crate::error::{FetchError, FetchResult};
use crate::model::{ChildItem, ItemId, ParentId};
use crate::remote::{ItemQuery, PageCursor, RawPage, RemoteSource};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Every item of one query, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct FetchedBatch {
    /// Items across all pages.
    pub items: Vec<ChildItem>,
    /// Number of pages consumed.
    pub pages: u32,
}

/// Walks a paginated listing one page at a time.
///
/// The next page is requested only when the caller asks for it, using the
/// cursor of the page before. The first error ends the walk: no further
/// pages are requested and [`PageFetcher::next_page`] returns `None`
/// afterwards.
pub struct PageFetcher<'a, S: RemoteSource> {
    source: &'a S,
    query: ItemQuery,
    cursor: Option<PageCursor>,
    pages: u32,
    finished: bool,
    page_timeout: Duration,
    verbose: bool,
    label: String,
}

impl<'a, S: RemoteSource> PageFetcher<'a, S> {
    /// Creates a fetcher for `query`.
    pub fn new(source: &'a S, query: ItemQuery, page_timeout: Duration) -> Self {
        let label = query.parent_id.to_string();
        Self {
            source,
            query,
            cursor: None,
            pages: 0,
            finished: false,
            page_timeout,
            verbose: false,
            label,
        }
    }

    /// Logs every page at info level instead of debug.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the human-readable name used in progress logs.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Returns the number of pages consumed so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages
    }

    /// Returns true once the last page was consumed or an error occurred.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetches and decodes the next page.
    ///
    /// Returns `None` when the listing is exhausted.
    pub async fn next_page(&mut self) -> Option<FetchResult<Vec<ChildItem>>> {
        if self.finished {
            return None;
        }

        let page = self.pages + 1;
        let request = self.source.list_items(&self.query, self.cursor.as_ref());
        let decoded = match timeout(self.page_timeout, request).await {
            Ok(Ok(raw)) => decode_page(raw, self.query.parent_id, page),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(FetchError::Timeout {
                page,
                after: self.page_timeout,
            }),
        };

        let (items, next) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        if next.is_some() && next == self.cursor {
            self.finished = true;
            return Some(Err(FetchError::malformed(page, "next-page cursor did not advance")));
        }

        if self.verbose {
            info!(parent = %self.label, page, items = items.len(), "fetched page of items");
        } else {
            debug!(parent = %self.label, page, items = items.len(), "fetched page of items");
        }

        self.pages = page;
        self.finished = next.is_none();
        self.cursor = next;
        Some(Ok(items))
    }

    /// Drives the walk to completion.
    ///
    /// # Errors
    ///
    /// Returns the first page error; items from earlier pages are dropped.
    pub async fn collect_all(mut self) -> FetchResult<FetchedBatch> {
        let mut items = Vec::new();
        while !self.is_finished() {
            match self.next_page().await {
                Some(page) => items.extend(page?),
                None => break,
            }
        }
        Ok(FetchedBatch {
            items,
            pages: self.pages_fetched(),
        })
    }
}

/// Validates a raw page and converts its items.
fn decode_page(
    raw: RawPage,
    parent_id: ParentId,
    page: u32,
) -> FetchResult<(Vec<ChildItem>, Option<PageCursor>)> {
    let data = raw
        .data
        .ok_or_else(|| FetchError::malformed(page, "no page data found"))?;
    let meta = raw
        .meta
        .ok_or_else(|| FetchError::malformed(page, "no page metadata found"))?;

    let items = data
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            child_from_raw(value, parent_id)
                .map_err(|reason| FetchError::malformed(page, format!("item {index}: {reason}")))
        })
        .collect::<FetchResult<Vec<_>>>()?;

    Ok((items, meta.next_page))
}

/// Converts a raw remote item into a [`ChildItem`] owned by `parent_id`.
///
/// # Errors
///
/// Returns a description of the problem if the item is not an object or
/// has no unsigned integer `id`.
pub fn child_from_raw(raw: Value, parent_id: ParentId) -> Result<ChildItem, String> {
    let Value::Object(fields) = raw else {
        return Err("item is not an object".into());
    };
    let id = fields
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| "missing integer id".to_string())?;
    Ok(ChildItem::new(ItemId(id), parent_id, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RemoteParent, ScopeId};
    use crate::remote::{FixtureRemote, PageFault};
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn query(page_size: u32) -> ItemQuery {
        ItemQuery {
            scope: ScopeId(1),
            parent_id: ParentId(5),
            fields: "name".into(),
            modified_since: DateTime::<Utc>::UNIX_EPOCH,
            page_size,
        }
    }

    fn remote(count: u64) -> FixtureRemote {
        let remote = FixtureRemote::new();
        remote.add_parent(RemoteParent::new(5, "bill"));
        for id in 1..=count {
            remote.upsert_item(json!({"id": id, "assignee": 5, "name": format!("t{id}")}));
        }
        remote
    }

    /// Serves the same cursor forever.
    struct StuckSource;

    impl RemoteSource for StuckSource {
        async fn list_parents(&self, _scope: ScopeId) -> FetchResult<Vec<RemoteParent>> {
            Ok(Vec::new())
        }

        async fn list_items(
            &self,
            _query: &ItemQuery,
            _cursor: Option<&PageCursor>,
        ) -> FetchResult<RawPage> {
            Ok(RawPage::new(
                vec![json!({"id": 1})],
                Some(PageCursor("same".into())),
            ))
        }
    }

    #[tokio::test]
    async fn walks_all_pages_in_order() {
        let remote = remote(5);
        let batch = PageFetcher::new(&remote, query(2), Duration::from_secs(5))
            .collect_all()
            .await
            .unwrap();

        assert_eq!(batch.pages, 3);
        let ids: Vec<_> = batch.items.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(batch.items.iter().all(|i| i.assignee_id == ParentId(5)));
        assert_eq!(remote.requests().len(), 3);
    }

    #[tokio::test]
    async fn empty_listing_is_one_page() {
        let remote = remote(0);
        let batch = PageFetcher::new(&remote, query(2), Duration::from_secs(5))
            .collect_all()
            .await
            .unwrap();
        assert_eq!(batch.pages, 1);
        assert!(batch.items.is_empty());
    }

    #[tokio::test]
    async fn lock_step_requests() {
        let remote = remote(4);
        let mut fetcher = PageFetcher::new(&remote, query(2), Duration::from_secs(5));

        let first = fetcher.next_page().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(remote.requests().len(), 1);
        assert!(!fetcher.is_finished());

        fetcher.next_page().await.unwrap().unwrap();
        assert!(fetcher.is_finished());
        assert!(fetcher.next_page().await.is_none());
        assert_eq!(remote.requests().len(), 2);
        assert_eq!(fetcher.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn stops_at_first_failed_page() {
        let remote = remote(6);
        remote.inject_page_fault(ParentId(5), 2, PageFault::Reject);

        let mut fetcher = PageFetcher::new(&remote, query(2), Duration::from_secs(5));
        assert!(fetcher.next_page().await.unwrap().is_ok());
        assert!(fetcher.next_page().await.unwrap().is_err());
        assert!(fetcher.next_page().await.is_none());
        // Page 3 was never requested
        assert_eq!(remote.requests().len(), 2);
    }

    #[tokio::test]
    async fn malformed_page_fails_the_walk() {
        let remote = remote(3);
        remote.inject_page_fault(ParentId(5), 2, PageFault::Malformed);

        let err = PageFetcher::new(&remote, query(2), Duration::from_secs(5))
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedPage { page: 2, .. }));
    }

    #[tokio::test]
    async fn hanging_page_times_out() {
        let remote = remote(3);
        remote.inject_page_fault(ParentId(5), 1, PageFault::Hang);

        let err = PageFetcher::new(&remote, query(2), Duration::from_millis(50))
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { page: 1, .. }));
    }

    #[tokio::test]
    async fn repeated_cursor_is_malformed() {
        let err = PageFetcher::new(&StuckSource, query(1), Duration::from_secs(5))
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedPage { page: 2, .. }));
    }

    #[test]
    fn decode_rejects_missing_parts() {
        let no_meta = RawPage {
            data: Some(vec![]),
            meta: None,
        };
        assert!(decode_page(no_meta, ParentId(1), 1).is_err());

        let bad_item = RawPage::new(vec![json!({"name": "no id"})], None);
        let err = decode_page(bad_item, ParentId(1), 4).unwrap_err();
        assert!(err.to_string().contains("page 4"));
    }

    #[test]
    fn raw_conversion() {
        let item = child_from_raw(json!({"id": 9, "name": "abc", "assignee": 77}), ParentId(3)).unwrap();
        assert_eq!(item.id, ItemId(9));
        assert_eq!(item.assignee_id, ParentId(3));
        assert!(item.storage_revision.is_none());
        assert!(item.field("assignee").is_none());

        assert!(child_from_raw(json!([1, 2]), ParentId(3)).is_err());
        assert!(child_from_raw(json!({"id": "9"}), ParentId(3)).is_err());
        assert!(child_from_raw(json!({"id": -1}), ParentId(3)).is_err());
    }
}
