//! Remote source abstraction.

use crate::error::{FetchError, FetchResult};
use crate::model::{parse_timestamp, ParentId, RemoteParent, ScopeId, MODIFIED_AT_FIELD};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;

/// Query for one parent's items.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemQuery {
    /// Remote scope.
    pub scope: ScopeId,
    /// Parent whose items are listed.
    pub parent_id: ParentId,
    /// Comma-separated field selection.
    pub fields: String,
    /// Only items modified at or after this instant are listed.
    pub modified_since: DateTime<Utc>,
    /// Items per page.
    pub page_size: u32,
}

/// Opaque handle for the next page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(pub String);

/// Listing metadata attached to a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Cursor of the following page; absent on the last page.
    #[serde(default)]
    pub next_page: Option<PageCursor>,
}

/// A page as it arrives from the remote, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    /// Raw item objects.
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    /// Listing metadata.
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

impl RawPage {
    /// Creates a well-formed page.
    pub fn new(items: Vec<Value>, next_page: Option<PageCursor>) -> Self {
        Self {
            data: Some(items),
            meta: Some(PageMeta { next_page }),
        }
    }
}

/// A remote source of parents and their paginated items.
///
/// This trait abstracts the remote API, allowing for different
/// implementations (HTTP clients, replayed exports, fixtures for testing).
pub trait RemoteSource: Send + Sync {
    /// Lists every parent in the scope.
    fn list_parents(
        &self,
        scope: ScopeId,
    ) -> impl Future<Output = FetchResult<Vec<RemoteParent>>> + Send;

    /// Fetches one page of a parent's items. `cursor` is `None` for the
    /// first page and the previous page's `next_page` afterwards.
    fn list_items(
        &self,
        query: &ItemQuery,
        cursor: Option<&PageCursor>,
    ) -> impl Future<Output = FetchResult<RawPage>> + Send;
}

/// Exported remote contents a [`FixtureRemote`] serves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteFixture {
    /// Parents in the scope.
    #[serde(default)]
    pub parents: Vec<RemoteParent>,
    /// Raw items; each carries its parent id under `assignee`.
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Failure injected into a [`FixtureRemote`] page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFault {
    /// The request is rejected.
    Reject,
    /// The page arrives without data.
    Malformed,
    /// The request never completes.
    Hang,
}

/// One recorded `list_items` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRequest {
    /// Parent whose items were requested.
    pub parent_id: ParentId,
    /// Lower bound sent with the request.
    pub modified_since: DateTime<Utc>,
    /// Cursor sent with the request.
    pub cursor: Option<PageCursor>,
    /// When the request was received.
    pub received_at: DateTime<Utc>,
}

/// An in-memory remote serving a [`RemoteFixture`].
///
/// Items are filtered by `assignee` and by `modified_at >= modified_since`
/// (items without `modified_at` always match), then paginated in fixture
/// order with `offset:<n>` cursors. Faults can be injected per parent page
/// for testing.
#[derive(Debug, Default)]
pub struct FixtureRemote {
    fixture: Mutex<RemoteFixture>,
    parent_fault: Mutex<Option<String>>,
    page_faults: Mutex<HashMap<(ParentId, u32), PageFault>>,
    requests: Mutex<Vec<ItemRequest>>,
}

impl FixtureRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remote serving `fixture`.
    pub fn from_fixture(fixture: RemoteFixture) -> Self {
        Self {
            fixture: Mutex::new(fixture),
            ..Self::default()
        }
    }

    /// Adds a parent to the listing.
    pub fn add_parent(&self, parent: RemoteParent) {
        self.fixture.lock().parents.push(parent);
    }

    /// Inserts an item, or replaces the item with the same `id`.
    pub fn upsert_item(&self, item: Value) {
        let mut fixture = self.fixture.lock();
        let id = item.get("id").cloned();
        match fixture
            .items
            .iter_mut()
            .find(|existing| id.is_some() && existing.get("id").cloned() == id)
        {
            Some(existing) => *existing = item,
            None => fixture.items.push(item),
        }
    }

    /// Makes `list_parents` fail with `message`.
    pub fn fail_parent_listing(&self, message: impl Into<String>) {
        *self.parent_fault.lock() = Some(message.into());
    }

    /// Injects a fault into page `page` (1-based) of `parent_id`'s listing.
    pub fn inject_page_fault(&self, parent_id: ParentId, page: u32, fault: PageFault) {
        self.page_faults.lock().insert((parent_id, page), fault);
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        *self.parent_fault.lock() = None;
        self.page_faults.lock().clear();
    }

    /// Returns every `list_items` call received so far.
    pub fn requests(&self) -> Vec<ItemRequest> {
        self.requests.lock().clone()
    }

    /// Forgets recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn matching_items(&self, query: &ItemQuery) -> Vec<Value> {
        self.fixture
            .lock()
            .items
            .iter()
            .filter(|item| item.get("assignee").and_then(Value::as_u64) == Some(query.parent_id.0))
            .filter(|item| {
                match item
                    .get(MODIFIED_AT_FIELD)
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp)
                {
                    Some(modified) => modified >= query.modified_since,
                    None => true,
                }
            })
            .cloned()
            .collect()
    }
}

fn parse_offset(cursor: Option<&PageCursor>) -> FetchResult<usize> {
    match cursor {
        None => Ok(0),
        Some(PageCursor(raw)) => raw
            .strip_prefix("offset:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| FetchError::remote_fatal(format!("unknown cursor {raw:?}"))),
    }
}

impl RemoteSource for FixtureRemote {
    async fn list_parents(&self, _scope: ScopeId) -> FetchResult<Vec<RemoteParent>> {
        if let Some(message) = self.parent_fault.lock().clone() {
            return Err(FetchError::remote_fatal(message));
        }
        Ok(self.fixture.lock().parents.clone())
    }

    async fn list_items(
        &self,
        query: &ItemQuery,
        cursor: Option<&PageCursor>,
    ) -> FetchResult<RawPage> {
        self.requests.lock().push(ItemRequest {
            parent_id: query.parent_id,
            modified_since: query.modified_since,
            cursor: cursor.cloned(),
            received_at: Utc::now(),
        });

        let page_size = query.page_size.max(1) as usize;
        let offset = parse_offset(cursor)?;
        let page = (offset / page_size) as u32 + 1;

        let fault = self.page_faults.lock().get(&(query.parent_id, page)).copied();
        match fault {
            Some(PageFault::Reject) => {
                return Err(FetchError::remote_retryable(format!(
                    "page {page} rejected"
                )))
            }
            Some(PageFault::Malformed) => {
                return Ok(RawPage {
                    data: None,
                    meta: Some(PageMeta::default()),
                })
            }
            Some(PageFault::Hang) => return std::future::pending().await,
            None => {}
        }

        let items = self.matching_items(query);
        let end = (offset + page_size).min(items.len());
        let data = items.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();
        let next_page =
            (end < items.len()).then(|| PageCursor(format!("offset:{end}")));
        Ok(RawPage::new(data, next_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(parent: u64, page_size: u32) -> ItemQuery {
        ItemQuery {
            scope: ScopeId(1),
            parent_id: ParentId(parent),
            fields: "name".into(),
            modified_since: DateTime::<Utc>::UNIX_EPOCH,
            page_size,
        }
    }

    fn remote_with_items(count: u64) -> FixtureRemote {
        let remote = FixtureRemote::new();
        remote.add_parent(RemoteParent::new(5, "bill"));
        for id in 1..=count {
            remote.upsert_item(json!({"id": id, "assignee": 5, "name": format!("item {id}")}));
        }
        remote
    }

    #[tokio::test]
    async fn fixture_paginates_with_offsets() {
        let remote = remote_with_items(5);
        let q = query(5, 2);

        let first = remote.list_items(&q, None).await.unwrap();
        assert_eq!(first.data.as_ref().unwrap().len(), 2);
        let next = first.meta.unwrap().next_page.unwrap();
        assert_eq!(next, PageCursor("offset:2".into()));

        let third = remote
            .list_items(&q, Some(&PageCursor("offset:4".into())))
            .await
            .unwrap();
        assert_eq!(third.data.unwrap().len(), 1);
        assert!(third.meta.unwrap().next_page.is_none());
        assert_eq!(remote.requests().len(), 2);
    }

    #[tokio::test]
    async fn fixture_filters_by_parent_and_time() {
        let remote = FixtureRemote::new();
        remote.upsert_item(json!({"id": 1, "assignee": 5, "modified_at": "2015-01-01T00:00:00Z"}));
        remote.upsert_item(json!({"id": 2, "assignee": 5, "modified_at": "2020-01-01T00:00:00Z"}));
        remote.upsert_item(json!({"id": 3, "assignee": 6}));
        remote.upsert_item(json!({"id": 4, "assignee": 5}));

        let mut q = query(5, 10);
        q.modified_since = parse_timestamp("2018-01-01T00:00:00Z").unwrap();
        let page = remote.list_items(&q, None).await.unwrap();
        let ids: Vec<_> = page.data.unwrap().iter().map(|i| i["id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(4)]);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let remote = remote_with_items(1);
        remote.upsert_item(json!({"id": 1, "assignee": 5, "name": "renamed"}));
        let page = remote.list_items(&query(5, 10), None).await.unwrap();
        let data = page.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], json!("renamed"));
    }

    #[tokio::test]
    async fn injected_faults() {
        let remote = remote_with_items(4);
        remote.inject_page_fault(ParentId(5), 2, PageFault::Reject);
        remote.inject_page_fault(ParentId(5), 1, PageFault::Malformed);

        let q = query(5, 2);
        let first = remote.list_items(&q, None).await.unwrap();
        assert!(first.data.is_none());

        let second = remote.list_items(&q, Some(&PageCursor("offset:2".into()))).await;
        assert!(matches!(second, Err(FetchError::Remote { .. })));

        remote.fail_parent_listing("scope gone");
        assert!(remote.list_parents(ScopeId(1)).await.is_err());

        remote.clear_faults();
        assert_eq!(remote.list_parents(ScopeId(1)).await.unwrap().len(), 1);
        assert!(remote.list_items(&q, None).await.unwrap().data.is_some());
    }

    #[tokio::test]
    async fn unknown_cursor_is_rejected() {
        let remote = remote_with_items(1);
        let result = remote
            .list_items(&query(5, 2), Some(&PageCursor("page-2".into())))
            .await;
        assert!(matches!(result, Err(FetchError::Remote { retryable: false, .. })));
    }

    #[test]
    fn fixture_from_json() {
        let fixture: RemoteFixture = serde_json::from_value(json!({
            "parents": [{"id": 8701585143073u64, "name": "bill brasky"}],
            "items": [{"id": 10007255869124u64, "assignee": 8701585143073u64, "name": "abc"}]
        }))
        .unwrap();
        assert_eq!(fixture.parents[0].id, ParentId(8701585143073));
        assert_eq!(fixture.items.len(), 1);
    }
}
