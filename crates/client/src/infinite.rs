//! Cursor-paginated reads.
//!
//! A page sequence moves through
//! `Idle -> FetchingFirstPage -> HasPages -> FetchingNextPage -> HasPages ...`
//! and ends once a response carries no cursor. Each page's cursor is sent
//! back verbatim as the next request's cursor parameter; it is never parsed.

use std::sync::Arc;

use futures_util::FutureExt;
use nexus_common::{Endpoint, EndpointRole};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache_key::CacheKey;
use crate::error::{Result, TransportError};
use crate::query_client::{QueryClient, SharedFetch, detach_on_cancel, flatten_join};
use crate::state::QueryState;
use crate::transport::RequestDescriptor;

/// Where a page sequence stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// No page fetched yet.
    Idle,
    /// The first page is in flight.
    FetchingFirstPage,
    /// At least one page arrived.
    HasPages {
        /// `None` once the last page arrived.
        next_cursor: Option<String>,
    },
    /// A later page is in flight.
    FetchingNextPage {
        /// Cursor sent with the request.
        cursor: String,
    },
}

/// Result of asking for the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// A page of the sequence.
    Page {
        /// 0-based position in the sequence.
        index: usize,
        /// Decoded response body.
        data: Value,
    },
    /// The previous page carried no cursor; nothing was requested.
    Exhausted,
}

/// Page sequence of one cache key, owned by the client.
pub(crate) struct Sequence {
    state: PageState,
    pages: Vec<Value>,
    last_error: Option<TransportError>,
    flight: Option<PageFlight>,
}

struct PageFlight {
    id: u64,
    index: usize,
    cancel: CancellationToken,
    previous: PageState,
    result: SharedFetch<PageOutcome>,
}

impl Sequence {
    fn new() -> Self {
        Self {
            state: PageState::Idle,
            pages: Vec::new(),
            last_error: None,
            flight: None,
        }
    }

    /// Back to the first page. A running fetch is detached, not cancelled.
    pub(crate) fn reset(&mut self) {
        self.state = PageState::Idle;
        self.pages.clear();
        self.last_error = None;
        self.flight = None;
    }

    pub(crate) fn flight_cancel(&self) -> Option<&CancellationToken> {
        self.flight.as_ref().map(|flight| &flight.cancel)
    }
}

/// Handle on a paginated read.
///
/// Handles for the same endpoint and parameters share one sequence, so
/// concurrent next-page requests from any of them coalesce onto a single
/// fetch and pages are never fetched in parallel.
#[derive(Debug, Clone)]
pub struct InfiniteQuery {
    client: QueryClient,
    endpoint: Arc<Endpoint>,
    /// Invocation parameters without the cursor.
    params: Map<String, Value>,
    cursor_param: String,
    cursor_field: String,
    key: CacheKey,
}

impl InfiniteQuery {
    pub(crate) fn new(client: QueryClient, endpoint: &Endpoint, params: &Value) -> Result<Self> {
        let (EndpointRole::InfiniteQuery, Some(cursor_param), Some(cursor_field)) =
            (endpoint.role, &endpoint.cursor_param, &endpoint.cursor_field)
        else {
            return Err(TransportError::InvalidRequest(format!(
                "{} is not an infinite query",
                endpoint.key
            )));
        };
        let mut params = match params {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(TransportError::InvalidRequest(format!(
                    "{}: parameters must be an object, got {other}",
                    endpoint.key
                )));
            }
        };
        params.remove(cursor_param);
        // Surface bad parameters now rather than on the first fetch.
        RequestDescriptor::from_endpoint(endpoint, &Value::Object(params.clone()), None)?;

        let key = CacheKey::for_endpoint(endpoint, &Value::Object(params.clone()));
        client
            .lock()
            .sequences
            .entry(key.clone())
            .or_insert_with(Sequence::new);

        Ok(Self {
            cursor_param: cursor_param.clone(),
            cursor_field: cursor_field.clone(),
            client,
            endpoint: Arc::new(endpoint.clone()),
            params,
            key,
        })
    }

    /// Key the page sequence is stored under; it excludes the cursor.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Fetch the next page, or the first one when nothing was fetched yet.
    ///
    /// Joins the running fetch when one is in flight. Cancelling `cancel`
    /// detaches this caller only.
    pub async fn fetch_next_page(&self, cancel: &CancellationToken) -> Result<PageOutcome> {
        let fetch = {
            let mut state = self.client.lock();
            let sequence = state
                .sequences
                .entry(self.key.clone())
                .or_insert_with(Sequence::new);

            if let Some(flight) = &sequence.flight {
                debug!(key = %self.key, page = flight.index, "Joined in-flight page fetch.");
                flight.result.clone()
            } else {
                let (cursor, fetching) = match &sequence.state {
                    PageState::HasPages { next_cursor: None } => {
                        debug!(key = %self.key, "No more pages.");
                        return Ok(PageOutcome::Exhausted);
                    }
                    PageState::HasPages {
                        next_cursor: Some(cursor),
                    } => (
                        Some(cursor.clone()),
                        PageState::FetchingNextPage {
                            cursor: cursor.clone(),
                        },
                    ),
                    // Fetching states always have a flight.
                    PageState::Idle
                    | PageState::FetchingFirstPage
                    | PageState::FetchingNextPage { .. } => {
                        sequence.pages.clear();
                        (None, PageState::FetchingFirstPage)
                    }
                };
                let request = self.request(cursor.as_deref())?;
                let previous = std::mem::replace(&mut sequence.state, fetching);
                self.start_page(sequence, request, previous)
            }
        };

        detach_on_cancel(fetch, cancel).await
    }

    fn request(&self, cursor: Option<&str>) -> Result<RequestDescriptor> {
        let mut params = self.params.clone();
        if let Some(cursor) = cursor {
            params.insert(self.cursor_param.clone(), Value::String(cursor.to_string()));
        }
        RequestDescriptor::from_endpoint(&self.endpoint, &Value::Object(params), None)
    }

    fn start_page(
        &self,
        sequence: &mut Sequence,
        request: RequestDescriptor,
        previous: PageState,
    ) -> SharedFetch<PageOutcome> {
        let id = self.client.next_flight_id();
        let index = sequence.pages.len();
        let cancel = CancellationToken::new();
        debug!(key = %self.key, page = index, flight = id, "Fetching page.");

        let query = self.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let result = query.client.fetch(request, &task_cancel).await;
            query.complete_page(id, index, result)
        });
        let result = handle.map(flatten_join).boxed().shared();

        sequence.flight = Some(PageFlight {
            id,
            index,
            cancel,
            previous,
            result: result.clone(),
        });
        result
    }

    /// Apply a finished page fetch to the sequence.
    ///
    /// A failure (cancellation included) restores the state the fetch started
    /// from, so the same cursor is requested again next time. A fetch that was
    /// detached by a reset only reports its result.
    fn complete_page(&self, id: u64, index: usize, result: Result<Value>) -> Result<PageOutcome> {
        let mut state = self.client.lock();
        let Some(sequence) = state.sequences.get_mut(&self.key) else {
            return result.map(|data| PageOutcome::Page { index, data });
        };
        let flight = match sequence.flight.take() {
            Some(flight) if flight.id == id => flight,
            other => {
                sequence.flight = other;
                debug!(key = %self.key, flight = id, "Discarding detached page.");
                return result.map(|data| PageOutcome::Page { index, data });
            }
        };

        let page = result.and_then(|data| Ok((next_cursor(&data, &self.cursor_field)?, data)));
        match page {
            Ok((next_cursor, data)) => {
                debug!(
                    key = %self.key,
                    page = index,
                    has_more = next_cursor.is_some(),
                    "Received page."
                );
                sequence.pages.push(data.clone());
                sequence.state = PageState::HasPages { next_cursor };
                sequence.last_error = None;
                Ok(PageOutcome::Page { index, data })
            }
            Err(err) => {
                debug!(key = %self.key, page = index, error = %err, "Page fetch failed.");
                sequence.state = flight.previous;
                if err != TransportError::Cancelled {
                    sequence.last_error = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    /// Abort the page fetch in flight, if any. The sequence keeps its cursor.
    pub fn cancel(&self) -> bool {
        let state = self.client.lock();
        match state
            .sequences
            .get(&self.key)
            .and_then(Sequence::flight_cancel)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop every page; the next fetch starts from the first page.
    pub fn reset(&self) {
        let mut state = self.client.lock();
        if let Some(sequence) = state.sequences.get_mut(&self.key) {
            sequence.reset();
        }
    }

    /// Where the shared sequence stands.
    pub fn state(&self) -> PageState {
        self.client
            .lock()
            .sequences
            .get(&self.key)
            .map_or(PageState::Idle, |sequence| sequence.state.clone())
    }

    /// Pages received so far, in issuance order.
    pub fn pages(&self) -> Vec<Value> {
        self.client
            .lock()
            .sequences
            .get(&self.key)
            .map(|sequence| sequence.pages.clone())
            .unwrap_or_default()
    }

    /// False once the last page arrived.
    pub fn has_next_page(&self) -> bool {
        !matches!(self.state(), PageState::HasPages { next_cursor: None })
    }

    /// Consumer view: the pages, the last failure, or pending.
    pub fn query_state(&self) -> QueryState<Vec<Value>> {
        let state = self.client.lock();
        let Some(sequence) = state.sequences.get(&self.key) else {
            return QueryState::Pending;
        };
        if let Some(err) = &sequence.last_error {
            QueryState::Failed(err.clone())
        } else if sequence.pages.is_empty() {
            QueryState::Pending
        } else {
            QueryState::Succeeded(sequence.pages.clone())
        }
    }
}

/// Cursor for the page after `page`; absent, `null` and `""` all end the sequence.
fn next_cursor(page: &Value, field: &str) -> Result<Option<String>> {
    match page.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(token)) if token.is_empty() => Ok(None),
        Some(Value::String(token)) => Ok(Some(token.clone())),
        Some(other) => Err(TransportError::Decode(format!(
            "cursor field `{field}` must be a string, got {other}"
        ))),
    }
}
