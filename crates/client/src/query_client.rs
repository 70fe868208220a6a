//! Response cache, request coalescing and tag invalidation.
//!
//! Every read goes through a *flight*: the single spawned task fetching a
//! given [`CacheKey`]. Concurrent reads of the same key join the running
//! flight instead of issuing their own request, and only that flight writes
//! the key's cache entry. A successful mutation marks every entry sharing
//! its `{domain, tag}` stale, so the next read fetches again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use nexus_common::{Endpoint, EndpointRole};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache_key::CacheKey;
use crate::error::{Result, TransportError};
use crate::infinite::{InfiniteQuery, Sequence};
use crate::retry::RetryPolicy;
use crate::state::QueryState;
use crate::transport::{RequestDescriptor, Transport};

pub(crate) type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Entry point for reads, paginated reads and mutations.
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    next_flight: AtomicU64,
    state: Mutex<ClientState>,
}

#[derive(Default)]
pub(crate) struct ClientState {
    cache: HashMap<CacheKey, CacheEntry>,
    flights: HashMap<CacheKey, Flight>,
    pub(crate) sequences: HashMap<CacheKey, Sequence>,
}

struct CacheEntry {
    result: Result<Value>,
    stale: bool,
}

struct Flight {
    id: u64,
    cancel: CancellationToken,
    result: SharedFetch<Value>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("QueryClient")
            .field("cached", &state.cache.len())
            .field("in_flight", &state.flights.len())
            .field("sequences", &state.sequences.len())
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    /// Client without retries.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_retry(transport, RetryPolicy::none())
    }

    /// Client whose reads repeat transient failures according to `retry`.
    pub fn with_retry(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                retry,
                next_flight: AtomicU64::new(1),
                state: Mutex::new(ClientState::default()),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn next_flight_id(&self) -> u64 {
        self.inner.next_flight.fetch_add(1, Ordering::Relaxed)
    }

    /// Send `request` under the client's retry policy.
    pub(crate) async fn fetch(
        &self,
        request: RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let transport = &self.inner.transport;
        self.inner
            .retry
            .run(cancel, || transport.send(request.clone(), cancel))
            .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read a query endpoint, served from cache while the entry is fresh.
    ///
    /// Cancelling `cancel` detaches this caller only; the shared fetch keeps
    /// running for everyone else.
    pub async fn query(
        &self,
        endpoint: &Endpoint,
        params: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if endpoint.role != EndpointRole::Query {
            return Err(TransportError::InvalidRequest(format!(
                "{} is {}, not a query",
                endpoint.key,
                role_article(endpoint.role)
            )));
        }
        let key = CacheKey::for_endpoint(endpoint, params);
        let request = RequestDescriptor::from_endpoint(endpoint, params, None)?;

        let fetch = {
            let mut state = self.lock();
            if let Some(CacheEntry {
                result: Ok(value),
                stale: false,
            }) = state.cache.get(&key)
            {
                debug!(%key, "Query served from cache.");
                return Ok(value.clone());
            }
            match state.flights.get(&key) {
                Some(flight) => {
                    debug!(%key, "Joined in-flight query.");
                    flight.result.clone()
                }
                None => self.start_flight(&mut state, key, request),
            }
        };

        detach_on_cancel(fetch, cancel).await
    }

    /// [`query`](Self::query) decoded into `T`.
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        params: &Value,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let value = self.query(endpoint, params, cancel).await?;
        serde_json::from_value(value).map_err(|err| TransportError::Decode(err.to_string()))
    }

    fn start_flight(
        &self,
        state: &mut ClientState,
        key: CacheKey,
        request: RequestDescriptor,
    ) -> SharedFetch<Value> {
        let id = self.next_flight_id();
        let cancel = CancellationToken::new();
        debug!(%key, flight = id, "Starting query.");

        let client = self.clone();
        let task_key = key.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let result = client.fetch(request, &task_cancel).await;
            client.complete(&task_key, id, &result);
            result
        });
        let result = handle.map(flatten_join).boxed().shared();

        state.flights.insert(
            key,
            Flight {
                id,
                cancel,
                result: result.clone(),
            },
        );
        result
    }

    /// Record a finished flight, unless it was cancelled or superseded.
    fn complete(&self, key: &CacheKey, id: u64, result: &Result<Value>) {
        let mut state = self.lock();
        let current = state.flights.get(key).is_some_and(|f| f.id == id);
        if current {
            state.flights.remove(key);
        }
        if !current || matches!(result, Err(TransportError::Cancelled)) {
            debug!(%key, flight = id, "Discarding query result.");
            return;
        }
        state.cache.insert(
            key.clone(),
            CacheEntry {
                result: result.clone(),
                stale: false,
            },
        );
    }

    /// Paginated read of an infinite-query endpoint.
    ///
    /// Handles created for equal parameters share one page sequence.
    pub fn infinite_query(&self, endpoint: &Endpoint, params: &Value) -> Result<InfiniteQuery> {
        InfiniteQuery::new(self.clone(), endpoint, params)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Run a mutation; on success every key sharing its tag is invalidated.
    ///
    /// Mutations are neither cached, coalesced nor retried.
    pub async fn mutate(
        &self,
        endpoint: &Endpoint,
        params: &Value,
        body: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if endpoint.role != EndpointRole::Mutation {
            return Err(TransportError::InvalidRequest(format!(
                "{} is {}, not a mutation",
                endpoint.key,
                role_article(endpoint.role)
            )));
        }
        let request = RequestDescriptor::from_endpoint(endpoint, params, body)?;
        let value = self.inner.transport.send(request, cancel).await?;

        let invalidated = self.invalidate_tag(&endpoint.key.domain, &endpoint.key.tag);
        info!(endpoint = %endpoint.key, invalidated, "Mutation succeeded.");
        Ok(value)
    }

    // =========================================================================
    // Cache control
    // =========================================================================

    /// Mark every key of `{domain, tag}` stale and restart its page sequences.
    ///
    /// Fetches already running keep serving their callers but no longer
    /// write to the cache. Returns the number of keys affected.
    pub fn invalidate_tag(&self, domain: &str, tag: &str) -> usize {
        let mut state = self.lock();
        let mut affected = 0;

        for (_, entry) in state
            .cache
            .iter_mut()
            .filter(|(key, _)| key.has_tag(domain, tag))
        {
            entry.stale = true;
            affected += 1;
        }
        state.flights.retain(|key, _| !key.has_tag(domain, tag));
        for (_, sequence) in state
            .sequences
            .iter_mut()
            .filter(|(key, _)| key.has_tag(domain, tag))
        {
            sequence.reset();
            affected += 1;
        }

        debug!(domain, tag, affected, "Invalidated tag.");
        affected
    }

    /// Abort the in-flight fetches of `{domain, tag}`; they write nothing.
    ///
    /// Returns the number of fetches cancelled.
    pub fn cancel_queries(&self, domain: &str, tag: &str) -> usize {
        let state = self.lock();
        let mut cancelled = 0;
        for token in state
            .flights
            .iter()
            .filter(|(key, _)| key.has_tag(domain, tag))
            .map(|(_, flight)| &flight.cancel)
            .chain(
                state
                    .sequences
                    .iter()
                    .filter(|(key, _)| key.has_tag(domain, tag))
                    .filter_map(|(_, sequence)| sequence.flight_cancel()),
            )
        {
            token.cancel();
            cancelled += 1;
        }
        debug!(domain, tag, cancelled, "Cancelled queries.");
        cancelled
    }

    /// Abort the in-flight fetch of one key, query or page sequence alike.
    ///
    /// Returns whether a fetch was running.
    pub fn cancel_query(&self, key: &CacheKey) -> bool {
        let state = self.lock();
        let token = state
            .flights
            .get(key)
            .map(|flight| &flight.cancel)
            .or_else(|| state.sequences.get(key).and_then(Sequence::flight_cancel));
        match token {
            Some(token) => {
                debug!(%key, "Cancelled query.");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Consumer view of a key.
    ///
    /// Stale data is still reported as succeeded until a refetch replaces it.
    pub fn state(&self, key: &CacheKey) -> QueryState<Value> {
        let state = self.lock();
        match state.cache.get(key) {
            Some(entry) => entry.result.clone().into(),
            None => QueryState::Pending,
        }
    }

    /// Last successful payload of a query key, stale or not.
    pub fn get_query_data(&self, key: &CacheKey) -> Option<Value> {
        let state = self.lock();
        match state.cache.get(key) {
            Some(CacheEntry { result: Ok(value), .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Whether the key was invalidated since its last fetch.
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.lock().cache.get(key).is_some_and(|entry| entry.stale)
    }

    /// Whether a query fetch for the key is running.
    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.lock().flights.contains_key(key)
    }
}

/// Await a shared fetch; a cancelled `cancel` abandons the wait only.
pub(crate) async fn detach_on_cancel<T: Clone>(
    fetch: SharedFetch<T>,
    cancel: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransportError::Cancelled),
        result = fetch => result,
    }
}

pub(crate) fn flatten_join<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.unwrap_or_else(|err| Err(TransportError::Network(format!("fetch task failed: {err}"))))
}

fn role_article(role: EndpointRole) -> &'static str {
    match role {
        EndpointRole::Query => "a query",
        EndpointRole::InfiniteQuery => "an infinite query",
        EndpointRole::Mutation => "a mutation",
    }
}
