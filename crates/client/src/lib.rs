//! Runtime client for the Nexus API.
//!
//! Executes the endpoints described by a generated `endpoints.json` manifest
//! with the same contract the generated React Query hooks follow:
//!
//! - one [`Transport`] carries every request (base URL, default headers,
//!   bearer token, JSON decoding, cancellation);
//! - reads are cached under a deterministic [`CacheKey`] and concurrent
//!   identical reads share one request;
//! - cursor-paginated reads advance through an [`InfiniteQuery`] state
//!   machine;
//! - a successful mutation invalidates every key sharing its tag;
//! - consumers observe [`QueryState`]: pending, failed or succeeded.

pub mod auth;
pub mod cache_key;
pub mod error;
pub mod infinite;
pub mod query_client;
pub mod retry;
pub mod state;
pub mod transport;

pub use auth::{NoAuth, RefreshableToken, StaticToken, TokenSource};
pub use cache_key::CacheKey;
pub use error::{Result, TransportError};
pub use infinite::{InfiniteQuery, PageOutcome, PageState};
pub use query_client::QueryClient;
pub use retry::RetryPolicy;
pub use state::QueryState;
pub use transport::{HttpTransport, RequestDescriptor, Transport, TransportConfig};

// Re-exported so callers need not depend on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
