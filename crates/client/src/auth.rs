//! Bearer credential sources injected into the transport.
//!
//! The transport never owns auth state itself: it asks its [`TokenSource`]
//! before every request and, after a 401, asks it to refresh the rejected
//! token.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

/// Pluggable provider of the `Authorization: Bearer` credential.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// Token for the next request; `None` sends the request anonymously.
    async fn token(&self) -> Result<Option<String>>;

    /// Replace a token the server rejected.
    ///
    /// `stale` is the token the failed request carried. Returns the token to
    /// retry with, or `None` when the source cannot refresh.
    async fn refresh(&self, stale: Option<&str>) -> Result<Option<String>> {
        let _ = stale;
        Ok(None)
    }
}

/// Anonymous requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Bearer token obtained elsewhere; never refreshed.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Source that always answers `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

type RefreshFn = Box<dyn Fn() -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Session token renewed through a caller-supplied refresh call.
///
/// Refreshes are serialised: a refresh only runs when the stored token is
/// still the one the server rejected, so a burst of concurrent 401s costs a
/// single refresh and every caller retries with the same new token.
pub struct RefreshableToken {
    current: Mutex<Option<String>>,
    refresh: RefreshFn,
}

impl RefreshableToken {
    /// Source starting from `initial` and renewed by calling `refresh`.
    pub fn new<F, Fut>(initial: Option<String>, refresh: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            current: Mutex::new(initial),
            refresh: Box::new(move || refresh().boxed()),
        }
    }
}

impl fmt::Debug for RefreshableToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for RefreshableToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(self.current.lock().await.clone())
    }

    async fn refresh(&self, stale: Option<&str>) -> Result<Option<String>> {
        let mut current = self.current.lock().await;
        if current.as_deref() != stale {
            debug!("Token already refreshed by a concurrent request.");
            return Ok(current.clone());
        }
        let fresh = (self.refresh)().await?;
        debug!("Refreshed bearer token.");
        *current = Some(fresh.clone());
        Ok(Some(fresh))
    }
}
