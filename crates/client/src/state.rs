//! Three-state results handed to consumers.

use crate::error::TransportError;

/// What a consumer sees for a read: still loading, failed, or data.
///
/// A failure is never reported as pending or as an empty success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
    /// Nothing fetched yet.
    Pending,
    /// The last fetch failed.
    Failed(TransportError),
    /// Data from the last successful fetch.
    Succeeded(T),
}

impl<T> QueryState<T> {
    /// Whether nothing has been fetched yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, QueryState::Pending)
    }

    /// Data, when the read succeeded.
    pub fn data(&self) -> Option<&T> {
        match self {
            QueryState::Succeeded(data) => Some(data),
            _ => None,
        }
    }

    /// Failure, when the read failed.
    pub fn error(&self) -> Option<&TransportError> {
        match self {
            QueryState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Transform the data of a succeeded state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        match self {
            QueryState::Pending => QueryState::Pending,
            QueryState::Failed(err) => QueryState::Failed(err),
            QueryState::Succeeded(data) => QueryState::Succeeded(f(data)),
        }
    }
}

impl<T> From<Result<T, TransportError>> for QueryState<T> {
    fn from(result: Result<T, TransportError>) -> Self {
        match result {
            Ok(data) => QueryState::Succeeded(data),
            Err(err) => QueryState::Failed(err),
        }
    }
}
