//! Shared endpoint descriptors for the Nexus API toolkit
//!
//! This crate contains the types exchanged between the `nexus-codegen`
//! generator (which derives them from OpenAPI operations and writes them to
//! an `endpoints.json` manifest) and the `nexus-client` runtime (which
//! executes them against the live API).

pub mod endpoint;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use endpoint::{Endpoint, EndpointKey, EndpointParam, ParamLocation};

/// Default name of the cursor parameter used by paginated reads.
pub const DEFAULT_CURSOR_PARAM: &str = "nextPageToken";

/// Manifest filename written next to the generated modules of a domain.
pub const MANIFEST_FILENAME: &str = "endpoints.json";

/// HTTP method of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Uppercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether the method only reads.
    pub fn is_read(self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a generated endpoint plays for the data-fetching layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointRole {
    /// Cacheable read.
    Query,
    /// Cacheable read paginated by an opaque cursor.
    InfiniteQuery,
    /// Write; never cached, invalidates its tag on success.
    Mutation,
}

impl EndpointRole {
    /// Classify an operation.
    ///
    /// GETs carrying a page-token parameter are infinite queries (unless
    /// infinite hooks are disabled), other GETs are queries, everything else
    /// is a mutation.
    pub fn classify(method: HttpMethod, has_page_token: bool, infinite_enabled: bool) -> Self {
        if !method.is_read() {
            EndpointRole::Mutation
        } else if has_page_token && infinite_enabled {
            EndpointRole::InfiniteQuery
        } else {
            EndpointRole::Query
        }
    }

    /// Whether results of this role live in the response cache.
    pub fn is_cached(self) -> bool {
        !matches!(self, EndpointRole::Mutation)
    }

    /// Name used in the manifest and in CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointRole::Query => "query",
            EndpointRole::InfiniteQuery => "infinite-query",
            EndpointRole::Mutation => "mutation",
        }
    }
}

impl std::fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a parameter name looks like a pagination cursor.
///
/// Case, `_` and `-` are ignored, so `next_page_token`, `pageToken` and
/// `cursor` all match.
pub fn is_page_token_name(name: &str) -> bool {
    let folded: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    matches!(
        folded.as_str(),
        "nextpagetoken" | "pagetoken" | "nexttoken" | "cursor" | "pagecursor" | "continuationtoken"
    )
}

/// All endpoints generated for one API domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointManifest {
    /// Domain name as configured, e.g. `workspaces`.
    pub domain: String,
    /// Every endpoint of the domain.
    pub endpoints: Vec<Endpoint>,
}

impl EndpointManifest {
    /// Parse a manifest previously written by the generator.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Render the manifest as pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Look up an endpoint by operation name.
    pub fn get(&self, operation: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.key.operation == operation)
    }
}
