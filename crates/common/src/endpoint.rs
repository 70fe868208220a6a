//! Endpoint descriptors derived from OpenAPI operations.

use serde::{Deserialize, Serialize};

use crate::{EndpointRole, HttpMethod};

/// Stable identity of a generated endpoint: domain + tag + operation name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointKey {
    /// API domain the operation belongs to.
    pub domain: String,
    /// Normalized tag; the unit of invalidation.
    pub tag: String,
    /// Operation name as used by the generated request function.
    pub operation: String,
}

impl EndpointKey {
    /// Key from its three parts.
    pub fn new(
        domain: impl Into<String>,
        tag: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            tag: tag.into(),
            operation: operation.into(),
        }
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.tag, self.operation)
    }
}

/// Where a parameter travels in the HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// Substituted into the path template.
    Path,
    /// Appended to the query string.
    Query,
    /// Sent as a request header.
    Header,
}

/// A single request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointParam {
    /// Name exactly as declared by the schema.
    pub name: String,
    /// Where the value is sent.
    pub location: ParamLocation,
    /// Whether a call without this parameter is rejected.
    #[serde(default)]
    pub required: bool,
}

/// A generated endpoint: identity, invocation signature and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Identity of the endpoint.
    pub key: EndpointKey,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template, e.g. `/accounts/{accountId}/workspaces`.
    pub path: String,
    /// Role for the data-fetching layer.
    pub role: EndpointRole,
    /// Declared parameters.
    #[serde(default)]
    pub params: Vec<EndpointParam>,
    /// Whether the operation takes a JSON request body.
    #[serde(default)]
    pub has_body: bool,
    /// Request parameter receiving the previous page's cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_param: Option<String>,
    /// Response field carrying the next page's cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_field: Option<String>,
}

impl Endpoint {
    /// Parameters declared at the given location, in declaration order.
    pub fn params_in(&self, location: ParamLocation) -> impl Iterator<Item = &EndpointParam> {
        self.params.iter().filter(move |p| p.location == location)
    }

    /// Declared parameter by name.
    pub fn param(&self, name: &str) -> Option<&EndpointParam> {
        self.params.iter().find(|p| p.name == name)
    }
}
