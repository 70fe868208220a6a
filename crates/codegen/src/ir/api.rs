//! API-level IR for normalized operations.
//!
//! This module defines the intermediate representation for API operations:
//! - OperationIR: Normalized HTTP operations with their endpoint role
//! - ParamsIR: Path, query and header parameters
//! - HookIR: React Query hook representation

use nexus_common::{Endpoint, EndpointKey, EndpointParam, EndpointRole, HttpMethod, ParamLocation};

use super::types::{TsTypeDef, TypeRef};

/// Normalized API domain
#[derive(Debug)]
pub struct ApiIR {
    /// Domain name from the generator configuration (e.g., "workspaces")
    pub domain: String,
    /// Document title, used in file headers
    pub title: Option<String>,
    /// Document version, used in file headers
    pub version: Option<String>,
    /// All operations, ordered by path then method
    pub operations: Vec<OperationIR>,
    /// Component schemas as type definitions, ordered by name
    pub types: Vec<TsTypeDef>,
}

impl ApiIR {
    /// Distinct tags in sorted order.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.operations.iter().map(|op| op.tag.as_str()).collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }

    /// Endpoint descriptors for the runtime manifest.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.operations
            .iter()
            .map(|op| op.to_endpoint(&self.domain))
            .collect()
    }
}

/// Normalized API operation
#[derive(Debug, Clone)]
pub struct OperationIR {
    /// Sanitized TypeScript identifier (e.g., "listWorkspaces")
    pub name: String,
    /// Human-readable identification for diagnostics
    pub label: String,
    /// First tag of the operation, or "default"
    pub tag: String,
    /// HTTP method
    pub method: HttpMethod,
    /// URL path template (e.g., "/workspaces/{workspaceId}")
    pub path: String,
    /// Query, infinite query or mutation
    pub role: EndpointRole,
    /// Summary, or the description when there is none
    pub summary: Option<String>,
    /// Marked `@deprecated` in the generated JSDoc
    pub deprecated: bool,

    /// Normalized parameters (None = no params)
    pub params: Option<ParamsIR>,
    /// Request body (None = no body)
    pub body: Option<BodyIR>,
    /// Success response
    pub response: ResponseIR,
    /// `path` split into literal text and parameters
    pub url: Vec<UrlPart>,
    /// Cursor wiring for infinite queries
    pub cursor: Option<CursorIR>,

    /// Hooks to emit (empty for the bare fetch client)
    pub hooks: Vec<HookIR>,
}

impl OperationIR {
    /// Name of the query-key helper (e.g., "getListWorkspacesQueryKey")
    pub fn query_key_fn(&self) -> Option<String> {
        self.role
            .is_cached()
            .then(|| format!("get{}QueryKey", super::utils::capitalize_first(&self.name)))
    }

    /// Whether callers must pass a params object
    pub fn has_required_params(&self) -> bool {
        self.params
            .as_ref()
            .is_some_and(|p| p.fields.iter().any(|f| f.required))
    }

    /// Runtime descriptor of the operation
    pub fn to_endpoint(&self, domain: &str) -> Endpoint {
        Endpoint {
            key: EndpointKey::new(domain, self.tag.clone(), self.name.clone()),
            method: self.method,
            path: self.path.clone(),
            role: self.role,
            params: self
                .params
                .as_ref()
                .map(|p| {
                    p.fields
                        .iter()
                        .map(|f| EndpointParam {
                            name: f.name.clone(),
                            location: f.location,
                            required: f.required,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            has_body: self.body.is_some(),
            cursor_param: self.cursor.as_ref().map(|c| c.param.clone()),
            cursor_field: self.cursor.as_ref().map(|c| c.field.clone()),
        }
    }
}

/// Single parameter definition
#[derive(Debug, Clone)]
pub struct ParamIR {
    /// Name exactly as declared (used as property key and on the wire)
    pub name: String,
    /// Value type
    pub ty: TypeRef,
    /// Path parameters are always required
    pub required: bool,
    /// Where the value is sent
    pub location: ParamLocation,
}

/// Parameters interface definition
#[derive(Debug, Clone)]
pub struct ParamsIR {
    /// Type name (e.g., "ListWorkspacesParams")
    pub type_name: String,
    /// Every parameter, in declaration order
    pub fields: Vec<ParamIR>,
}

impl ParamsIR {
    /// Parameters sent at `location`
    pub fn in_location(&self, location: ParamLocation) -> impl Iterator<Item = &ParamIR> {
        self.fields.iter().filter(move |f| f.location == location)
    }
}

/// URL template part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPart {
    /// Literal text
    Static(String),
    /// Interpolated path parameter (declared name)
    Param(String),
}

/// Request body content type determines the Content-Type header and arg type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyContentType {
    /// `application/json`
    Json,
    /// `multipart/form-data`
    FormData,
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
}

impl BodyContentType {
    /// MIME type sent as `Content-Type`
    pub fn mime(self) -> &'static str {
        match self {
            BodyContentType::Json => "application/json",
            BodyContentType::FormData => "multipart/form-data",
            BodyContentType::UrlEncoded => "application/x-www-form-urlencoded",
        }
    }
}

/// Request body IR
#[derive(Debug, Clone)]
pub struct BodyIR {
    /// Body type
    pub ty: TypeRef,
    /// Chosen media type
    pub content_type: BodyContentType,
    /// Whether the `data` argument is required
    pub required: bool,
}

/// Success response
#[derive(Debug, Clone)]
pub struct ResponseIR {
    /// Decoded type; `void` when the response has no content
    pub ty: TypeRef,
}

/// Pagination cursor wiring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorIR {
    /// Request parameter receiving the cursor
    pub param: String,
    /// Response field carrying the next cursor
    pub field: String,
}

/// Hook kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// `useQuery`
    Query,
    /// `useInfiniteQuery`
    InfiniteQuery,
    /// `useMutation`
    Mutation,
}

/// React Query hook IR
#[derive(Debug, Clone)]
pub struct HookIR {
    /// Hook name (e.g., "useListWorkspacesInfinite")
    pub name: String,
    /// React Query primitive the hook wraps
    pub kind: HookKind,
    /// Whether the hook accepts a pass-through options bag
    pub with_options: bool,
}
