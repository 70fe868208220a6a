//! Error types for client generation.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a generation run.
///
/// Operation-level variants carry a label of the form
/// `GET /accounts/{accountId}/workspaces (listWorkspaces)` so the offending
/// operation can be found in the OpenAPI document.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A file or directory could not be read or written.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is unreadable or inconsistent.
    #[error("invalid configuration {path}: {message}")]
    Config {
        /// Configuration file.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// The OpenAPI document is not valid JSON or YAML of the expected shape.
    #[error("failed to parse OpenAPI document {source_name}: {message}")]
    Parse {
        /// File name, or `<json>`/`<yaml>` for in-memory input.
        source_name: String,
        /// Parser message.
        message: String,
    },

    /// A `$ref` does not name a component schema.
    #[error("{operation}: unresolvable reference `{reference}`")]
    UnresolvedRef {
        /// Operation label.
        operation: String,
        /// The reference as written.
        reference: String,
    },

    /// The operation declares no 2xx response.
    #[error("{operation}: no success response declared")]
    MissingResponse {
        /// Operation label.
        operation: String,
    },

    /// A success response has content but no schema.
    #[error("{operation}: response {status} declares content without a schema")]
    MissingResponseSchema {
        /// Operation label.
        operation: String,
        /// Status code of the response.
        status: String,
    },

    /// Two operations resolve to the same function name.
    #[error("{operation}: duplicate operation name `{name}`")]
    DuplicateOperation {
        /// Label of the second operation.
        operation: String,
        /// The clashing name.
        name: String,
    },

    /// A parameter is declared twice at the same level.
    #[error("{operation}: duplicate parameter `{name}` in {scope} parameters")]
    DuplicateParam {
        /// Operation label.
        operation: String,
        /// Parameter name.
        name: String,
        /// `path-level` or `operation-level`.
        scope: &'static str,
    },

    /// A page-token parameter differs from the configured cursor parameter.
    #[error(
        "{operation}: pagination parameter `{found}` does not match the configured cursor parameter `{expected}`"
    )]
    CursorMismatch {
        /// Operation label.
        operation: String,
        /// Configured cursor parameter.
        expected: String,
        /// Parameter found on the operation.
        found: String,
    },

    /// A paginated read's response schema lacks the cursor field.
    #[error("{operation}: success response has no `{field}` field to read the next cursor from")]
    MissingCursorField {
        /// Operation label.
        operation: String,
        /// Expected response field.
        field: String,
    },

    /// The requested domain is not configured.
    #[error("unknown domain `{0}`")]
    UnknownDomain(String),

    /// The endpoint manifest could not be rendered.
    #[error("failed to serialize endpoint manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Any of the above, raised while generating a domain.
    #[error("domain `{domain}`: {source}")]
    Domain {
        /// Domain name.
        domain: String,
        /// The failure.
        #[source]
        source: Box<GenerationError>,
    },
}

impl GenerationError {
    /// Attach the domain name to an error raised while generating it.
    pub fn in_domain(self, domain: &str) -> Self {
        match self {
            already @ GenerationError::Domain { .. } => already,
            other => GenerationError::Domain {
                domain: domain.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenerationError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for generation.
pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_label_in_message() {
        let err = GenerationError::MissingResponse {
            operation: "GET /workspaces (listWorkspaces)".into(),
        };
        assert_eq!(
            err.to_string(),
            "GET /workspaces (listWorkspaces): no success response declared"
        );
    }

    #[test]
    fn test_in_domain_wraps_once() {
        let err = GenerationError::UnknownDomain("x".into())
            .in_domain("tasks")
            .in_domain("other");
        assert_eq!(err.to_string(), "domain `tasks`: unknown domain `x`");
    }
}
