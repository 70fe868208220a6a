//! OpenAPI document structs for serde deserialization.
//!
//! Only the subset of OpenAPI 3.x needed to derive typed endpoints is modelled.
//! Maps are ordered so that everything derived from a document is
//! deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GenerationError, Result};

/// Root OpenAPI document.
#[derive(Debug, Deserialize)]
pub struct OpenApiSpec {
    /// Document metadata.
    #[serde(default)]
    pub info: Info,
    /// Operations keyed by path template.
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    /// Reusable definitions.
    pub components: Option<Components>,
}

/// `info` section.
#[derive(Debug, Default, Deserialize)]
pub struct Info {
    /// API title, copied into generated file headers.
    pub title: Option<String>,
    /// API version.
    pub version: Option<String>,
}

/// Components section containing reusable schemas.
#[derive(Debug, Deserialize)]
pub struct Components {
    /// Named schemas, referenced as `#/components/schemas/<name>`.
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
}

/// Operations available on one path.
#[derive(Debug, Deserialize)]
pub struct PathItem {
    /// `GET` operation.
    pub get: Option<Operation>,
    /// `POST` operation.
    pub post: Option<Operation>,
    /// `PUT` operation.
    pub put: Option<Operation>,
    /// `PATCH` operation.
    pub patch: Option<Operation>,
    /// `DELETE` operation.
    pub delete: Option<Operation>,
    /// Path-level parameters shared by all operations.
    pub parameters: Option<Vec<Parameter>>,
}

/// An API operation (endpoint).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Source of the generated function name.
    pub operation_id: Option<String>,
    /// One-line summary.
    pub summary: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Deprecated operations are marked in the generated JSDoc.
    #[serde(default)]
    pub deprecated: bool,
    /// The first tag groups the operation.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Operation-level parameters.
    pub parameters: Option<Vec<Parameter>>,
    /// Request body, when the operation takes one.
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code.
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,
}

/// A parameter (query, path, header or cookie).
#[derive(Debug, Deserialize)]
pub struct Parameter {
    /// Name as sent on the wire.
    pub name: String,
    /// `path`, `query`, `header` or `cookie`.
    #[serde(rename = "in")]
    pub location: String,
    /// Path parameters are required regardless of this flag.
    #[serde(default)]
    pub required: bool,
    /// Value schema.
    pub schema: Option<Schema>,
}

/// Request body of an operation.
#[derive(Debug, Deserialize)]
pub struct RequestBody {
    /// Whether the body may be omitted.
    #[serde(default)]
    pub required: bool,
    /// Body schemas keyed by media type.
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// One response of an operation.
#[derive(Debug, Deserialize)]
pub struct Response {
    /// Human-readable description.
    pub description: Option<String>,
    /// Response schemas keyed by media type.
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// Media type content (e.g., application/json).
#[derive(Debug, Deserialize)]
pub struct MediaType {
    /// Payload schema.
    pub schema: Option<Schema>,
}

/// JSON Schema as used by OpenAPI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// `type`
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaType>,

    /// `$ref`
    #[serde(rename = "$ref")]
    pub ref_path: Option<String>,

    /// Object properties.
    pub properties: Option<BTreeMap<String, Schema>>,

    /// Required property names.
    pub required: Option<Vec<String>>,

    /// Array item schema.
    pub items: Option<Box<Schema>>,

    /// `enum`
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<EnumValue>>,

    /// `anyOf`
    pub any_of: Option<Vec<Schema>>,

    /// `oneOf`
    pub one_of: Option<Vec<Schema>>,

    /// `allOf`
    pub all_of: Option<Vec<Schema>>,

    /// Value schema of a map-like object.
    pub additional_properties: Option<AdditionalProperties>,

    /// `format`, e.g. `date-time`.
    pub format: Option<String>,

    /// Copied into the generated JSDoc.
    pub description: Option<String>,

    /// `const`
    #[serde(rename = "const")]
    pub const_value: Option<serde_json::Value>,

    /// OpenAPI 3.0 nullable flag (3.1 uses type arrays instead).
    pub nullable: Option<bool>,
}

/// Enum value can be string, integer, float, boolean, or null.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    /// String member.
    String(String),
    /// Integer member.
    Integer(i64),
    /// Non-integer number member.
    Float(f64),
    /// Boolean member.
    Bool(bool),
    /// `null` member.
    Null,
}

/// `type` is a single name or, in 3.1, a list (for nullable types).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    /// `type: string`
    Single(String),
    /// `type: [string, "null"]`
    Multiple(Vec<String>),
}

/// Additional properties can be a boolean or a schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    /// `true` allows any value; `false` none.
    Bool(bool),
    /// Schema of every value.
    Schema(Box<Schema>),
}

/// Prefix of references this generator can resolve.
pub const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";

impl OpenApiSpec {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| GenerationError::Parse {
            source_name: "<json>".to_string(),
            message: err.to_string(),
        })
    }

    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|err| GenerationError::Parse {
            source_name: "<yaml>".to_string(),
            message: err.to_string(),
        })
    }

    /// Read a document from disk, choosing the format by extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| GenerationError::io(path, err))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        };
        parsed.map_err(|err| match err {
            GenerationError::Parse { message, .. } => GenerationError::Parse {
                source_name: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Component schemas, empty when the document declares none.
    pub fn schemas(&self) -> Option<&BTreeMap<String, Schema>> {
        self.components.as_ref().map(|c| &c.schemas)
    }

    /// Look up a component schema by `$ref`.
    pub fn resolve_ref(&self, ref_path: &str) -> Option<&Schema> {
        let name = ref_path.strip_prefix(COMPONENT_SCHEMA_PREFIX)?;
        self.schemas()?.get(name)
    }
}

impl Schema {
    /// Whether the schema declares `name` as a property, following `$ref`s
    /// and `allOf` members.
    pub fn has_property(&self, spec: &OpenApiSpec, name: &str) -> bool {
        self.has_property_depth(spec, name, 0)
    }

    fn has_property_depth(&self, spec: &OpenApiSpec, name: &str, depth: usize) -> bool {
        // Guards self-referencing component graphs.
        if depth > 16 {
            return false;
        }
        if let Some(ref_path) = &self.ref_path {
            return spec
                .resolve_ref(ref_path)
                .is_some_and(|s| s.has_property_depth(spec, name, depth + 1));
        }
        if self
            .properties
            .as_ref()
            .is_some_and(|props| props.contains_key(name))
        {
            return true;
        }
        self.all_of.as_ref().is_some_and(|members| {
            members
                .iter()
                .any(|m| m.has_property_depth(spec, name, depth + 1))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PAGE_YAML: &str = r##"
openapi: 3.0.3
info:
  title: Workspaces
  version: "1.0"
paths: {}
components:
  schemas:
    Page:
      type: object
      properties:
        nextPageToken:
          type: string
          nullable: true
    WorkspacePage:
      allOf:
        - $ref: "#/components/schemas/Page"
        - type: object
          properties:
            workspaces:
              type: array
              items:
                type: string
"##;

    #[test]
    fn test_yaml_document_parses() {
        let spec = OpenApiSpec::from_yaml(PAGE_YAML).unwrap();
        assert_eq!(spec.info.title.as_deref(), Some("Workspaces"));
        assert_eq!(spec.schemas().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_has_property_follows_refs_and_all_of() {
        let spec = OpenApiSpec::from_yaml(PAGE_YAML).unwrap();
        let page = Schema {
            ref_path: Some("#/components/schemas/WorkspacePage".into()),
            ..Schema::default()
        };
        assert!(page.has_property(&spec, "nextPageToken"));
        assert!(page.has_property(&spec, "workspaces"));
        assert!(!page.has_property(&spec, "cursor"));
    }

    #[test]
    fn test_resolve_ref_rejects_foreign_prefix() {
        let spec = OpenApiSpec::from_yaml(PAGE_YAML).unwrap();
        assert!(spec.resolve_ref("#/components/schemas/Page").is_some());
        assert!(spec.resolve_ref("#/components/responses/Page").is_none());
        assert!(spec.resolve_ref("other.yaml#/Page").is_none());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = OpenApiSpec::from_json("{ not json").unwrap_err();
        assert!(matches!(err, GenerationError::Parse { .. }));
    }
}
