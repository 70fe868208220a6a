//! Normalization from OpenAPI spec to API IR.
//!
//! This module handles all the OpenAPI-specific logic:
//! - Schema to TypeScript type conversion, with `$ref` resolution checks
//! - Parameter merging and deduplication
//! - Response selection
//! - Endpoint role classification and cursor validation

use std::collections::{BTreeMap, BTreeSet, HashSet};

use nexus_common::{EndpointRole, HttpMethod, ParamLocation, is_page_token_name};
use tracing::debug;

use crate::config::{ClientKind, QueryOverride};
use crate::error::{GenerationError, Result};
use crate::spec::{
    AdditionalProperties, COMPONENT_SCHEMA_PREFIX, EnumValue, OpenApiSpec, Operation, Parameter,
    Schema, SchemaType,
};

use super::api::{
    ApiIR, BodyContentType, BodyIR, CursorIR, HookIR, HookKind, OperationIR, ParamIR, ParamsIR,
    ResponseIR, UrlPart,
};
use super::types::{TsLiteral, TsPrimitive, TsProp, TsType, TsTypeDef, TypeDefKind, TypeRef};
use super::utils::{
    capitalize_first, enum_value_to_key, enum_value_to_literal, make_string_record,
    make_unknown_record, sanitize_ts_identifier, to_snake_case,
};

/// Default tag for operations that declare none.
pub const DEFAULT_TAG: &str = "default";

/// Success statuses in order of preference.
const SUCCESS_STATUSES: [&str; 9] = [
    "200", "201", "202", "203", "206", "207", "2XX", "2xx", "default",
];

/// Settings that influence normalization.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions<'a> {
    /// Domain name, the first element of every query key.
    pub domain: &'a str,
    /// Emission style; `fetch` gets no hooks.
    pub client: ClientKind,
    /// Hook and cursor settings.
    pub query: &'a QueryOverride,
}

/// A `$ref` that does not point at a declared component schema.
#[derive(Debug)]
struct BadRef(String);

/// Normalize an OpenAPI document into API IR.
///
/// Any malformed operation fails the whole document.
pub fn normalize_spec(spec: &OpenApiSpec, options: &NormalizeOptions<'_>) -> Result<ApiIR> {
    let normalizer = Normalizer { spec, options };

    let mut operations = Vec::new();
    let mut names = HashSet::new();

    for (path, item) in &spec.paths {
        let path_params = item.parameters.as_deref();
        for (method, op) in [
            (HttpMethod::Get, item.get.as_ref()),
            (HttpMethod::Post, item.post.as_ref()),
            (HttpMethod::Put, item.put.as_ref()),
            (HttpMethod::Patch, item.patch.as_ref()),
            (HttpMethod::Delete, item.delete.as_ref()),
        ] {
            let Some(op) = op else {
                continue;
            };
            let op_ir = normalizer.operation(path, method, op, path_params)?;
            if !names.insert(op_ir.name.clone()) {
                return Err(GenerationError::DuplicateOperation {
                    operation: op_ir.label,
                    name: op_ir.name,
                });
            }
            debug!(
                domain = options.domain,
                operation = %op_ir.name,
                role = %op_ir.role,
                tag = %op_ir.tag,
                "Normalized operation."
            );
            operations.push(op_ir);
        }
    }

    let types = match spec.schemas() {
        Some(schemas) => normalizer.schemas(schemas)?,
        None => Vec::new(),
    };

    Ok(ApiIR {
        domain: options.domain.to_string(),
        title: spec.info.title.clone(),
        version: spec.info.version.clone(),
        operations,
        types,
    })
}

struct Normalizer<'a> {
    spec: &'a OpenApiSpec,
    options: &'a NormalizeOptions<'a>,
}

impl Normalizer<'_> {
    // =========================================================================
    // Component schemas
    // =========================================================================

    fn schemas(&self, schemas: &BTreeMap<String, Schema>) -> Result<Vec<TsTypeDef>> {
        schemas
            .iter()
            .map(|(name, schema)| {
                self.typedef(name, schema)
                    .map_err(|BadRef(reference)| GenerationError::UnresolvedRef {
                        operation: format!("components.schemas.{name}"),
                        reference,
                    })
            })
            .collect()
    }

    fn typedef(&self, name: &str, schema: &Schema) -> std::result::Result<TsTypeDef, BadRef> {
        let doc = schema.description.clone();

        if let Some(enum_values) = &schema.enum_values {
            return Ok(TsTypeDef {
                name: name.to_string(),
                doc,
                kind: TypeDefKind::ConstEnum {
                    values: enum_values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (enum_value_to_key(v, i), enum_value_to_literal(v)))
                        .collect(),
                },
            });
        }

        if let Some(properties) = &schema.properties
            && schema.additional_properties.is_none()
            && schema.all_of.is_none()
            && schema.nullable != Some(true)
        {
            return Ok(TsTypeDef {
                name: name.to_string(),
                doc,
                kind: TypeDefKind::Interface {
                    properties: self.properties(properties, schema.required.as_ref())?,
                },
            });
        }

        Ok(TsTypeDef {
            name: name.to_string(),
            doc,
            kind: TypeDefKind::TypeAlias {
                ty: self.ts_type(schema)?,
            },
        })
    }

    fn properties(
        &self,
        properties: &BTreeMap<String, Schema>,
        required: Option<&Vec<String>>,
    ) -> std::result::Result<Vec<TsProp>, BadRef> {
        let required: BTreeSet<&String> = required.map(|r| r.iter().collect()).unwrap_or_default();
        properties
            .iter()
            .map(|(name, schema)| {
                Ok(TsProp {
                    name: name.clone(),
                    ty: self.ts_type(schema)?,
                    optional: !required.contains(name),
                })
            })
            .collect()
    }

    // =========================================================================
    // Schema -> TsType
    // =========================================================================

    fn ts_type(&self, schema: &Schema) -> std::result::Result<TsType, BadRef> {
        let ty = self.ts_type_inner(schema)?;
        if schema.nullable == Some(true) && schema.ref_path.is_none() {
            return Ok(with_null(ty));
        }
        Ok(ty)
    }

    fn ts_type_inner(&self, schema: &Schema) -> std::result::Result<TsType, BadRef> {
        if let Some(ref_path) = &schema.ref_path {
            return self.resolve_ref_name(ref_path).map(TsType::Ref);
        }

        if let Some(const_value) = &schema.const_value {
            return Ok(json_value_to_ts_type(const_value));
        }

        if let Some(all_of) = &schema.all_of {
            let mut types = all_of
                .iter()
                .map(|s| self.ts_type(s))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(match types.len() {
                0 => TsType::unknown(),
                1 => types.remove(0),
                _ => TsType::Intersection(types),
            });
        }

        if let Some(variants) = schema.any_of.as_ref().or(schema.one_of.as_ref()) {
            let types = variants
                .iter()
                .map(|s| self.ts_type(s))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(TsType::Union(types));
        }

        match &schema.schema_type {
            Some(SchemaType::Single(t)) => self.named_type(t, schema),
            Some(SchemaType::Multiple(types)) => {
                let mut ts_types = types
                    .iter()
                    .filter(|t| *t != "null")
                    .map(|t| self.named_type(t, schema))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let nullable = types.iter().any(|t| t == "null");
                let base = if ts_types.len() == 1 {
                    ts_types.remove(0)
                } else {
                    TsType::Union(ts_types)
                };
                Ok(if nullable { with_null(base) } else { base })
            }
            None if schema.properties.is_some() => self.object_type(schema),
            None if schema.additional_properties.is_some() => self.additional_properties(schema),
            None => Ok(TsType::unknown()),
        }
    }

    fn named_type(&self, name: &str, schema: &Schema) -> std::result::Result<TsType, BadRef> {
        match name {
            "string" => Ok(match &schema.enum_values {
                Some(values) => enum_to_union_type(values),
                None if schema.format.as_deref() == Some("binary") => TsType::Ref("Blob".into()),
                None => TsType::string(),
            }),
            "number" | "integer" => Ok(match &schema.enum_values {
                Some(values) => enum_to_union_type(values),
                None => TsType::Primitive(TsPrimitive::Number),
            }),
            "boolean" => Ok(TsType::Primitive(TsPrimitive::Boolean)),
            "null" => Ok(TsType::Primitive(TsPrimitive::Null)),
            "array" => {
                let item = match &schema.items {
                    Some(items) => self.ts_type(items)?,
                    None => TsType::unknown(),
                };
                Ok(TsType::Array(Box::new(item)))
            }
            "object" => self.object_type(schema),
            _ => Ok(TsType::unknown()),
        }
    }

    fn object_type(&self, schema: &Schema) -> std::result::Result<TsType, BadRef> {
        match (&schema.properties, &schema.additional_properties) {
            (Some(properties), Some(_)) => Ok(TsType::Intersection(vec![
                TsType::Object(self.properties(properties, schema.required.as_ref())?),
                self.additional_properties(schema)?,
            ])),
            (Some(properties), None) => Ok(TsType::Object(
                self.properties(properties, schema.required.as_ref())?,
            )),
            (None, Some(_)) => self.additional_properties(schema),
            (None, None) => Ok(make_unknown_record()),
        }
    }

    fn additional_properties(&self, schema: &Schema) -> std::result::Result<TsType, BadRef> {
        match &schema.additional_properties {
            Some(AdditionalProperties::Bool(true)) | None => Ok(make_unknown_record()),
            Some(AdditionalProperties::Bool(false)) => Ok(TsType::Object(Vec::new())),
            Some(AdditionalProperties::Schema(s)) => Ok(make_string_record(self.ts_type(s)?)),
        }
    }

    fn resolve_ref_name(&self, ref_path: &str) -> std::result::Result<String, BadRef> {
        match ref_path.strip_prefix(COMPONENT_SCHEMA_PREFIX) {
            Some(name) if self.spec.resolve_ref(ref_path).is_some() => Ok(name.to_string()),
            _ => Err(BadRef(ref_path.to_string())),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn operation(
        &self,
        path: &str,
        method: HttpMethod,
        op: &Operation,
        path_params: Option<&[Parameter]>,
    ) -> Result<OperationIR> {
        let name = operation_name(path, method, op);
        let label = format!(
            "{method} {path} ({})",
            op.operation_id.as_deref().unwrap_or(&name)
        );
        let bad_ref = |BadRef(reference): BadRef| GenerationError::UnresolvedRef {
            operation: label.clone(),
            reference,
        };

        let tag = op
            .tags
            .first()
            .map_or_else(|| DEFAULT_TAG.to_string(), Clone::clone);

        let mut params = self.params(&name, &label, op, path_params)?;
        let url = build_url(path, &name, &mut params);
        let body = self.body(op).map_err(bad_ref)?;
        let (response, response_schema) = self.response(op, &label)?;

        let query = self.options.query;
        let has_page_token = params.as_ref().is_some_and(|p| {
            p.in_location(ParamLocation::Query)
                .any(|f| f.name == query.use_infinite_query_param || is_page_token_name(&f.name))
        });
        let role = EndpointRole::classify(method, has_page_token, query.use_infinite);

        let cursor = if role == EndpointRole::InfiniteQuery {
            Some(self.cursor(&label, params.as_ref(), response_schema)?)
        } else {
            None
        };

        let hooks = build_hooks(&name, role, self.options.client, query);

        Ok(OperationIR {
            name,
            label,
            tag,
            method,
            path: path.to_string(),
            role,
            summary: op.summary.clone().or_else(|| op.description.clone()),
            deprecated: op.deprecated,
            params,
            body,
            response,
            url,
            cursor,
            hooks,
        })
    }

    /// Path-level params first, operation-level params override by name.
    /// Cookie params are skipped.
    fn params(
        &self,
        op_name: &str,
        label: &str,
        op: &Operation,
        path_params: Option<&[Parameter]>,
    ) -> Result<Option<ParamsIR>> {
        let mut fields: Vec<ParamIR> = Vec::new();

        if let Some(pp) = path_params {
            check_duplicate_params(pp, label, "path-level")?;
            for p in pp.iter().filter(|p| p.location != "cookie") {
                fields.push(self.param(p, label)?);
            }
        }

        if let Some(op_params) = &op.parameters {
            check_duplicate_params(op_params, label, "operation-level")?;
            for p in op_params.iter().filter(|p| p.location != "cookie") {
                fields.retain(|f| f.name != p.name);
                fields.push(self.param(p, label)?);
            }
        }

        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(ParamsIR {
            type_name: format!("{}Params", capitalize_first(op_name)),
            fields,
        }))
    }

    fn param(&self, p: &Parameter, label: &str) -> Result<ParamIR> {
        let ty = match &p.schema {
            Some(schema) => {
                self.ts_type(schema)
                    .map_err(|BadRef(reference)| GenerationError::UnresolvedRef {
                        operation: label.to_string(),
                        reference,
                    })?
            }
            None => TsType::string(),
        };
        let location = match p.location.as_str() {
            "path" => ParamLocation::Path,
            "header" => ParamLocation::Header,
            _ => ParamLocation::Query,
        };
        Ok(ParamIR {
            name: p.name.clone(),
            ty: TypeRef::inline(ty),
            // Path params are always required, whatever the document says.
            required: p.required || location == ParamLocation::Path,
            location,
        })
    }

    fn body(&self, op: &Operation) -> std::result::Result<Option<BodyIR>, BadRef> {
        let Some(body) = &op.request_body else {
            return Ok(None);
        };
        let Some(content) = &body.content else {
            return Ok(None);
        };

        for (media_type, content_type) in [
            ("application/json", BodyContentType::Json),
            ("application/x-www-form-urlencoded", BodyContentType::UrlEncoded),
            ("multipart/form-data", BodyContentType::FormData),
        ] {
            if let Some(schema) = content.get(media_type).and_then(|m| m.schema.as_ref()) {
                let ty = match content_type {
                    BodyContentType::FormData => TsType::Ref("FormData".into()),
                    BodyContentType::Json | BodyContentType::UrlEncoded => self.ts_type(schema)?,
                };
                return Ok(Some(BodyIR {
                    ty: TypeRef::inline(ty),
                    content_type,
                    required: body.required,
                }));
            }
        }
        Ok(None)
    }

    /// Pick the success response. Returns the response type and the raw
    /// schema it was derived from (None for void responses).
    fn response<'s>(
        &self,
        op: &'s Operation,
        label: &str,
    ) -> Result<(ResponseIR, Option<&'s Schema>)> {
        for status in SUCCESS_STATUSES {
            let Some(response) = op.responses.get(status) else {
                continue;
            };
            let Some(content) = response.content.as_ref().filter(|c| !c.is_empty()) else {
                return Ok((void_response(), None));
            };

            let preferred = content
                .get("application/json")
                .map(|m| ("application/json", m))
                .or_else(|| {
                    content
                        .iter()
                        .find(|(mt, _)| mt.ends_with("+json"))
                        .map(|(mt, m)| (mt.as_str(), m))
                })
                .or_else(|| content.iter().next().map(|(mt, m)| (mt.as_str(), m)));

            let Some((media_type, schema)) =
                preferred.and_then(|(mt, m)| m.schema.as_ref().map(|s| (mt, s)))
            else {
                return Err(GenerationError::MissingResponseSchema {
                    operation: label.to_string(),
                    status: status.to_string(),
                });
            };

            let ty = if media_type.starts_with("text/") {
                TsType::string()
            } else if is_binary_media_type(media_type) {
                TsType::Ref("Blob".into())
            } else {
                self.ts_type(schema)
                    .map_err(|BadRef(reference)| GenerationError::UnresolvedRef {
                        operation: label.to_string(),
                        reference,
                    })?
            };
            return Ok((
                ResponseIR {
                    ty: TypeRef::inline(ty),
                },
                Some(schema),
            ));
        }

        if op.responses.contains_key("204") {
            return Ok((void_response(), None));
        }

        Err(GenerationError::MissingResponse {
            operation: label.to_string(),
        })
    }

    /// Validate the cursor wiring of an infinite query.
    fn cursor(
        &self,
        label: &str,
        params: Option<&ParamsIR>,
        response_schema: Option<&Schema>,
    ) -> Result<CursorIR> {
        let expected = &self.options.query.use_infinite_query_param;
        let query_params: Vec<&ParamIR> = params
            .map(|p| p.in_location(ParamLocation::Query).collect())
            .unwrap_or_default();

        if !query_params.iter().any(|f| &f.name == expected) {
            let found = query_params
                .iter()
                .find(|f| is_page_token_name(&f.name))
                .map(|f| f.name.clone())
                .unwrap_or_default();
            return Err(GenerationError::CursorMismatch {
                operation: label.to_string(),
                expected: expected.clone(),
                found,
            });
        }

        let has_field = response_schema.is_some_and(|s| s.has_property(self.spec, expected));
        if !has_field {
            return Err(GenerationError::MissingCursorField {
                operation: label.to_string(),
                field: expected.clone(),
            });
        }

        Ok(CursorIR {
            param: expected.clone(),
            field: expected.clone(),
        })
    }
}

fn void_response() -> ResponseIR {
    ResponseIR {
        ty: TypeRef::inline(TsType::Primitive(TsPrimitive::Void)),
    }
}

fn is_binary_media_type(media_type: &str) -> bool {
    media_type == "application/octet-stream"
        || media_type == "application/pdf"
        || media_type.starts_with("image/")
        || media_type.starts_with("audio/")
        || media_type.starts_with("video/")
}

fn with_null(ty: TsType) -> TsType {
    let null = TsType::Primitive(TsPrimitive::Null);
    match ty {
        TsType::Union(mut types) => {
            if !types
                .iter()
                .any(|t| matches!(t, TsType::Primitive(TsPrimitive::Null)))
            {
                types.push(null);
            }
            TsType::Union(types)
        }
        TsType::Primitive(TsPrimitive::Null) => ty,
        other => TsType::Union(vec![other, null]),
    }
}

fn json_value_to_ts_type(value: &serde_json::Value) -> TsType {
    match value {
        serde_json::Value::Null => TsType::Literal(TsLiteral::Null),
        serde_json::Value::Bool(b) => TsType::Literal(TsLiteral::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => TsType::Literal(TsLiteral::Int(i)),
            None => TsType::Literal(TsLiteral::Number(n.as_f64().unwrap_or(0.0))),
        },
        serde_json::Value::String(s) => TsType::Literal(TsLiteral::String(s.clone())),
        _ => TsType::unknown(),
    }
}

fn enum_to_union_type(values: &[EnumValue]) -> TsType {
    TsType::Union(
        values
            .iter()
            .map(|v| TsType::Literal(enum_value_to_literal(v)))
            .collect(),
    )
}

/// operationId when present, otherwise derived from method and path.
fn operation_name(path: &str, method: HttpMethod, op: &Operation) -> String {
    if let Some(id) = &op.operation_id {
        return sanitize_ts_identifier(id);
    }

    let parts: Vec<_> = path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .collect();
    sanitize_ts_identifier(&format!(
        "{}_{}",
        method.as_str().to_lowercase(),
        parts.join("_")
    ))
}

fn check_duplicate_params(params: &[Parameter], label: &str, scope: &'static str) -> Result<()> {
    let mut seen = HashSet::new();
    for p in params.iter().filter(|p| p.location != "cookie") {
        if !seen.insert(p.name.as_str()) {
            return Err(GenerationError::DuplicateParam {
                operation: label.to_string(),
                name: p.name.clone(),
                scope,
            });
        }
    }
    Ok(())
}

/// Split a path template into static and parameter parts.
///
/// Placeholders are matched to declared path params exactly, then by
/// snake_case equivalence (`{workspace_id}` matches `workspaceId`).
/// A placeholder without a declaration becomes a required string param.
fn build_url(path: &str, op_name: &str, params: &mut Option<ParamsIR>) -> Vec<UrlPart> {
    let mut template = Vec::new();
    let mut rest = path;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        if start > 0 {
            template.push(UrlPart::Static(rest[..start].to_string()));
        }
        let placeholder = &rest[start + 1..start + len];
        template.push(UrlPart::Param(resolve_placeholder(placeholder, op_name, params)));
        rest = &rest[start + len + 1..];
    }
    if !rest.is_empty() {
        template.push(UrlPart::Static(rest.to_string()));
    }
    template
}

fn resolve_placeholder(placeholder: &str, op_name: &str, params: &mut Option<ParamsIR>) -> String {
    let declared: Vec<&ParamIR> = params
        .as_ref()
        .map(|p| p.in_location(ParamLocation::Path).collect())
        .unwrap_or_default();

    if let Some(p) = declared.iter().find(|p| p.name == placeholder) {
        return p.name.clone();
    }
    let snake = to_snake_case(placeholder);
    if let Some(p) = declared.iter().find(|p| to_snake_case(&p.name) == snake) {
        return p.name.clone();
    }

    let implicit = ParamIR {
        name: placeholder.to_string(),
        ty: TypeRef::inline(TsType::string()),
        required: true,
        location: ParamLocation::Path,
    };
    match params {
        Some(p) => p.fields.insert(0, implicit),
        None => {
            *params = Some(ParamsIR {
                type_name: format!("{}Params", capitalize_first(op_name)),
                fields: vec![implicit],
            });
        }
    }
    placeholder.to_string()
}

fn build_hooks(
    name: &str,
    role: EndpointRole,
    client: ClientKind,
    query: &QueryOverride,
) -> Vec<HookIR> {
    if client == ClientKind::Fetch {
        return Vec::new();
    }
    let capitalized = capitalize_first(name);
    let with_options = query.use_query_options;

    match role {
        EndpointRole::Query if query.use_query => vec![HookIR {
            name: format!("use{capitalized}"),
            kind: HookKind::Query,
            with_options,
        }],
        EndpointRole::Query => Vec::new(),
        EndpointRole::InfiniteQuery => vec![HookIR {
            name: format!("use{capitalized}Infinite"),
            kind: HookKind::InfiniteQuery,
            with_options,
        }],
        EndpointRole::Mutation => vec![HookIR {
            name: format!("use{capitalized}"),
            kind: HookKind::Mutation,
            with_options,
        }],
    }
}
