//! Code generation from API IR to TypeScript AST.
//!
//! This module transforms the normalized operations into TypeScript modules:
//! request functions that call the configured mutator, query-key helpers,
//! tag keys and React Query hooks. Model types and barrels get their own
//! modules.
//!
//! The generated AST can then be emitted to strings via the `Emit` trait.

use std::collections::BTreeSet;

use nexus_common::ParamLocation;

use super::api::{ApiIR, BodyContentType, CursorIR, HookIR, HookKind, OperationIR, UrlPart};
use super::emit::Emit;
use super::types::{
    ObjectEntry, TemplatePart, TsConst, TsExpr, TsFunction, TsImport, TsItem, TsLiteral, TsModule,
    TsParam, TsPrimitive, TsProp, TsStmt, TsType, TsTypeDef, TypeDefKind,
};
use super::utils::{format_param_access, sanitize_ts_identifier};

/// First line of every generated file.
pub const GENERATED_BANNER: &str = "Generated by nexus-codegen. Do not edit.";

const TANSTACK: &str = "@tanstack/react-query";
const ERROR_TYPE: &str = "ErrorType";

/// Where an operations module imports its collaborators from.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Module specifier of the mutator, relative to the module being built
    pub mutator_module: String,
    /// Exported name of the request function in the mutator module
    pub mutator_name: String,
    /// Module specifier of the model types, relative to the module being built
    pub model_module: String,
}

/// Leading comment lines shared by all files of a domain.
pub fn file_header(api: &ApiIR) -> Vec<String> {
    let mut header = vec![GENERATED_BANNER.to_string()];
    if let Some(title) = &api.title {
        header.push(title.clone());
    }
    if let Some(version) = &api.version {
        header.push(format!("OpenAPI spec version: {version}"));
    }
    header
}

/// Module holding every component schema of the domain.
pub fn codegen_models(api: &ApiIR) -> TsModule {
    TsModule {
        header: file_header(api),
        imports: Vec::new(),
        items: api.types.iter().cloned().map(TsItem::TypeDef).collect(),
    }
}

/// Barrel re-exporting the given module specifiers.
pub fn codegen_barrel(api: &ApiIR, modules: &[String]) -> TsModule {
    TsModule {
        header: file_header(api),
        imports: Vec::new(),
        items: modules.iter().cloned().map(TsItem::ReexportAll).collect(),
    }
}

/// Module for a group of operations (one tag, or the whole domain).
pub fn codegen_operations(api: &ApiIR, operations: &[&OperationIR], ctx: &ModuleContext) -> TsModule {
    let mut items = Vec::new();

    let tags: BTreeSet<&str> = operations.iter().map(|op| op.tag.as_str()).collect();
    for tag in &tags {
        items.push(TsItem::Const(codegen_tag_key(&api.domain, tag)));
    }

    for op in operations {
        if let Some(params) = &op.params {
            items.push(TsItem::TypeDef(TsTypeDef {
                name: params.type_name.clone(),
                doc: None,
                kind: TypeDefKind::Interface {
                    properties: params
                        .fields
                        .iter()
                        .map(|f| TsProp {
                            name: f.name.clone(),
                            ty: f.ty.to_ts_type(),
                            optional: !f.required,
                        })
                        .collect(),
                },
            }));
        }
        items.push(TsItem::Function(codegen_request_fn(op, &ctx.mutator_name)));
        if op.role.is_cached() {
            items.push(TsItem::Function(codegen_query_key_fn(&api.domain, op)));
        }
        for hook in &op.hooks {
            items.push(TsItem::Function(codegen_hook(op, hook)));
        }
    }

    TsModule {
        header: file_header(api),
        imports: codegen_imports(api, operations, ctx),
        items,
    }
}

/// Name of the exported tag key constant, e.g. `workspacesTagKey`.
pub fn tag_key_name(tag: &str) -> String {
    format!("{}TagKey", sanitize_ts_identifier(tag).trim_start_matches('_'))
}

fn codegen_tag_key(domain: &str, tag: &str) -> TsConst {
    TsConst {
        name: tag_key_name(tag),
        init: TsExpr::Cast {
            expr: Box::new(TsExpr::Array(vec![string_lit(domain), string_lit(tag)])),
            ty: TsType::Ref("const".into()),
        },
        is_export: true,
    }
}

// =============================================================================
// Imports
// =============================================================================

fn codegen_imports(api: &ApiIR, operations: &[&OperationIR], ctx: &ModuleContext) -> Vec<TsImport> {
    let hooks: Vec<&HookIR> = operations.iter().flat_map(|op| &op.hooks).collect();
    let has = |kind: HookKind| hooks.iter().any(|h| h.kind == kind);
    let with_options = |kind: HookKind| hooks.iter().any(|h| h.kind == kind && h.with_options);

    let mut runtime = Vec::new();
    let mut types = Vec::new();
    if has(HookKind::Query) {
        runtime.push("useQuery");
        if with_options(HookKind::Query) {
            types.push("UseQueryOptions");
        }
    }
    if has(HookKind::InfiniteQuery) {
        runtime.push("useInfiniteQuery");
        types.push("InfiniteData");
        if with_options(HookKind::InfiniteQuery) {
            types.push("UseInfiniteQueryOptions");
        }
    }
    if has(HookKind::Mutation) {
        runtime.extend(["useMutation", "useQueryClient"]);
        if with_options(HookKind::Mutation) {
            types.push("UseMutationOptions");
        }
    }

    let mut imports = Vec::new();
    if !runtime.is_empty() {
        imports.push(TsImport {
            items: runtime.into_iter().map(String::from).collect(),
            from: TANSTACK.into(),
            type_only: false,
        });
    }
    if !types.is_empty() {
        types.sort_unstable();
        imports.push(TsImport {
            items: types.into_iter().map(String::from).collect(),
            from: TANSTACK.into(),
            type_only: true,
        });
    }

    imports.push(TsImport {
        items: vec![ctx.mutator_name.clone()],
        from: ctx.mutator_module.clone(),
        type_only: false,
    });
    if !hooks.is_empty() {
        imports.push(TsImport {
            items: vec![ERROR_TYPE.into()],
            from: ctx.mutator_module.clone(),
            type_only: true,
        });
    }

    let components: BTreeSet<&str> = api.types.iter().map(|t| t.name.as_str()).collect();
    let mut refs = BTreeSet::new();
    for op in operations {
        if let Some(params) = &op.params {
            for f in &params.fields {
                f.ty.to_ts_type().collect_refs(&mut refs);
            }
        }
        if let Some(body) = &op.body {
            body.ty.to_ts_type().collect_refs(&mut refs);
        }
        op.response.ty.to_ts_type().collect_refs(&mut refs);
    }
    let models: Vec<String> = refs
        .into_iter()
        .filter(|r| components.contains(r.as_str()))
        .collect();
    if !models.is_empty() {
        imports.push(TsImport {
            items: models,
            from: ctx.model_module.clone(),
            type_only: true,
        });
    }

    imports
}

// =============================================================================
// Request functions
// =============================================================================

/// Whether the generated `params` argument may be omitted.
///
/// A required body after an optional `params` would not type-check, so
/// `params` becomes required in that case too.
fn params_optional(op: &OperationIR) -> bool {
    !op.has_required_params() && op.body.as_ref().is_none_or(|b| !b.required)
}

fn params_type(op: &OperationIR) -> Option<TsType> {
    op.params
        .as_ref()
        .map(|p| TsType::Ref(p.type_name.clone()))
}

fn response_type(op: &OperationIR) -> TsType {
    op.response.ty.to_ts_type()
}

fn codegen_request_fn(op: &OperationIR, mutator: &str) -> TsFunction {
    let optional = params_optional(op);
    let mut params = Vec::new();
    if let Some(ty) = params_type(op) {
        params.push(TsParam::new("params", ty, optional));
    }
    if let Some(body) = &op.body {
        params.push(TsParam::new("data", body.ty.to_ts_type(), !body.required));
    }
    params.push(TsParam::new("signal", TsType::Ref("AbortSignal".into()), true));

    let mut config = vec![
        ObjectEntry::Prop("url".into(), url_template(op, optional)),
        ObjectEntry::Prop("method".into(), string_lit(op.method.as_str())),
    ];

    if let Some(p) = &op.params {
        let query: Vec<ObjectEntry> = p
            .in_location(ParamLocation::Query)
            .map(|f| {
                ObjectEntry::Prop(
                    f.name.clone(),
                    TsExpr::Ident(format_param_access("params", &f.name, !optional)),
                )
            })
            .collect();
        if !query.is_empty() {
            config.push(ObjectEntry::Prop("params".into(), TsExpr::Object(query)));
        }
    }

    let mut headers = Vec::new();
    if let Some(body) = &op.body
        && body.content_type != BodyContentType::FormData
    {
        headers.push(ObjectEntry::Prop(
            "Content-Type".into(),
            string_lit(body.content_type.mime()),
        ));
    }
    if let Some(p) = &op.params {
        for f in p.in_location(ParamLocation::Header) {
            headers.push(ObjectEntry::Prop(
                f.name.clone(),
                TsExpr::Ident(format_param_access("params", &f.name, !optional)),
            ));
        }
    }
    if !headers.is_empty() {
        config.push(ObjectEntry::Prop("headers".into(), TsExpr::Object(headers)));
    }

    if op.body.is_some() {
        config.push(ObjectEntry::Shorthand("data".into()));
    }
    config.push(ObjectEntry::Shorthand("signal".into()));

    let mut doc = Vec::new();
    if let Some(summary) = &op.summary {
        doc.push(summary.clone());
    }
    if op.deprecated {
        doc.push("@deprecated".into());
    }

    TsFunction {
        name: op.name.clone(),
        doc,
        type_params: vec![],
        params,
        return_type: None,
        body: vec![TsStmt::Return(Some(TsExpr::Call {
            callee: mutator.to_string(),
            type_args: vec![response_type(op)],
            args: vec![TsExpr::Object(config)],
        }))],
        is_export: true,
        is_arrow: true,
    }
}

fn url_template(op: &OperationIR, optional: bool) -> TsExpr {
    if !op.url.iter().any(|p| matches!(p, UrlPart::Param(_))) {
        return string_lit(&op.path);
    }
    TsExpr::Template(
        op.url
            .iter()
            .map(|part| match part {
                UrlPart::Static(s) => TemplatePart::Static(s.clone()),
                UrlPart::Param(name) => TemplatePart::Dynamic(TsExpr::Call {
                    callee: "encodeURIComponent".into(),
                    type_args: vec![],
                    args: vec![TsExpr::Ident(format_param_access("params", name, !optional))],
                }),
            })
            .collect(),
    )
}

// =============================================================================
// Query keys
// =============================================================================

/// Params accepted by the key helper: the cursor never takes part in a key.
fn key_params_type(op: &OperationIR) -> Option<TsType> {
    let ty = params_type(op)?;
    Some(match &op.cursor {
        Some(cursor) => TsType::Generic {
            name: "Omit".into(),
            args: vec![ty, TsType::Literal(TsLiteral::String(cursor.param.clone()))],
        },
        None => ty,
    })
}

fn codegen_query_key_fn(domain: &str, op: &OperationIR) -> TsFunction {
    let mut elements = vec![string_lit(domain), string_lit(&op.tag), string_lit(&op.name)];
    let mut params = Vec::new();
    if let Some(ty) = key_params_type(op) {
        params.push(TsParam::new("params", ty, true));
        elements.push(TsExpr::Raw("...(params ? [params] : [])".into()));
    }

    TsFunction {
        name: op.query_key_fn().unwrap_or_default(),
        doc: vec![],
        type_params: vec![],
        params,
        return_type: None,
        body: vec![TsStmt::Return(Some(TsExpr::Cast {
            expr: Box::new(TsExpr::Array(elements)),
            ty: TsType::Ref("const".into()),
        }))],
        is_export: true,
        is_arrow: true,
    }
}

// =============================================================================
// Hooks
// =============================================================================

fn codegen_hook(op: &OperationIR, hook: &HookIR) -> TsFunction {
    match hook.kind {
        HookKind::Query => codegen_query_hook(op, hook),
        HookKind::InfiniteQuery => codegen_infinite_hook(op, hook),
        HookKind::Mutation => codegen_mutation_hook(op, hook),
    }
}

fn error_type_param() -> String {
    format!("TError = {ERROR_TYPE}<unknown>")
}

fn options_param(key: &str, ty: TsType) -> TsParam {
    TsParam::new(
        "options",
        TsType::Object(vec![TsProp {
            name: key.into(),
            ty,
            optional: true,
        }]),
        true,
    )
}

fn omit(ty: TsType, keys: &[&str]) -> TsType {
    TsType::Generic {
        name: "Omit".into(),
        args: vec![
            ty,
            TsType::Union(
                keys.iter()
                    .map(|k| TsType::Literal(TsLiteral::String((*k).to_string())))
                    .collect(),
            ),
        ],
    }
}

/// Call of the request function from inside a hook.
fn request_call(op: &OperationIR, params: Option<TsExpr>, data: Option<TsExpr>) -> TsExpr {
    let mut args = Vec::new();
    if op.params.is_some() {
        args.push(params.unwrap_or_else(|| TsExpr::Ident("params".into())));
    }
    if op.body.is_some() {
        args.push(data.unwrap_or_else(|| TsExpr::Ident("undefined".into())));
    }
    args.push(TsExpr::Ident("signal".into()));
    TsExpr::Call {
        callee: op.name.clone(),
        type_args: vec![],
        args,
    }
}

fn key_call(op: &OperationIR) -> TsExpr {
    TsExpr::Call {
        callee: op.query_key_fn().unwrap_or_default(),
        type_args: vec![],
        args: if op.params.is_some() {
            vec![TsExpr::Ident("params".into())]
        } else {
            vec![]
        },
    }
}

fn codegen_query_hook(op: &OperationIR, hook: &HookIR) -> TsFunction {
    let response = response_type(op);
    let mut params = Vec::new();
    if let Some(ty) = params_type(op) {
        params.push(TsParam::new("params", ty, params_optional(op)));
    }
    let mut config = vec![
        ObjectEntry::Prop("queryKey".into(), key_call(op)),
        ObjectEntry::Prop(
            "queryFn".into(),
            TsExpr::Arrow {
                params: vec!["{ signal }".into()],
                body: Box::new(request_call(op, None, None)),
            },
        ),
    ];
    if hook.with_options {
        params.push(options_param(
            "query",
            omit(
                TsType::Generic {
                    name: "UseQueryOptions".into(),
                    args: vec![
                        response.clone(),
                        TsType::Ref("TError".into()),
                        TsType::Ref("TData".into()),
                    ],
                },
                &["queryKey", "queryFn"],
            ),
        ));
        config.push(ObjectEntry::Spread(TsExpr::Ident("options?.query".into())));
    }

    TsFunction {
        name: hook.name.clone(),
        doc: vec![],
        type_params: vec![format!("TData = {}", response.emit()), error_type_param()],
        params,
        return_type: None,
        body: vec![TsStmt::Return(Some(TsExpr::Call {
            callee: "useQuery".into(),
            type_args: vec![],
            args: vec![TsExpr::Object(config)],
        }))],
        is_export: true,
        is_arrow: true,
    }
}

fn codegen_infinite_hook(op: &OperationIR, hook: &HookIR) -> TsFunction {
    let response = response_type(op);
    let cursor = op.cursor.clone().unwrap_or_else(|| CursorIR {
        param: nexus_common::DEFAULT_CURSOR_PARAM.into(),
        field: nexus_common::DEFAULT_CURSOR_PARAM.into(),
    });

    let mut params = Vec::new();
    if let Some(ty) = key_params_type(op) {
        params.push(TsParam::new("params", ty, !op.has_required_params()));
    }

    let page_params = TsExpr::Object(vec![
        ObjectEntry::Spread(TsExpr::Ident("params".into())),
        ObjectEntry::Prop(cursor.param.clone(), TsExpr::Ident("pageParam".into())),
    ]);
    let mut config = vec![
        ObjectEntry::Prop("queryKey".into(), key_call(op)),
        ObjectEntry::Prop(
            "queryFn".into(),
            TsExpr::Arrow {
                params: vec!["{ signal, pageParam }".into()],
                body: Box::new(request_call(op, Some(page_params), None)),
            },
        ),
        ObjectEntry::Prop(
            "initialPageParam".into(),
            TsExpr::Raw("undefined as string | undefined".into()),
        ),
        // An empty cursor ends the sequence just like a missing one.
        ObjectEntry::Prop(
            "getNextPageParam".into(),
            TsExpr::Arrow {
                params: vec!["lastPage".into()],
                body: Box::new(TsExpr::Raw(format!(
                    "{} || undefined",
                    format_param_access("lastPage", &cursor.field, true)
                ))),
            },
        ),
    ];

    if hook.with_options {
        let key_fn = op.query_key_fn().unwrap_or_default();
        params.push(options_param(
            "query",
            omit(
                TsType::Generic {
                    name: "UseInfiniteQueryOptions".into(),
                    args: vec![
                        response.clone(),
                        TsType::Ref("TError".into()),
                        TsType::Ref("TData".into()),
                        TsType::Ref(format!("ReturnType<typeof {key_fn}>")),
                        TsType::Ref("string | undefined".into()),
                    ],
                },
                &["queryKey", "queryFn", "initialPageParam", "getNextPageParam"],
            ),
        ));
        config.push(ObjectEntry::Spread(TsExpr::Ident("options?.query".into())));
    }

    TsFunction {
        name: hook.name.clone(),
        doc: vec![],
        type_params: vec![
            format!("TData = InfiniteData<{}>", response.emit()),
            error_type_param(),
        ],
        params,
        return_type: None,
        body: vec![TsStmt::Return(Some(TsExpr::Call {
            callee: "useInfiniteQuery".into(),
            type_args: vec![],
            args: vec![TsExpr::Object(config)],
        }))],
        is_export: true,
        is_arrow: true,
    }
}

/// Variables passed to `mutate`: `{ params, data }` with whichever the
/// operation takes.
fn mutation_vars(op: &OperationIR) -> Option<TsType> {
    let mut props = Vec::new();
    if let Some(ty) = params_type(op) {
        props.push(TsProp {
            name: "params".into(),
            ty,
            optional: params_optional(op),
        });
    }
    if let Some(body) = &op.body {
        props.push(TsProp {
            name: "data".into(),
            ty: body.ty.to_ts_type(),
            optional: !body.required,
        });
    }
    (!props.is_empty()).then_some(TsType::Object(props))
}

fn codegen_mutation_hook(op: &OperationIR, hook: &HookIR) -> TsFunction {
    let response = response_type(op);
    let vars = mutation_vars(op);

    let mutation_fn = match &vars {
        Some(_) => {
            let params = op.params.as_ref().map(|_| TsExpr::Ident("vars.params".into()));
            let data = op.body.as_ref().map(|_| TsExpr::Ident("vars.data".into()));
            let mut call = request_call(op, params, data);
            // Mutations are not cancelled through the query signal.
            if let TsExpr::Call { args, .. } = &mut call {
                args.pop();
            }
            TsExpr::Arrow {
                params: vec!["vars".into()],
                body: Box::new(call),
            }
        }
        None => TsExpr::Arrow {
            params: vec![],
            body: Box::new(TsExpr::Call {
                callee: op.name.clone(),
                type_args: vec![],
                args: vec![],
            }),
        },
    };

    let invalidate = TsStmt::Expr(TsExpr::Raw(format!(
        "void queryClient.invalidateQueries({{ queryKey: {} }})",
        tag_key_name(&op.tag)
    )));

    let mut params = Vec::new();
    let mut config = vec![ObjectEntry::Prop("mutationFn".into(), mutation_fn)];
    let on_success = if hook.with_options {
        let vars_ty = vars.clone().unwrap_or(TsType::Primitive(TsPrimitive::Void));
        params.push(options_param(
            "mutation",
            TsType::Generic {
                name: "UseMutationOptions".into(),
                args: vec![
                    response.clone(),
                    TsType::Ref("TError".into()),
                    vars_ty,
                    TsType::Ref("TContext".into()),
                ],
            },
        ));
        config.push(ObjectEntry::Spread(TsExpr::Ident("options?.mutation".into())));
        TsExpr::ArrowBlock {
            params: vec!["data".into(), "variables".into(), "context".into()],
            body: vec![
                invalidate,
                TsStmt::Return(Some(TsExpr::Raw(
                    "options?.mutation?.onSuccess?.(data, variables, context)".into(),
                ))),
            ],
        }
    } else {
        TsExpr::ArrowBlock {
            params: vec![],
            body: vec![invalidate],
        }
    };
    config.push(ObjectEntry::Prop("onSuccess".into(), on_success));

    let mut type_params = vec![error_type_param()];
    if hook.with_options {
        type_params.push("TContext = unknown".into());
    }

    TsFunction {
        name: hook.name.clone(),
        doc: vec![],
        type_params,
        params,
        return_type: None,
        body: vec![
            TsStmt::Const {
                name: "queryClient".into(),
                init: TsExpr::Call {
                    callee: "useQueryClient".into(),
                    type_args: vec![],
                    args: vec![],
                },
            },
            TsStmt::Return(Some(TsExpr::Call {
                callee: "useMutation".into(),
                type_args: vec![],
                args: vec![TsExpr::Object(config)],
            })),
        ],
        is_export: true,
        is_arrow: true,
    }
}

fn string_lit(s: &str) -> TsExpr {
    TsExpr::Literal(TsLiteral::String(s.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{ClientKind, QueryOverride};
    use crate::ir::normalize::{NormalizeOptions, normalize_spec};
    use crate::spec::OpenApiSpec;

    const TASKS: &str = r##"
openapi: 3.0.3
info: { title: Tasks, version: "2.1" }
paths:
  /workspaces/{workspaceId}/tasks:
    parameters:
      - { name: workspaceId, in: path, required: true, schema: { type: string } }
    get:
      operationId: listTasks
      tags: [tasks]
      summary: List tasks of a workspace
      parameters:
        - { name: nextPageToken, in: query, schema: { type: string } }
        - { name: X-Request-Id, in: header, schema: { type: string } }
      responses:
        "200":
          description: OK
          content:
            application/json:
              schema: { $ref: "#/components/schemas/TaskPage" }
    post:
      operationId: createTask
      tags: [tasks]
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: "#/components/schemas/CreateTaskRequest" }
      responses:
        "201":
          description: Created
          content:
            application/json:
              schema: { $ref: "#/components/schemas/Task" }
components:
  schemas:
    Task:
      type: object
      required: [taskId]
      properties:
        taskId: { type: string }
    CreateTaskRequest:
      type: object
      properties:
        title: { type: string }
    TaskPage:
      type: object
      properties:
        tasks: { type: array, items: { $ref: "#/components/schemas/Task" } }
        nextPageToken: { type: string }
"##;

    fn api_with(query: &QueryOverride, client: ClientKind) -> ApiIR {
        let spec = OpenApiSpec::from_yaml(TASKS).unwrap();
        normalize_spec(
            &spec,
            &NormalizeOptions {
                domain: "tasks",
                client,
                query,
            },
        )
        .unwrap()
    }

    fn ctx() -> ModuleContext {
        ModuleContext {
            mutator_module: "../../mutator/custom-instance".into(),
            mutator_name: "customInstance".into(),
            model_module: "../model".into(),
        }
    }

    fn emit_tasks(query: &QueryOverride, client: ClientKind) -> String {
        let api = api_with(query, client);
        let ops: Vec<&OperationIR> = api.operations.iter().collect();
        codegen_operations(&api, &ops, &ctx()).emit()
    }

    #[test]
    fn test_header_and_imports() {
        let out = emit_tasks(&QueryOverride::default(), ClientKind::ReactQuery);
        assert!(out.starts_with(
            "/**\n * Generated by nexus-codegen. Do not edit.\n * Tasks\n * OpenAPI spec version: 2.1\n */\n"
        ));
        assert!(out.contains(
            "import { useInfiniteQuery, useMutation, useQueryClient } from \"@tanstack/react-query\";"
        ));
        assert!(out.contains(
            "import type { InfiniteData, UseInfiniteQueryOptions, UseMutationOptions } from \"@tanstack/react-query\";"
        ));
        assert!(out.contains("import { customInstance } from \"../../mutator/custom-instance\";"));
        assert!(out.contains("import type { ErrorType } from \"../../mutator/custom-instance\";"));
        assert!(out.contains("import type { CreateTaskRequest, Task, TaskPage } from \"../model\";"));
    }

    #[test]
    fn test_request_function_calls_mutator() {
        let out = emit_tasks(&QueryOverride::default(), ClientKind::ReactQuery);
        assert!(out.contains(
            "export const listTasks = (params: ListTasksParams, signal?: AbortSignal) => {"
        ));
        assert!(out.contains("url: `/workspaces/${encodeURIComponent(params.workspaceId)}/tasks`,"));
        assert!(out.contains("nextPageToken: params.nextPageToken,"));
        assert!(out.contains("\"X-Request-Id\": params[\"X-Request-Id\"],"));
        assert!(out.contains("\"Content-Type\": \"application/json\","));
        assert!(out.contains(" * List tasks of a workspace"));
    }

    #[test]
    fn test_query_key_excludes_cursor() {
        let out = emit_tasks(&QueryOverride::default(), ClientKind::ReactQuery);
        assert!(out.contains(
            "export const getListTasksQueryKey = (params?: Omit<ListTasksParams, \"nextPageToken\">) => {\n  \
             return [\"tasks\", \"tasks\", \"listTasks\", ...(params ? [params] : [])] as const;\n};"
        ));
        assert!(out.contains("export const tasksTagKey = [\"tasks\", \"tasks\"] as const;"));
    }

    #[test]
    fn test_infinite_hook_reads_cursor() {
        let out = emit_tasks(&QueryOverride::default(), ClientKind::ReactQuery);
        assert!(out.contains("export const useListTasksInfinite = <TData = InfiniteData<TaskPage>"));
        assert!(out.contains("initialPageParam: undefined as string | undefined,"));
        assert!(out.contains("getNextPageParam: (lastPage) => lastPage.nextPageToken || undefined,"));
        assert!(out.contains("nextPageToken: pageParam,"));
    }

    #[test]
    fn test_mutation_invalidates_tag() {
        let out = emit_tasks(&QueryOverride::default(), ClientKind::ReactQuery);
        assert!(out.contains("void queryClient.invalidateQueries({ queryKey: tasksTagKey });"));
        assert!(out.contains("return options?.mutation?.onSuccess?.(data, variables, context);"));
        assert!(out.contains("mutationFn: (vars) => createTask(vars.params, vars.data),"));
    }

    #[test]
    fn test_without_options_bag() {
        let query = QueryOverride {
            use_query_options: false,
            ..QueryOverride::default()
        };
        let out = emit_tasks(&query, ClientKind::ReactQuery);
        assert!(!out.contains("options?."));
        assert!(!out.contains("UseMutationOptions"));
        assert!(out.contains("useMutation"));
    }

    #[test]
    fn test_fetch_client_has_no_hooks() {
        let out = emit_tasks(&QueryOverride::default(), ClientKind::Fetch);
        assert!(!out.contains("@tanstack/react-query"));
        assert!(!out.contains("ErrorType"));
        assert!(out.contains("export const listTasks = "));
        assert!(out.contains("export const getListTasksQueryKey = "));
    }

    #[test]
    fn test_barrel_and_models() {
        let api = api_with(&QueryOverride::default(), ClientKind::ReactQuery);
        let barrel = codegen_barrel(&api, &["./tasks/tasks".into(), "./model".into()]).emit();
        assert!(barrel.ends_with("export * from \"./tasks/tasks\";\nexport * from \"./model\";\n"));

        let models = codegen_models(&api).emit();
        assert!(models.contains("export interface Task {\n  taskId: string;\n}\n"));
        assert!(models.contains("export interface TaskPage {"));
    }

    #[test]
    fn test_tag_key_name() {
        assert_eq!(tag_key_name("tasks"), "tasksTagKey");
        assert_eq!(tag_key_name("Workspace Members"), "WorkspaceMembersTagKey");
        assert_eq!(tag_key_name("default"), "defaultTagKey");
    }
}
