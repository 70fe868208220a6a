//! TypeScript code emission via the Emit trait.
//!
//! Each AST node renders itself. Expressions and statements carry an
//! indentation level so that object literals and block bodies come out
//! formatted the same way on every run.

use super::types::{
    ObjectEntry, TemplatePart, TsConst, TsExpr, TsFunction, TsImport, TsItem, TsLiteral, TsModule,
    TsParam, TsPrimitive, TsProp, TsStmt, TsType, TsTypeDef, TypeDefKind,
};
use super::utils::{escape_js_string, quote_if_needed};

/// Trait for emitting TypeScript code from AST nodes.
pub trait Emit {
    /// Convert the AST node to its TypeScript string representation.
    fn emit(&self) -> String;
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// Render doc lines as a JSDoc block at the given indentation.
fn emit_doc(lines: &[String], level: usize) -> String {
    let lines: Vec<String> = lines
        .iter()
        .flat_map(|l| l.lines())
        .map(|l| l.trim_end().replace("*/", "*\\/"))
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    let prefix = indent(level);
    let mut output = format!("{prefix}/**\n");
    for line in &lines {
        if line.is_empty() {
            output.push_str(&format!("{prefix} *\n"));
        } else {
            output.push_str(&format!("{prefix} * {line}\n"));
        }
    }
    output.push_str(&format!("{prefix} */\n"));
    output
}

// =============================================================================
// Primitive Types
// =============================================================================

impl Emit for TsPrimitive {
    fn emit(&self) -> String {
        match self {
            TsPrimitive::String => "string".to_string(),
            TsPrimitive::Number => "number".to_string(),
            TsPrimitive::Boolean => "boolean".to_string(),
            TsPrimitive::Null => "null".to_string(),
            TsPrimitive::Void => "void".to_string(),
            TsPrimitive::Unknown => "unknown".to_string(),
        }
    }
}

impl Emit for TsLiteral {
    fn emit(&self) -> String {
        match self {
            TsLiteral::String(s) => format!("\"{}\"", escape_js_string(s)),
            TsLiteral::Number(n) => n.to_string(),
            TsLiteral::Int(i) => i.to_string(),
            TsLiteral::Bool(b) => b.to_string(),
            TsLiteral::Null => "null".to_string(),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

impl Emit for TsType {
    fn emit(&self) -> String {
        match self {
            TsType::Primitive(p) => p.emit(),
            TsType::Array(inner) => {
                let inner_str = inner.emit();
                if matches!(**inner, TsType::Union(_) | TsType::Intersection(_)) {
                    format!("({inner_str})[]")
                } else {
                    format!("{inner_str}[]")
                }
            }
            TsType::Union(types) if types.is_empty() => "never".to_string(),
            TsType::Union(types) => types.iter().map(Emit::emit).collect::<Vec<_>>().join(" | "),
            TsType::Intersection(types) => types
                .iter()
                .map(|t| {
                    let s = t.emit();
                    if matches!(t, TsType::Union(_)) {
                        format!("({s})")
                    } else {
                        s
                    }
                })
                .collect::<Vec<_>>()
                .join(" & "),
            TsType::Object(props) if props.is_empty() => "{}".to_string(),
            TsType::Object(props) => {
                let parts: Vec<_> = props.iter().map(Emit::emit).collect();
                format!("{{ {} }}", parts.join("; "))
            }
            TsType::Record { key, value } => {
                format!("Record<{}, {}>", key.emit(), value.emit())
            }
            TsType::Literal(lit) => lit.emit(),
            TsType::Ref(name) => name.clone(),
            TsType::Generic { name, args } => {
                let args: Vec<_> = args.iter().map(Emit::emit).collect();
                format!("{name}<{}>", args.join(", "))
            }
        }
    }
}

impl Emit for TsProp {
    fn emit(&self) -> String {
        let key = quote_if_needed(&self.name);
        let opt = if self.optional { "?" } else { "" };
        format!("{key}{opt}: {}", self.ty.emit())
    }
}

// =============================================================================
// Type Definitions
// =============================================================================

impl Emit for TsTypeDef {
    fn emit(&self) -> String {
        let mut output = self
            .doc
            .as_ref()
            .map(|d| emit_doc(std::slice::from_ref(d), 0))
            .unwrap_or_default();

        match &self.kind {
            TypeDefKind::Interface { properties } => {
                output.push_str(&format!("export interface {} {{\n", self.name));
                for prop in properties {
                    output.push_str(&format!("  {};\n", prop.emit()));
                }
                output.push_str("}\n");
            }
            TypeDefKind::TypeAlias { ty } => {
                output.push_str(&format!("export type {} = {};\n", self.name, ty.emit()));
            }
            TypeDefKind::ConstEnum { values } => {
                output.push_str(&format!("export const {} = {{\n", self.name));
                for (key, value) in values {
                    output.push_str(&format!("  {key}: {},\n", value.emit()));
                }
                output.push_str("} as const;\n\n");
                output.push_str(&format!(
                    "export type {0} = (typeof {0})[keyof typeof {0}];\n",
                    self.name
                ));
            }
        }
        output
    }
}

// =============================================================================
// Expressions
// =============================================================================

impl Emit for TsExpr {
    fn emit(&self) -> String {
        self.emit_at(0)
    }
}

impl TsExpr {
    /// Emit at the given indentation level. Only multi-line constructs
    /// (object literals and block arrows) use the level.
    pub fn emit_at(&self, level: usize) -> String {
        match self {
            TsExpr::Ident(name) | TsExpr::Raw(name) => name.clone(),
            TsExpr::Literal(lit) => lit.emit(),
            TsExpr::Call {
                callee,
                type_args,
                args,
            } => {
                let type_args = if type_args.is_empty() {
                    String::new()
                } else {
                    let args: Vec<_> = type_args.iter().map(Emit::emit).collect();
                    format!("<{}>", args.join(", "))
                };
                let args: Vec<_> = args.iter().map(|a| a.emit_at(level)).collect();
                format!("{callee}{type_args}({})", args.join(", "))
            }
            TsExpr::Arrow { params, body } => {
                let body_str = body.emit_at(level);
                if matches!(**body, TsExpr::Object(_)) {
                    format!("({}) => ({body_str})", params.join(", "))
                } else {
                    format!("({}) => {body_str}", params.join(", "))
                }
            }
            TsExpr::ArrowBlock { params, body } => {
                let mut output = format!("({}) => {{\n", params.join(", "));
                for stmt in body {
                    output.push_str(&stmt.emit_indented(level + 1));
                }
                output.push_str(&format!("{}}}", indent(level)));
                output
            }
            TsExpr::Object(entries) if entries.is_empty() => "{}".to_string(),
            TsExpr::Object(entries) => {
                let inner = indent(level + 1);
                let mut output = "{\n".to_string();
                for entry in entries {
                    let rendered = match entry {
                        ObjectEntry::Prop(key, value) => {
                            format!("{}: {}", quote_if_needed(key), value.emit_at(level + 1))
                        }
                        ObjectEntry::Shorthand(name) => name.clone(),
                        ObjectEntry::Spread(expr) => format!("...{}", expr.emit_at(level + 1)),
                    };
                    output.push_str(&format!("{inner}{rendered},\n"));
                }
                output.push_str(&format!("{}}}", indent(level)));
                output
            }
            TsExpr::Array(items) => {
                let items: Vec<_> = items.iter().map(|i| i.emit_at(level)).collect();
                format!("[{}]", items.join(", "))
            }
            TsExpr::Template(parts) => {
                let content: String = parts
                    .iter()
                    .map(|p| match p {
                        TemplatePart::Static(s) => s.replace('`', "\\`"),
                        TemplatePart::Dynamic(e) => format!("${{{}}}", e.emit_at(level)),
                    })
                    .collect();
                format!("`{content}`")
            }
            TsExpr::Cast { expr, ty } => {
                format!("{} as {}", expr.emit_at(level), ty.emit())
            }
        }
    }
}

impl Emit for TsParam {
    fn emit(&self) -> String {
        let opt = if self.optional { "?" } else { "" };
        match &self.ty {
            Some(ty) => format!("{}{opt}: {}", self.name, ty.emit()),
            None => format!("{}{opt}", self.name),
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

impl Emit for TsStmt {
    fn emit(&self) -> String {
        self.emit_indented(1)
    }
}

impl TsStmt {
    /// Emit with specified indentation level (2 spaces per level)
    pub fn emit_indented(&self, level: usize) -> String {
        let prefix = indent(level);
        match self {
            TsStmt::Const { name, init } => {
                format!("{prefix}const {name} = {};\n", init.emit_at(level))
            }
            TsStmt::Expr(expr) => format!("{prefix}{};\n", expr.emit_at(level)),
            TsStmt::Return(Some(expr)) => format!("{prefix}return {};\n", expr.emit_at(level)),
            TsStmt::Return(None) => format!("{prefix}return;\n"),
        }
    }
}

// =============================================================================
// Module Items
// =============================================================================

impl Emit for TsFunction {
    fn emit(&self) -> String {
        let mut output = emit_doc(&self.doc, 0);

        if self.is_export {
            output.push_str("export ");
        }

        let type_params = if self.type_params.is_empty() {
            String::new()
        } else {
            format!("<{}>", self.type_params.join(", "))
        };
        let params = self
            .params
            .iter()
            .map(Emit::emit)
            .collect::<Vec<_>>()
            .join(", ");
        let return_type = self
            .return_type
            .as_ref()
            .map(|t| format!(": {}", t.emit()))
            .unwrap_or_default();

        if self.is_arrow {
            output.push_str(&format!(
                "const {} = {type_params}({params}){return_type} => {{\n",
                self.name
            ));
        } else {
            output.push_str(&format!(
                "function {}{type_params}({params}){return_type} {{\n",
                self.name
            ));
        }
        for stmt in &self.body {
            output.push_str(&stmt.emit_indented(1));
        }
        output.push_str(if self.is_arrow { "};\n" } else { "}\n" });
        output
    }
}

impl Emit for TsConst {
    fn emit(&self) -> String {
        let export = if self.is_export { "export " } else { "" };
        format!("{export}const {} = {};\n", self.name, self.init.emit())
    }
}

impl Emit for TsItem {
    fn emit(&self) -> String {
        match self {
            TsItem::TypeDef(def) => def.emit(),
            TsItem::Const(c) => c.emit(),
            TsItem::Function(f) => f.emit(),
            TsItem::ReexportAll(from) => format!("export * from \"{}\";\n", escape_js_string(from)),
        }
    }
}

impl Emit for TsImport {
    fn emit(&self) -> String {
        let type_keyword = if self.type_only { "type " } else { "" };
        format!(
            "import {type_keyword}{{ {} }} from \"{}\";\n",
            self.items.join(", "),
            escape_js_string(&self.from)
        )
    }
}

// =============================================================================
// Module
// =============================================================================

impl Emit for TsModule {
    fn emit(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !self.header.is_empty() {
            sections.push(emit_doc(&self.header, 0));
        }

        if !self.imports.is_empty() {
            sections.push(self.imports.iter().map(Emit::emit).collect());
        }

        // Consecutive re-exports share one block.
        let mut reexports = String::new();
        for item in &self.items {
            if let TsItem::ReexportAll(_) = item {
                reexports.push_str(&item.emit());
                continue;
            }
            if !reexports.is_empty() {
                sections.push(std::mem::take(&mut reexports));
            }
            sections.push(item.emit());
        }
        if !reexports.is_empty() {
            sections.push(reexports);
        }

        if self.imports.is_empty() && self.items.is_empty() {
            sections.push("export {};\n".to_string());
        }

        sections.join("\n")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_primitive() {
        assert_eq!(TsPrimitive::String.emit(), "string");
        assert_eq!(TsPrimitive::Number.emit(), "number");
        assert_eq!(TsPrimitive::Void.emit(), "void");
        assert_eq!(TsPrimitive::Unknown.emit(), "unknown");
    }

    #[test]
    fn test_emit_literal() {
        assert_eq!(TsLiteral::String("hello".into()).emit(), "\"hello\"");
        assert_eq!(
            TsLiteral::String("say \"hi\"".into()).emit(),
            "\"say \\\"hi\\\"\""
        );
        assert_eq!(TsLiteral::Int(42).emit(), "42");
        assert_eq!(TsLiteral::Null.emit(), "null");
    }

    #[test]
    fn test_emit_union_array() {
        let inner = TsType::Union(vec![
            TsType::Primitive(TsPrimitive::String),
            TsType::Primitive(TsPrimitive::Null),
        ]);
        let ty = TsType::Array(Box::new(inner));
        assert_eq!(ty.emit(), "(string | null)[]");
    }

    #[test]
    fn test_emit_generic_type() {
        let ty = TsType::Generic {
            name: "Omit".into(),
            args: vec![
                TsType::Ref("ListTasksParams".into()),
                TsType::Literal(TsLiteral::String("nextPageToken".into())),
            ],
        };
        assert_eq!(ty.emit(), "Omit<ListTasksParams, \"nextPageToken\">");
    }

    #[test]
    fn test_emit_object_type() {
        let ty = TsType::Object(vec![
            TsProp {
                name: "taskId".into(),
                ty: TsType::string(),
                optional: false,
            },
            TsProp {
                name: "x-trace-id".into(),
                ty: TsType::string(),
                optional: true,
            },
        ]);
        assert_eq!(ty.emit(), "{ taskId: string; \"x-trace-id\"?: string }");
    }

    #[test]
    fn test_emit_interface_with_doc() {
        let def = TsTypeDef {
            name: "Task".into(),
            doc: Some("A unit of work.".into()),
            kind: TypeDefKind::Interface {
                properties: vec![TsProp {
                    name: "taskId".into(),
                    ty: TsType::string(),
                    optional: false,
                }],
            },
        };
        assert_eq!(
            def.emit(),
            "/**\n * A unit of work.\n */\nexport interface Task {\n  taskId: string;\n}\n"
        );
    }

    #[test]
    fn test_emit_const_enum() {
        let def = TsTypeDef {
            name: "TaskStatus".into(),
            doc: None,
            kind: TypeDefKind::ConstEnum {
                values: vec![("OPEN".into(), TsLiteral::String("OPEN".into()))],
            },
        };
        assert_eq!(
            def.emit(),
            "export const TaskStatus = {\n  OPEN: \"OPEN\",\n} as const;\n\n\
             export type TaskStatus = (typeof TaskStatus)[keyof typeof TaskStatus];\n"
        );
    }

    #[test]
    fn test_emit_nested_object_literal() {
        let expr = TsExpr::Call {
            callee: "customInstance".into(),
            type_args: vec![TsType::Ref("Task".into())],
            args: vec![TsExpr::Object(vec![
                ObjectEntry::Prop(
                    "url".into(),
                    TsExpr::Template(vec![
                        TemplatePart::Static("/tasks/".into()),
                        TemplatePart::Dynamic(TsExpr::Ident("params.taskId".into())),
                    ]),
                ),
                ObjectEntry::Prop("method".into(), TsExpr::Literal(TsLiteral::String("GET".into()))),
                ObjectEntry::Shorthand("signal".into()),
            ])],
        };
        assert_eq!(
            expr.emit_at(1),
            "customInstance<Task>({\n    url: `/tasks/${params.taskId}`,\n    method: \"GET\",\n    signal,\n  })"
        );
    }

    #[test]
    fn test_emit_arrow_returning_object() {
        let expr = TsExpr::Arrow {
            params: vec![],
            body: Box::new(TsExpr::Object(vec![ObjectEntry::Spread(TsExpr::Ident(
                "options?.query".into(),
            ))])),
        };
        assert_eq!(expr.emit(), "() => ({\n  ...options?.query,\n})");
    }

    #[test]
    fn test_emit_import() {
        let import = TsImport {
            items: vec!["useQuery".into(), "useMutation".into()],
            from: "@tanstack/react-query".into(),
            type_only: false,
        };
        assert_eq!(
            import.emit(),
            "import { useQuery, useMutation } from \"@tanstack/react-query\";\n"
        );
    }

    #[test]
    fn test_emit_arrow_function() {
        let func = TsFunction {
            name: "getTasksQueryKey".into(),
            doc: vec![],
            type_params: vec![],
            params: vec![TsParam::new("params", TsType::Ref("P".into()), true)],
            return_type: None,
            body: vec![TsStmt::Return(Some(TsExpr::Ident("params".into())))],
            is_export: true,
            is_arrow: true,
        };
        assert_eq!(
            func.emit(),
            "export const getTasksQueryKey = (params?: P) => {\n  return params;\n};\n"
        );
    }

    #[test]
    fn test_emit_module_groups_reexports() {
        let module = TsModule {
            header: vec!["Generated.".into()],
            imports: vec![],
            items: vec![
                TsItem::ReexportAll("./tasks/tasks".into()),
                TsItem::ReexportAll("./model".into()),
            ],
        };
        assert_eq!(
            module.emit(),
            "/**\n * Generated.\n */\n\nexport * from \"./tasks/tasks\";\nexport * from \"./model\";\n"
        );
    }

    #[test]
    fn test_emit_empty_module_is_still_a_module() {
        let module = TsModule::default();
        assert_eq!(module.emit(), "export {};\n");
    }
}
