//! TypeScript IR types for code generation.
//!
//! This module defines the TypeScript representation emitted by the generator:
//! - TsType: Types (primitives, arrays, unions, objects, etc.)
//! - TsExpr: Expressions (identifiers, calls, arrows, object literals, etc.)
//! - TsItem: Module-level items (type definitions, constants, functions)

use std::collections::BTreeSet;

/// Type of an operation's parameter, body or response, owned by the IR
#[derive(Debug, Clone)]
pub struct TypeRef(Box<TsType>);

impl TypeRef {
    /// Wrap an inline type.
    pub fn inline(ty: TsType) -> Self {
        TypeRef(Box::new(ty))
    }

    /// The referenced type.
    pub fn to_ts_type(&self) -> TsType {
        (*self.0).clone()
    }
}

/// TypeScript type representation
#[derive(Debug, Clone)]
pub enum TsType {
    /// Primitive types: string, number, boolean, null, void, unknown
    Primitive(TsPrimitive),
    /// Array type: T[]
    Array(Box<TsType>),
    /// Union type: A | B | C
    Union(Vec<TsType>),
    /// Intersection type: A & B & C
    Intersection(Vec<TsType>),
    /// Object type: { foo: string; bar?: number }
    Object(Vec<TsProp>),
    /// Record type: Record<K, V>
    Record {
        /// Key type
        key: Box<TsType>,
        /// Value type
        value: Box<TsType>,
    },
    /// Literal type: "foo", 42, true
    Literal(TsLiteral),
    /// Named type reference
    Ref(String),
    /// Generic application: Omit<A, "b">, Partial<T>
    Generic {
        /// Generic type name
        name: String,
        /// Type arguments
        args: Vec<TsType>,
    },
}

impl TsType {
    /// `string`
    pub fn string() -> Self {
        TsType::Primitive(TsPrimitive::String)
    }

    /// `unknown`
    pub fn unknown() -> Self {
        TsType::Primitive(TsPrimitive::Unknown)
    }

    /// Whether this is `void`
    pub fn is_void(&self) -> bool {
        matches!(self, TsType::Primitive(TsPrimitive::Void))
    }

    /// Collect every named type referenced by this type.
    pub fn collect_refs(&self, out: &mut BTreeSet<String>) {
        match self {
            TsType::Primitive(_) | TsType::Literal(_) => {}
            TsType::Array(inner) => inner.collect_refs(out),
            TsType::Union(types) | TsType::Intersection(types) => {
                for t in types {
                    t.collect_refs(out);
                }
            }
            TsType::Object(props) => {
                for p in props {
                    p.ty.collect_refs(out);
                }
            }
            TsType::Record { key, value } => {
                key.collect_refs(out);
                value.collect_refs(out);
            }
            TsType::Ref(name) => {
                out.insert(name.clone());
            }
            TsType::Generic { args, .. } => {
                for a in args {
                    a.collect_refs(out);
                }
            }
        }
    }
}

/// TypeScript primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsPrimitive {
    /// `string`
    String,
    /// `number`
    Number,
    /// `boolean`
    Boolean,
    /// `null`
    Null,
    /// `void`
    Void,
    /// `unknown`
    Unknown,
}

/// Object property definition
#[derive(Debug, Clone)]
pub struct TsProp {
    /// Property name, quoted on emission when needed
    pub name: String,
    /// Property type
    pub ty: TsType,
    /// Emitted as `name?:`
    pub optional: bool,
}

/// TypeScript literal values
#[derive(Debug, Clone)]
pub enum TsLiteral {
    /// String literal, escaped on emission
    String(String),
    /// Non-integer number
    Number(f64),
    /// Integer
    Int(i64),
    /// `true` or `false`
    Bool(bool),
    /// `null`
    Null,
}

/// TypeScript expression
#[derive(Debug, Clone)]
pub enum TsExpr {
    /// Identifier or member path: foo, options?.query
    Ident(String),
    /// Literal value: "bar", 42
    Literal(TsLiteral),
    /// Function call: foo(a, b), optionally with type arguments
    Call {
        /// Function name or member path
        callee: String,
        /// Explicit type arguments, often empty
        type_args: Vec<TsType>,
        /// Call arguments
        args: Vec<TsExpr>,
    },
    /// Arrow function with an expression body: ({ signal }) => f(signal)
    Arrow {
        /// Parameter list, emitted verbatim
        params: Vec<String>,
        /// Returned expression
        body: Box<TsExpr>,
    },
    /// Arrow function with a block body
    ArrowBlock {
        /// Parameter list, emitted verbatim
        params: Vec<String>,
        /// Statements of the block
        body: Vec<TsStmt>,
    },
    /// Object literal entries, in order
    Object(Vec<ObjectEntry>),
    /// Array literal: [a, b, c]
    Array(Vec<TsExpr>),
    /// Template literal: `/items/${params.id}`
    Template(Vec<TemplatePart>),
    /// Type assertion: expr as Type
    Cast {
        /// Asserted expression
        expr: Box<TsExpr>,
        /// Target type
        ty: TsType,
    },
    /// Raw code that doesn't fit the AST
    Raw(String),
}

/// Entry of an object literal
#[derive(Debug, Clone)]
pub enum ObjectEntry {
    /// key: value
    Prop(String, TsExpr),
    /// Shorthand property: { signal }
    Shorthand(String),
    /// Spread: ...options?.query
    Spread(TsExpr),
}

/// Template literal part
#[derive(Debug, Clone)]
pub enum TemplatePart {
    /// Static string part
    Static(String),
    /// Dynamic expression part: ${expr}
    Dynamic(TsExpr),
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct TsParam {
    /// Parameter name
    pub name: String,
    /// Annotation; `None` leaves it to inference
    pub ty: Option<TsType>,
    /// Emitted as `name?:`
    pub optional: bool,
}

impl TsParam {
    /// Annotated parameter
    pub fn new(name: impl Into<String>, ty: TsType, optional: bool) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            optional,
        }
    }
}

/// Statement in a function body
#[derive(Debug, Clone)]
pub enum TsStmt {
    /// const declaration
    Const {
        /// Binding name
        name: String,
        /// Initializer
        init: TsExpr,
    },
    /// Expression statement
    Expr(TsExpr),
    /// Return statement
    Return(Option<TsExpr>),
}

// =============================================================================
// Module-Level IR
// =============================================================================

/// Import statement
#[derive(Debug, Clone)]
pub struct TsImport {
    /// Items to import, emitted in order
    pub items: Vec<String>,
    /// Module path
    pub from: String,
    /// Whether this is a type-only import
    pub type_only: bool,
}

/// Type definition kind
#[derive(Debug, Clone)]
pub enum TypeDefKind {
    /// interface Foo { ... }
    Interface {
        /// Members in declaration order
        properties: Vec<TsProp>,
    },
    /// type Foo = ...
    TypeAlias {
        /// Aliased type
        ty: TsType,
    },
    /// const Foo = { ... } as const; type Foo = ...
    ConstEnum {
        /// Member names with their values
        values: Vec<(String, TsLiteral)>,
    },
}

/// Type definition
#[derive(Debug, Clone)]
pub struct TsTypeDef {
    /// Exported type name
    pub name: String,
    /// JSDoc text
    pub doc: Option<String>,
    /// Definition form
    pub kind: TypeDefKind,
}

impl TsTypeDef {
    /// Named types this definition depends on.
    pub fn collect_refs(&self, out: &mut BTreeSet<String>) {
        match &self.kind {
            TypeDefKind::Interface { properties } => {
                for p in properties {
                    p.ty.collect_refs(out);
                }
            }
            TypeDefKind::TypeAlias { ty } => ty.collect_refs(out),
            TypeDefKind::ConstEnum { .. } => {}
        }
    }
}

/// Function definition
#[derive(Debug, Clone)]
pub struct TsFunction {
    /// Function name
    pub name: String,
    /// JSDoc lines
    pub doc: Vec<String>,
    /// Generic parameters, e.g. `TData = Task`
    pub type_params: Vec<String>,
    /// Parameters
    pub params: Vec<TsParam>,
    /// Return annotation; `None` leaves it to inference
    pub return_type: Option<TsType>,
    /// Statements of the body
    pub body: Vec<TsStmt>,
    /// Emitted with `export`
    pub is_export: bool,
    /// `export const name = (...) => { ... };` instead of `function name`
    pub is_arrow: bool,
}

/// Module-level constant: export const workspacesTagKey = [...] as const;
#[derive(Debug, Clone)]
pub struct TsConst {
    /// Constant name
    pub name: String,
    /// Initializer
    pub init: TsExpr,
    /// Emitted with `export`
    pub is_export: bool,
}

/// Item of a module, emitted in order
#[derive(Debug, Clone)]
pub enum TsItem {
    /// Interface, alias or const enum
    TypeDef(TsTypeDef),
    /// Module-level constant
    Const(TsConst),
    /// Function or arrow function
    Function(TsFunction),
    /// export * from "./path";
    ReexportAll(String),
}

/// Complete TypeScript module
#[derive(Debug, Clone, Default)]
pub struct TsModule {
    /// Lines of the leading file comment
    pub header: Vec<String>,
    /// Imports, emitted before any item
    pub imports: Vec<TsImport>,
    /// Items in emission order
    pub items: Vec<TsItem>,
}
