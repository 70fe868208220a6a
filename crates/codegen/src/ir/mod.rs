//! Intermediate Representation for OpenAPI to TypeScript code generation.
//!
//! This module defines a three-layer architecture:
//! 1. API-level IR: Normalized operations, parameters, hooks (OpenAPI-agnostic)
//! 2. TypeScript AST IR: Types, expressions, statements, functions
//! 3. Emission: AST to TypeScript code strings via the `Emit` trait
//!
//! All OpenAPI corner cases are resolved in normalization, so that code
//! generation builds structured AST and emission stays mechanical.
//!
//! ## Module Structure
//!
//! - `types`: TypeScript AST IR (TsType, TsExpr, TsStmt, TsFunction, TsModule)
//! - `api`: API-level IR (OperationIR, ParamsIR, CursorIR, HookIR)
//! - `normalize`: OpenAPI spec -> API IR conversion
//! - `codegen`: API IR -> TypeScript AST
//! - `emit`: TypeScript AST -> code strings (via Emit trait)
//! - `utils`: Common utilities shared across modules

pub mod api;
mod codegen;
mod emit;
mod normalize;
pub mod types;
pub mod utils;

pub use api::{ApiIR, OperationIR};
pub use codegen::{
    GENERATED_BANNER, ModuleContext, codegen_barrel, codegen_models, codegen_operations,
    file_header, tag_key_name,
};
pub use emit::Emit;
pub use normalize::{DEFAULT_TAG, NormalizeOptions, normalize_spec};
