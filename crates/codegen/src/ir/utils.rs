//! Naming and path helpers shared by normalization and code generation.

use std::collections::HashSet;
use std::path::{Component, Path};
use std::sync::LazyLock;

use super::types::{TsLiteral, TsPrimitive, TsType};
use crate::spec::EnumValue;

/// TypeScript reserved words that cannot be used as identifiers.
pub static TS_RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "break",
        "case",
        "catch",
        "class",
        "const",
        "continue",
        "debugger",
        "default",
        "delete",
        "do",
        "else",
        "enum",
        "export",
        "extends",
        "false",
        "finally",
        "for",
        "function",
        "if",
        "import",
        "in",
        "instanceof",
        "new",
        "null",
        "return",
        "super",
        "switch",
        "this",
        "throw",
        "true",
        "try",
        "typeof",
        "var",
        "void",
        "while",
        "with",
        "yield",
        "let",
        "static",
        "implements",
        "interface",
        "package",
        "private",
        "protected",
        "public",
        "await",
        "async",
    ]
    .into_iter()
    .collect()
});

/// Whether a name must be quoted as an object key or accessed with brackets.
pub fn needs_bracket_notation(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return true;
    };
    !(first.is_ascii_alphabetic() || first == '_' || first == '$')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Escape backslashes and double quotes for a double-quoted literal.
pub fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote a property key only when it is not a plain identifier.
pub fn quote_if_needed(name: &str) -> String {
    if needs_bracket_notation(name) {
        format!("\"{}\"", escape_js_string(name))
    } else {
        name.to_string()
    }
}

/// Property access on `obj`, e.g. `params.accountId` or `params?.["x-trace"]`.
pub fn format_param_access(obj: &str, prop: &str, required: bool) -> String {
    match (needs_bracket_notation(prop), required) {
        (true, true) => format!("{obj}[\"{}\"]", escape_js_string(prop)),
        (true, false) => format!("{obj}?.[\"{}\"]", escape_js_string(prop)),
        (false, true) => format!("{obj}.{prop}"),
        (false, false) => format!("{obj}?.{prop}"),
    }
}

/// Turn an operationId or tag into a camelCase TypeScript identifier.
///
/// `-`, `_`, `.`, `/` and spaces separate words; a leading digit or a
/// reserved word gets a `_` prefix.
pub fn sanitize_ts_identifier(name: &str) -> String {
    let mut result = String::new();
    for (i, part) in name
        .split(['-', '_', '.', ' ', '/'])
        .filter(|p| !p.is_empty())
        .enumerate()
    {
        if i == 0 {
            result.push_str(part);
        } else {
            result.push_str(&capitalize_first(part));
        }
    }

    if result.is_empty() {
        return "_empty".to_string();
    }

    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }

    if TS_RESERVED_WORDS.contains(result.as_str()) {
        result.insert(0, '_');
    }

    result
}

/// Capitalize the first letter of a string.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Convert a string to snake_case (for comparison purposes).
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// File-system friendly name for a tag: "Workspace Members" -> "workspace-members".
pub fn to_kebab_case(s: &str) -> String {
    let mut result = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower && !result.ends_with('-') {
                result.push('-');
            }
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            result.push(c.to_ascii_lowercase());
        } else {
            if !result.is_empty() && !result.ends_with('-') {
                result.push('-');
            }
            prev_lower = false;
        }
    }
    let trimmed = result.trim_end_matches('-');
    if trimmed.is_empty() {
        "default".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Module specifier importing `target` from a module living in `from_dir`.
///
/// Both paths are relative to the same root. A `.ts` extension and a trailing
/// `/index` are dropped, and the result always starts with `./` or `../`.
pub fn relative_module_path(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component<'_>> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in to.iter().skip(common) {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    if let Some(last) = parts.last_mut()
        && let Some(stripped) = last.strip_suffix(".ts")
    {
        *last = stripped.to_string();
    }
    if parts.len() > 1 && parts.last().is_some_and(|p| p == "index") {
        parts.pop();
    }

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

/// Convert an OpenAPI enum value to a TypeScript literal.
pub fn enum_value_to_literal(v: &EnumValue) -> TsLiteral {
    match v {
        EnumValue::String(s) => TsLiteral::String(s.clone()),
        EnumValue::Integer(n) => TsLiteral::Int(*n),
        EnumValue::Float(f) => TsLiteral::Number(*f),
        EnumValue::Bool(b) => TsLiteral::Bool(*b),
        EnumValue::Null => TsLiteral::Null,
    }
}

/// Key name for an enum value inside a const enum object.
pub fn enum_value_to_key(v: &EnumValue, index: usize) -> String {
    match v {
        EnumValue::String(s) => quote_if_needed(s),
        EnumValue::Integer(n) if *n >= 0 => format!("VALUE_{n}"),
        EnumValue::Integer(_) | EnumValue::Float(_) => format!("VALUE_{index}"),
        EnumValue::Bool(true) => "TRUE".to_string(),
        EnumValue::Bool(false) => "FALSE".to_string(),
        EnumValue::Null => "NULL".to_string(),
    }
}

/// `Record<string, T>`
pub fn make_string_record(value_type: TsType) -> TsType {
    TsType::Record {
        key: Box::new(TsType::Primitive(TsPrimitive::String)),
        value: Box::new(value_type),
    }
}

/// `Record<string, unknown>`, the default for `additionalProperties: true`.
pub fn make_unknown_record() -> TsType {
    make_string_record(TsType::unknown())
}
