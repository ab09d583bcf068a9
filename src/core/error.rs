// This module defines the error taxonomy for mlgen using the thiserror crate. CodegenError
// covers every way a generation pass can fail: a declaration colliding with an existing
// name, an operation kind or specifier the selected target does not know, a node whose
// operand/result formats match no rule, scope-stack discipline violations, unknown targets
// or missing per-language rule tables, malformed code templates, unreachable rule entries
// rejected by the strict lint, ill-formed operation graphs and parse failures in the textual
// graph format. Each variant carries enough context (kind, specifier, formats, source tag)
// to find which numeric scheme or target table needs fixing. None of these errors are
// retried: the driver aborts the pass and reports. CodegenResult<T> is the alias used
// across the crate.

//! Error types for mlgen.
//!
//! Using thiserror for more idiomatic error handling.

use crate::ir::{Format, OpKind, Specifier};
use crate::symbols::SymbolCategory;
use thiserror::Error;

/// Main error type for a code generation pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("Name collision: '{name}' is already declared in the {category} table")]
    NameCollision {
        name: String,
        category: SymbolCategory,
    },

    #[error("Unsupported operation: {kind}{} (tag: {})", fmt_spec(.specifier), fmt_tag(.tag))]
    UnsupportedOperation {
        kind: OpKind,
        specifier: Option<Specifier>,
        tag: Option<String>,
    },

    #[error(
        "No matching rule for {kind}.{specifier}: ({}) -> {result} (tag: {})",
        fmt_formats(.operands),
        fmt_tag(.tag)
    )]
    NoMatchingRule {
        kind: OpKind,
        specifier: Specifier,
        operands: Vec<Format>,
        result: Format,
        tag: Option<String>,
    },

    #[error("Entity already declared as '{existing}' in the {category} table, cannot rename it '{name}'")]
    AlreadyDeclared {
        existing: String,
        name: String,
        category: SymbolCategory,
    },

    #[error("Invalid scope nesting: {reason}")]
    InvalidScopeNesting {
        reason: String,
    },

    #[error("Unknown target: {name}")]
    UnknownTarget {
        name: String,
    },

    #[error("Target {target} has no rule table for {language}")]
    MissingRuleTable {
        target: String,
        language: String,
    },

    #[error("Template instantiation failed: {reason}")]
    Template {
        reason: String,
    },

    #[error("Unreachable rule: {reason}")]
    UnreachableRule {
        reason: String,
    },

    #[error("Invalid operation graph: {reason}")]
    InvalidGraph {
        reason: String,
    },

    #[error("Parse error at line {line}: {reason}")]
    Parse {
        line: usize,
        reason: String,
    },
}

fn fmt_spec(spec: &Option<Specifier>) -> String {
    match spec {
        Some(spec) => format!(".{spec}"),
        None => String::new(),
    }
}

fn fmt_tag(tag: &Option<String>) -> &str {
    tag.as_deref().unwrap_or("<none>")
}

fn fmt_formats(formats: &[Format]) -> String {
    formats
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for code generation operations.
pub type CodegenResult<T> = Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_matching_rule_message_names_formats() {
        let err = CodegenError::NoMatchingRule {
            kind: OpKind::Addition,
            specifier: Specifier::None,
            operands: vec![Format::Binary32, Format::Binary32],
            result: Format::Binary32,
            tag: Some("poly_eval".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("add"));
        assert!(msg.contains("binary32, binary32"));
        assert!(msg.contains("poly_eval"));
    }

    #[test]
    fn test_unsupported_operation_without_specifier() {
        let err = CodegenError::UnsupportedOperation {
            kind: OpKind::FastReciprocal,
            specifier: None,
            tag: None,
        };
        assert_eq!(err.to_string(), "Unsupported operation: rcp (tag: <none>)");
    }
}
