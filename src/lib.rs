//! mlgen - retargetable source-code generation for elementary functions.
//!
//! mlgen takes an operation graph built by a numeric scheme (polynomial
//! evaluation, range reduction, table lookups) and emits it as C, VHDL or a
//! Gappa verification script. Every target carries one rule table per output
//! language; instruction selection walks those tables in registration order
//! and the first matching entry decides how a node is lowered.
//!
//! # Primary Usage
//!
//! ```ignore
//! use mlgen::codegen::{generate_module, GeneratorOptions};
//! use mlgen::core::GenerationSession;
//! use mlgen::ir::parse_module;
//! use mlgen::targets::TargetRegistry;
//! use bumpalo::Bump;
//!
//! let registry = TargetRegistry::with_builtins()?;
//! let target = registry.get("x86_avx2")?;
//!
//! let arena = Bump::new();
//! let session = GenerationSession::new(&arena);
//! let mut module = parse_module(&text)?;
//! let code = generate_module(
//!     target,
//!     &session,
//!     GeneratorOptions::default(),
//!     &mut module.graph,
//!     &module.functions,
//! )?;
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - Operation graph, formats and declared entities
//! - [`symbols`] - Per-category symbol tables chained across scopes
//! - [`codegen`] - Scoped code buffers, templates and the generator
//! - [`isel`] - Rule tables, the first-match instruction selector and register promotion
//! - [`targets`] - Built-in targets and the target registry
//! - [`core`] - Errors and the generation session

pub mod codegen;
pub mod core;
pub mod ir;
pub mod isel;
pub mod symbols;
pub mod targets;

pub use crate::codegen::{generate_module, CodeGenerator, GeneratorOptions, Language, NestedScopeStack, ScopeConfig};
pub use crate::core::{CodegenError, CodegenResult, GenerationSession, SessionStats};
pub use crate::ir::{parse_module, Format, FunctionDef, OpGraph, OpKind, ParsedModule};
pub use crate::isel::{InstructionSelector, RuleTable};
pub use crate::targets::{TargetBuilder, TargetDescriptor, TargetRegistry};
