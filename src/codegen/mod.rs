// This module turns an operation graph into program text. CodeBuffer accumulates indented
// text for one lexical scope together with its headers, libraries and symbol tables;
// NestedScopeStack keeps those buffers in strict LIFO order and merges a closed scope into
// its parent. Language captures the lexical conventions of C, VHDL and Gappa (block tokens,
// comments, assignments, literals, header clauses) and the emitters turn declared entities
// into declaration text. Templates are the leaves of the rule tables: a call, infix, prefix
// or raw-pattern fragment instantiated over already-lowered operand code. The generator
// walks a function body in post-order, asks the instruction selector for each node and
// materializes shared values into temporaries of the current scope.

//! Scoped text emission and the operation-graph code generator.

pub mod buffer;
pub mod emitter;
pub mod generator;
pub mod language;
pub mod proof;
pub mod scope;
pub mod template;

pub use buffer::{BufferFlavor, CodeBuffer, EmitOptions, TableName};
pub use emitter::{emitter_for, CEmitter, GappaEmitter, VhdlEmitter};
pub use generator::{generate_module, CodeGenerator, GeneratorOptions};
pub use language::Language;
pub use proof::{Hint, ProofSections, ProofTerm, ProofValue};
pub use scope::{NestedScopeStack, ScopeConfig};
pub use template::{Template, TemplateArg, TemplateContext, TemplateShape};
