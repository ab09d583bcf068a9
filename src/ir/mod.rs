// This module holds the operation-graph data model that the code generator consumes. The
// graph is produced by a numeric scheme outside this crate: nodes carry an operation kind,
// an optional specifier, ordered operands, a result format and an optional diagnostic tag.
// Formats describe value types (IEEE binaries, integers, fixed-point, vectors, x86
// register formats, HDL logic vectors, tables) and format classes let rule signatures
// match structurally. Entities are the things a generated program declares by name;
// they live in an arena and are referred to by handle so identity never depends on value
// equality. A small line-oriented text format with a hand-written parser lets tests and
// the mlgen binary build graphs without a numeric front end.

//! Operation graph, formats and declared entities.

pub mod entity;
pub mod format;
pub mod graph;
pub mod parser;

pub use entity::{Entity, EntityArena, EntityId, Port};
pub use format::{Format, FormatClass, RegisterFormat};
pub use graph::{
    ConstValue, FunctionArg, FunctionDef, Node, NodeId, OpGraph, OpInfo, OpKind, Payload, Specifier,
};
pub use parser::{parse_module, ParsedModule};
