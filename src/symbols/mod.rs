// This module implements the naming side of code emission. A SymbolTable is one namespace
// mapping generated identifiers to entity handles, with a reverse map for identity lookups
// and a per-prefix counter for deterministic unique-name synthesis. A MultiSymbolTable puts
// one table per entity category (constant, function, variable, signal, protected, table,
// component) behind a single scope and chains to the tables of every enclosing scope, so a
// name is only handed out when it is free across all categories of the whole lexical chain.
// Category tables can be shared by reference between scopes; that is how process-wide
// "static" constants, tables and functions are declared once and seen everywhere. The
// SymbolEmitter trait is the per-language callback used to turn declared entries into
// declaration and initialization text.

//! Symbol tables and scope chains used while emitting code.

pub mod multi;
pub mod table;

pub use multi::{MultiSymbolTable, ScopeTables, SharedTable, SharedTables};
pub use table::SymbolTable;

use crate::ir::Entity;
use std::fmt;

/// Entity category; each has its own table inside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolCategory {
    Function,
    Component,
    Constant,
    Table,
    Signal,
    Variable,
    Protected,
}

impl SymbolCategory {
    pub const COUNT: usize = 7;

    /// All categories, in declaration emission order.
    pub const ALL: [SymbolCategory; SymbolCategory::COUNT] = [
        SymbolCategory::Function,
        SymbolCategory::Component,
        SymbolCategory::Constant,
        SymbolCategory::Table,
        SymbolCategory::Signal,
        SymbolCategory::Variable,
        SymbolCategory::Protected,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            SymbolCategory::Function => "function",
            SymbolCategory::Component => "component",
            SymbolCategory::Constant => "constant",
            SymbolCategory::Table => "table",
            SymbolCategory::Signal => "signal",
            SymbolCategory::Variable => "variable",
            SymbolCategory::Protected => "protected",
        }
    }
}

impl fmt::Display for SymbolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-language formatting of declared entities.
pub trait SymbolEmitter {
    fn declaration(&self, name: &str, entity: &Entity) -> String;

    /// Extra setup after declaration; most entities need none.
    fn initialization(&self, _name: &str, _entity: &Entity) -> String {
        String::new()
    }
}
