//! A single namespace of generated identifiers.

use super::{SymbolCategory, SymbolEmitter};
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{EntityArena, EntityId};
use indexmap::IndexMap;
use hashbrown::HashMap;

/// Name to entity mapping with identity-based reverse lookup.
///
/// Entries keep their declaration order, which is also the order in which
/// declarations are emitted.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    category: SymbolCategory,
    entries: IndexMap<String, EntityId>,
    reverse: HashMap<EntityId, String>,
    /// Next suffix to try for each (uniquified) prefix.
    prefix_index: HashMap<String, usize>,
    uniquifier: String,
}

impl SymbolTable {
    pub fn new(category: SymbolCategory) -> Self {
        Self::with_uniquifier(category, "")
    }

    /// Table whose generated names all start with `uniquifier`.
    pub fn with_uniquifier(category: SymbolCategory, uniquifier: &str) -> Self {
        Self {
            category,
            entries: IndexMap::new(),
            reverse: HashMap::new(),
            prefix_index: HashMap::new(),
            uniquifier: uniquifier.to_string(),
        }
    }

    pub fn category(&self) -> SymbolCategory {
        self.category
    }

    pub fn uniquify(&self, prefix: &str) -> String {
        format!("{}{}", self.uniquifier, prefix)
    }

    pub fn is_free(&self, name: &str) -> bool {
        !self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Free name built from `prefix`: the prefix itself when unused here,
    /// otherwise the prefix followed by the lowest suffix at or above the
    /// cached counter. Only this table is consulted.
    pub fn get_free_name(&mut self, prefix: &str) -> String {
        let prefix = self.uniquify(prefix);
        if self.is_free(&prefix) {
            return prefix;
        }
        self.next_suffixed(prefix)
    }

    /// Like [`get_free_name`](Self::get_free_name) but never returns the
    /// bare prefix; the counter always advances.
    pub fn get_free_suffixed_name(&mut self, prefix: &str) -> String {
        let prefix = self.uniquify(prefix);
        self.next_suffixed(prefix)
    }

    fn next_suffixed(&mut self, prefix: String) -> String {
        let mut index = self.prefix_index.get(&prefix).copied().unwrap_or(0);
        let mut candidate = format!("{prefix}{index}");
        while !self.is_free(&candidate) {
            index += 1;
            candidate = format!("{prefix}{index}");
        }
        self.prefix_index.insert(prefix, index + 1);
        candidate
    }

    pub fn declare(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        if !self.is_free(name) {
            return Err(CodegenError::NameCollision {
                name: name.to_string(),
                category: self.category,
            });
        }
        if let Some(existing) = self.reverse.get(&entity) {
            return Err(CodegenError::AlreadyDeclared {
                existing: existing.clone(),
                name: name.to_string(),
                category: self.category,
            });
        }
        self.entries.insert(name.to_string(), entity);
        self.reverse.insert(entity, name.to_string());
        Ok(())
    }

    pub fn has_definition(&self, entity: EntityId) -> Option<&str> {
        self.reverse.get(&entity).map(String::as_str)
    }

    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        self.entries.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn emit_declarations(&self, entities: &EntityArena, emitter: &dyn SymbolEmitter) -> String {
        self.iter()
            .map(|(name, id)| emitter.declaration(name, entities.get(id)))
            .collect()
    }

    pub fn emit_initializations(&self, entities: &EntityArena, emitter: &dyn SymbolEmitter) -> String {
        self.iter()
            .map(|(name, id)| emitter.initialization(name, entities.get(id)))
            .collect()
    }
}
