//! Declared entities and the arena that gives them identity.
//!
//! Symbol tables map names to [`EntityId`] handles, never to entity values,
//! so two tables holding the same numbers are still two different entities
//! and deduplication only ever applies to the very same handle.

use super::format::Format;
use super::graph::ConstValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

/// Something a generated program declares by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Constant { value: ConstValue, format: Format },
    Variable { format: Format },
    Signal { format: Format },
    Table { values: Vec<ConstValue>, storage: Format },
    Function { result: Format, args: Vec<(String, Format)> },
    Component { ports: Vec<Port> },
    /// Reserved names that must not be reused (function arguments, ports).
    Protected { format: Format },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub name: String,
    pub format: Format,
    pub output: bool,
}

impl Entity {
    pub fn format(&self) -> Option<&Format> {
        match self {
            Entity::Constant { format, .. }
            | Entity::Variable { format }
            | Entity::Signal { format }
            | Entity::Protected { format } => Some(format),
            Entity::Table { storage, .. } => Some(storage),
            Entity::Function { result, .. } => Some(result),
            Entity::Component { .. } => None,
        }
    }
}

/// Owner of every entity created during one generation pass.
#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    entities: Vec<Entity>,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(entity);
        id
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
