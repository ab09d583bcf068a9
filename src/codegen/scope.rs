//! Stack of code buffers enforcing LIFO scoping.
//!
//! The bottom buffer is the root (file level). Every declaration and every
//! piece of text goes to the top buffer; headers and libraries always go to
//! the root. Closing a scope merges its content into the enclosing one.

use super::buffer::{CodeBuffer, EmitOptions, TableName};
use super::emitter::emitter_for;
use super::language::Language;
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{ConstValue, Entity, EntityArena, EntityId, Format};
use crate::symbols::{SharedTable, SharedTables, SymbolCategory, SymbolEmitter, SymbolTable};
use std::cell::RefCell;
use std::rc::Rc;

/// Fixed for the lifetime of one [`NestedScopeStack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    /// Constants are declared once, at file level.
    pub static_constants: bool,
    /// Tables are declared once, at file level.
    pub static_tables: bool,
    /// Prefix prepended to every generated name.
    pub uniquifier: String,
    /// Categories whose tables are shared by every scope. Constants and
    /// tables are only shared when the matching static flag is set.
    pub shared_categories: Vec<SymbolCategory>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            static_constants: false,
            static_tables: true,
            uniquifier: String::new(),
            shared_categories: vec![
                SymbolCategory::Constant,
                SymbolCategory::Table,
                SymbolCategory::Function,
            ],
        }
    }
}

pub struct NestedScopeStack {
    language: Language,
    config: ScopeConfig,
    emitter: Box<dyn SymbolEmitter>,
    entities: EntityArena,
    statics: [SharedTable; SymbolCategory::COUNT],
    /// Root first; the last buffer is the current scope.
    buffers: Vec<CodeBuffer>,
}

impl NestedScopeStack {
    pub fn new(language: Language, config: ScopeConfig) -> Self {
        Self::with_emitter(language, config, emitter_for(language))
    }

    pub fn with_emitter(language: Language, config: ScopeConfig, emitter: Box<dyn SymbolEmitter>) -> Self {
        let statics = SymbolCategory::ALL.map(|category| {
            Rc::new(RefCell::new(SymbolTable::with_uniquifier(category, &config.uniquifier)))
        });
        let mut stack = Self {
            language,
            config,
            emitter,
            entities: EntityArena::new(),
            statics,
            buffers: Vec::new(),
        };
        let shared = stack.static_tables();
        let root = CodeBuffer::new(language, &shared, Vec::new(), &stack.config.uniquifier, true);
        stack.buffers.push(root);
        stack
    }

    fn static_tables(&self) -> SharedTables {
        let mut shared = SharedTables::new();
        for &category in &self.config.shared_categories {
            let enabled = match category {
                SymbolCategory::Constant => self.config.static_constants,
                SymbolCategory::Table => self.config.static_tables,
                _ => true,
            };
            if enabled {
                shared.insert(category, Rc::clone(&self.statics[category.index()]));
            }
        }
        shared
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn emitter(&self) -> &dyn SymbolEmitter {
        self.emitter.as_ref()
    }

    pub fn entities(&self) -> &EntityArena {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityArena {
        &mut self.entities
    }

    /// Number of buffers, root included.
    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    pub fn current(&self) -> &CodeBuffer {
        let top = self.buffers.len() - 1;
        &self.buffers[top]
    }

    pub fn current_mut(&mut self) -> &mut CodeBuffer {
        let top = self.buffers.len() - 1;
        &mut self.buffers[top]
    }

    pub fn root(&self) -> &CodeBuffer {
        &self.buffers[0]
    }

    pub fn root_mut(&mut self) -> &mut CodeBuffer {
        &mut self.buffers[0]
    }

    pub fn append(&mut self, text: &str) {
        self.current_mut().append(text);
    }

    pub fn add_comment(&mut self, text: &str) {
        self.current_mut().add_comment(text);
    }

    pub fn add_header(&mut self, header: &str) {
        self.root_mut().add_header(header);
    }

    pub fn add_library(&mut self, library: &str) {
        self.root_mut().add_library(library);
    }

    pub fn add_header_comment(&mut self, comment: &str) {
        self.root_mut().add_header_comment(comment);
    }

    /// Header needed by the current scope only; merged upward on close.
    pub fn add_local_header(&mut self, header: &str) {
        self.current_mut().add_header(header);
    }

    pub fn inc_level(&mut self) {
        self.current_mut().inc_level();
    }

    pub fn dec_level(&mut self) -> CodegenResult<()> {
        self.current_mut().dec_level()
    }

    pub fn open_scope(&mut self) {
        self.open_scope_sharing(&[]);
    }

    /// Open a scope that also shares the current scope's tables for the
    /// `extra` categories (e.g. HDL signals declared once per architecture).
    pub fn open_scope_sharing(&mut self, extra: &[SymbolCategory]) {
        self.current_mut().open_block();
        self.push_scope(extra);
    }

    fn push_scope(&mut self, extra: &[SymbolCategory]) {
        let mut shared = self.static_tables();
        let parent = self.current().symbols();
        for &category in extra {
            shared.insert(category, parent.table(category));
        }
        let parents = parent.extended_dependency_tables();
        let buffer = CodeBuffer::new(self.language, &shared, parents, &self.config.uniquifier, false);
        self.buffers.push(buffer);
        log::debug!("Opened scope at depth {}", self.buffers.len() - 1);
    }

    fn merge_top(&mut self) -> CodegenResult<()> {
        if self.buffers.len() <= 1 {
            return Err(CodegenError::InvalidScopeNesting {
                reason: "no nested scope to close".to_string(),
            });
        }
        let options = EmitOptions {
            static_constants: self.config.static_constants,
            static_tables: self.config.static_tables,
            headers: false,
            skip_functions: true,
        };
        let Some(child) = self.buffers.pop() else {
            return Err(CodegenError::InvalidScopeNesting {
                reason: "scope stack is empty".to_string(),
            });
        };
        let top = self.buffers.len() - 1;
        child.push_into(&mut self.buffers[top], &self.entities, self.emitter.as_ref(), &options)?;
        log::debug!("Closed scope at depth {}", top + 1);
        Ok(())
    }

    pub fn close_scope(&mut self) -> CodegenResult<()> {
        self.merge_top()?;
        self.current_mut().close_block()
    }

    /// Close the current scope and open a sibling after `transition`
    /// (`} else {`), sharing the same extra categories as a fresh scope.
    pub fn link_scope(&mut self, transition: &str) -> CodegenResult<()> {
        // checked before anything is popped so a failure leaves the stack intact
        if self.language.block_link(transition).is_none() {
            return Err(CodegenError::InvalidScopeNesting {
                reason: format!("{} output has no block structure", self.language),
            });
        }
        self.merge_top()?;
        self.current_mut().link_block(transition)?;
        self.push_scope(&[]);
        Ok(())
    }

    pub fn get_free_name(&mut self, prefix: &str) -> String {
        self.current_mut().get_free_name(prefix)
    }

    pub fn declare_temporary(&mut self, prefix: &str, format: Format) -> CodegenResult<String> {
        let top = self.buffers.len() - 1;
        self.buffers[top].declare_temporary(&mut self.entities, prefix, format)
    }

    pub fn declare_signal(&mut self, entity: EntityId, prefix: &str) -> CodegenResult<String> {
        self.current_mut().declare_signal(entity, prefix)
    }

    pub fn declare_constant(&mut self, entity: EntityId, prefix: &str) -> CodegenResult<String> {
        self.current_mut().declare_constant(entity, prefix)
    }

    pub fn declare_constant_value(
        &mut self,
        value: ConstValue,
        format: Format,
        prefix: &str,
    ) -> CodegenResult<String> {
        let id = self.entities.alloc(Entity::Constant { value, format });
        self.declare_constant(id, prefix)
    }

    pub fn declare_table_entity(&mut self, entity: EntityId, prefix: &str) -> CodegenResult<TableName> {
        self.current_mut().declare_table_entity(entity, prefix)
    }

    pub fn declare_function(&mut self, name: &str, entity: EntityId) -> CodegenResult<String> {
        self.current_mut().declare_function(name, entity)
    }

    /// Declare a function under a fresh name built from `prefix`.
    pub fn declare_free_function_name(&mut self, prefix: &str, entity: EntityId) -> CodegenResult<String> {
        let name = self.get_free_name(prefix);
        self.declare_function(&name, entity)
    }

    pub fn declare_component(&mut self, name: &str, entity: EntityId) -> CodegenResult<String> {
        self.current_mut().declare_component(name, entity)
    }

    pub fn declare_protected(&mut self, name: &str, entity: EntityId) -> CodegenResult<String> {
        self.current_mut().declare_protected(name, entity)
    }

    pub fn alloc_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.alloc(entity)
    }

    /// Serialize the root buffer; every nested scope must be closed.
    pub fn finish(&self, headers: bool) -> CodegenResult<String> {
        if self.buffers.len() != 1 {
            return Err(CodegenError::InvalidScopeNesting {
                reason: format!("{} scope(s) still open", self.buffers.len() - 1),
            });
        }
        let options = EmitOptions { headers, ..Default::default() };
        self.root().get(&self.entities, self.emitter.as_ref(), &options)
    }
}
