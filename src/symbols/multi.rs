//! Category-aggregated symbol tables chained to enclosing scopes.

use super::{SymbolCategory, SymbolEmitter, SymbolTable};
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{EntityArena, EntityId};
use std::cell::RefCell;
use hashbrown::HashMap;
use std::rc::Rc;

/// A category table that may be aliased by several scopes of one pass.
pub type SharedTable = Rc<RefCell<SymbolTable>>;

/// Category tables handed to a new scope instead of fresh ones.
#[derive(Debug, Clone, Default)]
pub struct SharedTables {
    tables: [Option<SharedTable>; SymbolCategory::COUNT],
}

impl SharedTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: SymbolCategory, table: SharedTable) -> Self {
        self.insert(category, table);
        self
    }

    pub fn insert(&mut self, category: SymbolCategory, table: SharedTable) {
        self.tables[category.index()] = Some(table);
    }

    pub fn contains(&self, category: SymbolCategory) -> bool {
        self.tables[category.index()].is_some()
    }

    fn get(&self, category: SymbolCategory) -> Option<&SharedTable> {
        self.tables[category.index()].as_ref()
    }
}

/// The seven category tables of one scope.
#[derive(Debug, Clone)]
pub struct ScopeTables {
    tables: [SharedTable; SymbolCategory::COUNT],
}

impl ScopeTables {
    fn new(shared: &SharedTables, uniquifier: &str) -> Self {
        let tables = SymbolCategory::ALL.map(|category| match shared.get(category) {
            Some(table) => Rc::clone(table),
            None => Rc::new(RefCell::new(SymbolTable::with_uniquifier(category, uniquifier))),
        });
        Self { tables }
    }

    pub fn get(&self, category: SymbolCategory) -> &SharedTable {
        &self.tables[category.index()]
    }

    fn is_free(&self, name: &str) -> bool {
        self.tables.iter().all(|table| table.borrow().is_free(name))
    }

    fn is_empty(&self) -> bool {
        self.tables.iter().all(|table| table.borrow().is_empty())
    }

    fn category_of(&self, name: &str) -> Option<SymbolCategory> {
        SymbolCategory::ALL
            .into_iter()
            .find(|category| !self.get(*category).borrow().is_free(name))
    }

    fn table_definition(&self, entity: EntityId) -> Option<String> {
        self.get(SymbolCategory::Table)
            .borrow()
            .has_definition(entity)
            .map(str::to_string)
    }
}

/// Symbol scope: one table per category plus the tables of every
/// enclosing scope, which are consulted but never written.
#[derive(Debug, Clone)]
pub struct MultiSymbolTable {
    local: ScopeTables,
    /// Enclosing scopes, outermost first.
    parents: Vec<ScopeTables>,
    prefix_index: HashMap<String, usize>,
    uniquifier: String,
}

impl MultiSymbolTable {
    pub fn new(shared: &SharedTables, parents: Vec<ScopeTables>, uniquifier: &str) -> Self {
        Self {
            local: ScopeTables::new(shared, uniquifier),
            parents,
            prefix_index: HashMap::new(),
            uniquifier: uniquifier.to_string(),
        }
    }

    /// Standalone scope with no shared tables and no parents.
    pub fn root(uniquifier: &str) -> Self {
        Self::new(&SharedTables::new(), Vec::new(), uniquifier)
    }

    pub fn table(&self, category: SymbolCategory) -> SharedTable {
        Rc::clone(self.local.get(category))
    }

    pub fn parents(&self) -> &[ScopeTables] {
        &self.parents
    }

    /// Parent chain for a scope nested directly inside this one.
    pub fn extended_dependency_tables(&self) -> Vec<ScopeTables> {
        let mut chain = self.parents.clone();
        chain.push(self.local.clone());
        chain
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Free in every category of this scope and of every enclosing scope.
    pub fn is_free(&self, name: &str) -> bool {
        self.local.is_free(name) && self.parents.iter().all(|scope| scope.is_free(name))
    }

    pub fn get_free_name(&mut self, prefix: &str) -> String {
        let prefix = format!("{}{}", self.uniquifier, prefix);
        if self.is_free(&prefix) {
            return prefix;
        }
        let mut index = self.prefix_index.get(&prefix).copied().unwrap_or(0);
        let mut candidate = format!("{prefix}{index}");
        while !self.is_free(&candidate) {
            index += 1;
            candidate = format!("{prefix}{index}");
        }
        self.prefix_index.insert(prefix, index + 1);
        candidate
    }

    /// Constant names come from the constant table's own counter, then get
    /// re-validated against the whole chain until one is globally free.
    pub fn get_free_constant_name(&mut self, prefix: &str) -> String {
        let constants = self.table(SymbolCategory::Constant);
        let mut candidate = constants.borrow_mut().get_free_name(prefix);
        while !self.is_free(&candidate) {
            candidate = constants.borrow_mut().get_free_suffixed_name(prefix);
        }
        candidate
    }

    /// Category holding `name` in this scope or the nearest enclosing one.
    pub fn category_of(&self, name: &str) -> Option<SymbolCategory> {
        self.local
            .category_of(name)
            .or_else(|| self.parents.iter().rev().find_map(|scope| scope.category_of(name)))
    }

    /// Declare `name` in `category`. The name must be free in every category
    /// of the chain, not only in the target table.
    pub fn declare(&mut self, category: SymbolCategory, name: &str, entity: EntityId) -> CodegenResult<()> {
        if let Some(holder) = self.category_of(name) {
            return Err(CodegenError::NameCollision { name: name.to_string(), category: holder });
        }
        self.local.get(category).borrow_mut().declare(name, entity)
    }

    pub fn declare_function(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        self.declare(SymbolCategory::Function, name, entity)
    }

    pub fn declare_component(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        self.declare(SymbolCategory::Component, name, entity)
    }

    pub fn declare_variable(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        self.declare(SymbolCategory::Variable, name, entity)
    }

    pub fn declare_signal(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        self.declare(SymbolCategory::Signal, name, entity)
    }

    pub fn declare_constant(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        self.declare(SymbolCategory::Constant, name, entity)
    }

    pub fn declare_table(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        self.declare(SymbolCategory::Table, name, entity)
    }

    pub fn declare_protected(&mut self, name: &str, entity: EntityId) -> CodegenResult<()> {
        self.declare(SymbolCategory::Protected, name, entity)
    }

    pub fn find_signal_definition(&self, entity: EntityId) -> Option<String> {
        self.local
            .get(SymbolCategory::Signal)
            .borrow()
            .has_definition(entity)
            .map(str::to_string)
    }

    /// Name of `entity` in the table category of this scope or, failing
    /// that, of the nearest enclosing scope declaring it.
    pub fn find_table_definition(&self, entity: EntityId) -> Option<String> {
        self.local
            .table_definition(entity)
            .or_else(|| self.parents.iter().rev().find_map(|scope| scope.table_definition(entity)))
    }

    pub fn emit_all_declarations(
        &self,
        entities: &EntityArena,
        emitter: &dyn SymbolEmitter,
        exclude: &[SymbolCategory],
    ) -> String {
        SymbolCategory::ALL
            .iter()
            .filter(|category| !exclude.contains(category))
            .map(|category| self.local.get(*category).borrow().emit_declarations(entities, emitter))
            .collect()
    }

    pub fn emit_all_initializations(
        &self,
        entities: &EntityArena,
        emitter: &dyn SymbolEmitter,
        include: &[SymbolCategory],
    ) -> String {
        include
            .iter()
            .map(|category| self.local.get(*category).borrow().emit_initializations(entities, emitter))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Entity, Format};
    use hashbrown::HashSet;

    struct CategoryEmitter;

    impl SymbolEmitter for CategoryEmitter {
        fn declaration(&self, name: &str, entity: &Entity) -> String {
            match entity {
                Entity::Constant { .. } => format!("const {name};\n"),
                Entity::Table { .. } => format!("table {name};\n"),
                _ => format!("var {name};\n"),
            }
        }
    }

    fn var(arena: &mut EntityArena) -> EntityId {
        arena.alloc(Entity::Variable { format: Format::Binary32 })
    }

    fn table(arena: &mut EntityArena) -> EntityId {
        arena.alloc(Entity::Table { values: Vec::new(), storage: Format::Binary32 })
    }

    #[test]
    fn test_constant_names_sequence() {
        let mut arena = EntityArena::new();
        let mut scope = MultiSymbolTable::root("");
        let mut names = Vec::new();
        for value in 0..3 {
            let name = scope.get_free_constant_name("cst");
            let id = arena.alloc(Entity::Constant {
                value: crate::ir::ConstValue::Int(value),
                format: Format::INT32,
            });
            scope.declare_constant(&name, id).unwrap();
            names.push(name);
        }
        assert_eq!(names, ["cst", "cst0", "cst1"]);
    }

    #[test]
    fn test_constant_name_avoids_other_categories() {
        let mut arena = EntityArena::new();
        let mut scope = MultiSymbolTable::root("");
        scope.declare_variable("cst", var(&mut arena)).unwrap();
        scope.declare_signal("cst0", var(&mut arena)).unwrap();

        // the constant table alone believes "cst" is free
        assert_eq!(scope.get_free_constant_name("cst"), "cst1");
    }

    #[test]
    fn test_is_free_consults_parents() {
        let mut arena = EntityArena::new();
        let mut outer = MultiSymbolTable::root("");
        outer.declare_variable("x", var(&mut arena)).unwrap();
        let mut inner = MultiSymbolTable::new(&SharedTables::new(), outer.extended_dependency_tables(), "");

        assert!(!inner.is_free("x"));
        assert_eq!(inner.get_free_name("x"), "x0");
        inner.declare_variable("x0", var(&mut arena)).unwrap();
        // the parent never sees the child's locals
        assert!(outer.is_free("x0"));
    }

    #[test]
    fn test_names_unique_across_deep_chain() {
        let mut arena = EntityArena::new();
        let mut seen = HashSet::new();
        let mut scope = MultiSymbolTable::root("");
        for depth in 0..5 {
            for _ in 0..4 {
                let name = scope.get_free_name("tmp");
                assert!(seen.insert(name.clone()), "{name} handed out twice at depth {depth}");
                scope.declare_variable(&name, var(&mut arena)).unwrap();
                let cst = scope.get_free_constant_name("tmp");
                assert!(seen.insert(cst.clone()), "{cst} handed out twice at depth {depth}");
                scope.declare_constant(&cst, var(&mut arena)).unwrap();
            }
            scope = MultiSymbolTable::new(&SharedTables::new(), scope.extended_dependency_tables(), "");
        }
    }

    #[test]
    fn test_declare_rejects_name_held_by_other_category() {
        let mut arena = EntityArena::new();
        let mut outer = MultiSymbolTable::root("");
        outer.declare_table("table", table(&mut arena)).unwrap();
        let mut inner = MultiSymbolTable::new(&SharedTables::new(), outer.extended_dependency_tables(), "");

        let err = inner.declare_function("table", var(&mut arena)).unwrap_err();
        assert_eq!(
            err,
            CodegenError::NameCollision { name: "table".to_string(), category: SymbolCategory::Table }
        );
        assert_eq!(inner.category_of("table"), Some(SymbolCategory::Table));
        assert!(inner.table(SymbolCategory::Function).borrow().is_empty());
    }

    #[test]
    fn test_shared_table_is_aliased() {
        let mut arena = EntityArena::new();
        let statics: SharedTable = Rc::new(RefCell::new(SymbolTable::new(SymbolCategory::Constant)));
        let shared = SharedTables::new().with(SymbolCategory::Constant, Rc::clone(&statics));
        let mut a = MultiSymbolTable::new(&shared, Vec::new(), "");
        let b = MultiSymbolTable::new(&shared, Vec::new(), "");

        a.declare_constant("pi", var(&mut arena)).unwrap();
        assert!(!b.is_free("pi"));
        assert_eq!(statics.borrow().len(), 1);
    }

    #[test]
    fn test_find_table_definition_walks_parents() {
        let mut arena = EntityArena::new();
        let t = table(&mut arena);
        let other = table(&mut arena);
        let mut outer = MultiSymbolTable::root("");
        outer.declare_table("log_table", t).unwrap();
        let middle = MultiSymbolTable::new(&SharedTables::new(), outer.extended_dependency_tables(), "");
        let inner = MultiSymbolTable::new(&SharedTables::new(), middle.extended_dependency_tables(), "");

        assert_eq!(inner.find_table_definition(t), Some("log_table".to_string()));
        assert_eq!(inner.find_table_definition(other), None);
    }

    #[test]
    fn test_emission_filters() {
        let mut arena = EntityArena::new();
        let mut scope = MultiSymbolTable::root("");
        scope.declare_constant("c", arena.alloc(Entity::Constant {
            value: crate::ir::ConstValue::Int(0),
            format: Format::INT32,
        })).unwrap();
        scope.declare_table("t", table(&mut arena)).unwrap();
        scope.declare_variable("v", var(&mut arena)).unwrap();

        let all = scope.emit_all_declarations(&arena, &CategoryEmitter, &[]);
        assert_eq!(all, "const c;\ntable t;\nvar v;\n");
        let no_statics = scope.emit_all_declarations(
            &arena,
            &CategoryEmitter,
            &[SymbolCategory::Constant, SymbolCategory::Table],
        );
        assert_eq!(no_statics, "var v;\n");
        assert_eq!(scope.emit_all_initializations(&arena, &CategoryEmitter, &[SymbolCategory::Constant]), "");
    }
}
