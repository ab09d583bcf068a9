//! Indentation-aware text accumulator bound to one symbol scope.
//!
//! Indentation is applied when text is appended, never retroactively: every
//! newline of the appended text is followed by the indentation of the
//! current depth, so a block-opening token must be appended before the body
//! it indents.

use super::language::Language;
use super::proof::ProofSections;
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{ConstValue, Entity, EntityArena, EntityId, Format};
use crate::symbols::{MultiSymbolTable, ScopeTables, SharedTables, SymbolCategory, SymbolEmitter};
use indexmap::IndexSet;

const TAB: &str = "    ";

/// Which categories `get`/`push_into` leave to someone else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Constants are emitted by the scope owning the static constant table.
    pub static_constants: bool,
    /// Tables are emitted by the scope owning the static table table.
    pub static_tables: bool,
    pub headers: bool,
    pub skip_functions: bool,
}

impl EmitOptions {
    fn exclusions(&self) -> Vec<SymbolCategory> {
        let mut excluded = Vec::new();
        if self.static_constants {
            excluded.push(SymbolCategory::Constant);
        }
        if self.static_tables {
            excluded.push(SymbolCategory::Table);
        }
        if self.skip_functions {
            excluded.push(SymbolCategory::Function);
        }
        excluded
    }
}

/// Language-specific behavior layered over the plain buffer.
#[derive(Debug, Clone)]
pub enum BufferFlavor {
    Plain,
    /// `shared_signals`: the signal table belongs to an enclosing scope,
    /// which declares every signal once.
    Hdl { shared_signals: bool, main_level: bool },
    Verification(ProofSections),
}

/// Result of [`CodeBuffer::declare_table_entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub name: String,
    /// The entity was already declared in a visible scope.
    pub reused: bool,
}

#[derive(Debug, Clone)]
pub struct CodeBuffer {
    language: Language,
    flavor: BufferFlavor,
    expanded: String,
    depth: usize,
    headers: IndexSet<String>,
    libraries: IndexSet<String>,
    header_comments: Vec<String>,
    symbols: MultiSymbolTable,
}

impl CodeBuffer {
    /// Buffer whose flavor follows `language`.
    pub fn new(
        language: Language,
        shared: &SharedTables,
        parents: Vec<ScopeTables>,
        uniquifier: &str,
        main_level: bool,
    ) -> Self {
        let flavor = match language {
            Language::C => BufferFlavor::Plain,
            Language::Vhdl => BufferFlavor::Hdl {
                shared_signals: shared.contains(SymbolCategory::Signal),
                main_level,
            },
            Language::Gappa => BufferFlavor::Verification(ProofSections::new()),
        };
        Self::with_flavor(language, flavor, MultiSymbolTable::new(shared, parents, uniquifier))
    }

    pub fn with_flavor(language: Language, flavor: BufferFlavor, symbols: MultiSymbolTable) -> Self {
        Self {
            language,
            flavor,
            expanded: String::new(),
            depth: 0,
            headers: IndexSet::new(),
            libraries: IndexSet::new(),
            header_comments: Vec::new(),
            symbols,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn flavor(&self) -> &BufferFlavor {
        &self.flavor
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn symbols(&self) -> &MultiSymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut MultiSymbolTable {
        &mut self.symbols
    }

    /// Accumulated body text, without declarations.
    pub fn body(&self) -> &str {
        &self.expanded
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
            && self.libraries.is_empty()
            && self.header_comments.is_empty()
            && self.symbols.is_empty()
            && self.expanded.is_empty()
    }

    pub fn append(&mut self, text: &str) {
        if self.depth == 0 {
            self.expanded.push_str(text);
            return;
        }
        let indent = format!("\n{}", TAB.repeat(self.depth));
        self.expanded.push_str(&text.replace('\n', &indent));
    }

    pub fn add_comment(&mut self, text: &str) {
        let comment = self.language.comment(text);
        self.append(&comment);
    }

    pub fn inc_level(&mut self) {
        self.depth += 1;
        self.expanded.push_str(TAB);
    }

    pub fn dec_level(&mut self) -> CodegenResult<()> {
        if self.depth == 0 {
            return Err(CodegenError::InvalidScopeNesting {
                reason: "indentation decreased below zero".to_string(),
            });
        }
        self.depth -= 1;
        if self.expanded.ends_with(TAB) {
            self.expanded.truncate(self.expanded.len() - TAB.len());
        }
        Ok(())
    }

    pub fn open_block(&mut self) {
        self.append(self.language.block_open());
        self.inc_level();
    }

    pub fn close_block(&mut self) -> CodegenResult<()> {
        self.dec_level()?;
        self.append(self.language.block_close());
        Ok(())
    }

    /// Close the current block and reopen another after `transition`.
    pub fn link_block(&mut self, transition: &str) -> CodegenResult<()> {
        let link = self.language.block_link(transition).ok_or_else(|| {
            CodegenError::InvalidScopeNesting {
                reason: format!("{} output has no block structure", self.language),
            }
        })?;
        self.dec_level()?;
        self.append(&link);
        self.inc_level();
        Ok(())
    }

    pub fn add_header(&mut self, header: &str) {
        if !self.headers.contains(header) {
            self.headers.insert(header.to_string());
        }
    }

    pub fn add_library(&mut self, library: &str) {
        if !self.libraries.contains(library) {
            self.libraries.insert(library.to_string());
        }
    }

    pub fn add_header_comment(&mut self, comment: &str) {
        self.header_comments.push(comment.to_string());
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(String::as_str)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().map(String::as_str)
    }

    pub fn proof(&self) -> Option<&ProofSections> {
        match &self.flavor {
            BufferFlavor::Verification(proof) => Some(proof),
            _ => None,
        }
    }

    pub fn proof_mut(&mut self) -> Option<&mut ProofSections> {
        match &mut self.flavor {
            BufferFlavor::Verification(proof) => Some(proof),
            _ => None,
        }
    }

    pub fn get_free_name(&mut self, prefix: &str) -> String {
        self.symbols.get_free_name(prefix)
    }

    /// Fresh name declared as a local of `format`: a signal in HDL output,
    /// a variable elsewhere.
    pub fn declare_temporary(
        &mut self,
        entities: &mut EntityArena,
        prefix: &str,
        format: Format,
    ) -> CodegenResult<String> {
        let name = self.symbols.get_free_name(prefix);
        match self.flavor {
            BufferFlavor::Hdl { .. } => {
                let id = entities.alloc(Entity::Signal { format });
                self.symbols.declare_signal(&name, id)?;
            }
            _ => {
                let id = entities.alloc(Entity::Variable { format });
                self.symbols.declare_variable(&name, id)?;
            }
        }
        Ok(name)
    }

    /// Name of an existing signal entity, declaring it on first use.
    pub fn declare_signal(&mut self, entity: EntityId, prefix: &str) -> CodegenResult<String> {
        if let Some(name) = self.symbols.find_signal_definition(entity) {
            return Ok(name);
        }
        let name = self.symbols.get_free_name(prefix);
        self.symbols.declare_signal(&name, entity)?;
        Ok(name)
    }

    pub fn declare_constant(&mut self, entity: EntityId, prefix: &str) -> CodegenResult<String> {
        let name = self.symbols.get_free_constant_name(prefix);
        self.symbols.declare_constant(&name, entity)?;
        Ok(name)
    }

    pub fn declare_constant_value(
        &mut self,
        entities: &mut EntityArena,
        value: ConstValue,
        format: Format,
        prefix: &str,
    ) -> CodegenResult<String> {
        let id = entities.alloc(Entity::Constant { value, format });
        self.declare_constant(id, prefix)
    }

    /// Existing name of `entity` anywhere in the visible scope chain, or a
    /// fresh declaration in this scope.
    pub fn declare_table_entity(&mut self, entity: EntityId, prefix: &str) -> CodegenResult<TableName> {
        if let Some(name) = self.symbols.find_table_definition(entity) {
            log::debug!("Table {:?} already declared as {}", entity, name);
            return Ok(TableName { name, reused: true });
        }
        let name = self.symbols.get_free_name(prefix);
        self.symbols.declare_table(&name, entity)?;
        Ok(TableName { name, reused: false })
    }

    pub fn declare_function(&mut self, name: &str, entity: EntityId) -> CodegenResult<String> {
        self.symbols.declare_function(name, entity)?;
        Ok(name.to_string())
    }

    pub fn declare_component(&mut self, name: &str, entity: EntityId) -> CodegenResult<String> {
        self.symbols.declare_component(name, entity)?;
        Ok(name.to_string())
    }

    pub fn declare_protected(&mut self, name: &str, entity: EntityId) -> CodegenResult<String> {
        self.symbols.declare_protected(name, entity)?;
        Ok(name.to_string())
    }

    fn check_balanced(&self) -> CodegenResult<()> {
        if self.depth != 0 {
            return Err(CodegenError::InvalidScopeNesting {
                reason: format!("{} block(s) still open", self.depth),
            });
        }
        Ok(())
    }

    fn exclusions(&self, options: &EmitOptions) -> Vec<SymbolCategory> {
        let mut excluded = options.exclusions();
        match self.flavor {
            BufferFlavor::Hdl { shared_signals: true, .. } => excluded.push(SymbolCategory::Signal),
            BufferFlavor::Verification(_) => excluded.push(SymbolCategory::Variable),
            _ => {}
        }
        excluded
    }

    fn declarations(
        &self,
        entities: &EntityArena,
        emitter: &dyn SymbolEmitter,
        options: &EmitOptions,
    ) -> String {
        let mut text = self
            .symbols
            .emit_all_declarations(entities, emitter, &self.exclusions(options));
        text.push_str(&self.symbols.emit_all_initializations(
            entities,
            emitter,
            &[SymbolCategory::Constant, SymbolCategory::Variable],
        ));
        text
    }

    fn header_code(&self) -> String {
        self.language
            .header_code(&self.header_comments, &self.headers, &self.libraries)
    }

    /// Serialized content: headers, declarations, initializations, body.
    pub fn get(
        &self,
        entities: &EntityArena,
        emitter: &dyn SymbolEmitter,
        options: &EmitOptions,
    ) -> CodegenResult<String> {
        self.check_balanced()?;
        let mut result = String::new();
        if options.headers {
            result.push_str(&self.header_code());
            result.push_str("\n\n");
        }
        result.push_str(&self.declarations(entities, emitter, options));
        if let BufferFlavor::Hdl { main_level: false, .. } = self.flavor {
            result.push_str("begin\n");
        }
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&self.expanded);
        if let BufferFlavor::Verification(proof) = &self.flavor {
            result.push_str("\n\n");
            result.push_str(&proof.complete_goal());
            result.push_str(&proof.hint_section());
        }
        Ok(result)
    }

    /// Same content as [`get`](Self::get), appended into `parent` so that it
    /// picks up the parent's current indentation.
    pub fn push_into(
        &self,
        parent: &mut CodeBuffer,
        entities: &EntityArena,
        emitter: &dyn SymbolEmitter,
        options: &EmitOptions,
    ) -> CodegenResult<()> {
        self.check_balanced()?;
        if options.headers {
            parent.append(&self.header_code());
            parent.append("\n\n");
        }
        let declarations = self.declarations(entities, emitter, options);
        parent.append(&declarations);
        match &self.flavor {
            BufferFlavor::Hdl { main_level, .. } => {
                parent.dec_level()?;
                parent.append("\n");
                if !main_level {
                    parent.append("begin\n");
                }
                parent.inc_level();
                parent.append("\n");
                parent.append(&self.expanded);
            }
            BufferFlavor::Plain => {
                if !declarations.is_empty() {
                    parent.append("\n");
                }
                parent.append(&self.expanded);
            }
            BufferFlavor::Verification(proof) => {
                if !declarations.is_empty() {
                    parent.append("\n");
                }
                parent.append(&self.expanded);
                parent.append("\n\n");
                parent.append(&proof.complete_goal());
                parent.append(&proof.hint_section());
            }
        }
        for header in &self.headers {
            parent.add_header(header);
        }
        for library in &self.libraries {
            parent.add_library(library);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::emitter::{CEmitter, GappaEmitter, VhdlEmitter};
    use crate::codegen::proof::{ProofTerm, ProofValue};

    fn root(language: Language) -> CodeBuffer {
        CodeBuffer::new(language, &SharedTables::new(), Vec::new(), "", true)
    }

    #[test]
    fn test_append_reindents_at_append_time() {
        let mut buffer = root(Language::C);
        buffer.append("a;\n");
        buffer.open_block();
        buffer.append("b;\nc;\n");
        buffer.close_block().unwrap();
        buffer.append("d;\n");
        assert_eq!(buffer.body(), "a;\n{\n    b;\n    c;\n}\nd;\n");
    }

    #[test]
    fn test_text_before_indent_change_is_not_reindented() {
        let mut buffer = root(Language::C);
        buffer.append("x");
        buffer.inc_level();
        buffer.append("\ny");
        buffer.dec_level().unwrap();
        assert_eq!(buffer.body(), "x    \n    y");
    }

    #[test]
    fn test_link_block() {
        let mut buffer = root(Language::C);
        buffer.append("if (c) ");
        buffer.open_block();
        buffer.append("a;\n");
        buffer.link_block("else").unwrap();
        buffer.append("b;\n");
        buffer.close_block().unwrap();
        assert_eq!(buffer.body(), "if (c) {\n    a;\n} else {\n    b;\n}\n");

        let mut gappa = root(Language::Gappa);
        gappa.inc_level();
        assert!(matches!(gappa.link_block("else"), Err(CodegenError::InvalidScopeNesting { .. })));
    }

    #[test]
    fn test_dec_level_underflow() {
        let mut buffer = root(Language::C);
        assert!(buffer.dec_level().is_err());
    }

    #[test]
    fn test_headers_keep_first_insertion_order() {
        let mut buffer = root(Language::C);
        buffer.add_header("math.h");
        buffer.add_header("stdint.h");
        buffer.add_header("math.h");
        buffer.add_library("m");
        buffer.add_library("m");
        assert_eq!(buffer.headers().collect::<Vec<_>>(), ["math.h", "stdint.h"]);
        assert_eq!(buffer.libraries().count(), 1);
    }

    #[test]
    fn test_get_orders_sections() {
        let mut entities = EntityArena::new();
        let mut buffer = root(Language::C);
        buffer.add_header("math.h");
        let cst = buffer
            .declare_constant_value(&mut entities, ConstValue::Float(0.5), Format::Binary32, "cst")
            .unwrap();
        let tmp = buffer.declare_temporary(&mut entities, "tmp", Format::Binary32).unwrap();
        buffer.append(&format!("{tmp} = {cst};\n"));

        let text = buffer
            .get(&entities, &CEmitter, &EmitOptions { headers: true, ..Default::default() })
            .unwrap();
        assert_eq!(
            text,
            "#include <math.h>\n\n\nconst float cst = 0.5f;\nfloat tmp;\n\ntmp = cst;\n"
        );

        let statics = buffer
            .get(&entities, &CEmitter, &EmitOptions { static_constants: true, ..Default::default() })
            .unwrap();
        assert_eq!(statics, "float tmp;\n\ntmp = cst;\n");
    }

    #[test]
    fn test_get_rejects_open_blocks() {
        let entities = EntityArena::new();
        let mut buffer = root(Language::C);
        buffer.open_block();
        let err = buffer.get(&entities, &CEmitter, &EmitOptions::default()).unwrap_err();
        assert!(matches!(err, CodegenError::InvalidScopeNesting { .. }));
    }

    #[test]
    fn test_table_declared_once() {
        let mut entities = EntityArena::new();
        let table = entities.alloc(Entity::Table {
            values: vec![ConstValue::Float(1.0)],
            storage: Format::Binary32,
        });
        let mut buffer = root(Language::C);
        let first = buffer.declare_table_entity(table, "table").unwrap();
        let second = buffer.declare_table_entity(table, "table").unwrap();
        assert_eq!(first, TableName { name: "table".to_string(), reused: false });
        assert_eq!(second, TableName { name: "table".to_string(), reused: true });
        assert_eq!(buffer.symbols().table(SymbolCategory::Table).borrow().len(), 1);
    }

    #[test]
    fn test_push_into_indents_child_content() {
        let mut entities = EntityArena::new();
        let mut parent = root(Language::C);
        parent.append("void f(void) ");
        parent.open_block();

        let parents = parent.symbols().extended_dependency_tables();
        let mut child = CodeBuffer::new(Language::C, &SharedTables::new(), parents, "", false);
        let x = child.declare_temporary(&mut entities, "x", Format::INT32).unwrap();
        child.append(&format!("{x} = 1;\n"));

        child
            .push_into(&mut parent, &entities, &CEmitter, &EmitOptions::default())
            .unwrap();
        parent.close_block().unwrap();
        assert_eq!(parent.body(), "void f(void) {\n    int32_t x;\n    \n    x = 1;\n}\n");
    }

    #[test]
    fn test_hdl_begin_marker_only_below_main_level() {
        let mut entities = EntityArena::new();
        let mut main = root(Language::Vhdl);
        let s = main.declare_temporary(&mut entities, "s", Format::LogicVector(4)).unwrap();
        main.append(&format!("{s} <= \"0000\";\n"));
        let text = main.get(&entities, &VhdlEmitter, &EmitOptions::default()).unwrap();
        assert_eq!(text, "signal s : std_logic_vector(3 downto 0);\n\ns <= \"0000\";\n");

        let nested = CodeBuffer::new(Language::Vhdl, &SharedTables::new(), Vec::new(), "", false);
        let text = nested.get(&entities, &VhdlEmitter, &EmitOptions::default()).unwrap();
        assert_eq!(text, "begin\n\n");
    }

    #[test]
    fn test_hdl_shared_signals_not_redeclared() {
        let mut entities = EntityArena::new();
        let owner = root(Language::Vhdl);
        let shared = SharedTables::new()
            .with(SymbolCategory::Signal, owner.symbols().table(SymbolCategory::Signal));
        let mut child = CodeBuffer::new(Language::Vhdl, &shared, Vec::new(), "", true);
        child.declare_temporary(&mut entities, "s", Format::Bool).unwrap();

        let text = child.get(&entities, &VhdlEmitter, &EmitOptions::default()).unwrap();
        assert!(!text.contains("signal"));
        assert!(!owner.symbols().is_free("s"));
    }

    #[test]
    fn test_verification_sections_follow_body() {
        let mut entities = EntityArena::new();
        let mut script = root(Language::Gappa);
        let y = script.declare_temporary(&mut entities, "y", Format::Binary32).unwrap();
        script.append(&format!("{y} = float<ieee_32,ne>(x * x);\n"));
        let proof = script.proof_mut().unwrap();
        proof.add_hypothesis(ProofTerm::new("x", Format::Binary32), ProofValue::Interval(0.0, 1.0));
        proof.add_goal(ProofTerm::new("y", Format::Binary32), ProofValue::Unknown);

        let text = script.get(&entities, &GappaEmitter, &EmitOptions::default()).unwrap();
        assert_eq!(
            text,
            "y = float<ieee_32,ne>(x * x);\n\n\n# goalee\n{ x in [0, 1] /\\ @FLT(x,24) -> y in ? }\n\n#hints\n"
        );
    }
}
