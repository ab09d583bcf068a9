//! Operation-graph walker emitting one function at a time.
//!
//! The generator owns the scope stack of the output file. Expression nodes
//! are lowered in post-order with an explicit work stack, each through the
//! instruction selector of the chosen target; leaves and statements are
//! handled here directly. Lowered code is memoised per scope level so that a
//! temporary declared in a closed block is never referenced outside it.

use super::language::Language;
use super::proof::{ProofTerm, ProofValue};
use super::scope::{NestedScopeStack, ScopeConfig};
use super::template::{Template, TemplateContext};
use crate::core::error::{CodegenError, CodegenResult};
use crate::core::session::GenerationSession;
use crate::ir::{Entity, EntityId, Format, FunctionDef, NodeId, OpGraph, OpKind, Payload, Port};
use crate::isel::{promote_registers, InstructionSelector, Lowering};
use crate::targets::TargetDescriptor;
use hashbrown::{HashMap, HashSet};

/// Name of the function result in HDL and verification output.
const RESULT_NAME: &str = "vr_out";

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub language: Language,
    /// Declare every scalar constant instead of inlining its literal.
    pub declare_constants: bool,
    /// Store the value of every tagged node in a named temporary.
    pub materialize_tagged: bool,
    pub headers: bool,
    pub header_comments: Vec<String>,
    pub scope: ScopeConfig,
    /// Keep vector formats in the target's native registers where it has any.
    pub promote_registers: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            language: Language::C,
            declare_constants: false,
            materialize_tagged: false,
            headers: true,
            header_comments: Vec::new(),
            scope: ScopeConfig::default(),
            promote_registers: true,
        }
    }
}

impl GeneratorOptions {
    pub fn for_language(language: Language) -> Self {
        Self { language, ..Self::default() }
    }
}

enum Work<'t> {
    Visit(NodeId),
    Emit(NodeId, &'t Template),
    /// The first node takes the code of its rewritten replacement.
    Alias(NodeId, NodeId),
}

/// Function being generated.
struct Frame {
    result_name: String,
    result: Format,
}

struct EmitContext<'c, 'arena> {
    scopes: &'c mut NestedScopeStack,
    session: &'c GenerationSession<'arena>,
}

impl TemplateContext for EmitContext<'_, '_> {
    fn require_header(&mut self, header: &str) {
        self.scopes.add_header(header);
    }

    fn require_library(&mut self, library: &str) {
        self.scopes.add_library(library);
    }

    fn materialize(&mut self, code: &str, format: &Format) -> CodegenResult<String> {
        materialize(self.scopes, self.session, "tmp", code, format)
    }

    fn type_name(&self, format: &Format) -> String {
        self.scopes.language().type_name(format)
    }
}

fn materialize(
    scopes: &mut NestedScopeStack,
    session: &GenerationSession<'_>,
    prefix: &str,
    code: &str,
    format: &Format,
) -> CodegenResult<String> {
    let language = scopes.language();
    let name = scopes.declare_temporary(prefix, format.clone())?;
    scopes.append(&language.assignment(&name, code, language == Language::Vhdl));
    session.record_temporary();
    Ok(name)
}

fn invalid(reason: impl Into<String>) -> CodegenError {
    CodegenError::InvalidGraph { reason: reason.into() }
}

pub struct CodeGenerator<'t, 's, 'arena> {
    target: &'t TargetDescriptor,
    selector: InstructionSelector<'t>,
    options: GeneratorOptions,
    session: &'s GenerationSession<'arena>,
    scopes: NestedScopeStack,
    memo: Vec<HashMap<NodeId, String>>,
    uses: HashMap<NodeId, usize>,
    /// Entity of each table node, so every use of a node names one table.
    tables: HashMap<NodeId, EntityId>,
    frame: Option<Frame>,
    /// Depth of nested HDL conditionals; only the outermost opens a process.
    processes: usize,
}

impl<'t, 's, 'arena> CodeGenerator<'t, 's, 'arena> {
    pub fn new(
        target: &'t TargetDescriptor,
        session: &'s GenerationSession<'arena>,
        options: GeneratorOptions,
    ) -> CodegenResult<Self> {
        let table = target.rule_table(options.language)?;
        let selector = InstructionSelector::new(table, target.name());
        let mut scopes = NestedScopeStack::new(options.language, options.scope.clone());
        for comment in &options.header_comments {
            scopes.add_header_comment(comment);
        }
        if options.language == Language::Vhdl {
            scopes.add_library("ieee");
            scopes.add_header("ieee.std_logic_1164.all");
            scopes.add_header("ieee.numeric_std.all");
        }
        Ok(Self {
            target,
            selector,
            options,
            session,
            scopes,
            memo: vec![HashMap::new()],
            uses: HashMap::new(),
            tables: HashMap::new(),
            frame: None,
            processes: 0,
        })
    }

    pub fn target(&self) -> &'t TargetDescriptor {
        self.target
    }

    pub fn scopes(&self) -> &NestedScopeStack {
        &self.scopes
    }

    pub fn generate_function(&mut self, graph: &mut OpGraph, function: &FunctionDef) -> CodegenResult<()> {
        self.session.set_current_function(&function.name);
        if self.options.promote_registers {
            let promoted = promote_registers(graph, function.body, self.target.promotions(), &self.selector);
            self.session.record_promotions(promoted);
        }
        self.uses = graph.use_counts(function.body).into_iter().collect();
        self.memo = vec![HashMap::new()];
        let before = self.scopes.root().body().len();

        match self.options.language {
            Language::C => self.c_function(graph, function)?,
            Language::Vhdl => self.hdl_entity(graph, function)?,
            Language::Gappa => self.proof_script(graph, function)?,
        }
        self.frame = None;

        let size = self.scopes.root().body().len().saturating_sub(before);
        log::debug!(
            "Generated {} for {} ({} bytes)",
            function.name,
            self.target.name(),
            size
        );
        self.session.record_function_generated(&function.name, size);
        Ok(())
    }

    /// Serialize the whole output file.
    pub fn finish(self) -> CodegenResult<String> {
        self.scopes.finish(self.options.headers)
    }

    fn c_function(&mut self, graph: &mut OpGraph, function: &FunctionDef) -> CodegenResult<()> {
        self.scopes.add_header("stdint.h");
        let signature = function
            .args
            .iter()
            .map(|arg| (arg.name.clone(), arg.format.clone()))
            .collect();
        let entity = self.scopes.alloc_entity(Entity::Function {
            result: function.result.clone(),
            args: signature,
        });
        self.scopes.declare_function(&function.name, entity)?;

        let args: Vec<String> = function
            .args
            .iter()
            .map(|arg| format!("{} {}", arg.format.c_name(), arg.name))
            .collect();
        let args = if args.is_empty() { "void".to_string() } else { args.join(", ") };
        self.scopes
            .append(&format!("{} {}({}) ", function.result.c_name(), function.name, args));

        self.open_scope();
        for arg in &function.args {
            self.protect(&arg.name, &arg.format)?;
        }
        self.frame = Some(Frame { result_name: String::new(), result: function.result.clone() });
        self.lower_statement(graph, function.body)?;
        self.close_scope()?;
        self.scopes.append("\n");
        Ok(())
    }

    fn hdl_entity(&mut self, graph: &mut OpGraph, function: &FunctionDef) -> CodegenResult<()> {
        let mut ports: Vec<Port> = function
            .args
            .iter()
            .map(|arg| Port { name: arg.name.clone(), format: arg.format.clone(), output: false })
            .collect();
        ports.push(Port {
            name: RESULT_NAME.to_string(),
            format: function.result.clone(),
            output: true,
        });
        self.protect(&function.name, &function.result)?;

        let port_lines: Vec<String> = ports
            .iter()
            .map(|port| {
                let direction = if port.output { "out" } else { "in" };
                format!("{} : {} {}", port.name, direction, port.format.vhdl_name())
            })
            .collect();
        self.scopes.append(&format!("entity {} is\n", function.name));
        self.scopes.inc_level();
        self.scopes.append("port (\n");
        self.scopes.inc_level();
        self.scopes.append(&port_lines.join(";\n"));
        self.scopes.append("\n");
        self.scopes.dec_level()?;
        self.scopes.append(");\n");
        self.scopes.dec_level()?;
        self.scopes.append(&format!("end entity {};\n\n", function.name));

        self.scopes
            .append(&format!("architecture rtl of {} is\n", function.name));
        self.open_scope();
        for port in &ports {
            self.protect(&port.name, &port.format)?;
        }
        self.frame = Some(Frame {
            result_name: RESULT_NAME.to_string(),
            result: function.result.clone(),
        });
        self.lower_statement(graph, function.body)?;
        self.close_scope()?;
        self.scopes.append("end architecture rtl;\n\n");
        Ok(())
    }

    /// Verification scripts are flat: the body is emitted at file level and
    /// input ranges become hypotheses.
    fn proof_script(&mut self, graph: &mut OpGraph, function: &FunctionDef) -> CodegenResult<()> {
        self.scopes.add_comment(&function.name);
        for arg in &function.args {
            if self.scopes.current().symbols().is_free(&arg.name) {
                self.protect(&arg.name, &arg.format)?;
            }
            if let Some((lo, hi)) = arg.range {
                if let Some(proof) = self.scopes.root_mut().proof_mut() {
                    proof.add_hypothesis(
                        ProofTerm::new(arg.name.as_str(), arg.format.clone()),
                        ProofValue::Interval(lo, hi),
                    );
                }
            }
        }
        let result_name = self.scopes.get_free_name(RESULT_NAME);
        self.protect(&result_name, &function.result)?;
        self.frame = Some(Frame { result_name, result: function.result.clone() });
        self.lower_statement(graph, function.body)?;
        self.scopes.append("\n");
        Ok(())
    }

    fn protect(&mut self, name: &str, format: &Format) -> CodegenResult<()> {
        let entity = self.scopes.alloc_entity(Entity::Protected { format: format.clone() });
        self.scopes.declare_protected(name, entity)?;
        Ok(())
    }

    fn open_scope(&mut self) {
        self.scopes.open_scope();
        self.memo.push(HashMap::new());
        self.session.record_scope_opened();
    }

    fn close_scope(&mut self) -> CodegenResult<()> {
        self.memo.pop();
        self.scopes.close_scope()
    }

    fn link_scope(&mut self, transition: &str) -> CodegenResult<()> {
        self.memo.pop();
        self.scopes.link_scope(transition)?;
        self.memo.push(HashMap::new());
        self.session.record_scope_opened();
        Ok(())
    }

    fn lookup(&self, id: NodeId) -> Option<&String> {
        self.memo.iter().rev().find_map(|level| level.get(&id))
    }

    fn remember(&mut self, id: NodeId, code: String) {
        if let Some(level) = self.memo.last_mut() {
            level.insert(id, code);
        }
    }

    fn lower_statement(&mut self, graph: &mut OpGraph, id: NodeId) -> CodegenResult<()> {
        match graph.node(id).kind {
            OpKind::Statement => {
                let statements = graph.node(id).operands.clone();
                for statement in statements {
                    self.lower_statement(graph, statement)?;
                }
            }
            OpKind::Return => {
                let value = *graph
                    .node(id)
                    .operands
                    .first()
                    .ok_or_else(|| invalid("return without a value"))?;
                let code = self.lower_expression(graph, value)?;
                self.emit_return(&code)?;
            }
            OpKind::ConditionBlock => self.lower_condition(graph, id)?,
            _ => {
                self.lower_expression(graph, id)?;
            }
        }
        Ok(())
    }

    fn emit_return(&mut self, code: &str) -> CodegenResult<()> {
        let frame = self.frame.as_ref().ok_or_else(|| invalid("return outside of a function"))?;
        match self.options.language {
            Language::C => self.scopes.append(&format!("return {code};\n")),
            Language::Vhdl => {
                let line = Language::Vhdl.assignment(&frame.result_name, code, true);
                self.scopes.append(&line);
            }
            Language::Gappa => {
                let line = Language::Gappa.assignment(&frame.result_name, code, false);
                let goal = ProofTerm::new(frame.result_name.as_str(), frame.result.clone());
                self.scopes.append(&line);
                if let Some(proof) = self.scopes.root_mut().proof_mut() {
                    proof.add_goal(goal, ProofValue::Unknown);
                }
            }
        }
        Ok(())
    }

    fn lower_condition(&mut self, graph: &mut OpGraph, id: NodeId) -> CodegenResult<()> {
        let operands = graph.node(id).operands.clone();
        let (condition, then_branch, else_branch) = match operands.as_slice() {
            [c, t] => (*c, *t, None),
            [c, t, e] => (*c, *t, Some(*e)),
            _ => return Err(invalid(format!("conditional block with {} operands", operands.len()))),
        };
        let condition = self.lower_expression(graph, condition)?;

        match self.options.language {
            Language::C => {
                self.scopes.append(&format!("if ({condition}) "));
                self.open_scope();
                self.lower_statement(graph, then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.link_scope("else")?;
                    self.lower_statement(graph, else_branch)?;
                }
                self.close_scope()?;
            }
            Language::Vhdl => {
                let outermost = self.processes == 0;
                if outermost {
                    self.scopes.append("process(all)\nbegin\n");
                    self.scopes.inc_level();
                }
                self.processes += 1;
                self.scopes.append(&format!("if {condition} = '1' then\n"));
                self.hdl_branch(graph, then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.scopes.append("else\n");
                    self.hdl_branch(graph, else_branch)?;
                }
                self.scopes.append("end if;\n");
                self.processes -= 1;
                if outermost {
                    self.scopes.dec_level()?;
                    self.scopes.append("end process;\n");
                }
            }
            Language::Gappa => {
                return Err(invalid("verification scripts cannot branch"));
            }
        }
        Ok(())
    }

    fn hdl_branch(&mut self, graph: &mut OpGraph, branch: NodeId) -> CodegenResult<()> {
        self.scopes.inc_level();
        self.memo.push(HashMap::new());
        self.lower_statement(graph, branch)?;
        self.memo.pop();
        self.scopes.dec_level()
    }

    /// Code of the value of `root`, lowering every operand not yet lowered
    /// in the visible scope levels.
    fn lower_expression(&mut self, graph: &mut OpGraph, root: NodeId) -> CodegenResult<String> {
        let selector = self.selector;
        let mut pending: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![Work::Visit(root)];
        while let Some(work) = stack.pop() {
            match work {
                Work::Visit(id) => {
                    if self.lookup(id).is_some() {
                        continue;
                    }
                    if !pending.insert(id) {
                        return Err(invalid(format!("cycle through node {:?}", id)));
                    }
                    let info = graph.node(id).kind.info();
                    if info.is_statement {
                        return Err(invalid(format!("statement '{}' used as a value", info.name)));
                    }
                    if info.is_leaf {
                        let code = self.lower_leaf(graph, id)?;
                        pending.remove(&id);
                        self.remember(id, code);
                        continue;
                    }
                    match selector.lower(graph, id)? {
                        Lowering::Template(template) => {
                            stack.push(Work::Emit(id, template));
                            for &operand in graph.node(id).operands.iter().rev() {
                                stack.push(Work::Visit(operand));
                            }
                        }
                        Lowering::Rewritten(replacement) => {
                            self.session.record_rewrite();
                            self.account_rewrite(graph, id, replacement);
                            stack.push(Work::Alias(id, replacement));
                            stack.push(Work::Visit(replacement));
                        }
                    }
                }
                Work::Emit(id, template) => {
                    let code = self.emit_node(graph, id, template)?;
                    pending.remove(&id);
                    self.remember(id, code);
                }
                Work::Alias(id, replacement) => {
                    let code = self
                        .lookup(replacement)
                        .cloned()
                        .ok_or_else(|| invalid(format!("replacement {:?} was not lowered", replacement)))?;
                    pending.remove(&id);
                    self.remember(id, code);
                }
            }
        }
        self.lookup(root)
            .cloned()
            .ok_or_else(|| invalid(format!("node {:?} produced no code", root)))
    }

    /// Move the uses of `old` onto `new` and count the operands of every
    /// node the rewrite created.
    fn account_rewrite(&mut self, graph: &OpGraph, old: NodeId, new: NodeId) {
        let count = self.uses.get(&old).copied().unwrap_or(1);
        for operand in &graph.node(old).operands {
            if let Some(uses) = self.uses.get_mut(operand) {
                *uses = uses.saturating_sub(1);
            }
        }
        let fresh = !self.uses.contains_key(&new);
        *self.uses.entry(new).or_insert(0) += count;
        if !fresh {
            return;
        }
        let mut stack = vec![new];
        while let Some(id) = stack.pop() {
            for &operand in &graph.node(id).operands {
                let first_use = !self.uses.contains_key(&operand);
                *self.uses.entry(operand).or_insert(0) += 1;
                if first_use {
                    stack.push(operand);
                }
            }
        }
    }

    fn lower_leaf(&mut self, graph: &OpGraph, id: NodeId) -> CodegenResult<String> {
        let node = graph.node(id);
        match &node.payload {
            Payload::Variable(name) => Ok(name.clone()),
            Payload::Constant(value) => {
                let declare = self.options.declare_constants || node.tag.is_some() || node.format.is_vector();
                if declare {
                    let prefix = node.tag.as_deref().unwrap_or("cst");
                    self.scopes
                        .declare_constant_value(*value, node.format.clone(), prefix)
                } else {
                    Ok(self.options.language.literal(*value, &node.format))
                }
            }
            Payload::Table(values) => {
                let entity = match self.tables.get(&id) {
                    Some(&entity) => entity,
                    None => {
                        let storage = match &node.format {
                            Format::Table { storage, .. } => storage.as_ref().clone(),
                            other => other.clone(),
                        };
                        let entity = self.scopes.alloc_entity(Entity::Table {
                            values: values.clone(),
                            storage,
                        });
                        self.tables.insert(id, entity);
                        entity
                    }
                };
                let table = self
                    .scopes
                    .declare_table_entity(entity, node.tag.as_deref().unwrap_or("table"))?;
                if table.reused {
                    self.session.record_table_deduplicated();
                }
                Ok(table.name)
            }
            Payload::None => Err(invalid(format!("leaf '{}' carries no value", node.kind))),
        }
    }

    fn emit_node(&mut self, graph: &OpGraph, id: NodeId, template: &Template) -> CodegenResult<String> {
        let node = graph.node(id);
        let operands = node
            .operands
            .iter()
            .map(|operand| {
                self.lookup(*operand)
                    .cloned()
                    .ok_or_else(|| invalid(format!("operand {:?} was not lowered", operand)))
            })
            .collect::<CodegenResult<Vec<_>>>()?;
        self.session.record_node_lowered(node.kind);
        let prefix = node.tag.as_deref().unwrap_or("tmp");

        if template.is_writing_result() {
            let name = self.scopes.declare_temporary(prefix, node.format.clone())?;
            self.session.record_temporary();
            let mut ctx = EmitContext { scopes: &mut self.scopes, session: self.session };
            let mut code = template.instantiate(&operands, Some(&name), &node.format, &mut ctx)?;
            if !code.ends_with('\n') {
                code.push('\n');
            }
            self.scopes.append(&code);
            return Ok(name);
        }

        let mut ctx = EmitContext { scopes: &mut self.scopes, session: self.session };
        let code = template.instantiate(&operands, None, &node.format, &mut ctx)?;
        let shared = self.uses.get(&id).copied().unwrap_or(0) > 1;
        let tagged = self.options.materialize_tagged && node.tag.is_some();
        if !template.is_materialized() && (shared || tagged) {
            materialize(&mut self.scopes, self.session, prefix, &code, &node.format)
        } else {
            Ok(code)
        }
    }
}

/// Generate every function of a module into one output file.
pub fn generate_module(
    target: &TargetDescriptor,
    session: &GenerationSession<'_>,
    options: GeneratorOptions,
    graph: &mut OpGraph,
    functions: &[FunctionDef],
) -> CodegenResult<String> {
    let mut generator = CodeGenerator::new(target, session, options)?;
    for function in functions {
        generator.generate_function(graph, function)?;
    }
    generator.finish()
}
