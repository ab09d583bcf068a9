//! First-match rule selection over a [`RuleTable`].

use super::rule::{GuardedRules, RuleAction, RuleTable, TypeSignature};
use crate::codegen::template::Template;
use crate::core::error::{CodegenError, CodegenResult};
use crate::ir::{Format, NodeId, OpGraph};

/// Outcome of lowering one node.
#[derive(Debug, Clone, Copy)]
pub enum Lowering<'t> {
    /// Instantiate this template on the node's operands.
    Template(&'t Template),
    /// The node was replaced; lower the new root instead.
    Rewritten(NodeId),
}

#[derive(Debug, Clone, Copy)]
pub struct InstructionSelector<'t> {
    table: &'t RuleTable,
    target: &'t str,
}

impl<'t> InstructionSelector<'t> {
    pub fn new(table: &'t RuleTable, target: &'t str) -> Self {
        Self { table, target }
    }

    pub fn target(&self) -> &'t str {
        self.target
    }

    /// The first rule whose guard holds and whose signature matches the
    /// node's formats. Groups whose guard holds but that have no matching
    /// signature are skipped.
    pub fn select(&self, graph: &OpGraph, id: NodeId) -> CodegenResult<&'t RuleAction> {
        let table: &'t RuleTable = self.table;
        let node = graph.node(id);
        if !table.contains_kind(node.kind) {
            return Err(CodegenError::UnsupportedOperation {
                kind: node.kind,
                specifier: None,
                tag: node.tag.clone(),
            });
        }
        let groups = table.groups(node.kind, node.specifier).ok_or_else(|| {
            CodegenError::UnsupportedOperation {
                kind: node.kind,
                specifier: Some(node.specifier),
                tag: node.tag.clone(),
            }
        })?;

        let operands = graph.operand_formats(id);
        if let Some((group, signature, action)) = self.find(groups, graph, id, &node.format, &operands) {
            log::debug!(
                "{}: {}.{} {} selected [{}] {}",
                self.target,
                node.kind,
                node.specifier,
                node.tag.as_deref().unwrap_or("-"),
                group.label(),
                signature
            );
            return Ok(action);
        }
        Err(CodegenError::NoMatchingRule {
            kind: node.kind,
            specifier: node.specifier,
            operands,
            result: node.format.clone(),
            tag: node.tag.clone(),
        })
    }

    /// Whether some rule would lower `id` if it had the given result and
    /// operand formats instead of its own.
    pub fn supports(&self, graph: &OpGraph, id: NodeId, result: &Format, operands: &[Format]) -> bool {
        let table: &'t RuleTable = self.table;
        let node = graph.node(id);
        table
            .groups(node.kind, node.specifier)
            .and_then(|groups| self.find(groups, graph, id, result, operands))
            .is_some()
    }

    fn find(
        &self,
        groups: &'t [GuardedRules],
        graph: &OpGraph,
        id: NodeId,
        result: &Format,
        operands: &[Format],
    ) -> Option<(&'t GuardedRules, &'t TypeSignature, &'t RuleAction)> {
        for group in groups {
            if !group.applies(graph, id) {
                continue;
            }
            for (signature, action) in group.entries() {
                if signature.matches(result, operands) {
                    return Some((group, signature, action));
                }
            }
        }
        None
    }

    /// Select a rule and apply it if it is a rewrite. The original node's
    /// attributes are forwarded onto the replacement.
    pub fn lower(&self, graph: &mut OpGraph, id: NodeId) -> CodegenResult<Lowering<'t>> {
        match self.select(graph, id)? {
            RuleAction::Template(template) => Ok(Lowering::Template(template)),
            RuleAction::Rewrite(rewrite) => {
                let replacement = rewrite(graph, id)?;
                if replacement == id {
                    return Err(CodegenError::InvalidGraph {
                        reason: format!("rewrite of {} returned the node itself", graph.node(id).kind),
                    });
                }
                graph.forward_attributes(id, replacement);
                log::debug!("{}: rewrote {:?} into {:?}", self.target, id, replacement);
                Ok(Lowering::Rewritten(replacement))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isel::rule::{GuardedRules, TypeSignature};
    use crate::ir::{ConstValue, Format, FormatClass, OpKind, Specifier};

    fn name_of(action: &RuleAction) -> String {
        match action {
            RuleAction::Template(t) => format!("{:?}", t.shape()),
            RuleAction::Rewrite(_) => "rewrite".to_string(),
        }
    }

    #[test]
    fn test_unsupported_kind_and_specifier() {
        let mut table = RuleTable::new();
        table.insert(
            OpKind::Comparison,
            Specifier::Less,
            GuardedRules::always().template(
                TypeSignature::classes(FormatClass::Any, &[FormatClass::Any, FormatClass::Any]),
                Template::infix("<"),
            ),
        );
        let selector = InstructionSelector::new(&table, "mini");

        let mut g = OpGraph::new();
        let x = g.variable("x", Format::INT32);
        let neg = g.op(OpKind::Negation, &[x], Format::INT32);
        let ge = g.op_with(OpKind::Comparison, Specifier::GreaterOrEqual, &[x, x], Format::Bool);

        assert!(matches!(
            selector.select(&g, neg),
            Err(CodegenError::UnsupportedOperation { kind: OpKind::Negation, specifier: None, .. })
        ));
        assert!(matches!(
            selector.select(&g, ge),
            Err(CodegenError::UnsupportedOperation {
                specifier: Some(Specifier::GreaterOrEqual),
                ..
            })
        ));
    }

    #[test]
    fn test_guard_without_matching_signature_falls_through() {
        let mut table = RuleTable::new();
        table.add(
            OpKind::Multiplication,
            GuardedRules::when("always true", |_, _| true)
                .template(TypeSignature::uniform(Format::Binary64, 2), Template::call("mul64")),
        );
        table.add(
            OpKind::Multiplication,
            GuardedRules::always()
                .template(TypeSignature::uniform(Format::Binary32, 2), Template::call("mul32")),
        );
        let selector = InstructionSelector::new(&table, "mini");

        let mut g = OpGraph::new();
        let x = g.variable("x", Format::Binary32);
        let m = g.op(OpKind::Multiplication, &[x, x], Format::Binary32);
        let action = selector.select(&g, m).unwrap();
        assert!(name_of(action).contains("mul32"));
    }

    #[test]
    fn test_rewrite_forwards_tag() {
        let mut table = RuleTable::new();
        table.add(
            OpKind::Negation,
            GuardedRules::always().rewrite(TypeSignature::uniform(Format::INT32, 1), |g, id| {
                let x = g.node(id).operands[0];
                let zero = g.constant(ConstValue::Int(0), Format::INT32);
                Ok(g.op(OpKind::Subtraction, &[zero, x], Format::INT32))
            }),
        );
        let selector = InstructionSelector::new(&table, "mini");

        let mut g = OpGraph::new();
        let x = g.variable("x", Format::INT32);
        let neg = g.op(OpKind::Negation, &[x], Format::INT32);
        g.tagged(neg, "flip");

        let Lowering::Rewritten(sub) = selector.lower(&mut g, neg).unwrap() else {
            panic!("expected a rewrite");
        };
        assert_eq!(g.node(sub).kind, OpKind::Subtraction);
        assert_eq!(g.node(sub).tag.as_deref(), Some("flip"));
    }

    #[test]
    fn test_self_rewrite_is_rejected() {
        let mut table = RuleTable::new();
        table.add(
            OpKind::Abs,
            GuardedRules::always().rewrite(TypeSignature::uniform(Format::INT32, 1), |_, id| Ok(id)),
        );
        let selector = InstructionSelector::new(&table, "mini");
        let mut g = OpGraph::new();
        let x = g.variable("x", Format::INT32);
        let abs = g.op(OpKind::Abs, &[x], Format::INT32);
        assert!(matches!(selector.lower(&mut g, abs), Err(CodegenError::InvalidGraph { .. })));
    }
}
