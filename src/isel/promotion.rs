//! Register promotion of vector subgraphs.
//!
//! Generic vector formats (`v8float32`, ...) are memory layouts; the SIMD
//! rules of a target match its native register formats (`__m256`, ...).
//! Promotion retypes every node whose vector format has a register
//! counterpart, provided the target can lower the retyped node, and inserts
//! a `Conversion` wherever a promoted value meets an unpromoted one: loads
//! into registers on the way in, stores back to memory on the way out.

use super::selector::InstructionSelector;
use crate::ir::{Format, NodeId, OpGraph, OpKind};
use hashbrown::{HashMap, HashSet};

/// Translation from generic formats to a target's register formats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromotionTable {
    entries: Vec<(Format, Format)>,
}

impl PromotionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `from` to `register`, replacing any earlier mapping of `from`.
    pub fn insert(&mut self, from: Format, register: Format) {
        match self.entries.iter_mut().find(|(format, _)| *format == from) {
            Some(entry) => entry.1 = register,
            None => self.entries.push((from, register)),
        }
    }

    pub fn get(&self, format: &Format) -> Option<&Format> {
        self.entries
            .iter()
            .find(|(from, _)| from == format)
            .map(|(_, register)| register)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Format, &Format)> {
        self.entries.iter().map(|(from, register)| (from, register))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mappings of `self` layered over those of `base`.
    pub fn compose_over(&self, base: &PromotionTable) -> PromotionTable {
        let mut composed = base.clone();
        for (from, register) in &self.entries {
            composed.insert(from.clone(), register.clone());
        }
        composed
    }

    fn promoted(&self, format: &Format) -> Format {
        self.get(format).cloned().unwrap_or_else(|| format.clone())
    }
}

/// Promote the expressions reachable from `root`. Returns the number of
/// retyped nodes.
pub fn promote_registers(
    graph: &mut OpGraph,
    root: NodeId,
    table: &PromotionTable,
    selector: &InstructionSelector<'_>,
) -> usize {
    if table.is_empty() {
        return 0;
    }
    let mut reachable: Vec<NodeId> = graph.use_counts(root).into_keys().collect();
    reachable.sort();

    let mut promoted = HashSet::new();
    for &id in &reachable {
        let node = graph.node(id);
        let info = node.kind.info();
        // conversions are the boundaries themselves
        if info.is_leaf || info.is_statement || node.kind == OpKind::Conversion {
            continue;
        }
        let Some(register) = table.get(&node.format) else {
            continue;
        };
        let operands: Vec<Format> = graph
            .operand_formats(id)
            .iter()
            .map(|format| table.promoted(format))
            .collect();
        if selector.supports(graph, id, register, &operands) {
            promoted.insert(id);
        } else {
            log::debug!("{}: {} on {} stays in memory", selector.target(), node.kind, node.format);
        }
    }
    if promoted.is_empty() {
        return 0;
    }

    let mut loads: HashMap<NodeId, NodeId> = HashMap::new();
    let mut stores: HashMap<NodeId, NodeId> = HashMap::new();
    for &id in &reachable {
        let inside = promoted.contains(&id);
        let mut operands = graph.node(id).operands.clone();
        for operand in operands.iter_mut() {
            let original = *operand;
            let format = graph.node(original).format.clone();
            match (inside, promoted.contains(&original)) {
                (true, false) => {
                    if let Some(register) = table.get(&format) {
                        let register = register.clone();
                        *operand = *loads
                            .entry(original)
                            .or_insert_with(|| graph.op(OpKind::Conversion, &[original], register));
                    }
                }
                (false, true) => {
                    *operand = *stores
                        .entry(original)
                        .or_insert_with(|| graph.op(OpKind::Conversion, &[original], format));
                }
                _ => {}
            }
        }
        graph.node_mut(id).operands = operands;
    }
    for &id in &promoted {
        let register = table.promoted(&graph.node(id).format);
        graph.node_mut(id).format = register;
    }
    log::debug!(
        "{}: promoted {} node(s), {} load(s), {} store(s)",
        selector.target(),
        promoted.len(),
        loads.len(),
        stores.len()
    );
    promoted.len()
}
