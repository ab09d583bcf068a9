// This module is the table-driven instruction selector. A rule table is keyed by operation
// kind, then by specifier; under each key sits an ordered list of guarded rule groups and
// each group holds an ordered list of (type signature, action) entries. An action is either
// a code template instantiated on the operands or a rewrite that replaces the node with an
// equivalent subgraph to be lowered in its place. Selection walks the groups in declared
// order, skips groups whose guard is false and takes the first signature matching the
// node's concrete formats: first match wins, never best match. Rule tables of derived
// targets are layered over their parent's so overrides are tried before inherited rules.
// A construction-time lint reports entries that an earlier entry always shadows.
// Before selection, a target may promote generic vector formats to its native register
// formats; promoted subgraphs are joined to the rest of the graph through conversions.

//! Rule tables and first-match instruction selection.

pub mod promotion;
pub mod rule;
pub mod selector;

pub use promotion::{promote_registers, PromotionTable};
pub use rule::{
    FormatMatcher, Guard, GuardedRules, LintFinding, Rewrite, RuleAction, RuleTable, TypeSignature,
};
pub use selector::{InstructionSelector, Lowering};
