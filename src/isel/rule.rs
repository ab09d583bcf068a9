//! Rule records and per-language rule tables.
//!
//! A rule table maps (kind, specifier) to an ordered list of guarded rule
//! groups. Each group holds a guard predicate and an ordered list of
//! (type signature, action) entries. Order is part of the table's contract:
//! selection takes the first match, never the best one.

use crate::codegen::template::Template;
use crate::core::error::CodegenResult;
use crate::ir::{Format, FormatClass, NodeId, OpGraph, OpKind, Specifier};
use hashbrown::HashMap;
use std::fmt;
use std::rc::Rc;

/// Side condition on a node, evaluated after kind and specifier matched.
pub type Guard = Rc<dyn Fn(&OpGraph, NodeId) -> bool>;

/// Replaces a node by an equivalent subgraph and returns its root.
pub type Rewrite = Rc<dyn Fn(&mut OpGraph, NodeId) -> CodegenResult<NodeId>>;

/// Matches one operand or result format.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatMatcher {
    Exact(Format),
    Class(FormatClass),
}

impl FormatMatcher {
    pub fn matches(&self, format: &Format) -> bool {
        match self {
            FormatMatcher::Exact(expected) => expected == format,
            FormatMatcher::Class(class) => class.matches(format),
        }
    }

    /// True when every format matched by `other` is matched by `self`.
    pub fn subsumes(&self, other: &FormatMatcher) -> bool {
        match (self, other) {
            (FormatMatcher::Exact(a), FormatMatcher::Exact(b)) => a == b,
            (FormatMatcher::Class(class), FormatMatcher::Exact(format)) => class.matches(format),
            (FormatMatcher::Class(a), FormatMatcher::Class(b)) => a.includes(*b),
            (FormatMatcher::Exact(_), FormatMatcher::Class(_)) => false,
        }
    }
}

impl From<Format> for FormatMatcher {
    fn from(format: Format) -> Self {
        FormatMatcher::Exact(format)
    }
}

impl From<FormatClass> for FormatMatcher {
    fn from(class: FormatClass) -> Self {
        FormatMatcher::Class(class)
    }
}

impl fmt::Display for FormatMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatMatcher::Exact(format) => write!(f, "{format}"),
            FormatMatcher::Class(class) => write!(f, "{class}"),
        }
    }
}

/// Operand and result formats a rule applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSignature {
    pub result: FormatMatcher,
    pub operands: Vec<FormatMatcher>,
}

impl TypeSignature {
    pub fn new(result: impl Into<FormatMatcher>, operands: Vec<FormatMatcher>) -> Self {
        Self { result: result.into(), operands }
    }

    pub fn exact(result: Format, operands: &[Format]) -> Self {
        Self::new(result, operands.iter().cloned().map(FormatMatcher::Exact).collect())
    }

    /// `arity` operands and the result all of `format`.
    pub fn uniform(format: Format, arity: usize) -> Self {
        Self::exact(format.clone(), &vec![format; arity])
    }

    pub fn classes(result: FormatClass, operands: &[FormatClass]) -> Self {
        Self::new(result, operands.iter().copied().map(FormatMatcher::Class).collect())
    }

    pub fn matches(&self, result: &Format, operands: &[Format]) -> bool {
        self.operands.len() == operands.len()
            && self.result.matches(result)
            && self.operands.iter().zip(operands).all(|(m, f)| m.matches(f))
    }

    pub fn subsumes(&self, other: &TypeSignature) -> bool {
        self.operands.len() == other.operands.len()
            && self.result.subsumes(&other.result)
            && self
                .operands
                .iter()
                .zip(&other.operands)
                .all(|(a, b)| a.subsumes(b))
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands: Vec<String> = self.operands.iter().map(|m| m.to_string()).collect();
        write!(f, "({}) -> {}", operands.join(", "), self.result)
    }
}

/// What a matching rule does with the node.
#[derive(Clone)]
pub enum RuleAction {
    Template(Template),
    Rewrite(Rewrite),
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Template(template) => f.debug_tuple("Template").field(template).finish(),
            RuleAction::Rewrite(_) => f.write_str("Rewrite(..)"),
        }
    }
}

/// Entries sharing one guard predicate.
#[derive(Clone)]
pub struct GuardedRules {
    label: String,
    guard: Option<Guard>,
    entries: Vec<(TypeSignature, RuleAction)>,
}

impl GuardedRules {
    /// Group whose guard always holds.
    pub fn always() -> Self {
        Self { label: "always".to_string(), guard: None, entries: Vec::new() }
    }

    pub fn when(label: &str, guard: impl Fn(&OpGraph, NodeId) -> bool + 'static) -> Self {
        Self { label: label.to_string(), guard: Some(Rc::new(guard)), entries: Vec::new() }
    }

    pub fn template(mut self, signature: TypeSignature, template: Template) -> Self {
        self.entries.push((signature, RuleAction::Template(template)));
        self
    }

    pub fn rewrite(
        mut self,
        signature: TypeSignature,
        rewrite: impl Fn(&mut OpGraph, NodeId) -> CodegenResult<NodeId> + 'static,
    ) -> Self {
        self.entries.push((signature, RuleAction::Rewrite(Rc::new(rewrite))));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_always(&self) -> bool {
        self.guard.is_none()
    }

    pub fn applies(&self, graph: &OpGraph, node: NodeId) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard(graph, node))
    }

    pub fn entries(&self) -> &[(TypeSignature, RuleAction)] {
        &self.entries
    }
}

impl fmt::Debug for GuardedRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedRules")
            .field("label", &self.label)
            .field("entries", &self.entries)
            .finish()
    }
}

/// Rule entry that can never be selected.
#[derive(Debug, Clone, PartialEq)]
pub struct LintFinding {
    pub kind: OpKind,
    pub specifier: Specifier,
    pub group: String,
    pub signature: TypeSignature,
    pub shadowed_by: TypeSignature,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} [{}]: {} is shadowed by {}",
            self.kind, self.specifier, self.group, self.signature, self.shadowed_by
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<OpKind, HashMap<Specifier, Vec<GuardedRules>>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group after every group already registered for the key.
    pub fn insert(&mut self, kind: OpKind, specifier: Specifier, group: GuardedRules) {
        self.rules
            .entry(kind)
            .or_default()
            .entry(specifier)
            .or_default()
            .push(group);
    }

    /// Shorthand for a kind-only group.
    pub fn add(&mut self, kind: OpKind, group: GuardedRules) {
        self.insert(kind, Specifier::None, group);
    }

    pub fn contains_kind(&self, kind: OpKind) -> bool {
        self.rules.contains_key(&kind)
    }

    pub fn specifiers(&self, kind: OpKind) -> Option<&HashMap<Specifier, Vec<GuardedRules>>> {
        self.rules.get(&kind)
    }

    pub fn groups(&self, kind: OpKind, specifier: Specifier) -> Option<&[GuardedRules]> {
        self.rules
            .get(&kind)
            .and_then(|specs| specs.get(&specifier))
            .map(Vec::as_slice)
    }

    /// This table layered over `base`: on a shared (kind, specifier) key the
    /// groups of `self` are tried first and those of `base` after them;
    /// other keys are taken from whichever table has them.
    pub fn compose_over(&self, base: &RuleTable) -> RuleTable {
        let mut composed = base.clone();
        for (kind, specs) in &self.rules {
            let target = composed.rules.entry(*kind).or_default();
            for (specifier, groups) in specs {
                let slot = target.entry(*specifier).or_default();
                let inherited = std::mem::take(slot);
                slot.extend(groups.iter().cloned());
                slot.extend(inherited);
            }
        }
        composed
    }

    pub fn rule_count(&self) -> usize {
        self.rules
            .values()
            .flat_map(|specs| specs.values())
            .flat_map(|groups| groups.iter())
            .map(|group| group.entries.len())
            .sum()
    }

    fn keys(&self) -> Vec<(OpKind, Specifier)> {
        let mut keys: Vec<(OpKind, Specifier)> = self
            .rules
            .iter()
            .flat_map(|(kind, specs)| specs.keys().map(move |spec| (*kind, *spec)))
            .collect();
        keys.sort();
        keys
    }

    /// Entries shadowed by an earlier entry of the same group, or by an
    /// earlier group whose guard always holds.
    pub fn lint(&self) -> Vec<LintFinding> {
        let mut findings = Vec::new();
        for (kind, specifier) in self.keys() {
            let Some(groups) = self.groups(kind, specifier) else {
                continue;
            };
            let mut covered: Vec<&TypeSignature> = Vec::new();
            for group in groups {
                for (idx, (signature, _)) in group.entries.iter().enumerate() {
                    let earlier = group.entries[..idx].iter().map(|(s, _)| s);
                    let shadow = earlier
                        .chain(covered.iter().copied())
                        .find(|candidate| candidate.subsumes(signature));
                    if let Some(shadow) = shadow {
                        findings.push(LintFinding {
                            kind,
                            specifier,
                            group: group.label.clone(),
                            signature: signature.clone(),
                            shadowed_by: shadow.clone(),
                        });
                    }
                }
                if group.is_always() {
                    covered.extend(group.entries.iter().map(|(s, _)| s));
                }
            }
        }
        findings
    }
}
