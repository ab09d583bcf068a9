//! Operation graph nodes and the graph arena.
//!
//! The graph is built by a numeric scheme (outside this crate) and handed
//! to the code generator. Nodes live in one `Vec` and refer to each other
//! by [`NodeId`], so sharing a sub-expression is just reusing an id.

use super::format::Format;
use hashbrown::HashMap;
use std::fmt;

/// Handle of a node inside an [`OpGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Operation kind tag, the first key of every rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    Constant,
    Variable,
    Table,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Negation,
    FusedMultiplyAdd,
    FastReciprocal,
    Min,
    Max,
    Abs,
    BitLogicAnd,
    BitLogicOr,
    BitLogicXor,
    BitLogicNot,
    LeftShift,
    RightShift,
    Comparison,
    Select,
    Conversion,
    TypeCast,
    NearestInteger,
    TableLoad,
    ExponentExtraction,
    ExponentInsertion,
    SpecificOperation,
    Statement,
    Return,
    ConditionBlock,
}

/// Static description of an operation kind.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub is_leaf: bool,
    pub is_statement: bool,
    /// Expected operand count, `None` when variadic or optional.
    pub arity: Option<usize>,
}

impl OpKind {
    pub const ALL: [OpKind; 31] = [
        OpKind::Constant,
        OpKind::Variable,
        OpKind::Table,
        OpKind::Addition,
        OpKind::Subtraction,
        OpKind::Multiplication,
        OpKind::Division,
        OpKind::Negation,
        OpKind::FusedMultiplyAdd,
        OpKind::FastReciprocal,
        OpKind::Min,
        OpKind::Max,
        OpKind::Abs,
        OpKind::BitLogicAnd,
        OpKind::BitLogicOr,
        OpKind::BitLogicXor,
        OpKind::BitLogicNot,
        OpKind::LeftShift,
        OpKind::RightShift,
        OpKind::Comparison,
        OpKind::Select,
        OpKind::Conversion,
        OpKind::TypeCast,
        OpKind::NearestInteger,
        OpKind::TableLoad,
        OpKind::ExponentExtraction,
        OpKind::ExponentInsertion,
        OpKind::SpecificOperation,
        OpKind::Statement,
        OpKind::Return,
        OpKind::ConditionBlock,
    ];

    pub const fn info(self) -> OpInfo {
        use OpKind::*;
        const fn leaf(name: &'static str) -> OpInfo {
            OpInfo { name, is_leaf: true, is_statement: false, arity: Some(0) }
        }
        const fn expr(name: &'static str, arity: usize) -> OpInfo {
            OpInfo { name, is_leaf: false, is_statement: false, arity: Some(arity) }
        }
        const fn stmt(name: &'static str, arity: Option<usize>) -> OpInfo {
            OpInfo { name, is_leaf: false, is_statement: true, arity }
        }
        match self {
            Constant => leaf("const"),
            Variable => leaf("var"),
            Table => leaf("table"),
            Addition => expr("add", 2),
            Subtraction => expr("sub", 2),
            Multiplication => expr("mul", 2),
            Division => expr("div", 2),
            Negation => expr("neg", 1),
            FusedMultiplyAdd => expr("fma", 3),
            FastReciprocal => expr("rcp", 1),
            Min => expr("min", 2),
            Max => expr("max", 2),
            Abs => expr("abs", 1),
            BitLogicAnd => expr("and", 2),
            BitLogicOr => expr("or", 2),
            BitLogicXor => expr("xor", 2),
            BitLogicNot => expr("not", 1),
            LeftShift => expr("shl", 2),
            RightShift => expr("shr", 2),
            Comparison => expr("cmp", 2),
            Select => expr("select", 3),
            Conversion => expr("conv", 1),
            TypeCast => expr("cast", 1),
            NearestInteger => expr("nearestint", 1),
            TableLoad => expr("tableload", 2),
            ExponentExtraction => expr("expextract", 1),
            ExponentInsertion => expr("expinsert", 1),
            SpecificOperation => OpInfo { name: "specific", is_leaf: false, is_statement: false, arity: None },
            Statement => stmt("stmt", None),
            Return => stmt("return", Some(1)),
            ConditionBlock => stmt("if", None),
        }
    }

    pub const fn name(self) -> &'static str {
        self.info().name
    }

    pub fn from_name(name: &str) -> Option<OpKind> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation sub-kind, the second key of every rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Specifier {
    /// Kind-only operations.
    None,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    ReadTimeStamp,
}

impl Specifier {
    const ALL: [Specifier; 8] = [
        Specifier::None,
        Specifier::Less,
        Specifier::LessOrEqual,
        Specifier::Equal,
        Specifier::NotEqual,
        Specifier::Greater,
        Specifier::GreaterOrEqual,
        Specifier::ReadTimeStamp,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Specifier::None => "none",
            Specifier::Less => "lt",
            Specifier::LessOrEqual => "le",
            Specifier::Equal => "eq",
            Specifier::NotEqual => "ne",
            Specifier::Greater => "gt",
            Specifier::GreaterOrEqual => "ge",
            Specifier::ReadTimeStamp => "rdtsc",
        }
    }

    pub fn from_name(name: &str) -> Option<Specifier> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Literal value of a constant node or table element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl ConstValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ConstValue::Float(v) => v,
            ConstValue::Int(v) => v as f64,
            ConstValue::Bool(v) => v as u8 as f64,
        }
    }

    /// Bit pattern of the value stored in `format`.
    pub fn to_bits(self, format: &Format) -> u64 {
        match (self, format) {
            (ConstValue::Float(v), Format::Binary32) => (v as f32).to_bits() as u64,
            (ConstValue::Float(v), Format::Binary64) => v.to_bits(),
            (ConstValue::Float(v), Format::Fixed { frac, .. }) => {
                (v * 2f64.powi(i32::from(*frac))).round() as i64 as u64
            }
            (ConstValue::Float(v), _) => v as i64 as u64,
            (ConstValue::Int(v), _) => v as u64,
            (ConstValue::Bool(v), _) => v as u64,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Float(v) => write!(f, "{v:?}"),
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Kind-specific data attached to leaf nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Constant(ConstValue),
    Variable(String),
    Table(Vec<ConstValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: OpKind,
    pub specifier: Specifier,
    pub operands: Vec<NodeId>,
    pub format: Format,
    /// Source-level name used for diagnostics and temporary naming.
    pub tag: Option<String>,
    pub payload: Payload,
}

/// Function signature and body handed to the code generator.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub args: Vec<FunctionArg>,
    pub result: Format,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionArg {
    pub name: String,
    pub format: Format,
    pub node: NodeId,
    /// Input interval, used as a hypothesis by verification scripts.
    pub range: Option<(f64, f64)>,
}

/// Arena of operation nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpGraph {
    nodes: Vec<Node>,
}

impl OpGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn constant(&mut self, value: ConstValue, format: Format) -> NodeId {
        self.leaf(OpKind::Constant, format, Payload::Constant(value))
    }

    pub fn variable(&mut self, name: &str, format: Format) -> NodeId {
        self.leaf(OpKind::Variable, format, Payload::Variable(name.to_string()))
    }

    pub fn table(&mut self, values: Vec<ConstValue>, storage: Format) -> NodeId {
        let format = Format::table(storage, values.len() as u32);
        self.leaf(OpKind::Table, format, Payload::Table(values))
    }

    fn leaf(&mut self, kind: OpKind, format: Format, payload: Payload) -> NodeId {
        self.add(Node {
            kind,
            specifier: Specifier::None,
            operands: Vec::new(),
            format,
            tag: None,
            payload,
        })
    }

    pub fn op(&mut self, kind: OpKind, operands: &[NodeId], format: Format) -> NodeId {
        self.op_with(kind, Specifier::None, operands, format)
    }

    pub fn op_with(
        &mut self,
        kind: OpKind,
        specifier: Specifier,
        operands: &[NodeId],
        format: Format,
    ) -> NodeId {
        self.add(Node {
            kind,
            specifier,
            operands: operands.to_vec(),
            format,
            tag: None,
            payload: Payload::None,
        })
    }

    /// Attach a diagnostic tag; returns the id for chaining.
    pub fn tagged(&mut self, id: NodeId, tag: &str) -> NodeId {
        self.nodes[id.index()].tag = Some(tag.to_string());
        id
    }

    pub fn operand_formats(&self, id: NodeId) -> Vec<Format> {
        self.node(id)
            .operands
            .iter()
            .map(|op| self.node(*op).format.clone())
            .collect()
    }

    /// Copy traceability attributes of `from` onto `to`, keeping any tag
    /// the replacement already has.
    pub fn forward_attributes(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        let tag = self.node(from).tag.clone();
        let target = self.node_mut(to);
        if target.tag.is_none() {
            target.tag = tag;
        }
    }

    /// Count uses of every node reachable from `root` (the root counts once).
    pub fn use_counts(&self, root: NodeId) -> HashMap<NodeId, usize> {
        let mut counts = HashMap::new();
        let mut stack = vec![root];
        counts.insert(root, 1);
        let mut expanded = hashbrown::HashSet::new();
        while let Some(id) = stack.pop() {
            if !expanded.insert(id) {
                continue;
            }
            for op in &self.node(id).operands {
                *counts.entry(*op).or_insert(0) += 1;
                stack.push(*op);
            }
        }
        counts
    }
}
