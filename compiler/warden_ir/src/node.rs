//! Executable node arena.
//!
//! [`NodeArena`] uses struct-of-arrays layout: parallel `kinds`, `nexts` and
//! `egress` arrays indexed by [`NodeId`]. Statement sequences are singly
//! linked through `nexts`; every node has at most one successor and at most
//! one predecessor, so a chain is exclusively owned by its head and can never
//! form a cycle. Operands (binary sides, conditions, arguments) are plain
//! `NodeId` references and are never linked.

use std::fmt;

use crate::{Literal, Name, ValueType};

/// Index into a [`NodeArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Contiguous run of node ids in the arena's flat list storage
/// (collection literal elements, call arguments).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeRange {
    start: u32,
    len: u16,
}

impl NodeRange {
    pub const EMPTY: NodeRange = NodeRange { start: 0, len: 0 };

    #[inline]
    pub fn len(self) -> usize {
        usize::from(self.len)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Binary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Operators that always produce a boolean.
    pub fn is_boolean(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }
}

/// Executable node kinds.
///
/// `Option<NodeId>` fields name the head of a nested chain (a block body);
/// `None` is an empty block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Literal {
        value: Literal,
        /// Type the front end declared for the literal, if any.
        declared: Option<ValueType>,
    },
    This,
    Var(Name),
    Declare {
        name: Name,
        ty: Option<ValueType>,
        init: NodeId,
    },
    DeclareIndexed {
        slot: u32,
        name: Name,
        ty: Option<ValueType>,
        init: NodeId,
    },
    Assign {
        name: Name,
        value: NodeId,
    },
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Not(NodeId),
    If {
        cond: NodeId,
        then_branch: Option<NodeId>,
        else_branch: Option<NodeId>,
    },
    Block(Option<NodeId>),
    /// Post-condition loop: `do { body } while (cond)`.
    DoWhile {
        body: Option<NodeId>,
        cond: NodeId,
    },
    While {
        cond: NodeId,
        body: Option<NodeId>,
    },
    ForEach {
        item: Name,
        iterable: NodeId,
        body: Option<NodeId>,
    },
    Return(NodeId),
    Break,
    ListLit(NodeRange),
    /// Keys and values interleaved: `k0, v0, k1, v1, ...`.
    MapLit(NodeRange),
    SetLit(NodeRange),
    /// Native type reference by short (imported) or fully-qualified name.
    TypeRef(Name),
    MethodCall {
        receiver: NodeId,
        method: Name,
        args: NodeRange,
    },
}

/// Arena owning every node of one compiled program.
#[derive(Clone, Debug, Default)]
pub struct NodeArena {
    kinds: Vec<NodeKind>,
    nexts: Vec<Option<NodeId>>,
    /// Whether some node already links to this one.
    has_prev: Vec<bool>,
    egress: Vec<ValueType>,
    lists: Vec<NodeId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node, returning its id.
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(to_u32(self.kinds.len(), "nodes"));
        let egress = self.infer_egress(kind);
        self.kinds.push(kind);
        self.nexts.push(None);
        self.has_prev.push(false);
        self.egress.push(egress);
        id
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.kinds[id.index()]
    }

    #[inline]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nexts[id.index()]
    }

    /// Static result type of a node.
    #[inline]
    pub fn egress(&self, id: NodeId) -> ValueType {
        self.egress[id.index()]
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.kinds.len()
    }

    /// Link `next` after `prev`.
    ///
    /// Returns `false` without changing anything if `prev` already has a
    /// successor, `next` already has a predecessor, or linking would close a
    /// cycle.
    pub fn link(&mut self, prev: NodeId, next: NodeId) -> bool {
        if !self.contains(prev)
            || !self.contains(next)
            || self.nexts[prev.index()].is_some()
            || self.has_prev[next.index()]
            || self.chain(Some(next)).any(|id| id == prev)
        {
            return false;
        }
        self.nexts[prev.index()] = Some(next);
        self.has_prev[next.index()] = true;
        true
    }

    /// Whether the node is linked after another node.
    pub fn has_predecessor(&self, id: NodeId) -> bool {
        self.has_prev[id.index()]
    }

    /// Iterate a chain starting at `head`.
    pub fn chain(&self, head: Option<NodeId>) -> ChainIter<'_> {
        ChainIter {
            arena: self,
            current: head,
        }
    }

    /// Store a run of ids for list literals and arguments.
    pub fn push_list(&mut self, ids: &[NodeId]) -> NodeRange {
        if ids.is_empty() {
            return NodeRange::EMPTY;
        }
        let start = to_u32(self.lists.len(), "node lists");
        self.lists.extend_from_slice(ids);
        NodeRange {
            start,
            len: to_u16(ids.len(), "node list"),
        }
    }

    pub fn list(&self, range: NodeRange) -> &[NodeId] {
        if range.is_empty() {
            return &[];
        }
        let start = range.start as usize;
        &self.lists[start..start + range.len()]
    }

    fn infer_egress(&self, kind: NodeKind) -> ValueType {
        match kind {
            NodeKind::Literal { value, declared } => declared.unwrap_or(value.value_type()),
            NodeKind::Not(_) => ValueType::Bool,
            NodeKind::Binary { op, .. } if op.is_boolean() => ValueType::Bool,
            NodeKind::Binary { op, left, right } => {
                let (l, r) = (self.egress(left), self.egress(right));
                match (l, r) {
                    (ValueType::Int, ValueType::Int) => ValueType::Int,
                    (ValueType::Float, ValueType::Int | ValueType::Float)
                    | (ValueType::Int, ValueType::Float) => ValueType::Float,
                    (ValueType::Str, _) | (_, ValueType::Str) if op == BinaryOp::Add => {
                        ValueType::Str
                    }
                    _ => ValueType::Any,
                }
            }
            NodeKind::Declare { ty, init, .. } | NodeKind::DeclareIndexed { ty, init, .. } => {
                ty.unwrap_or(self.egress(init))
            }
            NodeKind::Assign { value, .. } | NodeKind::Return(value) => self.egress(value),
            NodeKind::Break => ValueType::Null,
            NodeKind::ListLit(_) => ValueType::List,
            NodeKind::MapLit(_) => ValueType::Map,
            NodeKind::SetLit(_) => ValueType::Set,
            NodeKind::TypeRef(_) => ValueType::Class,
            NodeKind::This
            | NodeKind::Var(_)
            | NodeKind::If { .. }
            | NodeKind::Block(_)
            | NodeKind::DoWhile { .. }
            | NodeKind::While { .. }
            | NodeKind::ForEach { .. }
            | NodeKind::MethodCall { .. } => ValueType::Any,
        }
    }
}

/// Iterator over a linked node chain.
pub struct ChainIter<'a> {
    arena: &'a NodeArena,
    current: Option<NodeId>,
}

impl Iterator for ChainIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.arena.next(id);
        Some(id)
    }
}

fn to_u32(len: usize, what: &str) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("too many {what} in one program"))
}

fn to_u16(len: usize, what: &str) -> u16 {
    u16::try_from(len).unwrap_or_else(|_| panic!("{what} longer than {} entries", u16::MAX))
}
