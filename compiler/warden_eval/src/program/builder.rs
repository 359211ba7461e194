//! `ProgramBuilder`: the front end's way of producing a [`CompiledProgram`].

use std::sync::{Arc, OnceLock};

use smallvec::SmallVec;
use warden_ir::{Literal, Name, NodeArena, NodeId, NodeKind, NodeRange, ValueType};
use warden_value::errors::type_mismatch;
use warden_value::{EvalError, EvalErrorKind};

use super::{CompiledProgram, ProgramFlags};
use crate::accelerator::{Accelerator, LiteralAccelerator};
use crate::ParserConfiguration;

/// Faults detected while assembling a program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("node {node:?} is already linked into a chain")]
    AlreadyLinked { node: NodeId },

    #[error("node {node:?} does not belong to this program")]
    UnknownNode { node: NodeId },

    /// A typing fault found at build time.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl CompileError {
    pub fn eval_kind(&self) -> Option<&EvalErrorKind> {
        match self {
            CompileError::Eval(err) => Some(&err.kind),
            _ => None,
        }
    }
}

/// Assembles nodes into a program.
///
/// Nodes are pushed bottom-up: operands before the nodes that use them.
/// Statement chains are linked with [`sequence`](ProgramBuilder::sequence)
/// (block bodies) and [`push_statement`](ProgramBuilder::push_statement)
/// (the top-level chain).
pub struct ProgramBuilder {
    config: Arc<ParserConfiguration>,
    arena: NodeArena,
    first: Option<NodeId>,
    last: Option<NodeId>,
    source_name: Option<Arc<str>>,
    egress: Option<ValueType>,
    accelerator: Arc<dyn Accelerator>,
}

impl ProgramBuilder {
    pub fn new(config: Arc<ParserConfiguration>) -> Self {
        ProgramBuilder {
            config,
            arena: NodeArena::new(),
            first: None,
            last: None,
            source_name: None,
            egress: None,
            accelerator: Arc::new(LiteralAccelerator),
        }
    }

    #[must_use]
    pub fn source_name(mut self, name: &str) -> Self {
        self.source_name = Some(Arc::from(name));
        self
    }

    /// Result type declared by the front end, used unless the program is a
    /// single node.
    #[must_use]
    pub fn egress(mut self, ty: ValueType) -> Self {
        self.egress = Some(ty);
        self
    }

    #[must_use]
    pub fn accelerator(mut self, accelerator: Arc<dyn Accelerator>) -> Self {
        self.accelerator = accelerator;
        self
    }

    /// Intern an identifier, member or type name.
    pub fn name(&self, text: &str) -> Name {
        self.config.interner().intern(text)
    }

    /// Add a node whose operands are already in this program.
    pub fn node(&mut self, kind: NodeKind) -> Result<NodeId, CompileError> {
        if let Some(&node) = operands(&kind)
            .iter()
            .find(|&&id| !self.arena.contains(id))
        {
            return Err(CompileError::UnknownNode { node });
        }
        Ok(self.arena.push(kind))
    }

    pub fn literal(&mut self, value: Literal) -> NodeId {
        self.arena.push(NodeKind::Literal {
            value,
            declared: None,
        })
    }

    pub fn str_literal(&mut self, text: &str) -> NodeId {
        let name = self.name(text);
        self.literal(Literal::Str(name))
    }

    /// Store collection elements or call arguments.
    pub fn list(&mut self, ids: &[NodeId]) -> Result<NodeRange, CompileError> {
        if let Some(&node) = ids.iter().find(|&&id| !self.arena.contains(id)) {
            return Err(CompileError::UnknownNode { node });
        }
        Ok(self.arena.push_list(ids))
    }

    /// Link `ids` into one chain, returning its head (`None` when empty).
    pub fn sequence(&mut self, ids: &[NodeId]) -> Result<Option<NodeId>, CompileError> {
        for pair in ids.windows(2) {
            self.link(pair[0], pair[1])?;
        }
        Ok(ids.first().copied())
    }

    /// Append a statement (or a chain headed by it) to the program.
    pub fn push_statement(&mut self, id: NodeId) -> Result<(), CompileError> {
        if !self.arena.contains(id) {
            return Err(CompileError::UnknownNode { node: id });
        }
        match self.last {
            Some(last) => self.link(last, id)?,
            None if self.arena.has_predecessor(id) => {
                return Err(CompileError::AlreadyLinked { node: id })
            }
            None => self.first = Some(id),
        }
        self.last = self.arena.chain(Some(id)).last();
        Ok(())
    }

    fn link(&mut self, prev: NodeId, next: NodeId) -> Result<(), CompileError> {
        for node in [prev, next] {
            if !self.arena.contains(node) {
                return Err(CompileError::UnknownNode { node });
            }
        }
        if self.arena.link(prev, next) {
            Ok(())
        } else {
            Err(CompileError::AlreadyLinked { node: next })
        }
    }

    pub fn build(self) -> Result<CompiledProgram, CompileError> {
        let strong_typing = self.config.strong_typing();
        if strong_typing {
            check_types(&self.arena)?;
        }

        let mut flags = ProgramFlags::empty();
        flags.set(ProgramFlags::LITERAL_ONLY, is_literal_only(&self.arena));
        flags.set(ProgramFlags::STRONG_TYPING, strong_typing);

        let single = self.first.filter(|&id| self.arena.next(id).is_none());
        let known_egress = match single {
            Some(id) => self.arena.egress(id),
            None => self.egress.unwrap_or_default(),
        };

        tracing::debug!(
            source = ?self.source_name,
            nodes = self.arena.len(),
            egress = %known_egress,
            literal_only = flags.contains(ProgramFlags::LITERAL_ONLY),
            "program built"
        );
        Ok(CompiledProgram {
            arena: self.arena,
            first: self.first,
            source_name: self.source_name,
            known_egress,
            known_ingress: None,
            flags,
            config: self.config,
            accelerator: self.accelerator,
            strategy: OnceLock::new(),
        })
    }
}

/// Nodes a kind refers to directly, including nested chain heads.
fn operands(kind: &NodeKind) -> SmallVec<[NodeId; 3]> {
    let mut ids = SmallVec::new();
    match *kind {
        NodeKind::Literal { .. }
        | NodeKind::This
        | NodeKind::Var(_)
        | NodeKind::Break
        | NodeKind::ListLit(_)
        | NodeKind::MapLit(_)
        | NodeKind::SetLit(_)
        | NodeKind::TypeRef(_) => {}
        NodeKind::Declare { init, .. } | NodeKind::DeclareIndexed { init, .. } => ids.push(init),
        NodeKind::Assign { value, .. } | NodeKind::Return(value) | NodeKind::Not(value) => {
            ids.push(value);
        }
        NodeKind::Binary { left, right, .. } => ids.extend([left, right]),
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            ids.push(cond);
            ids.extend(then_branch);
            ids.extend(else_branch);
        }
        NodeKind::Block(body) => ids.extend(body),
        NodeKind::DoWhile { body, cond } | NodeKind::While { cond, body } => {
            ids.push(cond);
            ids.extend(body);
        }
        NodeKind::ForEach { iterable, body, .. } => {
            ids.push(iterable);
            ids.extend(body);
        }
        NodeKind::MethodCall { receiver, .. } => ids.push(receiver),
    }
    ids
}

fn is_literal_only(arena: &NodeArena) -> bool {
    (0..arena.len()).all(|index| {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "arena length is bounded by u32 at push time"
        )]
        let id = NodeId::new(index as u32);
        matches!(
            arena.kind(id),
            NodeKind::Literal { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Not(_)
                | NodeKind::ListLit(_)
                | NodeKind::MapLit(_)
                | NodeKind::SetLit(_)
        )
    })
}

/// Build-time typing: literals must match their declared type, and typed
/// declarations must accept their initializer's static type.
fn check_types(arena: &NodeArena) -> Result<(), EvalError> {
    for index in 0..arena.len() {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "arena length is bounded by u32 at push time"
        )]
        let id = NodeId::new(index as u32);
        match *arena.kind(id) {
            NodeKind::Literal {
                value,
                declared: Some(ty),
            } if !ty.is_assignable_from(value.value_type()) => {
                return Err(type_mismatch(ty.name(), value.value_type().name()));
            }
            NodeKind::Declare {
                ty: Some(ty), init, ..
            }
            | NodeKind::DeclareIndexed {
                ty: Some(ty), init, ..
            } => {
                let actual = arena.egress(init);
                if actual != ValueType::Any && !ty.is_assignable_from(actual) {
                    return Err(type_mismatch(ty.name(), actual.name()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
