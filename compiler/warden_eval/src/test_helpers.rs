//! Shorthand for assembling programs in unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use warden_ir::{BinaryOp, Literal, Name, NodeId, NodeKind, SharedInterner, ValueType};

use crate::{Accelerator, CompiledProgram, ParserConfiguration, ProgramBuilder};

pub(crate) fn config() -> Arc<ParserConfiguration> {
    Arc::new(ParserConfiguration::new(SharedInterner::new()))
}

/// Program builder with one method per node shape.
pub(crate) struct Script {
    builder: ProgramBuilder,
}

impl Script {
    pub(crate) fn new(config: Arc<ParserConfiguration>) -> Self {
        Script {
            builder: ProgramBuilder::new(config),
        }
    }

    pub(crate) fn with_accelerator(mut self, accelerator: Arc<dyn Accelerator>) -> Self {
        self.builder = self.builder.accelerator(accelerator);
        self
    }

    pub(crate) fn name(&self, text: &str) -> Name {
        self.builder.name(text)
    }

    pub(crate) fn node(&mut self, kind: NodeKind) -> NodeId {
        self.builder.node(kind).unwrap()
    }

    pub(crate) fn int(&mut self, value: i64) -> NodeId {
        self.builder.literal(Literal::Int(value))
    }

    pub(crate) fn boolean(&mut self, value: bool) -> NodeId {
        self.builder.literal(Literal::Bool(value))
    }

    pub(crate) fn text(&mut self, value: &str) -> NodeId {
        self.builder.str_literal(value)
    }

    pub(crate) fn typed(&mut self, value: Literal, ty: ValueType) -> NodeId {
        self.node(NodeKind::Literal {
            value,
            declared: Some(ty),
        })
    }

    pub(crate) fn var(&mut self, name: &str) -> NodeId {
        let name = self.builder.name(name);
        self.node(NodeKind::Var(name))
    }

    pub(crate) fn declare(&mut self, name: &str, init: NodeId) -> NodeId {
        let name = self.builder.name(name);
        self.node(NodeKind::Declare {
            name,
            ty: None,
            init,
        })
    }

    pub(crate) fn assign(&mut self, name: &str, value: NodeId) -> NodeId {
        let name = self.builder.name(name);
        self.node(NodeKind::Assign { name, value })
    }

    pub(crate) fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.node(NodeKind::Binary { op, left, right })
    }

    /// `name = name + step`
    pub(crate) fn increment(&mut self, name: &str, step: i64) -> NodeId {
        let current = self.var(name);
        let step = self.int(step);
        let sum = self.binary(BinaryOp::Add, current, step);
        self.assign(name, sum)
    }

    /// `name == value`
    pub(crate) fn equals(&mut self, name: &str, value: i64) -> NodeId {
        let current = self.var(name);
        let value = self.int(value);
        self.binary(BinaryOp::Eq, current, value)
    }

    pub(crate) fn chain(&mut self, ids: &[NodeId]) -> Option<NodeId> {
        self.builder.sequence(ids).unwrap()
    }

    pub(crate) fn if_then(&mut self, cond: NodeId, then: &[NodeId]) -> NodeId {
        let then_branch = self.chain(then);
        self.node(NodeKind::If {
            cond,
            then_branch,
            else_branch: None,
        })
    }

    pub(crate) fn list(&mut self, items: &[NodeId]) -> NodeId {
        let range = self.builder.list(items).unwrap();
        self.node(NodeKind::ListLit(range))
    }

    pub(crate) fn map(&mut self, pairs: &[NodeId]) -> NodeId {
        let range = self.builder.list(pairs).unwrap();
        self.node(NodeKind::MapLit(range))
    }

    pub(crate) fn type_ref(&mut self, name: &str) -> NodeId {
        let name = self.builder.name(name);
        self.node(NodeKind::TypeRef(name))
    }

    pub(crate) fn call(&mut self, receiver: NodeId, method: &str, args: &[NodeId]) -> NodeId {
        let method = self.builder.name(method);
        let args = self.builder.list(args).unwrap();
        self.node(NodeKind::MethodCall {
            receiver,
            method,
            args,
        })
    }

    pub(crate) fn build(mut self, statements: &[NodeId]) -> CompiledProgram {
        for &statement in statements {
            self.builder.push_statement(statement).unwrap();
        }
        self.builder.build().unwrap()
    }
}
