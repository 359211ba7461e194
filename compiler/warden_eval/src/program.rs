//! Compiled programs.
//!
//! A [`CompiledProgram`] owns a node arena and the head of its statement
//! chain, the static type metadata the front end inferred, and the
//! configuration it was compiled against. It never changes after
//! [`ProgramBuilder::build`] apart from two things: the ingress type a host
//! may attach later, and the evaluation strategy committed on first use.
//!
//! # Evaluation strategy
//!
//! The first call to [`CompiledProgram::evaluate`] offers the program to its
//! [`Accelerator`]. The answer is stored in a `OnceLock`, so selection runs
//! once even when several threads evaluate the same program for the first
//! time concurrently; losers of that race wait and then use the winner's
//! strategy.
//!
//! # Control flow
//!
//! Node evaluation returns a [`Flow`] instead of signalling through the
//! scope chain. The flags are only raised where a program hands its value
//! back to the host: a `return` raises tilt on the scope the program was
//! evaluated in, a stray `break` raises break.

mod builder;

use std::fmt::{self, Write as _};
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use warden_ir::{Literal, NodeArena, NodeId, NodeKind, StringLookup, ValueType};
use warden_value::{EvalError, EvalResult, Value};

use crate::accelerator::{AcceleratedProgram, Accelerator, AcceleratorSession};
use crate::interpreter::Interpreter;
use crate::scope::{ResetScope, ScopeRef};
use crate::{ExecutionContext, ParserConfiguration};

pub use builder::{CompileError, ProgramBuilder};

/// Outcome of evaluating a node or chain.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    Normal(Value),
    /// A `return` produced the program's value.
    Return(Value),
    /// Exit the innermost loop.
    Break,
}

impl Flow {
    /// The value the flow carries; `Break` carries none.
    pub fn into_value(self) -> Value {
        match self {
            Flow::Normal(value) | Flow::Return(value) => value,
            Flow::Break => Value::Null,
        }
    }
}

bitflags! {
    /// Facts about a program fixed at build time.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ProgramFlags: u8 {
        /// Never reads variables, `this`, or native types.
        const LITERAL_ONLY = 1 << 0;
        /// The ingress type accepts the egress type without conversion.
        const CONVERTIBLE = 1 << 1;
        const STRONG_TYPING = 1 << 2;
    }
}

enum Strategy {
    Interpret,
    Accelerated(Box<dyn AcceleratedProgram>),
}

/// An executable program.
pub struct CompiledProgram {
    arena: NodeArena,
    first: Option<NodeId>,
    source_name: Option<Arc<str>>,
    known_egress: ValueType,
    known_ingress: Option<ValueType>,
    flags: ProgramFlags,
    config: Arc<ParserConfiguration>,
    accelerator: Arc<dyn Accelerator>,
    strategy: OnceLock<Strategy>,
}

impl CompiledProgram {
    /// Evaluate against `scope`, with `this` bound to the host's root object.
    #[tracing::instrument(level = "debug", skip_all, fields(source = ?self.source_name))]
    pub fn evaluate(&self, ctx: &ExecutionContext, this: &Value, scope: &ScopeRef) -> EvalResult {
        let strategy = self.strategy();
        let _session = AcceleratorSession::open(self.accelerator.as_ref());
        let flow = match strategy {
            Strategy::Interpret => self.interpret(ctx, this, scope)?,
            Strategy::Accelerated(program) => program.evaluate(ctx, this, scope)?,
        };
        Ok(match flow {
            Flow::Normal(value) => value,
            Flow::Return(value) => {
                scope.set_tilt(true);
                value
            }
            Flow::Break => {
                scope.set_break(true);
                Value::Null
            }
        })
    }

    /// Evaluate as a sub-program of an enclosing evaluation.
    ///
    /// The scope is wrapped in a [`ResetScope`], so a tilt left over from an
    /// earlier sub-program is cleared and a flag the enclosing evaluation
    /// already holds is never overwritten.
    pub fn evaluate_nested(
        &self,
        ctx: &ExecutionContext,
        this: &Value,
        scope: &ScopeRef,
    ) -> EvalResult {
        let reset = ResetScope::wrap(Rc::clone(scope));
        self.evaluate(ctx, this, &reset)
    }

    /// Walk the node chain directly, bypassing any accelerated strategy.
    pub fn interpret(
        &self,
        ctx: &ExecutionContext,
        this: &Value,
        scope: &ScopeRef,
    ) -> Result<Flow, EvalError> {
        Interpreter::new(&self.arena, &self.config, ctx, this).eval_chain(self.first, scope)
    }

    /// Assign through the program when it is a single variable reference.
    ///
    /// Returns the stored value, or `Null` without touching the scope for
    /// every other shape of program.
    pub fn set_value(&self, scope: &ScopeRef, value: Value) -> EvalResult {
        let Some(NodeKind::Var(name)) = self.single_node().map(|id| *self.arena.kind(id)) else {
            return Ok(Value::Null);
        };
        if scope.is_resolvable(name) {
            scope
                .resolve(name, &**self.config.interner())?
                .set(value.clone())?;
        } else {
            scope.declare(name, value.clone(), None)?;
        }
        Ok(value)
    }

    fn strategy(&self) -> &Strategy {
        self.strategy.get_or_init(|| self.select_strategy())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(accelerator = self.accelerator.name()))]
    fn select_strategy(&self) -> Strategy {
        match self.accelerator.accelerate(self) {
            Some(program) => {
                tracing::debug!("accelerated");
                Strategy::Accelerated(program)
            }
            None => Strategy::Interpret,
        }
    }

    /// Whether the strategy has been committed.
    pub fn is_strategy_selected(&self) -> bool {
        self.strategy.get().is_some()
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self.strategy.get(), Some(Strategy::Accelerated(_)))
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn first_node(&self) -> Option<NodeId> {
        self.first
    }

    fn single_node(&self) -> Option<NodeId> {
        self.first.filter(|&id| self.arena.next(id).is_none())
    }

    pub fn is_single_node(&self) -> bool {
        self.single_node().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn configuration(&self) -> &Arc<ParserConfiguration> {
        &self.config
    }

    /// Whether the host must inject imports before evaluating.
    pub fn requires_imports(&self) -> bool {
        self.config.has_imports()
    }

    pub fn flags(&self) -> ProgramFlags {
        self.flags
    }

    pub fn is_literal_only(&self) -> bool {
        self.flags.contains(ProgramFlags::LITERAL_ONLY)
    }

    pub fn is_convertible(&self) -> bool {
        self.flags.contains(ProgramFlags::CONVERTIBLE)
    }

    pub fn known_egress_type(&self) -> ValueType {
        self.known_egress
    }

    pub fn known_ingress_type(&self) -> Option<ValueType> {
        self.known_ingress
    }

    pub fn set_known_egress_type(&mut self, ty: ValueType) {
        self.known_egress = ty;
        self.compute_conversion_rule();
    }

    pub fn set_known_ingress_type(&mut self, ty: ValueType) {
        self.known_ingress = Some(ty);
        self.compute_conversion_rule();
    }

    fn compute_conversion_rule(&mut self) {
        let convertible = self
            .known_ingress
            .is_some_and(|ingress| ingress.is_assignable_from(self.known_egress));
        self.flags.set(ProgramFlags::CONVERTIBLE, convertible);
    }
}

impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("source_name", &self.source_name)
            .field("nodes", &self.arena.len())
            .field("known_egress", &self.known_egress)
            .field("known_ingress", &self.known_ingress)
            .field("flags", &self.flags)
            .field("accelerator", &self.accelerator.name())
            .finish_non_exhaustive()
    }
}

/// One statement per line, each terminated with `;`.
impl fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let names: &dyn StringLookup = &**self.config.interner();
        for id in self.arena.chain(self.first) {
            render(&self.arena, names, id, &mut out)?;
            out.push_str(";\n");
        }
        f.write_str(&out)
    }
}

fn render(
    arena: &NodeArena,
    names: &dyn StringLookup,
    id: NodeId,
    out: &mut String,
) -> fmt::Result {
    match *arena.kind(id) {
        NodeKind::Literal { value, .. } => match value {
            Literal::Null => out.push_str("null"),
            Literal::Bool(b) => write!(out, "{b}")?,
            Literal::Int(i) => write!(out, "{i}")?,
            Literal::Float(bits) => write!(out, "{:?}", f64::from_bits(bits))?,
            Literal::Str(s) => write!(out, "{:?}", names.lookup(s))?,
        },
        NodeKind::This => out.push_str("this"),
        NodeKind::Var(name) | NodeKind::TypeRef(name) => out.push_str(names.lookup(name)),
        NodeKind::Declare { name, ty, init } | NodeKind::DeclareIndexed { name, ty, init, .. } => {
            out.push_str("var ");
            out.push_str(names.lookup(name));
            if let Some(ty) = ty {
                write!(out, ": {ty}")?;
            }
            out.push_str(" = ");
            render(arena, names, init, out)?;
        }
        NodeKind::Assign { name, value } => {
            write!(out, "{} = ", names.lookup(name))?;
            render(arena, names, value, out)?;
        }
        NodeKind::Binary { op, left, right } => {
            out.push('(');
            render(arena, names, left, out)?;
            write!(out, " {} ", op.as_symbol())?;
            render(arena, names, right, out)?;
            out.push(')');
        }
        NodeKind::Not(operand) => {
            out.push('!');
            render(arena, names, operand, out)?;
        }
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            out.push_str("if (");
            render(arena, names, cond, out)?;
            out.push_str(") ");
            render_block(arena, names, then_branch, out)?;
            if let Some(else_branch) = else_branch {
                out.push_str(" else ");
                render_block(arena, names, Some(else_branch), out)?;
            }
        }
        NodeKind::Block(body) => render_block(arena, names, body, out)?,
        NodeKind::DoWhile { body, cond } => {
            out.push_str("do ");
            render_block(arena, names, body, out)?;
            out.push_str(" while (");
            render(arena, names, cond, out)?;
            out.push(')');
        }
        NodeKind::While { cond, body } => {
            out.push_str("while (");
            render(arena, names, cond, out)?;
            out.push_str(") ");
            render_block(arena, names, body, out)?;
        }
        NodeKind::ForEach {
            item,
            iterable,
            body,
        } => {
            write!(out, "foreach ({} : ", names.lookup(item))?;
            render(arena, names, iterable, out)?;
            out.push_str(") ");
            render_block(arena, names, body, out)?;
        }
        NodeKind::Return(value) => {
            out.push_str("return ");
            render(arena, names, value, out)?;
        }
        NodeKind::Break => out.push_str("break"),
        NodeKind::ListLit(items) => render_list(arena, names, "[", arena.list(items), "]", out)?,
        NodeKind::SetLit(items) => render_list(arena, names, "{", arena.list(items), "}", out)?,
        NodeKind::MapLit(items) => {
            out.push('[');
            for (i, pair) in arena.list(items).chunks(2).enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(arena, names, pair[0], out)?;
                out.push_str(" : ");
                if let Some(&value) = pair.get(1) {
                    render(arena, names, value, out)?;
                }
            }
            out.push(']');
        }
        NodeKind::MethodCall {
            receiver,
            method,
            args,
        } => {
            render(arena, names, receiver, out)?;
            out.push('.');
            out.push_str(names.lookup(method));
            render_list(arena, names, "(", arena.list(args), ")", out)?;
        }
    }
    Ok(())
}

fn render_block(
    arena: &NodeArena,
    names: &dyn StringLookup,
    head: Option<NodeId>,
    out: &mut String,
) -> fmt::Result {
    out.push_str("{ ");
    for id in arena.chain(head) {
        render(arena, names, id, out)?;
        out.push_str("; ");
    }
    out.push('}');
    Ok(())
}

fn render_list(
    arena: &NodeArena,
    names: &dyn StringLookup,
    open: &str,
    items: &[NodeId],
    close: &str,
    out: &mut String,
) -> fmt::Result {
    out.push_str(open);
    for (i, &item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render(arena, names, item, out)?;
    }
    out.push_str(close);
    Ok(())
}
