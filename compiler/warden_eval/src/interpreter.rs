//! Tree-walking evaluation of a node chain.
//!
//! Every node evaluates to a [`Flow`]. Statements only look at the value of
//! a `Normal` flow; `Return` and `Break` pass straight up through enclosing
//! nodes until a loop consumes the break or the program boundary takes the
//! returned value.

use std::sync::Arc;

use warden_ir::{BinaryOp, Literal, Name, NodeArena, NodeId, NodeKind, StringInterner};
use warden_value::errors::type_mismatch;
use warden_value::{Accounting, EvalError, ExecList, ExecMap, ExecSet, Key, Value};

use crate::program::Flow;
use crate::scope::{MapScope, ScopeRef};
use crate::stack::ensure_sufficient_stack;
use crate::{ExecutionContext, ParserConfiguration};

/// Unwrap a `Normal` flow, returning any other flow from the enclosing
/// function.
macro_rules! value {
    ($flow:expr) => {
        match $flow {
            Flow::Normal(value) => value,
            other => return Ok(other),
        }
    };
}

mod control;
mod methods;
mod operators;

pub(crate) struct Interpreter<'a> {
    arena: &'a NodeArena,
    config: &'a ParserConfiguration,
    ctx: &'a ExecutionContext,
    this: &'a Value,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        arena: &'a NodeArena,
        config: &'a ParserConfiguration,
        ctx: &'a ExecutionContext,
        this: &'a Value,
    ) -> Self {
        Interpreter {
            arena,
            config,
            ctx,
            this,
        }
    }

    fn names(&self) -> &StringInterner {
        self.config.interner()
    }

    /// Evaluate a chain; its value is the last statement's.
    pub(crate) fn eval_chain(
        &self,
        head: Option<NodeId>,
        scope: &ScopeRef,
    ) -> Result<Flow, EvalError> {
        let mut last = Value::Null;
        for id in self.arena.chain(head) {
            last = value!(self.eval(id, scope)?);
        }
        Ok(Flow::Normal(last))
    }

    /// Evaluate a nested chain in a fresh child frame.
    fn eval_block(&self, head: Option<NodeId>, scope: &ScopeRef) -> Result<Flow, EvalError> {
        if head.is_none() {
            return Ok(Flow::Normal(Value::Null));
        }
        self.eval_chain(head, &MapScope::child(scope))
    }

    pub(crate) fn eval(&self, id: NodeId, scope: &ScopeRef) -> Result<Flow, EvalError> {
        ensure_sufficient_stack(|| self.eval_inner(id, scope))
    }

    fn eval_inner(&self, id: NodeId, scope: &ScopeRef) -> Result<Flow, EvalError> {
        let value = match *self.arena.kind(id) {
            NodeKind::Literal { value, declared } => {
                let literal = self.literal(value);
                if let Some(ty) = declared {
                    if !ty.is_assignable_from(value.value_type()) {
                        return Err(type_mismatch(ty.name(), literal.type_name()));
                    }
                }
                literal
            }
            NodeKind::This => self.this.clone(),
            NodeKind::Var(name) => scope.resolve(name, self.names())?.get(),
            NodeKind::Declare { name, ty, init } => {
                let value = value!(self.eval(init, scope)?);
                scope.declare(name, value.clone(), ty)?;
                value
            }
            NodeKind::DeclareIndexed {
                slot,
                name,
                ty,
                init,
            } => {
                let value = value!(self.eval(init, scope)?);
                scope.declare_indexed(slot, name, value.clone(), ty)?;
                value
            }
            NodeKind::Assign { name, value } => {
                let value = value!(self.eval(value, scope)?);
                self.assign(name, value.clone(), scope)?;
                value
            }
            NodeKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => {
                let left = operators::require_bool(&value!(self.eval(left, scope)?))?;
                // `false && _` and `true || _` never evaluate the right side.
                if left == (op == BinaryOp::Or) {
                    Value::Bool(left)
                } else {
                    Value::Bool(operators::require_bool(&value!(self.eval(right, scope)?))?)
                }
            }
            NodeKind::Binary { op, left, right } => {
                let left = value!(self.eval(left, scope)?);
                let right = value!(self.eval(right, scope)?);
                operators::evaluate_binary(&left, &right, op)?
            }
            NodeKind::Not(operand) => {
                Value::Bool(!operators::require_bool(&value!(self.eval(operand, scope)?))?)
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let taken = operators::require_bool(&value!(self.eval(cond, scope)?))?;
                return self.eval_block(if taken { then_branch } else { else_branch }, scope);
            }
            NodeKind::Block(body) => return self.eval_block(body, scope),
            NodeKind::DoWhile { body, cond } => return self.eval_do_while(body, cond, scope),
            NodeKind::While { cond, body } => return self.eval_while(cond, body, scope),
            NodeKind::ForEach {
                item,
                iterable,
                body,
            } => return self.eval_for_each(item, iterable, body, scope),
            NodeKind::Return(value) => return Ok(Flow::Return(value!(self.eval(value, scope)?))),
            NodeKind::Break => return Ok(Flow::Break),
            NodeKind::ListLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for &item in self.arena.list(items) {
                    values.push(value!(self.eval(item, scope)?));
                }
                Value::List(ExecList::from_values(self.authority(), values))
            }
            NodeKind::MapLit(items) => {
                let mut entries = Vec::with_capacity(items.len() / 2);
                for pair in self.arena.list(items).chunks(2) {
                    let key = value!(self.eval(pair[0], scope)?);
                    let value = match pair.get(1) {
                        Some(&value) => value!(self.eval(value, scope)?),
                        None => Value::Null,
                    };
                    entries.push((Key::try_from(&key)?, value));
                }
                Value::Map(ExecMap::from_entries(self.authority(), entries))
            }
            NodeKind::SetLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for &item in self.arena.list(items) {
                    values.push(value!(self.eval(item, scope)?));
                }
                Value::Set(ExecSet::from_values(self.authority(), values)?)
            }
            NodeKind::TypeRef(name) => self.resolve_type(name)?,
            NodeKind::MethodCall {
                receiver,
                method,
                args,
            } => return self.eval_method_call(receiver, method, args, scope),
        };
        Ok(Flow::Normal(value))
    }

    fn literal(&self, literal: Literal) -> Value {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::Int(i),
            Literal::Float(bits) => Value::Float(f64::from_bits(bits)),
            Literal::Str(name) => Value::str(self.names().lookup(name)),
        }
    }

    /// Store into an existing variable, or declare it in the current frame.
    fn assign(&self, name: Name, value: Value, scope: &ScopeRef) -> Result<(), EvalError> {
        if scope.is_resolvable(name) {
            scope.resolve(name, self.names())?.set(value)
        } else {
            scope.declare(name, value, None).map(drop)
        }
    }

    fn authority(&self) -> Accounting {
        Arc::clone(self.ctx.authority())
    }
}

#[cfg(test)]
mod tests;
