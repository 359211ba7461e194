//! Loops.
//!
//! Every loop builds one child frame per entry of the construct, not per
//! iteration: body-local variables are visible to later iterations and
//! vanish when the loop exits. Each iteration starts with the execution
//! context's liveness check, so a cancelled or over-budget evaluation stops
//! within one iteration.

use warden_ir::{Name, NodeId};
use warden_value::errors::type_mismatch;
use warden_value::{EvalError, Value};

use super::operators::require_bool;
use super::Interpreter;
use crate::program::Flow;
use crate::scope::{MapScope, ScopeRef};

/// What the loop does after one body evaluation.
enum Step {
    Continue,
    Exit(Flow),
}

/// `Return` leaves the program, `Break` leaves the loop with `Null`.
fn step(flow: Flow) -> Step {
    match flow {
        Flow::Normal(_) => Step::Continue,
        Flow::Break => Step::Exit(Flow::Normal(Value::Null)),
        returned @ Flow::Return(_) => Step::Exit(returned),
    }
}

impl Interpreter<'_> {
    /// `do { body } while (cond)`.
    ///
    /// The condition is evaluated in the enclosing scope, not the body's
    /// frame, so body locals are not visible to it.
    pub(super) fn eval_do_while(
        &self,
        body: Option<NodeId>,
        cond: NodeId,
        scope: &ScopeRef,
    ) -> Result<Flow, EvalError> {
        let body_scope = MapScope::child(scope);
        loop {
            self.ctx.check_execution()?;
            if let Step::Exit(flow) = step(self.eval_chain(body, &body_scope)?) {
                return Ok(flow);
            }
            if !require_bool(&value!(self.eval(cond, scope)?))? {
                return Ok(Flow::Normal(Value::Null));
            }
        }
    }

    /// `while (cond) { body }`, condition in the enclosing scope.
    pub(super) fn eval_while(
        &self,
        cond: NodeId,
        body: Option<NodeId>,
        scope: &ScopeRef,
    ) -> Result<Flow, EvalError> {
        let body_scope = MapScope::child(scope);
        loop {
            self.ctx.check_execution()?;
            if !require_bool(&value!(self.eval(cond, scope)?))? {
                return Ok(Flow::Normal(Value::Null));
            }
            if let Step::Exit(flow) = step(self.eval_chain(body, &body_scope)?) {
                return Ok(flow);
            }
        }
    }

    /// `foreach (item : iterable) { body }` over list elements, set
    /// elements or map keys. The elements are snapshotted on entry.
    pub(super) fn eval_for_each(
        &self,
        item: Name,
        iterable: NodeId,
        body: Option<NodeId>,
        scope: &ScopeRef,
    ) -> Result<Flow, EvalError> {
        let items = match value!(self.eval(iterable, scope)?) {
            Value::List(list) => list.values(),
            Value::Set(set) => set.values(),
            Value::Map(map) => map.pairs().into_iter().map(|(k, _)| k.to_value()).collect(),
            other => return Err(type_mismatch("iterable", other.type_name())),
        };
        let body_scope = MapScope::child(scope);
        for value in items {
            self.ctx.check_execution()?;
            body_scope.declare(item, value, None)?;
            if let Step::Exit(flow) = step(self.eval_chain(body, &body_scope)?) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal(Value::Null))
    }
}
