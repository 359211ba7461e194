//! Accelerated evaluation strategies.
//!
//! A [`CompiledProgram`] asks its [`Accelerator`] once, on first evaluation,
//! for a faster equivalent of its node chain. The accelerator may decline, in
//! which case the program interprets its nodes directly for the rest of its
//! life. Whatever the accelerator produces must yield the same value as
//! interpretation for the same context and scope chain.
//!
//! Accelerators that keep per-thread working state acquire it in
//! [`Accelerator::acquire`] and give it back in [`Accelerator::release`];
//! every evaluation brackets itself with an [`AcceleratorSession`], so the
//! release runs on success, on error and on unwinding alike.

use warden_value::{EvalError, Value};

use crate::program::{CompiledProgram, Flow};
use crate::scope::{MapScope, ScopeRef};
use crate::ExecutionContext;

/// A precompiled equivalent of a program's node chain.
pub trait AcceleratedProgram: Send + Sync {
    fn evaluate(
        &self,
        ctx: &ExecutionContext,
        this: &Value,
        scope: &ScopeRef,
    ) -> Result<Flow, EvalError>;
}

/// Produces accelerated programs.
pub trait Accelerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build an accelerated form of `program`, or `None` to keep interpreting.
    fn accelerate(&self, program: &CompiledProgram) -> Option<Box<dyn AcceleratedProgram>>;

    /// Claim per-evaluation working state.
    fn acquire(&self) {}

    /// Give back what [`acquire`](Accelerator::acquire) claimed.
    fn release(&self) {}
}

/// Scoped acquisition of an accelerator's working state.
pub struct AcceleratorSession<'a> {
    accelerator: &'a dyn Accelerator,
}

impl<'a> AcceleratorSession<'a> {
    pub fn open(accelerator: &'a dyn Accelerator) -> Self {
        accelerator.acquire();
        AcceleratorSession { accelerator }
    }
}

impl Drop for AcceleratorSession<'_> {
    fn drop(&mut self) {
        self.accelerator.release();
    }
}

/// Never accelerates.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterpretOnly;

impl Accelerator for InterpretOnly {
    fn name(&self) -> &'static str {
        "interpret-only"
    }

    fn accelerate(&self, _program: &CompiledProgram) -> Option<Box<dyn AcceleratedProgram>> {
        None
    }
}

/// Folds literal-only programs to their value.
///
/// The program is interpreted once, unaccounted and against an empty scope.
/// Only scalar results are kept: a container would be shared between every
/// later evaluation and bound to the wrong authority.
#[derive(Clone, Copy, Debug, Default)]
pub struct LiteralAccelerator;

impl Accelerator for LiteralAccelerator {
    fn name(&self) -> &'static str {
        "literal-fold"
    }

    fn accelerate(&self, program: &CompiledProgram) -> Option<Box<dyn AcceleratedProgram>> {
        if !program.is_literal_only() || program.is_empty() {
            return None;
        }
        let ctx = ExecutionContext::unaccounted();
        match program.interpret(&ctx, &Value::Null, &MapScope::root()) {
            Ok(Flow::Normal(value)) if is_scalar(&value) => Some(Box::new(Folded(value))),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(%err, "literal folding declined");
                None
            }
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
    )
}

/// Value precomputed by [`LiteralAccelerator`].
struct Folded(Value);

impl AcceleratedProgram for Folded {
    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
        _this: &Value,
        _scope: &ScopeRef,
    ) -> Result<Flow, EvalError> {
        Ok(Flow::Normal(self.0.clone()))
    }
}
