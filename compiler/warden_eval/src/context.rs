//! Per-evaluation execution context and liveness limits.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use warden_value::errors::{
    deadline_exceeded, execution_cancelled, iteration_limit_exceeded, memory_limit_exceeded,
};
use warden_value::{Accounting, EvalError, NoAccounting};

/// Cross-thread cancellation flag. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Bounds checked on every loop iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub deadline: Option<Instant>,
    /// Compared against the authority's [`usage`](warden_value::AccountingAuthority::usage).
    pub memory_limit: Option<i64>,
    pub max_iterations: Option<u64>,
}

impl ExecutionLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    #[must_use]
    pub fn with_memory_limit(mut self, limit: i64) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = Some(limit);
        self
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.deadline.is_none() && self.memory_limit.is_none() && self.max_iterations.is_none()
    }
}

/// State of one evaluation: the authority new containers are bound to, and
/// the liveness limits loops poll.
///
/// Not shared across threads; hosts evaluating concurrently create one
/// context per evaluation and may share the token.
pub struct ExecutionContext {
    authority: Accounting,
    limits: ExecutionLimits,
    cancel: CancellationToken,
    iterations: Cell<u64>,
}

impl ExecutionContext {
    pub fn new(authority: Accounting) -> Self {
        ExecutionContext {
            authority,
            limits: ExecutionLimits::default(),
            cancel: CancellationToken::default(),
            iterations: Cell::new(0),
        }
    }

    /// Context that charges nothing and never stops.
    pub fn unaccounted() -> Self {
        Self::new(NoAccounting::shared())
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn authority(&self) -> &Accounting {
        &self.authority
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Loop iterations run so far.
    pub fn iterations(&self) -> u64 {
        self.iterations.get()
    }

    /// Liveness check run before every loop iteration.
    pub fn check_execution(&self) -> Result<(), EvalError> {
        if self.cancel.is_cancelled() {
            tracing::debug!("execution cancelled");
            return Err(execution_cancelled());
        }
        let count = self.iterations.get() + 1;
        self.iterations.set(count);
        if self.limits.is_unbounded() {
            return Ok(());
        }
        if self.limits.deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::debug!("execution deadline exceeded");
            return Err(deadline_exceeded());
        }
        if let (Some(limit), Some(used)) = (self.limits.memory_limit, self.authority.usage()) {
            if used > limit {
                tracing::debug!(used, limit, "memory limit exceeded");
                return Err(memory_limit_exceeded(used, limit));
            }
        }
        match self.limits.max_iterations {
            Some(limit) if count > limit => Err(iteration_limit_exceeded(limit)),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("limits", &self.limits)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("iterations", &self.iterations.get())
            .finish_non_exhaustive()
    }
}
