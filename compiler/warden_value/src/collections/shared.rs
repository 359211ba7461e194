//! State common to every accounted container.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::accounting::{Accounting, ContainerId, Slot};
use crate::errors::unsupported;
use crate::{EvalError, Value};

pub(super) struct Shared<T> {
    pub(super) id: ContainerId,
    pub(super) authority: Accounting,
    memory: AtomicI64,
    pub(super) data: RwLock<T>,
}

impl<T> Shared<T> {
    pub(super) fn new(authority: Accounting, data: T) -> Arc<Self> {
        Arc::new(Shared {
            id: authority.next_id(),
            authority,
            memory: AtomicI64::new(0),
            data: RwLock::new(data),
        })
    }

    pub(super) fn added(&self, slot: Slot<'_>, value: &Value) {
        let delta = self.authority.on_value_added(self.id, slot, value);
        self.memory.fetch_add(delta, Ordering::Relaxed);
        tracing::trace!(container = self.id.raw(), delta, "value added");
    }

    pub(super) fn removed(&self, slot: Slot<'_>, value: &Value) {
        let delta = self.authority.on_value_removed(self.id, slot, value);
        self.memory.fetch_sub(delta, Ordering::Relaxed);
        tracing::trace!(container = self.id.raw(), delta, "value removed");
    }

    pub(super) fn memory(&self) -> i64 {
        self.memory.load(Ordering::Relaxed)
    }
}

/// Which handle onto a shared container this is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum View {
    Owner,
    ReadOnly(ContainerId),
}

impl View {
    pub(super) fn id(self, backing: ContainerId) -> ContainerId {
        match self {
            View::Owner => backing,
            View::ReadOnly(id) => id,
        }
    }

    #[inline]
    pub(super) fn check_mut(self, operation: &str) -> Result<(), EvalError> {
        match self {
            View::Owner => Ok(()),
            View::ReadOnly(_) => Err(unsupported(operation)),
        }
    }

    /// Register a read-only view over the container unless this already is
    /// one.
    pub(super) fn read_only<T>(self, shared: &Shared<T>) -> View {
        match self {
            View::ReadOnly(_) => self,
            View::Owner => {
                let id = shared.authority.next_id();
                shared.authority.on_view_created(id, shared.id);
                View::ReadOnly(id)
            }
        }
    }
}
