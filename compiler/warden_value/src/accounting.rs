//! Memory accounting for script-created containers.
//!
//! Every structural mutation of an accounted container asks the container's
//! [`AccountingAuthority`] for a cost delta and adds it to the container's
//! running `memory_size`. The authority decides what a value costs; the
//! container only guarantees that
//! `memory_size == Σ added deltas − Σ removed deltas`.
//!
//! Authorities are called after the container has released its own lock, so
//! an authority may freely inspect the value (including nested containers).

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::{Key, Value};

/// Identity of an accounted container or read-only view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    pub const fn new(raw: u64) -> Self {
        ContainerId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where in a container a value was added or removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot<'a> {
    /// List position at the time of the change.
    Index(usize),
    /// Map key.
    Key(&'a Key),
    /// Set element (the value itself identifies the slot).
    Element,
}

/// Decides the cost of values stored in containers.
pub trait AccountingAuthority: Send + Sync {
    /// Fresh identity for a container or read-only view.
    fn next_id(&self) -> ContainerId;

    /// Cost delta for storing `value` at `slot`.
    fn on_value_added(&self, container: ContainerId, slot: Slot<'_>, value: &Value) -> i64;

    /// Cost delta released by removing `value` from `slot`.
    fn on_value_removed(&self, container: ContainerId, slot: Slot<'_>, value: &Value) -> i64;

    /// A read-only view over `backing` was registered under `view`.
    fn on_view_created(&self, view: ContainerId, backing: ContainerId) {
        let _ = (view, backing);
    }

    /// Total cost currently charged, when the authority tracks one.
    fn usage(&self) -> Option<i64> {
        None
    }
}

/// Shared handle to an authority.
pub type Accounting = Arc<dyn AccountingAuthority>;

/// Monotonic id source.
#[derive(Debug, Default)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> ContainerId {
        ContainerId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Authority that charges nothing.
#[derive(Debug, Default)]
pub struct NoAccounting {
    ids: IdSequence,
}

impl NoAccounting {
    pub fn shared() -> Accounting {
        Arc::new(NoAccounting::default())
    }
}

impl AccountingAuthority for NoAccounting {
    fn next_id(&self) -> ContainerId {
        self.ids.next()
    }

    fn on_value_added(&self, _: ContainerId, _: Slot<'_>, _: &Value) -> i64 {
        0
    }

    fn on_value_removed(&self, _: ContainerId, _: Slot<'_>, _: &Value) -> i64 {
        0
    }
}

/// Authority charging an estimate of each stored value's size.
///
/// Map entries also pay for their key. Nested containers are charged their
/// own `memory_size` at the moment they are stored or removed.
#[derive(Debug, Default)]
pub struct SizeAccounting {
    ids: IdSequence,
}

impl SizeAccounting {
    pub fn shared() -> Accounting {
        Arc::new(SizeAccounting::default())
    }

    fn cost(slot: Slot<'_>, value: &Value) -> i64 {
        let key = match slot {
            Slot::Key(key) => key.to_value().estimated_size(),
            Slot::Index(_) | Slot::Element => 0,
        };
        key.saturating_add(value.estimated_size())
    }
}

impl AccountingAuthority for SizeAccounting {
    fn next_id(&self) -> ContainerId {
        self.ids.next()
    }

    fn on_value_added(&self, _: ContainerId, slot: Slot<'_>, value: &Value) -> i64 {
        Self::cost(slot, value)
    }

    fn on_value_removed(&self, _: ContainerId, slot: Slot<'_>, value: &Value) -> i64 {
        Self::cost(slot, value)
    }
}

/// Wraps another authority and keeps a running total of everything it
/// charged, so execution limits can compare usage against a quota.
pub struct QuotaAccounting {
    inner: Accounting,
    total: AtomicI64,
}

impl QuotaAccounting {
    pub fn new(inner: Accounting) -> Self {
        QuotaAccounting {
            inner,
            total: AtomicI64::new(0),
        }
    }

    pub fn shared(inner: Accounting) -> Accounting {
        Arc::new(QuotaAccounting::new(inner))
    }

    pub fn total(&self) -> i64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for QuotaAccounting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaAccounting")
            .field("total", &self.total())
            .finish_non_exhaustive()
    }
}

impl AccountingAuthority for QuotaAccounting {
    fn next_id(&self) -> ContainerId {
        self.inner.next_id()
    }

    fn on_value_added(&self, container: ContainerId, slot: Slot<'_>, value: &Value) -> i64 {
        let delta = self.inner.on_value_added(container, slot, value);
        self.total.fetch_add(delta, Ordering::Relaxed);
        delta
    }

    fn on_value_removed(&self, container: ContainerId, slot: Slot<'_>, value: &Value) -> i64 {
        let delta = self.inner.on_value_removed(container, slot, value);
        self.total.fetch_sub(delta, Ordering::Relaxed);
        delta
    }

    fn on_view_created(&self, view: ContainerId, backing: ContainerId) {
        self.inner.on_view_created(view, backing);
    }

    fn usage(&self) -> Option<i64> {
        Some(self.total())
    }
}
