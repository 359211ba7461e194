//! Shared helpers for collection tests.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::accounting::{Accounting, AccountingAuthority, ContainerId, IdSequence, Slot};
use crate::{ExecList, Value};

/// Authority that charges `1 + estimated_size` and remembers every delta
/// per container, so tests can check `memory_size` against the ledger.
#[derive(Default)]
pub(crate) struct Ledger {
    ids: IdSequence,
    balances: Mutex<FxHashMap<ContainerId, i64>>,
    pub(crate) views: Mutex<Vec<(ContainerId, ContainerId)>>,
}

impl Ledger {
    pub(crate) fn shared() -> Arc<Ledger> {
        Arc::new(Ledger::default())
    }

    pub(crate) fn balance(&self, id: ContainerId) -> i64 {
        self.balances.lock().get(&id).copied().unwrap_or(0)
    }

    fn charge(slot: Slot<'_>, value: &Value) -> i64 {
        let key = match slot {
            Slot::Key(key) => key.to_value().estimated_size(),
            Slot::Index(_) | Slot::Element => 0,
        };
        1 + key + value.estimated_size()
    }
}

impl AccountingAuthority for Ledger {
    fn next_id(&self) -> ContainerId {
        self.ids.next()
    }

    fn on_value_added(&self, container: ContainerId, slot: Slot<'_>, value: &Value) -> i64 {
        let delta = Self::charge(slot, value);
        *self.balances.lock().entry(container).or_default() += delta;
        delta
    }

    fn on_value_removed(&self, container: ContainerId, slot: Slot<'_>, value: &Value) -> i64 {
        let delta = Self::charge(slot, value);
        *self.balances.lock().entry(container).or_default() -= delta;
        delta
    }

    fn on_view_created(&self, view: ContainerId, backing: ContainerId) {
        self.views.lock().push((view, backing));
    }
}

pub(crate) fn accounting(ledger: &Arc<Ledger>) -> Accounting {
    Arc::clone(ledger) as Accounting
}

pub(crate) fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

pub(crate) fn list_of(ledger: &Arc<Ledger>, values: &[i64]) -> ExecList {
    ExecList::from_values(accounting(ledger), ints(values))
}
