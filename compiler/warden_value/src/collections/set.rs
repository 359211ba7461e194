//! Accounted insertion-ordered set.

use std::sync::Arc;

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use super::shared::{Shared, View};
use crate::accounting::{Accounting, ContainerId, Slot};
use crate::{EvalError, Key, Value};

type Elements = IndexSet<Key, FxBuildHasher>;

/// Script-visible set of hashable scalars, iterated in insertion order.
#[derive(Clone)]
pub struct ExecSet {
    shared: Arc<Shared<Elements>>,
    view: View,
}

impl ExecSet {
    pub fn new(authority: Accounting) -> Self {
        ExecSet {
            shared: Shared::new(authority, Elements::default()),
            view: View::Owner,
        }
    }

    /// Build a set from values; duplicates are reported once.
    pub fn from_values(
        authority: Accounting,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, EvalError> {
        let set = ExecSet::new(authority);
        for value in values {
            set.insert(Key::try_from(&value)?);
        }
        Ok(set)
    }

    pub fn id(&self) -> ContainerId {
        self.view.id(self.shared.id)
    }

    pub fn authority(&self) -> &Accounting {
        &self.shared.authority
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.view, View::ReadOnly(_))
    }

    pub fn memory_size(&self) -> i64 {
        self.shared.memory()
    }

    pub fn ptr_eq(&self, other: &ExecSet) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn content_eq(&self, other: &ExecSet) -> bool {
        self.ptr_eq(other) || *self.shared.data.read() == *other.shared.data.read()
    }

    pub fn to_unmodifiable(&self) -> ExecSet {
        ExecSet {
            shared: Arc::clone(&self.shared),
            view: self.view.read_only(&self.shared),
        }
    }

    pub fn len(&self) -> usize {
        self.shared.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.data.read().is_empty()
    }

    /// Membership by [`Key`], so `Int(1)` and `Float(1.0)` are different
    /// elements here even though they compare equal as values (and
    /// `ExecList::contains` finds one by the other). Non-hashable values are
    /// never members.
    pub fn contains(&self, value: &Value) -> bool {
        Key::try_from(value).is_ok_and(|key| self.shared.data.read().contains(&key))
    }

    pub fn contains_all(&self, values: &[Value]) -> bool {
        values.iter().all(|value| self.contains(value))
    }

    /// Snapshot of the elements in order.
    pub fn keys(&self) -> Vec<Key> {
        self.shared.data.read().iter().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.shared.data.read().iter().map(Key::to_value).collect()
    }

    /// Returns whether the value was newly added.
    pub fn add(&self, value: &Value) -> Result<bool, EvalError> {
        self.view.check_mut("add")?;
        let key = Key::try_from(value)?;
        Ok(self.insert(key))
    }

    /// Returns whether the value was present.
    pub fn remove(&self, value: &Value) -> Result<bool, EvalError> {
        self.view.check_mut("remove")?;
        let Ok(key) = Key::try_from(value) else {
            return Ok(false);
        };
        let removed = self.shared.data.write().shift_remove(&key);
        if removed {
            self.shared.removed(Slot::Element, &key.to_value());
        }
        Ok(removed)
    }

    /// Remove every element, reporting a remove for each.
    pub fn clear(&self) -> Result<(), EvalError> {
        self.view.check_mut("clear")?;
        let drained = std::mem::take(&mut *self.shared.data.write());
        for key in &drained {
            self.shared.removed(Slot::Element, &key.to_value());
        }
        Ok(())
    }

    fn insert(&self, key: Key) -> bool {
        let value = key.to_value();
        let inserted = self.shared.data.write().insert(key);
        if inserted {
            self.shared.added(Slot::Element, &value);
        }
        inserted
    }
}

impl std::fmt::Debug for ExecSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecSet")
            .field("id", &self.id())
            .field("read_only", &self.is_read_only())
            .field("elements", &self.keys())
            .finish()
    }
}
