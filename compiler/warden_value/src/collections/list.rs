//! Accounted list.

use std::sync::Arc;

use smallvec::SmallVec;

use super::order::{normalize_index, sort_by_value};
use super::shared::{Shared, View};
use crate::accounting::{Accounting, ContainerId, Slot};
use crate::errors::index_out_of_range;
use crate::{EvalError, EvalResult, Value};

/// Script-visible list whose every structural mutation is accounted.
#[derive(Clone)]
pub struct ExecList {
    shared: Arc<Shared<Vec<Value>>>,
    view: View,
}

impl ExecList {
    pub fn new(authority: Accounting) -> Self {
        ExecList {
            shared: Shared::new(authority, Vec::new()),
            view: View::Owner,
        }
    }

    /// Build a list holding copies of `values`, reporting an add per element.
    pub fn from_values(authority: Accounting, values: impl IntoIterator<Item = Value>) -> Self {
        let values: Vec<Value> = values.into_iter().collect();
        let list = ExecList {
            shared: Shared::new(authority, values.clone()),
            view: View::Owner,
        };
        for (index, value) in values.iter().enumerate() {
            list.shared.added(Slot::Index(index), value);
        }
        list
    }

    /// An empty list bound to the same authority.
    fn sibling(&self, values: Vec<Value>) -> ExecList {
        ExecList::from_values(Arc::clone(&self.shared.authority), values)
    }

    /// Identity of this handle: the container's, or the view's own id for a
    /// read-only view.
    pub fn id(&self) -> ContainerId {
        self.view.id(self.shared.id)
    }

    pub fn authority(&self) -> &Accounting {
        &self.shared.authority
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.view, View::ReadOnly(_))
    }

    /// Running cost of the backing container.
    pub fn memory_size(&self) -> i64 {
        self.shared.memory()
    }

    /// Whether both handles refer to the same container.
    pub fn ptr_eq(&self, other: &ExecList) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn content_eq(&self, other: &ExecList) -> bool {
        self.ptr_eq(other) || self.values() == other.values()
    }

    pub fn to_unmodifiable(&self) -> ExecList {
        ExecList {
            shared: Arc::clone(&self.shared),
            view: self.view.read_only(&self.shared),
        }
    }

    // Reads

    pub fn len(&self) -> usize {
        self.shared.data.read().len()
    }

    pub fn length(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.data.read().is_empty()
    }

    /// Snapshot of the current elements.
    pub fn values(&self) -> Vec<Value> {
        self.shared.data.read().clone()
    }

    pub fn get(&self, index: i64) -> EvalResult {
        let data = self.shared.data.read();
        let slot = checked_index(index, data.len())?;
        Ok(data[slot].clone())
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.shared.data.read().iter().any(|v| v == value)
    }

    pub fn contains_all(&self, values: &[Value]) -> bool {
        let data = self.shared.data.read();
        values.iter().all(|needle| data.iter().any(|v| v == needle))
    }

    /// First position of `value` at or after `from` (normalized), or -1.
    pub fn index_of(&self, value: &Value, from: i64) -> i64 {
        let data = self.shared.data.read();
        let start = normalize_index(from, data.len());
        data[start..]
            .iter()
            .position(|v| v == value)
            .map_or(-1, |pos| to_i64(start + pos))
    }

    pub fn join(&self, separator: &str) -> String {
        let data = self.shared.data.read();
        let mut out = String::new();
        for (i, value) in data.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.push_str(&value.to_string());
        }
        out
    }

    /// Copy of `[start, end)` with both bounds normalized.
    pub fn slice(&self, start: i64, end: i64) -> ExecList {
        let copied = {
            let data = self.shared.data.read();
            let (start, end) = (
                normalize_index(start, data.len()),
                normalize_index(end, data.len()),
            );
            if start < end {
                data[start..end].to_vec()
            } else {
                Vec::new()
            }
        };
        self.sibling(copied)
    }

    /// Copy of `[from, to)`; bounds must lie within the list.
    pub fn sub_list(&self, from: i64, to: i64) -> Result<ExecList, EvalError> {
        let copied = {
            let data = self.shared.data.read();
            let len = data.len();
            let from_slot = bounded(from, len)?;
            let to_slot = bounded(to, len)?;
            if from_slot > to_slot {
                return Err(index_out_of_range(from, len));
            }
            data[from_slot..to_slot].to_vec()
        };
        Ok(self.sibling(copied))
    }

    pub fn concat(&self, other: &[Value]) -> ExecList {
        let mut copied = self.values();
        copied.extend_from_slice(other);
        self.sibling(copied)
    }

    pub fn to_sorted(&self, ascending: bool) -> Result<ExecList, EvalError> {
        let sorted = sort_by_value(self.values(), ascending, |v| v)?;
        Ok(self.sibling(sorted))
    }

    pub fn to_reversed(&self) -> ExecList {
        let mut copied = self.values();
        copied.reverse();
        self.sibling(copied)
    }

    /// Copy with the splice applied; the original is untouched.
    pub fn to_spliced(&self, start: i64, delete_count: i64, items: &[Value]) -> ExecList {
        let mut copied = self.values();
        let start = normalize_index(start, copied.len());
        let delete = clamp_count(delete_count, copied.len() - start);
        let _ = copied.splice(start..start + delete, items.iter().cloned());
        self.sibling(copied)
    }

    /// Copy with the element at `index` (negative counts from the end)
    /// replaced by `value`.
    pub fn with(&self, index: i64, value: Value) -> Result<ExecList, EvalError> {
        let mut copied = self.values();
        let len = to_i64(copied.len());
        let resolved = if index < 0 { index + len } else { index };
        let slot = checked_index(resolved, copied.len())
            .map_err(|_| index_out_of_range(index, copied.len()))?;
        copied[slot] = value;
        Ok(self.sibling(copied))
    }

    // Mutations

    pub fn push(&self, value: Value) -> Result<(), EvalError> {
        self.view.check_mut("push")?;
        let index = {
            let mut data = self.shared.data.write();
            data.push(value.clone());
            data.len() - 1
        };
        self.shared.added(Slot::Index(index), &value);
        Ok(())
    }

    /// Remove and return the last element; `Null` when empty.
    pub fn pop(&self) -> EvalResult {
        self.view.check_mut("pop")?;
        let popped = {
            let mut data = self.shared.data.write();
            data.pop().map(|v| (data.len(), v))
        };
        Ok(self.report_removed(popped))
    }

    /// Remove and return the first element; `Null` when empty.
    pub fn shift(&self) -> EvalResult {
        self.view.check_mut("shift")?;
        let shifted = {
            let mut data = self.shared.data.write();
            if data.is_empty() {
                None
            } else {
                Some((0, data.remove(0)))
            }
        };
        Ok(self.report_removed(shifted))
    }

    pub fn unshift(&self, value: Value) -> Result<(), EvalError> {
        self.insert(0, value)
    }

    /// Insert before `index`; `index == len` appends.
    pub fn insert(&self, index: i64, value: Value) -> Result<(), EvalError> {
        self.view.check_mut("insert")?;
        let slot = {
            let mut data = self.shared.data.write();
            let slot = bounded(index, data.len())?;
            data.insert(slot, value.clone());
            slot
        };
        self.shared.added(Slot::Index(slot), &value);
        Ok(())
    }

    pub fn add_all(&self, values: &[Value]) -> Result<(), EvalError> {
        self.view.check_mut("add_all")?;
        let start = {
            let mut data = self.shared.data.write();
            let start = data.len();
            data.extend_from_slice(values);
            start
        };
        self.report_added_run(start, values);
        Ok(())
    }

    pub fn insert_all(&self, index: i64, values: &[Value]) -> Result<(), EvalError> {
        self.view.check_mut("insert_all")?;
        let start = {
            let mut data = self.shared.data.write();
            let start = bounded(index, data.len())?;
            let _ = data.splice(start..start, values.iter().cloned());
            start
        };
        self.report_added_run(start, values);
        Ok(())
    }

    pub fn remove_at(&self, index: i64) -> EvalResult {
        self.view.check_mut("remove_at")?;
        let removed = {
            let mut data = self.shared.data.write();
            let slot = checked_index(index, data.len())?;
            (slot, data.remove(slot))
        };
        Ok(self.report_removed(Some(removed)))
    }

    /// Remove the first element equal to `value`.
    pub fn remove_value(&self, value: &Value) -> Result<bool, EvalError> {
        self.view.check_mut("remove_value")?;
        // Compare under a read lock: elements may alias this list.
        let Some(slot) = self.shared.data.read().iter().position(|v| v == value) else {
            return Ok(false);
        };
        let removed = {
            let mut data = self.shared.data.write();
            (slot < data.len()).then(|| (slot, data.remove(slot)))
        };
        let found = removed.is_some();
        self.report_removed(removed);
        Ok(found)
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&self, index: i64, value: Value) -> EvalResult {
        self.view.check_mut("set")?;
        let (slot, old) = {
            let mut data = self.shared.data.write();
            let slot = checked_index(index, data.len())?;
            (slot, std::mem::replace(&mut data[slot], value.clone()))
        };
        self.shared.removed(Slot::Index(slot), &old);
        self.shared.added(Slot::Index(slot), &value);
        Ok(old)
    }

    pub fn clear(&self) -> Result<(), EvalError> {
        self.view.check_mut("clear")?;
        let drained = std::mem::take(&mut *self.shared.data.write());
        for (index, value) in drained.iter().enumerate().rev() {
            self.shared.removed(Slot::Index(index), value);
        }
        Ok(())
    }

    /// Remove `delete_count` elements at `start` (both clamped), insert
    /// `items` there, and return the removed elements as a new list.
    pub fn splice(
        &self,
        start: i64,
        delete_count: i64,
        items: &[Value],
    ) -> Result<ExecList, EvalError> {
        self.view.check_mut("splice")?;
        let (start, removed) = {
            let mut data = self.shared.data.write();
            let start = normalize_index(start, data.len());
            let delete = clamp_count(delete_count, data.len() - start);
            let removed: Vec<Value> = data
                .splice(start..start + delete, items.iter().cloned())
                .collect();
            (start, removed)
        };
        for value in &removed {
            self.shared.removed(Slot::Index(start), value);
        }
        self.report_added_run(start, items);
        Ok(self.sibling(removed))
    }

    /// Reorder in place. No accounting: membership is unchanged.
    pub fn sort(&self, ascending: bool) -> Result<(), EvalError> {
        self.view.check_mut("sort")?;
        let mut data = self.shared.data.write();
        *data = sort_by_value(data.to_vec(), ascending, |v| v)?;
        Ok(())
    }

    pub fn reverse(&self) -> Result<(), EvalError> {
        self.view.check_mut("reverse")?;
        self.shared.data.write().reverse();
        Ok(())
    }

    /// Overwrite `[start, end)` (normalized) with `value`; each overwritten
    /// slot reports a remove and an add.
    pub fn fill(&self, value: &Value, start: i64, end: i64) -> Result<(), EvalError> {
        self.view.check_mut("fill")?;
        let replaced: SmallVec<[(usize, Value); 8]> = {
            let mut data = self.shared.data.write();
            let (start, end) = (
                normalize_index(start, data.len()),
                normalize_index(end, data.len()),
            );
            (start..end.max(start))
                .map(|slot| (slot, std::mem::replace(&mut data[slot], value.clone())))
                .collect()
        };
        for (slot, old) in &replaced {
            self.shared.removed(Slot::Index(*slot), old);
            self.shared.added(Slot::Index(*slot), value);
        }
        Ok(())
    }

    fn report_removed(&self, removed: Option<(usize, Value)>) -> Value {
        match removed {
            Some((slot, value)) => {
                self.shared.removed(Slot::Index(slot), &value);
                value
            }
            None => Value::Null,
        }
    }

    fn report_added_run(&self, start: usize, values: &[Value]) {
        for (offset, value) in values.iter().enumerate() {
            self.shared.added(Slot::Index(start + offset), value);
        }
    }
}

impl std::fmt::Debug for ExecList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecList")
            .field("id", &self.id())
            .field("read_only", &self.is_read_only())
            .field("values", &self.values())
            .finish()
    }
}

/// Strict index into `0..len`.
fn checked_index(index: i64, len: usize) -> Result<usize, EvalError> {
    usize::try_from(index)
        .ok()
        .filter(|slot| *slot < len)
        .ok_or_else(|| index_out_of_range(index, len))
}

/// Strict position in `0..=len` (insertion point).
fn bounded(index: i64, len: usize) -> Result<usize, EvalError> {
    usize::try_from(index)
        .ok()
        .filter(|slot| *slot <= len)
        .ok_or_else(|| index_out_of_range(index, len))
}

fn clamp_count(count: i64, available: usize) -> usize {
    usize::try_from(count).map_or(0, |c| c.min(available))
}

fn to_i64(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
