//! Accounted insertion-ordered map.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::order::{normalize_index, sort_by_value};
use super::shared::{Shared, View};
use crate::accounting::{Accounting, ContainerId, Slot};
use crate::{EvalError, ExecList, Key, Value};

type Entries = IndexMap<Key, Value, FxBuildHasher>;

/// Script-visible map keeping insertion order.
///
/// Storing `Null` under a key removes the key.
#[derive(Clone)]
pub struct ExecMap {
    shared: Arc<Shared<Entries>>,
    view: View,
}

impl ExecMap {
    pub fn new(authority: Accounting) -> Self {
        ExecMap {
            shared: Shared::new(authority, Entries::default()),
            view: View::Owner,
        }
    }

    /// Build a map from `(key, value)` pairs, reporting an add per stored
    /// entry. Later duplicates replace earlier ones.
    pub fn from_entries(
        authority: Accounting,
        entries: impl IntoIterator<Item = (Key, Value)>,
    ) -> Self {
        let map = ExecMap::new(authority);
        for (key, value) in entries {
            map.store(key, value);
        }
        map
    }

    fn sibling(&self, entries: impl IntoIterator<Item = (Key, Value)>) -> ExecMap {
        ExecMap::from_entries(Arc::clone(&self.shared.authority), entries)
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

    pub fn ptr_eq(&self, other: &ExecMap) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn content_eq(&self, other: &ExecMap) -> bool {
        self.ptr_eq(other) || *self.shared.data.read() == *other.shared.data.read()
    }

    pub fn to_unmodifiable(&self) -> ExecMap {
        ExecMap {
            shared: Arc::clone(&self.shared),
            view: self.view.read_only(&self.shared),
        }
    }

    // Reads

    pub fn len(&self) -> usize {
        self.shared.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.data.read().is_empty()
    }

    /// Value under `key`, `Null` when absent.
    pub fn get(&self, key: &Key) -> Value {
        self.shared.data.read().get(key).cloned().unwrap_or_default()
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.shared.data.read().contains_key(key)
    }

    pub fn contains_value(&self, value: &Value) -> bool {
        self.shared.data.read().values().any(|v| v == value)
    }

    /// Snapshot of the entries in order.
    pub fn pairs(&self) -> Vec<(Key, Value)> {
        self.shared
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keys as a new accounted list.
    pub fn keys(&self) -> ExecList {
        let keys: Vec<Value> = self.shared.data.read().keys().map(Key::to_value).collect();
        ExecList::from_values(Arc::clone(&self.shared.authority), keys)
    }

    /// Values as a new accounted list.
    pub fn values(&self) -> ExecList {
        let values: Vec<Value> = self.shared.data.read().values().cloned().collect();
        ExecList::from_values(Arc::clone(&self.shared.authority), values)
    }

    /// Live entry views, in order.
    pub fn entries(&self) -> Vec<MapEntry> {
        self.shared
            .data
            .read()
            .keys()
            .map(|key| MapEntry {
                map: self.clone(),
                key: key.clone(),
            })
            .collect()
    }

    /// Copy of the entries at positions `[start, end)` (normalized).
    pub fn slice(&self, start: i64, end: i64) -> ExecMap {
        let pairs = self.pairs();
        let (start, end) = (
            normalize_index(start, pairs.len()),
            normalize_index(end, pairs.len()),
        );
        self.sibling(pairs.into_iter().skip(start).take(end.saturating_sub(start)))
    }

    /// Independent copy bound to the same authority.
    pub fn duplicate(&self) -> ExecMap {
        self.sibling(self.pairs())
    }

    pub fn to_sorted_by_key(&self, ascending: bool) -> Result<ExecMap, EvalError> {
        Ok(self.sibling(sorted_by_key(self.pairs(), ascending)?))
    }

    pub fn to_sorted_by_value(&self, ascending: bool) -> Result<ExecMap, EvalError> {
        Ok(self.sibling(sort_by_value(self.pairs(), ascending, |(_, v)| v)?))
    }

    /// Same as [`ExecMap::to_sorted_by_key`].
    pub fn to_sorted(&self, ascending: bool) -> Result<ExecMap, EvalError> {
        self.to_sorted_by_key(ascending)
    }

    pub fn to_reversed(&self) -> ExecMap {
        let mut pairs = self.pairs();
        pairs.reverse();
        self.sibling(pairs)
    }

    /// Map each value to its key. Values shared by several keys map to an
    /// accounted list of those keys in original order.
    pub fn to_inverted(&self) -> Result<ExecMap, EvalError> {
        Ok(self.sibling(self.inverted()?))
    }

    // Mutations

    /// Store `value` under `key`, returning the previous value (`Null` when
    /// absent). A `Null` value removes the key.
    pub fn put(&self, key: Key, value: Value) -> Result<Value, EvalError> {
        self.view.check_mut("put")?;
        Ok(self.store(key, value))
    }

    /// Store `value` under `key`, keeping the key even when `value` is
    /// `Null`. Returns the previous value (`Null` when absent).
    pub fn insert(&self, key: Key, value: Value) -> Result<Value, EvalError> {
        self.view.check_mut("insert")?;
        let previous = self.shared.data.write().insert(key.clone(), value.clone());
        if let Some(previous) = &previous {
            self.shared.removed(Slot::Key(&key), previous);
        }
        self.shared.added(Slot::Key(&key), &value);
        Ok(previous.unwrap_or_default())
    }

    pub fn put_all(&self, entries: impl IntoIterator<Item = (Key, Value)>) -> Result<(), EvalError> {
        self.view.check_mut("put_all")?;
        for (key, value) in entries {
            self.store(key, value);
        }
        Ok(())
    }

    /// Store only when `key` is absent; returns the existing value or `Null`.
    pub fn put_if_absent(&self, key: Key, value: Value) -> Result<Value, EvalError> {
        self.view.check_mut("put_if_absent")?;
        if value.is_null() {
            return Ok(self.get(&key));
        }
        let existing = {
            let mut data = self.shared.data.write();
            match data.get(&key) {
                Some(existing) => Some(existing.clone()),
                None => {
                    data.insert(key.clone(), value.clone());
                    None
                }
            }
        };
        match existing {
            Some(existing) => Ok(existing),
            None => {
                self.shared.added(Slot::Key(&key), &value);
                Ok(Value::Null)
            }
        }
    }

    /// Replace the value under an existing key; absent keys are left alone.
    pub fn replace(&self, key: Key, value: Value) -> Result<Value, EvalError> {
        self.view.check_mut("replace")?;
        if self.contains_key(&key) {
            Ok(self.store(key, value))
        } else {
            Ok(Value::Null)
        }
    }

    /// Replace only when the current value equals `expected`.
    pub fn replace_if(&self, key: Key, expected: &Value, value: Value) -> Result<bool, EvalError> {
        self.view.check_mut("replace_if")?;
        let matches = self
            .shared
            .data
            .read()
            .get(&key)
            .is_some_and(|current| current == expected);
        if matches {
            self.store(key, value);
        }
        Ok(matches)
    }

    pub fn remove(&self, key: &Key) -> Result<Value, EvalError> {
        self.view.check_mut("remove")?;
        let removed = self.shared.data.write().shift_remove(key);
        Ok(match removed {
            Some(value) => {
                self.shared.removed(Slot::Key(key), &value);
                value
            }
            None => Value::Null,
        })
    }

    /// Remove every entry, reporting a remove for each.
    pub fn clear(&self) -> Result<(), EvalError> {
        self.view.check_mut("clear")?;
        let drained = std::mem::take(&mut *self.shared.data.write());
        for (key, value) in &drained {
            self.shared.removed(Slot::Key(key), value);
        }
        Ok(())
    }

    /// Reorder in place by key. No accounting: membership is unchanged.
    pub fn sort_by_key(&self, ascending: bool) -> Result<(), EvalError> {
        self.view.check_mut("sort_by_key")?;
        let mut data = self.shared.data.write();
        let sorted = sorted_by_key(pairs_of(&data), ascending)?;
        *data = sorted.into_iter().collect();
        Ok(())
    }

    /// Reorder in place by value. No accounting: membership is unchanged.
    pub fn sort_by_value(&self, ascending: bool) -> Result<(), EvalError> {
        self.view.check_mut("sort_by_value")?;
        let mut data = self.shared.data.write();
        let sorted = sort_by_value(pairs_of(&data), ascending, |(_, v)| v)?;
        *data = sorted.into_iter().collect();
        Ok(())
    }

    pub fn reverse(&self) -> Result<(), EvalError> {
        self.view.check_mut("reverse")?;
        self.shared.data.write().reverse();
        Ok(())
    }

    /// Invert in place: every old entry is reported removed, every inverted
    /// entry reported added. Fails without mutating when a value is not
    /// hashable.
    pub fn invert(&self) -> Result<(), EvalError> {
        self.view.check_mut("invert")?;
        let inverted = self.inverted()?;
        self.clear()?;
        for (key, value) in inverted {
            self.store(key, value);
        }
        Ok(())
    }

    /// Unchecked store with accounting; callers check the view.
    fn store(&self, key: Key, value: Value) -> Value {
        let previous = {
            let mut data = self.shared.data.write();
            if value.is_null() {
                data.shift_remove(&key)
            } else {
                data.insert(key.clone(), value.clone())
            }
        };
        if let Some(previous) = &previous {
            self.shared.removed(Slot::Key(&key), previous);
        }
        if !value.is_null() {
            self.shared.added(Slot::Key(&key), &value);
        }
        previous.unwrap_or_default()
    }

    fn inverted(&self) -> Result<Vec<(Key, Value)>, EvalError> {
        let pairs = self.pairs();
        let mut groups: IndexMap<Key, Vec<Value>, FxBuildHasher> = IndexMap::default();
        for (key, value) in &pairs {
            groups
                .entry(Key::try_from(value)?)
                .or_default()
                .push(key.to_value());
        }
        Ok(groups
            .into_iter()
            .map(|(value, mut keys)| {
                let inverted = if keys.len() == 1 {
                    keys.pop().unwrap_or_default()
                } else {
                    Value::List(ExecList::from_values(
                        Arc::clone(&self.shared.authority),
                        keys,
                    ))
                };
                (value, inverted)
            })
            .collect())
    }
}

impl std::fmt::Debug for ExecMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecMap")
            .field("id", &self.id())
            .field("read_only", &self.is_read_only())
            .field("entries", &self.pairs())
            .finish()
    }
}

fn pairs_of(data: &Entries) -> Vec<(Key, Value)> {
    data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn sorted_by_key(pairs: Vec<(Key, Value)>, ascending: bool) -> Result<Vec<(Key, Value)>, EvalError> {
    let keyed: Vec<(Value, (Key, Value))> = pairs
        .into_iter()
        .map(|pair| (pair.0.to_value(), pair))
        .collect();
    let sorted = sort_by_value(keyed, ascending, |(k, _)| k)?;
    Ok(sorted.into_iter().map(|(_, pair)| pair).collect())
}

/// Live view of one map entry.
///
/// Reads go to the map at call time; `set_value` writes through the view the
/// entry came from, so entries of a read-only map reject it.
#[derive(Clone, Debug)]
pub struct MapEntry {
    map: ExecMap,
    key: Key,
}

impl MapEntry {
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Current value, `Null` if the key has since been removed.
    pub fn value(&self) -> Value {
        self.map.get(&self.key)
    }

    pub fn set_value(&self, value: Value) -> Result<Value, EvalError> {
        self.map.put(self.key.clone(), value)
    }
}

#[cfg(test)]
mod tests;
