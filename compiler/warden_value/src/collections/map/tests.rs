#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::errors::EvalErrorKind;
use crate::test_helpers::{accounting, Ledger};

fn map_of(ledger: &Arc<Ledger>, entries: &[(&str, Value)]) -> ExecMap {
    ExecMap::from_entries(
        accounting(ledger),
        entries.iter().map(|(k, v)| (Key::str(k), v.clone())),
    )
}

fn assert_balanced(ledger: &Ledger, map: &ExecMap) {
    assert_eq!(ledger.balance(map.id()), map.memory_size());
}

#[test]
fn test_invert_groups_shared_values_in_key_order() {
    let ledger = Ledger::shared();
    let map = map_of(
        &ledger,
        &[
            ("a", Value::Int(1)),
            ("b", Value::Int(1)),
            ("c", Value::Int(2)),
        ],
    );
    let inverted = map.to_inverted().unwrap();

    let Value::List(grouped) = inverted.get(&Key::Int(1)) else {
        panic!("shared value should map to a list");
    };
    assert_eq!(grouped.values(), vec![Value::str("a"), Value::str("b")]);
    assert_eq!(ledger.balance(grouped.id()), grouped.memory_size());
    assert_eq!(inverted.get(&Key::Int(2)), Value::str("c"));
    assert_eq!(inverted.len(), 2);
    assert_balanced(&ledger, &inverted);
}

#[test]
fn test_invert_in_place_accounts_and_rejects_unhashable() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("x", Value::str("y"))]);
    map.invert().unwrap();
    assert_eq!(map.pairs(), vec![(Key::str("y"), Value::str("x"))]);
    assert_balanced(&ledger, &map);

    let nested = map_of(
        &ledger,
        &[("k", Value::List(ExecList::new(accounting(&ledger))))],
    );
    let err = nested.invert().unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
    assert_eq!(nested.len(), 1);
}

#[test]
fn test_put_null_removes_key() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("a", Value::Int(1)), ("b", Value::Int(2))]);
    assert_eq!(map.put(Key::str("a"), Value::Null).unwrap(), Value::Int(1));
    assert!(!map.contains_key(&Key::str("a")));
    assert_eq!(map.len(), 1);
    assert_balanced(&ledger, &map);
}

#[test]
fn test_put_existing_keeps_position() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("a", Value::Int(1)), ("b", Value::Int(2))]);
    map.put(Key::str("a"), Value::Int(5)).unwrap();
    assert_eq!(
        map.pairs(),
        vec![(Key::str("a"), Value::Int(5)), (Key::str("b"), Value::Int(2))]
    );
    assert_balanced(&ledger, &map);
}

#[test]
fn test_replace_variants() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("a", Value::Int(1))]);
    assert_eq!(map.replace(Key::str("z"), Value::Int(3)).unwrap(), Value::Null);
    assert!(!map.contains_key(&Key::str("z")));
    assert!(!map.replace_if(Key::str("a"), &Value::Int(2), Value::Int(3)).unwrap());
    assert!(map.replace_if(Key::str("a"), &Value::Int(1), Value::Int(3)).unwrap());
    assert_eq!(map.get(&Key::str("a")), Value::Int(3));
    assert_eq!(map.put_if_absent(Key::str("a"), Value::Int(9)).unwrap(), Value::Int(3));
    assert_eq!(map.put_if_absent(Key::str("b"), Value::Int(9)).unwrap(), Value::Null);
    assert_balanced(&ledger, &map);
}

#[test]
fn test_clear_reports_every_entry() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("a", Value::Int(1)), ("b", Value::str("xy"))]);
    map.clear().unwrap();
    assert_eq!(map.memory_size(), 0);
    assert_balanced(&ledger, &map);
}

#[test]
fn test_sort_by_value_and_key() {
    let ledger = Ledger::shared();
    let map = map_of(
        &ledger,
        &[("b", Value::Int(2)), ("c", Value::Int(3)), ("a", Value::Int(1))],
    );
    let by_value = map.to_sorted_by_value(false).unwrap();
    let keys: Vec<Key> = by_value.pairs().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![Key::str("c"), Key::str("b"), Key::str("a")]);

    let before = map.memory_size();
    map.sort_by_key(true).unwrap();
    assert_eq!(
        map.keys().values(),
        vec![Value::str("a"), Value::str("b"), Value::str("c")]
    );
    assert_eq!(map.memory_size(), before);
}

#[test]
fn test_slice_reverse_and_duplicate() {
    let ledger = Ledger::shared();
    let map = map_of(
        &ledger,
        &[("a", Value::Int(1)), ("b", Value::Int(2)), ("c", Value::Int(3))],
    );
    let tail = map.slice(-2, 3);
    assert_eq!(tail.keys().values(), vec![Value::str("b"), Value::str("c")]);

    let copy = map.duplicate();
    copy.reverse().unwrap();
    assert_eq!(copy.values().values(), vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
    assert_eq!(map.values().values(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert!(!copy.ptr_eq(&map));
}

#[test]
fn test_unmodifiable_entry_set_value_fails_and_reads_live() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("a", Value::Int(1))]);
    let view = map.to_unmodifiable();
    let entry = view.entries().remove(0);

    let err = entry.set_value(Value::Int(2)).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Unsupported { .. }));
    assert!(view.put(Key::str("b"), Value::Int(1)).is_err());

    map.put(Key::str("a"), Value::Int(7)).unwrap();
    assert_eq!(entry.value(), Value::Int(7));
    assert_eq!(view.memory_size(), map.memory_size());
}

#[test]
fn test_owner_entry_writes_through() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("a", Value::Int(1))]);
    let entry = map.entries().remove(0);
    assert_eq!(entry.set_value(Value::Int(4)).unwrap(), Value::Int(1));
    assert_eq!(map.get(&Key::str("a")), Value::Int(4));
    assert_balanced(&ledger, &map);
}

#[test]
fn test_insert_keeps_key_for_null() {
    let ledger = Ledger::shared();
    let map = map_of(&ledger, &[("x", Value::Int(1))]);

    assert_eq!(map.insert(Key::str("x"), Value::Null).unwrap(), Value::Int(1));
    assert!(map.contains_key(&Key::str("x")));
    assert_eq!(map.get(&Key::str("x")), Value::Null);
    assert_balanced(&ledger, &map);

    map.put(Key::str("x"), Value::Null).unwrap();
    assert!(!map.contains_key(&Key::str("x")));
    assert_balanced(&ledger, &map);
}

#[test]
fn test_insert_rejected_on_read_only_view() {
    let ledger = Ledger::shared();
    let view = map_of(&ledger, &[]).to_unmodifiable();
    let err = view.insert(Key::str("x"), Value::Int(1)).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Unsupported { .. }));
}

#[derive(Clone, Debug)]
enum Op {
    Put(u8, Option<i64>),
    Insert(u8, Option<i64>),
    PutIfAbsent(u8, i64),
    Replace(u8, i64),
    ReplaceIf(u8, i64, i64),
    Remove(u8),
    Clear,
    Invert,
    SortByKey(bool),
    SortByValue(bool),
}

fn key(k: u8) -> Key {
    Key::str(&format!("k{k}"))
}

fn value(v: Option<i64>) -> Value {
    v.map_or(Value::Null, Value::Int)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..5, prop::option::of(0i64..4)).prop_map(|(k, v)| Op::Put(k, v)),
        (0u8..5, prop::option::of(0i64..4)).prop_map(|(k, v)| Op::Insert(k, v)),
        (0u8..5, 0i64..4).prop_map(|(k, v)| Op::PutIfAbsent(k, v)),
        (0u8..5, 0i64..4).prop_map(|(k, v)| Op::Replace(k, v)),
        (0u8..5, 0i64..4, 0i64..4).prop_map(|(k, old, new)| Op::ReplaceIf(k, old, new)),
        (0u8..5).prop_map(Op::Remove),
        Just(Op::Clear),
        Just(Op::Invert),
        any::<bool>().prop_map(Op::SortByKey),
        any::<bool>().prop_map(Op::SortByValue),
    ]
}

proptest! {
    #[test]
    fn memory_size_matches_reported_deltas(ops in prop::collection::vec(op(), 0..40)) {
        let ledger = Ledger::shared();
        let map = map_of(&ledger, &[("k0", Value::Int(1)), ("k1", Value::Int(2))]);
        for op in ops {
            // Inverting or sorting grouped (list) values faults; the identity
            // must hold regardless.
            let _ = match op {
                Op::Put(k, v) => map.put(key(k), value(v)).map(drop),
                Op::Insert(k, v) => map.insert(key(k), value(v)).map(drop),
                Op::PutIfAbsent(k, v) => map.put_if_absent(key(k), Value::Int(v)).map(drop),
                Op::Replace(k, v) => map.replace(key(k), Value::Int(v)).map(drop),
                Op::ReplaceIf(k, old, new) => {
                    map.replace_if(key(k), &Value::Int(old), Value::Int(new)).map(drop)
                }
                Op::Remove(k) => map.remove(&key(k)).map(drop),
                Op::Clear => map.clear(),
                Op::Invert => map.invert(),
                Op::SortByKey(ascending) => map.sort_by_key(ascending),
                Op::SortByValue(ascending) => map.sort_by_value(ascending),
            };
            prop_assert_eq!(ledger.balance(map.id()), map.memory_size());
        }
        map.clear().unwrap();
        prop_assert_eq!(map.memory_size(), 0);
        prop_assert_eq!(ledger.balance(map.id()), 0);
    }
}
