//! Index normalization and the value ordering used by sort operations.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::errors::type_mismatch;
use crate::{EvalError, Value};

/// Normalize a possibly negative index against `len`:
/// `i < -len → 0`, `i < 0 → i + len`, otherwise `min(i, len)`.
pub fn normalize_index(index: i64, len: usize) -> usize {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    if index < -signed_len {
        0
    } else if index < 0 {
        usize::try_from(index + signed_len).unwrap_or(0)
    } else {
        usize::try_from(index).map_or(len, |i| i.min(len))
    }
}

/// Per-element sort key.
///
/// When every element is a number or numeric text the whole sequence sorts
/// numerically; when every element is text it sorts lexicographically; any
/// other mix is a type fault.
pub(super) enum SortKey {
    Num(f64),
    Text(Arc<str>),
}

pub(super) fn sort_keys<'a>(
    values: impl Iterator<Item = &'a Value> + Clone,
) -> Result<Vec<SortKey>, EvalError> {
    let numeric: Option<Vec<SortKey>> = values
        .clone()
        .map(|v| v.numeric_text().map(SortKey::Num))
        .collect();
    if let Some(keys) = numeric {
        return Ok(keys);
    }
    values
        .map(|v| match v {
            Value::Str(s) => Ok(SortKey::Text(Arc::clone(s))),
            other => Err(type_mismatch("number or string", other.type_name())),
        })
        .collect()
}

pub(super) fn compare(a: &SortKey, b: &SortKey, ascending: bool) -> Ordering {
    let ord = match (a, b) {
        (SortKey::Num(x), SortKey::Num(y)) => x.total_cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        // sort_keys never mixes the two
        (SortKey::Num(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Num(_)) => Ordering::Greater,
    };
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}

/// Stable sort of `items` by the keys derived from `key_of`.
pub(super) fn sort_by_value<T>(
    items: Vec<T>,
    ascending: bool,
    key_of: impl Fn(&T) -> &Value,
) -> Result<Vec<T>, EvalError> {
    let keys = sort_keys(items.iter().map(&key_of))?;
    let mut pairs: Vec<(SortKey, T)> = keys.into_iter().zip(items).collect();
    pairs.sort_by(|a, b| compare(&a.0, &b.0, ascending));
    Ok(pairs.into_iter().map(|(_, item)| item).collect())
}
