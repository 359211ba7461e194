//! Warden Value - runtime values, accounting and accounted collections.
//!
//! Every list, map and set a script creates is bound to an
//! [`AccountingAuthority`] and reports a cost delta for each structural
//! change, so a host can bound the memory a script holds without walking its
//! data.
//!
//! Errors raised anywhere in the runtime are [`EvalError`]s built through the
//! factory functions in [`errors`].

mod accounting;
mod collections;
pub mod errors;
mod key;
mod value;

pub use accounting::{
    Accounting, AccountingAuthority, ContainerId, IdSequence, NoAccounting, QuotaAccounting,
    SizeAccounting, Slot,
};
pub use collections::{normalize_index, ExecList, ExecMap, ExecSet, MapEntry};
pub use errors::{EvalError, EvalErrorKind, EvalResult};
pub use key::Key;
pub use value::{ClassHandle, Value};

#[cfg(test)]
mod test_helpers;
