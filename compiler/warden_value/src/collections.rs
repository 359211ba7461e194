//! Resource-accounted containers.
//!
//! [`ExecList`], [`ExecMap`] and [`ExecSet`] are cheap-to-clone handles to a
//! shared container. A handle is either the owner view (mutable) or a
//! read-only view produced by `to_unmodifiable`; read-only views share the
//! container by reference, so reads through them are live, and every
//! mutation through them fails with `Unsupported`.

mod list;
mod map;
mod order;
mod set;
mod shared;

pub use list::ExecList;
pub use map::{ExecMap, MapEntry};
pub use order::normalize_index;
pub use set::ExecSet;
