//! Warden IR - executable node representation for the Warden runtime.
//!
//! This crate contains the data structures a front end compiles source into:
//! - `Name` interned identifiers and the sharded `StringInterner`
//! - `ValueType` tags used for egress/ingress typing
//! - `Literal` constants
//! - `NodeArena` holding the executable node chain
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: identifiers and string literals become `Name(u32)`
//! - **Flatten Everything**: nodes refer to each other through `NodeId` indices,
//!   statement sequences are linked through per-node `next` indices
//!
//! Floats inside literals are stored as `u64` bits so every IR type can be
//! `Eq + Hash`.

mod interner;
mod literal;
mod name;
mod node;
mod value_type;

pub use interner::{InternError, SharedInterner, StringInterner, StringLookup};
pub use literal::Literal;
pub use name::Name;
pub use node::{BinaryOp, ChainIter, NodeArena, NodeId, NodeKind, NodeRange};
pub use value_type::ValueType;
