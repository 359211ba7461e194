//! Warden Sandbox - capability control for native types and members.
//!
//! Scripts reach host capabilities only by naming native types. Every such
//! resolution goes through a [`Sandbox`], which decides from three rule sets
//! (allowed classes, allowed packages, forbidden packages) plus two fixed
//! deny-lists that no host configuration can lift.
//!
//! # Decision order
//!
//! 1. explicit allow by fully-qualified name → allow
//! 2. forbidden package prefix → deny
//! 3. allowed package prefix → allow
//! 4. otherwise → deny
//!
//! The fixed deny-lists (dangerous type literals, reflective members) are
//! checked before the rule sets and win over all of them.
//!
//! Names are compared as sequences of interned segments ([`ClassPath`]), so a
//! package `a.b` matches `a.b.C` but never `a.bc.C`.

mod class_path;
mod error;
mod sandbox;

pub use class_path::ClassPath;
pub use error::SandboxError;
pub use sandbox::{Sandbox, SandboxBuilder, FORBIDDEN_CLASS_LITERALS, FORBIDDEN_MEMBERS};
