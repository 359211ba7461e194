//! Warden Eval - sandboxed evaluation runtime for compiled Warden programs.
//!
//! A front end assembles nodes into a [`CompiledProgram`] with a
//! [`ProgramBuilder`]; hosts evaluate it against a scope chain that ends in
//! their own data.
//!
//! # Architecture
//!
//! - `ScopeFrame`: variable resolution chain (`MapScope`, `IndexedScope`,
//!   `ResetScope`, `HostScope`)
//! - `ExecutionContext`: accounting authority and liveness limits of one
//!   evaluation
//! - `ParserConfiguration`: imports, sandbox and native types shared by every
//!   program compiled against it
//! - `CompiledProgram`: node chain, type metadata and the one-shot
//!   interpreted/accelerated strategy switch
//! - `Accelerator`: pluggable accelerated strategies
//!
//! # Re-exports
//!
//! Value types come from `warden_value`, sandbox types from
//! `warden_sandbox`:
//! - `Value`, `Key`, `ExecList`, `ExecMap`, `ExecSet`
//! - `EvalError`, `EvalErrorKind`, `EvalResult`
//! - `Sandbox`, `SandboxBuilder`, `SandboxError`

mod accelerator;
mod config;
mod context;
mod interpreter;
mod natives;
mod program;
mod scope;
mod stack;

#[cfg(test)]
mod test_helpers;

pub use accelerator::{
    AcceleratedProgram, Accelerator, AcceleratorSession, InterpretOnly, LiteralAccelerator,
};
pub use config::{ConfigError, ParserConfiguration, ParserConfigurationBuilder};
pub use context::{CancellationToken, ExecutionContext, ExecutionLimits};
pub use natives::{NativeClass, NativeFn, NativeRegistry};
pub use program::{CompileError, CompiledProgram, Flow, ProgramBuilder, ProgramFlags};
pub use scope::{
    DataContext, HostScope, IndexedScope, MapScope, ResetScope, ScopeFrame, ScopeRef, Variable,
    VariableCell,
};
pub use stack::ensure_sufficient_stack;

pub use warden_sandbox::{ClassPath, Sandbox, SandboxBuilder, SandboxError};
pub use warden_value::{
    Accounting, AccountingAuthority, EvalError, EvalErrorKind, EvalResult, ExecList, ExecMap,
    ExecSet, Key, NoAccounting, QuotaAccounting, SizeAccounting, Value,
};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=warden_eval=debug` or `RUST_LOG=warden_value=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
