//! Host-provided native types scripts can reach through type references.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use warden_ir::Name;
use warden_sandbox::ClassPath;
use warden_value::{ClassHandle, EvalResult, Value};

use crate::ExecutionContext;

/// A static method on a native type.
pub type NativeFn = Arc<dyn Fn(&[Value], &ExecutionContext) -> EvalResult + Send + Sync>;

/// One registered native type and its static methods.
pub struct NativeClass {
    handle: ClassHandle,
    methods: FxHashMap<Name, NativeFn>,
}

impl NativeClass {
    pub fn handle(&self) -> &ClassHandle {
        &self.handle
    }

    pub fn method(&self, name: Name) -> Option<&NativeFn> {
        self.methods.get(&name)
    }
}

/// Native types by fully-qualified path.
///
/// Registration does not grant access: type references still pass the
/// sandbox before the registry is consulted.
#[derive(Default)]
pub struct NativeRegistry {
    classes: FxHashMap<ClassPath, NativeClass>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, path: ClassPath, display: &str, method: Name, f: NativeFn) {
        self.classes
            .entry(path.clone())
            .or_insert_with(|| NativeClass {
                handle: ClassHandle {
                    path,
                    name: Arc::from(display),
                },
                methods: FxHashMap::default(),
            })
            .methods
            .insert(method, f);
    }

    pub fn class(&self, path: &ClassPath) -> Option<&NativeClass> {
        self.classes.get(path)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.classes.values().map(|class| &class.handle.name))
            .finish()
    }
}
