//! Immutable configuration shared by every program compiled against it.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use warden_ir::{Name, SharedInterner};
use warden_sandbox::{ClassPath, Sandbox, SandboxError};
use warden_value::{EvalResult, Value};

use crate::natives::{NativeFn, NativeRegistry};
use crate::ExecutionContext;

/// Configuration faults raised while building a [`ParserConfiguration`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("import `{short}` is bound to both `{first}` and `{second}`")]
    ConflictingImport {
        short: String,
        first: String,
        second: String,
    },

    #[error("the sandbox was built on a different interner than the configuration")]
    ForeignInterner,
}

/// Imports, sandbox, native types and typing mode.
pub struct ParserConfiguration {
    interner: SharedInterner,
    sandbox: Arc<Sandbox>,
    imports: FxHashMap<Name, ClassPath>,
    natives: NativeRegistry,
    strong_typing: bool,
}

impl ParserConfiguration {
    pub fn builder(interner: SharedInterner) -> ParserConfigurationBuilder {
        ParserConfigurationBuilder::new(interner)
    }

    /// Deny-all sandbox, no imports, no natives, dynamic typing.
    pub fn new(interner: SharedInterner) -> Self {
        ParserConfiguration {
            sandbox: Arc::new(Sandbox::deny_all(interner.clone())),
            interner,
            imports: FxHashMap::default(),
            natives: NativeRegistry::new(),
            strong_typing: false,
        }
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn sandbox(&self) -> &Arc<Sandbox> {
        &self.sandbox
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn has_imports(&self) -> bool {
        !self.imports.is_empty()
    }

    /// The type a short name was imported as.
    pub fn import(&self, short: Name) -> Option<&ClassPath> {
        self.imports.get(&short)
    }

    pub fn strong_typing(&self) -> bool {
        self.strong_typing
    }
}

impl std::fmt::Debug for ParserConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserConfiguration")
            .field("sandbox", &self.sandbox)
            .field("imports", &self.imports.len())
            .field("natives", &self.natives)
            .field("strong_typing", &self.strong_typing)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ParserConfiguration`].
#[must_use]
pub struct ParserConfigurationBuilder {
    interner: SharedInterner,
    sandbox: Option<Arc<Sandbox>>,
    imports: Vec<(String, String)>,
    natives: Vec<(String, String, NativeFn)>,
    strong_typing: bool,
}

impl ParserConfigurationBuilder {
    pub fn new(interner: SharedInterner) -> Self {
        ParserConfigurationBuilder {
            interner,
            sandbox: None,
            imports: Vec::new(),
            natives: Vec::new(),
            strong_typing: false,
        }
    }

    /// The sandbox must be built on this builder's interner; `build` rejects
    /// any other.
    pub fn sandbox(mut self, sandbox: Arc<Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Make `class` reachable by its last segment.
    pub fn import(mut self, class: &str) -> Self {
        let short = class.rsplit('.').next().unwrap_or(class);
        self.imports.push((short.to_owned(), class.to_owned()));
        self
    }

    /// Make `class` reachable as `short`.
    pub fn import_as(mut self, short: &str, class: &str) -> Self {
        self.imports.push((short.to_owned(), class.to_owned()));
        self
    }

    /// Register a static method on a native type.
    pub fn native(
        mut self,
        class: &str,
        method: &str,
        f: impl Fn(&[Value], &ExecutionContext) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        let f: NativeFn = Arc::new(f);
        self.natives.push((class.to_owned(), method.to_owned(), f));
        self
    }

    pub fn strong_typing(mut self, enabled: bool) -> Self {
        self.strong_typing = enabled;
        self
    }

    pub fn build(self) -> Result<ParserConfiguration, ConfigError> {
        let interner = self.interner;
        // Sandbox rules are compared by `Name`, which only means something
        // within one interner.
        if let Some(sandbox) = &self.sandbox {
            if !sandbox.interner().ptr_eq(&interner) {
                return Err(ConfigError::ForeignInterner);
            }
        }

        let mut imports: FxHashMap<Name, ClassPath> = FxHashMap::default();
        for (short, class) in &self.imports {
            let path = parse(class, &interner)?;
            let short_name = interner.intern(short);
            if let Some(existing) = imports.get(&short_name) {
                if *existing != path {
                    return Err(ConfigError::ConflictingImport {
                        short: short.clone(),
                        first: existing.display(&*interner),
                        second: class.clone(),
                    });
                }
            }
            imports.insert(short_name, path);
        }

        let mut natives = NativeRegistry::new();
        for (class, method, f) in self.natives {
            let path = parse(&class, &interner)?;
            natives.define(path, &class, interner.intern(&method), f);
        }

        let sandbox = self
            .sandbox
            .unwrap_or_else(|| Arc::new(Sandbox::deny_all(interner.clone())));

        tracing::debug!(
            imports = imports.len(),
            natives = natives.len(),
            strong_typing = self.strong_typing,
            "parser configuration built"
        );
        Ok(ParserConfiguration {
            interner,
            sandbox,
            imports,
            natives,
            strong_typing: self.strong_typing,
        })
    }
}

fn parse(name: &str, interner: &SharedInterner) -> Result<ClassPath, ConfigError> {
    ClassPath::intern(name, interner).ok_or_else(|| {
        ConfigError::Sandbox(SandboxError::InvalidName {
            name: name.to_owned(),
        })
    })
}
