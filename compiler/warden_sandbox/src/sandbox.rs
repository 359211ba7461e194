//! Rule sets and the allow/deny decision.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use warden_ir::{Name, SharedInterner};

use crate::{ClassPath, SandboxError};

/// Simple type names no script may reference, whatever their package.
pub const FORBIDDEN_CLASS_LITERALS: &[&str] = &[
    "System",
    "Runtime",
    "Class",
    "ClassLoader",
    "Thread",
    "Compiler",
    "ThreadLocal",
    "SecurityManager",
    "Array",
    "StringBuffer",
    "StringBuilder",
    "Module",
];

/// `(owner, member)` pairs no script may invoke.
///
/// `Object` means every receiver; `Class` means a native type handle.
pub const FORBIDDEN_MEMBERS: &[(&str, &str)] = &[
    ("Object", "getClass"),
    ("Class", "getClassLoader"),
    ("Class", "getModule"),
];

#[derive(Default)]
struct Rules {
    allowed_classes: FxHashSet<ClassPath>,
    allowed_packages: FxHashSet<ClassPath>,
    forbidden_packages: FxHashSet<ClassPath>,
}

/// Capability gate for native types and members.
///
/// Allowed classes and packages may grow while programs run (through
/// `&self`); forbidden packages are fixed when the sandbox is built.
pub struct Sandbox {
    interner: SharedInterner,
    rules: RwLock<Rules>,
    forbidden_literals: FxHashSet<Name>,
    /// Member name -> applies to any receiver (`true`) or only to type handles.
    forbidden_members: FxHashMap<Name, bool>,
}

impl Sandbox {
    /// A sandbox that allows nothing beyond the runtime's own containers.
    pub fn deny_all(interner: SharedInterner) -> Self {
        Sandbox::new(interner, Rules::default())
    }

    pub fn builder(interner: SharedInterner) -> SandboxBuilder {
        SandboxBuilder::new(interner)
    }

    fn new(interner: SharedInterner, rules: Rules) -> Self {
        let forbidden_literals = FORBIDDEN_CLASS_LITERALS
            .iter()
            .map(|lit| interner.intern(lit))
            .collect();
        let forbidden_members = FORBIDDEN_MEMBERS
            .iter()
            .map(|(owner, member)| (interner.intern(member), *owner == "Object"))
            .collect();
        Sandbox {
            interner,
            rules: RwLock::new(rules),
            forbidden_literals,
            forbidden_members,
        }
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// Whether a script may reference a type literal by this simple name.
    pub fn is_literal_allowed(&self, literal: &str) -> bool {
        !FORBIDDEN_CLASS_LITERALS.contains(&literal)
    }

    /// Decide for a dotted name supplied by a script. Never interns.
    pub fn is_class_name_allowed(&self, name: &str) -> bool {
        match ClassPath::query(name, &self.interner) {
            Some(segments) => self.decide(&segments),
            None => false,
        }
    }

    pub fn is_class_allowed(&self, class: &ClassPath) -> bool {
        let segments: SmallVec<[Option<Name>; 6]> =
            class.segments().iter().copied().map(Some).collect();
        self.decide(&segments)
    }

    /// Check a script-supplied type name.
    ///
    /// `Ok(None)` means the name is allowed but nothing with that name was
    /// ever registered, so it cannot resolve to a native type.
    pub fn check_class(&self, name: &str) -> Result<Option<ClassPath>, SandboxError> {
        let Some(segments) = ClassPath::query(name, &self.interner) else {
            return Err(SandboxError::InvalidName {
                name: name.to_owned(),
            });
        };
        if !self.decide(&segments) {
            tracing::debug!(class = name, "sandbox denied class");
            return Err(SandboxError::ClassNotAllowed {
                name: name.to_owned(),
            });
        }
        let known: Option<SmallVec<[Name; 6]>> = segments.into_iter().collect();
        Ok(known.map(|segments| ClassPath::from_segments(&segments)))
    }

    /// Check a member invocation.
    ///
    /// `owner` is the type handle when the receiver is a native type, `None`
    /// for ordinary values.
    pub fn check_member(
        &self,
        owner: Option<&ClassPath>,
        member: &str,
    ) -> Result<(), SandboxError> {
        if self.is_member_allowed(owner, member) {
            return Ok(());
        }
        let owner = owner.map_or_else(|| "Object".to_owned(), |c| c.display(&*self.interner));
        tracing::debug!(owner = %owner, member, "sandbox denied member");
        Err(SandboxError::MemberNotAllowed {
            owner,
            member: member.to_owned(),
        })
    }

    pub fn is_member_allowed(&self, owner: Option<&ClassPath>, member: &str) -> bool {
        if let Some(name) = self.interner.get(member) {
            match self.forbidden_members.get(&name) {
                Some(true) => return false,
                Some(false) if owner.is_some() => return false,
                _ => {}
            }
        }
        // Every member of a forbidden literal type stays closed.
        !owner
            .and_then(ClassPath::simple_name)
            .is_some_and(|simple| self.forbidden_literals.contains(&simple))
    }

    /// Allow one more fully-qualified type.
    pub fn add_allowed_class(&self, name: &str) -> Result<(), SandboxError> {
        let path = parse(name, &self.interner)?;
        tracing::debug!(class = name, "sandbox allowed class");
        self.rules.write().allowed_classes.insert(path);
        Ok(())
    }

    /// Allow one more package prefix.
    pub fn add_allowed_package(&self, name: &str) -> Result<(), SandboxError> {
        let path = parse(name, &self.interner)?;
        tracing::debug!(package = name, "sandbox allowed package");
        self.rules.write().allowed_packages.insert(path);
        Ok(())
    }

    fn decide(&self, segments: &[Option<Name>]) -> bool {
        let Some(last) = segments.last() else {
            return false;
        };
        if last.is_some_and(|simple| self.forbidden_literals.contains(&simple)) {
            return false;
        }

        let known: SmallVec<[Name; 6]> = segments.iter().map_while(|s| *s).collect();
        let rules = self.rules.read();

        if known.len() == segments.len() && rules.allowed_classes.contains(known.as_slice()) {
            return true;
        }
        if (1..=known.len()).any(|n| rules.forbidden_packages.contains(&known[..n])) {
            return false;
        }
        (1..=known.len()).any(|n| rules.allowed_packages.contains(&known[..n]))
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rules = self.rules.read();
        f.debug_struct("Sandbox")
            .field("allowed_classes", &rules.allowed_classes.len())
            .field("allowed_packages", &rules.allowed_packages.len())
            .field("forbidden_packages", &rules.forbidden_packages.len())
            .finish_non_exhaustive()
    }
}

fn parse(name: &str, interner: &SharedInterner) -> Result<ClassPath, SandboxError> {
    ClassPath::intern(name, interner).ok_or_else(|| SandboxError::InvalidName {
        name: name.to_owned(),
    })
}

/// Builder for [`Sandbox`].
#[must_use]
pub struct SandboxBuilder {
    interner: SharedInterner,
    rules: Rules,
    invalid: Option<String>,
}

impl SandboxBuilder {
    pub fn new(interner: SharedInterner) -> Self {
        SandboxBuilder {
            interner,
            rules: Rules::default(),
            invalid: None,
        }
    }

    pub fn allow_class(mut self, name: &str) -> Self {
        if let Some(path) = self.parse(name) {
            self.rules.allowed_classes.insert(path);
        }
        self
    }

    pub fn allow_package(mut self, name: &str) -> Self {
        if let Some(path) = self.parse(name) {
            self.rules.allowed_packages.insert(path);
        }
        self
    }

    pub fn forbid_package(mut self, name: &str) -> Self {
        if let Some(path) = self.parse(name) {
            self.rules.forbidden_packages.insert(path);
        }
        self
    }

    /// Fails with the first malformed name given to any setter.
    pub fn build(self) -> Result<Sandbox, SandboxError> {
        if let Some(name) = self.invalid {
            return Err(SandboxError::InvalidName { name });
        }
        Ok(Sandbox::new(self.interner, self.rules))
    }

    fn parse(&mut self, name: &str) -> Option<ClassPath> {
        let path = ClassPath::intern(name, &self.interner);
        if path.is_none() && self.invalid.is_none() {
            self.invalid = Some(name.to_owned());
        }
        path
    }
}

#[cfg(test)]
mod tests;
