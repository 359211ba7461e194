//! Sandbox faults.

/// Why the sandbox refused a name.
///
/// `ClassNotAllowed` is deliberately distinct from "no such class": callers
/// report a denial even when the type would not have existed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error("class not allowed: {name}")]
    ClassNotAllowed { name: String },

    #[error("member `{member}` of `{owner}` is not allowed")]
    MemberNotAllowed { owner: String, member: String },

    #[error("malformed class or package name: `{name}`")]
    InvalidName { name: String },
}
