#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;
use warden_ir::SharedInterner;

use super::*;

fn sandbox(build: impl FnOnce(SandboxBuilder) -> SandboxBuilder) -> Sandbox {
    build(Sandbox::builder(SharedInterner::new())).build().unwrap()
}

#[test]
fn test_default_denies() {
    let sb = Sandbox::deny_all(SharedInterner::new());
    assert!(!sb.is_class_name_allowed("java.util.ArrayList"));
}

#[test]
fn test_forbidden_package_beats_allowed_package() {
    let sb = sandbox(|b| b.allow_package("p").forbid_package("p.q"));
    assert!(!sb.is_class_name_allowed("p.q.R"));
    assert!(sb.is_class_name_allowed("p.z.R"));
}

#[test]
fn test_explicit_class_beats_forbidden_package() {
    let sb = sandbox(|b| b.forbid_package("p.q").allow_class("p.q.Safe"));
    assert!(sb.is_class_name_allowed("p.q.Safe"));
    assert!(!sb.is_class_name_allowed("p.q.Other"));
}

#[test]
fn test_package_match_is_per_segment() {
    let sb = sandbox(|b| b.allow_package("com.acme"));
    assert!(sb.is_class_name_allowed("com.acme.Tool"));
    assert!(sb.is_class_name_allowed("com.acme.sub.Tool"));
    assert!(!sb.is_class_name_allowed("com.acmeevil.Tool"));
}

#[test]
fn test_forbidden_literals_cannot_be_reenabled() {
    let sb = sandbox(|b| b.allow_package("java.lang").allow_class("java.lang.System"));
    assert!(!sb.is_class_name_allowed("java.lang.System"));
    assert!(!sb.is_class_name_allowed("java.lang.Runtime"));
    // Matched by simple name, whatever the package.
    sb.add_allowed_class("my.pkg.Thread").unwrap();
    assert!(!sb.is_class_name_allowed("my.pkg.Thread"));
    assert!(sb.is_class_name_allowed("java.lang.Math"));
}

#[test]
fn test_is_literal_allowed() {
    let sb = Sandbox::deny_all(SharedInterner::new());
    for lit in FORBIDDEN_CLASS_LITERALS {
        assert!(!sb.is_literal_allowed(lit), "{lit}");
    }
    assert!(sb.is_literal_allowed("Math"));
}

#[test]
fn test_reflective_members_always_denied() {
    let interner = SharedInterner::new();
    let sb = Sandbox::builder(interner.clone())
        .allow_package("java")
        .build()
        .unwrap();
    let math = ClassPath::intern("java.lang.Math", &interner).unwrap();

    assert!(!sb.is_member_allowed(None, "getClass"));
    assert!(!sb.is_member_allowed(Some(&math), "getClass"));
    assert!(!sb.is_member_allowed(Some(&math), "getClassLoader"));
    assert!(!sb.is_member_allowed(Some(&math), "getModule"));
    assert!(sb.is_member_allowed(None, "getModule"));
    assert!(sb.is_member_allowed(Some(&math), "abs"));
}

#[test]
fn test_members_of_forbidden_literal_types_denied() {
    let interner = SharedInterner::new();
    let sb = Sandbox::deny_all(interner.clone());
    let runtime = ClassPath::intern("java.lang.Runtime", &interner).unwrap();
    assert_eq!(
        sb.check_member(Some(&runtime), "exec"),
        Err(SandboxError::MemberNotAllowed {
            owner: "java.lang.Runtime".to_owned(),
            member: "exec".to_owned(),
        })
    );
}

#[test]
fn test_check_class_reports_denial_and_unknown() {
    let interner = SharedInterner::new();
    let sb = Sandbox::builder(interner.clone())
        .allow_package("com.acme")
        .build()
        .unwrap();

    assert_eq!(
        sb.check_class("org.other.Tool"),
        Err(SandboxError::ClassNotAllowed {
            name: "org.other.Tool".to_owned()
        })
    );
    let before = interner.len();
    assert_eq!(sb.check_class("com.acme.NeverRegisteredZq"), Ok(None));
    assert_eq!(interner.len(), before);

    let tool = ClassPath::intern("com.acme.Tool", &interner).unwrap();
    assert_eq!(sb.check_class("com.acme.Tool"), Ok(Some(tool)));
}

#[test]
fn test_malformed_names() {
    let sb = Sandbox::deny_all(SharedInterner::new());
    assert!(!sb.is_class_name_allowed("a..b"));
    assert!(matches!(
        sb.check_class(".x"),
        Err(SandboxError::InvalidName { .. })
    ));
    assert!(sb.add_allowed_package("").is_err());

    let built = Sandbox::builder(SharedInterner::new())
        .allow_package("ok")
        .forbid_package("bad.")
        .build();
    assert_eq!(
        built.err(),
        Some(SandboxError::InvalidName {
            name: "bad.".to_owned()
        })
    );
}

#[test]
fn test_runtime_extension_visible_through_shared_ref() {
    let sb = std::sync::Arc::new(Sandbox::deny_all(SharedInterner::new()));
    assert!(!sb.is_class_name_allowed("a.b.C"));
    sb.add_allowed_package("a.b").unwrap();
    assert!(sb.is_class_name_allowed("a.b.C"));
}
