#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use warden_ir::{BinaryOp, NodeKind, SharedInterner, ValueType};
use warden_value::{
    Accounting, EvalError, EvalErrorKind, QuotaAccounting, SizeAccounting, Value,
};

use crate::program::Flow;
use crate::scope::{MapScope, ScopeRef};
use crate::test_helpers::{config, Script};
use crate::{CompiledProgram, ExecutionContext, ExecutionLimits, ParserConfiguration, Sandbox};

fn interpret(program: &CompiledProgram) -> (Result<Flow, EvalError>, ScopeRef) {
    let scope = MapScope::root();
    let flow = program.interpret(&ExecutionContext::unaccounted(), &Value::Null, &scope);
    (flow, scope)
}

fn lookup(program: &CompiledProgram, scope: &ScopeRef, name: &str) -> Value {
    let interner = program.configuration().interner();
    scope
        .resolve(interner.intern(name), &**interner)
        .unwrap()
        .get()
}

#[test]
fn test_chain_value_is_last_statement() {
    let mut s = Script::new(config());
    let one = s.int(1);
    let two = s.int(2);
    let program = s.build(&[one, two]);
    assert_eq!(interpret(&program).0.unwrap(), Flow::Normal(Value::Int(2)));
}

#[test]
fn test_and_short_circuits() {
    let mut s = Script::new(config());
    let f = s.boolean(false);
    let ghost = s.var("ghost");
    let and = s.binary(BinaryOp::And, f, ghost);
    let program = s.build(&[and]);
    assert_eq!(interpret(&program).0.unwrap(), Flow::Normal(Value::Bool(false)));
}

#[test]
fn test_or_evaluates_right_when_needed() {
    let mut s = Script::new(config());
    let f = s.boolean(false);
    let ghost = s.var("ghost");
    let or = s.binary(BinaryOp::Or, f, ghost);
    let program = s.build(&[or]);
    let err = interpret(&program).0.unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NameNotFound { .. }));
}

#[test]
fn test_assign_declares_unknown_names() {
    let mut s = Script::new(config());
    let five = s.int(5);
    let assign = s.assign("x", five);
    let program = s.build(&[assign]);
    let (flow, scope) = interpret(&program);
    assert_eq!(flow.unwrap(), Flow::Normal(Value::Int(5)));
    assert_eq!(lookup(&program, &scope, "x"), Value::Int(5));
}

#[test]
fn test_branch_locals_do_not_leak() {
    let mut s = Script::new(config());
    let one = s.int(1);
    let inner = s.declare("inner", one);
    let t = s.boolean(true);
    let when = s.if_then(t, &[inner]);
    let program = s.build(&[when]);
    let (flow, scope) = interpret(&program);
    assert_eq!(flow.unwrap(), Flow::Normal(Value::Int(1)));
    let interner = program.configuration().interner();
    assert!(!scope.is_resolvable(interner.intern("inner")));
}

#[test]
fn test_condition_must_be_bool() {
    let mut s = Script::new(config());
    let one = s.int(1);
    let when = s.if_then(one, &[]);
    let program = s.build(&[when]);
    let err = interpret(&program).0.unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}

#[test]
fn test_do_while_break_yields_null() {
    let mut s = Script::new(config());
    let zero = s.int(0);
    let decl = s.declare("i", zero);
    let inc = s.increment("i", 1);
    let is_five = s.equals("i", 5);
    let brk = s.node(NodeKind::Break);
    let when = s.if_then(is_five, &[brk]);
    let body = s.chain(&[inc, when]);
    let forever = s.boolean(true);
    let lp = s.node(NodeKind::DoWhile {
        body,
        cond: forever,
    });
    let program = s.build(&[decl, lp]);

    let (flow, scope) = interpret(&program);
    assert_eq!(flow.unwrap(), Flow::Normal(Value::Null));
    assert_eq!(lookup(&program, &scope, "i"), Value::Int(5));
}

#[test]
fn test_do_while_runs_body_once_before_condition() {
    let mut s = Script::new(config());
    let zero = s.int(0);
    let decl = s.declare("runs", zero);
    let inc = s.increment("runs", 1);
    let body = s.chain(&[inc]);
    let never = s.boolean(false);
    let lp = s.node(NodeKind::DoWhile { body, cond: never });
    let program = s.build(&[decl, lp]);

    let (_, scope) = interpret(&program);
    assert_eq!(lookup(&program, &scope, "runs"), Value::Int(1));
}

#[test]
fn test_do_while_condition_cannot_see_body_locals() {
    let mut s = Script::new(config());
    let t = s.boolean(true);
    let local = s.declare("local", t);
    let body = s.chain(&[local]);
    let cond = s.var("local");
    let lp = s.node(NodeKind::DoWhile { body, cond });
    let program = s.build(&[lp]);

    let err = interpret(&program).0.unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::NameNotFound {
            name: "local".into()
        }
    );
}

#[test]
fn test_return_inside_loop_leaves_everything() {
    let mut s = Script::new(config());
    let seven = s.int(7);
    let ret = s.node(NodeKind::Return(seven));
    let body = s.chain(&[ret]);
    let t = s.boolean(true);
    let lp = s.node(NodeKind::DoWhile { body, cond: t });
    let after = s.int(99);
    let program = s.build(&[lp, after]);
    assert_eq!(interpret(&program).0.unwrap(), Flow::Return(Value::Int(7)));
}

#[test]
fn test_while_counts_down() {
    let mut s = Script::new(config());
    let three = s.int(3);
    let decl = s.declare("n", three);
    let n = s.var("n");
    let zero = s.int(0);
    let positive = s.binary(BinaryOp::Gt, n, zero);
    let dec = s.increment("n", -1);
    let body = s.chain(&[dec]);
    let lp = s.node(NodeKind::While {
        cond: positive,
        body,
    });
    let program = s.build(&[decl, lp]);

    let (flow, scope) = interpret(&program);
    assert_eq!(flow.unwrap(), Flow::Normal(Value::Null));
    assert_eq!(lookup(&program, &scope, "n"), Value::Int(0));
}

#[test]
fn test_foreach_sums_list() {
    let mut s = Script::new(config());
    let zero = s.int(0);
    let decl = s.declare("sum", zero);
    let items: Vec<_> = (1..=4).map(|i| s.int(i)).collect();
    let list = s.list(&items);
    let sum = s.var("sum");
    let item = s.var("item");
    let add = s.binary(BinaryOp::Add, sum, item);
    let store = s.assign("sum", add);
    let body = s.chain(&[store]);
    let item_name = s.name("item");
    let lp = s.node(NodeKind::ForEach {
        item: item_name,
        iterable: list,
        body,
    });
    let program = s.build(&[decl, lp]);

    let (_, scope) = interpret(&program);
    assert_eq!(lookup(&program, &scope, "sum"), Value::Int(10));
}

#[test]
fn test_loops_poll_liveness() {
    let mut s = Script::new(config());
    let t = s.boolean(true);
    let lp = s.node(NodeKind::While {
        cond: t,
        body: None,
    });
    let program = s.build(&[lp]);
    let ctx = ExecutionContext::unaccounted()
        .with_limits(ExecutionLimits::unbounded().with_max_iterations(50));

    let err = program
        .interpret(&ctx, &Value::Null, &MapScope::root())
        .unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::IterationLimitExceeded { limit: 50 });
    assert_eq!(ctx.iterations(), 51);
}

#[test]
fn test_collection_literals_bind_to_context_authority() {
    let mut s = Script::new(config());
    let k = s.text("k");
    let v = s.int(1);
    let map = s.map(&[k, v]);
    let program = s.build(&[map]);
    let quota = Arc::new(QuotaAccounting::new(SizeAccounting::shared()));
    let ctx = ExecutionContext::new(Arc::clone(&quota) as Accounting);

    let value = program
        .interpret(&ctx, &Value::Null, &MapScope::root())
        .unwrap()
        .into_value();
    let Value::Map(map) = value else {
        panic!("expected a map, got {value:?}");
    };
    assert!(map.memory_size() > 0);
    assert_eq!(quota.total(), map.memory_size());
}

#[test]
fn test_list_methods_dispatch() {
    let mut s = Script::new(config());
    let items: Vec<_> = [3, 1, 2].into_iter().map(|i| s.int(i)).collect();
    let list = s.list(&items);
    let decl = s.declare("xs", list);
    let xs = s.var("xs");
    let sort = s.call(xs, "sort", &[]);
    let xs = s.var("xs");
    let sep = s.text("-");
    let join = s.call(xs, "join", &[sep]);
    let program = s.build(&[decl, sort, join]);

    assert_eq!(
        interpret(&program).0.unwrap(),
        Flow::Normal(Value::str("1-2-3"))
    );
}

#[test]
fn test_unknown_method() {
    let mut s = Script::new(config());
    let one = s.int(1);
    let call = s.call(one, "frobnicate", &[]);
    let program = s.build(&[call]);
    let err = interpret(&program).0.unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NoSuchMethod { .. }));
}

#[test]
fn test_get_class_is_denied_on_any_receiver() {
    let mut s = Script::new(config());
    let text = s.text("x");
    let call = s.call(text, "getClass", &[]);
    let program = s.build(&[call]);
    let err = interpret(&program).0.unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::MemberNotAllowed {
            owner: "Object".into(),
            member: "getClass".into()
        }
    );
}

#[test]
fn test_declared_literal_type_checked_at_runtime() {
    let mut s = Script::new(config());
    let lit = s.typed(warden_ir::Literal::Int(1), ValueType::Str);
    let program = s.build(&[lit]);
    let err = interpret(&program).0.unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::TypeMismatch { .. }));
}

fn natives_config() -> Arc<ParserConfiguration> {
    let interner = SharedInterner::new();
    let sandbox = Sandbox::builder(interner.clone())
        .allow_package("acme.util")
        .forbid_package("acme.util.internal")
        .build()
        .unwrap();
    Arc::new(
        ParserConfiguration::builder(interner)
            .sandbox(Arc::new(sandbox))
            .import("acme.util.Math")
            .native("acme.util.Math", "twice", |args, _| {
                Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))
            })
            .native("acme.util.internal.Secrets", "dump", |_, _| Ok(Value::Null))
            .build()
            .unwrap(),
    )
}

#[test]
fn test_imported_native_call() {
    let mut s = Script::new(natives_config());
    let math = s.type_ref("Math");
    let arg = s.int(21);
    let call = s.call(math, "twice", &[arg]);
    let program = s.build(&[call]);
    assert_eq!(interpret(&program).0.unwrap(), Flow::Normal(Value::Int(42)));
}

#[test]
fn test_denied_native_is_class_not_allowed() {
    let mut s = Script::new(natives_config());
    let secrets = s.type_ref("acme.util.internal.Secrets");
    let program = s.build(&[secrets]);
    let err = interpret(&program).0.unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::ClassNotAllowed {
            name: "acme.util.internal.Secrets".into()
        }
    );
}

#[test]
fn test_allowed_but_unregistered_is_name_not_found() {
    let mut s = Script::new(natives_config());
    let missing = s.type_ref("acme.util.Missing");
    let program = s.build(&[missing]);
    let err = interpret(&program).0.unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NameNotFound { .. }));
}

#[test]
fn test_native_get_class_loader_is_denied() {
    let mut s = Script::new(natives_config());
    let math = s.type_ref("Math");
    let call = s.call(math, "getClassLoader", &[]);
    let program = s.build(&[call]);
    let err = interpret(&program).0.unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::MemberNotAllowed { .. }));
}
