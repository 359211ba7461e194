//! End-to-end evaluation of built programs against host data.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use warden_eval::{
    Accounting, CancellationToken, CompiledProgram, EvalErrorKind, ExecList, ExecMap,
    ExecutionContext, ExecutionLimits, HostScope, Key, MapScope, ParserConfiguration,
    ProgramBuilder, QuotaAccounting, SizeAccounting, Value,
};
use warden_ir::{BinaryOp, Literal, NodeId, NodeKind, SharedInterner};

struct Fixture {
    interner: SharedInterner,
    builder: ProgramBuilder,
}

impl Fixture {
    fn new() -> Self {
        let interner = SharedInterner::new();
        let config = Arc::new(ParserConfiguration::new(interner.clone()));
        Fixture {
            interner,
            builder: ProgramBuilder::new(config).source_name("test"),
        }
    }

    fn node(&mut self, kind: NodeKind) -> NodeId {
        self.builder.node(kind).unwrap()
    }

    fn int(&mut self, value: i64) -> NodeId {
        self.builder.literal(Literal::Int(value))
    }

    fn var(&mut self, name: &str) -> NodeId {
        let name = self.builder.name(name);
        self.node(NodeKind::Var(name))
    }

    fn assign(&mut self, name: &str, value: NodeId) -> NodeId {
        let name = self.builder.name(name);
        self.node(NodeKind::Assign { name, value })
    }

    fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.node(NodeKind::Binary { op, left, right })
    }

    fn call(&mut self, receiver: NodeId, method: &str, args: &[NodeId]) -> NodeId {
        let method = self.builder.name(method);
        let args = self.builder.list(args).unwrap();
        self.node(NodeKind::MethodCall {
            receiver,
            method,
            args,
        })
    }

    /// `while (true) { target.push(1) }`
    fn push_forever(&mut self, target: &str) -> NodeId {
        let list = self.var(target);
        let one = self.int(1);
        let push = self.call(list, "push", &[one]);
        let body = self.builder.sequence(&[push]).unwrap();
        let forever = self.builder.literal(Literal::Bool(true));
        self.node(NodeKind::While {
            cond: forever,
            body,
        })
    }

    fn build(mut self, statements: &[NodeId]) -> (CompiledProgram, SharedInterner) {
        for &statement in statements {
            self.builder.push_statement(statement).unwrap();
        }
        (self.builder.build().unwrap(), self.interner)
    }
}

fn host(entries: &[(&str, Value)]) -> ExecMap {
    ExecMap::from_entries(
        SizeAccounting::shared(),
        entries.iter().map(|(k, v)| (Key::str(k), v.clone())),
    )
}

#[test]
fn test_program_reads_and_writes_host_data() {
    let mut f = Fixture::new();
    let price = f.var("price");
    let qty = f.var("qty");
    let product = f.binary(BinaryOp::Mul, price, qty);
    let store = f.assign("total", product);
    let (program, interner) = f.build(&[store]);

    let data = host(&[("price", Value::Int(4)), ("qty", Value::Int(3))]);
    let scope = HostScope::chain(Rc::new(data.clone()), interner);
    let ctx = ExecutionContext::unaccounted();

    assert_eq!(
        program.evaluate(&ctx, &Value::Null, &scope).unwrap(),
        Value::Int(12)
    );
    assert_eq!(data.get(&Key::str("total")), Value::Int(12));
}

#[test]
fn test_reevaluation_is_pure() {
    let mut f = Fixture::new();
    let price = f.var("price");
    let two = f.int(2);
    let doubled = f.binary(BinaryOp::Mul, price, two);
    let (program, interner) = f.build(&[doubled]);

    let data = host(&[("price", Value::Int(21))]);
    let scope = HostScope::chain(Rc::new(data), interner);
    let ctx = ExecutionContext::unaccounted();

    let first = program.evaluate(&ctx, &Value::Null, &scope).unwrap();
    let second = program.evaluate(&ctx, &Value::Null, &scope).unwrap();
    assert_eq!(first, Value::Int(42));
    assert_eq!(first, second);
}

#[test]
fn test_this_is_the_host_root_object() {
    let mut f = Fixture::new();
    let this = f.node(NodeKind::This);
    let key = f.builder.str_literal("name");
    let get = f.call(this, "get", &[key]);
    let (program, _) = f.build(&[get]);

    let root = Value::Map(host(&[("name", Value::str("warden"))]));
    let value = program
        .evaluate(&ExecutionContext::unaccounted(), &root, &MapScope::root())
        .unwrap();
    assert_eq!(value, Value::str("warden"));
}

#[test]
fn test_concurrent_first_evaluation() {
    let mut f = Fixture::new();
    let x = f.var("x");
    let one = f.int(1);
    let sum = f.binary(BinaryOp::Add, x, one);
    let (program, interner) = f.build(&[sum]);
    let program = Arc::new(program);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let program = Arc::clone(&program);
            let interner = interner.clone();
            thread::spawn(move || {
                let scope = MapScope::root();
                scope
                    .declare(interner.intern("x"), Value::Int(i), None)
                    .unwrap();
                program
                    .evaluate(&ExecutionContext::unaccounted(), &Value::Null, &scope)
                    .unwrap()
            })
        })
        .collect();

    for (i, handle) in (0..8).zip(handles) {
        assert_eq!(handle.join().unwrap(), Value::Int(i + 1));
    }
    assert!(program.is_strategy_selected());
}

#[test]
fn test_memory_quota_stops_growing_loop() {
    let mut f = Fixture::new();
    let lp = f.push_forever("xs");
    let (program, interner) = f.build(&[lp]);

    let quota = Arc::new(QuotaAccounting::new(SizeAccounting::shared()));
    let authority: Accounting = Arc::clone(&quota) as Accounting;
    let xs = ExecList::new(Arc::clone(&authority));
    let data = host(&[("xs", Value::List(xs.clone()))]);
    let scope = HostScope::chain(Rc::new(data), interner);
    let ctx = ExecutionContext::new(authority)
        .with_limits(ExecutionLimits::unbounded().with_memory_limit(64));

    let err = program.evaluate(&ctx, &Value::Null, &scope).unwrap_err();
    assert!(matches!(
        err.kind,
        EvalErrorKind::MemoryLimitExceeded { limit: 64, .. }
    ));
    assert!(quota.total() > 64);
    assert_eq!(quota.total(), xs.memory_size());
}

#[test]
fn test_cancelled_evaluation_stops_at_first_iteration() {
    let mut f = Fixture::new();
    let lp = f.push_forever("xs");
    let (program, interner) = f.build(&[lp]);

    let xs = ExecList::new(SizeAccounting::shared());
    let data = host(&[("xs", Value::List(xs.clone()))]);
    let scope = HostScope::chain(Rc::new(data), interner);
    let token = CancellationToken::new();
    token.cancel();
    let ctx = ExecutionContext::unaccounted().with_cancellation(token);

    let err = program.evaluate(&ctx, &Value::Null, &scope).unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::ExecutionCancelled);
    assert!(xs.is_empty());
}

#[test]
fn test_script_cannot_mutate_unmodifiable_host_list() {
    let mut f = Fixture::new();
    let xs = f.var("xs");
    let one = f.int(1);
    let push = f.call(xs, "push", &[one]);
    let (program, interner) = f.build(&[push]);

    let backing = ExecList::from_values(SizeAccounting::shared(), [Value::Int(0)]);
    let data = host(&[("xs", Value::List(backing.to_unmodifiable()))]);
    let scope = HostScope::chain(Rc::new(data), interner);

    let err = program
        .evaluate(&ExecutionContext::unaccounted(), &Value::Null, &scope)
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::Unsupported { .. }));
    assert_eq!(backing.len(), 1);
}

#[test]
fn test_script_mutations_keep_accounting_exact() {
    let mut f = Fixture::new();
    let mut statements = Vec::new();
    for (method, arg) in [("push", 5), ("push", 6), ("unshift", 4), ("removeAt", 0)] {
        let xs = f.var("xs");
        let arg = f.int(arg);
        statements.push(f.call(xs, method, &[arg]));
    }
    let xs = f.var("xs");
    let zero = f.int(0);
    let nine = f.int(9);
    statements.push(f.call(xs, "set", &[zero, nine]));
    let (program, interner) = f.build(&statements);

    let quota = Arc::new(QuotaAccounting::new(SizeAccounting::shared()));
    let list = ExecList::new(Arc::clone(&quota) as Accounting);
    let data = host(&[("xs", Value::List(list.clone()))]);
    let scope = HostScope::chain(Rc::new(data), interner);

    program
        .evaluate(&ExecutionContext::unaccounted(), &Value::Null, &scope)
        .unwrap();
    assert_eq!(list.values(), vec![Value::Int(9), Value::Int(6)]);
    assert_eq!(quota.total(), list.memory_size());
}

#[test]
fn test_null_assignment_keeps_host_variable() {
    let mut f = Fixture::new();
    let null = f.builder.literal(Literal::Null);
    let clear = f.assign("x", null);
    let read = f.var("x");
    let (program, interner) = f.build(&[clear, read]);

    let data = host(&[("x", Value::Int(1))]);
    let scope = HostScope::chain(Rc::new(data.clone()), interner.clone());

    assert_eq!(
        program
            .evaluate(&ExecutionContext::unaccounted(), &Value::Null, &scope)
            .unwrap(),
        Value::Null
    );
    assert!(data.contains_key(&Key::str("x")));
    assert!(scope.is_resolvable(interner.intern("x")));
}
