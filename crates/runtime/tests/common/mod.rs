//! Shared helpers for the runtime integration suites: expression
//! construction without a reader, and structural assertions on results.

use vau_runtime::{Runtime, RuntimeConfig, Value};

pub fn boot() -> Runtime {
    Runtime::boot(RuntimeConfig::default()).expect("boot")
}

pub fn boot_with(config: RuntimeConfig) -> Runtime {
    Runtime::boot(config).expect("boot")
}

pub fn num(n: i64) -> Value {
    Value::from_int(n)
}

pub fn sym(rt: &mut Runtime, name: &str) -> Value {
    rt.intern(name).expect("intern")
}

/// Build `(head args...)` as a combination.
pub fn call(rt: &mut Runtime, head: &str, args: &[Value]) -> Value {
    let h = sym(rt, head);
    let mut items = vec![h];
    items.extend_from_slice(args);
    rt.list(&items).expect("list")
}

/// Evaluate in a fresh scope over the ground environment.
pub fn eval_in_scope(rt: &mut Runtime, expr: Value) -> Value {
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    let result = rt.eval_sync(expr, scope).expect("eval");
    rt.unprotect(scope);
    result
}

/// Evaluate directly in the ground environment.
pub fn eval_ground(rt: &mut Runtime, expr: Value) -> Value {
    let ground = rt.ground_env();
    rt.eval_sync(expr, ground).expect("eval")
}

/// Build `(head args...)` and evaluate it immediately. Building and
/// evaluating in one step keeps the expression alive: a collection runs
/// inside every evaluation, and unrooted expressions built earlier would
/// not survive it.
pub fn eval_call(rt: &mut Runtime, head: &str, args: &[Value]) -> Value {
    let expr = call(rt, head, args);
    eval_ground(rt, expr)
}

/// Structural equality over pairs, identity elsewhere.
pub fn values_equal(rt: &Runtime, a: Value, b: Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_pair() && b.is_pair() {
        return values_equal(rt, rt.car(a), rt.car(b))
            && values_equal(rt, rt.cdr(a), rt.cdr(b));
    }
    false
}

/// Assert the result is an error reply of the given kind.
pub fn assert_error_kind(rt: &mut Runtime, v: Value, kind: &str) {
    assert!(rt.is_error(v), "expected error reply, got {v:?}");
    let expected = sym(rt, kind);
    assert_eq!(rt.error_kind(v), Some(expected));
}
