//! Environment actors driven through their message protocol: `lookup`
//! and `bind` selectors sent as raw events, scope delegation to parents,
//! and the linear binding-chain protocol.

mod common;

use common::*;
use vau_runtime::{Proc, Value};

/// Send `(cell selector args...)` to `target` and run to completion.
fn ask(rt: &mut vau_runtime::Runtime, target: Value, selector: Value, args: &[Value]) -> Value {
    let cell = rt.host_cell().unwrap();
    rt.protect(cell);
    let mut parts = vec![cell, selector];
    parts.extend_from_slice(args);
    let msg = rt.list(&parts).unwrap();
    rt.enqueue(target, msg).unwrap();
    rt.run().unwrap();
    rt.unprotect(cell);
    rt.host_cell_value(cell)
}

#[test]
fn test_bind_then_lookup_roundtrips() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).unwrap();
    rt.protect(scope);
    let x = sym(&mut rt, "x");
    let (bind, lookup) = (rt.well_known().bind, rt.well_known().lookup);
    assert_eq!(ask(&mut rt, scope, bind, &[x, num(42)]), Value::INERT);
    assert_eq!(ask(&mut rt, scope, lookup, &[x]), num(42));
    rt.unprotect(scope);
}

#[test]
fn test_lookup_miss_forwards_to_parent() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let outer = rt.new_scope(ground).unwrap();
    rt.protect(outer);
    let inner = rt.new_scope(outer).unwrap();
    rt.protect(inner);
    let y = sym(&mut rt, "y");
    let (bind, lookup) = (rt.well_known().bind, rt.well_known().lookup);
    ask(&mut rt, outer, bind, &[y, num(5)]);
    // The inner scope has no y of its own; the outer one answers.
    assert_eq!(ask(&mut rt, inner, lookup, &[y]), num(5));
    rt.unprotect(inner);
    rt.unprotect(outer);
}

#[test]
fn test_lookup_reaching_the_sentinel_is_undefined() {
    let mut rt = boot();
    let scope = rt.new_scope(Value::EMPTY_ENV).unwrap();
    rt.protect(scope);
    let ghost = sym(&mut rt, "ghost");
    let lookup = rt.well_known().lookup;
    let reply = ask(&mut rt, scope, lookup, &[ghost]);
    assert_error_kind(&mut rt, reply, "undefined");
    rt.unprotect(scope);
}

#[test]
fn test_bind_on_the_sentinel_is_refused() {
    let mut rt = boot();
    let x = sym(&mut rt, "x");
    let bind = rt.well_known().bind;
    let reply = ask(&mut rt, Value::EMPTY_ENV, bind, &[x, num(1)]);
    assert_error_kind(&mut rt, reply, "immutable-env");
}

#[test]
fn test_rebind_is_idempotent_and_updates_in_place() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).unwrap();
    rt.protect(scope);
    let x = sym(&mut rt, "x");
    let (bind, lookup) = (rt.well_known().bind, rt.well_known().lookup);
    ask(&mut rt, scope, bind, &[x, num(1)]);
    ask(&mut rt, scope, bind, &[x, num(1)]);
    assert_eq!(ask(&mut rt, scope, lookup, &[x]), num(1));
    ask(&mut rt, scope, bind, &[x, num(2)]);
    assert_eq!(ask(&mut rt, scope, lookup, &[x]), num(2));
    rt.unprotect(scope);
}

#[test]
fn test_scope_identity_survives_growth() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).unwrap();
    rt.protect(scope);
    let (bind, lookup) = (rt.well_known().bind, rt.well_known().lookup);
    // Bind through the same actor value many times; the address other
    // actors hold keeps answering with the growing chain.
    for i in 0..20 {
        let name = format!("name-{i}");
        let s = sym(&mut rt, &name);
        ask(&mut rt, scope, bind, &[s, num(i)]);
    }
    for i in 0..20 {
        let name = format!("name-{i}");
        let s = sym(&mut rt, &name);
        assert_eq!(ask(&mut rt, scope, lookup, &[s]), num(i));
    }
    rt.unprotect(scope);
}

#[test]
fn test_many_bindings_lookup_fast_path_still_answers() {
    // Enough symbols that the splay tree actually rotates.
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).unwrap();
    rt.protect(scope);
    let (bind, lookup) = (rt.well_known().bind, rt.well_known().lookup);
    let names: Vec<String> = (0..50).map(|i| format!("sym-{:02}", (i * 37) % 50)).collect();
    for (i, name) in names.iter().enumerate() {
        let s = sym(&mut rt, name);
        ask(&mut rt, scope, bind, &[s, num(i as i64)]);
    }
    // Repeated lookups of the same symbol hit the splayed root.
    let probe = sym(&mut rt, &names[25]);
    let expected = ask(&mut rt, scope, lookup, &[probe]);
    for _ in 0..3 {
        assert_eq!(ask(&mut rt, scope, lookup, &[probe]), expected);
    }
    rt.unprotect(scope);
}

#[test]
fn test_linear_binding_chain_protocol() {
    let mut rt = boot();
    let a = sym(&mut rt, "a");
    let b = sym(&mut rt, "b");
    // Hand-built chain: b -> a -> sentinel, each binding an actor whose
    // data is (symbol value next left right).
    let a_data = rt
        .list(&[a, num(1), Value::EMPTY_ENV, Value::NIL, Value::NIL])
        .unwrap();
    let a_binding = rt.create_actor(Proc::Binding.code(), a_data).unwrap();
    let b_data = rt
        .list(&[b, num(2), a_binding, Value::NIL, Value::NIL])
        .unwrap();
    let b_binding = rt.create_actor(Proc::Binding.code(), b_data).unwrap();
    rt.protect(b_binding);

    let (bind, lookup) = (rt.well_known().bind, rt.well_known().lookup);
    assert_eq!(ask(&mut rt, b_binding, lookup, &[b]), num(2));
    // Forwarded along next to the deeper binding.
    assert_eq!(ask(&mut rt, b_binding, lookup, &[a]), num(1));
    // Misses fall off the end of the chain into the sentinel.
    let c = sym(&mut rt, "c");
    let reply = ask(&mut rt, b_binding, lookup, &[c]);
    assert_error_kind(&mut rt, reply, "undefined");
    // Bind through the chain updates the matching node in place.
    assert_eq!(ask(&mut rt, b_binding, bind, &[a, num(9)]), Value::INERT);
    assert_eq!(ask(&mut rt, b_binding, lookup, &[a]), num(9));
    rt.unprotect(b_binding);
}

#[test]
fn test_scope_forwards_foreign_selectors_to_parent() {
    let mut rt = boot();
    let scope = rt.new_scope(Value::EMPTY_ENV).unwrap();
    rt.protect(scope);
    // A selector no environment owns falls through to the sentinel,
    // which answers with an error rather than dropping the message.
    let frob = sym(&mut rt, "frobnicate");
    let reply = ask(&mut rt, scope, frob, &[]);
    assert_error_kind(&mut rt, reply, "unknown-selector");
    rt.unprotect(scope);
}
