//! Fork/join behavior: operand lists evaluate element-wise with results
//! paired by tag identity, regardless of how the queue interleaves.

mod common;

use common::*;
use vau_runtime::Value;

#[test]
fn test_argument_order_is_preserved() {
    let mut rt = boot();
    // (list (+ 1 2) (* 3 4)) => (3 12)
    let add = call(&mut rt, "+", &[num(1), num(2)]);
    let mul = call(&mut rt, "*", &[num(3), num(4)]);
    let expr = call(&mut rt, "list", &[add, mul]);
    let result = eval_ground(&mut rt, expr);
    let expected = rt.list(&[num(3), num(12)]).unwrap();
    assert!(values_equal(&rt, result, expected));
}

#[test]
fn test_long_operand_lists_keep_order() {
    let mut rt = boot();
    let args: Vec<Value> = (1..=9).map(num).collect();
    let expr = call(&mut rt, "list", &args);
    let result = eval_ground(&mut rt, expr);
    let expected = rt.list(&args).unwrap();
    assert!(values_equal(&rt, result, expected));
}

#[test]
fn test_nested_subevaluations_complete() {
    let mut rt = boot();
    // (+ (+ 1 2) (* (+ 1 1) 4) 5) => 16
    let a = call(&mut rt, "+", &[num(1), num(2)]);
    let inner = call(&mut rt, "+", &[num(1), num(1)]);
    let b = call(&mut rt, "*", &[inner, num(4)]);
    let expr = call(&mut rt, "+", &[a, b, num(5)]);
    assert_eq!(eval_ground(&mut rt, expr), num(16));
}

#[test]
fn test_error_in_head_branch_propagates() {
    let mut rt = boot();
    let bad = sym(&mut rt, "unbound-head");
    let mul = call(&mut rt, "*", &[num(3), num(4)]);
    let expr = call(&mut rt, "list", &[bad, mul]);
    let result = eval_ground(&mut rt, expr);
    assert_error_kind(&mut rt, result, "undefined");
}

#[test]
fn test_error_in_tail_branch_propagates() {
    let mut rt = boot();
    let bad = sym(&mut rt, "unbound-tail");
    let mul = call(&mut rt, "*", &[num(3), num(4)]);
    let expr = call(&mut rt, "list", &[mul, bad]);
    let result = eval_ground(&mut rt, expr);
    assert_error_kind(&mut rt, result, "undefined");
}

#[test]
fn test_both_branches_failing_still_answers_once() {
    let mut rt = boot();
    let bad1 = sym(&mut rt, "unbound-one");
    let bad2 = sym(&mut rt, "unbound-two");
    let expr = call(&mut rt, "list", &[bad1, bad2]);
    let result = eval_ground(&mut rt, expr);
    assert_error_kind(&mut rt, result, "undefined");
    assert_eq!(rt.queue_depth(), 0);
}

#[test]
fn test_error_does_not_reach_the_wrapped_combiner() {
    let mut rt = boot();
    // A failing argument short-circuits at the join/argument
    // continuation; the addition never sees a half-built list.
    let bad = sym(&mut rt, "unbound-arg");
    let expr = call(&mut rt, "+", &[num(1), bad, num(3)]);
    let result = eval_ground(&mut rt, expr);
    assert_error_kind(&mut rt, result, "undefined");
}
