//! Whole programs: read, evaluate, print.

use vau_lang::{print, read_all};
use vau_runtime::{Runtime, RuntimeConfig, Value};

fn boot() -> Runtime {
    Runtime::boot(RuntimeConfig::default()).expect("boot")
}

/// Read one datum and evaluate it in a fresh scope over ground.
fn run(rt: &mut Runtime, source: &str) -> Value {
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    let result = run_in(rt, source, scope);
    rt.unprotect(scope);
    result
}

/// Evaluate several data in one shared scope, returning the last result.
/// All parsed expressions are pinned up front, since a collection inside
/// one evaluation must not reclaim the expressions still pending.
fn run_in(rt: &mut Runtime, source: &str, scope: Value) -> Value {
    let exprs = read_all(rt, source).expect("read");
    for &expr in &exprs {
        rt.protect(expr);
    }
    let mut result = Value::INERT;
    for &expr in &exprs {
        result = rt.eval_sync(expr, scope).expect("eval");
    }
    for &expr in &exprs {
        rt.unprotect(expr);
    }
    result
}

fn run_to_string(rt: &mut Runtime, source: &str) -> String {
    let v = run(rt, source);
    print(rt, v)
}

#[test]
fn test_arithmetic_program() {
    let mut rt = boot();
    assert_eq!(run_to_string(&mut rt, "(+ 1 2 3)"), "6");
    assert_eq!(run_to_string(&mut rt, "(* (+ 1 2) (- 10 6))"), "12");
}

#[test]
fn test_define_and_recall_program() {
    let mut rt = boot();
    assert_eq!(run_to_string(&mut rt, "($sequence ($define! x 7) x)"), "7");
}

#[test]
fn test_lambda_program() {
    let mut rt = boot();
    assert_eq!(run_to_string(&mut rt, "(($lambda (a b) (+ a b)) 3 4)"), "7");
}

#[test]
fn test_vau_program_sees_operands_unevaluated() {
    let mut rt = boot();
    assert_eq!(
        run_to_string(&mut rt, "(($vau (x) #ignore x) (+ 1 2))"),
        "(+ 1 2)"
    );
}

#[test]
fn test_quote_program() {
    let mut rt = boot();
    assert_eq!(run_to_string(&mut rt, "(quote (1 2 3))"), "(1 2 3)");
    assert_eq!(run_to_string(&mut rt, "'(1 2 3)"), "(1 2 3)");
}

#[test]
fn test_conditional_program() {
    let mut rt = boot();
    assert_eq!(run_to_string(&mut rt, "($if (<? 1 2) 10 20)"), "10");
    assert_eq!(run_to_string(&mut rt, "($if (<? 2 1) 10 20)"), "20");
}

#[test]
fn test_list_surgery_program() {
    let mut rt = boot();
    assert_eq!(run_to_string(&mut rt, "(car (cdr (list 1 2 3)))"), "2");
    assert_eq!(run_to_string(&mut rt, "(cons 0 (list 1 2))"), "(0 1 2)");
}

#[test]
fn test_session_accumulates_definitions() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    run_in(&mut rt, "($define! double ($lambda (n) (* n 2)))", scope);
    let v = run_in(&mut rt, "(double 21)", scope);
    assert_eq!(v, Value::from_int(42));
    rt.unprotect(scope);
}

#[test]
fn test_recursive_definition() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    // count-down defined in the scope it is recalled from.
    run_in(
        &mut rt,
        "($define! count-down
           ($lambda (n) ($if (=? n 0) 0 (count-down (- n 1)))))",
        scope,
    );
    let v = run_in(&mut rt, "(count-down 10)", scope);
    assert_eq!(v, Value::from_int(0));
    rt.unprotect(scope);
}

#[test]
fn test_higher_order_program() {
    let mut rt = boot();
    let v = run_to_string(
        &mut rt,
        "($sequence
           ($define! twice ($lambda (f x) (f (f x))))
           (twice ($lambda (n) (+ n 3)) 1))",
    );
    assert_eq!(v, "7");
}

#[test]
fn test_undefined_variable_reports_error() {
    let mut rt = boot();
    let v = run(&mut rt, "missing-thing");
    assert!(rt.is_error(v));
    assert_eq!(run_to_string(&mut rt, "missing-thing"), "(#fail undefined missing-thing)");
}

#[test]
fn test_apply_from_the_prelude() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    vau_lang::install_prelude(&mut rt, scope).expect("prelude");
    let v = run_in(&mut rt, "(apply + (list 1 2 3))", scope);
    assert_eq!(v, Value::from_int(6));
    let v = run_in(&mut rt, "(apply ($lambda (x y) (* x y)) (list 6 7))", scope);
    assert_eq!(v, Value::from_int(42));
    rt.unprotect(scope);
}

#[test]
fn test_get_current_env_from_the_prelude() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    vau_lang::install_prelude(&mut rt, scope).expect("prelude");
    let v = run_in(&mut rt, "(environment? (get-current-env))", scope);
    assert_eq!(v, Value::TRUE);
    // The captured environment really is the session scope: definitions
    // evaluated in it are visible afterwards.
    run_in(&mut rt, "(eval '($define! z 11) (get-current-env))", scope);
    let v = run_in(&mut rt, "z", scope);
    assert_eq!(v, Value::from_int(11));
    rt.unprotect(scope);
}

#[test]
fn test_when_and_unless_from_the_prelude() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    vau_lang::install_prelude(&mut rt, scope).expect("prelude");
    assert_eq!(
        run_in(&mut rt, "($when (<? 1 2) 1 2 3)", scope),
        Value::from_int(3)
    );
    assert_eq!(run_in(&mut rt, "($when (<? 2 1) 1)", scope), Value::INERT);
    assert_eq!(
        run_in(&mut rt, "($unless (<? 2 1) 7)", scope),
        Value::from_int(7)
    );
    assert_eq!(run_in(&mut rt, "(not? #f)", scope), Value::TRUE);
    rt.unprotect(scope);
}

#[test]
fn test_read_eval_print_multiple_forms() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let scope = rt.new_scope(ground).expect("scope");
    rt.protect(scope);
    let last = run_in(&mut rt, "($define! x 5) ($define! y 6) (* x y)", scope);
    assert_eq!(print(&rt, last), "30");
    rt.unprotect(scope);
}
