//! Dispatcher, effect, watchdog, and diagnostics behavior through the
//! public host surface.

mod common;

use common::*;
use vau_runtime::{Effect, Fault, Proc, RuntimeConfig, Value};

#[test]
fn test_eval_sync_drains_the_queue() {
    let mut rt = boot();
    let expr = call(&mut rt, "+", &[num(2), num(3)]);
    assert_eq!(eval_ground(&mut rt, expr), num(5));
    assert_eq!(rt.queue_depth(), 0);
}

#[test]
fn test_enqueue_eval_queues_exactly_one_event() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let cell = rt.host_cell().unwrap();
    rt.protect(cell);
    assert_eq!(rt.queue_depth(), 0);
    rt.enqueue_eval(cell, num(1), ground).unwrap();
    assert_eq!(rt.queue_depth(), 1);
    rt.run().unwrap();
    assert_eq!(rt.queue_depth(), 0);
    rt.unprotect(cell);
}

#[test]
fn test_multiple_pending_evaluations_all_answer() {
    let mut rt = boot();
    let ground = rt.ground_env();
    let mut cells = Vec::new();
    for i in 0..5 {
        let cell = rt.host_cell().unwrap();
        rt.protect(cell);
        let expr = call(&mut rt, "*", &[num(i), num(10)]);
        rt.enqueue_eval(cell, expr, ground).unwrap();
        cells.push(cell);
    }
    rt.run().unwrap();
    for (i, cell) in cells.iter().enumerate() {
        assert_eq!(rt.host_cell_value(*cell), num(i as i64 * 10));
        rt.unprotect(*cell);
    }
}

#[test]
fn test_dispatch_count_grows_monotonically() {
    let mut rt = boot();
    let before = rt.stats().events_dispatched;
    let expr = call(&mut rt, "+", &[num(1), num(1)]);
    eval_ground(&mut rt, expr);
    let mid = rt.stats().events_dispatched;
    assert!(mid > before);
    let expr = call(&mut rt, "+", &[num(1), num(1)]);
    eval_ground(&mut rt, expr);
    assert!(rt.stats().events_dispatched > mid);
}

#[test]
fn test_sink_absorbs_messages() {
    let mut rt = boot();
    let junk = rt.list(&[num(1), num(2)]).unwrap();
    rt.enqueue(Value::SINK, junk).unwrap();
    rt.run().unwrap();
    assert_eq!(rt.stats().effects_rejected, 0);
    assert_eq!(rt.queue_depth(), 0);
}

#[test]
fn test_double_become_is_rejected() {
    let mut fx = Effect::new();
    fx.become_actor(Proc::HostCell, Value::UNDEF).unwrap();
    assert_eq!(
        fx.become_actor(Proc::HostCell, Value::UNDEF),
        Err(Fault::DoubleBecome)
    );
}

#[test]
fn test_out_of_memory_rejects_the_effect_but_keeps_running() {
    let mut rt = boot_with(RuntimeConfig {
        heap_limit: 1024,
        ..RuntimeConfig::default()
    });
    let ground = rt.ground_env();
    let cell = rt.host_cell().unwrap();
    rt.protect(cell);
    let expr = call(&mut rt, "+", &[num(1), num(1)]);
    rt.enqueue_eval(cell, expr, ground).unwrap();
    // Exhaust every remaining cell with unreachable garbage, so the very
    // first dispatch fails to allocate.
    while rt.cons(num(0), Value::NIL).is_ok() {}
    // The failing effect is discarded; the dispatcher carries on, and the
    // stop-the-world collection at drain reclaims the garbage.
    rt.run().unwrap();
    assert!(rt.stats().effects_rejected >= 1);
    assert!(rt.stats().heap.free_cells > 0);
    rt.unprotect(cell);
}

#[test]
fn test_watchdog_fires_after_budget() {
    let mut rt = boot();
    let handler = rt.host_cell().unwrap();
    rt.protect(handler);
    rt.arm_watchdog(3, handler);
    let expr = call(&mut rt, "+", &[num(1), num(2), num(3)]);
    eval_ground(&mut rt, expr);
    assert_eq!(rt.stats().watchdog_fires, 1);
    // The handler got (SINK abort).
    let msg = rt.host_cell_value(handler);
    assert!(msg.is_pair());
    assert_eq!(rt.car(msg), Value::SINK);
    let abort = rt.well_known().abort;
    assert_eq!(rt.car(rt.cdr(msg)), abort);
    rt.unprotect(handler);
}

#[test]
fn test_watchdog_within_budget_stays_quiet() {
    let mut rt = boot();
    let handler = rt.host_cell().unwrap();
    rt.protect(handler);
    rt.arm_watchdog(100_000, handler);
    let expr = call(&mut rt, "+", &[num(1), num(2)]);
    eval_ground(&mut rt, expr);
    assert_eq!(rt.stats().watchdog_fires, 0);
    assert_eq!(rt.host_cell_value(handler), Value::UNDEF);
    rt.unprotect(handler);
}

#[test]
fn test_watchdog_disarm() {
    let mut rt = boot();
    let handler = rt.host_cell().unwrap();
    rt.protect(handler);
    rt.arm_watchdog(3, handler);
    rt.disarm_watchdog();
    let expr = call(&mut rt, "+", &[num(1), num(2), num(3)]);
    eval_ground(&mut rt, expr);
    assert_eq!(rt.stats().watchdog_fires, 0);
    rt.unprotect(handler);
}

#[test]
fn test_watchdog_budget_from_config() {
    let mut rt = boot_with(RuntimeConfig {
        watchdog_budget: 2,
        ..RuntimeConfig::default()
    });
    let expr = call(&mut rt, "+", &[num(1), num(2), num(3)]);
    eval_ground(&mut rt, expr);
    assert_eq!(rt.stats().watchdog_fires, 1);
}

#[test]
fn test_stats_snapshot_renders() {
    let mut rt = boot();
    let expr = call(&mut rt, "+", &[num(1), num(2)]);
    eval_ground(&mut rt, expr);
    let text = rt.stats().to_string();
    assert!(text.contains("dispatched"));
    assert!(text.contains("heap:"));
    assert!(text.contains("gc:"));
}

#[test]
fn test_heap_limit_is_respected() {
    let rt = boot_with(RuntimeConfig {
        heap_limit: 4096,
        ..RuntimeConfig::default()
    });
    assert_eq!(rt.stats().heap.limit, 4096);
}

#[test]
fn test_peak_queue_depth_tracks_fanout() {
    let mut rt = boot();
    let args: Vec<Value> = (0..6).map(num).collect();
    let expr = call(&mut rt, "list", &args);
    eval_ground(&mut rt, expr);
    assert!(rt.stats().peak_queue_depth >= 2);
}

#[test]
fn test_delegation_routes_to_the_delegate_behavior() {
    let mut rt = boot();
    // A delegating actor forwards dispatch to its code actor; the reply
    // cell behind the chain stores the message.
    let cell = rt.host_cell().unwrap();
    let middle = rt.create_actor(cell, Value::UNDEF).unwrap();
    let front = rt.create_actor(middle, Value::UNDEF).unwrap();
    rt.protect(front);
    rt.enqueue(front, num(99)).unwrap();
    rt.run().unwrap();
    assert_eq!(rt.host_cell_value(cell), num(99));
    rt.unprotect(front);
}

#[test]
fn test_create_actor_rejects_garbage_codes() {
    let mut rt = boot();
    assert!(rt.create_actor(Value::from_int(9999), Value::UNDEF).is_err());
    assert!(rt.create_actor(Value::from_int(0), Value::UNDEF).is_err());
    let sym = sym(&mut rt, "nope");
    assert!(rt.create_actor(sym, Value::UNDEF).is_err());
}

#[test]
fn test_protect_pins_values_across_collections() {
    let mut rt = boot();
    let v = rt.cons(num(7), Value::NIL).unwrap();
    rt.protect(v);
    rt.collect();
    assert_eq!(rt.car(v), num(7));
    rt.unprotect(v);
    rt.collect();
    // Now it is garbage; its cell is back on the free list.
    assert!(rt.heap().is_free(v.as_pair().unwrap()));
}
