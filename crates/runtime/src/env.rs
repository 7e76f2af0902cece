//! Environment actors
//!
//! An environment is a chain of scopes ending at the `EMPTY_ENV`
//! sentinel. A scope owns a set of binding actors arranged two ways at
//! once: a `next` chain in insertion order, and a splay tree over the
//! same nodes keyed by symbol handle for lookup. A binding actor's data
//! is the list `(symbol value next left right)`; a scope's data is
//! `(parent root chain)`.
//!
//! Lookup is total: a miss forwards the original message to the parent,
//! and the sentinel at the end replies with an `undefined` error. A hit
//! splays the found binding to the scope's root. Binding an existing
//! symbol updates the value cell in place; binding a new symbol inserts
//! a node and the scope *becomes* a scope with the new root, so its
//! identity never changes while the chain grows.
//!
//! The splay rotations mutate shared structure in place. That is safe
//! here because the dispatcher is single-threaded cooperative: no other
//! behavior can observe the tree mid-rotation. Any future parallelism
//! would have to revisit this module first.

use crate::behaviors::{
    actor_field as get_field, bool_value, first, parse_request, second,
    set_actor_field as set_field,
};
use crate::effect::Effect;
use crate::error::Fault;
use crate::proc::Proc;
use crate::runtime::Runtime;
use tracing::trace;
use vau_core::{Heap, Value};

// Binding data fields.
const F_SYM: usize = 0;
const F_VAL: usize = 1;
const F_NEXT: usize = 2;
const F_LEFT: usize = 3;
const F_RIGHT: usize = 4;

// Scope data fields.
const S_PARENT: usize = 0;
const S_ROOT: usize = 1;
const S_CHAIN: usize = 2;

pub(crate) fn binding_symbol(heap: &Heap, b: Value) -> Value {
    get_field(heap, b, F_SYM)
}

pub(crate) fn binding_value(heap: &Heap, b: Value) -> Value {
    get_field(heap, b, F_VAL)
}

pub(crate) fn binding_next(heap: &Heap, b: Value) -> Value {
    get_field(heap, b, F_NEXT)
}

fn left(heap: &Heap, b: Value) -> Value {
    get_field(heap, b, F_LEFT)
}

fn right(heap: &Heap, b: Value) -> Value {
    get_field(heap, b, F_RIGHT)
}

fn set_left(heap: &mut Heap, b: Value, v: Value) {
    set_field(heap, b, F_LEFT, v);
}

fn set_right(heap: &mut Heap, b: Value, v: Value) {
    set_field(heap, b, F_RIGHT, v);
}

/// Symbol handle of a binding, the splay comparison key.
fn handle_of(heap: &Heap, b: Value) -> usize {
    binding_symbol(heap, b).as_symbol().unwrap_or(0)
}

pub(crate) fn scope_parent(heap: &Heap, s: Value) -> Value {
    get_field(heap, s, S_PARENT)
}

pub(crate) fn scope_root(heap: &Heap, s: Value) -> Value {
    get_field(heap, s, S_ROOT)
}

pub(crate) fn scope_chain(heap: &Heap, s: Value) -> Value {
    get_field(heap, s, S_CHAIN)
}

/// Allocate a binding actor.
pub(crate) fn new_binding(
    rt: &mut Runtime,
    fx: &mut Effect,
    sym: Value,
    val: Value,
    next: Value,
    left: Value,
    right: Value,
) -> Result<Value, Fault> {
    let data = fx.list(rt, &[sym, val, next, left, right])?;
    fx.actor(rt, Proc::Binding, data)
}

/// Allocate an empty scope over `parent`.
pub(crate) fn make_scope(rt: &mut Runtime, fx: &mut Effect, parent: Value) -> Result<Value, Fault> {
    let data = fx.list(rt, &[parent, Value::NIL, Value::NIL])?;
    fx.actor(rt, Proc::Scope, data)
}

/// Pure binary search over a splay tree. Never mutates.
pub(crate) fn search(heap: &Heap, root: Value, h: usize) -> Option<Value> {
    let mut t = root;
    while t.is_actor() && !t.is_nil() {
        let th = handle_of(heap, t);
        t = if h < th {
            left(heap, t)
        } else if h > th {
            right(heap, t)
        } else {
            return Some(t);
        };
    }
    None
}

/// Splay the node keyed `h` (or the last node on its search path) to the
/// root, returning the new root. Standard recursive top-down variant with
/// zig, zig-zig, and zig-zag rotations.
pub(crate) fn splay(heap: &mut Heap, t: Value, h: usize) -> Value {
    if t.is_nil() || !t.is_actor() {
        return t;
    }
    let th = handle_of(heap, t);
    if h < th {
        let l = left(heap, t);
        if l.is_nil() {
            return t;
        }
        let lh = handle_of(heap, l);
        let mut t = t;
        if h < lh {
            // zig-zig
            let ll = splay(heap, left(heap, l), h);
            set_left(heap, l, ll);
            t = rotate_right(heap, t);
        } else if h > lh {
            // zig-zag
            let lr = splay(heap, right(heap, l), h);
            set_right(heap, l, lr);
            if !right(heap, l).is_nil() {
                let l2 = rotate_left(heap, l);
                set_left(heap, t, l2);
            }
        }
        if left(heap, t).is_nil() {
            t
        } else {
            rotate_right(heap, t)
        }
    } else if h > th {
        let r = right(heap, t);
        if r.is_nil() {
            return t;
        }
        let rh = handle_of(heap, r);
        let mut t = t;
        if h > rh {
            let rr = splay(heap, right(heap, r), h);
            set_right(heap, r, rr);
            t = rotate_left(heap, t);
        } else if h < rh {
            let rl = splay(heap, left(heap, r), h);
            set_left(heap, r, rl);
            if !left(heap, r).is_nil() {
                let r2 = rotate_right(heap, r);
                set_right(heap, t, r2);
            }
        }
        if right(heap, t).is_nil() {
            t
        } else {
            rotate_left(heap, t)
        }
    } else {
        t
    }
}

fn rotate_right(heap: &mut Heap, t: Value) -> Value {
    let l = left(heap, t);
    set_left(heap, t, right(heap, l));
    set_right(heap, l, t);
    l
}

fn rotate_left(heap: &mut Heap, t: Value) -> Value {
    let r = right(heap, t);
    set_right(heap, t, left(heap, r));
    set_left(heap, r, t);
    r
}

/// Insert a fresh node as the new root, splitting the splayed tree
/// around its key.
pub(crate) fn splay_insert(heap: &mut Heap, root: Value, node: Value, h: usize) -> Value {
    if root.is_nil() {
        return node;
    }
    let root = splay(heap, root, h);
    let rh = handle_of(heap, root);
    if h < rh {
        set_left(heap, node, left(heap, root));
        set_left(heap, root, Value::NIL);
        set_right(heap, node, root);
    } else if h > rh {
        set_right(heap, node, right(heap, root));
        set_right(heap, root, Value::NIL);
        set_left(heap, node, root);
    } else {
        // Key already present; caller updates in place instead.
        return root;
    }
    node
}

/// Build a scope over `parent` holding `bindings`. Later entries for the
/// same symbol win. Used by boot and by compound-operative calls, where
/// the scope must appear fully formed in one step.
pub(crate) fn scope_with_bindings(
    rt: &mut Runtime,
    fx: &mut Effect,
    parent: Value,
    bindings: &[(Value, Value)],
) -> Result<Value, Fault> {
    let mut root = Value::NIL;
    let mut chain = Value::NIL;
    for &(sym, val) in bindings {
        let Some(h) = sym.as_symbol() else {
            continue;
        };
        if let Some(found) = search(&rt.heap, root, h) {
            set_field(&mut rt.heap, found, F_VAL, val);
            continue;
        }
        let node = new_binding(rt, fx, sym, val, chain, Value::NIL, Value::NIL)?;
        chain = node;
        root = splay_insert(&mut rt.heap, root, node, h);
    }
    let data = fx.list(rt, &[parent, root, chain])?;
    fx.actor(rt, Proc::Scope, data)
}

/// Scope behavior: splay lookup locally, forward misses (and every
/// selector it does not own) to the parent.
pub(crate) fn scope_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to scope");
        return Ok(());
    };
    let parent = scope_parent(&rt.heap, self_);
    if req.selector == wk.lookup {
        let sym = first(rt, req.rest).unwrap_or(Value::UNDEF);
        let Some(h) = sym.as_symbol() else {
            return fx.reply_error(rt, req.cust, wk.wrong_type, sym);
        };
        let root = scope_root(&rt.heap, self_);
        if search(&rt.heap, root, h).is_some() {
            let new_root = splay(&mut rt.heap, root, h);
            set_field(&mut rt.heap, self_, S_ROOT, new_root);
            let value = binding_value(&rt.heap, new_root);
            fx.reply(req.cust, value);
        } else {
            fx.send(parent, msg);
        }
        Ok(())
    } else if req.selector == wk.bind {
        let sym = first(rt, req.rest).unwrap_or(Value::UNDEF);
        let val = second(rt, req.rest).unwrap_or(Value::UNDEF);
        let Some(h) = sym.as_symbol() else {
            return fx.reply_error(rt, req.cust, wk.wrong_type, sym);
        };
        let root = scope_root(&rt.heap, self_);
        if search(&rt.heap, root, h).is_some() {
            let new_root = splay(&mut rt.heap, root, h);
            set_field(&mut rt.heap, new_root, F_VAL, val);
            set_field(&mut rt.heap, self_, S_ROOT, new_root);
        } else {
            let chain = scope_chain(&rt.heap, self_);
            let node = new_binding(rt, fx, sym, val, chain, Value::NIL, Value::NIL)?;
            let new_root = splay_insert(&mut rt.heap, root, node, h);
            let data = fx.list(rt, &[parent, new_root, node])?;
            fx.become_actor(Proc::Scope, data)?;
        }
        fx.reply(req.cust, Value::INERT);
        Ok(())
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == Proc::Scope.code()));
        Ok(())
    } else {
        fx.send(parent, msg);
        Ok(())
    }
}

/// Binding behavior: the linear-chain protocol. Compare the symbol,
/// answer on a match, otherwise forward along `next`.
pub(crate) fn binding_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to binding");
        return Ok(());
    };
    let next = binding_next(&rt.heap, self_);
    if req.selector == wk.lookup {
        let sym = first(rt, req.rest).unwrap_or(Value::UNDEF);
        if sym == binding_symbol(&rt.heap, self_) {
            let value = binding_value(&rt.heap, self_);
            fx.reply(req.cust, value);
        } else {
            fx.send(next, msg);
        }
        Ok(())
    } else if req.selector == wk.bind {
        let sym = first(rt, req.rest).unwrap_or(Value::UNDEF);
        let val = second(rt, req.rest).unwrap_or(Value::UNDEF);
        if sym == binding_symbol(&rt.heap, self_) {
            set_field(&mut rt.heap, self_, F_VAL, val);
            fx.reply(req.cust, Value::INERT);
        } else {
            fx.send(next, msg);
        }
        Ok(())
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == Proc::Binding.code()));
        Ok(())
    } else {
        fx.send(next, msg);
        Ok(())
    }
}

/// The sentinel ending every environment chain. Lookup is total because
/// this is where a miss finally answers.
pub(crate) fn empty_env_beh(
    rt: &mut Runtime,
    _self: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to empty env");
        return Ok(());
    };
    if req.selector == wk.lookup {
        let sym = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply_error(rt, req.cust, wk.undefined, sym)
    } else if req.selector == wk.bind {
        let sym = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply_error(rt, req.cust, wk.immutable_env, sym)
    } else if req.selector == wk.typeq {
        let t = first(rt, req.rest).unwrap_or(Value::UNDEF);
        fx.reply(req.cust, bool_value(t == Proc::EmptyEnv.code()));
        Ok(())
    } else {
        crate::behaviors::reply_unknown(rt, fx, &req)
    }
}
