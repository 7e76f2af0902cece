//! The ground environment and its primitives
//!
//! Every name the evaluator knows at boot is an ordinary binding in one
//! scope over the empty-environment sentinel. Primitives are constructed
//! exactly like user combiners: an operative actor, wrapped in an
//! applicative actor where the binding calls for argument evaluation. The
//! type predicates and arithmetic therefore need no special cases in
//! `applicative?` or `operative?`.
//!
//! The families (`PrimPred`, `PrimArith`, `PrimBits`) share one behavior
//! each, with the actor's data field selecting the operation, so the
//! procedure table stays small while every binding keeps its own actor
//! identity.
//!
//! Integer arithmetic wraps at the tagged word's 62 bits. Shift counts
//! at or beyond the width shift everything out (or fill with the sign,
//! for the arithmetic right shift); negative counts are type errors.

use crate::behaviors::{bool_value, first, parse_request, reply_unknown};
use crate::effect::Effect;
use crate::env::scope_with_bindings;
use crate::error::Fault;
use crate::proc::Proc;
use crate::runtime::Runtime;
use tracing::trace;
use vau_core::Value;

/// Operations sharing the `PrimArith` behavior, selected by actor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ArithOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    NumEq = 3,
    Lt = 4,
    Le = 5,
    Gt = 6,
    Ge = 7,
}

impl ArithOp {
    fn from_id(id: i64) -> Option<ArithOp> {
        use ArithOp::*;
        Some(match id {
            0 => Add,
            1 => Sub,
            2 => Mul,
            3 => NumEq,
            4 => Lt,
            5 => Le,
            6 => Gt,
            7 => Ge,
            _ => return None,
        })
    }
}

/// Operations sharing the `PrimBits` behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum BitsOp {
    And = 0,
    Or = 1,
    Xor = 2,
    Not = 3,
    Lsl = 4,
    Lsr = 5,
    Asr = 6,
}

impl BitsOp {
    fn from_id(id: i64) -> Option<BitsOp> {
        use BitsOp::*;
        Some(match id {
            0 => And,
            1 => Or,
            2 => Xor,
            3 => Not,
            4 => Lsl,
            5 => Lsr,
            6 => Asr,
            _ => return None,
        })
    }
}

/// Operations sharing the `PrimPred` behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum PredOp {
    Boolean = 0,
    Symbol = 1,
    Pair = 2,
    Null = 3,
    Number = 4,
    Environment = 5,
    Applicative = 6,
    Operative = 7,
    Combiner = 8,
    Inert = 9,
    Ignore = 10,
    Eq = 11,
    Equal = 12,
}

impl PredOp {
    fn from_id(id: i64) -> Option<PredOp> {
        use PredOp::*;
        Some(match id {
            0 => Boolean,
            1 => Symbol,
            2 => Pair,
            3 => Null,
            4 => Number,
            5 => Environment,
            6 => Applicative,
            7 => Operative,
            8 => Combiner,
            9 => Inert,
            10 => Ignore,
            11 => Eq,
            12 => Equal,
            _ => return None,
        })
    }
}

/// Width of the integer payload, for the shift primitives.
const INT_BITS: u32 = 62;
const INT_MASK: u64 = (1 << INT_BITS) - 1;

/// Collect a proper list of integers; `Err` carries the first non-integer.
fn int_args(rt: &Runtime, mut v: Value) -> Result<Vec<i64>, Value> {
    let mut out = Vec::new();
    while v.is_pair() {
        let item = rt.heap.car(v);
        match item.as_int() {
            Some(n) => out.push(n),
            None => return Err(item),
        }
        v = rt.heap.cdr(v);
    }
    Ok(out)
}

/// Collect the elements of a proper list.
fn list_args(rt: &Runtime, mut v: Value) -> Vec<Value> {
    let mut out = Vec::new();
    while v.is_pair() {
        out.push(rt.heap.car(v));
        v = rt.heap.cdr(v);
    }
    out
}

/// Structural equality: identity everywhere except pairs, which compare
/// field-wise.
fn equal_values(rt: &Runtime, a: Value, b: Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_pair() && b.is_pair() {
        return equal_values(rt, rt.heap.car(a), rt.heap.car(b))
            && equal_values(rt, rt.heap.cdr(a), rt.heap.cdr(b));
    }
    false
}

/// Shared entry for the wrapped primitives: parse `(cust apply args env)`
/// and hand the evaluated argument list to `f`.
fn prim(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
    type_id: Proc,
    f: impl FnOnce(&mut Runtime, &mut Effect, Value, Value) -> Result<(), Fault>,
) -> Result<(), Fault> {
    let wk = rt.wk;
    let Some(req) = parse_request(rt, msg) else {
        trace!("dropped malformed message to primitive");
        return Ok(());
    };
    if req.selector == wk.eval {
        fx.reply(req.cust, self_);
        Ok(())
    } else if req.selector == wk.apply {
        let Some(args) = first(rt, req.rest) else {
            return fx.reply_error(rt, req.cust, wk.arity, req.selector);
        };
        f(rt, fx, req.cust, args)
    } else if req.selector == wk.typeq {
        fx.reply(
            req.cust,
            bool_value(first(rt, req.rest) == Some(type_id.code())),
        );
        Ok(())
    } else {
        reply_unknown(rt, fx, &req)
    }
}

pub(crate) fn prim_wrap_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimWrap, |rt, fx, cust, args| {
        let wk = rt.wk;
        let Some(comb) = first(rt, args) else {
            return fx.reply_error(rt, cust, wk.arity, args);
        };
        if !rt.proc_of(comb).is_some_and(Proc::is_combiner) {
            return fx.reply_error(rt, cust, wk.wrong_type, comb);
        }
        let app = fx.actor(rt, Proc::Applicative, comb)?;
        fx.reply(cust, app);
        Ok(())
    })
}

pub(crate) fn prim_unwrap_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimUnwrap, |rt, fx, cust, args| {
        let wk = rt.wk;
        let Some(app) = first(rt, args) else {
            return fx.reply_error(rt, cust, wk.arity, args);
        };
        if rt.proc_of(app) != Some(Proc::Applicative) {
            return fx.reply_error(rt, cust, wk.wrong_type, app);
        }
        // Ask the applicative itself; it owns its underside.
        fx.send_req(rt, app, &[cust, wk.unwrap])
    })
}

pub(crate) fn prim_cons_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimCons, |rt, fx, cust, args| {
        let wk = rt.wk;
        let items = list_args(rt, args);
        if items.len() != 2 {
            return fx.reply_error(rt, cust, wk.arity, args);
        }
        let pair = fx.cons(rt, items[0], items[1])?;
        fx.reply(cust, pair);
        Ok(())
    })
}

pub(crate) fn prim_car_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimCar, |rt, fx, cust, args| {
        let wk = rt.wk;
        let Some(p) = first(rt, args) else {
            return fx.reply_error(rt, cust, wk.arity, args);
        };
        if !p.is_pair() {
            return fx.reply_error(rt, cust, wk.wrong_type, p);
        }
        let head = rt.heap.car(p);
        fx.reply(cust, head);
        Ok(())
    })
}

pub(crate) fn prim_cdr_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimCdr, |rt, fx, cust, args| {
        let wk = rt.wk;
        let Some(p) = first(rt, args) else {
            return fx.reply_error(rt, cust, wk.arity, args);
        };
        if !p.is_pair() {
            return fx.reply_error(rt, cust, wk.wrong_type, p);
        }
        let tail = rt.heap.cdr(p);
        fx.reply(cust, tail);
        Ok(())
    })
}

pub(crate) fn prim_list_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimList, |_rt, fx, cust, args| {
        // The evaluated argument list already is the answer.
        fx.reply(cust, args);
        Ok(())
    })
}

pub(crate) fn prim_eval_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimEval, |rt, fx, cust, args| {
        let wk = rt.wk;
        let items = list_args(rt, args);
        if items.len() != 2 {
            return fx.reply_error(rt, cust, wk.arity, args);
        }
        if !rt.proc_of(items[1]).is_some_and(Proc::is_environment) {
            return fx.reply_error(rt, cust, wk.wrong_type, items[1]);
        }
        fx.send_req(rt, items[0], &[cust, wk.eval, items[1]])
    })
}

pub(crate) fn prim_make_env_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    prim(rt, self_, msg, fx, Proc::PrimMakeEnv, |rt, fx, cust, args| {
        let wk = rt.wk;
        let items = list_args(rt, args);
        let parent = match items.as_slice() {
            [] => Value::EMPTY_ENV,
            [p] => {
                if !rt.proc_of(*p).is_some_and(Proc::is_environment) {
                    return fx.reply_error(rt, cust, wk.wrong_type, *p);
                }
                *p
            }
            _ => return fx.reply_error(rt, cust, wk.arity, args),
        };
        let scope = crate::env::make_scope(rt, fx, parent)?;
        fx.reply(cust, scope);
        Ok(())
    })
}

pub(crate) fn prim_pred_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let op = rt
        .heap
        .data(self_)
        .as_int()
        .and_then(PredOp::from_id)
        .ok_or(Fault::HeapCorrupt("predicate actor without an operation"))?;
    prim(rt, self_, msg, fx, Proc::PrimPred, |rt, fx, cust, args| {
        let wk = rt.wk;
        let items = list_args(rt, args);
        let answer = match op {
            PredOp::Eq => items.windows(2).all(|w| w[0] == w[1]),
            PredOp::Equal => items.windows(2).all(|w| equal_values(rt, w[0], w[1])),
            _ => {
                if items.is_empty() {
                    return fx.reply_error(rt, cust, wk.arity, args);
                }
                items.iter().all(|&v| type_check(rt, op, v))
            }
        };
        fx.reply(cust, bool_value(answer));
        Ok(())
    })
}

fn type_check(rt: &Runtime, op: PredOp, v: Value) -> bool {
    match op {
        PredOp::Boolean => v == Value::TRUE || v == Value::FALSE,
        PredOp::Symbol => v.is_symbol(),
        PredOp::Pair => v.is_pair(),
        PredOp::Null => v.is_nil(),
        PredOp::Number => v.is_int(),
        PredOp::Environment => rt.proc_of(v).is_some_and(Proc::is_environment),
        PredOp::Applicative => rt.proc_of(v) == Some(Proc::Applicative),
        PredOp::Operative => rt.proc_of(v).is_some_and(Proc::is_operative),
        PredOp::Combiner => rt.proc_of(v).is_some_and(Proc::is_combiner),
        PredOp::Inert => v == Value::INERT,
        PredOp::Ignore => v == Value::IGNORE,
        PredOp::Eq | PredOp::Equal => false,
    }
}

pub(crate) fn prim_arith_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let op = rt
        .heap
        .data(self_)
        .as_int()
        .and_then(ArithOp::from_id)
        .ok_or(Fault::HeapCorrupt("arithmetic actor without an operation"))?;
    prim(rt, self_, msg, fx, Proc::PrimArith, |rt, fx, cust, args| {
        let wk = rt.wk;
        let ns = match int_args(rt, args) {
            Ok(ns) => ns,
            Err(bad) => return fx.reply_error(rt, cust, wk.wrong_type, bad),
        };
        let answer = match op {
            ArithOp::Add => Value::from_int(ns.iter().fold(0i64, |a, &b| a.wrapping_add(b))),
            ArithOp::Mul => Value::from_int(ns.iter().fold(1i64, |a, &b| a.wrapping_mul(b))),
            ArithOp::Sub => match ns.as_slice() {
                [] => return fx.reply_error(rt, cust, wk.arity, args),
                [n] => Value::from_int(n.wrapping_neg()),
                [head, rest @ ..] => {
                    Value::from_int(rest.iter().fold(*head, |a, &b| a.wrapping_sub(b)))
                }
            },
            ArithOp::NumEq => bool_value(ns.windows(2).all(|w| w[0] == w[1])),
            ArithOp::Lt => bool_value(ns.windows(2).all(|w| w[0] < w[1])),
            ArithOp::Le => bool_value(ns.windows(2).all(|w| w[0] <= w[1])),
            ArithOp::Gt => bool_value(ns.windows(2).all(|w| w[0] > w[1])),
            ArithOp::Ge => bool_value(ns.windows(2).all(|w| w[0] >= w[1])),
        };
        fx.reply(cust, answer);
        Ok(())
    })
}

pub(crate) fn prim_bits_beh(
    rt: &mut Runtime,
    self_: Value,
    msg: Value,
    fx: &mut Effect,
) -> Result<(), Fault> {
    let op = rt
        .heap
        .data(self_)
        .as_int()
        .and_then(BitsOp::from_id)
        .ok_or(Fault::HeapCorrupt("bitwise actor without an operation"))?;
    prim(rt, self_, msg, fx, Proc::PrimBits, |rt, fx, cust, args| {
        let wk = rt.wk;
        let ns = match int_args(rt, args) {
            Ok(ns) => ns,
            Err(bad) => return fx.reply_error(rt, cust, wk.wrong_type, bad),
        };
        let answer = match op {
            BitsOp::And => Value::from_int(ns.iter().fold(-1i64, |a, &b| a & b)),
            BitsOp::Or => Value::from_int(ns.iter().fold(0i64, |a, &b| a | b)),
            BitsOp::Xor => Value::from_int(ns.iter().fold(0i64, |a, &b| a ^ b)),
            BitsOp::Not => match ns.as_slice() {
                [n] => Value::from_int(!n),
                _ => return fx.reply_error(rt, cust, wk.arity, args),
            },
            BitsOp::Lsl | BitsOp::Lsr | BitsOp::Asr => {
                let [n, count] = ns.as_slice() else {
                    return fx.reply_error(rt, cust, wk.arity, args);
                };
                if *count < 0 {
                    return fx.reply_error(rt, cust, wk.wrong_type, Value::from_int(*count));
                }
                let k = (*count).min(INT_BITS as i64) as u32;
                let shifted = match op {
                    BitsOp::Lsl => {
                        if k >= INT_BITS {
                            0
                        } else {
                            (*n as u64) << k
                        }
                    }
                    BitsOp::Lsr => {
                        if k >= INT_BITS {
                            0
                        } else {
                            ((*n as u64) & INT_MASK) >> k
                        }
                    }
                    _ => (*n >> k.min(INT_BITS - 1)) as u64,
                };
                Value::from_int(shifted as i64)
            }
        };
        fx.reply(cust, answer);
        Ok(())
    })
}

/// Build the ground environment: one scope over the sentinel holding
/// every initial binding.
pub(crate) fn make_ground_env(rt: &mut Runtime) -> Result<Value, Fault> {
    // Boot-time construction: the effect is only an allocation logger
    // here, dropped on success since there is nothing to send or become.
    let mut fx = Effect::new();

    let mut bindings: Vec<(Value, Value)> = Vec::new();

    // Operatives bind bare.
    for (name, proc) in [
        ("$if", Proc::OpIf),
        ("$define!", Proc::OpDefine),
        ("$vau", Proc::OpVau),
        ("$lambda", Proc::OpLambda),
        ("$sequence", Proc::OpSequence),
        ("quote", Proc::OpQuote),
    ] {
        let sym = rt.intern(name)?;
        let op = fx.actor(rt, proc, Value::UNDEF)?;
        bindings.push((sym, op));
    }

    // Applicatives bind wrapped.
    let wrapped = |rt: &mut Runtime,
                       fx: &mut Effect,
                       name: &str,
                       proc: Proc,
                       data: Value|
     -> Result<(Value, Value), Fault> {
        let sym = rt.intern(name)?;
        let op = fx.actor(rt, proc, data)?;
        let app = fx.actor(rt, Proc::Applicative, op)?;
        Ok((sym, app))
    };

    for (name, proc) in [
        ("wrap", Proc::PrimWrap),
        ("unwrap", Proc::PrimUnwrap),
        ("cons", Proc::PrimCons),
        ("car", Proc::PrimCar),
        ("cdr", Proc::PrimCdr),
        ("list", Proc::PrimList),
        ("eval", Proc::PrimEval),
        ("make-env", Proc::PrimMakeEnv),
    ] {
        bindings.push(wrapped(rt, &mut fx, name, proc, Value::UNDEF)?);
    }

    for (name, op) in [
        ("boolean?", PredOp::Boolean),
        ("symbol?", PredOp::Symbol),
        ("pair?", PredOp::Pair),
        ("null?", PredOp::Null),
        ("number?", PredOp::Number),
        ("environment?", PredOp::Environment),
        ("applicative?", PredOp::Applicative),
        ("operative?", PredOp::Operative),
        ("combiner?", PredOp::Combiner),
        ("inert?", PredOp::Inert),
        ("ignore?", PredOp::Ignore),
        ("eq?", PredOp::Eq),
        ("equal?", PredOp::Equal),
    ] {
        bindings.push(wrapped(
            rt,
            &mut fx,
            name,
            Proc::PrimPred,
            Value::from_int(op as i64),
        )?);
    }

    for (name, op) in [
        ("+", ArithOp::Add),
        ("-", ArithOp::Sub),
        ("*", ArithOp::Mul),
        ("=?", ArithOp::NumEq),
        ("<?", ArithOp::Lt),
        ("<=?", ArithOp::Le),
        (">?", ArithOp::Gt),
        (">=?", ArithOp::Ge),
    ] {
        bindings.push(wrapped(
            rt,
            &mut fx,
            name,
            Proc::PrimArith,
            Value::from_int(op as i64),
        )?);
    }

    for (name, op) in [
        ("bit-and", BitsOp::And),
        ("bit-or", BitsOp::Or),
        ("bit-xor", BitsOp::Xor),
        ("bit-not", BitsOp::Not),
        ("bit-lsl", BitsOp::Lsl),
        ("bit-lsr", BitsOp::Lsr),
        ("bit-asr", BitsOp::Asr),
    ] {
        bindings.push(wrapped(
            rt,
            &mut fx,
            name,
            Proc::PrimBits,
            Value::from_int(op as i64),
        )?);
    }

    scope_with_bindings(rt, &mut fx, Value::EMPTY_ENV, &bindings)
}
