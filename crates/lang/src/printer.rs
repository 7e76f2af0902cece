//! Value printer
//!
//! The inverse of the reader wherever a reading exists. Values with no
//! textual syntax (combiners, environments, anonymous actors) print as
//! unreadable `#[...]` forms, so output is always printable even when it
//! cannot round-trip.

use vau_runtime::{Decoded, Proc, Runtime, Value};

/// Render `v` into `out`.
pub fn write_value<W: std::fmt::Write>(
    rt: &Runtime,
    v: Value,
    out: &mut W,
) -> std::fmt::Result {
    match v.decode() {
        Decoded::Int(n) => write!(out, "{n}"),
        Decoded::Symbol(h) => match rt.symbols().name(h) {
            Some(name) => out.write_str(name),
            None => write!(out, "#[symbol {h}]"),
        },
        Decoded::Pair(_) => write_list(rt, v, out),
        Decoded::Actor(idx) => write_actor(rt, v, idx, out),
    }
}

/// Render `v` to a fresh string.
pub fn print(rt: &Runtime, v: Value) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_value(rt, v, &mut out);
    out
}

fn write_list<W: std::fmt::Write>(rt: &Runtime, v: Value, out: &mut W) -> std::fmt::Result {
    out.write_char('(')?;
    let mut cursor = v;
    let mut first = true;
    loop {
        if !first {
            out.write_char(' ')?;
        }
        write_value(rt, rt.car(cursor), out)?;
        first = false;
        let tail = rt.cdr(cursor);
        if tail.is_nil() {
            break;
        }
        if !tail.is_pair() {
            out.write_str(" . ")?;
            write_value(rt, tail, out)?;
            break;
        }
        cursor = tail;
    }
    out.write_char(')')
}

fn write_actor<W: std::fmt::Write>(
    rt: &Runtime,
    v: Value,
    idx: usize,
    out: &mut W,
) -> std::fmt::Result {
    // Singletons first; they have readable syntax.
    let name = match v {
        Value::NIL => Some("()"),
        Value::TRUE => Some("#t"),
        Value::FALSE => Some("#f"),
        Value::INERT => Some("#inert"),
        Value::IGNORE => Some("#ignore"),
        Value::UNIT => Some("#unit"),
        Value::UNDEF => Some("#undef"),
        Value::FAIL => Some("#fail"),
        Value::SINK => Some("#sink"),
        Value::EMPTY_ENV => Some("#[environment]"),
        _ => None,
    };
    if let Some(name) = name {
        return out.write_str(name);
    }
    match rt.proc_of(v) {
        Some(Proc::Applicative) => out.write_str("#[applicative]"),
        Some(p) if p.is_operative() => out.write_str("#[operative]"),
        Some(p) if p.is_environment() => out.write_str("#[environment]"),
        _ => write!(out, "#[actor {idx}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read;
    use vau_runtime::RuntimeConfig;

    fn rt() -> Runtime {
        Runtime::boot(RuntimeConfig::default()).unwrap()
    }

    fn roundtrip(rt: &mut Runtime, source: &str) -> String {
        let v = read(rt, source).unwrap().unwrap();
        print(rt, v)
    }

    #[test]
    fn test_canonical_forms_roundtrip() {
        let mut rt = rt();
        for source in [
            "42",
            "-7",
            "()",
            "#t",
            "#f",
            "#inert",
            "#ignore",
            "#unit",
            "#undef",
            "hello",
            "(1 2 3)",
            "(1 2 . 3)",
            "(a (b c) . d)",
            "($define! x 7)",
        ] {
            assert_eq!(roundtrip(&mut rt, source), source);
        }
    }

    #[test]
    fn test_quote_sugar_prints_expanded() {
        let mut rt = rt();
        assert_eq!(roundtrip(&mut rt, "'x"), "(quote x)");
    }

    #[test]
    fn test_combiners_print_unreadably() {
        let mut rt = rt();
        let ground = rt.ground_env();
        let car_sym = rt.intern("car").unwrap();
        let v = rt.eval_sync(car_sym, ground).unwrap();
        assert_eq!(print(&rt, v), "#[applicative]");

        let if_sym = rt.intern("$if").unwrap();
        let v = rt.eval_sync(if_sym, ground).unwrap();
        assert_eq!(print(&rt, v), "#[operative]");
    }

    #[test]
    fn test_environments_print_unreadably() {
        let mut rt = rt();
        let ground = rt.ground_env();
        assert_eq!(print(&rt, ground), "#[environment]");
    }

    #[test]
    fn test_error_replies_print_as_lists() {
        let mut rt = rt();
        let ground = rt.ground_env();
        let missing = rt.intern("no-such").unwrap();
        let v = rt.eval_sync(missing, ground).unwrap();
        assert_eq!(print(&rt, v), "(#fail undefined no-such)");
    }
}
