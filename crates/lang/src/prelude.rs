//! Derived bindings bootstrapped from source
//!
//! The ground environment holds only what the runtime implements
//! natively. The forms here are definable in the language itself, so
//! they are: the host evaluates this source into the session scope at
//! startup. Everything below must reduce to ground bindings only.

use crate::reader::{ReadError, read_all};
use vau_runtime::{Runtime, Value};

/// Library forms derived from the ground environment.
pub const PRELUDE: &str = "\
($define! get-current-env (wrap ($vau () e e)))
($define! apply
  ($lambda (appv arg)
    (eval (cons (unwrap appv) arg) (make-env))))
($define! first ($lambda (x) (car x)))
($define! second ($lambda (x) (car (cdr x))))
($define! $when
  ($vau (test . body) e
    ($if (eval test e)
         (eval (cons $sequence body) e)
         #inert)))
($define! $unless
  ($vau (test . body) e
    ($if (eval test e)
         #inert
         (eval (cons $sequence body) e))))
($define! not? ($lambda (b) ($if b #f #t)))
";

/// Evaluate the prelude into `scope`.
pub fn install(rt: &mut Runtime, scope: Value) -> Result<(), ReadError> {
    let exprs = read_all(rt, PRELUDE)?;
    for &expr in &exprs {
        rt.protect(expr);
    }
    let mut outcome = Ok(());
    for &expr in &exprs {
        match rt.eval_sync(expr, scope) {
            Ok(_) => {}
            Err(fault) => {
                outcome = Err(ReadError::Runtime(fault));
                break;
            }
        }
    }
    for &expr in &exprs {
        rt.unprotect(expr);
    }
    outcome
}
