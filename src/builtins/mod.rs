//! # Primitive Combiners
//!
//! The ground environment of the interpreter, organized into topical
//! sub-modules:
//!
//! - **[numbers]**: `+`, `-`, `*`, `<=?`, `number?`
//! - **[pairs]**: `cons`, `car`, `cdr`, `set-car!`, `set-cdr!`,
//!   `copy-es`, `copy-es-immutable`, `pair?`, `eq?`
//! - **[combiners]**: `$vau`, `wrap`, `unwrap`, `eval`, `$define!`,
//!   `$if`, `load`
//! - **[environments]**: `make-environment`, `environment?`, `$binds?`
//! - **[continuations]**: `continuation?`, `continuation->applicative`,
//!   `call/cc`, `extend-continuation`, `guard-continuation`
//! - **[keyed]**: `make-encapsulation-type`,
//!   `make-keyed-dynamic-variable`, `make-keyed-static-variable`
//! - **[strings]**: `char?`, `string?`, `symbol?`, `read-char`,
//!   `write-char`, `list->string`, `string->list`, `symbol->string`,
//!   `string->symbol`
//!
//! The `root-continuation` and `error-continuation` bindings are added
//! by the interpreter itself, which owns those frames.

use std::rc::Rc;

use crate::env::Environment;
use crate::value::{Combiner, Operative, PrimitiveFn, Value};

pub mod combiners;
pub mod continuations;
pub mod environments;
pub mod keyed;
pub mod numbers;
pub mod pairs;
pub mod strings;

/// Registers every primitive combiner in the given environment.
pub fn register(env: &Rc<Environment>) {
    numbers::register(env);
    pairs::register(env);
    combiners::register(env);
    environments::register(env);
    continuations::register(env);
    keyed::register(env);
    strings::register(env);
}

pub(crate) fn define_primitive(
    env: &Rc<Environment>,
    name: &'static str,
    num_wraps: u32,
    func: PrimitiveFn,
) {
    env.define(
        Rc::from(name),
        Value::Combiner(Combiner::new(
            num_wraps,
            Rc::new(Operative::Primitive { name, func }),
        )),
    );
}
