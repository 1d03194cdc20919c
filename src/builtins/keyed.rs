//! Encapsulation types and keyed dynamic/static variables. Each
//! constructor mints a fresh token; the returned combiners are the
//! only values that can see through it.

use std::rc::Rc;

use crate::cont::Continuation;
use crate::env::Environment;
use crate::error::Condition;
use crate::eval::Step;
use crate::value::{Combiner, Operative, Token, Value};

use super::define_primitive;

pub fn register(env: &Rc<Environment>) {
    define_primitive(env, "make-encapsulation-type", 1, make_encapsulation_type);
    define_primitive(env, "make-keyed-dynamic-variable", 1, make_keyed_dynamic_variable);
    define_primitive(env, "make-keyed-static-variable", 1, make_keyed_static_variable);
}

fn applicative(operative: Operative) -> Value {
    Value::Combiner(Combiner::new(1, Rc::new(operative)))
}

/// Returns `(wrapper predicate unwrapper)` sharing a fresh token.
fn make_encapsulation_type(_env: &Rc<Environment>, _operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let token = Token::new();
    let result = Value::list(vec![
        applicative(Operative::Encapsulate {
            token: token.clone(),
        }),
        applicative(Operative::EncapsulationPredicate {
            token: token.clone(),
        }),
        applicative(Operative::Decapsulate { token }),
    ]);
    Ok(Step::ret(result, parent.clone()))
}

/// Returns `(binder accessor)`. The binder records token-to-value on a
/// fresh continuation frame and calls its combiner argument under it;
/// the accessor walks the continuation chain for the nearest binding.
fn make_keyed_dynamic_variable(_env: &Rc<Environment>, _operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let key = Token::new();
    let result = Value::list(vec![
        applicative(Operative::DynamicBinder { key: key.clone() }),
        applicative(Operative::DynamicAccessor { key }),
    ]);
    Ok(Step::ret(result, parent.clone()))
}

/// Returns `(binder accessor)` over environment frames; the accessor
/// consults its caller's dynamic environment chain.
fn make_keyed_static_variable(_env: &Rc<Environment>, _operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let key = Token::new();
    let result = Value::list(vec![
        applicative(Operative::StaticBinder { key: key.clone() }),
        applicative(Operative::StaticAccessor { key }),
    ]);
    Ok(Step::ret(result, parent.clone()))
}
