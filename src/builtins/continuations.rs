//! First-class continuation surface: reification, applicative
//! conversion, extension, and guarding.

use std::rc::Rc;

use crate::cont::{Continuation, Guard, Handler};
use crate::env::Environment;
use crate::error::Condition;
use crate::eval::{args1, args2, invoke_operative, Step};
use crate::value::{Combiner, Operative, Value};

use super::define_primitive;

pub fn register(env: &Rc<Environment>) {
    define_primitive(env, "continuation?", 1, is_continuation);
    define_primitive(env, "continuation->applicative", 1, continuation_to_applicative);
    define_primitive(env, "call/cc", 1, call_cc);
    define_primitive(env, "extend-continuation", 1, extend_continuation);
    define_primitive(env, "guard-continuation", 1, guard_continuation);
}

fn is_continuation(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (continuation? ANY)")?;
    Ok(Step::ret(
        Value::Boolean(matches!(value, Value::Continuation(_))),
        parent.clone(),
    ))
}

/// Turns a continuation into a one-wrap applicative that abnormally
/// passes its argument to the continuation when called.
fn continuation_to_applicative(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "continuation must be a continuation")?;
    let Value::Continuation(target) = value else {
        return Err(Condition::with(
            "continuation must be a continuation",
            vec![value],
        ));
    };
    Ok(Step::ret(
        Value::Combiner(Combiner::new(1, Rc::new(Operative::AbnormalPass { target }))),
        parent.clone(),
    ))
}

/// `(call/cc c)` reifies the current continuation k and invokes c's
/// underlying operative with the one-element operand `(k)`.
fn call_cc(env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (call/cc COMBINER)";
    let Value::Combiner(combiner) = args1(operand, ERR)? else {
        return Err(Condition::with(ERR, vec![operand.clone()]));
    };
    let reified = Value::Continuation(parent.clone());
    invoke_operative(
        &combiner.operative,
        env,
        Value::list(vec![reified]),
        parent,
    )
}

/// `(extend-continuation k a E?)` makes a child of k that invokes a's
/// underlying operative under E (default: fresh child of the root)
/// with the incoming value as operand, returning to k.
fn extend_continuation(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (extend-continuation CONTINUATION APPLICATIVE [ENVIRONMENT])";
    let (continuation, applicative, environment) = match args2(operand, ERR) {
        Ok((continuation, applicative)) => (continuation, applicative, Environment::new()),
        Err(_) => {
            let (continuation, applicative, environment) =
                crate::eval::args3(operand, ERR)?;
            let Value::Environment(environment) = environment else {
                return Err(Condition::with(ERR, vec![environment]));
            };
            (continuation, applicative, environment)
        }
    };
    let Value::Continuation(continuation) = continuation else {
        return Err(Condition::with(
            "continuation must be a continuation",
            vec![continuation],
        ));
    };
    let Value::Combiner(applicative) = applicative else {
        return Err(Condition::with(ERR, vec![applicative]));
    };
    if applicative.num_wraps != 1 {
        return Err(Condition::new("applicative unwrapped must be an operative"));
    }
    let extended = Continuation::new(
        Handler::Invoke {
            env: environment,
            operative: applicative.operative.clone(),
        },
        &continuation,
    );
    Ok(Step::ret(Value::Continuation(extended), parent.clone()))
}

/// `(guard-continuation entry k exit)` wraps k in an outer frame
/// carrying the entry guards and an inner frame carrying the exit
/// guards, returning the inner continuation.
fn guard_continuation(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (guard-continuation ENTRY-GUARDS CONTINUATION EXIT-GUARDS)";
    let (entry, continuation, exit) = crate::eval::args3(operand, ERR)?;
    let Value::Continuation(continuation) = continuation else {
        return Err(Condition::with(
            "continuation must be a continuation",
            vec![continuation],
        ));
    };
    let entry_guards = collect_guards(&entry)?;
    let exit_guards = collect_guards(&exit)?;
    let outer = Continuation::with_guards(
        Handler::Passthrough,
        &continuation,
        entry_guards,
        Vec::new(),
    );
    let inner = Continuation::with_guards(Handler::Passthrough, &outer, Vec::new(), exit_guards);
    Ok(Step::ret(Value::Continuation(inner), parent.clone()))
}

/// A guard list is a proper list of `(selector interceptor)` pairs,
/// where the selector is a continuation and the interceptor is a
/// one-wrap applicative.
fn collect_guards(list: &Value) -> Result<Vec<Guard>, Condition> {
    let mut guards = Vec::new();
    let mut cursor = list.clone();
    loop {
        match cursor {
            Value::Nil => return Ok(guards),
            Value::Pair(pair) => {
                let (selector, interceptor) =
                    args2(&pair.car(), "expected (SELECTOR INTERCEPTOR) guard")?;
                let Value::Continuation(selector) = selector else {
                    return Err(Condition::with(
                        "selector must be a continuation",
                        vec![selector],
                    ));
                };
                let Value::Combiner(interceptor) = interceptor else {
                    return Err(Condition::with(
                        "interceptor must be an applicative",
                        vec![interceptor],
                    ));
                };
                if interceptor.num_wraps != 1 {
                    return Err(Condition::new(
                        "interceptor unwrapped must be an operative",
                    ));
                }
                guards.push(Guard {
                    selector,
                    interceptor,
                });
                cursor = pair.cdr();
            }
            other => {
                return Err(Condition::with(
                    "guard list must be a proper list",
                    vec![other],
                ))
            }
        }
    }
}
