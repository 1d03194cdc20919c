//! Environment constructors and predicates.

use std::rc::Rc;

use crate::cont::{Continuation, Handler};
use crate::env::Environment;
use crate::error::Condition;
use crate::eval::{args1, args2, Step};
use crate::value::Value;

use super::define_primitive;

pub fn register(env: &Rc<Environment>) {
    define_primitive(env, "make-environment", 1, make_environment);
    define_primitive(env, "environment?", 1, is_environment);
    define_primitive(env, "$binds?", 0, binds);
}

/// `(make-environment E?)` creates a fresh frame whose parent is the
/// given environment, or the root when omitted.
fn make_environment(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (make-environment [ENVIRONMENT])";
    let environment = match operand {
        Value::Nil => Environment::new(),
        _ => match args1(operand, ERR)? {
            Value::Environment(parent_env) => Environment::with_parent(&parent_env),
            other => return Err(Condition::with(ERR, vec![other])),
        },
    };
    Ok(Step::ret(Value::Environment(environment), parent.clone()))
}

fn is_environment(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (environment? ANY)")?;
    Ok(Step::ret(
        Value::Boolean(matches!(value, Value::Environment(_))),
        parent.clone(),
    ))
}

/// `($binds? E name)` evaluates E and reports whether the symbol is
/// bound there or in any ancestor.
fn binds(env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected ($binds? ENV SYMBOL)";
    let (env_expr, name) = args2(operand, ERR)?;
    let Value::Symbol(name) = name else {
        return Err(Condition::with(ERR, vec![name]));
    };
    let frame = Continuation::with_info(Handler::Binds { name }, parent, env_expr.clone());
    Ok(Step::eval(env_expr, env.clone(), frame))
}
