//! Pair construction, access, mutation, structural copying, and the
//! `eq?` equivalence predicate.

use std::rc::Rc;

use crate::cont::Continuation;
use crate::env::Environment;
use crate::error::Condition;
use crate::eval::{args1, args2, Step};
use crate::value::{copy_structure, values_eq, Value};

use super::define_primitive;

pub fn register(env: &Rc<Environment>) {
    define_primitive(env, "cons", 1, cons);
    define_primitive(env, "car", 1, car);
    define_primitive(env, "cdr", 1, cdr);
    define_primitive(env, "set-car!", 1, set_car);
    define_primitive(env, "set-cdr!", 1, set_cdr);
    define_primitive(env, "copy-es", 1, copy_es);
    define_primitive(env, "copy-es-immutable", 1, copy_es_immutable);
    define_primitive(env, "pair?", 1, is_pair);
    define_primitive(env, "eq?", 1, eq);
}

fn cons(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let (a, b) = args2(operand, "expected (cons ANY ANY)")?;
    Ok(Step::ret(Value::cons(a, b), parent.clone()))
}

fn car(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (car PAIR)";
    match args1(operand, ERR)? {
        Value::Pair(pair) => Ok(Step::ret(pair.car(), parent.clone())),
        other => Err(Condition::with(ERR, vec![other])),
    }
}

fn cdr(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (cdr PAIR)";
    match args1(operand, ERR)? {
        Value::Pair(pair) => Ok(Step::ret(pair.cdr(), parent.clone())),
        other => Err(Condition::with(ERR, vec![other])),
    }
}

fn set_car(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (set-car! PAIR ANY)";
    let (target, value) = args2(operand, ERR)?;
    let Value::Pair(pair) = target else {
        return Err(Condition::with(ERR, vec![target]));
    };
    if pair.is_immutable() {
        return Err(Condition::with(
            "pair must be mutable",
            vec![Value::Pair(pair)],
        ));
    }
    pair.replace_car(value);
    Ok(Step::ret(Value::Inert, parent.clone()))
}

fn set_cdr(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (set-cdr! PAIR ANY)";
    let (target, value) = args2(operand, ERR)?;
    let Value::Pair(pair) = target else {
        return Err(Condition::with(ERR, vec![target]));
    };
    if pair.is_immutable() {
        return Err(Condition::with(
            "pair must be mutable",
            vec![Value::Pair(pair)],
        ));
    }
    pair.replace_cdr(value);
    Ok(Step::ret(Value::Inert, parent.clone()))
}

fn copy_es(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (copy-es ANY)")?;
    Ok(Step::ret(copy_structure(&value, false), parent.clone()))
}

fn copy_es_immutable(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (copy-es-immutable ANY)")?;
    Ok(Step::ret(copy_structure(&value, true), parent.clone()))
}

fn is_pair(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (pair? ANY)")?;
    Ok(Step::ret(
        Value::Boolean(matches!(value, Value::Pair(_))),
        parent.clone(),
    ))
}

fn eq(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let (a, b) = args2(operand, "expected (eq? ANY ANY)")?;
    Ok(Step::ret(Value::Boolean(values_eq(&a, &b)), parent.clone()))
}
