//! Arithmetic over integers and reals. Integer results stay integers;
//! mixed operands promote to real, and integer overflow is an error
//! rather than a silent wrap.

use std::rc::Rc;

use crate::cont::Continuation;
use crate::env::Environment;
use crate::error::Condition;
use crate::eval::{args1, args2, Step};
use crate::value::Value;

use super::define_primitive;

pub fn register(env: &Rc<Environment>) {
    define_primitive(env, "+", 1, add);
    define_primitive(env, "-", 1, subtract);
    define_primitive(env, "*", 1, multiply);
    define_primitive(env, "<=?", 1, less_equal);
    define_primitive(env, "number?", 1, is_number);
}

fn add(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (+ NUMBER NUMBER)";
    let (a, b) = args2(operand, ERR)?;
    let result = match (a, b) {
        (Value::Int(a), Value::Int(b)) => Value::Int(
            a.checked_add(b)
                .ok_or(Condition::new("integer overflow"))?,
        ),
        (Value::Int(a), Value::Real(b)) => Value::Real(a as f64 + b),
        (Value::Real(a), Value::Int(b)) => Value::Real(a + b as f64),
        (Value::Real(a), Value::Real(b)) => Value::Real(a + b),
        _ => return Err(Condition::with(ERR, vec![operand.clone()])),
    };
    Ok(Step::ret(result, parent.clone()))
}

fn subtract(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (- NUMBER NUMBER)";
    let (a, b) = args2(operand, ERR)?;
    let result = match (a, b) {
        (Value::Int(a), Value::Int(b)) => Value::Int(
            a.checked_sub(b)
                .ok_or(Condition::new("integer overflow"))?,
        ),
        (Value::Int(a), Value::Real(b)) => Value::Real(a as f64 - b),
        (Value::Real(a), Value::Int(b)) => Value::Real(a - b as f64),
        (Value::Real(a), Value::Real(b)) => Value::Real(a - b),
        _ => return Err(Condition::with(ERR, vec![operand.clone()])),
    };
    Ok(Step::ret(result, parent.clone()))
}

fn multiply(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (* NUMBER NUMBER)";
    let (a, b) = args2(operand, ERR)?;
    let result = match (a, b) {
        (Value::Int(a), Value::Int(b)) => Value::Int(
            a.checked_mul(b)
                .ok_or(Condition::new("integer overflow"))?,
        ),
        (Value::Int(a), Value::Real(b)) => Value::Real(a as f64 * b),
        (Value::Real(a), Value::Int(b)) => Value::Real(a * b as f64),
        (Value::Real(a), Value::Real(b)) => Value::Real(a * b),
        _ => return Err(Condition::with(ERR, vec![operand.clone()])),
    };
    Ok(Step::ret(result, parent.clone()))
}

fn less_equal(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (<=? NUMBER NUMBER)";
    let (a, b) = args2(operand, ERR)?;
    let result = match (a, b) {
        (Value::Int(a), Value::Int(b)) => a <= b,
        (Value::Int(a), Value::Real(b)) => a as f64 <= b,
        (Value::Real(a), Value::Int(b)) => a <= b as f64,
        (Value::Real(a), Value::Real(b)) => a <= b,
        _ => return Err(Condition::with(ERR, vec![operand.clone()])),
    };
    Ok(Step::ret(Value::Boolean(result), parent.clone()))
}

fn is_number(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (number? ANY)")?;
    let result = matches!(value, Value::Int(_) | Value::Real(_));
    Ok(Step::ret(Value::Boolean(result), parent.clone()))
}
