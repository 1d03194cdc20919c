//! The combiner constructors and core control operatives: `$vau`,
//! `wrap`, `unwrap`, `eval`, `$define!`, `$if`, and `load`.

use std::rc::Rc;

use crate::cont::{Continuation, Handler};
use crate::env::Environment;
use crate::error::Condition;
use crate::eval::{args1, args2, args3, check_parameter_tree, Step};
use crate::reader;
use crate::value::{copy_structure, Combiner, Operative, Value};

use super::define_primitive;

pub fn register(env: &Rc<Environment>) {
    define_primitive(env, "$vau", 0, vau);
    define_primitive(env, "wrap", 1, wrap);
    define_primitive(env, "unwrap", 1, unwrap);
    define_primitive(env, "eval", 1, eval);
    define_primitive(env, "$define!", 0, define);
    define_primitive(env, "$if", 0, if_);
    define_primitive(env, "load", 1, load);
}

/// `($vau (env-param arg-param) body)` in environment E yields an
/// operative with wrap count 0. The env-param must be a symbol or
/// Ignore; the arg-param is a full parameter tree. The body is
/// deep-copied to immutable form.
fn vau(env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected ($vau (PARAM TREE) BODY)";
    let (header, body) = args2(operand, ERR)?;
    let (env_param, operand_param) = args2(&header, ERR)?;
    if !matches!(env_param, Value::Symbol(_) | Value::Ignore) {
        return Err(Condition::with(ERR, vec![env_param]));
    }
    // Checking the pair of both parameters at once also rejects an
    // env-param symbol reappearing inside the tree.
    check_parameter_tree(&Value::cons(env_param.clone(), operand_param.clone()))?;
    let operative = Operative::UserDefined {
        env: env.clone(),
        env_param,
        operand_param,
        body: copy_structure(&body, true),
    };
    Ok(Step::ret(
        Value::Combiner(Combiner::new(0, Rc::new(operative))),
        parent.clone(),
    ))
}

fn wrap(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (wrap COMBINER)";
    match args1(operand, ERR)? {
        Value::Combiner(combiner) => Ok(Step::ret(
            Value::Combiner(Combiner::new(
                combiner.num_wraps + 1,
                combiner.operative.clone(),
            )),
            parent.clone(),
        )),
        other => Err(Condition::with(ERR, vec![other])),
    }
}

fn unwrap(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (unwrap APPLICATIVE)";
    match args1(operand, ERR)? {
        Value::Combiner(combiner) if combiner.num_wraps > 0 => Ok(Step::ret(
            Value::Combiner(Combiner::new(
                combiner.num_wraps - 1,
                combiner.operative.clone(),
            )),
            parent.clone(),
        )),
        other => Err(Condition::with(ERR, vec![other])),
    }
}

/// `(eval E e)` evaluates e in E in tail position: the step replaces
/// the current one without installing a frame.
fn eval(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (eval ENVIRONMENT ANY)";
    let (environment, expr) = args2(operand, ERR)?;
    let Value::Environment(environment) = environment else {
        return Err(Condition::with(ERR, vec![environment]));
    };
    Ok(Step::eval(expr, environment, parent.clone()))
}

/// `($define! P V)` evaluates V, then pattern-binds the result against
/// P in the current environment, yielding Inert.
fn define(env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected ($define! TREE ANY)";
    let (pattern, value_expr) = args2(operand, ERR)?;
    check_parameter_tree(&pattern)?;
    let frame = Continuation::with_info(
        Handler::Define {
            env: env.clone(),
            pattern,
        },
        parent,
        value_expr.clone(),
    );
    Ok(Step::eval(value_expr, env.clone(), frame))
}

fn if_(env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected ($if ANY ANY ANY)";
    let (condition, consequent, alternative) = args3(operand, ERR)?;
    let frame = Continuation::with_info(
        Handler::Branch {
            env: env.clone(),
            consequent,
            alternative,
        },
        parent,
        condition.clone(),
    );
    Ok(Step::eval(condition, env.clone(), frame))
}

/// `(load path)` reads and parses the whole file up front, then
/// evaluates each expression sequentially in the caller's dynamic
/// environment, yielding Inert. The file is closed before any
/// evaluated expression runs.
fn load(env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (load STRING)";
    let Value::Str(path_bytes) = args1(operand, ERR)? else {
        return Err(Condition::with(ERR, vec![operand.clone()]));
    };
    let path = match std::str::from_utf8(&path_bytes) {
        Ok(path) => path.to_string(),
        Err(_) => {
            return Err(Condition::with(
                "error while loading file",
                vec![Value::Str(path_bytes.clone())],
            ))
        }
    };
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            return Err(Condition::with(
                "error while loading file",
                vec![Value::string(&path), Value::string(&err.to_string())],
            ))
        }
    };
    let exprs = match reader::read_all(&text, &path) {
        Ok(exprs) => exprs,
        Err(err) => {
            return Err(Condition::with(
                "error while loading file",
                vec![Value::string(&path), Value::string(&err.to_string())],
            ))
        }
    };
    tracing::debug!(path = %path, count = exprs.len(), "loaded file");
    let frame = Continuation::new(
        Handler::Sequence {
            env: env.clone(),
            rest: Value::list(exprs),
        },
        parent,
    );
    Ok(Step::ret(Value::Inert, frame))
}
