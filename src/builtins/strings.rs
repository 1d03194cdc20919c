//! Characters, strings, symbols, and the byte-level I/O primitives.

use std::io::{Read, Write};
use std::rc::Rc;

use crate::cont::Continuation;
use crate::env::Environment;
use crate::error::Condition;
use crate::eval::{args1, Step};
use crate::value::{list_metrics, Value};

use super::define_primitive;

pub fn register(env: &Rc<Environment>) {
    define_primitive(env, "char?", 1, is_char);
    define_primitive(env, "string?", 1, is_string);
    define_primitive(env, "symbol?", 1, is_symbol);
    define_primitive(env, "symbol->string", 1, symbol_to_string);
    define_primitive(env, "string->symbol", 1, string_to_symbol);
    define_primitive(env, "list->string", 1, list_to_string);
    define_primitive(env, "string->list", 1, string_to_list);
    define_primitive(env, "read-char", 1, read_char);
    define_primitive(env, "write-char", 1, write_char);
}

fn is_char(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (char? ANY)")?;
    Ok(Step::ret(
        Value::Boolean(matches!(value, Value::Char(_))),
        parent.clone(),
    ))
}

fn is_string(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (string? ANY)")?;
    Ok(Step::ret(
        Value::Boolean(matches!(value, Value::Str(_))),
        parent.clone(),
    ))
}

fn is_symbol(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let value = args1(operand, "expected (symbol? ANY)")?;
    Ok(Step::ret(
        Value::Boolean(matches!(value, Value::Symbol(_))),
        parent.clone(),
    ))
}

/// Symbols are stored as UTF-8; the string carries those bytes.
fn symbol_to_string(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (symbol->string SYMBOL)";
    match args1(operand, ERR)? {
        Value::Symbol(name) => Ok(Step::ret(Value::string(&name), parent.clone())),
        other => Err(Condition::with(ERR, vec![other])),
    }
}

fn string_to_symbol(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (string->symbol STRING)";
    match args1(operand, ERR)? {
        Value::Str(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => Ok(Step::ret(Value::symbol(text), parent.clone())),
            Err(_) => Err(Condition::with(
                "string is not valid utf-8",
                vec![Value::Str(bytes.clone())],
            )),
        },
        other => Err(Condition::with(ERR, vec![other])),
    }
}

/// Converts a finite proper list of characters to a string.
fn list_to_string(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "list->string argument must be finite list of chars";
    let chars = args1(operand, "expected (list->string LIST)")?;
    let metrics = list_metrics(&chars);
    if !metrics.nil_terminated || metrics.cycle > 0 {
        return Err(Condition::with(ERR, vec![chars]));
    }
    let mut bytes = Vec::with_capacity(metrics.pairs);
    let mut cursor = chars.clone();
    while let Value::Pair(pair) = cursor {
        match pair.car() {
            Value::Char(c) => bytes.push(c),
            other => return Err(Condition::with(ERR, vec![other])),
        }
        cursor = pair.cdr();
    }
    Ok(Step::ret(Value::Str(Rc::from(bytes.as_slice())), parent.clone()))
}

fn string_to_list(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (string->list STRING)";
    match args1(operand, ERR)? {
        Value::Str(bytes) => {
            let chars = bytes.iter().map(|b| Value::Char(*b)).collect();
            Ok(Step::ret(Value::list(chars), parent.clone()))
        }
        other => Err(Condition::with(ERR, vec![other])),
    }
}

/// Reads one byte from the process's standard input; end of file is an
/// error.
fn read_char(_env: &Rc<Environment>, _operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    let mut buf = [0u8; 1];
    match std::io::stdin().read(&mut buf) {
        Ok(0) => Err(Condition::new("end of file reached")),
        Ok(_) => Ok(Step::ret(Value::Char(buf[0]), parent.clone())),
        Err(err) => Err(Condition::with(
            "end of file reached",
            vec![Value::string(&err.to_string())],
        )),
    }
}

fn write_char(_env: &Rc<Environment>, operand: &Value, parent: &Rc<Continuation>) -> Result<Step, Condition> {
    const ERR: &str = "expected (write-char CHAR)";
    match args1(operand, ERR)? {
        Value::Char(c) => {
            let mut stdout = std::io::stdout();
            if let Err(err) = stdout.write_all(&[c]).and_then(|_| stdout.flush()) {
                return Err(Condition::with(
                    "end of file reached",
                    vec![Value::string(&err.to_string())],
                ));
            }
            Ok(Step::ret(Value::Inert, parent.clone()))
        }
        other => Err(Condition::with(ERR, vec![other])),
    }
}
