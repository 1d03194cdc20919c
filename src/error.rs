// ABOUTME: Error types for the reader and the evaluator

use crate::value::Value;
use thiserror::Error;

/// Reader failures. `Incomplete` means the stream ended inside an
/// unfinished form (open bracket, unterminated string); the REPL maps
/// it to a continuation prompt instead of reporting an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("syntax error: {message} at {line}:{col}")]
    Syntax {
        message: String,
        line: u32,
        col: u32,
    },

    #[error("more input needed")]
    Incomplete,
}

impl ReadError {
    pub fn syntax(message: impl Into<String>, line: u32, col: u32) -> Self {
        ReadError::Syntax {
            message: message.into(),
            line,
            col,
        }
    }
}

/// An in-language error raised by the evaluator or a primitive. The
/// driver converts it into an abnormal pass to the error continuation;
/// it is never observable as a host panic.
#[derive(Debug, Clone)]
pub struct Condition {
    pub message: &'static str,
    pub irritants: Vec<Value>,
}

impl Condition {
    pub fn new(message: &'static str) -> Self {
        Condition {
            message,
            irritants: Vec::new(),
        }
    }

    pub fn with(message: &'static str, irritants: Vec<Value>) -> Self {
        Condition { message, irritants }
    }
}

/// An evaluation that reached the error continuation. The payload is
/// the value delivered there, normally a list of the source
/// continuation, a message string, and any irritants.
#[derive(Error, Debug, Clone)]
#[error("evaluation aborted: {0}")]
pub struct EvalAbort(pub Value);

impl EvalAbort {
    /// The continuation where the error was raised, when the payload
    /// carries one. The stack-trace printer starts here.
    pub fn source_continuation(&self) -> Option<std::rc::Rc<crate::cont::Continuation>> {
        match &self.0 {
            Value::Pair(pair) => match pair.car() {
                Value::Continuation(cont) => Some(cont),
                _ => None,
            },
            _ => None,
        }
    }

    /// The payload without the leading source continuation.
    pub fn message(&self) -> Value {
        match &self.0 {
            Value::Pair(pair) => match pair.car() {
                Value::Continuation(_) => pair.cdr(),
                _ => self.0.clone(),
            },
            _ => self.0.clone(),
        }
    }
}

/// Either kind of failure a source-level entry point can produce.
#[derive(Error, Debug)]
pub enum InterpreterError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Abort(#[from] EvalAbort),
}
