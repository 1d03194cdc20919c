// ABOUTME: REPL helper wiring the reader's incomplete detection into rustyline

use rustyline_derive::{Completer, Helper, Highlighter, Hinter};

use rustyline::validate::{ValidationContext, ValidationResult, Validator};

use rfexproto::error::ReadError;
use rfexproto::reader::Reader;

/// Line editor helper. Validation reads the whole buffer: an
/// unfinished form keeps the editor in multi-line entry, while hard
/// syntax errors are accepted here and reported by the eval loop.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplHelper;

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut reader = Reader::new(ctx.input(), "<repl>");
        loop {
            match reader.read() {
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(ValidationResult::Valid(None)),
                Err(ReadError::Incomplete) => return Ok(ValidationResult::Incomplete),
                Err(ReadError::Syntax { .. }) => return Ok(ValidationResult::Valid(None)),
            }
        }
    }
}
