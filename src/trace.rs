// ABOUTME: Stack trace rendering for errors that reach the error continuation

use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

use crate::cont::Continuation;
use crate::value::{Span, Value};

const GUTTER: usize = 7;

/// Renders the pending-expression frames between `cont` and the root,
/// outermost first so the innermost frame lands next to the error
/// message printed after it. Frames whose expression carries a span
/// show the source line with an underline when the file is readable;
/// everything else falls back to the written expression.
pub fn render_trace(cont: &Rc<Continuation>) -> String {
    let mut frames = Vec::new();
    let mut current = Some(cont.clone());
    while let Some(frame) = current {
        if frame.call_info.is_some() {
            frames.push(frame.clone());
        }
        current = frame.parent.clone();
    }

    let mut cache: HashMap<Rc<str>, Option<Vec<String>>> = HashMap::new();
    let mut out = String::new();
    for frame in frames.iter().rev() {
        let Some(expr) = &frame.call_info else { continue };
        let span = match expr {
            Value::Pair(pair) => pair.span(),
            _ => None,
        };
        match span {
            Some(span) => render_located(&mut out, &span, expr, &mut cache),
            None => {
                let _ = writeln!(out, "  in unknown");
                let _ = writeln!(out, "{}{}", " ".repeat(GUTTER), expr);
            }
        }
    }
    out
}

fn render_located(
    out: &mut String,
    span: &Span,
    expr: &Value,
    cache: &mut HashMap<Rc<str>, Option<Vec<String>>>,
) {
    if span.start_line == span.end_line {
        let _ = writeln!(
            out,
            "  in {} at {} [{}:{}]",
            span.file, span.start_line, span.start_col, span.end_col
        );
    } else {
        let _ = writeln!(
            out,
            "  in {} at {}:{} [{}:{}]",
            span.file, span.start_line, span.end_line, span.start_col, span.end_col
        );
    }

    let lines = cache
        .entry(span.file.clone())
        .or_insert_with(|| read_lines(&span.file));
    let Some(lines) = lines else {
        let _ = writeln!(out, "{}{}", " ".repeat(GUTTER), expr);
        return;
    };

    if span.start_line == span.end_line {
        let Some(line) = lines.get(span.start_line as usize - 1) else {
            let _ = writeln!(out, "{}{}", " ".repeat(GUTTER), expr);
            return;
        };
        let number = format!("{}|", span.start_line);
        let _ = writeln!(out, "{:>width$}{}", number, line, width = GUTTER);
        let start = span.start_col.max(1) as usize - 1;
        let end = (span.end_col as usize).saturating_sub(1).min(line.len());
        let width = end.saturating_sub(start).max(1);
        let _ = writeln!(
            out,
            "{}{}{}",
            " ".repeat(GUTTER),
            " ".repeat(start),
            "~".repeat(width)
        );
    } else {
        for line_no in span.start_line..=span.end_line {
            let Some(line) = lines.get(line_no as usize - 1) else { break };
            let number = format!("{}|", line_no);
            let _ = writeln!(out, "{:>width$}{}", number, line, width = GUTTER);
        }
    }
}

/// Pseudo-files like `<repl>` and `<prelude>` are never read back.
fn read_lines(file: &str) -> Option<Vec<String>> {
    if file.starts_with('<') {
        return None;
    }
    let text = std::fs::read_to_string(file).ok()?;
    Some(text.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InterpreterError;
    use crate::eval::Interpreter;

    fn failing_trace(source: &str) -> String {
        let interp = Interpreter::new();
        match interp.eval_source(source, "<test>") {
            Err(InterpreterError::Abort(abort)) => {
                let cont = abort
                    .source_continuation()
                    .expect("expected a source continuation");
                render_trace(&cont)
            }
            other => panic!("expected an abort, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_trace_lists_pending_frames() {
        let trace = failing_trace("(+ 1 (car 5))");
        assert!(trace.contains("in <test> at 1"));
        // Innermost frame (the failing car call) is rendered last.
        let outer = trace.find("(+ 1 (car 5))").expect("outer frame missing");
        let inner = trace.rfind("(car 5)").expect("inner frame missing");
        assert!(outer < inner);
    }

    #[test]
    fn test_trace_of_unbound_symbol_points_at_call() {
        let trace = failing_trace("($define! f (wrap ($vau (#ignore (a)) (+ a missing)))) (f 1)");
        assert!(trace.contains("(f 1)"));
        assert!(trace.contains("missing"));
    }
}
