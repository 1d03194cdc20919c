// ABOUTME: Cycle-aware writer producing syntax the reader accepts back

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::{Pair, Value};

/// Pairs already being written, mapped to the list depth of their
/// first occurrence. A re-encountered pair prints `#` followed by one
/// dot per level back, mirroring the reader's self-reference syntax.
/// The map holds O(depth) entries, never O(nodes).
type Seen = HashMap<*const Pair, usize>;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, 0, &mut Seen::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    depth: usize,
    seen: &mut Seen,
) -> fmt::Result {
    match value {
        Value::Nil => write!(f, "()"),
        Value::Inert => write!(f, "#inert"),
        Value::Ignore => write!(f, "#ignore"),
        Value::Boolean(true) => write!(f, "#t"),
        Value::Boolean(false) => write!(f, "#f"),
        Value::Int(n) => write!(f, "{}", n),
        Value::Real(r) => write!(f, "{:?}", r),
        Value::Char(c) => write_char(f, *c),
        Value::Str(bytes) => write_string(f, bytes),
        Value::Symbol(name) => write!(f, "{}", name),
        Value::Pair(pair) => write_pair(f, pair, depth, seen),
        Value::Environment(_) => write!(f, "#<environment>"),
        Value::Continuation(_) => write!(f, "#<continuation>"),
        Value::Combiner(combiner) => {
            if combiner.num_wraps == 0 {
                write!(f, "#<operative>")
            } else {
                write!(f, "#<applicative>")
            }
        }
        Value::Encapsulation(_) => write!(f, "#<encapsulation>"),
    }
}

fn write_pair(
    f: &mut fmt::Formatter<'_>,
    pair: &Rc<Pair>,
    depth: usize,
    seen: &mut Seen,
) -> fmt::Result {
    let key = Rc::as_ptr(pair);
    if let Some(first_depth) = seen.get(&key) {
        write!(f, "#")?;
        for _ in 0..depth - first_depth {
            write!(f, ".")?;
        }
        return Ok(());
    }
    let mut removals = vec![key];
    seen.insert(key, depth);
    write!(f, "(")?;
    write_value(f, &pair.car(), depth + 1, seen)?;
    let mut depth = depth + 1;
    let mut tail = pair.cdr();
    loop {
        match tail {
            Value::Pair(next) => {
                let next_key = Rc::as_ptr(&next);
                if seen.contains_key(&next_key) {
                    write!(f, " . ")?;
                    write_value(f, &Value::Pair(next), depth, seen)?;
                    break;
                }
                seen.insert(next_key, depth);
                removals.push(next_key);
                write!(f, " ")?;
                write_value(f, &next.car(), depth + 1, seen)?;
                depth += 1;
                tail = next.cdr();
            }
            Value::Nil => break,
            other => {
                write!(f, " . ")?;
                write_value(f, &other, depth, seen)?;
                break;
            }
        }
    }
    write!(f, ")")?;
    for key in removals {
        seen.remove(&key);
    }
    Ok(())
}

fn write_char(f: &mut fmt::Formatter<'_>, c: u8) -> fmt::Result {
    match c {
        b' ' | b'(' | b')' | b'\t' | b'\n' | b'\r' => write!(f, "#\\x{:02x}", c),
        0x21..=0x7e => write!(f, "#\\{}", c as char),
        _ => write!(f, "#\\x{:02x}", c),
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "\"")?;
    for &b in bytes {
        match b {
            b'"' => write!(f, "\\\"")?,
            b'\\' => write!(f, "\\\\")?,
            b'\n' => write!(f, "\\n")?,
            b'\r' => write!(f, "\\r")?,
            b'\t' => write!(f, "\\t")?,
            0x20..=0x7e => write!(f, "{}", b as char)?,
            _ => write!(f, "\\x{:02x}", b)?,
        }
    }
    write!(f, "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoms() {
        assert_eq!(format!("{}", Value::Nil), "()");
        assert_eq!(format!("{}", Value::Inert), "#inert");
        assert_eq!(format!("{}", Value::Ignore), "#ignore");
        assert_eq!(format!("{}", Value::Boolean(true)), "#t");
        assert_eq!(format!("{}", Value::Boolean(false)), "#f");
        assert_eq!(format!("{}", Value::Int(-12)), "-12");
        assert_eq!(format!("{}", Value::Real(2.5)), "2.5");
        assert_eq!(format!("{}", Value::Real(2.0)), "2.0");
        assert_eq!(format!("{}", Value::symbol("foo")), "foo");
    }

    #[test]
    fn test_strings_escape() {
        assert_eq!(format!("{}", Value::string("hi")), "\"hi\"");
        assert_eq!(format!("{}", Value::string("a\"b")), "\"a\\\"b\"");
        assert_eq!(format!("{}", Value::string("a\\b")), "\"a\\\\b\"");
        assert_eq!(format!("{}", Value::string("a\nb")), "\"a\\nb\"");
        assert_eq!(format!("{}", Value::bytes(&[0x01])), "\"\\x01\"");
    }

    #[test]
    fn test_characters() {
        assert_eq!(format!("{}", Value::Char(b'a')), "#\\a");
        assert_eq!(format!("{}", Value::Char(b' ')), "#\\x20");
        assert_eq!(format!("{}", Value::Char(b'(')), "#\\x28");
        assert_eq!(format!("{}", Value::Char(b'\n')), "#\\x0a");
        assert_eq!(format!("{}", Value::Char(0x07)), "#\\x07");
    }

    #[test]
    fn test_lists() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(format!("{}", list), "(1 2 3)");
        let dotted = Value::cons(Value::Int(1), Value::Int(2));
        assert_eq!(format!("{}", dotted), "(1 . 2)");
        let nested = Value::list(vec![
            Value::Int(1),
            Value::list(vec![Value::Int(2), Value::Int(3)]),
        ]);
        assert_eq!(format!("{}", nested), "(1 (2 3))");
    }

    #[test]
    fn test_cyclic_list_prints_back_reference() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let Value::Pair(first) = &list else { unreachable!() };
        let Value::Pair(second) = first.cdr() else { unreachable!() };
        let Value::Pair(third) = second.cdr() else { unreachable!() };
        third.replace_cdr(list.clone());
        assert_eq!(format!("{}", list), "(1 2 3 . #...)");
        third.replace_cdr(Value::Nil);
    }

    #[test]
    fn test_self_referential_car() {
        // The structure read from "(a #.)"
        let inner = Pair::new(Value::Nil, Value::Nil);
        inner.replace_car(Value::Pair(inner.clone()));
        let outer = Value::cons(Value::symbol("a"), Value::Pair(inner.clone()));
        assert_eq!(format!("{}", outer), "(a #.)");
        inner.replace_car(Value::Nil);
    }

    #[test]
    fn test_shared_structure_is_not_a_cycle() {
        let shared = Value::list(vec![Value::Int(1)]);
        let list = Value::list(vec![shared.clone(), shared]);
        assert_eq!(format!("{}", list), "((1) (1))");
    }
}
