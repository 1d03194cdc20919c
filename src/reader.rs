// ABOUTME: Reader producing source-located, structure-sharing expression trees

use std::rc::Rc;

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take, take_while1, take_while_m_n};
use nom::character::complete::char as byte_char;
use nom::combinator::{all_consuming, map, map_res, value};
use nom::multi::many1_count;
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::error::ReadError;
use crate::value::{copy_structure, Pair, Span, Value};

/// One lexed token. Everything that is not punctuation arrives as a
/// finished atom; self-references are resolved by the tree builder
/// against its cons-stack.
#[derive(Clone)]
enum Token {
    Open,
    Close,
    Dot,
    SelfRef(usize),
    Atom(Value),
}

/// Recursive-descent reader over a byte stream. Every pair gets a
/// source span, and each finished top-level tree is deep-copied to
/// immutable form so read structure never shares identity with pairs
/// user code builds later.
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    file: Rc<str>,
    stack: Vec<Rc<Pair>>,
}

/// Reads every expression in `source`.
pub fn read_all(source: &str, file: &str) -> Result<Vec<Value>, ReadError> {
    let mut reader = Reader::new(source, file);
    let mut exprs = Vec::new();
    while let Some(expr) = reader.read()? {
        exprs.push(expr);
    }
    Ok(exprs)
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str, file: &str) -> Reader<'a> {
        Reader {
            input: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            file: Rc::from(file),
            stack: Vec::new(),
        }
    }

    /// Reads the next expression, or None at a clean end of input.
    pub fn read(&mut self) -> Result<Option<Value>, ReadError> {
        self.stack.clear();
        match self.next_token()? {
            None => Ok(None),
            Some((token, line, col)) => {
                let raw = self.parse_token(token, line, col)?;
                Ok(Some(copy_structure(&raw, true)))
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(byte)
    }

    fn skip_atmosphere(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b';') => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, u32, u32)>, ReadError> {
        self.skip_atmosphere();
        let (line, col) = (self.line, self.col);
        let Some(byte) = self.peek() else {
            return Ok(None);
        };
        let token = match byte {
            b'(' => {
                self.bump();
                Token::Open
            }
            b')' => {
                self.bump();
                Token::Close
            }
            b'"' => Token::Atom(self.read_string()?),
            _ => {
                let rest = &self.input[self.pos..];
                let chunk = match take_while1::<_, _, nom::error::Error<&[u8]>>(is_token_byte)
                    .parse(rest)
                {
                    Ok((_, chunk)) => chunk,
                    Err(_) => return Err(ReadError::syntax("unknown syntax", line, col)),
                };
                let token = classify(chunk)
                    .map_err(|message| ReadError::Syntax { message, line, col })?;
                // Chunks never contain a newline.
                self.pos += chunk.len();
                self.col += chunk.len() as u32;
                token
            }
        };
        Ok(Some((token, line, col)))
    }

    fn parse_token(&mut self, token: Token, line: u32, col: u32) -> Result<Value, ReadError> {
        match token {
            Token::Atom(value) => Ok(value),
            Token::SelfRef(levels) => {
                if levels >= self.stack.len() {
                    return Err(ReadError::syntax(
                        "self-reference exceeds nesting",
                        line,
                        col,
                    ));
                }
                let index = self.stack.len() - levels;
                Ok(Value::Pair(self.stack[index].clone()))
            }
            Token::Open => self.parse_list(line, col),
            Token::Close => Err(ReadError::syntax("unmatched close bracket", line, col)),
            Token::Dot => Err(ReadError::syntax("unexpected dot", line, col)),
        }
    }

    fn parse_list(&mut self, open_line: u32, open_col: u32) -> Result<Value, ReadError> {
        match self.next_token()? {
            None => Err(ReadError::Incomplete),
            Some((Token::Close, ..)) => Ok(Value::Nil),
            Some((Token::Dot, line, col)) => {
                Err(ReadError::syntax("unexpected dot", line, col))
            }
            Some((token, line, col)) => {
                let value = self.parse_element(token, line, col)?;
                // The head pair's span starts at the open bracket.
                if let Value::Pair(pair) = &value {
                    if let Some(mut span) = pair.span() {
                        span.start_line = open_line;
                        span.start_col = open_col;
                        pair.set_span(span);
                    }
                }
                Ok(value)
            }
        }
    }

    fn parse_element(&mut self, token: Token, line: u32, col: u32) -> Result<Value, ReadError> {
        let pair = Pair::new(Value::Nil, Value::Nil);
        pair.set_span(Span {
            file: self.file.clone(),
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
        });
        self.stack.push(pair.clone());
        let car = self.parse_token(token, line, col)?;
        pair.replace_car(car);
        let cdr = self.parse_rest()?;
        pair.replace_cdr(cdr);
        self.stack.pop();
        if let Some(mut span) = pair.span() {
            span.end_line = self.line;
            span.end_col = self.col;
            pair.set_span(span);
        }
        Ok(Value::Pair(pair))
    }

    fn parse_rest(&mut self) -> Result<Value, ReadError> {
        match self.next_token()? {
            None => Err(ReadError::Incomplete),
            Some((Token::Close, ..)) => Ok(Value::Nil),
            Some((Token::Dot, ..)) => {
                let (token, line, col) = match self.next_token()? {
                    None => return Err(ReadError::Incomplete),
                    Some(item) => item,
                };
                match token {
                    Token::Close => {
                        return Err(ReadError::syntax("unexpected close bracket", line, col))
                    }
                    Token::Dot => return Err(ReadError::syntax("unexpected dot", line, col)),
                    _ => {}
                }
                let tail = self.parse_token(token, line, col)?;
                match self.next_token()? {
                    None => Err(ReadError::Incomplete),
                    Some((Token::Close, ..)) => Ok(tail),
                    Some((_, line, col)) => {
                        Err(ReadError::syntax("expected close bracket", line, col))
                    }
                }
            }
            Some((token, line, col)) => self.parse_element(token, line, col),
        }
    }

    fn read_string(&mut self) -> Result<Value, ReadError> {
        self.bump();
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.bump() else {
                return Err(ReadError::Incomplete);
            };
            match byte {
                b'"' => return Ok(Value::Str(Rc::from(bytes.as_slice()))),
                b'\\' => {
                    let Some(escape) = self.bump() else {
                        return Err(ReadError::Incomplete);
                    };
                    match escape {
                        b'\\' | b'\'' | b'"' => bytes.push(escape),
                        b'a' => bytes.push(0x07),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0c),
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'v' => bytes.push(0x0b),
                        b'x' => {
                            let value = self.hex_escape(2)?;
                            bytes.push(value as u8);
                        }
                        b'u' => self.push_unicode_escape(4, &mut bytes)?,
                        b'U' => self.push_unicode_escape(8, &mut bytes)?,
                        _ => {
                            return Err(ReadError::syntax(
                                "unknown escape sequence",
                                self.line,
                                self.col,
                            ))
                        }
                    }
                }
                other => bytes.push(other),
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Result<u32, ReadError> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let Some(byte) = self.bump() else {
                return Err(ReadError::Incomplete);
            };
            let digit = (byte as char).to_digit(16).ok_or_else(|| {
                ReadError::syntax("invalid hex escape", self.line, self.col)
            })?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn push_unicode_escape(&mut self, digits: usize, bytes: &mut Vec<u8>) -> Result<(), ReadError> {
        let value = self.hex_escape(digits)?;
        let ch = char::from_u32(value).ok_or_else(|| {
            ReadError::syntax("invalid unicode escape", self.line, self.col)
        })?;
        let mut buf = [0u8; 4];
        bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }
}

fn is_token_byte(byte: u8) -> bool {
    !matches!(
        byte,
        b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b'"' | b';'
    )
}

fn classify(chunk: &[u8]) -> Result<Token, String> {
    if chunk == b"." {
        return Ok(Token::Dot);
    }
    if chunk[0] == b'#' {
        return match hash_literal(chunk) {
            Ok((_, token)) => Ok(token),
            Err(_) => Err(format!(
                "unknown token: {}",
                String::from_utf8_lossy(chunk)
            )),
        };
    }
    let numeric = chunk[0].is_ascii_digit()
        || (matches!(chunk[0], b'+' | b'-') && chunk.len() > 1 && chunk[1].is_ascii_digit());
    let text =
        std::str::from_utf8(chunk).map_err(|_| "invalid utf-8 in token".to_string())?;
    if numeric {
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Token::Atom(Value::Int(int)));
        }
        if let Ok(real) = text.parse::<f64>() {
            return Ok(Token::Atom(Value::Real(real)));
        }
    }
    Ok(Token::Atom(Value::Symbol(Rc::from(
        text.to_lowercase().as_str(),
    ))))
}

fn hash_literal(input: &[u8]) -> IResult<&[u8], Token> {
    preceded(
        byte_char('#'),
        alt((
            value(Token::Atom(Value::Inert), all_consuming(tag_no_case("inert"))),
            value(
                Token::Atom(Value::Ignore),
                all_consuming(tag_no_case("ignore")),
            ),
            value(
                Token::Atom(Value::Boolean(true)),
                all_consuming(tag_no_case("t")),
            ),
            value(
                Token::Atom(Value::Boolean(false)),
                all_consuming(tag_no_case("f")),
            ),
            map(all_consuming(many1_count(byte_char('.'))), Token::SelfRef),
            map(all_consuming(preceded(tag("\\x"), hex_byte)), |byte| {
                Token::Atom(Value::Char(byte))
            }),
            map(
                all_consuming(preceded(byte_char('\\'), single_byte)),
                |byte| Token::Atom(Value::Char(byte)),
            ),
        )),
    )
    .parse(input)
}

fn hex_byte(input: &[u8]) -> IResult<&[u8], u8> {
    map_res(
        take_while_m_n(2, 2, |byte: u8| byte.is_ascii_hexdigit()),
        |hex: &[u8]| {
            u8::from_str_radix(std::str::from_utf8(hex).expect("hex digits are ascii"), 16)
        },
    )
    .parse(input)
}

fn single_byte(input: &[u8]) -> IResult<&[u8], u8> {
    map(take(1usize), |bytes: &[u8]| bytes[0]).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{list_metrics, values_eq};

    fn read_one(source: &str) -> Value {
        Reader::new(source, "<test>")
            .read()
            .expect("read failed")
            .expect("no expression")
    }

    fn read_err(source: &str) -> ReadError {
        let mut reader = Reader::new(source, "<test>");
        loop {
            match reader.read() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected a read error"),
                Err(err) => return err,
            }
        }
    }

    #[test]
    fn test_numbers() {
        assert!(values_eq(&read_one("42"), &Value::Int(42)));
        assert!(values_eq(&read_one("-42"), &Value::Int(-42)));
        assert!(values_eq(&read_one("+7"), &Value::Int(7)));
        assert!(values_eq(&read_one("2.5"), &Value::Real(2.5)));
        assert!(values_eq(&read_one("-2.5"), &Value::Real(-2.5)));
        assert!(values_eq(&read_one("1e3"), &Value::Real(1000.0)));
    }

    #[test]
    fn test_symbols_are_lowercased() {
        assert!(values_eq(&read_one("foo"), &Value::symbol("foo")));
        assert!(values_eq(&read_one("FOO"), &Value::symbol("foo")));
        assert!(values_eq(&read_one("+"), &Value::symbol("+")));
        assert!(values_eq(&read_one("set-car!"), &Value::symbol("set-car!")));
        assert!(values_eq(&read_one("<=?"), &Value::symbol("<=?")));
    }

    #[test]
    fn test_hash_literals() {
        assert!(values_eq(&read_one("#t"), &Value::Boolean(true)));
        assert!(values_eq(&read_one("#F"), &Value::Boolean(false)));
        assert!(values_eq(&read_one("#inert"), &Value::Inert));
        assert!(values_eq(&read_one("#IGNORE"), &Value::Ignore));
        assert!(values_eq(&read_one("#\\a"), &Value::Char(b'a')));
        assert!(values_eq(&read_one("#\\x41"), &Value::Char(0x41)));
        assert!(values_eq(&read_one("#\\x0a"), &Value::Char(b'\n')));
    }

    #[test]
    fn test_strings_and_escapes() {
        assert!(values_eq(&read_one("\"hello\""), &Value::string("hello")));
        assert!(values_eq(&read_one("\"\""), &Value::string("")));
        assert!(values_eq(
            &read_one("\"a\\nb\\tc\""),
            &Value::string("a\nb\tc")
        ));
        assert!(values_eq(
            &read_one("\"say \\\"hi\\\"\""),
            &Value::string("say \"hi\"")
        ));
        assert!(values_eq(&read_one("\"\\x41\""), &Value::string("A")));
        assert!(values_eq(&read_one("\"\\u00e9\""), &Value::string("é")));
        assert!(values_eq(&read_one("\"\\U0001f600\""), &Value::string("😀")));
    }

    #[test]
    fn test_lists() {
        assert_eq!(format!("{}", read_one("()")), "()");
        assert_eq!(format!("{}", read_one("(1 2 3)")), "(1 2 3)");
        assert_eq!(format!("{}", read_one("(1 (2 3) 4)")), "(1 (2 3) 4)");
        assert_eq!(format!("{}", read_one("(1 . 2)")), "(1 . 2)");
        assert_eq!(format!("{}", read_one("(1 2 . 3)")), "(1 2 . 3)");
    }

    #[test]
    fn test_comments_and_whitespace() {
        assert!(values_eq(
            &read_one("; leading comment\n  42 ; trailing"),
            &Value::Int(42)
        ));
        assert_eq!(format!("{}", read_one("(1 ; inner\n 2)")), "(1 2)");
    }

    #[test]
    fn test_read_all_returns_each_expression() {
        let exprs = read_all("1 (2 3) four", "<test>").expect("read failed");
        assert_eq!(exprs.len(), 3);
        assert_eq!(format!("{}", exprs[2]), "four");
    }

    #[test]
    fn test_read_trees_are_immutable() {
        let Value::Pair(pair) = read_one("(1 2)") else {
            panic!("expected a pair")
        };
        assert!(pair.is_immutable());
    }

    #[test]
    fn test_self_reference_builds_cycle() {
        let value = read_one("(a #.)");
        assert_eq!(format!("{}", value), "(a #.)");
        let Value::Pair(outer) = &value else { unreachable!() };
        let Value::Pair(inner) = outer.cdr() else { unreachable!() };
        let Value::Pair(back) = inner.car() else { unreachable!() };
        assert!(Rc::ptr_eq(&inner, &back));
    }

    #[test]
    fn test_self_reference_two_levels() {
        let value = read_one("(a (b #..))");
        assert_eq!(format!("{}", value), "(a (b #..))");
        let metrics = list_metrics(&value);
        assert_eq!(metrics.pairs, 2);
        assert!(metrics.nil_terminated);
    }

    #[test]
    fn test_self_reference_past_root_fails() {
        assert!(matches!(read_err("#."), ReadError::Syntax { .. }));
        assert!(matches!(read_err("(#.)"), ReadError::Syntax { .. }));
    }

    #[test]
    fn test_incomplete_input() {
        assert_eq!(read_err("(1 2"), ReadError::Incomplete);
        assert_eq!(read_err("(1 (2 3)"), ReadError::Incomplete);
        assert_eq!(read_err("\"abc"), ReadError::Incomplete);
        assert_eq!(read_err("(1 ."), ReadError::Incomplete);
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        match read_err("  )") {
            ReadError::Syntax { message, line, col } => {
                assert_eq!(message, "unmatched close bracket");
                assert_eq!(line, 1);
                assert_eq!(col, 3);
            }
            other => panic!("expected a syntax error, got {:?}", other),
        }
        assert!(matches!(read_err("(1 . 2 3)"), ReadError::Syntax { .. }));
        assert!(matches!(read_err("#q"), ReadError::Syntax { .. }));
    }

    #[test]
    fn test_unparseable_number_falls_back_to_symbol() {
        assert!(values_eq(&read_one("1x2"), &Value::symbol("1x2")));
        assert!(values_eq(&read_one("-"), &Value::symbol("-")));
        assert!(values_eq(&read_one("+"), &Value::symbol("+")));
    }

    #[test]
    fn test_spans_cover_expressions() {
        let Value::Pair(pair) = read_one("(+ 1 2)") else {
            panic!("expected a pair")
        };
        let span = pair.span().expect("expected a span");
        assert_eq!(&*span.file, "<test>");
        assert_eq!(span.start_line, 1);
        assert_eq!(span.start_col, 1);
        assert_eq!(span.end_line, 1);
        assert_eq!(span.end_col, 8);
    }

    #[test]
    fn test_spans_track_lines() {
        let Value::Pair(pair) = read_one("(+\n 1\n 2)") else {
            panic!("expected a pair")
        };
        let span = pair.span().expect("expected a span");
        assert_eq!(span.start_line, 1);
        assert_eq!(span.end_line, 3);
    }
}
