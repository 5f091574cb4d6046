//! Tokenizing and parsing source text into values.
//!
//! Reading happens in two phases. A nom-based scanner cuts the input into
//! string tokens, recognizing at each position (in priority order): runs of
//! whitespace and commas (skipped), line comments (skipped), the
//! two-character token `~@`, the single special characters
//! `[ ] { } ( ) ' `` ` `` ~ ^ @`, a double-quoted string, or a maximal run
//! of ordinary characters. An unterminated string is passed through as a
//! token so the parser can report underflow instead of a scan failure.
//!
//! The parser is a recursive descent over the token vector with one-token
//! lookahead, expanding reader macros (`'`, `` ` ``, `~`, `~@`, `@`, `^`)
//! into their list forms.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_while1},
    character::complete::{anychar, char, one_of},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::preceded,
};

use crate::ast::Value;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};
use std::collections::HashMap;

/// Characters that terminate a run token. `~`, `^` and `@` are special only
/// in leading position and may appear inside symbols.
const TOKEN_BREAK_CHARS: &str = "[]{}()'\"`,;";

fn is_run_char(c: char) -> bool {
    !c.is_whitespace() && !TOKEN_BREAK_CHARS.contains(c)
}

/// Whitespace and commas between tokens.
fn lex_junk(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_whitespace() || c == ',').parse(input)
}

/// A `;` comment running to end of line.
fn lex_comment(input: &str) -> IResult<&str, &str> {
    preceded(char(';'), take_till(|c| c == '\n')).parse(input)
}

/// A double-quoted string: body of escape pairs or plain characters, with
/// the closing quote optional so EOF inside a string still yields a token.
fn lex_string(input: &str) -> IResult<&str, &str> {
    recognize((
        char('"'),
        many0(alt((
            value((), preceded(char('\\'), anychar)),
            value((), is_not("\\\"")),
        ))),
        opt(char('"')),
    ))
    .parse(input)
}

fn lex_token(input: &str) -> IResult<&str, &str> {
    alt((
        tag("~@"),
        recognize(one_of("[]{}()'`~^@")),
        lex_string,
        take_while1(is_run_char),
    ))
    .parse(input)
}

/// Cut source text into tokens, dropping whitespace and comments.
pub(crate) fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        if let Ok((after, _)) = lex_junk(rest) {
            rest = after;
            continue;
        }
        if let Ok((after, _)) = lex_comment(rest) {
            rest = after;
            continue;
        }
        match lex_token(rest) {
            Ok((after, token)) => {
                tokens.push(token.to_owned());
                rest = after;
            }
            // Every remaining character is covered by some alternative, so
            // this arm is only reachable on adversarial input.
            Err(_) => break,
        }
    }
    tokens
}

/// Parse the first form in `input`. Trailing tokens are ignored; callers
/// that need several top-level forms wrap them in `(do ...)`.
pub fn read_str(input: &str) -> Result<Value, Error> {
    let mut reader = Reader {
        tokens: tokenize(input),
        pos: 0,
    };
    reader.form(0)
}

struct Reader {
    tokens: Vec<String>,
    pos: usize,
}

fn underflow() -> Error {
    Error::ParseError(ParseError::underflow())
}

fn unexpected(token: &str) -> Error {
    Error::ParseError(ParseError::new(
        ParseErrorKind::InvalidSyntax,
        format!("unexpected '{token}'"),
    ))
}

impl Reader {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn form(&mut self, depth: usize) -> Result<Value, Error> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(Error::ParseError(ParseError::new(
                ParseErrorKind::TooDeeplyNested,
                format!("form nesting exceeds maximum depth of {MAX_PARSE_DEPTH}"),
            )));
        }
        let token = self.peek().ok_or_else(underflow)?.to_owned();
        match token.as_str() {
            "'" => self.modifier("quote", depth),
            "`" => self.modifier("quasiquote", depth),
            "~" => self.modifier("unquote", depth),
            "~@" => self.modifier("splice-unquote", depth),
            "@" => self.modifier("deref", depth),
            "^" => self.meta(depth),
            "(" => Ok(Value::list(self.seq(")", depth)?)),
            "[" => Ok(Value::vector(self.seq("]", depth)?)),
            "{" => self.hash_map(depth),
            ")" | "]" | "}" => Err(unexpected(&token)),
            _ => self.atom(),
        }
    }

    /// A reader macro: consume the marker and wrap the next form.
    fn modifier(&mut self, symbol: &str, depth: usize) -> Result<Value, Error> {
        self.next();
        let form = self.form(depth + 1)?;
        Ok(Value::list(vec![Value::symbol(symbol), form]))
    }

    /// `^META FORM` reads the metadata first but wraps it second:
    /// `(with-meta FORM META)`.
    fn meta(&mut self, depth: usize) -> Result<Value, Error> {
        self.next();
        let meta = self.form(depth + 1)?;
        let form = self.form(depth + 1)?;
        Ok(Value::list(vec![Value::symbol("with-meta"), form, meta]))
    }

    /// Forms up to (and consuming) the closing bracket.
    fn seq(&mut self, end: &str, depth: usize) -> Result<Vec<Value>, Error> {
        self.next();
        let mut forms = Vec::new();
        loop {
            match self.peek() {
                None => return Err(underflow()),
                Some(token) if token == end => {
                    self.next();
                    return Ok(forms);
                }
                Some(_) => forms.push(self.form(depth + 1)?),
            }
        }
    }

    fn hash_map(&mut self, depth: usize) -> Result<Value, Error> {
        let forms = self.seq("}", depth)?;
        if forms.len() % 2 == 1 {
            return Err(Error::ParseError(ParseError::new(
                ParseErrorKind::InvalidSyntax,
                "odd number of forms in hash-map literal",
            )));
        }
        let mut entries = HashMap::with_capacity(forms.len() / 2);
        for pair in forms.chunks(2) {
            entries.insert(pair[0].clone(), pair[1].clone());
        }
        Ok(Value::map(entries))
    }

    fn atom(&mut self) -> Result<Value, Error> {
        let token = self.next().ok_or_else(underflow)?;
        if token == "nil" {
            Ok(Value::Nil)
        } else if token == "true" {
            Ok(Value::Bool(true))
        } else if token == "false" {
            Ok(Value::Bool(false))
        } else if let Some(name) = token.strip_prefix(':') {
            Ok(Value::Keyword(name.to_owned()))
        } else if is_number_token(&token) {
            match token.parse::<f64>() {
                Ok(n) => Ok(Value::Number(n)),
                Err(_) => Err(Error::ParseError(ParseError::new(
                    ParseErrorKind::InvalidSyntax,
                    format!("malformed number '{token}'"),
                ))),
            }
        } else if token.starts_with('"') {
            if token.len() < 2 || !token.ends_with('"') {
                return Err(Error::ParseError(ParseError::new(
                    ParseErrorKind::Incomplete,
                    "expected closing '\"', got end of input",
                )));
            }
            Ok(Value::String(unescape(&token[1..token.len() - 1])))
        } else {
            Ok(Value::Symbol(token))
        }
    }
}

/// Does the token match `-?[0-9]+\.?[0-9]*`?
fn is_number_token(token: &str) -> bool {
    let rest = token.strip_prefix('-').unwrap_or(token);
    let (digits, frac) = match rest.split_once('.') {
        Some((digits, frac)) => (digits, Some(frac)),
        None => (rest, None),
    };
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && frac.is_none_or(|f| f.bytes().all(|b| b.is_ascii_digit()))
}

/// Process string escapes in a single left-to-right pass that never rescans
/// its own output: `\\` -> `\`, `\"` -> `"`, `\n` -> newline. Any other
/// escape pair is preserved verbatim.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    #[test]
    fn test_tokenizer_comprehensive() {
        let test_cases: Vec<(&str, Vec<&str>)> = vec![
            ("", vec![]),
            ("   \t\n, ,,", vec![]),
            ("(+ 1 2)", vec!["(", "+", "1", "2", ")"]),
            ("[1,2,3]", vec!["[", "1", "2", "3", "]"]),
            ("{:a 1}", vec!["{", ":a", "1", "}"]),
            ("~@(a b)", vec!["~@", "(", "a", "b", ")"]),
            ("'x `y ~z @w", vec!["'", "x", "`", "y", "~", "z", "@", "w"]),
            ("^{:m 1} [1]", vec!["^", "{", ":m", "1", "}", "[", "1", "]"]),
            // Comments run to end of line
            ("(+ 1 2) ; adds\n3", vec!["(", "+", "1", "2", ")", "3"]),
            (";; only a comment", vec![]),
            // ~, ^ and @ are plain characters inside a run
            ("a~b c^d e@f", vec!["a~b", "c^d", "e@f"]),
            // Strings keep their delimiters and escape pairs
            (r#""hello world""#, vec![r#""hello world""#]),
            (r#""say \"hi\"""#, vec![r#""say \"hi\"""#]),
            (r#""a;b""#, vec![r#""a;b""#]),
            // An unterminated string still becomes one token
            (r#"(str "abc"#, vec!["(", "str", r#""abc"#]),
        ];

        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let tokens = tokenize(input);
            assert_eq!(
                tokens, *expected,
                "tokenize case {} failed for {input:?}",
                i + 1
            );
        }
    }

    /// Expected outcome of a parse test case.
    enum ParseResult {
        Success(Value),
        /// Parse must fail with this error kind
        Fails(ParseErrorKind),
    }
    use ParseResult::*;

    fn success<T: Into<Value>>(value: T) -> ParseResult {
        Success(value.into())
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("parse case #{}", i + 1);
            match (read_str(input), expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch for {input:?}");
                }
                (Err(Error::ParseError(err)), Fails(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: wrong error kind for {input:?}");
                }
                (Ok(actual), Fails(kind)) => {
                    panic!("{test_id}: expected {kind:?} error, got {actual:?}")
                }
                (Err(err), Fails(_)) => {
                    panic!("{test_id}: expected a parse error, got {err:?}")
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success, got error {err:?}")
                }
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        use ParseErrorKind::{Incomplete, InvalidSyntax};

        let test_cases = vec![
            // ===== ATOMS =====
            ("nil", Success(Value::Nil)),
            ("true", success(true)),
            ("false", success(false)),
            ("42", success(42i64)),
            ("-17", success(-17i64)),
            ("2.5", success(2.5)),
            ("-0.25", success(-0.25)),
            ("5.", success(5.0)),
            (":kw", Success(Value::Keyword("kw".to_owned()))),
            ("abc", success(sym("abc"))),
            ("+", success(sym("+"))),
            ("-", success(sym("-"))),
            ("-abc", success(sym("-abc"))),
            ("1.2.3", success(sym("1.2.3"))),
            ("nil?", success(sym("nil?"))),
            // ===== STRINGS =====
            (r#""hello""#, success("hello")),
            (r#""""#, success("")),
            (r#""with \"quotes\"""#, success("with \"quotes\"")),
            (r#""back\\slash""#, success("back\\slash")),
            (r#""new\nline""#, success("new\nline")),
            // Unknown escapes pass through untouched
            (r#""tab\there""#, success("tab\\there")),
            // Escape processing must not rescan its own output
            (r#""\\n""#, success("\\n")),
            // ===== SEQUENCES =====
            ("()", Success(Value::list(vec![]))),
            ("(1 2 3)", success([1i64, 2, 3])),
            (
                "( + 1, 2 )",
                success(vec![sym("+"), val(1i64), val(2i64)]),
            ),
            ("[]", Success(Value::vector(vec![]))),
            (
                "[1 [2]]",
                Success(Value::vector(vec![
                    val(1i64),
                    Value::vector(vec![val(2i64)]),
                ])),
            ),
            (
                "(a (b (c)))",
                success(vec![
                    sym("a"),
                    val(vec![sym("b"), val(vec![sym("c")])]),
                ]),
            ),
            // ===== READER MACROS =====
            ("'x", success(vec![sym("quote"), sym("x")])),
            ("`x", success(vec![sym("quasiquote"), sym("x")])),
            ("~x", success(vec![sym("unquote"), sym("x")])),
            (
                "~@(1 2)",
                success(vec![sym("splice-unquote"), val([1i64, 2])]),
            ),
            ("@a", success(vec![sym("deref"), sym("a")])),
            (
                "'(1 2)",
                success(vec![sym("quote"), val([1i64, 2])]),
            ),
            ("''x", success(vec![sym("quote"), val(vec![sym("quote"), sym("x")])])),
            // ^ swaps its arguments: metadata is read first, placed last
            (
                "^m [1]",
                success(vec![
                    sym("with-meta"),
                    Value::vector(vec![val(1i64)]),
                    sym("m"),
                ]),
            ),
            // ===== ERRORS: UNDERFLOW =====
            ("", Fails(Incomplete)),
            ("   ", Fails(Incomplete)),
            ("; just a comment", Fails(Incomplete)),
            ("(1 2", Fails(Incomplete)),
            ("[1 [2]", Fails(Incomplete)),
            ("{:a 1", Fails(Incomplete)),
            ("'", Fails(Incomplete)),
            ("^m", Fails(Incomplete)),
            (r#""unterminated"#, Fails(Incomplete)),
            (r#"(str "abc"#, Fails(Incomplete)),
            // ===== ERRORS: UNEXPECTED TOKENS =====
            (")", Fails(InvalidSyntax)),
            ("]", Fails(InvalidSyntax)),
            ("}", Fails(InvalidSyntax)),
            ("(1 2]", Fails(InvalidSyntax)),
            // ===== ERRORS: MAP LITERALS =====
            ("{:a}", Fails(InvalidSyntax)),
            ("{:a 1 :b}", Fails(InvalidSyntax)),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_parse_hash_map_literal() {
        let parsed = read_str("{:a 1 \"b\" 2}").expect("map should parse");
        let Value::Map(entries, _) = &parsed else {
            panic!("expected a map, got {parsed:?}");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries.get(&Value::Keyword("a".to_owned())),
            Some(&val(1i64))
        );
        assert_eq!(entries.get(&val("b")), Some(&val(2i64)));
    }

    #[test]
    fn test_trailing_tokens_are_ignored() {
        assert_eq!(read_str("1 2 3"), Ok(val(1i64)));
    }

    #[test]
    fn test_underflow_is_distinguishable() {
        let Err(Error::ParseError(err)) = read_str("(unclosed") else {
            panic!("expected a parse error");
        };
        assert!(err.is_incomplete());

        let Err(Error::ParseError(err)) = read_str(")") else {
            panic!("expected a parse error");
        };
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(MAX_PARSE_DEPTH), ")".repeat(MAX_PARSE_DEPTH));
        let Err(Error::ParseError(err)) = read_str(&deep) else {
            panic!("expected a parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);

        let shallow = format!("{}1{}", "(".repeat(64), ")".repeat(64));
        assert!(read_str(&shallow).is_ok());
    }
}
