//! Rendering values back to text.
//!
//! Two modes exist. *Readable* mode restores string delimiters and escape
//! sequences so that output can be handed back to the reader; *display*
//! mode prints strings raw. Every other variant prints identically in both
//! modes.

use crate::Error;
use crate::ast::Value;

/// Render a sequence of values with the given brackets and joiner.
pub fn pr_seq(forms: &[Value], readable: bool, open: &str, close: &str, join: &str) -> String {
    let rendered: Vec<String> = forms.iter().map(|form| pr_str(form, readable)).collect();
    format!("{open}{}{close}", rendered.join(join))
}

/// Render a single value.
pub fn pr_str(value: &Value, readable: bool) -> String {
    match value {
        Value::Nil => "nil".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if readable {
                escape_string(s)
            } else {
                s.clone()
            }
        }
        Value::Symbol(s) => s.clone(),
        Value::Keyword(k) => format!(":{k}"),
        Value::List(items, _) => pr_seq(items, readable, "(", ")", " "),
        Value::Vector(items, _) => pr_seq(items, readable, "[", "]", " "),
        Value::Map(entries, _) => {
            // Iteration order is unspecified; keys and values interleave.
            let mut forms = Vec::with_capacity(entries.len() * 2);
            for (key, val) in entries.iter() {
                forms.push(key.clone());
                forms.push(val.clone());
            }
            pr_seq(&forms, readable, "{", "}", " ")
        }
        Value::Atom(cell) => format!("(atom {})", pr_str(&cell.borrow(), readable)),
        Value::Builtin { id, .. } => format!("#<builtin-function:{id}>"),
        Value::Closure(closure) => {
            if closure.is_macro {
                "#<macro>".to_owned()
            } else {
                "#<function>".to_owned()
            }
        }
    }
}

/// Render an error the way the REPL and file runner report it.
pub fn print_error(err: &Error) -> String {
    match err {
        Error::Thrown(value) => format!("Exception: {}", pr_str(value, true)),
        other => format!("Exception: {other}"),
    }
}

/// Invert the reader's escape processing: `\`, `"` and newline become
/// two-character escapes and the result is wrapped in quotes.
fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{sym, val};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[test]
    fn test_scalar_printing() {
        let test_cases = vec![
            (Value::Nil, "nil"),
            (val(true), "true"),
            (val(false), "false"),
            (val(42i64), "42"),
            (val(-2.5), "-2.5"),
            (sym("foo"), "foo"),
            (Value::Keyword("kw".to_owned()), ":kw"),
        ];
        for (value, expected) in test_cases {
            assert_eq!(pr_str(&value, true), expected);
            assert_eq!(pr_str(&value, false), expected);
        }
    }

    #[test]
    fn test_integral_numbers_print_without_decimal_point() {
        assert_eq!(pr_str(&val(3.0), true), "3");
        assert_eq!(pr_str(&val(-0.5), true), "-0.5");
    }

    #[test]
    fn test_string_modes() {
        let test_cases = vec![
            ("abc", r#""abc""#, "abc"),
            ("say \"hi\"", r#""say \"hi\"""#, "say \"hi\""),
            ("a\\b", r#""a\\b""#, "a\\b"),
            ("line1\nline2", r#""line1\nline2""#, "line1\nline2"),
            ("", r#""""#, ""),
        ];
        for (raw, readable, display) in test_cases {
            assert_eq!(pr_str(&val(raw), true), readable);
            assert_eq!(pr_str(&val(raw), false), display);
        }
    }

    #[test]
    fn test_collection_printing() {
        let list = val(vec![val(1i64), val(2i64), val(3i64)]);
        assert_eq!(pr_str(&list, true), "(1 2 3)");

        let vector = Value::vector(vec![sym("a"), val("b")]);
        assert_eq!(pr_str(&vector, true), r#"[a "b"]"#);
        assert_eq!(pr_str(&vector, false), "[a b]");

        let nested = val(vec![val(1i64), Value::vector(vec![val(2i64)]), Value::list(vec![])]);
        assert_eq!(pr_str(&nested, true), "(1 [2] ())");
    }

    #[test]
    fn test_map_printing_interleaves_keys_and_values() {
        let mut entries = HashMap::new();
        entries.insert(Value::Keyword("a".to_owned()), val(1i64));
        assert_eq!(pr_str(&Value::map(entries), true), "{:a 1}");
        assert_eq!(pr_str(&Value::map(HashMap::new()), true), "{}");
    }

    #[test]
    fn test_atom_and_function_printing() {
        let atom = Value::Atom(Rc::new(RefCell::new(val(5i64))));
        assert_eq!(pr_str(&atom, true), "(atom 5)");

        let atom_of_string = Value::Atom(Rc::new(RefCell::new(val("s"))));
        assert_eq!(pr_str(&atom_of_string, true), r#"(atom "s")"#);
    }

    #[test]
    fn test_error_printing() {
        assert_eq!(
            print_error(&Error::Thrown(val("boom"))),
            r#"Exception: "boom""#
        );
        assert_eq!(
            print_error(&Error::UnboundSymbol("abc".to_owned())),
            "Exception: 'abc' not found"
        );
    }
}
