// This file is part of tacl, an embeddable Tcl-style command language.
// Copyright (C) 2026 The tacl authors

//! This crate provides functions that quote a string so that it reads back as
//! a single element of a tacl list.
//!
//! When the result is embedded in a list and the list is parsed again, the
//! element obtained is byte-identical to the original string.
//!
//! Three quoting mechanisms are available. The [`quote`] function chooses one
//! according to the following decision rules:
//!
//! - If the string is non-empty, contains no character special to the list
//!   parser and no brace, it is returned intact.
//! - Otherwise, if the string's braces balance, it does not end with a
//!   backslash or `]`, and it contains no backslash-newline, the whole string
//!   is wrapped in `{` and `}`.
//! - Otherwise, every special character is individually backslash-escaped.
//!
//! The characters that need quoting are space, tab, newline, carriage
//! return, form feed, vertical tab, `$`, `"`, `[`, `]`, `;`, `\`, `{`, and
//! `}`.
//!
//! # Examples
//!
//! ```
//! # use std::borrow::Cow::{Borrowed, Owned};
//! # use tacl_quote::quote;
//! assert_eq!(quote("foo"), Borrowed("foo"));
//! assert_eq!(quote(""), Owned::<str>("{}".to_owned()));
//! assert_eq!(quote("a b"), Owned::<str>("{a b}".to_owned()));
//! assert_eq!(quote("a}b"), Owned::<str>(r"a\}b".to_owned()));
//! ```

use std::borrow::Cow::{self, Borrowed, Owned};

/// Quoting mechanism selected for a list element
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Quoting {
    /// The string can be embedded as is.
    Simple,
    /// The string must be wrapped in braces.
    Brace,
    /// Special characters must be backslash-escaped.
    Backslash,
}

/// Returns true for a character the list parser treats specially.
fn is_special(c: u8) -> bool {
    matches!(
        c,
        b' ' | b'$' | b'"' | b'[' | b']' | b';' | b'\\' | b'\r' | b'\n' | b'\t' | 0x0C | 0x0B
    )
}

/// Chooses the quoting mechanism for the given string.
///
/// See the [module doc](self) for the decision rules. The analysis never
/// fails: every string can be quoted with at least [`Quoting::Backslash`].
#[must_use]
pub fn quoting(s: &str) -> Quoting {
    let b = s.as_bytes();
    if b.is_empty() {
        return Quoting::Brace;
    }

    let mut try_simple = true;
    let mut test_brace = false;
    if b[0] == b'"' || b[0] == b'{' {
        try_simple = false;
        test_brace = true;
    } else {
        for &c in b {
            if is_special(c) {
                try_simple = false;
                test_brace = true;
                break;
            }
            if c == b'{' || c == b'}' {
                test_brace = true;
                break;
            }
        }
    }
    if !test_brace {
        return Quoting::Simple;
    }

    // A trailing backslash or `]` would merge with the closing brace or a
    // surrounding command substitution when parsed back.
    if b[b.len() - 1] == b'\\' || b[b.len() - 1] == b']' {
        return Quoting::Backslash;
    }
    let mut level = 0i32;
    let mut i = 0;
    while i < b.len() {
        match b[i] {
            b'{' => level += 1,
            b'}' => {
                level -= 1;
                if level < 0 {
                    return Quoting::Backslash;
                }
            }
            b'\\' => {
                if b.get(i + 1) == Some(&b'\n') {
                    return Quoting::Backslash;
                }
                if i + 1 < b.len() {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if level == 0 {
        if !try_simple {
            return Quoting::Brace;
        }
        if b.iter().copied().any(is_special) {
            return Quoting::Brace;
        }
        return Quoting::Simple;
    }
    Quoting::Backslash
}

/// Quotes the string using backslash escapes only.
///
/// Every special character is prefixed with a backslash; whitespace control
/// characters are rewritten to their mnemonic escapes so the result stays on
/// one line.
#[must_use]
pub fn backslash_quote(s: &str) -> String {
    let mut result = String::with_capacity(s.len().saturating_mul(2));
    for c in s.chars() {
        match c {
            ' ' | '$' | '"' | '[' | ']' | '{' | '}' | ';' | '\\' => {
                result.push('\\');
                result.push(c);
            }
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\u{C}' => result.push_str("\\f"),
            '\u{B}' => result.push_str("\\v"),
            _ => result.push(c),
        }
    }
    result
}

/// Quotes the argument for use as a list element.
///
/// If the argument needs no quoting, the return value is `Borrowed(s)`.
/// Otherwise, it is `Owned(new_quoted_string)`.
///
/// See the [module doc](self) for more details.
#[must_use]
pub fn quote(s: &str) -> Cow<'_, str> {
    match quoting(s) {
        Quoting::Simple => Borrowed(s),
        Quoting::Brace => Owned(format!("{{{s}}}")),
        Quoting::Backslash => Owned(backslash_quote(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_quoting() {
        fn test(s: &str) {
            assert_eq!(quote(s), Borrowed(s));
        }
        test("a");
        test("foo");
        test("_x42");
        test("+=/:@^~,.!?");
        test("end-1");
    }

    #[test]
    fn empty_string_is_braced() {
        assert_eq!(quoting(""), Quoting::Brace);
        assert_eq!(quote(""), Owned::<str>("{}".to_owned()));
    }

    #[test]
    fn brace_quoted() {
        fn test(input: &str, output: &str) {
            assert_eq!(quoting(input), Quoting::Brace);
            assert_eq!(quote(input), Owned::<str>(output.to_owned()));
        }
        test("a b", "{a b}");
        test("a\tb", "{a\tb}");
        test("two\nlines", "{two\nlines}");
        test("$var", "{$var}");
        test("[cmd]x", "{[cmd]x}");
        test("a;b", "{a;b}");
        test("\"quoted\"", "{\"quoted\"}");
        test("{a b}", "{{a b}}");
    }

    #[test]
    fn backslash_quoted() {
        fn test(input: &str, output: &str) {
            assert_eq!(quoting(input), Quoting::Backslash);
            assert_eq!(quote(input), Owned::<str>(output.to_owned()));
        }
        test("}", r"\}");
        test("{", r"\{");
        test("a}b{c", r"a\}b\{c");
        test("tail\\", r"tail\\");
        test("x]", r"x\]");
        test("del key\\", r"del\ key\\");
        test("a\\\nb", "a\\\\\\nb");
    }

    #[test]
    fn unbalanced_open_brace_uses_backslash() {
        // `{{}` would swallow the list closing brace if brace-wrapped.
        assert_eq!(quoting("{{}"), Quoting::Backslash);
    }

    #[test]
    fn balanced_braces_with_space_are_braced() {
        assert_eq!(quoting("a {b c} d"), Quoting::Brace);
    }

    #[test]
    fn mnemonic_escapes() {
        assert_eq!(backslash_quote("a\nb"), "a\\nb");
        assert_eq!(backslash_quote("a\rb"), "a\\rb");
        assert_eq!(backslash_quote("a\tb"), "a\\tb");
        assert_eq!(backslash_quote("a\u{C}b"), "a\\fb");
        assert_eq!(backslash_quote("a\u{B}b"), "a\\vb");
    }
}
