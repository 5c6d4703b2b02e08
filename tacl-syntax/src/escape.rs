// This file is part of tacl, an embeddable Tcl-style command language.
// Copyright (C) 2026 The tacl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Backslash-escape decoding
//!
//! Escape decoding is applied to [`Esc`](crate::token::TokenKind::Esc)
//! tokens when their text is extracted. The recognized escapes are the
//! mnemonic ones (`\a \b \f \n \r \t \v`), `\xHH` with one or two hex
//! digits, and `\OOO` with one to three octal digits. An unknown escape
//! yields the escaped character itself, and a trailing backslash is kept
//! as is. The result is never longer than the input.

/// Decodes backslash escapes in a string.
///
/// ```
/// # use tacl_syntax::escape::unescape;
/// assert_eq!(unescape(r"a\tb"), "a\tb");
/// assert_eq!(unescape(r"\x41\x42"), "AB");
/// assert_eq!(unescape(r"\101"), "A");
/// assert_eq!(unescape(r"\q"), "q");
/// assert_eq!(unescape("tail\\"), "tail\\");
/// ```
#[must_use]
pub fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.peek().copied() {
            None => result.push('\\'),
            Some('a') => {
                chars.next();
                result.push('\u{7}');
            }
            Some('b') => {
                chars.next();
                result.push('\u{8}');
            }
            Some('f') => {
                chars.next();
                result.push('\u{C}');
            }
            Some('n') => {
                chars.next();
                result.push('\n');
            }
            Some('r') => {
                chars.next();
                result.push('\r');
            }
            Some('t') => {
                chars.next();
                result.push('\t');
            }
            Some('v') => {
                chars.next();
                result.push('\u{B}');
            }
            Some('x') => {
                chars.next();
                let mut value = 0;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(digit) => {
                            value = value * 16 + digit;
                            digits += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    // `\x` with no digits keeps the `x`.
                    result.push('x');
                } else {
                    result.push(char::from(value as u8));
                }
            }
            Some(first @ '0'..='7') => {
                chars.next();
                let mut value = first.to_digit(8).unwrap();
                let mut digits = 1;
                while digits < 3 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            digits += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                // Values above 0xFF wrap, as a byte store would.
                result.push(char::from((value & 0xFF) as u8));
            }
            Some(other) => {
                chars.next();
                result.push(other);
            }
        }
    }
    result
}
