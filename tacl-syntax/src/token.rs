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

//! Token classification
//!
//! The [`Parser`](crate::parser::Parser) yields [`Token`]s, which are byte
//! ranges into the source text tagged with a [`TokenKind`] and the line they
//! started on. Which kinds can occur depends on the entry mode: script mode
//! never yields the expression kinds and vice versa.

use std::ops::Range;

/// Classification of a token
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TokenKind {
    /// Literal text that needs no escape processing (braced words)
    Str,
    /// Literal text subject to backslash-escape decoding
    Esc,
    /// Variable substitution (`$name` or `${name}`; the token is the name)
    Var,
    /// Dictionary-sugar substitution (`$name(key)`; the token is
    /// `name(key)`)
    DictSugar,
    /// Command substitution (`[script]`; the token is the script)
    Cmd,
    /// Word separator
    Sep,
    /// End of a command (newline, `;`, or end of input)
    Eol,
    /// `(` starting a sub-expression (expression mode only)
    SubExprStart,
    /// `)` ending a sub-expression (expression mode only)
    SubExprEnd,
    /// Numeric literal (expression mode only)
    Number,
    /// Operator name (expression mode only)
    Operator,
}

/// Result of tokenization
///
/// The token does not own its text; use
/// [`Parser::text`](crate::parser::Parser::text) to extract it from the
/// source, applying escape decoding for [`TokenKind::Esc`] tokens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// Classification of this token
    pub kind: TokenKind,
    /// Byte range of the token text in the source
    pub range: Range<usize>,
    /// Line number the token started on, counted from 1
    pub line: u32,
}

impl Token {
    /// Whether the token text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
