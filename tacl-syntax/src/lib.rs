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

//! This crate tokenizes tacl source text.
//!
//! A single cursor-based state machine ([`parser::Parser`]) serves the four
//! grammars of the language: scripts, lists, substitution templates, and
//! expressions. The parser is deliberately forgiving: an unterminated brace,
//! bracket, or quote closes at the end of input, and a `$` that does not
//! introduce a valid variable name degrades to a literal `$`.
//!
//! Tokens are byte ranges into the source plus a [`token::TokenKind`] and a
//! line number; [`parser::Parser::text`] extracts the token text, applying
//! backslash-escape decoding ([`escape::unescape`]) where the grammar calls
//! for it.

pub mod escape;
pub mod parser;
pub mod source;
pub mod token;

pub use self::parser::{ExprTokenError, Parser, SubstFlags};
pub use self::source::Source;
pub use self::token::{Token, TokenKind};
