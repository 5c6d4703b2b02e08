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

//! The four-mode tokenizer
//!
//! A [`Parser`] walks a complete in-memory source string with a byte cursor
//! and a line counter. Callers drive it by repeatedly invoking one of the
//! four entry points until [`Parser::at_eof`] turns true:
//!
//! - [`next_script`](Parser::next_script) tokenizes command words,
//!   substitutions, separators, and command terminators;
//! - [`next_list`](Parser::next_list) recognizes only words and separators
//!   (braces and double quotes still group, comments do not exist);
//! - [`next_subst`](Parser::next_subst) yields literal runs interrupted by
//!   `$var` and `[cmd]`, with individual constructs disabled by
//!   [`SubstFlags`];
//! - [`next_expr`](Parser::next_expr) adds numeric literals, parentheses,
//!   and longest-match operator names.
//!
//! All entry points share the word-extraction machinery, so brace nesting,
//! double-quoted runs, and line continuations behave identically
//! everywhere.

use crate::escape::unescape;
use crate::token::{Token, TokenKind};
use bitflags::bitflags;
use std::borrow::Cow;
use thiserror::Error;

bitflags! {
    /// Constructs disabled during substitution tokenization
    ///
    /// A disabled construct is folded back into the surrounding literal
    /// text token.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct SubstFlags: u8 {
        /// Do not decode backslash escapes.
        const NO_ESC = 1 << 0;
        /// Do not recognize `$var` substitutions.
        const NO_VAR = 1 << 1;
        /// Do not recognize `[cmd]` substitutions.
        const NO_CMD = 1 << 2;
    }
}

/// Operator names recognized in expression mode, for longest-match scanning.
///
/// The table mirrors the interpreter's operator table; precedences and
/// opcodes live with the expression compiler.
const OPERATOR_NAMES: &[&str] = &[
    "!", "~", "unarymin", "unaryplus", "*", "/", "%", "-", "+", "<<<", ">>>", "<<", ">>", "<",
    ">", "<=", ">=", "==", "!=", "eq", "ne", "&", "^", "|", "&&", "||", "?",
];

/// Error produced when expression mode finds no token at the cursor
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("syntax error in expression at byte {position}")]
pub struct ExprTokenError {
    /// Byte position of the offending character
    pub position: usize,
    /// Line the offending character is on
    pub line: u32,
}

/// Tokenizer over a complete source string
///
/// See the [module documentation](self) for an overview.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    /// Kind of the most recently produced token, for new-word detection
    last: Option<TokenKind>,
    /// Whether the cursor is inside a double-quoted run
    quoted: bool,
    /// Whether a `#` at the cursor starts a comment
    comment_ok: bool,
    eof: bool,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `src`, with `first_line` as the line number of
    /// its first line.
    #[must_use]
    pub fn new(src: &'a str, first_line: u32) -> Self {
        Parser {
            src,
            pos: 0,
            line: first_line,
            last: None,
            quoted: false,
            comment_ok: true,
            eof: false,
        }
    }

    /// Whether the end of input has been reached.
    ///
    /// Turns true once an entry point has produced the final
    /// [`Eol`](TokenKind::Eol) token.
    #[must_use]
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Extracts the text of a token, decoding escapes for
    /// [`Esc`](TokenKind::Esc) tokens.
    #[must_use]
    pub fn text(&self, token: &Token) -> Cow<'a, str> {
        let raw = &self.src[token.range.clone()];
        if token.kind == TokenKind::Esc && raw.contains('\\') {
            Cow::Owned(unescape(raw))
        } else {
            Cow::Borrowed(raw)
        }
    }

    fn byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        self.src.as_bytes().get(index).copied()
    }

    fn token(&mut self, kind: TokenKind, start: usize, end: usize, line: u32) -> Token {
        self.last = Some(kind);
        Token {
            kind,
            range: start..end,
            line,
        }
    }

    fn eol_at_eof(&mut self) -> Token {
        self.eof = true;
        let pos = self.pos;
        let line = self.line;
        self.token(TokenKind::Eol, pos, pos, line)
    }

    /// Returns the next token of a script.
    pub fn next_script(&mut self) -> Token {
        loop {
            let Some(c) = self.byte() else {
                return self.eol_at_eof();
            };
            match c {
                b'\\' => {
                    // Backslash-newline separates words even inside quotes.
                    if self.byte_at(self.pos + 1) == Some(b'\n') {
                        return self.parse_sep();
                    }
                    self.comment_ok = false;
                    return self.parse_str();
                }
                b' ' | b'\t' | b'\r' => {
                    if !self.quoted {
                        return self.parse_sep();
                    }
                    self.comment_ok = false;
                    return self.parse_str();
                }
                b'\n' | b';' => {
                    self.comment_ok = true;
                    if !self.quoted {
                        return self.parse_eol();
                    }
                    return self.parse_str();
                }
                b'[' => {
                    self.comment_ok = false;
                    return self.parse_cmd();
                }
                b'$' => {
                    self.comment_ok = false;
                    match self.parse_var() {
                        Some(token) => return token,
                        // A lone `$` degrades to a literal string.
                        None => {
                            let start = self.pos;
                            let line = self.line;
                            self.pos += 1;
                            return self.token(TokenKind::Str, start, start + 1, line);
                        }
                    }
                }
                b'#' if self.comment_ok => self.skip_comment(),
                _ => {
                    self.comment_ok = false;
                    return self.parse_str();
                }
            }
        }
    }

    fn parse_sep(&mut self) -> Token {
        let start = self.pos;
        let line = self.line;
        while let Some(c) = self.byte() {
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                // Backslash-newline is a word separator.
                b'\\' if self.byte_at(self.pos + 1) == Some(b'\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                _ => break,
            }
        }
        self.token(TokenKind::Sep, start, self.pos, line)
    }

    fn parse_eol(&mut self) -> Token {
        let start = self.pos;
        let line = self.line;
        while let Some(c) = self.byte() {
            match c {
                b' ' | b'\t' | b'\r' | b';' => self.pos += 1,
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        self.token(TokenKind::Eol, start, self.pos, line)
    }

    fn parse_cmd(&mut self) -> Token {
        let line = self.line;
        self.pos += 1; // skip the `[`
        let start = self.pos;
        let mut level = 1u32;
        let mut blevel = 0u32;
        let end;
        loop {
            match self.byte() {
                None => {
                    end = self.pos;
                    break;
                }
                Some(b'[') if blevel == 0 => {
                    level += 1;
                    self.pos += 1;
                }
                Some(b']') if blevel == 0 => {
                    level -= 1;
                    if level == 0 {
                        end = self.pos;
                        self.pos += 1;
                        break;
                    }
                    self.pos += 1;
                }
                Some(b'\\') => self.pos = (self.pos + 2).min(self.src.len()),
                Some(b'{') => {
                    blevel += 1;
                    self.pos += 1;
                }
                Some(b'}') => {
                    blevel = blevel.saturating_sub(1);
                    self.pos += 1;
                }
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        self.token(TokenKind::Cmd, start, end, line)
    }

    /// Parses `$name`, `${name}`, or `$name(key)` after the cursor.
    ///
    /// Returns `None`, with the cursor unmoved, if the `$` is not followed
    /// by anything that looks like a variable name.
    fn parse_var(&mut self) -> Option<Token> {
        let line = self.line;
        let dollar = self.pos;
        self.pos += 1; // skip the `$`
        if self.byte() == Some(b'{') {
            self.pos += 1;
            let start = self.pos;
            let end;
            loop {
                match self.byte() {
                    None => {
                        end = self.pos;
                        break;
                    }
                    Some(b'}') => {
                        end = self.pos;
                        self.pos += 1;
                        break;
                    }
                    Some(b'\n') => {
                        self.line += 1;
                        self.pos += 1;
                    }
                    Some(_) => self.pos += 1,
                }
            }
            return Some(self.token(TokenKind::Var, start, end, line));
        }
        let start = self.pos;
        while let Some(c) = self.byte() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let mut kind = TokenKind::Var;
        if self.byte() == Some(b'(') {
            // The `(key)` is kept in the token; the interpreter splits it.
            while let Some(c) = self.byte() {
                if c == b')' {
                    break;
                }
                self.pos += 1;
                if self.byte() == Some(b'\\') && self.byte_at(self.pos + 1).is_some() {
                    self.pos = (self.pos + 2).min(self.src.len());
                }
            }
            if self.byte() == Some(b')') {
                self.pos += 1;
            }
            kind = TokenKind::DictSugar;
        }
        if self.pos == start {
            self.pos = dollar;
            return None;
        }
        Some(self.token(kind, start, self.pos, line))
    }

    fn parse_brace(&mut self) -> Token {
        let line = self.line;
        self.pos += 1; // skip the `{`
        let start = self.pos;
        let mut level = 1u32;
        loop {
            match self.byte() {
                Some(b'\\') if self.byte_at(self.pos + 1).is_some() => self.pos += 2,
                Some(b'{') => {
                    level += 1;
                    self.pos += 1;
                }
                None => {
                    let pos = self.pos;
                    return self.token(TokenKind::Str, start, pos, line);
                }
                Some(b'}') => {
                    level -= 1;
                    if level == 0 {
                        let end = self.pos;
                        self.pos += 1;
                        return self.token(TokenKind::Str, start, end, line);
                    }
                    self.pos += 1;
                }
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn parse_str(&mut self) -> Token {
        let newword = matches!(
            self.last,
            None | Some(TokenKind::Sep | TokenKind::Eol | TokenKind::Str)
        );
        if newword && self.byte() == Some(b'{') {
            return self.parse_brace();
        }
        if newword && self.byte() == Some(b'"') {
            self.quoted = true;
            self.pos += 1;
        }
        let start = self.pos;
        let line = self.line;
        loop {
            match self.byte() {
                None => {
                    let pos = self.pos;
                    return self.token(TokenKind::Esc, start, pos, line);
                }
                Some(b'\\') => {
                    if !self.quoted && self.byte_at(self.pos + 1) == Some(b'\n') {
                        let pos = self.pos;
                        return self.token(TokenKind::Esc, start, pos, line);
                    }
                    self.pos = (self.pos + 2).min(self.src.len());
                }
                Some(b'$' | b'[') => {
                    let pos = self.pos;
                    return self.token(TokenKind::Esc, start, pos, line);
                }
                Some(c @ (b' ' | b'\t' | b'\n' | b'\r' | b';')) => {
                    if !self.quoted {
                        let pos = self.pos;
                        return self.token(TokenKind::Esc, start, pos, line);
                    }
                    if c == b'\n' {
                        self.line += 1;
                    }
                    self.pos += 1;
                }
                Some(b'"') if self.quoted => {
                    let end = self.pos;
                    self.pos += 1;
                    self.quoted = false;
                    return self.token(TokenKind::Esc, start, end, line);
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.byte() {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                // A backslash-newline continues the comment.
                if self.pos < 2 || self.byte_at(self.pos - 2) != Some(b'\\') {
                    return;
                }
            }
        }
    }

    /// Returns the next token of a list.
    pub fn next_list(&mut self) -> Token {
        match self.byte() {
            None => self.eol_at_eof(),
            Some(b' ' | b'\n' | b'\t' | b'\r') if !self.quoted => self.parse_list_sep(),
            Some(_) => self.parse_list_str(),
        }
    }

    fn parse_list_sep(&mut self) -> Token {
        let start = self.pos;
        let line = self.line;
        while let Some(c) = self.byte() {
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        self.token(TokenKind::Sep, start, self.pos, line)
    }

    fn parse_list_str(&mut self) -> Token {
        let newword = matches!(self.last, None | Some(TokenKind::Sep | TokenKind::Eol));
        if newword && self.byte() == Some(b'{') {
            return self.parse_brace();
        }
        if newword && self.byte() == Some(b'"') {
            self.quoted = true;
            self.pos += 1;
        }
        let start = self.pos;
        let line = self.line;
        loop {
            match self.byte() {
                None => {
                    let pos = self.pos;
                    return self.token(TokenKind::Esc, start, pos, line);
                }
                Some(b'\\') => self.pos = (self.pos + 2).min(self.src.len()),
                Some(c @ (b' ' | b'\t' | b'\n' | b'\r')) => {
                    if !self.quoted {
                        let pos = self.pos;
                        return self.token(TokenKind::Esc, start, pos, line);
                    }
                    if c == b'\n' {
                        self.line += 1;
                    }
                    self.pos += 1;
                }
                Some(b'"') if self.quoted => {
                    let end = self.pos;
                    self.pos += 1;
                    self.quoted = false;
                    return self.token(TokenKind::Esc, start, end, line);
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Returns the next token of a substitution template.
    ///
    /// Disabled constructs are returned as literal text including their
    /// introducing characters.
    pub fn next_subst(&mut self, flags: SubstFlags) -> Token {
        let literal_kind = if flags.contains(SubstFlags::NO_ESC) {
            TokenKind::Str
        } else {
            TokenKind::Esc
        };
        match self.byte() {
            None => self.eol_at_eof(),
            Some(b'[') => {
                let mut token = self.parse_cmd();
                if flags.contains(SubstFlags::NO_CMD) {
                    // Fold the whole `[...]` back into literal text.
                    token.range.start -= 1;
                    if token.range.end < self.src.len() {
                        token.range.end += 1;
                    }
                    token.kind = literal_kind;
                    self.last = Some(token.kind);
                }
                token
            }
            Some(b'$') => match self.parse_var() {
                None => {
                    let start = self.pos;
                    let line = self.line;
                    self.pos += 1;
                    self.token(TokenKind::Str, start, start + 1, line)
                }
                Some(mut token) => {
                    if flags.contains(SubstFlags::NO_VAR) {
                        token.range.start -= 1;
                        if self.byte_at(token.range.start) == Some(b'{') {
                            token.range.start -= 1;
                            if token.range.end < self.src.len() {
                                token.range.end += 1;
                            }
                        }
                        token.kind = literal_kind;
                        self.last = Some(token.kind);
                    }
                    token
                }
            },
            Some(_) => {
                let start = self.pos;
                let line = self.line;
                while let Some(c) = self.byte() {
                    if c == b'$' || c == b'[' {
                        break;
                    }
                    if c == b'\n' {
                        self.line += 1;
                    }
                    self.pos += 1;
                }
                let pos = self.pos;
                self.token(literal_kind, start, pos, line)
            }
        }
    }

    /// Returns the next token of an expression.
    ///
    /// Unlike the other modes this can fail: a character that starts no
    /// number, substitution, parenthesis, or operator is an error.
    pub fn next_expr(&mut self) -> Result<Token, ExprTokenError> {
        // Discard whitespace and quoted newlines.
        loop {
            match self.byte() {
                Some(b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(b'\\') if self.byte_at(self.pos + 1) == Some(b'\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                _ => break,
            }
        }
        match self.byte() {
            None => Ok(self.eol_at_eof()),
            Some(b'(') => {
                let start = self.pos;
                let line = self.line;
                self.pos += 1;
                Ok(self.token(TokenKind::SubExprStart, start, start + 1, line))
            }
            Some(b')') => {
                let start = self.pos;
                let line = self.line;
                self.pos += 1;
                Ok(self.token(TokenKind::SubExprEnd, start, start + 1, line))
            }
            Some(b'[') => Ok(self.parse_cmd()),
            Some(b'$') => match self.parse_var() {
                Some(token) => Ok(token),
                None => self.parse_expr_operator(),
            },
            Some(b'-') => {
                // A minus after nothing or an operator begins a negative
                // number literal.
                if matches!(self.last, None | Some(TokenKind::Operator))
                    && self.byte_at(self.pos + 1).is_some_and(|c| c.is_ascii_digit())
                {
                    Ok(self.parse_expr_number())
                } else {
                    self.parse_expr_operator()
                }
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => Ok(self.parse_expr_number()),
            Some(b'"' | b'{') => {
                // Reuse the list word scanner for string literals.
                self.last = None;
                Ok(self.parse_list_str())
            }
            Some(_) => self.parse_expr_operator(),
        }
    }

    fn parse_expr_number(&mut self) -> Token {
        let start = self.pos;
        let line = self.line;
        let mut allow_dot = true;
        if self.byte() == Some(b'-') {
            self.pos += 1;
        }
        while let Some(c) = self.byte() {
            if c.is_ascii_digit() || (allow_dot && c == b'.') {
                if c == b'.' {
                    allow_dot = false;
                }
                self.pos += 1;
                if !allow_dot
                    && self.byte() == Some(b'e')
                    && self.byte_at(self.pos + 1) == Some(b'-')
                {
                    self.pos += 2;
                }
            } else {
                break;
            }
        }
        self.token(TokenKind::Number, start, self.pos, line)
    }

    fn parse_expr_operator(&mut self) -> Result<Token, ExprTokenError> {
        let rest = &self.src[self.pos..];
        let mut best: Option<&str> = None;
        for name in OPERATOR_NAMES {
            if rest.starts_with(name) && best.is_none_or(|b| name.len() > b.len()) {
                best = Some(name);
            }
        }
        let Some(name) = best else {
            return Err(ExprTokenError {
                position: self.pos,
                line: self.line,
            });
        };
        let start = self.pos;
        let line = self.line;
        self.pos += name.len();
        let pos = self.pos;
        Ok(self.token(TokenKind::Operator, start, pos, line))
    }
}
