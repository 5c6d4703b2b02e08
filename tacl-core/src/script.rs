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

//! The script compiler
//!
//! A compiled script is an array of tokens, each holding a value that
//! commands can specialize in place, plus the *command structure*: an
//! integer array encoding, for every command, its argument count followed
//! by the token count of each argument. A `{expand}`-prefixed argument
//! stores its token count negated, and the whole command is preceded by a
//! `-1` marker, so the evaluator can keep a fast path for the common
//! no-expansion case.
//!
//! For example `set $i $x$y [foo]BAR` compiles to the tokens
//! `Esc(set) Sep Var(i) Sep Var(x) Var(y) Sep Cmd(foo) Esc(BAR) Eol` and
//! the command structure `4 1 1 2 2`.
//!
//! Compilation cannot fail; the parser is forgiving by design. The same
//! representation doubles as the substitution program of `subst`, with the
//! command structure left empty.

use crate::heap::ValueId;
use crate::interp::Interp;
use crate::value::Repr;
use std::rc::Rc;
use tacl_syntax::{Parser, Source, SubstFlags, TokenKind};

/// One compiled token: its kind, its value, and the source line
#[derive(Debug)]
pub(crate) struct ScriptToken {
    pub kind: TokenKind,
    /// Retained value; starts as a string and may shimmer during
    /// execution (variable caches, nested scripts, ...)
    pub value: ValueId,
    pub line: u32,
}

/// Compiled form of a script or substitution template
///
/// Shared through `Rc`: the value slot holds one reference and every
/// running evaluation another, so shimmering the value mid-evaluation
/// cannot free the program out from under the evaluator.
#[derive(Debug)]
pub(crate) struct ScriptRep {
    pub tokens: Vec<ScriptToken>,
    /// Command structure; empty for substitution programs
    pub cmd_struct: Vec<i32>,
    /// Interned name of the file the script came from
    pub file: Rc<str>,
    /// Set when this program was compiled for `subst`, with the flags it
    /// was compiled under
    pub subst_flags: Option<SubstFlags>,
}

impl Interp {
    /// The compiled-script form of a value, compiling it if needed.
    pub(crate) fn get_script(&mut self, id: ValueId) -> Rc<ScriptRep> {
        if let Repr::Script(rep) = &self.heap.slot(id).repr {
            if rep.subst_flags.is_none() {
                return Rc::clone(rep);
            }
        }
        self.compile_script(id)
    }

    fn compile_script(&mut self, id: ValueId) -> Rc<ScriptRep> {
        let (file, first_line, propagate) = match &self.heap.slot(id).repr {
            Repr::Source(source) => (Rc::clone(&source.file), source.line, true),
            _ => (self.shared_strings.intern(tacl_syntax::source::UNKNOWN_FILE), 1, false),
        };
        let text = self.heap.string_cloned(id);
        let mut tokens = Vec::new();
        let mut parser = Parser::new(&text, first_line);
        while !parser.at_eof() {
            let token = parser.next_script();
            let token_text = parser.text(&token).into_owned();
            let source = propagate.then(|| Rc::clone(&file));
            self.add_script_token(&mut tokens, token.kind, token_text, token.line, source);
        }
        let cmd_struct = self.build_command_structure(&tokens);
        if propagate {
            self.share_literals(&mut tokens);
        }
        let rep = Rc::new(ScriptRep {
            tokens,
            cmd_struct,
            file,
            subst_flags: None,
        });
        self.heap.set_repr(id, Repr::Script(Rc::clone(&rep)));
        rep
    }

    /// The substitution program of a value, compiling it if needed.
    ///
    /// A program compiled under different flags is recompiled.
    pub(crate) fn get_subst(&mut self, id: ValueId, flags: SubstFlags) -> Rc<ScriptRep> {
        if let Repr::Script(rep) = &self.heap.slot(id).repr {
            if rep.subst_flags == Some(flags) {
                return Rc::clone(rep);
            }
        }
        let text = self.heap.string_cloned(id);
        let mut tokens = Vec::new();
        let mut parser = Parser::new(&text, 1);
        while !parser.at_eof() {
            let token = parser.next_subst(flags);
            let token_text = parser.text(&token).into_owned();
            self.add_script_token(&mut tokens, token.kind, token_text, token.line, None);
        }
        let rep = Rc::new(ScriptRep {
            tokens,
            cmd_struct: Vec::new(),
            file: self.shared_strings.intern(tacl_syntax::source::UNKNOWN_FILE),
            subst_flags: Some(flags),
        });
        self.heap.set_repr(id, Repr::Script(Rc::clone(&rep)));
        rep
    }

    /// Appends a token, collapsing sequences that carry no semantic
    /// weight: separators after separators or command ends, and empty
    /// literal fragments inside interpolation runs.
    fn add_script_token(
        &mut self,
        tokens: &mut Vec<ScriptToken>,
        kind: TokenKind,
        text: String,
        line: u32,
        source: Option<Rc<str>>,
    ) {
        let prev = tokens.last().map_or(TokenKind::Eol, |t| t.kind);
        if prev == TokenKind::Eol {
            if kind == TokenKind::Eol || kind == TokenKind::Sep {
                return;
            }
        } else if prev == TokenKind::Sep {
            if kind == TokenKind::Sep {
                return;
            }
            if kind == TokenKind::Eol {
                // A command end absorbs the separator before it.
                let dropped = tokens.pop().expect("previous token exists");
                self.heap.release(dropped.value);
            }
        } else if kind == TokenKind::Esc && text.is_empty() {
            return;
        }
        let value = self.heap.new_string(text);
        self.heap.retain(value);
        if let Some(file) = source {
            if kind != TokenKind::Sep && kind != TokenKind::Eol {
                self.heap.set_repr(value, Repr::Source(Source { file, line }));
            }
        }
        tokens.push(ScriptToken { kind, value, line });
    }

    fn token_is_expand(&self, tokens: &[ScriptToken], index: usize) -> bool {
        tokens[index].kind == TokenKind::Str
            && self.heap.slot(tokens[index].value).bytes.as_deref() == Some("expand")
    }

    /// Walks the token array and encodes the per-command argument layout.
    fn build_command_structure(&self, tokens: &[ScriptToken]) -> Vec<i32> {
        let mut cs = Vec::new();
        let len = tokens.len();
        let mut end: isize = -1;
        loop {
            let start = (end + 1) as usize;
            if start >= len {
                break;
            }
            // Count arguments and spot {expand} prefixes up to the
            // command end.
            let mut expand = false;
            let mut args = 1i32;
            let mut e = start;
            while tokens[e].kind != TokenKind::Eol {
                let at_word_start = e == 0
                    || matches!(tokens[e - 1].kind, TokenKind::Sep | TokenKind::Eol);
                if at_word_start
                    && e + 1 < len
                    && !matches!(tokens[e + 1].kind, TokenKind::Sep | TokenKind::Eol)
                    && self.token_is_expand(tokens, e)
                {
                    expand = true;
                }
                if tokens[e].kind == TokenKind::Sep {
                    args += 1;
                }
                e += 1;
            }
            if expand {
                cs.push(-1);
            }
            cs.push(args);
            // Token counts per argument, sign-flagged for expansion.
            let mut ntokens = 0i32;
            let mut arg_expand = false;
            for i in start..=e {
                match tokens[i].kind {
                    TokenKind::Sep | TokenKind::Eol => {
                        if ntokens == 1 && arg_expand {
                            // A lone {expand} is just the word "expand".
                            arg_expand = false;
                        }
                        cs.push(if arg_expand { -ntokens } else { ntokens });
                        arg_expand = false;
                        ntokens = 0;
                    }
                    kind => {
                        if ntokens == 0 && kind == TokenKind::Str && self.token_is_expand(tokens, i)
                        {
                            arg_expand = true;
                        }
                        ntokens += 1;
                    }
                }
            }
            end = e as isize;
        }
        cs
    }

    /// Collapses tokens with equal string forms onto one value, so
    /// shimmering costs are paid once per unique literal.
    fn share_literals(&mut self, tokens: &mut Vec<ScriptToken>) {
        for i in 0..tokens.len() {
            if self.heap.slot(tokens[i].value).refcount != 1 {
                continue;
            }
            for j in 0..tokens.len() {
                if i == j || tokens[i].value == tokens[j].value {
                    continue;
                }
                let equal = {
                    let a = self.heap.slot(tokens[i].value).bytes.as_deref();
                    let b = self.heap.slot(tokens[j].value).bytes.as_deref();
                    a.is_some() && a == b
                };
                if equal {
                    let shared = tokens[j].value;
                    self.heap.retain(shared);
                    self.heap.release(tokens[i].value);
                    tokens[i].value = shared;
                    break;
                }
            }
        }
    }

    /// Searches a compiled script (and nested compiled scripts) for a
    /// token value with the given string form.
    pub(crate) fn search_literal(&self, rep: &ScriptRep, text: &str) -> Option<ValueId> {
        for token in &rep.tokens {
            if self.heap.slot(token.value).bytes.as_deref() == Some(text) {
                return Some(token.value);
            }
            if let Repr::Script(nested) = &self.heap.slot(token.value).repr {
                if let Some(found) = self.search_literal(nested, text) {
                    return Some(found);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(interp: &mut Interp, text: &str) -> Rc<ScriptRep> {
        let id = interp.new_string(text);
        interp.retain(id);
        let rep = interp.get_script(id);
        interp.release(id);
        rep
    }

    fn kinds(rep: &ScriptRep) -> Vec<TokenKind> {
        rep.tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn token_stream_shape() {
        use TokenKind::*;
        let mut interp = Interp::new();
        let rep = compile(&mut interp, "puts hello\nset $i $x$y [foo]BAR");
        assert_eq!(
            kinds(&rep),
            [Esc, Sep, Esc, Eol, Esc, Sep, Var, Sep, Var, Var, Sep, Cmd, Esc, Eol]
        );
        assert_eq!(rep.cmd_struct, [2, 1, 1, 4, 1, 1, 2, 2]);
    }

    #[test]
    fn consecutive_separators_collapse() {
        use TokenKind::*;
        let mut interp = Interp::new();
        let rep = compile(&mut interp, "a   b  \n\n\n c");
        assert_eq!(kinds(&rep), [Esc, Sep, Esc, Eol, Esc, Eol]);
        assert_eq!(rep.cmd_struct, [2, 1, 1, 1, 1]);
    }

    #[test]
    fn separator_before_eol_is_dropped() {
        use TokenKind::*;
        let mut interp = Interp::new();
        let rep = compile(&mut interp, "a b \nc");
        assert_eq!(kinds(&rep), [Esc, Sep, Esc, Eol, Esc, Eol]);
    }

    #[test]
    fn expand_prefix_is_sign_encoded() {
        let mut interp = Interp::new();
        let rep = compile(&mut interp, "list {expand}{1 2}");
        // -1 flags the command, -2 the expanded two-token argument.
        assert_eq!(rep.cmd_struct, [-1, 2, 1, -2]);
    }

    #[test]
    fn lone_expand_word_is_not_an_expansion() {
        let mut interp = Interp::new();
        let rep = compile(&mut interp, "list {expand}");
        assert_eq!(rep.cmd_struct, [2, 1, 1]);
    }

    #[test]
    fn empty_script_has_no_commands() {
        let mut interp = Interp::new();
        let rep = compile(&mut interp, "   \n  # only a comment\n");
        assert!(rep.tokens.is_empty());
        assert!(rep.cmd_struct.is_empty());
    }

    #[test]
    fn compiling_is_cached() {
        let mut interp = Interp::new();
        let id = interp.new_string("a b");
        interp.retain(id);
        let first = interp.get_script(id);
        let second = interp.get_script(id);
        assert!(Rc::ptr_eq(&first, &second));
        interp.release(id);
    }

    #[test]
    fn literal_sharing_within_a_source_script() {
        let mut interp = Interp::new();
        let id = interp.new_string("set x 10\nset y 10");
        interp.retain(id);
        // Mark the text as source-tracked so sharing kicks in.
        interp.heap.set_repr(id, Repr::Source(Source::unknown()));
        let rep = interp.get_script(id);
        let tens: Vec<ValueId> = rep
            .tokens
            .iter()
            .filter(|t| interp.heap.slot(t.value).bytes.as_deref() == Some("10"))
            .map(|t| t.value)
            .collect();
        assert_eq!(tens.len(), 2);
        assert_eq!(tens[0], tens[1]);
        let sets: Vec<ValueId> = rep
            .tokens
            .iter()
            .filter(|t| interp.heap.slot(t.value).bytes.as_deref() == Some("set"))
            .map(|t| t.value)
            .collect();
        assert_eq!(sets[0], sets[1]);
        interp.release(id);
    }

    #[test]
    fn subst_program_has_no_command_structure() {
        let mut interp = Interp::new();
        let id = interp.new_string("a$b[c]d");
        interp.retain(id);
        let rep = interp.get_subst(id, SubstFlags::empty());
        assert!(rep.cmd_struct.is_empty());
        assert_eq!(rep.subst_flags, Some(SubstFlags::empty()));
        use TokenKind::*;
        assert_eq!(kinds(&rep), [Esc, Var, Cmd, Esc, Eol]);
        // Different flags force a recompile.
        let other = interp.get_subst(id, SubstFlags::NO_CMD);
        assert_eq!(other.subst_flags, Some(SubstFlags::NO_CMD));
        interp.release(id);
    }
}
