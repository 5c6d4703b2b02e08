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

//! The evaluator
//!
//! Walks a compiled script's command structure, prepares argument values
//! (reusing single-token values directly, concatenating interpolation
//! runs), flattens `{expand}` arguments, resolves the command name through
//! the epoch-validated cache, and dispatches to a native command or a
//! procedure.
//!
//! The script value under evaluation is retained and its compiled program
//! `Rc`-cloned for the duration, so a script that rewrites the variable
//! holding itself keeps executing the program it started with.

use crate::command::{Command, CommandKind};
use crate::heap::ValueId;
use crate::interp::Interp;
use crate::script::ScriptRep;
use crate::semantics::{Flow, ReturnCode, Unwind};
use crate::value::Repr;
use std::rc::Rc;
use tacl_syntax::{Source, SubstFlags, TokenKind};

impl Interp {
    /// Evaluates a script given as a string. The result value is also the
    /// interpreter result.
    pub fn eval(&mut self, script: &str) -> Flow {
        let id = self.heap.new_string(script);
        self.heap.retain(id);
        let result = self.eval_value(id);
        self.heap.release(id);
        result
    }

    /// Reads and evaluates a file, attaching its name to the script for
    /// error reporting.
    pub fn eval_file(&mut self, path: &str) -> Flow {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                return Err(
                    self.error(format!("Error loading script \"{path}\": {error}"))
                );
            }
        };
        let id = self.heap.new_string(text);
        let file = self.shared_strings.intern(path);
        self.heap.set_repr(id, Repr::Source(Source { file, line: 1 }));
        self.heap.retain(id);
        let result = self.eval_value(id);
        self.heap.release(id);
        result
    }

    /// Evaluates a script value.
    ///
    /// A pure list value (no string form) is executed directly as a
    /// command word vector; its string form, had it been generated, would
    /// parse back to exactly these words.
    pub fn eval_value(&mut self, script_id: ValueId) -> Flow {
        let list_fast_path = self.heap.slot(script_id).bytes.is_none()
            && matches!(&self.heap.slot(script_id).repr, Repr::List(l) if !l.is_empty());
        if list_fast_path {
            self.heap.retain(script_id);
            let words = self.heap.list_elements(script_id);
            let result = self.eval_vector(&words);
            self.heap.release(script_id);
            return result;
        }

        self.heap.retain(script_id);
        self.error_flag = false;
        let rep = self.get_script(script_id);
        self.set_empty_result();
        let result = self.eval_program(&rep);
        self.heap.release(script_id);
        self.heap.reap();
        result.map(|()| self.result())
    }

    fn eval_program(&mut self, rep: &Rc<ScriptRep>) -> Result<(), Unwind> {
        let tokens = &rep.tokens;
        let mut cs = rep.cmd_struct.iter().copied();
        let mut i = 0usize;
        while i < tokens.len() {
            let mut argc = cs.next().expect("command structure covers all tokens");
            let expand = argc == -1;
            if expand {
                argc = cs.next().expect("argument count follows expansion marker");
            }
            let command_line = tokens[i].line;
            let mut argv: Vec<ValueId> = Vec::with_capacity(argc as usize);
            let mut expand_flags: Vec<bool> = Vec::new();

            for _ in 0..argc {
                let mut ntokens = cs.next().expect("token count per argument");
                let negated = ntokens < 0;
                if negated {
                    ntokens = -ntokens - 1;
                    i += 1; // skip the {expand} prefix token
                }
                if expand {
                    expand_flags.push(negated);
                }
                let argument_line = tokens[i].line;
                let value = if ntokens == 1 {
                    let token = &tokens[i];
                    let value = match token.kind {
                        TokenKind::Esc | TokenKind::Str => Ok(token.value),
                        TokenKind::Var => self.get_variable(token.value),
                        TokenKind::DictSugar => self.expand_dict_sugar(token.value),
                        TokenKind::Cmd => self.eval_value(token.value),
                        kind => unreachable!("token {kind:?} inside an argument"),
                    };
                    i += 2;
                    value
                } else {
                    let value = self.interpolate(&tokens[i..i + ntokens as usize]);
                    i += ntokens as usize + 1;
                    value
                };
                match value {
                    Ok(value) => {
                        self.heap.retain(value);
                        argv.push(value);
                    }
                    Err(unwind) => {
                        self.release_all(&argv);
                        self.record_error_location(&unwind, rep, argument_line);
                        return Err(unwind);
                    }
                }
            }

            if expand {
                let mut flat = Vec::new();
                for (j, &arg) in argv.iter().enumerate() {
                    if expand_flags[j] {
                        for element in self.heap.list_elements(arg) {
                            self.heap.retain(element);
                            flat.push(element);
                        }
                        self.heap.release(arg);
                    } else {
                        flat.push(arg);
                    }
                }
                argv = flat;
                if argv.is_empty() {
                    continue;
                }
            }

            let dispatch = match self.get_command(argv[0]) {
                Some(cmd) => self.invoke(&cmd, &argv, Some((&rep.file, command_line))),
                None => self.dispatch_unknown(&argv),
            };
            self.release_all(&argv);
            if let Err(unwind) = dispatch {
                self.record_error_location(&unwind, rep, command_line);
                return Err(unwind);
            }
        }
        Ok(())
    }

    fn release_all(&mut self, values: &[ValueId]) {
        for &value in values {
            self.heap.release(value);
        }
    }

    /// Captures file and line for the innermost error and starts a fresh
    /// stack trace.
    fn record_error_location(&mut self, unwind: &Unwind, rep: &ScriptRep, line: u32) {
        if matches!(unwind, Unwind::Error(_)) && !self.error_flag {
            self.error_flag = true;
            self.error_file = Rc::clone(&rep.file);
            self.error_line = line;
            self.reset_stack_trace();
        }
    }

    /// Dispatches a command invocation given as a word vector.
    pub fn eval_vector(&mut self, argv: &[ValueId]) -> Flow {
        assert!(!argv.is_empty(), "empty command vector");
        for &a in argv {
            self.heap.retain(a);
        }
        let result = match self.get_command(argv[0]) {
            Some(cmd) => self.invoke(&cmd, argv, None),
            None => self.dispatch_unknown(argv),
        };
        self.release_all(argv);
        result
    }

    /// Runs a resolved command and stores its result.
    fn invoke(
        &mut self,
        cmd: &Rc<Command>,
        argv: &[ValueId],
        source: Option<(&Rc<str>, u32)>,
    ) -> Flow {
        self.set_empty_result();
        match &cmd.kind {
            CommandKind::Native(native) => {
                let native = Rc::clone(native);
                let value = native.execute(self, argv)?;
                self.set_result(value);
                Ok(value)
            }
            CommandKind::Proc { .. } => {
                let result = self.call_procedure(cmd, argv);
                if let Err(Unwind::Error(_)) = &result {
                    let name = self.heap.string_cloned(argv[0]);
                    let (file, line) = match source {
                        Some((file, line)) => (Rc::clone(file), line),
                        None => (
                            self.shared_strings
                                .intern(tacl_syntax::source::UNKNOWN_FILE),
                            1,
                        ),
                    };
                    self.append_stack_trace(&name, &file, line);
                }
                result
            }
        }
    }

    /// Re-dispatches an unresolved command name through the `unknown`
    /// handler, passing the original words shifted right by one.
    fn dispatch_unknown(&mut self, argv: &[ValueId]) -> Flow {
        let name = self.heap.string_cloned(argv[0]);
        let error = self.error(format!("invalid command name \"{name}\""));
        let unknown = self.unknown_name;
        if self.get_command(unknown).is_none() {
            return Err(error);
        }
        let mut shifted = Vec::with_capacity(argv.len() + 1);
        shifted.push(unknown);
        shifted.extend_from_slice(argv);
        self.eval_vector(&shifted)
    }

    /// Invokes a procedure: arity check, fresh call frame, formal
    /// binding, body evaluation, and `return` translation.
    pub(crate) fn call_procedure(&mut self, cmd: &Command, argv: &[ValueId]) -> Flow {
        let CommandKind::Proc { args, body } = cmd.kind else {
            unreachable!("call_procedure on a native command")
        };
        if !cmd.arity_accepts(argv.len()) {
            let name = self.heap.string_cloned(argv[0]);
            let formals = self.heap.string_cloned(args);
            let space = if cmd.arity_min > 1 { " " } else { "" };
            return Err(
                self.error(format!("wrong # args: should be \"{name}{space}{formals}\""))
            );
        }
        if self.num_levels == self.max_nesting_depth {
            return Err(self.error("Too many nested calls. Infinite recursion?"));
        }

        // The command may be renamed or deleted by its own body; the frame
        // keeps the argument list and body alive.
        self.heap.retain(args);
        self.heap.retain(body);
        let frame = self.new_frame(Some(self.current_frame));
        self.frames[frame].proc_args = Some(args);
        self.frames[frame].proc_body = Some(body);
        let saved_frame = self.current_frame;
        self.current_frame = frame;
        self.num_levels += 1;

        let positional = cmd.arity_min.saturating_sub(1);
        let mut bound: Flow<()> = Ok(());
        for i in 0..positional {
            let formal = self
                .heap
                .list_index(args, i as i64)
                .expect("arity was checked against the formal list");
            if let Err(unwind) = self.set_variable(formal, argv[i + 1]) {
                bound = Err(unwind);
                break;
            }
        }
        if bound.is_ok() && cmd.arity_max.is_none() {
            // The trailing `args` formal collects the remaining words.
            let rest = self.heap.new_list(&argv[cmd.arity_min..]);
            let formal = self
                .heap
                .list_index(args, positional as i64)
                .expect("variadic formal list ends with args");
            if let Err(unwind) = self.set_variable(formal, rest) {
                self.heap.release(rest);
                bound = Err(unwind);
            }
        }

        let result = match bound {
            Ok(()) => self.eval_value(body),
            Err(unwind) => Err(unwind),
        };

        self.num_levels -= 1;
        self.current_frame = saved_frame;
        self.release_frame(frame);

        match result {
            Err(Unwind::Return(_)) => {
                let code = std::mem::replace(&mut self.return_code, ReturnCode::Ok);
                match code {
                    ReturnCode::Ok => Ok(self.result()),
                    ReturnCode::Error => Err(Unwind::Error(self.result())),
                    ReturnCode::Return => Err(Unwind::Return(self.result())),
                    ReturnCode::Break => Err(Unwind::Break),
                    ReturnCode::Continue => Err(Unwind::Continue),
                }
            }
            other => other,
        }
    }

    /// Concatenates an interpolation run into a fresh string value
    /// (refcount zero; the caller takes ownership).
    fn interpolate(&mut self, tokens: &[crate::script::ScriptToken]) -> Flow {
        let mut parts: Vec<ValueId> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let value = match token.kind {
                TokenKind::Esc | TokenKind::Str => Ok(token.value),
                TokenKind::Var => self.get_variable(token.value),
                TokenKind::DictSugar => self.expand_dict_sugar(token.value),
                TokenKind::Cmd => self.eval_value(token.value),
                kind => unreachable!("token {kind:?} inside an interpolation"),
            };
            match value {
                Ok(value) => {
                    self.heap.retain(value);
                    parts.push(value);
                }
                Err(unwind) => {
                    self.release_all(&parts);
                    return Err(unwind);
                }
            }
        }
        let mut text = String::new();
        for &part in &parts {
            text.push_str(self.heap.string(part));
        }
        self.release_all(&parts);
        Ok(self.heap.new_string(text))
    }

    /// `$name(key)` read: the key undergoes full substitution, then the
    /// variable's dict is indexed.
    pub fn expand_dict_sugar(&mut self, sugar_id: ValueId) -> Flow {
        let (name, key) = self.dict_sugar_parts(sugar_id);
        let substituted_key = self.subst_value(key, SubstFlags::empty())?;
        self.heap.retain(substituted_key);
        let outcome = match self.get_variable(name) {
            Err(unwind) => Err(unwind),
            Ok(dict) => match self.heap.dict_get(dict, substituted_key) {
                Ok(Some(value)) => Ok(value),
                _ => {
                    let name_text = self.heap.string_cloned(name);
                    Err(self.error(format!(
                        "Variable '{name_text}' does not contain a valid dictionary"
                    )))
                }
            },
        };
        self.heap.release(substituted_key);
        outcome
    }

    /// Performs backslash, variable, and command substitution over a
    /// template value, honoring the disable flags. Returns a fresh
    /// string value (refcount zero).
    pub fn subst_value(&mut self, id: ValueId, flags: SubstFlags) -> Flow {
        self.heap.retain(id);
        let rep = self.get_subst(id, flags);
        let saved_result = self.result();
        self.heap.retain(saved_result);

        let mut text = String::new();
        let mut failed = None;
        for token in &rep.tokens {
            match token.kind {
                TokenKind::Str | TokenKind::Esc => {
                    text.push_str(self.heap.string(token.value));
                }
                TokenKind::Var => match self.get_variable(token.value) {
                    Ok(value) => text.push_str(self.heap.string(value)),
                    Err(unwind) => {
                        failed = Some(unwind);
                        break;
                    }
                },
                TokenKind::DictSugar => match self.expand_dict_sugar(token.value) {
                    Ok(value) => text.push_str(self.heap.string(value)),
                    Err(unwind) => {
                        failed = Some(unwind);
                        break;
                    }
                },
                TokenKind::Cmd => match self.eval_value(token.value) {
                    Ok(value) => text.push_str(self.heap.string(value)),
                    Err(unwind) => {
                        failed = Some(unwind);
                        break;
                    }
                },
                TokenKind::Eol => {}
                kind => unreachable!("token {kind:?} in a substitution program"),
            }
        }

        let outcome = match failed {
            None => {
                self.set_result(saved_result);
                Ok(self.heap.new_string(text))
            }
            Some(unwind) => Err(unwind),
        };
        self.heap.release(saved_result);
        self.heap.release(id);
        self.heap.reap();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_ok(interp: &mut Interp, script: &str) -> String {
        match interp.eval(script) {
            Ok(value) => interp.get_string(value).to_owned(),
            Err(_) => panic!("script failed: {:?}", interp.result_string()),
        }
    }

    fn eval_err(interp: &mut Interp, script: &str) -> String {
        assert!(interp.eval(script).is_err(), "script should fail");
        interp.result_string()
    }

    #[test]
    fn set_and_read_back() {
        let mut interp = Interp::new();
        assert_eq!(eval_ok(&mut interp, "set x {a b c}"), "a b c");
        assert_eq!(eval_ok(&mut interp, "set x"), "a b c");
        assert_eq!(eval_ok(&mut interp, "llength $x"), "3");
    }

    #[test]
    fn empty_script_yields_empty_result() {
        let mut interp = Interp::new();
        assert_eq!(eval_ok(&mut interp, ""), "");
        assert_eq!(eval_ok(&mut interp, "  \n # nothing \n"), "");
    }

    #[test]
    fn invalid_command_name() {
        let mut interp = Interp::new();
        assert_eq!(
            eval_err(&mut interp, "nosuchcommand"),
            "invalid command name \"nosuchcommand\""
        );
    }

    #[test]
    fn command_substitution() {
        let mut interp = Interp::new();
        assert_eq!(eval_ok(&mut interp, "set x [llength {a b}]"), "2");
    }

    #[test]
    fn interpolation_concatenates() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "set a foo; set b bar");
        assert_eq!(eval_ok(&mut interp, "set c $a$b"), "foobar");
        assert_eq!(eval_ok(&mut interp, "set d x$a[llength {1 2 3}]y"), "xfoo3y");
    }

    #[test]
    fn procedure_call_and_return() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "proc f {a b} { list $b $a }");
        assert_eq!(eval_ok(&mut interp, "f 1 2"), "2 1");
    }

    #[test]
    fn procedure_locals_do_not_leak_out() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "proc f {} { set local 42 }");
        eval_ok(&mut interp, "f");
        assert_eq!(
            eval_err(&mut interp, "set local"),
            "Can't read \"local\": no such variable"
        );
    }

    #[test]
    fn wrong_number_of_arguments() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "proc f {a b} { }");
        assert_eq!(
            eval_err(&mut interp, "f 1"),
            "wrong # args: should be \"f a b\""
        );
    }

    #[test]
    fn variadic_args_collects_the_rest() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "proc f {a args} { list $a $args }");
        assert_eq!(eval_ok(&mut interp, "f 1 2 3"), "1 {2 3}");
        assert_eq!(eval_ok(&mut interp, "f 1"), "1 {}");
    }

    #[test]
    fn return_stops_the_body() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "proc f {} { return early; set never 1 }");
        assert_eq!(eval_ok(&mut interp, "f"), "early");
        assert_eq!(
            eval_err(&mut interp, "set never"),
            "Can't read \"never\": no such variable"
        );
    }

    #[test]
    fn return_code_error_propagates() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "proc f {} { return -code error boom }");
        assert_eq!(eval_err(&mut interp, "f"), "boom");
    }

    #[test]
    fn expand_splices_list_arguments() {
        let mut interp = Interp::new();
        assert_eq!(eval_ok(&mut interp, "llength [list {expand}{a b c}]"), "3");
        eval_ok(&mut interp, "set parts {x y}");
        assert_eq!(eval_ok(&mut interp, "list {expand}$parts z"), "x y z");
    }

    #[test]
    fn unknown_handler_receives_the_command() {
        let mut interp = Interp::new();
        eval_ok(
            &mut interp,
            "proc unknown {args} { list called {expand}$args }",
        );
        assert_eq!(eval_ok(&mut interp, "ghost 1 2"), "called ghost 1 2");
    }

    #[test]
    fn recursion_limit() {
        let mut interp = Interp::new();
        interp.max_nesting_depth = 10;
        eval_ok(&mut interp, "proc f {} { f }");
        assert_eq!(
            eval_err(&mut interp, "f"),
            "Too many nested calls. Infinite recursion?"
        );
    }

    #[test]
    fn dict_sugar_reads_and_writes() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "set d(k1) v1");
        eval_ok(&mut interp, "set d(k2) v2");
        assert_eq!(eval_ok(&mut interp, "set x $d(k2)"), "v2");
        assert_eq!(
            eval_err(&mut interp, "set x $missing(k)"),
            "Can't read \"missing\": no such variable"
        );
    }

    #[test]
    fn dict_sugar_key_is_substituted() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "set d(k2) hit");
        eval_ok(&mut interp, "set which k2");
        assert_eq!(eval_ok(&mut interp, "set x $d($which)"), "hit");
    }

    #[test]
    fn subst_command_modes() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "set v world");
        assert_eq!(eval_ok(&mut interp, "subst {hello $v}"), "hello world");
        assert_eq!(
            eval_ok(&mut interp, "subst -novariables {hello $v}"),
            "hello $v"
        );
        assert_eq!(
            eval_ok(&mut interp, r"subst {tab\there}"),
            "tab\there"
        );
        assert_eq!(
            eval_ok(&mut interp, r"subst -nobackslashes {tab\there}"),
            r"tab\there"
        );
        assert_eq!(
            eval_ok(&mut interp, "subst -nocommands {a [llength {1 2}] b}"),
            "a [llength {1 2}] b"
        );
        assert_eq!(
            eval_ok(&mut interp, "subst {a [llength {1 2}] b}"),
            "a 2 b"
        );
    }

    #[test]
    fn eval_of_pure_list_uses_the_vector_path() {
        let mut interp = Interp::new();
        assert_eq!(eval_ok(&mut interp, "eval [list set q 7]"), "7");
        assert_eq!(eval_ok(&mut interp, "set q"), "7");
    }

    #[test]
    fn semicolons_and_comments() {
        let mut interp = Interp::new();
        assert_eq!(
            eval_ok(&mut interp, "set a 1; set b 2 ;# trailing comment ok?"),
            "2"
        );
        assert_eq!(eval_ok(&mut interp, "set a"), "1");
    }

    #[test]
    fn error_reports_innermost_location() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "proc f {} { g }");
        eval_ok(&mut interp, "proc g {} { nosuch }");
        assert_eq!(
            eval_err(&mut interp, "f"),
            "invalid command name \"nosuch\""
        );
        // Two procedure frames were recorded, innermost first.
        let trace = interp.stack_trace_value();
        assert_eq!(interp.heap.list_length(trace) % 3, 0);
        let elements = interp.heap.list_elements(trace);
        assert_eq!(interp.get_string(elements[0]), "g");
        assert_eq!(interp.get_string(elements[3]), "f");
    }

    #[test]
    fn script_rewriting_itself_keeps_running() {
        let mut interp = Interp::new();
        eval_ok(&mut interp, "set x {set y 1; set x {}; set y 2}");
        assert_eq!(eval_ok(&mut interp, "eval $x"), "2");
        assert_eq!(eval_ok(&mut interp, "set y"), "2");
        assert_eq!(eval_ok(&mut interp, "set x"), "");
    }
}
