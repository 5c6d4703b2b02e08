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

//! The interpreter
//!
//! [`Interp`] owns everything: the value heap, the call-frame arena, the
//! command and reference tables, the shared-string interner, the current
//! result and stack trace, and the epoch counters that scope the command
//! and variable caches. A single interpreter is single-threaded and
//! non-reentrant at the granularity of an `eval`.
//!
//! The methods here are the state-keeping half of the embedder API; the
//! evaluator, expression VM, and collector contribute the rest from their
//! own modules.

use crate::command::Command;
use crate::gc::RefEntry;
use crate::heap::{Heap, ValueId};
use crate::intern::SharedStrings;
use crate::semantics::{Flow, ReturnCode, Unwind};
use crate::value::{Repr, ValueError};
use crate::var::CallFrame;
use slab::Slab;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

/// Default procedure-call depth limit
const MAX_NESTING_DEPTH: usize = 1000;

/// A tacl interpreter
pub struct Interp {
    pub(crate) heap: Heap,
    pub(crate) frames: Slab<CallFrame>,
    /// Frame commands currently resolve against
    pub(crate) current_frame: usize,
    /// The global frame
    pub(crate) top_frame: usize,
    pub(crate) next_frame_id: u64,
    pub(crate) commands: HashMap<String, Rc<Command>>,
    /// Bumped by command creation, rename, and deletion; scopes the
    /// command-name caches
    pub(crate) proc_epoch: u64,
    pub(crate) references: HashMap<u64, RefEntry>,
    pub(crate) next_reference_id: u64,
    pub(crate) last_collect_id: u64,
    pub(crate) last_collect_time: Instant,
    pub(crate) collecting: bool,
    pub(crate) shared_strings: SharedStrings,
    result: ValueId,
    /// Code carried by an unwinding `return`, consumed at the procedure
    /// boundary
    pub(crate) return_code: ReturnCode,
    stack_trace: ValueId,
    pub(crate) error_file: Rc<str>,
    pub(crate) error_line: u32,
    /// Set once the innermost error location is captured
    pub(crate) error_flag: bool,
    /// Shared empty-string value, never released
    empty: ValueId,
    /// The string "unknown", kept so the fallback lookup is cached
    pub(crate) unknown_name: ValueId,
    pub(crate) num_levels: usize,
    /// Procedure-call depth limit; exceeding it is a hard error
    pub max_nesting_depth: usize,
}

impl Interp {
    /// Creates an interpreter with the core commands registered.
    #[must_use]
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let empty = heap.new_string("");
        heap.retain(empty);
        heap.retain(empty); // once as the sentinel, once as the result
        let trace = heap.new_list(&[]);
        heap.retain(trace);
        let unknown_name = heap.new_string("unknown");
        heap.retain(unknown_name);
        let mut shared_strings = SharedStrings::new();
        let error_file = shared_strings.intern(tacl_syntax::source::UNKNOWN_FILE);

        let mut interp = Interp {
            heap,
            frames: Slab::new(),
            current_frame: 0,
            top_frame: 0,
            next_frame_id: 0,
            commands: HashMap::new(),
            proc_epoch: 0,
            references: HashMap::new(),
            next_reference_id: 0,
            last_collect_id: 0,
            last_collect_time: Instant::now(),
            collecting: false,
            shared_strings,
            result: empty,
            return_code: ReturnCode::Ok,
            stack_trace: trace,
            error_file,
            error_line: 0,
            error_flag: false,
            empty,
            unknown_name,
            num_levels: 0,
            max_nesting_depth: MAX_NESTING_DEPTH,
        };
        let global = interp.new_frame(None);
        interp.current_frame = global;
        interp.top_frame = global;
        crate::cmds::register_core_commands(&mut interp);
        interp
    }

    pub(crate) fn fresh_frame_id(&mut self) -> u64 {
        let id = self.next_frame_id;
        self.next_frame_id += 1;
        id
    }

    /// The current result value.
    #[must_use]
    pub fn result(&self) -> ValueId {
        self.result
    }

    /// The current result as a string.
    pub fn result_string(&mut self) -> String {
        let result = self.result;
        self.heap.string_cloned(result)
    }

    /// Replaces the result, retaining the new value.
    pub fn set_result(&mut self, value: ValueId) {
        self.heap.retain(value);
        let old = std::mem::replace(&mut self.result, value);
        self.heap.release(old);
    }

    /// Sets the result to a fresh string value.
    pub fn set_result_string(&mut self, text: impl Into<String>) {
        let value = self.heap.new_string(text.into());
        self.set_result(value);
    }

    /// Resets the result to the empty string.
    pub fn set_empty_result(&mut self) {
        let empty = self.empty;
        self.set_result(empty);
    }

    /// Builds an error unwind carrying a fresh message value; the message
    /// is also stored as the result.
    pub(crate) fn error(&mut self, message: impl Into<String>) -> Unwind {
        self.set_result_string(message.into());
        Unwind::Error(self.result)
    }

    /// Builds an error unwind from an existing message value.
    pub(crate) fn error_value(&mut self, message: ValueId) -> Unwind {
        self.set_result(message);
        Unwind::Error(self.result)
    }

    pub(crate) fn value_err(&mut self, error: ValueError) -> Unwind {
        self.error(error.to_string())
    }

    /// Builds the standard arity-violation error. `prefix` is the leading
    /// words to echo (usually just the command name), `usage` the formal
    /// description of the remaining arguments.
    pub fn wrong_num_args(&mut self, prefix: &[ValueId], usage: &str) -> Unwind {
        let mut message = String::from("wrong # args: should be \"");
        for &word in prefix {
            message.push_str(self.heap.string(word));
            message.push(' ');
        }
        message.push_str(usage);
        // A trailing space is left behind when there is no usage text.
        if usage.is_empty() {
            message.pop();
        }
        message.push('"');
        self.error(message)
    }

    /// Appends one `(procname, file, line)` frame to the stack trace.
    pub(crate) fn append_stack_trace(&mut self, name: &str, file: &Rc<str>, line: u32) {
        if self.heap.is_shared(self.stack_trace) {
            let copy = self.heap.dup(self.stack_trace);
            self.heap.retain(copy);
            let old = std::mem::replace(&mut self.stack_trace, copy);
            self.heap.release(old);
        }
        let trace = self.stack_trace;
        let name = self.heap.new_string(name);
        let file = self.heap.new_string(&**file);
        let line = self.heap.alloc(None, Repr::Int(i64::from(line)));
        self.heap.list_append(trace, name);
        self.heap.list_append(trace, file);
        self.heap.list_append(trace, line);
    }

    /// Starts a fresh, empty stack trace.
    pub(crate) fn reset_stack_trace(&mut self) {
        let fresh = self.heap.new_list(&[]);
        self.heap.retain(fresh);
        let old = std::mem::replace(&mut self.stack_trace, fresh);
        self.heap.release(old);
    }

    /// The stack trace of the most recent error: a flat list of
    /// `(procname, file, line)` triples, innermost first.
    #[must_use]
    pub fn stack_trace_value(&self) -> ValueId {
        self.stack_trace
    }

    /// File and line captured for the most recent error.
    #[must_use]
    pub fn error_location(&self) -> (Rc<str>, u32) {
        (Rc::clone(&self.error_file), self.error_line)
    }

    // ------------------------------------------------------------------
    // Value construction and inspection
    // ------------------------------------------------------------------

    /// Allocates a string value (refcount zero).
    pub fn new_string(&mut self, text: impl Into<String>) -> ValueId {
        self.heap.new_string(text.into())
    }

    /// Allocates an integer value (refcount zero).
    pub fn new_int(&mut self, value: i64) -> ValueId {
        self.heap.alloc(None, Repr::Int(value))
    }

    /// Allocates a double value (refcount zero).
    pub fn new_double(&mut self, value: f64) -> ValueId {
        self.heap.alloc(None, Repr::Double(value))
    }

    /// Allocates a list value over the elements (refcount zero).
    pub fn new_list(&mut self, elements: &[ValueId]) -> ValueId {
        self.heap.new_list(elements)
    }

    /// Allocates a dict value from alternating keys and values (refcount
    /// zero). The element count must be even.
    pub fn new_dict(&mut self, pairs: &[ValueId]) -> ValueId {
        self.heap.new_dict(pairs)
    }

    /// Adds a reference to a value.
    pub fn retain(&mut self, value: ValueId) {
        self.heap.retain(value);
    }

    /// Drops a reference to a value.
    pub fn release(&mut self, value: ValueId) {
        self.heap.release(value);
    }

    /// The string form of a value.
    pub fn get_string(&mut self, value: ValueId) -> &str {
        self.heap.string(value)
    }

    /// The integer interpretation of a value.
    pub fn get_int(&mut self, value: ValueId) -> Flow<i64> {
        match self.heap.get_int(value) {
            Ok(v) => Ok(v),
            Err(error) => Err(self.value_err(error)),
        }
    }

    /// The double interpretation of a value.
    pub fn get_double(&mut self, value: ValueId) -> Flow<f64> {
        match self.heap.get_double(value) {
            Ok(v) => Ok(v),
            Err(error) => Err(self.value_err(error)),
        }
    }

    /// The index interpretation of a value (`N`, `end`, `end-N`).
    pub fn get_index(&mut self, value: ValueId) -> Flow<i64> {
        match self.heap.get_index(value) {
            Ok(v) => Ok(v),
            Err(error) => Err(self.value_err(error)),
        }
    }

    /// The return-code interpretation of a value.
    pub fn get_return_code(&mut self, value: ValueId) -> Flow<ReturnCode> {
        match self.heap.get_return_code(value) {
            Ok(v) => Ok(v),
            Err(error) => Err(self.value_err(error)),
        }
    }

    /// Number of elements of a value interpreted as a list.
    pub fn list_length(&mut self, value: ValueId) -> usize {
        self.heap.list_length(value)
    }

    /// Element of a list value at an encoded index.
    pub fn list_index(&mut self, list: ValueId, index: i64) -> Flow {
        match self.heap.list_index(list, index) {
            Some(element) => Ok(element),
            None => Err(self.error("list index out of range")),
        }
    }

    /// Appends the strings to the current result, copying the result
    /// first if it is shared.
    pub fn append_result_strings(&mut self, parts: &[&str]) {
        let mut text = self.result_string();
        for part in parts {
            text.push_str(part);
        }
        self.set_result_string(text);
    }

    /// Appends an element to a list value in place. The list must be
    /// unshared.
    pub fn list_append(&mut self, list: ValueId, element: ValueId) {
        self.heap.list_append(list, element);
    }

    /// Appends every element of another list in place. The target must be
    /// unshared.
    pub fn list_append_list(&mut self, list: ValueId, other: ValueId) {
        self.heap.list_append_list(list, other);
    }

    /// Adds or replaces a dict entry in place. The dict must be unshared.
    pub fn dict_add(&mut self, dict: ValueId, key: ValueId, value: ValueId) -> Flow<()> {
        if let Err(error) = self.heap.ensure_dict(dict) {
            return Err(self.error(error.to_string()));
        }
        self.heap.dict_put(dict, key, value);
        self.heap.invalidate_string(dict);
        Ok(())
    }

    /// Appends text to a string value in place. The value must be
    /// unshared.
    pub fn append_string(&mut self, value: ValueId, text: &str) {
        assert!(
            !self.heap.is_shared(value),
            "append_string called with a shared value"
        );
        self.heap.ensure_string(value);
        self.heap.set_repr(value, Repr::None);
        self.heap
            .slot_mut(value)
            .bytes
            .as_mut()
            .expect("string form was just generated")
            .push_str(text);
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_interpreter_has_an_empty_result() {
        let mut interp = Interp::new();
        assert_eq!(interp.result_string(), "");
    }

    #[test]
    fn result_replacement_retains_and_releases() {
        let mut interp = Interp::new();
        let a = interp.new_string("a");
        interp.set_result(a);
        assert_eq!(interp.result_string(), "a");
        let b = interp.new_string("b");
        interp.set_result(b);
        assert_eq!(interp.result_string(), "b");
        interp.set_empty_result();
        assert_eq!(interp.result_string(), "");
    }

    #[test]
    fn wrong_num_args_message_shape() {
        let mut interp = Interp::new();
        let name = interp.new_string("set");
        interp.retain(name);
        let _ = interp.wrong_num_args(&[name], "varName ?newValue?");
        assert_eq!(
            interp.result_string(),
            "wrong # args: should be \"set varName ?newValue?\""
        );
        let _ = interp.wrong_num_args(&[name], "");
        assert_eq!(interp.result_string(), "wrong # args: should be \"set\"");
        interp.release(name);
    }

    #[test]
    fn value_constructors_round_trip() {
        let mut interp = Interp::new();
        let i = interp.new_int(42);
        assert_eq!(interp.get_string(i), "42");
        let d = interp.new_double(2.5);
        assert_eq!(interp.get_string(d), "2.5");
        let items = [i, d];
        let l = interp.new_list(&items);
        assert_eq!(interp.get_string(l), "42 2.5");
        interp.release(l);
    }

    #[test]
    fn append_string_mutates_in_place() {
        let mut interp = Interp::new();
        let v = interp.new_int(1);
        interp.retain(v);
        interp.append_string(v, "x");
        assert_eq!(interp.get_string(v), "1x");
        // The integer form is gone; the value is a plain string now.
        assert!(interp.get_int(v).is_err());
        interp.release(v);
    }

    #[test]
    fn stack_trace_is_a_flat_triple_list() {
        let mut interp = Interp::new();
        let file = interp.shared_strings.intern("main.tcl");
        interp.append_stack_trace("f", &file, 3);
        interp.append_stack_trace("g", &file, 9);
        let trace = interp.stack_trace_value();
        assert_eq!(interp.heap.list_length(trace), 6);
        let elements = interp.heap.list_elements(trace);
        assert_eq!(interp.get_string(elements[0]), "f");
        assert_eq!(interp.get_string(elements[2]), "3");
        assert_eq!(interp.get_string(elements[3]), "g");
    }
}
