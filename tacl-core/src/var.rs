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

//! Variables and call frames
//!
//! A call frame owns a table of named variables; a variable holds either a
//! value or a link to a variable in another frame (`upvar`/`global`).
//! Links store the target frame's slot and id plus the target name, so
//! every dereference re-resolves through a validity check instead of
//! trusting a stale pointer.
//!
//! Frames live in a slot arena that doubles as the free-frame pool. Each
//! frame has a monotonically increasing id; `unset` assigns the owning
//! frame a fresh id, which invalidates the
//! [`VarName`](crate::value::Repr::VarName) caches scoped to it.

use crate::heap::ValueId;
use crate::interp::Interp;
use crate::semantics::Flow;
use crate::value::Repr;
use std::collections::HashMap;

/// A variable: a value of its own, or a link to a variable elsewhere
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Var {
    /// Plain variable holding a retained value
    Value(ValueId),
    /// `upvar`-style link to `name` in the frame at `slot`
    Link {
        slot: usize,
        frame_id: u64,
        /// Retained value holding the target variable name
        name: ValueId,
    },
}

/// One procedure activation record (the global scope is frame 0)
#[derive(Debug, Default)]
pub(crate) struct CallFrame {
    /// Cache-validity id; fresh on allocation and after every `unset`
    pub id: u64,
    /// Enclosing frame's slot, `None` for the global frame
    pub parent: Option<usize>,
    pub vars: HashMap<String, Var>,
    /// The running procedure's formal argument list (retained)
    pub proc_args: Option<ValueId>,
    /// The running procedure's body (retained)
    pub proc_body: Option<ValueId>,
}

/// Whether a name is `[dict]` syntax sugar, i.e. of the form `name(key)`.
pub(crate) fn name_is_dict_sugar(name: &str) -> bool {
    name.ends_with(')') && name.contains('(')
}

/// Splits `name(key)` into the variable name and the key text.
pub(crate) fn split_dict_sugar(name: &str) -> (&str, &str) {
    let open = name.find('(').expect("caller checked the sugar shape");
    (&name[..open], &name[open + 1..name.len() - 1])
}

/// Outcome of resolving a name in the current frame
enum VarLookup {
    Found(Var),
    NotFound,
    DictSugar,
}

impl Interp {
    /// Allocates a call frame with a fresh id and returns its slot.
    pub(crate) fn new_frame(&mut self, parent: Option<usize>) -> usize {
        let id = self.fresh_frame_id();
        self.frames.insert(CallFrame {
            id,
            parent,
            vars: HashMap::new(),
            proc_args: None,
            proc_body: None,
        })
    }

    /// Releases a frame's variables and procedure values and returns the
    /// slot to the pool.
    pub(crate) fn release_frame(&mut self, slot: usize) {
        let frame = self.frames.remove(slot);
        for var in frame.vars.into_values() {
            match var {
                Var::Value(v) => self.heap.release(v),
                Var::Link { name, .. } => self.heap.release(name),
            }
        }
        if let Some(args) = frame.proc_args {
            self.heap.release(args);
        }
        if let Some(body) = frame.proc_body {
            self.heap.release(body);
        }
    }

    /// Resolves a level description (`N` or `#N`, as for `upvar` and
    /// `uplevel`) to a frame slot. `None` means one level up.
    pub fn get_call_frame_by_level(&mut self, level: Option<ValueId>) -> Flow<usize> {
        let mut back = match level {
            None => 1,
            Some(level_id) => {
                let s = self.heap.string_cloned(level_id);
                if let Some(absolute) = s.strip_prefix('#') {
                    match absolute.parse::<i64>() {
                        Ok(n) if n >= 0 && self.num_levels as i64 - n >= 0 => {
                            self.num_levels as i64 - n
                        }
                        _ => return Err(self.error("Bad level")),
                    }
                } else {
                    match self.heap.get_int(level_id) {
                        Ok(n) if n >= 0 => n,
                        _ => return Err(self.error("Bad level")),
                    }
                }
            }
        };
        let mut slot = self.current_frame;
        while back > 0 {
            match self.frames[slot].parent {
                Some(parent) => slot = parent,
                None => return Err(self.error("Bad level")),
            }
            back -= 1;
        }
        Ok(slot)
    }

    /// Resolves a name value against the current frame, maintaining the
    /// name's variable cache.
    fn lookup_var(&mut self, name_id: ValueId) -> VarLookup {
        let current_id = self.frames[self.current_frame].id;
        if let Repr::VarName { frame_id } = self.heap.slot(name_id).repr {
            if frame_id == current_id {
                if let Some(bytes) = self.heap.slot(name_id).bytes.as_deref() {
                    if let Some(&var) = self.frames[self.current_frame].vars.get(bytes) {
                        return VarLookup::Found(var);
                    }
                }
            }
        }
        let name = self.heap.string_cloned(name_id);
        if name_is_dict_sugar(&name) {
            return VarLookup::DictSugar;
        }
        match self.frames[self.current_frame].vars.get(&name) {
            Some(&var) => {
                self.heap.set_repr(
                    name_id,
                    Repr::VarName {
                        frame_id: current_id,
                    },
                );
                VarLookup::Found(var)
            }
            None => VarLookup::NotFound,
        }
    }

    /// Checks that a link still points at the frame it was created
    /// against.
    fn link_target(&mut self, slot: usize, frame_id: u64, name_id: ValueId) -> Flow<usize> {
        match self.frames.get(slot) {
            Some(frame) if frame.id == frame_id => Ok(slot),
            _ => {
                let name = self.heap.string_cloned(name_id);
                Err(self.error(format!("Can't read \"{name}\": no such variable")))
            }
        }
    }

    /// Binds `value` to the variable named by `name_id` in the current
    /// frame, creating it if needed and following links.
    pub fn set_variable(&mut self, name_id: ValueId, value: ValueId) -> Flow<()> {
        match self.lookup_var(name_id) {
            VarLookup::DictSugar => {
                self.dict_sugar_set(name_id, Some(value))?;
                Ok(())
            }
            VarLookup::NotFound => {
                let name = self.heap.string_cloned(name_id);
                self.heap.retain(value);
                let current_id = self.frames[self.current_frame].id;
                self.frames[self.current_frame]
                    .vars
                    .insert(name, Var::Value(value));
                self.heap.set_repr(
                    name_id,
                    Repr::VarName {
                        frame_id: current_id,
                    },
                );
                Ok(())
            }
            VarLookup::Found(Var::Value(old)) => {
                let name = self.heap.string_cloned(name_id);
                self.heap.retain(value);
                self.frames[self.current_frame]
                    .vars
                    .insert(name, Var::Value(value));
                self.heap.release(old);
                Ok(())
            }
            VarLookup::Found(Var::Link {
                slot,
                frame_id,
                name,
            }) => {
                let target = self.link_target(slot, frame_id, name)?;
                let saved = self.current_frame;
                self.current_frame = target;
                let result = self.set_variable(name, value);
                self.current_frame = saved;
                result
            }
        }
    }

    /// Convenience wrapper creating both name and value strings.
    pub fn set_variable_str(&mut self, name: &str, value: &str) -> Flow<()> {
        let name_id = self.new_string(name);
        let value_id = self.new_string(value);
        self.retain(name_id);
        self.retain(value_id);
        let result = self.set_variable(name_id, value_id);
        self.release(name_id);
        self.release(value_id);
        result
    }

    /// The value of the variable named by `name_id`, following links and
    /// expanding dict sugar.
    pub fn get_variable(&mut self, name_id: ValueId) -> Flow<ValueId> {
        match self.get_variable_inner(name_id, true)? {
            Some(value) => Ok(value),
            None => unreachable!("missing variable reports an error"),
        }
    }

    /// Like [`get_variable`](Self::get_variable) but a missing variable is
    /// `None` instead of an error.
    pub fn get_variable_opt(&mut self, name_id: ValueId) -> Option<ValueId> {
        self.get_variable_inner(name_id, false).ok().flatten()
    }

    fn get_variable_inner(&mut self, name_id: ValueId, errmsg: bool) -> Flow<Option<ValueId>> {
        match self.lookup_var(name_id) {
            VarLookup::DictSugar => {
                if errmsg {
                    self.expand_dict_sugar(name_id).map(Some)
                } else {
                    Ok(self.expand_dict_sugar(name_id).ok())
                }
            }
            VarLookup::NotFound => {
                if errmsg {
                    let name = self.heap.string_cloned(name_id);
                    Err(self.error(format!("Can't read \"{name}\": no such variable")))
                } else {
                    Ok(None)
                }
            }
            VarLookup::Found(Var::Value(value)) => Ok(Some(value)),
            VarLookup::Found(Var::Link {
                slot,
                frame_id,
                name,
            }) => {
                let target = self.link_target(slot, frame_id, name)?;
                let saved = self.current_frame;
                self.current_frame = target;
                let result = self.get_variable_inner(name, errmsg);
                self.current_frame = saved;
                result
            }
        }
    }

    /// Convenience wrapper looking a variable up by plain name.
    pub fn get_variable_str(&mut self, name: &str) -> Flow<ValueId> {
        let name_id = self.new_string(name);
        self.retain(name_id);
        let result = self.get_variable(name_id);
        self.release(name_id);
        result
    }

    /// Removes the variable named by `name_id` from its frame.
    ///
    /// On success the owning frame gets a fresh id, invalidating variable
    /// caches scoped to it.
    pub fn unset_variable(&mut self, name_id: ValueId) -> Flow<()> {
        match self.lookup_var(name_id) {
            VarLookup::DictSugar => {
                self.dict_sugar_set(name_id, None)?;
                Ok(())
            }
            VarLookup::NotFound => {
                let name = self.heap.string_cloned(name_id);
                Err(self.error(format!("Can't unset \"{name}\": no such variable")))
            }
            VarLookup::Found(Var::Value(_)) => {
                let name = self.heap.string_cloned(name_id);
                let Some(var) = self.frames[self.current_frame].vars.remove(&name) else {
                    unreachable!("variable was just found")
                };
                if let Var::Value(value) = var {
                    self.heap.release(value);
                }
                let fresh = self.fresh_frame_id();
                self.frames[self.current_frame].id = fresh;
                Ok(())
            }
            VarLookup::Found(Var::Link {
                slot,
                frame_id,
                name,
            }) => {
                let target = self.link_target(slot, frame_id, name)?;
                let saved = self.current_frame;
                self.current_frame = target;
                let result = self.unset_variable(name);
                self.current_frame = saved;
                result
            }
        }
    }

    /// Creates a link variable: `name_id` in the current frame becomes an
    /// alias for `target_name` in the frame at `target_slot`.
    pub fn set_variable_link(
        &mut self,
        name_id: ValueId,
        target_name: ValueId,
        target_slot: usize,
    ) -> Flow<()> {
        // Cycles are only possible when linking within one frame
        // (`upvar 0`); walk the existing link chain to refuse them.
        if self.current_frame == target_slot {
            let mut obj = target_name;
            loop {
                if self.heap.strings_equal(obj, name_id) {
                    return Err(self.error("can't upvar from variable to itself"));
                }
                let text = self.heap.string_cloned(obj);
                match self.frames[self.current_frame].vars.get(&text) {
                    Some(&Var::Link { slot, name, .. }) if slot == target_slot => obj = name,
                    _ => break,
                }
            }
        }
        let name = self.heap.string_cloned(name_id);
        if name_is_dict_sugar(&name) {
            return Err(self.error("Dict key syntax invalid as link source"));
        }
        // Re-binding an existing variable drops its old contents.
        if let Some(old) = self.frames[self.current_frame].vars.remove(&name) {
            match old {
                Var::Value(v) => self.heap.release(v),
                Var::Link { name: n, .. } => self.heap.release(n),
            }
        }
        self.heap.retain(target_name);
        let frame_id = self.frames[target_slot].id;
        self.frames[self.current_frame].vars.insert(
            name,
            Var::Link {
                slot: target_slot,
                frame_id,
                name: target_name,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::Unwind;

    #[test]
    fn dict_sugar_shape() {
        assert!(name_is_dict_sugar("a(k)"));
        assert!(name_is_dict_sugar("a(k(l))"));
        assert!(!name_is_dict_sugar("a"));
        assert!(!name_is_dict_sugar("a(k"));
        assert!(!name_is_dict_sugar("ak)"));
        assert_eq!(split_dict_sugar("foo(bar)"), ("foo", "bar"));
        assert_eq!(split_dict_sugar("foo()"), ("foo", ""));
    }

    #[test]
    fn set_get_roundtrip() {
        let mut interp = Interp::new();
        interp.set_variable_str("x", "hello").unwrap();
        let value = interp.get_variable_str("x").unwrap();
        assert_eq!(interp.get_string(value), "hello");
    }

    #[test]
    fn missing_variable_message() {
        let mut interp = Interp::new();
        let error = interp.get_variable_str("ghost").unwrap_err();
        assert!(matches!(error, Unwind::Error(_)));
        assert_eq!(
            interp.result_string(),
            "Can't read \"ghost\": no such variable"
        );
    }

    #[test]
    fn unset_removes_and_bumps_frame_id() {
        let mut interp = Interp::new();
        interp.set_variable_str("x", "1").unwrap();
        let before = interp.frames[interp.current_frame].id;
        let name = interp.new_string("x");
        interp.retain(name);
        interp.unset_variable(name).unwrap();
        interp.release(name);
        assert!(interp.frames[interp.current_frame].id > before);
        assert!(interp.get_variable_str("x").is_err());
    }

    #[test]
    fn variable_cache_invalidated_by_unset() {
        let mut interp = Interp::new();
        interp.set_variable_str("x", "1").unwrap();
        let name = interp.new_string("x");
        interp.retain(name);
        assert!(interp.get_variable(name).is_ok());
        assert!(matches!(
            interp.heap.slot(name).repr,
            Repr::VarName { .. }
        ));
        interp.unset_variable(name).unwrap();
        // The cached frame id no longer matches; the lookup must miss.
        assert!(interp.get_variable(name).is_err());
        interp.release(name);
    }

    #[test]
    fn self_link_is_rejected() {
        let mut interp = Interp::new();
        let name = interp.new_string("x");
        interp.retain(name);
        let error = interp.set_variable_link(name, name, interp.current_frame);
        assert!(error.is_err());
        assert_eq!(
            interp.result_string(),
            "can't upvar from variable to itself"
        );
        interp.release(name);
    }
}
