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

//! The value heap
//!
//! Values live in a slot arena owned by the interpreter and are named by
//! copyable [`ValueId`] handles. Each slot carries the dual representation
//! (optional byte string plus optional structured form) and a reference
//! count. A fresh value starts with a count of zero: the first
//! [`retain`](Heap::retain) decides liveness, and the release that brings
//! the count to or below zero destroys the value. Releasing a dead handle
//! panics; that is a contract violation inside the interpreter, never a
//! script-level error.
//!
//! Script and expression programs are `Rc`-shared between their value slot
//! and any evaluator currently running them. When the slot dies first, the
//! program is parked in a graveyard and its token values are released by
//! [`reap`](Heap::reap) once the last clone is gone.

use crate::command::{Command, CommandKind};
use crate::expr::ExprProgram;
use crate::script::ScriptRep;
use crate::value::Repr;
use slab::Slab;
use std::rc::Rc;

/// Handle naming a value in the interpreter's heap
///
/// Handles are plain indices: cheap to copy, stable for the lifetime of the
/// value, and only meaningful together with the interpreter that issued
/// them. A handle kept across the release of its value is dangling; the
/// reference-count discipline makes sure core code never does that.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ValueId(pub(crate) usize);

/// One heap slot: the dual representation plus the reference count
#[derive(Debug)]
pub(crate) struct Slot {
    /// Byte-string form, absent until generated from the structured form
    pub bytes: Option<String>,
    /// Structured form; `Repr::None` for a plain string
    pub repr: Repr,
    /// Number of live references; fresh values start at zero
    pub refcount: isize,
}

/// Program representation whose owning value died while an evaluator still
/// holds a clone
#[derive(Debug)]
pub(crate) enum DeadRep {
    Script(Rc<ScriptRep>),
    Expr(Rc<ExprProgram>),
    Command(Rc<Command>),
}

impl DeadRep {
    fn strong_count(&self) -> usize {
        match self {
            DeadRep::Script(rc) => Rc::strong_count(rc),
            DeadRep::Expr(rc) => Rc::strong_count(rc),
            DeadRep::Command(rc) => Rc::strong_count(rc),
        }
    }
}

/// Arena of value slots
#[derive(Debug, Default)]
pub(crate) struct Heap {
    slots: Slab<Slot>,
    dead: Vec<DeadRep>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    /// Allocates a value with the given representations and refcount zero.
    pub fn alloc(&mut self, bytes: Option<String>, repr: Repr) -> ValueId {
        debug_assert!(
            bytes.is_some() || !matches!(repr, Repr::None),
            "a value needs at least one representation"
        );
        ValueId(self.slots.insert(Slot {
            bytes,
            repr,
            refcount: 0,
        }))
    }

    /// Allocates a plain string value.
    pub fn new_string(&mut self, s: impl Into<String>) -> ValueId {
        self.alloc(Some(s.into()), Repr::None)
    }

    pub fn slot(&self, id: ValueId) -> &Slot {
        self.slots
            .get(id.0)
            .unwrap_or_else(|| panic!("use of dead value handle {id:?}"))
    }

    pub fn slot_mut(&mut self, id: ValueId) -> &mut Slot {
        self.slots
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("use of dead value handle {id:?}"))
    }

    pub fn retain(&mut self, id: ValueId) {
        self.slot_mut(id).refcount += 1;
    }

    /// Drops one reference; destroys the value when none remain.
    pub fn release(&mut self, id: ValueId) {
        let Some(slot) = self.slots.get_mut(id.0) else {
            panic!("value {id:?} double freed");
        };
        slot.refcount -= 1;
        if slot.refcount > 0 {
            return;
        }
        let slot = self.slots.remove(id.0);
        self.free_repr(slot.repr);
    }

    /// Whether more than one reference is live.
    ///
    /// Mutators must duplicate shared values instead of changing them in
    /// place.
    pub fn is_shared(&self, id: ValueId) -> bool {
        self.slot(id).refcount > 1
    }

    /// Releases the child handles of a structured form being discarded.
    ///
    /// Program forms that may still be running are parked in the graveyard
    /// instead; see [`reap`](Heap::reap).
    pub fn free_repr(&mut self, repr: Repr) {
        match repr {
            Repr::List(items) => {
                for item in items {
                    self.release(item);
                }
            }
            Repr::Dict(dict) => {
                for (key, value) in dict.entries {
                    self.release(key);
                    self.release(value);
                }
            }
            Repr::DictSugar { name, key } => {
                self.release(name);
                self.release(key);
            }
            Repr::Script(rc) => self.dead.push(DeadRep::Script(rc)),
            Repr::Expr(rc) => self.dead.push(DeadRep::Expr(rc)),
            // The command table owns the procedure's values; the cache only
            // borrowed the Rc.
            Repr::CmdName { .. } => {}
            Repr::None
            | Repr::Int(_)
            | Repr::Double(_)
            | Repr::Index(_)
            | Repr::ReturnCode(_)
            | Repr::Source(_)
            | Repr::VarName { .. }
            | Repr::CheckedLiteral(_)
            | Repr::Reference { .. } => {}
        }
    }

    /// Parks a deleted command so its argument and body values are released
    /// once no invocation holds it.
    pub fn park_command(&mut self, cmd: Rc<Command>) {
        self.dead.push(DeadRep::Command(cmd));
    }

    /// Frees graveyard entries whose last holder is gone.
    ///
    /// Releasing a program's token values can kill nested program values in
    /// turn, so the scan repeats until it makes no progress.
    pub fn reap(&mut self) {
        loop {
            let Some(pos) = self.dead.iter().position(|d| d.strong_count() == 1) else {
                return;
            };
            match self.dead.swap_remove(pos) {
                DeadRep::Script(rc) => {
                    let Ok(rep) = Rc::try_unwrap(rc) else {
                        unreachable!("strong count was 1")
                    };
                    for token in rep.tokens {
                        self.release(token.value);
                    }
                }
                DeadRep::Expr(rc) => {
                    let Ok(program) = Rc::try_unwrap(rc) else {
                        unreachable!("strong count was 1")
                    };
                    for value in program.values {
                        self.release(value);
                    }
                }
                DeadRep::Command(rc) => {
                    let Ok(cmd) = Rc::try_unwrap(rc) else {
                        unreachable!("strong count was 1")
                    };
                    if let CommandKind::Proc { args, body } = cmd.kind {
                        self.release(args);
                        self.release(body);
                    }
                }
            }
        }
    }

    /// Snapshot of all live handles, for the garbage collector's mark walk.
    pub fn live_ids(&self) -> Vec<ValueId> {
        self.slots.iter().map(|(key, _)| ValueId(key)).collect()
    }

    /// Number of live values.
    pub fn live_len(&self) -> usize {
        self.slots.len()
    }
}
