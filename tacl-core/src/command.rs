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

//! Commands
//!
//! A command is native (a [`NativeCommand`] trait object) or a procedure
//! (an argument list and a body, both values). Commands are shared through
//! `Rc` so an invocation survives deletion or redefinition of its own name.
//!
//! Name lookups are cached on the name value itself
//! ([`Repr::CmdName`](crate::value::Repr::CmdName)) and validated against
//! the interpreter's procedure epoch, which is bumped by every command
//! creation, rename, and deletion.

use crate::heap::ValueId;
use crate::interp::Interp;
use crate::semantics::Flow;
use crate::value::Repr;
use std::fmt::Debug;
use std::rc::Rc;

/// Implementation of a native command
///
/// The trait object carries whatever private state the command needs; its
/// `Drop` runs when the last holder of the command goes away.
pub trait NativeCommand {
    /// Executes the command. `argv[0]` is the name the command was invoked
    /// as.
    fn execute(&self, interp: &mut Interp, argv: &[ValueId]) -> Flow;
}

impl<F: Fn(&mut Interp, &[ValueId]) -> Flow> NativeCommand for F {
    fn execute(&self, interp: &mut Interp, argv: &[ValueId]) -> Flow {
        self(interp, argv)
    }
}

/// Body of a command
pub enum CommandKind {
    /// Native implementation
    Native(Rc<dyn NativeCommand>),
    /// Scripted procedure: formal argument list and body, as values owned
    /// by the command
    Proc { args: ValueId, body: ValueId },
}

impl Debug for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Native(_) => f.write_str("Native"),
            CommandKind::Proc { args, body } => f
                .debug_struct("Proc")
                .field("args", args)
                .field("body", body)
                .finish(),
        }
    }
}

/// A registered command
#[derive(Debug)]
pub struct Command {
    /// Minimum number of words of an invocation, command name included
    pub arity_min: usize,
    /// Maximum number of words, or `None` for a variadic command
    pub arity_max: Option<usize>,
    pub kind: CommandKind,
}

impl Command {
    /// Whether an invocation with `argc` words satisfies the arity range.
    #[must_use]
    pub fn arity_accepts(&self, argc: usize) -> bool {
        argc >= self.arity_min && self.arity_max.is_none_or(|max| argc <= max)
    }
}

impl Interp {
    /// Registers a native command, replacing any previous binding.
    pub fn create_command(
        &mut self,
        name: &str,
        native: Rc<dyn NativeCommand>,
        arity_min: usize,
        arity_max: Option<usize>,
    ) {
        self.install_command(
            name,
            Command {
                arity_min,
                arity_max,
                kind: CommandKind::Native(native),
            },
        );
    }

    /// Registers a procedure, replacing any previous binding.
    ///
    /// Retains the argument-list and body values for the command.
    pub fn create_procedure(
        &mut self,
        name: &str,
        args: ValueId,
        body: ValueId,
        arity_min: usize,
        arity_max: Option<usize>,
    ) {
        self.heap.retain(args);
        self.heap.retain(body);
        self.install_command(
            name,
            Command {
                arity_min,
                arity_max,
                kind: CommandKind::Proc { args, body },
            },
        );
    }

    fn install_command(&mut self, name: &str, command: Command) {
        let old = self.commands.insert(name.to_owned(), Rc::new(command));
        if let Some(old) = old {
            self.heap.park_command(old);
        }
        self.proc_epoch += 1;
    }

    /// Removes a command. Returns false if the name is not bound.
    pub fn delete_command(&mut self, name: &str) -> bool {
        match self.commands.remove(name) {
            Some(old) => {
                self.heap.park_command(old);
                self.proc_epoch += 1;
                true
            }
            None => false,
        }
    }

    /// Renames a command; an empty new name deletes it. Returns false if
    /// the old name is not bound.
    pub fn rename_command(&mut self, old_name: &str, new_name: &str) -> bool {
        if new_name.is_empty() {
            return self.delete_command(old_name);
        }
        let Some(cmd) = self.commands.remove(old_name) else {
            return false;
        };
        if let Some(replaced) = self.commands.insert(new_name.to_owned(), cmd) {
            self.heap.park_command(replaced);
        }
        self.proc_epoch += 1;
        true
    }

    /// Looks up a command by name value, caching the resolution on the
    /// value. Returns `None` if the name is not bound, with no error.
    pub fn get_command(&mut self, name_id: ValueId) -> Option<Rc<Command>> {
        if let Repr::CmdName { epoch, cmd } = &self.heap.slot(name_id).repr {
            if *epoch == self.proc_epoch {
                return Some(Rc::clone(cmd));
            }
        }
        let name = self.heap.string_cloned(name_id);
        let cmd = Rc::clone(self.commands.get(&name)?);
        self.heap.set_repr(
            name_id,
            Repr::CmdName {
                epoch: self.proc_epoch,
                cmd: Rc::clone(&cmd),
            },
        );
        Some(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::Unwind;

    fn nop(interp: &mut Interp, _argv: &[ValueId]) -> Flow {
        Ok(interp.result())
    }

    #[test]
    fn create_and_lookup() {
        let mut interp = Interp::new();
        interp.create_command("nop", Rc::new(nop), 1, Some(1));
        let name = interp.new_string("nop");
        interp.retain(name);
        assert!(interp.get_command(name).is_some());
        // Second lookup hits the cache.
        assert!(matches!(
            interp.heap.slot(name).repr,
            Repr::CmdName { .. }
        ));
        assert!(interp.get_command(name).is_some());
        interp.release(name);
    }

    #[test]
    fn epoch_invalidates_cached_lookups() {
        let mut interp = Interp::new();
        interp.create_command("a", Rc::new(nop), 1, None);
        let name = interp.new_string("a");
        interp.retain(name);
        assert!(interp.get_command(name).is_some());
        assert!(interp.delete_command("a"));
        assert!(interp.get_command(name).is_none());
        interp.release(name);
    }

    #[test]
    fn rename_moves_the_binding() {
        let mut interp = Interp::new();
        interp.create_command("old", Rc::new(nop), 1, None);
        assert!(interp.rename_command("old", "new"));
        let old = interp.new_string("old");
        let new = interp.new_string("new");
        interp.retain(old);
        interp.retain(new);
        assert!(interp.get_command(old).is_none());
        assert!(interp.get_command(new).is_some());
        interp.release(old);
        interp.release(new);
    }

    #[test]
    fn rename_to_empty_deletes() {
        let mut interp = Interp::new();
        interp.create_command("gone", Rc::new(nop), 1, None);
        assert!(interp.rename_command("gone", ""));
        assert!(!interp.delete_command("gone"));
    }

    #[test]
    fn arity_ranges() {
        let exact = Command {
            arity_min: 2,
            arity_max: Some(3),
            kind: CommandKind::Native(Rc::new(nop)),
        };
        assert!(!exact.arity_accepts(1));
        assert!(exact.arity_accepts(2));
        assert!(exact.arity_accepts(3));
        assert!(!exact.arity_accepts(4));
        let variadic = Command {
            arity_min: 1,
            arity_max: None,
            kind: CommandKind::Native(Rc::new(nop)),
        };
        assert!(variadic.arity_accepts(100));
    }

    #[test]
    fn native_error_shape() {
        fn boom(interp: &mut Interp, _argv: &[ValueId]) -> Flow {
            Err(interp.error("exploded"))
        }
        let mut interp = Interp::new();
        interp.create_command("boom", Rc::new(boom), 1, None);
        let result = interp.eval("boom");
        assert!(matches!(result, Err(Unwind::Error(_))));
        assert_eq!(interp.result_string(), "exploded");
    }
}
