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

//! The tacl interpreter core.
//!
//! tacl is a small, embeddable, Tcl-style command language: every
//! syntactic form is a command invocation, every value has a canonical
//! string form next to an optional cached structured form, and
//! substitution (`$var`, `[cmd]`, backslash escapes) is the central
//! evaluation mechanism.
//!
//! The embedding surface is [`Interp`]: create one, define commands
//! ([`NativeCommand`] or procedures), set and read variables, and evaluate
//! strings, files, or values. Evaluation results flow through
//! [`Flow`]/[`Unwind`], which carry the language's `error`/`return`/
//! `break`/`continue` completions alongside ordinary success.
//!
//! ```
//! # use tacl_core::Interp;
//! let mut interp = Interp::new();
//! let value = interp.eval("expr {6 * 7}").unwrap();
//! assert_eq!(interp.get_string(value), "42");
//! ```

mod cmds;
pub mod command;
mod dict;
mod eval;
mod expr;
mod gc;
mod heap;
pub mod index;
mod intern;
mod interp;
mod list;
mod script;
pub mod semantics;
mod value;
mod var;

pub use crate::command::{Command, CommandKind, NativeCommand};
pub use crate::dict::OddDictError;
pub use crate::gc::REFERENCE_SPACE;
pub use crate::heap::ValueId;
pub use crate::index::resolve_index;
pub use crate::interp::Interp;
pub use crate::semantics::{Flow, ReturnCode, Unwind};
pub use crate::value::ValueError;

#[cfg(test)]
mod tests;
