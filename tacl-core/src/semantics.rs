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

//! Evaluation result types
//!
//! Every evaluator, compiler, and command entry point returns a [`Flow`].
//! The error side, [`Unwind`], covers the four non-`ok` completion kinds of
//! the language, so `?` propagates `error`, `return`, `break`, and
//! `continue` alike to the nearest construct that handles them: `catch`
//! catches everything, loops absorb `break`/`continue`, and a procedure
//! boundary translates `return`.

use crate::heap::ValueId;
use strum::{Display, EnumString};

/// Completion kind of an evaluation
///
/// The names are the ones scripts use with `return -code`; the numeric
/// values are what `catch` reports.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, Eq, Hash, PartialEq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReturnCode {
    #[default]
    Ok,
    Error,
    Return,
    Break,
    Continue,
}

impl ReturnCode {
    /// The numeric value of this return code.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            ReturnCode::Ok => 0,
            ReturnCode::Error => 1,
            ReturnCode::Return => 2,
            ReturnCode::Break => 3,
            ReturnCode::Continue => 4,
        }
    }
}

/// Non-`ok` completion unwinding through the evaluator
///
/// The payload value, where present, is also the current interpreter
/// result; it is carried here so callers can consume it without going
/// through the interpreter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Unwind {
    /// Evaluation failed; the value is the error message.
    Error(ValueId),
    /// A `return` is unwinding to the enclosing procedure boundary.
    Return(ValueId),
    /// A `break` is unwinding to the enclosing loop.
    Break,
    /// A `continue` is unwinding to the enclosing loop.
    Continue,
}

impl Unwind {
    /// The completion kind this unwind reports through `catch`.
    #[must_use]
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Unwind::Error(_) => ReturnCode::Error,
            Unwind::Return(_) => ReturnCode::Return,
            Unwind::Break => ReturnCode::Break,
            Unwind::Continue => ReturnCode::Continue,
        }
    }
}

/// Result of an evaluation step
pub type Flow<T = ValueId> = Result<T, Unwind>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn return_code_names() {
        assert_eq!(ReturnCode::Ok.to_string(), "ok");
        assert_eq!(ReturnCode::Error.to_string(), "error");
        assert_eq!(ReturnCode::from_str("return"), Ok(ReturnCode::Return));
        assert_eq!(ReturnCode::from_str("BREAK"), Ok(ReturnCode::Break));
        assert_eq!(ReturnCode::from_str("Continue"), Ok(ReturnCode::Continue));
        assert!(ReturnCode::from_str("exit").is_err());
    }

    #[test]
    fn return_code_values() {
        let codes: Vec<i64> = [
            ReturnCode::Ok,
            ReturnCode::Error,
            ReturnCode::Return,
            ReturnCode::Break,
            ReturnCode::Continue,
        ]
        .iter()
        .map(|c| c.code())
        .collect();
        assert_eq!(codes, [0, 1, 2, 3, 4]);
    }
}
