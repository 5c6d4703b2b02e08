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

//! Script source provenance
//!
//! A [`Source`] names the file a piece of script text came from and the line
//! it started on. File names are reference-counted so that every token of a
//! compiled script can carry one without copying the name; the interpreter
//! additionally interns them so equal names share one allocation.

use std::fmt;
use std::rc::Rc;

/// Name of the pseudo-file used for script text of unknown origin.
pub const UNKNOWN_FILE: &str = "?";

/// Where a piece of script text came from
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Source {
    /// Name of the file containing the text
    pub file: Rc<str>,
    /// Line number of the first line of the text, counted from 1
    pub line: u32,
}

impl Source {
    /// Creates a source description for text of unknown origin.
    ///
    /// The file name is [`UNKNOWN_FILE`] and the line number is 1.
    #[must_use]
    pub fn unknown() -> Self {
        Source {
            file: Rc::from(UNKNOWN_FILE),
            line: 1,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_source() {
        let source = Source::unknown();
        assert_eq!(&*source.file, "?");
        assert_eq!(source.line, 1);
        assert_eq!(source.to_string(), "?:1");
    }

    #[test]
    fn file_names_are_shared() {
        let source = Source {
            file: Rc::from("main.tcl"),
            line: 10,
        };
        let clone = source.clone();
        assert!(Rc::ptr_eq(&source.file, &clone.file));
    }
}
