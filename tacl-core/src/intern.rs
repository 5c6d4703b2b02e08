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

//! Shared strings
//!
//! Compiled scripts carry their source file name on every token; interning
//! makes all those tokens share one allocation. The table stores weak
//! references, so the `Rc` clone handed out *is* the usage count:
//! dropping the last clone orphans the entry and [`prune`]
//! removes it.
//!
//! [`prune`]: SharedStrings::prune

use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Interning table for file names and similar often-repeated strings
#[derive(Debug, Default)]
pub(crate) struct SharedStrings {
    table: HashMap<String, Weak<str>>,
}

impl SharedStrings {
    pub fn new() -> Self {
        SharedStrings::default()
    }

    /// Returns the shared copy of `s`, creating it on first use.
    pub fn intern(&mut self, s: &str) -> Rc<str> {
        if let Some(weak) = self.table.get(s) {
            if let Some(shared) = weak.upgrade() {
                return shared;
            }
        }
        let shared: Rc<str> = Rc::from(s);
        self.table.insert(s.to_owned(), Rc::downgrade(&shared));
        shared
    }

    /// Drops entries whose shared string is no longer in use.
    pub fn prune(&mut self) {
        self.table.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Number of entries, live or pending prune.
    pub fn len(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_the_allocation() {
        let mut strings = SharedStrings::new();
        let a = strings.intern("main.tcl");
        let b = strings.intern("main.tcl");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn distinct_strings_have_distinct_entries() {
        let mut strings = SharedStrings::new();
        let _a = strings.intern("a.tcl");
        let _b = strings.intern("b.tcl");
        assert_eq!(strings.len(), 2);
    }

    #[test]
    fn released_strings_prune_to_empty() {
        let mut strings = SharedStrings::new();
        // Intern k times, drop all k clones: the table must become empty.
        let clones: Vec<Rc<str>> = (0..5).map(|_| strings.intern("script.tcl")).collect();
        drop(clones);
        strings.prune();
        assert_eq!(strings.len(), 0);
    }

    #[test]
    fn prune_keeps_live_strings() {
        let mut strings = SharedStrings::new();
        let keep = strings.intern("keep.tcl");
        let _ = strings.intern("drop.tcl");
        strings.prune();
        assert_eq!(strings.len(), 1);
        assert_eq!(&*keep, "keep.tcl");
    }

    #[test]
    fn reinterning_after_prune_works() {
        let mut strings = SharedStrings::new();
        let first = strings.intern("x.tcl");
        drop(first);
        strings.prune();
        let second = strings.intern("x.tcl");
        assert_eq!(&*second, "x.tcl");
        assert_eq!(strings.len(), 1);
    }
}
