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

//! Container indices
//!
//! An index value is `N`, `end`, or `end-N`. `end` is encoded as the
//! largest representable integer and `end-N` counts down from it, so a
//! resolved index is a single `i64` that callers map to a concrete
//! position once the container length is known.

use crate::heap::{Heap, ValueId};
use crate::value::{IntParseError, Repr, ValueError, parse_int};

/// Encoding of `end`
pub const END: i64 = i64::MAX;

/// Formats an encoded index back to its source shape.
pub(crate) fn format_index(index: i64) -> String {
    if index == END {
        "end".to_owned()
    } else if index > END / 2 {
        format!("end-{}", END - index)
    } else {
        index.to_string()
    }
}

/// Maps an encoded index to a position in a container of length `len`.
///
/// Returns `None` when the index falls outside the container.
#[must_use]
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let position = if index > END - len {
        len - 1 - (END - index)
    } else {
        index
    };
    (0..len).contains(&position).then(|| position as usize)
}

impl Heap {
    /// Interprets the value as an index, shimmering if needed.
    pub fn get_index(&mut self, id: ValueId) -> Result<i64, ValueError> {
        // An integer value resolves without shimmering.
        if let Repr::Int(v) = self.slot(id).repr {
            return Ok(if v < 0 { i64::MIN } else { v });
        }
        if let Repr::Index(v) = self.slot(id).repr {
            return Ok(v);
        }
        let s = self.string_cloned(id);
        let t = s.trim();
        let index = if t == "end" {
            END
        } else if let Some(rest) = t.strip_prefix("end-") {
            match parse_int(rest) {
                Ok(n) => END.saturating_sub(n),
                Err(_) => return Err(ValueError::BadIndex(s)),
            }
        } else {
            match parse_int(t) {
                Ok(n) if n < 0 => i64::MIN,
                Ok(n) => n,
                Err(IntParseError::Overflow) => return Err(ValueError::IntegerTooBig),
                Err(IntParseError::Invalid) => return Err(ValueError::BadIndex(s)),
            }
        };
        self.set_repr(id, Repr::Index(index));
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_plain_indices() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(2, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(i64::MIN, 3), None);
        assert_eq!(resolve_index(0, 0), None);
    }

    #[test]
    fn resolving_end_indices() {
        assert_eq!(resolve_index(END, 3), Some(2));
        assert_eq!(resolve_index(END - 1, 3), Some(1));
        assert_eq!(resolve_index(END - 2, 3), Some(0));
        assert_eq!(resolve_index(END - 3, 3), None);
        assert_eq!(resolve_index(END, 0), None);
    }

    #[test]
    fn index_parsing() {
        let mut heap = Heap::new();
        for (text, encoded) in [("5", 5), ("end", END), ("end-2", END - 2), ("0", 0)] {
            let id = heap.new_string(text);
            assert_eq!(heap.get_index(id), Ok(encoded), "{text}");
            heap.release(id);
        }
    }

    #[test]
    fn negative_indices_never_resolve() {
        let mut heap = Heap::new();
        let id = heap.new_string("-1");
        let index = heap.get_index(id).unwrap();
        assert_eq!(resolve_index(index, 10), None);
        heap.release(id);
    }

    #[test]
    fn bad_index_message() {
        let mut heap = Heap::new();
        let id = heap.new_string("pivot");
        let error = heap.get_index(id).unwrap_err();
        assert_eq!(
            error.to_string(),
            "bad index \"pivot\": must be integer or end?-integer?"
        );
        heap.release(id);
    }

    #[test]
    fn index_string_regeneration() {
        let mut heap = Heap::new();
        let id = heap.alloc(None, Repr::Index(END - 4));
        assert_eq!(heap.string(id), "end-4");
        heap.release(id);
    }
}
