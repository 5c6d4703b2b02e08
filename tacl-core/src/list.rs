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

//! The list value type
//!
//! A list's structured form is a vector of retained value handles. The
//! string form re-quotes every element through `tacl-quote` so parsing the
//! result yields the same elements back. Converting a string to a list
//! cannot fail: the list grammar accepts every string.
//!
//! In-place mutators require the list to be unshared; higher layers
//! duplicate first (`lappend` and friends re-bind the variable to the
//! copy).

use crate::heap::{Heap, ValueId};
use crate::index::resolve_index;
use crate::interp::Interp;
use crate::semantics::Flow;
use crate::value::Repr;
use tacl_syntax::{Parser, TokenKind};

/// Builds the canonical string of a sequence of elements, choosing a
/// quoting strategy per element.
pub(crate) fn string_of_elements(heap: &mut Heap, elements: &[ValueId]) -> String {
    for &element in elements {
        heap.ensure_string(element);
    }
    let mut result = String::new();
    for (i, &element) in elements.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        let text = self::element_text(heap, element);
        result.push_str(&tacl_quote::quote(text));
    }
    result
}

fn element_text(heap: &Heap, element: ValueId) -> &str {
    heap.slot(element)
        .bytes
        .as_deref()
        .expect("string form was just generated")
}

impl Heap {
    /// Allocates a list value over the given elements, retaining each.
    pub fn new_list(&mut self, elements: &[ValueId]) -> ValueId {
        for &element in elements {
            self.retain(element);
        }
        self.alloc(None, Repr::List(elements.to_vec()))
    }

    /// Shimmers the value to a list by parsing its string form. Never
    /// fails.
    pub fn ensure_list(&mut self, id: ValueId) {
        if matches!(self.slot(id).repr, Repr::List(_)) {
            return;
        }
        let text = self.string_cloned(id);
        let mut parser = Parser::new(&text, 1);
        let mut elements = Vec::new();
        while !parser.at_eof() {
            let token = parser.next_list();
            if !matches!(token.kind, TokenKind::Str | TokenKind::Esc) {
                continue;
            }
            let element = self.new_string(parser.text(&token).into_owned());
            self.retain(element);
            elements.push(element);
        }
        self.set_repr(id, Repr::List(elements));
    }

    /// Number of elements, shimmering to a list first.
    pub fn list_length(&mut self, id: ValueId) -> usize {
        self.ensure_list(id);
        match &self.slot(id).repr {
            Repr::List(elements) => elements.len(),
            _ => unreachable!("just converted to a list"),
        }
    }

    /// Snapshot of the element handles, shimmering to a list first.
    pub fn list_elements(&mut self, id: ValueId) -> Vec<ValueId> {
        self.ensure_list(id);
        match &self.slot(id).repr {
            Repr::List(elements) => elements.clone(),
            _ => unreachable!("just converted to a list"),
        }
    }

    /// The element at an encoded index, or `None` when out of range.
    pub fn list_index(&mut self, id: ValueId, index: i64) -> Option<ValueId> {
        self.ensure_list(id);
        let Repr::List(elements) = &self.slot(id).repr else {
            unreachable!("just converted to a list")
        };
        let position = resolve_index(index, elements.len())?;
        Some(elements[position])
    }

    /// Appends an element in place. The list must be unshared.
    pub fn list_append(&mut self, id: ValueId, element: ValueId) {
        assert!(
            !self.is_shared(id),
            "list_append called with a shared value"
        );
        self.ensure_list(id);
        self.invalidate_string(id);
        self.retain(element);
        let Repr::List(elements) = &mut self.slot_mut(id).repr else {
            unreachable!("just converted to a list")
        };
        elements.push(element);
    }

    /// Appends every element of `other` in place. The list must be
    /// unshared.
    pub fn list_append_list(&mut self, id: ValueId, other: ValueId) {
        for element in self.list_elements(other) {
            self.list_append(id, element);
        }
    }

    /// Replaces the element at an encoded index in place. The list must be
    /// unshared. Returns false when the index is out of range.
    pub fn list_set_index(&mut self, id: ValueId, index: i64, element: ValueId) -> bool {
        assert!(
            !self.is_shared(id),
            "list_set_index called with a shared value"
        );
        self.ensure_list(id);
        let len = self.list_length(id);
        let Some(position) = resolve_index(index, len) else {
            return false;
        };
        self.invalidate_string(id);
        self.retain(element);
        let Repr::List(elements) = &mut self.slot_mut(id).repr else {
            unreachable!("just converted to a list")
        };
        let old = std::mem::replace(&mut elements[position], element);
        self.release(old);
        true
    }

    /// Concatenates values.
    ///
    /// If every part is a pure list (no string form), the result is a
    /// list of all their elements; otherwise the string forms are joined
    /// with single spaces, trimming whitespace off each part.
    pub fn concat(&mut self, parts: &[ValueId]) -> ValueId {
        let all_pure_lists = parts.iter().all(|&p| {
            matches!(self.slot(p).repr, Repr::List(_)) && self.slot(p).bytes.is_none()
        });
        if all_pure_lists {
            let result = self.new_list(&[]);
            for &part in parts {
                self.list_append_list(result, part);
            }
            return result;
        }
        let mut text = String::new();
        for (i, &part) in parts.iter().enumerate() {
            let piece = self.string(part).trim_matches(&[' ', '\t', '\n'][..]);
            if i > 0 && !text.is_empty() && !piece.is_empty() {
                text.push(' ');
            }
            text.push_str(piece);
        }
        self.new_string(text)
    }
}

impl Interp {
    /// Rebinds the list variable `var_name` with the element at the
    /// nested `indices` replaced by `new_value`, copying shared spines.
    pub fn set_list_index(
        &mut self,
        var_name: ValueId,
        indices: &[ValueId],
        new_value: ValueId,
    ) -> Flow {
        let mut var_obj = self.get_variable(var_name)?;
        let shared = self.heap.is_shared(var_obj);
        if shared {
            var_obj = self.heap.dup(var_obj);
        }
        let result: Flow = (|interp: &mut Interp| {
            let mut obj = var_obj;
            for &index_value in &indices[..indices.len() - 1] {
                let list_obj = obj;
                let index = interp.get_index(index_value)?;
                match interp.heap.list_index(list_obj, index) {
                    Some(sub) => obj = sub,
                    None => return Err(interp.error("list index out of range")),
                }
                if interp.heap.is_shared(obj) {
                    let copy = interp.heap.dup(obj);
                    interp.heap.list_set_index(list_obj, index, copy);
                    obj = copy;
                }
                interp.heap.invalidate_string(list_obj);
            }
            let last = indices[indices.len() - 1];
            let index = interp.get_index(last)?;
            if !interp.heap.list_set_index(obj, index, new_value) {
                return Err(interp.error("list index out of range"));
            }
            Ok(obj)
        })(self);
        if let Err(unwind) = result {
            if shared {
                self.heap.release(var_obj);
            }
            return Err(unwind);
        }
        if shared {
            if let Err(unwind) = self.set_variable(var_name, var_obj) {
                self.heap.release(var_obj);
                return Err(unwind);
            }
        }
        self.set_result(var_obj);
        Ok(var_obj)
    }
}
