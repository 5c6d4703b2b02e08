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

//! The dict value type
//!
//! A dict maps keys to values; both sides are value handles, and keys
//! compare by string equality. The structured form keeps insertion order
//! for the string form (alternating key and value tokens) next to a
//! by-string index for lookups.
//!
//! Converting a string to a dict parses it as a list and pairs up the
//! elements; an odd element count is the only conversion error. A
//! repeated key keeps its first position but takes the latest value.

use crate::heap::{Heap, ValueId};
use crate::interp::Interp;
use crate::semantics::Flow;
use crate::value::Repr;
use itertools::Itertools;
use std::collections::HashMap;
use tacl_syntax::{Parser, TokenKind};
use thiserror::Error;

/// Structured form of a dict
#[derive(Clone, Debug, Default)]
pub(crate) struct DictRep {
    /// Key/value handle pairs in insertion order
    pub entries: Vec<(ValueId, ValueId)>,
    /// Key string to position in `entries`
    index: HashMap<String, usize>,
}

/// Error converting a string to a dict
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("missing value to go with key")]
pub struct OddDictError;

impl Heap {
    /// Allocates a dict from alternating key/value handles, retaining
    /// each.
    ///
    /// Panics on an odd number of elements; callers validate first.
    pub fn new_dict(&mut self, pairs: &[ValueId]) -> ValueId {
        assert!(
            pairs.len() % 2 == 0,
            "dict requires an even number of elements"
        );
        let id = self.alloc(None, Repr::Dict(DictRep::default()));
        for (&key, &value) in pairs.iter().tuples() {
            self.dict_put(id, key, value);
        }
        id
    }

    /// Shimmers the value to a dict by parsing its string form.
    pub fn ensure_dict(&mut self, id: ValueId) -> Result<(), OddDictError> {
        if matches!(self.slot(id).repr, Repr::Dict(_)) {
            return Ok(());
        }
        let text = self.string_cloned(id);
        let mut parser = Parser::new(&text, 1);
        let mut elements = Vec::new();
        while !parser.at_eof() {
            let token = parser.next_list();
            if !matches!(token.kind, TokenKind::Str | TokenKind::Esc) {
                continue;
            }
            elements.push(parser.text(&token).into_owned());
        }
        if elements.len() % 2 != 0 {
            return Err(OddDictError);
        }
        let mut rep = Repr::Dict(DictRep::default());
        std::mem::swap(&mut rep, &mut self.slot_mut(id).repr);
        self.free_repr(rep);
        for (key_text, value_text) in elements.into_iter().tuples() {
            let key = self.new_string(key_text);
            let value = self.new_string(value_text);
            // Shimmering may happen on a shared value; sharing is checked
            // by the mutating callers, not here.
            self.dict_put_raw(id, key, value);
        }
        Ok(())
    }

    /// Inserts or replaces an entry, retaining `key` and `value`.
    ///
    /// A replaced entry keeps its original key handle and position. The
    /// value must already have the dict structured form and be unshared.
    pub fn dict_put(&mut self, id: ValueId, key: ValueId, value: ValueId) {
        assert!(!self.is_shared(id), "dict_put called with a shared value");
        self.dict_put_raw(id, key, value);
    }

    fn dict_put_raw(&mut self, id: ValueId, key: ValueId, value: ValueId) {
        self.retain(key);
        self.retain(value);
        let key_text = self.string_cloned(key);
        let Repr::Dict(dict) = &mut self.slot_mut(id).repr else {
            panic!("dict_put on a non-dict value")
        };
        let replaced = match dict.index.get(&key_text) {
            Some(&position) => {
                let old_value = std::mem::replace(&mut dict.entries[position].1, value);
                Some((key, old_value))
            }
            None => {
                dict.index.insert(key_text, dict.entries.len());
                dict.entries.push((key, value));
                None
            }
        };
        if let Some((new_key, old_value)) = replaced {
            // The dict keeps the original key handle.
            self.release(new_key);
            self.release(old_value);
        }
    }

    /// Removes an entry by key string. Returns false if the key is
    /// absent.
    pub fn dict_remove(&mut self, id: ValueId, key: ValueId) -> bool {
        assert!(
            !self.is_shared(id),
            "dict_remove called with a shared value"
        );
        let key_text = self.string_cloned(key);
        let Repr::Dict(dict) = &mut self.slot_mut(id).repr else {
            panic!("dict_remove on a non-dict value")
        };
        let Some(position) = dict.index.remove(&key_text) else {
            return false;
        };
        let (old_key, old_value) = dict.entries.remove(position);
        for slot in dict.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        self.release(old_key);
        self.release(old_value);
        true
    }

    /// Looks an entry up by the key's string form.
    pub fn dict_get(&mut self, id: ValueId, key: ValueId) -> Result<Option<ValueId>, OddDictError> {
        self.ensure_dict(id)?;
        let key_text = self.string_cloned(key);
        let Repr::Dict(dict) = &self.slot(id).repr else {
            unreachable!("just converted to a dict")
        };
        Ok(dict
            .index
            .get(&key_text)
            .map(|&position| dict.entries[position].1))
    }

    /// Number of entries, shimmering to a dict first.
    pub fn dict_len(&mut self, id: ValueId) -> Result<usize, OddDictError> {
        self.ensure_dict(id)?;
        let Repr::Dict(dict) = &self.slot(id).repr else {
            unreachable!("just converted to a dict")
        };
        Ok(dict.entries.len())
    }
}

impl Interp {
    /// Resolves a nested key vector against a dict value, reporting
    /// missing keys and conversion failures as errors.
    pub fn dict_keys_get(&mut self, dict: ValueId, keys: &[ValueId]) -> Flow {
        let mut current = dict;
        for &key in keys {
            match self.heap.dict_get(current, key) {
                Err(error) => return Err(self.error(error.to_string())),
                Ok(Some(value)) => current = value,
                Ok(None) => {
                    let key_text = self.heap.string_cloned(key);
                    return Err(
                        self.error(format!("key \"{key_text}\" not found in dictionary"))
                    );
                }
            }
        }
        Ok(current)
    }

    /// Rebinds the dict variable `var_name` with the entry at the nested
    /// `keys` set to `new_value`, or removed when `new_value` is `None`.
    ///
    /// A missing variable is created; shared spines are copied before
    /// mutation. Every intermediate key must name a dict (created on the
    /// way for a set, an error for a removal).
    pub fn set_dict_keys(
        &mut self,
        var_name: ValueId,
        keys: &[ValueId],
        new_value: Option<ValueId>,
    ) -> Flow {
        let mut var_obj = match self.get_variable_opt(var_name) {
            Some(value) => value,
            None => {
                let fresh = self.heap.new_dict(&[]);
                if let Err(unwind) = self.set_variable(var_name, fresh) {
                    self.heap.release(fresh);
                    return Err(unwind);
                }
                fresh
            }
        };
        let shared = self.heap.is_shared(var_obj);
        if shared {
            var_obj = self.heap.dup(var_obj);
        }
        let walk: Flow = (|interp: &mut Interp| {
            let mut obj = var_obj;
            for &key in &keys[..keys.len() - 1] {
                let dict_obj = obj;
                if let Err(error) = interp.heap.ensure_dict(dict_obj) {
                    return Err(interp.error(error.to_string()));
                }
                interp.heap.invalidate_string(dict_obj);
                match interp.heap.dict_get(dict_obj, key) {
                    Err(error) => return Err(interp.error(error.to_string())),
                    Ok(Some(sub)) => {
                        obj = if interp.heap.is_shared(sub) {
                            let copy = interp.heap.dup(sub);
                            interp.heap.dict_put(dict_obj, key, copy);
                            copy
                        } else {
                            sub
                        };
                    }
                    Ok(None) => {
                        // Only the last key may be absent, and only when
                        // setting.
                        if new_value.is_none() {
                            let key_text = interp.heap.string_cloned(key);
                            return Err(interp.error(format!(
                                "key \"{key_text}\" not found in dictionary"
                            )));
                        }
                        let fresh = interp.heap.new_dict(&[]);
                        interp.heap.dict_put(dict_obj, key, fresh);
                        obj = fresh;
                    }
                }
            }
            let last = keys[keys.len() - 1];
            if let Err(error) = interp.heap.ensure_dict(obj) {
                return Err(interp.error(error.to_string()));
            }
            match new_value {
                Some(value) => interp.heap.dict_put(obj, last, value),
                None => {
                    interp.heap.dict_remove(obj, last);
                }
            }
            interp.heap.invalidate_string(obj);
            Ok(obj)
        })(self);
        if let Err(unwind) = walk {
            if shared {
                self.heap.release(var_obj);
            }
            return Err(unwind);
        }
        if self.heap.slot(var_obj).bytes.is_some() {
            self.heap.invalidate_string(var_obj);
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

    /// `$name(key)` assignment and removal.
    ///
    /// Any failure is reported as the variable not containing a valid
    /// dictionary.
    pub(crate) fn dict_sugar_set(
        &mut self,
        sugar_id: ValueId,
        new_value: Option<ValueId>,
    ) -> Flow {
        let (name, key) = self.dict_sugar_parts(sugar_id);
        match self.set_dict_keys(name, &[key], new_value) {
            Ok(value) => Ok(value),
            Err(_) => {
                let name_text = self.heap.string_cloned(name);
                Err(self.error(format!(
                    "Variable '{name_text}' does not contain a valid dictionary"
                )))
            }
        }
    }

    /// The parsed `(name, key)` pair of a dict-sugar value, cached on the
    /// value.
    pub(crate) fn dict_sugar_parts(&mut self, sugar_id: ValueId) -> (ValueId, ValueId) {
        if let Repr::DictSugar { name, key } = self.heap.slot(sugar_id).repr {
            return (name, key);
        }
        let text = self.heap.string_cloned(sugar_id);
        let (name_text, key_text) = crate::var::split_dict_sugar(&text);
        let name = self.heap.new_string(name_text);
        let key = self.heap.new_string(key_text);
        self.heap.retain(name);
        self.heap.retain(key);
        self.heap.set_repr(sugar_id, Repr::DictSugar { name, key });
        (name, key)
    }
}
