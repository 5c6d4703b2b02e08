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

//! References and their garbage collector
//!
//! A reference is a heap handle to a value, created by `ref` and carried
//! around as its 32-byte string token `~reference:<20 digits>:`. Because a
//! reference can be stuffed anywhere a string can go, the collector treats
//! every live value's string form as the universal field set: the mark
//! phase scans the string forms of all type-flagged live values for the
//! token shape, and the sweep drops unmarked table entries, invoking the
//! entry's finalizer as `finalizer <token> <held-value>` with the
//! interpreter result saved around the call and finalizer errors ignored.
//!
//! Collection runs on reference allocation after 5000 allocations or 300
//! seconds since the last collection, and on explicit request.

use crate::heap::ValueId;
use crate::interp::Interp;
use crate::semantics::Flow;
use crate::value::Repr;
use std::collections::HashSet;
use std::time::Instant;

/// Exact byte length of a reference token
pub const REFERENCE_SPACE: usize = 32;

/// Collect when this many references were created since the last run.
const COLLECT_ID_PERIOD: u64 = 5000;

/// Collect when this many seconds elapsed since the last run.
const COLLECT_TIME_PERIOD: u64 = 300;

/// One entry of the reference table
#[derive(Debug)]
pub(crate) struct RefEntry {
    /// The held value (retained)
    pub value: ValueId,
    /// Finalizer command name (retained)
    pub finalizer: Option<ValueId>,
}

/// Formats a reference id as its wire token.
pub(crate) fn format_reference(id: u64) -> String {
    format!("~reference:{id:020}:")
}

/// Parses an exact reference token back to its id.
fn parse_reference_token(token: &str) -> Option<u64> {
    if token.len() != REFERENCE_SPACE {
        return None;
    }
    let digits = token.strip_prefix("~reference:")?.strip_suffix(':')?;
    if digits.len() != 20 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Scans a string for reference tokens, marking every id found.
fn scan_references(text: &str, marks: &mut HashSet<u64>) {
    let mut rest = text;
    while let Some(pos) = rest.find("~reference:") {
        let candidate = &rest[pos..];
        if candidate.len() < REFERENCE_SPACE {
            return;
        }
        match parse_reference_token(&candidate[..REFERENCE_SPACE]) {
            Some(id) => {
                marks.insert(id);
                rest = &candidate[REFERENCE_SPACE..];
            }
            None => rest = &candidate[11..],
        }
    }
}

impl Interp {
    /// Creates a reference to `value`, optionally with a finalizer
    /// command, and returns the reference value (refcount zero).
    pub fn new_reference(&mut self, value: ValueId, finalizer: Option<ValueId>) -> ValueId {
        self.collect_if_needed();
        self.heap.retain(value);
        if let Some(finalizer) = finalizer {
            self.heap.retain(finalizer);
        }
        let id = self.next_reference_id;
        self.next_reference_id += 1;
        self.references.insert(id, RefEntry { value, finalizer });
        self.heap.alloc(None, Repr::Reference { id })
    }

    /// Interprets a value as a reference id, shimmering if needed.
    ///
    /// A fresh parse verifies both the token shape and that the id is
    /// still in the reference table.
    pub fn get_reference(&mut self, ref_value: ValueId) -> Flow<u64> {
        if let Repr::Reference { id } = self.heap.slot(ref_value).repr {
            return Ok(id);
        }
        let text = self.heap.string_cloned(ref_value);
        let trimmed = text.trim_matches(' ');
        let Some(id) = parse_reference_token(trimmed) else {
            return Err(self.error(format!("Expected reference but got '{text}'")));
        };
        if !self.references.contains_key(&id) {
            return Err(self.error(format!("Invalid reference ID '{text}'")));
        }
        self.heap.set_repr(ref_value, Repr::Reference { id });
        Ok(id)
    }

    /// The value a reference currently holds.
    pub fn reference_value(&mut self, ref_value: ValueId) -> Flow {
        let id = self.get_reference(ref_value)?;
        match self.references.get(&id) {
            Some(entry) => Ok(entry.value),
            None => {
                let text = self.heap.string_cloned(ref_value);
                Err(self.error(format!("Invalid reference ID '{text}'")))
            }
        }
    }

    /// Repoints a reference at a new value.
    pub fn set_reference(&mut self, ref_value: ValueId, new_value: ValueId) -> Flow<()> {
        let id = self.get_reference(ref_value)?;
        if !self.references.contains_key(&id) {
            let text = self.heap.string_cloned(ref_value);
            return Err(self.error(format!("Invalid reference ID '{text}'")));
        }
        self.heap.retain(new_value);
        let Some(entry) = self.references.get_mut(&id) else {
            unreachable!("presence was just checked")
        };
        let old = std::mem::replace(&mut entry.value, new_value);
        self.heap.release(old);
        Ok(())
    }

    /// Runs a mark-and-sweep collection over the reference table and
    /// returns the number of references collected.
    pub fn collect(&mut self) -> usize {
        // A finalizer calling `collect` must not re-enter.
        if self.collecting {
            return 0;
        }
        self.collecting = true;

        let mut marks: HashSet<u64> = HashSet::new();
        for value_id in self.heap.live_ids() {
            let scan = match &self.heap.slot(value_id).repr {
                Repr::Reference { id } => {
                    marks.insert(*id);
                    false
                }
                repr => repr.may_contain_references(),
            };
            if scan {
                self.heap.ensure_string(value_id);
                if let Some(text) = self.heap.slot(value_id).bytes.as_deref() {
                    if text.len() >= REFERENCE_SPACE {
                        scan_references(text, &mut marks);
                    }
                }
            }
        }

        let dead: Vec<u64> = self
            .references
            .keys()
            .filter(|id| !marks.contains(id))
            .copied()
            .collect();
        let mut collected = 0;
        for id in dead {
            let Some(entry) = self.references.remove(&id) else {
                continue;
            };
            collected += 1;
            if let Some(finalizer) = entry.finalizer {
                let token = self.heap.new_string(format_reference(id));
                self.heap.retain(token);
                let saved_result = self.result();
                self.heap.retain(saved_result);
                // Finalizer errors are deliberately ignored.
                let _ = self.eval_vector(&[finalizer, token, entry.value]);
                self.set_result(saved_result);
                self.heap.release(saved_result);
                self.heap.release(token);
                self.heap.release(finalizer);
            }
            self.heap.release(entry.value);
        }

        self.last_collect_id = self.next_reference_id;
        self.last_collect_time = Instant::now();
        self.collecting = false;
        self.heap.reap();
        self.shared_strings.prune();
        collected
    }

    /// Collects if enough references or time accumulated since the last
    /// run.
    pub fn collect_if_needed(&mut self) {
        let elapsed_ids = self.next_reference_id - self.last_collect_id;
        let elapsed_time = self.last_collect_time.elapsed().as_secs();
        if elapsed_ids > COLLECT_ID_PERIOD || elapsed_time > COLLECT_TIME_PERIOD {
            self.collect();
        }
    }

    /// Number of live entries in the reference table.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shape() {
        let token = format_reference(99);
        assert_eq!(token.len(), REFERENCE_SPACE);
        assert_eq!(token, "~reference:00000000000000000099:");
        assert_eq!(parse_reference_token(&token), Some(99));
        assert_eq!(parse_reference_token("~reference:x:"), None);
        assert_eq!(
            parse_reference_token("~reference:0000000000000000009x:"),
            None
        );
    }

    #[test]
    fn scanning_finds_embedded_tokens() {
        let mut marks = HashSet::new();
        let text = format!(
            "prefix {} middle {} suffix",
            format_reference(7),
            format_reference(8)
        );
        scan_references(&text, &mut marks);
        assert_eq!(marks, HashSet::from([7, 8]));
    }

    #[test]
    fn scanning_skips_malformed_candidates() {
        let mut marks = HashSet::new();
        let text = format!("~reference:not-a-real-one-here...! {}", format_reference(3));
        scan_references(&text, &mut marks);
        assert_eq!(marks, HashSet::from([3]));
    }

    #[test]
    fn reference_string_form() {
        let mut interp = Interp::new();
        let payload = interp.new_string("payload");
        interp.retain(payload);
        let reference = interp.new_reference(payload, None);
        interp.retain(reference);
        let text = interp.get_string(reference).to_owned();
        assert_eq!(text.len(), REFERENCE_SPACE);
        assert!(text.starts_with("~reference:"));
        // A fresh value with the same string resolves to the same target.
        let copy = interp.new_string(text);
        interp.retain(copy);
        let target = interp.reference_value(copy).unwrap();
        assert_eq!(interp.get_string(target), "payload");
        interp.release(copy);
        interp.release(reference);
        interp.release(payload);
    }

    #[test]
    fn bad_reference_strings() {
        let mut interp = Interp::new();
        let bogus = interp.new_string("not a reference");
        interp.retain(bogus);
        assert!(interp.get_reference(bogus).is_err());
        assert_eq!(
            interp.result_string(),
            "Expected reference but got 'not a reference'"
        );
        interp.release(bogus);
        let unknown = interp.new_string(format_reference(424242));
        interp.retain(unknown);
        assert!(interp.get_reference(unknown).is_err());
        assert!(interp.result_string().starts_with("Invalid reference ID"));
        interp.release(unknown);
    }

    #[test]
    fn collect_keeps_reachable_references() {
        let mut interp = Interp::new();
        interp.eval("set r [ref payload]").unwrap();
        assert_eq!(interp.reference_count(), 1);
        let collected = interp.collect();
        assert_eq!(collected, 0);
        assert_eq!(interp.reference_count(), 1);
        // Still reachable through the variable's string form.
        let target = interp.eval("getref $r").unwrap();
        assert_eq!(interp.get_string(target), "payload");
    }

    #[test]
    fn collect_drops_unreachable_references() {
        let mut interp = Interp::new();
        interp.eval("set r [ref payload]").unwrap();
        interp.eval("set r {}").unwrap();
        let collected = interp.collect();
        assert_eq!(collected, 1);
        assert_eq!(interp.reference_count(), 0);
    }

    #[test]
    fn references_inside_lists_are_marked() {
        let mut interp = Interp::new();
        interp.eval("set l [list [ref payload] tail]").unwrap();
        assert_eq!(interp.collect(), 0);
        assert_eq!(interp.reference_count(), 1);
        interp.eval("set l {}").unwrap();
        assert_eq!(interp.collect(), 1);
    }

    #[test]
    fn finalizer_runs_once_on_collection() {
        let mut interp = Interp::new();
        interp.eval("set done {}").unwrap();
        interp
            .eval("proc fin {token value} { global done; set done $value }")
            .unwrap();
        interp.eval("set r [ref treasure fin]").unwrap();
        interp.eval("set r {}").unwrap();
        assert_eq!(interp.collect(), 1);
        let done = interp.get_variable_str("done").unwrap();
        assert_eq!(interp.get_string(done), "treasure");
        // Nothing left to collect; the finalizer must not run again.
        interp.eval("set done {}").unwrap();
        assert_eq!(interp.collect(), 0);
        let done = interp.get_variable_str("done").unwrap();
        assert_eq!(interp.get_string(done), "");
    }

    #[test]
    fn finalizer_errors_are_ignored_and_result_preserved() {
        let mut interp = Interp::new();
        interp
            .eval("proc fin {token value} { error boom }")
            .unwrap();
        interp.eval("set r [ref x fin]").unwrap();
        interp.eval("set r keepme").unwrap();
        interp.collect();
        assert_eq!(interp.result_string(), "keepme");
    }
}
