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

//! The dual-representation value model
//!
//! Every value carries an optional byte string and a structured form,
//! [`Repr`]. At least one of the two is always present. The string form is
//! canonical: reinterpreting a value as another type ("shimmering") parses
//! the string form and never changes it, while mutating a structured form
//! invalidates the string form so it is regenerated on demand.
//!
//! The per-type `free`/`dup`/`updateString` hooks of the classic design are
//! the match arms of [`Heap::free_repr`], [`Heap::dup`], and
//! [`Heap::ensure_string`]; the compiler proves every type handles each
//! hook. A type without a string generator that loses its string form is a
//! bug in the interpreter, reported by panic.

use crate::command::Command;
use crate::dict::DictRep;
use crate::expr::ExprProgram;
use crate::heap::{Heap, ValueId};
use crate::index;
use crate::script::ScriptRep;
use crate::semantics::ReturnCode;
use std::rc::Rc;
use std::str::FromStr;
use tacl_syntax::Source;
use thiserror::Error;

/// Structured form of a value
///
/// `Repr::None` marks a plain string with no structured interpretation
/// yet. The remaining variants are the built-in value types.
#[derive(Debug)]
pub(crate) enum Repr {
    /// Plain string; the byte form is the only representation.
    None,
    /// 64-bit signed integer
    Int(i64),
    /// IEEE-754 double; the string form always shows a decimal point
    Double(f64),
    /// Resolved container index; see [`index`](crate::index)
    Index(i64),
    /// Completion-kind name (`ok`, `error`, ...)
    ReturnCode(ReturnCode),
    /// Sequence of values
    List(Vec<ValueId>),
    /// String-keyed mapping of values
    Dict(DictRep),
    /// String augmented with script provenance
    Source(Source),
    /// Compiled script program
    Script(Rc<ScriptRep>),
    /// Compiled expression program
    Expr(Rc<ExprProgram>),
    /// Cache: this string names an existing plain variable while the
    /// frame's id matches
    VarName { frame_id: u64 },
    /// Parsed `name(key)` dictionary sugar
    DictSugar { name: ValueId, key: ValueId },
    /// Cache: resolved command, valid while the epoch matches
    CmdName { epoch: u64, cmd: Rc<Command> },
    /// Cache: the string form equals this static literal
    CheckedLiteral(&'static str),
    /// Heap reference token
    Reference { id: u64 },
}

impl Repr {
    /// Name of the value type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Repr::None => "string",
            Repr::Int(_) => "int",
            Repr::Double(_) => "double",
            Repr::Index(_) => "index",
            Repr::ReturnCode(_) => "return-code",
            Repr::List(_) => "list",
            Repr::Dict(_) => "dict",
            Repr::Source(_) => "source",
            Repr::Script(_) => "script",
            Repr::Expr(_) => "expression",
            Repr::VarName { .. } => "variable",
            Repr::DictSugar { .. } => "dict-substitution",
            Repr::CmdName { .. } => "command",
            Repr::CheckedLiteral(_) => "compared-string",
            Repr::Reference { .. } => "reference",
        }
    }

    /// Whether the garbage collector must scan this value's string form
    /// for reference tokens.
    ///
    /// Numeric strings cannot spell a reference token, and a dict's
    /// elements are live values scanned on their own. Reference values are
    /// marked from their structured form instead.
    pub fn may_contain_references(&self) -> bool {
        !matches!(
            self,
            Repr::Int(_)
                | Repr::Double(_)
                | Repr::Index(_)
                | Repr::ReturnCode(_)
                | Repr::Dict(_)
                | Repr::Reference { .. }
        )
    }
}

/// Error converting a value's string form to a structured type
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ValueError {
    #[error("Expected integer but got '{0}'")]
    NotAnInteger(String),
    #[error("Integer value too big to be represented")]
    IntegerTooBig,
    #[error("Expected number but got '{0}'")]
    NotANumber(String),
    #[error("bad index \"{0}\": must be integer or end?-integer?")]
    BadIndex(String),
    #[error("Expected return code but got '{0}'")]
    NotAReturnCode(String),
}

pub(crate) enum IntParseError {
    Invalid,
    Overflow,
}

/// Parses an integer the way the language does: optional sign, `0x` hex,
/// leading-`0` octal, decimal otherwise. Leading whitespace is skipped;
/// anything trailing is an error.
pub(crate) fn parse_int(s: &str) -> Result<i64, IntParseError> {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut i = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            i = 1;
            true
        }
        Some(b'+') => {
            i = 1;
            false
        }
        _ => false,
    };
    let radix: u32 = if bytes.get(i) == Some(&b'0')
        && matches!(bytes.get(i + 1), Some(b'x' | b'X'))
    {
        i += 2;
        16
    } else if bytes.get(i) == Some(&b'0') && bytes.len() > i + 1 {
        i += 1;
        8
    } else {
        10
    };
    if i >= bytes.len() {
        return Err(IntParseError::Invalid);
    }
    let mut acc: i64 = 0;
    for &b in &bytes[i..] {
        let digit = char::from(b).to_digit(radix).ok_or(IntParseError::Invalid)?;
        // Accumulate on the negative side so i64::MIN parses.
        acc = acc
            .checked_mul(radix as i64)
            .and_then(|a| a.checked_sub(digit as i64))
            .ok_or(IntParseError::Overflow)?;
    }
    if negative {
        Ok(acc)
    } else {
        acc.checked_neg().ok_or(IntParseError::Overflow)
    }
}

/// Parses a double; leading whitespace is skipped, trailing text is an
/// error.
pub(crate) fn parse_double(s: &str) -> Option<f64> {
    s.trim_start().parse().ok()
}

/// Formats a double so it reads back as a double, never as an integer.
pub(crate) fn format_double(d: f64) -> String {
    let s = d.to_string();
    if s.contains(&['.', 'e', 'E'][..]) || d.is_nan() || d.is_infinite() {
        s
    } else {
        s + ".0"
    }
}

impl Heap {
    /// Regenerates the string form from the structured form if absent.
    ///
    /// Panics if the type has no string generator; such types never lose
    /// their string form, so reaching the panic is an interpreter bug.
    pub fn ensure_string(&mut self, id: ValueId) {
        if self.slot(id).bytes.is_some() {
            return;
        }
        let elements: Option<Vec<ValueId>> = match &self.slot(id).repr {
            Repr::List(items) => Some(items.clone()),
            Repr::Dict(dict) => Some(dict.entries.iter().flat_map(|&(k, v)| [k, v]).collect()),
            _ => None,
        };
        if let Some(elements) = elements {
            let s = crate::list::string_of_elements(self, &elements);
            self.slot_mut(id).bytes = Some(s);
            return;
        }
        let s = match &self.slot(id).repr {
            Repr::Int(i) => i.to_string(),
            Repr::Double(d) => format_double(*d),
            Repr::Index(i) => index::format_index(*i),
            Repr::Reference { id } => crate::gc::format_reference(*id),
            repr => panic!("no string generator for type {}", repr.type_name()),
        };
        self.slot_mut(id).bytes = Some(s);
    }

    /// The string form, generating it first if needed.
    pub fn string(&mut self, id: ValueId) -> &str {
        self.ensure_string(id);
        self.slot(id).bytes.as_deref().expect("just generated")
    }

    /// The string form as an owned copy.
    pub fn string_cloned(&mut self, id: ValueId) -> String {
        self.string(id).to_owned()
    }

    /// Drops the string form after a structured-form mutation.
    ///
    /// Panics if the structured form is absent; dropping the only
    /// representation is a contract violation.
    pub fn invalidate_string(&mut self, id: ValueId) {
        let slot = self.slot_mut(id);
        assert!(
            !matches!(slot.repr, Repr::None),
            "cannot drop a value's only representation"
        );
        slot.bytes = None;
    }

    /// Replaces the structured form, freeing the old one. The string form
    /// is untouched; this is the shimmering primitive.
    pub fn set_repr(&mut self, id: ValueId, repr: Repr) {
        let old = std::mem::replace(&mut self.slot_mut(id).repr, repr);
        self.free_repr(old);
    }

    /// Duplicates a value: the string form byte for byte, the structured
    /// form per type. Program forms fall back to the string form; their
    /// copy recompiles on demand.
    pub fn dup(&mut self, id: ValueId) -> ValueId {
        let slot = self.slot(id);
        let bytes = slot.bytes.clone();
        let repr = match &slot.repr {
            Repr::None => Repr::None,
            Repr::Int(v) => Repr::Int(*v),
            Repr::Double(v) => Repr::Double(*v),
            Repr::Index(v) => Repr::Index(*v),
            Repr::ReturnCode(c) => Repr::ReturnCode(*c),
            Repr::List(items) => Repr::List(items.clone()),
            Repr::Dict(dict) => Repr::Dict(dict.clone()),
            Repr::Source(source) => Repr::Source(source.clone()),
            Repr::Script(_) | Repr::Expr(_) => Repr::None,
            Repr::VarName { frame_id } => Repr::VarName {
                frame_id: *frame_id,
            },
            Repr::DictSugar { name, key } => Repr::DictSugar {
                name: *name,
                key: *key,
            },
            Repr::CmdName { epoch, cmd } => Repr::CmdName {
                epoch: *epoch,
                cmd: Rc::clone(cmd),
            },
            Repr::CheckedLiteral(l) => Repr::CheckedLiteral(*l),
            Repr::Reference { id } => Repr::Reference { id: *id },
        };
        match &repr {
            Repr::List(items) => {
                for &item in items {
                    self.retain(item);
                }
            }
            Repr::Dict(dict) => {
                for &(k, v) in &dict.entries {
                    self.retain(k);
                    self.retain(v);
                }
            }
            Repr::DictSugar { name, key } => {
                self.retain(*name);
                self.retain(*key);
            }
            _ => {}
        }
        self.alloc(bytes, repr)
    }

    /// Interprets the value as an integer, shimmering if needed.
    pub fn get_int(&mut self, id: ValueId) -> Result<i64, ValueError> {
        if let Repr::Int(v) = self.slot(id).repr {
            return Ok(v);
        }
        let s = self.string_cloned(id);
        let v = parse_int(&s).map_err(|e| match e {
            IntParseError::Invalid => ValueError::NotAnInteger(s.clone()),
            IntParseError::Overflow => ValueError::IntegerTooBig,
        })?;
        self.set_repr(id, Repr::Int(v));
        Ok(v)
    }

    /// Interprets the value as a double, shimmering if needed.
    pub fn get_double(&mut self, id: ValueId) -> Result<f64, ValueError> {
        if let Repr::Double(v) = self.slot(id).repr {
            return Ok(v);
        }
        let s = self.string_cloned(id);
        let v = parse_double(&s).ok_or(ValueError::NotANumber(s))?;
        self.set_repr(id, Repr::Double(v));
        Ok(v)
    }

    /// Interprets the value as a return-code name, shimmering if needed.
    pub fn get_return_code(&mut self, id: ValueId) -> Result<ReturnCode, ValueError> {
        if let Repr::ReturnCode(c) = self.slot(id).repr {
            return Ok(c);
        }
        let s = self.string_cloned(id);
        let c = ReturnCode::from_str(&s).map_err(|_| ValueError::NotAReturnCode(s))?;
        self.set_repr(id, Repr::ReturnCode(c));
        Ok(c)
    }

    /// Whether the value's string form equals a static literal, cached so
    /// repeated checks against the same literal are O(1).
    pub fn compare_string_immediate(&mut self, id: ValueId, literal: &'static str) -> bool {
        if let Repr::CheckedLiteral(l) = self.slot(id).repr {
            if std::ptr::eq(l, literal) {
                return true;
            }
        }
        let equal = self.string(id) == literal;
        if equal {
            self.set_repr(id, Repr::CheckedLiteral(literal));
        }
        equal
    }

    /// Byte equality of two values' string forms.
    pub fn strings_equal(&mut self, a: ValueId, b: ValueId) -> bool {
        if a == b {
            return true;
        }
        self.ensure_string(a);
        self.ensure_string(b);
        self.slot(a).bytes == self.slot(b).bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_bases() {
        assert!(matches!(parse_int("42"), Ok(42)));
        assert!(matches!(parse_int("-42"), Ok(-42)));
        assert!(matches!(parse_int("+7"), Ok(7)));
        assert!(matches!(parse_int("0x10"), Ok(16)));
        assert!(matches!(parse_int("0X10"), Ok(16)));
        assert!(matches!(parse_int("010"), Ok(8)));
        assert!(matches!(parse_int("0"), Ok(0)));
        assert!(matches!(parse_int("  12"), Ok(12)));
    }

    #[test]
    fn parse_int_extremes() {
        assert!(matches!(parse_int("9223372036854775807"), Ok(i64::MAX)));
        assert!(matches!(parse_int("-9223372036854775808"), Ok(i64::MIN)));
        assert!(matches!(
            parse_int("9223372036854775808"),
            Err(IntParseError::Overflow)
        ));
    }

    #[test]
    fn parse_int_rejects_garbage() {
        for s in ["", "x", "12x", "12 ", "08", "0x", "--4", "1.5"] {
            assert!(matches!(parse_int(s), Err(IntParseError::Invalid)), "{s}");
        }
    }

    #[test]
    fn double_strings_keep_a_decimal_point() {
        assert_eq!(format_double(2.0), "2.0");
        assert_eq!(format_double(-2.0), "-2.0");
        assert_eq!(format_double(0.5), "0.5");
        assert_eq!(format_double(1.25), "1.25");
    }

    #[test]
    fn int_shimmering_preserves_string() {
        let mut heap = Heap::new();
        let id = heap.new_string("0x2A");
        assert_eq!(heap.get_int(id), Ok(42));
        assert!(matches!(heap.slot(id).repr, Repr::Int(42)));
        assert_eq!(heap.string(id), "0x2A");
        heap.release(id);
    }

    #[test]
    fn int_string_generation() {
        let mut heap = Heap::new();
        let id = heap.alloc(None, Repr::Int(-7));
        assert_eq!(heap.string(id), "-7");
        heap.release(id);
    }

    #[test]
    fn conversion_error_messages() {
        let mut heap = Heap::new();
        let id = heap.new_string("pear");
        let error = heap.get_int(id).unwrap_err();
        assert_eq!(error.to_string(), "Expected integer but got 'pear'");
        let error = heap.get_double(id).unwrap_err();
        assert_eq!(error.to_string(), "Expected number but got 'pear'");
        let error = heap.get_return_code(id).unwrap_err();
        assert_eq!(error.to_string(), "Expected return code but got 'pear'");
        heap.release(id);
    }

    #[test]
    fn compare_string_immediate_caches() {
        let mut heap = Heap::new();
        let id = heap.new_string("args");
        assert!(heap.compare_string_immediate(id, "args"));
        assert!(matches!(heap.slot(id).repr, Repr::CheckedLiteral("args")));
        assert!(heap.compare_string_immediate(id, "args"));
        assert!(!heap.compare_string_immediate(id, "expand"));
        heap.release(id);
    }

    #[test]
    fn dup_copies_lists_deeply_enough() {
        let mut heap = Heap::new();
        let a = heap.new_string("a");
        heap.retain(a);
        let list = heap.alloc(None, Repr::List(vec![a]));
        heap.retain(list);
        let copy = heap.dup(list);
        heap.retain(copy);
        // The element is shared, the spine is not.
        assert!(heap.is_shared(a));
        heap.release(list);
        assert_eq!(heap.string(copy), "a");
        heap.release(copy);
        assert_eq!(heap.live_len(), 0);
    }

    #[test]
    fn return_code_shimmering() {
        let mut heap = Heap::new();
        let id = heap.new_string("break");
        assert_eq!(heap.get_return_code(id), Ok(ReturnCode::Break));
        heap.release(id);
    }
}
