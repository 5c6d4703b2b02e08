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

//! The expression compiler and stack VM
//!
//! Expressions compile to a postfix program: parallel arrays of opcodes
//! and operand values. Compilation is the shunting-yard algorithm over the
//! expression token mode, followed by an abstract stack-effect check that
//! rejects malformed programs (and the ternary operator, which the VM does
//! not implement) before anything runs.
//!
//! The VM evaluates binary arithmetic on integers first and retries as
//! doubles, with one refinement: a value whose current type is double and
//! whose string form has not been regenerated is never coerced to integer,
//! so `2.0` stays a double even though its string would parse as one after
//! regeneration. Bitwise, shift, rotate, and modulo operators are
//! integer-only. Logical `&&` and `||` evaluate both operands; the postfix
//! program has no jumps to skip with.

use crate::heap::ValueId;
use crate::interp::Interp;
use crate::semantics::{Flow, Unwind};
use crate::value::Repr;
use std::rc::Rc;
use tacl_syntax::{Parser, TokenKind};

/// Opcodes of the expression VM
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Op {
    // Operand loads
    Number,
    String,
    Variable,
    DictSugar,
    Command,
    // Unary operators
    Not,
    BitNot,
    UnaryMinus,
    UnaryPlus,
    // Binary operators
    Mul,
    Div,
    Mod,
    Sub,
    Add,
    RotateLeft,
    RotateRight,
    ShiftLeft,
    ShiftRight,
    Lt,
    Gt,
    Le,
    Ge,
    NumEq,
    NumNe,
    StrEq,
    StrNe,
    BitAnd,
    BitXor,
    BitOr,
    LogicAnd,
    LogicOr,
    /// In the operator table for tokenization, rejected by the
    /// correctness check
    Ternary,
}

impl Op {
    fn is_operand(self) -> bool {
        matches!(
            self,
            Op::Number | Op::String | Op::Variable | Op::DictSugar | Op::Command
        )
    }

    fn is_unary(self) -> bool {
        matches!(self, Op::Not | Op::BitNot | Op::UnaryMinus | Op::UnaryPlus)
    }
}

/// Table entry for an operator
struct OperatorInfo {
    name: &'static str,
    precedence: u16,
    op: Op,
    unary: bool,
}

const fn op(name: &'static str, precedence: u16, op: Op, unary: bool) -> OperatorInfo {
    OperatorInfo {
        name,
        precedence,
        op,
        unary,
    }
}

/// The fixed operator table; precedence classes match the language
/// definition, highest first.
const OPERATORS: &[OperatorInfo] = &[
    op("!", 300, Op::Not, true),
    op("~", 300, Op::BitNot, true),
    op("unarymin", 300, Op::UnaryMinus, true),
    op("unaryplus", 300, Op::UnaryPlus, true),
    op("*", 200, Op::Mul, false),
    op("/", 200, Op::Div, false),
    op("%", 200, Op::Mod, false),
    op("-", 100, Op::Sub, false),
    op("+", 100, Op::Add, false),
    op("<<<", 90, Op::RotateLeft, false),
    op(">>>", 90, Op::RotateRight, false),
    op("<<", 90, Op::ShiftLeft, false),
    op(">>", 90, Op::ShiftRight, false),
    op("<", 80, Op::Lt, false),
    op(">", 80, Op::Gt, false),
    op("<=", 80, Op::Le, false),
    op(">=", 80, Op::Ge, false),
    op("==", 70, Op::NumEq, false),
    op("!=", 70, Op::NumNe, false),
    op("eq", 60, Op::StrEq, false),
    op("ne", 60, Op::StrNe, false),
    op("&", 50, Op::BitAnd, false),
    op("^", 49, Op::BitXor, false),
    op("|", 48, Op::BitOr, false),
    op("&&", 10, Op::LogicAnd, false),
    op("||", 10, Op::LogicOr, false),
    op("?", 5, Op::Ternary, false),
];

fn operator_info(name: &str) -> Option<&'static OperatorInfo> {
    OPERATORS.iter().find(|info| info.name == name)
}

/// Compiled expression: parallel opcode and operand-value arrays
///
/// Shared through `Rc` for the same reason as
/// [`ScriptRep`](crate::script::ScriptRep): the program must survive
/// shimmering of its value while the VM is running it.
#[derive(Debug)]
pub(crate) struct ExprProgram {
    pub ops: Vec<Op>,
    /// One retained value per instruction: the operand text, or the
    /// operator name
    pub values: Vec<ValueId>,
}

/// Simulates stack effects without evaluating; a well-formed program
/// never underflows and leaves exactly one result.
fn check_correctness(ops: &[Op]) -> bool {
    let mut depth = 0i64;
    for &op in ops {
        if op.is_operand() {
            depth += 1;
        } else if op.is_unary() {
            if depth < 1 {
                return false;
            }
        } else if op == Op::Ternary {
            return false;
        } else {
            if depth < 2 {
                return false;
            }
            depth -= 1;
        }
    }
    depth == 1
}

enum StackEntry {
    Paren,
    Operator(&'static OperatorInfo),
}

fn emit(
    interp: &mut Interp,
    ops: &mut Vec<Op>,
    values: &mut Vec<ValueId>,
    op: Op,
    text: &str,
) {
    let value = interp.heap.new_string(text);
    interp.heap.retain(value);
    ops.push(op);
    values.push(value);
}

impl Interp {
    /// The compiled form of an expression value, compiling it if needed.
    fn get_expression(&mut self, id: ValueId) -> Flow<Rc<ExprProgram>> {
        if let Repr::Expr(program) = &self.heap.slot(id).repr {
            return Ok(Rc::clone(program));
        }
        self.compile_expression(id)
    }

    fn compile_expression(&mut self, id: ValueId) -> Flow<Rc<ExprProgram>> {
        // Literal sharing pays off only for expressions written in source,
        // not built at runtime.
        let share_literals = matches!(self.heap.slot(id).repr, Repr::Source(_));
        let text = self.heap.string_cloned(id);
        let mut parser = Parser::new(&text, 1);
        let mut ops: Vec<Op> = Vec::new();
        let mut values: Vec<ValueId> = Vec::new();
        let mut stack: Vec<StackEntry> = Vec::new();

        while !parser.at_eof() {
            let Ok(token) = parser.next_expr() else {
                return self.compile_fail(values, "Syntax error in expression");
            };
            if token.kind == TokenKind::Eol {
                break;
            }
            let token_text = parser.text(&token).into_owned();
            match token.kind {
                TokenKind::Str | TokenKind::Esc => {
                    emit(self, &mut ops, &mut values, Op::String, &token_text);
                }
                TokenKind::Var => emit(self, &mut ops, &mut values, Op::Variable, &token_text),
                TokenKind::DictSugar => {
                    emit(self, &mut ops, &mut values, Op::DictSugar, &token_text);
                }
                TokenKind::Cmd => emit(self, &mut ops, &mut values, Op::Command, &token_text),
                TokenKind::Number => emit(self, &mut ops, &mut values, Op::Number, &token_text),
                TokenKind::Operator => {
                    let Some(info) = operator_info(&token_text) else {
                        return self.compile_fail(values, "Syntax error in expression");
                    };
                    loop {
                        let top = match stack.last() {
                            Some(StackEntry::Operator(top)) => *top,
                            _ => break,
                        };
                        if !info.unary && top.precedence >= info.precedence {
                            emit(self, &mut ops, &mut values, top.op, top.name);
                            stack.pop();
                        } else {
                            break;
                        }
                    }
                    stack.push(StackEntry::Operator(info));
                }
                TokenKind::SubExprStart => stack.push(StackEntry::Paren),
                TokenKind::SubExprEnd => {
                    let mut matched = false;
                    while let Some(entry) = stack.pop() {
                        match entry {
                            StackEntry::Paren => {
                                matched = true;
                                break;
                            }
                            StackEntry::Operator(info) => {
                                emit(self, &mut ops, &mut values, info.op, info.name);
                            }
                        }
                    }
                    if !matched {
                        return self.compile_fail(values, "Unexpected close parenthesis");
                    }
                }
                kind => unreachable!("token {kind:?} in an expression"),
            }
        }
        while let Some(entry) = stack.pop() {
            match entry {
                StackEntry::Paren => {
                    return self.compile_fail(values, "Missing close parenthesis");
                }
                StackEntry::Operator(info) => {
                    emit(self, &mut ops, &mut values, info.op, info.name);
                }
            }
        }
        if !check_correctness(&ops) {
            return self.compile_fail(values, "Invalid expression");
        }

        if share_literals {
            if let Some(body) = self.frames[self.current_frame].proc_body {
                if let Repr::Script(body_rep) = &self.heap.slot(body).repr {
                    let body_rep = Rc::clone(body_rep);
                    for value in &mut values {
                        let text = self.heap.string_cloned(*value);
                        if let Some(found) = self.search_literal(&body_rep, &text) {
                            if found != *value {
                                self.heap.retain(found);
                                self.heap.release(*value);
                                *value = found;
                            }
                        }
                    }
                }
            }
        }

        let program = Rc::new(ExprProgram { ops, values });
        self.heap.set_repr(id, Repr::Expr(Rc::clone(&program)));
        Ok(program)
    }

    fn compile_fail(&mut self, values: Vec<ValueId>, message: &str) -> Flow<Rc<ExprProgram>> {
        for value in values {
            self.heap.release(value);
        }
        Err(self.error(message))
    }

    /// Evaluates an expression value.
    ///
    /// The returned value carries a reference owned by the caller.
    pub fn eval_expression(&mut self, expr_id: ValueId) -> Flow {
        self.heap.retain(expr_id);
        let program = match self.get_expression(expr_id) {
            Ok(program) => program,
            Err(unwind) => {
                self.heap.release(expr_id);
                return Err(unwind);
            }
        };

        // A program of length N never needs a deeper stack than N.
        let mut stack: Vec<ValueId> = Vec::with_capacity(program.ops.len());
        let mut failed: Option<Unwind> = None;
        for (i, &op) in program.ops.iter().enumerate() {
            let step: Flow<()> = match op {
                Op::Number | Op::String => {
                    let value = program.values[i];
                    self.heap.retain(value);
                    stack.push(value);
                    Ok(())
                }
                Op::Variable => self.get_variable(program.values[i]).map(|value| {
                    self.heap.retain(value);
                    stack.push(value);
                }),
                Op::DictSugar => self.expand_dict_sugar(program.values[i]).map(|value| {
                    self.heap.retain(value);
                    stack.push(value);
                }),
                Op::Command => self.eval_value(program.values[i]).map(|value| {
                    self.heap.retain(value);
                    stack.push(value);
                }),
                Op::StrEq | Op::StrNe => {
                    let b = stack.pop().expect("checked stack effect");
                    let a = stack.pop().expect("checked stack effect");
                    let equal = self.heap.strings_equal(a, b);
                    self.heap.release(a);
                    self.heap.release(b);
                    let truth = equal == (op == Op::StrEq);
                    let value = self.heap.alloc(None, Repr::Int(truth as i64));
                    self.heap.retain(value);
                    stack.push(value);
                    Ok(())
                }
                op if op.is_unary() => {
                    let a = stack.pop().expect("checked stack effect");
                    let result = self.exec_unary(op, a);
                    self.heap.release(a);
                    result.map(|value| {
                        self.heap.retain(value);
                        stack.push(value);
                    })
                }
                op => {
                    let b = stack.pop().expect("checked stack effect");
                    let a = stack.pop().expect("checked stack effect");
                    let result = self.exec_binary(op, a, b);
                    self.heap.release(a);
                    self.heap.release(b);
                    result.map(|value| {
                        self.heap.retain(value);
                        stack.push(value);
                    })
                }
            };
            if let Err(unwind) = step {
                failed = Some(unwind);
                break;
            }
        }

        let outcome = match failed {
            // The top of stack keeps its reference; it transfers to the
            // caller.
            None => Ok(stack.pop().expect("checked stack effect")),
            Some(unwind) => Err(unwind),
        };
        for value in stack {
            self.heap.release(value);
        }
        self.heap.release(expr_id);
        self.heap.reap();
        outcome
    }

    /// Evaluates an expression and coerces the result to a truth value.
    pub fn eval_expression_bool(&mut self, expr_id: ValueId) -> Flow<bool> {
        let value = self.eval_expression(expr_id)?;
        let truth = match self.heap.get_int(value) {
            Ok(w) => Ok(w != 0),
            Err(_) => match self.heap.get_double(value) {
                Ok(d) => Ok(d != 0.0),
                Err(error) => Err(self.value_err(error)),
            },
        };
        self.heap.release(value);
        truth
    }

    /// Whether the integer interpretation must be skipped: the value is a
    /// double whose string form has not been regenerated.
    fn refuses_int(&self, id: ValueId) -> bool {
        matches!(self.heap.slot(id).repr, Repr::Double(_)) && self.heap.slot(id).bytes.is_none()
    }

    fn exec_unary(&mut self, op: Op, a: ValueId) -> Flow {
        if !self.refuses_int(a) {
            if let Ok(wa) = self.heap.get_int(a) {
                let wc = match op {
                    Op::Not => (wa == 0) as i64,
                    Op::BitNot => !wa,
                    Op::UnaryMinus => wa.wrapping_neg(),
                    Op::UnaryPlus => wa,
                    _ => unreachable!("not a unary opcode"),
                };
                return Ok(self.heap.alloc(None, Repr::Int(wc)));
            }
        }
        let da = match self.heap.get_double(a) {
            Ok(da) => da,
            Err(error) => return Err(self.value_err(error)),
        };
        let dc = match op {
            Op::Not => {
                if da == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Op::UnaryMinus => -da,
            Op::UnaryPlus => da,
            Op::BitNot => {
                return Err(
                    self.error("Got floating-point value where integer was expected")
                );
            }
            _ => unreachable!("not a unary opcode"),
        };
        Ok(self.heap.alloc(None, Repr::Double(dc)))
    }

    fn exec_binary(&mut self, op: Op, a: ValueId, b: ValueId) -> Flow {
        if !self.refuses_int(a) && !self.refuses_int(b) {
            let ints = match (self.heap.get_int(a), self.heap.get_int(b)) {
                (Ok(wa), Ok(wb)) => Some((wa, wb)),
                _ => None,
            };
            if let Some((wa, wb)) = ints {
                let wc = match op {
                    Op::Add => wa.wrapping_add(wb),
                    Op::Sub => wa.wrapping_sub(wb),
                    Op::Mul => wa.wrapping_mul(wb),
                    Op::Lt => (wa < wb) as i64,
                    Op::Gt => (wa > wb) as i64,
                    Op::Le => (wa <= wb) as i64,
                    Op::Ge => (wa >= wb) as i64,
                    Op::NumEq => (wa == wb) as i64,
                    Op::NumNe => (wa != wb) as i64,
                    Op::BitAnd => wa & wb,
                    Op::BitXor => wa ^ wb,
                    Op::BitOr => wa | wb,
                    Op::LogicAnd => (wa != 0 && wb != 0) as i64,
                    Op::LogicOr => (wa != 0 || wb != 0) as i64,
                    Op::ShiftLeft => wa.wrapping_shl(wb as u32),
                    Op::ShiftRight => wa.wrapping_shr(wb as u32),
                    // Rotate amounts are taken modulo the integer width.
                    Op::RotateLeft => (wa as u64).rotate_left((wb & 63) as u32) as i64,
                    Op::RotateRight => (wa as u64).rotate_right((wb & 63) as u32) as i64,
                    Op::Div => {
                        if wb == 0 {
                            return Err(self.error("Division by zero"));
                        }
                        wa.wrapping_div(wb)
                    }
                    Op::Mod => {
                        if wb == 0 {
                            return Err(self.error("Division by zero"));
                        }
                        wa.wrapping_rem(wb)
                    }
                    _ => unreachable!("not a binary opcode"),
                };
                return Ok(self.heap.alloc(None, Repr::Int(wc)));
            }
        }
        let (da, db) = match (self.heap.get_double(a), self.heap.get_double(b)) {
            (Ok(da), Ok(db)) => (da, db),
            (Err(error), _) | (_, Err(error)) => return Err(self.value_err(error)),
        };
        let dc = match op {
            Op::Add => da + db,
            Op::Sub => da - db,
            Op::Mul => da * db,
            Op::Lt => return Ok(self.int_result((da < db) as i64)),
            Op::Gt => return Ok(self.int_result((da > db) as i64)),
            Op::Le => return Ok(self.int_result((da <= db) as i64)),
            Op::Ge => return Ok(self.int_result((da >= db) as i64)),
            Op::NumEq => return Ok(self.int_result((da == db) as i64)),
            Op::NumNe => return Ok(self.int_result((da != db) as i64)),
            Op::LogicAnd => return Ok(self.int_result((da != 0.0 && db != 0.0) as i64)),
            Op::LogicOr => return Ok(self.int_result((da != 0.0 || db != 0.0) as i64)),
            Op::Div => {
                if db == 0.0 {
                    return Err(self.error("Division by zero"));
                }
                da / db
            }
            Op::Mod
            | Op::ShiftLeft
            | Op::ShiftRight
            | Op::RotateLeft
            | Op::RotateRight
            | Op::BitAnd
            | Op::BitXor
            | Op::BitOr => {
                return Err(
                    self.error("Got floating-point value where integer was expected")
                );
            }
            _ => unreachable!("not a binary opcode"),
        };
        Ok(self.heap.alloc(None, Repr::Double(dc)))
    }

    fn int_result(&mut self, value: i64) -> ValueId {
        self.heap.alloc(None, Repr::Int(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr_ok(interp: &mut Interp, text: &str) -> String {
        let id = interp.new_string(text);
        interp.retain(id);
        let result = interp.eval_expression(id);
        interp.release(id);
        match result {
            Ok(value) => {
                let text = interp.get_string(value).to_owned();
                interp.release(value);
                text
            }
            Err(_) => panic!("expression failed: {}", interp.result_string()),
        }
    }

    fn expr_err(interp: &mut Interp, text: &str) -> String {
        let id = interp.new_string(text);
        interp.retain(id);
        let result = interp.eval_expression(id);
        interp.release(id);
        assert!(result.is_err(), "expression should fail: {text}");
        interp.result_string()
    }

    #[test]
    fn integer_arithmetic() {
        let mut interp = Interp::new();
        assert_eq!(expr_ok(&mut interp, "1+2"), "3");
        assert_eq!(expr_ok(&mut interp, "10-2-3"), "5");
        assert_eq!(expr_ok(&mut interp, "2+3*4"), "14");
        assert_eq!(expr_ok(&mut interp, "(2+3)*4"), "20");
        assert_eq!(expr_ok(&mut interp, "17%5"), "2");
        assert_eq!(expr_ok(&mut interp, "40+2"), "42");
    }

    #[test]
    fn unary_operators() {
        let mut interp = Interp::new();
        assert_eq!(expr_ok(&mut interp, "!0"), "1");
        assert_eq!(expr_ok(&mut interp, "!5"), "0");
        assert_eq!(expr_ok(&mut interp, "~0"), "-1");
        assert_eq!(expr_ok(&mut interp, "-3 + 1"), "-2");
    }

    #[test]
    fn comparisons_and_logic() {
        let mut interp = Interp::new();
        assert_eq!(expr_ok(&mut interp, "1 < 2"), "1");
        assert_eq!(expr_ok(&mut interp, "2 <= 1"), "0");
        assert_eq!(expr_ok(&mut interp, "3 == 3"), "1");
        assert_eq!(expr_ok(&mut interp, "3 != 3"), "0");
        assert_eq!(expr_ok(&mut interp, "1 && 0"), "0");
        assert_eq!(expr_ok(&mut interp, "1 || 0"), "1");
        assert_eq!(expr_ok(&mut interp, "2 && 3"), "1");
    }

    #[test]
    fn bit_operations() {
        let mut interp = Interp::new();
        assert_eq!(expr_ok(&mut interp, "3 & 5"), "1");
        assert_eq!(expr_ok(&mut interp, "3 ^ 5"), "6");
        assert_eq!(expr_ok(&mut interp, "3 | 5"), "7");
        assert_eq!(expr_ok(&mut interp, "1 << 4"), "16");
        assert_eq!(expr_ok(&mut interp, "64 >> 3"), "8");
    }

    #[test]
    fn rotates_use_the_full_width() {
        let mut interp = Interp::new();
        assert_eq!(expr_ok(&mut interp, "1 <<< 1"), "2");
        assert_eq!(expr_ok(&mut interp, "1 >>> 1"), i64::MIN.to_string());
        assert_eq!(expr_ok(&mut interp, "8 <<< 64"), "8");
    }

    #[test]
    fn doubles_and_promotion() {
        let mut interp = Interp::new();
        assert_eq!(expr_ok(&mut interp, "1.5 + 2.25"), "3.75");
        assert_eq!(expr_ok(&mut interp, "1 + 2.5"), "3.5");
        assert_eq!(expr_ok(&mut interp, "10 / 4"), "2");
        assert_eq!(expr_ok(&mut interp, "10.0 / 4"), "2.5");
        assert_eq!(expr_ok(&mut interp, "2.0 == 2"), "1");
    }

    #[test]
    fn integer_only_operators_reject_doubles() {
        let mut interp = Interp::new();
        assert_eq!(
            expr_err(&mut interp, "1.5 % 2"),
            "Got floating-point value where integer was expected"
        );
        assert_eq!(
            expr_err(&mut interp, "1.5 << 1"),
            "Got floating-point value where integer was expected"
        );
        assert_eq!(
            expr_err(&mut interp, "~1.5"),
            "Got floating-point value where integer was expected"
        );
    }

    #[test]
    fn division_by_zero() {
        let mut interp = Interp::new();
        assert_eq!(expr_err(&mut interp, "1/0"), "Division by zero");
        assert_eq!(expr_err(&mut interp, "1%0"), "Division by zero");
        assert_eq!(expr_err(&mut interp, "1.5/0"), "Division by zero");
    }

    #[test]
    fn string_equality_is_byte_wise() {
        let mut interp = Interp::new();
        assert_eq!(expr_ok(&mut interp, "{abc} eq {abc}"), "1");
        assert_eq!(expr_ok(&mut interp, "{abc} eq {abd}"), "0");
        assert_eq!(expr_ok(&mut interp, "{abc} ne {abd}"), "1");
        // Numerically equal, textually different.
        assert_eq!(expr_ok(&mut interp, "{2.0} eq {2}"), "0");
        assert_eq!(expr_ok(&mut interp, "2.0 == 2"), "1");
    }

    #[test]
    fn variables_and_commands_in_expressions() {
        let mut interp = Interp::new();
        interp.set_variable_str("a", "40").unwrap();
        assert_eq!(expr_ok(&mut interp, "$a + 2"), "42");
        assert_eq!(expr_ok(&mut interp, "[llength {x y z}] * 2"), "6");
        assert_eq!(
            expr_err(&mut interp, "$missing + 1"),
            "Can't read \"missing\": no such variable"
        );
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        let mut interp = Interp::new();
        assert_eq!(expr_err(&mut interp, "1 +"), "Invalid expression");
        assert_eq!(expr_err(&mut interp, "* 1"), "Invalid expression");
        assert_eq!(expr_err(&mut interp, "1 2"), "Invalid expression");
        assert_eq!(
            expr_err(&mut interp, "1 + 2)"),
            "Unexpected close parenthesis"
        );
        assert_eq!(
            expr_err(&mut interp, "(1 + 2"),
            "Missing close parenthesis"
        );
        assert_eq!(expr_err(&mut interp, "1 @ 2"), "Syntax error in expression");
    }

    #[test]
    fn ternary_is_rejected_at_compile_time() {
        let mut interp = Interp::new();
        assert_eq!(expr_err(&mut interp, "1 ? 2"), "Invalid expression");
    }

    #[test]
    fn correctness_check_stack_effects() {
        use Op::*;
        assert!(check_correctness(&[Number]));
        assert!(check_correctness(&[Number, Number, Add]));
        assert!(check_correctness(&[Number, UnaryMinus]));
        assert!(!check_correctness(&[Number, Number]));
        assert!(!check_correctness(&[Add]));
        assert!(!check_correctness(&[Number, Add]));
        assert!(!check_correctness(&[]));
        assert!(!check_correctness(&[Number, Number, Ternary]));
    }

    #[test]
    fn boolean_coercion() {
        let mut interp = Interp::new();
        let id = interp.new_string("3 > 2");
        interp.retain(id);
        assert_eq!(interp.eval_expression_bool(id), Ok(true));
        interp.release(id);
        let id = interp.new_string("0.0");
        interp.retain(id);
        assert_eq!(interp.eval_expression_bool(id), Ok(false));
        interp.release(id);
    }

    #[test]
    fn logic_operators_do_not_short_circuit() {
        let mut interp = Interp::new();
        // Both sides run: the command substitution on the right is
        // evaluated even though the left side decides the result.
        interp.eval("proc touch {} { global hit; set hit 1; return 1 }").unwrap();
        assert_eq!(expr_ok(&mut interp, "1 || [touch]"), "1");
        let hit = interp.get_variable_str("hit").unwrap();
        assert_eq!(interp.get_string(hit), "1");
    }

    #[test]
    fn compiled_expressions_are_cached() {
        let mut interp = Interp::new();
        let id = interp.new_string("1+1");
        interp.retain(id);
        let first = interp.eval_expression(id).unwrap();
        assert!(matches!(interp.heap.slot(id).repr, Repr::Expr(_)));
        let second = interp.eval_expression(id).unwrap();
        interp.release(first);
        interp.release(second);
        interp.release(id);
    }
}
