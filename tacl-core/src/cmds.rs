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

//! Core command bindings
//!
//! The commands the interpreter core registers at creation: variable and
//! control primitives, the list/dict accessors the core contracts need,
//! the reference commands, and `subst`. Each command validates its own
//! arity and returns its result value; the dispatcher stores it as the
//! interpreter result.
//!
//! `lambda` and its finalizer are core procedures, defined by evaluating
//! a bootstrap script at registration time.

use crate::heap::ValueId;
use crate::interp::Interp;
use crate::semantics::{Flow, ReturnCode, Unwind};
use crate::value::Repr;
use std::rc::Rc;
use tacl_syntax::SubstFlags;

/// [set]
fn set_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    match argv.len() {
        2 => interp.get_variable(argv[1]),
        3 => {
            interp.set_variable(argv[1], argv[2])?;
            Ok(argv[2])
        }
        _ => Err(interp.wrong_num_args(&argv[..1], "varName ?newValue?")),
    }
}

/// [unset]
fn unset_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(&argv[..1], "varName ?varName ...?"));
    }
    for &name in &argv[1..] {
        interp.unset_variable(name)?;
    }
    Ok(interp.result())
}

/// [incr]
fn incr_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 2 && argv.len() != 3 {
        return Err(interp.wrong_num_args(&argv[..1], "varName ?increment?"));
    }
    let increment = if argv.len() == 3 {
        interp.get_int(argv[2])?
    } else {
        1
    };
    let int_obj = interp.get_variable(argv[1])?;
    let value = interp.get_int(int_obj)?;
    let sum = value.wrapping_add(increment);
    if interp.heap.is_shared(int_obj) {
        let fresh = interp.new_int(sum);
        interp.set_variable(argv[1], fresh)?;
        Ok(fresh)
    } else {
        interp.heap.set_repr(int_obj, Repr::Int(sum));
        interp.heap.invalidate_string(int_obj);
        Ok(int_obj)
    }
}

/// [while]
fn while_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 3 {
        return Err(interp.wrong_num_args(&argv[..1], "condition body"));
    }
    loop {
        if !interp.eval_expression_bool(argv[1])? {
            break;
        }
        match interp.eval_value(argv[2]) {
            Ok(_) => {}
            Err(Unwind::Break) => break,
            Err(Unwind::Continue) => continue,
            Err(unwind) => return Err(unwind),
        }
    }
    interp.set_empty_result();
    Ok(interp.result())
}

/// [if]
fn if_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    fn usage(interp: &mut Interp, argv: &[ValueId]) -> Unwind {
        interp.wrong_num_args(
            &argv[..1],
            "condition ?then? trueBody ?elseif ...? ?else? falseBody",
        )
    }
    if argv.len() < 3 {
        return Err(usage(interp, argv));
    }
    let mut current = 1;
    loop {
        if current >= argv.len() {
            return Err(usage(interp, argv));
        }
        let truth = interp.eval_expression_bool(argv[current])?;
        current += 1;
        if current >= argv.len() {
            return Err(usage(interp, argv));
        }
        if interp.heap.compare_string_immediate(argv[current], "then") {
            current += 1;
        }
        if current >= argv.len() {
            return Err(usage(interp, argv));
        }
        if truth {
            return interp.eval_value(argv[current]);
        }
        current += 1;
        if current >= argv.len() {
            return Ok(interp.result());
        }
        let false_body = current;
        current += 1;
        if interp.heap.compare_string_immediate(argv[false_body], "else") {
            if current != argv.len() - 1 {
                return Err(usage(interp, argv));
            }
            return interp.eval_value(argv[current]);
        }
        if interp.heap.compare_string_immediate(argv[false_body], "elseif") {
            continue;
        }
        if false_body != argv.len() - 1 {
            return Err(usage(interp, argv));
        }
        return interp.eval_value(argv[false_body]);
    }
}

/// [list]
fn list_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    Ok(interp.new_list(&argv[1..]))
}

/// [lindex]
fn lindex_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 3 {
        return Err(interp.wrong_num_args(&argv[..1], "listValue index ?...?"));
    }
    let mut obj = argv[1];
    for &index_value in &argv[2..] {
        let index = interp.get_index(index_value)?;
        match interp.heap.list_index(obj, index) {
            Some(element) => obj = element,
            // Out of range yields the empty result, not an error.
            None => {
                interp.set_empty_result();
                return Ok(interp.result());
            }
        }
    }
    Ok(obj)
}

/// [llength]
fn llength_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 2 {
        return Err(interp.wrong_num_args(&argv[..1], "listValue"));
    }
    let length = interp.list_length(argv[1]);
    Ok(interp.new_int(length as i64))
}

/// [lset]
fn lset_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 3 {
        return Err(interp.wrong_num_args(&argv[..1], "listVar ?index ...? newValue"));
    }
    if argv.len() == 3 {
        interp.set_variable(argv[1], argv[2])?;
        return Ok(argv[2]);
    }
    interp.set_list_index(argv[1], &argv[2..argv.len() - 1], argv[argv.len() - 1])
}

/// [lappend]
fn lappend_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(&argv[..1], "listVar ?element ...?"));
    }
    let mut list_obj = match interp.get_variable_opt(argv[1]) {
        Some(value) => value,
        None => {
            let fresh = interp.new_list(&[]);
            if let Err(unwind) = interp.set_variable(argv[1], fresh) {
                interp.heap.release(fresh);
                return Err(unwind);
            }
            fresh
        }
    };
    let shared = interp.heap.is_shared(list_obj);
    if shared {
        list_obj = interp.heap.dup(list_obj);
    }
    for &element in &argv[2..] {
        interp.heap.list_append(list_obj, element);
    }
    if shared {
        if let Err(unwind) = interp.set_variable(argv[1], list_obj) {
            interp.heap.release(list_obj);
            return Err(unwind);
        }
    }
    Ok(list_obj)
}

/// [append]
fn append_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(&argv[..1], "varName ?string ...?"));
    }
    if argv.len() == 2 {
        return interp.get_variable(argv[1]);
    }
    let mut string_obj = match interp.get_variable_opt(argv[1]) {
        Some(value) => value,
        None => {
            let fresh = interp.new_string("");
            if let Err(unwind) = interp.set_variable(argv[1], fresh) {
                interp.heap.release(fresh);
                return Err(unwind);
            }
            fresh
        }
    };
    let shared = interp.heap.is_shared(string_obj);
    if shared {
        string_obj = interp.heap.dup(string_obj);
    }
    for &part in &argv[2..] {
        let text = interp.heap.string_cloned(part);
        interp.append_string(string_obj, &text);
    }
    if shared {
        if let Err(unwind) = interp.set_variable(argv[1], string_obj) {
            interp.heap.release(string_obj);
            return Err(unwind);
        }
    }
    Ok(string_obj)
}

/// [concat]
fn concat_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    Ok(interp.heap.concat(&argv[1..]))
}

/// [eval]
fn eval_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    match argv.len() {
        0 | 1 => Err(interp.wrong_num_args(&argv[..1], "script ?...?")),
        2 => interp.eval_value(argv[1]),
        _ => {
            let script = interp.heap.concat(&argv[1..]);
            interp.heap.retain(script);
            let result = interp.eval_value(script);
            interp.heap.release(script);
            result
        }
    }
}

/// [uplevel]
fn uplevel_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(&argv[..1], "?level? script ?...?"));
    }
    let text = interp.heap.string_cloned(argv[1]);
    let explicit_level = argv.len() >= 3
        && text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '#');
    let (target, scripts) = if explicit_level {
        (interp.get_call_frame_by_level(Some(argv[1]))?, &argv[2..])
    } else {
        (interp.get_call_frame_by_level(None)?, &argv[1..])
    };
    let saved = interp.current_frame;
    interp.current_frame = target;
    let result = if scripts.len() == 1 {
        interp.eval_value(scripts[0])
    } else {
        let script = interp.heap.concat(scripts);
        interp.heap.retain(script);
        let result = interp.eval_value(script);
        interp.heap.release(script);
        result
    };
    interp.current_frame = saved;
    result
}

/// [expr]
fn expr_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(&argv[..1], "expression ?...?"));
    }
    let value = if argv.len() == 2 {
        interp.eval_expression(argv[1])?
    } else {
        let expression = interp.heap.concat(&argv[1..]);
        interp.heap.retain(expression);
        let result = interp.eval_expression(expression);
        interp.heap.release(expression);
        result?
    };
    interp.set_result(value);
    interp.heap.release(value);
    Ok(interp.result())
}

/// [break]
fn break_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 1 {
        return Err(interp.wrong_num_args(&argv[..1], ""));
    }
    Err(Unwind::Break)
}

/// [continue]
fn continue_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 1 {
        return Err(interp.wrong_num_args(&argv[..1], ""));
    }
    Err(Unwind::Continue)
}

/// [return]
fn return_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    match argv.len() {
        1 => Err(Unwind::Return(interp.result())),
        2 => {
            interp.set_result(argv[1]);
            interp.return_code = ReturnCode::Ok;
            Err(Unwind::Return(interp.result()))
        }
        3 | 4 => {
            let code = interp.get_return_code(argv[2])?;
            interp.return_code = code;
            if argv.len() == 4 {
                interp.set_result(argv[3]);
            }
            Err(Unwind::Return(interp.result()))
        }
        _ => Err(interp.wrong_num_args(&argv[..1], "?-code code? ?result?")),
    }
}

/// [proc]
fn proc_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 4 {
        return Err(interp.wrong_num_args(&argv[..1], "name arglist body"));
    }
    let formals = interp.list_length(argv[2]);
    let mut arity_min = formals + 1;
    let mut arity_max = Some(formals + 1);
    if formals > 0 {
        let last = interp
            .heap
            .list_index(argv[2], formals as i64 - 1)
            .expect("length was just measured");
        if interp.heap.string(last) == "args" {
            arity_min -= 1;
            arity_max = None;
        }
    }
    let name = interp.heap.string_cloned(argv[1]);
    interp.create_procedure(&name, argv[2], argv[3], arity_min, arity_max);
    Ok(interp.result())
}

/// [upvar]
fn upvar_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 3 {
        return Err(interp.wrong_num_args(
            &argv[..1],
            "?level? otherVar localVar ?otherVar localVar ...?",
        ));
    }
    let text = interp.heap.string_cloned(argv[1]);
    let explicit_level = argv.len() > 3
        && text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '#');
    let (target, pairs) = if explicit_level {
        (interp.get_call_frame_by_level(Some(argv[1]))?, &argv[2..])
    } else {
        (interp.get_call_frame_by_level(None)?, &argv[1..])
    };
    if pairs.len() < 2 || pairs.len() % 2 != 0 {
        return Err(interp.wrong_num_args(
            &argv[..1],
            "?level? otherVar localVar ?otherVar localVar ...?",
        ));
    }
    for pair in pairs.chunks(2) {
        interp.set_variable_link(pair[1], pair[0], target)?;
    }
    Ok(interp.result())
}

/// [global]
fn global_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(&argv[..1], "varName ?varName ...?"));
    }
    // At the global scope there is nothing to link.
    if interp.num_levels == 0 {
        return Ok(interp.result());
    }
    let top = interp.top_frame;
    for &name in &argv[1..] {
        interp.set_variable_link(name, name, top)?;
    }
    Ok(interp.result())
}

/// [catch]
fn catch_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 2 && argv.len() != 3 {
        return Err(interp.wrong_num_args(&argv[..1], "script ?varName?"));
    }
    let code = match interp.eval_value(argv[1]) {
        Ok(_) => ReturnCode::Ok,
        Err(unwind) => unwind.return_code(),
    };
    if argv.len() == 3 {
        let result = interp.result();
        interp.set_variable(argv[2], result)?;
    }
    Ok(interp.new_int(code.code()))
}

/// [error]
fn error_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 2 {
        return Err(interp.wrong_num_args(&argv[..1], "message"));
    }
    Err(interp.error_value(argv[1]))
}

/// [ref]
fn ref_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 2 && argv.len() != 3 {
        return Err(interp.wrong_num_args(&argv[..1], "string ?finalizer?"));
    }
    Ok(interp.new_reference(argv[1], argv.get(2).copied()))
}

/// [getref]
fn getref_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 2 {
        return Err(interp.wrong_num_args(&argv[..1], "reference"));
    }
    interp.reference_value(argv[1])
}

/// [setref]
fn setref_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 3 {
        return Err(interp.wrong_num_args(&argv[..1], "reference newValue"));
    }
    interp.set_reference(argv[1], argv[2])?;
    Ok(argv[1])
}

/// [collect]
fn collect_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 1 {
        return Err(interp.wrong_num_args(&argv[..1], ""));
    }
    let collected = interp.collect();
    Ok(interp.new_int(collected as i64))
}

/// [rename]
fn rename_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() != 3 {
        return Err(interp.wrong_num_args(&argv[..1], "oldName newName"));
    }
    let old_name = interp.heap.string_cloned(argv[1]);
    let new_name = interp.heap.string_cloned(argv[2]);
    if !interp.rename_command(&old_name, &new_name) {
        return Err(
            interp.error(format!("can't rename \"{old_name}\": command doesn't exist"))
        );
    }
    Ok(interp.result())
}

/// [dict]
fn dict_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(&argv[..1], "option ?arguments ...?"));
    }
    if interp.heap.compare_string_immediate(argv[1], "create") {
        if argv.len() % 2 != 0 {
            return Err(interp.wrong_num_args(&argv[..2], "?key value ...?"));
        }
        Ok(interp.new_dict(&argv[2..]))
    } else if interp.heap.compare_string_immediate(argv[1], "get") {
        if argv.len() < 3 {
            return Err(interp.wrong_num_args(&argv[..2], "dictionary ?key ...?"));
        }
        interp.dict_keys_get(argv[2], &argv[3..])
    } else if interp.heap.compare_string_immediate(argv[1], "set") {
        if argv.len() < 5 {
            return Err(interp.wrong_num_args(&argv[..2], "varName key ?key ...? value"));
        }
        interp.set_dict_keys(argv[2], &argv[3..argv.len() - 1], Some(argv[argv.len() - 1]))
    } else if interp.heap.compare_string_immediate(argv[1], "unset") {
        if argv.len() < 4 {
            return Err(interp.wrong_num_args(&argv[..2], "varName key ?key ...?"));
        }
        interp.set_dict_keys(argv[2], &argv[3..], None)
    } else if interp.heap.compare_string_immediate(argv[1], "exists") {
        if argv.len() < 3 {
            return Err(interp.wrong_num_args(&argv[..2], "dictionary ?key ...?"));
        }
        let exists = interp.dict_keys_get(argv[2], &argv[3..]).is_ok();
        Ok(interp.new_int(exists as i64))
    } else {
        let option = interp.heap.string_cloned(argv[1]);
        Err(interp.error(format!(
            "bad option \"{option}\": must be create, get, set, unset, exists"
        )))
    }
}

/// [subst]
fn subst_cmd(interp: &mut Interp, argv: &[ValueId]) -> Flow {
    if argv.len() < 2 {
        return Err(interp.wrong_num_args(
            &argv[..1],
            "?-nobackslashes? ?-nocommands? ?-novariables? string",
        ));
    }
    let mut flags = SubstFlags::empty();
    for &option in &argv[1..argv.len() - 1] {
        if interp.heap.compare_string_immediate(option, "-nobackslashes") {
            flags |= SubstFlags::NO_ESC;
        } else if interp.heap.compare_string_immediate(option, "-novariables") {
            flags |= SubstFlags::NO_VAR;
        } else if interp.heap.compare_string_immediate(option, "-nocommands") {
            flags |= SubstFlags::NO_CMD;
        } else {
            let option = interp.heap.string_cloned(option);
            return Err(interp.error(format!(
                "bad option \"{option}\": must be -nobackslashes, -nocommands, or -novariables"
            )));
        }
    }
    interp.subst_value(argv[argv.len() - 1], flags)
}

/// Registers every core command and the bootstrap procedures.
pub(crate) fn register_core_commands(interp: &mut Interp) {
    type Native = fn(&mut Interp, &[ValueId]) -> Flow;
    const TABLE: &[(&str, Native, usize, Option<usize>)] = &[
        ("set", set_cmd, 2, Some(3)),
        ("unset", unset_cmd, 2, None),
        ("incr", incr_cmd, 2, Some(3)),
        ("while", while_cmd, 3, Some(3)),
        ("if", if_cmd, 3, None),
        ("list", list_cmd, 1, None),
        ("lindex", lindex_cmd, 3, None),
        ("llength", llength_cmd, 2, Some(2)),
        ("lset", lset_cmd, 4, None),
        ("lappend", lappend_cmd, 2, None),
        ("append", append_cmd, 2, None),
        ("concat", concat_cmd, 1, None),
        ("eval", eval_cmd, 2, None),
        ("uplevel", uplevel_cmd, 2, None),
        ("expr", expr_cmd, 2, None),
        ("break", break_cmd, 1, Some(1)),
        ("continue", continue_cmd, 1, Some(1)),
        ("return", return_cmd, 1, Some(4)),
        ("proc", proc_cmd, 4, Some(4)),
        ("upvar", upvar_cmd, 3, None),
        ("global", global_cmd, 2, None),
        ("catch", catch_cmd, 2, Some(3)),
        ("error", error_cmd, 2, Some(2)),
        ("ref", ref_cmd, 2, Some(3)),
        ("getref", getref_cmd, 2, Some(2)),
        ("setref", setref_cmd, 3, Some(3)),
        ("collect", collect_cmd, 1, Some(1)),
        ("rename", rename_cmd, 3, Some(3)),
        ("dict", dict_cmd, 2, None),
        ("subst", subst_cmd, 2, None),
    ];
    for &(name, func, arity_min, arity_max) in TABLE {
        interp.create_command(name, Rc::new(func), arity_min, arity_max);
    }

    let bootstrap = "\
proc lambda {arglist body} {
    set name [ref {} lambdaFinalizer]
    proc $name $arglist $body
    return $name
}
proc lambdaFinalizer {name val} {
    rename $name {}
}
";
    interp
        .eval(bootstrap)
        .expect("the bootstrap procedures always parse");
}
