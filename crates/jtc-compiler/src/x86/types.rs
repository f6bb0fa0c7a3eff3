//! Per-type x86 emission contracts.
//!
//! Integers, booleans and strings are 32-bit values living in `eax`;
//! doubles live on the x87 stack. Each operation here appends the items
//! that move a value of the given type between registers, the memory stack
//! and variable slots.

use crate::error::{CompileError, CompileResult};
use jtc_parser::ast::{ConstValue, Type};
use jtc_x86::listing::{line, Item, NameAlloc};

/// Size in bytes of a value on the memory stack.
pub fn size(ty: &Type) -> i32 {
    match ty {
        Type::Double => 8,
        Type::Void => 0,
        _ => 4,
    }
}

/// Whether values of this type occupy `eax` (as opposed to the x87 stack).
pub fn is_dword(ty: &Type) -> bool {
    matches!(ty, Type::Int | Type::Boolean | Type::String | Type::Function(_))
}

/// Push the current value onto the memory stack.
pub fn push(ty: &Type, out: &mut Vec<Item>) {
    if *ty == Type::Double {
        out.push(Item::SubEsp(8));
        out.push(line("fstp QWORD [esp]"));
    } else {
        out.push(line("push eax"));
    }
}

/// Drop the current value.
pub fn discard(ty: &Type, out: &mut Vec<Item>) {
    if *ty == Type::Double {
        out.push(line("fstp st0"));
    }
}

/// Load a variable's value.
pub fn read(ty: &Type, slot: &str, out: &mut Vec<Item>) {
    if *ty == Type::Double {
        out.push(line(format!("fld QWORD [{slot}]")));
    } else {
        out.push(line(format!("mov eax, [{slot}]")));
    }
}

/// Store the current value into a variable, consuming it.
pub fn write(ty: &Type, slot: &str, out: &mut Vec<Item>) {
    if *ty == Type::Double {
        out.push(line(format!("fstp QWORD [{slot}]")));
    } else {
        out.push(line(format!("mov [{slot}], eax")));
    }
}

/// Store the current value into a variable, keeping it for further use
/// (assignments are expressions).
pub fn store_keep(ty: &Type, slot: &str, out: &mut Vec<Item>) {
    if *ty == Type::Double {
        out.push(line(format!("fst QWORD [{slot}]")));
    } else {
        out.push(line(format!("mov [{slot}], eax")));
    }
}

/// x87 one-byte loaders for the exact constants the FPU can materialize.
/// 0.0 must stay out: `fldz` would break the sign of `-0.0` comparisons.
fn double_loader(value: f64) -> Option<&'static str> {
    use std::f64::consts;
    if value == 1.0 {
        Some("fld1")
    } else if value == consts::PI {
        Some("fldpi")
    } else if value == consts::LOG2_E {
        Some("fldl2e")
    } else if value == consts::LOG2_10 {
        Some("fldl2t")
    } else if value == consts::LOG10_2 {
        Some("fldlg2")
    } else if value == consts::LN_2 {
        Some("fldln2")
    } else {
        None
    }
}

/// Materialize a literal.
pub fn emit_const(value: &ConstValue, names: &mut NameAlloc, out: &mut Vec<Item>) {
    match value {
        ConstValue::Int(v) => out.push(line(format!("mov eax, {v}"))),
        ConstValue::Bool(v) => {
            out.push(line("xor eax, eax"));
            if *v {
                out.push(line("inc eax"));
            }
        }
        ConstValue::Str(v) => {
            let data = names.cstr(v);
            let label = data.label.clone();
            out.push(Item::Const(data));
            out.push(line(format!("mov eax, {label}")));
        }
        ConstValue::Double(v) => {
            if let Some(loader) = double_loader(*v) {
                out.push(line(loader));
            } else {
                let data = names.const_bytes(v.to_le_bytes().to_vec());
                let label = data.label.clone();
                out.push(Item::Const(data));
                out.push(line(format!("fld QWORD [{label}]")));
            }
        }
    }
}

/// Convert the current value from `from` to `target`.
pub fn cast_to(from: &Type, target: &Type, out: &mut Vec<Item>) -> CompileResult<()> {
    match (from, target) {
        (Type::Int, Type::Void | Type::Int) => {}
        (Type::Int | Type::Boolean, Type::Double) => {
            out.push(line("push eax"));
            out.push(line("fild DWORD [esp]"));
            out.push(Item::AddEsp(4));
        }
        (Type::Int, Type::Boolean) => {
            out.push(line("or eax, eax"));
            out.push(line("setnz al"));
            out.push(line("and eax, 1"));
        }
        (Type::Double, Type::Void) => out.push(line("fstp st0")),
        (Type::Double, Type::Double) => {}
        (Type::Double, Type::Int) => {
            // Swap the FPU control word for truncating rounding, convert,
            // then restore it
            out.push(Item::SubEsp(12));
            out.push(line("fnstcw [esp + 4]"));
            out.push(line("mov eax, [esp + 4]"));
            out.push(line("and eax, 0xf3ff"));
            out.push(line("or eax, 0x0400"));
            out.push(line("mov [esp + 8], eax"));
            out.push(line("fldcw [esp + 8]"));
            out.push(line("fistp DWORD [esp]"));
            out.push(line("fldcw [esp + 4]"));
            out.push(line("pop eax"));
            out.push(Item::AddEsp(8));
        }
        (Type::Double, Type::Boolean) => {
            out.push(line("fldz"));
            out.push(line("fucomi st0, st1"));
            out.push(line("setne al"));
            out.push(line("and eax, 1"));
            out.push(line("fstp st0"));
            out.push(line("fstp st0"));
        }
        (Type::Boolean, Type::Void | Type::Int | Type::Boolean) => {}
        (Type::String, Type::Void | Type::String) => {}
        (Type::Void, Type::Void) => {}
        _ => return Err(CompileError::UntypedExpression),
    }
    Ok(())
}
