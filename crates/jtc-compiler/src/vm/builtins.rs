//! Bytecode bodies of the built-in functions.
//!
//! Built-ins call the runtime's own coercion and input intrinsics through
//! starred aliases (`*int`, `*input`, ...) installed by the module prologue,
//! so user functions can freely shadow the unstarred names.

use jtc_bytecode::{CodeObject, Const, Instr, Opcode};
use jtc_parser::ast::Builtin;

/// Filename recorded on synthetic code objects.
pub const BUILTINS_FILENAME: &str = "<builtins>";

/// The runtime globals aliased by the module prologue, in emission order.
pub const INTRINSIC_ALIASES: &[(&str, &str)] = &[
    ("bool", "*bool"),
    ("int", "*int"),
    ("float", "*float"),
    ("raw_input", "*input"),
    ("RuntimeError", "*error"),
];

/// The code object implementing a built-in.
pub fn code_object(builtin: Builtin, name: &str, arg_count: usize) -> CodeObject {
    let args = (0..arg_count).map(|i| format!("_{i}")).collect();
    CodeObject::function(name, BUILTINS_FILENAME, 0, args, body(builtin))
}

fn body(builtin: Builtin) -> Vec<Instr> {
    match builtin {
        // The runtime prints any value with a trailing newline
        Builtin::PrintInt | Builtin::PrintDouble | Builtin::PrintString => vec![
            Instr::name(Opcode::LoadFast, "_0"),
            Instr::op(Opcode::PrintItem),
            Instr::op(Opcode::PrintNewline),
            Instr::constant(Opcode::LoadConst, Const::None),
            Instr::op(Opcode::ReturnValue),
        ],
        Builtin::Error => vec![
            Instr::name(Opcode::LoadGlobal, "*error"),
            Instr::count(Opcode::CallFunction, 0),
            Instr::count(Opcode::RaiseVarargs, 1),
            Instr::constant(Opcode::LoadConst, Const::None),
            Instr::op(Opcode::ReturnValue),
        ],
        Builtin::ReadInt => read_body("*int"),
        Builtin::ReadDouble => read_body("*float"),
    }
}

fn read_body(coercion: &str) -> Vec<Instr> {
    vec![
        Instr::name(Opcode::LoadGlobal, coercion),
        Instr::name(Opcode::LoadGlobal, "*input"),
        Instr::count(Opcode::CallFunction, 0),
        Instr::count(Opcode::CallFunction, 1),
        Instr::op(Opcode::ReturnValue),
    ]
}
