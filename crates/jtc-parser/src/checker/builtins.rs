//! Built-in function injection.
//!
//! The six runtime intrinsics are appended to the program as ordinary
//! function declarations carrying a [`Builtin`] tag and an empty body. The
//! tree itself stays backend-free: each backend supplies the matching
//! emission body for the tag.

use crate::ast::{Block, Builtin, Function, FunctionType, Program, Type};

/// Name, tag and type of every built-in, in injection order.
pub fn declarations() -> Vec<(&'static str, Builtin, FunctionType)> {
    vec![
        (
            "printInt",
            Builtin::PrintInt,
            FunctionType::new(Type::Void, vec![Type::Int]),
        ),
        (
            "printDouble",
            Builtin::PrintDouble,
            FunctionType::new(Type::Void, vec![Type::Double]),
        ),
        (
            "printString",
            Builtin::PrintString,
            FunctionType::new(Type::Void, vec![Type::String]),
        ),
        ("error", Builtin::Error, FunctionType::new(Type::Void, vec![])),
        ("readInt", Builtin::ReadInt, FunctionType::new(Type::Int, vec![])),
        (
            "readDouble",
            Builtin::ReadDouble,
            FunctionType::new(Type::Double, vec![]),
        ),
    ]
}

/// Append the built-in declarations to a program.
pub fn inject(program: &mut Program) {
    for (name, builtin, ty) in declarations() {
        program.functions.push(Function {
            name: name.to_string(),
            ty,
            params: Vec::new(),
            body: Block::empty(),
            span: None,
            builtin: Some(builtin),
            locals: Vec::new(),
        });
    }
}
