//! Integration tests for module encoding.

use jtc_bytecode::{CodeObject, Const, Instr, LabelAlloc, Module, Opcode, DEFAULT_MAGIC};

/// Build a module shaped like real compiler output: a stub defining one
/// function and calling it.
fn sample_module() -> Module {
    let function = CodeObject::function(
        "f",
        "/tmp/sample.jl",
        1,
        vec!["_0".to_string()],
        vec![
            Instr::SetLineno(1),
            Instr::name(Opcode::LoadFast, "_0"),
            Instr::constant(Opcode::LoadConst, Const::Int(1)),
            Instr::op(Opcode::BinaryAdd),
            Instr::op(Opcode::ReturnValue),
        ],
    );
    let mut labels = LabelAlloc::new();
    let skip = labels.fresh();
    let root = CodeObject::stub(
        "<builtins>",
        vec![
            Instr::constant(Opcode::LoadConst, Const::Code(Box::new(function))),
            Instr::count(Opcode::MakeFunction, 0),
            Instr::name(Opcode::StoreGlobal, "f"),
            Instr::name(Opcode::LoadGlobal, "__name__"),
            Instr::constant(Opcode::LoadConst, Const::Str("__main__".to_string())),
            Instr::name(Opcode::CompareOp, "=="),
            Instr::jump(Opcode::JumpIfFalseOrPop, skip),
            Instr::name(Opcode::LoadGlobal, "f"),
            Instr::count(Opcode::CallFunction, 0),
            Instr::op(Opcode::PopTop),
            Instr::Label(skip),
            Instr::constant(Opcode::LoadConst, Const::None),
            Instr::op(Opcode::ReturnValue),
        ],
    );
    Module::new(root)
}

#[test]
fn header_is_magic_plus_zero_word() {
    let bytes = sample_module().encode().unwrap();
    assert_eq!(&bytes[..4], &DEFAULT_MAGIC);
    assert_eq!(&bytes[4..8], &[0u8; 4]);
}

#[test]
fn repeated_encodings_are_byte_identical() {
    let module = sample_module();
    let first = module.encode().unwrap();
    let second = module.encode().unwrap();
    assert_eq!(first, second);
}

#[test]
fn nested_function_and_names_are_embedded() {
    let bytes = sample_module().encode().unwrap();
    for needle in [&b"/tmp/sample.jl"[..], b"__main__", b"__name__", b"_0"] {
        assert!(
            bytes.windows(needle.len()).any(|w| w == needle),
            "missing {:?}",
            String::from_utf8_lossy(needle)
        );
    }
}

#[test]
fn distinct_modules_encode_differently() {
    let a = sample_module().encode().unwrap();
    let mut other = sample_module();
    other.root.code.push(Instr::op(Opcode::PopTop));
    let b = other.encode().unwrap();
    assert_ne!(a, b);
}
