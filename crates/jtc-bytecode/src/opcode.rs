//! Opcodes of the stack-based host virtual machine.
//!
//! The compiler targets a dynamically-typed stack VM; these are the
//! instructions its loader understands. Opcodes are single bytes; whether an
//! operand follows is determined by the [`crate::instr::Arg`] attached to
//! the instruction.

use std::fmt;

/// VM opcode.
///
/// Organized into categories:
/// - 0x00-0x0F: stack manipulation & constants
/// - 0x10-0x1F: variables
/// - 0x20-0x2F: arithmetic
/// - 0x30-0x3F: comparison & unary
/// - 0x40-0x4F: control flow
/// - 0x50-0x5F: calls, functions & modules
/// - 0x60-0x6F: printing & exceptions
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack manipulation & constants (0x00-0x0F) =====
    /// Pop the top value
    PopTop = 0x00,
    /// Duplicate the top value
    DupTop = 0x01,
    /// Swap the two top values
    RotTwo = 0x02,
    /// Push a constant from the pool (operand: constant)
    LoadConst = 0x03,
    /// Build a list from the top n values (operand: count)
    BuildList = 0x04,

    // ===== Variables (0x10-0x1F) =====
    /// Push a local slot (operand: slot name)
    LoadFast = 0x10,
    /// Pop into a local slot (operand: slot name)
    StoreFast = 0x11,
    /// Push a module-level binding (operand: name)
    LoadGlobal = 0x12,
    /// Pop into a module-level binding (operand: name)
    StoreGlobal = 0x13,

    // ===== Arithmetic (0x20-0x2F) =====
    /// Pop b, pop a, push a + b
    BinaryAdd = 0x20,
    /// Pop b, pop a, push a - b
    BinarySubtract = 0x21,
    /// Pop b, pop a, push a * b
    BinaryMultiply = 0x22,
    /// Pop b, pop a, push a // b (used for int division)
    BinaryFloorDivide = 0x23,
    /// Pop b, pop a, push a / b (used for double division)
    BinaryTrueDivide = 0x24,
    /// Pop b, pop a, push a % b
    BinaryModulo = 0x25,

    // ===== Comparison & unary (0x30-0x3F) =====
    /// Pop b, pop a, push a <cmp> b (operand: comparison operator)
    CompareOp = 0x30,
    /// Logical negation of the top value
    UnaryNot = 0x31,
    /// Numeric identity of the top value
    UnaryPositive = 0x32,
    /// Numeric negation of the top value
    UnaryNegative = 0x33,

    // ===== Control flow (0x40-0x4F) =====
    /// Unconditional forward jump (operand: label)
    JumpForward = 0x40,
    /// Unconditional jump (operand: label)
    JumpAbsolute = 0x41,
    /// Jump when the top value is false, keeping it (operand: label)
    JumpIfFalse = 0x42,
    /// Jump when the top value is true, keeping it (operand: label)
    JumpIfTrue = 0x43,
    /// Jump keeping the value when false, else pop (operand: label)
    JumpIfFalseOrPop = 0x44,
    /// Jump keeping the value when true, else pop (operand: label)
    JumpIfTrueOrPop = 0x45,
    /// Pop the return value and leave the frame
    ReturnValue = 0x46,

    // ===== Calls, functions & modules (0x50-0x5F) =====
    /// Pop n arguments and a callable, push the call result (operand: count)
    CallFunction = 0x50,
    /// Pop a code object, push a function (operand: count of defaults)
    MakeFunction = 0x51,
    /// Import a module (operand: name)
    ImportName = 0x52,
    /// Push an attribute of the just-imported module (operand: name)
    ImportFrom = 0x53,

    // ===== Printing & exceptions (0x60-0x6F) =====
    /// Pop and print the top value
    PrintItem = 0x60,
    /// Print a newline
    PrintNewline = 0x61,
    /// Pop n values and raise (operand: count)
    RaiseVarargs = 0x62,
}

impl Opcode {
    /// The loader's conventional mnemonic for this opcode.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::PopTop => "POP_TOP",
            Opcode::DupTop => "DUP_TOP",
            Opcode::RotTwo => "ROT_TWO",
            Opcode::LoadConst => "LOAD_CONST",
            Opcode::BuildList => "BUILD_LIST",
            Opcode::LoadFast => "LOAD_FAST",
            Opcode::StoreFast => "STORE_FAST",
            Opcode::LoadGlobal => "LOAD_GLOBAL",
            Opcode::StoreGlobal => "STORE_GLOBAL",
            Opcode::BinaryAdd => "BINARY_ADD",
            Opcode::BinarySubtract => "BINARY_SUBTRACT",
            Opcode::BinaryMultiply => "BINARY_MULTIPLY",
            Opcode::BinaryFloorDivide => "BINARY_FLOOR_DIVIDE",
            Opcode::BinaryTrueDivide => "BINARY_TRUE_DIVIDE",
            Opcode::BinaryModulo => "BINARY_MODULO",
            Opcode::CompareOp => "COMPARE_OP",
            Opcode::UnaryNot => "UNARY_NOT",
            Opcode::UnaryPositive => "UNARY_POSITIVE",
            Opcode::UnaryNegative => "UNARY_NEGATIVE",
            Opcode::JumpForward => "JUMP_FORWARD",
            Opcode::JumpAbsolute => "JUMP_ABSOLUTE",
            Opcode::JumpIfFalse => "JUMP_IF_FALSE",
            Opcode::JumpIfTrue => "JUMP_IF_TRUE",
            Opcode::JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            Opcode::JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            Opcode::ReturnValue => "RETURN_VALUE",
            Opcode::CallFunction => "CALL_FUNCTION",
            Opcode::MakeFunction => "MAKE_FUNCTION",
            Opcode::ImportName => "IMPORT_NAME",
            Opcode::ImportFrom => "IMPORT_FROM",
            Opcode::PrintItem => "PRINT_ITEM",
            Opcode::PrintNewline => "PRINT_NEWLINE",
            Opcode::RaiseVarargs => "RAISE_VARARGS",
        }
    }

    /// Whether this opcode transfers control to a label operand.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Opcode::JumpForward
                | Opcode::JumpAbsolute
                | Opcode::JumpIfFalse
                | Opcode::JumpIfTrue
                | Opcode::JumpIfFalseOrPop
                | Opcode::JumpIfTrueOrPop
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
