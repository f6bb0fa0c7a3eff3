//! Instruction stream model.
//!
//! A code object's body is a list of [`Instr`] items: real operations,
//! label placements and line markers. Labels are opaque ids handed out by a
//! [`LabelAlloc`]; the module encoder resolves them to byte offsets.

use crate::code::CodeObject;
use crate::opcode::Opcode;
use std::fmt;

/// Opaque jump target, resolved at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

/// Hands out fresh labels. One allocator per module keeps ids unique and
/// the emitted stream deterministic.
#[derive(Debug, Default)]
pub struct LabelAlloc {
    next: u32,
}

impl LabelAlloc {
    /// Create an allocator.
    pub fn new() -> Self {
        LabelAlloc::default()
    }

    /// Allocate a fresh label.
    pub fn fresh(&mut self) -> LabelId {
        let id = LabelId(self.next);
        self.next += 1;
        id
    }
}

/// A constant value the VM can load.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    /// The VM's null value
    None,
    Int(i32),
    Double(f64),
    Bool(bool),
    Str(String),
    /// A nested code object (function body)
    Code(Box<CodeObject>),
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// No operand
    None,
    /// A constant-pool value
    Const(Const),
    /// A name: global, local slot, import or comparison operator
    Name(String),
    /// A jump target
    Label(LabelId),
    /// A plain count (call arity, list size, raise arity)
    Count(u32),
}

/// One item of an instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    /// A real operation
    Op(Opcode, Arg),
    /// Placement of a jump target
    Label(LabelId),
    /// Source line marker for the line table
    SetLineno(u32),
}

impl Instr {
    /// An operation without an operand.
    pub fn op(opcode: Opcode) -> Self {
        Instr::Op(opcode, Arg::None)
    }

    /// An operation with a name operand.
    pub fn name(opcode: Opcode, name: impl Into<String>) -> Self {
        Instr::Op(opcode, Arg::Name(name.into()))
    }

    /// An operation with a constant operand.
    pub fn constant(opcode: Opcode, value: Const) -> Self {
        Instr::Op(opcode, Arg::Const(value))
    }

    /// An operation with a count operand.
    pub fn count(opcode: Opcode, count: u32) -> Self {
        Instr::Op(opcode, Arg::Count(count))
    }

    /// An operation with a label operand.
    pub fn jump(opcode: Opcode, label: LabelId) -> Self {
        Instr::Op(opcode, Arg::Label(label))
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Op(opcode, Arg::None) => write!(f, "{opcode}"),
            Instr::Op(opcode, Arg::Const(value)) => write!(f, "{opcode} {value:?}"),
            Instr::Op(opcode, Arg::Name(name)) => write!(f, "{opcode} {name}"),
            Instr::Op(opcode, Arg::Label(label)) => write!(f, "{opcode} L{}", label.0),
            Instr::Op(opcode, Arg::Count(count)) => write!(f, "{opcode} {count}"),
            Instr::Label(label) => write!(f, "L{}:", label.0),
            Instr::SetLineno(line) => write!(f, "SetLineno {line}"),
        }
    }
}
