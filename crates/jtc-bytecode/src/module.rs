//! Bytecode module encoding.
//!
//! Serializes a code-object tree to the on-disk form the host runtime
//! loads: the runtime's magic number, a 4-byte zero, then the encoded root
//! object. Labels resolve to absolute byte offsets inside their code
//! object; `SetLineno` markers fold into a line table. The encoding is
//! fully deterministic: identical modules produce identical bytes.

use crate::code::CodeObject;
use crate::instr::{Arg, Const, Instr, LabelId};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Magic number of the host runtime release the compiler targets.
pub const DEFAULT_MAGIC: [u8; 4] = [0x03, 0xf3, 0x0d, 0x0a];

/// Module encoding errors.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A jump referenced a label never placed in the same code object
    #[error("jump to label L{0} which is never placed")]
    UnplacedLabel(u32),

    /// A label was placed twice in one code object
    #[error("label L{0} placed more than once")]
    DuplicateLabel(u32),
}

/// A compiled module ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Runtime magic number emitted as the file prefix
    pub magic: [u8; 4],
    /// The module-level code object
    pub root: CodeObject,
}

impl Module {
    /// Wrap a root code object with the default runtime magic.
    pub fn new(root: CodeObject) -> Self {
        Module {
            magic: DEFAULT_MAGIC,
            root,
        }
    }

    /// Serialize the module to its on-disk form.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&[0, 0, 0, 0]);
        encode_code(&self.root, &mut out)?;
        Ok(out)
    }
}

const FLAG_VARARGS: u8 = 1 << 0;
const FLAG_VARKWARGS: u8 = 1 << 1;
const FLAG_NEWLOCALS: u8 = 1 << 2;

fn emit_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn emit_str(out: &mut Vec<u8>, value: &str) {
    emit_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

fn encode_code(code: &CodeObject, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    out.push(b'c');
    emit_str(out, &code.name);
    emit_str(out, &code.filename);
    emit_u32(out, code.firstlineno);

    let mut flags = 0u8;
    if code.varargs {
        flags |= FLAG_VARARGS;
    }
    if code.varkwargs {
        flags |= FLAG_VARKWARGS;
    }
    if code.newlocals {
        flags |= FLAG_NEWLOCALS;
    }
    out.push(flags);

    emit_u32(out, code.args.len() as u32);
    for arg in &code.args {
        emit_str(out, arg);
    }
    emit_u32(out, code.freevars.len() as u32);
    for var in &code.freevars {
        emit_str(out, var);
    }
    match &code.docstring {
        None => out.push(0),
        Some(doc) => {
            out.push(1);
            emit_str(out, doc);
        }
    }

    let body = BodyEncoder::assemble(&code.code)?;

    emit_u32(out, body.consts.len() as u32);
    for constant in &body.consts {
        encode_const(constant, out)?;
    }
    emit_u32(out, body.names.len() as u32);
    for name in &body.names {
        emit_str(out, name);
    }
    emit_u32(out, body.bytes.len() as u32);
    out.extend_from_slice(&body.bytes);
    emit_u32(out, body.lines.len() as u32);
    for (offset, line) in &body.lines {
        emit_u32(out, *offset);
        emit_u32(out, *line);
    }
    Ok(())
}

fn encode_const(constant: &Const, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match constant {
        Const::None => out.push(b'N'),
        Const::Int(value) => {
            out.push(b'i');
            out.extend_from_slice(&value.to_le_bytes());
        }
        Const::Double(value) => {
            out.push(b'g');
            out.extend_from_slice(&value.to_le_bytes());
        }
        Const::Bool(true) => out.push(b'T'),
        Const::Bool(false) => out.push(b'F'),
        Const::Str(value) => {
            out.push(b's');
            emit_str(out, value);
        }
        Const::Code(code) => encode_code(code, out)?,
    }
    Ok(())
}

/// Assembled body of one code object: pooled operands, resolved jumps and
/// the line table.
struct BodyEncoder<'a> {
    consts: Vec<&'a Const>,
    names: Vec<&'a str>,
    name_index: FxHashMap<&'a str, u32>,
    bytes: Vec<u8>,
    lines: Vec<(u32, u32)>,
}

impl<'a> BodyEncoder<'a> {
    fn assemble(instrs: &'a [Instr]) -> Result<Self, EncodeError> {
        // First pass: byte offset of every instruction and label
        let mut labels: FxHashMap<LabelId, u32> = FxHashMap::default();
        let mut offset = 0u32;
        for instr in instrs {
            match instr {
                Instr::Label(label) => {
                    if labels.insert(*label, offset).is_some() {
                        return Err(EncodeError::DuplicateLabel(label.0));
                    }
                }
                Instr::SetLineno(_) => {}
                Instr::Op(_, arg) => {
                    offset += 1;
                    if !matches!(arg, Arg::None) {
                        offset += 4;
                    }
                }
            }
        }

        // Second pass: emit
        let mut encoder = BodyEncoder {
            consts: Vec::new(),
            names: Vec::new(),
            name_index: FxHashMap::default(),
            bytes: Vec::new(),
            lines: Vec::new(),
        };
        for instr in instrs {
            match instr {
                Instr::Label(_) => {}
                Instr::SetLineno(line) => {
                    let offset = encoder.bytes.len() as u32;
                    if encoder.lines.last().map(|(_, l)| *l) != Some(*line) {
                        encoder.lines.push((offset, *line));
                    }
                }
                Instr::Op(opcode, arg) => {
                    encoder.bytes.push(*opcode as u8);
                    match arg {
                        Arg::None => {}
                        Arg::Const(constant) => {
                            let index = encoder.intern_const(constant);
                            encoder.bytes.extend_from_slice(&index.to_le_bytes());
                        }
                        Arg::Name(name) => {
                            let index = encoder.intern_name(name);
                            encoder.bytes.extend_from_slice(&index.to_le_bytes());
                        }
                        Arg::Label(label) => {
                            let target = labels
                                .get(label)
                                .copied()
                                .ok_or(EncodeError::UnplacedLabel(label.0))?;
                            encoder.bytes.extend_from_slice(&target.to_le_bytes());
                        }
                        Arg::Count(count) => {
                            encoder.bytes.extend_from_slice(&count.to_le_bytes());
                        }
                    }
                }
            }
        }
        Ok(encoder)
    }

    fn intern_const(&mut self, constant: &'a Const) -> u32 {
        // Linear scan: doubles rule out hashing, and pools stay small
        for (i, existing) in self.consts.iter().enumerate() {
            if *existing == constant {
                return i as u32;
            }
        }
        self.consts.push(constant);
        (self.consts.len() - 1) as u32
    }

    fn intern_name(&mut self, name: &'a str) -> u32 {
        if let Some(index) = self.name_index.get(name) {
            return *index;
        }
        let index = self.names.len() as u32;
        self.names.push(name);
        self.name_index.insert(name, index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::LabelAlloc;
    use crate::opcode::Opcode;

    fn sample_code() -> Vec<Instr> {
        let mut labels = LabelAlloc::new();
        let end = labels.fresh();
        vec![
            Instr::SetLineno(1),
            Instr::constant(Opcode::LoadConst, Const::Int(1)),
            Instr::jump(Opcode::JumpIfFalseOrPop, end),
            Instr::constant(Opcode::LoadConst, Const::Bool(true)),
            Instr::Label(end),
            Instr::op(Opcode::ReturnValue),
        ]
    }

    #[test]
    fn encodes_with_magic_and_zero_prefix() {
        let module = Module::new(CodeObject::stub("<test>", sample_code()));
        let bytes = module.encode().unwrap();
        assert_eq!(&bytes[..4], &DEFAULT_MAGIC);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(bytes[8], b'c');
    }

    #[test]
    fn encoding_is_deterministic() {
        let module = Module::new(CodeObject::stub("<test>", sample_code()));
        assert_eq!(module.encode().unwrap(), module.encode().unwrap());
    }

    #[test]
    fn labels_resolve_to_byte_offsets() {
        let module = Module::new(CodeObject::stub("<test>", sample_code()));
        let bytes = module.encode().unwrap();
        // LOAD_CONST (5 bytes) + JUMP (5 bytes) + LOAD_CONST (5 bytes) = 15,
        // the label's offset; the jump operand must say so
        let sample = sample_code();
        let body = BodyEncoder::assemble(&sample).unwrap();
        assert_eq!(&body.bytes[6..10], &15u32.to_le_bytes());
        assert!(!bytes.is_empty());
    }

    #[test]
    fn unplaced_label_is_an_error() {
        let mut labels = LabelAlloc::new();
        let nowhere = labels.fresh();
        let module = Module::new(CodeObject::stub(
            "<test>",
            vec![Instr::jump(Opcode::JumpAbsolute, nowhere)],
        ));
        assert!(matches!(
            module.encode(),
            Err(EncodeError::UnplacedLabel(0))
        ));
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let mut labels = LabelAlloc::new();
        let label = labels.fresh();
        let module = Module::new(CodeObject::stub(
            "<test>",
            vec![Instr::Label(label), Instr::Label(label)],
        ));
        assert!(matches!(
            module.encode(),
            Err(EncodeError::DuplicateLabel(0))
        ));
    }

    #[test]
    fn nested_code_objects_encode() {
        let inner = CodeObject::function(
            "f",
            "<test>",
            3,
            vec!["_0".to_string()],
            vec![
                Instr::name(Opcode::LoadFast, "_0"),
                Instr::op(Opcode::ReturnValue),
            ],
        );
        let outer = CodeObject::stub(
            "<test>",
            vec![
                Instr::constant(Opcode::LoadConst, Const::Code(Box::new(inner))),
                Instr::count(Opcode::MakeFunction, 0),
                Instr::name(Opcode::StoreGlobal, "f"),
                Instr::constant(Opcode::LoadConst, Const::None),
                Instr::op(Opcode::ReturnValue),
            ],
        );
        let module = Module::new(outer);
        let bytes = module.encode().unwrap();
        assert!(bytes.len() > 40);
    }
}
