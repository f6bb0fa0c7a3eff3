//! Assembly listing model.
//!
//! The x86 backend emits a listing over a small alphabet: byte constants,
//! extern declarations, labels, plain instruction lines and four
//! pseudo-instructions understood by the flattener. Stack-pointer
//! adjustments are *lazy*: `SubEsp`/`AddEsp` accumulate until a flush point
//! forces a single `lea esp, [esp + k]`.

use std::fmt;

/// A point in the code with a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Label name as it appears in the output
    pub name: String,
    /// Public labels get a `GLOBAL` declaration
    pub public: bool,
}

impl Label {
    /// A non-public label with a fixed name.
    pub fn named(name: impl Into<String>) -> Self {
        Label {
            name: name.into(),
            public: false,
        }
    }

    /// A public (exported) label.
    pub fn public(name: impl Into<String>) -> Self {
        Label {
            name: name.into(),
            public: true,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A sequence of bytes that stays constant for the program's lifetime.
///
/// Constants with identical bytes share one data definition in the output;
/// every label still gets emitted so references stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstData {
    /// Label under which the bytes are addressable
    pub label: String,
    /// The raw bytes, including any trailing NUL
    pub bytes: Vec<u8>,
}

impl fmt::Display for ConstData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// One item of an assembly listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// Constant bytes, collected into the data section at the end
    Const(ConstData),
    /// Symbol declared in an external module
    Extern(String),
    /// A labeled point in the code
    Label(Label),
    /// A plain instruction line (lowercase mnemonic first)
    Text(String),
    /// Forget all stack-pointer tracking: control arrives from an unknown
    /// state (function entry/exit)
    SyncEsp,
    /// Decrease ESP lazily by `n` bytes
    SubEsp(i32),
    /// Increase ESP lazily by `n` bytes
    AddEsp(i32),
    /// Clean up the stack and return from the current function
    Return,
}

/// Shorthand for a plain instruction line.
pub fn line(text: impl Into<String>) -> Item {
    Item::Text(text.into())
}

/// Allocator for label and constant names.
///
/// Names are generated from a counter so repeated compilations of the same
/// program emit byte-identical listings.
#[derive(Debug, Default)]
pub struct NameAlloc {
    next_label: u32,
    next_const: u32,
}

impl NameAlloc {
    /// Create an allocator.
    pub fn new() -> Self {
        NameAlloc::default()
    }

    /// A fresh code label.
    pub fn label(&mut self) -> Label {
        let name = format!("_l_{:x}", self.next_label);
        self.next_label += 1;
        Label::named(name)
    }

    /// A fresh constant from raw bytes.
    pub fn const_bytes(&mut self, bytes: Vec<u8>) -> ConstData {
        let label = format!("_c_{:x}", self.next_const);
        self.next_const += 1;
        ConstData { label, bytes }
    }

    /// A fresh constant holding a NUL-terminated string.
    pub fn cstr(&mut self, text: &str) -> ConstData {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.const_bytes(bytes)
    }
}
