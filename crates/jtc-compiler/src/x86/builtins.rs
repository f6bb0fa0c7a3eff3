//! x86 prologue stub and built-in function bodies.
//!
//! The stub provides the public `main` entry, the two shared error
//! trampolines and their message constants. Built-in bodies are literal
//! cdecl sequences over the C runtime (`printf`, `snprintf`, `puts`,
//! `scanf`); I/O failures route through the IO-error trampoline.

use jtc_parser::ast::Builtin;
use jtc_x86::listing::{line, Item, Label, NameAlloc};

/// Labels of the shared error trampolines, threaded through the whole
/// backend: integer division emits jumps to `zero_div`.
pub struct Trampolines {
    /// Prints `IOError` to stderr and exits 1
    pub io_error: String,
    /// Prints `ZeroDivisionError` to stderr and exits 1
    pub zero_div: String,
}

/// Build the fixed program prologue.
pub fn stub(names: &mut NameAlloc) -> (Vec<Item>, Trampolines) {
    let io_error = names.label();
    let zero_div = names.label();
    let io_message = names.cstr("IOError\n");
    let zero_div_message = names.cstr("ZeroDivisionError\n");

    let trampolines = Trampolines {
        io_error: io_error.name.clone(),
        zero_div: zero_div.name.clone(),
    };

    let mut items = vec![
        Item::Const(io_message.clone()),
        Item::Const(zero_div_message.clone()),
        Item::Extern("stderr".to_string()),
        Item::Extern("fputs".to_string()),
        Item::Extern("exit".to_string()),
        Item::Label(Label::public("main")),
        line("jmp _f_main"),
    ];
    items.push(Item::Label(io_error));
    items.extend(die(&io_message.label));
    items.push(Item::Label(zero_div));
    items.extend(die(&zero_div_message.label));
    (items, trampolines)
}

/// Print a message constant to stderr and exit 1.
fn die(message_label: &str) -> Vec<Item> {
    vec![
        line("push DWORD [stderr]"),
        line(format!("push {message_label}")),
        line("call fputs"),
        line("push 1"),
        line("call exit"),
    ]
}

/// The body of a built-in function, emitted right after its `_f_` label.
pub fn body(builtin: Builtin, names: &mut NameAlloc, trampolines: &Trampolines) -> Vec<Item> {
    let io = trampolines.io_error.as_str();
    match builtin {
        Builtin::PrintInt => {
            let format = names.cstr("%d\n");
            let format_label = format.label.clone();
            vec![
                Item::Const(format),
                Item::Extern("printf".to_string()),
                line("push DWORD [esp + 4]"),
                line(format!("push {format_label}")),
                line("call printf"),
                line("test eax, eax"),
                line(format!("js {io}")),
                line("add esp, 8"),
                line("ret"),
            ]
        }
        Builtin::PrintDouble => print_double(names, io),
        Builtin::PrintString => vec![
            Item::Extern("puts".to_string()),
            line("push DWORD [esp + 4]"),
            line("call puts"),
            line("test eax, eax"),
            line(format!("js {io}")),
            line("add esp, 4"),
            line("ret"),
        ],
        Builtin::Error => {
            let message = names.cstr("RuntimeError\n");
            let message_label = message.label.clone();
            let mut items = vec![Item::Const(message)];
            items.extend(die(&message_label));
            items
        }
        Builtin::ReadInt => {
            let format = names.cstr("%d");
            let format_label = format.label.clone();
            vec![
                Item::Const(format),
                Item::Extern("scanf".to_string()),
                line("sub esp, 4"),
                line("mov eax, esp"),
                line("push eax"),
                line(format!("push {format_label}")),
                line("call scanf"),
                line("dec eax"),
                line(format!("jnz {io}")),
                line("add esp, 12"),
                line("mov eax, [esp - 4]"),
                line("ret"),
            ]
        }
        Builtin::ReadDouble => {
            let format = names.cstr("%lf");
            let format_label = format.label.clone();
            vec![
                Item::Const(format),
                Item::Extern("scanf".to_string()),
                line("sub esp, 8"),
                line("mov eax, esp"),
                line("push eax"),
                line(format!("push {format_label}")),
                line("call scanf"),
                line("dec eax"),
                line(format!("jnz {io}")),
                line("add esp, 16"),
                line("fld QWORD [esp - 8]"),
                line("ret"),
            ]
        }
    }
}

/// `printDouble`: format with `%.12g` into a 32-byte buffer, then append
/// `.0` when the result has neither a decimal point nor an exponent (so
/// whole doubles still read as doubles).
///
/// The appender writes the 4-byte immediate `".0"` over the terminator; the
/// buffer must stay at least 32 bytes so the store cannot run past it.
fn print_double(names: &mut NameAlloc, io: &str) -> Vec<Item> {
    let format = names.cstr("%.12g");
    let format_label = format.label.clone();
    let scan = names.label();
    let done = names.label();
    vec![
        Item::Const(format),
        Item::Extern("snprintf".to_string()),
        Item::Extern("puts".to_string()),
        line("sub esp, 36"),
        line("mov edx, esp"),
        line("push DWORD [esp + 44]"),
        line("push DWORD [esp + 44]"),
        line(format!("push {format_label}")),
        line("push 32"),
        line("push edx"),
        line("call snprintf"),
        line("test eax, eax"),
        line(format!("js {io}")),
        line("add esp, 20"),
        line("lea edx, [esp - 1]"),
        Item::Label(scan.clone()),
        line("inc edx"),
        line("mov al, [edx]"),
        line("cmp al, \"-\""),
        line(format!("je {scan}")),
        line("cmp al, \".\""),
        line(format!("je {done}")),
        line("cmp al, \"9\""),
        line(format!("ja {done}")),
        line("cmp al, 0"),
        line(format!("jne {scan}")),
        line("mov eax, \".0\""),
        line("mov [edx], eax"),
        Item::Label(done),
        line("push esp"),
        line("call puts"),
        line("add esp, 40"),
        line("test eax, eax"),
        line(format!("js {io}")),
        line("ret"),
    ]
}
