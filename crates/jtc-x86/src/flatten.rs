//! Lazy-ESP flattening of assembly listings.
//!
//! Turns a listing into NASM-syntax text. The flattener keeps two counters:
//! `esp`, the offset introduced by real stack instructions since the last
//! [`Item::SyncEsp`], and `lazy_esp`, the accumulated pseudo-adjustments not
//! yet materialized. A flush emits one `lea esp, [esp + k]` and happens only
//! before labels and before instructions that mention `esp`/`sp` or start
//! with a jump, call or stack opcode. Local-slot tokens `##(k)` rewrite to
//! `esp + (k + esp)` so addressing stays correct regardless of how many
//! real pushes are in flight.

use crate::listing::Item;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Flattening errors.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// The listing used a stack instruction whose ESP effect the tracker
    /// does not model (16-bit and far forms)
    #[error("The {0:?} x86 instruction is not supported")]
    UnsupportedInstruction(String),
}

/// ESP effect of every tracked stack instruction. `None` marks forms that
/// are deliberately rejected.
static STACK_OPS: Lazy<FxHashMap<&'static str, Option<i32>>> = Lazy::new(|| {
    let mut ops = FxHashMap::default();
    ops.insert("call", Some(0));
    ops.insert("enter", None);
    ops.insert("leave", None);
    ops.insert("int", Some(0));
    ops.insert("int1", Some(0));
    ops.insert("int01", Some(0));
    ops.insert("icebp", Some(0));
    ops.insert("int3", Some(0));
    ops.insert("int03", Some(0));
    ops.insert("into", Some(0));
    ops.insert("iret", Some(0));
    ops.insert("iretw", None);
    ops.insert("iretd", Some(0));
    ops.insert("pop", Some(-4));
    ops.insert("popa", Some(8 * -4));
    ops.insert("popaw", None);
    ops.insert("popad", Some(8 * -4));
    ops.insert("popf", Some(-4));
    ops.insert("popfw", None);
    ops.insert("popfd", Some(-4));
    ops.insert("push", Some(4));
    ops.insert("pusha", Some(8 * 4));
    ops.insert("pushaw", None);
    ops.insert("pushad", Some(8 * 4));
    ops.insert("pushf", Some(4));
    ops.insert("pushfw", None);
    ops.insert("pushfd", Some(4));
    ops.insert("ret", Some(0));
    ops.insert("retn", Some(0));
    ops.insert("retf", None);
    ops
});

const JMP_OPS: &[&str] = &[
    "jmp", "jcxz", "jecxz", "ja", "jae", "jb", "jbe", "jc", "je", "jg", "jge", "jl", "jle",
    "jna", "jnae", "jnb", "jnbe", "jnc", "jne", "jng", "jnge", "jnl", "jnle", "jno", "jnp",
    "jns", "jnz", "jo", "jp", "jpe", "jpo", "js", "jz",
];

/// Matches lines that force a flush: any mention of `esp`/`sp`, or a
/// leading stack/jump opcode.
static FLUSH_RE: Lazy<Regex> = Lazy::new(|| {
    let mut ops: Vec<&str> = STACK_OPS.keys().copied().chain(JMP_OPS.iter().copied()).collect();
    ops.sort_unstable();
    Regex::new(&format!(r"\be?sp\b|^({})\b", ops.join("|"))).unwrap()
});

/// Matches local-slot tokens `##(k)`.
static SLOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"##\((-?\d+)\)").unwrap());

/// Flatten a listing into NASM-syntax text.
pub fn flatten(listing: &[Item]) -> Result<String, FlattenError> {
    let mut out = String::new();
    let mut esp: i32 = 0;
    let mut lazy_esp: i32 = 0;
    // Constant buckets keyed by content, in first-seen order
    let mut const_order: Vec<Vec<u8>> = Vec::new();
    let mut consts: FxHashMap<Vec<u8>, Vec<String>> = FxHashMap::default();

    out.push_str("BITS 32\n");
    out.push_str("SECTION .text\n");

    for item in listing {
        match item {
            Item::Const(data) => {
                let labels = consts.entry(data.bytes.clone()).or_insert_with(|| {
                    const_order.push(data.bytes.clone());
                    Vec::new()
                });
                labels.push(data.label.clone());
            }
            Item::Extern(symbol) => {
                let _ = writeln!(out, "EXTERN {symbol}");
            }
            Item::SubEsp(n) => lazy_esp -= n,
            Item::AddEsp(n) => lazy_esp += n,
            Item::SyncEsp => {
                esp = 0;
                lazy_esp = 0;
            }
            Item::Return => {
                if esp != 0 {
                    let _ = writeln!(out, "\tadd esp, {esp}");
                }
                out.push_str("\tret\n");
            }
            Item::Label(label) => {
                if label.public {
                    let _ = writeln!(out, "GLOBAL {}", label.name);
                }
                if lazy_esp != 0 {
                    let _ = writeln!(out, "\tlea esp, [esp + {lazy_esp}]");
                    esp -= lazy_esp;
                    lazy_esp = 0;
                }
                let _ = writeln!(out, "{}:", label.name);
            }
            Item::Text(text) => {
                let opcode = text.split_whitespace().next().unwrap_or("");
                if let Some(effect) = STACK_OPS.get(opcode) {
                    match effect {
                        Some(delta) => esp += delta,
                        None => {
                            return Err(FlattenError::UnsupportedInstruction(
                                opcode.to_string(),
                            ));
                        }
                    }
                }
                if lazy_esp != 0 && FLUSH_RE.is_match(text) {
                    let _ = writeln!(out, "\tlea esp, [esp + {lazy_esp}]");
                    esp -= lazy_esp;
                    lazy_esp = 0;
                }
                let rewritten = SLOT_RE.replace_all(text, |caps: &Captures<'_>| {
                    let offset: i32 = caps[1].parse().unwrap();
                    format!("esp + {}", offset + esp)
                });
                let _ = writeln!(out, "\t{rewritten}");
            }
        }
    }

    for bytes in &const_order {
        for label in &consts[bytes] {
            let _ = writeln!(out, "{label}:");
        }
        let rendered: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
        let _ = writeln!(out, "\tDB {}", rendered.join(","));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{line, Item, Label, NameAlloc};

    fn lines(output: &str) -> Vec<&str> {
        output.lines().collect()
    }

    #[test]
    fn emits_header_and_externs() {
        let output = flatten(&[Item::Extern("printf".to_string())]).unwrap();
        assert_eq!(lines(&output), vec!["BITS 32", "SECTION .text", "EXTERN printf"]);
    }

    #[test]
    fn lazy_adjustments_coalesce_into_one_lea() {
        let listing = vec![
            Item::SyncEsp,
            Item::SubEsp(8),
            Item::SubEsp(4),
            Item::AddEsp(4),
            line("mov eax, [esp]"),
        ];
        let output = flatten(&listing).unwrap();
        assert_eq!(
            lines(&output)[2..],
            ["\tlea esp, [esp + -8]", "\tmov eax, [esp]"]
        );
    }

    #[test]
    fn no_flush_for_lines_not_touching_esp() {
        let listing = vec![Item::SubEsp(8), line("mov eax, 1"), line("mov ebx, eax")];
        let output = flatten(&listing).unwrap();
        assert!(!output.contains("lea"));
    }

    #[test]
    fn labels_force_a_flush() {
        let listing = vec![Item::SubEsp(4), Item::Label(Label::named("target"))];
        let output = flatten(&listing).unwrap();
        assert_eq!(lines(&output)[2..], ["\tlea esp, [esp + -4]", "target:"]);
    }

    #[test]
    fn jumps_force_a_flush() {
        let listing = vec![Item::AddEsp(12), line("jmp somewhere")];
        let output = flatten(&listing).unwrap();
        assert_eq!(
            lines(&output)[2..],
            ["\tlea esp, [esp + 12]", "\tjmp somewhere"]
        );
    }

    #[test]
    fn public_label_gets_global_before_flush() {
        let listing = vec![Item::SubEsp(4), Item::Label(Label::public("main"))];
        let output = flatten(&listing).unwrap();
        assert_eq!(
            lines(&output)[2..],
            ["GLOBAL main", "\tlea esp, [esp + -4]", "main:"]
        );
    }

    #[test]
    fn return_cleans_up_real_pushes() {
        let listing = vec![
            Item::SyncEsp,
            line("push eax"),
            line("push ecx"),
            Item::Return,
        ];
        let output = flatten(&listing).unwrap();
        assert_eq!(
            lines(&output)[2..],
            ["\tpush eax", "\tpush ecx", "\tadd esp, 8", "\tret"]
        );
    }

    #[test]
    fn sync_discards_both_counters() {
        let listing = vec![line("push eax"), Item::SubEsp(4), Item::SyncEsp, Item::Return];
        let output = flatten(&listing).unwrap();
        assert_eq!(lines(&output)[2..], ["\tpush eax", "\tret"]);
    }

    #[test]
    fn slot_tokens_rewrite_with_push_depth() {
        let listing = vec![
            Item::SyncEsp,
            line("mov eax, [##(-4)]"),
            line("push eax"),
            line("mov eax, [##(-4)]"),
        ];
        let output = flatten(&listing).unwrap();
        assert_eq!(
            lines(&output)[2..],
            [
                "\tmov eax, [esp + -4]",
                "\tpush eax",
                "\tmov eax, [esp + 0]"
            ]
        );
    }

    #[test]
    fn parameter_slots_account_for_pending_lazy_flush() {
        // A pending lazy delta flushes because the line mentions esp after
        // rewriting? It does not: the token form does not contain "esp"
        // before rewriting, so the adjustment stays pending and the slot
        // accounts only for real pushes.
        let listing = vec![Item::SyncEsp, Item::SubEsp(8), line("mov eax, [##(4)]")];
        let output = flatten(&listing).unwrap();
        assert_eq!(lines(&output)[2..], ["\tmov eax, [esp + 4]"]);
    }

    #[test]
    fn unsupported_stack_instruction_is_rejected() {
        let err = flatten(&[line("pushaw")]).unwrap_err();
        assert!(matches!(err, FlattenError::UnsupportedInstruction(op) if op == "pushaw"));
    }

    #[test]
    fn constants_deduplicate_by_content() {
        let mut names = NameAlloc::new();
        let a = names.cstr("hi");
        let b = names.cstr("hi");
        let c = names.cstr("other");
        let listing = vec![
            Item::Const(a.clone()),
            Item::Const(b.clone()),
            Item::Const(c.clone()),
        ];
        let output = flatten(&listing).unwrap();
        let expected = format!(
            "{}:\n{}:\n\tDB 104,105,0\n{}:\n\tDB 111,116,104,101,114,0\n",
            a.label, b.label, c.label
        );
        assert!(output.ends_with(&expected), "got: {output}");
    }

    #[test]
    fn deterministic_output() {
        let mut names = NameAlloc::new();
        let c = names.cstr("x");
        let listing = vec![
            Item::Const(c),
            Item::SubEsp(4),
            line("push eax"),
            Item::Label(Label::named("l")),
            Item::Return,
        ];
        let first = flatten(&listing).unwrap();
        let second = flatten(&listing).unwrap();
        assert_eq!(first, second);
    }
}
