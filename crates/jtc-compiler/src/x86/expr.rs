//! x86 expression lowering.
//!
//! A recursive tree walk: 32-bit results land in `eax`, doubles in `st0`.
//! Binary operations evaluate the left operand, push it, evaluate the
//! right operand and reload; non-commutative integer ops swap `eax`/`ecx`
//! before applying the opcode. Integer `/` and `%` trap to the
//! zero-division trampoline; double `%` corrects `fprem1` to the sign
//! convention of the divisor.

use super::types;
use super::{Env, X86Gen};
use crate::error::{CompileError, CompileResult};
use jtc_parser::ast::{
    Assignment, BinOp, Binary, Binding, Call, Cast, Expression, Reference, UnOp, Unary,
};
use jtc_x86::listing::{line, Item};

pub(crate) fn emit(
    gen: &mut X86Gen,
    expression: &Expression,
    env: &Env,
    out: &mut Vec<Item>,
) -> CompileResult<()> {
    match expression {
        Expression::Const(constant) => {
            types::emit_const(&constant.value, &mut gen.names, out);
            Ok(())
        }
        Expression::Reference(reference) => read(gen, reference, out),
        Expression::Unary(unary) => emit_unary(gen, unary, env, out),
        Expression::Binary(binary) => emit_binary(gen, binary, env, out),
        Expression::Cast(cast) => emit_cast(gen, cast, env, out),
        Expression::Call(call) => emit_call(gen, call, env, out),
        Expression::Assignment(assignment) => emit_assignment(gen, assignment, env, out),
    }
}

fn read(gen: &X86Gen, reference: &Reference, out: &mut Vec<Item>) -> CompileResult<()> {
    let slot = gen.reference_slot(reference)?;
    let ty = reference
        .ty
        .as_ref()
        .ok_or(CompileError::UntypedExpression)?;
    types::read(ty, &slot, out);
    Ok(())
}

fn emit_unary(
    gen: &mut X86Gen,
    unary: &Unary,
    env: &Env,
    out: &mut Vec<Item>,
) -> CompileResult<()> {
    emit(gen, &unary.operand, env, out)?;
    let ty = unary
        .operand
        .ty()
        .ok_or(CompileError::UntypedExpression)?;
    if types::is_dword(ty) {
        match unary.op {
            UnOp::Not => out.push(line("xor eax, 1")),
            UnOp::Neg => out.push(line("neg eax")),
            UnOp::Plus => {}
        }
    } else {
        match unary.op {
            UnOp::Neg => {
                out.push(line("fldz"));
                out.push(line("fsubrp st1"));
            }
            UnOp::Plus => {}
            UnOp::Not => return Err(CompileError::UntypedExpression),
        }
    }
    Ok(())
}

fn emit_binary(
    gen: &mut X86Gen,
    binary: &Binary,
    env: &Env,
    out: &mut Vec<Item>,
) -> CompileResult<()> {
    let op = binary.op;
    if op.is_logical() {
        let label = gen.names.label();
        emit(gen, &binary.left, env, out)?;
        out.push(line("or eax, eax"));
        let jump = if op == BinOp::And { "jz" } else { "jnz" };
        out.push(line(format!("{jump} {label}")));
        emit(gen, &binary.right, env, out)?;
        out.push(Item::Label(label));
        return Ok(());
    }

    let left_ty = binary
        .left
        .ty()
        .ok_or(CompileError::UntypedExpression)?
        .clone();
    emit(gen, &binary.left, env, out)?;
    types::push(&left_ty, out);
    emit(gen, &binary.right, env, out)?;

    if types::is_dword(&left_ty) {
        emit_int_binary(gen, op, out)
    } else {
        emit_double_binary(gen, op, out)
    }
}

fn emit_int_binary(gen: &mut X86Gen, op: BinOp, out: &mut Vec<Item>) -> CompileResult<()> {
    out.push(line("pop ecx"));

    if op.is_inequality() || op.is_equality() {
        let cc = match op {
            BinOp::Lt => "l",
            BinOp::Le => "le",
            BinOp::Ge => "ge",
            BinOp::Gt => "g",
            BinOp::Eq => "e",
            BinOp::Ne => "ne",
            _ => unreachable!(),
        };
        out.push(line("cmp ecx, eax"));
        out.push(line(format!("set{cc} al")));
        out.push(line("and eax, 1"));
        return Ok(());
    }

    if !op.is_commutative() {
        out.push(line("xchg eax, ecx"));
    }
    match op {
        BinOp::Add => out.push(line("add eax, ecx")),
        BinOp::Sub => out.push(line("sub eax, ecx")),
        BinOp::Mul => out.push(line("imul ecx")),
        BinOp::Div | BinOp::Mod => {
            out.push(line("or ecx, ecx"));
            out.push(line(format!("jz {}", gen.trampolines.zero_div)));
            out.push(line("cdq"));
            out.push(line("idiv ecx"));
            if op == BinOp::Mod {
                // Remainder takes the divisor's sign
                let label = gen.names.label();
                out.push(line("mov eax, edx"));
                out.push(line("or eax, eax"));
                out.push(line(format!("jz {label}")));
                out.push(line("mov edx, ecx"));
                out.push(line("xor ecx, eax"));
                out.push(line(format!("jns {label}")));
                out.push(line("add eax, edx"));
                out.push(Item::Label(label));
            }
        }
        _ => return Err(CompileError::UntypedExpression),
    }
    Ok(())
}

fn emit_double_binary(gen: &mut X86Gen, op: BinOp, out: &mut Vec<Item>) -> CompileResult<()> {
    // Reload the pushed left operand: st0 = left, st1 = right
    out.push(line("fld QWORD [esp]"));
    out.push(Item::AddEsp(8));

    match op {
        BinOp::Add => out.push(line("faddp st1")),
        BinOp::Sub => out.push(line("fsubrp st1")),
        BinOp::Mul => out.push(line("fmulp st1")),
        BinOp::Div => out.push(line("fdivrp st1")),
        BinOp::Mod => {
            // fprem1 leaves the partial remainder in st0 and the divisor in
            // st1; when remainder and divisor differ in sign and the
            // remainder is non-zero, add the divisor
            let label = gen.names.label();
            out.push(line("fprem1"));
            out.push(line("fldz"));
            out.push(line("fucomi st0, st1"));
            out.push(line(format!("je {label}")));
            out.push(line("seta al"));
            out.push(line("fucomi st0, st2"));
            out.push(line("seta dl"));
            out.push(line("cmp al, dl"));
            out.push(line(format!("je {label}")));
            out.push(line("fxch st1"));
            out.push(line("fadd st2"));
            out.push(line("fxch st1"));
            out.push(Item::Label(label));
            out.push(line("fstp st0"));
            out.push(line("ffree st1"));
        }
        BinOp::Lt | BinOp::Le | BinOp::Ge | BinOp::Gt | BinOp::Eq | BinOp::Ne => {
            let cc = match op {
                BinOp::Lt => "b",
                BinOp::Le => "be",
                BinOp::Ge => "ae",
                BinOp::Gt => "a",
                BinOp::Eq => "e",
                BinOp::Ne => "ne",
                _ => unreachable!(),
            };
            out.push(line("fucomip st1"));
            out.push(line(format!("set{cc} al")));
            out.push(line("and eax, 1"));
            out.push(line("fstp st0"));
        }
        BinOp::And | BinOp::Or => return Err(CompileError::UntypedExpression),
    }
    Ok(())
}

fn emit_cast(gen: &mut X86Gen, cast: &Cast, env: &Env, out: &mut Vec<Item>) -> CompileResult<()> {
    emit(gen, &cast.operand, env, out)?;
    let from = cast.operand.ty().ok_or(CompileError::UntypedExpression)?;
    types::cast_to(from, &cast.target, out)
}

fn emit_call(gen: &mut X86Gen, call: &Call, env: &Env, out: &mut Vec<Item>) -> CompileResult<()> {
    if !matches!(call.callee.bind, Some(Binding::Func(_))) {
        return Err(CompileError::InvalidCallee(call.callee.ident.clone()));
    }
    let mut size = 0;
    for argument in call.arguments.iter().rev() {
        emit(gen, argument, env, out)?;
        let ty = argument.ty().ok_or(CompileError::UntypedExpression)?;
        types::push(ty, out);
        size += types::size(ty);
    }
    out.push(line(format!("call _f_{}", call.callee.ident)));
    out.push(Item::AddEsp(size));
    Ok(())
}

fn emit_assignment(
    gen: &mut X86Gen,
    assignment: &Assignment,
    env: &Env,
    out: &mut Vec<Item>,
) -> CompileResult<()> {
    emit(gen, &assignment.rvalue, env, out)?;
    let slot = gen.reference_slot(&assignment.lvalue)?;
    let ty = assignment
        .lvalue
        .ty
        .as_ref()
        .ok_or(CompileError::UntypedExpression)?;
    types::store_keep(ty, &slot, out);
    Ok(())
}

impl X86Gen {
    pub(crate) fn reference_slot(&self, reference: &Reference) -> CompileResult<String> {
        match reference.bind {
            Some(Binding::Var(id)) => self
                .slots
                .get(&id)
                .cloned()
                .ok_or_else(|| CompileError::UnboundReference(reference.ident.clone())),
            _ => Err(CompileError::UnboundReference(reference.ident.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use jtc_parser::checker;
    use jtc_parser::parser::Parser;
    use jtc_x86::flatten;

    fn assembly(source: &str) -> String {
        let (mut program, _) = Parser::new(source).unwrap().parse().unwrap();
        let mut diags = jtc_parser::Diagnostics::new();
        checker::analyze(&mut program, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        flatten(&super::super::compile(&program).unwrap()).unwrap()
    }

    #[test]
    fn subtraction_swaps_before_applying() {
        let asm = assembly("int main() { return 5 - 2; }");
        assert!(asm.contains("xchg eax, ecx\n\tsub eax, ecx"));
    }

    #[test]
    fn addition_does_not_swap() {
        let asm = assembly("int main() { return 5 + 2; }");
        assert!(!asm.contains("xchg"));
        assert!(asm.contains("add eax, ecx"));
    }

    #[test]
    fn integer_comparison_uses_setcc() {
        let asm = assembly("int main() { if (1 < 2) return 1; return 0; }");
        assert!(asm.contains("cmp ecx, eax\n\tsetl al\n\tand eax, 1"));
    }

    #[test]
    fn double_comparison_uses_unordered_compare() {
        let asm = assembly(
            "int main() { if (1.5 > 0.5) return 1; return 0; }",
        );
        assert!(asm.contains("fucomip st1\n\tseta al\n\tand eax, 1\n\tfstp st0"));
    }

    #[test]
    fn logical_and_short_circuits() {
        // the if statement allocates _l_2/_l_3, so the connective's label
        // is _l_4
        let asm = assembly("int main() { if (true && false) return 1; return 0; }");
        assert!(asm.contains("or eax, eax\n\tjz _l_4"));
    }

    #[test]
    fn logical_or_short_circuits() {
        let asm = assembly("int main() { if (false || true) return 1; return 0; }");
        assert!(asm.contains("or eax, eax\n\tjnz _l_4"));
    }

    #[test]
    fn unary_negation_by_type() {
        let int_neg = assembly("int main() { return -1; }");
        assert!(int_neg.contains("neg eax"));
        let double_neg = assembly("int main() { double d = -0.5; return 0; }");
        assert!(double_neg.contains("fldz\n\tfsubrp st1"));
    }

    #[test]
    fn double_modulo_corrects_the_sign() {
        let asm = assembly("int main() { double d = 7.5 % 2.0; return 0; }");
        assert!(asm.contains("fprem1"));
        assert!(asm.contains("fadd st2"));
        assert!(asm.contains("ffree st1"));
    }

    #[test]
    fn modulo_shares_the_division_guard() {
        let asm = assembly("int main() { return 7 % 3; }");
        assert!(asm.contains("or ecx, ecx"));
        assert!(asm.contains("mov eax, edx"));
    }

    #[test]
    fn assignment_keeps_the_stored_value() {
        let asm = assembly("int main() { double d; d = 1.0; return 0; }");
        // store without popping, then the evaluation statement discards
        assert!(asm.contains("fst QWORD [esp + -8]"));
        assert!(asm.contains("fstp st0"));
    }
}
