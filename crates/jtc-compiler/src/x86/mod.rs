//! x86 backend: lowers the decorated AST to an IA-32 assembly listing.
//!
//! Every function becomes a `_f_`-prefixed label bracketed by `SyncEsp`.
//! Declarations grow a per-block virtual stack pointer and allocate
//! lazily; leaving a block releases exactly what it allocated. The final
//! listing goes through the lazy-ESP flattener and the external
//! assembler/linker in `jtc-x86`.

pub mod builtins;
pub mod expr;
pub mod types;

use crate::error::{CompileError, CompileResult};
use builtins::Trampolines;
use jtc_parser::ast::{Block, Expression, Function, Program, Statement, VarId, Variable};
use jtc_x86::listing::{line, Item, Label, NameAlloc};
use rustc_hash::FxHashMap;

/// Compile a validated program into an assembly listing.
pub fn compile(program: &Program) -> CompileResult<Vec<Item>> {
    let mut names = NameAlloc::new();
    let (mut listing, trampolines) = builtins::stub(&mut names);
    let mut gen = X86Gen {
        names,
        trampolines,
        slots: FxHashMap::default(),
    };
    for function in &program.functions {
        gen.function(function, &mut listing)?;
    }
    Ok(listing)
}

/// Per-block virtual stack pointer: bytes of locals allocated below the
/// function's entry ESP.
#[derive(Debug, Clone, Default)]
pub(crate) struct Env {
    vsp: i32,
}

/// x86 code generator state.
pub(crate) struct X86Gen {
    pub(crate) names: NameAlloc,
    pub(crate) trampolines: Trampolines,
    /// Slot token of every variable of the current function
    slots: FxHashMap<VarId, String>,
}

impl X86Gen {
    fn function(&mut self, function: &Function, out: &mut Vec<Item>) -> CompileResult<()> {
        let label = Label::named(format!("_f_{}", function.name));
        if let Some(builtin) = function.builtin {
            out.push(Item::Label(label));
            out.extend(builtins::body(builtin, &mut self.names, &self.trampolines));
            return Ok(());
        }

        out.push(Item::SyncEsp);
        out.push(Item::Label(label));
        self.slots.clear();
        // cdecl: parameter i sits above the return address
        for (i, param) in function.params.iter().enumerate() {
            let id = self.var_id(param)?;
            self.slots.insert(id, format!("##({})", 4 * (i + 1)));
        }
        let env = Env::default();
        self.block(&function.body, &env, out)?;
        out.push(Item::SyncEsp);
        Ok(())
    }

    fn var_id(&self, variable: &Variable) -> CompileResult<VarId> {
        variable
            .id
            .ok_or_else(|| CompileError::UnboundReference(variable.name.clone()))
    }

    pub(crate) fn block(
        &mut self,
        block: &Block,
        env: &Env,
        out: &mut Vec<Item>,
    ) -> CompileResult<()> {
        let mut inner = env.clone();
        for statement in &block.statements {
            self.statement(statement, &mut inner, out)?;
        }
        // Release everything the block allocated
        out.push(Item::AddEsp(inner.vsp - env.vsp));
        Ok(())
    }

    fn statement(
        &mut self,
        statement: &Statement,
        env: &mut Env,
        out: &mut Vec<Item>,
    ) -> CompileResult<()> {
        match statement {
            Statement::Declaration(decl) => {
                let mut salloc = 0;
                for variable in &decl.variables {
                    let size = types::size(&variable.ty);
                    env.vsp += size;
                    salloc += size;
                    let id = self.var_id(variable)?;
                    self.slots.insert(id, format!("##(-{})", env.vsp));
                }
                out.push(Item::SubEsp(salloc));
                for variable in &decl.variables {
                    let Some(init) = &variable.init else {
                        continue;
                    };
                    self.expression(init, env, out)?;
                    let id = self.var_id(variable)?;
                    let slot = self.slots[&id].clone();
                    types::write(&variable.ty, &slot, out);
                }
            }
            Statement::Evaluation(eval) => {
                self.expression(&eval.expression, env, out)?;
                let ty = eval
                    .expression
                    .ty()
                    .ok_or(CompileError::UntypedExpression)?;
                types::discard(ty, out);
            }
            Statement::If(cond) => {
                let label_else = self.names.label();
                let label_end = self.names.label();
                self.expression(&cond.condition, env, out)?;
                out.push(line("or eax, eax"));
                out.push(line(format!("jz {label_else}")));
                self.block(&cond.then_branch, env, out)?;
                out.push(line(format!("jmp {label_end}")));
                out.push(Item::Label(label_else));
                self.block(&cond.else_branch, env, out)?;
                out.push(Item::Label(label_end));
            }
            Statement::While(loop_s) => {
                let label_top = self.names.label();
                let label_cond = self.names.label();
                out.push(line(format!("jmp {label_cond}")));
                out.push(Item::Label(label_top.clone()));
                self.block(&loop_s.body, env, out)?;
                self.block(&loop_s.finally, env, out)?;
                out.push(Item::Label(label_cond));
                self.expression(&loop_s.condition, env, out)?;
                out.push(line("or eax, eax"));
                out.push(line(format!("jnz {label_top}")));
            }
            Statement::Return(ret) => {
                if let Some(value) = &ret.value {
                    self.expression(value, env, out)?;
                }
                out.push(Item::Return);
            }
            Statement::Block(block) => self.block(block, env, out)?,
        }
        Ok(())
    }

    pub(crate) fn expression(
        &mut self,
        expression: &Expression,
        env: &Env,
        out: &mut Vec<Item>,
    ) -> CompileResult<()> {
        expr::emit(self, expression, env, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtc_parser::checker;
    use jtc_parser::parser::Parser;
    use jtc_x86::flatten;

    fn listing(source: &str) -> Vec<Item> {
        let (mut program, _) = Parser::new(source).unwrap().parse().unwrap();
        let mut diags = jtc_parser::Diagnostics::new();
        checker::analyze(&mut program, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        compile(&program).unwrap()
    }

    fn assembly(source: &str) -> String {
        flatten(&listing(source)).unwrap()
    }

    fn db_bytes(text: &str) -> String {
        let rendered: Vec<String> = text.bytes().map(|b| b.to_string()).collect();
        format!("DB {}", rendered.join(","))
    }

    #[test]
    fn stub_exports_main_and_jumps_to_user_main() {
        let asm = assembly("int main() { return 0; }");
        assert!(asm.contains("GLOBAL main"));
        assert!(asm.contains("main:\n\tjmp _f_main"));
        assert!(asm.contains("_f_main:"));
        assert!(asm.contains("EXTERN stderr"));
        assert!(asm.contains(&db_bytes("IOError\n\0")));
        assert!(asm.contains(&db_bytes("ZeroDivisionError\n\0")));
    }

    #[test]
    fn parameters_address_above_the_return_address() {
        let asm = assembly(
            "int f(int a, int b) { return a + b; } int main() { return f(1, 2); }",
        );
        // first parameter at [esp + 4], second at [esp + 8], adjusted for
        // the push of the left operand
        assert!(asm.contains("mov eax, [esp + 4]"));
        assert!(asm.contains("mov eax, [esp + 12]"));
    }

    #[test]
    fn declarations_allocate_lazily() {
        // Straight-line code never materializes the allocation: the store
        // and the read both address below ESP and the block-exit release
        // cancels the pending delta
        let asm = assembly("int main() { int x = 1; return x; }");
        assert!(asm.contains("mov [esp + -4], eax"));
        assert!(asm.contains("mov eax, [esp + -4]"));
        assert!(!asm.contains("lea esp"), "{asm}");
    }

    #[test]
    fn calls_force_the_allocation_to_materialize() {
        let asm = assembly("int main() { int x = 1; printInt(x); return x; }");
        assert!(asm.contains("lea esp, [esp + -4]"));
    }

    #[test]
    fn integer_division_guards_against_zero() {
        let asm = assembly("int main() { return 7 / 2; }");
        assert!(asm.contains("or ecx, ecx"));
        // _l_1 is the zero-division trampoline allocated by the stub
        assert!(asm.contains("jz _l_1"));
        assert!(asm.contains("cdq"));
        assert!(asm.contains("idiv ecx"));
    }

    #[test]
    fn calls_push_arguments_right_to_left() {
        let asm = assembly(
            "void f(int a, double b) { printInt(a); } int main() { f(1, 2.5); return 0; }",
        );
        let call_pos = asm.find("call _f_f").unwrap();
        let before = &asm[..call_pos];
        // the double (second argument) is pushed first
        let double_push = before.rfind("fstp QWORD [esp]").unwrap();
        let int_push = before.rfind("push eax").unwrap();
        assert!(double_push < int_push);
    }

    #[test]
    fn builtin_bodies_are_emitted_once_each() {
        let asm = assembly("int main() { return 0; }");
        for name in [
            "_f_printInt",
            "_f_printDouble",
            "_f_printString",
            "_f_error",
            "_f_readInt",
            "_f_readDouble",
        ] {
            assert_eq!(asm.matches(&format!("{name}:")).count(), 1, "{name}");
        }
        assert!(asm.contains(&db_bytes("%.12g\0")));
    }

    #[test]
    fn duplicate_string_literals_share_bytes() {
        let asm = assembly(
            r#"int main() { printString("hi"); printString("hi"); return 0; }"#,
        );
        // two labels, one DB for the shared bytes of "hi"
        assert_eq!(asm.matches("DB 104,105,0").count(), 1);
    }

    #[test]
    fn output_is_deterministic() {
        let source = "int main() { double d = 1.0 / 3.0; printDouble(d); return 0; }";
        assert_eq!(assembly(source), assembly(source));
    }
}
