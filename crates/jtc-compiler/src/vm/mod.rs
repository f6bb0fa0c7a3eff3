//! Bytecode backend: lowers the decorated AST to stack-VM code objects.
//!
//! The module object installs starred aliases for the runtime intrinsics,
//! defines one function object per declaration, and ends with a stub that
//! calls `main` and hands its result to `exit` when the module runs as the
//! program entry point.

pub mod builtins;

use crate::error::{CompileError, CompileResult};
use jtc_bytecode::{CodeObject, Const, Instr, LabelAlloc, Module, Opcode};
use jtc_parser::ast::{
    BinOp, Binding, Block, ConstValue, Expression, Function, Program, Reference, Statement,
    Type, UnOp, VarId,
};

/// Host-runtime generation the emitted module targets.
///
/// The two dialects differ in the shape of the conditional-jump helper and
/// of the `exit` import in the module epilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// Conditional jumps keep the tested value; an explicit pop follows
    Legacy,
    /// `JUMP_IF_*_OR_POP` forms and a relative-import level constant
    #[default]
    Modern,
}

/// Compile a validated program into a bytecode module.
pub fn compile(program: &Program, dialect: Dialect) -> CompileResult<Module> {
    CodeGen::new(dialect).compile_program(program)
}

/// Bytecode code generator.
pub struct CodeGen {
    dialect: Dialect,
}

impl CodeGen {
    /// Create a generator for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        CodeGen { dialect }
    }

    /// Build the module-level code object for a whole program.
    pub fn compile_program(&mut self, program: &Program) -> CompileResult<Module> {
        let filename = program
            .filename
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<stdin>".to_string());

        let mut code = Vec::new();
        let mut labels = LabelAlloc::new();

        // Prologue: alias the runtime intrinsics under starred names
        for (name, alias) in builtins::INTRINSIC_ALIASES {
            code.push(Instr::name(Opcode::LoadGlobal, *name));
            code.push(Instr::name(Opcode::StoreGlobal, *alias));
        }

        // One function object per declaration, built-ins included
        for function in &program.functions {
            let object = self.function_code(&filename, function)?;
            code.push(Instr::constant(Opcode::LoadConst, Const::Code(Box::new(object))));
            code.push(Instr::count(Opcode::MakeFunction, 0));
            code.push(Instr::name(Opcode::StoreGlobal, function.name.as_str()));
        }

        // Epilogue: `__all__ = []`, then run main when executed directly
        let skip = labels.fresh();
        code.push(Instr::count(Opcode::BuildList, 0));
        code.push(Instr::name(Opcode::StoreGlobal, "__all__"));
        code.push(Instr::name(Opcode::LoadGlobal, "__name__"));
        code.push(Instr::constant(
            Opcode::LoadConst,
            Const::Str("__main__".to_string()),
        ));
        code.push(Instr::name(Opcode::CompareOp, "=="));
        code.extend(self.jump_if_false(skip));
        if self.dialect == Dialect::Modern {
            code.push(Instr::constant(Opcode::LoadConst, Const::Int(-1)));
        }
        code.push(Instr::constant(Opcode::LoadConst, Const::None));
        code.push(Instr::name(Opcode::ImportName, "sys"));
        code.push(Instr::name(Opcode::ImportFrom, "exit"));
        code.push(Instr::name(Opcode::LoadGlobal, "main"));
        code.push(Instr::count(Opcode::CallFunction, 0));
        code.push(Instr::count(Opcode::CallFunction, 1));
        code.push(Instr::op(Opcode::PopTop));
        code.push(Instr::Label(skip));
        code.push(Instr::constant(Opcode::LoadConst, Const::None));
        code.push(Instr::op(Opcode::ReturnValue));

        Ok(Module::new(CodeObject::stub(
            builtins::BUILTINS_FILENAME,
            code,
        )))
    }

    /// Build the code object for one function.
    fn function_code(&mut self, filename: &str, function: &Function) -> CompileResult<CodeObject> {
        if let Some(builtin) = function.builtin {
            return Ok(builtins::code_object(
                builtin,
                &function.name,
                function.ty.arg_types.len(),
            ));
        }

        let mut emitter = Emitter {
            dialect: self.dialect,
            param_count: function.params.len(),
            labels: LabelAlloc::new(),
            code: Vec::new(),
        };
        emitter.block(&function.body)?;

        let args = (0..function.params.len()).map(|i| format!("_{i}")).collect();
        let firstlineno = function.span.map(|s| s.line).unwrap_or(0);
        Ok(CodeObject::function(
            &function.name,
            filename,
            firstlineno,
            args,
            emitter.code,
        ))
    }

    fn jump_if_false(&self, label: jtc_bytecode::LabelId) -> Vec<Instr> {
        match self.dialect {
            Dialect::Legacy => vec![
                Instr::jump(Opcode::JumpIfFalse, label),
                Instr::op(Opcode::PopTop),
            ],
            Dialect::Modern => vec![Instr::jump(Opcode::JumpIfFalseOrPop, label)],
        }
    }
}

struct Emitter {
    dialect: Dialect,
    param_count: usize,
    labels: LabelAlloc,
    code: Vec<Instr>,
}

impl Emitter {
    /// Local slot name for a variable: parameters use their argument slot,
    /// everything else an opaque id-derived name no identifier can collide
    /// with.
    fn slot(&self, id: VarId) -> String {
        if (id.0 as usize) < self.param_count {
            format!("_{}", id.0)
        } else {
            format!("#{:x}", id.0)
        }
    }

    fn var_slot(&self, reference: &Reference) -> CompileResult<String> {
        match reference.bind {
            Some(Binding::Var(id)) => Ok(self.slot(id)),
            _ => Err(CompileError::UnboundReference(reference.ident.clone())),
        }
    }

    fn jump_if_false(&mut self, label: jtc_bytecode::LabelId) {
        match self.dialect {
            Dialect::Legacy => {
                self.code.push(Instr::jump(Opcode::JumpIfFalse, label));
                self.code.push(Instr::op(Opcode::PopTop));
            }
            Dialect::Modern => self.code.push(Instr::jump(Opcode::JumpIfFalseOrPop, label)),
        }
    }

    fn jump_if_true(&mut self, label: jtc_bytecode::LabelId) {
        match self.dialect {
            Dialect::Legacy => {
                self.code.push(Instr::jump(Opcode::JumpIfTrue, label));
                self.code.push(Instr::op(Opcode::PopTop));
            }
            Dialect::Modern => self.code.push(Instr::jump(Opcode::JumpIfTrueOrPop, label)),
        }
    }

    fn block(&mut self, block: &Block) -> CompileResult<()> {
        for statement in &block.statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> CompileResult<()> {
        match statement {
            Statement::Declaration(decl) => {
                self.code.push(Instr::SetLineno(decl.span.line));
                for variable in &decl.variables {
                    let Some(init) = &variable.init else {
                        continue;
                    };
                    self.expression(init)?;
                    let id = variable.id.ok_or_else(|| {
                        CompileError::UnboundReference(variable.name.clone())
                    })?;
                    let slot = self.slot(id);
                    self.code.push(Instr::name(Opcode::StoreFast, slot));
                }
            }
            Statement::Evaluation(eval) => {
                self.expression(&eval.expression)?;
                self.code.push(Instr::op(Opcode::PopTop));
            }
            Statement::If(cond) => {
                let label_else = self.labels.fresh();
                let label_end = self.labels.fresh();
                self.code.push(Instr::SetLineno(cond.span.line));
                self.expression(&cond.condition)?;
                self.jump_if_false(label_else);
                self.block(&cond.then_branch)?;
                self.code.push(Instr::jump(Opcode::JumpForward, label_end));
                self.code.push(Instr::Label(label_else));
                self.code.push(Instr::op(Opcode::PopTop));
                self.block(&cond.else_branch)?;
                self.code.push(Instr::Label(label_end));
            }
            Statement::While(loop_s) => {
                let label_finally = self.labels.fresh();
                let label_cond = self.labels.fresh();
                let label_end = self.labels.fresh();
                self.code.push(Instr::SetLineno(loop_s.span.line));
                self.code.push(Instr::jump(Opcode::JumpForward, label_cond));
                self.code.push(Instr::Label(label_finally));
                self.block(&loop_s.finally)?;
                self.code.push(Instr::Label(label_cond));
                self.expression(&loop_s.condition)?;
                self.jump_if_false(label_end);
                self.block(&loop_s.body)?;
                self.code.push(Instr::jump(Opcode::JumpAbsolute, label_finally));
                self.code.push(Instr::Label(label_end));
                self.code.push(Instr::op(Opcode::PopTop));
            }
            Statement::Return(ret) => {
                self.code.push(Instr::SetLineno(ret.span.line));
                match &ret.value {
                    Some(value) => self.expression(value)?,
                    None => self
                        .code
                        .push(Instr::constant(Opcode::LoadConst, Const::None)),
                }
                self.code.push(Instr::op(Opcode::ReturnValue));
            }
            Statement::Block(block) => self.block(block)?,
        }
        Ok(())
    }

    fn expression(&mut self, expression: &Expression) -> CompileResult<()> {
        match expression {
            Expression::Const(constant) => {
                self.code.push(Instr::SetLineno(constant.span.line));
                let value = match &constant.value {
                    ConstValue::Int(v) => Const::Int(*v),
                    ConstValue::Double(v) => Const::Double(*v),
                    ConstValue::Bool(v) => Const::Bool(*v),
                    ConstValue::Str(v) => Const::Str(v.clone()),
                };
                self.code.push(Instr::constant(Opcode::LoadConst, value));
            }
            Expression::Reference(reference) => self.read_reference(reference)?,
            Expression::Unary(unary) => {
                self.expression(&unary.operand)?;
                self.code.push(Instr::SetLineno(unary.span.line));
                let opcode = match unary.op {
                    UnOp::Not => Opcode::UnaryNot,
                    UnOp::Plus => Opcode::UnaryPositive,
                    UnOp::Neg => Opcode::UnaryNegative,
                };
                self.code.push(Instr::op(opcode));
            }
            Expression::Binary(binary) => self.binary(binary)?,
            Expression::Cast(cast) => {
                self.expression(&cast.operand)?;
                self.cast_to(cast.operand.ty(), &cast.target)?;
            }
            Expression::Call(call) => {
                match call.callee.bind {
                    Some(Binding::Func(_)) => self
                        .code
                        .push(Instr::name(Opcode::LoadGlobal, call.callee.ident.as_str())),
                    _ => return Err(CompileError::InvalidCallee(call.callee.ident.clone())),
                }
                for argument in &call.arguments {
                    self.expression(argument)?;
                }
                self.code.push(Instr::SetLineno(call.span.line));
                self.code.push(Instr::count(
                    Opcode::CallFunction,
                    call.arguments.len() as u32,
                ));
            }
            Expression::Assignment(assignment) => {
                self.code.push(Instr::SetLineno(assignment.span.line));
                self.expression(&assignment.rvalue)?;
                self.code.push(Instr::op(Opcode::DupTop));
                let slot = self.var_slot(&assignment.lvalue)?;
                self.code.push(Instr::name(Opcode::StoreFast, slot));
            }
        }
        Ok(())
    }

    fn read_reference(&mut self, reference: &Reference) -> CompileResult<()> {
        match reference.bind {
            Some(Binding::Var(id)) => {
                let slot = self.slot(id);
                self.code.push(Instr::name(Opcode::LoadFast, slot));
            }
            Some(Binding::Func(_)) => self
                .code
                .push(Instr::name(Opcode::LoadGlobal, reference.ident.as_str())),
            None => return Err(CompileError::UnboundReference(reference.ident.clone())),
        }
        Ok(())
    }

    fn binary(&mut self, binary: &jtc_parser::ast::Binary) -> CompileResult<()> {
        let op = binary.op;
        if op.is_logical() {
            let label = self.labels.fresh();
            self.expression(&binary.left)?;
            self.code.push(Instr::SetLineno(binary.span.line));
            match op {
                BinOp::And => self.jump_if_false(label),
                BinOp::Or => self.jump_if_true(label),
                _ => unreachable!(),
            }
            self.expression(&binary.right)?;
            self.code.push(Instr::Label(label));
            return Ok(());
        }

        self.expression(&binary.left)?;
        self.expression(&binary.right)?;
        if op.is_arithmetic() {
            let opcode = match op {
                BinOp::Add => Opcode::BinaryAdd,
                BinOp::Sub => Opcode::BinarySubtract,
                BinOp::Mul => Opcode::BinaryMultiply,
                BinOp::Mod => Opcode::BinaryModulo,
                // Integer division floors, double division is exact
                BinOp::Div => match binary.ty.as_ref() {
                    Some(Type::Int) => Opcode::BinaryFloorDivide,
                    Some(Type::Double) => Opcode::BinaryTrueDivide,
                    _ => return Err(CompileError::UntypedExpression),
                },
                _ => unreachable!(),
            };
            self.code.push(Instr::op(opcode));
        } else {
            let cmp = match op {
                BinOp::Eq => "==",
                BinOp::Ne => "!=",
                BinOp::Lt => "<",
                BinOp::Le => "<=",
                BinOp::Gt => ">",
                BinOp::Ge => ">=",
                _ => unreachable!(),
            };
            self.code.push(Instr::SetLineno(binary.span.line));
            self.code.push(Instr::name(Opcode::CompareOp, cmp));
        }
        Ok(())
    }

    /// Transform the stack top from the operand's type to `target`.
    fn cast_to(&mut self, from: Option<&Type>, target: &Type) -> CompileResult<()> {
        match target {
            Type::Void => {
                // Casting nothing to nothing needs no code
                if from != Some(&Type::Void) {
                    self.code.push(Instr::op(Opcode::PopTop));
                    self.code.push(Instr::constant(Opcode::LoadConst, Const::None));
                }
            }
            Type::Int => self.coerce("*int"),
            Type::Double => self.coerce("*float"),
            Type::Boolean => self.coerce("*bool"),
            Type::String => {}
            Type::Function(_) => return Err(CompileError::UntypedExpression),
        }
        Ok(())
    }

    /// Call a coercion intrinsic on the stack top.
    fn coerce(&mut self, alias: &str) {
        self.code.push(Instr::name(Opcode::LoadGlobal, alias));
        self.code.push(Instr::op(Opcode::RotTwo));
        self.code.push(Instr::count(Opcode::CallFunction, 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtc_parser::checker;
    use jtc_parser::parser::Parser;

    fn compile_source(source: &str, dialect: Dialect) -> Module {
        let (mut program, _) = Parser::new(source).unwrap().parse().unwrap();
        let mut diags = jtc_parser::Diagnostics::new();
        checker::analyze(&mut program, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        compile(&program, dialect).unwrap()
    }

    fn root_ops(module: &Module) -> Vec<String> {
        module
            .root
            .code
            .iter()
            .map(|i| i.to_string())
            .collect()
    }

    fn function_object<'a>(module: &'a Module, name: &str) -> &'a CodeObject {
        for instr in &module.root.code {
            if let Instr::Op(Opcode::LoadConst, jtc_bytecode::Arg::Const(Const::Code(code))) =
                instr
            {
                if code.name == name {
                    return code;
                }
            }
        }
        panic!("no code object named {name}");
    }

    fn ops(code: &CodeObject) -> Vec<String> {
        code.code.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn prologue_aliases_intrinsics_in_order() {
        let module = compile_source("int main() { return 0; }", Dialect::Modern);
        let listing = root_ops(&module);
        assert_eq!(listing[0], "LOAD_GLOBAL bool");
        assert_eq!(listing[1], "STORE_GLOBAL *bool");
        assert_eq!(listing[8], "LOAD_GLOBAL RuntimeError");
        assert_eq!(listing[9], "STORE_GLOBAL *error");
    }

    #[test]
    fn epilogue_calls_main_and_exit() {
        let module = compile_source("int main() { return 0; }", Dialect::Modern);
        let listing = root_ops(&module);
        let text = listing.join("\n");
        assert!(text.contains("STORE_GLOBAL __all__"));
        assert!(text.contains("IMPORT_NAME sys"));
        assert!(text.contains("IMPORT_FROM exit"));
        assert!(text.ends_with("LOAD_CONST None\nRETURN_VALUE"));
        // Modern dialect uses the or-pop jump and the import level constant
        assert!(text.contains("JUMP_IF_FALSE_OR_POP"));
        assert!(text.contains("LOAD_CONST Int(-1)"));
    }

    #[test]
    fn legacy_dialect_uses_two_instruction_jumps() {
        let module = compile_source("int main() { return 0; }", Dialect::Legacy);
        let text = root_ops(&module).join("\n");
        assert!(text.contains("JUMP_IF_FALSE L0\nPOP_TOP"));
        assert!(!text.contains("OR_POP"));
        assert!(!text.contains("Int(-1)"));
    }

    #[test]
    fn parameters_and_locals_get_distinct_slots() {
        let module = compile_source(
            "int f(int a, int b) { int c = a + b; return c; } int main() { return f(1, 2); }",
            Dialect::Modern,
        );
        let f = function_object(&module, "f");
        assert_eq!(f.args, vec!["_0", "_1"]);
        let text = ops(f).join("\n");
        assert!(text.contains("LOAD_FAST _0"));
        assert!(text.contains("LOAD_FAST _1"));
        assert!(text.contains("STORE_FAST #2"));
        assert!(text.contains("LOAD_FAST #2"));
    }

    #[test]
    fn division_selects_floor_or_true() {
        let module = compile_source(
            "int main() { int i = 7 / 2; double d = 1.0 / 3.0; return i; }",
            Dialect::Modern,
        );
        let text = ops(function_object(&module, "main")).join("\n");
        assert!(text.contains("BINARY_FLOOR_DIVIDE"));
        assert!(text.contains("BINARY_TRUE_DIVIDE"));
    }

    #[test]
    fn assignment_duplicates_its_value() {
        let module = compile_source("int main() { int x; x = 1; return x; }", Dialect::Modern);
        let text = ops(function_object(&module, "main")).join("\n");
        assert!(text.contains("DUP_TOP\nSTORE_FAST #0"));
    }

    #[test]
    fn logical_ops_short_circuit() {
        let module = compile_source(
            "int main() { boolean b = true && false; boolean c = true || b; return 0; }",
            Dialect::Modern,
        );
        let text = ops(function_object(&module, "main")).join("\n");
        assert!(text.contains("JUMP_IF_FALSE_OR_POP"));
        assert!(text.contains("JUMP_IF_TRUE_OR_POP"));
    }

    #[test]
    fn casts_route_through_coercion_intrinsics() {
        let module = compile_source(
            "int main() { double d = (double) 1; int i = (int) d; (void) i; return 0; }",
            Dialect::Modern,
        );
        let text = ops(function_object(&module, "main")).join("\n");
        assert!(text.contains("LOAD_GLOBAL *float\nROT_TWO\nCALL_FUNCTION 1"));
        assert!(text.contains("LOAD_GLOBAL *int\nROT_TWO\nCALL_FUNCTION 1"));
        assert!(text.contains("POP_TOP\nLOAD_CONST None"));
    }

    #[test]
    fn while_loop_shape() {
        let module = compile_source(
            "int main() { int i = 0; while (i < 3) i = i + 1; return i; }",
            Dialect::Modern,
        );
        let text = ops(function_object(&module, "main")).join("\n");
        // jump forward to the condition, loop back through the finally label
        assert!(text.contains("JUMP_FORWARD L1"));
        assert!(text.contains("JUMP_ABSOLUTE L0"));
        assert!(text.ends_with("RETURN_VALUE"));
    }

    #[test]
    fn builtins_become_function_objects() {
        let module = compile_source("int main() { printInt(1); return 0; }", Dialect::Modern);
        let print_int = function_object(&module, "printInt");
        assert_eq!(print_int.filename, "<builtins>");
        assert_eq!(print_int.args, vec!["_0"]);
        let text = ops(print_int).join("\n");
        assert!(text.contains("PRINT_ITEM"));
        let read_int = function_object(&module, "readInt");
        assert!(ops(read_int).join("\n").contains("LOAD_GLOBAL *int"));
    }

    #[test]
    fn module_encodes_deterministically() {
        let module = compile_source(
            "int main() { printInt(1 + 2); return 0; }",
            Dialect::Modern,
        );
        assert_eq!(module.encode().unwrap(), module.encode().unwrap());
    }
}
