//! Validation: type checking and return-path analysis.
//!
//! Walks every user function, computing expression types in place. A node
//! whose type stays `None` was already reported; later checks skip it so a
//! single fault produces a single diagnostic. After type checking, a
//! non-void function must return on every path, and the
//! use-before-assignment analysis runs over the decorated body.

use super::usage;
use crate::ast::{
    Binding, Block, Expression, FunctionType, LocalVar, Program, Statement, Type,
    EQ_COMPARABLE_TYPES, INEQ_COMPARABLE_TYPES, NUMERIC_TYPES,
};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::token::Span;

/// Run the validation pass over an inspected program.
pub fn validate(program: &mut Program, diags: &mut Diagnostics) {
    let sigs: Vec<(String, FunctionType)> = program
        .functions
        .iter()
        .map(|f| (f.name.clone(), f.ty.clone()))
        .collect();

    for function in &mut program.functions {
        if function.builtin.is_some() {
            continue;
        }
        let locals = function.locals.clone();
        let mut validator = Validator {
            sigs: &sigs,
            locals: &locals,
            return_type: (*function.ty.return_type).clone(),
            diags: &mut *diags,
        };
        validator.check_block(&mut function.body);

        let returns = block_returns(&function.body);
        if *function.ty.return_type != Type::Void && !returns {
            diags.error(
                DiagnosticKind::MissingReturn,
                function.span,
                format!("Missing return statement for function '{}'", function.name),
            );
            continue;
        }
        usage::check_function(function, diags);
    }
}

/// Whether a block returns on every path: it does as soon as any of its
/// statements does.
pub fn block_returns(block: &Block) -> bool {
    block.statements.iter().any(statement_returns)
}

fn statement_returns(statement: &Statement) -> bool {
    match statement {
        Statement::Return(_) => true,
        Statement::Block(block) => block_returns(block),
        Statement::If(cond) => {
            block_returns(&cond.then_branch) && block_returns(&cond.else_branch)
        }
        // A loop body may never run
        Statement::While(_) => false,
        Statement::Declaration(_) | Statement::Evaluation(_) => false,
    }
}

struct Validator<'a> {
    sigs: &'a [(String, FunctionType)],
    locals: &'a [LocalVar],
    return_type: Type,
    diags: &'a mut Diagnostics,
}

impl Validator<'_> {
    fn mismatch(&mut self, span: Span, message: String) {
        self.diags
            .error(DiagnosticKind::TypeMismatch, Some(span), message);
    }

    fn check_block(&mut self, block: &mut Block) {
        for statement in &mut block.statements {
            self.check_statement(statement);
        }
    }

    fn check_statement(&mut self, statement: &mut Statement) {
        match statement {
            Statement::Declaration(decl) => {
                for variable in &mut decl.variables {
                    let Some(init) = &mut variable.init else {
                        continue;
                    };
                    self.check_expr(init);
                    if let Some(init_ty) = init.ty() {
                        if *init_ty != variable.ty {
                            let message = format!(
                                "Incompatible types in initialization: <{}> provided but <{}> expected",
                                init_ty, variable.ty
                            );
                            self.mismatch(variable.span, message);
                        }
                    }
                }
            }
            Statement::Evaluation(eval) => {
                self.check_expr(&mut eval.expression);
                if let Some(ty) = eval.expression.ty() {
                    if !eval.expression.is_evaluatable() {
                        let message = format!(
                            "Incompatible types in evaluation: <{ty}> provided but <void> expected"
                        );
                        self.mismatch(eval.span, message);
                    }
                }
            }
            Statement::If(cond) => {
                self.check_expr(&mut cond.condition);
                if let Some(ty) = cond.condition.ty() {
                    if *ty != Type::Boolean {
                        let message = format!(
                            "Incompatible types in conditional statement: <{ty}> provided but <boolean> expected"
                        );
                        let span = cond.condition.span();
                        self.mismatch(span, message);
                    }
                }
                self.check_block(&mut cond.then_branch);
                self.check_block(&mut cond.else_branch);
            }
            Statement::While(loop_s) => {
                self.check_expr(&mut loop_s.condition);
                if let Some(ty) = loop_s.condition.ty() {
                    if *ty != Type::Boolean {
                        let message = format!(
                            "Incompatible types in loop condition: <{ty}> provided but <boolean> expected"
                        );
                        let span = loop_s.condition.span();
                        self.mismatch(span, message);
                    }
                }
                self.check_block(&mut loop_s.finally);
                self.check_block(&mut loop_s.body);
            }
            Statement::Return(ret) => {
                let span = ret.span;
                match &mut ret.value {
                    None => {
                        if self.return_type != Type::Void {
                            let message = format!(
                                "Incompatible types in return: no expression provided but <{}> expected",
                                self.return_type
                            );
                            self.mismatch(span, message);
                        }
                    }
                    Some(value) => {
                        self.check_expr(value);
                        if self.return_type == Type::Void {
                            self.mismatch(
                                span,
                                "Incompatible types in return: an expression provided but no expression expected"
                                    .to_string(),
                            );
                        } else if let Some(ty) = value.ty() {
                            if *ty != self.return_type {
                                let message = format!(
                                    "Incompatible types in return: <{}> provided but <{}> expected",
                                    ty, self.return_type
                                );
                                self.mismatch(span, message);
                            }
                        }
                    }
                }
            }
            Statement::Block(block) => self.check_block(block),
        }
    }

    fn binding_type(&self, binding: Binding) -> Type {
        match binding {
            Binding::Var(id) => self.locals[id.0 as usize].ty.clone(),
            Binding::Func(id) => Type::Function(self.sigs[id.0].1.clone()),
        }
    }

    fn check_expr(&mut self, expression: &mut Expression) {
        match expression {
            Expression::Const(_) => {}
            Expression::Reference(reference) => {
                reference.ty = reference.bind.map(|b| self.binding_type(b));
            }
            Expression::Unary(unary) => {
                self.check_expr(&mut unary.operand);
                let Some(operand_ty) = unary.operand.ty().cloned() else {
                    return;
                };
                let op = unary.op;
                match op {
                    crate::ast::UnOp::Not => {
                        if operand_ty == Type::Boolean {
                            unary.ty = Some(Type::Boolean);
                        } else {
                            let message = format!(
                                "Incompatible types: {op} <{operand_ty}> provided but {op} <boolean> expected"
                            );
                            self.mismatch(unary.span, message);
                        }
                    }
                    crate::ast::UnOp::Plus | crate::ast::UnOp::Neg => {
                        if operand_ty.is_numeric() {
                            unary.ty = Some(operand_ty);
                        } else {
                            let message = format!(
                                "Incompatible types: {op} <{operand_ty}> provided but {op} <int> or {op} <double> expected"
                            );
                            self.mismatch(unary.span, message);
                        }
                    }
                }
            }
            Expression::Binary(binary) => {
                self.check_expr(&mut binary.left);
                self.check_expr(&mut binary.right);
                let (Some(ltype), Some(rtype)) = (binary.left.ty(), binary.right.ty()) else {
                    return;
                };
                let (ltype, rtype) = (ltype.clone(), rtype.clone());
                let op = binary.op;
                if op.is_arithmetic() {
                    if ltype == rtype && ltype.is_numeric() {
                        binary.ty = Some(ltype);
                    } else {
                        let message = format!(
                            "Incompatible types: <{ltype}> {op} <{rtype}> provided but {} expected",
                            expected_pairs(op, NUMERIC_TYPES)
                        );
                        self.mismatch(binary.span, message);
                    }
                } else if op.is_inequality() {
                    if ltype == rtype && ltype.is_ineq_comparable() {
                        binary.ty = Some(Type::Boolean);
                    } else {
                        let message = format!(
                            "Incompatible types: <{ltype}> {op} <{rtype}> provided but {} expected",
                            expected_pairs(op, INEQ_COMPARABLE_TYPES)
                        );
                        self.mismatch(binary.span, message);
                    }
                } else if op.is_equality() {
                    if ltype == rtype && ltype.is_eq_comparable() {
                        binary.ty = Some(Type::Boolean);
                    } else {
                        let message = format!(
                            "Incompatible types: <{ltype}> {op} <{rtype}> provided but {} expected",
                            expected_pairs(op, EQ_COMPARABLE_TYPES)
                        );
                        self.mismatch(binary.span, message);
                    }
                } else {
                    // Logical connective
                    if ltype == Type::Boolean && rtype == Type::Boolean {
                        binary.ty = Some(Type::Boolean);
                    } else {
                        let message = format!(
                            "Incompatible types: <{ltype}> {op} <{rtype}> provided but <boolean> {op} <boolean> expected"
                        );
                        self.mismatch(binary.span, message);
                    }
                }
            }
            Expression::Cast(cast) => {
                self.check_expr(&mut cast.operand);
                let Some(operand_ty) = cast.operand.ty() else {
                    return;
                };
                if operand_ty.is_castable_to(&cast.target) {
                    cast.ty = Some(cast.target.clone());
                } else {
                    let message = format!(
                        "Incompatible types: cannot cast <{}> to <{}>",
                        operand_ty, cast.target
                    );
                    self.mismatch(cast.span, message);
                }
            }
            Expression::Call(call) => {
                for argument in &mut call.arguments {
                    self.check_expr(argument);
                }
                let Some(binding) = call.callee.bind else {
                    return;
                };
                call.callee.ty = Some(self.binding_type(binding));
                let Binding::Func(func_id) = binding else {
                    let message = format!("'{}' is not a function", call.callee.ident);
                    let span = call.callee.span;
                    self.mismatch(span, message);
                    return;
                };
                let (name, signature) = &self.sigs[func_id.0];
                call.ty = Some((*signature.return_type).clone());

                let argc = signature.arg_types.len();
                if call.arguments.len() != argc {
                    let plural = if argc != 1 { "s" } else { "" };
                    self.diags.error(
                        DiagnosticKind::ArityMismatch,
                        Some(call.span),
                        format!(
                            "'{}' takes exactly {} argument{} but {} provided",
                            call.callee.ident,
                            argc,
                            plural,
                            call.arguments.len()
                        ),
                    );
                    return;
                }
                let name = name.clone();
                let expected: Vec<Type> = signature.arg_types.clone();
                for (i, (argument, expected_ty)) in
                    call.arguments.iter().zip(expected.iter()).enumerate()
                {
                    let Some(arg_ty) = argument.ty() else {
                        continue;
                    };
                    if arg_ty != expected_ty {
                        let message = format!(
                            "Incompatible type for argument {} of '{}': <{}> provided but <{}> expected",
                            i + 1,
                            name,
                            arg_ty,
                            expected_ty
                        );
                        let span = argument.span();
                        self.mismatch(span, message);
                    }
                }
            }
            Expression::Assignment(assignment) => {
                assignment.lvalue.ty = assignment.lvalue.bind.map(|b| self.binding_type(b));
                self.check_expr(&mut assignment.rvalue);
                let (Some(ltype), Some(rtype)) = (&assignment.lvalue.ty, assignment.rvalue.ty())
                else {
                    return;
                };
                if ltype != rtype {
                    let message = format!(
                        "Incompatible types in assignment: <{ltype}> provided but <{rtype}> expected"
                    );
                    self.mismatch(assignment.span, message);
                } else {
                    assignment.ty = Some(ltype.clone());
                }
            }
        }
    }
}

/// `"<t> op <t> or <u> op <u>"` over a capability set, for mismatch
/// messages.
fn expected_pairs(op: crate::ast::BinOp, types: &[Type]) -> String {
    let pairs: Vec<String> = types
        .iter()
        .map(|ty| format!("<{ty}> {op} <{ty}>"))
        .collect();
    pairs.join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker;
    use crate::parser::Parser;

    fn check(source: &str) -> Diagnostics {
        let (mut program, _) = Parser::new(source).unwrap().parse().unwrap();
        let mut diags = Diagnostics::new();
        checker::analyze(&mut program, &mut diags);
        diags
    }

    fn messages(diags: &Diagnostics) -> Vec<String> {
        diags.iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn arithmetic_requires_matching_numeric_types() {
        let diags = check("int main() { int x = 1 + 1.5; return 0; }");
        assert!(messages(&diags).iter().any(|m| m
            == "Incompatible types: <int> + <double> provided but <double> + <double> or <int> + <int> expected"));
    }

    #[test]
    fn logical_requires_booleans() {
        let diags = check("int main() { boolean b = 1 && true; return 0; }");
        assert!(messages(&diags).iter().any(|m| m
            == "Incompatible types: <int> && <boolean> provided but <boolean> && <boolean> expected"));
    }

    #[test]
    fn equality_covers_booleans_inequality_does_not() {
        let ok = check("int main() { boolean b = true == false; return 0; }");
        assert!(!ok.has_errors(), "{:?}", ok.into_vec());
        let bad = check("int main() { boolean b = true < false; return 0; }");
        assert!(bad.has_errors());
    }

    #[test]
    fn string_is_not_comparable() {
        let diags = check(r#"int main() { boolean b = "a" == "a"; return 0; }"#);
        assert!(diags.has_errors());
    }

    #[test]
    fn cast_matrix_is_enforced() {
        let ok = check("int main() { double d = (double) 1; return (int) d; }");
        assert!(!ok.has_errors(), "{:?}", ok.into_vec());
        let bad = check(r#"int main() { int x = (int) "a"; return 0; }"#);
        assert!(messages(&bad)
            .iter()
            .any(|m| m == "Incompatible types: cannot cast <string> to <int>"));
    }

    #[test]
    fn evaluation_requires_void_or_assignment() {
        let bad = check("int main() { 1 + 2; return 0; }");
        assert!(messages(&bad).iter().any(|m| m
            == "Incompatible types in evaluation: <int> provided but <void> expected"));
        let ok = check("int main() { int x; x = 1; (void) readInt(); return 0; }");
        assert!(!ok.has_errors(), "{:?}", ok.into_vec());
    }

    #[test]
    fn conditions_must_be_boolean() {
        let diags = check("int main() { if (1) return 0; return 1; }");
        assert!(messages(&diags).iter().any(|m| m
            == "Incompatible types in conditional statement: <int> provided but <boolean> expected"));
    }

    #[test]
    fn return_types_are_checked() {
        let diags = check("int main() { return 1.5; }");
        assert!(messages(&diags).iter().any(|m| m
            == "Incompatible types in return: <double> provided but <int> expected"));
        let void_return = check("void f() { return 1; } int main() { return 0; }");
        assert!(messages(&void_return).iter().any(|m| m
            == "Incompatible types in return: an expression provided but no expression expected"));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let diags = check("int main() { printInt(1, 2); return 0; }");
        assert!(messages(&diags)
            .iter()
            .any(|m| m == "'printInt' takes exactly 1 argument but 2 provided"));
    }

    #[test]
    fn argument_types_are_checked() {
        let diags = check("int main() { printInt(1.5); return 0; }");
        assert!(messages(&diags).iter().any(|m| m
            == "Incompatible type for argument 1 of 'printInt': <double> provided but <int> expected"));
    }

    #[test]
    fn missing_return_rejected_on_some_path() {
        let diags = check("int f() {} int main() { return 0; }");
        assert!(messages(&diags)
            .iter()
            .any(|m| m == "Missing return statement for function 'f'"));

        let partial = check(
            "int f(boolean c) { if (c) return 1; } int main() { return f(true); }",
        );
        assert!(messages(&partial)
            .iter()
            .any(|m| m == "Missing return statement for function 'f'"));
    }

    #[test]
    fn returns_on_both_branches_accepted() {
        let diags = check(
            "int f(boolean c) { if (c) return 1; else return 2; } int main() { return f(true); }",
        );
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
    }

    #[test]
    fn loops_do_not_count_as_returning() {
        let diags = check("int f() { while (true) return 1; } int main() { return 0; }");
        assert!(messages(&diags)
            .iter()
            .any(|m| m == "Missing return statement for function 'f'"));
    }

    #[test]
    fn void_functions_need_no_return() {
        let diags = check("void f() { printInt(1); } int main() { f(); return 0; }");
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
    }

    #[test]
    fn calling_a_variable_is_an_error() {
        let diags = check("int main() { int x = 1; return x(); }");
        assert!(messages(&diags)
            .iter()
            .any(|m| m == "'x' is not a function"));
    }
}
