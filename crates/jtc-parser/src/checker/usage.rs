//! Use-before-assignment analysis.
//!
//! A forward flow pass per function over two sets of `VarId`s: `lsv` holds
//! variables definitely assigned, `rsv` every variable ever read. Parameters
//! start assigned. The merge at an `if` is the intersection of the two
//! branches; a loop contributes nothing to the state after it, since its
//! body may never run.

use crate::ast::{Binding, Block, Expression, Function, Statement, VarId};
use crate::diag::{DiagnosticKind, Diagnostics};
use rustc_hash::FxHashSet;

/// Check one function for uses of possibly unassigned variables.
pub fn check_function(function: &Function, diags: &mut Diagnostics) {
    let mut lsv: FxHashSet<VarId> = (0..function.params.len() as u32).map(VarId).collect();
    let mut rsv: FxHashSet<VarId> = FxHashSet::default();
    check_block(&function.body, &mut lsv, &mut rsv, diags);
}

fn check_block(
    block: &Block,
    lsv: &mut FxHashSet<VarId>,
    rsv: &mut FxHashSet<VarId>,
    diags: &mut Diagnostics,
) {
    for statement in &block.statements {
        check_statement(statement, lsv, rsv, diags);
    }
}

fn check_statement(
    statement: &Statement,
    lsv: &mut FxHashSet<VarId>,
    rsv: &mut FxHashSet<VarId>,
    diags: &mut Diagnostics,
) {
    match statement {
        Statement::Declaration(decl) => {
            for variable in &decl.variables {
                if let Some(init) = &variable.init {
                    check_expr(init, lsv, rsv, diags);
                    if let Some(id) = variable.id {
                        lsv.insert(id);
                    }
                }
            }
        }
        Statement::Evaluation(eval) => check_expr(&eval.expression, lsv, rsv, diags),
        // Nested blocks share the live state: an assignment inside one
        // counts afterwards
        Statement::Block(block) => check_block(block, lsv, rsv, diags),
        Statement::If(cond) => {
            check_expr(&cond.condition, lsv, rsv, diags);
            let mut lsv_then = lsv.clone();
            let mut lsv_else = lsv.clone();
            check_block(&cond.then_branch, &mut lsv_then, rsv, diags);
            check_block(&cond.else_branch, &mut lsv_else, rsv, diags);
            lsv.extend(lsv_then.intersection(&lsv_else).copied());
        }
        Statement::While(loop_s) => {
            check_expr(&loop_s.condition, lsv, rsv, diags);
            // Assignments inside the loop do not count after it
            let mut lsv_body = lsv.clone();
            check_block(&loop_s.body, &mut lsv_body, rsv, diags);
            let mut lsv_finally = lsv.clone();
            check_block(&loop_s.finally, &mut lsv_finally, rsv, diags);
        }
        Statement::Return(ret) => {
            if let Some(value) = &ret.value {
                check_expr(value, lsv, rsv, diags);
            }
        }
    }
}

fn check_expr(
    expression: &Expression,
    lsv: &mut FxHashSet<VarId>,
    rsv: &mut FxHashSet<VarId>,
    diags: &mut Diagnostics,
) {
    match expression {
        Expression::Const(_) => {}
        Expression::Reference(reference) => {
            // Functions are always "assigned"; unresolved references were
            // already reported by the binder
            if let Some(Binding::Var(id)) = reference.bind {
                rsv.insert(id);
                if !lsv.contains(&id) {
                    diags.error(
                        DiagnosticKind::ReferenceBeforeAssignment,
                        Some(reference.span),
                        "Possible reference before assignment",
                    );
                }
            }
        }
        Expression::Unary(unary) => check_expr(&unary.operand, lsv, rsv, diags),
        Expression::Binary(binary) => {
            check_expr(&binary.left, lsv, rsv, diags);
            check_expr(&binary.right, lsv, rsv, diags);
        }
        Expression::Cast(cast) => check_expr(&cast.operand, lsv, rsv, diags),
        Expression::Call(call) => {
            for argument in &call.arguments {
                check_expr(argument, lsv, rsv, diags);
            }
        }
        Expression::Assignment(assignment) => {
            check_expr(&assignment.rvalue, lsv, rsv, diags);
            if let Some(Binding::Var(id)) = assignment.lvalue.bind {
                lsv.insert(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::checker;
    use crate::diag::{DiagnosticKind, Diagnostics};
    use crate::parser::Parser;

    fn check(source: &str) -> Diagnostics {
        let (mut program, _) = Parser::new(source).unwrap().parse().unwrap();
        let mut diags = Diagnostics::new();
        checker::analyze(&mut program, &mut diags);
        diags
    }

    fn unassigned_uses(diags: &Diagnostics) -> usize {
        diags
            .iter()
            .filter(|d| d.kind == DiagnosticKind::ReferenceBeforeAssignment)
            .count()
    }

    #[test]
    fn accepts_assignment_before_use() {
        let diags = check("int main() { int x; x = 1; return x; }");
        assert_eq!(unassigned_uses(&diags), 0, "{:?}", diags.into_vec());
    }

    #[test]
    fn rejects_use_without_assignment() {
        let diags = check("int main() { int x; return x; }");
        assert_eq!(unassigned_uses(&diags), 1);
    }

    #[test]
    fn accepts_assignment_on_both_branches() {
        let diags = check(
            "int main() { boolean c = true; int x; if (c) x = 1; else x = 2; return x; }",
        );
        assert_eq!(unassigned_uses(&diags), 0, "{:?}", diags.into_vec());
    }

    #[test]
    fn rejects_assignment_on_one_branch() {
        let diags =
            check("int main() { boolean c = true; int x; if (c) x = 1; return x; }");
        assert_eq!(unassigned_uses(&diags), 1);
    }

    #[test]
    fn loop_assignments_do_not_escape() {
        let diags = check(
            "int main() { int x; while (true) x = 1; return x; }",
        );
        assert_eq!(unassigned_uses(&diags), 1);
    }

    #[test]
    fn parameters_start_assigned() {
        let diags = check("int f(int x) { return x; } int main() { return f(1); }");
        assert_eq!(unassigned_uses(&diags), 0, "{:?}", diags.into_vec());
    }

    #[test]
    fn initializer_counts_as_assignment() {
        let diags = check("int main() { int x = 1; return x; }");
        assert_eq!(unassigned_uses(&diags), 0, "{:?}", diags.into_vec());
    }

    #[test]
    fn nested_block_assignment_counts() {
        let diags = check("int main() { int x; { x = 1; } return x; }");
        assert_eq!(unassigned_uses(&diags), 0, "{:?}", diags.into_vec());
    }

    #[test]
    fn rvalue_checked_before_lvalue_registered() {
        let diags = check("int main() { int x; x = x + 1; return x; }");
        assert_eq!(unassigned_uses(&diags), 1);
    }
}
