//! Inspection: name resolution and binding.
//!
//! Builds the function table, walks every function body depth-first with a
//! stack-of-stacks scope structure, assigns each variable a fresh `VarId`
//! (monotonic per function, parameters first) and points every reference at
//! its innermost binding. Redeclaration inside the same block is an error;
//! shadowing an enclosing block's name is legal.

use crate::ast::{
    Binding, Block, Expression, FuncId, Function, LocalVar, Program, Statement, Type, VarId,
    Variable,
};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::token::Span;
use rustc_hash::{FxHashMap, FxHashSet};

/// Run the inspection pass over a program.
pub fn inspect(program: &mut Program, diags: &mut Diagnostics) {
    let mut table: FxHashMap<String, Binding> = FxHashMap::default();
    for (index, function) in program.functions.iter().enumerate() {
        if table.contains_key(&function.name) {
            diags.error(
                DiagnosticKind::Inspect,
                function.span,
                format!("Redefinition of function '{}'", function.name),
            );
        } else {
            table.insert(function.name.clone(), Binding::Func(FuncId(index)));
        }
    }

    match program.functions.iter().find(|f| f.name == "main") {
        None => diags.error(DiagnosticKind::Inspect, None, "Missing function 'main'"),
        Some(main) => {
            let expected = Type::main_type();
            if main.ty != expected {
                diags.error(
                    DiagnosticKind::TypeMismatch,
                    main.span,
                    format!(
                        "Incorrect type of function 'main': <{}> provided but <{}> expected",
                        main.ty, expected
                    ),
                );
            }
        }
    }

    for index in 0..program.functions.len() {
        if program.functions[index].builtin.is_some() {
            continue;
        }
        let mut binder = Binder {
            scopes: Scopes::new(&table),
            locals: Vec::new(),
            diags: &mut *diags,
        };
        binder.bind_function(&mut program.functions[index]);
        program.functions[index].locals = binder.locals;
    }
}

/// Stack-of-stacks name resolution state.
///
/// Each name maps to the stack of its visible bindings; entering a block
/// records which names it declares so `leave_block` can pop exactly those.
struct Scopes {
    bindings: FxHashMap<String, Vec<Binding>>,
}

impl Scopes {
    fn new(functions: &FxHashMap<String, Binding>) -> Self {
        let bindings = functions
            .iter()
            .map(|(name, binding)| (name.clone(), vec![*binding]))
            .collect();
        Scopes { bindings }
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        self.bindings.get(name).and_then(|stack| stack.last().copied())
    }

    fn push(&mut self, name: &str, binding: Binding) {
        self.bindings.entry(name.to_string()).or_default().push(binding);
    }

    fn pop(&mut self, name: &str) {
        if let Some(stack) = self.bindings.get_mut(name) {
            stack.pop();
            if stack.is_empty() {
                self.bindings.remove(name);
            }
        }
    }
}

struct Binder<'a> {
    scopes: Scopes,
    /// Declaration arena of the function being bound, indexed by `VarId`
    locals: Vec<LocalVar>,
    diags: &'a mut Diagnostics,
}

impl Binder<'_> {
    /// Bind one function. Parameters live in an implicit block that
    /// encloses the body, so a body-level declaration legally shadows a
    /// parameter.
    fn bind_function(&mut self, function: &mut Function) {
        let mut outer_names: FxHashSet<String> = FxHashSet::default();
        for param in &mut function.params {
            self.declare(param, &mut outer_names);
        }

        let mut body = std::mem::take(&mut function.body);
        self.bind_block(&mut body);
        function.body = body;

        for name in &outer_names {
            self.scopes.pop(name);
        }
    }

    fn bind_block(&mut self, block: &mut Block) {
        let mut names: FxHashSet<String> = FxHashSet::default();
        for statement in &mut block.statements {
            match statement {
                Statement::Declaration(decl) => {
                    for variable in &mut decl.variables {
                        // The initializer resolves against the scope as it
                        // was before this variable is pushed
                        if let Some(init) = &mut variable.init {
                            self.bind_expr(init);
                        }
                        self.declare(variable, &mut names);
                    }
                }
                Statement::Block(inner) => self.bind_block(inner),
                Statement::Evaluation(eval) => self.bind_expr(&mut eval.expression),
                Statement::If(cond) => {
                    self.bind_expr(&mut cond.condition);
                    self.bind_block(&mut cond.then_branch);
                    self.bind_block(&mut cond.else_branch);
                }
                Statement::While(loop_s) => {
                    self.bind_expr(&mut loop_s.condition);
                    self.bind_block(&mut loop_s.body);
                    self.bind_block(&mut loop_s.finally);
                }
                Statement::Return(ret) => {
                    if let Some(value) = &mut ret.value {
                        self.bind_expr(value);
                    }
                }
            }
        }
        for name in &names {
            self.scopes.pop(name);
        }
    }

    /// Assign a fresh id to a variable and bring it into scope, reporting a
    /// redeclaration when its block already declares the name.
    fn declare(&mut self, variable: &mut Variable, block_names: &mut FxHashSet<String>) {
        let id = VarId(self.locals.len() as u32);
        variable.id = Some(id);
        self.locals.push(LocalVar {
            name: variable.name.clone(),
            ty: variable.ty.clone(),
        });
        if block_names.contains(&variable.name) {
            self.diags.error(
                DiagnosticKind::Inspect,
                Some(variable.span),
                format!("Redeclaration of variable '{}'", variable.name),
            );
        } else {
            self.scopes.push(&variable.name, Binding::Var(id));
            block_names.insert(variable.name.clone());
        }
    }

    fn bind_expr(&mut self, expression: &mut Expression) {
        match expression {
            Expression::Const(_) => {}
            Expression::Reference(reference) => {
                self.bind_reference(&mut reference.ident, &mut reference.bind, reference.span);
            }
            Expression::Unary(unary) => self.bind_expr(&mut unary.operand),
            Expression::Binary(binary) => {
                self.bind_expr(&mut binary.left);
                self.bind_expr(&mut binary.right);
            }
            Expression::Cast(cast) => self.bind_expr(&mut cast.operand),
            Expression::Call(call) => {
                self.bind_reference(
                    &mut call.callee.ident,
                    &mut call.callee.bind,
                    call.callee.span,
                );
                for argument in &mut call.arguments {
                    self.bind_expr(argument);
                }
            }
            Expression::Assignment(assignment) => {
                self.bind_reference(
                    &mut assignment.lvalue.ident,
                    &mut assignment.lvalue.bind,
                    assignment.lvalue.span,
                );
                self.bind_expr(&mut assignment.rvalue);
            }
        }
    }

    fn bind_reference(&mut self, ident: &mut String, bind: &mut Option<Binding>, span: Span) {
        match self.scopes.lookup(ident) {
            Some(binding) => *bind = Some(binding),
            None => {
                self.diags.error(
                    DiagnosticKind::Inspect,
                    Some(span),
                    format!("Variable '{ident}' undeclared"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::builtins;
    use crate::parser::Parser;

    fn bind(source: &str) -> (Program, Diagnostics) {
        let (mut program, _) = Parser::new(source).unwrap().parse().unwrap();
        builtins::inject(&mut program);
        let mut diags = Diagnostics::new();
        inspect(&mut program, &mut diags);
        (program, diags)
    }

    fn first_reference(program: &Program) -> &crate::ast::Reference {
        for statement in &program.functions[0].body.statements {
            if let Statement::Return(ret) = statement {
                if let Some(Expression::Reference(reference)) = &ret.value {
                    return reference;
                }
            }
        }
        panic!("no returned reference found");
    }

    #[test]
    fn binds_references_to_declarations() {
        let (program, diags) = bind("int main() { int x = 1; return x; }");
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        let reference = first_reference(&program);
        assert_eq!(reference.bind, Some(Binding::Var(VarId(0))));
    }

    #[test]
    fn shadowing_across_blocks_is_legal() {
        let (program, diags) =
            bind("int main() { int x = 1; { int x = 2; printInt(x); } return x; }");
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        // The outer `x` is id 0, the shadowing one id 1, and the final
        // return resolves to the outer declaration again
        let reference = first_reference(&program);
        assert_eq!(reference.bind, Some(Binding::Var(VarId(0))));
        assert_eq!(program.functions[0].locals.len(), 2);
    }

    #[test]
    fn redeclaration_in_same_block_is_an_error() {
        let (_, diags) = bind("int main() { int x; int x; return 0; }");
        assert!(diags
            .iter()
            .any(|d| d.message == "Redeclaration of variable 'x'"));
    }

    #[test]
    fn parameter_shadowing_in_body_is_legal() {
        let (_, diags) = bind("int f(int x) { int x = 1; return x; } int main() { return f(0); }");
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
    }

    #[test]
    fn undeclared_reference_is_reported_and_analysis_continues() {
        let (_, diags) = bind("int main() { y = 1; z = 2; return 0; }");
        let undeclared: Vec<_> = diags
            .iter()
            .filter(|d| d.message.contains("undeclared"))
            .collect();
        assert_eq!(undeclared.len(), 2);
    }

    #[test]
    fn initializer_resolves_before_its_own_variable() {
        let (_, diags) = bind("int main() { int x = x; return 0; }");
        assert!(diags
            .iter()
            .any(|d| d.message == "Variable 'x' undeclared"));
    }

    #[test]
    fn duplicate_function_is_reported() {
        let (_, diags) = bind("int main() { return 0; } int main() { return 1; }");
        assert!(diags
            .iter()
            .any(|d| d.message == "Redefinition of function 'main'"));
    }

    #[test]
    fn wrong_main_type_is_reported() {
        let (_, diags) = bind("void main() {}");
        assert!(diags.iter().any(|d| d
            .message
            .contains("Incorrect type of function 'main': <unit -> void> provided but <unit -> int> expected")));
    }
}
