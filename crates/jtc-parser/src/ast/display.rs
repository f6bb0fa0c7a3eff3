//! Pretty printer for decorated programs.
//!
//! Output is valid Javalette: parsing the printed form of a parsed program
//! yields a tree that prints identically. Sub-expressions are fully
//! parenthesized so no precedence information is lost, and desugared
//! constructs (`for`, `x++`) print in their desugared shape.

use super::expression::{ConstValue, Expression};
use super::statement::{Block, Function, Program, Statement, Variable};
use std::fmt;

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pretty(self))
    }
}

/// Render a program as Javalette source.
pub fn pretty(program: &Program) -> String {
    let mut printer = Printer::new();
    let mut first = true;
    for function in &program.functions {
        if function.builtin.is_some() {
            continue;
        }
        if !first {
            printer.out.push('\n');
        }
        first = false;
        printer.function(function);
    }
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Printer {
            out: String::new(),
            indent: 0,
        }
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn function(&mut self, function: &Function) {
        self.out
            .push_str(&format!("{} {}(", function.ty.return_type, function.name));
        for (i, param) in function.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&format!("{} {}", param.ty, param.name));
        }
        self.out.push_str(") ");
        self.block(&function.body);
        self.out.push('\n');
    }

    fn block(&mut self, block: &Block) {
        self.out.push('{');
        if block.statements.is_empty() {
            self.out.push('}');
            return;
        }
        self.out.push('\n');
        self.indent += 1;
        for statement in &block.statements {
            self.write_indent();
            self.statement(statement);
            self.out.push('\n');
        }
        self.indent -= 1;
        self.write_indent();
        self.out.push('}');
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Declaration(decl) => {
                let ty = &decl.variables[0].ty;
                self.out.push_str(&format!("{ty} "));
                for (i, var) in decl.variables.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.variable(var);
                }
                self.out.push(';');
            }
            Statement::Evaluation(eval) => {
                self.out.push_str(&expr(&eval.expression));
                self.out.push(';');
            }
            Statement::If(cond) => {
                self.out.push_str(&format!("if ({}) ", expr(&cond.condition)));
                self.block(&cond.then_branch);
                if !cond.else_branch.statements.is_empty() {
                    self.out.push_str(" else ");
                    self.block(&cond.else_branch);
                }
            }
            Statement::While(loop_s) => {
                self.out
                    .push_str(&format!("while ({}) ", expr(&loop_s.condition)));
                // The finally-block folds into the body; re-parsing yields a
                // loop with an empty finally-block that prints the same way
                if loop_s.finally.statements.is_empty() {
                    self.block(&loop_s.body);
                } else {
                    let mut merged = loop_s.body.clone();
                    merged
                        .statements
                        .extend(loop_s.finally.statements.iter().cloned());
                    self.block(&merged);
                }
            }
            Statement::Return(ret) => match &ret.value {
                Some(value) => {
                    self.out.push_str(&format!("return {};", expr(value)));
                }
                None => self.out.push_str("return;"),
            },
            Statement::Block(block) => self.block(block),
        }
    }

    fn variable(&mut self, var: &Variable) {
        self.out.push_str(&var.name);
        if let Some(init) = &var.init {
            self.out.push_str(&format!(" = {}", expr(init)));
        }
    }
}

fn expr(expression: &Expression) -> String {
    match expression {
        Expression::Const(c) => match &c.value {
            ConstValue::Int(v) => v.to_string(),
            ConstValue::Double(v) => format!("{v:?}"),
            ConstValue::Bool(v) => v.to_string(),
            ConstValue::Str(v) => quote_string(v),
        },
        Expression::Reference(r) => r.ident.clone(),
        Expression::Unary(u) => format!("({}{})", u.op, expr(&u.operand)),
        Expression::Binary(b) => {
            format!("({} {} {})", expr(&b.left), b.op, expr(&b.right))
        }
        Expression::Cast(c) => format!("(({}) {})", c.target, expr(&c.operand)),
        Expression::Call(c) => {
            let args: Vec<String> = c.arguments.iter().map(expr).collect();
            format!("{}({})", c.callee.ident, args.join(", "))
        }
        // Parenthesized so an assignment nested through parentheses keeps
        // its shape on re-parse
        Expression::Assignment(a) => format!("({} = {})", a.lvalue.ident, expr(&a.rvalue)),
    }
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
