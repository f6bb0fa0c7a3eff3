//! Expression parsing.
//!
//! Precedence ladder, loosest first:
//! `assignment | or > and > equality > relational > additive >
//! multiplicative > unary/cast > call > primary`.
//!
//! Assignments (including the `++`/`--` sugar) are only legal at the top of
//! an expression or inside parentheses, never as bare operands.

use super::Parser;
use crate::ast::{
    Assignment, BinOp, Binary, Call, Cast, Const, ConstValue, Expression, Reference, Type, UnOp,
    Unary,
};
use crate::diag::Diagnostic;
use crate::token::Token;

impl Parser {
    /// `expr : assign_e | or_e`
    pub(super) fn parse_expression(&mut self) -> Result<Expression, Diagnostic> {
        if matches!(self.current(), Token::Identifier(_)) && self.peek().is_assign_follow() {
            self.parse_assignment_tail()
        } else {
            self.parse_or()
        }
    }

    /// `assign_e : IDENT = expr | IDENT ++ | IDENT --`
    ///
    /// `x++` and `x--` desugar to `x = x + 1` and `x = x - 1` with an int
    /// literal `1` positioned at the operator.
    pub(super) fn parse_assignment_tail(&mut self) -> Result<Expression, Diagnostic> {
        let (name, name_span) = self.expect_ident()?;
        let lvalue = Reference::new(name.clone(), name_span);
        let (token, op_span) = self.advance();
        let rvalue = match token {
            Token::Assign => self.parse_expression()?,
            Token::PlusPlus | Token::MinusMinus => {
                let op = if token == Token::PlusPlus {
                    BinOp::Add
                } else {
                    BinOp::Sub
                };
                let one = Expression::Const(Const {
                    value: ConstValue::Int(1),
                    ty: Type::Int,
                    span: op_span,
                });
                Expression::Binary(Binary {
                    op,
                    left: Box::new(Expression::Reference(Reference::new(name, name_span))),
                    right: Box::new(one),
                    ty: None,
                    span: op_span,
                })
            }
            _ => unreachable!("guarded by is_assign_follow"),
        };
        Ok(Expression::Assignment(Assignment {
            lvalue,
            rvalue: Box::new(rvalue),
            ty: None,
            span: op_span,
        }))
    }

    /// `or_e : or_e || and_e | and_e`
    fn parse_or(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.parse_and()?;
        while matches!(self.current(), Token::PipePipe) {
            let span = self.advance().1;
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right, span);
        }
        Ok(left)
    }

    /// `and_e : and_e && compare_e | compare_e`
    fn parse_and(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.parse_equality()?;
        while matches!(self.current(), Token::AmpAmp) {
            let span = self.advance().1;
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right, span);
        }
        Ok(left)
    }

    /// `compare_e : compare_e (== | !=) rel_e | rel_e`
    fn parse_equality(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.current() {
                Token::EqualEqual => BinOp::Eq,
                Token::BangEqual => BinOp::Ne,
                _ => break,
            };
            let span = self.advance().1;
            let right = self.parse_relational()?;
            left = binary(op, left, right, span);
        }
        Ok(left)
    }

    /// `rel_e : rel_e (< | <= | > | >=) add_e | add_e`
    fn parse_relational(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current() {
                Token::Less => BinOp::Lt,
                Token::LessEqual => BinOp::Le,
                Token::Greater => BinOp::Gt,
                Token::GreaterEqual => BinOp::Ge,
                _ => break,
            };
            let span = self.advance().1;
            let right = self.parse_additive()?;
            left = binary(op, left, right, span);
        }
        Ok(left)
    }

    /// `add_e : add_e (+ | -) mul_e | mul_e`
    fn parse_additive(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            let span = self.advance().1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right, span);
        }
        Ok(left)
    }

    /// `mul_e : mul_e (* | / | %) sa_e | sa_e`
    fn parse_multiplicative(&mut self) -> Result<Expression, Diagnostic> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            let span = self.advance().1;
            let right = self.parse_unary()?;
            left = binary(op, left, right, span);
        }
        Ok(left)
    }

    /// `sa_e : (! | + | -) sa_e | ( type ) sa_e | prefix_e`
    fn parse_unary(&mut self) -> Result<Expression, Diagnostic> {
        let op = match self.current() {
            Token::Bang => Some(UnOp::Not),
            Token::Plus => Some(UnOp::Plus),
            Token::Minus => Some(UnOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let span = self.advance().1;
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary(Unary {
                op,
                operand: Box::new(operand),
                ty: None,
                span,
            }));
        }
        // A parenthesis followed by a type keyword is a cast
        if matches!(self.current(), Token::LeftParen) && matches!(self.peek(), Token::Type(_)) {
            let span = self.advance().1;
            let (target, _) = self.expect_type()?;
            self.expect(&Token::RightParen)?;
            let operand = self.parse_unary()?;
            return Ok(Expression::Cast(Cast {
                target,
                operand: Box::new(operand),
                ty: None,
                span,
            }));
        }
        self.parse_call()
    }

    /// `prefix_e : IDENT ( expr_list? ) | simple_e`
    fn parse_call(&mut self) -> Result<Expression, Diagnostic> {
        if matches!(self.current(), Token::Identifier(_))
            && matches!(self.peek(), Token::LeftParen)
        {
            let (name, span) = self.expect_ident()?;
            self.expect(&Token::LeftParen)?;
            let mut arguments = Vec::new();
            if !matches!(self.current(), Token::RightParen) {
                loop {
                    arguments.push(self.parse_expression()?);
                    if !matches!(self.current(), Token::Comma) {
                        break;
                    }
                    self.advance();
                }
            }
            self.expect(&Token::RightParen)?;
            return Ok(Expression::Call(Call {
                callee: Reference::new(name, span),
                arguments,
                ty: None,
                span,
            }));
        }
        self.parse_primary()
    }

    /// `simple_e : IDENT | const | ( expr )`
    fn parse_primary(&mut self) -> Result<Expression, Diagnostic> {
        match self.current().clone() {
            Token::Identifier(name) => {
                let span = self.advance().1;
                Ok(Expression::Reference(Reference::new(name, span)))
            }
            Token::IntLiteral(value) => {
                let span = self.advance().1;
                Ok(constant(ConstValue::Int(value), Type::Int, span))
            }
            Token::DoubleLiteral(value) => {
                let span = self.advance().1;
                Ok(constant(ConstValue::Double(value), Type::Double, span))
            }
            Token::BoolLiteral(value) => {
                let span = self.advance().1;
                Ok(constant(ConstValue::Bool(value), Type::Boolean, span))
            }
            Token::StringLiteral(value) => {
                let span = self.advance().1;
                Ok(constant(ConstValue::Str(value), Type::String, span))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(inner)
            }
            _ => Err(self.syntax_error()),
        }
    }
}

fn binary(op: BinOp, left: Expression, right: Expression, span: crate::token::Span) -> Expression {
    Expression::Binary(Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        ty: None,
        span,
    })
}

fn constant(value: ConstValue, ty: Type, span: crate::token::Span) -> Expression {
    Expression::Const(Const { value, ty, span })
}
