//! Statement parsing.

use super::Parser;
use crate::ast::{
    Block, Declaration, Evaluation, Expression, IfThenElse, ReturnStatement, Statement, Variable,
    WhileLoop,
};
use crate::diag::Diagnostic;
use crate::token::Token;

impl Parser {
    /// `instr : complex_i | decl_i | cond_i | loop_i | return_i | expr_i`
    pub(super) fn parse_statement(&mut self) -> Result<Statement, Diagnostic> {
        match self.current() {
            Token::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            Token::Type(_) => self.parse_declaration(),
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Return => self.parse_return(),
            _ => {
                let expression = self.parse_expression()?;
                self.expect(&Token::Semicolon)?;
                let span = expression.span();
                Ok(Statement::Evaluation(Evaluation { expression, span }))
            }
        }
    }

    /// `complex_i : { instr* }`
    pub(super) fn parse_block(&mut self) -> Result<Block, Diagnostic> {
        self.expect(&Token::LeftBrace)?;
        let mut statements = Vec::new();
        while !matches!(self.current(), Token::RightBrace) {
            if self.at_eof() {
                return Err(self.syntax_error());
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(&Token::RightBrace)?;
        Ok(Block::new(statements))
    }

    /// `decl_i : type decl (, decl)* ;` where `decl : IDENT [= expr]`
    fn parse_declaration(&mut self) -> Result<Statement, Diagnostic> {
        let (ty, _) = self.expect_type()?;
        let mut variables = Vec::new();
        loop {
            let (name, span) = self.expect_ident()?;
            let init = if matches!(self.current(), Token::Assign) {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };
            variables.push(Variable {
                name,
                ty: ty.clone(),
                init,
                id: None,
                span,
            });
            if !matches!(self.current(), Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&Token::Semicolon)?;
        let span = variables[0].span;
        Ok(Statement::Declaration(Declaration { variables, span }))
    }

    /// `cond_i : IF ( expr ) instr [ELSE instr]`
    fn parse_if(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.expect(&Token::If)?;
        self.expect(&Token::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&Token::RightParen)?;
        let then_branch = Self::into_block(self.parse_statement()?);
        let else_branch = if matches!(self.current(), Token::Else) {
            self.advance();
            Self::into_block(self.parse_statement()?)
        } else {
            Block::empty()
        };
        Ok(Statement::If(IfThenElse {
            condition,
            then_branch,
            else_branch,
            span,
        }))
    }

    /// `loop_i : WHILE ( expr ) instr`
    fn parse_while(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.expect(&Token::While)?;
        self.expect(&Token::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&Token::RightParen)?;
        let body = Self::into_block(self.parse_statement()?);
        Ok(Statement::While(WhileLoop {
            condition,
            body,
            finally: Block::empty(),
            span,
        }))
    }

    /// `loop_i : FOR ( assign_e ; expr ; assign_e ) instr`
    ///
    /// Desugars to `{ init; while (cond) finally post body }`: the loop node
    /// carries the post-expression as its finally-block, executed after the
    /// body on every iteration.
    fn parse_for(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.expect(&Token::For)?;
        self.expect(&Token::LeftParen)?;
        let init = self.parse_assignment()?;
        self.expect(&Token::Semicolon)?;
        let condition = self.parse_expression()?;
        self.expect(&Token::Semicolon)?;
        let post = self.parse_assignment()?;
        self.expect(&Token::RightParen)?;
        let body = Self::into_block(self.parse_statement()?);

        let init_span = init.span();
        let post_span = post.span();
        let init_stmt = Statement::Evaluation(Evaluation {
            expression: init,
            span: init_span,
        });
        let finally = Block::new(vec![Statement::Evaluation(Evaluation {
            expression: post,
            span: post_span,
        })]);
        let loop_stmt = Statement::While(WhileLoop {
            condition,
            body,
            finally,
            span,
        });
        Ok(Statement::Block(Block::new(vec![init_stmt, loop_stmt])))
    }

    /// `return_i : RETURN [expr] ;`
    fn parse_return(&mut self) -> Result<Statement, Diagnostic> {
        let span = self.expect(&Token::Return)?;
        let value = if matches!(self.current(), Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&Token::Semicolon)?;
        Ok(Statement::Return(ReturnStatement { value, span }))
    }

    /// Parse an expression that must be an assignment (`x = e`, `x++`,
    /// `x--`), as required in `for` headers.
    pub(super) fn parse_assignment(&mut self) -> Result<Expression, Diagnostic> {
        if matches!(self.current(), Token::Identifier(_)) && self.peek().is_assign_follow() {
            self.parse_assignment_tail()
        } else {
            Err(self.syntax_error())
        }
    }
}
