//! Parser for the Javalette language.
//!
//! A recursive descent parser over the pre-tokenized input. Unlike semantic
//! analysis, parsing is all-or-nothing: the first syntax error aborts with a
//! fatal diagnostic. `else` binds to the nearest `if`.

pub mod expr;
pub mod stmt;

use crate::ast::{Block, Function, FunctionType, Program, Statement, Type, Variable};
use crate::diag::{Diagnostic, DiagnosticKind};
use crate::lexer::Lexer;
use crate::token::{Span, Token};

/// Parser state.
pub struct Parser {
    /// Pre-tokenized input, terminated by [`Token::Eof`]
    tokens: Vec<(Token, Span)>,
    /// Current position in the token stream
    pos: usize,
    /// Warnings collected by the lexer, handed back from [`Parser::parse`]
    warnings: Vec<Diagnostic>,
}

impl Parser {
    /// Create a parser from source code. Fails on the first lexer fault.
    pub fn new(source: &str) -> Result<Self, Diagnostic> {
        let (tokens, warnings) = Lexer::new(source).tokenize()?;
        Ok(Parser {
            tokens,
            pos: 0,
            warnings,
        })
    }

    /// Parse a whole program: a sequence of function definitions.
    ///
    /// Returns the tree and the lexer warnings, or the first fatal fault.
    pub fn parse(mut self) -> Result<(Program, Vec<Diagnostic>), Diagnostic> {
        let mut functions = Vec::new();
        while !self.at_eof() {
            functions.push(self.parse_function()?);
        }
        let program = Program {
            functions,
            filename: None,
        };
        Ok((program, self.warnings))
    }

    // ========================================================================
    // Token management
    // ========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].1
    }

    fn peek(&self) -> &Token {
        let next = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[next].0
    }

    fn at_eof(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn advance(&mut self) -> (Token, Span) {
        let item = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        item
    }

    /// Consume the expected token or fail with a syntax error.
    fn expect(&mut self, expected: &Token) -> Result<Span, Diagnostic> {
        if self.current() == expected {
            Ok(self.advance().1)
        } else {
            Err(self.syntax_error())
        }
    }

    /// Consume an identifier or fail.
    fn expect_ident(&mut self) -> Result<(String, Span), Diagnostic> {
        match self.current() {
            Token::Identifier(_) => {
                let (token, span) = self.advance();
                match token {
                    Token::Identifier(name) => Ok((name, span)),
                    _ => unreachable!(),
                }
            }
            _ => Err(self.syntax_error()),
        }
    }

    /// Consume a type keyword or fail.
    fn expect_type(&mut self) -> Result<(Type, Span), Diagnostic> {
        match self.current() {
            Token::Type(keyword) => {
                let ty = Type::from(*keyword);
                let span = self.advance().1;
                Ok((ty, span))
            }
            _ => Err(self.syntax_error()),
        }
    }

    /// The fatal diagnostic for an unexpected token at the current position.
    fn syntax_error(&self) -> Diagnostic {
        match self.current() {
            Token::Eof => Diagnostic::error(
                DiagnosticKind::Parse,
                None,
                "Syntax error at the end of file",
            ),
            token => Diagnostic::error(
                DiagnosticKind::Parse,
                Some(self.current_span()),
                format!("Syntax error near {}", token_repr(token)),
            ),
        }
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// `fun_def : type IDENT ( arg_list ) complex_i`
    fn parse_function(&mut self) -> Result<Function, Diagnostic> {
        let (return_type, _) = self.expect_type()?;
        let (name, name_span) = self.expect_ident()?;
        self.expect(&Token::LeftParen)?;
        let params = self.parse_params()?;
        self.expect(&Token::RightParen)?;
        if !matches!(self.current(), Token::LeftBrace) {
            return Err(self.syntax_error());
        }
        let body = self.parse_block()?;
        let arg_types = params.iter().map(|p| p.ty.clone()).collect();
        let ty = FunctionType::new(return_type, arg_types);
        Ok(Function::new(name, ty, params, body, name_span))
    }

    fn parse_params(&mut self) -> Result<Vec<Variable>, Diagnostic> {
        let mut params = Vec::new();
        if matches!(self.current(), Token::RightParen) {
            return Ok(params);
        }
        loop {
            let (ty, _) = self.expect_type()?;
            let (name, span) = self.expect_ident()?;
            params.push(Variable {
                name,
                ty,
                init: None,
                id: None,
                span,
            });
            if !matches!(self.current(), Token::Comma) {
                break;
            }
            self.advance();
        }
        Ok(params)
    }

    /// Wrap a statement into a block, flattening nothing: a brace statement
    /// is already a block, anything else becomes a one-statement block.
    fn into_block(statement: Statement) -> Block {
        match statement {
            Statement::Block(block) => block,
            other => Block::new(vec![other]),
        }
    }
}

/// Render a token the way syntax errors quote it: literals bare, everything
/// else in quotes.
fn token_repr(token: &Token) -> String {
    match token {
        Token::IntLiteral(value) => value.to_string(),
        Token::DoubleLiteral(value) => format!("{value:?}"),
        _ => format!("'{token}'"),
    }
}
