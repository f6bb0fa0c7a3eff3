//! Lexer for the Javalette language.
//!
//! Tokenization is driven by a [`logos`] derive enum and converted into the
//! public `(Token, Span)` stream with 1-based line/column information.
//! Unknown string escapes produce warnings; every other fault (unterminated
//! string, unterminated block comment, illegal character, out-of-range int
//! literal) is fatal and aborts the compilation.

use crate::diag::{Diagnostic, DiagnosticKind};
use crate::token::{Span, Token, TypeKeyword};
use logos::Logos;

/// Logos-based token enum for lexing.
///
/// Payload extraction happens during conversion so faults can be reported
/// with accurate positions.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    // Whitespace and line comments (skip)
    #[regex(r"[ \t\r\n\x0b\x0c]+", logos::skip)]
    Whitespace,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"#[^\n]*", logos::skip)]
    HashComment,

    // A complete block comment; the bare opener below only matches when no
    // terminator exists
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    #[token("/*")]
    UnterminatedComment,

    // Keywords (must come before identifiers)
    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("while")]
    While,

    #[token("for")]
    For,

    #[token("return")]
    Return,

    #[token("int")]
    TypeInt,

    #[token("double")]
    TypeDouble,

    #[token("boolean")]
    TypeBoolean,

    #[token("void")]
    TypeVoid,

    #[token("true")]
    True,

    #[token("false")]
    False,

    // Identifiers (no leading underscore in Javalette)
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*")]
    Identifier,

    // Numbers
    #[regex(r"[0-9]+")]
    IntLiteral,

    #[regex(r"([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    DoubleLiteral,

    // Strings; escapes may cover any character, newlines included
    #[regex(r#""([^"\\]|\\[\s\S])*""#)]
    StringLiteral,

    // Operators (2-char before 1-char)
    #[token("++")]
    PlusPlus,

    #[token("--")]
    MinusMinus,

    #[token("||")]
    PipePipe,

    #[token("&&")]
    AmpAmp,

    #[token("==")]
    EqualEqual,

    #[token("!=")]
    BangEqual,

    #[token("<=")]
    LessEqual,

    #[token(">=")]
    GreaterEqual,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    #[token("=")]
    Assign,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("!")]
    Bang,

    // Punctuation
    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,
}

/// Main lexer structure.
pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over a source buffer.
    pub fn new(source: &'a str) -> Self {
        Lexer { source }
    }

    /// Tokenize the whole input.
    ///
    /// Returns the token stream (terminated by [`Token::Eof`]) together with
    /// any warnings, or the first fatal fault.
    pub fn tokenize(self) -> Result<(Vec<(Token, Span)>, Vec<Diagnostic>), Diagnostic> {
        let mut tokens = Vec::new();
        let mut warnings = Vec::new();
        let mut logos_lexer = RawToken::lexer(self.source);
        let mut line = 1u32;
        let mut column = 1u32;
        let mut last_end = 0usize;

        while let Some(token_result) = logos_lexer.next() {
            let range = logos_lexer.span();

            // Account for skipped text (whitespace, comments) before the token
            for c in self.source[last_end..range.start].chars() {
                if c == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }

            let span = Span::new(range.start, range.end, line, column);
            let slice = logos_lexer.slice();

            match token_result {
                Ok(RawToken::BlockComment) => {}
                Ok(RawToken::UnterminatedComment) => {
                    return Err(Diagnostic::error(
                        DiagnosticKind::Lex,
                        Some(span),
                        "Error: Unterminated /* ... */ comment",
                    ));
                }
                Ok(raw) => {
                    let token = convert_token(raw, slice, span, &mut warnings)?;
                    tokens.push((token, span));
                }
                Err(()) => {
                    let c = slice.chars().next().unwrap_or('\0');
                    let message = if c == '"' {
                        "Error: Unterminated string".to_string()
                    } else {
                        format!("Illegal character: {c:?}")
                    };
                    return Err(Diagnostic::error(DiagnosticKind::Lex, Some(span), message));
                }
            }

            for c in self.source[range.start..range.end].chars() {
                if c == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }

            last_end = range.end;
        }

        // Trailing skipped text still moves the EOF position
        for c in self.source[last_end..].chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        let eof_span = Span::new(self.source.len(), self.source.len(), line, column);
        tokens.push((Token::Eof, eof_span));

        Ok((tokens, warnings))
    }
}

fn convert_token(
    raw: RawToken,
    slice: &str,
    span: Span,
    warnings: &mut Vec<Diagnostic>,
) -> Result<Token, Diagnostic> {
    let token = match raw {
        RawToken::If => Token::If,
        RawToken::Else => Token::Else,
        RawToken::While => Token::While,
        RawToken::For => Token::For,
        RawToken::Return => Token::Return,
        RawToken::TypeInt => Token::Type(TypeKeyword::Int),
        RawToken::TypeDouble => Token::Type(TypeKeyword::Double),
        RawToken::TypeBoolean => Token::Type(TypeKeyword::Boolean),
        RawToken::TypeVoid => Token::Type(TypeKeyword::Void),
        RawToken::True => Token::BoolLiteral(true),
        RawToken::False => Token::BoolLiteral(false),
        RawToken::Identifier => Token::Identifier(slice.to_string()),
        RawToken::IntLiteral => match slice.parse::<i32>() {
            Ok(value) => Token::IntLiteral(value),
            Err(_) => {
                return Err(Diagnostic::error(
                    DiagnosticKind::Lex,
                    Some(span),
                    format!("Invalid literal for int type: {slice}"),
                ));
            }
        },
        RawToken::DoubleLiteral => match slice.parse::<f64>() {
            Ok(value) => Token::DoubleLiteral(value),
            Err(_) => {
                return Err(Diagnostic::error(
                    DiagnosticKind::Lex,
                    Some(span),
                    format!("Invalid literal for double type: {slice}"),
                ));
            }
        },
        RawToken::StringLiteral => {
            let inner = &slice[1..slice.len() - 1];
            Token::StringLiteral(unescape_string(inner, span, warnings))
        }
        RawToken::PlusPlus => Token::PlusPlus,
        RawToken::MinusMinus => Token::MinusMinus,
        RawToken::PipePipe => Token::PipePipe,
        RawToken::AmpAmp => Token::AmpAmp,
        RawToken::EqualEqual => Token::EqualEqual,
        RawToken::BangEqual => Token::BangEqual,
        RawToken::LessEqual => Token::LessEqual,
        RawToken::GreaterEqual => Token::GreaterEqual,
        RawToken::Less => Token::Less,
        RawToken::Greater => Token::Greater,
        RawToken::Assign => Token::Assign,
        RawToken::Plus => Token::Plus,
        RawToken::Minus => Token::Minus,
        RawToken::Star => Token::Star,
        RawToken::Slash => Token::Slash,
        RawToken::Percent => Token::Percent,
        RawToken::Bang => Token::Bang,
        RawToken::LeftParen => Token::LeftParen,
        RawToken::RightParen => Token::RightParen,
        RawToken::LeftBrace => Token::LeftBrace,
        RawToken::RightBrace => Token::RightBrace,
        RawToken::Comma => Token::Comma,
        RawToken::Semicolon => Token::Semicolon,
        RawToken::Whitespace
        | RawToken::LineComment
        | RawToken::HashComment
        | RawToken::BlockComment
        | RawToken::UnterminatedComment => unreachable!("skipped or handled above"),
    };
    Ok(token)
}

/// Process string escapes.
///
/// `\n` and `\t` are the only recognized escapes; anything else passes the
/// escaped character through and reports a warning, matching the language
/// reference.
fn unescape_string(s: &str, span: Span, warnings: &mut Vec<Diagnostic>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some(other) => {
                    warnings.push(Diagnostic::warning(
                        DiagnosticKind::Lex,
                        Some(span),
                        format!("Warning: Unknown string escape: \\ + {other:?}"),
                    ));
                    result.push(other);
                }
                None => break,
            }
        } else {
            result.push(c);
        }
    }

    result
}
