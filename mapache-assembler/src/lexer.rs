//! # Lexer for MapacheSIM Assembly
//!
//! Source is tokenized one line at a time so that every token keeps its line
//! number. Commas and parentheses separate operands exactly like whitespace,
//! which lets `lw $t0, 4($sp)` and `lw $t0 4 $sp` mean the same thing. A `#`
//! starts a comment unless it is inside a string.

use logos::Logos;

use crate::error::{AssemblerError, Result};

/// Tokens of one assembly line
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f,()]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    /// Directive (`.data`, `.word`), without the dot
    #[regex(r"\.[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice()[1..].to_string(), priority = 10)]
    Directive(String),

    /// Label definition (`loop:`), without the colon
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*:", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].to_string()
    }, priority = 10)]
    Label(String),

    /// Double-quoted string, still escaped, without the quotes
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    /// Anything else: mnemonics, registers, numbers, label references
    #[regex(r#"[^ \t\r\f\n,()#":]+"#, |lex| lex.slice().to_string())]
    Word(String),
}

impl Token {
    /// Source-like rendering, used in error messages
    pub fn text(&self) -> String {
        match self {
            Token::Directive(d) => format!(".{d}"),
            Token::Label(l) => format!("{l}:"),
            Token::Str(s) => format!("\"{s}\""),
            Token::Word(w) => w.clone(),
        }
    }
}

/// The tokens of one non-empty source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based line number
    pub number: usize,
    pub tokens: Vec<Token>,
}

/// Tokenize a single line
pub fn tokenize_line(text: &str, number: usize) -> Result<Vec<Token>> {
    let mut lexer = Token::lexer(text);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(AssemblerError::Lex {
                    line: number,
                    text: lexer.slice().to_string(),
                })
            }
        }
    }
    Ok(tokens)
}

/// Tokenize a whole program, dropping blank and comment-only lines
pub fn tokenize(source: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    for (i, text) in source.lines().enumerate() {
        let tokens = tokenize_line(text, i + 1)?;
        if !tokens.is_empty() {
            lines.push(Line {
                number: i + 1,
                tokens,
            });
        }
    }
    Ok(lines)
}
