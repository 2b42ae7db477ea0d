//! Segmentation of tokenized lines into data and text statements

use tracing::trace;

use crate::error::{AssemblerError, Result};
use crate::lexer::{Line, Token};

/// Directives accepted in the data segment
pub const DATA_DIRECTIVES: &[&str] = &["asciiz", "ascii", "word", "half", "byte", "space"];

/// One line of a segment, with its optional label split off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub label: Option<String>,
    /// Remaining tokens; empty for a label-only line
    pub body: Vec<Token>,
}

/// Statements bucketed by segment, each in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub data: Vec<Statement>,
    pub text: Vec<Statement>,
}

#[derive(Clone, Copy)]
enum Segment {
    Data,
    Text,
}

/// Bucket lines by the most recent `.data` / `.text` directive
pub fn segment(lines: Vec<Line>) -> Result<Segments> {
    let has_segment = lines.iter().any(|l| {
        matches!(l.tokens.first(), Some(Token::Directive(d)) if d == "data" || d == "text")
    });
    if !has_segment {
        return Err(AssemblerError::NoSegments);
    }

    let mut segments = Segments::default();
    let mut current: Option<Segment> = None;

    for Line { number, tokens } in lines {
        let mut tokens = tokens.into_iter().peekable();

        if let Some(Token::Directive(d)) = tokens.peek().cloned() {
            match d.as_str() {
                "data" | "text" => {
                    current = Some(if d == "data" { Segment::Data } else { Segment::Text });
                    tokens.next();
                    if let Some(extra) = tokens.next() {
                        return Err(AssemblerError::UnexpectedToken {
                            line: number,
                            token: extra.text(),
                        });
                    }
                    continue;
                }
                "globl" | "global" => {
                    trace!(line = number, "ignoring symbol export");
                    continue;
                }
                other if !DATA_DIRECTIVES.contains(&other) => {
                    return Err(AssemblerError::UnknownDirective {
                        line: number,
                        directive: other.to_string(),
                    });
                }
                _ => {}
            }
        }

        let label = match tokens.next_if(|t| matches!(t, Token::Label(_))) {
            Some(Token::Label(l)) => Some(l),
            _ => None,
        };
        let statement = Statement {
            line: number,
            label,
            body: tokens.collect(),
        };

        match current {
            Some(Segment::Data) => segments.data.push(statement),
            Some(Segment::Text) => segments.text.push(statement),
            None => return Err(AssemblerError::OutsideSegment { line: number }),
        }
    }

    Ok(segments)
}
