//! Assembler errors
//!
//! Every variant except [`AssemblerError::NoSegments`] carries the 1-based
//! source line it was raised on.

use mapache_spec::BitsError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("line {line}: cannot tokenize \"{text}\"")]
    Lex { line: usize, text: String },

    #[error("no .data or .text segment found")]
    NoSegments,

    #[error("line {line}: statement outside of any segment")]
    OutsideSegment { line: usize },

    #[error("line {line}: unknown directive \".{directive}\"")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: unexpected \"{token}\"")]
    UnexpectedToken { line: usize, token: String },

    #[error("line {line}: unknown instruction \"{mnemonic}\"")]
    UnknownInstruction { line: usize, mnemonic: String },

    #[error("line {line}: \"{mnemonic}\" takes {expected} operands, found {found}")]
    OperandCount {
        line: usize,
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unknown register \"{name}\"")]
    InvalidRegister { line: usize, name: String },

    #[error("line {line}: invalid immediate \"{text}\"")]
    InvalidImmediate { line: usize, text: String },

    #[error("line {line}: undefined label \"{label}\"")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: duplicate label \"{label}\"")]
    DuplicateLabel { line: usize, label: String },

    #[error("line {line}: register number {value} does not fit in {width} bits")]
    RegisterOverflow { line: usize, value: i64, width: u32 },

    #[error("line {line}: immediate {value} does not fit in {width} bits")]
    ImmediateOverflow { line: usize, value: i64, width: u32 },

    #[error("line {line}: address {value:#x} does not fit in {width} bits")]
    AddressOverflow { line: usize, value: i64, width: u32 },

    #[error("line {line}: invalid data: {message}")]
    InvalidData { line: usize, message: String },

    #[error("line {line}: {value} out of range for .{directive}")]
    DataOverflow {
        line: usize,
        value: i64,
        directive: String,
    },

    #[error("line {line}: \"{name}\" expanded to {second} instructions, previously {first}")]
    UnstableExpansion {
        line: usize,
        name: String,
        first: usize,
        second: usize,
    },

    #[error("line {line}: cannot expand \"{name}\": {source}")]
    Expansion {
        line: usize,
        name: String,
        source: BitsError,
    },
}

impl AssemblerError {
    /// Source line of the error, if it has one
    pub fn line(&self) -> Option<usize> {
        use AssemblerError::*;
        match self {
            NoSegments => None,
            Lex { line, .. }
            | OutsideSegment { line }
            | UnknownDirective { line, .. }
            | UnexpectedToken { line, .. }
            | UnknownInstruction { line, .. }
            | OperandCount { line, .. }
            | InvalidRegister { line, .. }
            | InvalidImmediate { line, .. }
            | UndefinedLabel { line, .. }
            | DuplicateLabel { line, .. }
            | RegisterOverflow { line, .. }
            | ImmediateOverflow { line, .. }
            | AddressOverflow { line, .. }
            | InvalidData { line, .. }
            | DataOverflow { line, .. }
            | UnstableExpansion { line, .. }
            | Expansion { line, .. } => Some(*line),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
