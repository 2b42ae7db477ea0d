//! # Error Types for MapacheSIM ISA descriptions

use thiserror::Error;

/// A malformed ISA description.
///
/// These are raised while an ISA is being constructed and prevent the machine
/// from ever being built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("template for \"{name}\" is {found} bits, not {expected}")]
    TemplateWidth {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("template for \"{name}\" contains invalid character '{ch}'")]
    TemplateCharacter { name: String, ch: char },

    #[error("instruction width of {0} bits is not supported (1-64)")]
    UnsupportedWidth(usize),

    #[error("patterns \"{first}\" and \"{second}\" overlap")]
    OverlappingPatterns { first: String, second: String },

    #[error("\"{name}\" name and definition \"{mnemonic}\" differ")]
    NameMismatch { name: String, mnemonic: String },

    #[error("instruction \"{0}\" declared more than once")]
    DuplicateName(String),

    #[error("unknown operand specifier \"{operand}\" in \"{format}\"")]
    BadOperand { operand: String, format: String },

    #[error("operand field '{field}' of \"{name}\" does not appear in its template")]
    MissingField { name: String, field: char },

    #[error("empty assembly format for \"{0}\"")]
    EmptyFormat(String),

    #[error("pseudo-instruction \"{0}\" shadows a real instruction")]
    PseudoShadowsInstruction(String),

    #[error("control-flow instruction \"{0}\" is not declared")]
    UnknownControlFlow(String),

    #[error("instruction \"{0}\" has no semantics at its registry position")]
    MissingSemantics(String),

    #[error("register \"{0}\" declared more than once")]
    DuplicateRegister(String),

    #[error("register file \"{file}\" has no register {index}")]
    NoSuchRegister { file: String, index: usize },

    #[error("register width of {0} bits is not supported (1-64)")]
    RegisterWidth(u32),

    #[error("invalid memory layout: {0}")]
    Layout(String),

    #[error("IFT ratio {0} must be a power of two dividing 32")]
    IftRatio(u32),
}

/// Failures of the bitfield codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitsError {
    #[error("value {value} does not fit in {width} {kind} bits")]
    Overflow {
        value: i64,
        width: u32,
        kind: &'static str,
    },

    #[error("bit range [{upper}:{lower}] is invalid")]
    BadRange { upper: u32, lower: u32 },

    #[error("upper bits of {value:#x} not zero when sign extending from {bits} bits")]
    SignExtend { value: u64, bits: u32 },

    #[error("{0} is not a positive power of two")]
    NotPowerOfTwo(u64),
}

impl BitsError {
    /// Whether this indicates a bug in the caller rather than bad input
    pub fn is_internal(&self) -> bool {
        !matches!(self, BitsError::Overflow { .. })
    }
}

/// Failures reading or writing a serialized [`crate::Program`].
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("invalid program magic: expected {expected:#010x}, got {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },

    #[error("invalid program version: expected {expected}, found {found}")]
    InvalidVersion { expected: u32, found: u32 },

    #[error("program image truncated ({0} bytes)")]
    Truncated(usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}
