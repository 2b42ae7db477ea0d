//! Instruction decoder
//!
//! Matches an instruction word against a [`PatternRegistry`] and extracts
//! its fields. Patterns are tried in declaration order and the first match
//! wins; the registry guarantees at most one can match.

use std::fmt;

use mapache_spec::{Endian, Fields, InstructionPattern, PatternRegistry};

use crate::error::{DisassemblerError, Result};

/// A matched instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction<'r> {
    /// Position of the pattern in the registry
    pub index: usize,
    pub pattern: &'r InstructionPattern,
    /// Raw instruction word
    pub word: u64,
    pub fields: Fields,
}

impl DecodedInstruction<'_> {
    pub fn name(&self) -> &str {
        self.pattern.name()
    }
}

impl fmt::Display for DecodedInstruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.fields)
    }
}

/// Decode one instruction from exactly `registry.width_bits() / 8` bytes
pub fn decode<'r>(
    registry: &'r PatternRegistry,
    endian: Endian,
    bytes: &[u8],
) -> Result<DecodedInstruction<'r>> {
    let expected = registry.width_bits().div_ceil(8);
    if bytes.len() != expected {
        return Err(DisassemblerError::WrongWidth {
            expected,
            found: bytes.len(),
        });
    }

    let word = endian.read(bytes);
    decode_word(registry, word).ok_or_else(|| DisassemblerError::Undecodable {
        bytes: bytes.to_vec(),
    })
}

/// Decode an already assembled instruction word
pub fn decode_word(registry: &PatternRegistry, word: u64) -> Option<DecodedInstruction<'_>> {
    let (index, pattern) = registry.find(word)?;
    Some(DecodedInstruction {
        index,
        pattern,
        word,
        fields: pattern.template().extract(word),
    })
}
