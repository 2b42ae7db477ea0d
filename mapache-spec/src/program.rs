//! # Assembled Program Image
//!
//! The output of the assembler: text and data bytes with their load
//! addresses and the label table. Images can be written to disk and loaded
//! back; the binary form is a fixed header followed by a bincode body.
//!
//! ```text
//! Offset  Size  Field
//! ──────────────────────────────────
//! 0x00    4     magic ("MAPA", little-endian)
//! 0x04    4     version
//! 0x08    ..    bincode(Program)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProgramError;

/// Magic number for program images: "MAPA"
pub const MAGIC: u32 = 0x4150_414D;

/// Image format version
pub const VERSION: u32 = 1;

const HEADER_SIZE: usize = 8;

/// An assembled program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub text_base: u64,
    pub data_base: u64,
    pub text: Vec<u8>,
    pub data: Vec<u8>,
    /// Label name to address
    pub labels: BTreeMap<String, u64>,
}

impl Program {
    pub fn new(text_base: u64, data_base: u64) -> Self {
        Self {
            text_base,
            data_base,
            ..Self::default()
        }
    }

    pub fn label(&self, name: &str) -> Option<u64> {
        self.labels.get(name).copied()
    }

    /// Address one past the last text byte
    pub fn text_end(&self) -> u64 {
        self.text_base + self.text.len() as u64
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProgramError> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.text.len() + self.data.len());
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bincode::serialize_into(&mut bytes, self)?;
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProgramError::Truncated(bytes.len()));
        }
        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        let magic = word(0);
        if magic != MAGIC {
            return Err(ProgramError::InvalidMagic {
                expected: MAGIC,
                found: magic,
            });
        }
        let version = word(4);
        if version != VERSION {
            return Err(ProgramError::InvalidVersion {
                expected: VERSION,
                found: version,
            });
        }

        Ok(bincode::deserialize(&bytes[HEADER_SIZE..])?)
    }

    /// Whether `bytes` starts with the image magic
    pub fn is_image(bytes: &[u8]) -> bool {
        bytes.len() >= 4 && bytes[..4] == MAGIC.to_le_bytes()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "text @ {:#x}: {} bytes", self.text_base, self.text.len())?;
        writeln!(f, "data @ {:#x}: {} bytes", self.data_base, self.data.len())?;
        for (name, addr) in &self.labels {
            writeln!(f, "  {name:<16} {addr:#010x}")?;
        }
        Ok(())
    }
}
