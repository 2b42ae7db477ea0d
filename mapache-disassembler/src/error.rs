//! Disassembler errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisassemblerError {
    #[error("{found} bytes given but instructions are {expected} bytes wide")]
    WrongWidth { expected: usize, found: usize },

    #[error("undecodable instruction: {}", hex(.bytes))]
    Undecodable { bytes: Vec<u8> },
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub type Result<T> = std::result::Result<T, DisassemblerError>;
