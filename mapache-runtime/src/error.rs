//! Runtime error types for MapacheSIM

use mapache_disassembler::DisassemblerError;
use mapache_spec::{BitsError, DefinitionError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("segmentation fault: address {address:#x} is not mapped")]
    Unmapped { address: u64 },

    #[error("access of {size} bytes at {address:#x} crosses a page boundary")]
    CrossPage { address: u64, size: usize },

    #[error("empty memory access at {address:#x}")]
    EmptyAccess { address: u64 },

    #[error("cannot map {size:#x} bytes at {start:#x}: {reason}")]
    BadMapping {
        start: u64,
        size: u64,
        reason: &'static str,
    },

    #[error("page at {address:#x} is already mapped")]
    AlreadyMapped { address: u64 },

    #[error("unaligned jump to {target:#x}")]
    UnalignedJump { target: u64 },

    #[error("unaligned {size}-byte access at {address:#x}")]
    UnalignedAccess { address: u64, size: usize },

    #[error("{instruction}: {reason}")]
    InvalidOperands {
        instruction: &'static str,
        reason: &'static str,
    },

    #[error("breakpoint address {address:#x} is not aligned to {alignment} bytes")]
    UnalignedBreakpoint { address: u64, alignment: usize },

    #[error("register {file}[{index}] does not exist")]
    InvalidRegister { file: String, index: usize },

    #[error("invalid system call service {service}")]
    InvalidSyscall { service: u64 },

    #[error("invalid integer read during system call: {input:?}")]
    MalformedInput { input: String },

    #[error("end of input during system call")]
    InputExhausted,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("encroaching on memory reserved for IFT at {address:#x}")]
    ReservedIft { address: u64 },

    #[error("address {address:#x} is not tracked by IFT")]
    UntrackedAddress { address: u64 },

    #[error("taint {taint:#x} does not fit in a {width}-bit field")]
    TaintWidth { taint: u64, width: u32 },

    #[error("decode error: {0}")]
    Decode(#[from] DisassemblerError),

    #[error("internal error: {0}")]
    Bits(#[from] BitsError),

    #[error("machine definition error: {0}")]
    Definition(#[from] DefinitionError),
}

impl RuntimeError {
    /// Whether this is a simulator or ISA bug rather than a program fault
    pub fn is_internal(&self) -> bool {
        match self {
            RuntimeError::Bits(e) => e.is_internal(),
            RuntimeError::Definition(_) | RuntimeError::TaintWidth { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(e: std::io::Error) -> Self {
        RuntimeError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
