//! # MapacheSIM Disassembler
//!
//! Decode instruction words against an ISA's pattern registry and render them
//! back into assembly text.
//!
//! ## Example
//!
//! ```ignore
//! use mapache_disassembler::{decode, format};
//!
//! let decoded = decode(isa.registry(), isa.config().endian, &[0x21, 0x08, 0x00, 0x04])?;
//! assert_eq!(format(&isa, &decoded), "addi $t0 $t0 4");
//! ```

pub mod decoder;
pub mod disassembler;
pub mod error;
pub mod formatter;

pub use decoder::{decode, decode_word, DecodedInstruction};
pub use disassembler::disassemble;
pub use error::{DisassemblerError, Result};
pub use formatter::format;
