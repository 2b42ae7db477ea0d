//! # MapacheSIM ISA Model
//!
//! Declarative description of an instruction set, shared by the assembler,
//! the disassembler and the runtime.
//!
//! ## Key Features
//! - Bit templates (`001000 sssss ttttt iiiiiiiiiiiiiiii`) compiled to mask/match pairs
//! - Pattern registry validated at construction (widths, overlaps, operand formats)
//! - Register files with alias tables and width masking
//! - Configurable instruction size, byte order and memory layout
//! - Serializable program images

pub mod bits;
pub mod config;
pub mod error;
pub mod fields;
pub mod isa;
pub mod program;
pub mod register;
pub mod registry;
pub mod template;

pub use bits::{Bits, Signedness};
pub use config::{Endian, IsaConfig, MemoryLayout, PAGE_SIZE};
pub use error::{BitsError, DefinitionError, ProgramError};
pub use fields::Fields;
pub use isa::IsaDescription;
pub use program::Program;
pub use register::{FileId, RegId, RegisterBank};
pub use registry::{InstructionDef, PatternRegistry, Pseudo, PseudoDef, PseudoTable};
pub use template::{AsmFormat, InstructionPattern, Operand, OperandKind, Template, TemplateBit};
