//! # ISA Description
//!
//! What the assembler, the disassembler and the runtime need to know about an
//! instruction set, independent of how its instructions execute.

use crate::config::IsaConfig;
use crate::register::RegisterBank;
use crate::registry::{PatternRegistry, PseudoTable};

/// Declarative view of an instruction set
pub trait IsaDescription {
    /// Short identifier, e.g. `"mips"`
    fn name(&self) -> &str;

    fn config(&self) -> &IsaConfig;

    /// Validated real instructions
    fn registry(&self) -> &PatternRegistry;

    /// Pseudo-instructions, expanded by the assembler
    fn pseudo(&self) -> &PseudoTable;

    /// Prototype register bank with reset values applied
    fn registers(&self) -> &RegisterBank;

    /// Instruction size in bytes
    fn isize(&self) -> usize {
        self.config().isize
    }
}
