//! # Machine Configuration
//!
//! Instruction size, byte order, and the memory layout an ISA runs in.

use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

/// Size of one memory page in bytes
pub const PAGE_SIZE: u64 = 4096;

/// Byte order of instructions and multi-byte memory accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Assemble up to eight bytes into an integer
    pub fn read(self, bytes: &[u8]) -> u64 {
        debug_assert!(bytes.len() <= 8);
        match self {
            Endian::Big => bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64),
            Endian::Little => bytes.iter().rev().fold(0, |acc, &b| (acc << 8) | b as u64),
        }
    }

    /// Lowest `size` bytes of `value` in this byte order
    pub fn write(self, value: u64, size: usize) -> Vec<u8> {
        debug_assert!(size <= 8);
        let le = value.to_le_bytes();
        match self {
            Endian::Little => le[..size].to_vec(),
            Endian::Big => le[..size].iter().rev().copied().collect(),
        }
    }
}

/// Where code, data, and stack live
///
/// The main region `[text_base, text_base + main_size)` holds code and global
/// data; the stack region `[stack_base, stack_base + stack_size)` grows down
/// from its top. A `stack_size` of zero means the machine has no stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLayout {
    pub text_base: u64,
    pub data_base: u64,
    pub main_size: u64,
    pub stack_base: u64,
    pub stack_size: u64,
}

impl MemoryLayout {
    pub const DEFAULT: Self = Self {
        text_base: 0x10000,
        data_base: 0x40000,
        main_size: 2 * 1024 * 1024,
        stack_base: 0x7fe0_0000,
        stack_size: 2 * 1024 * 1024,
    };

    /// One past the last byte of the main region
    #[inline]
    pub fn main_end(&self) -> u64 {
        self.text_base + self.main_size
    }

    /// One past the last byte of the stack region
    #[inline]
    pub fn stack_top(&self) -> u64 {
        self.stack_base + self.stack_size
    }

    pub fn has_stack(&self) -> bool {
        self.stack_size > 0
    }

    /// Check page alignment, containment and disjointness of the regions
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let aligned = |v: u64| v % PAGE_SIZE == 0;

        if !aligned(self.text_base) || !aligned(self.main_size) || self.main_size == 0 {
            return Err(DefinitionError::Layout(format!(
                "main region {:#x}+{:#x} is not a non-empty run of pages",
                self.text_base, self.main_size
            )));
        }
        if self.text_base.checked_add(self.main_size).is_none() {
            return Err(DefinitionError::Layout("main region wraps around".to_string()));
        }
        if self.data_base < self.text_base || self.data_base >= self.main_end() {
            return Err(DefinitionError::Layout(format!(
                "data base {:#x} outside main region [{:#x}, {:#x})",
                self.data_base,
                self.text_base,
                self.main_end()
            )));
        }

        if self.has_stack() {
            if !aligned(self.stack_base) || !aligned(self.stack_size) {
                return Err(DefinitionError::Layout(format!(
                    "stack region {:#x}+{:#x} is not page aligned",
                    self.stack_base, self.stack_size
                )));
            }
            if self.stack_base.checked_add(self.stack_size).is_none() {
                return Err(DefinitionError::Layout("stack region wraps around".to_string()));
            }
            if self.stack_base < self.main_end() && self.text_base < self.stack_top() {
                return Err(DefinitionError::Layout(
                    "stack and main regions overlap".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything about an ISA that is not an instruction or a register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsaConfig {
    /// Instruction size in bytes
    pub isize: usize,
    pub endian: Endian,
    pub layout: MemoryLayout,
}

impl IsaConfig {
    pub fn new(isize: usize, endian: Endian) -> Self {
        Self {
            isize,
            endian,
            layout: MemoryLayout::DEFAULT,
        }
    }

    pub fn with_layout(mut self, layout: MemoryLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Instruction width in bits
    #[inline]
    pub fn width_bits(&self) -> usize {
        self.isize * 8
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.isize == 0 || self.isize > 8 || !self.isize.is_power_of_two() {
            return Err(DefinitionError::UnsupportedWidth(self.isize * 8));
        }
        self.layout.validate()
    }
}
