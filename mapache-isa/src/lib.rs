//! # MapacheSIM Instruction Sets
//!
//! Concrete ISAs for the simulator:
//!
//! - [`Mips`]: a 32-bit MIPS subset with SPIM-style system calls
//! - [`MipsIft`]: the same subset with information flow tracking
//! - [`Toy`]: an 8-bit machine with four instructions

pub mod mips;
pub mod mips_ift;
pub mod toy;

pub use mips::Mips;
pub use mips_ift::MipsIft;
pub use toy::Toy;
