//! # MapacheSIM Runtime
//!
//! Execute assembled programs on any instruction set described with
//! `mapache-spec`.
//!
//! ## Features
//!
//! - **Paged memory**: sparse 4 KiB pages, byte order taken from the ISA
//! - **ISA-agnostic engine**: fetch, decode, execute and finalize through the [`Isa`] trait
//! - **Run control**: step limits, breakpoints and an interrupt flag
//! - **Syscalls**: print integer, print string, read integer, exit
//! - **IFT shadow memory**: taint fields for data and stack words
//!
//! ## Example
//!
//! ```rust,ignore
//! use mapache_runtime::{Machine, StopReason};
//!
//! let mut machine = Machine::new(isa)?;
//! machine.load(&program)?;
//! let summary = machine.run(Some(1_000));
//! assert_eq!(summary.stop, StopReason::Complete);
//! ```

pub mod error;
pub mod ift;
pub mod isa;
pub mod memory;
pub mod state;
pub mod syscall;
pub mod vm;

pub use error::{Result, RuntimeError};
pub use ift::ShadowLayout;
pub use isa::{advance_pc, Flow, InstructionSet, Isa, Semantics};
pub use memory::Memory;
pub use state::MachineState;
pub use syscall::{dispatch, BufferedIo, ConsoleIo, SyscallIo, SyscallOutcome};
pub use vm::{Machine, RunSummary, StepRecord, StopReason};

use mapache_spec::Program;

/// Run `program` with scripted input, returning the run and everything printed
pub fn run<I, L, S>(
    isa: I,
    program: &Program,
    input: L,
    limit: Option<u64>,
) -> Result<(RunSummary, String)>
where
    I: Isa,
    L: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut machine = Machine::with_io(isa, Box::new(BufferedIo::new(input)))?;
    machine.load(program)?;
    let summary = machine.run(limit);
    let output = machine.state().io().captured().unwrap_or_default().to_string();
    Ok((summary, output))
}
