//! Execution engine for MapacheSIM
//!
//! [`Machine::step`] runs one fetch, decode, execute and finalize cycle.
//! [`Machine::run`] repeats it until something stops the machine, checking
//! after every step (in this order):
//!
//! 1. the interrupt flag,
//! 2. a breakpoint at the new PC,
//! 3. clean completion,
//! 4. a runtime fault.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mapache_disassembler::{decode, format};
use mapache_spec::Program;
use tracing::{debug, info, warn};

use crate::error::{Result, RuntimeError};
use crate::isa::{Flow, Isa};
use crate::memory::Memory;
use crate::state::MachineState;
use crate::syscall::{BufferedIo, ConsoleIo, SyscallIo};

/// One executed instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Address the instruction was fetched from
    pub pc: u64,
    /// Disassembled instruction
    pub text: String,
    pub flow: Flow,
}

/// Why [`Machine::run`] returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The step budget ran out
    StepLimit,
    Interrupted,
    /// PC reached a breakpoint at this address
    Breakpoint(u64),
    /// The program terminated cleanly
    Complete,
    Fault(RuntimeError),
}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Instructions that executed without faulting
    pub executed: u64,
    pub stop: StopReason,
    /// The last instruction that executed
    pub last: Option<StepRecord>,
}

/// A simulated machine running one ISA
pub struct Machine<I: Isa> {
    isa: I,
    state: MachineState,
    breakpoints: BTreeMap<u64, String>,
    interrupt: Arc<AtomicBool>,
    entry: u64,
}

/// Map the ISA's memory regions and reset its registers
fn fresh_state<I: Isa>(isa: &I, io: Box<dyn SyscallIo>) -> Result<MachineState> {
    let config = isa.config();
    config.validate()?;
    let layout = config.layout;

    let mut memory = Memory::new(config.endian);
    memory.map(layout.text_base, layout.main_size)?;
    if layout.has_stack() {
        memory.map(layout.stack_base, layout.stack_size)?;
    }

    let mut state = MachineState::new(isa.registers().clone(), memory, io, isa.pc());
    isa.reset(&mut state);
    state.set_pc(layout.text_base);
    Ok(state)
}

impl<I: Isa> Machine<I> {
    /// A machine talking to stdin and stdout
    pub fn new(isa: I) -> Result<Self> {
        Self::with_io(isa, Box::new(ConsoleIo))
    }

    pub fn with_io(isa: I, io: Box<dyn SyscallIo>) -> Result<Self> {
        let state = fresh_state(&isa, io)?;
        let entry = isa.config().layout.text_base;
        Ok(Self {
            isa,
            state,
            breakpoints: BTreeMap::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            entry,
        })
    }

    pub fn isa(&self) -> &I {
        &self.isa
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    /// Copy a program into memory and point PC at its text
    pub fn load(&mut self, program: &Program) -> Result<()> {
        if let Some(shadow) = self.isa.shadow() {
            shadow.check_range(program.data_base, program.data.len() as u64)?;
            shadow.check_range(program.text_base, program.text.len() as u64)?;
        }
        let memory = self.state.memory_mut();
        memory.load(program.data_base, &program.data)?;
        memory.load(program.text_base, &program.text)?;
        self.entry = program.text_base;
        self.state.set_pc(program.text_base);
        info!(
            isa = self.isa.name(),
            text_base = format_args!("{:#x}", program.text_base),
            text = program.text.len(),
            data = program.data.len(),
            "program loaded"
        );
        Ok(())
    }

    /// Reset registers and start over from the program entry; memory is kept
    pub fn restart(&mut self) {
        self.isa.reset(&mut self.state);
        self.state.set_pc(self.entry);
    }

    /// Rebuild the machine with empty memory, keeping the console and breakpoints
    pub fn reinitialize(&mut self) -> Result<()> {
        let mut fresh = fresh_state(&self.isa, Box::new(BufferedIo::default()))?;
        let io = self.state.replace_io(Box::new(BufferedIo::default()));
        fresh.replace_io(io);
        self.state = fresh;
        self.entry = self.isa.config().layout.text_base;
        Ok(())
    }

    /// Execute one instruction
    pub fn step(&mut self) -> Result<StepRecord> {
        let isize = self.isa.isize();
        let pc = self.state.pc();
        if pc % isize as u64 != 0 {
            return Err(RuntimeError::UnalignedJump { target: pc });
        }

        let bytes = self.state.memory().read(pc, isize)?;
        let decoded = decode(self.isa.registry(), self.isa.config().endian, bytes)?;
        let text = format(&self.isa, &decoded);
        debug!(pc = format_args!("{pc:#010x}"), "{text}");

        let flow = self.isa.execute(&mut self.state, &decoded)?;
        if flow == Flow::Next {
            self.isa.finalize_execution(&mut self.state, &decoded)?;
        }
        Ok(StepRecord { pc, text, flow })
    }

    /// Step until stopped, or until `limit` instructions have executed
    pub fn run(&mut self, limit: Option<u64>) -> RunSummary {
        let mut executed = 0;
        let mut last = None;

        let stop = loop {
            if limit.is_some_and(|n| executed >= n) {
                break StopReason::StepLimit;
            }

            let outcome = self.step();
            let interrupted = self.interrupt.swap(false, Ordering::SeqCst);

            match outcome {
                Ok(record) => {
                    executed += 1;
                    let flow = record.flow;
                    last = Some(record);
                    let pc = self.state.pc();
                    if interrupted {
                        break StopReason::Interrupted;
                    }
                    // a finished program has no next instruction to break on
                    if flow == Flow::Next && self.breakpoints.contains_key(&pc) {
                        break StopReason::Breakpoint(pc);
                    }
                    if flow == Flow::Complete {
                        break StopReason::Complete;
                    }
                }
                Err(e) => {
                    if interrupted {
                        warn!(error = %e, "fault masked by interrupt");
                        break StopReason::Interrupted;
                    }
                    warn!(pc = format_args!("{:#x}", self.state.pc()), error = %e, "runtime fault");
                    break StopReason::Fault(e);
                }
            }
        };

        info!(executed, stop = ?stop, "run stopped");
        RunSummary {
            executed,
            stop,
            last,
        }
    }

    /// Stop at `addr`, which must be instruction aligned
    pub fn add_breakpoint(&mut self, addr: u64, name: impl Into<String>) -> Result<()> {
        let alignment = self.isa.isize();
        if addr % alignment as u64 != 0 {
            return Err(RuntimeError::UnalignedBreakpoint {
                address: addr,
                alignment,
            });
        }
        self.breakpoints.insert(addr, name.into());
        Ok(())
    }

    /// Name of the removed breakpoint, if one was set
    pub fn remove_breakpoint(&mut self, addr: u64) -> Option<String> {
        self.breakpoints.remove(&addr)
    }

    pub fn breakpoints(&self) -> &BTreeMap<u64, String> {
        &self.breakpoints
    }

    /// Flag another thread can raise to stop a run between two steps
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }
}
