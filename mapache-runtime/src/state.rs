//! Machine state: registers, memory and the console

use mapache_spec::{FileId, RegId, RegisterBank};

use crate::error::{Result, RuntimeError};
use crate::memory::Memory;
use crate::syscall::SyscallIo;

/// Everything instruction semantics may read or change
pub struct MachineState {
    registers: RegisterBank,
    memory: Memory,
    io: Box<dyn SyscallIo>,
    pc: RegId,
}

impl MachineState {
    pub fn new(registers: RegisterBank, memory: Memory, io: Box<dyn SyscallIo>, pc: RegId) -> Self {
        Self {
            registers,
            memory,
            io,
            pc,
        }
    }

    /// Register `n` of `file`
    #[inline]
    pub fn reg(&self, file: FileId, n: usize) -> Result<u64> {
        self.registers.get(file, n).ok_or_else(|| self.bad_register(file, n))
    }

    /// Write register `n` of `file`; the value is masked to the register width
    #[inline]
    pub fn set_reg(&mut self, file: FileId, n: usize, value: u64) -> Result<()> {
        match self.registers.set(file, n, value) {
            Some(_) => Ok(()),
            None => Err(self.bad_register(file, n)),
        }
    }

    fn bad_register(&self, file: FileId, n: usize) -> RuntimeError {
        RuntimeError::InvalidRegister {
            file: self.registers.file_name(file).to_string(),
            index: n,
        }
    }

    #[inline]
    pub fn special(&self, id: RegId) -> u64 {
        self.registers.special(id)
    }

    #[inline]
    pub fn set_special(&mut self, id: RegId, value: u64) {
        self.registers.set_special(id, value);
    }

    #[inline]
    pub fn pc(&self) -> u64 {
        self.registers.special(self.pc)
    }

    #[inline]
    pub fn set_pc(&mut self, value: u64) {
        self.registers.set_special(self.pc, value);
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterBank {
        &mut self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn io(&self) -> &dyn SyscallIo {
        self.io.as_ref()
    }

    pub fn io_mut(&mut self) -> &mut dyn SyscallIo {
        self.io.as_mut()
    }

    /// Memory and console together, for system calls
    pub fn memory_and_io(&mut self) -> (&Memory, &mut dyn SyscallIo) {
        (&self.memory, self.io.as_mut())
    }

    /// Swap in another console, returning the old one
    pub(crate) fn replace_io(&mut self, io: Box<dyn SyscallIo>) -> Box<dyn SyscallIo> {
        std::mem::replace(&mut self.io, io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall::BufferedIo;
    use mapache_spec::Endian;

    fn state() -> (MachineState, FileId) {
        let mut bank = RegisterBank::new();
        let r = bank.make_register_file("R", 4, 8, None).unwrap();
        let pc = bank.make_register("PC", 16).unwrap();
        let io = Box::new(BufferedIo::default());
        let state = MachineState::new(bank, Memory::new(Endian::Big), io, pc);
        (state, r)
    }

    #[test]
    fn test_register_masking() {
        let (mut state, r) = state();
        state.set_reg(r, 1, 300).unwrap();
        assert_eq!(state.reg(r, 1).unwrap(), 44);
    }

    #[test]
    fn test_invalid_register() {
        let (mut state, r) = state();
        assert_eq!(
            state.reg(r, 9).unwrap_err(),
            RuntimeError::InvalidRegister {
                file: "R".to_string(),
                index: 9
            }
        );
        assert!(state.set_reg(r, 4, 0).is_err());
    }

    #[test]
    fn test_pc() {
        let (mut state, _) = state();
        state.set_pc(0x1_0004);
        assert_eq!(state.pc(), 0x0004);
    }

    #[test]
    fn test_captured_output() {
        let (mut state, _) = state();
        state.io_mut().print("hello").unwrap();
        assert_eq!(state.io().captured(), Some("hello"));
    }
}
