//! # System Calls
//!
//! Console services available to simulated programs:
//! - Print integer (1): signed 32-bit value followed by a newline
//! - Print string (4): NUL-terminated, at most 1024 bytes
//! - Read integer (5): one line of input
//! - Exit (10): clean termination
//!
//! Where the service number and argument come from is up to the ISA; see
//! [`dispatch`].

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use tracing::debug;

use crate::error::{Result, RuntimeError};
use crate::memory::Memory;

pub const SYSCALL_PRINT_INT: u64 = 1;
pub const SYSCALL_PRINT_STRING: u64 = 4;
pub const SYSCALL_READ_INT: u64 = 5;
pub const SYSCALL_EXIT: u64 = 10;

/// Longest string print-string will emit
pub const MAX_STRING: usize = 1024;

/// Console the simulated program talks to
pub trait SyscallIo {
    fn print(&mut self, text: &str) -> Result<()>;

    /// Next line of input without its terminator, `None` at end of input
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Everything printed so far, for implementations that capture output
    fn captured(&self) -> Option<&str> {
        None
    }
}

/// Process stdin and stdout
#[derive(Debug, Default)]
pub struct ConsoleIo;

impl SyscallIo for ConsoleIo {
    fn print(&mut self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = std::io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Scripted input lines and captured output
#[derive(Debug, Clone, Default)]
pub struct BufferedIo {
    input: VecDeque<String>,
    output: String,
}

impl BufferedIo {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl SyscallIo for BufferedIo {
    fn print(&mut self, text: &str) -> Result<()> {
        self.output.push_str(text);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn captured(&self) -> Option<&str> {
        Some(&self.output)
    }
}

/// Result of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    Continue,
    /// Continue, returning a value to the program
    Value(u64),
    Exit,
}

/// Run service `service` with argument `arg`
pub fn dispatch(
    memory: &Memory,
    io: &mut dyn SyscallIo,
    service: u64,
    arg: u64,
) -> Result<SyscallOutcome> {
    debug!(service, arg = format_args!("{arg:#x}"), "syscall");
    match service {
        SYSCALL_PRINT_INT => {
            io.print(&format!("{}\n", arg as u32 as i32))?;
            Ok(SyscallOutcome::Continue)
        }
        SYSCALL_PRINT_STRING => {
            io.print(&read_string(memory, arg)?)?;
            Ok(SyscallOutcome::Continue)
        }
        SYSCALL_READ_INT => {
            let line = io.read_line()?.ok_or(RuntimeError::InputExhausted)?;
            let value: i64 = line
                .trim()
                .parse()
                .map_err(|_| RuntimeError::MalformedInput { input: line.clone() })?;
            Ok(SyscallOutcome::Value(value as u64))
        }
        SYSCALL_EXIT => Ok(SyscallOutcome::Exit),
        _ => Err(RuntimeError::InvalidSyscall { service }),
    }
}

fn printable(b: u8) -> bool {
    b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Render the NUL-terminated string at `addr`
fn read_string(memory: &Memory, addr: u64) -> Result<String> {
    let mut text = String::new();
    for i in 0..MAX_STRING as u64 {
        match memory.read_u8(addr + i)? {
            0 => return Ok(text),
            b if printable(b) => text.push(b as char),
            _ => text.push_str("<?>"),
        }
    }
    text.push_str(&format!("... (string continues beyond limit of {MAX_STRING})"));
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapache_spec::{Endian, PAGE_SIZE};

    fn memory_with(addr: u64, bytes: &[u8]) -> Memory {
        let mut mem = Memory::new(Endian::Big);
        mem.map(0x40000, PAGE_SIZE).unwrap();
        mem.write(addr, bytes).unwrap();
        mem
    }

    #[test]
    fn test_print_int_is_signed_32_bit() {
        let mem = Memory::new(Endian::Big);
        let mut io = BufferedIo::default();
        dispatch(&mem, &mut io, SYSCALL_PRINT_INT, 0xffff_ffff).unwrap();
        dispatch(&mem, &mut io, SYSCALL_PRINT_INT, 42).unwrap();
        assert_eq!(io.output(), "-1\n42\n");
    }

    #[test]
    fn test_print_string() {
        let mem = memory_with(0x40000, b"hi\x01\n\0junk");
        let mut io = BufferedIo::default();
        let outcome = dispatch(&mem, &mut io, SYSCALL_PRINT_STRING, 0x40000).unwrap();
        assert_eq!(outcome, SyscallOutcome::Continue);
        assert_eq!(io.output(), "hi<?>\n");
    }

    #[test]
    fn test_print_string_limit() {
        let mem = memory_with(0x40000, &[b'a'; 2000]);
        let mut io = BufferedIo::default();
        dispatch(&mem, &mut io, SYSCALL_PRINT_STRING, 0x40000).unwrap();
        assert!(io.output().starts_with(&"a".repeat(MAX_STRING)));
        assert!(io.output().ends_with("(string continues beyond limit of 1024)"));
    }

    #[test]
    fn test_print_string_unmapped() {
        let mem = Memory::new(Endian::Big);
        let mut io = BufferedIo::default();
        assert!(matches!(
            dispatch(&mem, &mut io, SYSCALL_PRINT_STRING, 0x1000),
            Err(RuntimeError::Unmapped { .. })
        ));
    }

    #[test]
    fn test_read_int() {
        let mem = Memory::new(Endian::Big);
        let mut io = BufferedIo::new(["12", " -3 ", "x"]);
        assert_eq!(
            dispatch(&mem, &mut io, SYSCALL_READ_INT, 0).unwrap(),
            SyscallOutcome::Value(12)
        );
        assert_eq!(
            dispatch(&mem, &mut io, SYSCALL_READ_INT, 0).unwrap(),
            SyscallOutcome::Value(-3i64 as u64)
        );
        assert_eq!(
            dispatch(&mem, &mut io, SYSCALL_READ_INT, 0).unwrap_err(),
            RuntimeError::MalformedInput { input: "x".to_string() }
        );
        assert_eq!(
            dispatch(&mem, &mut io, SYSCALL_READ_INT, 0).unwrap_err(),
            RuntimeError::InputExhausted
        );
    }

    #[test]
    fn test_exit_and_invalid() {
        let mem = Memory::new(Endian::Big);
        let mut io = BufferedIo::default();
        assert_eq!(
            dispatch(&mem, &mut io, SYSCALL_EXIT, 0).unwrap(),
            SyscallOutcome::Exit
        );
        assert_eq!(
            dispatch(&mem, &mut io, 8, 0).unwrap_err(),
            RuntimeError::InvalidSyscall { service: 8 }
        );
    }
}
