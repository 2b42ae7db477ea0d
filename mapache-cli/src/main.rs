//! MapacheSIM command line.
//!
//! ```text
//! mapache assemble prog.s -o prog.img
//! mapache disasm prog.img
//! mapache --isa mips-ift run prog.s --max-steps 100000 --break 0x10010
//! ```
//!
//! Sources and images are told apart by the image magic, so every command
//! that reads a program accepts either. Set `RUST_LOG=debug` to trace every
//! executed instruction. Ctrl-C during `run` stops the program after the
//! current instruction and reports where it was.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mapache_assembler::assemble_at;
use mapache_disassembler::disassemble;
use mapache_isa::{Mips, MipsIft, Toy};
use mapache_runtime::{BufferedIo, ConsoleIo, Isa, Machine, StopReason, SyscallIo};
use mapache_spec::bits::parse_int;
use mapache_spec::Program;

#[derive(Parser, Debug)]
#[command(name = "mapache", version, about = "ISA-agnostic CPU simulator")]
struct Cli {
    /// Instruction set to assemble for and run on
    #[arg(long, value_enum, default_value_t = IsaKind::Mips, global = true)]
    isa: IsaKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IsaKind {
    Mips,
    MipsIft,
    Toy,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a source file into a program image
    Assemble {
        source: PathBuf,

        /// Image to write; without it the layout and text words are printed
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_parser = parse_address)]
        text_base: Option<u64>,

        #[arg(long, value_parser = parse_address)]
        data_base: Option<u64>,
    },

    /// List the text segment of a source file or image
    Disasm { program: PathBuf },

    /// Run a source file or image
    Run {
        program: PathBuf,

        /// Stop after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,

        /// Stop when PC reaches this address (repeatable)
        #[arg(long = "break", value_parser = parse_address)]
        breakpoints: Vec<u64>,

        /// Line fed to the read-integer syscall instead of stdin (repeatable)
        #[arg(long = "input")]
        lines: Vec<String>,

        /// Dump every register when the run stops
        #[arg(long)]
        regs: bool,
    },
}

fn parse_address(text: &str) -> std::result::Result<u64, String> {
    match parse_int(text) {
        Some(n) if n >= 0 => Ok(n as u64),
        _ => Err(format!("invalid address \"{text}\"")),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match dispatch(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.isa {
        IsaKind::Mips => execute(Mips::new()?, cli.command),
        IsaKind::MipsIft => execute(MipsIft::new()?, cli.command),
        IsaKind::Toy => execute(Toy::new()?, cli.command),
    }
}

fn execute<I: Isa>(isa: I, command: Command) -> Result<ExitCode> {
    match command {
        Command::Assemble {
            source,
            output,
            text_base,
            data_base,
        } => {
            let layout = isa.config().layout;
            let text = read_source(&source)?;
            let program = assemble_at(
                &isa,
                &text,
                text_base.unwrap_or(layout.text_base),
                data_base.unwrap_or(layout.data_base),
            )
            .with_context(|| format!("assembling {}", source.display()))?;

            match output {
                Some(path) => {
                    fs::write(&path, program.to_bytes()?)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(image = %path.display(), "image written");
                }
                None => print_words(&isa, &program),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Disasm { program } => {
            let program = load_program(&isa, &program)?;
            print!("{}", disassemble(&isa, &program));
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            program,
            max_steps,
            breakpoints,
            lines,
            regs,
        } => run(isa, &program, max_steps, &breakpoints, lines, regs),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Decode an image, or assemble a source file at the ISA's default bases
fn load_program<I: Isa>(isa: &I, path: &Path) -> Result<Program> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if Program::is_image(&bytes) {
        return Program::from_bytes(&bytes).with_context(|| format!("loading image {}", path.display()));
    }
    let text = String::from_utf8(bytes).with_context(|| format!("{} is not text", path.display()))?;
    let layout = isa.config().layout;
    assemble_at(isa, &text, layout.text_base, layout.data_base)
        .with_context(|| format!("assembling {}", path.display()))
}

fn print_words<I: Isa>(isa: &I, program: &Program) {
    print!("{program}");
    let isize = isa.isize();
    for (i, chunk) in program.text.chunks(isize).enumerate() {
        let hex: String = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("{:#010x}: {hex}", program.text_base + (i * isize) as u64);
    }
}

/// Raise `interrupt` on Ctrl-C; the machine stops between two instructions
fn forward_ctrlc(interrupt: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || interrupt.store(true, Ordering::SeqCst))
        .context("installing the Ctrl-C handler")
}

fn run<I: Isa>(
    isa: I,
    path: &Path,
    max_steps: Option<u64>,
    breakpoints: &[u64],
    lines: Vec<String>,
    regs: bool,
) -> Result<ExitCode> {
    let program = load_program(&isa, path)?;

    let io: Box<dyn SyscallIo> = if lines.is_empty() {
        Box::new(ConsoleIo)
    } else {
        Box::new(BufferedIo::new(lines))
    };
    let mut machine = Machine::with_io(isa, io)?;
    machine.load(&program)?;

    for &addr in breakpoints {
        let name = program
            .labels
            .iter()
            .find(|(_, &a)| a == addr)
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| format!("{addr:#x}"));
        machine.add_breakpoint(addr, name)?;
    }

    forward_ctrlc(machine.interrupt_handle())?;
    let summary = machine.run(max_steps);
    if let Some(output) = machine.state().io().captured() {
        print!("{output}");
    }

    let stop = match &summary.stop {
        StopReason::Breakpoint(addr) => {
            let name = machine.breakpoints().get(addr).map(String::as_str).unwrap_or("?");
            format!("breakpoint {name} at {addr:#x}")
        }
        StopReason::Fault(e) => format!("fault: {e}"),
        StopReason::StepLimit => "step limit reached".to_string(),
        StopReason::Interrupted => "interrupted".to_string(),
        StopReason::Complete => "program exited".to_string(),
    };
    eprintln!("-- {stop} after {} instructions", summary.executed);
    if let Some(last) = &summary.last {
        eprintln!("-- last: {:#010x}  {}", last.pc, last.text);
    }

    if regs {
        for (name, bits, value) in machine.state().registers().iter() {
            let width = bits.div_ceil(4) as usize + 2;
            println!("{name:<10} {value:#0width$x}");
        }
    }

    Ok(match summary.stop {
        StopReason::Fault(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x10010"), Ok(0x10010));
        assert_eq!(parse_address("64"), Ok(64));
        assert!(parse_address("-4").is_err());
        assert!(parse_address("loop").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "mapache", "--isa", "mips-ift", "run", "prog.s", "--break", "0x10004", "--break", "0x10008",
            "--input", "5", "--max-steps", "10",
        ])
        .unwrap();
        assert!(matches!(cli.isa, IsaKind::MipsIft));
        match cli.command {
            Command::Run {
                breakpoints,
                lines,
                max_steps,
                regs,
                ..
            } => {
                assert_eq!(breakpoints, vec![0x10004, 0x10008]);
                assert_eq!(lines, vec!["5"]);
                assert_eq!(max_steps, Some(10));
                assert!(!regs);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ctrlc_interrupts_run() {
        use std::time::{Duration, Instant};

        let isa = Mips::new().unwrap();
        let program = mapache_assembler::assemble(&isa, ".text\nspin: j spin\n").unwrap();
        let mut machine = Machine::with_io(isa, Box::new(BufferedIo::default())).unwrap();
        machine.load(&program).unwrap();
        forward_ctrlc(machine.interrupt_handle()).unwrap();

        let pid = std::process::id().to_string();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            std::process::Command::new("kill").args(["-INT", &pid]).status()
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        let stop = loop {
            let summary = machine.run(Some(10_000));
            if summary.stop != StopReason::StepLimit || Instant::now() > deadline {
                break summary.stop;
            }
        };
        assert!(sender.join().unwrap().unwrap().success());
        assert_eq!(stop, StopReason::Interrupted);
    }
}
