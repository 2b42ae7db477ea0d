//! # MIPS
//!
//! A 32-bit big-endian MIPS subset in the style of SPIM: integer ALU
//! operations, word and byte loads and stores, jumps, `mult` with HI/LO
//! and the SPIM console system calls.
//!
//! Register 0 reads as zero after every instruction. `$gp` and `$sp` reset
//! to the SPIM values.

use mapache_disassembler::DecodedInstruction;
use mapache_runtime::{
    advance_pc, dispatch, Flow, InstructionSet, Isa, MachineState, Result, RuntimeError,
    Semantics, SyscallOutcome,
};
use mapache_spec::bits::{bit_select, int_to_bits, sign_extend};
use mapache_spec::{
    BitsError, DefinitionError, Endian, Fields, FileId, InstructionDef, IsaConfig, IsaDescription,
    PatternRegistry, PseudoDef, PseudoTable, RegId, RegisterBank, Signedness,
};

pub const REGISTER_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", "$t8", "$t9",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

const V0: u64 = 2;
const A0: u64 = 4;
const GP: usize = 28;
const SP: usize = 29;
const RA: u64 = 31;

const GP_RESET: u64 = 0x1000_8000;
const SP_RESET: u64 = 0x7fff_effc;

const WORD_MASK: u64 = 0xffff_ffff;

/// Instructions that set PC themselves
pub const CONTROL_FLOW: &[&str] = &["j", "jal", "jr", "jalr", "beq", "bne"];

#[rustfmt::skip]
pub const INSTRUCTIONS: &[InstructionDef<Semantics<Mips>>] = &[
    // R-format
    InstructionDef { name: "sll",     template: "000000 ----- ttttt ddddd hhhhh 000000", format: "sll $d $t !h",  semantics: sll },
    InstructionDef { name: "srl",     template: "000000 ----- ttttt ddddd hhhhh 000010", format: "srl $d $t !h",  semantics: srl },
    InstructionDef { name: "sra",     template: "000000 ----- ttttt ddddd hhhhh 000011", format: "sra $d $t !h",  semantics: sra },
    InstructionDef { name: "sllv",    template: "000000 sssss ttttt ddddd ----- 000100", format: "sllv $d $t $s", semantics: sllv },
    InstructionDef { name: "srlv",    template: "000000 sssss ttttt ddddd ----- 000110", format: "srlv $d $t $s", semantics: srlv },
    InstructionDef { name: "srav",    template: "000000 sssss ttttt ddddd ----- 000111", format: "srav $d $t $s", semantics: srav },
    InstructionDef { name: "jr",      template: "000000 sssss ----- ----- ----- 001000", format: "jr $s",         semantics: jr },
    InstructionDef { name: "jalr",    template: "000000 sssss ----- ddddd ----- 001001", format: "jalr $d $s",    semantics: jalr },
    InstructionDef { name: "syscall", template: "000000 ----- ----- ----- ----- 001100", format: "syscall",       semantics: syscall },
    InstructionDef { name: "mfhi",    template: "000000 ----- ----- ddddd ----- 010000", format: "mfhi $d",       semantics: mfhi },
    InstructionDef { name: "mflo",    template: "000000 ----- ----- ddddd ----- 010010", format: "mflo $d",       semantics: mflo },
    InstructionDef { name: "mult",    template: "000000 sssss ttttt ----- ----- 011000", format: "mult $s $t",    semantics: mult },
    InstructionDef { name: "add",     template: "000000 sssss ttttt ddddd ----- 100000", format: "add $d $s $t",  semantics: add },
    InstructionDef { name: "sub",     template: "000000 sssss ttttt ddddd ----- 100010", format: "sub $d $s $t",  semantics: sub },
    InstructionDef { name: "and",     template: "000000 sssss ttttt ddddd ----- 100100", format: "and $d $s $t",  semantics: and },
    InstructionDef { name: "or",      template: "000000 sssss ttttt ddddd ----- 100101", format: "or $d $s $t",   semantics: or },
    InstructionDef { name: "xor",     template: "000000 sssss ttttt ddddd ----- 100110", format: "xor $d $s $t",  semantics: xor },
    InstructionDef { name: "slt",     template: "000000 sssss ttttt ddddd ----- 101010", format: "slt $d $s $t",  semantics: slt },
    // J-format
    InstructionDef { name: "j",       template: "000010 aaaaaaaaaaaaaaaaaaaaaaaaaa",     format: "j @a",          semantics: j },
    InstructionDef { name: "jal",     template: "000011 aaaaaaaaaaaaaaaaaaaaaaaaaa",     format: "jal @a",        semantics: jal },
    // I-format
    InstructionDef { name: "beq",     template: "000100 sssss ttttt aaaaaaaaaaaaaaaa",   format: "beq $s $t @a",  semantics: beq },
    InstructionDef { name: "bne",     template: "000101 sssss ttttt aaaaaaaaaaaaaaaa",   format: "bne $s $t @a",  semantics: bne },
    InstructionDef { name: "addi",    template: "001000 sssss ttttt iiiiiiiiiiiiiiii",   format: "addi $t $s ~i", semantics: addi },
    InstructionDef { name: "addiu",   template: "001001 sssss ttttt iiiiiiiiiiiiiiii",   format: "addiu $t $s ~i", semantics: addi },
    InstructionDef { name: "andi",    template: "001100 sssss ttttt iiiiiiiiiiiiiiii",   format: "andi $t $s !i", semantics: andi },
    InstructionDef { name: "ori",     template: "001101 sssss ttttt iiiiiiiiiiiiiiii",   format: "ori $t $s !i",  semantics: ori },
    InstructionDef { name: "lui",     template: "001111 ----- ttttt iiiiiiiiiiiiiiii",   format: "lui $t !i",     semantics: lui },
    InstructionDef { name: "lb",      template: "100000 sssss ttttt iiiiiiiiiiiiiiii",   format: "lb $t ~i $s",   semantics: lb },
    InstructionDef { name: "lw",      template: "100011 sssss ttttt iiiiiiiiiiiiiiii",   format: "lw $t ~i $s",   semantics: lw },
    InstructionDef { name: "sb",      template: "101000 sssss ttttt iiiiiiiiiiiiiiii",   format: "sb $t ~i $s",   semantics: sb },
    InstructionDef { name: "sw",      template: "101011 sssss ttttt iiiiiiiiiiiiiiii",   format: "sw $t ~i $s",   semantics: sw },
];

pub const PSEUDO: &[PseudoDef] = &[
    PseudoDef { name: "li", format: "li $d !i", expand: expand_li },
    PseudoDef { name: "la", format: "la $d &a", expand: expand_la },
    PseudoDef { name: "move", format: "move $d $s", expand: expand_move },
    PseudoDef { name: "nop", format: "nop", expand: expand_nop },
];

/// A 32-bit constant, signed if negative
fn word_constant(value: i64) -> std::result::Result<u64, BitsError> {
    let signedness = if value < 0 {
        Signedness::Signed
    } else {
        Signedness::Unsigned
    };
    Ok(int_to_bits(value, 32, signedness)?.value())
}

fn expand_li(f: &Fields) -> std::result::Result<Vec<String>, BitsError> {
    let value = f['i'] as i64;
    if (-0x8000..0x8000).contains(&value) {
        return Ok(vec![format!("addiu ${} $zero {}", f['d'], value)]);
    }
    let bits = word_constant(value)?;
    Ok(vec![
        format!("lui ${} {}", f['d'], bits >> 16),
        format!("ori ${} ${} {}", f['d'], f['d'], bits & 0xffff),
    ])
}

fn expand_la(f: &Fields) -> std::result::Result<Vec<String>, BitsError> {
    let addr = int_to_bits(f['a'] as i64, 32, Signedness::Unsigned)?.value();
    Ok(vec![
        format!("lui ${} {}", f['d'], addr >> 16),
        format!("ori ${} ${} {}", f['d'], f['d'], addr & 0xffff),
    ])
}

fn expand_move(f: &Fields) -> std::result::Result<Vec<String>, BitsError> {
    Ok(vec![format!("add ${} ${} $zero", f['d'], f['s'])])
}

fn expand_nop(_: &Fields) -> std::result::Result<Vec<String>, BitsError> {
    Ok(vec!["sll $zero $zero 0".to_string()])
}

/// The MIPS instruction set
pub struct Mips {
    config: IsaConfig,
    registry: PatternRegistry,
    pseudo: PseudoTable,
    registers: RegisterBank,
    set: InstructionSet<Mips>,
    r: FileId,
    pc: RegId,
    hi: RegId,
    lo: RegId,
}

impl Mips {
    pub fn new() -> std::result::Result<Self, DefinitionError> {
        let config = IsaConfig::new(4, Endian::Big);
        config.validate()?;
        let registry = PatternRegistry::new(config.width_bits(), INSTRUCTIONS)?;
        let pseudo = PseudoTable::new(PSEUDO, &registry)?;
        let set = InstructionSet::new(&registry, INSTRUCTIONS, CONTROL_FLOW)?;

        let mut registers = RegisterBank::new();
        let r = registers.make_register_file("R", 32, 32, Some(&REGISTER_NAMES))?;
        let pc = registers.make_register("PC", 32)?;
        let hi = registers.make_register("HI", 32)?;
        let lo = registers.make_register("LO", 32)?;
        registers.set_file_reset(r, GP, GP_RESET)?;
        registers.set_file_reset(r, SP, SP_RESET)?;

        Ok(Self {
            config,
            registry,
            pseudo,
            registers,
            set,
            r,
            pc,
            hi,
            lo,
        })
    }

    /// The general purpose register file
    pub fn gpr(&self) -> FileId {
        self.r
    }

    pub fn hi(&self) -> RegId {
        self.hi
    }

    pub fn lo(&self) -> RegId {
        self.lo
    }

    #[inline]
    pub(crate) fn read(&self, s: &MachineState, n: u64) -> Result<u64> {
        s.reg(self.r, n as usize)
    }

    #[inline]
    pub(crate) fn write(&self, s: &mut MachineState, n: u64, value: u64) -> Result<()> {
        s.set_reg(self.r, n as usize, value)
    }

    /// `R[s] + sign_extend(i)`, the address of a load or store
    pub(crate) fn effective_address(&self, s: &MachineState, f: &Fields) -> Result<u64> {
        let base = self.read(s, f['s'])? as i64;
        Ok((base + sign_extend(f['i'], 16)?) as u64 & WORD_MASK)
    }
}

impl IsaDescription for Mips {
    fn name(&self) -> &str {
        "mips"
    }

    fn config(&self) -> &IsaConfig {
        &self.config
    }

    fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    fn pseudo(&self) -> &PseudoTable {
        &self.pseudo
    }

    fn registers(&self) -> &RegisterBank {
        &self.registers
    }
}

impl Isa for Mips {
    fn instruction_set(&self) -> &InstructionSet<Self> {
        &self.set
    }

    fn pc(&self) -> RegId {
        self.pc
    }

    /// Keep register 0 at zero and move past non-jumps
    fn finalize_execution(&self, s: &mut MachineState, decoded: &DecodedInstruction<'_>) -> Result<()> {
        self.write(s, 0, 0)?;
        advance_pc(self, s, decoded);
        Ok(())
    }
}

fn signed(value: u64) -> i32 {
    value as u32 as i32
}

// ============================================================================
// Shifts
// ============================================================================

pub(crate) fn sll(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = isa.read(s, f['t'])? << f['h'];
    isa.write(s, f['d'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn srl(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = isa.read(s, f['t'])? >> f['h'];
    isa.write(s, f['d'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn sra(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = signed(isa.read(s, f['t'])?) >> f['h'];
    isa.write(s, f['d'], value as u32 as u64)?;
    Ok(Flow::Next)
}

pub(crate) fn sllv(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let shift = isa.read(s, f['s'])? & 31;
    let value = isa.read(s, f['t'])? << shift;
    isa.write(s, f['d'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn srlv(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let shift = isa.read(s, f['s'])? & 31;
    let value = isa.read(s, f['t'])? >> shift;
    isa.write(s, f['d'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn srav(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let shift = isa.read(s, f['s'])? & 31;
    let value = signed(isa.read(s, f['t'])?) >> shift;
    isa.write(s, f['d'], value as u32 as u64)?;
    Ok(Flow::Next)
}

// ============================================================================
// Jumps and Branches
// ============================================================================

fn aligned_target(target: u64) -> Result<u64> {
    if target % 4 != 0 {
        return Err(RuntimeError::UnalignedJump { target });
    }
    Ok(target)
}

pub(crate) fn jr(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let target = aligned_target(isa.read(s, f['s'])?)?;
    s.set_pc(target);
    Ok(Flow::Next)
}

pub(crate) fn jalr(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    if f['s'] == f['d'] {
        return Err(RuntimeError::InvalidOperands {
            instruction: "jalr",
            reason: "$rs and $rd must be different registers",
        });
    }
    let target = aligned_target(isa.read(s, f['s'])?)?;
    let link = s.pc() + 4;
    isa.write(s, f['d'], link)?;
    s.set_pc(target);
    Ok(Flow::Next)
}

/// Absolute jump within the current 256 MiB region
fn jump_target(pc: u64, a: u64) -> Result<u64> {
    Ok(bit_select(pc + 4, 31, 28, false)? | (a << 2))
}

pub(crate) fn j(_: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let target = jump_target(s.pc(), f['a'])?;
    s.set_pc(target);
    Ok(Flow::Next)
}

pub(crate) fn jal(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let pc = s.pc();
    isa.write(s, RA, pc + 4)?;
    s.set_pc(jump_target(pc, f['a'])?);
    Ok(Flow::Next)
}

// TODO: branch targets are absolute word addresses within the current
// 256 KiB region; switch beq/bne to PC-relative offsets once the assembler
// can encode them.
fn branch(s: &mut MachineState, f: &Fields, taken: bool) -> Result<Flow> {
    let next = s.pc() + 4;
    let target = if taken {
        bit_select(next, 31, 18, false)? | (f['a'] << 2)
    } else {
        next
    };
    s.set_pc(target);
    Ok(Flow::Next)
}

pub(crate) fn beq(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let taken = isa.read(s, f['s'])? == isa.read(s, f['t'])?;
    branch(s, f, taken)
}

pub(crate) fn bne(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let taken = isa.read(s, f['s'])? != isa.read(s, f['t'])?;
    branch(s, f, taken)
}

// ============================================================================
// System Calls, Multiply
// ============================================================================

pub(crate) fn syscall(isa: &Mips, s: &mut MachineState, _: &Fields) -> Result<Flow> {
    let service = isa.read(s, V0)?;
    let arg = isa.read(s, A0)?;
    let (memory, io) = s.memory_and_io();
    match dispatch(memory, io, service, arg)? {
        SyscallOutcome::Continue => Ok(Flow::Next),
        SyscallOutcome::Value(value) => {
            isa.write(s, V0, value)?;
            Ok(Flow::Next)
        }
        SyscallOutcome::Exit => Ok(Flow::Complete),
    }
}

pub(crate) fn mfhi(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = s.special(isa.hi);
    isa.write(s, f['d'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn mflo(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = s.special(isa.lo);
    isa.write(s, f['d'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn mult(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let product = signed(isa.read(s, f['s'])?) as i64 * signed(isa.read(s, f['t'])?) as i64;
    s.set_special(isa.lo, product as u64 & WORD_MASK);
    s.set_special(isa.hi, (product >> 32) as u64 & WORD_MASK);
    Ok(Flow::Next)
}

// ============================================================================
// ALU
// ============================================================================

fn alu(isa: &Mips, s: &mut MachineState, f: &Fields, op: fn(u64, u64) -> u64) -> Result<Flow> {
    let value = op(isa.read(s, f['s'])?, isa.read(s, f['t'])?);
    isa.write(s, f['d'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn add(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    alu(isa, s, f, u64::wrapping_add)
}

pub(crate) fn sub(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    alu(isa, s, f, u64::wrapping_sub)
}

pub(crate) fn and(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    alu(isa, s, f, |a, b| a & b)
}

pub(crate) fn or(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    alu(isa, s, f, |a, b| a | b)
}

pub(crate) fn xor(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    alu(isa, s, f, |a, b| a ^ b)
}

pub(crate) fn slt(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    alu(isa, s, f, |a, b| (signed(a) < signed(b)) as u64)
}

pub(crate) fn addi(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = (isa.read(s, f['s'])? as i64).wrapping_add(sign_extend(f['i'], 16)?);
    isa.write(s, f['t'], value as u64)?;
    Ok(Flow::Next)
}

pub(crate) fn andi(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = isa.read(s, f['s'])? & f['i'];
    isa.write(s, f['t'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn ori(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = isa.read(s, f['s'])? | f['i'];
    isa.write(s, f['t'], value)?;
    Ok(Flow::Next)
}

pub(crate) fn lui(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    isa.write(s, f['t'], f['i'] << 16)?;
    Ok(Flow::Next)
}

// ============================================================================
// Loads and Stores
// ============================================================================

fn word_address(isa: &Mips, s: &MachineState, f: &Fields) -> Result<u64> {
    let address = isa.effective_address(s, f)?;
    if address % 4 != 0 {
        return Err(RuntimeError::UnalignedAccess { address, size: 4 });
    }
    Ok(address)
}

pub(crate) fn lw(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = word_address(isa, s, f)?;
    let value = s.memory().read_u32(address)?;
    isa.write(s, f['t'], value as u64)?;
    Ok(Flow::Next)
}

pub(crate) fn sw(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = word_address(isa, s, f)?;
    let value = isa.read(s, f['t'])?;
    s.memory_mut().write_u32(address, value as u32)?;
    Ok(Flow::Next)
}

pub(crate) fn lb(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = isa.effective_address(s, f)?;
    let value = s.memory().read_i8(address)?;
    isa.write(s, f['t'], value as i64 as u64)?;
    Ok(Flow::Next)
}

pub(crate) fn sb(isa: &Mips, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = isa.effective_address(s, f)?;
    let value = isa.read(s, f['t'])?;
    s.memory_mut().write_u8(address, value as u8)?;
    Ok(Flow::Next)
}
