//! # MIPS with Information Flow Tracking
//!
//! The MIPS subset extended with a taint register file `T`, taint for HI and
//! LO, and shadow memory holding the taint of every data and stack word.
//!
//! Values are computed by the plain [`Mips`] semantics; each instruction
//! here then moves taint the same way the value moved:
//!
//! - register operations OR the taint of their sources into the destination
//! - immediates are trusted, and `lui` produces a trusted value
//! - loads copy shadow taint into `T`, stores copy it back
//! - `trust $t ~i` sets a register's taint explicitly
//!
//! Memory instructions may only touch the program part of the data and stack
//! regions; the shadow space carved out of them is off limits.

use mapache_disassembler::DecodedInstruction;
use mapache_runtime::{
    advance_pc, Flow, InstructionSet, Isa, MachineState, Result, Semantics, ShadowLayout,
};
use mapache_spec::bits::sign_extend;
use mapache_spec::{
    DefinitionError, Fields, FileId, InstructionDef, IsaConfig, IsaDescription, PatternRegistry,
    PseudoTable, RegId, RegisterBank,
};
use tracing::debug;

use crate::mips::{self, Mips, CONTROL_FLOW, INSTRUCTIONS, PSEUDO};

/// Default number of program words per shadow word
pub const DEFAULT_RATIO: u32 = 32;

const RA: u64 = 31;

const TRUST: InstructionDef<Semantics<MipsIft>> = InstructionDef {
    name: "trust",
    template: "101010 ttttt iiiiiiiiiiiiiiii -----",
    format: "trust $t ~i",
    semantics: trust,
};

/// Taint-tracking semantics for every MIPS instruction, by name
const TRACKED: &[(&str, Semantics<MipsIft>)] = &[
    ("sll", sll),
    ("srl", srl),
    ("sra", sra),
    ("sllv", sllv),
    ("srlv", srlv),
    ("srav", srav),
    ("jr", jr),
    ("jalr", jalr),
    ("syscall", syscall),
    ("mfhi", mfhi),
    ("mflo", mflo),
    ("mult", mult),
    ("add", add),
    ("sub", sub),
    ("and", and),
    ("or", or),
    ("xor", xor),
    ("slt", slt),
    ("j", j),
    ("jal", jal),
    ("beq", beq),
    ("bne", bne),
    ("addi", addi),
    ("addiu", addi),
    ("andi", andi),
    ("ori", ori),
    ("lui", lui),
    ("lb", lb),
    ("lw", lw),
    ("sb", sb),
    ("sw", sw),
];

/// Pair every MIPS instruction with its tracked semantics, then add `trust`
fn instruction_table(
) -> std::result::Result<Vec<InstructionDef<Semantics<MipsIft>>>, DefinitionError> {
    let mut table = Vec::with_capacity(INSTRUCTIONS.len() + 1);
    for def in INSTRUCTIONS {
        let semantics = TRACKED
            .iter()
            .find(|(name, _)| *name == def.name)
            .map(|(_, semantics)| *semantics)
            .ok_or_else(|| DefinitionError::MissingSemantics(def.name.to_string()))?;
        table.push(InstructionDef {
            name: def.name,
            template: def.template,
            format: def.format,
            semantics,
        });
    }
    table.push(TRUST);
    Ok(table)
}

pub struct MipsIft {
    mips: Mips,
    config: IsaConfig,
    registry: PatternRegistry,
    pseudo: PseudoTable,
    registers: RegisterBank,
    set: InstructionSet<MipsIft>,
    t: FileId,
    hi_t: RegId,
    lo_t: RegId,
    shadow: ShadowLayout,
}

impl MipsIft {
    pub fn new() -> std::result::Result<Self, DefinitionError> {
        Self::with_ratio(DEFAULT_RATIO)
    }

    /// Track one `32 / ratio` bit taint field per data word
    pub fn with_ratio(ratio: u32) -> std::result::Result<Self, DefinitionError> {
        let mips = Mips::new()?;
        let config = *mips.config();
        let shadow = ShadowLayout::new(ratio, &config.layout)?;
        let width = shadow.field_width();
        debug!(
            ratio,
            data = ?shadow.data_range(),
            stack = ?shadow.stack_range(),
            "shadow memory carved"
        );

        let table = instruction_table()?;
        let registry = PatternRegistry::new(config.width_bits(), &table)?;
        let pseudo = PseudoTable::new(PSEUDO, &registry)?;
        let set = InstructionSet::new(&registry, &table, CONTROL_FLOW)?;

        // the MIPS ids stay valid since the taint registers come last
        let mut registers = mips.registers().clone();
        let t = registers.make_register_file("T", 32, width, None)?;
        let hi_t = registers.make_register("HI_T", width)?;
        let lo_t = registers.make_register("LO_T", width)?;

        Ok(Self {
            mips,
            config,
            registry,
            pseudo,
            registers,
            set,
            t,
            hi_t,
            lo_t,
            shadow,
        })
    }

    /// The plain MIPS view, for value registers
    pub fn mips(&self) -> &Mips {
        &self.mips
    }

    /// The taint register file
    pub fn taint_file(&self) -> FileId {
        self.t
    }

    #[inline]
    fn taint(&self, s: &MachineState, n: u64) -> Result<u64> {
        s.reg(self.t, n as usize)
    }

    #[inline]
    fn set_taint(&self, s: &mut MachineState, n: u64, taint: u64) -> Result<()> {
        s.set_reg(self.t, n as usize, taint)
    }

    /// Address of a load or store, checked against the shadow space
    fn tracked_address(&self, s: &MachineState, f: &Fields) -> Result<u64> {
        let address = self.mips.effective_address(s, f)?;
        self.shadow.check_access(address)?;
        Ok(address)
    }
}

impl IsaDescription for MipsIft {
    fn name(&self) -> &str {
        "mips-ift"
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

impl Isa for MipsIft {
    fn instruction_set(&self) -> &InstructionSet<Self> {
        &self.set
    }

    fn pc(&self) -> RegId {
        self.mips.pc()
    }

    fn finalize_execution(
        &self,
        s: &mut MachineState,
        decoded: &DecodedInstruction<'_>,
    ) -> Result<()> {
        self.set_taint(s, 0, 0)?;
        self.mips.write(s, 0, 0)?;
        advance_pc(self, s, decoded);
        Ok(())
    }

    fn shadow(&self) -> Option<&ShadowLayout> {
        Some(&self.shadow)
    }
}

/// Instructions whose taint effect is nil
macro_rules! untracked {
    ($($name:ident),* $(,)?) => {
        $(
            fn $name(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
                mips::$name(&isa.mips, s, f)
            }
        )*
    };
}

untracked!(j, jr, beq, bne, syscall);

/// Run `op`, then give `dest` the union of the taints of `sources`
fn propagate(
    isa: &MipsIft,
    s: &mut MachineState,
    f: &Fields,
    op: Semantics<Mips>,
    dest: char,
    sources: &[char],
) -> Result<Flow> {
    let mut taint = 0;
    for &source in sources {
        taint |= isa.taint(s, f[source])?;
    }
    let flow = op(&isa.mips, s, f)?;
    isa.set_taint(s, f[dest], taint)?;
    Ok(flow)
}

// ============================================================================
// Register Operations
// ============================================================================

fn sll(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::sll, 'd', &['t'])
}

fn srl(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::srl, 'd', &['t'])
}

fn sra(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::sra, 'd', &['t'])
}

fn sllv(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::sllv, 'd', &['t', 's'])
}

fn srlv(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::srlv, 'd', &['t', 's'])
}

fn srav(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::srav, 'd', &['t', 's'])
}

fn add(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::add, 'd', &['s', 't'])
}

fn sub(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::sub, 'd', &['s', 't'])
}

fn and(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::and, 'd', &['s', 't'])
}

fn or(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::or, 'd', &['s', 't'])
}

fn xor(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::xor, 'd', &['s', 't'])
}

fn slt(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::slt, 'd', &['s', 't'])
}

fn addi(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::addi, 't', &['s'])
}

fn andi(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::andi, 't', &['s'])
}

fn ori(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::ori, 't', &['s'])
}

fn lui(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    propagate(isa, s, f, mips::lui, 't', &[])
}

fn trust(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let taint = sign_extend(f['i'], 16)? as u64;
    isa.set_taint(s, f['t'], taint)?;
    Ok(Flow::Next)
}

// ============================================================================
// HI and LO
// ============================================================================

fn mult(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let taint = isa.taint(s, f['s'])? | isa.taint(s, f['t'])?;
    mips::mult(&isa.mips, s, f)?;
    s.set_special(isa.hi_t, taint);
    s.set_special(isa.lo_t, taint);
    Ok(Flow::Next)
}

fn mfhi(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    mips::mfhi(&isa.mips, s, f)?;
    let taint = s.special(isa.hi_t);
    isa.set_taint(s, f['d'], taint)?;
    Ok(Flow::Next)
}

fn mflo(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    mips::mflo(&isa.mips, s, f)?;
    let taint = s.special(isa.lo_t);
    isa.set_taint(s, f['d'], taint)?;
    Ok(Flow::Next)
}

// ============================================================================
// Linking Jumps
// ============================================================================

fn jal(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    mips::jal(&isa.mips, s, f)?;
    isa.set_taint(s, RA, 0)?;
    Ok(Flow::Next)
}

fn jalr(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    mips::jalr(&isa.mips, s, f)?;
    isa.set_taint(s, f['d'], 0)?;
    Ok(Flow::Next)
}

// ============================================================================
// Memory
// ============================================================================

fn lw(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = isa.tracked_address(s, f)?;
    mips::lw(&isa.mips, s, f)?;
    let taint = isa.shadow.ift_load(s.memory(), address)?;
    isa.set_taint(s, f['t'], taint)?;
    Ok(Flow::Next)
}

fn lb(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = isa.tracked_address(s, f)?;
    mips::lb(&isa.mips, s, f)?;
    let taint = isa.shadow.ift_load(s.memory(), address)?;
    isa.set_taint(s, f['t'], taint)?;
    Ok(Flow::Next)
}

fn sw(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = isa.tracked_address(s, f)?;
    mips::sw(&isa.mips, s, f)?;
    let taint = isa.taint(s, f['t'])?;
    isa.shadow.ift_store(s.memory_mut(), address, taint)?;
    Ok(Flow::Next)
}

/// A byte store taints the whole word it lands in
fn sb(isa: &MipsIft, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = isa.tracked_address(s, f)?;
    mips::sb(&isa.mips, s, f)?;
    let taint = isa.taint(s, f['t'])? | isa.shadow.ift_load(s.memory(), address)?;
    isa.shadow.ift_store(s.memory_mut(), address, taint)?;
    Ok(Flow::Next)
}
