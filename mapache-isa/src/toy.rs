//! # Toy
//!
//! An 8-bit teaching machine: four registers, one-byte instructions and
//! nothing else.
//!
//! ```text
//!   00aabbdd  add $d $a $b
//!   01aabbdd  sub $d $a $b
//!   10aa--dd  ld $d $a       R[d] = data[R[a]]
//!   11aaaaaa  j @a
//! ```

use mapache_runtime::{Flow, InstructionSet, Isa, MachineState, Result, Semantics};
use mapache_spec::{
    DefinitionError, Endian, Fields, FileId, InstructionDef, IsaConfig, IsaDescription,
    MemoryLayout, PatternRegistry, PseudoTable, RegId, RegisterBank,
};

pub const LAYOUT: MemoryLayout = MemoryLayout {
    text_base: 0,
    data_base: 0x80,
    main_size: 4096,
    stack_base: 0,
    stack_size: 0,
};

#[rustfmt::skip]
const INSTRUCTIONS: &[InstructionDef<Semantics<Toy>>] = &[
    InstructionDef { name: "add", template: "00aabbdd", format: "add $d $a $b", semantics: add },
    InstructionDef { name: "sub", template: "01aabbdd", format: "sub $d $a $b", semantics: sub },
    InstructionDef { name: "ld",  template: "10aa--dd", format: "ld $d $a",     semantics: ld },
    InstructionDef { name: "j",   template: "11aaaaaa", format: "j @a",         semantics: j },
];

pub struct Toy {
    config: IsaConfig,
    registry: PatternRegistry,
    pseudo: PseudoTable,
    registers: RegisterBank,
    set: InstructionSet<Toy>,
    r: FileId,
    pc: RegId,
}

impl Toy {
    pub fn new() -> std::result::Result<Self, DefinitionError> {
        let config = IsaConfig::new(1, Endian::Big).with_layout(LAYOUT);
        config.validate()?;
        let registry = PatternRegistry::new(config.width_bits(), INSTRUCTIONS)?;
        let set = InstructionSet::new(&registry, INSTRUCTIONS, &["j"])?;

        let mut registers = RegisterBank::new();
        let r = registers.make_register_file("R", 4, 8, None)?;
        let pc = registers.make_register("PC", 8)?;

        Ok(Self {
            config,
            registry,
            pseudo: PseudoTable::empty(),
            registers,
            set,
            r,
            pc,
        })
    }

    pub fn gpr(&self) -> FileId {
        self.r
    }
}

impl IsaDescription for Toy {
    fn name(&self) -> &str {
        "toy"
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

impl Isa for Toy {
    fn instruction_set(&self) -> &InstructionSet<Self> {
        &self.set
    }

    fn pc(&self) -> RegId {
        self.pc
    }
}

fn add(isa: &Toy, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = s.reg(isa.r, f['a'] as usize)?.wrapping_add(s.reg(isa.r, f['b'] as usize)?);
    s.set_reg(isa.r, f['d'] as usize, value)?;
    Ok(Flow::Next)
}

fn sub(isa: &Toy, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let value = s.reg(isa.r, f['a'] as usize)?.wrapping_sub(s.reg(isa.r, f['b'] as usize)?);
    s.set_reg(isa.r, f['d'] as usize, value)?;
    Ok(Flow::Next)
}

fn ld(isa: &Toy, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    let address = isa.config.layout.data_base + s.reg(isa.r, f['a'] as usize)?;
    let value = s.memory().read_u8(address)?;
    s.set_reg(isa.r, f['d'] as usize, value as u64)?;
    Ok(Flow::Next)
}

fn j(_: &Toy, s: &mut MachineState, f: &Fields) -> Result<Flow> {
    s.set_pc(f['a']);
    Ok(Flow::Next)
}
