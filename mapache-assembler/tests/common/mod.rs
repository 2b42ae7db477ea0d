//! A MIPS-flavoured description used by the assembler tests

#![allow(dead_code)]

use mapache_spec::bits::int_to_bits;
use mapache_spec::{
    BitsError, Endian, Fields, InstructionDef, IsaConfig, IsaDescription, PatternRegistry, PseudoDef,
    PseudoTable, RegisterBank, Signedness,
};

pub struct TestIsa {
    config: IsaConfig,
    registry: PatternRegistry,
    pseudo: PseudoTable,
    registers: RegisterBank,
}

const INSTRUCTIONS: &[InstructionDef<()>] = &[
    InstructionDef { name: "add", template: "000000 sssss ttttt ddddd ----- 100000", format: "add $d $s $t", semantics: () },
    InstructionDef { name: "sll", template: "000000 ----- ttttt ddddd aaaaa 000000", format: "sll $d $t !a", semantics: () },
    InstructionDef { name: "j", template: "000010 aaaaaaaaaaaaaaaaaaaaaaaaaa", format: "j @a", semantics: () },
    InstructionDef { name: "addi", template: "001000 sssss ttttt iiiiiiiiiiiiiiii", format: "addi $t $s !i", semantics: () },
    InstructionDef { name: "ori", template: "001101 sssss ttttt iiiiiiiiiiiiiiii", format: "ori $t $s !i", semantics: () },
    InstructionDef { name: "lui", template: "001111 ----- ttttt iiiiiiiiiiiiiiii", format: "lui $t !i", semantics: () },
    InstructionDef { name: "lw", template: "100011 sssss ttttt iiiiiiiiiiiiiiii", format: "lw $t !i $s", semantics: () },
    InstructionDef { name: "lb", template: "100000 sssss ttttt aaaaaaaaaaaaaaaa", format: "lb $t &a $s", semantics: () },
];

fn expand_la(f: &Fields) -> Result<Vec<String>, BitsError> {
    let addr = int_to_bits(f['a'] as i64, 32, Signedness::Unsigned)?.value();
    Ok(vec![
        format!("lui ${} {}", f['d'], addr >> 16),
        format!("ori ${} ${} {}", f['d'], f['d'], addr & 0xffff),
    ])
}

fn expand_move(f: &Fields) -> Result<Vec<String>, BitsError> {
    Ok(vec![format!("add ${} ${} $0", f['d'], f['s'])])
}

fn expand_nop(_: &Fields) -> Result<Vec<String>, BitsError> {
    Ok(vec!["sll $0 $0 0".to_string()])
}

/// Expands differently once its label is known
fn expand_grow(f: &Fields) -> Result<Vec<String>, BitsError> {
    if f['a'] == 0 {
        Ok(vec!["sll $0 $0 0".to_string()])
    } else {
        Ok(vec!["sll $0 $0 0".to_string(), "sll $0 $0 0".to_string()])
    }
}

const PSEUDO: &[PseudoDef] = &[
    PseudoDef { name: "la", format: "la $d &a", expand: expand_la },
    PseudoDef { name: "move", format: "move $d $s", expand: expand_move },
    PseudoDef { name: "nop", format: "nop", expand: expand_nop },
    PseudoDef { name: "grow", format: "grow &a", expand: expand_grow },
];

const NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", "$t8", "$t9",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

impl TestIsa {
    pub fn new() -> Self {
        let registry = PatternRegistry::new(32, INSTRUCTIONS).unwrap();
        let pseudo = PseudoTable::new(PSEUDO, &registry).unwrap();
        let mut registers = RegisterBank::new();
        registers.make_register_file("R", 32, 32, Some(&NAMES)).unwrap();
        registers.make_register("PC", 32).unwrap();
        Self {
            config: IsaConfig::new(4, Endian::Big),
            registry,
            pseudo,
            registers,
        }
    }
}

impl IsaDescription for TestIsa {
    fn name(&self) -> &str {
        "test-mips"
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

/// Big-endian words of a text segment
pub fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
