//! # Pattern Registry
//!
//! The validated table of instruction patterns of one ISA. ISAs declare their
//! instructions as a static slice of [`InstructionDef`] and build the registry
//! once; every check is made up front so that decoding and encoding can assume
//! a consistent table afterwards.

use std::collections::HashMap;

use crate::error::{BitsError, DefinitionError};
use crate::fields::Fields;
use crate::template::{AsmFormat, InstructionPattern};

/// One row of an ISA's instruction table
///
/// `S` is whatever the ISA attaches to the instruction, usually its semantics
/// function. The registry itself only reads the three strings.
#[derive(Debug, Clone, Copy)]
pub struct InstructionDef<S> {
    pub name: &'static str,
    pub template: &'static str,
    pub format: &'static str,
    pub semantics: S,
}

/// Validated, ordered instruction patterns
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    width_bits: usize,
    patterns: Vec<InstructionPattern>,
    by_name: HashMap<String, usize>,
}

impl PatternRegistry {
    /// Validate `defs` for an instruction `width_bits` wide
    pub fn new<S>(width_bits: usize, defs: &[InstructionDef<S>]) -> Result<Self, DefinitionError> {
        if width_bits == 0 || width_bits > 64 {
            return Err(DefinitionError::UnsupportedWidth(width_bits));
        }

        let mut patterns: Vec<InstructionPattern> = Vec::with_capacity(defs.len());
        let mut by_name = HashMap::with_capacity(defs.len());

        for def in defs {
            let pattern = InstructionPattern::new(def.name, def.template, def.format, width_bits)?;

            if by_name.insert(def.name.to_string(), patterns.len()).is_some() {
                return Err(DefinitionError::DuplicateName(def.name.to_string()));
            }

            if let Some(other) = patterns
                .iter()
                .find(|p| p.template().overlaps(pattern.template()))
            {
                return Err(DefinitionError::OverlappingPatterns {
                    first: other.name().to_string(),
                    second: def.name.to_string(),
                });
            }

            patterns.push(pattern);
        }

        Ok(Self {
            width_bits,
            patterns,
            by_name,
        })
    }

    /// Instruction width in bits
    pub fn width_bits(&self) -> usize {
        self.width_bits
    }

    pub fn get(&self, name: &str) -> Option<&InstructionPattern> {
        self.index_of(name).map(|i| &self.patterns[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn pattern(&self, index: usize) -> Option<&InstructionPattern> {
        self.patterns.get(index)
    }

    /// Patterns in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &InstructionPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern (in declaration order) whose literal bits match `word`
    pub fn find(&self, word: u64) -> Option<(usize, &InstructionPattern)> {
        self.patterns
            .iter()
            .enumerate()
            .find(|(_, p)| p.template().matches(word))
    }
}

/// Expansion of a pseudo-instruction into real assembly lines
///
/// Fails with [`BitsError::Overflow`] when an operand does not fit the
/// instructions it expands to.
pub type Expansion = fn(&Fields) -> Result<Vec<String>, BitsError>;

/// One pseudo-instruction declaration
#[derive(Debug, Clone, Copy)]
pub struct PseudoDef {
    pub name: &'static str,
    /// Operand format, e.g. `"li $d !i"`
    pub format: &'static str,
    pub expand: Expansion,
}

/// A validated pseudo-instruction
#[derive(Debug, Clone)]
pub struct Pseudo {
    format: AsmFormat,
    expand: Expansion,
}

impl Pseudo {
    pub fn name(&self) -> &str {
        self.format.mnemonic()
    }

    pub fn format(&self) -> &AsmFormat {
        &self.format
    }

    /// Real assembly lines replacing this pseudo-instruction
    pub fn expand(&self, fields: &Fields) -> Result<Vec<String>, BitsError> {
        (self.expand)(fields)
    }
}

/// Pseudo-instructions of an ISA
#[derive(Debug, Clone, Default)]
pub struct PseudoTable {
    entries: HashMap<String, Pseudo>,
}

impl PseudoTable {
    /// Validate `defs` against the real instructions in `registry`
    pub fn new(defs: &[PseudoDef], registry: &PatternRegistry) -> Result<Self, DefinitionError> {
        let mut entries = HashMap::with_capacity(defs.len());
        for def in defs {
            let format = AsmFormat::parse(def.name, def.format)?;
            if format.mnemonic() != def.name {
                return Err(DefinitionError::NameMismatch {
                    name: def.name.to_string(),
                    mnemonic: format.mnemonic().to_string(),
                });
            }
            if registry.get(def.name).is_some() {
                return Err(DefinitionError::PseudoShadowsInstruction(def.name.to_string()));
            }
            let pseudo = Pseudo {
                format,
                expand: def.expand,
            };
            if entries.insert(def.name.to_string(), pseudo).is_some() {
                return Err(DefinitionError::DuplicateName(def.name.to_string()));
            }
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Pseudo> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
