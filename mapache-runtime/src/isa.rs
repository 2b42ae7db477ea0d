//! Executable instruction sets
//!
//! An [`Isa`] adds behaviour to an [`IsaDescription`]: one semantics
//! function per registry entry and a handful of hooks around each step.

use std::collections::HashSet;

use mapache_disassembler::DecodedInstruction;
use mapache_spec::{DefinitionError, Fields, InstructionDef, IsaDescription, PatternRegistry, RegId};

use crate::error::Result;
use crate::ift::ShadowLayout;
use crate::state::MachineState;

/// What happens after an instruction has executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Finalize and carry on
    Next,
    /// The program terminated cleanly
    Complete,
}

/// Behaviour of one instruction
pub type Semantics<I> = fn(&I, &mut MachineState, &Fields) -> Result<Flow>;

/// Semantics indexed like the registry, plus the instructions that set PC
pub struct InstructionSet<I> {
    semantics: Vec<Semantics<I>>,
    control_flow: HashSet<usize>,
}

impl<I> InstructionSet<I> {
    /// Pair `defs` (the table `registry` was built from) with their semantics
    ///
    /// Every name in `control_flow` must be a registered instruction.
    pub fn new(
        registry: &PatternRegistry,
        defs: &[InstructionDef<Semantics<I>>],
        control_flow: &[&str],
    ) -> std::result::Result<Self, DefinitionError> {
        if defs.len() != registry.len() {
            return Err(DefinitionError::MissingSemantics(format!(
                "{} of {} instructions",
                defs.len(),
                registry.len()
            )));
        }
        let mut semantics = Vec::with_capacity(defs.len());
        for (index, def) in defs.iter().enumerate() {
            if registry.index_of(def.name) != Some(index) {
                return Err(DefinitionError::MissingSemantics(def.name.to_string()));
            }
            semantics.push(def.semantics);
        }

        let control_flow = control_flow
            .iter()
            .map(|name| {
                registry
                    .index_of(name)
                    .ok_or_else(|| DefinitionError::UnknownControlFlow(name.to_string()))
            })
            .collect::<std::result::Result<_, _>>()?;

        Ok(Self {
            semantics,
            control_flow,
        })
    }

    pub fn semantics(&self, index: usize) -> Option<Semantics<I>> {
        self.semantics.get(index).copied()
    }

    /// Whether the instruction at `index` sets PC itself
    pub fn is_control_flow(&self, index: usize) -> bool {
        self.control_flow.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.semantics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.semantics.is_empty()
    }
}

/// An instruction set the machine can execute
pub trait Isa: IsaDescription + Sized {
    fn instruction_set(&self) -> &InstructionSet<Self>;

    /// The program counter
    fn pc(&self) -> RegId;

    /// Put every register at its reset value
    fn reset(&self, state: &mut MachineState) {
        state.registers_mut().reset();
    }

    /// Run the semantics of a decoded instruction
    fn execute(&self, state: &mut MachineState, decoded: &DecodedInstruction<'_>) -> Result<Flow> {
        match self.instruction_set().semantics(decoded.index) {
            Some(semantics) => semantics(self, state, &decoded.fields),
            None => Err(DefinitionError::MissingSemantics(decoded.name().to_string()).into()),
        }
    }

    /// Called after an instruction executed with [`Flow::Next`]
    fn finalize_execution(
        &self,
        state: &mut MachineState,
        decoded: &DecodedInstruction<'_>,
    ) -> Result<()> {
        advance_pc(self, state, decoded);
        Ok(())
    }

    /// Shadow memory layout, for ISAs that track information flow
    fn shadow(&self) -> Option<&ShadowLayout> {
        None
    }
}

/// Move PC to the next instruction unless `decoded` set it itself
pub fn advance_pc<I: Isa>(isa: &I, state: &mut MachineState, decoded: &DecodedInstruction<'_>) {
    if !isa.instruction_set().is_control_flow(decoded.index) {
        let next = state.pc().wrapping_add(isa.isize() as u64);
        state.set_pc(next);
    }
}
