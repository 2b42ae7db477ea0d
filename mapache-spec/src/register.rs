//! # Register Layout
//!
//! Register files and special registers of one machine. An ISA declares its
//! registers on a prototype [`RegisterBank`] at construction and keeps the
//! returned handles; every machine state starts from a clone of that
//! prototype.
//!
//! All writes are masked to the declared width: storing 300 in an 8-bit
//! register leaves 44.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bits::mask;
use crate::error::DefinitionError;

/// Handle to a register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(usize);

/// Handle to a special (non-file) register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegId(usize);

#[derive(Debug, Clone)]
struct RegisterFile {
    name: String,
    bits: u32,
    values: Vec<u64>,
    reset: Vec<u64>,
    names: Vec<String>,
    aliases: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct Register {
    name: String,
    bits: u32,
    value: u64,
    reset: u64,
}

/// All registers of a machine
#[derive(Debug, Clone, Default)]
pub struct RegisterBank {
    files: Vec<RegisterFile>,
    specials: Vec<Register>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_new(&self, name: &str, bits: u32) -> Result<(), DefinitionError> {
        if bits == 0 || bits > 64 {
            return Err(DefinitionError::RegisterWidth(bits));
        }
        if self.file(name).is_some() || self.special_id(name).is_some() {
            return Err(DefinitionError::DuplicateRegister(name.to_string()));
        }
        Ok(())
    }

    /// Declare a file of `size` registers, each `bits` wide
    ///
    /// `names` gives the assembly alias of each register in order (`$zero`,
    /// `$at`, ...). Without names the aliases are `$<file><index>`.
    pub fn make_register_file(
        &mut self,
        name: &str,
        size: usize,
        bits: u32,
        names: Option<&[&str]>,
    ) -> Result<FileId, DefinitionError> {
        self.check_new(name, bits)?;

        let names: Vec<String> = match names {
            Some(list) if list.len() == size => list.iter().map(|s| s.to_string()).collect(),
            Some(list) => {
                return Err(DefinitionError::Layout(format!(
                    "register file {name} has {size} registers but {} names",
                    list.len()
                )))
            }
            None => (0..size).map(|i| format!("${name}{i}")).collect(),
        };

        let mut aliases = HashMap::with_capacity(size);
        for (i, alias) in names.iter().enumerate() {
            if aliases.insert(alias.clone(), i).is_some() {
                return Err(DefinitionError::DuplicateRegister(alias.clone()));
            }
        }

        self.files.push(RegisterFile {
            name: name.to_string(),
            bits,
            values: vec![0; size],
            reset: vec![0; size],
            names,
            aliases,
        });
        Ok(FileId(self.files.len() - 1))
    }

    /// Declare a single register such as `PC` or `HI`
    pub fn make_register(&mut self, name: &str, bits: u32) -> Result<RegId, DefinitionError> {
        self.check_new(name, bits)?;
        self.specials.push(Register {
            name: name.to_string(),
            bits,
            value: 0,
            reset: 0,
        });
        Ok(RegId(self.specials.len() - 1))
    }

    /// Value register `n` of `file` takes on reset (masked to its width)
    pub fn set_file_reset(
        &mut self,
        file: FileId,
        n: usize,
        value: u64,
    ) -> Result<(), DefinitionError> {
        let f = &mut self.files[file.0];
        let masked = value & mask(f.bits);
        let Some(reset) = f.reset.get_mut(n) else {
            return Err(DefinitionError::NoSuchRegister {
                file: f.name.clone(),
                index: n,
            });
        };
        *reset = masked;
        f.values[n] = masked;
        Ok(())
    }

    pub fn set_special_reset(&mut self, id: RegId, value: u64) {
        let r = &mut self.specials[id.0];
        r.reset = value & mask(r.bits);
        r.value = r.reset;
    }

    /// Restore every register to its reset value
    pub fn reset(&mut self) {
        for f in &mut self.files {
            f.values.copy_from_slice(&f.reset);
        }
        for r in &mut self.specials {
            r.value = r.reset;
        }
    }

    pub fn file(&self, name: &str) -> Option<FileId> {
        self.files.iter().position(|f| f.name == name).map(FileId)
    }

    pub fn special_id(&self, name: &str) -> Option<RegId> {
        self.specials.iter().position(|r| r.name == name).map(RegId)
    }

    /// The first declared file, used for `$` operands
    pub fn primary(&self) -> Option<FileId> {
        if self.files.is_empty() {
            None
        } else {
            Some(FileId(0))
        }
    }

    pub fn file_name(&self, file: FileId) -> &str {
        &self.files[file.0].name
    }

    pub fn file_len(&self, file: FileId) -> usize {
        self.files[file.0].values.len()
    }

    pub fn file_bits(&self, file: FileId) -> u32 {
        self.files[file.0].bits
    }

    pub fn special_name(&self, id: RegId) -> &str {
        &self.specials[id.0].name
    }

    pub fn special_bits(&self, id: RegId) -> u32 {
        self.specials[id.0].bits
    }

    /// Value of register `n` of `file`, `None` if out of range
    #[inline]
    pub fn get(&self, file: FileId, n: usize) -> Option<u64> {
        self.files[file.0].values.get(n).copied()
    }

    /// Write register `n` of `file`, returning the stored (masked) value
    #[inline]
    pub fn set(&mut self, file: FileId, n: usize, value: u64) -> Option<u64> {
        let f = &mut self.files[file.0];
        let masked = value & mask(f.bits);
        *f.values.get_mut(n)? = masked;
        Some(masked)
    }

    #[inline]
    pub fn special(&self, id: RegId) -> u64 {
        self.specials[id.0].value
    }

    /// Write a special register, returning the stored (masked) value
    #[inline]
    pub fn set_special(&mut self, id: RegId, value: u64) -> u64 {
        let r = &mut self.specials[id.0];
        r.value = value & mask(r.bits);
        r.value
    }

    /// Register number for an assembly name in `file`
    ///
    /// The alias table is consulted first (`$sp`), then the numeric form
    /// `$N` for `N` below the file size.
    pub fn lookup_in(&self, file: FileId, name: &str) -> Option<usize> {
        let f = &self.files[file.0];
        if let Some(&n) = f.aliases.get(name) {
            return Some(n);
        }
        let n: usize = name.strip_prefix('$')?.parse().ok()?;
        (n < f.values.len()).then_some(n)
    }

    /// [`lookup_in`](Self::lookup_in) on the primary file
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.lookup_in(self.primary()?, name)
    }

    /// Assembly alias of register `n` of `file`
    pub fn alias(&self, file: FileId, n: usize) -> Option<&str> {
        self.files[file.0].names.get(n).map(String::as_str)
    }

    /// `(name, bits, value)` of every register, files first
    pub fn iter(&self) -> impl Iterator<Item = (String, u32, u64)> + '_ {
        let files = self.files.iter().flat_map(|f| {
            f.values
                .iter()
                .enumerate()
                .map(move |(i, v)| (format!("{}[{}]", f.name, i), f.bits, *v))
        });
        let specials = self
            .specials
            .iter()
            .map(|r| (r.name.clone(), r.bits, r.value));
        files.chain(specials)
    }
}
