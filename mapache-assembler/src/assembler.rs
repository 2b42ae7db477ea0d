//! Two-pass assembler driver
//!
//! 1. the data segment is laid out first so text can refer to data labels;
//! 2. pass one assigns an address to every text label, expanding
//!    pseudo-instructions with unresolved labels taken as zero;
//! 3. pass two expands again with real addresses and encodes every line.
//!
//! An expansion whose length differs between the passes would shift every
//! later label, so it is rejected.

use std::collections::BTreeMap;

use mapache_spec::bits::log2;
use mapache_spec::{BitsError, IsaDescription, Program};
use tracing::{debug, trace};

use crate::data::layout_data;
use crate::encoder::{encode, Resolver};
use crate::error::{AssemblerError, Result};
use crate::lexer::{tokenize, tokenize_line, Token};
use crate::parser::{segment, Statement};

/// Record a label, rejecting redefinitions
pub(crate) fn define_label(
    labels: &mut BTreeMap<String, u64>,
    name: &str,
    addr: u64,
    line: usize,
) -> Result<()> {
    if labels.contains_key(name) {
        return Err(AssemblerError::DuplicateLabel {
            line,
            label: name.to_string(),
        });
    }
    trace!(label = name, addr = format_args!("{addr:#x}"), "label");
    labels.insert(name.to_string(), addr);
    Ok(())
}

/// Assemble `source` at the ISA's default text and data bases
pub fn assemble<D: IsaDescription + ?Sized>(isa: &D, source: &str) -> Result<Program> {
    let layout = isa.config().layout;
    assemble_at(isa, source, layout.text_base, layout.data_base)
}

/// Assemble `source` with explicit text and data bases
pub fn assemble_at<D: IsaDescription + ?Sized>(
    isa: &D,
    source: &str,
    text_base: u64,
    data_base: u64,
) -> Result<Program> {
    let segments = segment(tokenize(source)?)?;
    let mut program = Program::new(text_base, data_base);

    program.data = layout_data(
        &segments.data,
        data_base,
        isa.config().layout.main_end(),
        isa.config().endian,
        &mut program.labels,
    )?;
    trace!(bytes = program.data.len(), "data segment laid out");

    let counts = label_pass(isa, &segments.text, text_base, &mut program.labels)?;
    trace!(labels = program.labels.len(), "label pass done");

    program.text = encode_pass(isa, &segments.text, &counts, &program.labels)?;

    debug!(
        isa = isa.name(),
        text = program.text.len(),
        data = program.data.len(),
        labels = program.labels.len(),
        "assembled program"
    );
    Ok(program)
}

fn mnemonic<'t>(statement: &'t Statement) -> Result<Option<(&'t str, &'t [Token])>> {
    match statement.body.split_first() {
        None => Ok(None),
        Some((Token::Word(m), operands)) => Ok(Some((m.as_str(), operands))),
        Some((other, _)) => Err(AssemblerError::UnexpectedToken {
            line: statement.line,
            token: other.text(),
        }),
    }
}

fn word_shift<D: IsaDescription + ?Sized>(isa: &D) -> u32 {
    // isize is validated as a power of two when the ISA is built
    log2(isa.isize() as u64).unwrap_or(0)
}

/// Expand a pseudo-instruction into real source lines, if `name` is one
fn expand<D: IsaDescription + ?Sized>(
    isa: &D,
    resolver: &Resolver<'_>,
    name: &str,
    operands: &[Token],
    line: usize,
) -> Result<Option<Vec<String>>> {
    let Some(pseudo) = isa.pseudo().get(name) else {
        return Ok(None);
    };
    let fields = resolver.fields(pseudo.format(), operands, line)?;
    let lines = pseudo.expand(&fields).map_err(|e| match e {
        BitsError::Overflow { value, width, .. } => {
            AssemblerError::ImmediateOverflow { line, value, width }
        }
        source => AssemblerError::Expansion {
            line,
            name: name.to_string(),
            source,
        },
    })?;
    Ok(Some(lines))
}

/// Pass one: assign label addresses, returning the slot count of each statement
fn label_pass<D: IsaDescription + ?Sized>(
    isa: &D,
    text: &[Statement],
    text_base: u64,
    labels: &mut BTreeMap<String, u64>,
) -> Result<Vec<usize>> {
    let isize = isa.isize() as u64;
    let mut counts = Vec::with_capacity(text.len());
    let mut slot = 0usize;

    for statement in text {
        if let Some(label) = &statement.label {
            define_label(labels, label, text_base + slot as u64 * isize, statement.line)?;
        }

        let count = match mnemonic(statement)? {
            None => 0,
            Some((name, operands)) => {
                let resolver = Resolver {
                    registers: isa.registers(),
                    labels,
                    word_shift: word_shift(isa),
                    provisional: true,
                };
                match expand(isa, &resolver, name, operands, statement.line)? {
                    Some(lines) => lines.len(),
                    None => 1,
                }
            }
        };
        counts.push(count);
        slot += count;
    }

    Ok(counts)
}

/// Pass two: encode every instruction
fn encode_pass<D: IsaDescription + ?Sized>(
    isa: &D,
    text: &[Statement],
    counts: &[usize],
    labels: &BTreeMap<String, u64>,
) -> Result<Vec<u8>> {
    let resolver = Resolver {
        registers: isa.registers(),
        labels,
        word_shift: word_shift(isa),
        provisional: false,
    };
    let config = isa.config();
    let mut bytes = Vec::new();

    for (statement, &first) in text.iter().zip(counts) {
        let line = statement.line;
        let Some((name, operands)) = mnemonic(statement)? else {
            continue;
        };

        match expand(isa, &resolver, name, operands, line)? {
            Some(lines) => {
                if lines.len() != first {
                    return Err(AssemblerError::UnstableExpansion {
                        line,
                        name: name.to_string(),
                        first,
                        second: lines.len(),
                    });
                }
                for text in &lines {
                    trace!(line, pseudo = name, expanded = %text, "expansion");
                    let tokens = tokenize_line(text, line)?;
                    let Some((Token::Word(real), real_operands)) = tokens.split_first() else {
                        return Err(AssemblerError::UnknownInstruction {
                            line,
                            mnemonic: text.clone(),
                        });
                    };
                    let word = encode_real(isa, &resolver, real, real_operands, line)?;
                    bytes.extend(config.endian.write(word, config.isize));
                }
            }
            None => {
                let word = encode_real(isa, &resolver, name, operands, line)?;
                bytes.extend(config.endian.write(word, config.isize));
            }
        }
    }

    Ok(bytes)
}

fn encode_real<D: IsaDescription + ?Sized>(
    isa: &D,
    resolver: &Resolver<'_>,
    name: &str,
    operands: &[Token],
    line: usize,
) -> Result<u64> {
    let pattern = isa
        .registry()
        .get(name)
        .ok_or_else(|| AssemblerError::UnknownInstruction {
            line,
            mnemonic: name.to_string(),
        })?;
    let fields = resolver.fields(pattern.format(), operands, line)?;
    encode(pattern.template(), pattern.format(), &fields, line)
}
