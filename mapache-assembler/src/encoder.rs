//! Operand resolution and template encoding

use std::collections::BTreeMap;

use mapache_spec::bits::{int_to_bits, parse_int};
use mapache_spec::{AsmFormat, Fields, OperandKind, RegisterBank, Signedness, Template, TemplateBit};

use crate::error::{AssemblerError, Result};
use crate::lexer::Token;

/// What operand resolution can see
pub struct Resolver<'a> {
    pub registers: &'a RegisterBank,
    pub labels: &'a BTreeMap<String, u64>,
    /// log2 of the instruction size, for `@` operands
    pub word_shift: u32,
    /// Resolve unknown labels to zero instead of failing (first pass)
    pub provisional: bool,
}

impl Resolver<'_> {
    /// Value of one operand as written in the source
    pub fn resolve(&self, kind: OperandKind, token: &Token, line: usize) -> Result<i64> {
        let Token::Word(text) = token else {
            return Err(AssemblerError::UnexpectedToken {
                line,
                token: token.text(),
            });
        };

        match kind {
            OperandKind::Register => self
                .registers
                .lookup(text)
                .map(|n| n as i64)
                .ok_or_else(|| AssemblerError::InvalidRegister {
                    line,
                    name: text.clone(),
                }),
            OperandKind::WordAddress => Ok(self.address(text, line)? >> self.word_shift),
            OperandKind::ByteAddress => self.address(text, line),
            OperandKind::Immediate | OperandKind::SignedImmediate => {
                parse_int(text).ok_or_else(|| AssemblerError::InvalidImmediate {
                    line,
                    text: text.clone(),
                })
            }
        }
    }

    fn address(&self, text: &str, line: usize) -> Result<i64> {
        if let Some(&addr) = self.labels.get(text) {
            return Ok(addr as i64);
        }
        if let Some(n) = parse_int(text) {
            return Ok(n);
        }
        if self.provisional {
            Ok(0)
        } else {
            Err(AssemblerError::UndefinedLabel {
                line,
                label: text.to_string(),
            })
        }
    }

    /// Resolve all operands of `format` into field values
    ///
    /// Negative values are kept as their two's complement bit pattern.
    pub fn fields(&self, format: &AsmFormat, operands: &[Token], line: usize) -> Result<Fields> {
        if operands.len() != format.operands().len() {
            return Err(AssemblerError::OperandCount {
                line,
                mnemonic: format.mnemonic().to_string(),
                expected: format.operands().len(),
                found: operands.len(),
            });
        }
        format
            .operands()
            .iter()
            .zip(operands)
            .map(|(op, token)| Ok((op.field, self.resolve(op.kind, token, line)? as u64)))
            .collect()
    }
}

/// Encode resolved operand values into an instruction word
///
/// Each value is checked against its field width: negative values as
/// two's complement, others as unsigned. Template letters with no operand
/// and `-` positions encode as zero.
pub fn encode(template: &Template, format: &AsmFormat, fields: &Fields, line: usize) -> Result<u64> {
    let mut packed = Fields::new();
    for op in format.operands() {
        let width = template.field_width(op.field).unwrap_or(0);
        let value = fields.get(op.field).unwrap_or(0) as i64;
        let signedness = if value < 0 {
            Signedness::Signed
        } else {
            Signedness::Unsigned
        };
        let bits = int_to_bits(value, width, signedness).map_err(|_| match op.kind {
            OperandKind::Register => AssemblerError::RegisterOverflow { line, value, width },
            OperandKind::Immediate | OperandKind::SignedImmediate => {
                AssemblerError::ImmediateOverflow { line, value, width }
            }
            OperandKind::WordAddress | OperandKind::ByteAddress => {
                AssemblerError::AddressOverflow { line, value, width }
            }
        })?;
        packed.set(op.field, bits.value());
    }

    // bits still to emit for each letter, most significant first
    let mut remaining: Vec<(char, u32)> = template.fields().to_vec();
    let mut word = 0u64;
    for bit in template.bits() {
        let b = match bit {
            TemplateBit::Zero | TemplateBit::DontCare => 0,
            TemplateBit::One => 1,
            TemplateBit::Field(c) => match remaining.iter_mut().find(|(f, _)| f == c) {
                Some(entry) => {
                    entry.1 -= 1;
                    (packed.get(*c).unwrap_or(0) >> entry.1) & 1
                }
                None => 0,
            },
        };
        word = (word << 1) | b;
    }
    Ok(word)
}
