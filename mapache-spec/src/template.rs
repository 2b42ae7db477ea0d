//! # Bit Templates and Assembly Formats
//!
//! An instruction is declared with two strings:
//!
//! ```text
//! template:  001000 sssss ttttt iiiiiiiiiiiiiiii
//! format:    addi $t $s !i
//! ```
//!
//! The template is read most-significant bit first. `0` and `1` are literal
//! bits, `-` is a don't-care, and any letter names a field; a letter that
//! appears several times forms one field whose bits are concatenated in order
//! of appearance. The format names the mnemonic and binds each operand to a
//! field through a one-character sigil:
//!
//! | sigil | operand                                                   |
//! |-------|-----------------------------------------------------------|
//! | `$`   | register name or `$N`                                     |
//! | `@`   | label or address, stored as a word address               |
//! | `&`   | label or address, stored as a byte address               |
//! | `!`   | decimal (or `0x` hex) immediate                          |

use std::fmt;

use crate::error::DefinitionError;
use crate::fields::Fields;

/// One position of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateBit {
    Zero,
    One,
    DontCare,
    Field(char),
}

impl TemplateBit {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            '0' => Some(TemplateBit::Zero),
            '1' => Some(TemplateBit::One),
            '-' => Some(TemplateBit::DontCare),
            c if c.is_ascii_alphabetic() => Some(TemplateBit::Field(c)),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            TemplateBit::Zero => '0',
            TemplateBit::One => '1',
            TemplateBit::DontCare => '-',
            TemplateBit::Field(c) => c,
        }
    }
}

/// A compiled bit template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    bits: Vec<TemplateBit>,
    /// Literal positions
    mask: u64,
    /// Required values at the literal positions
    expected: u64,
    /// Field letters with their widths, in order of first appearance
    fields: Vec<(char, u32)>,
}

impl Template {
    /// Compile a template for an instruction `width` bits wide
    ///
    /// Whitespace inside the template is ignored.
    pub fn parse(name: &str, text: &str, width: usize) -> Result<Self, DefinitionError> {
        if width == 0 || width > 64 {
            return Err(DefinitionError::UnsupportedWidth(width));
        }

        let mut bits = Vec::with_capacity(width);
        for ch in text.chars().filter(|c| !c.is_whitespace()) {
            let bit = TemplateBit::from_char(ch).ok_or_else(|| {
                DefinitionError::TemplateCharacter {
                    name: name.to_string(),
                    ch,
                }
            })?;
            bits.push(bit);
        }

        if bits.len() != width {
            return Err(DefinitionError::TemplateWidth {
                name: name.to_string(),
                expected: width,
                found: bits.len(),
            });
        }

        let mut mask = 0u64;
        let mut expected = 0u64;
        let mut fields: Vec<(char, u32)> = Vec::new();

        for (i, bit) in bits.iter().enumerate() {
            let pos = width - 1 - i;
            match bit {
                TemplateBit::Zero => mask |= 1 << pos,
                TemplateBit::One => {
                    mask |= 1 << pos;
                    expected |= 1 << pos;
                }
                TemplateBit::DontCare => {}
                TemplateBit::Field(c) => match fields.iter_mut().find(|(f, _)| f == c) {
                    Some(entry) => entry.1 += 1,
                    None => fields.push((*c, 1)),
                },
            }
        }

        Ok(Self {
            bits,
            mask,
            expected,
            fields,
        })
    }

    /// Width in bits
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn bits(&self) -> &[TemplateBit] {
        &self.bits
    }

    /// Whether `word` agrees with every literal bit
    #[inline]
    pub fn matches(&self, word: u64) -> bool {
        word & self.mask == self.expected
    }

    /// Collect the named fields of `word`, each assembled MSB-first
    pub fn extract(&self, word: u64) -> Fields {
        let width = self.bits.len();
        let mut fields: Fields = self.fields.iter().map(|(c, _)| (*c, 0)).collect();
        for (i, bit) in self.bits.iter().enumerate() {
            if let TemplateBit::Field(c) = bit {
                let value = (word >> (width - 1 - i)) & 1;
                let current = fields.get(*c).unwrap_or(0);
                fields.set(*c, (current << 1) | value);
            }
        }
        fields
    }

    /// Number of bits a field occupies, if the template declares it
    pub fn field_width(&self, letter: char) -> Option<u32> {
        self.fields
            .iter()
            .find(|(c, _)| *c == letter)
            .map(|(_, w)| *w)
    }

    /// Field letters and widths, in order of first appearance
    pub fn fields(&self) -> &[(char, u32)] {
        &self.fields
    }

    /// True when no word can tell the two templates apart
    ///
    /// Two templates are distinguishable iff at some position one has a
    /// literal `0` and the other a literal `1`.
    pub fn overlaps(&self, other: &Template) -> bool {
        let both = self.mask & other.mask;
        (self.expected ^ other.expected) & both == 0
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = self.bits.iter().map(|b| b.as_char()).collect();
        f.write_str(&text)
    }
}

/// How an operand is written in assembly and stored in its field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// `$`: register number
    Register,
    /// `@`: address stored divided by the instruction size
    WordAddress,
    /// `&`: address stored as-is
    ByteAddress,
    /// `!`: immediate value
    Immediate,
    /// `~`: immediate the instruction sign-extends; listed as signed decimal
    SignedImmediate,
}

impl OperandKind {
    pub fn from_sigil(sigil: char) -> Option<Self> {
        match sigil {
            '$' => Some(OperandKind::Register),
            '@' => Some(OperandKind::WordAddress),
            '&' => Some(OperandKind::ByteAddress),
            '!' => Some(OperandKind::Immediate),
            '~' => Some(OperandKind::SignedImmediate),
            _ => None,
        }
    }

    pub fn sigil(self) -> char {
        match self {
            OperandKind::Register => '$',
            OperandKind::WordAddress => '@',
            OperandKind::ByteAddress => '&',
            OperandKind::Immediate => '!',
            OperandKind::SignedImmediate => '~',
        }
    }

    /// Whether the operand is written as a number rather than a register or label
    pub fn is_immediate(self) -> bool {
        matches!(self, OperandKind::Immediate | OperandKind::SignedImmediate)
    }
}

/// One operand slot of an assembly format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    pub kind: OperandKind,
    pub field: char,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.sigil(), self.field)
    }
}

/// The assembly side of an instruction declaration: `mnemonic op op ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmFormat {
    mnemonic: String,
    operands: Vec<Operand>,
}

impl AsmFormat {
    /// Parse a format such as `"lw $t, !i, $s"` (commas are optional)
    pub fn parse(name: &str, text: &str) -> Result<Self, DefinitionError> {
        let cleaned = text.replace(',', " ");
        let mut parts = cleaned.split_whitespace();
        let mnemonic = parts
            .next()
            .ok_or_else(|| DefinitionError::EmptyFormat(name.to_string()))?
            .to_string();

        let operands = parts
            .map(|part| {
                let mut chars = part.chars();
                let kind = chars.next().and_then(OperandKind::from_sigil);
                let field = chars.next().filter(|c| c.is_ascii_alphabetic());
                match (kind, field, chars.next()) {
                    (Some(kind), Some(field), None) => Ok(Operand { kind, field }),
                    _ => Err(DefinitionError::BadOperand {
                        operand: part.to_string(),
                        format: text.to_string(),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { mnemonic, operands })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }
}

impl fmt::Display for AsmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)?;
        for op in &self.operands {
            write!(f, " {op}")?;
        }
        Ok(())
    }
}

/// A validated instruction: template plus assembly format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPattern {
    name: String,
    template: Template,
    format: AsmFormat,
}

impl InstructionPattern {
    pub fn new(
        name: &str,
        template: &str,
        format: &str,
        width: usize,
    ) -> Result<Self, DefinitionError> {
        let template = Template::parse(name, template, width)?;
        let format = AsmFormat::parse(name, format)?;

        if format.mnemonic() != name {
            return Err(DefinitionError::NameMismatch {
                name: name.to_string(),
                mnemonic: format.mnemonic().to_string(),
            });
        }

        for op in format.operands() {
            if template.field_width(op.field).is_none() {
                return Err(DefinitionError::MissingField {
                    name: name.to_string(),
                    field: op.field,
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            template,
            format,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn format(&self) -> &AsmFormat {
        &self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template() {
        let t = Template::parse("addi", "001000 sssss ttttt iiiiiiiiiiiiiiii", 32).unwrap();
        assert_eq!(t.width(), 32);
        assert_eq!(t.field_width('s'), Some(5));
        assert_eq!(t.field_width('t'), Some(5));
        assert_eq!(t.field_width('i'), Some(16));
        assert_eq!(t.field_width('x'), None);
        assert_eq!(t.to_string(), "001000sssssttttti".to_string() + &"i".repeat(15));
    }

    #[test]
    fn test_template_width_mismatch() {
        let err = Template::parse("add", "0000", 8).unwrap_err();
        assert_eq!(
            err,
            DefinitionError::TemplateWidth {
                name: "add".to_string(),
                expected: 8,
                found: 4
            }
        );
    }

    #[test]
    fn test_template_bad_character() {
        let err = Template::parse("add", "0000000*", 8).unwrap_err();
        assert!(matches!(err, DefinitionError::TemplateCharacter { ch: '*', .. }));
    }

    #[test]
    fn test_matches_and_extract() {
        let t = Template::parse("addi", "001000 sssss ttttt iiiiiiiiiiiiiiii", 32).unwrap();
        let word = 0x2108_0004;
        assert!(t.matches(word));
        let fields = t.extract(word);
        assert_eq!(fields['s'], 8);
        assert_eq!(fields['t'], 8);
        assert_eq!(fields['i'], 4);

        assert!(!t.matches(0x0800_4001));
    }

    #[test]
    fn test_split_field_concatenates_in_order() {
        // 'a' appears twice, separated by a literal
        let t = Template::parse("x", "aa1a", 4).unwrap();
        let fields = t.extract(0b1011);
        assert_eq!(fields['a'], 0b101);
    }

    #[test]
    fn test_dont_care_ignored() {
        let t = Template::parse("jr", "10--", 4).unwrap();
        assert!(t.matches(0b1000));
        assert!(t.matches(0b1011));
        assert!(!t.matches(0b0011));
        assert!(t.extract(0b1011).is_empty());
    }

    #[test]
    fn test_overlap() {
        let add = Template::parse("add", "00aabbdd", 8).unwrap();
        let sub = Template::parse("sub", "01aabbdd", 8).unwrap();
        let any = Template::parse("any", "-1------", 8).unwrap();
        assert!(!add.overlaps(&sub));
        assert!(!add.overlaps(&any));
        assert!(sub.overlaps(&any));
    }

    #[test]
    fn test_asm_format() {
        let f = AsmFormat::parse("lw", "lw $t, !i, $s").unwrap();
        assert_eq!(f.mnemonic(), "lw");
        assert_eq!(
            f.operands(),
            &[
                Operand { kind: OperandKind::Register, field: 't' },
                Operand { kind: OperandKind::Immediate, field: 'i' },
                Operand { kind: OperandKind::Register, field: 's' },
            ]
        );
        assert_eq!(f.to_string(), "lw $t !i $s");

        let addi = AsmFormat::parse("addi", "addi $t $s ~i").unwrap();
        assert_eq!(addi.operands()[2].kind, OperandKind::SignedImmediate);
        assert!(addi.operands()[2].kind.is_immediate());
        assert_eq!(addi.to_string(), "addi $t $s ~i");
    }

    #[test]
    fn test_asm_format_bad_operand() {
        assert!(AsmFormat::parse("j", "j ^a").is_err());
        assert!(AsmFormat::parse("j", "j @ab").is_err());
        assert!(AsmFormat::parse("j", "j @").is_err());
        assert!(matches!(AsmFormat::parse("j", "  "), Err(DefinitionError::EmptyFormat(_))));
    }

    #[test]
    fn test_pattern_name_mismatch() {
        let err = InstructionPattern::new("add", "00aabbdd", "addi $d $a $b", 8).unwrap_err();
        assert_eq!(
            err,
            DefinitionError::NameMismatch {
                name: "add".to_string(),
                mnemonic: "addi".to_string()
            }
        );
    }

    #[test]
    fn test_pattern_missing_field() {
        let err = InstructionPattern::new("add", "00aabbdd", "add $d $a $c", 8).unwrap_err();
        assert!(matches!(err, DefinitionError::MissingField { field: 'c', .. }));
    }
}
