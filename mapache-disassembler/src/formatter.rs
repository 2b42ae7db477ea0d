//! Instruction formatting to assembly text

use mapache_spec::bits::sign_extend;
use mapache_spec::{IsaDescription, OperandKind};

use crate::decoder::DecodedInstruction;

/// Render a decoded instruction in the syntax the assembler accepts
///
/// Registers print as their alias (`$t0`), word addresses are scaled back to
/// byte addresses, `!` immediates print as unsigned decimal and `~`
/// immediates as signed decimal of their field width.
pub fn format<D: IsaDescription + ?Sized>(
    description: &D,
    decoded: &DecodedInstruction<'_>,
) -> String {
    let registers = description.registers();
    let shift = description.isize().trailing_zeros();

    let mut text = decoded.name().to_string();
    for operand in decoded.pattern.format().operands() {
        let value = decoded.fields.get(operand.field).unwrap_or(0);
        let rendered = match operand.kind {
            OperandKind::Register => registers
                .primary()
                .and_then(|file| registers.alias(file, value as usize))
                .map(str::to_string)
                .unwrap_or_else(|| format!("${value}")),
            OperandKind::WordAddress => format!("{:#x}", value << shift),
            OperandKind::ByteAddress => format!("{value:#x}"),
            OperandKind::Immediate => value.to_string(),
            OperandKind::SignedImmediate => {
                // operand fields are checked against the template when the registry is built
                let width = decoded.pattern.template().field_width(operand.field).unwrap_or(64);
                match sign_extend(value, width) {
                    Ok(n) => n.to_string(),
                    Err(_) => value.to_string(),
                }
            }
        };
        text.push(' ');
        text.push_str(&rendered);
    }
    text
}
