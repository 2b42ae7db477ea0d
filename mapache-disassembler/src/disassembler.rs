//! Program listings

use std::fmt::Write;

use mapache_spec::{IsaDescription, Program};

use crate::decoder::decode;
use crate::formatter::format;

/// List the text segment of `program`, one instruction per line
///
/// Each line is `address: hex  assembly`. Words that do not decode are
/// listed with the error instead of assembly text, and a trailing partial
/// word is reported the same way.
pub fn disassemble<D: IsaDescription + ?Sized>(description: &D, program: &Program) -> String {
    let isize = description.isize();
    let endian = description.config().endian;
    let mut output = String::new();

    let _ = writeln!(output, "# {} disassembly", description.name());
    let _ = writeln!(
        output,
        "# text {:#x}, {} bytes",
        program.text_base,
        program.text.len()
    );

    for (i, chunk) in program.text.chunks(isize).enumerate() {
        let addr = program.text_base + (i * isize) as u64;
        let hex: String = chunk.iter().map(|b| format!("{b:02x}")).collect();

        let labels: Vec<&str> = program
            .labels
            .iter()
            .filter(|(_, &a)| a == addr)
            .map(|(name, _)| name.as_str())
            .collect();
        for label in labels {
            let _ = writeln!(output, "{label}:");
        }

        let text = match decode(description.registry(), endian, chunk) {
            Ok(decoded) => format(description, &decoded),
            Err(e) => format!("# error: {e}"),
        };
        let _ = writeln!(output, "{addr:#010x}: {hex:<width$}  {text}", width = isize * 2);
    }

    output
}
