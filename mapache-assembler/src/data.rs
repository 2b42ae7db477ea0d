//! Data segment layout
//!
//! Each data statement is `[label:] .type value[, value...]`. Values are laid
//! out in order starting at the data base; numeric values are padded to their
//! natural alignment first, and the label names the first value after its
//! padding. Further values on the same line are reachable as `label[1]`,
//! `label[2]`, and so on.

use std::collections::BTreeMap;

use mapache_spec::bits::parse_int;
use mapache_spec::Endian;
use tracing::trace;

use crate::assembler::define_label;
use crate::error::{AssemblerError, Result};
use crate::lexer::Token;
use crate::parser::Statement;

/// Lay out the data segment, recording its labels
///
/// The segment must end at or before `data_end`.
pub fn layout_data(
    statements: &[Statement],
    data_base: u64,
    data_end: u64,
    endian: Endian,
    labels: &mut BTreeMap<String, u64>,
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();

    for statement in statements {
        let line = statement.line;
        let mut body = statement.body.iter();

        let directive = match body.next() {
            Some(Token::Directive(d)) => d.as_str(),
            Some(other) => {
                return Err(AssemblerError::UnexpectedToken {
                    line,
                    token: other.text(),
                })
            }
            None => {
                // label-only line names the next free byte
                if let Some(label) = &statement.label {
                    define_label(labels, label, data_base + bytes.len() as u64, line)?;
                }
                continue;
            }
        };

        let values: Vec<&Token> = body.collect();
        if values.is_empty() {
            return Err(AssemblerError::InvalidData {
                line,
                message: format!(".{directive} needs at least one value"),
            });
        }

        let mut addresses = Vec::with_capacity(values.len());
        match directive {
            "ascii" | "asciiz" => {
                for value in values {
                    let Token::Str(raw) = value else {
                        return Err(AssemblerError::InvalidData {
                            line,
                            message: format!("expected a string, found {}", value.text()),
                        });
                    };
                    addresses.push(data_base + bytes.len() as u64);
                    bytes.extend(unescape(raw, line)?);
                    if directive == "asciiz" {
                        bytes.push(0);
                    }
                }
            }
            "word" | "half" | "byte" => {
                let size = match directive {
                    "word" => 4,
                    "half" => 2,
                    _ => 1,
                };
                for value in values {
                    let n = number(value, line)?;
                    let bits = size * 8;
                    let min = -(1i128 << (bits - 1));
                    let max = (1i128 << bits) - 1;
                    if !(min..=max).contains(&(n as i128)) {
                        return Err(AssemblerError::DataOverflow {
                            line,
                            value: n,
                            directive: directive.to_string(),
                        });
                    }
                    while (data_base + bytes.len() as u64) % size as u64 != 0 {
                        bytes.push(0);
                    }
                    addresses.push(data_base + bytes.len() as u64);
                    bytes.extend(endian.write(n as u64, size));
                }
            }
            "space" => {
                for value in values {
                    let n = number(value, line)?;
                    if n < 0 {
                        return Err(AssemblerError::InvalidData {
                            line,
                            message: format!("negative .space size {n}"),
                        });
                    }
                    let start = data_base + bytes.len() as u64;
                    if start.checked_add(n as u64).map_or(true, |end| end > data_end) {
                        return Err(AssemblerError::DataOverflow {
                            line,
                            value: n,
                            directive: directive.to_string(),
                        });
                    }
                    addresses.push(start);
                    bytes.resize(bytes.len() + n as usize, 0);
                }
            }
            other => {
                return Err(AssemblerError::UnknownDirective {
                    line,
                    directive: other.to_string(),
                })
            }
        }

        if let Some(label) = &statement.label {
            for (i, addr) in addresses.iter().enumerate() {
                let name = if i == 0 {
                    label.clone()
                } else {
                    format!("{label}[{i}]")
                };
                define_label(labels, &name, *addr, line)?;
            }
        }
        if data_base + bytes.len() as u64 > data_end {
            return Err(AssemblerError::InvalidData {
                line,
                message: format!("data segment runs past {data_end:#x}"),
            });
        }
        trace!(line, directive, end = bytes.len(), "data statement");
    }

    Ok(bytes)
}

fn number(token: &Token, line: usize) -> Result<i64> {
    match token {
        Token::Word(w) => parse_int(w).ok_or_else(|| AssemblerError::InvalidData {
            line,
            message: format!("\"{w}\" is not a number"),
        }),
        other => Err(AssemblerError::InvalidData {
            line,
            message: format!("expected a number, found {}", other.text()),
        }),
    }
}

/// Decode backslash escapes of a string literal
pub fn unescape(raw: &str, line: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let decoded = match chars.next() {
            Some('n') => b'\n',
            Some('t') => b'\t',
            Some('r') => b'\r',
            Some('0') => 0,
            Some('\\') => b'\\',
            Some('"') => b'"',
            Some('\'') => b'\'',
            other => {
                return Err(AssemblerError::InvalidData {
                    line,
                    message: format!("unknown escape \\{}", other.map(String::from).unwrap_or_default()),
                })
            }
        };
        out.push(decoded);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::segment;

    fn layout(source: &str) -> Result<(Vec<u8>, BTreeMap<String, u64>)> {
        let segments = segment(tokenize(source)?)?;
        let mut labels = BTreeMap::new();
        let bytes = layout_data(&segments.data, 0x40000, 0x41000, Endian::Big, &mut labels)?;
        Ok((bytes, labels))
    }

    #[test]
    fn test_asciiz_and_alignment() {
        let (bytes, labels) = layout(".data\nmsg: .asciiz \"hi\"\nnum: .word 7\n").unwrap();
        assert_eq!(bytes, vec![b'h', b'i', 0, 0, 0, 0, 0, 7]);
        assert_eq!(labels["msg"], 0x40000);
        assert_eq!(labels["num"], 0x40004);
    }

    #[test]
    fn test_array_labels() {
        let (bytes, labels) = layout(".data\narr: .half 1, -1, 0xffff\n").unwrap();
        assert_eq!(bytes, vec![0, 1, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(labels["arr"], 0x40000);
        assert_eq!(labels["arr[1]"], 0x40002);
        assert_eq!(labels["arr[2]"], 0x40004);
    }

    #[test]
    fn test_byte_space_ascii() {
        let (bytes, labels) =
            layout(".data\nb: .byte 255, -128\ngap: .space 3\ns: .ascii \"a\\n\"\n").unwrap();
        assert_eq!(bytes, vec![0xff, 0x80, 0, 0, 0, b'a', b'\n']);
        assert_eq!(labels["gap"], 0x40002);
        assert_eq!(labels["s"], 0x40005);
    }

    #[test]
    fn test_space_stays_inside_region() {
        let (bytes, _) = layout(".data\nall: .space 4096\n").unwrap();
        assert_eq!(bytes.len(), 0x1000);
        assert_eq!(
            layout(".data\nb: .byte 1\nrest: .space 4096\n").unwrap_err(),
            AssemblerError::DataOverflow {
                line: 3,
                value: 4096,
                directive: "space".to_string()
            }
        );
        assert!(matches!(
            layout(".data\nhuge: .space 0x7fffffffffffffff\n").unwrap_err(),
            AssemblerError::DataOverflow { line: 2, .. }
        ));
    }

    #[test]
    fn test_words_past_region_end() {
        assert!(matches!(
            layout(".data\ngap: .space 4094\nw: .word 1\n").unwrap_err(),
            AssemblerError::InvalidData { line: 3, .. }
        ));
    }

    #[test]
    fn test_word_range() {
        assert!(layout(".data\nw: .word 4294967295, -2147483648\n").is_ok());
        let err = layout(".data\nw: .word 4294967296\n").unwrap_err();
        assert!(matches!(err, AssemblerError::DataOverflow { line: 2, .. }));
        let err = layout(".data\nb: .byte -129\n").unwrap_err();
        assert!(matches!(err, AssemblerError::DataOverflow { .. }));
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            layout(".data\nw: .word abc\n").unwrap_err(),
            AssemblerError::InvalidData { line: 2, .. }
        ));
        assert!(matches!(
            layout(".data\ns: .asciiz 5\n").unwrap_err(),
            AssemblerError::InvalidData { .. }
        ));
        assert!(matches!(
            layout(".data\nw: .word\n").unwrap_err(),
            AssemblerError::InvalidData { .. }
        ));
        assert!(matches!(
            layout(".data\nw: foo 1\n").unwrap_err(),
            AssemblerError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_duplicate_data_label() {
        let err = layout(".data\nx: .byte 1\nx: .byte 2\n").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::DuplicateLabel {
                line: 3,
                label: "x".to_string()
            }
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\tb\\\"\0"#, 1).unwrap(), b"a\tb\\\"\0".to_vec());
        assert!(unescape(r"\q", 1).is_err());
    }
}
