//! Integration tests for the MapacheSIM assembler
//!
//! Tests the complete assembly workflow including:
//! - Label resolution across the two passes
//! - Data segment layout and data labels used from text
//! - Pseudo-instruction expansion
//! - Decoding the result back to the written operands

mod common;

use common::{words, TestIsa};
use mapache_assembler::{assemble, assemble_at};
use mapache_disassembler::{decode, format};
use mapache_spec::IsaDescription;

const LOOP: &str = r#"
.text
        addi $t0 $t0 4
loop:   addi $t1 $t1 4
        j loop
        nop
        addi $t2 $t2 4
"#;

// ============================================================================
// Text Segment
// ============================================================================

#[test]
fn test_loop_program() {
    let isa = TestIsa::new();
    let program = assemble(&isa, LOOP).unwrap();

    assert_eq!(program.text_base, 0x10000);
    assert_eq!(program.label("loop"), Some(0x10004));
    assert_eq!(
        words(&program.text),
        vec![0x2108_0004, 0x2129_0004, 0x0800_4001, 0x0000_0000, 0x214a_0004]
    );
}

#[test]
fn test_jump_field_is_word_address() {
    let isa = TestIsa::new();
    let program = assemble(&isa, LOOP).unwrap();
    let decoded = decode(isa.registry(), isa.config().endian, &program.text[8..12]).unwrap();
    assert_eq!(decoded.name(), "j");
    assert_eq!(decoded.fields['a'], 0x10004 >> 2);
}

#[test]
fn test_forward_reference() {
    let isa = TestIsa::new();
    let program = assemble(&isa, ".text\nj end\nnop\nend: nop\n").unwrap();
    assert_eq!(program.label("end"), Some(0x10008));
    assert_eq!(words(&program.text)[0], 0x0800_4002);
}

#[test]
fn test_label_only_lines_take_no_slot() {
    let isa = TestIsa::new();
    let program = assemble(&isa, ".text\nfirst:\nsecond:\n  nop\nthird: nop\n").unwrap();
    assert_eq!(program.label("first"), Some(0x10000));
    assert_eq!(program.label("second"), Some(0x10000));
    assert_eq!(program.label("third"), Some(0x10004));
    assert_eq!(program.text.len(), 8);
}

#[test]
fn test_custom_bases() {
    let isa = TestIsa::new();
    let program = assemble_at(&isa, LOOP, 0x20000, 0x50000).unwrap();
    assert_eq!(program.label("loop"), Some(0x20004));
    assert_eq!(words(&program.text)[2], 0x0800_8001);
}

#[test]
fn test_comma_and_paren_operands() {
    let isa = TestIsa::new();
    let program = assemble(&isa, ".text\nlw $t0, 8($sp)\n").unwrap();
    // lw: 100011 sssss ttttt iiii
    assert_eq!(words(&program.text), vec![0x8fa8_0008]);
}

#[test]
fn test_negative_immediate() {
    let isa = TestIsa::new();
    let program = assemble(&isa, ".text\naddi $t0 $zero -1\naddi $t0 $zero 0xffff\n").unwrap();
    assert_eq!(words(&program.text), vec![0x2008_ffff, 0x2008_ffff]);
}

#[test]
fn test_numeric_register_names() {
    let isa = TestIsa::new();
    let a = assemble(&isa, ".text\nadd $t0 $t1 $t2\n").unwrap();
    let b = assemble(&isa, ".text\nadd $8 $9 $10\n").unwrap();
    assert_eq!(a.text, b.text);
}

// ============================================================================
// Data Segment
// ============================================================================

#[test]
fn test_data_labels_visible_from_text() {
    let isa = TestIsa::new();
    let source = r#"
.data
msg:    .asciiz "hi"
val:    .word 0x12345678
.text
        la $t0 val
"#;
    let program = assemble(&isa, source).unwrap();
    assert_eq!(program.data, vec![b'h', b'i', 0, 0, 0x12, 0x34, 0x56, 0x78]);
    assert_eq!(program.label("msg"), Some(0x40000));
    assert_eq!(program.label("val"), Some(0x40004));
    assert_eq!(words(&program.text), vec![0x3c08_0004, 0x3508_0004]);
}

#[test]
fn test_text_and_data_may_come_in_any_order() {
    let isa = TestIsa::new();
    let source = ".text\nla $a0 msg\n.data\nmsg: .asciiz \"x\"\n";
    let program = assemble(&isa, source).unwrap();
    assert_eq!(words(&program.text), vec![0x3c04_0004, 0x3484_0000]);
}

// ============================================================================
// Pseudo-instructions
// ============================================================================

#[test]
fn test_pseudo_expansion_counts_every_line() {
    let isa = TestIsa::new();
    let source = r#"
.data
buf: .space 16
.text
        la $a0 buf
after:  move $t0 $a0
end:    nop
"#;
    let program = assemble(&isa, source).unwrap();
    assert_eq!(program.label("after"), Some(0x10008));
    assert_eq!(program.label("end"), Some(0x1000c));
    assert_eq!(
        words(&program.text),
        vec![0x3c04_0004, 0x3484_0000, 0x0080_4020, 0x0000_0000]
    );
}

#[test]
fn test_assemble_then_decode_reproduces_operands() {
    let isa = TestIsa::new();
    let source = ".text\nadd $t2 $s1 $ra\naddi $sp $sp 12\nlui $at 0x1001\nsll $v0 $a1 31\n";
    let program = assemble(&isa, source).unwrap();
    let listing: Vec<String> = program
        .text
        .chunks(4)
        .map(|c| format(&isa, &decode(isa.registry(), isa.config().endian, c).unwrap()))
        .collect();
    assert_eq!(
        listing,
        vec![
            "add $t2 $s1 $ra",
            "addi $sp $sp 12",
            "lui $at 4097",
            "sll $v0 $a1 31",
        ]
    );
}
