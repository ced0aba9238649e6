mod common;

use common::Asm;
use stackvm::{Opcode, Vm};

#[test]
fn listing_covers_every_opcode() {
    let mut asm = Asm::new();
    for value in 0..60u8 {
        let op = Opcode::from_u8(value).expect("dense opcode space");
        asm.op_imm(op, 7);
    }
    let vm = Vm::load(&asm.build()).expect("load");
    let listing = vm.disassemble();

    // One line per decoded instruction; the power-of-two padding is not
    // listed.
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 60);

    for (value, line) in lines.iter().enumerate() {
        let op = Opcode::from_u8(value as u8).unwrap();
        assert!(
            line.contains(op.mnemonic()),
            "line {:?} should name {}",
            line,
            op.mnemonic()
        );
    }

    // Word immediates are rendered, flagless opcodes are bare.
    assert!(lines[Opcode::Const as usize].trim().ends_with("CONST 7"));
    assert!(lines[Opcode::Arg as usize].trim().ends_with("ARG 7"));
    assert!(lines[Opcode::Add as usize].trim().ends_with("ADD"));
}

#[test]
fn unknown_byte_values_decode_to_none() {
    assert!(Opcode::from_u8(60).is_none());
    assert!(Opcode::from_u8(255).is_none());
}

#[test]
fn block_copy_mnemonic_keeps_the_underscore() {
    assert_eq!(Opcode::BlockCopy.mnemonic(), "BLOCK_COPY");
}
