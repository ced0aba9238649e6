use std::fmt;

use crate::isa::{Opcode, Width};

/// A decoded instruction: an opcode plus its (possibly unused) immediate.
///
/// The dense byte stream of the image is expanded into an array of these at
/// load time so the interpreter indexes instructions by program counter
/// instead of re-scanning variable-length encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr {
    pub op: Opcode,
    pub imm: i32,
}

impl Instr {
    pub fn bare(op: Opcode) -> Self {
        Self { op, imm: 0 }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op.width() {
            Width::None => write!(f, "{}", self.op.mnemonic()),
            _ => write!(f, "{} {}", self.op.mnemonic(), self.imm),
        }
    }
}
