//! Minimal image assembler for scheduler tests.

use stackvm::isa::Width;
use stackvm::{Opcode, MAGIC_V1, PROGRAM_STACK_SIZE};

pub struct Asm {
    code: Vec<u8>,
    count: i32,
    data: Vec<u8>,
}

#[allow(dead_code)]
impl Asm {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            count: 0,
            data: Vec::new(),
        }
    }

    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.op_imm(op, 0)
    }

    pub fn op_imm(&mut self, op: Opcode, imm: i32) -> &mut Self {
        self.code.push(op as u8);
        match op.width() {
            Width::None => {}
            Width::Byte => self.code.push(imm as u8),
            Width::Word => self.code.extend_from_slice(&imm.to_le_bytes()),
        }
        self.count += 1;
        self
    }

    pub fn data(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_len: u32 = 32;
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC_V1.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&(self.code.len() as i32).to_le_bytes());
        out.extend_from_slice(&(header_len + self.code.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.data.len() as i32).to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes()); // lit
        out.extend_from_slice(&(PROGRAM_STACK_SIZE as i32).to_le_bytes());
        out.extend_from_slice(&self.code);
        out.extend_from_slice(&self.data);
        out
    }
}
