//! Hand-assembler for bytecode images used across the integration tests.

use stackvm::isa::Width;
use stackvm::{Opcode, MAGIC_V1, MAGIC_V2, PROGRAM_STACK_SIZE};

pub struct Asm {
    magic: u32,
    jtrg_length: i32,
    code: Vec<u8>,
    count: i32,
    data: Vec<u8>,
    bss: i32,
}

#[allow(dead_code)]
impl Asm {
    pub fn new() -> Self {
        Self {
            magic: MAGIC_V1,
            jtrg_length: 0,
            code: Vec::new(),
            count: 0,
            data: Vec::new(),
            bss: PROGRAM_STACK_SIZE as i32,
        }
    }

    /// Switch to the version 2 header (adds the reserved jtrg field).
    pub fn v2(&mut self) -> &mut Self {
        self.magic = MAGIC_V2;
        self
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

    /// Raw code bytes, for malformed-stream tests; not counted.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn data(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn bss(&mut self, bss: i32) -> &mut Self {
        self.bss = bss;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_len: u32 = if self.magic == MAGIC_V2 { 36 } else { 32 };
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&(self.code.len() as i32).to_le_bytes());
        out.extend_from_slice(&(header_len + self.code.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.data.len() as i32).to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes()); // lit
        out.extend_from_slice(&self.bss.to_le_bytes());
        if self.magic == MAGIC_V2 {
            out.extend_from_slice(&self.jtrg_length.to_le_bytes());
        }
        out.extend_from_slice(&self.code);
        out.extend_from_slice(&self.data);
        out
    }
}
