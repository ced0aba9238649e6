use crate::image::LoadError;
use crate::instruction::Instr;
use crate::isa::{Opcode, Width};

/// Expands the dense code section into an indexable instruction array.
///
/// Each opcode byte is followed by 0, 1, or 4 operand bytes per the fixed
/// per-opcode table; an unknown opcode or an operand running past the end
/// of the section rejects the whole image. The result is rounded up to a
/// power of two and padded with `UNDEF` so any program counter that fits
/// the code mask lands on a real slot, and the padded slots fault.
///
/// Returns the array and the pre-padding instruction count.
pub fn decode(code: &[u8]) -> Result<(Vec<Instr>, usize), LoadError> {
    let mut out = Vec::new();
    let mut at = 0;
    while at < code.len() {
        let byte = code[at];
        let op = Opcode::from_u8(byte).ok_or(LoadError::UnknownOpcode {
            opcode: byte,
            offset: at,
        })?;
        if at + op.encoded_len() > code.len() {
            return Err(LoadError::TruncatedInstruction {
                mnemonic: op.mnemonic(),
                offset: at,
            });
        }
        let imm = match op.width() {
            Width::None => 0,
            Width::Byte => code[at + 1] as i32,
            Width::Word => i32::from_le_bytes(code[at + 1..at + 5].try_into().unwrap()),
        };
        out.push(Instr { op, imm });
        at += op.encoded_len();
    }

    let decoded = out.len();
    let padded = decoded.next_power_of_two().max(1);
    out.resize(padded, Instr::bare(Opcode::Undef));
    Ok((out, decoded))
}
