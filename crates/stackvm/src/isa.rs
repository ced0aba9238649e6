/// The instruction set of the stack machine.
///
/// Byte values are fixed by the image format: the code section is a dense
/// stream of opcode bytes, each followed by the operand its [`Width`]
/// dictates. The set splits into frame control (`ENTER`/`LEAVE`), calls,
/// stack and constant manipulation, sixteen compare-and-branch forms,
/// heap access, and integer/bitwise/float arithmetic.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Illegal instruction. Also used to pad the decoded code array so a
    /// runaway program counter faults instead of wrapping silently.
    Undef = 0,
    /// No operation.
    Ignore = 1,
    /// Debugger breakpoint. Nothing in this runtime emits it; executing one
    /// faults like `UNDEF`.
    Break = 2,
    /// Reserve `imm` bytes of program stack for the current frame.
    Enter = 3,
    /// Release `imm` bytes of program stack, then resume at the saved
    /// return pc (or finish on the terminal sentinel).
    Leave = 4,
    /// Pop a call target. Non-negative targets jump within the code
    /// segment; negative targets trap into the host syscall table.
    Call = 5,
    /// Push a zero slot onto the operand stack.
    Push = 6,
    /// Discard the top of the operand stack.
    Pop = 7,
    /// Push the 32-bit immediate.
    Const = 8,
    /// Push the effective address `program_stack + imm`.
    Local = 9,
    /// Pop an instruction index and jump to it.
    Jump = 10,

    // Compare-and-branch: pop two operands, branch to the immediate
    // instruction index when the comparison holds.
    Eq = 11,
    Ne = 12,
    Lti = 13,
    Lei = 14,
    Gti = 15,
    Gei = 16,
    Ltu = 17,
    Leu = 18,
    Gtu = 19,
    Geu = 20,
    Eqf = 21,
    Nef = 22,
    Ltf = 23,
    Lef = 24,
    Gtf = 25,
    Gef = 26,

    /// Replace the top of stack (an address) with the byte it points at.
    Load1 = 27,
    /// As `LOAD1` for an aligned 16-bit halfword.
    Load2 = 28,
    /// As `LOAD1` for an aligned 32-bit word.
    Load4 = 29,
    /// Pop value then address, store the low byte.
    Store1 = 30,
    /// Pop value then address, store an aligned halfword.
    Store2 = 31,
    /// Pop value then address, store an aligned word.
    Store4 = 32,
    /// Pop a value and write it to the program-stack slot `imm` (one-byte
    /// immediate); used to marshal call arguments.
    Arg = 33,
    /// Pop source then destination heap address, copy `imm` bytes.
    BlockCopy = 34,

    /// Sign-extend the low 8 bits of the top of stack.
    Sex8 = 35,
    /// Sign-extend the low 16 bits of the top of stack.
    Sex16 = 36,
    Negi = 37,
    Add = 38,
    Sub = 39,
    Divi = 40,
    Divu = 41,
    Modi = 42,
    Modu = 43,
    Muli = 44,
    Mulu = 45,
    Band = 46,
    Bor = 47,
    Bxor = 48,
    Bcom = 49,
    Lsh = 50,
    Rshi = 51,
    Rshu = 52,
    Negf = 53,
    Addf = 54,
    Subf = 55,
    Divf = 56,
    Mulf = 57,
    /// Convert the integer on top of stack to a float (raw bits).
    Cvif = 58,
    /// Truncate the float on top of stack to an integer.
    Cvfi = 59,
}

/// Operand carried by an opcode in the encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Bare opcode byte.
    None,
    /// One unsigned byte (only `ARG`).
    Byte,
    /// Four little-endian bytes.
    Word,
}

const OPCODES: [Opcode; 60] = [
    Opcode::Undef,
    Opcode::Ignore,
    Opcode::Break,
    Opcode::Enter,
    Opcode::Leave,
    Opcode::Call,
    Opcode::Push,
    Opcode::Pop,
    Opcode::Const,
    Opcode::Local,
    Opcode::Jump,
    Opcode::Eq,
    Opcode::Ne,
    Opcode::Lti,
    Opcode::Lei,
    Opcode::Gti,
    Opcode::Gei,
    Opcode::Ltu,
    Opcode::Leu,
    Opcode::Gtu,
    Opcode::Geu,
    Opcode::Eqf,
    Opcode::Nef,
    Opcode::Ltf,
    Opcode::Lef,
    Opcode::Gtf,
    Opcode::Gef,
    Opcode::Load1,
    Opcode::Load2,
    Opcode::Load4,
    Opcode::Store1,
    Opcode::Store2,
    Opcode::Store4,
    Opcode::Arg,
    Opcode::BlockCopy,
    Opcode::Sex8,
    Opcode::Sex16,
    Opcode::Negi,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Divi,
    Opcode::Divu,
    Opcode::Modi,
    Opcode::Modu,
    Opcode::Muli,
    Opcode::Mulu,
    Opcode::Band,
    Opcode::Bor,
    Opcode::Bxor,
    Opcode::Bcom,
    Opcode::Lsh,
    Opcode::Rshi,
    Opcode::Rshu,
    Opcode::Negf,
    Opcode::Addf,
    Opcode::Subf,
    Opcode::Divf,
    Opcode::Mulf,
    Opcode::Cvif,
    Opcode::Cvfi,
];

const MNEMONICS: [&str; 60] = [
    "UNDEF",
    "IGNORE",
    "BREAK",
    "ENTER",
    "LEAVE",
    "CALL",
    "PUSH",
    "POP",
    "CONST",
    "LOCAL",
    "JUMP",
    "EQ",
    "NE",
    "LTI",
    "LEI",
    "GTI",
    "GEI",
    "LTU",
    "LEU",
    "GTU",
    "GEU",
    "EQF",
    "NEF",
    "LTF",
    "LEF",
    "GTF",
    "GEF",
    "LOAD1",
    "LOAD2",
    "LOAD4",
    "STORE1",
    "STORE2",
    "STORE4",
    "ARG",
    "BLOCK_COPY",
    "SEX8",
    "SEX16",
    "NEGI",
    "ADD",
    "SUB",
    "DIVI",
    "DIVU",
    "MODI",
    "MODU",
    "MULI",
    "MULU",
    "BAND",
    "BOR",
    "BXOR",
    "BCOM",
    "LSH",
    "RSHI",
    "RSHU",
    "NEGF",
    "ADDF",
    "SUBF",
    "DIVF",
    "MULF",
    "CVIF",
    "CVFI",
];

impl Opcode {
    /// Converts a raw code-stream byte to an opcode, `None` for junk.
    pub fn from_u8(value: u8) -> Option<Self> {
        OPCODES.get(value as usize).copied()
    }

    /// Mnemonic used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        MNEMONICS[self as usize]
    }

    /// Operand carried by this opcode in the encoded stream.
    pub fn width(self) -> Width {
        use Opcode::*;
        match self {
            Enter | Leave | Const | Local | BlockCopy => Width::Word,
            Eq | Ne | Lti | Lei | Gti | Gei | Ltu | Leu | Gtu | Geu | Eqf | Nef | Ltf | Lef
            | Gtf | Gef => Width::Word,
            Arg => Width::Byte,
            _ => Width::None,
        }
    }

    /// Encoded length in bytes: the opcode byte plus its operand.
    pub fn encoded_len(self) -> usize {
        match self.width() {
            Width::None => 1,
            Width::Byte => 2,
            Width::Word => 5,
        }
    }
}
