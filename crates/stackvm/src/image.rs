use thiserror::Error;

/// Magic for the version 1 header.
pub const MAGIC_V1: u32 = 0x1272_1444;
/// Magic for the version 2 header, which appends the reserved
/// `jtrg_length` field.
pub const MAGIC_V2: u32 = 0x1272_1445;

/// Bytes of bss every image must reserve for call frames. The program
/// stack grows down from the top of the heap into this region.
pub const PROGRAM_STACK_SIZE: u32 = 0x1_0000;

const HEADER_V1_LEN: usize = 32;
const HEADER_V2_LEN: usize = 36;

/// A malformed image. Load-time failures are distinct from runtime
/// [`Fault`](crate::Fault)s: they prevent the VM (and its task) from being
/// created at all.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("image too short for header ({0} bytes)")]
    ShortHeader(usize),
    #[error("unrecognized magic 0x{0:08x}")]
    BadMagic(u32),
    #[error("negative {field} length {value}")]
    NegativeLength { field: &'static str, value: i32 },
    #[error("{field} section [0x{offset:x}..+0x{length:x}] runs past end of image ({image_len} bytes)")]
    SectionOutOfRange {
        field: &'static str,
        offset: u32,
        length: u32,
        image_len: usize,
    },
    #[error("bss length 0x{0:x} does not cover the 0x{1:x}-byte program stack reservation")]
    BssTooSmall(i32, u32),
    #[error("unknown opcode 0x{opcode:02x} at code byte {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("{mnemonic} at code byte {offset} is truncated")]
    TruncatedInstruction {
        mnemonic: &'static str,
        offset: usize,
    },
}

/// Parsed image header. All fields are little-endian on the wire, in
/// declaration order below; `jtrg_length` exists only under [`MAGIC_V2`]
/// and is ignored by the interpreter.
#[derive(Debug, Clone, Copy)]
pub struct ImageHeader {
    pub magic: u32,
    /// Informational; the loader logs a mismatch against the decoded
    /// count but does not reject on it.
    pub instruction_count: i32,
    pub code_offset: u32,
    pub code_length: i32,
    pub data_offset: u32,
    pub data_length: i32,
    pub lit_length: i32,
    pub bss_length: i32,
    pub jtrg_length: Option<i32>,
}

impl ImageHeader {
    pub fn parse(image: &[u8]) -> Result<Self, LoadError> {
        if image.len() < HEADER_V1_LEN {
            return Err(LoadError::ShortHeader(image.len()));
        }
        let word = |i: usize| u32::from_le_bytes(image[i * 4..i * 4 + 4].try_into().unwrap());

        let magic = word(0);
        let jtrg_length = match magic {
            MAGIC_V1 => None,
            MAGIC_V2 => {
                if image.len() < HEADER_V2_LEN {
                    return Err(LoadError::ShortHeader(image.len()));
                }
                Some(word(8) as i32)
            }
            other => return Err(LoadError::BadMagic(other)),
        };

        let header = Self {
            magic,
            instruction_count: word(1) as i32,
            code_offset: word(2),
            code_length: word(3) as i32,
            data_offset: word(4),
            data_length: word(5) as i32,
            lit_length: word(6) as i32,
            bss_length: word(7) as i32,
            jtrg_length,
        };

        for (field, value) in [
            ("code", header.code_length),
            ("data", header.data_length),
            ("lit", header.lit_length),
            ("bss", header.bss_length),
        ] {
            if value < 0 {
                return Err(LoadError::NegativeLength { field, value });
            }
        }
        if (header.bss_length as u32) < PROGRAM_STACK_SIZE {
            return Err(LoadError::BssTooSmall(header.bss_length, PROGRAM_STACK_SIZE));
        }
        Ok(header)
    }

    /// Total heap length before power-of-two rounding.
    pub fn heap_len(&self) -> usize {
        self.data_length as usize + self.lit_length as usize + self.bss_length as usize
    }
}

/// Slices `length` bytes at `offset` out of the image, rejecting ranges
/// that leave the file.
pub fn section<'a>(
    image: &'a [u8],
    field: &'static str,
    offset: u32,
    length: u32,
) -> Result<&'a [u8], LoadError> {
    let start = offset as usize;
    let end = start.checked_add(length as usize);
    match end {
        Some(end) if end <= image.len() => Ok(&image[start..end]),
        _ => Err(LoadError::SectionOutOfRange {
            field,
            offset,
            length,
            image_len: image.len(),
        }),
    }
}
