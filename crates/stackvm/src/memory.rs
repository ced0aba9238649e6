use std::fmt::Write as _;

use crate::fault::Fault;

/// The data segment of a VM instance.
///
/// The backing buffer is always a power of two in size so addresses can be
/// wrapped with a mask before the range check. Masking alone is not enough:
/// a multi-byte access starting near the end of the buffer would span past
/// the allocated length even after masking, so every access is range-checked
/// too and fails with [`Fault::OUT_OF_BOUNDS`] rather than wrapping.
#[derive(Debug)]
pub struct Heap {
    bytes: Vec<u8>,
    mask: u32,
}

impl Heap {
    /// Builds a heap of `total_len` bytes (rounded up to a power of two,
    /// zero-padded), with `init` copied to the front. `init` covers the
    /// image's data and lit sections; the remainder is the zeroed bss.
    pub fn new(init: &[u8], total_len: usize) -> Self {
        let len = total_len.max(init.len()).next_power_of_two();
        let mut bytes = vec![0u8; len];
        bytes[..init.len()].copy_from_slice(init);
        Self {
            mask: (len - 1) as u32,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `next_power_of_two(len) - 1`, applied to every address before use.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Masks `addr` and range-checks `size` bytes from it.
    fn check(&self, addr: u32, size: usize, align: u32) -> Result<usize, Fault> {
        let at = (addr & self.mask) as usize;
        if align > 1 && addr & (align - 1) != 0 {
            return Err(Fault::MISALIGNED);
        }
        if at + size > self.bytes.len() {
            return Err(Fault::OUT_OF_BOUNDS);
        }
        Ok(at)
    }

    pub fn load8(&self, addr: u32) -> Result<u8, Fault> {
        let at = self.check(addr, 1, 1)?;
        Ok(self.bytes[at])
    }

    pub fn load16(&self, addr: u32) -> Result<u16, Fault> {
        let at = self.check(addr, 2, 2)?;
        Ok(u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]))
    }

    pub fn load32(&self, addr: u32) -> Result<u32, Fault> {
        let at = self.check(addr, 4, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[at..at + 4]);
        Ok(u32::from_le_bytes(word))
    }

    pub fn store8(&mut self, addr: u32, value: u8) -> Result<(), Fault> {
        let at = self.check(addr, 1, 1)?;
        self.bytes[at] = value;
        Ok(())
    }

    pub fn store16(&mut self, addr: u32, value: u16) -> Result<(), Fault> {
        let at = self.check(addr, 2, 2)?;
        self.bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn store32(&mut self, addr: u32, value: u32) -> Result<(), Fault> {
        let at = self.check(addr, 4, 4)?;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Copies `len` bytes from `src` to `dest`; the ranges may overlap.
    pub fn block_copy(&mut self, dest: u32, src: u32, len: u32) -> Result<(), Fault> {
        let d = self.check(dest, len as usize, 1)?;
        let s = self.check(src, len as usize, 1)?;
        self.bytes.copy_within(s..s + len as usize, d);
        Ok(())
    }

    /// A view of the null-terminated string at `addr`, terminator excluded.
    ///
    /// Scans only within the allocated length; a string that runs off the
    /// end of the heap without a terminator is an out-of-bounds fault, not
    /// a wild read.
    pub fn cstr(&self, addr: u32) -> Result<&[u8], Fault> {
        let start = (addr & self.mask) as usize;
        match self.bytes[start..].iter().position(|&b| b == 0) {
            Some(n) => Ok(&self.bytes[start..start + n]),
            None => Err(Fault::OUT_OF_BOUNDS),
        }
    }

    /// Hex dump of `[start, end)`, 16 bytes per line, for fault logs.
    pub fn dump(&self, start: usize, end: usize) -> String {
        let end = end.min(self.bytes.len());
        let mut out = String::new();
        for at in (start..end).step_by(16) {
            let line = &self.bytes[at..end.min(at + 16)];
            let _ = writeln!(out, "{:08x}  {}", at, hex::encode(line));
        }
        out
    }
}
