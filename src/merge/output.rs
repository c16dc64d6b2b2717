//! Fixed-capacity output regions. The merged file is planned up front as a
//! run of sections, each with an absolute base offset and its own write
//! cursor; sections never overlap and unused slack is zero-filled at
//! assembly time.

use crate::dex::error::{DexError, DexErrorKind};
use crate::dex::{write_sleb128, write_u1, write_u2, write_u4, write_uleb128, write_uleb128p1};

#[derive(Debug)]
pub struct OutSection {
    name: &'static str,
    base: u32,
    capacity: u32,
    bytes: Vec<u8>,
}

impl OutSection {
    pub fn new(name: &'static str, base: u32, capacity: u32) -> Self {
        OutSection { name, base, capacity, bytes: Vec::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes written so far.
    pub fn used(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// The absolute file offset the next write lands at.
    pub fn pos(&self) -> u32 {
        self.base + self.bytes.len() as u32
    }

    pub fn write_u1(&mut self, val: u8) {
        write_u1(&mut self.bytes, val);
    }

    pub fn write_u2(&mut self, val: u16) {
        write_u2(&mut self.bytes, val);
    }

    pub fn write_u4(&mut self, val: u32) {
        write_u4(&mut self.bytes, val);
    }

    pub fn write_uleb128(&mut self, val: u32) {
        write_uleb128(&mut self.bytes, val);
    }

    pub fn write_uleb128p1(&mut self, val: i32) {
        write_uleb128p1(&mut self.bytes, val);
    }

    pub fn write_sleb128(&mut self, val: i32) {
        write_sleb128(&mut self.bytes, val);
    }

    pub fn write_bytes(&mut self, val: &[u8]) {
        self.bytes.extend_from_slice(val);
    }

    /// Borrow the backing buffer for record writers that append directly.
    pub fn buf(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    /// Zero-fills forward to the next 4-byte boundary. Section bases are
    /// 4-aligned, so cursor alignment equals file alignment.
    pub fn align4(&mut self) {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
    }

    pub fn assert_four_byte_aligned(&self) -> Result<(), DexError> {
        if self.pos() % 4 != 0 {
            return Err(DexError::with_kind(
                DexErrorKind::Alignment,
                &format!("section '{}' cursor {:#x} is not 4-byte aligned", self.name, self.pos()),
            ));
        }
        Ok(())
    }

    /// Reserves `count` zero bytes, returning the cursor-relative offset of
    /// the reserved run for a later `patch`.
    pub fn reserve(&mut self, count: usize) -> usize {
        let at = self.bytes.len();
        self.bytes.resize(at + count, 0);
        at
    }

    pub fn patch(&mut self, at: usize, val: &[u8]) -> Result<(), DexError> {
        if at + val.len() > self.bytes.len() {
            fail!("patch past end of section '{}'", self.name);
        }
        self.bytes[at..at + val.len()].copy_from_slice(val);
        Ok(())
    }
}

/// Concatenates the planned sections into one image, zero-padding each out
/// to its allocated capacity. Fails if any section outgrew its budget or
/// the plan left a gap.
pub fn assemble(sections: &[&OutSection]) -> Result<Vec<u8>, DexError> {
    let total: u32 = sections.last().map(|s| s.base() + s.capacity()).unwrap_or(0);
    let mut file = Vec::with_capacity(total as usize);

    for section in sections {
        if file.len() as u32 != section.base() {
            fail!(
                "section '{}' planned at {:#x} but assembly cursor is {:#x}",
                section.name(),
                section.base(),
                file.len()
            );
        }
        if section.used() > section.capacity() {
            fail!(
                "section '{}' wrote {} bytes into a {} byte budget",
                section.name(),
                section.used(),
                section.capacity()
            );
        }
        file.extend_from_slice(&section.bytes);
        file.resize((section.base() + section.capacity()) as usize, 0);
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_absolute() {
        let mut section = OutSection::new("test", 0x100, 16);
        assert_eq!(section.pos(), 0x100);
        section.write_u4(7);
        assert_eq!(section.pos(), 0x104);
        assert_eq!(section.used(), 4);
    }

    #[test]
    fn align4_pads_with_zeros() {
        let mut section = OutSection::new("test", 0, 16);
        section.write_u1(0xff);
        section.align4();
        assert_eq!(section.used(), 4);
        assert!(section.assert_four_byte_aligned().is_ok());
    }

    #[test]
    fn misaligned_cursor_is_reported() {
        let mut section = OutSection::new("test", 0, 16);
        section.write_u1(1);
        let err = section.assert_four_byte_aligned().unwrap_err();
        assert_eq!(err.kind(), DexErrorKind::Alignment);
    }

    #[test]
    fn reserve_and_patch_backfill() {
        let mut section = OutSection::new("test", 0, 16);
        let at = section.reserve(4);
        section.write_u4(0xaaaa_aaaa);
        section.patch(at, &0x1234_5678u32.to_le_bytes()).unwrap();
        assert_eq!(&section.bytes[..4], &0x1234_5678u32.to_le_bytes());
    }

    #[test]
    fn assemble_pads_to_capacity_and_checks_overflow() {
        let mut a = OutSection::new("a", 0, 8);
        a.write_u4(1);
        let b = OutSection::new("b", 8, 4);
        let file = assemble(&[&a, &b]).unwrap();
        assert_eq!(file.len(), 12);
        assert_eq!(&file[4..8], &[0, 0, 0, 0]);

        let mut c = OutSection::new("c", 0, 2);
        c.write_u4(1);
        assert!(assemble(&[&c]).is_err());
    }
}
