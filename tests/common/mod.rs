//! Common test utilities and helpers.
//!
//! Fixture builders lay out minimal but well-formed ELF and PE images in
//! memory so tests do not depend on sample binaries being present.

#![allow(dead_code)]

use std::io::Write;
use tempfile::NamedTempFile;

pub const SHT_PROGBITS: u32 = 1;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_NOBITS: u32 = 8;

pub const SHF_WRITE: u64 = 0x1;
pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;

pub const SCN_CNT_CODE: u32 = 0x0000_0020;
pub const SCN_MEM_EXECUTE: u32 = 0x2000_0000;
pub const SCN_MEM_READ: u32 = 0x4000_0000;
pub const SCN_MEM_WRITE: u32 = 0x8000_0000;

/// One section of a fixture image.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: &'static str,
    pub kind: u32,
    pub flags: u64,
    pub offset: u64,
    pub size: u64,
}

impl SectionSpec {
    pub fn elf(name: &'static str, flags: u64, offset: u64, size: u64) -> Self {
        Self {
            name,
            kind: SHT_PROGBITS,
            flags,
            offset,
            size,
        }
    }

    pub fn pe(name: &'static str, characteristics: u32, offset: u64, size: u64) -> Self {
        Self {
            name,
            kind: 0,
            flags: characteristics as u64,
            offset,
            size,
        }
    }
}

fn put(buf: &mut [u8], at: usize, value: u64, width: usize) {
    buf[at..at + width].copy_from_slice(&value.to_le_bytes()[..width]);
}

fn data_end(sections: &[SectionSpec], floor: usize) -> usize {
    sections
        .iter()
        .filter(|s| s.kind != SHT_NOBITS)
        .map(|s| (s.offset + s.size) as usize)
        .max()
        .unwrap_or(0)
        .max(floor)
}

/// Little-endian x86 ELF image. A `.shstrtab` section is appended after the
/// given sections, and the null section sits at index 0 of the raw table.
pub fn build_elf(is_64: bool, sections: &[SectionSpec]) -> Vec<u8> {
    let (ehsize, shentsize) = if is_64 { (64, 64) } else { (52, 40) };

    let mut strtab = vec![0u8];
    let mut name_offsets = Vec::new();
    for name in sections.iter().map(|s| s.name).chain([".shstrtab"]) {
        name_offsets.push(strtab.len() as u64);
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
    }

    let strtab_off = (data_end(sections, ehsize) + 7) & !7;
    let shoff = (strtab_off + strtab.len() + 7) & !7;
    let shnum = sections.len() + 2;
    let mut buf = vec![0u8; shoff + shnum * shentsize];
    buf[strtab_off..strtab_off + strtab.len()].copy_from_slice(&strtab);

    buf[..4].copy_from_slice(b"\x7fELF");
    buf[4] = if is_64 { 2 } else { 1 };
    buf[5] = 1; // little endian
    buf[6] = 1; // EV_CURRENT
    put(&mut buf, 16, 2, 2); // ET_EXEC
    put(&mut buf, 18, if is_64 { 62 } else { 3 }, 2);
    put(&mut buf, 20, 1, 4);
    if is_64 {
        put(&mut buf, 40, shoff as u64, 8);
        put(&mut buf, 52, ehsize as u64, 2);
        put(&mut buf, 58, shentsize as u64, 2);
        put(&mut buf, 60, shnum as u64, 2);
        put(&mut buf, 62, (shnum - 1) as u64, 2);
    } else {
        put(&mut buf, 32, shoff as u64, 4);
        put(&mut buf, 40, ehsize as u64, 2);
        put(&mut buf, 46, shentsize as u64, 2);
        put(&mut buf, 48, shnum as u64, 2);
        put(&mut buf, 50, (shnum - 1) as u64, 2);
    }

    let shstrtab = SectionSpec {
        name: ".shstrtab",
        kind: SHT_STRTAB,
        flags: 0,
        offset: strtab_off as u64,
        size: strtab.len() as u64,
    };
    for (i, spec) in sections.iter().chain([&shstrtab]).enumerate() {
        let at = shoff + (i + 1) * shentsize;
        put(&mut buf, at, name_offsets[i], 4);
        put(&mut buf, at + 4, spec.kind as u64, 4);
        if is_64 {
            put(&mut buf, at + 8, spec.flags, 8);
            put(&mut buf, at + 24, spec.offset, 8);
            put(&mut buf, at + 32, spec.size, 8);
        } else {
            put(&mut buf, at + 8, spec.flags, 4);
            put(&mut buf, at + 16, spec.offset, 4);
            put(&mut buf, at + 20, spec.size, 4);
        }
    }
    buf
}

/// Little-endian PE image with an x86 or x86-64 optional header. Section
/// names must fit in eight bytes.
pub fn build_pe(is_64: bool, sections: &[SectionSpec]) -> Vec<u8> {
    const NT_OFFSET: usize = 0x40;
    let opt_size = if is_64 { 240 } else { 224 };
    let opt_at = NT_OFFSET + 24;
    let table_at = opt_at + opt_size;

    let mut buf = vec![0u8; data_end(sections, table_at + sections.len() * 40)];
    buf[..2].copy_from_slice(b"MZ");
    put(&mut buf, 0x3c, NT_OFFSET as u64, 4);
    buf[NT_OFFSET..NT_OFFSET + 4].copy_from_slice(b"PE\0\0");
    put(&mut buf, NT_OFFSET + 4, if is_64 { 0x8664 } else { 0x14c }, 2);
    put(&mut buf, NT_OFFSET + 6, sections.len() as u64, 2);
    put(&mut buf, NT_OFFSET + 20, opt_size as u64, 2);
    if is_64 {
        put(&mut buf, opt_at, 0x20b, 2);
        put(&mut buf, opt_at + 108, 16, 4);
    } else {
        put(&mut buf, opt_at, 0x10b, 2);
        put(&mut buf, opt_at + 92, 16, 4);
    }

    for (i, spec) in sections.iter().enumerate() {
        let at = table_at + i * 40;
        buf[at..at + spec.name.len()].copy_from_slice(spec.name.as_bytes());
        put(&mut buf, at + 16, spec.size, 4);
        put(&mut buf, at + 20, spec.offset, 4);
        put(&mut buf, at + 36, spec.flags, 4);
    }
    buf
}

/// The two-section ELF64 image used across the pipeline tests:
/// `.text` (r-x) at 0x1000 and `.data` (rw-) at 0x1200.
pub fn text_and_data_elf64() -> Vec<u8> {
    build_elf(
        true,
        &[
            SectionSpec::elf(".text", SHF_ALLOC | SHF_EXECINSTR, 0x1000, 0x200),
            SectionSpec::elf(".data", SHF_ALLOC | SHF_WRITE, 0x1200, 0x100),
        ],
    )
}

/// Persist `content` to a fresh temporary file.
pub fn temp_file_with(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}
