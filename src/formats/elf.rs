//! ELF32 and ELF64 backends.
//!
//! Both classes share one generic image type over `object`'s file header
//! readers. The magic alone recognizes an ELF file. A file of the other
//! class is a clean decline, so a 64-bit file is passed on by the 32-bit
//! backend and vice versa. An unknown class, or anything that fails after
//! that point, is a malformed ELF.

use object::elf::{self, FileHeader32, FileHeader64};
use object::read::elf::{FileHeader, SectionHeader as _, SectionTable};
use object::read::StringTable;
use object::Endianness;
use tracing::debug;

use super::{check_index, file_slice, ExeInfo, Format, FormatBackend, SectionHandle, SectionOps};
use crate::error::{ProbeError, Result};
use crate::sections::SectionFlags;

/// Recognizes 32-bit ELF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elf32Backend;

/// Recognizes 64-bit ELF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elf64Backend;

impl FormatBackend for Elf32Backend {
    fn format(&self) -> Format {
        Format::Elf32
    }

    fn recognize_and_parse<'data>(
        &self,
        data: &'data [u8],
    ) -> Result<Option<Box<dyn SectionOps<'data> + 'data>>> {
        if !recognize(Format::Elf32, data, elf::ELFCLASS32, elf::ELFCLASS64)? {
            return Ok(None);
        }
        let image = ElfImage::<FileHeader32<Endianness>>::parse(Format::Elf32, data)?;
        Ok(Some(Box::new(image)))
    }
}

impl FormatBackend for Elf64Backend {
    fn format(&self) -> Format {
        Format::Elf64
    }

    fn recognize_and_parse<'data>(
        &self,
        data: &'data [u8],
    ) -> Result<Option<Box<dyn SectionOps<'data> + 'data>>> {
        if !recognize(Format::Elf64, data, elf::ELFCLASS64, elf::ELFCLASS32)? {
            return Ok(None);
        }
        let image = ElfImage::<FileHeader64<Endianness>>::parse(Format::Elf64, data)?;
        Ok(Some(Box::new(image)))
    }
}

/// Offset of `EI_CLASS` in `e_ident`.
const EI_CLASS: usize = 4;

/// `Ok(true)` for our class, `Ok(false)` for anything that is not ours to
/// parse, and an error for an ELF file of no known class.
fn recognize(format: Format, data: &[u8], class: u8, other: u8) -> Result<bool> {
    if !data.starts_with(&elf::ELFMAG) {
        return Ok(false);
    }
    match data.get(EI_CLASS) {
        Some(&c) if c == class => Ok(true),
        Some(&c) if c == other => Ok(false),
        Some(&c) => Err(ProbeError::backend(format, format!("invalid EI_CLASS {c}"))),
        None => Err(ProbeError::backend(format, "truncated e_ident")),
    }
}

/// Parsed ELF state behind the operation table.
struct ElfImage<'data, Elf: FileHeader<Endian = Endianness>> {
    format: Format,
    data: &'data [u8],
    endian: Endianness,
    header: &'data Elf,
    table: SectionTable<'data, Elf>,
    // False when `e_shstrndx` is `SHN_UNDEF`; every name is then empty.
    has_names: bool,
    // Section header table minus the null entry at index 0.
    sections: Vec<&'data Elf::SectionHeader>,
}

impl<'data, Elf: FileHeader<Endian = Endianness>> ElfImage<'data, Elf> {
    fn parse(format: Format, data: &'data [u8]) -> Result<Self> {
        let malformed = |e: object::read::Error| {
            debug!(format = %format, error = %e, "Malformed ELF");
            ProbeError::backend(format, e.to_string())
        };

        let header = Elf::parse(data).map_err(malformed)?;
        let endian = header.endian().map_err(malformed)?;
        let has_names = header.e_shstrndx(endian) != elf::SHN_UNDEF;
        let table = if has_names {
            header.sections(endian, data).map_err(malformed)?
        } else {
            let headers = header.section_headers(endian, data).map_err(malformed)?;
            SectionTable::new(headers, StringTable::default())
        };
        let sections: Vec<_> = table.iter().skip(1).collect();

        debug!(
            format = %format,
            endian = ?endian,
            sections = sections.len(),
            "Parsed ELF section table"
        );

        Ok(Self {
            format,
            data,
            endian,
            header,
            table,
            has_names,
            sections,
        })
    }

    fn header_at(&self, op: &'static str, index: usize) -> Result<&'data Elf::SectionHeader> {
        let index = check_index(op, index, self.sections.len())?;
        Ok(self.sections[index])
    }
}

impl<'data, Elf: FileHeader<Endian = Endianness>> SectionOps<'data> for ElfImage<'data, Elf> {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section_at(&self, index: usize) -> Result<SectionHandle> {
        check_index("section_at", index, self.sections.len()).map(SectionHandle::new)
    }

    fn section_name_at(&self, index: usize) -> Result<&'data str> {
        let section = self.header_at("section_name_at", index)?;
        if !self.has_names {
            return Ok("");
        }
        let raw = self
            .table
            .section_name(self.endian, section)
            .map_err(|e| ProbeError::backend(self.format, format!("section {index}: {e}")))?;
        std::str::from_utf8(raw).map_err(|_| {
            ProbeError::backend(self.format, format!("section {index}: name is not UTF-8"))
        })
    }

    fn flags_of(&self, section: SectionHandle) -> Result<SectionFlags> {
        let header = self.header_at("flags_of", section.index())?;
        let sh_flags: u64 = header.sh_flags(self.endian).into();

        let mut flags = SectionFlags::empty();
        flags.set(
            SectionFlags::READ,
            sh_flags & u64::from(elf::SHF_ALLOC) != 0,
        );
        flags.set(
            SectionFlags::WRITE,
            sh_flags & u64::from(elf::SHF_WRITE) != 0,
        );
        flags.set(
            SectionFlags::EXECUTE,
            sh_flags & u64::from(elf::SHF_EXECINSTR) != 0,
        );
        Ok(flags)
    }

    fn size_of(&self, section: SectionHandle) -> Result<u64> {
        let header = self.header_at("size_of", section.index())?;
        Ok(header.sh_size(self.endian).into())
    }

    fn offset_of(&self, section: SectionHandle) -> Result<u64> {
        let header = self.header_at("offset_of", section.index())?;
        Ok(header.sh_offset(self.endian).into())
    }

    fn section_data(&self, section: SectionHandle) -> Result<&'data [u8]> {
        let header = self.header_at("section_data", section.index())?;
        if header.sh_type(self.endian) == elf::SHT_NOBITS {
            return Ok(&[]);
        }
        file_slice(
            self.format,
            self.data,
            header.sh_offset(self.endian).into(),
            header.sh_size(self.endian).into(),
        )
    }

    fn info(&self) -> ExeInfo {
        let os = match self.header.e_ident().os_abi {
            elf::ELFOSABI_SYSV | elf::ELFOSABI_LINUX => "linux",
            elf::ELFOSABI_FREEBSD => "freebsd",
            elf::ELFOSABI_NETBSD => "netbsd",
            elf::ELFOSABI_OPENBSD => "openbsd",
            elf::ELFOSABI_SOLARIS => "solaris",
            _ => "unknown",
        };
        let arch = match self.header.e_machine(self.endian) {
            elf::EM_386 | elf::EM_X86_64 => "x86",
            elf::EM_ARM | elf::EM_AARCH64 => "arm",
            elf::EM_MIPS => "mips",
            elf::EM_PPC | elf::EM_PPC64 => "powerpc",
            elf::EM_RISCV => "riscv",
            _ => "unknown",
        };
        ExeInfo {
            format: self.format,
            os: os.to_string(),
            arch: arch.to_string(),
            bits: if self.format == Format::Elf64 { 64 } else { 32 },
        }
    }
}
