//! PE backend (PE32 and PE32+).
//!
//! A file is recognized once both the `MZ` stub and the `PE\0\0` signature
//! are in place; everything after that is parsed with `object`'s PE reader.

use object::pe;
use object::read::pe::{ImageNtHeaders, PeFile};
use object::read::StringTable;
use object::LittleEndian as LE;
use tracing::debug;

use super::{check_index, file_slice, ExeInfo, Format, FormatBackend, SectionHandle, SectionOps};
use crate::error::{ProbeError, Result};
use crate::sections::SectionFlags;

const E_LFANEW_OFFSET: usize = 0x3c;
const FILE_HEADER_SIZE: usize = 20;

/// Recognizes PE images, both 32 and 64 bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeBackend;

impl FormatBackend for PeBackend {
    fn format(&self) -> Format {
        Format::Pe
    }

    fn recognize_and_parse<'data>(
        &self,
        data: &'data [u8],
    ) -> Result<Option<Box<dyn SectionOps<'data> + 'data>>> {
        let Some(nt_offset) = nt_headers_offset(data) else {
            return Ok(None);
        };

        let magic_at = nt_offset + 4 + FILE_HEADER_SIZE;
        let image = match read_u16(data, magic_at) {
            Some(pe::IMAGE_NT_OPTIONAL_HDR32_MAGIC) => {
                PeImage::parse::<pe::ImageNtHeaders32>(data, 32)?
            }
            Some(pe::IMAGE_NT_OPTIONAL_HDR64_MAGIC) => {
                PeImage::parse::<pe::ImageNtHeaders64>(data, 64)?
            }
            Some(magic) => {
                debug!(magic, "Unknown PE optional header magic");
                return Err(ProbeError::backend(
                    Format::Pe,
                    format!("unknown optional header magic {magic:#06x}"),
                ));
            }
            None => return Err(ProbeError::backend(Format::Pe, "truncated NT headers")),
        };
        Ok(Some(Box::new(image)))
    }
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Offset of the NT headers if the file carries both PE signatures.
fn nt_headers_offset(data: &[u8]) -> Option<usize> {
    if !data.starts_with(b"MZ") {
        return None;
    }
    let offset = usize::try_from(read_u32(data, E_LFANEW_OFFSET)?).ok()?;
    let signature = data.get(offset..offset.checked_add(4)?)?;
    (signature == b"PE\0\0").then_some(offset)
}

/// Parsed PE state behind the operation table.
struct PeImage<'data> {
    data: &'data [u8],
    sections: Vec<&'data pe::ImageSectionHeader>,
    // COFF string table for `/<offset>` section names; empty when absent.
    strings: StringTable<'data>,
    machine: u16,
    bits: u8,
}

impl<'data> PeImage<'data> {
    fn parse<Pe: ImageNtHeaders>(data: &'data [u8], bits: u8) -> Result<Self> {
        let file = PeFile::<Pe>::parse(data).map_err(|e| {
            debug!(error = %e, "Malformed PE");
            ProbeError::backend(Format::Pe, e.to_string())
        })?;

        let file_header = file.nt_headers().file_header();
        let machine = file_header.machine.get(LE);
        let sections: Vec<_> = file.section_table().iter().collect();
        // A corrupt COFF symbol table only costs us long section names.
        let strings = file
            .nt_headers()
            .symbols(data)
            .map(|symbols| symbols.strings())
            .unwrap_or_default();

        debug!(
            bits,
            machine,
            sections = sections.len(),
            "Parsed PE section table"
        );

        Ok(Self {
            data,
            sections,
            strings,
            machine,
            bits,
        })
    }

    fn header_at(&self, op: &'static str, index: usize) -> Result<&'data pe::ImageSectionHeader> {
        let index = check_index(op, index, self.sections.len())?;
        Ok(self.sections[index])
    }
}

impl<'data> SectionOps<'data> for PeImage<'data> {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn section_at(&self, index: usize) -> Result<SectionHandle> {
        check_index("section_at", index, self.sections.len()).map(SectionHandle::new)
    }

    fn section_name_at(&self, index: usize) -> Result<&'data str> {
        let name = self
            .header_at("section_name_at", index)?
            .name(self.strings)
            .map_err(|e| ProbeError::backend(Format::Pe, format!("section {index}: {e}")))?;
        std::str::from_utf8(name).map_err(|_| {
            ProbeError::backend(Format::Pe, format!("section {index}: name is not UTF-8"))
        })
    }

    fn flags_of(&self, section: SectionHandle) -> Result<SectionFlags> {
        let characteristics = self
            .header_at("flags_of", section.index())?
            .characteristics
            .get(LE);

        let mut flags = SectionFlags::empty();
        flags.set(
            SectionFlags::READ,
            characteristics & pe::IMAGE_SCN_MEM_READ != 0,
        );
        flags.set(
            SectionFlags::WRITE,
            characteristics & pe::IMAGE_SCN_MEM_WRITE != 0,
        );
        flags.set(
            SectionFlags::EXECUTE,
            characteristics & (pe::IMAGE_SCN_MEM_EXECUTE | pe::IMAGE_SCN_CNT_CODE) != 0,
        );
        Ok(flags)
    }

    fn size_of(&self, section: SectionHandle) -> Result<u64> {
        let header = self.header_at("size_of", section.index())?;
        Ok(u64::from(header.size_of_raw_data.get(LE)))
    }

    fn offset_of(&self, section: SectionHandle) -> Result<u64> {
        let header = self.header_at("offset_of", section.index())?;
        Ok(u64::from(header.pointer_to_raw_data.get(LE)))
    }

    fn section_data(&self, section: SectionHandle) -> Result<&'data [u8]> {
        let header = self.header_at("section_data", section.index())?;
        let size = header.size_of_raw_data.get(LE);
        if size == 0 {
            return Ok(&[]);
        }
        file_slice(
            Format::Pe,
            self.data,
            u64::from(header.pointer_to_raw_data.get(LE)),
            u64::from(size),
        )
    }

    fn info(&self) -> ExeInfo {
        let arch = match self.machine {
            pe::IMAGE_FILE_MACHINE_I386 | pe::IMAGE_FILE_MACHINE_AMD64 => "x86",
            pe::IMAGE_FILE_MACHINE_IA64 => "ia",
            pe::IMAGE_FILE_MACHINE_ARM
            | pe::IMAGE_FILE_MACHINE_ARMNT
            | pe::IMAGE_FILE_MACHINE_ARM64 => "arm",
            _ => "unknown",
        };
        ExeInfo {
            format: Format::Pe,
            os: "windows".to_string(),
            arch: arch.to_string(),
            bits: self.bits,
        }
    }
}
