//! Uniform section enumeration over any parsed [`Object`].
//!
//! The enumerator only talks to the operation table, so it works the same for
//! every backend. Records come out in ascending index order with no sorting or
//! filtering applied.

use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::formats::Object;

bitflags! {
    /// Three-bit protection mask: bit 2 read, bit 1 write, bit 0 execute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SectionFlags: u8 {
        const READ = 0b100;
        const WRITE = 0b010;
        const EXECUTE = 0b001;
    }
}

impl SectionFlags {
    /// Render as a fixed-width `rwx` string with `-` for unset bits.
    pub fn render(self) -> String {
        let bit = |flag: SectionFlags, c: char| if self.contains(flag) { c } else { '-' };
        [
            bit(SectionFlags::READ, 'r'),
            bit(SectionFlags::WRITE, 'w'),
            bit(SectionFlags::EXECUTE, 'x'),
        ]
        .into_iter()
        .collect()
    }

    /// Parse a string produced by [`SectionFlags::render`].
    pub fn from_rendered(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 {
            return None;
        }
        let mut flags = SectionFlags::empty();
        for (&b, (set, flag)) in bytes.iter().zip([
            (b'r', SectionFlags::READ),
            (b'w', SectionFlags::WRITE),
            (b'x', SectionFlags::EXECUTE),
        ]) {
            match b {
                b'-' => {}
                _ if b == set => flags |= flag,
                _ => return None,
            }
        }
        Some(flags)
    }
}

impl fmt::Display for SectionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Serialize for SectionFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

/// One section as seen through the operation table.
///
/// `name` borrows from the mapped input, so a record cannot outlive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRecord<'o> {
    pub index: usize,
    pub name: &'o str,
    pub flags: SectionFlags,
    pub offset: u64,
    pub size: u64,
}

impl SectionRecord<'_> {
    pub fn to_row(&self) -> SectionRow {
        SectionRow {
            index: self.index,
            name: self.name.to_owned(),
            flags: self.flags,
            offset: self.offset,
            size: self.size,
        }
    }
}

impl fmt::Display for SectionRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Section {:02} / {} : flags={}, offset={:#x}, size={}",
            self.index, self.name, self.flags, self.offset, self.size
        )
    }
}

/// Owned copy of a [`SectionRecord`] for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRow {
    pub index: usize,
    pub name: String,
    pub flags: SectionFlags,
    pub offset: u64,
    pub size: u64,
}

/// Lazy iterator over the sections of an [`Object`].
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug)]
pub struct Sections<'a, 'data> {
    object: &'a Object<'data>,
    next: usize,
    count: Option<usize>,
    done: bool,
}

/// Enumerate the sections of `object` in index order.
///
/// Calling this again restarts from index zero.
pub fn enumerate<'a, 'data>(object: &'a Object<'data>) -> Sections<'a, 'data> {
    Sections {
        object,
        next: 0,
        count: None,
        done: false,
    }
}

/// Collect every section, stopping at the first failure.
pub fn collect_sections<'data>(object: &Object<'data>) -> Result<Vec<SectionRecord<'data>>> {
    enumerate(object).collect()
}

impl<'data> Sections<'_, 'data> {
    fn resolve(&self, index: usize) -> Result<SectionRecord<'data>> {
        let object = self.object;
        let handle = object.section_at(index)?;
        let name = object.section_name_at(index)?;
        let flags = object.flags_of(handle)?;
        let size = object.size_of(handle)?;
        let offset = object.offset_of(handle)?;
        Ok(SectionRecord {
            index,
            name,
            flags,
            offset,
            size,
        })
    }
}

impl<'data> Iterator for Sections<'_, 'data> {
    type Item = Result<SectionRecord<'data>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let count = match self.count {
            Some(count) => count,
            None => match self.object.section_count() {
                Ok(count) => *self.count.insert(count),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        };
        if self.next >= count {
            self.done = true;
            return None;
        }
        let index = self.next;
        self.next += 1;
        let record = self.resolve(index);
        if record.is_err() {
            self.done = true;
        }
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (self.done, self.count) {
            (true, _) => (0, Some(0)),
            (false, Some(count)) => {
                let left = count.saturating_sub(self.next);
                (left, Some(left))
            }
            (false, None) => (0, None),
        }
    }
}

impl std::iter::FusedIterator for Sections<'_, '_> {}
