use std::convert::TryFrom;

use super::raw::{self, LineTableRef, RangeEntry, StringOffset, RANGE_FIELDS};
use super::source::read_exact_at;
use super::{Source, Table};
use crate::error::{Error, Result, Section};

/// A resolved stack frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Frame {
    /// The possibly mangled name of the function.
    pub function: String,
    /// The file the function is defined in, empty if unknown.
    pub file: String,
    /// The source line.
    ///
    /// This is `0` when no line information can be found.
    pub line: u32,
}

impl<S: Source> Table<S> {
    /// Looks up an instruction address, returning the frames at that address.
    ///
    /// Frames are ordered from the innermost inlined function to the outermost physical
    /// function. The result is empty if no range covers `addr`.
    pub fn lookup(&mut self, addr: u64) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        self.lookup_into(addr, &mut frames)?;
        Ok(frames)
    }

    /// Like [`Table::lookup`], but appends the frames to an existing buffer.
    pub fn lookup_into(&mut self, addr: u64, frames: &mut Vec<Frame>) -> Result<()> {
        let mut idx = match self.addresses.partition_point(|&a| a <= addr) {
            0 => return Ok(()),
            end => end - 1,
        };

        // Ranges sharing an address are sorted by depth, so walking backwards from the last
        // candidate visits the inlining chain inside out until the depth-0 range.
        let mut call_line = 0;
        loop {
            let offset = addr - self.addresses[idx];
            let entry = self.range_entry(idx)?;

            if offset < entry.length {
                let line = if call_line != 0 {
                    call_line
                } else {
                    self.line_at(entry.line_table, offset)?
                };
                frames.push(Frame {
                    function: self.string(entry.function)?,
                    file: self.string(entry.file)?,
                    line: u32::try_from(line).unwrap_or_default(),
                });
                call_line = entry.call_line;
            }

            if entry.depth == 0 || idx == 0 {
                break;
            }
            idx -= 1;
        }

        log::trace!("resolved {:#x} to {} frames", addr, frames.len());
        Ok(())
    }

    /// Reads `len` bytes at `offset` into the scratch buffer.
    fn read(&mut self, offset: u64, len: usize, section: Section) -> Result<&[u8]> {
        self.scratch.resize(len, 0);
        read_exact_at(&self.source, &mut self.scratch[..len], offset)
            .map_err(|e| Error::io(section, e))?;
        Ok(&self.scratch[..len])
    }

    fn range_entry(&mut self, idx: usize) -> Result<RangeEntry> {
        let field_size = self.header.ranges.field_size as usize;
        let entry_size = RANGE_FIELDS * field_size;
        let offset = self.header.ranges.offset + (idx * entry_size) as u64;
        let buf = self.read(offset, entry_size, Section::Ranges)?;
        Ok(RangeEntry::parse(buf, field_size))
    }

    fn string(&mut self, offset: StringOffset) -> Result<String> {
        if offset == raw::EMPTY_STRING {
            return Ok(String::new());
        }

        let size = self.header.strings.size;
        let base = self.header.strings.offset;
        if offset.0.checked_add(4).map_or(true, |end| end > size) {
            return Err(Error::InvalidStringReference(offset.0));
        }
        let len = raw::read_uint(self.read(base + offset.0, 4, Section::Strings)?, 4);
        if (offset.0 + 4).checked_add(len).map_or(true, |end| end > size) {
            return Err(Error::InvalidStringReference(offset.0));
        }

        let bytes = self.read(base + offset.0 + 4, len as usize, Section::Strings)?;
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_owned()),
            Err(e) => Err(Error::InvalidStringData(offset.0, e)),
        }
    }

    /// Finds the line in effect `offset` bytes into a range.
    fn line_at(&mut self, line_table: LineTableRef, offset: u64) -> Result<u64> {
        if line_table.count == 0 {
            return Ok(0);
        }

        let LineTableRef { index, count } = line_table;
        let width = self.header.line_tables.field_size as usize;
        let in_bounds = index
            .checked_add(count)
            .map_or(false, |end| end <= self.header.line_tables.count);
        let len = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(2 * width));
        let len = match len {
            Some(len) if in_bounds => len,
            _ => return Err(Error::InvalidLineTableReference { index, count }),
        };

        let start = self
            .header
            .line_tables
            .offset
            .saturating_add(index.saturating_mul(2 * width as u64));
        let buf = self.read(start, len, Section::LineTables)?;

        let mut line = 0;
        for pair in buf.chunks_exact(2 * width) {
            if raw::read_uint(pair, width) > offset {
                break;
            }
            line = raw::read_uint(&pair[width..], width);
        }
        Ok(line)
    }
}
