use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use super::*;
use crate::format::raw::{Header, StringsHeader, TableHeader, HEADER_SIZE, RANGE_FIELDS};

impl Converter {
    /// Serialize the converted data.
    ///
    /// This writes the DIA binary format into the given writer, which should be positioned at
    /// the start of an empty file: all section offsets are relative to where writing began.
    /// The header is written last, so the writer is seeked back once all sections are done and
    /// left positioned at the end of the file afterwards.
    pub fn serialize<W: Write + Seek>(mut self, writer: &mut W) -> io::Result<Stats> {
        self.sort();

        let start = writer.stream_position()?;
        let mut writer = WriteWrapper::new(BufWriter::new(writer));
        let mut header = Header::default();

        writer.write(&[0; HEADER_SIZE])?;
        writer.finish_section();

        let address_width = address_width(&self.addresses);
        let mut buf = Vec::with_capacity(RANGE_FIELDS * 8);
        header.addresses = TableHeader {
            field_size: address_width as u64,
            count: self.addresses.len() as u64,
            offset: writer.position,
            crc: 0,
        };
        for address in &self.addresses {
            buf.clear();
            raw::write_uint(&mut buf, *address, address_width);
            writer.write(&buf)?;
        }
        header.addresses.crc = writer.finish_section();

        let range_field_width = range_field_width(&self.entries);
        header.ranges = TableHeader {
            field_size: range_field_width as u64,
            count: self.entries.len() as u64,
            offset: writer.position,
            crc: 0,
        };
        for entry in &self.entries {
            buf.clear();
            entry.write(&mut buf, range_field_width);
            writer.write(&buf)?;
        }
        header.ranges.crc = writer.finish_section();

        let string_bytes = self.strings.as_bytes();
        header.strings = StringsHeader {
            size: string_bytes.len() as u64,
            offset: writer.position,
            crc: 0,
        };
        writer.write(string_bytes)?;
        header.strings.crc = writer.finish_section();

        let lines = self.line_tables.entries();
        let line_field_width = line_field_width(lines);
        header.line_tables = TableHeader {
            field_size: line_field_width as u64,
            count: lines.len() as u64,
            offset: writer.position,
            crc: 0,
        };
        for line in lines {
            buf.clear();
            raw::write_uint(&mut buf, u64::from(line.offset), line_field_width);
            raw::write_uint(&mut buf, u64::from(line.line), line_field_width);
            writer.write(&buf)?;
        }
        header.line_tables.crc = writer.finish_section();

        let file_size = writer.position;
        let writer = &mut writer.writer;
        writer.seek(SeekFrom::Start(start))?;
        writer.write_all(&header.to_bytes())?;
        writer.seek(SeekFrom::Start(start + file_size))?;
        writer.flush()?;

        let stats = Stats {
            num_ranges: self.entries.len(),
            address_width: address_width as u8,
            range_field_width: range_field_width as u8,
            num_strings: self.strings.len(),
            string_bytes: string_bytes.len(),
            num_line_entries: lines.len(),
            line_field_width: line_field_width as u8,
            file_size,
        };
        log::debug!("serialized dia file: {:?}", stats);
        Ok(stats)
    }
}

/// Width of the address table entries: 4 bytes unless an address needs more.
fn address_width(addresses: &[u64]) -> usize {
    if addresses.iter().all(|&a| a <= u64::from(u32::MAX)) {
        4
    } else {
        8
    }
}

/// Width of every field of the range table, evaluated jointly over all fields of all entries.
fn range_field_width(entries: &[raw::RangeEntry]) -> usize {
    let fits = entries
        .iter()
        .all(|e| e.fields().iter().all(|&v| v <= u64::from(u32::MAX)));
    if fits {
        4
    } else {
        8
    }
}

/// Width of both fields of the line table entries.
fn line_field_width(lines: &[LineInfo]) -> usize {
    let max = u32::from(u16::MAX);
    if lines.iter().all(|l| l.offset <= max && l.line <= max) {
        2
    } else {
        4
    }
}

/// Tracks the written position and the checksum of the section being written.
struct WriteWrapper<W> {
    writer: W,
    position: u64,
    crc: u32,
}

impl<W: Write> WriteWrapper<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            position: 0,
            crc: 0,
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.position += data.len() as u64;
        self.crc = crc32c::crc32c_append(self.crc, data);
        Ok(())
    }

    /// Returns the checksum of everything written since the last call.
    fn finish_section(&mut self) -> u32 {
        std::mem::replace(&mut self.crc, 0)
    }
}

/// Some statistics about the finished/serialized DIA file.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Stats {
    /// Number of ranges, which is also the number of addresses.
    pub num_ranges: usize,
    /// Width in bytes of each address.
    pub address_width: u8,
    /// Width in bytes of each range table field.
    pub range_field_width: u8,
    /// Number of distinct strings, including the empty and overflow strings.
    pub num_strings: usize,
    /// Size of the string table in bytes.
    pub string_bytes: usize,
    /// Number of line table entries.
    pub num_line_entries: usize,
    /// Width in bytes of each line table field.
    pub line_field_width: u8,
    /// Total number of bytes written.
    pub file_size: u64,
}
