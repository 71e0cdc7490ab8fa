//! The raw DIA binary format.
//!
//! All integers are stored little-endian. A file consists of a fixed [`Header`], followed
//! without padding by the address table, the range table, the string table and the line table.

use crate::error::Section;

/// The magic file preamble to identify DIA files.
pub const DIA_MAGIC: [u8; 4] = *b".dia";

/// The latest version of the file format.
pub const DIA_VERSION: u32 = 1;

/// The size of the serialized [`Header`].
pub const HEADER_SIZE: usize = 0x80;

/// The number of fields in a serialized [`RangeEntry`].
pub const RANGE_FIELDS: usize = 8;

/// Offset of the empty string, which is always the first string in the string table.
pub const EMPTY_STRING: StringOffset = StringOffset(0);

/// Offset of the sentinel used in place of strings too long to be stored.
pub const OVERFLOW_STRING: StringOffset = StringOffset(4);

/// The contents of the [`OVERFLOW_STRING`] sentinel.
pub const OVERFLOW_STRING_VALUE: &str = "[overflow]";

const ADDRESSES_HEADER_OFFSET: usize = 0x08;
const RANGES_HEADER_OFFSET: usize = 0x28;
const STRINGS_HEADER_OFFSET: usize = 0x48;
const LINE_TABLES_HEADER_OFFSET: usize = 0x60;

/// A byte offset into the string table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringOffset(pub u64);

/// Sub-header of a table with fixed-width fields.
///
/// Used for the address, range and line tables. Serialized as 32 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableHeader {
    /// Width in bytes of each field (or each entry for the address table).
    pub field_size: u64,
    /// Number of entries in the table.
    pub count: u64,
    /// Absolute offset of the table within the file.
    pub offset: u64,
    /// CRC-32C of the table's bytes.
    pub crc: u32,
}

/// Sub-header of the string table. Serialized as 24 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StringsHeader {
    /// Size in bytes of the string table.
    pub size: u64,
    /// Absolute offset of the string table within the file.
    pub offset: u64,
    /// CRC-32C of the string table's bytes.
    pub crc: u32,
}

/// The header at the start of every DIA file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Magic bytes, see [`DIA_MAGIC`].
    pub magic: [u8; 4],
    /// Version of the file format.
    pub version: u32,
    /// Header of the sorted address table.
    pub addresses: TableHeader,
    /// Header of the range table.
    pub ranges: TableHeader,
    /// Header of the string table.
    pub strings: StringsHeader,
    /// Header of the line table.
    pub line_tables: TableHeader,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: DIA_MAGIC,
            version: DIA_VERSION,
            addresses: TableHeader::default(),
            ranges: TableHeader::default(),
            strings: StringsHeader::default(),
            line_tables: TableHeader::default(),
        }
    }
}

impl Header {
    /// Parses the header from its serialized form.
    ///
    /// This does not validate anything, see [`Table::open`](crate::Table::open).
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut magic = [0; 4];
        magic.copy_from_slice(&buf[0..4]);

        Self {
            magic,
            version: read_u32(buf, 4),
            addresses: TableHeader::parse(buf, ADDRESSES_HEADER_OFFSET),
            ranges: TableHeader::parse(buf, RANGES_HEADER_OFFSET),
            strings: StringsHeader {
                size: read_u64(buf, STRINGS_HEADER_OFFSET),
                offset: read_u64(buf, STRINGS_HEADER_OFFSET + 8),
                crc: read_u32(buf, STRINGS_HEADER_OFFSET + 0x10),
            },
            line_tables: TableHeader::parse(buf, LINE_TABLES_HEADER_OFFSET),
        }
    }

    /// Serializes the header. Reserved bytes are written as zero.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());

        self.addresses.write(&mut buf, ADDRESSES_HEADER_OFFSET);
        self.ranges.write(&mut buf, RANGES_HEADER_OFFSET);

        let strings = STRINGS_HEADER_OFFSET;
        buf[strings..strings + 8].copy_from_slice(&self.strings.size.to_le_bytes());
        buf[strings + 8..strings + 0x10].copy_from_slice(&self.strings.offset.to_le_bytes());
        buf[strings + 0x10..strings + 0x14].copy_from_slice(&self.strings.crc.to_le_bytes());

        self.line_tables.write(&mut buf, LINE_TABLES_HEADER_OFFSET);
        buf
    }

    /// The `(offset, size, crc)` of one of the four data sections.
    pub fn section(&self, section: Section) -> Option<(u64, u64, u32)> {
        let table = |t: &TableHeader, fields: u64| {
            let size = t.count.saturating_mul(t.field_size).saturating_mul(fields);
            (t.offset, size, t.crc)
        };
        match section {
            Section::Header => None,
            Section::Addresses => Some(table(&self.addresses, 1)),
            Section::Ranges => Some(table(&self.ranges, RANGE_FIELDS as u64)),
            Section::Strings => Some((self.strings.offset, self.strings.size, self.strings.crc)),
            Section::LineTables => Some(table(&self.line_tables, 2)),
        }
    }
}

impl TableHeader {
    fn parse(buf: &[u8], at: usize) -> Self {
        Self {
            field_size: read_u64(buf, at),
            count: read_u64(buf, at + 8),
            offset: read_u64(buf, at + 0x10),
            crc: read_u32(buf, at + 0x18),
        }
    }

    fn write(&self, buf: &mut [u8], at: usize) {
        buf[at..at + 8].copy_from_slice(&self.field_size.to_le_bytes());
        buf[at + 8..at + 0x10].copy_from_slice(&self.count.to_le_bytes());
        buf[at + 0x10..at + 0x18].copy_from_slice(&self.offset.to_le_bytes());
        buf[at + 0x18..at + 0x1c].copy_from_slice(&self.crc.to_le_bytes());
    }
}

/// A reference to a contiguous slice of the line table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LineTableRef {
    /// Index of the first entry.
    pub index: u64,
    /// Number of entries.
    pub count: u64,
}

/// A range as stored in the range table.
///
/// The start address is not part of the entry, it lives at the same index in the address table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RangeEntry {
    /// Length of the range in bytes.
    pub length: u64,
    /// Inlining depth, `0` for the outermost function.
    pub depth: u64,
    /// Name of the function.
    pub function: StringOffset,
    /// File the function is defined in.
    pub file: StringOffset,
    /// The line table of this range.
    pub line_table: LineTableRef,
    /// File of the call site this range was inlined into.
    pub call_file: StringOffset,
    /// Line of the call site this range was inlined into.
    pub call_line: u64,
}

impl RangeEntry {
    /// The fields of this entry in serialization order.
    pub fn fields(&self) -> [u64; RANGE_FIELDS] {
        [
            self.length,
            self.depth,
            self.function.0,
            self.file.0,
            self.line_table.index,
            self.line_table.count,
            self.call_file.0,
            self.call_line,
        ]
    }

    /// Parses an entry serialized with the given field width.
    pub fn parse(buf: &[u8], field_size: usize) -> Self {
        let field = |i: usize| read_uint(&buf[i * field_size..], field_size);
        Self {
            length: field(0),
            depth: field(1),
            function: StringOffset(field(2)),
            file: StringOffset(field(3)),
            line_table: LineTableRef {
                index: field(4),
                count: field(5),
            },
            call_file: StringOffset(field(6)),
            call_line: field(7),
        }
    }

    /// Appends the entry to `out`, writing every field with the given width.
    pub fn write(&self, out: &mut Vec<u8>, field_size: usize) {
        for value in self.fields().iter() {
            write_uint(out, *value, field_size);
        }
    }
}

/// Reads a little-endian integer of 2, 4 or 8 bytes.
pub(crate) fn read_uint(buf: &[u8], width: usize) -> u64 {
    match width {
        2 => u64::from(u16::from_le_bytes([buf[0], buf[1]])),
        4 => u64::from(read_u32(buf, 0)),
        _ => read_u64(buf, 0),
    }
}

/// Appends a little-endian integer of 2, 4 or 8 bytes, truncating `value` to that width.
pub(crate) fn write_uint(out: &mut Vec<u8>, value: u64, width: usize) {
    match width {
        2 => out.extend_from_slice(&(value as u16).to_le_bytes()),
        4 => out.extend_from_slice(&(value as u32).to_le_bytes()),
        _ => out.extend_from_slice(&value.to_le_bytes()),
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
