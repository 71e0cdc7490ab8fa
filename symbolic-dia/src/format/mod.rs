//! Reading DIA files.

use std::io;

mod lookup;
pub mod raw;
mod source;

pub use lookup::Frame;
pub use source::Source;

use crate::error::{Error, Result, Section};
use crate::Options;
use raw::{Header, DIA_MAGIC, DIA_VERSION, HEADER_SIZE};
use source::read_exact_at;

/// The size of the chunks in which whole sections are read.
///
/// This is a multiple of every address width.
const CHUNK_SIZE: usize = 64 * 1024;

/// An open DIA file.
///
/// Only the address table is held in memory. Ranges, strings and line tables are read from the
/// [`Source`] on demand during [`Table::lookup`], through a scratch buffer owned by the table.
/// This is why lookups need `&mut self`: concurrent lookups require one `Table` per thread.
#[derive(Debug)]
pub struct Table<S: Source> {
    source: S,
    header: Header,
    addresses: Vec<u64>,
    scratch: Vec<u8>,
}

impl<S: Source> Table<S> {
    /// Opens a DIA file from the given source.
    ///
    /// This validates the header and loads the address table. When [`Options::checksums`] is set,
    /// the checksums of all four sections are verified as well.
    ///
    /// If opening fails, the source is closed before the error is returned.
    pub fn open(mut source: S, options: Options) -> Result<Self> {
        let mut scratch = Vec::new();
        match load(&source, &mut scratch, options) {
            Ok((header, addresses)) => {
                log::debug!(
                    "opened dia file with {} ranges, {} bytes of strings, {} line entries",
                    addresses.len(),
                    header.strings.size,
                    header.line_tables.count,
                );
                Ok(Self {
                    source,
                    header,
                    addresses,
                    scratch,
                })
            }
            Err(err) => {
                if let Err(close_err) = source.close() {
                    log::warn!("failed to close source after open error: {}", close_err);
                }
                Err(err)
            }
        }
    }

    /// Closes the table, releasing its source.
    pub fn close(mut self) -> Result<()> {
        self.source.close().map_err(Error::Close)
    }

    /// The parsed file header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The version of the file format.
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// The number of ranges in the table.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns `true` if the table contains no ranges.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// The sorted start addresses of all ranges.
    pub fn addresses(&self) -> &[u64] {
        &self.addresses
    }

    /// Returns true if line information is included.
    pub fn has_line_info(&self) -> bool {
        self.header.line_tables.count > 0
    }
}

fn load<S: Source>(
    source: &S,
    scratch: &mut Vec<u8>,
    options: Options,
) -> Result<(Header, Vec<u64>)> {
    let mut buf = [0; HEADER_SIZE];
    read_exact_at(source, &mut buf, 0).map_err(|e| Error::io(Section::Header, e))?;
    let header = Header::parse(&buf);
    validate(&header)?;

    let (offset, size, expected) = section(&header, Section::Addresses);
    let width = header.addresses.field_size as usize;
    let mut addresses = Vec::new();
    let mut crc = 0;
    read_chunks(source, scratch, offset, size, Section::Addresses, |chunk| {
        crc = crc32c::crc32c_append(crc, chunk);
        addresses.extend(chunk.chunks_exact(width).map(|a| raw::read_uint(a, width)));
    })?;

    if options.checksums {
        check(Section::Addresses, expected, crc)?;
        for &section_kind in &[Section::Ranges, Section::Strings, Section::LineTables] {
            let (offset, size, expected) = section(&header, section_kind);
            let mut crc = 0;
            read_chunks(source, scratch, offset, size, section_kind, |chunk| {
                crc = crc32c::crc32c_append(crc, chunk);
            })?;
            check(section_kind, expected, crc)?;
        }
    }

    Ok((header, addresses))
}

fn validate(header: &Header) -> Result<()> {
    if header.magic != DIA_MAGIC {
        return Err(Error::BadMagic);
    }
    if header.version != DIA_VERSION {
        return Err(Error::WrongVersion(header.version));
    }

    let widths = [
        (Section::Addresses, header.addresses.field_size, [4, 8]),
        (Section::Ranges, header.ranges.field_size, [4, 8]),
        (Section::LineTables, header.line_tables.field_size, [2, 4]),
    ];
    for (section, width, allowed) in widths.iter() {
        if !allowed.contains(width) {
            return Err(Error::InvalidFieldWidth {
                section: *section,
                width: *width,
            });
        }
    }

    if header.addresses.count != header.ranges.count {
        return Err(Error::CountMismatch {
            addresses: header.addresses.count,
            ranges: header.ranges.count,
        });
    }
    Ok(())
}

fn section(header: &Header, section: Section) -> (u64, u64, u32) {
    header.section(section).unwrap_or_default()
}

fn check(section: Section, expected: u32, actual: u32) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            section,
            expected,
            actual,
        })
    }
}

/// Reads `size` bytes at `offset` in chunks, handing each chunk to `f`.
fn read_chunks<S, F>(
    source: &S,
    scratch: &mut Vec<u8>,
    offset: u64,
    size: u64,
    section: Section,
    mut f: F,
) -> Result<()>
where
    S: Source,
    F: FnMut(&[u8]),
{
    let mut pos = 0;
    while pos < size {
        let len = (size - pos).min(CHUNK_SIZE as u64) as usize;
        let at = offset.checked_add(pos).ok_or_else(|| {
            Error::io(
                section,
                io::Error::new(io::ErrorKind::InvalidData, "section offset overflows"),
            )
        })?;
        scratch.resize(len, 0);
        read_exact_at(source, &mut scratch[..len], at).map_err(|e| Error::io(section, e))?;
        f(&scratch[..len]);
        pos += len as u64;
    }
    Ok(())
}
