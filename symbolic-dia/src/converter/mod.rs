//! Defines the DIA [`Converter`].

use std::io::{self, Cursor};

mod lines;
mod serialize;
mod strings;
mod symbols;

pub use serialize::Stats;
pub use symbols::ProcessError;

use crate::format::raw;
use crate::Options;
use lines::LineTableBuilder;
use strings::StringTable;

/// One entry of a line table: the line number in effect from `offset` bytes into a range on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LineInfo {
    /// Offset from the start of the range.
    pub offset: u32,
    /// The source line number.
    pub line: u32,
}

impl LineInfo {
    /// Creates a new line table entry.
    pub fn new(offset: u32, line: u32) -> Self {
        Self { offset, line }
    }
}

/// A contiguous span of addresses attributed to one logical stack frame.
///
/// Ranges are the input of the [`Converter`]. A function that had other functions inlined into
/// it is described by one range at depth `0`, and one range per inlined call at increasing
/// depths, all of which overlap the outer range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Range<'a> {
    /// The start address.
    pub address: u64,
    /// Length of the range in bytes.
    pub length: u32,
    /// The possibly mangled name of the function.
    pub function: &'a str,
    /// The file the function is defined in.
    pub file: Option<&'a str>,
    /// For inlined ranges, the file of the call site.
    pub call_file: Option<&'a str>,
    /// For inlined ranges, the line of the call site.
    pub call_line: u32,
    /// Inlining depth, `0` for the outermost physical function.
    pub depth: u32,
    /// Line table of this range, ordered by offset.
    pub lines: &'a [LineInfo],
}

impl<'a> Range<'a> {
    /// Creates a new outermost range without file or line information.
    pub fn new(address: u64, length: u32, function: &'a str) -> Self {
        Self {
            address,
            length,
            function,
            ..Self::default()
        }
    }

    /// Sets the inlining depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Sets the defining file.
    pub fn with_file(mut self, file: &'a str) -> Self {
        self.file = Some(file);
        self
    }

    /// Sets the call site this range was inlined at.
    pub fn with_call_site(mut self, file: &'a str, line: u32) -> Self {
        self.call_file = Some(file);
        self.call_line = line;
        self
    }

    /// Sets the line table.
    pub fn with_lines(mut self, lines: &'a [LineInfo]) -> Self {
        self.lines = lines;
        self
    }
}

/// The DIA Converter.
///
/// This collects [`Range`]s into an intermediate representation, which can then be serialized
/// via its [`Converter::serialize`] method. A converter is used for exactly one file.
#[derive(Debug, Default)]
pub struct Converter {
    options: Options,
    /// The deduplicated function and file names.
    strings: StringTable,
    /// The concatenated line tables of all ranges.
    line_tables: LineTableBuilder,
    /// Start address of each range, parallel to `entries`.
    addresses: Vec<u64>,
    /// The collected ranges in insertion order, until [`Converter::sort`] runs.
    entries: Vec<raw::RangeEntry>,
}

impl Converter {
    /// Creates a new Converter.
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Adds a range.
    ///
    /// File names are only kept when [`Options::files`] is set, line tables and call lines only
    /// when [`Options::lines`] is set.
    pub fn visit(&mut self, range: &Range<'_>) {
        let function = self.strings.insert(range.function);

        let (file, call_file) = if self.options.files {
            (
                range.file.map_or(raw::EMPTY_STRING, |f| self.strings.insert(f)),
                range
                    .call_file
                    .map_or(raw::EMPTY_STRING, |f| self.strings.insert(f)),
            )
        } else {
            (raw::EMPTY_STRING, raw::EMPTY_STRING)
        };

        let (line_table, call_line) = if self.options.lines {
            (self.line_tables.append(range.lines), range.call_line)
        } else {
            (raw::LineTableRef::default(), 0)
        };

        self.addresses.push(range.address);
        self.entries.push(raw::RangeEntry {
            length: u64::from(range.length),
            depth: u64::from(range.depth),
            function,
            file,
            line_table,
            call_file,
            call_line: u64::from(call_line),
        });
    }

    /// The number of ranges added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no range was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Orders the ranges by address, and by depth for ranges starting at the same address.
    ///
    /// The sort is stable, so ranges that compare equal keep their insertion order.
    fn sort(&mut self) {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by_key(|&i| (self.addresses[i], self.entries[i].depth));

        let addresses = order.iter().map(|&i| self.addresses[i]).collect();
        let entries = order.iter().map(|&i| self.entries[i]).collect();
        self.addresses = addresses;
        self.entries = entries;
    }
}

/// Builds a complete DIA file from the given ranges.
pub fn build<'r, 'd: 'r, I>(ranges: I, options: Options) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = &'r Range<'d>>,
{
    let mut converter = Converter::new(options);
    for range in ranges {
        converter.visit(range);
    }

    let mut writer = Cursor::new(Vec::new());
    converter.serialize(&mut writer)?;
    Ok(writer.into_inner())
}
