//! Error types for reading DIA files, and the [`ErrorSink`] used for lenient conversion.

use std::fmt;
use std::io;
use std::str::Utf8Error;

use thiserror::Error;

/// One of the sections of a DIA file.
///
/// This is attached to errors to identify which part of the file could not be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// The fixed-size file header.
    Header,
    /// The sorted table of range start addresses.
    Addresses,
    /// The table of range entries, parallel to the addresses.
    Ranges,
    /// The blob of length-prefixed strings.
    Strings,
    /// The blob of `(offset, line)` pairs.
    LineTables,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Header => "header",
            Section::Addresses => "address table",
            Section::Ranges => "range table",
            Section::Strings => "string table",
            Section::LineTables => "line table",
        };
        f.write_str(name)
    }
}

/// An error that happened while opening or querying a [`Table`](crate::Table).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The file does not start with the DIA magic.
    #[error("invalid dia magic")]
    BadMagic,
    /// The format version in the header is wrong/unknown.
    #[error("unsupported dia version {0}")]
    WrongVersion(u32),
    /// A section declares a field width this reader does not understand.
    #[error("invalid field width {width} in {section}")]
    InvalidFieldWidth {
        /// The section with the bad width.
        section: Section,
        /// The width found in the header.
        width: u64,
    },
    /// The address and range tables do not have the same number of entries.
    #[error("address table has {addresses} entries but range table has {ranges}")]
    CountMismatch {
        /// Number of entries in the address table.
        addresses: u64,
        /// Number of entries in the range table.
        ranges: u64,
    },
    /// The stored checksum of a section does not match its contents.
    #[error("checksum mismatch in {section}: expected {expected:#010x}, found {actual:#010x}")]
    ChecksumMismatch {
        /// The corrupted section.
        section: Section,
        /// The checksum recorded in the header.
        expected: u32,
        /// The checksum computed over the section.
        actual: u32,
    },
    /// Reading from the underlying source failed.
    #[error("failed to read {section}")]
    Io {
        /// The section being read.
        section: Section,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Releasing the source failed.
    #[error("failed to close source")]
    Close(#[source] io::Error),
    /// The line table reference is out of bounds.
    #[error("line table reference {index}+{count} out of bounds")]
    InvalidLineTableReference {
        /// Index of the first referenced entry.
        index: u64,
        /// Number of referenced entries.
        count: u64,
    },
    /// The string offset is out of bounds.
    #[error("string offset {0} out of bounds")]
    InvalidStringReference(u64),
    /// The string data is invalid UTF-8.
    #[error("string data at {0} contains invalid UTF-8")]
    InvalidStringData(u64, #[source] Utf8Error),
}

impl Error {
    pub(crate) fn io(section: Section, source: io::Error) -> Self {
        Error::Io { section, source }
    }

    /// Returns `true` if this error was caused by a failed checksum verification.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Error::ChecksumMismatch { .. })
    }
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// The [`ErrorSink`] is used to raise errors that happen during processing.
///
/// The processing steps themselves are infallible, however errors that happen during processing
/// will be pushed out to the [`ErrorSink`], and it is the responsibility of the user to decide what
/// to do with those errors.
pub trait ErrorSink<E> {
    /// Raises an intermediate processing error with the [`ErrorSink`].
    fn raise_error(&mut self, error: E);
}

impl<E, F: FnMut(E)> ErrorSink<E> for F {
    fn raise_error(&mut self, error: E) {
        self(error)
    }
}
