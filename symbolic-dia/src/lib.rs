//! The DIA symbol table format.
//!
//! A DIA file maps the virtual addresses of one binary to the logical stack frames found there,
//! including frames that were introduced by inlining. It is built once from a stream of
//! [`Range`]s by a [`Converter`], and then queried through a [`Table`] that only keeps the
//! address index in memory and reads everything else on demand from a [`Source`].
//!
//! # Examples
//!
//! ```
//! use symbolic_dia::{build, Options, Range, Table};
//!
//! let ranges = [
//!     Range::new(0x1000, 0x100, "main"),
//!     Range::new(0x1000, 0x100, "inlined_helper").with_depth(1),
//! ];
//! let buf = build(&ranges, Options::default()).unwrap();
//!
//! let mut table = Table::open(buf, Options::default()).unwrap();
//! let frames = table.lookup(0x1050).unwrap();
//! assert_eq!(frames[0].function, "inlined_helper");
//! assert_eq!(frames[1].function, "main");
//! table.close().unwrap();
//! ```

#![warn(missing_docs)]

pub mod converter;
pub mod error;
pub mod format;

pub use converter::{build, Converter, LineInfo, ProcessError, Range, Stats};
pub use error::{Error, ErrorSink, Section};
pub use format::{Frame, Source, Table};

/// Configuration shared by the [`Converter`] and the [`Table`] reader.
///
/// The converter looks at `lines` and `files`; checksums are always written. The reader
/// looks at `checksums` and verifies every section when it is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Verify the per-section checksums when opening a file.
    pub checksums: bool,
    /// Store the line tables of each range.
    pub lines: bool,
    /// Store the defining and call-site file names of each range.
    pub files: bool,
}

impl Options {
    /// Options with every flag enabled.
    pub fn all() -> Self {
        Self {
            checksums: true,
            lines: true,
            files: true,
        }
    }
}
