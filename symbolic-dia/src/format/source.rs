//! Random-access byte sources that a [`Table`](crate::Table) reads from.

use std::convert::TryFrom;
use std::fs::File;
use std::io;

/// A random-access source of bytes, such as a file or an in-memory buffer.
///
/// This is the only way a [`Table`](crate::Table) accesses its data after the address table
/// has been loaded.
pub trait Source {
    /// Reads up to `buf.len()` bytes starting at the absolute `offset`.
    ///
    /// Returns the number of bytes read, which is `0` at the end of the data.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Releases the underlying resource.
    ///
    /// A [`Table`](crate::Table) calls this exactly once, either from
    /// [`Table::close`](crate::Table::close) or when opening fails.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fills `buf` completely, failing with [`io::ErrorKind::UnexpectedEof`] at the end of data.
pub(crate) fn read_exact_at<S: Source + ?Sized>(
    source: &S,
    mut buf: &mut [u8],
    mut offset: u64,
) -> io::Result<()> {
    while !buf.is_empty() {
        match source.read_at(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected end of data",
                ))
            }
            Ok(n) => {
                let tmp = buf;
                buf = &mut tmp[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn read_slice_at(data: &[u8], buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let start = match usize::try_from(offset) {
        Ok(start) if start < data.len() => start,
        _ => return Ok(0),
    };
    let len = buf.len().min(data.len() - start);
    buf[..len].copy_from_slice(&data[start..start + len]);
    Ok(len)
}

impl Source for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_slice_at(self, buf, offset)
    }
}

impl Source for &'_ [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_slice_at(self, buf, offset)
    }
}

impl Source for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_slice_at(self, buf, offset)
    }
}

impl Source for memmap2::Mmap {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_slice_at(self, buf, offset)
    }
}

#[cfg(unix)]
impl Source for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl Source for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}
