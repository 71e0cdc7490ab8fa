use std::cell::Cell;
use std::io;
use std::rc::Rc;

use symbolic_dia::format::raw::{Header, HEADER_SIZE};
use symbolic_dia::{build, Converter, Error, LineInfo, Options, Range, Section, Source, Table};

fn example_file() -> Vec<u8> {
    let lines = [LineInfo::new(0, 1), LineInfo::new(4, 2)];
    let ranges = [
        Range::new(0x1000, 0x100, "main")
            .with_file("main.c")
            .with_lines(&lines),
        Range::new(0x1000, 0x100, "inlined")
            .with_depth(1)
            .with_file("inlined.h")
            .with_call_site("main.c", 2),
        Range::new(0x2000, 0x10, "other").with_lines(&lines),
    ];
    build(&ranges, Options::all()).unwrap()
}

fn header(buf: &[u8]) -> Header {
    let mut bytes = [0; HEADER_SIZE];
    bytes.copy_from_slice(&buf[..HEADER_SIZE]);
    Header::parse(&bytes)
}

fn verify() -> Options {
    Options {
        checksums: true,
        ..Options::default()
    }
}

/// A source that counts how often it was closed.
struct Tracked {
    data: Vec<u8>,
    closed: Rc<Cell<usize>>,
}

impl Source for Tracked {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.data.read_at(buf, offset)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.set(self.closed.get() + 1);
        Ok(())
    }
}

#[test]
fn test_layout() {
    let buf = example_file();
    let header = header(&buf);

    assert_eq!(&buf[0..4], b".dia");
    assert_eq!(header.version, 1);
    assert_eq!(header.addresses.offset, HEADER_SIZE as u64);
    assert_eq!(header.addresses.count, 3);
    assert_eq!(header.ranges.count, 3);
    assert_eq!(header.ranges.offset, header.addresses.offset + 3 * 4);
    assert_eq!(header.strings.offset, header.ranges.offset + 3 * 8 * 4);
    assert_eq!(header.line_tables.offset, header.strings.offset + header.strings.size);
    assert_eq!(header.line_tables.count, 4);
    assert_eq!(
        buf.len() as u64,
        header.line_tables.offset + header.line_tables.count * 2 * 2
    );

    // the string table starts with the empty string and the overflow sentinel
    let strings = header.strings.offset as usize;
    assert_eq!(&buf[strings..strings + 4], &[0, 0, 0, 0]);
    assert_eq!(&buf[strings + 8..strings + 18], b"[overflow]");

    for &section in &[
        Section::Addresses,
        Section::Ranges,
        Section::Strings,
        Section::LineTables,
    ] {
        let (offset, size, crc) = header.section(section).unwrap();
        let bytes = &buf[offset as usize..(offset + size) as usize];
        assert_eq!(crc, crc32c::crc32c(bytes), "{}", section);
    }
}

#[test]
fn test_corruption_detection() {
    let buf = example_file();
    let header = header(&buf);

    for &section in &[
        Section::Addresses,
        Section::Ranges,
        Section::Strings,
        Section::LineTables,
    ] {
        let (offset, size, _) = header.section(section).unwrap();
        for &at in &[offset, offset + size / 2, offset + size - 1] {
            let mut corrupted = buf.clone();
            corrupted[at as usize] ^= 0x40;

            match Table::open(corrupted.clone(), verify()) {
                Err(Error::ChecksumMismatch { section: s, .. }) => assert_eq!(s, section),
                other => panic!("expected checksum error in {}, got {:?}", section, other),
            }
            assert!(Table::open(corrupted, Options::default()).is_ok());
        }
    }

    let mut table = Table::open(buf, verify()).unwrap();
    assert_eq!(table.lookup(0x1000).unwrap().len(), 2);
}

#[test]
fn test_format_errors() {
    let buf = example_file();

    let mut bad_magic = buf.clone();
    bad_magic[0] = b'x';
    assert!(matches!(
        Table::open(bad_magic, Options::default()),
        Err(Error::BadMagic)
    ));

    let mut bad_version = buf.clone();
    bad_version[4] = 2;
    assert!(matches!(
        Table::open(bad_version, Options::default()),
        Err(Error::WrongVersion(2))
    ));

    let mut bad_address_width = buf.clone();
    bad_address_width[0x08] = 2;
    assert!(matches!(
        Table::open(bad_address_width, Options::default()),
        Err(Error::InvalidFieldWidth {
            section: Section::Addresses,
            width: 2
        })
    ));

    let mut bad_range_width = buf.clone();
    bad_range_width[0x28] = 16;
    assert!(matches!(
        Table::open(bad_range_width, Options::default()),
        Err(Error::InvalidFieldWidth {
            section: Section::Ranges,
            width: 16
        })
    ));

    let mut bad_line_width = buf.clone();
    bad_line_width[0x60] = 8;
    assert!(matches!(
        Table::open(bad_line_width, Options::default()),
        Err(Error::InvalidFieldWidth {
            section: Section::LineTables,
            width: 8
        })
    ));

    let mut count_mismatch = buf.clone();
    count_mismatch[0x30] += 1;
    assert!(matches!(
        Table::open(count_mismatch, Options::default()),
        Err(Error::CountMismatch {
            addresses: 3,
            ranges: 4
        })
    ));

    let truncated = buf[..HEADER_SIZE - 1].to_vec();
    let err = Table::open(truncated, Options::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::Io {
            section: Section::Header,
            ..
        }
    ));
    assert_eq!(err.to_string(), "failed to read header");
}

#[test]
fn test_source_closed_once() {
    let closed = Rc::new(Cell::new(0));
    let mut data = example_file();
    let table = Table::open(
        Tracked {
            data: data.clone(),
            closed: closed.clone(),
        },
        verify(),
    )
    .unwrap();
    assert_eq!(closed.get(), 0);
    table.close().unwrap();
    assert_eq!(closed.get(), 1);

    let closed = Rc::new(Cell::new(0));
    data[0] = 0;
    let result = Table::open(
        Tracked {
            data,
            closed: closed.clone(),
        },
        Options::default(),
    );
    assert!(matches!(result, Err(Error::BadMagic)));
    assert_eq!(closed.get(), 1);
}

#[test]
fn test_io_errors_during_lookup() {
    let buf = example_file();
    let header = header(&buf);

    // without string and line tables, the header and addresses still load
    let without_strings = buf[..header.strings.offset as usize].to_vec();
    let mut table = Table::open(without_strings, Options::default()).unwrap();
    assert!(table.lookup(0x100).unwrap().is_empty());
    match table.lookup(0x1000) {
        Err(Error::Io {
            section: Section::Strings,
            source,
        }) => assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof),
        other => panic!("expected string table error, got {:?}", other),
    }

    let without_ranges = buf[..header.ranges.offset as usize].to_vec();
    let mut table = Table::open(without_ranges, Options::default()).unwrap();
    assert!(matches!(
        table.lookup(0x2000),
        Err(Error::Io {
            section: Section::Ranges,
            ..
        })
    ));

    // verification reads every section
    let without_lines = buf[..header.line_tables.offset as usize].to_vec();
    assert!(matches!(
        Table::open(without_lines, verify()),
        Err(Error::Io {
            section: Section::LineTables,
            ..
        })
    ));
}

#[test]
fn test_file_source() {
    let mut converter = Converter::new(Options::all());
    converter.visit(&Range::new(0x1000, 0x100, "main").with_file("main.c"));
    converter.visit(&Range::new(0x1020, 0x10, "inlined").with_depth(1));

    let mut file = tempfile::tempfile().unwrap();
    let stats = converter.serialize(&mut file).unwrap();
    assert_eq!(file.metadata().unwrap().len(), stats.file_size);

    let mut table = Table::open(file, verify()).unwrap();
    let frames = table.lookup(0x1024).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].function, "inlined");
    assert_eq!(frames[1].function, "main");
    assert_eq!(frames[1].file, "main.c");
    table.close().unwrap();
}
