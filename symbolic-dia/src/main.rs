//! A small utility program to create and query DIA files.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humansize::{file_size_opts, FileSize};

use symbolic_dia::{Converter, Options, Table};

#[derive(Debug, Parser)]
#[command(name = "dia", about = "Create and query DIA symbol tables")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Converts the symbol table of an object file into a DIA file.
    Convert {
        /// The object file to read.
        input: PathBuf,
        /// Where to write the DIA file.
        output: PathBuf,
        /// Keep line tables.
        #[arg(long)]
        lines: bool,
        /// Keep file names.
        #[arg(long)]
        files: bool,
    },
    /// Resolves addresses to frames.
    Lookup {
        /// The DIA file to read.
        file: PathBuf,
        /// Hexadecimal addresses, with or without `0x` prefix.
        #[arg(required = true)]
        addresses: Vec<String>,
        /// Verify section checksums before looking up.
        #[arg(long)]
        verify: bool,
    },
    /// Prints the header of a DIA file.
    Info {
        /// The DIA file to read.
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Args::parse().command {
        Command::Convert {
            input,
            output,
            lines,
            files,
        } => convert(input, output, lines, files),
        Command::Lookup {
            file,
            addresses,
            verify,
        } => lookup(file, &addresses, verify),
        Command::Info { file } => info(file),
    }
}

fn convert(input: PathBuf, output: PathBuf, lines: bool, files: bool) -> Result<()> {
    let file = fs::File::open(&input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    let object = object::File::parse(mmap.as_ref()).context("failed to parse object file")?;

    let options = Options {
        lines,
        files,
        ..Options::default()
    };
    let mut converter = Converter::new(options);
    converter.process_object(&object, |err| log::warn!("skipping symbol: {}", err));

    let mut out = fs::File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let stats = converter.serialize(&mut out)?;

    println!(
        "wrote {} ranges to {} ({})",
        stats.num_ranges,
        output.display(),
        human_size(stats.file_size)
    );
    Ok(())
}

fn lookup(path: PathBuf, addresses: &[String], verify: bool) -> Result<()> {
    let file =
        fs::File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let options = Options {
        checksums: verify,
        ..Options::default()
    };
    let mut table = Table::open(file, options)?;

    for addr in addresses {
        let parsed = u64::from_str_radix(addr.trim_start_matches("0x"), 16)
            .with_context(|| format!("invalid address `{}`", addr))?;
        println!("0x{:x}:", parsed);
        for frame in table.lookup(parsed)? {
            match (frame.file.is_empty(), frame.line) {
                (true, _) => println!("    {}", frame.function),
                (false, 0) => println!("    {} at {}", frame.function, frame.file),
                (false, line) => println!("    {} at {}:{}", frame.function, frame.file, line),
            }
        }
    }

    table.close()?;
    Ok(())
}

fn info(path: PathBuf) -> Result<()> {
    let file =
        fs::File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let table = Table::open(file, Options::default())?;
    let header = *table.header();
    table.close()?;

    println!("version:      {}", header.version);
    println!(
        "addresses:    {} x {} bytes, crc {:08x}",
        header.addresses.count, header.addresses.field_size, header.addresses.crc
    );
    println!(
        "ranges:       {} x {} byte fields, crc {:08x}",
        header.ranges.count, header.ranges.field_size, header.ranges.crc
    );
    println!(
        "strings:      {}, crc {:08x}",
        human_size(header.strings.size),
        header.strings.crc
    );
    println!(
        "line tables:  {} x {} byte fields, crc {:08x}",
        header.line_tables.count, header.line_tables.field_size, header.line_tables.crc
    );
    Ok(())
}

fn human_size(bytes: u64) -> String {
    bytes
        .file_size(file_size_opts::BINARY)
        .unwrap_or_else(|e| e)
}
