use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand::rngs::SmallRng;

use symbolic_dia::{build, LineInfo, Options, Range, Table};

const LINES: [LineInfo; 4] = [
    LineInfo { offset: 0, line: 10 },
    LineInfo { offset: 8, line: 11 },
    LineInfo { offset: 16, line: 14 },
    LineInfo { offset: 32, line: 15 },
];

/// A function every 0x100 bytes, every other one with two levels of inlining.
fn synthetic_ranges(names: &[String]) -> Vec<Range<'_>> {
    let mut ranges = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let address = 0x40_0000 + i as u64 * 0x100;
        ranges.push(
            Range::new(address, 0xc0, name)
                .with_file("src/lib.rs")
                .with_lines(&LINES),
        );
        if i % 2 == 0 {
            ranges.push(
                Range::new(address + 0x20, 0x40, "inlined_outer")
                    .with_depth(1)
                    .with_file("src/outer.rs")
                    .with_call_site("src/lib.rs", 11),
            );
            ranges.push(
                Range::new(address + 0x28, 0x10, "inlined_inner")
                    .with_depth(2)
                    .with_file("src/inner.rs")
                    .with_call_site("src/outer.rs", 3),
            );
        }
    }
    ranges
}

fn random_addresses(table: &Table<Vec<u8>>, rng: &mut SmallRng) -> [u64; 1000] {
    let start = table.addresses()[0];
    let end = table.addresses()[table.len() - 1] + 0x100;
    let mut addresses = [0; 1000];
    for addr in addresses.iter_mut() {
        *addr = rng.gen_range(start..end);
    }
    addresses
}

pub fn creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Table creation");
    for &count in &[1_000, 100_000] {
        let names: Vec<String> = (0..count).map(|i| format!("function_{}", i)).collect();
        let ranges = synthetic_ranges(&names);
        group.bench_function(BenchmarkId::new("build", count), |b| {
            b.iter(|| build(&ranges, Options::all()).unwrap())
        });

        let buf = build(&ranges, Options::all()).unwrap();
        group.bench_function(BenchmarkId::new("open", count), |b| {
            b.iter(|| Table::open(buf.clone(), Options::default()).unwrap())
        });
        group.bench_function(BenchmarkId::new("open verified", count), |b| {
            b.iter(|| Table::open(buf.clone(), Options::all()).unwrap())
        });
    }
    group.finish();
}

pub fn lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("Address lookup");
    for &count in &[1_000, 100_000] {
        let names: Vec<String> = (0..count).map(|i| format!("function_{}", i)).collect();
        let buf = build(&synthetic_ranges(&names), Options::all()).unwrap();
        let mut table = Table::open(buf, Options::default()).unwrap();

        let mut rng = SmallRng::seed_from_u64(0);
        let addresses = random_addresses(&table, &mut rng);

        let mut frames = Vec::new();
        group.bench_function(BenchmarkId::new("lookup", count), |b| {
            b.iter(|| {
                for &addr in addresses.iter() {
                    frames.clear();
                    table.lookup_into(addr, &mut frames).unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, creation, lookup);
criterion_main!(benches);
