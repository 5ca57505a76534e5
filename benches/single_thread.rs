use std::hint::black_box;
use std::io::Cursor;

use criterion::{criterion_group, criterion_main, Bencher, BenchmarkId, Criterion};
use zsv_core::{Cell, RowControl, RowCursor, Scanner, ScannerOptions, Sink};

/// Deterministically generates `rows` CSV data rows (plus a header),
/// five columns wide, with every fourth cell quoted. A fixed xorshift
/// seed keeps benchmark input identical across runs without pulling in
/// a `rand` dependency.
fn generate(rows: usize) -> Vec<u8> {
    let mut state: u64 = 0x9E3779B97F4A7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut out = Vec::with_capacity(rows * 40);
    out.extend_from_slice(b"id,name,email,amount,note\n");
    for i in 0..rows {
        if i % 4 == 3 {
            out.extend_from_slice(format!("{i},\"Doe, Jane\",jane{i}@example.com,{:.2},\"has, a comma\"\n", (next() % 10_000) as f64 / 100.0).as_bytes());
        } else {
            out.extend_from_slice(format!("{i},Jane Doe,jane{i}@example.com,{:.2},plain note\n", (next() % 10_000) as f64 / 100.0).as_bytes());
        }
    }
    out
}

struct Counter(u64);

impl Sink for Counter {
    fn cell(&mut self, cell: Cell<'_>) {
        black_box(cell.try_as_str().unwrap());
    }

    fn row(&mut self, _row: &RowCursor<'_>) -> RowControl {
        self.0 += 1;
        RowControl::Continue
    }
}

pub fn zsv_core_scan(b: &mut Bencher, data: &[u8]) {
    b.iter(|| {
        let mut scanner = Scanner::new(ScannerOptions::default()).unwrap();
        let mut sink = Counter(0);
        scanner.feed(data, &mut sink).unwrap();
        scanner.finish(&mut sink).unwrap();
        black_box(sink.0);
    })
}

pub fn csv_crate(b: &mut Bencher, data: &[u8]) {
    b.iter(|| {
        let cursor = Cursor::new(data);
        for row in csv::ReaderBuilder::new().has_headers(true).from_reader(cursor).into_records() {
            for cell in row.unwrap().into_iter() {
                black_box(cell);
            }
        }
    })
}

fn bench_parsers(c: &mut Criterion) {
    let mut group = c.benchmark_group("Parsers");
    for i in [1_000, 10_000, 50_000, 100_000] {
        let data = generate(i);
        group.bench_with_input(BenchmarkId::new("zsv_core", i), &data, |b, data| zsv_core_scan(b, data));
        group.bench_with_input(BenchmarkId::new("csv", i), &data, |b, data| csv_crate(b, data));
    }
    group.finish();
}

criterion_group!(benches, bench_parsers);
criterion_main!(benches);
