use zsv_core::{
    Cell, OverwriteEntry, OverwriteMerge, RowControl, RowCursor, Scanner, ScannerOptions, Sink,
    VecOverwriteSource, Warning,
};

#[derive(Default)]
struct Collector {
    rows: Vec<Vec<String>>,
    warnings: Vec<Warning>,
}

impl Sink for Collector {
    fn cell(&mut self, _cell: Cell<'_>) {}

    fn row(&mut self, row: &RowCursor<'_>) -> RowControl {
        self.rows.push(row.cells().map(|c| c.try_as_str().unwrap().to_owned()).collect());
        RowControl::Continue
    }

    fn warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }
}

fn scan(opts: ScannerOptions, input: &[u8]) -> Collector {
    let mut scanner = Scanner::new(opts).unwrap();
    let mut sink = Collector::default();
    scanner.feed(input, &mut sink).unwrap();
    scanner.finish(&mut sink).unwrap();
    sink
}

#[test]
fn basic_comma_delimited_rows() {
    let out = scan(ScannerOptions::default(), b"a,b,c\n1,2,3\n");
    assert_eq!(out.rows, vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
}

#[test]
fn quoted_cell_with_embedded_delimiter() {
    let out = scan(ScannerOptions::default(), b"a,\"b,c\",d\n");
    assert_eq!(out.rows, vec![vec!["a", "b,c", "d"]]);
}

#[test]
fn quoted_cell_with_escaped_embedded_quote() {
    let out = scan(ScannerOptions::default(), b"a,\"say \"\"hi\"\"\",c\n");
    assert_eq!(out.rows, vec![vec!["a", "say \"hi\"", "c"]]);
}

#[test]
fn quoted_cell_with_embedded_newline() {
    let out = scan(ScannerOptions::default(), b"a,\"line1\nline2\",c\n");
    assert_eq!(out.rows, vec![vec!["a", "line1\nline2", "c"]]);
}

#[test]
fn leading_blank_row_is_skipped_with_crlf() {
    let out = scan(ScannerOptions::default(), b"\r\na,b\r\n1,2\r\n");
    assert_eq!(out.rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    assert!(out.warnings.contains(&Warning::BlankHeaderRowsSkipped { count: 1 }));
}

#[test]
fn two_rows_with_no_trailing_newline() {
    let out = scan(ScannerOptions::default(), b"a,b\n1,2");
    assert_eq!(out.rows, vec![vec!["a", "b"], vec!["1", "2"]]);
}

#[test]
fn utf8_bom_is_stripped_from_first_row() {
    let mut input = vec![0xEF, 0xBB, 0xBF];
    input.extend_from_slice(b"a,b\n1,2\n");
    let out = scan(ScannerOptions::default(), &input);
    assert_eq!(out.rows, vec![vec!["a", "b"], vec!["1", "2"]]);
}

#[test]
fn overwrite_merge_substitutes_matching_cells() {
    let entries = vec![
        OverwriteEntry { row: 0, col: 1, value: b"X".to_vec() },
        OverwriteEntry { row: 2, col: 0, value: b"Y".to_vec() },
    ];
    let source = VecOverwriteSource::new(entries);
    let mut collector = Collector::default();
    let mut merge = OverwriteMerge::new(&mut collector, source).unwrap();
    let mut scanner = Scanner::new(ScannerOptions::default()).unwrap();
    scanner.feed(b"1,2\n3,4\n5,6\n", &mut merge).unwrap();
    scanner.finish(&mut merge).unwrap();
    drop(merge);

    assert_eq!(collector.rows, vec![vec!["1", "X"], vec!["3", "4"], vec!["Y", "6"]]);
}

/// Feeds the same input through the scanner split at every chunk size
/// in the given list and asserts the resulting rows are identical no
/// matter where the chunk boundaries fall.
fn assert_boundary_independent(input: &[u8], expected: &[Vec<&str>]) {
    for chunk_size in [1usize, 2, 3, 7, 16, 31, 64, 4096] {
        let mut scanner = Scanner::new(ScannerOptions::default()).unwrap();
        let mut sink = Collector::default();
        for chunk in input.chunks(chunk_size) {
            scanner.feed(chunk, &mut sink).unwrap();
        }
        scanner.finish(&mut sink).unwrap();
        assert_eq!(sink.rows, expected, "mismatch at chunk_size={chunk_size}");
    }
}

#[test]
fn scanning_is_independent_of_chunk_boundaries() {
    let input: &[u8] = b"id,name,note\n1,Alice,\"hi, there\"\n2,\"Bob\"\"s\",\"multi\nline\"\n3,Carol,plain\n";
    let expected = vec![
        vec!["id", "name", "note"],
        vec!["1", "Alice", "hi, there"],
        vec!["2", "Bob\"s", "multi\nline"],
        vec!["3", "Carol", "plain"],
    ];
    assert_boundary_independent(input, &expected);
}
