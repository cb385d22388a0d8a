#![allow(dead_code)]

use std::path::PathBuf;

use clover_merge::accumulator::Accumulator;
use clover_merge::model::MergeMode;
use clover_merge::xml::{self, Element};

/// Absolute path of a file under `tests/fixtures`, for tests that need a
/// real file on disk.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Parse an embedded fixture document.
pub fn document(bytes: &[u8]) -> Element {
    xml::parse_document(bytes).unwrap()
}

/// Merge the given fixtures, in order, under `mode`.
pub fn merge_fixtures(mode: MergeMode, fixtures: &[&[u8]]) -> Accumulator {
    let documents: Vec<Element> = fixtures.iter().map(|bytes| document(bytes)).collect();
    let mut acc = Accumulator::new(mode);
    acc.parse_all(&documents);
    acc
}

/// `(line number, hit count)` pairs of a merged file, ascending.
pub fn line_counts(acc: &Accumulator, path: &str) -> Vec<(u32, u64)> {
    acc.file(path)
        .unwrap_or_else(|| panic!("{path} missing from merge"))
        .lines()
        .iter()
        .map(|(n, l)| (*n, l.count))
        .collect()
}

pub fn paths(acc: &Accumulator) -> Vec<String> {
    acc.files().keys().cloned().collect()
}
