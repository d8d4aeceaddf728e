#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use leafmat::storage::btree::cell::{encode_cell, encode_overflow_cell, CellKind};
use leafmat::storage::FileOverflowStore;
use leafmat::{PageBuilder, PageLayout};
use serde_json::Value;
use tempfile::TempDir;

fn cell(kind: CellKind, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_cell(kind, payload, &mut buf);
    buf
}

fn write_row_page(dir: &TempDir) -> (PathBuf, PathBuf) {
    let overflow_path = dir.path().join("page.ovfl");
    let store = FileOverflowStore::create(&overflow_path, 256).expect("overflow file");
    let reference = store.append(&[0x5a; 600]).expect("append");
    let mut overflow_cell = Vec::new();
    encode_overflow_cell(CellKind::DataOverflow, reference, &mut overflow_cell);

    let image = PageBuilder::new(PageLayout::RowLeaf, 0)
        .push_row(&cell(CellKind::Key, b"a"), Some(&cell(CellKind::Data, b"\x01\x02")))
        .push_row(&cell(CellKind::Key, b"b"), None)
        .push_row(&cell(CellKind::Key, b"c"), Some(&overflow_cell))
        .push_row(&cell(CellKind::Key, b"d"), Some(&cell(CellKind::Deleted, b"")))
        .finish()
        .expect("page image");
    let page_path = dir.path().join("page.bin");
    fs::write(&page_path, &image).expect("write page");
    (page_path, overflow_path)
}

#[test]
fn inspect_reports_every_slot_as_json() {
    let dir = TempDir::new().expect("tempdir");
    let (page_path, overflow_path) = write_row_page(&dir);
    let output = cargo_bin_cmd!("leafmat-inspect")
        .args(["--format", "json", "--keys", "--overflow-page-size", "256", "--overflow"])
        .arg(&overflow_path)
        .arg(&page_path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["layout_tag"], 4);
    assert_eq!(json["flags"], 0);
    assert_eq!(json["slot_count"], 4);
    let records = json["records"].as_array().expect("records");
    assert_eq!(records[0]["key"], "61");
    assert_eq!(records[0]["value"], "0102");
    assert_eq!(records[1]["value"], "");
    assert_eq!(records[2]["value"].as_str().map(str::len), Some(1200));
    assert!(records[3]["error"]
        .as_str()
        .is_some_and(|msg| msg.contains("illegal format")));
    assert_eq!(json["stats"]["overflow_fetches"], 1);
}

#[test]
fn inspect_fails_on_unreadable_page() {
    let dir = TempDir::new().expect("tempdir");
    let bogus = dir.path().join("short.bin");
    fs::write(&bogus, [4u8, 0, 0]).expect("write");
    cargo_bin_cmd!("leafmat-inspect")
        .arg(&bogus)
        .assert()
        .failure();
}
