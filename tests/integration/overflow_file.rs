#![allow(missing_docs)]

use std::sync::Arc;

use leafmat::storage::btree::cell::{encode_cell, encode_overflow_cell, CellKind};
use leafmat::storage::FileOverflowStore;
use leafmat::types::{Error, FetchError, OverflowRef, PageId, Result};
use leafmat::{PageBuilder, PageLayout, Position, ResolverOptions, Session, TreeContext};
use tempfile::tempdir;

fn overflow_row(key: &[u8], reference: OverflowRef) -> (Vec<u8>, Vec<u8>) {
    let mut key_cell = Vec::new();
    encode_cell(CellKind::Key, key, &mut key_cell);
    let mut value_cell = Vec::new();
    encode_overflow_cell(CellKind::DataOverflow, reference, &mut value_cell);
    (key_cell, value_cell)
}

#[test]
fn overflow_values_resolve_from_a_reopened_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tree.ovfl");
    let payloads: Vec<Vec<u8>> = (1..6u8)
        .map(|i| (0..i as usize * 700).map(|j| (j as u8) ^ i).collect())
        .collect();
    let references = {
        let store = FileOverflowStore::create(&path, 512)?;
        payloads
            .iter()
            .map(|payload| store.append(payload))
            .collect::<Result<Vec<_>>>()?
    };

    let mut builder = PageBuilder::new(PageLayout::RowLeaf, 0);
    for (idx, reference) in references.iter().enumerate() {
        let (key_cell, value_cell) = overflow_row(format!("k{idx}").as_bytes(), *reference);
        builder.push_row(&key_cell, Some(&value_cell));
    }
    let page = Arc::new(builder.build()?);

    let store = Arc::new(FileOverflowStore::open(&path, 512)?);
    let ctx = TreeContext::new(store, ResolverOptions::default());
    let mut session = Session::new();
    for (slot, payload) in payloads.iter().enumerate() {
        let record = session.resolve_record(&ctx, &Position::new(page.clone(), slot), true)?;
        assert_eq!(record.key(), Some(format!("k{slot}").as_bytes()));
        assert_eq!(record.value(), &payload[..]);
    }
    assert_eq!(ctx.stats().overflow_fetches(), payloads.len() as u64);
    Ok(())
}

#[test]
fn stale_reference_surfaces_the_store_failure() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(FileOverflowStore::create(dir.path().join("ovfl"), 128)?);
    let real = store.append(&[1u8; 300])?;
    let past_end = OverflowRef {
        page: PageId(real.page.0 + 100),
        ..real
    };
    let wrong_len = OverflowRef {
        len: real.len + 1,
        ..real
    };

    let mut builder = PageBuilder::new(PageLayout::RowLeaf, 0);
    for reference in [past_end, wrong_len] {
        let (key_cell, value_cell) = overflow_row(b"k", reference);
        builder.push_row(&key_cell, Some(&value_cell));
    }
    let page = Arc::new(builder.build()?);
    let ctx = TreeContext::new(store, ResolverOptions::default());
    let mut session = Session::new();

    let err = session
        .resolve_record(&ctx, &Position::new(page.clone(), 0), false)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OverflowFetchFailed {
            source: FetchError::Missing(_),
            ..
        }
    ));
    let err = session
        .resolve_record(&ctx, &Position::new(page, 1), false)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OverflowFetchFailed {
            source: FetchError::LengthMismatch { .. },
            ..
        }
    ));
    Ok(())
}

#[test]
fn file_store_rejects_tiny_pages() {
    let dir = tempdir().expect("tempdir");
    let err = FileOverflowStore::create(dir.path().join("ovfl"), 8)
        .err()
        .expect("page size rejected");
    assert!(matches!(err, Error::Invalid(_)));
}
