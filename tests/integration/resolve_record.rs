#![allow(missing_docs)]

use std::sync::Arc;

use leafmat::storage::btree::cell::{encode_cell, encode_overflow_cell, CellKind};
use leafmat::storage::{CodecKind, MemOverflowStore};
use leafmat::types::{Error, Result};
use leafmat::{Page, PageBuilder, PageLayout, Position, ResolverOptions, Session, TreeContext, Update};
use proptest::prelude::*;

fn data_cell(value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_cell(CellKind::Data, value, &mut buf);
    buf
}

fn key_cell(key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_cell(CellKind::Key, key, &mut buf);
    buf
}

fn context(store: &Arc<MemOverflowStore>) -> TreeContext {
    TreeContext::new(store.clone(), ResolverOptions::default())
}

#[test]
fn page_image_round_trips_through_bytes() -> Result<()> {
    let image = PageBuilder::new(PageLayout::ColumnVar, 0)
        .push_cell(&data_cell(b"first"))
        .push_cell(&data_cell(b""))
        .push_cell(&data_cell(b"third"))
        .finish()?;
    let page = Arc::new(Page::from_image(image.to_vec())?);
    let store = Arc::new(MemOverflowStore::new());
    let ctx = context(&store);
    let mut session = Session::new();
    let values: Vec<Vec<u8>> = (0..page.slot_count())
        .map(|slot| {
            session
                .resolve_record(&ctx, &Position::new(page.clone(), slot), false)
                .map(|record| record.value().to_vec())
        })
        .collect::<Result<_>>()?;
    assert_eq!(values, vec![b"first".to_vec(), Vec::new(), b"third".to_vec()]);
    Ok(())
}

#[test]
fn update_chain_head_is_the_only_one_consulted() -> Result<()> {
    let store = Arc::new(MemOverflowStore::new());
    let ctx = context(&store);
    let page = Arc::new(
        PageBuilder::new(PageLayout::RowLeaf, 0)
            .push_row(&key_cell(b"k"), Some(&data_cell(b"disk")))
            .build()?,
    );
    let oldest = Arc::new(Update::value(&b"v1"[..]));
    let deleted = Arc::new(Update::tombstone().with_next(oldest));
    let revived = Arc::new(Update::value(&b"v3"[..]).with_next(deleted.clone()));
    let mut session = Session::new();

    let record = session.resolve_record(&ctx, &Position::new(page.clone(), 0).with_update(revived), true)?;
    assert_eq!(record.key(), Some(&b"k"[..]));
    assert_eq!(record.value(), b"v3");

    let err = session
        .resolve_record(&ctx, &Position::new(page.clone(), 0).with_update(deleted), true)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound));

    let record = session.resolve_record(&ctx, &Position::new(page, 0), false)?;
    assert_eq!(record.value(), b"disk");
    Ok(())
}

#[test]
fn session_buffers_are_reused_across_calls() -> Result<()> {
    let store = Arc::new(MemOverflowStore::new());
    let ctx = context(&store);
    let big = vec![0xabu8; 2048];
    let mut overflow_cell = Vec::new();
    encode_overflow_cell(CellKind::DataOverflow, store.insert(&big), &mut overflow_cell);
    let page = Arc::new(
        PageBuilder::new(PageLayout::ColumnVar, 0)
            .push_cell(&overflow_cell)
            .push_cell(&data_cell(b"small"))
            .build()?,
    );
    let mut session = Session::new();
    assert_eq!(session.scratch_capacity(), 0);
    session.resolve_record(&ctx, &Position::new(page.clone(), 0), false)?;
    let reserved = session.scratch_capacity();
    assert!(reserved >= big.len());
    session.resolve_record(&ctx, &Position::new(page, 1), false)?;
    assert_eq!(session.scratch_capacity(), reserved);
    session.release_buffers();
    assert_eq!(session.scratch_capacity(), 0);
    Ok(())
}

#[test]
fn corrupt_snappy_payload_is_a_decode_error() -> Result<()> {
    let store = Arc::new(MemOverflowStore::new());
    let ctx = TreeContext::new(store, ResolverOptions::new().value_codec(CodecKind::Snappy));
    let packed = snap::raw::Encoder::new()
        .compress_vec(b"a literal that will be cut short")
        .expect("compress");
    let page = Arc::new(
        PageBuilder::new(PageLayout::ColumnVar, 0)
            .push_cell(&data_cell(&packed[..packed.len() - 4]))
            .build()?,
    );
    let err = Session::new()
        .resolve_record(&ctx, &Position::new(page, 0), false)
        .unwrap_err();
    assert!(matches!(err, Error::Decode(_)), "{err:?}");
    Ok(())
}

#[test]
fn fixed_and_rle_values_are_never_decompressed() -> Result<()> {
    let store = Arc::new(MemOverflowStore::new());
    let ctx = TreeContext::new(store, ResolverOptions::new().value_codec(CodecKind::Snappy));
    let fixed = Arc::new(
        PageBuilder::new(PageLayout::ColumnFixed, 4)
            .push_fixed(b"\xff\xff\xff\xff")
            .build()?,
    );
    let rle = Arc::new(
        PageBuilder::new(PageLayout::ColumnRle, 2)
            .push_run(10, b"zz")
            .build()?,
    );
    let mut session = Session::new();
    assert_eq!(
        session.resolve_record(&ctx, &Position::new(fixed, 0), false)?.value(),
        b"\xff\xff\xff\xff"
    );
    assert_eq!(
        session.resolve_record(&ctx, &Position::new(rle, 0), false)?.value(),
        b"zz"
    );
    assert_eq!(ctx.stats().snapshot().decompressions, 0);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn row_leaf_records_resolve_byte_exact(
        rows in proptest::collection::vec(
            (
                proptest::collection::vec(any::<u8>(), 0..48),
                proptest::option::of(proptest::collection::vec(any::<u8>(), 0..200)),
            ),
            1..48,
        ),
    ) {
        let store = Arc::new(MemOverflowStore::new());
        let ctx = context(&store);
        let mut builder = PageBuilder::new(PageLayout::RowLeaf, 0);
        for (key, value) in &rows {
            let value_cell = value.as_deref().map(data_cell);
            builder.push_row(&key_cell(key), value_cell.as_deref());
        }
        let page = Arc::new(builder.build().expect("page"));
        let mut session = Session::new();
        for (slot, (key, value)) in rows.iter().enumerate() {
            let record = session
                .resolve_record(&ctx, &Position::new(page.clone(), slot), true)
                .expect("resolve");
            prop_assert_eq!(record.key(), Some(&key[..]));
            prop_assert_eq!(record.value(), value.as_deref().unwrap_or_default());
        }
    }

    #[test]
    fn rle_offsets_resolve_to_their_run(
        runs in proptest::collection::vec((1u32..20, any::<[u8; 3]>()), 1..24),
    ) {
        let store = Arc::new(MemOverflowStore::new());
        let ctx = context(&store);
        let mut builder = PageBuilder::new(PageLayout::ColumnRle, 3);
        for (repeat, value) in &runs {
            builder.push_run(*repeat, value);
        }
        let page = Arc::new(builder.build().expect("page"));
        let expected: Vec<[u8; 3]> = runs
            .iter()
            .flat_map(|(repeat, value)| std::iter::repeat(*value).take(*repeat as usize))
            .collect();
        prop_assert_eq!(page.record_count().expect("count"), expected.len() as u64);
        let mut session = Session::new();
        for (offset, value) in expected.iter().enumerate() {
            let slot = page.rle_slot_for(offset as u64).expect("rle").expect("in range");
            let record = session
                .resolve_record(&ctx, &Position::new(page.clone(), slot), false)
                .expect("resolve");
            prop_assert_eq!(record.value(), &value[..]);
        }
    }
}
