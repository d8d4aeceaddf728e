#![allow(missing_docs)]

use std::sync::{Arc, Barrier};
use std::thread;

use leafmat::storage::btree::cell::{encode_cell, encode_prefix_key_cell, CellKind};
use leafmat::storage::MemOverflowStore;
use leafmat::types::Result;
use leafmat::{PageBuilder, PageLayout, Position, ResolverOptions, Session, TreeContext};

const NUM_THREADS: usize = 8;
const ROUNDS: usize = 50;
const ROWS: usize = 64;

fn expected_key(row: usize) -> Vec<u8> {
    format!("shared/prefix/{row:04}").into_bytes()
}

#[test]
fn sessions_resolve_a_shared_page_concurrently() -> Result<()> {
    let mut builder = PageBuilder::new(PageLayout::RowLeaf, 0);
    let mut previous: Vec<u8> = Vec::new();
    for row in 0..ROWS {
        let key = expected_key(row);
        let mut key_cell = Vec::new();
        if row == 0 {
            encode_cell(CellKind::Key, &key, &mut key_cell);
        } else {
            let shared = key
                .iter()
                .zip(&previous)
                .take_while(|(a, b)| a == b)
                .count();
            encode_prefix_key_cell(shared, &key[shared..], &mut key_cell);
        }
        let mut value_cell = Vec::new();
        encode_cell(CellKind::Data, &(row as u64).to_be_bytes(), &mut value_cell);
        builder.push_row(&key_cell, Some(&value_cell));
        previous = key;
    }
    let page = Arc::new(builder.build()?);
    let ctx = Arc::new(TreeContext::new(
        Arc::new(MemOverflowStore::new()),
        ResolverOptions::default(),
    ));
    let barrier = Arc::new(Barrier::new(NUM_THREADS));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let page = Arc::clone(&page);
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<usize> {
                barrier.wait();
                let mut session = Session::new();
                let mut checked = 0;
                for round in 0..ROUNDS {
                    let row = (thread_id * 7 + round * 13) % ROWS;
                    let record =
                        session.resolve_record(&ctx, &Position::new(page.clone(), row), true)?;
                    assert_eq!(record.key(), Some(&expected_key(row)[..]));
                    assert_eq!(record.value(), (row as u64).to_be_bytes());
                    checked += 1;
                }
                Ok(checked)
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += handle.join().expect("worker panicked")?;
    }
    assert_eq!(total, NUM_THREADS * ROUNDS);

    // Every prefix-compressed row ends up cached exactly once.
    for row in 1..ROWS {
        assert_eq!(
            page.row(row)?.cached_key().map(|key| key.to_vec()),
            Some(expected_key(row)),
            "row {row}"
        );
    }
    let snap = ctx.stats().snapshot();
    assert_eq!(snap.resolves, (NUM_THREADS * ROUNDS) as u64);
    Ok(())
}
