//! Property-based tests for the paged buffer: a random script of
//! insert/delete operations must agree with a plain `Vec<char>` model,
//! and the block layout must account for every rune.

use core_runes::{Buffer, MemStore};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert { text: String, at_seed: usize },
    Delete { n_seed: usize, at_seed: usize },
    Reset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (".{0,20}", 0usize..64).prop_map(|(text, at_seed)| Op::Insert { text, at_seed }),
        3 => (0usize..16, 0usize..64).prop_map(|(n_seed, at_seed)| Op::Delete { n_seed, at_seed }),
        1 => Just(Op::Reset),
    ]
}

proptest! {
    #[test]
    fn buffer_agrees_with_vec_model(
        block_size in 1usize..12,
        ops in proptest::collection::vec(op_strategy(), 0..40),
    ) {
        let mut buf = Buffer::with_store(block_size, MemStore::new());
        let mut model: Vec<char> = Vec::new();

        for op in ops {
            match op {
                Op::Insert { text, at_seed } => {
                    let rs: Vec<char> = text.chars().collect();
                    let at = if model.is_empty() { 0 } else { at_seed % (model.len() + 1) };
                    buf.insert(&rs, at).expect("insert in range");
                    model.splice(at..at, rs.iter().copied());
                }
                Op::Delete { n_seed, at_seed } => {
                    if model.is_empty() {
                        continue;
                    }
                    let at = at_seed % model.len();
                    let n = n_seed % (model.len() - at + 1);
                    buf.delete(n, at).expect("delete in range");
                    model.drain(at..at + n);
                }
                Op::Reset => {
                    buf.reset();
                    model.clear();
                }
            }

            // Size consistency: the block layout accounts for every rune.
            prop_assert_eq!(buf.size(), model.len());
            let block_total: usize = buf.block_sizes().sum();
            prop_assert_eq!(block_total, buf.size());
            // No block may be empty or oversized.
            for n in buf.block_sizes() {
                prop_assert!(n >= 1 && n <= block_size);
            }
        }

        // Read round-trip over the final state.
        let got = buf.read(model.len(), 0).expect("full read");
        prop_assert_eq!(got, model);
    }

    #[test]
    fn insert_then_read_round_trips(text in ".{0,100}", block_size in 1usize..10) {
        let rs: Vec<char> = text.chars().collect();
        let mut buf = Buffer::with_store(block_size, MemStore::new());
        buf.insert(&rs, 0).expect("insert");
        let got = buf.read(rs.len(), 0).expect("read");
        prop_assert_eq!(got, rs);
    }

    #[test]
    fn reset_is_a_fresh_start(a in ".{0,40}", b in ".{0,40}") {
        let mut buf = Buffer::with_store(4, MemStore::new());
        let ra: Vec<char> = a.chars().collect();
        let rb: Vec<char> = b.chars().collect();
        buf.insert(&ra, 0).expect("first insert");
        buf.reset();
        prop_assert_eq!(buf.size(), 0);
        buf.insert(&rb, 0).expect("second insert");
        let got = buf.read(rb.len(), 0).expect("read");
        prop_assert_eq!(got, rb);
    }
}
