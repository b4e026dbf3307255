//! Fixtures shared by the richtext-core integration suites.

use std::sync::Once;

use richtext_core::dev_utils;
use richtext_core::{Document, Position, Range, ReplicaId, RootName, Version};
use tracing_subscriber::EnvFilter;

static LOGGING: Once = Once::new();

/// Routes `tracing` output to the test harness. Filtered by `RUST_LOG`.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Position in the `main` root.
pub fn pos(path: &[usize]) -> Position {
    Position::new(RootName::MAIN, path.to_vec()).expect("position paths are never empty")
}

/// Range in the `main` root.
pub fn range(start: &[usize], end: &[usize]) -> Range {
    Range::new(pos(start), pos(end)).expect("range boundaries are ordered")
}

/// Document whose `main` root holds `data` in model notation.
pub fn doc_from(origin: &[u8], data: &str) -> Document {
    let mut doc = Document::new(ReplicaId::new(origin));
    dev_utils::set_data(&mut doc, &RootName::main(), data).expect("valid model notation");
    doc
}

pub fn main_data(doc: &Document) -> String {
    dev_utils::stringify(doc, &RootName::main()).expect("main root exists")
}

/// Every permutation of `items`, generated with Heap's algorithm.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap_permute<T: Clone>(k: usize, items: &mut [T], res: &mut Vec<Vec<T>>) {
        if k <= 1 {
            res.push(items.to_vec());
            return;
        }
        heap_permute(k - 1, items, res);
        for i in 0..(k - 1) {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            heap_permute(k - 1, items, res);
        }
    }
    let mut res = Vec::new();
    heap_permute(items.len(), &mut items.to_vec(), &mut res);
    res
}

/// Sends each document the other's operations since `base`.
pub fn exchange(a: &mut Document, b: &mut Document, base: Version) -> richtext_core::Result<()> {
    let from_a = a.operations_since(base)?;
    let from_b = b.operations_since(base)?;
    a.apply_remote(&from_b)?;
    b.apply_remote(&from_a)?;
    Ok(())
}

/// Panics with both contents when the visible roots differ.
pub fn assert_converges(a: &Document, b: &Document) {
    a.validate_invariants().expect("first document is consistent");
    b.validate_invariants().expect("second document is consistent");
    assert!(
        a.content_eq(b),
        "documents diverged:\n  {}\n  {}",
        main_data(a),
        main_data(b)
    );
}
