use richtext_core::{Attributes, BatchType, Document, DocumentConfig, Operation, ReplicaId, Target};
use richtext_test_support::{doc_from, init_test_logging, main_data, pos, range};

#[test]
fn undo_and_redo_local_typing() {
    let mut doc = doc_from(b"a", "<paragraph>abc</paragraph>");
    doc.change(|w| w.insert_text("X", Attributes::new(), &pos(&[0, 3])))
        .unwrap();
    assert!(doc.can_undo());

    let undone = doc.undo().unwrap().expect("one batch to undo");
    assert_eq!(undone.batch.batch_type, BatchType::Undo);
    assert_eq!(main_data(&doc), "<paragraph>abc</paragraph>");
    assert!(!doc.can_undo());
    assert!(doc.can_redo());

    doc.redo().unwrap().expect("one batch to redo");
    assert_eq!(main_data(&doc), "<paragraph>abcX</paragraph>");
    assert!(doc.can_undo());
    assert!(doc.undo().unwrap().is_some());
    assert!(doc.redo().unwrap().is_some());
    assert!(doc.redo().unwrap().is_none());
}

#[test]
fn undo_skips_over_remote_edits() {
    init_test_logging();
    let mut a = doc_from(b"a", "<paragraph>abc</paragraph>");
    let base = a.version();
    a.change(|w| w.insert_text("X", Attributes::new(), &pos(&[0, 3])))
        .unwrap();

    let remote = Operation::insert(
        &ReplicaId::new(b"b"),
        base,
        pos(&[0, 0]),
        vec![richtext_core::Node::text("Y")],
    );
    a.apply_remote(&[remote]).unwrap();
    assert_eq!(main_data(&a), "<paragraph>YabcX</paragraph>");
    assert!(a.can_undo());

    a.undo().unwrap();
    assert_eq!(main_data(&a), "<paragraph>Yabc</paragraph>");
    a.redo().unwrap();
    assert_eq!(main_data(&a), "<paragraph>YabcX</paragraph>");
}

#[test]
fn undo_restores_removed_formatted_text() {
    let mut doc = doc_from(b"a", "<paragraph>ab<$text bold=\"true\">cd</$text>ef</paragraph>");
    doc.change(|w| w.remove(&Target::Range(range(&[0, 1], &[0, 5]))))
        .unwrap();
    assert_eq!(main_data(&doc), "<paragraph>af</paragraph>");
    doc.undo().unwrap();
    assert_eq!(
        main_data(&doc),
        "<paragraph>ab<$text bold=\"true\">cd</$text>ef</paragraph>"
    );
}

#[test]
fn remote_and_transparent_batches_are_not_undoable() {
    let mut doc = doc_from(b"a", "<paragraph>abc</paragraph>");
    let version = doc.version();
    let remote = Operation::insert(&ReplicaId::new(b"b"), version, pos(&[0, 0]), vec![richtext_core::Node::text("Y")]);
    doc.apply_remote(&[remote]).unwrap();
    doc.change_with(BatchType::Transparent, |w| {
        w.insert_text("Z", Attributes::new(), &pos(&[0, 0]))
    })
    .unwrap();
    assert!(!doc.can_undo());
    assert!(doc.undo().unwrap().is_none());
}

#[test]
fn history_limit_drops_oldest_batches() {
    let mut doc = Document::with_config(ReplicaId::new(b"a"), DocumentConfig::default().with_history_limit(2)).unwrap();
    doc.change(|w| w.insert(richtext_core::Node::element("paragraph"), &pos(&[0])))
        .unwrap();
    for ch in ["a", "b", "c"] {
        doc.change(|w| w.insert_text(ch, Attributes::new(), &pos(&[0, 0])))
            .unwrap();
    }
    assert!(doc.undo().unwrap().is_some());
    assert!(doc.undo().unwrap().is_some());
    assert!(doc.undo().unwrap().is_none());
    assert_eq!(main_data(&doc), "<paragraph>a</paragraph>");
}

#[test]
fn rejects_remote_operations_from_the_future_or_unknown_roots() {
    let mut doc = doc_from(b"a", "<paragraph>abc</paragraph>");
    let version = doc.version();
    let ahead = Operation::no_op(&ReplicaId::new(b"b"), version + 1);
    assert!(matches!(
        doc.apply_remote(&[ahead]),
        Err(richtext_core::Error::VersionConflict { .. })
    ));
    let elsewhere = Operation::insert(
        &ReplicaId::new(b"b"),
        version,
        richtext_core::Position::new("title", vec![0]).unwrap(),
        vec![richtext_core::Node::text("t")],
    );
    assert!(matches!(
        doc.apply_remote(&[elsewhere]),
        Err(richtext_core::Error::CrossRootOperation(_))
    ));
    assert_eq!(doc.version(), version);
}
