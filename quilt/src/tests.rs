use std::sync::Arc;

use crate::edit::EditKind;
use crate::{
    ApplyError, Edit, EditId, EditTree, MalformedKind, Processor, SourceModifier, Style, Visitor,
};

#[cfg(feature = "fixtures")]
mod fixture {
    use std::path::Path;

    fn check(name: &str) {
        crate::fixtures::check_apply_fixture(Path::new("../fixtures/apply").join(name));
    }

    #[test]
    fn insert_order() {
        // Two insertions at the same offset apply in arrival order.
        check("insert_order.txt");
    }

    #[test]
    fn shift() {
        // An earlier delete shifts the recorded position of a later insert.
        check("shift.txt");
    }

    #[test]
    fn marker() {
        // A range marker tracks its text through a replace before it.
        check("marker.txt");
    }

    #[test]
    fn nested() {
        // Nested groups, a marker swallowed by a delete, and a replace at
        // the end of the document.
        check("nested.txt");
    }

    #[test]
    fn move_forward() {
        check("move.txt");
    }

    #[test]
    fn move_backward() {
        // The target sits before the source, so it executes after it.
        check("move_backward.txt");
    }

    #[test]
    fn copy() {
        check("copy.txt");
    }

    #[test]
    fn replace_runs() {
        check("replace_runs.txt");
    }

    #[test]
    fn multiline() {
        check("multiline.txt");
    }
}

// ---------------------------------------------------------------- container

#[test]
fn children_are_sorted_by_offset() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let late = tree.add(root, Edit::delete(6..8)).unwrap();
    let early = tree.add(root, Edit::delete(0..2)).unwrap();
    let mid = tree.add(root, Edit::replace(3..5, "xy")).unwrap();
    assert_eq!(tree.children(root), [early, mid, late]);
    assert_eq!(tree.region(root), Some(0..8));
    assert!(tree.covers(root, mid));
}

#[test]
fn overlap_is_rejected_without_mutation() {
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::delete(2..6)).unwrap();
    let overlapping = tree.alloc(Edit::replace(4..9, "nope"));
    let err = tree.add_child(root, overlapping).unwrap_err();
    assert_eq!(err.kind, MalformedKind::Overlap);
    assert_eq!(err.parent, Some(root));
    assert_eq!(tree.child_count(root), 1);
    assert_eq!(tree.parent(overlapping), None);
    assert_eq!(tree.region(root), Some(2..6));
}

#[test]
fn insert_at_start_of_sibling_is_overlap() {
    // An insertion pinned to the first character of a delete's region has
    // no defined order relative to the delete; reject both arrival orders.
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::insert(0, "x")).unwrap();
    let err = tree.add(root, Edit::delete(0..3)).unwrap_err();
    assert_eq!(err.kind, MalformedKind::Overlap);

    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::delete(0..3)).unwrap();
    let err = tree.add(root, Edit::insert(0, "x")).unwrap_err();
    assert_eq!(err.kind, MalformedKind::Overlap);
}

#[test]
fn insert_at_end_of_sibling_is_allowed() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let del = tree.add(root, Edit::delete(0..3)).unwrap();
    let ins = tree.add(root, Edit::insert(3, "x")).unwrap();
    assert_eq!(tree.children(root), [del, ins]);
}

#[test]
fn zero_length_edits_cannot_parent() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let insert = tree.add(root, Edit::insert(0, "x")).unwrap();
    let child = tree.alloc(Edit::range_marker(0..0));
    let err = tree.add_child(insert, child).unwrap_err();
    assert_eq!(err.kind, MalformedKind::ZeroLengthParent);
}

#[test]
fn parent_must_cover_child() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let del = tree.add(root, Edit::delete(2..5)).unwrap();
    let err = tree.add(del, Edit::range_marker(4..7)).unwrap_err();
    assert_eq!(err.kind, MalformedKind::NotCovered);
    tree.add(del, Edit::range_marker(3..4)).unwrap();
}

#[test]
fn attached_edits_cannot_be_attached_again() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let del = tree.add(root, Edit::delete(0..2)).unwrap();
    let group = tree.add(root, Edit::group()).unwrap();
    let err = tree.add_child(group, del).unwrap_err();
    assert_eq!(err.kind, MalformedKind::HasParent);
}

#[test]
fn group_growth_respects_non_group_ancestors() {
    // A group nested inside a replace cannot grow past the replace.
    let mut tree = EditTree::new();
    let root = tree.root();
    let rep = tree.add(root, Edit::replace(0..6, "-")).unwrap();
    let group = tree.add(rep, Edit::group()).unwrap();
    tree.add(group, Edit::range_marker(1..3)).unwrap();
    assert_eq!(tree.region(group), Some(1..3));
    let err = tree.add(group, Edit::range_marker(5..8)).unwrap_err();
    assert_eq!(err.kind, MalformedKind::NotCovered);
    assert_eq!(tree.region(group), Some(1..3));
}

#[test]
fn group_growth_cannot_collide_with_siblings() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let group = tree.add(root, Edit::group()).unwrap();
    tree.add(group, Edit::delete(5..7)).unwrap();
    tree.add(root, Edit::delete(0..4)).unwrap();
    // growing the group to 1..7 would run into the 0..4 sibling
    let err = tree.add(group, Edit::range_marker(1..5)).unwrap_err();
    assert_eq!(err.kind, MalformedKind::Overlap);
    assert_eq!(tree.region(group), Some(5..7));
}

#[test]
fn add_children_stops_at_first_failure() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let a = tree.alloc(Edit::delete(0..2));
    let b = tree.alloc(Edit::delete(1..4));
    let c = tree.alloc(Edit::delete(6..8));
    let err = tree.add_children(root, [a, b, c]).unwrap_err();
    assert_eq!(err.kind, MalformedKind::Overlap);
    // a stays linked, b failed, c was never tried
    assert_eq!(tree.children(root), [a]);
    assert_eq!(tree.parent(b), None);
    assert_eq!(tree.parent(c), None);
}

#[test]
fn removed_children_detach_cleanly() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let a = tree.add(root, Edit::delete(0..2)).unwrap();
    let b = tree.add(root, Edit::delete(3..5)).unwrap();
    let c = tree.add(root, Edit::delete(6..8)).unwrap();

    assert_eq!(tree.remove_child_at(root, 1), b);
    assert_eq!(tree.parent(b), None);
    assert!(tree.remove_child(root, c));
    assert!(!tree.remove_child(root, c));
    assert_eq!(tree.remove_children(root), [a]);
    assert!(!tree.has_children(root));

    // detached edits can be attached elsewhere
    let group = tree.add(root, Edit::group()).unwrap();
    tree.add_children(group, [a, b, c]).unwrap();
    assert_eq!(tree.children(group), [a, b, c]);
}

#[test]
#[should_panic(expected = "coverage of an empty edit list")]
fn coverage_of_nothing_panics() {
    EditTree::new().coverage(&[]);
}

// -------------------------------------------------------------------- apply

#[test]
fn empty_group_is_a_noop() {
    let mut tree = EditTree::new();
    let mut doc = String::from("untouched");
    let mut undo = tree.apply(&mut doc).unwrap();
    assert_eq!(doc, "untouched");
    assert!(!undo.has_children(undo.root()));
    undo.apply(&mut doc).unwrap();
    assert_eq!(doc, "untouched");
}

#[test]
fn style_none_returns_no_undo_and_skips_region_updates() {
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::delete(0..2)).unwrap();
    let ins = tree.add(root, Edit::insert(4, "-")).unwrap();
    let mut doc = String::from("abcdef");
    let undo = tree.apply_with_style(&mut doc, Style::empty()).unwrap();
    assert!(undo.is_none());
    assert_eq!(doc, "cd-ef");
    // no region-updating pass ran
    assert_eq!(tree.offset(ins), 4);
}

#[test]
fn replace_with_identical_text_has_a_zero_delta_inverse() {
    let mut tree = EditTree::with_root(Edit::replace(0..3, "abc"));
    let mut doc = String::from("abcdef");
    let mut undo = tree.apply(&mut doc).unwrap();
    assert_eq!(doc, "abcdef");
    assert_eq!(tree.region(tree.root()), Some(0..3));
    let inverse = undo.children(undo.root()).to_vec();
    assert_eq!(inverse.len(), 1);
    assert_eq!(undo.region(inverse[0]), Some(0..3));
    undo.apply(&mut doc).unwrap();
    assert_eq!(doc, "abcdef");
}

#[test]
fn deletion_marks_covered_markers_deleted() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let del = tree.add(root, Edit::delete(1..4)).unwrap();
    let marker = tree.add(del, Edit::range_marker(2..3)).unwrap();
    let ins = tree.add(root, Edit::insert(6, "!")).unwrap();
    let mut doc = String::from("abcdefgh");
    tree.apply(&mut doc).unwrap();
    assert_eq!(doc, "aef!gh");
    // the delete itself survives as a collapsed region
    assert_eq!(tree.region(del), Some(1..1));
    assert!(tree.is_deleted(marker));
    assert_eq!(tree.region(marker), None);
    assert_eq!(tree.region(ins), Some(3..4));
    // coverage skips deleted edits entirely
    assert_eq!(tree.coverage(&[marker, ins]), Some(3..4));
    assert_eq!(tree.coverage(&[marker]), None);
}

#[test]
fn applying_a_tree_with_deleted_edits_is_malformed() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let rep = tree.add(root, Edit::replace(0..2, "XY")).unwrap();
    tree.add(rep, Edit::range_marker(1..2)).unwrap();
    let mut doc = String::from("abcd");
    tree.apply(&mut doc).unwrap();
    assert_eq!(doc, "XYcd");
    let err = tree.apply(&mut doc).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Malformed(fault) if fault.kind == MalformedKind::Deleted
    ));
}

#[test]
fn out_of_bounds_tree_is_rejected_before_touching_the_document() {
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::insert(10, "nope")).unwrap();
    let mut doc = String::from("abc");
    let err = tree.apply(&mut doc).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Malformed(fault) if fault.kind == MalformedKind::OutOfBounds
    ));
    assert_eq!(doc, "abc");
}

#[test]
fn bad_location_surfaces_from_the_document() {
    // byte 2 is inside the two-byte 'é'; the tree is structurally fine
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::delete(1..2)).unwrap();
    let mut doc = String::from("héllo");
    let err = tree.apply(&mut doc).unwrap_err();
    assert!(matches!(err, ApplyError::BadLocation(_)));
}

#[test]
fn processor_filter_limits_execution_to_considered_edits() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let skipped = tree.add(root, Edit::delete(0..2)).unwrap();
    let kept = tree.add(root, Edit::delete(3..5)).unwrap();
    let mut doc = String::from("abcdef");
    let undo = Processor::new(&mut doc, Style::default())
        .with_filter(move |_, id| id != skipped)
        .apply(&mut tree)
        .unwrap()
        .unwrap();
    assert_eq!(doc, "abcf");
    // the skipped edit still gets its region carried through pass D
    assert_eq!(tree.region(skipped), Some(0..2));
    assert_eq!(tree.region(kept), Some(3..3));
    assert_eq!(undo.child_count(undo.root()), 1);
}

#[test]
fn undo_round_trip_restores_everything() {
    let original = String::from("The quick brown fox jumps over the lazy dog");
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::replace(0..3, "A")).unwrap();
    let group = tree.add(root, Edit::group()).unwrap();
    tree.add(group, Edit::delete(10..16)).unwrap();
    tree.add(group, Edit::insert(19, "!")).unwrap();
    let marker = tree.add(root, Edit::range_marker(20..25)).unwrap();
    let source = tree.add(root, Edit::move_source(26..31)).unwrap();
    let target = tree.add(root, Edit::move_target(40)).unwrap();
    tree.pair(source, target).unwrap();

    let mut doc = original.clone();
    let mut undo = tree.apply(&mut doc).unwrap();
    assert_eq!(doc, "A quick fox! jumps the lazy over dog");
    assert_eq!(tree.region(marker), Some(13..18));
    assert_eq!(&doc[13..18], "jumps");
    assert_eq!(tree.region(target), Some(28..33));
    assert_eq!(&doc[28..33], "over ");

    let after = doc.clone();
    let mut redo = undo.apply(&mut doc).unwrap();
    assert_eq!(doc, original);
    let mut undo_again = redo.apply(&mut doc).unwrap();
    assert_eq!(doc, after);
    undo_again.apply(&mut doc).unwrap();
    assert_eq!(doc, original);
}

#[cfg(feature = "ropey")]
#[test]
fn applies_against_a_rope_document() {
    let mut rope = ropey::Rope::from_str("abcdef");
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::delete(1..3)).unwrap();
    let ins = tree.add(root, Edit::insert(5, "XY")).unwrap();
    let mut undo = tree.apply(&mut rope).unwrap();
    assert_eq!(rope.to_string(), "adeXYf");
    assert_eq!(tree.region(ins), Some(3..5));
    undo.apply(&mut rope).unwrap();
    assert_eq!(rope.to_string(), "abcdef");
}

// ---------------------------------------------------------------- move/copy

#[test]
fn move_source_children_edit_the_lifted_text() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let source = tree.add(root, Edit::move_source(0..3)).unwrap();
    tree.add(source, Edit::replace(1..2, "B!")).unwrap();
    let target = tree.add(root, Edit::move_target(6)).unwrap();
    tree.pair(source, target).unwrap();

    let mut doc = String::from("abcdef");
    let mut undo = tree.apply(&mut doc).unwrap();
    // the moved text carries the nested replace with it
    assert_eq!(doc, "defaB!c");
    assert_eq!(tree.region(source), Some(0..0));
    assert_eq!(tree.region(target), Some(3..7));
    undo.apply(&mut doc).unwrap();
    assert_eq!(doc, "abcdef");
}

#[test]
fn source_modifier_rewrites_the_lifted_text() {
    struct Upper;
    impl SourceModifier for Upper {
        fn modify(&self, source: &str) -> String {
            source.to_uppercase()
        }
    }

    let mut tree = EditTree::new();
    let root = tree.root();
    let source = tree
        .add(root, Edit::move_source(0..2).with_modifier(Arc::new(Upper)))
        .unwrap();
    let target = tree.add(root, Edit::move_target(4)).unwrap();
    tree.pair(source, target).unwrap();

    let mut doc = String::from("abcdef");
    let mut undo = tree.apply(&mut doc).unwrap();
    assert_eq!(doc, "cdABef");
    // the undo restores the unmodified original
    undo.apply(&mut doc).unwrap();
    assert_eq!(doc, "abcdef");
}

#[test]
fn unpaired_sources_and_targets_are_rejected() {
    let mut tree = EditTree::new();
    let root = tree.root();
    tree.add(root, Edit::move_source(0..2)).unwrap();
    let mut doc = String::from("abcdef");
    let err = tree.apply(&mut doc).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Malformed(fault) if fault.kind == MalformedKind::Unpaired
    ));
    assert_eq!(doc, "abcdef");
}

#[test]
fn pair_validates_kinds_and_multiplicity() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let source = tree.add(root, Edit::move_source(0..2)).unwrap();
    let copy_target = tree.add(root, Edit::copy_target(4)).unwrap();
    let err = tree.pair(source, copy_target).unwrap_err();
    assert_eq!(err.kind, MalformedKind::InvalidPair);

    let target = tree.add(root, Edit::move_target(6)).unwrap();
    tree.pair(source, target).unwrap();
    let other = tree.add(root, Edit::move_target(8)).unwrap();
    let err = tree.pair(source, other).unwrap_err();
    assert_eq!(err.kind, MalformedKind::InvalidPair);
}

// ------------------------------------------------------------------- copier

#[test]
fn copy_is_deep_and_rewires_pairs() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let source = tree.add(root, Edit::move_source(1..3)).unwrap();
    let target = tree.add(root, Edit::move_target(5)).unwrap();
    tree.pair(source, target).unwrap();

    let copy = tree.copy();
    let source2 = copy.copy_of(source).unwrap();
    let target2 = copy.copy_of(target).unwrap();
    let mut copied = copy.tree;

    // the copy's pair points at the copied partner, not the original
    match copied.kind(target2) {
        EditKind::MoveTarget { source } => assert_eq!(*source, Some(source2)),
        other => panic!("unexpected kind {other:?}"),
    }

    // running the copy leaves the original untouched and still paired
    let mut doc = String::from("abcdef");
    copied.apply(&mut doc).unwrap();
    assert_eq!(doc, "adebcf");
    assert_eq!(tree.region(source), Some(1..3));
    match tree.kind(target) {
        EditKind::MoveTarget { source: back } => assert_eq!(*back, Some(source)),
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn copy_subtree_drops_partners_outside_the_subtree() {
    let mut tree = EditTree::new();
    let root = tree.root();
    let group = tree.add(root, Edit::group()).unwrap();
    let source = tree.add(group, Edit::move_source(1..3)).unwrap();
    let target = tree.add(root, Edit::move_target(5)).unwrap();
    tree.pair(source, target).unwrap();

    let copy = tree.copy_subtree(group);
    let source2 = copy.copy_of(source).unwrap();
    assert_eq!(copy.copy_of(target), None);
    let mut copied = copy.tree;
    match copied.kind(source2) {
        EditKind::MoveSource(data) => assert_eq!(data.target(), None),
        other => panic!("unexpected kind {other:?}"),
    }

    // an unpaired copy cannot be applied until it is re-paired
    let mut doc = String::from("abcdef");
    let err = copied.apply(&mut doc).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Malformed(fault) if fault.kind == MalformedKind::Unpaired
    ));
}

// ------------------------------------------------------------------ visitor

#[test]
fn visitor_dispatches_in_tree_order_with_pre_and_post_hooks() {
    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
    }
    impl Visitor for Trace {
        fn pre_visit(&mut self, tree: &EditTree, edit: EditId) {
            self.events.push(format!("pre:{}", tree.kind(edit).name()));
        }
        fn post_visit(&mut self, tree: &EditTree, edit: EditId) {
            self.events.push(format!("post:{}", tree.kind(edit).name()));
        }
        fn visit(&mut self, tree: &EditTree, edit: EditId) -> bool {
            self.events.push(tree.kind(edit).name().to_owned());
            true
        }
        fn visit_delete(&mut self, tree: &EditTree, edit: EditId) -> bool {
            self.events.push(tree.kind(edit).name().to_owned());
            // skip whatever the delete is about to swallow
            false
        }
    }

    let mut tree = EditTree::new();
    let root = tree.root();
    let del = tree.add(root, Edit::delete(1..4)).unwrap();
    tree.add(del, Edit::range_marker(2..3)).unwrap();
    tree.add(root, Edit::insert(5, "x")).unwrap();

    let mut trace = Trace::default();
    tree.accept(&mut trace);
    assert_eq!(
        trace.events,
        [
            "pre:group", "group", "pre:delete", "delete", "post:delete", "pre:insert", "insert",
            "post:insert", "post:group",
        ]
    );
}
